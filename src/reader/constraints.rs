//! One reader per constraint field.

use std::collections::{BTreeMap, BTreeSet};

use crate::bag::Bag;
use crate::element::{Element, IonType};
use crate::model::{
    AnnotationV1, AnnotationsModifier, AnnotationsV2, Constraint, DiscreteRangeConstraint,
    DiscreteRangeKind, Ieee754Format, RegexConstraint, TimestampOffsetValue, TypeArgument,
    ValidValue, VariablyOccurringTypeArgument,
};
use crate::path::TreePath;
use crate::range::IntRange;
use crate::vocabulary::IslVersion;

use super::context::{invalid, invalid_constraint, require, ReaderContext, Step};
use super::ranges::{
    has_bound_of_type, has_numeric_bound, read_int_range, read_number_range,
    read_timestamp_precision_range, read_timestamp_range,
};
use super::types::{read_type_argument, read_variably_occurring};

/// Reads the constraint stored under field `name`.
pub(crate) fn read_constraint(
    ctx: &mut ReaderContext<'_>,
    name: &str,
    value: &Element,
    path: &TreePath,
) -> Step<Constraint> {
    if let Some(kind) = DiscreteRangeKind::from_field_name(name) {
        let range = read_int_range(value)?;
        return Ok(Constraint::DiscreteRange(DiscreteRangeConstraint::new(
            kind, range,
        )?));
    }
    match name {
        "all_of" => Ok(Constraint::AllOf(read_type_arguments(ctx, name, value, path)?)),
        "any_of" => Ok(Constraint::AnyOf(read_type_arguments(ctx, name, value, path)?)),
        "one_of" => Ok(Constraint::OneOf(read_type_arguments(ctx, name, value, path)?)),
        "type" => Ok(Constraint::Type(read_type_argument(ctx, value, path)?)),
        "not" => Ok(Constraint::Not(read_type_argument(ctx, value, path)?)),
        "element" | "field_names" => {
            let (type_argument, distinct) = read_distinct_type_argument(ctx, name, value, path)?;
            Ok(if name == "element" {
                Constraint::Element {
                    type_argument,
                    distinct,
                }
            } else {
                Constraint::FieldNames {
                    type_argument,
                    distinct,
                }
            })
        }
        "fields" => read_fields(ctx, value, path),
        "ordered_elements" => read_ordered_elements(ctx, value, path),
        "annotations" => match ctx.vocabulary.version() {
            IslVersion::V1_0 => read_annotations_v1(value),
            IslVersion::V2_0 => read_annotations_v2(ctx, value, path),
        },
        "contains" => {
            let items = non_null_list(name, value)?;
            no_annotations(name, value)?;
            Ok(Constraint::Contains(items.iter().cloned().collect()))
        }
        "regex" => read_regex(ctx, value),
        "valid_values" => read_valid_values(value),
        "timestamp_precision" => Ok(Constraint::TimestampPrecision(
            read_timestamp_precision_range(value)?,
        )),
        "timestamp_offset" => read_timestamp_offset(value),
        "ieee754_float" => {
            no_annotations(name, value)?;
            match value.as_symbol().and_then(Ieee754Format::from_symbol_text) {
                Some(format) => Ok(Constraint::Ieee754Float(format)),
                None => invalid(invalid_constraint(
                    name,
                    "must be one of 'binary16', 'binary32', 'binary64'",
                    value,
                )),
            }
        }
        other => invalid(format!("'{}' is not a known constraint", other)),
    }
}

fn non_null_list<'e>(name: &str, value: &'e Element) -> Step<&'e [Element]> {
    match value.as_list() {
        Some(items) => Ok(items),
        None => invalid(invalid_constraint(name, "must be a non-null list", value)),
    }
}

fn no_annotations(name: &str, value: &Element) -> Step<()> {
    require(value.annotations().is_empty(), || {
        invalid_constraint(name, "must not have annotations", value)
    })
}

/// A list of type arguments, each read on its own.
fn read_type_arguments(
    ctx: &mut ReaderContext<'_>,
    name: &str,
    value: &Element,
    path: &TreePath,
) -> Step<Vec<TypeArgument>> {
    let items = non_null_list(name, value)?;
    no_annotations(name, value)?;
    let mut arguments = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let item_path = path.index(i);
        if let Some(argument) =
            ctx.catching(&item_path, |ctx| read_type_argument(ctx, item, &item_path))?
        {
            arguments.push(argument);
        }
    }
    Ok(arguments)
}

/// `element` and `field_names` may be annotated `distinct` in ISL 2.0.
fn read_distinct_type_argument(
    ctx: &mut ReaderContext<'_>,
    name: &str,
    value: &Element,
    path: &TreePath,
) -> Step<(TypeArgument, bool)> {
    if ctx.vocabulary.version() == IslVersion::V1_0 {
        return Ok((read_type_argument(ctx, value, path)?, false));
    }
    require(
        value
            .annotations()
            .iter()
            .all(|a| a == "distinct" || a == "$null_or"),
        || {
            invalid_constraint(
                name,
                "type argument may only be annotated with 'distinct' or '$null_or'",
                value,
            )
        },
    )?;
    let distinct = value.has_annotation("distinct");
    let argument = if distinct {
        let kept = value.annotations().iter().filter(|a| *a != "distinct");
        read_type_argument(ctx, &value.without_annotations().with_annotations(kept), path)?
    } else {
        read_type_argument(ctx, value, path)?
    };
    Ok((argument, distinct))
}

fn read_fields(
    ctx: &mut ReaderContext<'_>,
    value: &Element,
    path: &TreePath,
) -> Step<Constraint> {
    let Some(s) = value.as_struct() else {
        return invalid(invalid_constraint("fields", "must be a non-null struct", value));
    };
    let version = ctx.vocabulary.version();
    let allowed: &[&str] = match version {
        IslVersion::V1_0 => &[],
        IslVersion::V2_0 => &["closed"],
    };
    require(
        value.annotations().iter().all(|a| allowed.contains(&a.as_str())),
        || {
            let reason = match version {
                IslVersion::V1_0 => "must not have annotations",
                IslVersion::V2_0 => "argument may only be annotated with 'closed'",
            };
            invalid_constraint("fields", reason, value)
        },
    )?;
    if version == IslVersion::V2_0 {
        require(!s.is_empty(), || {
            invalid_constraint("fields", "must be a non-empty struct", value)
        })?;
    }
    let mut seen = BTreeSet::new();
    let duplicates: Vec<&str> = s.iter().map(|(n, _)| n).filter(|n| !seen.insert(*n)).collect();
    require(duplicates.is_empty(), || {
        invalid_constraint(
            "fields",
            &format!("field names must be unique, found duplicates of {:?}", duplicates),
            value,
        )
    })?;

    let mut fields = BTreeMap::new();
    for (field_name, field) in s.iter() {
        let field_path = path.field(field_name);
        let read = ctx.catching(&field_path, |ctx| {
            read_variably_occurring(ctx, field, &field_path, IntRange::optional())
        })?;
        if let Some(argument) = read {
            fields.insert(field_name.to_string(), argument);
        }
    }
    Ok(Constraint::Fields {
        fields,
        closed: value.has_annotation("closed"),
    })
}

fn read_ordered_elements(
    ctx: &mut ReaderContext<'_>,
    value: &Element,
    path: &TreePath,
) -> Step<Constraint> {
    let items = non_null_list("ordered_elements", value)?;
    no_annotations("ordered_elements", value)?;
    let mut elements: Vec<VariablyOccurringTypeArgument> = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let item_path = path.index(i);
        let read = ctx.catching(&item_path, |ctx| {
            read_variably_occurring(ctx, item, &item_path, IntRange::required())
        })?;
        elements.extend(read);
    }
    Ok(Constraint::OrderedElements(elements))
}

/// `ordered::closed::required::[a, optional::b]`
fn read_annotations_v1(value: &Element) -> Step<Constraint> {
    let items = non_null_list("annotations", value)?;
    require(
        value
            .annotations()
            .iter()
            .all(|a| matches!(a.as_str(), "required" | "ordered" | "closed")),
        || {
            invalid_constraint(
                "annotations",
                "list may only be annotated with 'required', 'ordered' and 'closed'",
                value,
            )
        },
    )?;
    let required_by_default = value.has_annotation("required");
    let mut annotations = Vec::with_capacity(items.len());
    for item in items {
        let text = item.as_symbol().filter(|_| {
            item.annotations()
                .iter()
                .all(|a| a == "required" || a == "optional")
        });
        let Some(text) = text else {
            return invalid(invalid_constraint(
                "annotations",
                "elements must be symbols annotated with nothing, 'required' or 'optional'",
                value,
            ));
        };
        let required = match (item.has_annotation("required"), item.has_annotation("optional")) {
            (true, _) => true,
            (false, true) => false,
            (false, false) => required_by_default,
        };
        annotations.push(AnnotationV1 {
            text: text.to_string(),
            required,
        });
    }
    Ok(Constraint::AnnotationsV1 {
        annotations,
        closed: value.has_annotation("closed"),
        ordered: value.has_annotation("ordered"),
    })
}

fn read_annotations_v2(
    ctx: &mut ReaderContext<'_>,
    value: &Element,
    path: &TreePath,
) -> Step<Constraint> {
    match value.ion_type() {
        IonType::List => {
            let items = non_null_list("annotations", value)?;
            require(
                value
                    .annotations()
                    .iter()
                    .all(|a| a == "closed" || a == "required"),
                || {
                    invalid_constraint(
                        "annotations",
                        "list may only be annotated with 'closed' and 'required'",
                        value,
                    )
                },
            )?;
            let modifier = match (value.has_annotation("closed"), value.has_annotation("required")) {
                (true, true) => AnnotationsModifier::ClosedAndRequired,
                (true, false) => AnnotationsModifier::Closed,
                (false, true) => AnnotationsModifier::Required,
                (false, false) => {
                    return invalid(invalid_constraint(
                        "annotations",
                        "list must be annotated with 'closed' or 'required'",
                        value,
                    ))
                }
            };
            let mut annotations = BTreeSet::new();
            for item in items {
                match item.as_symbol() {
                    Some(text) if item.annotations().is_empty() => {
                        annotations.insert(text.to_string());
                    }
                    _ => {
                        return invalid(invalid_constraint(
                            "annotations",
                            "list elements must be non-null, unannotated symbols",
                            value,
                        ))
                    }
                }
            }
            Ok(Constraint::AnnotationsV2(AnnotationsV2::Simplified {
                modifier,
                annotations,
            }))
        }
        IonType::Struct | IonType::Symbol => Ok(Constraint::AnnotationsV2(
            AnnotationsV2::Standard(read_type_argument(ctx, value, path)?),
        )),
        _ => invalid(invalid_constraint(
            "annotations",
            "must be a type argument (symbol or struct) or a list of valid annotations",
            value,
        )),
    }
}

fn read_regex(ctx: &ReaderContext<'_>, value: &Element) -> Step<Constraint> {
    let Some(pattern) = value.as_string() else {
        return invalid(invalid_constraint("regex", "must be a non-null string", value));
    };
    require(
        value.annotations().iter().all(|a| a == "i" || a == "m"),
        || {
            invalid_constraint(
                "regex",
                "regex pattern may only be annotated with 'i' and 'm'",
                value,
            )
        },
    )?;
    Ok(Constraint::Regex(RegexConstraint::new(
        pattern,
        value.has_annotation("i"),
        value.has_annotation("m"),
        ctx.vocabulary.version(),
    )?))
}

fn read_range_value(value: &Element) -> Step<ValidValue> {
    if has_bound_of_type(value, IonType::Timestamp) {
        Ok(ValidValue::TimestampRange(read_timestamp_range(value)?))
    } else if has_numeric_bound(value) {
        Ok(ValidValue::NumberRange(read_number_range(value)?))
    } else {
        invalid(invalid_constraint("valid_values", "Not a valid range", value))
    }
}

fn read_valid_values(value: &Element) -> Step<Constraint> {
    require(
        value.annotations().iter().all(|a| a == "range"),
        || invalid_constraint("valid_values", "annotations not permitted except for range", value),
    )?;
    if value.has_annotation("range") {
        let range = read_range_value(value)?;
        return Ok(Constraint::ValidValues(Bag::from(vec![range])));
    }
    let items = non_null_list("valid_values", value)?;
    let mut values = Bag::new();
    for item in items {
        if item.ion_type() == IonType::List && item.has_annotation("range") {
            values.push(read_range_value(item)?);
        } else {
            require(item.annotations().is_empty(), || {
                invalid_constraint(
                    "valid_values",
                    "annotations not permitted except for range",
                    item,
                )
            })?;
            values.push(ValidValue::Value(item.clone()));
        }
    }
    Ok(Constraint::ValidValues(values))
}

fn read_timestamp_offset(value: &Element) -> Step<Constraint> {
    let items = value.as_list().filter(|items| !items.is_empty());
    let Some(items) = items else {
        return invalid(invalid_constraint(
            "timestamp_offset",
            "must be a non-null, non-empty list",
            value,
        ));
    };
    no_annotations("timestamp_offset", value)?;
    let mut offsets = Vec::with_capacity(items.len());
    for item in items {
        let Some(text) = item.as_string().filter(|_| item.annotations().is_empty()) else {
            return invalid(invalid_constraint(
                "timestamp_offset",
                "elements must be non-null, unannotated strings",
                value,
            ));
        };
        offsets.push(TimestampOffsetValue::parse(text)?);
    }
    Ok(Constraint::TimestampOffset(offsets))
}
