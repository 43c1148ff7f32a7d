//! Model to value tree conversions.

use crate::element::{Element, Struct};
use crate::model::{
    AnnotationsV2, Constraint, HeaderImport, NamedTypeDefinition,
    OpenContent, SchemaFooter, SchemaHeader, TypeArgument, TypeDefinition, ValidValue,
    VariablyOccurringTypeArgument,
};
use crate::range::{IntRange, Limit, TimestampPrecisionRange};
use crate::vocabulary::IslVersion;

fn range_element<T>(start: Limit<&T>, end: Limit<&T>, bound: impl Fn(&T) -> Element) -> Element {
    let limit = |limit: Limit<&T>, unbounded: &str| match limit {
        Limit::Unbounded => Element::symbol(unbounded),
        Limit::Closed(v) => bound(v),
        Limit::Open(v) => bound(v).with_annotations(["exclusive"]),
    };
    Element::list(vec![limit(start, "min"), limit(end, "max")]).with_annotations(["range"])
}

/// A closed one-value range is written as the bare int when `bare_singleton`
/// accepts it.
fn int_range_element(range: &IntRange, bare_singleton: impl Fn(i64) -> bool) -> Element {
    match range.as_singleton() {
        Some(value) if bare_singleton(value) => Element::int(value),
        _ => range_element(range.start().as_ref(), range.end().as_ref(), |v| {
            Element::int(*v)
        }),
    }
}

fn precision_range_element(range: &TimestampPrecisionRange) -> Element {
    match range.as_singleton() {
        Some(precision) => Element::symbol(precision.symbol_text()),
        None => range_element(range.start().as_ref(), range.end().as_ref(), |p| {
            Element::symbol(p.symbol_text())
        }),
    }
}

fn push_open_content(fields: &mut Struct, open_content: &OpenContent) {
    for (name, value) in open_content {
        fields.push(name.as_str(), value.clone());
    }
}

pub(crate) fn header_element(header: &SchemaHeader, version: IslVersion) -> Element {
    let mut fields = Struct::new();
    if !header.imports.is_empty() {
        let imports = header.imports.iter().map(import_element).collect();
        fields.push("imports", Element::list(imports));
    }
    let reserved = &header.user_reserved_fields;
    if version == IslVersion::V2_0 && !reserved.is_empty() {
        let mut declared = Struct::new();
        for (name, words) in [
            ("schema_header", &reserved.header),
            ("type", &reserved.type_definition),
            ("schema_footer", &reserved.footer),
        ] {
            if !words.is_empty() {
                declared.push(name, Element::list(words.iter().map(Element::symbol).collect()));
            }
        }
        fields.push("user_reserved_fields", Element::structure(declared));
    }
    push_open_content(&mut fields, &header.open_content);
    Element::structure(fields).with_annotations(["schema_header"])
}

fn import_element(import: &HeaderImport) -> Element {
    let mut fields = Struct::new().with_field("id", Element::string(import.schema_id()));
    if let HeaderImport::Type {
        type_name, alias, ..
    } = import
    {
        fields.push("type", Element::symbol(type_name.as_str()));
        if let Some(alias) = alias {
            fields.push("as", Element::symbol(alias.as_str()));
        }
    }
    Element::structure(fields)
}

pub(crate) fn footer_element(footer: &SchemaFooter) -> Element {
    let mut fields = Struct::new();
    push_open_content(&mut fields, &footer.open_content);
    Element::structure(fields).with_annotations(["schema_footer"])
}

pub(crate) fn named_type_element(definition: &NamedTypeDefinition, version: IslVersion) -> Element {
    let mut fields = Struct::new().with_field("name", Element::symbol(definition.name.as_str()));
    push_definition(&mut fields, &definition.definition, version);
    Element::structure(fields).with_annotations(["type"])
}

pub(crate) fn type_element(definition: &TypeDefinition, version: IslVersion) -> Element {
    let mut fields = Struct::new();
    push_definition(&mut fields, definition, version);
    Element::structure(fields)
}

fn push_definition(fields: &mut Struct, definition: &TypeDefinition, version: IslVersion) {
    for constraint in &definition.constraints {
        push_constraint(fields, constraint, version);
    }
    push_open_content(fields, &definition.open_content);
}

fn type_argument_element(argument: &TypeArgument, version: IslVersion) -> Element {
    let element = match argument {
        TypeArgument::Reference { name, .. } => Element::symbol(name.as_str()),
        TypeArgument::Import {
            schema_id,
            type_name,
            ..
        } => Element::structure(
            Struct::new()
                .with_field("id", Element::string(schema_id.as_str()))
                .with_field("type", Element::symbol(type_name.as_str())),
        ),
        TypeArgument::InlineType { definition, .. } => type_element(definition, version),
    };
    match argument.nullability().annotation() {
        Some(annotation) => element.with_annotations([annotation]),
        None => element,
    }
}

fn type_arguments_element(arguments: &[TypeArgument], version: IslVersion) -> Element {
    Element::list(
        arguments
            .iter()
            .map(|argument| type_argument_element(argument, version))
            .collect(),
    )
}

fn occurring_element(
    argument: &VariablyOccurringTypeArgument,
    default: &IntRange,
    version: IslVersion,
) -> Element {
    if &argument.occurs == default {
        return type_argument_element(&argument.type_argument, version);
    }
    let occurs = int_range_element(&argument.occurs, |n| n > 0);
    match &argument.type_argument {
        TypeArgument::InlineType {
            definition,
            nullability,
        } if nullability.annotation().is_none() => {
            let mut fields = Struct::new().with_field("occurs", occurs);
            push_definition(&mut fields, definition, version);
            Element::structure(fields)
        }
        other => Element::structure(
            Struct::new()
                .with_field("occurs", occurs)
                .with_field("type", type_argument_element(other, version)),
        ),
    }
}

fn distinct_element(argument: &TypeArgument, distinct: bool, version: IslVersion) -> Element {
    let element = type_argument_element(argument, version);
    if !distinct {
        return element;
    }
    let annotations: Vec<String> = std::iter::once("distinct".to_string())
        .chain(element.annotations().iter().cloned())
        .collect();
    element.without_annotations().with_annotations(annotations)
}

fn push_constraint(fields: &mut Struct, constraint: &Constraint, version: IslVersion) {
    let name = constraint.name();
    let value = match constraint {
        Constraint::AllOf(args) | Constraint::AnyOf(args) | Constraint::OneOf(args) => {
            type_arguments_element(args, version)
        }
        Constraint::Type(arg) | Constraint::Not(arg) => type_argument_element(arg, version),
        Constraint::Element {
            type_argument,
            distinct,
        }
        | Constraint::FieldNames {
            type_argument,
            distinct,
        } => distinct_element(type_argument, *distinct, version),
        Constraint::Fields {
            fields: members,
            closed,
        } => {
            let optional = IntRange::optional();
            let mut members_struct = Struct::new();
            for (member, argument) in members {
                members_struct.push(member.as_str(), occurring_element(argument, &optional, version));
            }
            let members_element = Element::structure(members_struct);
            match version {
                IslVersion::V1_0 => {
                    if *closed {
                        fields.push("content", Element::symbol("closed"));
                        if members.is_empty() {
                            return;
                        }
                    }
                    members_element
                }
                IslVersion::V2_0 if *closed => members_element.with_annotations(["closed"]),
                IslVersion::V2_0 => members_element,
            }
        }
        Constraint::OrderedElements(elements) => {
            let required = IntRange::required();
            Element::list(
                elements
                    .iter()
                    .map(|e| occurring_element(e, &required, version))
                    .collect(),
            )
        }
        Constraint::AnnotationsV1 {
            annotations,
            closed,
            ordered,
        } => {
            let items = annotations
                .iter()
                .map(|a| {
                    let symbol = Element::symbol(a.text.as_str());
                    if a.required {
                        symbol.with_annotations(["required"])
                    } else {
                        symbol
                    }
                })
                .collect();
            let modifiers = [(*ordered, "ordered"), (*closed, "closed")]
                .into_iter()
                .filter_map(|(set, annotation)| set.then_some(annotation));
            Element::list(items).with_annotations(modifiers)
        }
        Constraint::AnnotationsV2(AnnotationsV2::Standard(arg)) => {
            type_argument_element(arg, version)
        }
        Constraint::AnnotationsV2(AnnotationsV2::Simplified {
            modifier,
            annotations,
        }) => Element::list(annotations.iter().map(Element::symbol).collect())
            .with_annotations(modifier.annotations().iter().copied()),
        Constraint::Contains(values) => Element::list(values.iter().cloned().collect()),
        Constraint::Regex(regex) => {
            let flags = [(regex.case_insensitive(), "i"), (regex.multiline(), "m")]
                .into_iter()
                .filter_map(|(set, flag)| set.then_some(flag));
            Element::string(regex.pattern()).with_annotations(flags)
        }
        Constraint::ValidValues(values) => Element::list(
            values
                .iter()
                .map(|value| match value {
                    ValidValue::Value(element) => element.clone(),
                    ValidValue::NumberRange(range) => {
                        range_element(range.start().as_ref(), range.end().as_ref(), |d| {
                            Element::decimal(d.clone())
                        })
                    }
                    ValidValue::TimestampRange(range) => {
                        range_element(range.start(), range.end(), |t| Element::timestamp(t.clone()))
                    }
                })
                .collect(),
        ),
        Constraint::TimestampPrecision(range) => precision_range_element(range),
        Constraint::TimestampOffset(offsets) => Element::list(
            offsets
                .iter()
                .map(|offset| Element::string(offset.to_string()))
                .collect(),
        ),
        Constraint::Ieee754Float(format) => Element::symbol(format.symbol_text()),
        Constraint::DiscreteRange(c) => int_range_element(c.range(), |_| true),
    };
    fields.push(name, value);
}
