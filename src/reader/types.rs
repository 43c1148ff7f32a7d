//! Type definitions and type arguments.

use crate::element::{Element, Struct};
use crate::model::{
    Constraint, NamedTypeDefinition, Nullability, TypeArgument, TypeDefinition,
    VariablyOccurringTypeArgument,
};
use crate::path::TreePath;
use crate::range::IntRange;
use crate::vocabulary::IslVersion;

use super::constraints::read_constraint;
use super::context::{
    invalid, require, require_annotations_in, require_no_annotations, required_field, text_of,
    Expect, Halt, ReaderContext, Step,
};
use super::ranges::read_non_negative_int_range;

fn non_null_struct<'e>(value: &'e Element, message: impl FnOnce() -> String) -> Step<&'e Struct> {
    match value.as_struct() {
        Some(s) => Ok(s),
        None => invalid(message()),
    }
}

/// `type::{ name: ..., <constraints> }`
pub(crate) fn read_named_type(
    ctx: &mut ReaderContext<'_>,
    value: &Element,
    path: &TreePath,
) -> Step<NamedTypeDefinition> {
    let s = non_null_struct(value, || {
        format!("Named type definitions must be a non-null struct; was: {}", value)
    })?;
    require(value.annotations() == ["type"], || {
        format!(
            "Named type definitions must be annotated with 'type' and nothing else: {}",
            value
        )
    })?;
    require(!s.contains_field("occurs"), || {
        format!("Named type definitions may not have an 'occurs' field: {}", value)
    })?;
    let name = text_of(required_field(s, "name", Expect::Symbol, value)?);
    let definition = read_type_definition(ctx, s, path)?;
    Ok(NamedTypeDefinition { name, definition })
}

/// A type definition that is not declared at the top level of a schema.
pub(crate) fn read_orphaned_type(
    ctx: &mut ReaderContext<'_>,
    value: &Element,
    path: &TreePath,
) -> Step<TypeDefinition> {
    let s = non_null_struct(value, || {
        format!("Type definitions must be a non-null struct; was: {}", value)
    })?;
    require(!s.contains_field("name"), || {
        format!("Anonymous type definitions may not have a 'name' field: {}", value)
    })?;
    require(!s.contains_field("occurs"), || {
        format!("Anonymous type definitions may not have an 'occurs' field: {}", value)
    })?;
    read_type_definition(ctx, s, path)
}

/// Reads every field except `name` and `occurs`, which the callers check.
pub(crate) fn read_type_definition(
    ctx: &mut ReaderContext<'_>,
    s: &Struct,
    path: &TreePath,
) -> Step<TypeDefinition> {
    let mut constraints = Vec::new();
    let mut definition = TypeDefinition::new();
    let mut content_closed = false;

    for (name, field) in s.iter() {
        let field_path = path.field(name);
        if name == "name" || name == "occurs" {
            continue;
        }
        if name == "content" && ctx.vocabulary.version() == IslVersion::V1_0 {
            let closed = ctx.catching(&field_path, |_| {
                require(
                    field.as_symbol() == Some("closed") && field.annotations().is_empty(),
                    || format!("'content' must be the symbol 'closed'; was: {}", field),
                )
            })?;
            content_closed |= closed.is_some();
            continue;
        }
        if ctx.vocabulary.is_constraint(name) {
            if let Some(constraint) =
                ctx.catching(&field_path, |ctx| read_constraint(ctx, name, field, &field_path))?
            {
                constraints.push(constraint);
            }
        } else if ctx.is_reserved(name, |reserved| reserved.type_definition.contains(name)) {
            ctx.report(
                &field_path,
                format!("Found unexpected field name '{}' in type definition", name),
            )?;
        } else {
            definition.open_content.push((name.to_string(), field.clone()));
        }
    }

    if content_closed {
        let fields = constraints.iter_mut().find_map(|c| match c {
            Constraint::Fields { closed, .. } => Some(closed),
            _ => None,
        });
        match fields {
            Some(closed) => *closed = true,
            None => constraints.push(Constraint::Fields {
                fields: Default::default(),
                closed: true,
            }),
        }
    }
    definition.constraints = constraints.into_iter().collect();
    Ok(definition)
}

/// A type name, an inline import or an inline type, optionally nullable.
pub(crate) fn read_type_argument(
    ctx: &mut ReaderContext<'_>,
    value: &Element,
    path: &TreePath,
) -> Step<TypeArgument> {
    let (marker, nullable) = match ctx.vocabulary.version() {
        IslVersion::V1_0 => ("nullable", Nullability::Nullable),
        IslVersion::V2_0 => ("$null_or", Nullability::OrNull),
    };
    require_annotations_in(value, &[marker], || {
        format!(
            "Invalid constraint; illegal annotation on type argument: {}",
            value
        )
    })?;
    let nullability = if value.has_annotation(marker) {
        nullable
    } else {
        Nullability::None
    };

    if let Some(s) = value.as_struct() {
        if s.contains_field("id") {
            require(s.iter().all(|(name, _)| name == "id" || name == "type"), || {
                format!(
                    "inline imports may only have the fields 'id' and 'type': {}",
                    value
                )
            })?;
            let schema_id = text_of(required_field(s, "id", Expect::Text, value)?);
            let type_name = text_of(required_field(s, "type", Expect::Symbol, value)?);
            return Ok(TypeArgument::Import {
                schema_id,
                type_name,
                nullability,
            });
        }
        require(!s.contains_field("name"), || {
            format!("Inline type definitions may not have a 'name' field: {}", value)
        })?;
        require(!s.contains_field("occurs"), || {
            format!("Inline type definitions may not have an 'occurs' field: {}", value)
        })?;
        let definition = read_type_definition(ctx, s, path)?;
        return Ok(TypeArgument::InlineType {
            definition: Box::new(definition),
            nullability,
        });
    }
    match value.as_symbol() {
        Some(name) => Ok(TypeArgument::Reference {
            name: name.to_string(),
            nullability,
        }),
        None => invalid(format!(
            "Invalid constraint; not a valid type argument: {}",
            value
        )),
    }
}

fn occurs_error(value: &Element) -> String {
    format!(
        "Invalid 'occurs' value; must be 'optional', 'required', a positive int, or a non-negative int range: {}",
        value
    )
}

fn read_occurs(value: &Element) -> Step<IntRange> {
    match value.as_symbol() {
        Some("optional") if value.annotations().is_empty() => return Ok(IntRange::optional()),
        Some("required") if value.annotations().is_empty() => return Ok(IntRange::required()),
        Some(_) => return invalid(occurs_error(value)),
        None => {}
    }
    match value.as_i64() {
        Some(n) if n > 0 && value.annotations().is_empty() => Ok(IntRange::singleton(n)),
        Some(_) => invalid(occurs_error(value)),
        None if value.as_list().is_some() => {
            read_non_negative_int_range(value).map_err(|halt| match halt {
                Halt::Invalid(reason) => Halt::Invalid(format!("{}; {}", occurs_error(value), reason)),
                abort => abort,
            })
        }
        None => invalid(occurs_error(value)),
    }
}

/// A type argument that may carry an `occurs` field, as found in `fields`
/// and `ordered_elements`. Without one, `default` applies.
pub(crate) fn read_variably_occurring(
    ctx: &mut ReaderContext<'_>,
    value: &Element,
    path: &TreePath,
    default: IntRange,
) -> Step<VariablyOccurringTypeArgument> {
    let Some(s) = value.as_struct().filter(|s| s.contains_field("occurs")) else {
        let type_argument = read_type_argument(ctx, value, path)?;
        return Ok(VariablyOccurringTypeArgument::new(default, type_argument));
    };
    require_no_annotations(value, || {
        format!(
            "Variably occurring type arguments may not be annotated: {}",
            value
        )
    })?;
    let mut occurs_values = s.get_all("occurs").into_iter();
    let occurs = match (occurs_values.next(), occurs_values.next()) {
        (Some(occurs), None) => read_occurs(occurs)?,
        _ => return invalid(format!("'occurs' must only appear once: {}", value)),
    };
    require(!s.contains_field("name"), || {
        format!("Inline type definitions may not have a 'name' field: {}", value)
    })?;
    let definition = read_type_definition(ctx, s, path)?;
    Ok(VariablyOccurringTypeArgument::new(
        occurs,
        TypeArgument::inline(definition),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::parse;
    use crate::vocabulary::Vocabulary;

    fn one(text: &str) -> Element {
        parse(text).unwrap().remove(0)
    }

    fn read_arg(text: &str, vocabulary: &Vocabulary) -> Result<TypeArgument, Vec<String>> {
        let mut ctx = ReaderContext::new(vocabulary, false);
        let root = TreePath::root();
        let outcome = read_type_argument(&mut ctx, &one(text), &root);
        ctx.finish(&root, outcome)
            .map_err(|errors| errors.iter().map(ToString::to_string).collect())
    }

    #[test]
    fn type_argument_forms() {
        let v2 = Vocabulary::isl_2_0();
        assert_eq!(read_arg("int", &v2).unwrap(), TypeArgument::reference("int"));
        assert_eq!(
            read_arg("$null_or::int", &v2).unwrap().nullability(),
            Nullability::OrNull
        );
        assert!(matches!(
            read_arg("{ id: \"a.isl\", type: t }", &v2).unwrap(),
            TypeArgument::Import { schema_id, type_name, .. } if schema_id == "a.isl" && type_name == "t"
        ));
        assert!(matches!(
            read_arg("{ type: int }", &v2).unwrap(),
            TypeArgument::InlineType { .. }
        ));
    }

    #[test]
    fn nullability_annotation_depends_on_version() {
        let v1 = Vocabulary::isl_1_0();
        assert_eq!(
            read_arg("nullable::int", &v1).unwrap().nullability(),
            Nullability::Nullable
        );
        let errors = read_arg("nullable::int", &Vocabulary::isl_2_0()).unwrap_err();
        assert!(errors[0].contains("illegal annotation on type argument"));
    }

    #[test]
    fn invalid_type_arguments() {
        let v2 = Vocabulary::isl_2_0();
        let errors = read_arg("5", &v2).unwrap_err();
        assert!(errors[0].contains("not a valid type argument"));
        let errors = read_arg("{ name: x, type: int }", &v2).unwrap_err();
        assert!(errors[0].contains("may not have a 'name' field"));
        let errors = read_arg("{ id: \"a.isl\", type: t, as: u }", &v2).unwrap_err();
        assert!(errors[0].contains("inline imports"));
    }

    #[test]
    fn unknown_fields_in_inline_types() {
        let v2 = Vocabulary::isl_2_0();
        let arg = read_arg("{ type: int, _note: \"hi\" }", &v2).unwrap();
        let TypeArgument::InlineType { definition, .. } = arg else {
            panic!("expected an inline type");
        };
        assert_eq!(definition.open_content.len(), 1);

        let errors = read_arg("{ type: int, note: \"hi\" }", &v2).unwrap_err();
        assert_eq!(errors, vec!["/note: Found unexpected field name 'note' in type definition"]);
    }

    #[test]
    fn occurs() {
        let v2 = Vocabulary::isl_2_0();
        let mut ctx = ReaderContext::new(&v2, false);
        let root = TreePath::root();
        let vota = read_variably_occurring(
            &mut ctx,
            &one("{ occurs: range::[0, 3], type: int }"),
            &root,
            IntRange::required(),
        )
        .unwrap();
        assert!(vota.occurs.contains(3));

        let vota =
            read_variably_occurring(&mut ctx, &one("int"), &root, IntRange::optional()).unwrap();
        assert_eq!(vota.occurs, IntRange::optional());

        for bad in ["{ occurs: 0 }", "{ occurs: maybe }", "{ occurs: range::[-1, 2] }"] {
            let outcome = read_variably_occurring(&mut ctx, &one(bad), &root, IntRange::optional());
            assert!(
                matches!(outcome, Err(Halt::Invalid(ref m)) if m.starts_with("Invalid 'occurs' value")),
                "{}",
                bad
            );
        }
    }

    #[test]
    fn content_closed_in_isl_1_0() {
        let v1 = Vocabulary::isl_1_0();
        let mut ctx = ReaderContext::new(&v1, false);
        let root = TreePath::root();
        let value = one("{ content: closed, fields: { a: int } }");
        let definition = read_orphaned_type(&mut ctx, &value, &root).unwrap();
        assert!(definition
            .constraints
            .iter()
            .any(|c| matches!(c, Constraint::Fields { closed: true, fields } if fields.len() == 1)));
    }
}
