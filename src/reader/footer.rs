//! `schema_footer::{ ... }`

use crate::element::Element;
use crate::model::SchemaFooter;

use super::context::{invalid, require, ReaderContext, Step};

/// Every footer field is open content, but reserved words must have been
/// declared in the header's `user_reserved_fields.schema_footer`.
pub(crate) fn read_footer(ctx: &mut ReaderContext<'_>, value: &Element) -> Step<SchemaFooter> {
    let Some(s) = value.as_struct() else {
        return invalid(format!("schema_footer must be a non-null struct; was: {}", value));
    };
    require(value.annotations() == ["schema_footer"], || {
        "schema_footer may not have extra annotations".to_string()
    })?;
    let illegal: Vec<&str> = s
        .iter()
        .map(|(name, _)| name)
        .filter(|name| {
            !ctx.vocabulary.is_footer_keyword(name)
                && ctx.is_reserved(name, |r| r.footer.contains(*name))
        })
        .collect();
    require(illegal.is_empty(), || {
        format!(
            "Found illegal field names [{}] in schema footer: {}",
            illegal.join(", "),
            value
        )
    })?;
    Ok(SchemaFooter {
        open_content: s
            .iter()
            .map(|(name, field)| (name.to_string(), field.clone()))
            .collect(),
    })
}
