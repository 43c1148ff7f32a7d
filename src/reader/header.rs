//! `schema_header::{ ... }`

use std::collections::BTreeSet;

use crate::element::{Element, Struct};
use crate::model::{HeaderImport, SchemaHeader, UserReservedFields};
use crate::path::TreePath;
use crate::vocabulary::Vocabulary;

use super::context::{
    invalid, optional_field, require, required_field, text_of, Expect, ReaderContext, Step,
};

pub(crate) fn read_header(
    ctx: &mut ReaderContext<'_>,
    value: &Element,
    path: &TreePath,
) -> Step<SchemaHeader> {
    require(!ctx.found_header, || {
        "Only one schema header is allowed in a schema document.".to_string()
    })?;
    require(!ctx.found_any_type, || {
        "Schema header must appear before any types.".to_string()
    })?;
    ctx.found_header = true;

    let Some(s) = value.as_struct() else {
        return invalid(format!("schema_header must be a non-null struct; was: {}", value));
    };
    require(value.annotations() == ["schema_header"], || {
        "schema_header may not have extra annotations".to_string()
    })?;

    let mut header = SchemaHeader::default();
    if let Some(imports) = optional_field(s, "imports", Expect::List)? {
        require(imports.annotations().is_empty(), || {
            "'imports' list may not be annotated".to_string()
        })?;
        let imports_path = path.field("imports");
        for (i, item) in imports.as_list().unwrap_or_default().iter().enumerate() {
            let item_path = imports_path.index(i);
            let import = ctx.catching(&item_path, |ctx| read_import(ctx.vocabulary, item))?;
            header.imports.extend(import);
        }
    }

    if ctx.vocabulary.supports_user_reserved_fields() {
        let reserved = read_user_reserved_fields(ctx.vocabulary, s)?;
        ctx.user_reserved_fields = reserved.clone();
        header.user_reserved_fields = reserved;

        let unexpected: Vec<&str> = s
            .iter()
            .map(|(name, _)| name)
            .filter(|name| {
                !ctx.vocabulary.is_header_keyword(name)
                    && ctx.is_reserved(name, |r| r.header.contains(*name))
            })
            .collect();
        require(unexpected.is_empty(), || {
            format!(
                "Found unexpected field names [{}] in schema header: {}",
                unexpected.join(", "),
                value
            )
        })?;
    }

    for (name, field) in s.iter() {
        if !ctx.vocabulary.is_header_keyword(name) {
            header.open_content.push((name.to_string(), field.clone()));
        }
    }
    Ok(header)
}

fn read_import(vocabulary: &Vocabulary, value: &Element) -> Step<HeaderImport> {
    let Some(s) = value.as_struct() else {
        return invalid(format!("header import must be a non-null struct; was: {}", value));
    };
    require(s.iter().all(|(name, _)| vocabulary.is_import_keyword(name)), || {
        format!(
            "header import may only have the fields 'id', 'type' and 'as': {}",
            value
        )
    })?;
    require(value.annotations().is_empty(), || {
        format!("import struct may not have any annotations: {}", value)
    })?;
    let id = text_of(required_field(s, "id", Expect::Text, value)?);
    let type_name = optional_field(s, "type", Expect::Symbol)?.map(text_of);
    let alias = optional_field(s, "as", Expect::Symbol)?.map(text_of);
    match (type_name, alias) {
        (None, None) => Ok(HeaderImport::Wildcard { id }),
        (None, Some(_)) => invalid(format!("'as' only allowed when 'type' is present: {}", value)),
        (Some(type_name), alias) => Ok(HeaderImport::Type {
            id,
            type_name,
            alias,
        }),
    }
}

fn read_user_reserved_fields(vocabulary: &Vocabulary, header: &Struct) -> Step<UserReservedFields> {
    let Some(value) = optional_field(header, "user_reserved_fields", Expect::Struct)? else {
        return Ok(UserReservedFields::default());
    };
    let Some(s) = value.as_struct() else {
        return invalid("'user_reserved_fields' must be a non-null struct");
    };
    require(
        s.iter()
            .all(|(name, _)| matches!(name, "schema_header" | "type" | "schema_footer")),
        || {
            format!(
                "'user_reserved_fields' may only have the fields 'schema_header', 'type' and 'schema_footer': {}",
                value
            )
        },
    )?;
    require(value.annotations().is_empty(), || {
        "'user_reserved_fields' may not have any annotations".to_string()
    })?;
    Ok(UserReservedFields {
        header: reserved_list(s, "schema_header", |w| vocabulary.is_header_keyword(w))?,
        type_definition: reserved_list(s, "type", |w| vocabulary.is_type_keyword(w))?,
        footer: reserved_list(s, "schema_footer", |w| vocabulary.is_footer_keyword(w))?,
    })
}

fn reserved_list(
    s: &Struct,
    name: &str,
    is_keyword: impl Fn(&str) -> bool,
) -> Step<BTreeSet<String>> {
    let Some(list) = optional_field(s, name, Expect::List)? else {
        return Ok(BTreeSet::new());
    };
    let mut words = BTreeSet::new();
    for item in list.as_list().unwrap_or_default() {
        let Some(word) = item.as_symbol().filter(|_| item.annotations().is_empty()) else {
            return invalid(format!(
                "'{}' in 'user_reserved_fields' must be a list of unannotated symbols: {}",
                name, list
            ));
        };
        require(!is_keyword(word), || {
            format!(
                "Ion Schema 2.0 keyword '{}' may not be declared as a user reserved field",
                word
            )
        })?;
        words.insert(word.to_string());
    }
    Ok(words)
}
