//! Integration tests for reading and writing schema documents.

use ion_schema::bag::Bag;
use ion_schema::element::{parse, Element};
use ion_schema::model::{Constraint, SchemaDocument, SchemaItem};
use ion_schema::range::{IntRange, Limit};
use ion_schema::reader::IonSchemaReader;
use ion_schema::vocabulary::IslVersion;
use ion_schema::writer::IonSchemaWriter;

fn read(text: &str) -> SchemaDocument {
    let values = parse(text).unwrap();
    match IonSchemaReader::new().read_schema(&values, false) {
        Ok(document) => document,
        Err(errors) => panic!("unexpected read errors: {:?}", errors),
    }
}

fn write(document: &SchemaDocument) -> Vec<Element> {
    let mut values = Vec::new();
    IonSchemaWriter::new()
        .write_schema(&mut values, document)
        .unwrap();
    values
}

fn round_trip(text: &str) {
    let document = read(text);
    let written = write(&document);
    let reread = IonSchemaReader::new()
        .read_schema(&written, false)
        .unwrap_or_else(|errors| panic!("written schema does not read back: {:?}", errors));
    assert_eq!(document, reread);
}

mod round_trip {
    use super::*;

    #[test]
    fn isl_2_0_document() {
        round_trip(
            r#"
            $ion_schema_2_0
            schema_header::{
                imports: [
                    { id: "common.isl" },
                    { id: "money.isl", type: amount },
                    { id: "money.isl", type: currency, as: ccy },
                ],
                user_reserved_fields: { type: [doc], schema_footer: [checksum] },
                _origin: "generated",
            }
            type::{
                name: order,
                doc: "An order",
                type: struct,
                fields: closed::{
                    id: { type: string, occurs: required, codepoint_length: range::[1, 64] },
                    lines: { type: list, element: distinct::line, container_length: range::[1, max] },
                    total: amount,
                    currency: $null_or::ccy,
                    note: { occurs: optional, type: string, regex: i::"no+te" },
                },
                annotations: closed::[draft, final],
            }
            type::{
                name: line,
                ordered_elements: [ symbol, { type: int, occurs: range::[0, 2] }, string ],
                contains: [1, 1, two],
            }
            type::{
                name: stamp,
                type: timestamp,
                timestamp_precision: range::[exclusive::year, day],
                timestamp_offset: ["+00:00", "-08:00"],
                valid_values: [range::[2020-01-01T, max], 1999-12-31T],
            }
            type::{
                name: measure,
                one_of: [ { type: float, ieee754_float: binary32 }, decimal, nothing ],
                not: { valid_values: [1, 2.5, "x", range::[exclusive::10, 20]] },
                precision: range::[1, 10],
                exponent: range::[-2, 0],
            }
            schema_footer::{ checksum: "abc", _extra: [1, 2] }
            "#,
        );
    }

    #[test]
    fn isl_1_0_document() {
        round_trip(
            r#"
            $ion_schema_1_0
            schema_header::{ imports: [{ id: "base.isl", type: t, as: u }] }
            type::{
                name: legacy,
                content: closed,
                fields: { a: { type: int, occurs: range::[1, 3] }, b: nullable::string },
                annotations: ordered::[required::a, b],
                byte_length: 10,
            }
            type::{ name: opaque, content: closed }
            schema_footer::{}
            "#,
        );
    }

    #[test]
    fn open_content_survives() {
        let document = read(
            r#"$ion_schema_2_0 { note: "top level" } type::{ name: a, _hint: 1, _hint: 1 }"#,
        );
        assert_eq!(document.open_content().count(), 1);
        let a = document.declared_types().next().unwrap();
        assert_eq!(a.definition.open_content.len(), 2);
        round_trip(r#"$ion_schema_2_0 { note: "top level" } type::{ name: a, _hint: 1, _hint: 1 }"#);
    }

    #[test]
    fn implicit_version() {
        let document = read("type::{ name: a, type: int }");
        assert_eq!(document.version, IslVersion::V1_0);
        let written = write(&document);
        assert_eq!(written[0], Element::symbol("$ion_schema_1_0"));
    }
}

mod multisets {
    use super::*;

    fn contains_of(text: &str) -> Bag<Element> {
        let document = read(text);
        let definition = &document.declared_types().next().unwrap().definition;
        definition
            .constraints
            .iter()
            .find_map(|c| match c {
                Constraint::Contains(values) => Some(values.clone()),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn order_does_not_matter() {
        assert_eq!(
            contains_of("$ion_schema_2_0 type::{ name: a, contains: [1, 2, 3] }"),
            contains_of("$ion_schema_2_0 type::{ name: a, contains: [3, 2, 1] }"),
        );
    }

    #[test]
    fn multiplicity_matters() {
        assert_ne!(
            contains_of("$ion_schema_2_0 type::{ name: a, contains: [1, 1, 2] }"),
            contains_of("$ion_schema_2_0 type::{ name: a, contains: [1, 2, 2] }"),
        );
        assert_ne!(
            contains_of("$ion_schema_2_0 type::{ name: a, contains: [1, 1, 2] }"),
            contains_of("$ion_schema_2_0 type::{ name: a, contains: [1, 2] }"),
        );
    }
}

mod aggregation {
    use super::*;

    const TWO_PROBLEMS: &str = r#"
        $ion_schema_2_0
        schema_header::{ imports: [5] }
        type::{ name: a, type: 5 }
        schema_footer::{}
    "#;

    #[test]
    fn all_errors_are_reported() {
        let values = parse(TWO_PROBLEMS).unwrap();
        let errors = IonSchemaReader::new()
            .read_schema(&values, false)
            .unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].path.to_string().starts_with("/1/imports/0"));
        assert!(errors[1].path.to_string().starts_with("/2"));
    }

    #[test]
    fn fail_fast_reports_one() {
        let values = parse(TWO_PROBLEMS).unwrap();
        let errors = IonSchemaReader::new()
            .read_schema(&values, true)
            .unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn or_throw_collapses_errors() {
        let values = parse(TWO_PROBLEMS).unwrap();
        let err = IonSchemaReader::new()
            .read_schema_or_throw(&values)
            .unwrap_err();
        assert!(matches!(
            err,
            ion_schema::IonSchemaError::InvalidIsl { ref errors } if errors.len() == 1
        ));
    }

    #[test]
    fn value_after_footer() {
        let values = parse("$ion_schema_2_0 schema_header::{} schema_footer::{} type::{ name: a }")
            .unwrap();
        let errors = IonSchemaReader::new()
            .read_schema(&values, false)
            .unwrap_err();
        assert!(errors[0].message.contains("after schema footer"));
    }
}

mod reserved_fields {
    use super::*;

    #[test]
    fn header_declarations_reach_the_footer() {
        let document = read(
            r#"$ion_schema_2_0
            schema_header::{ user_reserved_fields: { schema_footer: [foo] } }
            schema_footer::{ foo: 1 }"#,
        );
        let footer = document.footer().unwrap();
        assert_eq!(footer.open_content.len(), 1);
    }

    #[test]
    fn undeclared_footer_field_is_illegal() {
        let footer = parse("schema_footer::{ foo: 1 }").unwrap().remove(0);
        let errors = IonSchemaReader::new()
            .read_footer(&footer, false)
            .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("foo"));
    }

    #[test]
    fn undeclared_type_field_is_illegal() {
        let values = parse("$ion_schema_2_0 type::{ name: a, doc: \"x\" }").unwrap();
        let errors = IonSchemaReader::new()
            .read_schema(&values, false)
            .unwrap_err();
        assert!(errors[0].message.contains("unexpected field name 'doc'"));
    }

    #[test]
    fn isl_1_0_has_no_reserved_words() {
        let document = read("$ion_schema_1_0 type::{ name: a, doc: \"x\" }");
        let a = document.declared_types().next().unwrap();
        assert_eq!(a.definition.open_content.len(), 1);
        assert!(matches!(document.items[0], SchemaItem::Type(_)));
    }
}

mod ranges {
    use super::*;

    #[test]
    fn empty_integer_range_is_rejected() {
        assert!(IntRange::new(Limit::Open(5), Limit::Closed(6)).is_err());
        assert!(IntRange::new(Limit::Closed(6), Limit::Closed(5)).is_err());
    }

    #[test]
    fn single_value_range() {
        let range = IntRange::new(Limit::Closed(5), Limit::Closed(5)).unwrap();
        assert!(range.contains(5));
        assert!(!range.contains(4));
    }

    #[test]
    fn exclusive_unbounded_is_rejected() {
        let values = parse("$ion_schema_2_0 type::{ name: a, container_length: range::[exclusive::min, 5] }")
            .unwrap();
        assert!(IonSchemaReader::new().read_schema(&values, false).is_err());
    }

    #[test]
    fn reader_rejects_empty_ranges() {
        let values =
            parse("$ion_schema_2_0 type::{ name: a, container_length: range::[exclusive::5, exclusive::6] }")
                .unwrap();
        let errors = IonSchemaReader::new()
            .read_schema(&values, false)
            .unwrap_err();
        assert_eq!(errors.len(), 1);
    }
}
