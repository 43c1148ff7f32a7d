//! Ion text writer.

use std::fmt::{self, Write};

use base64::Engine;
use bigdecimal::BigDecimal;
use num_bigint::Sign;

use super::{Element, Value};

const KEYWORDS: &[&str] = &["null", "true", "false", "nan"];

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$') && !KEYWORDS.contains(&text)
}

fn write_escaped(f: &mut fmt::Formatter<'_>, text: &str, quote: char) -> fmt::Result {
    f.write_char(quote)?;
    for c in text.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            c if c == quote => write!(f, "\\{}", c)?,
            c if c.is_control() => write!(f, "\\u{:04x}", c as u32)?,
            c => f.write_char(c)?,
        }
    }
    f.write_char(quote)
}

/// Writes symbol text, quoting it unless it is a plain identifier.
pub(crate) fn write_symbol(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    if is_identifier(text) {
        f.write_str(text)
    } else {
        write_escaped(f, text, '\'')
    }
}

fn write_float(f: &mut fmt::Formatter<'_>, value: f64) -> fmt::Result {
    if value.is_nan() {
        f.write_str("nan")
    } else if value.is_infinite() {
        f.write_str(if value > 0.0 { "+inf" } else { "-inf" })
    } else {
        write!(f, "{:e}", value)
    }
}

fn write_sequence(
    f: &mut fmt::Formatter<'_>,
    items: &[Element],
    open: &str,
    separator: &str,
    close: &str,
) -> fmt::Result {
    f.write_str(open)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{}", item)?;
    }
    f.write_str(close)
}

/// Writes the coefficient and scale exactly: `1.50`, `2d0` or `15d1`.
fn write_decimal(f: &mut fmt::Formatter<'_>, value: &BigDecimal) -> fmt::Result {
    let (coefficient, scale) = value.as_bigint_and_exponent();
    if scale <= 0 {
        return write!(f, "{}d{}", coefficient, -scale);
    }
    if coefficient.sign() == Sign::Minus {
        f.write_char('-')?;
    }
    let digits = coefficient.magnitude().to_string();
    let scale = usize::try_from(scale).map_err(|_| fmt::Error)?;
    if digits.len() > scale {
        let (whole, fraction) = digits.split_at(digits.len() - scale);
        write!(f, "{}.{}", whole, fraction)
    } else {
        write!(f, "0.{}{}", "0".repeat(scale - digits.len()), digits)
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for annotation in self.annotations() {
            write_symbol(f, annotation)?;
            f.write_str("::")?;
        }
        match self.value() {
            Value::Null(t) if *t == super::IonType::Null => f.write_str("null"),
            Value::Null(t) => write!(f, "null.{}", t),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write_float(f, *x),
            Value::Decimal(d) => write_decimal(f, d),
            Value::Timestamp(t) => write!(f, "{}", t),
            Value::Symbol(s) => write_symbol(f, s),
            Value::String(s) => write_escaped(f, s, '"'),
            Value::Clob(bytes) => {
                f.write_str("{{\"")?;
                for b in bytes {
                    match b {
                        b'"' => f.write_str("\\\"")?,
                        b'\\' => f.write_str("\\\\")?,
                        0x20..=0x7e => f.write_char(*b as char)?,
                        _ => write!(f, "\\x{:02x}", b)?,
                    }
                }
                f.write_str("\"}}")
            }
            Value::Blob(bytes) => write!(
                f,
                "{{{{{}}}}}",
                base64::engine::general_purpose::STANDARD.encode(bytes)
            ),
            Value::List(items) => write_sequence(f, items, "[", ", ", "]"),
            Value::SExp(items) => write_sequence(f, items, "(", " ", ")"),
            Value::Struct(fields) => {
                f.write_char('{')?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_symbol(f, name)?;
                    write!(f, ": {}", value)?;
                }
                f.write_char('}')
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{parse, Struct};
    use super::*;

    fn reparse(element: &Element) -> Element {
        let mut values = parse(&element.to_string()).unwrap();
        assert_eq!(values.len(), 1);
        values.remove(0)
    }

    #[test]
    fn quotes_symbols_when_needed() {
        assert_eq!(Element::symbol("abc").to_string(), "abc");
        assert_eq!(Element::symbol("a b").to_string(), "'a b'");
        assert_eq!(Element::symbol("null").to_string(), "'null'");
        assert_eq!(Element::symbol("1a").to_string(), "'1a'");
    }

    #[test]
    fn writes_annotated_containers() {
        let element = Element::list(vec![Element::int(1).with_annotations(["exclusive"])])
            .with_annotations(["range"]);
        assert_eq!(element.to_string(), "range::[exclusive::1]");

        let element = Element::structure(Struct::new().with_field("a b", Element::string("x\"y")));
        assert_eq!(element.to_string(), "{'a b': \"x\\\"y\"}");
    }

    #[test]
    fn decimals_keep_their_scale() {
        let decimal =
            |digits: i64, scale: i64| Element::decimal(BigDecimal::new(digits.into(), scale)).to_string();
        assert_eq!(decimal(150, 2), "1.50");
        assert_eq!(decimal(-5, 3), "-0.005");
        assert_eq!(decimal(2, 0), "2d0");
        assert_eq!(decimal(15, -1), "15d1");
        assert_eq!(decimal(1, 30), format!("0.{}1", "0".repeat(29)));
    }

    #[test]
    fn output_parses_back() {
        let text = "type::{name: t, values: [1, 2.50, 3d0, 4.5e0, null.int, true, \
                    2020-01-01T00:00Z, 'x y', \"s\\tq\", (a b), nan, -inf, {{aGk=}}, {{\"c\"}}]}";
        let element = parse(text).unwrap().remove(0);
        assert_eq!(reparse(&element), element);
    }
}
