//! Ion text reader.
//!
//! Recursive descent over the text, producing one [`Element`] per top-level
//! value. Covers the parts of Ion text that schema documents use: comments,
//! annotations, every scalar type, lists, s-expressions and structs.

use std::str::FromStr;

use base64::Engine;
use bigdecimal::BigDecimal;
use num_bigint::BigInt;

use super::{Element, IonType, Struct, Timestamp, Value};
use crate::error::IonSchemaError;

/// Limits applied while parsing untrusted text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseLimits {
    /// Maximum container nesting depth.
    pub max_depth: usize,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self { max_depth: 1024 }
    }
}

/// Parses a stream of Ion text values.
///
/// # Errors
///
/// Returns `IonSchemaError::Syntax` with the byte offset of the first problem.
pub fn parse(text: &str) -> Result<Vec<Element>, IonSchemaError> {
    parse_with_limits(text, ParseLimits::default())
}

/// Like [`parse`], with explicit limits.
pub fn parse_with_limits(text: &str, limits: ParseLimits) -> Result<Vec<Element>, IonSchemaError> {
    let mut parser = Parser {
        input: text,
        pos: 0,
        depth: 0,
        limits,
    };
    let mut values = Vec::new();
    loop {
        parser.skip_whitespace()?;
        if parser.at_end() {
            return Ok(values);
        }
        values.push(parser.parse_value(false)?);
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    depth: usize,
    limits: ParseLimits,
}

type ParseResult<T> = Result<T, IonSchemaError>;

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn is_operator_char(c: char) -> bool {
    "!#%&*+-./;<=>?@^`|~".contains(c)
}

/// Characters that may appear in a number or timestamp token.
fn is_numeric_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '+' | '-')
}

/// Exact value of decimal text such as `1.50`, `2.` or `15d-1`, keeping the
/// scale the text was written with.
fn parse_decimal(text: &str) -> Option<BigDecimal> {
    let (mantissa, exponent) = match text.find(['d', 'D']) {
        Some(at) => (&text[..at], text[at + 1..].parse::<i64>().ok()?),
        None => (text, 0),
    };
    let (whole, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let whole_digits = whole.strip_prefix('-').unwrap_or(whole);
    if whole_digits.is_empty()
        || !whole_digits.bytes().all(|b| b.is_ascii_digit())
        || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    let coefficient = BigInt::from_str(&format!("{}{}", whole, fraction)).ok()?;
    let scale = i64::try_from(fraction.len()).ok()?.checked_sub(exponent)?;
    Some(BigDecimal::new(coefficient, scale))
}

impl<'a> Parser<'a> {
    fn error<T>(&self, message: impl Into<String>) -> ParseResult<T> {
        Err(IonSchemaError::Syntax {
            offset: self.pos,
            message: message.into(),
        })
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn starts_with(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    fn expect(&mut self, c: char) -> ParseResult<()> {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            Ok(())
        } else {
            self.error(format!("expected '{}'", c))
        }
    }

    /// Skips whitespace and comments.
    fn skip_whitespace(&mut self) -> ParseResult<()> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_nth(1) == Some('/') => {
                    while let Some(c) = self.advance() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                Some('/') if self.peek_nth(1) == Some('*') => {
                    match self.rest()[2..].find("*/") {
                        Some(end) => self.pos += end + 4,
                        None => return self.error("unterminated block comment"),
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn enter(&mut self) -> ParseResult<()> {
        self.depth += 1;
        if self.depth > self.limits.max_depth {
            return self.error(format!(
                "nesting depth exceeds limit of {}",
                self.limits.max_depth
            ));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Parses annotations followed by a value.
    fn parse_value(&mut self, in_sexp: bool) -> ParseResult<Element> {
        let mut annotations = Vec::new();
        loop {
            self.skip_whitespace()?;
            let start = self.pos;
            if let Some(text) = self.try_symbol_token()? {
                self.skip_whitespace()?;
                if self.starts_with("::") {
                    self.pos += 2;
                    annotations.push(text);
                    continue;
                }
                self.pos = start;
            }
            break;
        }
        let value = self.parse_unannotated(in_sexp)?;
        Ok(Element::new(value).with_annotations(annotations))
    }

    /// Reads an identifier or quoted symbol if one starts here.
    fn try_symbol_token(&mut self) -> ParseResult<Option<String>> {
        match self.peek() {
            Some('\'') if !self.starts_with("'''") => self.parse_quoted('\'').map(Some),
            Some(c) if is_ident_start(c) => Ok(Some(self.read_identifier().to_string())),
            _ => Ok(None),
        }
    }

    fn read_identifier(&mut self) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.advance();
        }
        &self.input[start..self.pos]
    }

    fn parse_unannotated(&mut self, in_sexp: bool) -> ParseResult<Value> {
        let Some(c) = self.peek() else {
            return self.error("unexpected end of input");
        };
        match c {
            '{' if self.starts_with("{{") => self.parse_lob(),
            '{' => self.parse_struct(),
            '[' => self.parse_list(),
            '(' => self.parse_sexp(),
            '"' => Ok(Value::String(self.parse_quoted('"')?)),
            '\'' if self.starts_with("'''") => Ok(Value::String(self.parse_long_string()?)),
            '\'' => Ok(Value::Symbol(self.parse_quoted('\'')?)),
            '+' if self.keyword_follows("+inf") => {
                self.pos += 4;
                Ok(Value::Float(f64::INFINITY))
            }
            '-' if self.keyword_follows("-inf") => {
                self.pos += 4;
                Ok(Value::Float(f64::NEG_INFINITY))
            }
            c if c.is_ascii_digit() => self.parse_numeric(),
            '-' if self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) => self.parse_numeric(),
            c if is_ident_start(c) => self.parse_keyword_or_symbol(),
            c if in_sexp && is_operator_char(c) => {
                let start = self.pos;
                while self.peek().is_some_and(is_operator_char) {
                    self.advance();
                }
                Ok(Value::Symbol(self.input[start..self.pos].to_string()))
            }
            c => self.error(format!("unexpected character '{}'", c)),
        }
    }

    fn keyword_follows(&self, keyword: &str) -> bool {
        self.starts_with(keyword)
            && !self.rest()[keyword.len()..]
                .chars()
                .next()
                .is_some_and(is_ident_char)
    }

    fn parse_keyword_or_symbol(&mut self) -> ParseResult<Value> {
        let start = self.pos;
        let ident = self.read_identifier();
        match ident {
            "null" => {
                if self.peek() == Some('.') {
                    self.advance();
                    let type_name = self.read_identifier();
                    match IonType::from_name(type_name) {
                        Some(t) => Ok(Value::Null(t)),
                        None => {
                            self.pos = start;
                            self.error(format!("unknown null type '{}'", type_name))
                        }
                    }
                } else {
                    Ok(Value::Null(IonType::Null))
                }
            }
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            "nan" => Ok(Value::Float(f64::NAN)),
            _ => Ok(Value::Symbol(ident.to_string())),
        }
    }

    fn parse_numeric(&mut self) -> ParseResult<Value> {
        let start = self.pos;
        while self.peek().is_some_and(is_numeric_char) {
            self.advance();
        }
        let token = &self.input[start..self.pos];
        let offset = start;
        let fail = |message: String| IonSchemaError::Syntax { offset, message };

        let bytes = token.as_bytes();
        let looks_like_timestamp = bytes.len() >= 5
            && bytes[..4].iter().all(u8::is_ascii_digit)
            && matches!(bytes[4], b'-' | b'T');
        if looks_like_timestamp {
            return Timestamp::parse(token).map(Value::Timestamp).map_err(fail);
        }

        let cleaned = token.replace('_', "");
        let (negative, unsigned) = match cleaned.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, cleaned.as_str()),
        };
        let radix = if unsigned.starts_with("0x") || unsigned.starts_with("0X") {
            Some(16)
        } else if unsigned.starts_with("0b") || unsigned.starts_with("0B") {
            Some(2)
        } else {
            None
        };
        if let Some(radix) = radix {
            let magnitude = BigInt::parse_bytes(unsigned[2..].as_bytes(), radix)
                .ok_or_else(|| fail(format!("invalid int '{}'", token)))?;
            return Ok(Value::Int(if negative { -magnitude } else { magnitude }));
        }

        if unsigned.len() > 1 && unsigned.starts_with('0') && unsigned.as_bytes()[1].is_ascii_digit()
        {
            return Err(fail(format!("leading zeros are not allowed: {}", token)));
        }

        if cleaned.contains(['e', 'E']) {
            return cleaned
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| fail(format!("invalid float '{}': {}", token, e)));
        }
        if cleaned.contains(['d', 'D', '.']) {
            return parse_decimal(&cleaned)
                .map(Value::Decimal)
                .ok_or_else(|| fail(format!("invalid decimal '{}'", token)));
        }
        BigInt::from_str(&cleaned)
            .map(Value::Int)
            .map_err(|e| fail(format!("invalid int '{}': {}", token, e)))
    }

    /// Parses a short string or quoted symbol delimited by `quote`.
    fn parse_quoted(&mut self, quote: char) -> ParseResult<String> {
        self.expect(quote)?;
        let mut text = String::new();
        loop {
            match self.advance() {
                None => return self.error("unterminated string"),
                Some(c) if c == quote => return Ok(text),
                Some('\\') => self.parse_escape(&mut text)?,
                Some('\n') if quote == '"' => return self.error("newline in string"),
                Some(c) => text.push(c),
            }
        }
    }

    /// Parses one or more adjacent `'''` strings, concatenated.
    fn parse_long_string(&mut self) -> ParseResult<String> {
        let mut text = String::new();
        loop {
            self.pos += 3;
            loop {
                if self.starts_with("'''") {
                    self.pos += 3;
                    break;
                }
                match self.advance() {
                    None => return self.error("unterminated long string"),
                    Some('\\') => self.parse_escape(&mut text)?,
                    Some(c) => text.push(c),
                }
            }
            let end = self.pos;
            self.skip_whitespace()?;
            if !self.starts_with("'''") {
                self.pos = end;
                return Ok(text);
            }
        }
    }

    fn parse_escape(&mut self, text: &mut String) -> ParseResult<()> {
        let Some(c) = self.advance() else {
            return self.error("unterminated escape");
        };
        let unescaped = match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            'a' => '\u{07}',
            'b' => '\u{08}',
            'f' => '\u{0C}',
            'v' => '\u{0B}',
            '\\' | '"' | '\'' | '/' | '?' => c,
            '\n' => return Ok(()),
            'x' => self.parse_hex_escape(2)?,
            'u' => self.parse_hex_escape(4)?,
            'U' => self.parse_hex_escape(8)?,
            other => return self.error(format!("invalid escape '\\{}'", other)),
        };
        text.push(unescaped);
        Ok(())
    }

    fn parse_hex_escape(&mut self, len: usize) -> ParseResult<char> {
        let hex = self.rest().get(..len).unwrap_or("");
        let code = u32::from_str_radix(hex, 16).ok();
        match code.and_then(char::from_u32) {
            Some(c) if hex.len() == len => {
                self.pos += len;
                Ok(c)
            }
            _ => self.error(format!("invalid hex escape '{}'", hex)),
        }
    }

    fn parse_lob(&mut self) -> ParseResult<Value> {
        self.pos += 2;
        self.skip_whitespace()?;
        let value = if self.peek() == Some('"') {
            Value::Clob(self.parse_quoted('"')?.into_bytes())
        } else if self.starts_with("'''") {
            Value::Clob(self.parse_long_string()?.into_bytes())
        } else {
            let start = self.pos;
            let Some(len) = self.rest().find("}}") else {
                return self.error("unterminated blob");
            };
            let encoded: String = self.input[start..start + len]
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            self.pos = start + len;
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(encoded.as_bytes())
                .map_err(|e| IonSchemaError::Syntax {
                    offset: start,
                    message: format!("invalid base64 in blob: {}", e),
                })?;
            Value::Blob(bytes)
        };
        self.skip_whitespace()?;
        if !self.starts_with("}}") {
            return self.error("expected '}}'");
        }
        self.pos += 2;
        Ok(value)
    }

    fn parse_list(&mut self) -> ParseResult<Value> {
        self.enter()?;
        self.expect('[')?;
        let mut items = Vec::new();
        loop {
            self.skip_whitespace()?;
            if self.peek() == Some(']') {
                break;
            }
            items.push(self.parse_value(false)?);
            self.skip_whitespace()?;
            match self.peek() {
                Some(',') => {
                    self.advance();
                }
                Some(']') => break,
                _ => return self.error("expected ',' or ']' in list"),
            }
        }
        self.advance();
        self.leave();
        Ok(Value::List(items))
    }

    fn parse_sexp(&mut self) -> ParseResult<Value> {
        self.enter()?;
        self.expect('(')?;
        let mut items = Vec::new();
        loop {
            self.skip_whitespace()?;
            if self.peek() == Some(')') {
                break;
            }
            if self.at_end() {
                return self.error("unterminated s-expression");
            }
            items.push(self.parse_value(true)?);
        }
        self.advance();
        self.leave();
        Ok(Value::SExp(items))
    }

    fn parse_struct(&mut self) -> ParseResult<Value> {
        self.enter()?;
        self.expect('{')?;
        let mut fields = Struct::new();
        loop {
            self.skip_whitespace()?;
            if self.peek() == Some('}') {
                break;
            }
            let name = match self.peek() {
                Some('"') => self.parse_quoted('"')?,
                Some('\'') if self.starts_with("'''") => self.parse_long_string()?,
                Some('\'') => self.parse_quoted('\'')?,
                Some(c) if is_ident_start(c) => self.read_identifier().to_string(),
                _ => return self.error("expected field name"),
            };
            self.skip_whitespace()?;
            if self.starts_with("::") {
                return self.error("field names cannot be annotated");
            }
            self.expect(':')?;
            let value = self.parse_value(false)?;
            fields.push(name, value);
            self.skip_whitespace()?;
            match self.peek() {
                Some(',') => {
                    self.advance();
                }
                Some('}') => break,
                _ => return self.error("expected ',' or '}' in struct"),
            }
        }
        self.advance();
        self.leave();
        Ok(Value::Struct(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(text: &str) -> Element {
        let mut values = parse(text).unwrap();
        assert_eq!(values.len(), 1, "{}", text);
        values.remove(0)
    }

    #[test]
    fn scalars() {
        assert_eq!(one("null"), Element::null());
        assert_eq!(one("null.struct"), Element::typed_null(IonType::Struct));
        assert_eq!(one("true"), Element::bool(true));
        assert_eq!(one("-42"), Element::int(-42));
        assert_eq!(one("1_000"), Element::int(1000));
        assert_eq!(one("0x1F"), Element::int(31));
        assert_eq!(one("0b101"), Element::int(5));
        assert_eq!(one("1.50"), Element::decimal(BigDecimal::from_str("1.50").unwrap()));
        assert_eq!(one("2."), Element::decimal(BigDecimal::from(2)));
        assert_eq!(one("15d-1"), Element::decimal(BigDecimal::from_str("1.5").unwrap()));
        assert_eq!(one("1.5d2"), Element::decimal(BigDecimal::new(BigInt::from(15), -1)));
        assert_eq!(one("2.5e0"), Element::float(2.5));
        assert_eq!(one("+inf"), Element::float(f64::INFINITY));
        assert_eq!(one("nan"), Element::float(f64::NAN));
        assert_eq!(one("abc"), Element::symbol("abc"));
        assert_eq!(one("'a b'"), Element::symbol("a b"));
        assert_eq!(one("\"hi\\n\""), Element::string("hi\n"));
        assert_eq!(one("'''a''' '''b'''"), Element::string("ab"));
    }

    #[test]
    fn annotations() {
        let value = one("range::exclusive::5");
        assert_eq!(value.annotations(), ["range", "exclusive"]);
        assert_eq!(value.as_i64(), Some(5));

        let value = one("'quoted ann' :: [1]");
        assert_eq!(value.annotations(), ["quoted ann"]);
    }

    #[test]
    fn containers() {
        let value = one("{ name: foo, 'b': [1, 2,], \"c\": (a + b) }");
        let s = value.as_struct().unwrap();
        assert_eq!(s.get("name"), Some(&Element::symbol("foo")));
        assert_eq!(s.get("b").unwrap().as_list().unwrap().len(), 2);
        let sexp = s.get("c").unwrap().as_sequence().unwrap();
        assert_eq!(sexp[1], Element::symbol("+"));
    }

    #[test]
    fn comments_and_top_level_stream() {
        let values = parse("// header\n$ion_schema_2_0 /* block */ type::{ name: a }").unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0], Element::symbol("$ion_schema_2_0"));
        assert!(values[1].has_annotation("type"));
    }

    #[test]
    fn timestamps() {
        let value = one("2020-01-01T00:00Z");
        assert_eq!(value.ion_type(), IonType::Timestamp);
        let value = one("[2020T, 2021-02-03]");
        assert_eq!(value.as_list().unwrap()[1].ion_type(), IonType::Timestamp);
    }

    #[test]
    fn lobs() {
        assert_eq!(one("{{ aGVsbG8= }}"), Element::new(Value::Blob(b"hello".to_vec())));
        assert_eq!(one("{{\"hi\"}}"), Element::new(Value::Clob(b"hi".to_vec())));
    }

    #[test]
    fn numbers_are_not_truncated() {
        let big = one("18446744073709551616");
        assert_eq!(big.as_int(), Some(&(BigInt::from(u64::MAX) + 1)));
        assert_eq!(one("-0x1_0000_0000_0000_0000"), Element::int(-(BigInt::from(u64::MAX) + 1u32)));

        let wide = one("1.00000000000000000000000000001");
        assert_eq!(wide.to_string(), "1.00000000000000000000000000001");
        assert_ne!(wide, one("1.00000000000000000000000000002"));
    }

    #[test]
    fn reports_offset() {
        match parse("[1, 2") {
            Err(IonSchemaError::Syntax { offset, .. }) => assert_eq!(offset, 5),
            other => panic!("unexpected {:?}", other),
        }
        assert!(parse("{a 1}").is_err());
        assert!(parse("007").is_err());
    }

    #[test]
    fn enforces_depth_limit() {
        let deep = format!("{}{}", "[".repeat(10), "]".repeat(10));
        assert!(parse_with_limits(&deep, ParseLimits { max_depth: 10 }).is_ok());
        assert!(parse_with_limits(&deep, ParseLimits { max_depth: 9 }).is_err());
    }
}
