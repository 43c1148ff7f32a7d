//! In-memory Ion value tree.
//!
//! Schemas are themselves Ion data. This module holds the generic tree that the
//! schema reader consumes and the writer produces: containers, scalars, field
//! names and type annotations. Ion text is read with [`parse`] and written with
//! the `Display` implementation of [`Element`].

mod parser;
mod text;
mod timestamp;

use std::fmt;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

pub use parser::{parse, parse_with_limits, ParseLimits};
pub use timestamp::{Timestamp, TimestampPrecision};

/// Type of an Ion value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IonType {
    Null,
    Bool,
    Int,
    Float,
    Decimal,
    Timestamp,
    Symbol,
    String,
    Clob,
    Blob,
    List,
    SExp,
    Struct,
}

impl IonType {
    /// Name as used in Ion text, e.g. in `null.struct`.
    pub fn name(&self) -> &'static str {
        match self {
            IonType::Null => "null",
            IonType::Bool => "bool",
            IonType::Int => "int",
            IonType::Float => "float",
            IonType::Decimal => "decimal",
            IonType::Timestamp => "timestamp",
            IonType::Symbol => "symbol",
            IonType::String => "string",
            IonType::Clob => "clob",
            IonType::Blob => "blob",
            IonType::List => "list",
            IonType::SExp => "sexp",
            IonType::Struct => "struct",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let ion_type = match name {
            "null" => IonType::Null,
            "bool" => IonType::Bool,
            "int" => IonType::Int,
            "float" => IonType::Float,
            "decimal" => IonType::Decimal,
            "timestamp" => IonType::Timestamp,
            "symbol" => IonType::Symbol,
            "string" => IonType::String,
            "clob" => IonType::Clob,
            "blob" => IonType::Blob,
            "list" => IonType::List,
            "sexp" => IonType::SExp,
            "struct" => IonType::Struct,
            _ => return None,
        };
        Some(ion_type)
    }
}

impl fmt::Display for IonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Content of an Ion value, without its annotations.
#[derive(Debug, Clone)]
pub enum Value {
    /// A null of the given type; `IonType::Null` for plain `null`.
    Null(IonType),
    Bool(bool),
    Int(BigInt),
    Float(f64),
    /// Coefficient and scale are both kept, so `1.0` and `1.00` differ.
    Decimal(BigDecimal),
    Timestamp(Timestamp),
    Symbol(String),
    String(String),
    Clob(Vec<u8>),
    Blob(Vec<u8>),
    List(Vec<Element>),
    SExp(Vec<Element>),
    Struct(Struct),
}

impl Value {
    pub fn ion_type(&self) -> IonType {
        match self {
            Value::Null(t) => *t,
            Value::Bool(_) => IonType::Bool,
            Value::Int(_) => IonType::Int,
            Value::Float(_) => IonType::Float,
            Value::Decimal(_) => IonType::Decimal,
            Value::Timestamp(_) => IonType::Timestamp,
            Value::Symbol(_) => IonType::Symbol,
            Value::String(_) => IonType::String,
            Value::Clob(_) => IonType::Clob,
            Value::Blob(_) => IonType::Blob,
            Value::List(_) => IonType::List,
            Value::SExp(_) => IonType::SExp,
            Value::Struct(_) => IonType::Struct,
        }
    }
}

// Ion equivalence: decimal precision is significant and nan equals nan.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null(a), Value::Null(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => {
                a.to_bits() == b.to_bits() || (a.is_nan() && b.is_nan())
            }
            (Value::Decimal(a), Value::Decimal(b)) => {
                a.as_bigint_and_exponent() == b.as_bigint_and_exponent()
            }
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Clob(a), Value::Clob(b)) => a == b,
            (Value::Blob(a), Value::Blob(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::SExp(a), Value::SExp(b)) => a == b,
            (Value::Struct(a), Value::Struct(b)) => a == b,
            _ => false,
        }
    }
}

/// An annotated Ion value.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    annotations: Vec<String>,
    value: Value,
}

impl Element {
    pub fn new(value: Value) -> Self {
        Self {
            annotations: Vec::new(),
            value,
        }
    }

    /// Replaces the annotations of this value.
    pub fn with_annotations<I, S>(mut self, annotations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.annotations = annotations.into_iter().map(Into::into).collect();
        self
    }

    pub fn null() -> Self {
        Self::new(Value::Null(IonType::Null))
    }

    pub fn typed_null(ion_type: IonType) -> Self {
        Self::new(Value::Null(ion_type))
    }

    pub fn bool(value: bool) -> Self {
        Self::new(Value::Bool(value))
    }

    pub fn int(value: impl Into<BigInt>) -> Self {
        Self::new(Value::Int(value.into()))
    }

    pub fn float(value: f64) -> Self {
        Self::new(Value::Float(value))
    }

    pub fn decimal(value: BigDecimal) -> Self {
        Self::new(Value::Decimal(value))
    }

    pub fn timestamp(value: Timestamp) -> Self {
        Self::new(Value::Timestamp(value))
    }

    pub fn symbol(text: impl Into<String>) -> Self {
        Self::new(Value::Symbol(text.into()))
    }

    pub fn string(text: impl Into<String>) -> Self {
        Self::new(Value::String(text.into()))
    }

    pub fn list(items: Vec<Element>) -> Self {
        Self::new(Value::List(items))
    }

    pub fn sexp(items: Vec<Element>) -> Self {
        Self::new(Value::SExp(items))
    }

    pub fn structure(fields: Struct) -> Self {
        Self::new(Value::Struct(fields))
    }

    pub fn annotations(&self) -> &[String] {
        &self.annotations
    }

    pub fn has_annotation(&self, annotation: &str) -> bool {
        self.annotations.iter().any(|a| a == annotation)
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn ion_type(&self) -> IonType {
        self.value.ion_type()
    }

    pub fn is_null(&self) -> bool {
        matches!(self.value, Value::Null(_))
    }

    /// A copy of this value without its annotations.
    pub fn without_annotations(&self) -> Self {
        Self::new(self.value.clone())
    }

    pub fn as_struct(&self) -> Option<&Struct> {
        match &self.value {
            Value::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Element]> {
        match &self.value {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Items of a non-null list or s-expression.
    pub fn as_sequence(&self) -> Option<&[Element]> {
        match &self.value {
            Value::List(items) | Value::SExp(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match &self.value {
            Value::Symbol(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match &self.value {
            Value::String(text) => Some(text),
            _ => None,
        }
    }

    /// Text of a non-null symbol or string.
    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            Value::Symbol(text) | Value::String(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<&BigInt> {
        match &self.value {
            Value::Int(i) => Some(i),
            _ => None,
        }
    }

    /// The int value, if it is one and fits an `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        self.as_int().and_then(ToPrimitive::to_i64)
    }

    pub fn as_decimal(&self) -> Option<&BigDecimal> {
        match &self.value {
            Value::Decimal(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.value {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<&Timestamp> {
        match &self.value {
            Value::Timestamp(t) => Some(t),
            _ => None,
        }
    }
}

impl From<Value> for Element {
    fn from(value: Value) -> Self {
        Element::new(value)
    }
}

/// Fields of an Ion struct.
///
/// Field order is kept for iteration and printing, and a name may occur more
/// than once. Equality ignores field order.
#[derive(Debug, Clone, Default)]
pub struct Struct {
    fields: Vec<(String, Element)>,
}

impl Struct {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: Element) {
        self.fields.push((name.into(), value));
    }

    /// Builder-style [`Struct::push`].
    pub fn with_field(mut self, name: impl Into<String>, value: Element) -> Self {
        self.push(name, value);
        self
    }

    /// First value of the field `name`.
    pub fn get(&self, name: &str) -> Option<&Element> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Every value of the field `name`, in order.
    pub fn get_all(&self, name: &str) -> Vec<&Element> {
        self.fields
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v)
            .collect()
    }

    pub fn contains_field(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, _)| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Element)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl PartialEq for Struct {
    fn eq(&self, other: &Self) -> bool {
        let ours: crate::bag::Bag<&(String, Element)> = self.fields.iter().collect();
        let theirs: crate::bag::Bag<&(String, Element)> = other.fields.iter().collect();
        ours == theirs
    }
}

impl FromIterator<(String, Element)> for Struct {
    fn from_iter<I: IntoIterator<Item = (String, Element)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Struct {
    type Item = (String, Element);
    type IntoIter = std::vec::IntoIter<(String, Element)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn struct_equality_ignores_field_order() {
        let a = Struct::new()
            .with_field("a", Element::int(1))
            .with_field("b", Element::int(2));
        let b = Struct::new()
            .with_field("b", Element::int(2))
            .with_field("a", Element::int(1));
        assert_eq!(a, b);
    }

    #[test]
    fn struct_equality_counts_repeated_fields() {
        let a = Struct::new()
            .with_field("a", Element::int(1))
            .with_field("a", Element::int(1));
        let b = Struct::new().with_field("a", Element::int(1));
        assert_ne!(a, b);
    }

    #[test]
    fn decimal_precision_is_significant() {
        let one = Element::decimal(BigDecimal::from_str("1.0").unwrap());
        let one_more_precise = Element::decimal(BigDecimal::from_str("1.00").unwrap());
        assert_ne!(one, one_more_precise);
        assert_eq!(one, Element::decimal(BigDecimal::from_str("1.0").unwrap()));
    }

    #[test]
    fn wide_numbers_keep_every_digit() {
        let a = BigDecimal::from_str("1.00000000000000000000000000001").unwrap();
        let b = BigDecimal::from_str("1.00000000000000000000000000002").unwrap();
        assert_ne!(Element::decimal(a), Element::decimal(b));

        let big = Element::int(BigInt::from(u64::MAX) + 1);
        assert_eq!(big.as_i64(), None);
        assert_eq!(big.as_int().map(ToString::to_string).as_deref(), Some("18446744073709551616"));
    }

    #[test]
    fn nan_equals_nan() {
        assert_eq!(Element::float(f64::NAN), Element::float(f64::NAN));
        assert_ne!(Element::float(0.0), Element::float(-0.0));
    }

    #[test]
    fn annotations_are_part_of_equality() {
        let plain = Element::symbol("a");
        let annotated = Element::symbol("a").with_annotations(["x"]);
        assert_ne!(plain, annotated);
        assert_eq!(plain, annotated.without_annotations());
    }

    #[test]
    fn typed_nulls_are_distinct() {
        assert_ne!(Element::null(), Element::typed_null(IonType::Struct));
        assert!(Element::typed_null(IonType::Int).is_null());
        assert_eq!(Element::typed_null(IonType::Int).ion_type(), IonType::Int);
    }
}
