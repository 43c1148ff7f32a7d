//! Constraint variants and their payloads.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::bag::Bag;
use crate::element::Element;
use crate::error::IonSchemaError;
use crate::range::{IntRange, Limit, NumberRange, TimestampPrecisionRange, TimestampRange};
use crate::vocabulary::IslVersion;

use super::{TypeArgument, TypeDefinition, VariablyOccurringTypeArgument};

/// One restriction inside a type definition.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    AllOf(Vec<TypeArgument>),
    AnyOf(Vec<TypeArgument>),
    OneOf(Vec<TypeArgument>),
    Type(TypeArgument),
    Not(TypeArgument),
    Element {
        type_argument: TypeArgument,
        distinct: bool,
    },
    FieldNames {
        type_argument: TypeArgument,
        distinct: bool,
    },
    Fields {
        fields: BTreeMap<String, VariablyOccurringTypeArgument>,
        closed: bool,
    },
    OrderedElements(Vec<VariablyOccurringTypeArgument>),
    AnnotationsV1 {
        annotations: Vec<AnnotationV1>,
        closed: bool,
        ordered: bool,
    },
    AnnotationsV2(AnnotationsV2),
    Contains(Bag<Element>),
    Regex(RegexConstraint),
    ValidValues(Bag<ValidValue>),
    TimestampPrecision(TimestampPrecisionRange),
    TimestampOffset(Vec<TimestampOffsetValue>),
    Ieee754Float(Ieee754Format),
    /// Every constraint whose argument is a range of integers.
    DiscreteRange(DiscreteRangeConstraint),
}

impl Constraint {
    /// The field name the constraint is written under.
    pub fn name(&self) -> &'static str {
        match self {
            Constraint::AllOf(_) => "all_of",
            Constraint::AnyOf(_) => "any_of",
            Constraint::OneOf(_) => "one_of",
            Constraint::Type(_) => "type",
            Constraint::Not(_) => "not",
            Constraint::Element { .. } => "element",
            Constraint::FieldNames { .. } => "field_names",
            Constraint::Fields { .. } => "fields",
            Constraint::OrderedElements(_) => "ordered_elements",
            Constraint::AnnotationsV1 { .. } | Constraint::AnnotationsV2(_) => "annotations",
            Constraint::Contains(_) => "contains",
            Constraint::Regex(_) => "regex",
            Constraint::ValidValues(_) => "valid_values",
            Constraint::TimestampPrecision(_) => "timestamp_precision",
            Constraint::TimestampOffset(_) => "timestamp_offset",
            Constraint::Ieee754Float(_) => "ieee754_float",
            Constraint::DiscreteRange(c) => c.kind.field_name(),
        }
    }

    /// Type arguments nested directly in this constraint.
    pub fn type_arguments(&self) -> Vec<&TypeArgument> {
        match self {
            Constraint::AllOf(args) | Constraint::AnyOf(args) | Constraint::OneOf(args) => {
                args.iter().collect()
            }
            Constraint::Type(arg) | Constraint::Not(arg) => vec![arg],
            Constraint::Element { type_argument, .. }
            | Constraint::FieldNames { type_argument, .. } => vec![type_argument],
            Constraint::Fields { fields, .. } => {
                fields.values().map(|v| &v.type_argument).collect()
            }
            Constraint::OrderedElements(args) => args.iter().map(|v| &v.type_argument).collect(),
            Constraint::AnnotationsV2(AnnotationsV2::Standard(arg)) => vec![arg],
            _ => Vec::new(),
        }
    }
}

/// An ISL 1.0 annotation entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationV1 {
    pub text: String,
    pub required: bool,
}

/// The ISL 2.0 `annotations` constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationsV2 {
    /// The annotations, as a list of symbols, must match a type.
    Standard(TypeArgument),
    /// `closed::[a, b]` and friends.
    Simplified {
        modifier: AnnotationsModifier,
        annotations: BTreeSet<String>,
    },
}

impl AnnotationsV2 {
    /// Expands the simplified syntax into the equivalent type argument.
    ///
    /// `closed` restricts every annotation to the listed symbols and
    /// `required` demands that each of them is present.
    pub fn to_standard(&self) -> TypeArgument {
        match self {
            AnnotationsV2::Standard(arg) => arg.clone(),
            AnnotationsV2::Simplified {
                modifier,
                annotations,
            } => {
                let symbols = || annotations.iter().map(Element::symbol);
                let mut definition = TypeDefinition::new();
                if modifier.is_closed() {
                    let values = symbols().map(ValidValue::Value).collect();
                    let element = TypeDefinition::new().with_constraint(Constraint::ValidValues(values));
                    definition.constraints.push(Constraint::Element {
                        type_argument: TypeArgument::inline(element),
                        distinct: false,
                    });
                }
                if modifier.is_required() {
                    definition
                        .constraints
                        .push(Constraint::Contains(symbols().collect()));
                }
                TypeArgument::inline(definition)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationsModifier {
    Closed,
    Required,
    ClosedAndRequired,
}

impl AnnotationsModifier {
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed | Self::ClosedAndRequired)
    }

    pub fn is_required(&self) -> bool {
        matches!(self, Self::Required | Self::ClosedAndRequired)
    }

    /// The list annotations that spell this modifier.
    pub fn annotations(&self) -> &'static [&'static str] {
        match self {
            Self::Closed => &["closed"],
            Self::Required => &["required"],
            Self::ClosedAndRequired => &["closed", "required"],
        }
    }
}

/// A compiled `regex` constraint. Equality ignores the compiled form.
#[derive(Debug, Clone)]
pub struct RegexConstraint {
    pattern: String,
    case_insensitive: bool,
    multiline: bool,
    compiled: regex::Regex,
}

impl RegexConstraint {
    /// # Errors
    ///
    /// Fails when the pattern uses syntax outside the portable subset of the
    /// given ISL version.
    pub fn new(
        pattern: impl Into<String>,
        case_insensitive: bool,
        multiline: bool,
        version: IslVersion,
    ) -> Result<Self, IonSchemaError> {
        let pattern = pattern.into();
        let translated = super::translate_regex(&pattern, version)?;
        let compiled = regex::RegexBuilder::new(&translated)
            .case_insensitive(case_insensitive)
            .multi_line(multiline)
            .build()
            .map_err(|e| IonSchemaError::invalid(format!("invalid regex '{}': {}", pattern, e)))?;
        Ok(Self {
            pattern,
            case_insensitive,
            multiline,
            compiled,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    pub fn multiline(&self) -> bool {
        self.multiline
    }

    /// Whether the pattern matches anywhere in `text`.
    pub fn is_match(&self, text: &str) -> bool {
        self.compiled.is_match(text)
    }
}

impl PartialEq for RegexConstraint {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
            && self.case_insensitive == other.case_insensitive
            && self.multiline == other.multiline
    }
}

/// One entry of `valid_values`.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidValue {
    /// An unannotated scalar or container, matched by equivalence.
    Value(Element),
    NumberRange(NumberRange),
    TimestampRange(TimestampRange),
}

impl ValidValue {
    /// Whether `value` is this value or falls inside this range.
    pub fn accepts(&self, value: &Element) -> bool {
        match self {
            ValidValue::Value(expected) => expected == &value.without_annotations(),
            ValidValue::NumberRange(range) => range.contains_element(value),
            ValidValue::TimestampRange(range) => {
                !value.is_null() && value.as_timestamp().is_some_and(|t| range.contains(t))
            }
        }
    }
}

/// An entry of `timestamp_offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TimestampOffsetValue {
    /// `-00:00`
    Unknown,
    /// Offset from UTC in minutes.
    Known(i32),
}

impl TimestampOffsetValue {
    /// Parses `+hh:mm` or `-hh:mm`.
    pub fn parse(text: &str) -> Result<Self, IonSchemaError> {
        let invalid = || {
            IonSchemaError::invalid(format!(
                "invalid timestamp offset '{}'; must be of the form [+|-]hh:mm",
                text
            ))
        };
        let bytes = text.as_bytes();
        if bytes.len() != 6 || bytes[3] != b':' {
            return Err(invalid());
        }
        let sign = match bytes[0] {
            b'+' => 1,
            b'-' => -1,
            _ => return Err(invalid()),
        };
        let number = |range: std::ops::Range<usize>| -> Option<i32> {
            let digits = text.get(range)?;
            if digits.bytes().all(|b| b.is_ascii_digit()) {
                digits.parse().ok()
            } else {
                None
            }
        };
        let hours = number(1..3).ok_or_else(invalid)?;
        let minutes = number(4..6).ok_or_else(invalid)?;
        if hours > 23 || minutes > 59 {
            return Err(invalid());
        }
        if text == "-00:00" {
            return Ok(TimestampOffsetValue::Unknown);
        }
        Ok(TimestampOffsetValue::Known(sign * (hours * 60 + minutes)))
    }

    /// Whether a timestamp offset (`None` for unknown) is this offset.
    pub fn matches(&self, offset_minutes: Option<i32>) -> bool {
        match self {
            TimestampOffsetValue::Unknown => offset_minutes.is_none(),
            TimestampOffsetValue::Known(minutes) => offset_minutes == Some(*minutes),
        }
    }
}

impl fmt::Display for TimestampOffsetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimestampOffsetValue::Unknown => f.write_str("-00:00"),
            TimestampOffsetValue::Known(minutes) => {
                let sign = if *minutes < 0 { '-' } else { '+' };
                let minutes = minutes.abs();
                write!(f, "{}{:02}:{:02}", sign, minutes / 60, minutes % 60)
            }
        }
    }
}

/// Argument of `ieee754_float`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ieee754Format {
    Binary16,
    Binary32,
    Binary64,
}

impl Ieee754Format {
    pub fn symbol_text(&self) -> &'static str {
        match self {
            Ieee754Format::Binary16 => "binary16",
            Ieee754Format::Binary32 => "binary32",
            Ieee754Format::Binary64 => "binary64",
        }
    }

    pub fn from_symbol_text(text: &str) -> Option<Self> {
        match text {
            "binary16" => Some(Ieee754Format::Binary16),
            "binary32" => Some(Ieee754Format::Binary32),
            "binary64" => Some(Ieee754Format::Binary64),
            _ => None,
        }
    }
}

/// Which integer-range constraint a [`DiscreteRangeConstraint`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiscreteRangeKind {
    ByteLength,
    CodepointLength,
    ContainerLength,
    Utf8ByteLength,
    Precision,
    /// ISL 1.0 only; ISL 2.0 replaced it with `exponent`.
    Scale,
    Exponent,
}

impl DiscreteRangeKind {
    pub const ALL: [DiscreteRangeKind; 7] = [
        Self::ByteLength,
        Self::CodepointLength,
        Self::ContainerLength,
        Self::Utf8ByteLength,
        Self::Precision,
        Self::Scale,
        Self::Exponent,
    ];

    pub fn field_name(&self) -> &'static str {
        match self {
            Self::ByteLength => "byte_length",
            Self::CodepointLength => "codepoint_length",
            Self::ContainerLength => "container_length",
            Self::Utf8ByteLength => "utf8_byte_length",
            Self::Precision => "precision",
            Self::Scale => "scale",
            Self::Exponent => "exponent",
        }
    }

    pub fn from_field_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.field_name() == name)
    }

    /// Lengths count things, so they can't be negative.
    pub fn is_length(&self) -> bool {
        matches!(
            self,
            Self::ByteLength | Self::CodepointLength | Self::ContainerLength | Self::Utf8ByteLength
        )
    }
}

/// A constraint over one integer property of a value, like its length.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscreteRangeConstraint {
    kind: DiscreteRangeKind,
    range: IntRange,
}

impl DiscreteRangeConstraint {
    /// # Errors
    ///
    /// Lengths must not go below zero and `precision` must not go below one.
    pub fn new(kind: DiscreteRangeKind, range: IntRange) -> Result<Self, IonSchemaError> {
        let minimum = match kind {
            k if k.is_length() => Some(0),
            DiscreteRangeKind::Precision => Some(1),
            _ => None,
        };
        if let Some(minimum) = minimum {
            let lowest = match range.start() {
                Limit::Unbounded => None,
                Limit::Closed(v) => Some(*v),
                Limit::Open(v) => v.checked_add(1),
            };
            if lowest.map_or(true, |v| v < minimum) {
                return Err(IonSchemaError::invalid(format!(
                    "{} range must not include values below {}: {}",
                    kind.field_name(),
                    minimum,
                    range
                )));
            }
        }
        Ok(Self { kind, range })
    }

    pub fn kind(&self) -> DiscreteRangeKind {
        self.kind
    }

    pub fn range(&self) -> &IntRange {
        &self.range
    }
}
