//! Intervals over ordered domains.
//!
//! A [`Range`] is a pair of [`Limit`]s checked on construction, so a range
//! that exists is never empty. The specialized ranges wrap it for the domains
//! schemas constrain: integers ([`IntRange`]), numbers of any representation
//! ([`NumberRange`]), instants ([`TimestampRange`]) and timestamp precisions
//! ([`TimestampPrecisionRange`]).

use std::cmp::Ordering;
use std::fmt;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;

use crate::element::{Element, Timestamp, TimestampPrecision, Value};
use crate::error::IonSchemaError;

/// One end of a range.
#[derive(Debug, Clone, PartialEq)]
pub enum Limit<T> {
    /// No limit on this side (`min` or `max`).
    Unbounded,
    /// Inclusive of the value.
    Closed(T),
    /// Exclusive of the value.
    Open(T),
}

impl<T> Limit<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Limit::Unbounded => None,
            Limit::Closed(v) | Limit::Open(v) => Some(v),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Limit::Open(_))
    }

    pub fn as_ref(&self) -> Limit<&T> {
        match self {
            Limit::Unbounded => Limit::Unbounded,
            Limit::Closed(v) => Limit::Closed(v),
            Limit::Open(v) => Limit::Open(v),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Limit<U> {
        match self {
            Limit::Unbounded => Limit::Unbounded,
            Limit::Closed(v) => Limit::Closed(f(v)),
            Limit::Open(v) => Limit::Open(f(v)),
        }
    }
}

/// A non-empty interval.
#[derive(Debug, Clone, PartialEq)]
pub struct Range<T> {
    start: Limit<T>,
    end: Limit<T>,
}

impl<T: PartialOrd + fmt::Display> Range<T> {
    /// # Errors
    ///
    /// Fails when both ends are unbounded, when the lower bound is above the
    /// upper bound, or when an exclusive bound leaves no value in between.
    pub fn new(start: Limit<T>, end: Limit<T>) -> Result<Self, IonSchemaError> {
        if start == Limit::Unbounded && end == Limit::Unbounded {
            return Err(IonSchemaError::invalid(
                "range may not be unbounded at both ends",
            ));
        }
        if let (Some(lo), Some(hi)) = (start.value(), end.value()) {
            match lo.partial_cmp(hi) {
                None => {
                    return Err(IonSchemaError::invalid(format!(
                        "range bounds {} and {} are not comparable",
                        lo, hi
                    )))
                }
                Some(Ordering::Greater) => {
                    return Err(IonSchemaError::invalid(format!(
                        "lower bound {} is greater than upper bound {}",
                        lo, hi
                    )))
                }
                Some(Ordering::Equal) if start.is_open() || end.is_open() => {
                    return Err(empty_range(lo, hi));
                }
                _ => {}
            }
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, value: &T) -> bool {
        let above = match &self.start {
            Limit::Unbounded => true,
            Limit::Closed(lo) => value >= lo,
            Limit::Open(lo) => value > lo,
        };
        let below = match &self.end {
            Limit::Unbounded => true,
            Limit::Closed(hi) => value <= hi,
            Limit::Open(hi) => value < hi,
        };
        above && below
    }

    /// The overlap of two ranges, or `None` when they share no value.
    pub fn intersect(&self, other: &Self) -> Option<Self>
    where
        T: Clone,
    {
        let start = tighter(&self.start, &other.start, Ordering::Greater);
        let end = tighter(&self.end, &other.end, Ordering::Less);
        Range::new(start, end).ok()
    }
}

impl<T> Range<T> {
    pub fn start(&self) -> &Limit<T> {
        &self.start
    }

    pub fn end(&self) -> &Limit<T> {
        &self.end
    }
}

impl<T: Clone> Range<T> {
    /// The range holding exactly `value`.
    pub fn singleton(value: T) -> Self {
        Self {
            start: Limit::Closed(value.clone()),
            end: Limit::Closed(value),
        }
    }
}

/// Picks the more restrictive of two limits on the same side. `prefer` is the
/// ordering that makes a value more restrictive (greater for lower bounds).
fn tighter<T: PartialOrd + Clone>(a: &Limit<T>, b: &Limit<T>, prefer: Ordering) -> Limit<T> {
    match (a.value(), b.value()) {
        (None, _) => b.clone(),
        (_, None) => a.clone(),
        (Some(x), Some(y)) => match x.partial_cmp(y) {
            Some(Ordering::Equal) if b.is_open() => b.clone(),
            Some(Ordering::Equal) => a.clone(),
            Some(o) if o == prefer => a.clone(),
            _ => b.clone(),
        },
    }
}

fn empty_range(lo: &impl fmt::Display, hi: &impl fmt::Display) -> IonSchemaError {
    IonSchemaError::invalid(format!(
        "range between {} and {} contains no values",
        lo, hi
    ))
}

/// A range of integers.
#[derive(Debug, Clone, PartialEq)]
pub struct IntRange {
    range: Range<i64>,
}

impl IntRange {
    /// Validates the bounds as a range, then rejects ranges whose exclusive
    /// bound leaves no integer strictly between the two ends.
    ///
    /// # Errors
    ///
    /// Returns `IonSchemaError::InvalidSchema` for empty or inverted ranges.
    pub fn new(start: Limit<i64>, end: Limit<i64>) -> Result<Self, IonSchemaError> {
        Range::new(start.clone(), end.clone())?;
        if let (Some(lo), Some(hi)) = (start.value(), end.value()) {
            let gap = i128::from(*hi) - i128::from(*lo);
            if (start.is_open() || end.is_open()) && gap <= 1 {
                return Err(empty_range(lo, hi));
            }
        }
        Ok(Self {
            range: Range { start, end },
        })
    }

    /// Like [`IntRange::new`], additionally requiring concrete bounds to be
    /// zero or more.
    pub fn non_negative(start: Limit<i64>, end: Limit<i64>) -> Result<Self, IonSchemaError> {
        let negative = [&start, &end]
            .iter()
            .filter_map(|limit| limit.value())
            .find(|v| **v < 0)
            .copied();
        if let Some(value) = negative {
            return Err(IonSchemaError::invalid(format!(
                "range bound {} must be a non-negative integer",
                value
            )));
        }
        Self::new(start, end)
    }

    pub fn singleton(value: i64) -> Self {
        Self {
            range: Range::singleton(value),
        }
    }

    /// `0..1`, the default occurrence of a field.
    pub fn optional() -> Self {
        Self {
            range: Range {
                start: Limit::Closed(0),
                end: Limit::Closed(1),
            },
        }
    }

    /// `1..1`, the default occurrence of an ordered element.
    pub fn required() -> Self {
        Self::singleton(1)
    }

    pub fn contains(&self, value: i64) -> bool {
        self.range.contains(&value)
    }

    pub fn start(&self) -> &Limit<i64> {
        self.range.start()
    }

    pub fn end(&self) -> &Limit<i64> {
        self.range.end()
    }

    /// The single value of a closed one-value range.
    pub fn as_singleton(&self) -> Option<i64> {
        match (self.start(), self.end()) {
            (Limit::Closed(a), Limit::Closed(b)) if a == b => Some(*a),
            _ => None,
        }
    }

    /// The overlap of two ranges, or `None` when no integer is in both.
    pub fn intersect(&self, other: &IntRange) -> Option<IntRange> {
        let overlap = self.range.intersect(&other.range)?;
        IntRange::new(overlap.start, overlap.end).ok()
    }

    /// The range of every negated value, e.g. `[1, 3]` becomes `[-3, -1]`.
    pub fn negate(&self) -> Result<IntRange, IonSchemaError> {
        let negate = |limit: &Limit<i64>| -> Result<Limit<i64>, IonSchemaError> {
            match limit {
                Limit::Unbounded => Ok(Limit::Unbounded),
                Limit::Closed(v) => v.checked_neg().map(Limit::Closed).ok_or_else(overflow),
                Limit::Open(v) => v.checked_neg().map(Limit::Open).ok_or_else(overflow),
            }
        };
        IntRange::new(negate(self.end())?, negate(self.start())?)
    }
}

fn overflow() -> IonSchemaError {
    IonSchemaError::invalid("range bound cannot be negated")
}

impl fmt::Display for IntRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_range(f, &self.range)
    }
}

fn fmt_range<T: fmt::Display>(f: &mut fmt::Formatter<'_>, range: &Range<T>) -> fmt::Result {
    f.write_str("range::[")?;
    fmt_limit(f, range.start(), "min")?;
    f.write_str(", ")?;
    fmt_limit(f, range.end(), "max")?;
    f.write_str("]")
}

fn fmt_limit<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    limit: &Limit<T>,
    unbounded: &str,
) -> fmt::Result {
    match limit {
        Limit::Unbounded => f.write_str(unbounded),
        Limit::Closed(v) => write!(f, "{}", v),
        Limit::Open(v) => write!(f, "exclusive::{}", v),
    }
}

/// Exact numeric value of an int, decimal or finite float.
pub fn to_decimal(value: &Element) -> Option<BigDecimal> {
    match value.value() {
        Value::Int(i) => Some(BigDecimal::new(i.clone(), 0)),
        Value::Decimal(d) => Some(d.clone()),
        Value::Float(x) => float_to_decimal(*x),
        _ => None,
    }
}

/// The exact binary value of a finite float, e.g. `0.1` becomes
/// `0.1000000000000000055511151231257827021181583404541015625`.
pub fn float_to_decimal(value: f64) -> Option<BigDecimal> {
    if !value.is_finite() {
        return None;
    }
    let bits = value.to_bits();
    let biased = i64::try_from((bits >> 52) & 0x7ff).ok()?;
    let fraction = bits & ((1 << 52) - 1);
    // value = mantissa * 2^exponent
    let (mantissa, exponent) = if biased == 0 {
        (fraction, -1074)
    } else {
        (fraction | (1 << 52), biased - 1075)
    };
    let mut coefficient = BigInt::from(mantissa);
    if value.is_sign_negative() {
        coefficient = -coefficient;
    }
    if exponent >= 0 {
        return Some(BigDecimal::new(coefficient << usize::try_from(exponent).ok()?, 0));
    }
    // m / 2^k = m * 5^k / 10^k
    let k = u32::try_from(-exponent).ok()?;
    Some(BigDecimal::new(coefficient * BigInt::from(5).pow(k), i64::from(k)))
}

/// A range over numbers, comparing ints, decimals and floats by exact value.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberRange {
    range: Range<BigDecimal>,
}

impl NumberRange {
    pub fn new(start: Limit<BigDecimal>, end: Limit<BigDecimal>) -> Result<Self, IonSchemaError> {
        Ok(Self {
            range: Range::new(start, end)?,
        })
    }

    pub fn contains(&self, value: &BigDecimal) -> bool {
        self.range.contains(value)
    }

    /// Whether a value is numeric and inside the range. Non-numeric values,
    /// nulls and non-finite floats are never contained.
    pub fn contains_element(&self, value: &Element) -> bool {
        to_decimal(value).is_some_and(|d| self.contains(&d))
    }

    pub fn start(&self) -> &Limit<BigDecimal> {
        self.range.start()
    }

    pub fn end(&self) -> &Limit<BigDecimal> {
        self.range.end()
    }
}

impl fmt::Display for NumberRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_range(f, &self.range)
    }
}

/// A timestamp compared by the instant it denotes.
#[derive(Debug, Clone)]
pub struct TimestampInstant {
    timestamp: Timestamp,
    millis: BigDecimal,
}

impl TimestampInstant {
    pub fn new(timestamp: Timestamp) -> Self {
        let millis = timestamp.epoch_millis();
        Self { timestamp, millis }
    }

    pub fn timestamp(&self) -> &Timestamp {
        &self.timestamp
    }
}

impl PartialEq for TimestampInstant {
    fn eq(&self, other: &Self) -> bool {
        self.millis == other.millis
    }
}

impl PartialOrd for TimestampInstant {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.millis.partial_cmp(&other.millis)
    }
}

impl fmt::Display for TimestampInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.timestamp)
    }
}

/// A range of instants.
#[derive(Debug, Clone, PartialEq)]
pub struct TimestampRange {
    range: Range<TimestampInstant>,
}

impl TimestampRange {
    pub fn new(start: Limit<Timestamp>, end: Limit<Timestamp>) -> Result<Self, IonSchemaError> {
        Ok(Self {
            range: Range::new(start.map(TimestampInstant::new), end.map(TimestampInstant::new))?,
        })
    }

    pub fn contains(&self, value: &Timestamp) -> bool {
        self.range.contains(&TimestampInstant::new(value.clone()))
    }

    pub fn start(&self) -> Limit<&Timestamp> {
        self.range.start().as_ref().map(|i| &i.timestamp)
    }

    pub fn end(&self) -> Limit<&Timestamp> {
        self.range.end().as_ref().map(|i| &i.timestamp)
    }
}

impl fmt::Display for TimestampRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_range(f, &self.range)
    }
}

/// Named precisions a timestamp can be constrained to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimestampPrecisionValue {
    Year,
    Month,
    Day,
    Minute,
    Second,
    Millisecond,
    Microsecond,
    Nanosecond,
}

impl TimestampPrecisionValue {
    pub const ALL: [TimestampPrecisionValue; 8] = [
        Self::Year,
        Self::Month,
        Self::Day,
        Self::Minute,
        Self::Second,
        Self::Millisecond,
        Self::Microsecond,
        Self::Nanosecond,
    ];

    /// Position on the precision scale; fractional precisions count digits.
    pub fn id(&self) -> i64 {
        match self {
            Self::Year => -4,
            Self::Month => -3,
            Self::Day => -2,
            Self::Minute => -1,
            Self::Second => 0,
            Self::Millisecond => 3,
            Self::Microsecond => 6,
            Self::Nanosecond => 9,
        }
    }

    pub fn symbol_text(&self) -> &'static str {
        match self {
            Self::Year => "year",
            Self::Month => "month",
            Self::Day => "day",
            Self::Minute => "minute",
            Self::Second => "second",
            Self::Millisecond => "millisecond",
            Self::Microsecond => "microsecond",
            Self::Nanosecond => "nanosecond",
        }
    }

    pub fn from_symbol_text(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.symbol_text() == text)
    }

    /// Position of a timestamp's own precision on the same scale.
    pub fn id_of(timestamp: &Timestamp) -> i64 {
        match timestamp.precision() {
            TimestampPrecision::Year => -4,
            TimestampPrecision::Month => -3,
            TimestampPrecision::Day => -2,
            TimestampPrecision::Minute => -1,
            TimestampPrecision::Second => 0,
            TimestampPrecision::Fractional(digits) => i64::from(digits),
        }
    }
}

impl fmt::Display for TimestampPrecisionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol_text())
    }
}

/// A range of timestamp precisions, validated as a range of their ids.
#[derive(Debug, Clone, PartialEq)]
pub struct TimestampPrecisionRange {
    range: Range<TimestampPrecisionValue>,
    ids: IntRange,
}

impl TimestampPrecisionRange {
    pub fn new(
        start: Limit<TimestampPrecisionValue>,
        end: Limit<TimestampPrecisionValue>,
    ) -> Result<Self, IonSchemaError> {
        let ids = IntRange::new(start.as_ref().map(|p| p.id()), end.as_ref().map(|p| p.id()))?;
        Ok(Self {
            range: Range { start, end },
            ids,
        })
    }

    pub fn singleton(value: TimestampPrecisionValue) -> Self {
        Self {
            range: Range::singleton(value),
            ids: IntRange::singleton(value.id()),
        }
    }

    pub fn contains(&self, timestamp: &Timestamp) -> bool {
        self.ids.contains(TimestampPrecisionValue::id_of(timestamp))
    }

    pub fn start(&self) -> &Limit<TimestampPrecisionValue> {
        self.range.start()
    }

    pub fn end(&self) -> &Limit<TimestampPrecisionValue> {
        self.range.end()
    }

    pub fn as_singleton(&self) -> Option<TimestampPrecisionValue> {
        match (self.start(), self.end()) {
            (Limit::Closed(a), Limit::Closed(b)) if a == b => Some(*a),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn exclusive_five_to_six_is_empty() {
        assert!(IntRange::new(Limit::Open(5), Limit::Closed(6)).is_err());
        assert!(IntRange::new(Limit::Closed(5), Limit::Open(6)).is_err());
        assert!(IntRange::new(Limit::Open(5), Limit::Open(7)).is_ok());
    }

    #[test]
    fn singleton_range() {
        let range = IntRange::new(Limit::Closed(5), Limit::Closed(5)).unwrap();
        assert!(range.contains(5));
        assert!(!range.contains(4));
        assert_eq!(range.as_singleton(), Some(5));
    }

    #[test]
    fn rejects_inverted_and_unbounded() {
        assert!(IntRange::new(Limit::Closed(6), Limit::Closed(5)).is_err());
        assert!(IntRange::new(Limit::Unbounded, Limit::Unbounded).is_err());
        assert!(IntRange::new(Limit::Open(1), Limit::Closed(1)).is_err());
        assert!(IntRange::new(Limit::Unbounded, Limit::Closed(1)).is_ok());
    }

    #[test]
    fn non_negative_rejects_negative_bounds() {
        assert!(IntRange::non_negative(Limit::Closed(-1), Limit::Closed(0)).is_err());
        assert!(IntRange::non_negative(Limit::Closed(0), Limit::Unbounded).is_ok());
        assert!(IntRange::non_negative(Limit::Open(0), Limit::Closed(1)).is_err());
    }

    #[test]
    fn unbounded_ends_contain_everything_on_their_side() {
        let range = IntRange::new(Limit::Unbounded, Limit::Open(0)).unwrap();
        assert!(range.contains(i64::MIN));
        assert!(range.contains(-1));
        assert!(!range.contains(0));
    }

    #[test]
    fn intersect_and_negate() {
        let a = IntRange::new(Limit::Closed(0), Limit::Closed(10)).unwrap();
        let b = IntRange::new(Limit::Open(5), Limit::Unbounded).unwrap();
        let both = a.intersect(&b).unwrap();
        assert_eq!(both.start(), &Limit::Open(5));
        assert_eq!(both.end(), &Limit::Closed(10));

        let disjoint = IntRange::new(Limit::Closed(20), Limit::Unbounded).unwrap();
        assert!(a.intersect(&disjoint).is_none());

        let negated = b.negate().unwrap();
        assert_eq!(negated.start(), &Limit::Unbounded);
        assert_eq!(negated.end(), &Limit::Open(-5));
    }

    #[test]
    fn number_range_normalizes_representations() {
        let range = NumberRange::new(Limit::Closed(dec("1")), Limit::Open(dec("2.5"))).unwrap();
        assert!(range.contains_element(&Element::int(1)));
        assert!(range.contains_element(&Element::decimal(dec("2.49"))));
        assert!(range.contains_element(&Element::float(2.0)));
        assert!(!range.contains_element(&Element::float(2.5)));
        assert!(!range.contains_element(&Element::float(f64::NAN)));
        assert!(!range.contains_element(&Element::string("1")));
        assert!(!range.contains_element(&Element::typed_null(crate::element::IonType::Int)));
    }

    #[test]
    fn number_range_handles_huge_floats() {
        let at_least_zero = NumberRange::new(Limit::Closed(dec("0")), Limit::Unbounded).unwrap();
        assert!(at_least_zero.contains_element(&Element::float(1e300)));
        assert!(!at_least_zero.contains_element(&Element::float(-1e300)));
        assert!(!at_least_zero.contains_element(&Element::float(f64::INFINITY)));

        let huge = float_to_decimal(1e300).unwrap();
        let up_to_huge = NumberRange::new(Limit::Unbounded, Limit::Closed(huge)).unwrap();
        assert!(up_to_huge.contains_element(&Element::float(1e300)));
        let next = f64::from_bits(1e300f64.to_bits() + 1);
        assert!(!up_to_huge.contains_element(&Element::float(next)));
    }

    #[test]
    fn number_range_compares_tiny_floats_exactly() {
        let positive = NumberRange::new(Limit::Open(dec("0")), Limit::Unbounded).unwrap();
        assert!(positive.contains_element(&Element::float(1e-30)));
        assert!(positive.contains_element(&Element::float(f64::from_bits(1))));
        assert!(!positive.contains_element(&Element::float(0.0)));
        assert!(!positive.contains_element(&Element::float(-0.0)));

        // 0.1 as a float is slightly above the decimal 0.1
        let up_to_a_tenth = NumberRange::new(Limit::Unbounded, Limit::Closed(dec("0.1"))).unwrap();
        assert!(!up_to_a_tenth.contains_element(&Element::float(0.1)));
        assert!(up_to_a_tenth.contains_element(&Element::decimal(dec("0.1"))));
    }

    #[test]
    fn floats_convert_to_exact_decimals() {
        assert_eq!(float_to_decimal(0.5), Some(dec("0.5")));
        assert_eq!(float_to_decimal(-2.0), Some(dec("-2")));
        assert_eq!(
            float_to_decimal(0.1),
            Some(dec("0.1000000000000000055511151231257827021181583404541015625"))
        );
        assert_eq!(float_to_decimal(f64::NAN), None);
    }

    #[test]
    fn decimal_ranges_are_continuous() {
        // Unlike integers, a gap of one still holds values
        assert!(NumberRange::new(Limit::Open(dec("5")), Limit::Closed(dec("6"))).is_ok());
        assert!(NumberRange::new(Limit::Open(dec("5")), Limit::Closed(dec("5.0"))).is_err());
    }

    #[test]
    fn timestamp_range_compares_instants() {
        let ts = |s: &str| Timestamp::parse(s).unwrap();
        let range = TimestampRange::new(
            Limit::Closed(ts("2020-01-01T00:00Z")),
            Limit::Open(ts("2021T")),
        )
        .unwrap();
        assert!(range.contains(&ts("2020-01-01T01:00+01:00")));
        assert!(range.contains(&ts("2020-06-01")));
        assert!(!range.contains(&ts("2021-01-01T00:00Z")));
        assert!(!range.contains(&ts("2019-12-31T23:59Z")));
    }

    #[test]
    fn precision_range_uses_ids() {
        let range = TimestampPrecisionRange::new(
            Limit::Closed(TimestampPrecisionValue::Second),
            Limit::Open(TimestampPrecisionValue::Microsecond),
        )
        .unwrap();
        let ts = |s: &str| Timestamp::parse(s).unwrap();
        assert!(range.contains(&ts("2020-01-01T00:00:00Z")));
        assert!(range.contains(&ts("2020-01-01T00:00:00.12Z")));
        assert!(range.contains(&ts("2020-01-01T00:00:00.12345Z")));
        assert!(!range.contains(&ts("2020-01-01T00:00:00.123456Z")));
        assert!(!range.contains(&ts("2020-01-01T00:00Z")));

        assert!(TimestampPrecisionRange::new(
            Limit::Open(TimestampPrecisionValue::Year),
            Limit::Closed(TimestampPrecisionValue::Month),
        )
        .is_err());
    }

    #[test]
    fn display_uses_range_syntax() {
        let range = IntRange::new(Limit::Open(1), Limit::Unbounded).unwrap();
        assert_eq!(range.to_string(), "range::[exclusive::1, max]");
    }
}
