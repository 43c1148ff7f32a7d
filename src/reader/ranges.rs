//! Reads `range::[lower, upper]` lists and their shorthand forms.

use bigdecimal::BigDecimal;

use crate::element::{Element, IonType};
use crate::range::{
    to_decimal, IntRange, Limit, NumberRange, TimestampPrecisionRange, TimestampPrecisionValue,
    TimestampRange,
};

use super::context::{invalid, require, require_annotations_in, require_no_annotations, Step};

#[derive(Clone, Copy)]
enum Bound {
    Lower,
    Upper,
}

impl Bound {
    fn index(self) -> usize {
        match self {
            Bound::Lower => 0,
            Bound::Upper => 1,
        }
    }

    fn unbounded(self) -> &'static str {
        match self {
            Bound::Lower => "min",
            Bound::Upper => "max",
        }
    }

    fn name(self) -> &'static str {
        match self {
            Bound::Lower => "Lower",
            Bound::Upper => "Upper",
        }
    }
}

/// Reads both limits of a range list, converting concrete bounds with
/// `bound_value`, which names what it expected when it returns `None`.
fn read_limits<T>(
    value: &Element,
    expected: &str,
    bound_value: impl Fn(&Element) -> Step<Option<T>>,
) -> Step<(Limit<T>, Limit<T>)> {
    let Some(items) = value.as_list() else {
        return invalid(format!("Invalid range; not an ion list: {}", value));
    };
    require(items.len() == 2, || {
        format!("Invalid range; size of list must be 2: {}", value)
    })?;
    require(value.annotations() == ["range"], || {
        format!("Invalid range; missing 'range' annotation: {}", value)
    })?;
    let read = |bound: Bound| -> Step<Limit<T>> {
        let item = &items[bound.index()];
        if item.as_symbol() == Some(bound.unbounded()) {
            require_no_annotations(item, || {
                format!(
                    "Invalid range; '{}' may not be annotated: {}",
                    bound.unbounded(),
                    value
                )
            })?;
            return Ok(Limit::Unbounded);
        }
        require_annotations_in(item, &["exclusive"], || {
            format!(
                "Invalid range; illegal annotation on {} bound: {}",
                bound.name(),
                value
            )
        })?;
        let concrete = if item.is_null() {
            None
        } else {
            bound_value(item)?
        };
        let Some(concrete) = concrete else {
            return invalid(format!(
                "Invalid range; {} boundary of range must be '{}' or a non-null {}",
                bound.name(),
                bound.unbounded(),
                expected
            ));
        };
        if item.has_annotation("exclusive") {
            Ok(Limit::Open(concrete))
        } else {
            Ok(Limit::Closed(concrete))
        }
    };
    Ok((read(Bound::Lower)?, read(Bound::Upper)?))
}

/// An integer range, or a single int meaning exactly that value.
pub(crate) fn read_int_range(value: &Element) -> Step<IntRange> {
    if value.ion_type() == IonType::Int {
        require(!value.is_null(), || "Range cannot be a null value".to_string())?;
        require_no_annotations(value, || "Constraint may not be annotated".to_string())?;
        return Ok(IntRange::singleton(int_bound(value)?));
    }
    let (start, end) = read_limits(value, "int", |item| match item.as_int() {
        Some(_) => int_bound(item).map(Some),
        None => Ok(None),
    })?;
    Ok(IntRange::new(start, end)?)
}

fn int_bound(value: &Element) -> Step<i64> {
    match value.as_i64() {
        Some(n) => Ok(n),
        None => invalid(format!("Invalid range; int bound is out of range: {}", value)),
    }
}

/// Like [`read_int_range`], for occurrence counts.
pub(crate) fn read_non_negative_int_range(value: &Element) -> Step<IntRange> {
    let range = read_int_range(value)?;
    Ok(IntRange::non_negative(range.start().clone(), range.end().clone())?)
}

pub(crate) fn read_number_range(value: &Element) -> Step<NumberRange> {
    let (start, end) = read_limits(value, "number", |item| {
        let real: Option<BigDecimal> = to_decimal(item);
        match item.ion_type() {
            IonType::Int | IonType::Decimal | IonType::Float => {
                require(real.is_some(), || {
                    format!(
                        "Invalid number range; range bounds must be real numbers: {}",
                        value
                    )
                })?;
                Ok(real)
            }
            _ => Ok(None),
        }
    })?;
    Ok(NumberRange::new(start, end)?)
}

pub(crate) fn read_timestamp_range(value: &Element) -> Step<TimestampRange> {
    let (start, end) = read_limits(value, "timestamp", |item| {
        Ok(item.as_timestamp().cloned())
    })?;
    Ok(TimestampRange::new(start, end)?)
}

fn precision_error(value: &Element) -> String {
    let names: Vec<_> = TimestampPrecisionValue::ALL
        .iter()
        .map(|p| p.symbol_text())
        .collect();
    format!(
        "Invalid timestamp precision range; range bounds must be {}, min, or max: {}",
        names.join(", "),
        value
    )
}

/// A range of precision symbols, or a single precision symbol.
pub(crate) fn read_timestamp_precision_range(value: &Element) -> Step<TimestampPrecisionRange> {
    if value.ion_type() == IonType::Symbol {
        require(!value.is_null(), || {
            format!("Timestamp precision value cannot be null; was: {}", value)
        })?;
        require_no_annotations(value, || {
            "Timestamp precision value may not have annotations".to_string()
        })?;
        let precision = value
            .as_symbol()
            .and_then(TimestampPrecisionValue::from_symbol_text);
        return match precision {
            Some(precision) => Ok(TimestampPrecisionRange::singleton(precision)),
            None => invalid(precision_error(value)),
        };
    }
    let (start, end) = read_limits(value, "symbol", |item| {
        if item.ion_type() != IonType::Symbol {
            return Ok(None);
        }
        match item.as_symbol().and_then(TimestampPrecisionValue::from_symbol_text) {
            Some(precision) => Ok(Some(precision)),
            None => invalid(precision_error(value)),
        }
    })?;
    Ok(TimestampPrecisionRange::new(start, end)?)
}

/// Whether any concrete bound of a range list is of `ion_type`.
pub(crate) fn has_bound_of_type(value: &Element, ion_type: IonType) -> bool {
    value
        .as_list()
        .is_some_and(|items| items.iter().any(|item| item.ion_type() == ion_type))
}

/// Whether any bound is numeric.
pub(crate) fn has_numeric_bound(value: &Element) -> bool {
    [IonType::Int, IonType::Decimal, IonType::Float]
        .into_iter()
        .any(|t| has_bound_of_type(value, t))
}
