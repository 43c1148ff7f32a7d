//! Ion timestamps.

use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveTime};
use num_bigint::BigInt;

/// How much of a timestamp is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimestampPrecision {
    Year,
    Month,
    Day,
    Minute,
    Second,
    /// Seconds with this many fractional digits.
    Fractional(u32),
}

/// A point in time with Ion precision and offset semantics.
///
/// An offset of `None` is the unknown local offset, written `-00:00`.
#[derive(Debug, Clone, PartialEq)]
pub struct Timestamp {
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
    /// Digits of the fraction of a second, as written.
    fraction: Option<String>,
    precision: TimestampPrecision,
    offset_minutes: Option<i32>,
}

impl Timestamp {
    pub fn with_year(year: i32) -> Self {
        Self {
            year,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
            fraction: None,
            precision: TimestampPrecision::Year,
            offset_minutes: None,
        }
    }

    pub fn precision(&self) -> TimestampPrecision {
        self.precision
    }

    pub fn offset_minutes(&self) -> Option<i32> {
        self.offset_minutes
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// Number of digits after the decimal point of the seconds.
    pub fn fractional_digits(&self) -> u32 {
        match self.precision {
            TimestampPrecision::Fractional(digits) => digits,
            _ => 0,
        }
    }

    /// Milliseconds since the Unix epoch, exact.
    ///
    /// Timestamps without a known offset are treated as UTC.
    pub fn epoch_millis(&self) -> BigDecimal {
        let date = NaiveDate::from_ymd_opt(self.year, self.month, self.day);
        let time = NaiveTime::from_hms_opt(self.hour, self.minute, self.second);
        let whole = match (date, time) {
            (Some(date), Some(time)) => date.and_time(time).and_utc().timestamp_millis(),
            // Fields are checked on construction
            _ => 0,
        };
        let offset_millis = i64::from(self.offset_minutes.unwrap_or(0)) * 60_000;
        let millis = BigDecimal::from(whole - offset_millis);
        match &self.fraction {
            Some(digits) => {
                let scale = i64::try_from(digits.len()).unwrap_or(i64::MAX);
                let fraction = BigInt::parse_bytes(digits.as_bytes(), 10).unwrap_or_default();
                millis + BigDecimal::new(fraction * 1000, scale)
            }
            None => millis,
        }
    }

    /// Parses Ion timestamp text such as `2007-02-23T12:14:33.079-08:00`.
    pub fn parse(text: &str) -> Result<Self, String> {
        let invalid = || format!("invalid timestamp: {}", text);
        let bytes = text.as_bytes();

        let year = digits(text, 0, 4).ok_or_else(invalid)?;
        let mut ts = Timestamp::with_year(year as i32);
        match bytes.get(4) {
            Some(b'T') if bytes.len() == 5 => return Ok(ts),
            Some(b'-') => {}
            _ => return Err(invalid()),
        }

        ts.month = digits(text, 5, 7).ok_or_else(invalid)?;
        ts.precision = TimestampPrecision::Month;
        match bytes.get(7) {
            Some(b'T') if bytes.len() == 8 => return ts.checked(text),
            Some(b'-') => {}
            _ => return Err(invalid()),
        }

        ts.day = digits(text, 8, 10).ok_or_else(invalid)?;
        ts.precision = TimestampPrecision::Day;
        match bytes.get(10) {
            None => return ts.checked(text),
            Some(b'T') if bytes.len() == 11 => return ts.checked(text),
            Some(b'T') => {}
            _ => return Err(invalid()),
        }

        ts.hour = digits(text, 11, 13).ok_or_else(invalid)?;
        if bytes.get(13) != Some(&b':') {
            return Err(invalid());
        }
        ts.minute = digits(text, 14, 16).ok_or_else(invalid)?;
        ts.precision = TimestampPrecision::Minute;

        let mut pos = 16;
        if bytes.get(pos) == Some(&b':') {
            ts.second = digits(text, 17, 19).ok_or_else(invalid)?;
            ts.precision = TimestampPrecision::Second;
            pos = 19;
            if bytes.get(pos) == Some(&b'.') {
                let start = pos + 1;
                let mut end = start;
                while bytes.get(end).is_some_and(u8::is_ascii_digit) {
                    end += 1;
                }
                if end == start {
                    return Err(invalid());
                }
                let width = u32::try_from(end - start).map_err(|_| invalid())?;
                ts.precision = TimestampPrecision::Fractional(width);
                ts.fraction = Some(text[start..end].to_string());
                pos = end;
            }
        }

        ts.offset_minutes = parse_offset(&text[pos..]).ok_or_else(invalid)?;
        ts.checked(text)
    }

    fn checked(self, text: &str) -> Result<Self, String> {
        let date_ok = NaiveDate::from_ymd_opt(self.year, self.month, self.day).is_some();
        let time_ok = NaiveTime::from_hms_opt(self.hour, self.minute, self.second).is_some();
        if date_ok && time_ok && (1..=9999).contains(&self.year) {
            Ok(self)
        } else {
            Err(format!("invalid timestamp: {}", text))
        }
    }
}

impl FromStr for Timestamp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timestamp::parse(s)
    }
}

/// `Z`, `+hh:mm` or `-hh:mm`; `-00:00` is the unknown offset.
fn parse_offset(text: &str) -> Option<Option<i32>> {
    if text == "Z" {
        return Some(Some(0));
    }
    let sign = match text.as_bytes().first() {
        Some(b'+') => 1,
        Some(b'-') => -1,
        _ => return None,
    };
    if text.len() != 6 || text.as_bytes()[3] != b':' {
        return None;
    }
    let hours = digits(text, 1, 3)? as i32;
    let minutes = digits(text, 4, 6)? as i32;
    if hours > 23 || minutes > 59 {
        return None;
    }
    if sign < 0 && hours == 0 && minutes == 0 {
        return Some(None);
    }
    Some(Some(sign * (hours * 60 + minutes)))
}

fn digits(text: &str, start: usize, end: usize) -> Option<u32> {
    let slice = text.get(start..end)?;
    if !slice.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    slice.parse().ok()
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.year)?;
        match self.precision {
            TimestampPrecision::Year => return f.write_str("T"),
            TimestampPrecision::Month => return write!(f, "-{:02}T", self.month),
            TimestampPrecision::Day => return write!(f, "-{:02}-{:02}", self.month, self.day),
            _ => {}
        }
        write!(
            f,
            "-{:02}-{:02}T{:02}:{:02}",
            self.month, self.day, self.hour, self.minute
        )?;
        if self.precision != TimestampPrecision::Minute {
            write!(f, ":{:02}", self.second)?;
        }
        if let Some(digits) = &self.fraction {
            write!(f, ".{}", digits)?;
        }
        match self.offset_minutes {
            None => f.write_str("-00:00"),
            Some(0) => f.write_str("Z"),
            Some(offset) => {
                let sign = if offset < 0 { '-' } else { '+' };
                let offset = offset.abs();
                write!(f, "{}{:02}:{:02}", sign, offset / 60, offset % 60)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_precision() {
        let cases = [
            ("2007T", TimestampPrecision::Year),
            ("2007-02T", TimestampPrecision::Month),
            ("2007-02-23", TimestampPrecision::Day),
            ("2007-02-23T", TimestampPrecision::Day),
            ("2007-02-23T12:14Z", TimestampPrecision::Minute),
            ("2007-02-23T12:14:33Z", TimestampPrecision::Second),
            (
                "2007-02-23T12:14:33.079-08:00",
                TimestampPrecision::Fractional(3),
            ),
        ];
        for (text, precision) in cases {
            let ts = Timestamp::parse(text).unwrap();
            assert_eq!(ts.precision(), precision, "{}", text);
        }
    }

    #[test]
    fn display_matches_input() {
        for text in [
            "2007T",
            "2007-02T",
            "2007-02-23",
            "2007-02-23T12:14Z",
            "2007-02-23T12:14:33.079-08:00",
            "2007-02-23T12:14:33.000+01:30",
            "2007-02-23T12:14:33-00:00",
        ] {
            assert_eq!(Timestamp::parse(text).unwrap().to_string(), text);
        }
    }

    #[test]
    fn unknown_offset() {
        let ts = Timestamp::parse("2000-01-01T00:00-00:00").unwrap();
        assert_eq!(ts.offset_minutes(), None);
        let ts = Timestamp::parse("2000-01-01T00:00+00:00").unwrap();
        assert_eq!(ts.offset_minutes(), Some(0));
    }

    #[test]
    fn rejects_invalid_dates() {
        assert!(Timestamp::parse("2007-02-30").is_err());
        assert!(Timestamp::parse("2007-13T").is_err());
        assert!(Timestamp::parse("2007-02-23T25:00Z").is_err());
        assert!(Timestamp::parse("2007-02-23T12:00").is_err());
    }

    #[test]
    fn epoch_millis_accounts_for_offset() {
        let utc = Timestamp::parse("1970-01-01T01:00Z").unwrap();
        let plus_one = Timestamp::parse("1970-01-01T02:00+01:00").unwrap();
        assert_eq!(utc.epoch_millis(), BigDecimal::from(3_600_000));
        assert_eq!(utc.epoch_millis(), plus_one.epoch_millis());

        let fractional = Timestamp::parse("1970-01-01T00:00:00.0015Z").unwrap();
        assert_eq!(fractional.epoch_millis(), BigDecimal::from_str("1.5000").unwrap());

        let fine = "1970-01-01T00:00:00.0000000000000000000000000000001Z";
        let fine = Timestamp::parse(fine).unwrap();
        assert!(fine.epoch_millis() > BigDecimal::from(0));
        assert_eq!(fine.fractional_digits(), 31);
    }
}
