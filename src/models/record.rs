use anyhow::{anyhow, Result};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Calendar day as days since 1970-01-01 (UTC), the canonical day key.
pub fn epoch_day(date: NaiveDate) -> i64 {
    (date - NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()).num_days()
}

pub fn date_from_epoch_day(day: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap() + Duration::days(day)
}

/// One logged value for one calendar day. A missing record means value 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitRecord {
    pub id: Option<i64>,
    pub habit_id: i64,
    pub account_id: i64,
    pub epoch_day: i64,
    pub value: f64,
}

/// A raw value argument from the CLI: either an absolute value or a
/// signed delta ("+1", "-0.5") resolved against the stored value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecordInput {
    Absolute(f64),
    Delta(f64),
}

impl RecordInput {
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(anyhow!("Empty record value"));
        }
        let (delta, body) = match s.as_bytes()[0] {
            b'+' => (true, &s[1..]),
            b'-' => (true, s),
            _ => (false, s),
        };
        let n: f64 = body
            .parse()
            .map_err(|_| anyhow!("Not a number: '{}'", s))?;
        if !n.is_finite() {
            return Err(anyhow!("Record value must be finite, got {}", n));
        }
        if delta {
            Ok(RecordInput::Delta(n))
        } else {
            Ok(RecordInput::Absolute(n))
        }
    }

    /// Resolve to the absolute value that gets stored. Deltas apply on top
    /// of the day's current value; the result is still validated.
    pub fn resolve(self, current: f64) -> Result<f64> {
        let value = match self {
            RecordInput::Absolute(v) => v,
            RecordInput::Delta(d) => current + d,
        };
        validate_record_value(value)?;
        Ok(value)
    }
}

/// Ingestion-time check: the aggregator assumes clean numeric input.
pub fn validate_record_value(value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(anyhow!("Record value must be finite, got {}", value));
    }
    if value < 0.0 {
        return Err(anyhow!("Record value must not be negative, got {}", value));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_day_round_trip() {
        let d = NaiveDate::from_ymd_opt(2026, 8, 30).unwrap();
        assert_eq!(date_from_epoch_day(epoch_day(d)), d);
        assert_eq!(epoch_day(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()), 0);
    }

    #[test]
    fn parses_deltas_and_absolutes() {
        assert_eq!(RecordInput::parse("+1").unwrap(), RecordInput::Delta(1.0));
        assert_eq!(
            RecordInput::parse("-0.5").unwrap(),
            RecordInput::Delta(-0.5)
        );
        assert_eq!(
            RecordInput::parse("2.5").unwrap(),
            RecordInput::Absolute(2.5)
        );
        assert!(RecordInput::parse("abc").is_err());
        assert!(RecordInput::parse("NaN").is_err());
    }

    #[test]
    fn delta_resolves_against_current() {
        let v = RecordInput::Delta(1.0).resolve(2.0).unwrap();
        assert_eq!(v, 3.0);
        // A delta may not drive the stored value below zero.
        assert!(RecordInput::Delta(-3.0).resolve(2.0).is_err());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(validate_record_value(f64::NAN).is_err());
        assert!(validate_record_value(-1.0).is_err());
        assert!(validate_record_value(0.0).is_ok());
    }
}
