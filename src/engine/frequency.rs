use chrono::{Datelike, NaiveDate};

use crate::models::habit::{ConfigError, FrequencyType, GoalConfig};

/// A habit's cadence resolved against a concrete day: how long one
/// frequency bucket is and how many completed days it requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrequencyWindow {
    pub days: u32,
    pub required: u32,
}

impl FrequencyWindow {
    /// Resolve the configured cadence for the bucket containing `day`.
    /// Monthly cadences take the length of that day's calendar month.
    ///
    /// A missing period for `PerDays` is rejected at config write time;
    /// hitting it here means a config bypassed validation, so it surfaces
    /// as the same error rather than a panic.
    pub fn resolve(cfg: &GoalConfig, day: NaiveDate) -> Result<FrequencyWindow, ConfigError> {
        let window = match cfg.frequency_type {
            FrequencyType::Daily => FrequencyWindow {
                days: 1,
                required: 1,
            },
            FrequencyType::Weekly => FrequencyWindow {
                days: 7,
                required: cfg.frequency,
            },
            FrequencyType::Monthly => FrequencyWindow {
                days: days_in_month(day),
                required: cfg.frequency,
            },
            FrequencyType::PerDays => FrequencyWindow {
                days: cfg.times_per_days.ok_or(ConfigError::MissingPeriod)?,
                required: cfg.frequency,
            },
        };
        Ok(window)
    }
}

pub fn days_in_month(day: NaiveDate) -> u32 {
    let (next_y, next_m) = if day.month() == 12 {
        (day.year() + 1, 1)
    } else {
        (day.year(), day.month() + 1)
    };
    let first_this = NaiveDate::from_ymd_opt(day.year(), day.month(), 1).unwrap();
    let first_next = NaiveDate::from_ymd_opt(next_y, next_m, 1).unwrap();
    (first_next - first_this).num_days() as u32
}
