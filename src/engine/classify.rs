use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{reaches, values_eq, EPS};
use crate::models::habit::GoalConfig;
use crate::models::record::epoch_day;

/// Completion of a single calendar day. The closed set every renderer and
/// aggregation consumer maps from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionState {
    Missed,
    PartiallyCompleted,
    Completed,
    /// A linked participant's record satisfied the day on the viewer's behalf.
    CompletedByOtherRecords,
    /// Negative habit exceeded its ceiling.
    Failed,
    /// Outside the active tracking window: future, untracked weekday, or
    /// before the habit existed.
    Disabled,
}

impl CompletionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionState::Missed => "missed",
            CompletionState::PartiallyCompleted => "partially_completed",
            CompletionState::Completed => "completed",
            CompletionState::CompletedByOtherRecords => "completed_by_other_records",
            CompletionState::Failed => "failed",
            CompletionState::Disabled => "disabled",
        }
    }

    /// Both direct and credited completions count toward window requirements.
    pub fn is_complete(&self) -> bool {
        matches!(
            self,
            CompletionState::Completed | CompletionState::CompletedByOtherRecords
        )
    }
}

impl FromStr for CompletionState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "missed" => Ok(CompletionState::Missed),
            "partially_completed" => Ok(CompletionState::PartiallyCompleted),
            "completed" => Ok(CompletionState::Completed),
            "completed_by_other_records" => Ok(CompletionState::CompletedByOtherRecords),
            "failed" => Ok(CompletionState::Failed),
            "disabled" => Ok(CompletionState::Disabled),
            _ => Err(anyhow::anyhow!("Unknown completion state: {}", s)),
        }
    }
}

/// Admission context for one evaluated day.
#[derive(Debug, Clone, Copy)]
pub struct DayContext<'a> {
    pub day: NaiveDate,
    pub today: NaiveDate,
    /// Epoch day the habit was created.
    pub created_day: i64,
    /// Weekday filter; `None` admits every weekday.
    pub tracked_days: Option<&'a [Weekday]>,
}

impl DayContext<'_> {
    /// A day is admitted when it is not in the future, not before the habit
    /// existed, and passes the weekday filter.
    pub fn is_admitted(&self) -> bool {
        if self.day > self.today {
            return false;
        }
        if epoch_day(self.day) < self.created_day {
            return false;
        }
        match self.tracked_days {
            None => true,
            Some(days) => days.contains(&self.day.weekday()),
        }
    }
}

/// Value-only classification, shared by the day classifier and the
/// linked-record override.
pub fn classify_value(cfg: &GoalConfig, value: f64) -> CompletionState {
    if cfg.is_negative {
        // Lower is better; the reachable value is a ceiling.
        if value <= cfg.reachable_value + EPS {
            CompletionState::Completed
        } else {
            CompletionState::Failed
        }
    } else if values_eq(value, 0.0) {
        CompletionState::Missed
    } else if reaches(value, cfg.reachable_value) {
        CompletionState::Completed
    } else {
        CompletionState::PartiallyCompleted
    }
}

/// Classify one day. `linked_values` are same-day record values of accounts
/// linked to a shared habit; any of them reaching the goal upgrades a
/// not-completed positive day to `CompletedByOtherRecords`.
pub fn classify_day(
    cfg: &GoalConfig,
    value: f64,
    ctx: &DayContext,
    linked_values: &[f64],
) -> CompletionState {
    if !ctx.is_admitted() {
        return CompletionState::Disabled;
    }
    let direct = classify_value(cfg, value);
    if direct == CompletionState::Completed || cfg.is_negative {
        return direct;
    }
    let credited = linked_values
        .iter()
        .any(|&v| classify_value(cfg, v) == CompletionState::Completed);
    if credited {
        CompletionState::CompletedByOtherRecords
    } else {
        direct
    }
}

/// Partial-credit fraction a day contributes toward its sub-window count:
/// 1.0 when complete, `value / goal` clamped below 1.0 when partial.
pub fn day_credit(cfg: &GoalConfig, value: f64, state: CompletionState) -> f64 {
    match state {
        CompletionState::Completed | CompletionState::CompletedByOtherRecords => 1.0,
        CompletionState::PartiallyCompleted => {
            if cfg.reachable_value <= 0.0 {
                0.0
            } else {
                (value / cfg.reachable_value).clamp(0.0, 1.0 - f64::EPSILON)
            }
        }
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::habit::GoalConfig;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ctx(day: NaiveDate, today: NaiveDate) -> DayContext<'static> {
        DayContext {
            day,
            today,
            created_day: 0,
            tracked_days: None,
        }
    }

    #[test]
    fn positive_habit_value_bands() {
        let mut cfg = GoalConfig::boolean_daily();
        cfg.reachable_value = 5.0;
        assert_eq!(classify_value(&cfg, 0.0), CompletionState::Missed);
        assert_eq!(
            classify_value(&cfg, 2.0),
            CompletionState::PartiallyCompleted
        );
        assert_eq!(classify_value(&cfg, 5.0), CompletionState::Completed);
        assert_eq!(classify_value(&cfg, 9.0), CompletionState::Completed);
    }

    #[test]
    fn boundary_tolerance() {
        let mut cfg = GoalConfig::boolean_daily();
        cfg.reachable_value = 1.0;
        // Within epsilon of the goal counts as reached.
        assert_eq!(
            classify_value(&cfg, 1.0 - 0.000001),
            CompletionState::Completed
        );
        // A real shortfall does not.
        assert_eq!(
            classify_value(&cfg, 1.0 - 0.01),
            CompletionState::PartiallyCompleted
        );
    }

    #[test]
    fn classification_is_idempotent_and_monotone() {
        let mut cfg = GoalConfig::boolean_daily();
        cfg.reachable_value = 3.0;
        let first = classify_value(&cfg, 1.5);
        assert_eq!(first, classify_value(&cfg, 1.5));

        // Increasing value never moves classification backward.
        fn stage(s: CompletionState) -> u8 {
            match s {
                CompletionState::Missed => 0,
                CompletionState::PartiallyCompleted => 1,
                CompletionState::Completed => 2,
                _ => unreachable!(),
            }
        }
        let mut last = 0;
        for i in 0..400 {
            let v = i as f64 * 0.01;
            let s = stage(classify_value(&cfg, v));
            assert!(s >= last, "regressed at value {}", v);
            last = s;
        }
    }

    #[test]
    fn negative_habit_inversion() {
        let mut cfg = GoalConfig::boolean_daily();
        cfg.is_negative = true;
        cfg.reachable_value = 0.0;
        assert_eq!(classify_value(&cfg, 0.0), CompletionState::Completed);
        assert_eq!(classify_value(&cfg, 1.0), CompletionState::Failed);
    }

    #[test]
    fn future_and_precreation_days_disabled() {
        let cfg = GoalConfig::boolean_daily();
        let today = date(2026, 8, 30);
        assert_eq!(
            classify_day(&cfg, 1.0, &ctx(date(2026, 8, 31), today), &[]),
            CompletionState::Disabled
        );

        let mut early = ctx(date(2026, 8, 20), today);
        early.created_day = epoch_day(date(2026, 8, 25));
        assert_eq!(
            classify_day(&cfg, 1.0, &early, &[]),
            CompletionState::Disabled
        );
    }

    #[test]
    fn weekday_filter_disables_untracked_days() {
        let cfg = GoalConfig::boolean_daily();
        let today = date(2026, 8, 31); // a Monday
        let days = [Weekday::Mon, Weekday::Wed];
        let sunday = DayContext {
            day: date(2026, 8, 30),
            today,
            created_day: 0,
            tracked_days: Some(&days),
        };
        assert_eq!(
            classify_day(&cfg, 1.0, &sunday, &[]),
            CompletionState::Disabled
        );
        let monday = DayContext {
            day: date(2026, 8, 31),
            today,
            created_day: 0,
            tracked_days: Some(&days),
        };
        assert_eq!(
            classify_day(&cfg, 1.0, &monday, &[]),
            CompletionState::Completed
        );
    }

    #[test]
    fn linked_record_credits_the_viewer() {
        let cfg = GoalConfig::boolean_daily();
        let today = date(2026, 8, 30);
        let c = ctx(today, today);
        assert_eq!(
            classify_day(&cfg, 0.0, &c, &[1.0]),
            CompletionState::CompletedByOtherRecords
        );
        // A direct completion is never downgraded to a credited one.
        assert_eq!(
            classify_day(&cfg, 1.0, &c, &[1.0]),
            CompletionState::Completed
        );
        // A linked partial does not credit.
        assert_eq!(
            classify_day(&cfg, 0.0, &c, &[0.4]),
            CompletionState::Missed
        );
    }

    #[test]
    fn partial_credit_is_clamped_below_one() {
        let mut cfg = GoalConfig::boolean_daily();
        cfg.reachable_value = 4.0;
        let credit = day_credit(&cfg, 3.0, CompletionState::PartiallyCompleted);
        assert!((credit - 0.75).abs() < 1e-9);
        assert_eq!(day_credit(&cfg, 4.0, CompletionState::Completed), 1.0);
        assert_eq!(day_credit(&cfg, 0.0, CompletionState::Missed), 0.0);
    }
}
