use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::collections::BTreeMap;

use super::classify::{classify_day, day_credit, CompletionState, DayContext};
use super::frequency::{days_in_month, FrequencyWindow};
use crate::models::habit::{ConfigError, FrequencyType, GoalConfig};
use crate::models::record::epoch_day;

/// Snapshot input for one habit (or one challenge participant). Records are
/// keyed by epoch day; absent days are value 0.
#[derive(Debug, Clone)]
pub struct ProgressInput<'a> {
    pub cfg: &'a GoalConfig,
    pub records: &'a BTreeMap<i64, f64>,
    /// Record snapshots of accounts linked to a shared habit.
    pub linked: &'a [BTreeMap<i64, f64>],
    pub today: NaiveDate,
    /// Last day of the trailing window; `today` for habits, the clamped
    /// challenge end for challenge evaluation.
    pub window_end: NaiveDate,
    pub created_day: i64,
    pub tracked_days: Option<&'a [Weekday]>,
}

impl<'a> ProgressInput<'a> {
    pub fn new(
        cfg: &'a GoalConfig,
        records: &'a BTreeMap<i64, f64>,
        today: NaiveDate,
    ) -> Self {
        Self {
            cfg,
            records,
            linked: &[],
            today,
            window_end: today,
            created_day: i64::MIN,
            tracked_days: None,
        }
    }

    pub fn window_start(&self) -> NaiveDate {
        self.window_end - Duration::days(self.cfg.target_days as i64 - 1)
    }
}

#[derive(Debug, Clone)]
pub struct HabitProgress {
    /// Exact value, kept for tie-breaking.
    pub percentage: f64,
    /// Rounded for rings and leaderboard display.
    pub display_percent: u32,
    pub per_day: BTreeMap<i64, CompletionState>,
}

/// One frequency-sized bucket inside the evaluation window. Truncated
/// buckets at the old edge keep their full cadence length for weighting.
struct Bucket {
    days: Vec<NaiveDate>,
    full_len: u32,
    required: u32,
}

fn partition(
    cfg: &GoalConfig,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<Bucket>, ConfigError> {
    let mut buckets = Vec::new();
    if cfg.frequency_type == FrequencyType::Monthly {
        // Monthly buckets align to calendar months, clipped to the window.
        let mut day = start;
        while day <= end {
            let month_len = days_in_month(day);
            let mut days = Vec::new();
            let month = (day.year(), day.month());
            while day <= end && (day.year(), day.month()) == month {
                days.push(day);
                day += Duration::days(1);
            }
            buckets.push(Bucket {
                days,
                full_len: month_len,
                required: cfg.frequency,
            });
        }
        return Ok(buckets);
    }

    // Fixed-size buckets walked backwards from the window end, so the
    // current (most recent) bucket is always complete.
    let window = FrequencyWindow::resolve(cfg, end)?;
    let size = window.days.max(1) as i64;
    let mut bucket_end = end;
    while bucket_end >= start {
        let bucket_start = (bucket_end - Duration::days(size - 1)).max(start);
        let mut days = Vec::new();
        let mut d = bucket_start;
        while d <= bucket_end {
            days.push(d);
            d += Duration::days(1);
        }
        buckets.push(Bucket {
            days,
            full_len: window.days,
            required: window.required,
        });
        bucket_end -= Duration::days(size);
    }
    Ok(buckets)
}

fn linked_values_for(input: &ProgressInput, day: i64) -> Vec<f64> {
    input
        .linked
        .iter()
        .filter_map(|m| m.get(&day).copied())
        .collect()
}

/// Roll a trailing window of `target_days` up into one percentage and a
/// per-day classification map. Disabled days (untracked weekdays, days
/// before the habit existed) carry no weight, so a fully adherent habit
/// scores 100 no matter how sparse its tracking schedule is.
pub fn habit_progress(input: &ProgressInput) -> Result<HabitProgress, ConfigError> {
    let start = input.window_start();
    let end = input.window_end;

    let mut per_day = BTreeMap::new();
    let mut day = start;
    while day <= end {
        let key = epoch_day(day);
        let value = input.records.get(&key).copied().unwrap_or(0.0);
        let ctx = DayContext {
            day,
            today: input.today,
            created_day: input.created_day,
            tracked_days: input.tracked_days,
        };
        let linked = linked_values_for(input, key);
        per_day.insert(key, classify_day(input.cfg, value, &ctx, &linked));
        day += Duration::days(1);
    }

    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    for bucket in partition(input.cfg, start, end)? {
        if bucket.required == 0 || bucket.full_len == 0 {
            continue;
        }
        let mut achieved = 0.0;
        let mut admitted = 0u32;
        for d in &bucket.days {
            let key = epoch_day(*d);
            let state = per_day[&key];
            if state == CompletionState::Disabled {
                continue;
            }
            admitted += 1;
            let value = input.records.get(&key).copied().unwrap_or(0.0);
            achieved += day_credit(input.cfg, value, state);
        }
        if admitted == 0 {
            continue;
        }
        // A bucket can never demand more days than it admits.
        let required = bucket.required.min(admitted);
        let contribution = (achieved / required as f64).min(1.0);
        let weight = admitted as f64 / bucket.full_len as f64;
        weighted_sum += contribution * weight;
        weight_total += weight;
    }

    let percentage = if weight_total > 0.0 {
        weighted_sum / weight_total * 100.0
    } else {
        0.0
    };

    Ok(HabitProgress {
        percentage,
        display_percent: percentage.round() as u32,
        per_day,
    })
}

/// Sum of raw logged values across the window, for `Relative` challenges.
pub fn raw_total(records: &BTreeMap<i64, f64>, start: NaiveDate, end: NaiveDate) -> f64 {
    records
        .range(epoch_day(start)..=epoch_day(end))
        .map(|(_, v)| v)
        .sum()
}

/// Highest single daily value in the window, for `MaxValue` challenges.
pub fn max_daily_value(records: &BTreeMap<i64, f64>, start: NaiveDate, end: NaiveDate) -> f64 {
    records
        .range(epoch_day(start)..=epoch_day(end))
        .map(|(_, v)| *v)
        .fold(0.0, f64::max)
}

/// Express each raw total against the best one; a best of zero yields all
/// zeros rather than NaN.
pub fn relative_percentages(totals: &BTreeMap<i64, f64>) -> BTreeMap<i64, f64> {
    let best = totals.values().copied().fold(0.0, f64::max);
    totals
        .iter()
        .map(|(&id, &raw)| {
            let pct = if best > 0.0 { raw / best * 100.0 } else { 0.0 };
            (id, pct)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::habit::GoalConfig;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record_run(start: NaiveDate, values: &[f64]) -> BTreeMap<i64, f64> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| (epoch_day(start + Duration::days(i as i64)), v))
            .collect()
    }

    #[test]
    fn full_daily_month_is_one_hundred() {
        let cfg = GoalConfig::boolean_daily();
        let today = date(2026, 8, 30);
        let start = today - Duration::days(29);
        let records = record_run(start, &[1.0; 30]);
        let progress = habit_progress(&ProgressInput::new(&cfg, &records, today)).unwrap();
        assert_eq!(progress.display_percent, 100);
        assert!(progress
            .per_day
            .values()
            .all(|s| *s == CompletionState::Completed));
    }

    #[test]
    fn empty_window_is_zero() {
        let cfg = GoalConfig::boolean_daily();
        let records = BTreeMap::new();
        let progress =
            habit_progress(&ProgressInput::new(&cfg, &records, date(2026, 8, 30))).unwrap();
        assert_eq!(progress.display_percent, 0);
    }

    #[test]
    fn weekly_three_of_seven_fills_the_bucket() {
        let mut cfg = GoalConfig::boolean_daily();
        cfg.frequency_type = FrequencyType::Weekly;
        cfg.frequency = 3;
        cfg.target_days = 7;
        let today = date(2026, 8, 30);
        let start = today - Duration::days(6);
        // Any three days of the week satisfy the bucket.
        let records = record_run(start, &[1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0]);
        let progress = habit_progress(&ProgressInput::new(&cfg, &records, today)).unwrap();
        assert_eq!(progress.display_percent, 100);
    }

    #[test]
    fn one_day_cannot_overfill_a_bucket() {
        let mut cfg = GoalConfig::boolean_daily();
        cfg.frequency_type = FrequencyType::Weekly;
        cfg.frequency = 3;
        cfg.target_days = 7;
        let today = date(2026, 8, 30);
        // One enormous day is still a single occurrence: 1 of 3.
        let mut records = BTreeMap::new();
        records.insert(epoch_day(today), 500.0);
        let progress = habit_progress(&ProgressInput::new(&cfg, &records, today)).unwrap();
        assert_eq!(progress.display_percent, 33);
    }

    #[test]
    fn partial_days_credit_fractionally() {
        let mut cfg = GoalConfig::boolean_daily();
        cfg.reachable_value = 4.0;
        cfg.target_days = 2;
        let today = date(2026, 8, 30);
        let start = today - Duration::days(1);
        // One full day, one half day under a daily cadence: (1 + 0.5) / 2.
        let records = record_run(start, &[4.0, 2.0]);
        let progress = habit_progress(&ProgressInput::new(&cfg, &records, today)).unwrap();
        assert_eq!(progress.display_percent, 75);
        assert_eq!(
            progress.per_day[&epoch_day(today)],
            CompletionState::PartiallyCompleted
        );
    }

    #[test]
    fn truncated_bucket_weighs_proportionally() {
        let mut cfg = GoalConfig::boolean_daily();
        cfg.frequency_type = FrequencyType::Weekly;
        cfg.frequency = 7;
        cfg.target_days = 9;
        let today = date(2026, 8, 30);
        let start = today - Duration::days(8);
        // Recent full week complete, older 2-day tail empty. The tail
        // weighs 2/7, so the aggregate stays close to the full week.
        let records = record_run(start + Duration::days(2), &[1.0; 7]);
        let progress = habit_progress(&ProgressInput::new(&cfg, &records, today)).unwrap();
        // 1.0 * 1 + 0.0 * (2/7) over weight 9/7 -> 77.8%.
        assert_eq!(progress.display_percent, 78);
    }

    #[test]
    fn monthly_buckets_follow_calendar_months() {
        let mut cfg = GoalConfig::boolean_daily();
        cfg.frequency_type = FrequencyType::Monthly;
        cfg.frequency = 10;
        cfg.target_days = 31;
        let today = date(2026, 3, 15);
        // Ten completions inside March; the February tail stays empty.
        let records = record_run(date(2026, 3, 1), &[1.0; 10]);
        let progress = habit_progress(&ProgressInput::new(&cfg, &records, today)).unwrap();
        // March slice: 10/10 with weight 15/31; February tail: 0 with
        // weight 16/28.
        let expected: f64 = (1.0 * (15.0 / 31.0)) / (15.0 / 31.0 + 16.0 / 28.0) * 100.0;
        assert_eq!(progress.display_percent, expected.round() as u32);
    }

    #[test]
    fn weekday_filter_does_not_dilute_the_percentage() {
        let cfg = GoalConfig::boolean_daily();
        let today = date(2026, 8, 30); // a Sunday
        let start = today - Duration::days(29);
        let tracked = [Weekday::Mon, Weekday::Wed, Weekday::Fri];
        // Every tracked day logged, every untracked day untouched.
        let mut records = BTreeMap::new();
        let mut d = start;
        while d <= today {
            if tracked.contains(&d.weekday()) {
                records.insert(epoch_day(d), 1.0);
            }
            d += Duration::days(1);
        }
        let mut input = ProgressInput::new(&cfg, &records, today);
        input.tracked_days = Some(&tracked);
        let progress = habit_progress(&input).unwrap();
        assert_eq!(progress.display_percent, 100);
    }

    #[test]
    fn missed_tracked_days_still_count_against() {
        let cfg = GoalConfig::boolean_daily();
        let today = date(2026, 8, 30);
        let start = today - Duration::days(29); // 2026-08-01
        let tracked = [Weekday::Mon, Weekday::Wed, Weekday::Fri];
        // Only the Mondays: 4 of the 12 tracked days in August 1..30.
        let mut records = BTreeMap::new();
        let mut d = start;
        while d <= today {
            if d.weekday() == Weekday::Mon {
                records.insert(epoch_day(d), 1.0);
            }
            d += Duration::days(1);
        }
        let mut input = ProgressInput::new(&cfg, &records, today);
        input.tracked_days = Some(&tracked);
        let progress = habit_progress(&input).unwrap();
        assert_eq!(progress.display_percent, 33);
    }

    #[test]
    fn days_before_creation_carry_no_weight() {
        let cfg = GoalConfig::boolean_daily();
        let today = date(2026, 8, 30);
        let created = today - Duration::days(9);
        // A ten-day-old habit with every day logged fills the 30-day ring.
        let records = record_run(created, &[1.0; 10]);
        let mut input = ProgressInput::new(&cfg, &records, today);
        input.created_day = epoch_day(created);
        let progress = habit_progress(&input).unwrap();
        assert_eq!(progress.display_percent, 100);
    }

    #[test]
    fn invalid_cadence_is_an_error_not_a_default() {
        let mut cfg = GoalConfig::boolean_daily();
        cfg.frequency_type = FrequencyType::PerDays;
        cfg.times_per_days = None;
        let records = BTreeMap::new();
        let result = habit_progress(&ProgressInput::new(&cfg, &records, date(2026, 8, 30)));
        assert_eq!(result.unwrap_err(), ConfigError::MissingPeriod);
    }

    #[test]
    fn relative_scaling_tops_out_the_leader() {
        let mut totals = BTreeMap::new();
        totals.insert(1, 40.0);
        totals.insert(2, 20.0);
        totals.insert(3, 0.0);
        let pct = relative_percentages(&totals);
        assert_eq!(pct[&1], 100.0);
        assert_eq!(pct[&2], 50.0);
        assert_eq!(pct[&3], 0.0);
    }

    #[test]
    fn relative_with_no_activity_is_all_zero() {
        let mut totals = BTreeMap::new();
        totals.insert(1, 0.0);
        totals.insert(2, 0.0);
        let pct = relative_percentages(&totals);
        assert!(pct.values().all(|&p| p == 0.0));
    }

    #[test]
    fn raw_and_max_respect_window_bounds() {
        let start = date(2026, 8, 1);
        let records = record_run(start, &[5.0, 10.0, 3.0]);
        assert_eq!(raw_total(&records, start, date(2026, 8, 3)), 18.0);
        assert_eq!(raw_total(&records, date(2026, 8, 2), date(2026, 8, 3)), 13.0);
        assert_eq!(max_daily_value(&records, start, date(2026, 8, 3)), 10.0);
        assert_eq!(max_daily_value(&records, date(2026, 8, 3), date(2026, 8, 3)), 3.0);
    }
}
