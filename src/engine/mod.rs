//! Pure progress-computation engine: no I/O, no shared state. Callers load
//! record snapshots up front and hand them in as plain maps.

pub mod aggregate;
pub mod challenge;
pub mod classify;
pub mod frequency;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::record::date_from_epoch_day;
use classify::CompletionState;

/// Tolerance for all value comparisons in this domain. User input and
/// default-delta arithmetic accumulate rounding error; exact-boundary
/// completions must still classify as complete.
pub const EPS: f64 = 1e-5;

pub fn values_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPS
}

/// True when `value` reaches `goal`, allowing ε of drift below it.
pub fn reaches(value: f64, goal: f64) -> bool {
    value >= goal - EPS
}

/// Emitted when a day's classification changes after a record write.
/// Delivery (notifications etc.) belongs to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub habit_uuid: String,
    pub epoch_day: i64,
    pub old: CompletionState,
    pub new: CompletionState,
}

impl std::fmt::Display for CompletionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}: {} -> {}",
            self.habit_uuid,
            date_from_epoch_day(self.epoch_day),
            self.old.as_str(),
            self.new.as_str()
        )
    }
}

/// Diff two per-day classification maps into transition events. Days absent
/// from one side count as transitions from/to their computed state only when
/// present in `after`; dropped days emit nothing.
pub fn completion_events(
    habit_uuid: &str,
    before: &BTreeMap<i64, CompletionState>,
    after: &BTreeMap<i64, CompletionState>,
) -> Vec<CompletionEvent> {
    let mut events = Vec::new();
    for (&day, &new) in after {
        let old = before.get(&day).copied().unwrap_or(CompletionState::Missed);
        if old != new {
            events.push(CompletionEvent {
                habit_uuid: habit_uuid.to_string(),
                epoch_day: day,
                old,
                new,
            });
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epsilon_comparisons() {
        assert!(values_eq(1.0, 1.0 + 1e-6));
        assert!(!values_eq(1.0, 1.0 + 1e-4));
        assert!(reaches(0.999999, 1.0));
        assert!(!reaches(0.99, 1.0));
    }

    #[test]
    fn events_only_for_changed_days() {
        let mut before = BTreeMap::new();
        before.insert(10, CompletionState::Missed);
        before.insert(11, CompletionState::Completed);
        let mut after = BTreeMap::new();
        after.insert(10, CompletionState::Completed);
        after.insert(11, CompletionState::Completed);

        let events = completion_events("h1", &before, &after);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].epoch_day, 10);
        assert_eq!(events[0].old, CompletionState::Missed);
        assert_eq!(events[0].new, CompletionState::Completed);
    }
}
