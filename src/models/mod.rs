pub mod challenge;
pub mod habit;
pub mod record;

pub use challenge::{Account, Challenge, ChallengeState, Medal, MedalKind, MedalScope};
pub use habit::{
    parse_tracked_days, tracked_days_to_str, ComputationKind, ConfigError, FrequencyType,
    GoalConfig, Habit,
};
pub use record::{
    date_from_epoch_day, epoch_day, validate_record_value, HabitRecord, RecordInput,
};
