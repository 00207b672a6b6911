use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrequencyType {
    Daily,
    Weekly,
    Monthly,
    /// "N times per Y days"; the Y lives in `GoalConfig::times_per_days`.
    PerDays,
}

impl FrequencyType {
    pub fn all() -> Vec<FrequencyType> {
        vec![
            FrequencyType::Daily,
            FrequencyType::Weekly,
            FrequencyType::Monthly,
            FrequencyType::PerDays,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FrequencyType::Daily => "daily",
            FrequencyType::Weekly => "weekly",
            FrequencyType::Monthly => "monthly",
            FrequencyType::PerDays => "per_days",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            FrequencyType::Daily => "Daily",
            FrequencyType::Weekly => "Weekly",
            FrequencyType::Monthly => "Monthly",
            FrequencyType::PerDays => "Per N days",
        }
    }
}

impl std::fmt::Display for FrequencyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for FrequencyType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(FrequencyType::Daily),
            "weekly" => Ok(FrequencyType::Weekly),
            "monthly" => Ok(FrequencyType::Monthly),
            "per_days" | "per-days" => Ok(FrequencyType::PerDays),
            _ => Err(anyhow::anyhow!(
                "Unknown frequency type '{}', expected one of: {}",
                s,
                FrequencyType::all()
                    .iter()
                    .map(|f| f.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputationKind {
    /// Use the rolling percentage as computed.
    Absolute,
    /// Scale each participant's raw total against the best raw total.
    Relative,
    /// Rank by the single highest daily value in the window.
    MaxValue,
}

impl ComputationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComputationKind::Absolute => "absolute",
            ComputationKind::Relative => "relative",
            ComputationKind::MaxValue => "max_value",
        }
    }
}

impl FromStr for ComputationKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "absolute" => Ok(ComputationKind::Absolute),
            "relative" => Ok(ComputationKind::Relative),
            "max_value" | "max-value" => Ok(ComputationKind::MaxValue),
            _ => Err(anyhow::anyhow!("Unknown computation kind: {}", s)),
        }
    }
}

/// Raised when a config is written or edited. The aggregator re-raises it
/// for a stored config that somehow bypassed validation rather than
/// coercing the cadence to something it never was.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("frequency type 'per_days' requires --per-days")]
    MissingPeriod,
    #[error("frequency {frequency} exceeds the period of {period} days")]
    InvertedRatio { frequency: u32, period: u32 },
    #[error("goal value must be a positive finite number, got {0}")]
    BadGoalValue(f64),
    #[error("negative habits need a finite, non-negative ceiling, got {0}")]
    BadCeiling(f64),
    #[error("frequency must be at least 1")]
    ZeroFrequency,
    #[error("target window must be at least 1 day")]
    ZeroWindow,
}

/// The computation-relevant slice of a habit (or challenge) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalConfig {
    /// Goal value per frequency unit; 1.0 is the conventional boolean habit.
    pub reachable_value: f64,
    /// Value applied on a bare `log` with no argument: "+1" delta or absolute.
    pub default_increment: String,
    /// Display unit, never used in computation.
    pub unit: Option<String>,
    /// Trailing window length in days for the rolling percentage.
    pub target_days: u32,
    pub frequency_type: FrequencyType,
    /// Required occurrences per frequency window, e.g. 3 times per week.
    pub frequency: u32,
    /// The "Y" of "N times per Y days"; only for `FrequencyType::PerDays`.
    pub times_per_days: Option<u32>,
    /// When true, lower values are better and `reachable_value` is a ceiling.
    pub is_negative: bool,
    pub computation: Option<ComputationKind>,
}

impl GoalConfig {
    pub fn boolean_daily() -> Self {
        Self {
            reachable_value: 1.0,
            default_increment: "+1".to_string(),
            unit: None,
            target_days: 30,
            frequency_type: FrequencyType::Daily,
            frequency: 1,
            times_per_days: None,
            is_negative: false,
            computation: None,
        }
    }

    /// Write-time validation. Readers may assume a stored config passed this.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frequency == 0 {
            return Err(ConfigError::ZeroFrequency);
        }
        if self.target_days == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if self.frequency_type == FrequencyType::PerDays {
            let period = self.times_per_days.ok_or(ConfigError::MissingPeriod)?;
            if self.frequency > period {
                return Err(ConfigError::InvertedRatio {
                    frequency: self.frequency,
                    period,
                });
            }
        }
        if !self.reachable_value.is_finite() {
            return Err(ConfigError::BadGoalValue(self.reachable_value));
        }
        if self.is_negative {
            if self.reachable_value < 0.0 {
                return Err(ConfigError::BadCeiling(self.reachable_value));
            }
        } else if self.reachable_value <= 0.0 {
            return Err(ConfigError::BadGoalValue(self.reachable_value));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Habit {
    pub id: Option<i64>,
    pub uuid: String,
    pub name: String,
    pub goal: GoalConfig,
    /// Weekdays on which the habit is tracked; `None` means every day.
    pub tracked_days: Option<Vec<Weekday>>,
    /// Epoch day the habit was created; earlier days classify as Disabled.
    pub created_day: i64,
    pub archived: bool,
}

impl Habit {
    pub fn tracks_weekday(&self, weekday: Weekday) -> bool {
        match &self.tracked_days {
            None => true,
            Some(days) => days.contains(&weekday),
        }
    }
}

/// Parse "mon,wed,fri" into weekdays; order preserved, duplicates rejected.
pub fn parse_tracked_days(s: &str) -> anyhow::Result<Vec<Weekday>> {
    let mut days = Vec::new();
    for part in s.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let day: Weekday = part
            .parse()
            .map_err(|_| anyhow::anyhow!("Unknown weekday: {}", part))?;
        if days.contains(&day) {
            return Err(anyhow::anyhow!("Weekday listed twice: {}", part));
        }
        days.push(day);
    }
    if days.is_empty() {
        return Err(anyhow::anyhow!("No weekdays in '{}'", s));
    }
    Ok(days)
}

/// Storage form of the weekday filter: "mon,wed,fri".
pub fn tracked_days_to_str(days: &[Weekday]) -> String {
    days.iter()
        .map(|d| match d {
            Weekday::Mon => "mon",
            Weekday::Tue => "tue",
            Weekday::Wed => "wed",
            Weekday::Thu => "thu",
            Weekday::Fri => "fri",
            Weekday::Sat => "sat",
            Weekday::Sun => "sun",
        })
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_days_requires_period() {
        let mut cfg = GoalConfig::boolean_daily();
        cfg.frequency_type = FrequencyType::PerDays;
        cfg.times_per_days = None;
        assert_eq!(cfg.validate(), Err(ConfigError::MissingPeriod));
    }

    #[test]
    fn inverted_ratio_rejected() {
        let mut cfg = GoalConfig::boolean_daily();
        cfg.frequency_type = FrequencyType::PerDays;
        cfg.frequency = 5;
        cfg.times_per_days = Some(3);
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::InvertedRatio {
                frequency: 5,
                period: 3
            })
        );
    }

    #[test]
    fn negative_habit_allows_zero_ceiling() {
        let mut cfg = GoalConfig::boolean_daily();
        cfg.is_negative = true;
        cfg.reachable_value = 0.0;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn positive_habit_rejects_zero_goal() {
        let mut cfg = GoalConfig::boolean_daily();
        cfg.reachable_value = 0.0;
        assert!(matches!(cfg.validate(), Err(ConfigError::BadGoalValue(_))));
    }

    #[test]
    fn unknown_frequency_lists_the_choices() {
        let err = FrequencyType::from_str("fortnightly").unwrap_err().to_string();
        assert!(err.contains("daily"));
        assert!(err.contains("per_days"));
    }

    #[test]
    fn weekday_membership() {
        let habit = Habit {
            id: None,
            uuid: "u".to_string(),
            name: "gym".to_string(),
            goal: GoalConfig::boolean_daily(),
            tracked_days: Some(vec![Weekday::Mon, Weekday::Wed]),
            created_day: 0,
            archived: false,
        };
        assert!(habit.tracks_weekday(Weekday::Mon));
        assert!(!habit.tracks_weekday(Weekday::Tue));

        let unfiltered = Habit {
            tracked_days: None,
            ..habit
        };
        assert!(unfiltered.tracks_weekday(Weekday::Sun));
    }

    #[test]
    fn tracked_days_round_trip() {
        let days = parse_tracked_days("mon, wed,fri").unwrap();
        assert_eq!(tracked_days_to_str(&days), "mon,wed,fri");
        assert!(parse_tracked_days("mon,mon").is_err());
        assert!(parse_tracked_days("noday").is_err());
    }
}
