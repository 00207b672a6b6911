use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::habit::GoalConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeState {
    Created,
    Proposed,
    Active,
    Completed,
    /// Lost the selection cycle or expired unselected.
    NotActive,
}

impl ChallengeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeState::Created => "created",
            ChallengeState::Proposed => "proposed",
            ChallengeState::Active => "active",
            ChallengeState::Completed => "completed",
            ChallengeState::NotActive => "not_active",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ChallengeState::Created => "Created",
            ChallengeState::Proposed => "Proposed",
            ChallengeState::Active => "Active",
            ChallengeState::Completed => "Completed",
            ChallengeState::NotActive => "Not active",
        }
    }
}

impl FromStr for ChallengeState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(ChallengeState::Created),
            "proposed" => Ok(ChallengeState::Proposed),
            "active" => Ok(ChallengeState::Active),
            "completed" => Ok(ChallengeState::Completed),
            "not_active" => Ok(ChallengeState::NotActive),
            _ => Err(anyhow::anyhow!("Unknown challenge state: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MedalKind {
    Gold,
    Silver,
    Bronze,
}

impl MedalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MedalKind::Gold => "gold",
            MedalKind::Silver => "silver",
            MedalKind::Bronze => "bronze",
        }
    }

    /// Medal for a 1-based leaderboard rank, if any.
    pub fn for_rank(rank: u32) -> Option<MedalKind> {
        match rank {
            1 => Some(MedalKind::Gold),
            2 => Some(MedalKind::Silver),
            3 => Some(MedalKind::Bronze),
            _ => None,
        }
    }
}

impl FromStr for MedalKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gold" => Ok(MedalKind::Gold),
            "silver" => Ok(MedalKind::Silver),
            "bronze" => Ok(MedalKind::Bronze),
            _ => Err(anyhow::anyhow!("Unknown medal kind: {}", s)),
        }
    }
}

/// Standard habit-of-the-month medals and challenge medals are tracked
/// separately on the same scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MedalScope {
    Monthly,
    Challenge,
}

impl MedalScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            MedalScope::Monthly => "monthly",
            MedalScope::Challenge => "challenge",
        }
    }
}

impl FromStr for MedalScope {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monthly" => Ok(MedalScope::Monthly),
            "challenge" => Ok(MedalScope::Challenge),
            _ => Err(anyhow::anyhow!("Unknown medal scope: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medal {
    pub kind: MedalKind,
    pub scope: MedalScope,
}

/// A time-boxed shared goal with one computation rule for all participants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub id: Option<i64>,
    pub name: String,
    pub goal: GoalConfig,
    pub start_day: i64,
    pub end_day: i64,
    pub state: ChallengeState,
    /// RFC 3339 timestamp; selection ties break on the earliest proposal.
    pub proposed_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub name: String,
    /// RFC 3339 timestamp; leaderboard ties break on the earliest join.
    pub joined_at: String,
}
