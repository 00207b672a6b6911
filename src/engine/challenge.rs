use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;

use super::aggregate::{
    habit_progress, max_daily_value, raw_total, relative_percentages, ProgressInput,
};
use crate::models::challenge::{Account, Challenge, ChallengeState, Medal, MedalKind, MedalScope};
use crate::models::habit::{ComputationKind, ConfigError};
use crate::models::record::{date_from_epoch_day, epoch_day};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TransitionError {
    #[error("cannot move challenge from {from} to {to}")]
    Invalid {
        from: &'static str,
        to: &'static str,
    },
}

/// Legal lifecycle moves: Created -> Proposed -> Active -> Completed, with
/// Proposed -> NotActive for proposals that lose the selection cycle.
pub fn check_transition(from: ChallengeState, to: ChallengeState) -> Result<(), TransitionError> {
    let ok = matches!(
        (from, to),
        (ChallengeState::Created, ChallengeState::Proposed)
            | (ChallengeState::Proposed, ChallengeState::Active)
            | (ChallengeState::Proposed, ChallengeState::NotActive)
            | (ChallengeState::Active, ChallengeState::Completed)
    );
    if ok {
        Ok(())
    } else {
        Err(TransitionError::Invalid {
            from: from.as_str(),
            to: to.as_str(),
        })
    }
}

/// One proposal's vote standing at selection time.
#[derive(Debug, Clone)]
pub struct VoteTally {
    pub challenge_id: i64,
    /// Net score: up-votes minus down-votes.
    pub net: i64,
    pub proposed_at: String,
}

/// The proposal with the highest net vote score wins; ties break on the
/// earliest proposal timestamp.
pub fn select_winner(tallies: &[VoteTally]) -> Option<i64> {
    tallies
        .iter()
        .min_by(|a, b| {
            b.net
                .cmp(&a.net)
                .then_with(|| a.proposed_at.cmp(&b.proposed_at))
        })
        .map(|t| t.challenge_id)
}

/// A participant's snapshot loaded up front by the caller, so one
/// evaluation observes a consistent view of every record stream.
#[derive(Debug, Clone)]
pub struct ParticipantRecords {
    pub account: Account,
    pub records: BTreeMap<i64, f64>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Standing {
    pub account_id: i64,
    pub account_name: String,
    /// 1-based leaderboard rank.
    pub rank: u32,
    /// Ranking score: exact percentage for Absolute/Relative, the single
    /// best daily value for MaxValue.
    pub score: f64,
    pub medal: Option<MedalKind>,
}

#[derive(Debug, Clone)]
pub struct ChallengeOutcome {
    pub standings: Vec<Standing>,
    pub per_participant_percentage: BTreeMap<i64, f64>,
    pub medals: BTreeMap<i64, Medal>,
}

/// Evaluate a challenge over `[start_day, min(today, end_day)]`. Medals are
/// assigned only when `freeze` is set (the end-of-challenge close).
pub fn evaluate(
    challenge: &Challenge,
    participants: &[ParticipantRecords],
    today: NaiveDate,
    freeze: bool,
) -> Result<ChallengeOutcome, ConfigError> {
    let start = date_from_epoch_day(challenge.start_day);
    let end = date_from_epoch_day(challenge.end_day).min(today);
    let span_days = (epoch_day(end) - challenge.start_day + 1).max(1) as u32;

    // The challenge's own day span is the evaluation window.
    let mut cfg = challenge.goal.clone();
    cfg.target_days = span_days;
    let kind = cfg.computation.unwrap_or(ComputationKind::Absolute);

    let mut scores: Vec<(f64, &ParticipantRecords)> = Vec::new();
    let mut percentages: BTreeMap<i64, f64> = BTreeMap::new();

    match kind {
        ComputationKind::Absolute => {
            for p in participants {
                let mut input = ProgressInput::new(&cfg, &p.records, today);
                input.window_end = end;
                input.created_day = challenge.start_day;
                let progress = habit_progress(&input)?;
                percentages.insert(p.account.id, progress.percentage);
                scores.push((progress.percentage, p));
            }
        }
        ComputationKind::Relative => {
            let totals: BTreeMap<i64, f64> = participants
                .iter()
                .map(|p| (p.account.id, raw_total(&p.records, start, end)))
                .collect();
            percentages = relative_percentages(&totals);
            for p in participants {
                scores.push((percentages[&p.account.id], p));
            }
        }
        ComputationKind::MaxValue => {
            // "As much as possible": the percentage map carries the best
            // single-day value, not a ratio.
            for p in participants {
                let best = max_daily_value(&p.records, start, end);
                percentages.insert(p.account.id, best);
                scores.push((best, p));
            }
        }
    }

    // Higher score first; ties go to the earlier join, then to the name.
    scores.sort_by(|(sa, pa), (sb, pb)| {
        sb.partial_cmp(sa)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| pa.account.joined_at.cmp(&pb.account.joined_at))
            .then_with(|| pa.account.name.cmp(&pb.account.name))
    });

    let mut medals = BTreeMap::new();
    let standings = scores
        .iter()
        .enumerate()
        .map(|(i, (score, p))| {
            let rank = i as u32 + 1;
            let medal = if freeze { MedalKind::for_rank(rank) } else { None };
            if let Some(kind) = medal {
                let scope = if spans_exact_month(start, date_from_epoch_day(challenge.end_day)) {
                    MedalScope::Monthly
                } else {
                    MedalScope::Challenge
                };
                medals.insert(p.account.id, Medal { kind, scope });
            }
            Standing {
                account_id: p.account.id,
                account_name: p.account.name.clone(),
                rank,
                score: *score,
                medal,
            }
        })
        .collect();

    Ok(ChallengeOutcome {
        standings,
        per_participant_percentage: percentages,
        medals,
    })
}

/// True when the span covers exactly one calendar month, the
/// habit-of-the-month case.
fn spans_exact_month(start: NaiveDate, end: NaiveDate) -> bool {
    start.day() == 1
        && start.year() == end.year()
        && start.month() == end.month()
        && end.day() == super::frequency::days_in_month(end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::habit::GoalConfig;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn account(id: i64, name: &str, joined_at: &str) -> Account {
        Account {
            id,
            name: name.to_string(),
            joined_at: joined_at.to_string(),
        }
    }

    fn participant(id: i64, name: &str, joined: &str, start: NaiveDate, values: &[f64]) -> ParticipantRecords {
        let records = values
            .iter()
            .enumerate()
            .map(|(i, &v)| (epoch_day(start) + i as i64, v))
            .collect();
        ParticipantRecords {
            account: account(id, name, joined),
            records,
        }
    }

    fn challenge(kind: ComputationKind, start: NaiveDate, end: NaiveDate) -> Challenge {
        let mut goal = GoalConfig::boolean_daily();
        goal.computation = Some(kind);
        Challenge {
            id: Some(1),
            name: "test".to_string(),
            goal,
            start_day: epoch_day(start),
            end_day: epoch_day(end),
            state: ChallengeState::Active,
            proposed_at: "2026-07-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn lifecycle_legality() {
        use ChallengeState::*;
        assert!(check_transition(Created, Proposed).is_ok());
        assert!(check_transition(Proposed, Active).is_ok());
        assert!(check_transition(Proposed, NotActive).is_ok());
        assert!(check_transition(Active, Completed).is_ok());
        assert!(check_transition(Created, Active).is_err());
        assert!(check_transition(Completed, Active).is_err());
        assert!(check_transition(NotActive, Active).is_err());
    }

    #[test]
    fn selection_prefers_net_then_earliest() {
        let tallies = vec![
            VoteTally {
                challenge_id: 1,
                net: 2,
                proposed_at: "2026-08-02T10:00:00Z".to_string(),
            },
            VoteTally {
                challenge_id: 2,
                net: 3,
                proposed_at: "2026-08-03T10:00:00Z".to_string(),
            },
            VoteTally {
                challenge_id: 3,
                net: 3,
                proposed_at: "2026-08-01T10:00:00Z".to_string(),
            },
        ];
        assert_eq!(select_winner(&tallies), Some(3));
        assert_eq!(select_winner(&[]), None);
    }

    #[test]
    fn max_value_ranks_by_best_day() {
        let start = date(2026, 8, 1);
        let end = date(2026, 8, 3);
        let c = challenge(ComputationKind::MaxValue, start, end);
        let parts = vec![
            participant(1, "a", "2026-01-01T00:00:00Z", start, &[5.0, 10.0, 3.0]),
            participant(2, "b", "2026-01-01T00:00:00Z", start, &[8.0, 8.0, 8.0]),
        ];
        let outcome = evaluate(&c, &parts, end, false).unwrap();
        assert_eq!(outcome.standings[0].account_id, 1);
        assert_eq!(outcome.standings[0].score, 10.0);
        assert_eq!(outcome.standings[1].account_id, 2);
        assert!(outcome.medals.is_empty());
    }

    #[test]
    fn relative_tops_out_the_leader() {
        let start = date(2026, 8, 1);
        let end = date(2026, 8, 4);
        let c = challenge(ComputationKind::Relative, start, end);
        let parts = vec![
            participant(1, "a", "2026-01-01T00:00:00Z", start, &[10.0, 10.0, 10.0, 10.0]),
            participant(2, "b", "2026-01-01T00:00:00Z", start, &[5.0, 5.0, 5.0, 5.0]),
            participant(3, "c", "2026-01-01T00:00:00Z", start, &[0.0, 0.0, 0.0, 0.0]),
        ];
        let outcome = evaluate(&c, &parts, end, false).unwrap();
        assert_eq!(outcome.per_participant_percentage[&1], 100.0);
        assert_eq!(outcome.per_participant_percentage[&2], 50.0);
        assert_eq!(outcome.per_participant_percentage[&3], 0.0);
    }

    #[test]
    fn ties_break_on_join_time_then_name() {
        let start = date(2026, 8, 1);
        let end = date(2026, 8, 2);
        let c = challenge(ComputationKind::Absolute, start, end);
        let parts = vec![
            participant(1, "zoe", "2026-03-01T00:00:00Z", start, &[1.0, 1.0]),
            participant(2, "amy", "2026-01-01T00:00:00Z", start, &[1.0, 1.0]),
            participant(3, "bea", "2026-03-01T00:00:00Z", start, &[1.0, 1.0]),
        ];
        let outcome = evaluate(&c, &parts, end, false).unwrap();
        let order: Vec<i64> = outcome.standings.iter().map(|s| s.account_id).collect();
        assert_eq!(order, vec![2, 3, 1]);
    }

    #[test]
    fn freezing_awards_top_three() {
        let start = date(2026, 8, 1);
        let end = date(2026, 8, 2);
        let c = challenge(ComputationKind::Relative, start, end);
        let parts = vec![
            participant(1, "a", "2026-01-01T00:00:00Z", start, &[4.0, 4.0]),
            participant(2, "b", "2026-01-02T00:00:00Z", start, &[3.0, 3.0]),
            participant(3, "c", "2026-01-03T00:00:00Z", start, &[2.0, 2.0]),
            participant(4, "d", "2026-01-04T00:00:00Z", start, &[1.0, 1.0]),
        ];
        let outcome = evaluate(&c, &parts, end, true).unwrap();
        assert_eq!(outcome.medals[&1].kind, MedalKind::Gold);
        assert_eq!(outcome.medals[&2].kind, MedalKind::Silver);
        assert_eq!(outcome.medals[&3].kind, MedalKind::Bronze);
        assert!(!outcome.medals.contains_key(&4));
        assert_eq!(outcome.medals[&1].scope, MedalScope::Challenge);
    }

    #[test]
    fn month_long_challenge_awards_monthly_medals() {
        let start = date(2026, 8, 1);
        let end = date(2026, 8, 31);
        let c = challenge(ComputationKind::Absolute, start, end);
        let parts = vec![participant(
            1,
            "a",
            "2026-01-01T00:00:00Z",
            start,
            &[1.0; 31],
        )];
        let outcome = evaluate(&c, &parts, end, true).unwrap();
        assert_eq!(outcome.medals[&1].scope, MedalScope::Monthly);
        assert_eq!(outcome.per_participant_percentage[&1], 100.0);
    }

    #[test]
    fn window_clamps_to_today_mid_challenge() {
        let start = date(2026, 8, 1);
        let end = date(2026, 8, 31);
        let c = challenge(ComputationKind::Absolute, start, end);
        // Ten completed days, evaluated on day ten of the challenge.
        let parts = vec![participant(
            1,
            "a",
            "2026-01-01T00:00:00Z",
            start,
            &[1.0; 10],
        )];
        let outcome = evaluate(&c, &parts, date(2026, 8, 10), false).unwrap();
        assert_eq!(outcome.per_participant_percentage[&1].round() as u32, 100);
    }
}
