use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::models::{
    parse_tracked_days, tracked_days_to_str, Account, Challenge, ChallengeState, ComputationKind,
    FrequencyType, GoalConfig, Habit, HabitRecord, Medal, MedalKind, MedalScope,
};

/// The seeded device-owner account.
pub const OWNER_ACCOUNT_ID: i64 = 1;

fn invalid(e: impl std::fmt::Display) -> rusqlite::Error {
    rusqlite::Error::InvalidParameterName(e.to_string())
}

// ─── Accounts ────────────────────────────────────────────────────────────────

pub struct AccountRepo;

impl AccountRepo {
    pub fn get(conn: &Connection, id: i64) -> Result<Option<Account>> {
        conn.query_row(
            "SELECT id, name, joined_at FROM accounts WHERE id = ?1",
            params![id],
            |row| {
                Ok(Account {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    joined_at: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(anyhow::Error::from)
    }

    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Account>> {
        conn.query_row(
            "SELECT id, name, joined_at FROM accounts WHERE name = ?1",
            params![name],
            |row| {
                Ok(Account {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    joined_at: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(anyhow::Error::from)
    }

    pub fn get_or_create(conn: &Connection, name: &str) -> Result<Account> {
        if let Some(account) = Self::find_by_name(conn, name)? {
            return Ok(account);
        }
        conn.execute("INSERT INTO accounts (name) VALUES (?1)", params![name])?;
        Self::find_by_name(conn, name)?
            .ok_or_else(|| anyhow!("Account '{}' vanished after insert", name))
    }

    pub fn owner(conn: &Connection) -> Result<Account> {
        Self::get(conn, OWNER_ACCOUNT_ID)?.ok_or_else(|| anyhow!("Owner account missing"))
    }
}

// ─── Habits ──────────────────────────────────────────────────────────────────

pub struct HabitRepo;

fn habit_from_row(row: &rusqlite::Row) -> rusqlite::Result<Habit> {
    let frequency_type: String = row.get(7)?;
    let tracked_days: Option<String> = row.get(11)?;
    Ok(Habit {
        id: Some(row.get(0)?),
        uuid: row.get(1)?,
        name: row.get(2)?,
        goal: GoalConfig {
            unit: row.get(3)?,
            reachable_value: row.get(4)?,
            default_increment: row.get(5)?,
            target_days: row.get::<_, i64>(6)? as u32,
            frequency_type: FrequencyType::from_str(&frequency_type).map_err(invalid)?,
            frequency: row.get::<_, i64>(8)? as u32,
            times_per_days: row.get::<_, Option<i64>>(9)?.map(|v| v as u32),
            is_negative: row.get::<_, i64>(10)? != 0,
            computation: None,
        },
        tracked_days: tracked_days
            .map(|s| parse_tracked_days(&s).map_err(invalid))
            .transpose()?,
        created_day: row.get(12)?,
        archived: row.get::<_, i64>(13)? != 0,
    })
}

const HABIT_COLS: &str = "id, uuid, name, unit, reachable_value, default_increment, target_days,
     frequency_type, frequency, times_per_days, is_negative, tracked_days, created_day, archived";

impl HabitRepo {
    /// Insert a new habit. The goal config must already be validated.
    pub fn insert(conn: &Connection, habit: &Habit) -> Result<i64> {
        habit.goal.validate()?;
        conn.execute(
            "INSERT INTO habits (uuid, name, unit, reachable_value, default_increment,
                                 target_days, frequency_type, frequency, times_per_days,
                                 is_negative, tracked_days, created_day, archived)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                habit.uuid,
                habit.name,
                habit.goal.unit,
                habit.goal.reachable_value,
                habit.goal.default_increment,
                habit.goal.target_days as i64,
                habit.goal.frequency_type.as_str(),
                habit.goal.frequency as i64,
                habit.goal.times_per_days.map(|v| v as i64),
                habit.goal.is_negative as i64,
                habit.tracked_days.as_deref().map(tracked_days_to_str),
                habit.created_day,
                habit.archived as i64,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Habit>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM habits WHERE name = ?1",
            HABIT_COLS
        ))?;
        stmt.query_row(params![name], habit_from_row)
            .optional()
            .map_err(anyhow::Error::from)
    }

    pub fn list_active(conn: &Connection) -> Result<Vec<Habit>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM habits WHERE archived = 0 ORDER BY name",
            HABIT_COLS
        ))?;
        let rows = stmt.query_map([], habit_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(anyhow::Error::from)
    }

    pub fn link_account(conn: &Connection, habit_id: i64, account_id: i64) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO habit_links (habit_id, account_id) VALUES (?1, ?2)",
            params![habit_id, account_id],
        )?;
        Ok(())
    }

    pub fn linked_accounts(conn: &Connection, habit_id: i64) -> Result<Vec<Account>> {
        let mut stmt = conn.prepare(
            "SELECT a.id, a.name, a.joined_at
             FROM habit_links l JOIN accounts a ON a.id = l.account_id
             WHERE l.habit_id = ?1 ORDER BY a.id",
        )?;
        let rows = stmt.query_map(params![habit_id], |row| {
            Ok(Account {
                id: row.get(0)?,
                name: row.get(1)?,
                joined_at: row.get(2)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(anyhow::Error::from)
    }
}

// ─── Habit records ───────────────────────────────────────────────────────────

pub struct RecordRepo;

impl RecordRepo {
    pub fn get_value(
        conn: &Connection,
        habit_id: i64,
        account_id: i64,
        epoch_day: i64,
    ) -> Result<f64> {
        conn.query_row(
            "SELECT value FROM habit_records
             WHERE habit_id = ?1 AND account_id = ?2 AND epoch_day = ?3",
            params![habit_id, account_id, epoch_day],
            |row| row.get(0),
        )
        .optional()
        .map(|v| v.unwrap_or(0.0))
        .map_err(anyhow::Error::from)
    }

    /// Upsert by (habit, account, day): a new submission replaces the prior
    /// value for that day entirely.
    pub fn upsert(
        conn: &Connection,
        habit_id: i64,
        account_id: i64,
        epoch_day: i64,
        value: f64,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO habit_records (habit_id, account_id, epoch_day, value)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(habit_id, account_id, epoch_day) DO UPDATE SET value = ?4",
            params![habit_id, account_id, epoch_day, value],
        )?;
        Ok(())
    }

    /// Load one account's records for the window as a day-keyed map, the
    /// snapshot shape the engine consumes.
    pub fn snapshot(
        conn: &Connection,
        habit_id: i64,
        account_id: i64,
        start_day: i64,
        end_day: i64,
    ) -> Result<BTreeMap<i64, f64>> {
        let mut stmt = conn.prepare(
            "SELECT epoch_day, value FROM habit_records
             WHERE habit_id = ?1 AND account_id = ?2 AND epoch_day >= ?3 AND epoch_day <= ?4
             ORDER BY epoch_day",
        )?;
        let rows = stmt.query_map(params![habit_id, account_id, start_day, end_day], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?))
        })?;
        let mut map = BTreeMap::new();
        for r in rows {
            let (day, value) = r?;
            map.insert(day, value);
        }
        Ok(map)
    }

    /// Every stored row for a habit across all accounts, oldest first.
    pub fn list_for_habit(conn: &Connection, habit_id: i64) -> Result<Vec<HabitRecord>> {
        let mut stmt = conn.prepare(
            "SELECT id, habit_id, account_id, epoch_day, value FROM habit_records
             WHERE habit_id = ?1 ORDER BY epoch_day, account_id",
        )?;
        let rows = stmt.query_map(params![habit_id], |row| {
            Ok(HabitRecord {
                id: Some(row.get(0)?),
                habit_id: row.get(1)?,
                account_id: row.get(2)?,
                epoch_day: row.get(3)?,
                value: row.get(4)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(anyhow::Error::from)
    }

    /// Snapshots of every linked account's records for the same window.
    pub fn linked_snapshots(
        conn: &Connection,
        habit_id: i64,
        start_day: i64,
        end_day: i64,
    ) -> Result<Vec<BTreeMap<i64, f64>>> {
        let linked = HabitRepo::linked_accounts(conn, habit_id)?;
        let mut snapshots = Vec::with_capacity(linked.len());
        for account in linked {
            snapshots.push(Self::snapshot(
                conn, habit_id, account.id, start_day, end_day,
            )?);
        }
        Ok(snapshots)
    }
}

// ─── Challenges ──────────────────────────────────────────────────────────────

pub struct ChallengeRepo;

fn challenge_from_row(row: &rusqlite::Row) -> rusqlite::Result<Challenge> {
    let frequency_type: String = row.get(5)?;
    let computation: String = row.get(9)?;
    let state: String = row.get(12)?;
    Ok(Challenge {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        goal: GoalConfig {
            unit: row.get(2)?,
            reachable_value: row.get(3)?,
            default_increment: "+1".to_string(),
            target_days: row.get::<_, i64>(4)? as u32,
            frequency_type: FrequencyType::from_str(&frequency_type).map_err(invalid)?,
            frequency: row.get::<_, i64>(6)? as u32,
            times_per_days: row.get::<_, Option<i64>>(7)?.map(|v| v as u32),
            is_negative: row.get::<_, i64>(8)? != 0,
            computation: Some(ComputationKind::from_str(&computation).map_err(invalid)?),
        },
        start_day: row.get(10)?,
        end_day: row.get(11)?,
        state: ChallengeState::from_str(&state).map_err(invalid)?,
        proposed_at: row.get(13)?,
    })
}

const CHALLENGE_COLS: &str = "id, name, unit, reachable_value, target_days, frequency_type,
     frequency, times_per_days, is_negative, computation, start_day, end_day, state, proposed_at";

impl ChallengeRepo {
    pub fn insert(conn: &Connection, challenge: &Challenge) -> Result<i64> {
        challenge.goal.validate()?;
        if challenge.end_day < challenge.start_day {
            return Err(anyhow!("Challenge ends before it starts"));
        }
        conn.execute(
            "INSERT INTO challenges (name, unit, reachable_value, target_days, frequency_type,
                                     frequency, times_per_days, is_negative, computation,
                                     start_day, end_day, state)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                challenge.name,
                challenge.goal.unit,
                challenge.goal.reachable_value,
                challenge.goal.target_days as i64,
                challenge.goal.frequency_type.as_str(),
                challenge.goal.frequency as i64,
                challenge.goal.times_per_days.map(|v| v as i64),
                challenge.goal.is_negative as i64,
                challenge
                    .goal
                    .computation
                    .unwrap_or(ComputationKind::Absolute)
                    .as_str(),
                challenge.start_day,
                challenge.end_day,
                challenge.state.as_str(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Challenge>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM challenges WHERE name = ?1",
            CHALLENGE_COLS
        ))?;
        stmt.query_row(params![name], challenge_from_row)
            .optional()
            .map_err(anyhow::Error::from)
    }

    pub fn list(conn: &Connection) -> Result<Vec<Challenge>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM challenges ORDER BY start_day, id",
            CHALLENGE_COLS
        ))?;
        let rows = stmt.query_map([], challenge_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(anyhow::Error::from)
    }

    pub fn set_state(conn: &Connection, challenge_id: i64, state: ChallengeState) -> Result<()> {
        conn.execute(
            "UPDATE challenges SET state = ?1 WHERE id = ?2",
            params![state.as_str(), challenge_id],
        )?;
        Ok(())
    }

    /// One boolean vote per account per proposal; a re-vote replaces it.
    pub fn cast_vote(
        conn: &Connection,
        challenge_id: i64,
        account_id: i64,
        up: bool,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO challenge_votes (challenge_id, account_id, up)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(challenge_id, account_id) DO UPDATE SET up = ?3",
            params![challenge_id, account_id, up as i64],
        )?;
        Ok(())
    }

    /// Net vote score per proposed challenge, for the selection cycle.
    pub fn proposal_tallies(
        conn: &Connection,
    ) -> Result<Vec<crate::engine::challenge::VoteTally>> {
        let mut stmt = conn.prepare(
            "SELECT c.id, c.proposed_at,
                    COALESCE(SUM(CASE WHEN v.up = 1 THEN 1 ELSE -1 END), 0)
             FROM challenges c
             LEFT JOIN challenge_votes v ON v.challenge_id = c.id
             WHERE c.state = 'proposed'
             GROUP BY c.id
             ORDER BY c.id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(crate::engine::challenge::VoteTally {
                challenge_id: row.get(0)?,
                proposed_at: row.get(1)?,
                net: row.get(2)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(anyhow::Error::from)
    }

    pub fn join(conn: &Connection, challenge_id: i64, account_id: i64) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO challenge_participants (challenge_id, account_id)
             VALUES (?1, ?2)",
            params![challenge_id, account_id],
        )?;
        Ok(())
    }

    /// Participants with their challenge-join timestamps, which override the
    /// account creation time for leaderboard tie-breaks.
    pub fn participants(conn: &Connection, challenge_id: i64) -> Result<Vec<Account>> {
        let mut stmt = conn.prepare(
            "SELECT a.id, a.name, p.joined_at
             FROM challenge_participants p JOIN accounts a ON a.id = p.account_id
             WHERE p.challenge_id = ?1 ORDER BY p.joined_at, a.name",
        )?;
        let rows = stmt.query_map(params![challenge_id], |row| {
            Ok(Account {
                id: row.get(0)?,
                name: row.get(1)?,
                joined_at: row.get(2)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(anyhow::Error::from)
    }

    pub fn get_record_value(
        conn: &Connection,
        challenge_id: i64,
        account_id: i64,
        epoch_day: i64,
    ) -> Result<f64> {
        conn.query_row(
            "SELECT value FROM challenge_records
             WHERE challenge_id = ?1 AND account_id = ?2 AND epoch_day = ?3",
            params![challenge_id, account_id, epoch_day],
            |row| row.get(0),
        )
        .optional()
        .map(|v| v.unwrap_or(0.0))
        .map_err(anyhow::Error::from)
    }

    pub fn upsert_record(
        conn: &Connection,
        challenge_id: i64,
        account_id: i64,
        epoch_day: i64,
        value: f64,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO challenge_records (challenge_id, account_id, epoch_day, value)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(challenge_id, account_id, epoch_day) DO UPDATE SET value = ?4",
            params![challenge_id, account_id, epoch_day, value],
        )?;
        Ok(())
    }

    pub fn record_snapshot(
        conn: &Connection,
        challenge_id: i64,
        account_id: i64,
    ) -> Result<BTreeMap<i64, f64>> {
        let mut stmt = conn.prepare(
            "SELECT epoch_day, value FROM challenge_records
             WHERE challenge_id = ?1 AND account_id = ?2 ORDER BY epoch_day",
        )?;
        let rows = stmt.query_map(params![challenge_id, account_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?))
        })?;
        let mut map = BTreeMap::new();
        for r in rows {
            let (day, value) = r?;
            map.insert(day, value);
        }
        Ok(map)
    }

    pub fn save_medal(
        conn: &Connection,
        challenge_id: i64,
        account_id: i64,
        medal: Medal,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO challenge_medals (challenge_id, account_id, medal, scope)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(challenge_id, account_id, scope) DO UPDATE SET medal = ?3",
            params![
                challenge_id,
                account_id,
                medal.kind.as_str(),
                medal.scope.as_str()
            ],
        )?;
        Ok(())
    }

    pub fn medals(conn: &Connection, challenge_id: i64) -> Result<Vec<(i64, Medal)>> {
        let mut stmt = conn.prepare(
            "SELECT account_id, medal, scope FROM challenge_medals
             WHERE challenge_id = ?1 ORDER BY account_id",
        )?;
        let rows = stmt.query_map(params![challenge_id], |row| {
            let medal: String = row.get(1)?;
            let scope: String = row.get(2)?;
            Ok((
                row.get::<_, i64>(0)?,
                Medal {
                    kind: MedalKind::from_str(&medal).map_err(invalid)?,
                    scope: MedalScope::from_str(&scope).map_err(invalid)?,
                },
            ))
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(anyhow::Error::from)
    }
}

// ─── App meta ────────────────────────────────────────────────────────────────

pub struct MetaRepo;

impl MetaRepo {
    pub fn get(conn: &Connection, key: &str) -> Result<Option<String>> {
        conn.query_row(
            "SELECT value FROM app_meta WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(anyhow::Error::from)
    }

    pub fn set(conn: &Connection, key: &str, value: &str) -> Result<()> {
        conn.execute(
            "INSERT INTO app_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        Ok(())
    }
}
