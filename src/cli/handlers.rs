use anyhow::{anyhow, Result};
use chrono::{Datelike, Local, NaiveDate};
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::cli::args::{ChallengeCommands, HabitCommands};
use crate::config::AppConfig;
use crate::db::repository::{AccountRepo, ChallengeRepo, HabitRepo, RecordRepo};
use crate::engine::aggregate::{habit_progress, HabitProgress, ProgressInput};
use crate::engine::challenge::{
    check_transition, evaluate, select_winner, ParticipantRecords, Standing,
};
use crate::engine::classify::CompletionState;
use crate::engine::completion_events;
use crate::models::{
    date_from_epoch_day, epoch_day, parse_tracked_days, Account, Challenge, ChallengeState,
    ComputationKind, FrequencyType, GoalConfig, Habit, HabitRecord, MedalKind, RecordInput,
};
use crate::utils::format::{format_value, progress_bar};

// ─── ANSI helpers ────────────────────────────────────────────────────────────

macro_rules! println_colored {
    ($color:expr, $($arg:tt)*) => {{
        print!("{}", $color);
        print!($($arg)*);
        println!("\x1b[0m");
    }};
}

const GREEN: &str = "\x1b[32m";
const AMBER: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";
const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";

// ─── Shared helpers ──────────────────────────────────────────────────────────

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| anyhow!("Bad date '{}', expected YYYY-MM-DD", s))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn find_habit(conn: &Connection, name: &str) -> Result<Habit> {
    HabitRepo::find_by_name(conn, name)?
        .ok_or_else(|| anyhow!("Habit '{}' not found", name))
}

fn find_challenge(conn: &Connection, name: &str) -> Result<Challenge> {
    ChallengeRepo::find_by_name(conn, name)?
        .ok_or_else(|| anyhow!("Challenge '{}' not found", name))
}

fn resolve_account(conn: &Connection, name: Option<&str>) -> Result<Account> {
    match name {
        None => AccountRepo::owner(conn),
        Some(n) => AccountRepo::get_or_create(conn, n),
    }
}

fn state_icon(state: CompletionState) -> String {
    match state {
        CompletionState::Completed => format!("{}●\x1b[0m", GREEN),
        CompletionState::CompletedByOtherRecords => format!("{}●\x1b[0m", CYAN),
        CompletionState::PartiallyCompleted => format!("{}◑\x1b[0m", AMBER),
        CompletionState::Missed => format!("{}○\x1b[0m", DIM),
        CompletionState::Failed => format!("{}✗\x1b[0m", RED),
        CompletionState::Disabled => format!("{}·\x1b[0m", DIM),
    }
}

/// Load everything the engine needs for one habit and roll it up.
fn habit_snapshot_progress(
    conn: &Connection,
    habit: &Habit,
    account_id: i64,
    at: NaiveDate,
) -> Result<HabitProgress> {
    let habit_id = habit.id.ok_or_else(|| anyhow!("Habit has no id"))?;
    let end = epoch_day(at);
    let start = end - habit.goal.target_days as i64 + 1;
    let records = RecordRepo::snapshot(conn, habit_id, account_id, start, end)?;
    let linked: Vec<BTreeMap<i64, f64>> = RecordRepo::linked_snapshots(conn, habit_id, start, end)?;
    let mut input = ProgressInput::new(&habit.goal, &records, at);
    input.linked = &linked;
    input.created_day = habit.created_day;
    input.tracked_days = habit.tracked_days.as_deref();
    Ok(habit_progress(&input)?)
}

// ─── Habit ───────────────────────────────────────────────────────────────────

pub fn handle_habit(conn: &Connection, config: &AppConfig, action: &HabitCommands) -> Result<()> {
    match action {
        HabitCommands::Add {
            name,
            goal,
            unit,
            freq,
            times,
            per_days,
            negative,
            target_days,
            days,
            default,
        } => {
            if HabitRepo::find_by_name(conn, name)?.is_some() {
                return Err(anyhow!("Habit '{}' already exists", name));
            }
            let goal_cfg = GoalConfig {
                reachable_value: *goal,
                default_increment: default
                    .clone()
                    .unwrap_or_else(|| config.tracking.default_increment.clone()),
                unit: unit.clone(),
                target_days: target_days.unwrap_or(config.tracking.default_target_days),
                frequency_type: FrequencyType::from_str(freq)?,
                frequency: *times,
                times_per_days: *per_days,
                is_negative: *negative,
                computation: None,
            };
            // Invalid configs never reach the database.
            goal_cfg.validate()?;
            let habit = Habit {
                id: None,
                uuid: uuid::Uuid::new_v4().to_string(),
                name: name.clone(),
                goal: goal_cfg,
                tracked_days: days.as_deref().map(parse_tracked_days).transpose()?,
                created_day: epoch_day(today()),
                archived: false,
            };
            HabitRepo::insert(conn, &habit)?;
            println_colored!(GREEN, "  ✓ Added habit: {}", name);
        }
        HabitCommands::List => {
            let habits = HabitRepo::list_active(conn)?;
            if habits.is_empty() {
                println_colored!(DIM, "  No habits yet. Add one with: ritmo habit add <name>");
                return Ok(());
            }
            println!();
            for habit in &habits {
                let progress = habit_snapshot_progress(conn, habit, crate::db::repository::OWNER_ACCOUNT_ID, today())?;
                let today_state = progress
                    .per_day
                    .get(&epoch_day(today()))
                    .copied()
                    .unwrap_or(CompletionState::Missed);
                let cadence = match habit.goal.frequency_type {
                    FrequencyType::Daily => "daily".to_string(),
                    FrequencyType::PerDays => format!(
                        "{}x / {}d",
                        habit.goal.frequency,
                        habit.goal.times_per_days.unwrap_or(0)
                    ),
                    ft => format!("{}x {}", habit.goal.frequency, ft.as_str()),
                };
                println!(
                    "  {} {:<24} {:>4}%  {}  {}{}\x1b[0m",
                    state_icon(today_state),
                    habit.name,
                    progress.display_percent,
                    progress_bar(progress.display_percent, 10),
                    DIM,
                    cadence
                );
            }
            println!();
        }
        HabitCommands::Link { habit, account } => {
            let habit = find_habit(conn, habit)?;
            let account = AccountRepo::get_or_create(conn, account)?;
            HabitRepo::link_account(
                conn,
                habit.id.ok_or_else(|| anyhow!("Habit has no id"))?,
                account.id,
            )?;
            println_colored!(
                GREEN,
                "  ✓ Linked {} to habit '{}'",
                account.name,
                habit.name
            );
        }
    }
    Ok(())
}

// ─── Log ─────────────────────────────────────────────────────────────────────

pub fn handle_log(
    conn: &Connection,
    config: &AppConfig,
    habit_name: &str,
    value: Option<&str>,
    date: Option<&str>,
    account_name: Option<&str>,
) -> Result<()> {
    let habit = find_habit(conn, habit_name)?;
    let habit_id = habit.id.ok_or_else(|| anyhow!("Habit has no id"))?;
    let account = resolve_account(conn, account_name)?;
    let is_owner = account.id == crate::db::repository::OWNER_ACCOUNT_ID;
    if !is_owner {
        let linked = HabitRepo::linked_accounts(conn, habit_id)?;
        if !linked.iter().any(|a| a.id == account.id) {
            return Err(anyhow!(
                "Account '{}' is not linked to '{}'. Link it first: ritmo habit link {} {}",
                account.name,
                habit.name,
                habit.name,
                account.name
            ));
        }
    }

    let day = match date {
        Some(s) => parse_date(s)?,
        None => today(),
    };
    if day > today() {
        return Err(anyhow!("Cannot log a future day"));
    }
    if !habit.tracks_weekday(day.weekday()) {
        println_colored!(
            AMBER,
            "  ! {} does not track {}, the day will not count",
            habit.name,
            day.weekday()
        );
    }

    let input = RecordInput::parse(value.unwrap_or(habit.goal.default_increment.as_str()))?;
    let key = epoch_day(day);
    let current = RecordRepo::get_value(conn, habit_id, account.id, key)?;
    let new_value = input.resolve(current)?;

    // Classification snapshot before the write, for transition events.
    let before = if is_owner {
        Some(habit_snapshot_progress(conn, &habit, account.id, today())?)
    } else {
        None
    };

    RecordRepo::upsert(conn, habit_id, account.id, key, new_value)?;

    if let Some(before) = before {
        let after = habit_snapshot_progress(conn, &habit, account.id, today())?;
        for event in completion_events(&habit.uuid, &before.per_day, &after.per_day) {
            log::info!("completion event: {}", event);
        }
        let state = after
            .per_day
            .get(&key)
            .copied()
            .unwrap_or(CompletionState::Missed);
        let goal_str = format_value(habit.goal.reachable_value);
        match state {
            CompletionState::Completed | CompletionState::CompletedByOtherRecords => {
                println_colored!(
                    GREEN,
                    "  ✓ {} — {} / {} ({})",
                    habit.name,
                    format_value(new_value),
                    goal_str,
                    day
                );
            }
            CompletionState::PartiallyCompleted => {
                println_colored!(
                    AMBER,
                    "  ◑ {} — {} / {} ({})",
                    habit.name,
                    format_value(new_value),
                    goal_str,
                    day
                );
            }
            CompletionState::Failed => {
                println_colored!(
                    RED,
                    "  ✗ {} — {} over the ceiling of {} ({})",
                    habit.name,
                    format_value(new_value),
                    goal_str,
                    day
                );
            }
            _ => {
                println!("  {} — {} ({})", habit.name, format_value(new_value), day);
            }
        }
        if config.alerts.enabled && after.display_percent < config.alerts.threshold_percent {
            log::warn!(
                "habit {} fell below {}%: now {}%",
                habit.uuid,
                config.alerts.threshold_percent,
                after.display_percent
            );
            println_colored!(
                AMBER,
                "  ! {} is at {}% over the last {} days",
                habit.name,
                after.display_percent,
                habit.goal.target_days
            );
        }
    } else {
        println_colored!(
            CYAN,
            "  ✓ Logged {} for {} on behalf of {} ({})",
            format_value(new_value),
            habit.name,
            account.name,
            day
        );
    }
    Ok(())
}

// ─── Stats ───────────────────────────────────────────────────────────────────

pub fn handle_stats(
    conn: &Connection,
    _config: &AppConfig,
    habit_name: Option<&str>,
    full: bool,
) -> Result<()> {
    let habits = match habit_name {
        Some(name) => vec![find_habit(conn, name)?],
        None => HabitRepo::list_active(conn)?,
    };
    if habits.is_empty() {
        println_colored!(DIM, "  No habits yet. Add one with: ritmo habit add <name>");
        return Ok(());
    }

    println!();
    println_colored!(
        DIM,
        "  {}● done  {}●\x1b[2m credited  {}◑\x1b[2m partial  ○ missed  {}✗\x1b[2m failed  · off\x1b[0m",
        GREEN,
        CYAN,
        AMBER,
        RED
    );
    println!();
    for habit in &habits {
        let progress =
            habit_snapshot_progress(conn, habit, crate::db::repository::OWNER_ACCOUNT_ID, today())?;
        println_colored!(
            BOLD,
            "  {}  {}%  {}",
            habit.name,
            progress.display_percent,
            progress_bar(progress.display_percent, 20)
        );

        let shown: Vec<(&i64, &CompletionState)> = if full {
            progress.per_day.iter().collect()
        } else {
            let cutoff = epoch_day(today()) - 6;
            progress.per_day.range(cutoff..).collect()
        };
        print!("  ");
        for (_, state) in &shown {
            print!("{} ", state_icon(**state));
        }
        println!();
        if let Some((first, _)) = shown.first() {
            println_colored!(
                DIM,
                "  {} .. {}",
                date_from_epoch_day(**first),
                date_from_epoch_day(epoch_day(today()))
            );
        }
        println!();
    }
    Ok(())
}

// ─── Challenge ───────────────────────────────────────────────────────────────

pub fn handle_challenge(conn: &Connection, action: &ChallengeCommands) -> Result<()> {
    match action {
        ChallengeCommands::Propose {
            name,
            start,
            end,
            goal,
            unit,
            freq,
            times,
            per_days,
            negative,
            compute,
        } => {
            if ChallengeRepo::find_by_name(conn, name)?.is_some() {
                return Err(anyhow!("Challenge '{}' already exists", name));
            }
            let start = parse_date(start)?;
            let end = parse_date(end)?;
            let goal_cfg = GoalConfig {
                reachable_value: *goal,
                default_increment: "+1".to_string(),
                unit: unit.clone(),
                target_days: (epoch_day(end) - epoch_day(start) + 1).max(1) as u32,
                frequency_type: FrequencyType::from_str(freq)?,
                frequency: *times,
                times_per_days: *per_days,
                is_negative: *negative,
                computation: Some(ComputationKind::from_str(compute)?),
            };
            goal_cfg.validate()?;
            let challenge = Challenge {
                id: None,
                name: name.clone(),
                goal: goal_cfg,
                start_day: epoch_day(start),
                end_day: epoch_day(end),
                state: ChallengeState::Created,
                proposed_at: String::new(),
            };
            let id = ChallengeRepo::insert(conn, &challenge)?;
            check_transition(ChallengeState::Created, ChallengeState::Proposed)?;
            ChallengeRepo::set_state(conn, id, ChallengeState::Proposed)?;
            println_colored!(GREEN, "  ✓ Proposed challenge: {} ({} .. {})", name, start, end);
        }
        ChallengeCommands::Vote {
            name,
            down,
            account,
        } => {
            let challenge = find_challenge(conn, name)?;
            if challenge.state != ChallengeState::Proposed {
                return Err(anyhow!(
                    "Challenge '{}' is {}, voting is only open on proposals",
                    name,
                    challenge.state.display_name()
                ));
            }
            let account = resolve_account(conn, account.as_deref())?;
            ChallengeRepo::cast_vote(
                conn,
                challenge.id.ok_or_else(|| anyhow!("Challenge has no id"))?,
                account.id,
                !down,
            )?;
            let word = if *down { "against" } else { "for" };
            println_colored!(GREEN, "  ✓ {} voted {} '{}'", account.name, word, name);
        }
        ChallengeCommands::Select => {
            let tallies = ChallengeRepo::proposal_tallies(conn)?;
            let Some(winner_id) = select_winner(&tallies) else {
                println_colored!(DIM, "  No proposals to select from");
                return Ok(());
            };
            for tally in &tallies {
                let next = if tally.challenge_id == winner_id {
                    ChallengeState::Active
                } else {
                    ChallengeState::NotActive
                };
                check_transition(ChallengeState::Proposed, next)?;
                ChallengeRepo::set_state(conn, tally.challenge_id, next)?;
            }
            let winner = ChallengeRepo::list(conn)?
                .into_iter()
                .find(|c| c.id == Some(winner_id))
                .ok_or_else(|| anyhow!("Winning challenge vanished"))?;
            println_colored!(GREEN, "  ✓ Challenge '{}' is now active", winner.name);
        }
        ChallengeCommands::Join { name, account } => {
            let challenge = find_challenge(conn, name)?;
            if challenge.state != ChallengeState::Active {
                return Err(anyhow!("Challenge '{}' is not active", name));
            }
            let account = resolve_account(conn, account.as_deref())?;
            ChallengeRepo::join(
                conn,
                challenge.id.ok_or_else(|| anyhow!("Challenge has no id"))?,
                account.id,
            )?;
            println_colored!(GREEN, "  ✓ {} joined '{}'", account.name, name);
        }
        ChallengeCommands::Log {
            name,
            value,
            date,
            account,
        } => {
            let challenge = find_challenge(conn, name)?;
            let challenge_id = challenge.id.ok_or_else(|| anyhow!("Challenge has no id"))?;
            if challenge.state != ChallengeState::Active {
                return Err(anyhow!("Challenge '{}' is not active", name));
            }
            let account = resolve_account(conn, account.as_deref())?;
            let participants = ChallengeRepo::participants(conn, challenge_id)?;
            if !participants.iter().any(|a| a.id == account.id) {
                return Err(anyhow!(
                    "{} has not joined '{}'. Join first: ritmo challenge join {}",
                    account.name,
                    name,
                    name
                ));
            }
            let day = match date {
                Some(s) => parse_date(s)?,
                None => today(),
            };
            if day > today() {
                return Err(anyhow!("Cannot log a future day"));
            }
            let key = epoch_day(day);
            if key < challenge.start_day || key > challenge.end_day {
                return Err(anyhow!(
                    "{} is outside the challenge span {} .. {}",
                    day,
                    date_from_epoch_day(challenge.start_day),
                    date_from_epoch_day(challenge.end_day)
                ));
            }
            let input = RecordInput::parse(value)?;
            let current = ChallengeRepo::get_record_value(conn, challenge_id, account.id, key)?;
            let new_value = input.resolve(current)?;
            ChallengeRepo::upsert_record(conn, challenge_id, account.id, key, new_value)?;
            println_colored!(
                GREEN,
                "  ✓ {} logged {} in '{}' ({})",
                account.name,
                format_value(new_value),
                name,
                day
            );
        }
        ChallengeCommands::Board { name } => {
            let challenge = find_challenge(conn, name)?;
            let challenge_id = challenge.id.ok_or_else(|| anyhow!("Challenge has no id"))?;
            let outcome = evaluate_challenge(conn, &challenge)?;
            // A completed board shows the medals persisted at close time.
            let saved_medals: BTreeMap<i64, MedalKind> =
                if challenge.state == ChallengeState::Completed {
                    ChallengeRepo::medals(conn, challenge_id)?
                        .into_iter()
                        .map(|(account_id, medal)| (account_id, medal.kind))
                        .collect()
                } else {
                    BTreeMap::new()
                };
            println!();
            println_colored!(
                BOLD,
                "  {} — {} ({})",
                challenge.name,
                challenge.state.display_name(),
                challenge
                    .goal
                    .computation
                    .unwrap_or(ComputationKind::Absolute)
                    .as_str()
            );
            println!();
            if outcome.standings.is_empty() {
                println_colored!(DIM, "  No participants yet");
                return Ok(());
            }
            let max_value = challenge.goal.computation == Some(ComputationKind::MaxValue);
            for standing in &outcome.standings {
                let kind = saved_medals
                    .get(&standing.account_id)
                    .copied()
                    .or(standing.medal);
                let medal = match kind {
                    Some(MedalKind::Gold) => " (gold)",
                    Some(MedalKind::Silver) => " (silver)",
                    Some(MedalKind::Bronze) => " (bronze)",
                    None => "",
                };
                let score = if max_value {
                    format!("best {}", format_value(standing.score))
                } else {
                    format!("{:>3}%  {}", standing.score.round() as u32, progress_bar(standing.score.round() as u32, 10))
                };
                println!(
                    "  {:>2}. {:<16} {}{}",
                    standing.rank, standing.account_name, score, medal
                );
            }
            println!();
        }
        ChallengeCommands::Close { name } => {
            let challenge = find_challenge(conn, name)?;
            let challenge_id = challenge.id.ok_or_else(|| anyhow!("Challenge has no id"))?;
            check_transition(challenge.state, ChallengeState::Completed)
                .map_err(|_| anyhow!("Challenge '{}' is not active", name))?;
            if epoch_day(today()) < challenge.end_day {
                return Err(anyhow!(
                    "Challenge '{}' runs until {}",
                    name,
                    date_from_epoch_day(challenge.end_day)
                ));
            }
            let participants = ChallengeRepo::participants(conn, challenge_id)?;
            let mut streams = Vec::with_capacity(participants.len());
            for account in participants {
                let records = ChallengeRepo::record_snapshot(conn, challenge_id, account.id)?;
                streams.push(ParticipantRecords { account, records });
            }
            let outcome = evaluate(&challenge, &streams, today(), true)?;
            for (account_id, medal) in &outcome.medals {
                ChallengeRepo::save_medal(conn, challenge_id, *account_id, *medal)?;
            }
            ChallengeRepo::set_state(conn, challenge_id, ChallengeState::Completed)?;
            println_colored!(GREEN, "  ✓ Challenge '{}' completed", name);
            for standing in outcome.standings.iter().take(3) {
                if let Some(kind) = standing.medal {
                    println!("     {} — {}", standing.account_name, kind.as_str());
                }
            }
        }
        ChallengeCommands::List => {
            let challenges = ChallengeRepo::list(conn)?;
            if challenges.is_empty() {
                println_colored!(DIM, "  No challenges yet");
                return Ok(());
            }
            println!();
            for c in &challenges {
                println!(
                    "  {:<20} {} .. {}  {}{}\x1b[0m",
                    c.name,
                    date_from_epoch_day(c.start_day),
                    date_from_epoch_day(c.end_day),
                    DIM,
                    c.state.display_name()
                );
            }
            println!();
        }
    }
    Ok(())
}

fn evaluate_challenge(
    conn: &Connection,
    challenge: &Challenge,
) -> Result<crate::engine::challenge::ChallengeOutcome> {
    let challenge_id = challenge.id.ok_or_else(|| anyhow!("Challenge has no id"))?;
    let participants = ChallengeRepo::participants(conn, challenge_id)?;
    let mut streams = Vec::with_capacity(participants.len());
    for account in participants {
        let records = ChallengeRepo::record_snapshot(conn, challenge_id, account.id)?;
        streams.push(ParticipantRecords { account, records });
    }
    Ok(evaluate(challenge, &streams, today(), false)?)
}

// ─── Export ──────────────────────────────────────────────────────────────────

#[derive(serde::Serialize)]
struct HabitExport {
    habit: Habit,
    percentage: u32,
    records: Vec<HabitRecord>,
}

#[derive(serde::Serialize)]
struct ChallengeExport {
    challenge: Challenge,
    standings: Vec<Standing>,
}

#[derive(serde::Serialize)]
struct ExportPayload {
    exported_at: NaiveDate,
    habits: Vec<HabitExport>,
    challenges: Vec<ChallengeExport>,
}

fn export_json(conn: &Connection) -> Result<()> {
    let mut habits = Vec::new();
    for habit in HabitRepo::list_active(conn)? {
        let progress = habit_snapshot_progress(
            conn,
            &habit,
            crate::db::repository::OWNER_ACCOUNT_ID,
            today(),
        )?;
        let habit_id = habit.id.ok_or_else(|| anyhow!("Habit has no id"))?;
        let records = RecordRepo::list_for_habit(conn, habit_id)?;
        habits.push(HabitExport {
            habit,
            percentage: progress.display_percent,
            records,
        });
    }
    let mut challenges = Vec::new();
    for challenge in ChallengeRepo::list(conn)? {
        let standings = evaluate_challenge(conn, &challenge)?.standings;
        challenges.push(ChallengeExport {
            challenge,
            standings,
        });
    }
    let payload = ExportPayload {
        exported_at: today(),
        habits,
        challenges,
    };
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

pub fn handle_export(conn: &Connection, _config: &AppConfig, json: bool) -> Result<()> {
    if json {
        return export_json(conn);
    }
    let habits = HabitRepo::list_active(conn)?;
    println!("# ritmo — Summary");
    println!("# {}", today());
    println!();
    println!("## Habits");
    for habit in &habits {
        let progress =
            habit_snapshot_progress(conn, habit, crate::db::repository::OWNER_ACCOUNT_ID, today())?;
        println!(
            "  {:<24} {:>3}%  {}",
            habit.name,
            progress.display_percent,
            progress_bar(progress.display_percent, 10)
        );
    }
    println!();
    println!("## Challenges");
    for c in &ChallengeRepo::list(conn)? {
        println!(
            "  {:<20} {} .. {}  {}",
            c.name,
            date_from_epoch_day(c.start_day),
            date_from_epoch_day(c.end_day),
            c.state.display_name()
        );
        if c.state == ChallengeState::Active || c.state == ChallengeState::Completed {
            let outcome = evaluate_challenge(conn, c)?;
            for standing in &outcome.standings {
                println!(
                    "    {:>2}. {:<16} {}",
                    standing.rank,
                    standing.account_name,
                    format_value(standing.score)
                );
            }
        }
    }
    Ok(())
}
