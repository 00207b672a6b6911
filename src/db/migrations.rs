use anyhow::Result;
use rusqlite::Connection;

pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch("
        CREATE TABLE IF NOT EXISTS accounts (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            name       TEXT NOT NULL UNIQUE,
            joined_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        );

        CREATE TABLE IF NOT EXISTS habits (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid              TEXT NOT NULL UNIQUE,
            name              TEXT NOT NULL UNIQUE,
            unit              TEXT,
            reachable_value   REAL NOT NULL DEFAULT 1,
            default_increment TEXT NOT NULL DEFAULT '+1',
            target_days       INTEGER NOT NULL DEFAULT 30,
            frequency_type    TEXT NOT NULL DEFAULT 'daily'
                              CHECK(frequency_type IN ('daily','weekly','monthly','per_days')),
            frequency         INTEGER NOT NULL DEFAULT 1,
            times_per_days    INTEGER,
            is_negative       INTEGER NOT NULL DEFAULT 0,
            tracked_days      TEXT,
            created_day       INTEGER NOT NULL,
            archived          INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS habit_links (
            habit_id   INTEGER NOT NULL REFERENCES habits(id),
            account_id INTEGER NOT NULL REFERENCES accounts(id),
            UNIQUE(habit_id, account_id)
        );

        CREATE TABLE IF NOT EXISTS habit_records (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            habit_id   INTEGER NOT NULL REFERENCES habits(id),
            account_id INTEGER NOT NULL REFERENCES accounts(id),
            epoch_day  INTEGER NOT NULL,
            value      REAL NOT NULL DEFAULT 0,
            UNIQUE(habit_id, account_id, epoch_day)
        );

        CREATE TABLE IF NOT EXISTS challenges (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            name            TEXT NOT NULL UNIQUE,
            unit            TEXT,
            reachable_value REAL NOT NULL DEFAULT 1,
            target_days     INTEGER NOT NULL DEFAULT 30,
            frequency_type  TEXT NOT NULL DEFAULT 'daily'
                            CHECK(frequency_type IN ('daily','weekly','monthly','per_days')),
            frequency       INTEGER NOT NULL DEFAULT 1,
            times_per_days  INTEGER,
            is_negative     INTEGER NOT NULL DEFAULT 0,
            computation     TEXT NOT NULL DEFAULT 'absolute'
                            CHECK(computation IN ('absolute','relative','max_value')),
            start_day       INTEGER NOT NULL,
            end_day         INTEGER NOT NULL,
            state           TEXT NOT NULL DEFAULT 'created'
                            CHECK(state IN ('created','proposed','active','completed','not_active')),
            proposed_at     TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        );

        CREATE TABLE IF NOT EXISTS challenge_votes (
            challenge_id INTEGER NOT NULL REFERENCES challenges(id),
            account_id   INTEGER NOT NULL REFERENCES accounts(id),
            up           INTEGER NOT NULL DEFAULT 1,
            UNIQUE(challenge_id, account_id)
        );

        CREATE TABLE IF NOT EXISTS challenge_participants (
            challenge_id INTEGER NOT NULL REFERENCES challenges(id),
            account_id   INTEGER NOT NULL REFERENCES accounts(id),
            joined_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            UNIQUE(challenge_id, account_id)
        );

        CREATE TABLE IF NOT EXISTS challenge_records (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            challenge_id INTEGER NOT NULL REFERENCES challenges(id),
            account_id   INTEGER NOT NULL REFERENCES accounts(id),
            epoch_day    INTEGER NOT NULL,
            value        REAL NOT NULL DEFAULT 0,
            UNIQUE(challenge_id, account_id, epoch_day)
        );

        CREATE TABLE IF NOT EXISTS challenge_medals (
            challenge_id INTEGER NOT NULL REFERENCES challenges(id),
            account_id   INTEGER NOT NULL REFERENCES accounts(id),
            medal        TEXT NOT NULL CHECK(medal IN ('gold','silver','bronze')),
            scope        TEXT NOT NULL CHECK(scope IN ('monthly','challenge')),
            UNIQUE(challenge_id, account_id, scope)
        );

        CREATE TABLE IF NOT EXISTS app_meta (
            key   TEXT PRIMARY KEY,
            value TEXT
        );
    ")?;

    seed_owner(conn)?;
    crate::db::repository::MetaRepo::set(conn, "schema_version", SCHEMA_VERSION)?;
    Ok(())
}

pub const SCHEMA_VERSION: &str = "1";

/// The device owner is account 1; buddy accounts are created on demand.
fn seed_owner(conn: &Connection) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO accounts (id, name) VALUES (1, 'me')",
        [],
    )?;
    Ok(())
}
