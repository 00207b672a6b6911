use anyhow::{Context, Result};
use clap::Parser;
use rusqlite::Connection;

use ritmo::cli::args::{Cli, Commands};
use ritmo::cli::handlers;
use ritmo::config::AppConfig;
use ritmo::db::migrations::run_migrations;

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = AppConfig::load().context("Loading config")?;

    // Ensure data directory exists and open DB
    AppConfig::ensure_data_dir()?;
    let db_path = AppConfig::db_path()?;
    let conn = Connection::open(&db_path)
        .with_context(|| format!("Opening database at {:?}", db_path))?;

    // Enable WAL mode for better concurrent access
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;

    // Run migrations on every startup
    run_migrations(&conn)?;

    match cli.command {
        Commands::Habit { action } => {
            handlers::handle_habit(&conn, &config, &action)?;
        }
        Commands::Log {
            habit,
            value,
            date,
            account,
        } => {
            handlers::handle_log(
                &conn,
                &config,
                &habit,
                value.as_deref(),
                date.as_deref(),
                account.as_deref(),
            )?;
        }
        Commands::Stats { habit, full } => {
            handlers::handle_stats(&conn, &config, habit.as_deref(), full)?;
        }
        Commands::Challenge { action } => {
            handlers::handle_challenge(&conn, &action)?;
        }
        Commands::Export { json } => {
            handlers::handle_export(&conn, &config, json)?;
        }
    }

    Ok(())
}
