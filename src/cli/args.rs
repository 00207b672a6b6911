use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "ritmo", version, author, about = "A terminal habit tracker with shared goals and time-boxed challenges")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Habit management
    Habit {
        #[command(subcommand)]
        action: HabitCommands,
    },
    /// Log a value for a habit (default: today, your own record)
    Log {
        /// Habit name
        habit: String,
        /// Value: absolute ("2.5") or delta ("+1"); omitted uses the
        /// habit's configured default
        value: Option<String>,
        /// Day to log for (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
        /// Log on behalf of a linked buddy account
        #[arg(long)]
        account: Option<String>,
    },
    /// Show rolling progress and the per-day completion calendar
    Stats {
        /// Only this habit
        habit: Option<String>,
        /// Show the full trailing window instead of the last 7 days
        #[arg(long)]
        full: bool,
    },
    /// Challenge management
    Challenge {
        #[command(subcommand)]
        action: ChallengeCommands,
    },
    /// Export a summary to stdout
    Export {
        /// Emit the full data set as JSON instead of the plain-text summary
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum HabitCommands {
    /// Add a habit
    Add {
        /// Habit name
        name: String,
        /// Goal value per frequency unit (1 = done/not-done)
        #[arg(long, default_value = "1")]
        goal: f64,
        /// Display unit (pages, km, minutes)
        #[arg(long)]
        unit: Option<String>,
        /// Cadence: daily, weekly, monthly, per-days
        #[arg(long, default_value = "daily")]
        freq: String,
        /// Required occurrences per frequency window
        #[arg(long, default_value = "1")]
        times: u32,
        /// Period in days for --freq per-days
        #[arg(long)]
        per_days: Option<u32>,
        /// Lower values are better; the goal acts as a ceiling
        #[arg(long)]
        negative: bool,
        /// Trailing window for the rolling percentage
        #[arg(long)]
        target_days: Option<u32>,
        /// Only track on these weekdays (e.g. mon,wed,fri)
        #[arg(long)]
        days: Option<String>,
        /// Value applied on a bare `log` ("+1" or an absolute value)
        #[arg(long)]
        default: Option<String>,
    },
    /// List habits with today's completion
    List,
    /// Link a buddy account to a shared habit
    Link {
        /// Habit name
        habit: String,
        /// Buddy account name (created if unknown)
        account: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ChallengeCommands {
    /// Propose a challenge for the next selection cycle
    Propose {
        /// Challenge name
        name: String,
        /// First day (YYYY-MM-DD)
        #[arg(long)]
        start: String,
        /// Last day (YYYY-MM-DD)
        #[arg(long)]
        end: String,
        /// Goal value per frequency unit
        #[arg(long, default_value = "1")]
        goal: f64,
        /// Display unit
        #[arg(long)]
        unit: Option<String>,
        /// Cadence: daily, weekly, monthly, per-days
        #[arg(long, default_value = "daily")]
        freq: String,
        /// Required occurrences per frequency window
        #[arg(long, default_value = "1")]
        times: u32,
        /// Period in days for --freq per-days
        #[arg(long)]
        per_days: Option<u32>,
        /// Lower values are better
        #[arg(long)]
        negative: bool,
        /// Scoring: absolute, relative, max-value
        #[arg(long, default_value = "absolute")]
        compute: String,
    },
    /// Vote on a proposed challenge
    Vote {
        /// Challenge name
        name: String,
        /// Vote against instead of for
        #[arg(long)]
        down: bool,
        /// Vote as a buddy account
        #[arg(long)]
        account: Option<String>,
    },
    /// Run the selection cycle: activate the winning proposal
    Select,
    /// Join an active challenge
    Join {
        /// Challenge name
        name: String,
        /// Join as a buddy account
        #[arg(long)]
        account: Option<String>,
    },
    /// Log a value toward a challenge
    Log {
        /// Challenge name
        name: String,
        /// Value: absolute or "+delta"
        value: String,
        /// Day to log for (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
        /// Log as a buddy account
        #[arg(long)]
        account: Option<String>,
    },
    /// Show the leaderboard
    Board {
        /// Challenge name
        name: String,
    },
    /// Freeze results, award medals, and complete the challenge
    Close {
        /// Challenge name
        name: String,
    },
    /// List challenges and their states
    List,
}
