//! Command-line shell
//!
//! Parses arguments with `clap`, dispatches to [`crate::commands`] and
//! prints results as pretty JSON on stdout.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::commands;
use crate::services::{SessionEnd, StopOutcome, Tick};
use crate::AppState;

#[derive(Parser, Debug)]
#[command(name = "flow", version, about = "Project tree, focus sessions and stress journal")]
pub struct Cli {
    /// Directory holding the database, settings.json and logs
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
    /// Mirror log records to stderr
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a root project
    Project { title: String },
    /// Add a subtask
    Add {
        #[arg(value_name = "parent-id")]
        parent: u32,
        title: String,
    },
    /// List root projects, or the children of --parent
    List {
        #[arg(long)]
        parent: Option<u32>,
    },
    /// Show a task and its children
    Show { id: u32 },
    /// Search titles
    Find { query: String },
    /// Hierarchical project picker
    Options {
        #[arg(long)]
        filter: Option<String>,
    },
    /// Flip a task between done and todo
    Toggle { id: u32 },
    /// Set progress (0-100)
    Progress { id: u32, value: u8 },
    /// Edit title, description or deadline
    Edit {
        id: u32,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Day of the deadline, YYYY-MM-DD
        #[arg(long)]
        deadline: Option<String>,
        #[arg(long, action = ArgAction::SetTrue, conflicts_with = "deadline")]
        clear_deadline: bool,
    },
    /// Move a task under --parent, or to the root when omitted
    Move {
        id: u32,
        #[arg(long)]
        parent: Option<u32>,
    },
    /// Delete a task and everything below it
    Delete { id: u32 },
    /// Run a focus session until Ctrl-C
    Focus {
        #[arg(value_name = "task-id")]
        task: u32,
        /// Stress level before starting (0-10)
        #[arg(long)]
        stress: Option<u8>,
        /// Note kept with the stress level
        #[arg(long)]
        note: Option<String>,
        #[arg(long, action = ArgAction::SetTrue)]
        breathing: bool,
        /// Countdown length in minutes
        #[arg(long)]
        minutes: Option<String>,
    },
    /// Rank tasks by focus time
    Ranking {
        #[arg(long)]
        scope: Option<u32>,
        /// week, month or all
        #[arg(long)]
        mode: Option<String>,
        /// Reference day, YYYY-MM-DD
        #[arg(long)]
        date: Option<String>,
    },
    /// Monthly stress, focus and deadline dashboard
    Insights {
        #[arg(long)]
        scope: Option<u32>,
        /// YYYY-MM
        #[arg(long)]
        month: Option<String>,
    },
    /// Record today's check-in
    Checkin {
        /// Stress level (0-10)
        stress: u8,
        /// happy, neutral, sad or stressed
        #[arg(long, default_value = "neutral")]
        mood: String,
        #[arg(long)]
        note: Option<String>,
        #[arg(long, default_value_t = 0)]
        breathing: u32,
    },
    /// List check-ins of a day, a month, or all
    Checkins {
        #[arg(long, conflicts_with = "month")]
        date: Option<String>,
        #[arg(long)]
        month: Option<String>,
    },
    /// Export a backup to --output, or to stdout
    Export {
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Merge a backup file into the store
    Import { path: PathBuf },
    /// Remove tasks whose parent is missing
    FixGhosts,
    /// Delete all tasks and check-ins
    Clear {
        #[arg(long, action = ArgAction::SetTrue)]
        yes: bool,
    },
}

fn json<T: Serialize>(value: T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| format!("Failed to encode output: {}", e))
}

/// Run one subcommand and return its output
pub async fn dispatch(state: &AppState, command: Command) -> Result<Value, String> {
    match command {
        Command::Project { title } => json(commands::create_project(state, title).await?),
        Command::Add { parent, title } => json(commands::add_task(state, parent, title).await?),
        Command::List { parent } => json(commands::get_children(state, parent).await?),
        Command::Show { id } => json(commands::get_task(state, id).await?),
        Command::Find { query } => json(commands::search_tasks(state, query).await?),
        Command::Options { filter } => json(commands::project_options(state, filter).await?),
        Command::Toggle { id } => json(commands::toggle_task(state, id).await?),
        Command::Progress { id, value } => json(commands::set_task_progress(state, id, value).await?),
        Command::Edit {
            id,
            title,
            description,
            deadline,
            clear_deadline,
        } => json(commands::update_task(state, id, title, description, deadline, clear_deadline).await?),
        Command::Move { id, parent } => json(commands::move_task(state, id, parent).await?),
        Command::Delete { id } => json(serde_json::json!({ "deleted": commands::delete_task(state, id).await? })),
        Command::Focus {
            task,
            stress,
            note,
            breathing,
            minutes,
        } => json(run_focus(state, task, stress, note, breathing, minutes).await?),
        Command::Ranking { scope, mode, date } => json(commands::get_ranking(state, scope, mode, date).await?),
        Command::Insights { scope, month } => json(commands::get_insights(state, scope, month).await?),
        Command::Checkin {
            stress,
            mood,
            note,
            breathing,
        } => json(commands::record_checkin(state, stress, mood, note, breathing).await?),
        Command::Checkins { date, month } => json(commands::list_checkins(state, date, month).await?),
        Command::Export { output: Some(path) } => json(commands::save_backup(state, &path).await?),
        Command::Export { output: None } => json(commands::export_backup(state).await?),
        Command::Import { path } => json(commands::import_backup(state, &path).await?),
        Command::FixGhosts => json(serde_json::json!({ "removed": commands::fix_ghosts(state).await? })),
        Command::Clear { yes: false } => Err("Refusing to clear without --yes".to_string()),
        Command::Clear { yes: true } => json(commands::clear_all(state).await?),
    }
}

/// Start a session, show the ticker until Ctrl-C, then close it
///
/// The close goes through the unload path with retries. If saving still
/// fails the session is discarded so the process can exit.
async fn run_focus(
    state: &AppState,
    task_id: u32,
    stress: Option<u8>,
    note: Option<String>,
    breathing: bool,
    minutes: Option<String>,
) -> Result<StopOutcome, String> {
    if let Some(minutes) = minutes {
        commands::set_countdown(state, &minutes).await;
    }
    let task = commands::start_focus(state, task_id, stress, note, breathing).await?;
    eprintln!("Focusing on '{}' (Ctrl-C to stop)", task.title);

    let (tx, mut rx) = mpsc::channel(8);
    let ticker = state.timer.clone().spawn_ticker(tx);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            tick = rx.recv() => match tick {
                Some(tick) => render_tick(&tick),
                None => break,
            },
            _ = &mut ctrl_c => break,
        }
    }
    ticker.abort();
    eprintln!();

    match commands::stop_focus_with_retry(state, SessionEnd::Unload).await {
        Ok(outcome) => Ok(outcome),
        Err(e) if state.timer.is_running().await => {
            eprintln!("Could not save the session ({}); discarding it", e);
            Ok(commands::discard_focus(state).await)
        }
        Err(e) => Err(e),
    }
}

fn render_tick(tick: &Tick) {
    let secs = tick.total_elapsed_ms / 1000;
    let clock = format!("{:02}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60);
    let countdown = &tick.countdown;
    if tick.alarm {
        eprintln!("\x07\rTime's up, free time from here");
    } else if countdown.active {
        let left = countdown.remaining_secs;
        eprint!("\r{}  countdown {:02}:{:02}   ", clock, left / 60, left % 60);
    } else {
        eprint!("\r{}   ", clock);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::test_state;

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::try_parse_from(["flow", "--data-dir", "/tmp/flow", "add", "3", "Write intro"]).unwrap();
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/flow")));
        assert!(matches!(cli.command, Command::Add { parent: 3, ref title } if title == "Write intro"));

        let cli = Cli::try_parse_from(["flow", "fix-ghosts"]).unwrap();
        assert!(matches!(cli.command, Command::FixGhosts));

        let cli = Cli::try_parse_from(["flow", "ranking", "--mode", "month", "--scope", "2"]).unwrap();
        assert!(matches!(cli.command, Command::Ranking { scope: Some(2), .. }));

        assert!(Cli::try_parse_from(["flow", "edit", "1", "--deadline", "2024-03-20", "--clear-deadline"]).is_err());
        assert!(Cli::try_parse_from(["flow", "progress", "1", "300"]).is_err());
    }

    #[tokio::test]
    async fn test_dispatch_prints_json() {
        let (state, _clock) = test_state().await;

        let created = dispatch(&state, Command::Project { title: "Garden".into() }).await.unwrap();
        assert_eq!(created["title"], "Garden");
        assert_eq!(created["status"], "todo");

        let listed = dispatch(&state, Command::List { parent: None }).await.unwrap();
        assert_eq!(listed.as_array().map(Vec::len), Some(1));

        let refused = dispatch(&state, Command::Clear { yes: false }).await;
        assert!(refused.is_err());

        let cleared = dispatch(&state, Command::Clear { yes: true }).await.unwrap();
        assert_eq!(cleared["tasks"], 1);
    }
}
