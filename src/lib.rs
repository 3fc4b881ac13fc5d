//! Flow Manager Backend
//!
//! Layered architecture:
//! - domain: Core entities and business rules
//! - repository: Data access abstractions and the SQLite implementation
//! - tree: In-memory index over the task hierarchy
//! - services: Task tree engine, focus timer, rankings, insights, journal, backup
//! - commands: Handlers over the shared application state
//! - cli: Command-line shell

use std::sync::Arc;

use clap::Parser;

pub mod cli;
pub mod commands;
pub mod config;
pub mod domain;
pub mod repository;
pub mod services;
pub mod tree;

use config::Settings;
use repository::{init_db, CheckInRepository, DbState, TaskRepository};
use services::{BackupService, CheckInJournal, Clock, FocusTimer, Maintenance, SystemClock, TaskTreeEngine};

/// Application state shared across commands
pub struct AppState {
    pub db_state: DbState,
    pub settings: Settings,
    pub clock: Arc<dyn Clock>,
    pub tasks: Arc<TaskRepository>,
    pub checkins: Arc<CheckInRepository>,
    /// One timer per process; it owns the open focus session
    pub timer: Arc<FocusTimer<TaskRepository>>,
}

impl AppState {
    pub fn new(db_state: DbState, settings: Settings, clock: Arc<dyn Clock>) -> Self {
        let tasks = Arc::new(TaskRepository::new(db_state.conn.clone()));
        let checkins = Arc::new(CheckInRepository::new(db_state.conn.clone()));
        let timer = Arc::new(FocusTimer::new(tasks.clone(), clock.clone(), settings.focus.clone()));
        Self {
            db_state,
            settings,
            clock,
            tasks,
            checkins,
            timer,
        }
    }

    pub fn engine(&self) -> TaskTreeEngine<TaskRepository> {
        TaskTreeEngine::new(self.tasks.clone(), self.clock.clone())
    }

    pub fn journal(&self) -> CheckInJournal<CheckInRepository> {
        CheckInJournal::new(self.checkins.clone(), self.clock.clone())
    }

    pub fn backup(&self) -> BackupService<TaskRepository, CheckInRepository> {
        BackupService::new(self.tasks.clone(), self.checkins.clone(), self.clock.clone())
    }

    pub fn maintenance(&self) -> Maintenance<TaskRepository, CheckInRepository> {
        Maintenance::new(self.tasks.clone(), self.checkins.clone())
    }
}

fn logger_config(settings: &Settings, verbose: bool) -> rolling_logger::LoggerConfig {
    let mut logger = rolling_logger::LoggerConfig::new(settings.log_dir(), config::APP_NAME);
    // LevelFilter prints upper case names, "OFF" included
    logger.level = settings.log_level().to_string().to_lowercase();
    logger.stderr = verbose;
    logger
}

/// Parse the command line, set up settings, logging and the database, and
/// run one subcommand
pub async fn run() -> Result<(), String> {
    let cli = cli::Cli::parse();

    let loaded = config::load_settings(cli.data_dir.clone());
    let settings = loaded.settings;

    if let Err(e) = rolling_logger::init_logger_with(logger_config(&settings, cli.verbose)) {
        eprintln!("Logging disabled: {}", e);
    }
    for warning in &loaded.warnings {
        log::warn!("{}", warning);
    }
    log::debug!("Data directory: {}", settings.data_dir.display());

    let db_state = init_db(&settings.db_path()).await?;
    let state = AppState::new(db_state, settings, Arc::new(SystemClock));

    let result = cli::dispatch(&state, cli.command).await;
    state.db_state.close().await;

    let output = result?;
    let text = serde_json::to_string_pretty(&output).map_err(|e| format!("Failed to encode output: {}", e))?;
    println!("{}", text);
    Ok(())
}
