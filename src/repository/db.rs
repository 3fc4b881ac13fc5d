//! Database Connection and Setup
//!
//! Manages the SQLite connection and migrations. The connection lives in an
//! explicitly constructed `DbState` that is handed to each repository.

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::{DomainError, DomainResult};

/// Shared, lazily initialized connection slot
pub type SharedConnection = Arc<Mutex<Option<Connection>>>;

/// Database state wrapper
#[derive(Clone)]
pub struct DbState {
    pub conn: SharedConnection,
    pub db_path: Option<PathBuf>,
}

impl DbState {
    /// Empty state; every repository call fails until a connection is installed
    pub fn new(db_path: Option<PathBuf>) -> Self {
        Self {
            conn: Arc::new(Mutex::new(None)),
            db_path,
        }
    }

    /// Fresh in-memory database with the full schema
    pub async fn open_in_memory() -> Result<Self, String> {
        let conn = Connection::open_in_memory().map_err(|e| format!("Failed to open in-memory db: {}", e))?;
        run_migrations(&conn)?;
        let state = DbState::new(None);
        *state.conn.lock().await = Some(conn);
        Ok(state)
    }

    pub async fn is_ready(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    /// Drop the connection; later repository calls report the store as unavailable
    pub async fn close(&self) {
        if let Some(conn) = self.conn.lock().await.take() {
            if let Err((_, e)) = conn.close() {
                log::warn!("Closing database failed: {}", e);
            }
        }
    }
}

/// Open (creating if needed) the database at `db_path` and migrate it
pub async fn init_db(db_path: &Path) -> Result<DbState, String> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| format!("Failed to create db dir: {}", e))?;
        }
    }

    let conn = Connection::open(db_path).map_err(|e| format!("Failed to open db: {}", e))?;
    run_migrations(&conn)?;

    let state = DbState::new(Some(db_path.to_path_buf()));
    *state.conn.lock().await = Some(conn);
    log::info!("Database ready at {}", db_path.display());
    Ok(state)
}

pub(crate) fn not_initialized() -> DomainError {
    DomainError::Internal("Database not initialized".to_string())
}

pub(crate) fn internal(e: rusqlite::Error) -> DomainError {
    DomainError::Internal(e.to_string())
}

/// Id of the row just inserted on `conn`
pub(crate) fn inserted_id(conn: &Connection) -> DomainResult<u32> {
    let rowid = conn.last_insert_rowid();
    u32::try_from(rowid).map_err(|_| DomainError::Internal(format!("Row id {} is out of the id range", rowid)))
}

/// Run database migrations
fn run_migrations(conn: &Connection) -> Result<(), String> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            parent_id INTEGER,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'todo',
            progress INTEGER,
            created_at INTEGER NOT NULL,
            deadline INTEGER,
            time_spent_ms INTEGER NOT NULL DEFAULT 0,
            sessions TEXT NOT NULL DEFAULT '[]',
            resources TEXT NOT NULL DEFAULT '[]',
            links TEXT NOT NULL DEFAULT '[]'
        )",
        [],
    )
    .map_err(|e| e.to_string())?;

    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_tasks_parent ON tasks(parent_id);
         CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
         CREATE INDEX IF NOT EXISTS idx_tasks_created ON tasks(created_at);",
    )
    .map_err(|e| e.to_string())?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS checkins (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            stress_level INTEGER NOT NULL,
            mood TEXT NOT NULL DEFAULT 'neutral',
            note TEXT NOT NULL DEFAULT '',
            breathing_minutes INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )
    .map_err(|e| e.to_string())?;

    conn.execute("CREATE INDEX IF NOT EXISTS idx_checkins_date ON checkins(date)", [])
        .map_err(|e| e.to_string())?;

    Ok(())
}
