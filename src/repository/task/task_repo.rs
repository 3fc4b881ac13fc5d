//! Task Repository - Core CRUD Operations
//!
//! SQLite-backed implementation for task CRUD, bulk and search operations.
//! Sessions, resources and links are stored as JSON text columns.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use crate::domain::{DomainError, DomainResult, Task, TaskStatus};
use crate::repository::db::{inserted_id, internal, not_initialized, SharedConnection};
use crate::repository::traits::{BulkRepository, Repository, SearchableRepository};

pub(super) const TASK_COLUMNS: &str = "id, parent_id, title, description, status, progress, created_at, deadline, time_spent_ms, sessions, resources, links";

/// SQLite implementation of the task store
pub struct TaskRepository {
    pub(super) conn: SharedConnection,
}

impl TaskRepository {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl Repository<Task> for TaskRepository {
    async fn create(&self, entity: &Task) -> DomainResult<Task> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let encoded = EncodedTask::encode(entity)?;
        conn.execute(
            "INSERT INTO tasks (parent_id, title, description, status, progress, created_at, deadline, time_spent_ms, sessions, resources, links) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                entity.parent_id,
                entity.title,
                entity.description,
                entity.status.as_str(),
                entity.progress,
                encoded.created_at,
                encoded.deadline,
                entity.time_spent_ms,
                encoded.sessions,
                encoded.resources,
                encoded.links,
            ],
        )
        .map_err(internal)?;

        let mut task = entity.clone();
        task.id = inserted_id(conn)?;
        Ok(task)
    }

    async fn find_by_id(&self, id: u32) -> DomainResult<Option<Task>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let query = format!("SELECT {} FROM tasks WHERE id = ?", TASK_COLUMNS);
        let mut tasks = query_tasks(conn, &query, params![id])?;
        Ok(tasks.pop())
    }

    async fn list(&self) -> DomainResult<Vec<Task>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let query = format!("SELECT {} FROM tasks ORDER BY id ASC", TASK_COLUMNS);
        query_tasks(conn, &query, [])
    }

    async fn update(&self, entity: &Task) -> DomainResult<Task> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let encoded = EncodedTask::encode(entity)?;
        let changed = conn
            .execute(
                "UPDATE tasks SET parent_id = ?, title = ?, description = ?, status = ?, progress = ?, created_at = ?, deadline = ?, time_spent_ms = ?, sessions = ?, resources = ?, links = ? WHERE id = ?",
                params![
                    entity.parent_id,
                    entity.title,
                    entity.description,
                    entity.status.as_str(),
                    entity.progress,
                    encoded.created_at,
                    encoded.deadline,
                    entity.time_spent_ms,
                    encoded.sessions,
                    encoded.resources,
                    encoded.links,
                    entity.id,
                ],
            )
            .map_err(internal)?;

        if changed == 0 {
            return Err(DomainError::task_not_found(entity.id));
        }
        Ok(entity.clone())
    }

    async fn delete(&self, id: u32) -> DomainResult<()> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        // Single row only; subtree cascades are the tree engine's job
        conn.execute("DELETE FROM tasks WHERE id = ?", params![id])
            .map_err(internal)?;
        Ok(())
    }
}

#[async_trait]
impl BulkRepository<Task> for TaskRepository {
    async fn bulk_put(&self, entities: &[Task]) -> DomainResult<usize> {
        let encoded = entities
            .iter()
            .map(EncodedTask::encode)
            .collect::<DomainResult<Vec<_>>>()?;

        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(not_initialized)?;
        let tx = conn.transaction().map_err(internal)?;

        for (entity, encoded) in entities.iter().zip(encoded.iter()) {
            tx.execute(
                "INSERT OR REPLACE INTO tasks (id, parent_id, title, description, status, progress, created_at, deadline, time_spent_ms, sessions, resources, links) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    entity.id,
                    entity.parent_id,
                    entity.title,
                    entity.description,
                    entity.status.as_str(),
                    entity.progress,
                    encoded.created_at,
                    encoded.deadline,
                    entity.time_spent_ms,
                    encoded.sessions,
                    encoded.resources,
                    encoded.links,
                ],
            )
            .map_err(internal)?;
        }

        tx.commit().map_err(internal)?;
        Ok(entities.len())
    }

    async fn bulk_delete(&self, ids: &[u32]) -> DomainResult<usize> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(not_initialized)?;
        let tx = conn.transaction().map_err(internal)?;

        let mut removed = 0;
        for id in ids {
            removed += tx
                .execute("DELETE FROM tasks WHERE id = ?", params![id])
                .map_err(internal)?;
        }

        tx.commit().map_err(internal)?;
        Ok(removed)
    }

    async fn clear(&self) -> DomainResult<usize> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;
        conn.execute("DELETE FROM tasks", []).map_err(internal)
    }
}

#[async_trait]
impl SearchableRepository<Task> for TaskRepository {
    async fn search(&self, query: &str) -> DomainResult<Vec<Task>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let pattern = format!("%{}%", escape_like(query.trim()));
        let sql = format!(
            "SELECT {} FROM tasks WHERE title LIKE ? ESCAPE '\\' ORDER BY title COLLATE NOCASE ASC",
            TASK_COLUMNS
        );
        query_tasks(conn, &sql, params![pattern])
    }
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Column values that need conversion before binding
struct EncodedTask {
    created_at: i64,
    deadline: Option<i64>,
    sessions: String,
    resources: String,
    links: String,
}

impl EncodedTask {
    fn encode(task: &Task) -> DomainResult<Self> {
        let json = |e: serde_json::Error| DomainError::Internal(format!("Failed to encode task {}: {}", task.id, e));
        Ok(Self {
            created_at: task.created_at.timestamp_millis(),
            deadline: task.deadline.map(|d| d.timestamp_millis()),
            sessions: serde_json::to_string(&task.sessions).map_err(json)?,
            resources: serde_json::to_string(&task.resources).map_err(json)?,
            links: serde_json::to_string(&task.links).map_err(json)?,
        })
    }
}

/// Run a task query and decode every row
pub(super) fn query_tasks<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> DomainResult<Vec<Task>> {
    let mut stmt = conn.prepare(sql).map_err(internal)?;
    let mut rows = stmt.query(params).map_err(internal)?;

    let mut tasks = Vec::new();
    while let Some(row) = rows.next().map_err(internal)? {
        tasks.push(row_to_task(row)?);
    }
    Ok(tasks)
}

fn millis_to_datetime(ms: i64) -> DomainResult<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .ok_or_else(|| DomainError::Internal(format!("Invalid timestamp {}", ms)))
}

/// Convert a database row to Task
fn row_to_task(row: &Row) -> DomainResult<Task> {
    let id: u32 = row.get(0).map_err(internal)?;
    let json = |e: serde_json::Error| DomainError::Internal(format!("Corrupt JSON in task {}: {}", id, e));

    let status: String = row.get(4).map_err(internal)?;
    let created_at: i64 = row.get(6).map_err(internal)?;
    let deadline: Option<i64> = row.get(7).map_err(internal)?;
    let sessions: String = row.get(9).map_err(internal)?;
    let resources: String = row.get(10).map_err(internal)?;
    let links: String = row.get(11).map_err(internal)?;

    Ok(Task {
        id,
        parent_id: row.get(1).map_err(internal)?,
        title: row.get(2).map_err(internal)?,
        description: row.get(3).map_err(internal)?,
        status: TaskStatus::from_str(&status),
        progress: row.get(5).map_err(internal)?,
        created_at: millis_to_datetime(created_at)?,
        deadline: deadline.map(millis_to_datetime).transpose()?,
        time_spent_ms: row.get(8).map_err(internal)?,
        sessions: serde_json::from_str(&sessions).map_err(json)?,
        resources: serde_json::from_str(&resources).map_err(json)?,
        links: serde_json::from_str(&links).map_err(json)?,
    })
}
