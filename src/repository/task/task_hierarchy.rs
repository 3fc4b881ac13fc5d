//! Task Hierarchy Operations
//!
//! Queries over the `parent_id` index.

use async_trait::async_trait;
use rusqlite::params;

use super::task_repo::{query_tasks, TaskRepository, TASK_COLUMNS};
use crate::domain::{DomainError, DomainResult, Task, TaskStatus};
use crate::repository::db::{internal, not_initialized};
use crate::repository::traits::TaskHierarchyOperations;

#[async_trait]
impl TaskHierarchyOperations for TaskRepository {
    async fn get_children(&self, parent_id: Option<u32>) -> DomainResult<Vec<Task>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        match parent_id {
            Some(pid) => {
                let sql = format!("SELECT {} FROM tasks WHERE parent_id = ? ORDER BY id ASC", TASK_COLUMNS);
                query_tasks(conn, &sql, params![pid])
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM tasks WHERE parent_id IS NULL ORDER BY created_at DESC, id DESC",
                    TASK_COLUMNS
                );
                query_tasks(conn, &sql, [])
            }
        }
    }

    async fn find_by_status(&self, status: TaskStatus) -> DomainResult<Vec<Task>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let sql = format!("SELECT {} FROM tasks WHERE status = ? ORDER BY id ASC", TASK_COLUMNS);
        query_tasks(conn, &sql, params![status.as_str()])
    }

    async fn set_parent(&self, id: u32, parent_id: Option<u32>) -> DomainResult<()> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let changed = conn
            .execute("UPDATE tasks SET parent_id = ? WHERE id = ?", params![parent_id, id])
            .map_err(internal)?;
        if changed == 0 {
            return Err(DomainError::task_not_found(id));
        }
        Ok(())
    }
}
