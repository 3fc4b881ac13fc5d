//! Backup export and import
//!
//! File format: `{version: 1, generatedAt, tasks, checkins}` in camelCase
//! JSON. Import validates the whole document before touching the store and
//! then upserts by id, merging with what is already there.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::clock::Clock;
use crate::domain::{CheckIn, DomainError, DomainResult, Task};
use crate::repository::{CheckInStore, TaskStore};
use crate::tree::TaskTree;

pub const BACKUP_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub checkins: Vec<CheckIn>,
}

impl Backup {
    /// Parse and validate a backup document
    pub fn parse(json: &str) -> DomainResult<Self> {
        let backup: Backup = serde_json::from_str(json)
            .map_err(|e| DomainError::InvalidInput(format!("Malformed backup: {}", e)))?;
        backup.validate()?;
        Ok(backup)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.version != BACKUP_VERSION {
            return Err(DomainError::InvalidInput(format!(
                "Unsupported backup version {} (expected {})",
                self.version, BACKUP_VERSION
            )));
        }

        let mut seen = HashSet::new();
        for task in &self.tasks {
            if task.id == 0 {
                return Err(DomainError::InvalidInput(format!("Task '{}' has no id", task.title)));
            }
            if !seen.insert(task.id) {
                return Err(DomainError::InvalidInput(format!("Task {} appears twice", task.id)));
            }
            task.validate()?;
        }

        let mut seen = HashSet::new();
        for checkin in &self.checkins {
            if checkin.id == 0 {
                return Err(DomainError::InvalidInput(format!("Check-in on {} has no id", checkin.date)));
            }
            if !seen.insert(checkin.id) {
                return Err(DomainError::InvalidInput(format!("Check-in {} appears twice", checkin.id)));
            }
            checkin.validate()?;
        }
        Ok(())
    }

    pub fn to_json(&self) -> DomainResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| DomainError::Internal(format!("Failed to encode backup: {}", e)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub tasks: usize,
    pub checkins: usize,
}

pub struct BackupService<T: TaskStore, C: CheckInStore> {
    tasks: Arc<T>,
    checkins: Arc<C>,
    clock: Arc<dyn Clock>,
}

impl<T: TaskStore, C: CheckInStore> BackupService<T, C> {
    pub fn new(tasks: Arc<T>, checkins: Arc<C>, clock: Arc<dyn Clock>) -> Self {
        Self { tasks, checkins, clock }
    }

    pub async fn export(&self) -> DomainResult<Backup> {
        let backup = Backup {
            version: BACKUP_VERSION,
            generated_at: self.clock.now(),
            tasks: self.tasks.list().await?,
            checkins: self.checkins.list().await?,
        };
        log::info!(
            "Exported {} tasks and {} check-ins",
            backup.tasks.len(),
            backup.checkins.len()
        );
        Ok(backup)
    }

    /// Parse, validate, then merge; nothing is written if the document is bad
    pub async fn import_json(&self, json: &str) -> DomainResult<ImportSummary> {
        let backup = Backup::parse(json).inspect_err(|e| log::warn!("Backup rejected: {}", e))?;
        self.import(&backup).await
    }

    pub async fn import(&self, backup: &Backup) -> DomainResult<ImportSummary> {
        backup.validate()?;

        // Imported rows replace stored ones by id; the result must stay a forest
        let mut merged: HashMap<u32, Task> = self.tasks.list().await?.into_iter().map(|t| (t.id, t)).collect();
        merged.extend(backup.tasks.iter().map(|t| (t.id, t.clone())));
        let tree = TaskTree::from_tasks(merged.into_values().collect());
        for task in &backup.tasks {
            if let Some(id) = parent_cycle(&tree, task.id) {
                log::warn!("Backup rejected: task {} is its own ancestor", id);
                return Err(DomainError::InvalidInput(format!(
                    "Task {} would become its own ancestor",
                    id
                )));
            }
        }

        let summary = ImportSummary {
            tasks: self.tasks.bulk_put(&backup.tasks).await?,
            checkins: self.checkins.bulk_put(&backup.checkins).await?,
        };
        log::info!(
            "Imported {} tasks and {} check-ins from backup generated {}",
            summary.tasks,
            summary.checkins,
            backup.generated_at
        );
        Ok(summary)
    }
}

/// First task met twice while climbing from `start`, if any
fn parent_cycle(tree: &TaskTree, start: u32) -> Option<u32> {
    let mut seen = HashSet::new();
    let mut current = Some(start);
    while let Some(id) = current {
        if !seen.insert(id) {
            return Some(id);
        }
        current = tree.get(id).and_then(|t| t.parent_id);
    }
    None
}
