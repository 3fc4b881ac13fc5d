//! Data maintenance: ghost repair and full wipe

use std::sync::Arc;

use serde::Serialize;

use crate::domain::DomainResult;
use crate::repository::{CheckInStore, TaskStore};
use crate::tree::TaskTree;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClearSummary {
    pub tasks: usize,
    pub checkins: usize,
}

pub struct Maintenance<T: TaskStore, C: CheckInStore> {
    tasks: Arc<T>,
    checkins: Arc<C>,
}

impl<T: TaskStore, C: CheckInStore> Maintenance<T, C> {
    pub fn new(tasks: Arc<T>, checkins: Arc<C>) -> Self {
        Self { tasks, checkins }
    }

    /// Delete every task whose parent no longer exists, with its subtree
    ///
    /// Repeats until a pass finds nothing. Returns the number of tasks removed.
    pub async fn fix_ghosts(&self) -> DomainResult<usize> {
        let mut removed = 0;
        loop {
            let tree = TaskTree::from_tasks(self.tasks.list().await?);
            let ghosts = tree.ghosts();
            if ghosts.is_empty() {
                break;
            }

            let doomed: Vec<u32> = ghosts.iter().flat_map(|id| tree.post_order_ids(*id)).collect();
            log::warn!("Removing {} ghost tasks ({} with descendants)", ghosts.len(), doomed.len());
            removed += self.tasks.bulk_delete(&doomed).await?;
        }
        Ok(removed)
    }

    /// Wipe tasks and check-ins
    pub async fn clear_all(&self) -> DomainResult<ClearSummary> {
        let summary = ClearSummary {
            tasks: self.tasks.clear().await?,
            checkins: self.checkins.clear().await?,
        };
        log::warn!("Cleared {} tasks and {} check-ins", summary.tasks, summary.checkins);
        Ok(summary)
    }
}
