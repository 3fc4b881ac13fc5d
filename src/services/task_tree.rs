//! Task Tree Engine
//!
//! Keeps parent progress/status consistent with the children and performs
//! structural edits (add, move, recursive delete). Every write that can
//! change a task's effective progress climbs the ancestor chain.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};

use super::clock::Clock;
use crate::domain::{
    average_progress, DomainError, DomainResult, Task, TaskPatch, TaskStatus, MAX_PROGRESS,
};
use crate::repository::TaskStore;
use crate::tree::TaskTree;

pub struct TaskTreeEngine<S: TaskStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: TaskStore> TaskTreeEngine<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Snapshot of the whole forest
    pub async fn load_tree(&self) -> DomainResult<TaskTree> {
        Ok(TaskTree::from_tasks(self.store.list().await?))
    }

    pub async fn get(&self, id: u32) -> DomainResult<Task> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::task_not_found(id))
    }

    pub async fn list_projects(&self) -> DomainResult<Vec<Task>> {
        self.store.get_children(None).await
    }

    pub async fn list_children(&self, id: u32) -> DomainResult<Vec<Task>> {
        self.get(id).await?;
        self.store.get_children(Some(id)).await
    }

    pub async fn search(&self, query: &str) -> DomainResult<Vec<Task>> {
        self.store.search(query).await
    }

    pub async fn create_project(&self, title: &str) -> DomainResult<Task> {
        let title = checked_title(title)?;
        let project = self.store.create(&Task::new_project(title, self.clock.now())).await?;
        log::info!("Created project {} ({})", project.id, project.title);
        Ok(project)
    }

    /// New subtask under `parent_id`; the parent is recomputed right away
    pub async fn add_child(&self, parent_id: u32, title: &str) -> DomainResult<Task> {
        let title = checked_title(title)?;
        self.get(parent_id).await?;

        let child = self
            .store
            .create(&Task::new_child(parent_id, title, self.clock.now()))
            .await?;
        log::debug!("Added task {} under {}", child.id, parent_id);

        self.recompute_ancestors(parent_id).await?;
        Ok(child)
    }

    /// Flip done <-> todo, forcing progress to 100 or 0
    pub async fn toggle_status(&self, id: u32) -> DomainResult<Task> {
        let mut task = self.get(id).await?;

        if task.is_done() {
            task.status = TaskStatus::Todo;
            task.progress = Some(0);
        } else {
            task.status = TaskStatus::Done;
            task.progress = Some(MAX_PROGRESS);
        }
        let task = self.store.update(&task).await?;

        if let Some(parent_id) = task.parent_id {
            self.recompute_ancestors(parent_id).await?;
        }
        Ok(task)
    }

    /// Manual progress edit
    ///
    /// On a task with children the value holds only until the next
    /// child-driven recompute.
    pub async fn set_progress(&self, id: u32, progress: u8) -> DomainResult<Task> {
        if progress > MAX_PROGRESS {
            return Err(DomainError::InvalidInput(format!(
                "Progress {} exceeds {}",
                progress, MAX_PROGRESS
            )));
        }

        let mut task = self.get(id).await?;
        task.progress = Some(progress);
        let task = self.store.update(&task).await?;

        if let Some(parent_id) = task.parent_id {
            self.recompute_ancestors(parent_id).await?;
        }
        Ok(task)
    }

    pub async fn update_details(&self, id: u32, patch: &TaskPatch) -> DomainResult<Task> {
        let mut task = self.get(id).await?;
        if patch.is_empty() {
            return Ok(task);
        }
        patch.apply(&mut task)?;
        self.store.update(&task).await
    }

    /// Re-derive progress/status from the children of `parent_id`, then
    /// continue with its parent
    ///
    /// A task without children is left alone. Climbing stops at the first
    /// ancestor whose values do not change. Returns the number of tasks
    /// written.
    pub async fn recompute_ancestors(&self, parent_id: u32) -> DomainResult<usize> {
        let mut writes = 0;
        let mut seen = HashSet::new();
        let mut cursor = Some(parent_id);

        while let Some(id) = cursor {
            if !seen.insert(id) {
                break;
            }

            let children = self.store.get_children(Some(id)).await?;
            let Some(avg) = average_progress(&children) else {
                break;
            };

            let mut parent = self.get(id).await?;
            let status = if avg == MAX_PROGRESS { TaskStatus::Done } else { TaskStatus::Todo };
            if parent.progress == Some(avg) && parent.status == status {
                break;
            }

            parent.progress = Some(avg);
            parent.status = status;
            self.store.update(&parent).await?;
            writes += 1;
            log::debug!("Recomputed task {}: progress {} status {}", id, avg, status);

            cursor = parent.parent_id;
        }
        Ok(writes)
    }

    /// Move `id` under `new_parent` (None = make it a root project)
    ///
    /// Rejected with `Conflict` when the target is the task itself or one of
    /// its descendants. Both the old and the new parent are recomputed.
    pub async fn reparent(&self, id: u32, new_parent: Option<u32>) -> DomainResult<Task> {
        let tree = self.load_tree().await?;
        let task = tree.get(id).ok_or_else(|| DomainError::task_not_found(id))?;
        let old_parent = task.parent_id;

        if let Some(target) = new_parent {
            if target == id {
                return Err(DomainError::Conflict(format!("Task {} cannot be its own parent", id)));
            }
            if !tree.contains(target) {
                return Err(DomainError::task_not_found(target));
            }
            if tree.is_descendant(id, target) {
                return Err(DomainError::Conflict(format!(
                    "Task {} is inside task {}; moving would create a cycle",
                    target, id
                )));
            }
        }

        if old_parent == new_parent {
            return Ok(task.clone());
        }

        self.store.set_parent(id, new_parent).await?;
        log::info!("Moved task {} from {:?} to {:?}", id, old_parent, new_parent);

        // Two independent recomputes; not atomic together
        if let Some(old) = old_parent {
            if tree.contains(old) {
                self.recompute_ancestors(old).await?;
            }
        }
        if let Some(new) = new_parent {
            self.recompute_ancestors(new).await?;
        }

        self.get(id).await
    }

    /// Delete `id` and every task below it, children first
    ///
    /// Returns the number of tasks removed.
    pub async fn delete_recursive(&self, id: u32) -> DomainResult<usize> {
        let tree = self.load_tree().await?;
        let task = tree.get(id).ok_or_else(|| DomainError::task_not_found(id))?;
        let former_parent = task.parent_id;

        let doomed = tree.post_order_ids(id);
        let removed = self.store.bulk_delete(&doomed).await?;
        log::info!("Deleted task {} with {} descendants", id, removed.saturating_sub(1));

        if let Some(parent_id) = former_parent {
            if tree.contains(parent_id) {
                self.recompute_ancestors(parent_id).await?;
            }
        }
        Ok(removed)
    }
}

fn checked_title(title: &str) -> DomainResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(DomainError::InvalidInput("Title cannot be empty".into()));
    }
    Ok(title.to_string())
}

/// A deadline picked as a calendar day means the end of that day, local time
pub fn deadline_from_date(date: NaiveDate) -> DomainResult<DateTime<Utc>> {
    let end_of_day = date
        .and_hms_opt(23, 59, 59)
        .ok_or_else(|| DomainError::InvalidInput(format!("Invalid deadline {}", date)))?;
    Local
        .from_local_datetime(&end_of_day)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| DomainError::InvalidInput(format!("Deadline {} does not exist locally", date)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{DbState, Repository, TaskRepository};
    use crate::services::clock::ManualClock;
    use chrono::{Duration, TimeZone};

    struct Fixture {
        _db: DbState,
        store: Arc<TaskRepository>,
        clock: Arc<ManualClock>,
        engine: TaskTreeEngine<TaskRepository>,
    }

    async fn setup() -> Fixture {
        let db = DbState::open_in_memory().await.expect("Failed to init test DB");
        let store = Arc::new(TaskRepository::new(db.conn.clone()));
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap()));
        let engine = TaskTreeEngine::new(store.clone(), clock.clone());
        Fixture { _db: db, store, clock, engine }
    }

    impl Fixture {
        async fn task(&self, id: u32) -> Task {
            self.store.find_by_id(id).await.unwrap().unwrap()
        }

        async fn put(&self, mut task: Task) -> Task {
            task.id = 0;
            self.store.create(&task).await.unwrap()
        }
    }

    #[tokio::test]
    async fn test_create_project_defaults() {
        let fx = setup().await;
        let project = fx.engine.create_project("  Thesis ").await.unwrap();
        assert_eq!(project.title, "Thesis");
        assert_eq!(project.progress, Some(0));
        assert!(project.is_root());

        assert!(fx.engine.create_project("   ").await.is_err());
    }

    #[tokio::test]
    async fn test_projects_listed_newest_first() {
        let fx = setup().await;
        let first = fx.engine.create_project("First").await.unwrap();
        fx.clock.advance(Duration::minutes(5));
        let second = fx.engine.create_project("Second").await.unwrap();

        let ids: Vec<u32> = fx.engine.list_projects().await.unwrap().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn test_rollup_scenario_seventy_percent() {
        let fx = setup().await;
        let mut root = Task::new_project("A".into(), fx.clock.now());
        root.progress = None;
        let a = fx.put(root).await;

        let mut b = Task::new_child(a.id, "B".into(), fx.clock.now());
        b.status = TaskStatus::Done;
        b.progress = None;
        fx.put(b).await;

        let mut c = Task::new_child(a.id, "C".into(), fx.clock.now());
        c.progress = Some(40);
        fx.put(c).await;

        let writes = fx.engine.recompute_ancestors(a.id).await.unwrap();
        assert_eq!(writes, 1);

        let a = fx.task(a.id).await;
        assert_eq!(a.progress, Some(70));
        assert_eq!(a.status, TaskStatus::Todo);

        // Nothing changed, nothing written
        assert_eq!(fx.engine.recompute_ancestors(a.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_add_child_recomputes_parent() {
        let fx = setup().await;
        let project = fx.engine.create_project("P").await.unwrap();
        let child = fx.engine.add_child(project.id, "first").await.unwrap();
        fx.engine.toggle_status(child.id).await.unwrap();
        assert_eq!(fx.task(project.id).await.status, TaskStatus::Done);

        fx.engine.add_child(project.id, "second").await.unwrap();
        let project = fx.task(project.id).await;
        assert_eq!(project.progress, Some(50));
        assert_eq!(project.status, TaskStatus::Todo);

        assert!(fx.engine.add_child(999, "orphan").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_toggle_climbs_to_root() {
        let fx = setup().await;
        let root = fx.engine.create_project("Root").await.unwrap();
        let mid = fx.engine.add_child(root.id, "Mid").await.unwrap();
        let leaf = fx.engine.add_child(mid.id, "Leaf").await.unwrap();

        let toggled = fx.engine.toggle_status(leaf.id).await.unwrap();
        assert!(toggled.is_done());
        assert_eq!(toggled.progress, Some(100));
        assert_eq!(fx.task(mid.id).await.status, TaskStatus::Done);
        assert_eq!(fx.task(root.id).await.progress, Some(100));

        let toggled = fx.engine.toggle_status(leaf.id).await.unwrap();
        assert_eq!(toggled.status, TaskStatus::Todo);
        assert_eq!(toggled.progress, Some(0));
        let root = fx.task(root.id).await;
        assert_eq!(root.progress, Some(0));
        assert_eq!(root.status, TaskStatus::Todo);
    }

    #[tokio::test]
    async fn test_toggle_unknown_is_not_found() {
        let fx = setup().await;
        assert!(fx.engine.toggle_status(41).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_manual_progress_on_parent_is_overridden() {
        let fx = setup().await;
        let project = fx.engine.create_project("P").await.unwrap();
        let a = fx.engine.add_child(project.id, "a").await.unwrap();
        fx.engine.add_child(project.id, "b").await.unwrap();

        fx.engine.set_progress(project.id, 90).await.unwrap();
        assert_eq!(fx.task(project.id).await.progress, Some(90));

        fx.engine.set_progress(a.id, 60).await.unwrap();
        assert_eq!(fx.task(project.id).await.progress, Some(30));

        assert!(fx.engine.set_progress(a.id, 101).await.is_err());
    }

    #[tokio::test]
    async fn test_reparent_recomputes_both_parents() {
        let fx = setup().await;
        let p1 = fx.engine.create_project("P1").await.unwrap();
        let p2 = fx.engine.create_project("P2").await.unwrap();
        let x = fx.engine.add_child(p1.id, "X").await.unwrap();
        let y = fx.engine.add_child(p1.id, "Y").await.unwrap();
        fx.engine.add_child(p2.id, "Z").await.unwrap();
        fx.engine.toggle_status(x.id).await.unwrap();
        assert_eq!(fx.task(p1.id).await.progress, Some(50));

        let moved = fx.engine.reparent(x.id, Some(p2.id)).await.unwrap();
        assert_eq!(moved.parent_id, Some(p2.id));

        assert_eq!(fx.task(p1.id).await.progress, Some(0));
        assert_eq!(fx.task(p2.id).await.progress, Some(50));
        assert_eq!(fx.task(y.id).await.parent_id, Some(p1.id));
    }

    #[tokio::test]
    async fn test_reparent_to_root_and_noop() {
        let fx = setup().await;
        let p = fx.engine.create_project("P").await.unwrap();
        let x = fx.engine.add_child(p.id, "X").await.unwrap();

        let same = fx.engine.reparent(x.id, Some(p.id)).await.unwrap();
        assert_eq!(same.parent_id, Some(p.id));

        let root = fx.engine.reparent(x.id, None).await.unwrap();
        assert!(root.is_root());
    }

    #[tokio::test]
    async fn test_reparent_rejects_cycles() {
        let fx = setup().await;
        let a = fx.engine.create_project("A").await.unwrap();
        let b = fx.engine.add_child(a.id, "B").await.unwrap();
        let c = fx.engine.add_child(b.id, "C").await.unwrap();

        let err = fx.engine.reparent(a.id, Some(a.id)).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        let err = fx.engine.reparent(a.id, Some(c.id)).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert!(fx.engine.reparent(a.id, Some(77)).await.unwrap_err().is_not_found());

        // Tree untouched
        assert!(fx.task(a.id).await.is_root());
        assert_eq!(fx.task(c.id).await.parent_id, Some(b.id));
    }

    #[tokio::test]
    async fn test_delete_recursive_removes_subtree() {
        let fx = setup().await;
        let root = fx.engine.create_project("Root").await.unwrap();
        let keep = fx.engine.add_child(root.id, "Keep").await.unwrap();
        let gone = fx.engine.add_child(root.id, "Gone").await.unwrap();
        let deep = fx.engine.add_child(gone.id, "Deep").await.unwrap();
        fx.engine.add_child(deep.id, "Deeper").await.unwrap();
        fx.engine.toggle_status(keep.id).await.unwrap();

        let removed = fx.engine.delete_recursive(gone.id).await.unwrap();
        assert_eq!(removed, 3);

        let tree = fx.engine.load_tree().await.unwrap();
        assert_eq!(tree.len(), 2);
        assert!(tree.ghosts().is_empty());

        let root = fx.task(root.id).await;
        assert_eq!(root.progress, Some(100));
        assert!(root.is_done());

        assert!(fx.engine.delete_recursive(gone.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_update_details() {
        let fx = setup().await;
        let p = fx.engine.create_project("P").await.unwrap();
        let deadline = fx.clock.now() + Duration::days(2);

        let patch = TaskPatch {
            title: Some("Renamed".into()),
            description: Some("notes".into()),
            deadline: Some(Some(deadline)),
        };
        let updated = fx.engine.update_details(p.id, &patch).await.unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(fx.task(p.id).await.deadline, Some(deadline));
    }

    #[test]
    fn test_deadline_from_date_is_end_of_local_day() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let deadline = deadline_from_date(date).unwrap().with_timezone(&Local);
        assert_eq!(deadline.date_naive(), date);
        assert_eq!(deadline.format("%H:%M:%S").to_string(), "23:59:59");
    }
}
