//! Commands for the task tree: CRUD, hierarchy and progress

use serde::Serialize;

use super::{parse_date, report};
use crate::domain::{Task, TaskPatch};
use crate::services::task_tree::deadline_from_date;
use crate::tree::ProjectOption;
use crate::AppState;

/// A task together with its direct children
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetail {
    #[serde(flatten)]
    pub task: Task,
    pub effective_progress: u8,
    pub overdue: bool,
    pub children: Vec<Task>,
}

/// Create a new root project
pub async fn create_project(state: &AppState, title: String) -> Result<Task, String> {
    state.engine().create_project(&title).await.map_err(report("create_project"))
}

/// Add a subtask under `parent_id`
pub async fn add_task(state: &AppState, parent_id: u32, title: String) -> Result<Task, String> {
    state.engine().add_child(parent_id, &title).await.map_err(report("add_task"))
}

/// Root projects, newest first
pub async fn list_projects(state: &AppState) -> Result<Vec<Task>, String> {
    state.engine().list_projects().await.map_err(report("list_projects"))
}

/// Children of a parent (None = root projects)
pub async fn get_children(state: &AppState, parent_id: Option<u32>) -> Result<Vec<Task>, String> {
    let engine = state.engine();
    match parent_id {
        Some(id) => engine.list_children(id).await,
        None => engine.list_projects().await,
    }
    .map_err(report("get_children"))
}

pub async fn get_task(state: &AppState, id: u32) -> Result<TaskDetail, String> {
    let engine = state.engine();
    let task = engine.get(id).await.map_err(report("get_task"))?;
    let children = engine.list_children(id).await.map_err(report("get_task"))?;
    Ok(TaskDetail {
        effective_progress: task.effective_progress(),
        overdue: task.is_overdue(state.clock.now()),
        task,
        children,
    })
}

/// Case-insensitive title search
pub async fn search_tasks(state: &AppState, query: String) -> Result<Vec<Task>, String> {
    state.engine().search(&query).await.map_err(report("search_tasks"))
}

pub async fn toggle_task(state: &AppState, id: u32) -> Result<Task, String> {
    state.engine().toggle_status(id).await.map_err(report("toggle_task"))
}

pub async fn set_task_progress(state: &AppState, id: u32, progress: u8) -> Result<Task, String> {
    state.engine().set_progress(id, progress).await.map_err(report("set_task_progress"))
}

/// Edit title, description or deadline
///
/// `deadline` is a `YYYY-MM-DD` day; `clear_deadline` removes it.
pub async fn update_task(
    state: &AppState,
    id: u32,
    title: Option<String>,
    description: Option<String>,
    deadline: Option<String>,
    clear_deadline: bool,
) -> Result<Task, String> {
    let deadline = match (deadline, clear_deadline) {
        (Some(_), true) => {
            log::error!("update_task failed: deadline both set and cleared");
            return Err("Cannot set and clear the deadline at once".to_string());
        }
        (Some(day), false) => {
            let day = parse_date(&day).map_err(report("update_task"))?;
            Some(Some(deadline_from_date(day).map_err(report("update_task"))?))
        }
        (None, true) => Some(None),
        (None, false) => None,
    };

    let patch = TaskPatch {
        title,
        description,
        deadline,
    };
    state.engine().update_details(id, &patch).await.map_err(report("update_task"))
}

/// Move a task under a new parent (None = make it a root project)
pub async fn move_task(state: &AppState, id: u32, parent_id: Option<u32>) -> Result<Task, String> {
    state.engine().reparent(id, parent_id).await.map_err(report("move_task"))
}

/// Delete a task and its whole subtree; returns the number of tasks removed
pub async fn delete_task(state: &AppState, id: u32) -> Result<usize, String> {
    state.engine().delete_recursive(id).await.map_err(report("delete_task"))
}

/// Hierarchical picker list, optionally filtered by title
pub async fn project_options(state: &AppState, filter: Option<String>) -> Result<Vec<ProjectOption>, String> {
    let tree = state.engine().load_tree().await.map_err(report("project_options"))?;
    Ok(tree.project_options(filter.as_deref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::test_state;
    use crate::domain::TaskStatus;
    use chrono::{Duration, Local, TimeZone, Utc};

    #[tokio::test]
    async fn test_project_lifecycle() {
        let (state, _clock) = test_state().await;

        let project = create_project(&state, "Thesis".into()).await.unwrap();
        let a = add_task(&state, project.id, "Read papers".into()).await.unwrap();
        let b = add_task(&state, project.id, "Write intro".into()).await.unwrap();

        toggle_task(&state, a.id).await.unwrap();
        let detail = get_task(&state, project.id).await.unwrap();
        assert_eq!(detail.children.len(), 2);
        assert_eq!(detail.task.progress, Some(50));
        assert_eq!(detail.effective_progress, 50);

        set_task_progress(&state, b.id, 100).await.unwrap();
        let detail = get_task(&state, project.id).await.unwrap();
        assert_eq!(detail.task.status, TaskStatus::Done);

        assert_eq!(delete_task(&state, project.id).await.unwrap(), 3);
        assert!(list_projects(&state).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_errors_become_messages() {
        let (state, _clock) = test_state().await;

        let err = add_task(&state, 42, "Orphan".into()).await.unwrap_err();
        assert!(err.contains("42"));

        let project = create_project(&state, "P".into()).await.unwrap();
        let child = add_task(&state, project.id, "C".into()).await.unwrap();
        assert!(move_task(&state, project.id, Some(child.id)).await.is_err());
        assert!(set_task_progress(&state, child.id, 120).await.is_err());
    }

    #[tokio::test]
    async fn test_update_deadline() {
        let (state, clock) = test_state().await;
        let project = create_project(&state, "Report".into()).await.unwrap();

        let updated = update_task(&state, project.id, None, Some("notes".into()), Some("2024-03-20".into()), false)
            .await
            .unwrap();
        let expected = Local.with_ymd_and_hms(2024, 3, 20, 23, 59, 59).unwrap();
        assert_eq!(updated.deadline, Some(expected.with_timezone(&Utc)));
        assert_eq!(updated.description, "notes");

        clock.set(expected.with_timezone(&Utc) + Duration::hours(1));
        assert!(get_task(&state, project.id).await.unwrap().overdue);

        let cleared = update_task(&state, project.id, None, None, None, true).await.unwrap();
        assert_eq!(cleared.deadline, None);

        assert!(update_task(&state, project.id, None, None, Some("tomorrow".into()), false).await.is_err());
        assert!(update_task(&state, project.id, None, None, Some("2024-03-20".into()), true).await.is_err());
    }

    #[tokio::test]
    async fn test_get_children_and_options() {
        let (state, _clock) = test_state().await;
        let zeta = create_project(&state, "Zeta".into()).await.unwrap();
        let alpha = create_project(&state, "alpha".into()).await.unwrap();
        add_task(&state, zeta.id, "Draft".into()).await.unwrap();

        let roots = get_children(&state, None).await.unwrap();
        assert_eq!(roots.len(), 2);
        assert_eq!(get_children(&state, Some(zeta.id)).await.unwrap().len(), 1);

        let options = project_options(&state, None).await.unwrap();
        let ids: Vec<u32> = options.iter().map(|o| o.id).collect();
        assert_eq!(ids[0], alpha.id);
        assert_eq!(options[2].depth, 1);

        let filtered = project_options(&state, Some("DRA".into())).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(search_tasks(&state, "zet".into()).await.unwrap().len(), 1);
    }
}
