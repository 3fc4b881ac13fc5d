//! Task Entity
//!
//! A node in the project forest. Root tasks (no parent) are projects; any
//! task may own subtasks. Progress of a task with children is derived from
//! them by the tree engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{DomainError, DomainResult, Entity};

/// Highest progress value
pub const MAX_PROGRESS: u8 = 100;

/// Highest pre-session stress rating
pub const MAX_STRESS_LEVEL: u8 = 10;

/// Task workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    /// A focus session is open on the task
    InProgress,
    /// The last focus session was closed
    Paused,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Paused => "paused",
            TaskStatus::Done => "done",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "in_progress" => TaskStatus::InProgress,
            "paused" => TaskStatus::Paused,
            "done" => TaskStatus::Done,
            _ => TaskStatus::Todo,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One focus interval logged on a task
///
/// While a session is open its `end` equals `start`; the timer fixes it up
/// on stop. Imported data may carry no `end` at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub start: DateTime<Utc>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stress_level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stress_note: Option<String>,
    #[serde(default)]
    pub did_breathing: bool,
}

impl SessionRecord {
    /// Placeholder entry appended when a session opens
    pub fn open_at(start: DateTime<Utc>) -> Self {
        Self {
            start,
            end: Some(start),
            stress_level: None,
            stress_note: None,
            did_breathing: false,
        }
    }

    /// Length of the session, using `now` when it has no end yet
    pub fn duration_ms(&self, now: DateTime<Utc>) -> i64 {
        let end = self.end.unwrap_or(now);
        (end - self.start).num_milliseconds().max(0)
    }
}

/// Kind of an attached resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    File,
    Link,
    Folder,
}

/// Reference to something attached to a task; stored, never interpreted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResource {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    pub title: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskLink {
    pub title: String,
    pub url: String,
}

/// A project or subtask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier (0 until the store assigns one)
    pub id: u32,
    /// Parent task ID (None = root project)
    #[serde(default)]
    pub parent_id: Option<u32>,
    pub title: String,
    /// Free-form notes
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    /// Authored on leaves, derived on parents
    #[serde(default)]
    pub progress: Option<u8>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    /// Focus time logged directly on this task, descendants excluded
    #[serde(default)]
    pub time_spent_ms: i64,
    #[serde(default)]
    pub sessions: Vec<SessionRecord>,
    #[serde(default)]
    pub resources: Vec<TaskResource>,
    #[serde(default)]
    pub links: Vec<TaskLink>,
}

impl Task {
    /// Create a new root project
    pub fn new_project(title: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            parent_id: None,
            title,
            description: String::new(),
            status: TaskStatus::Todo,
            progress: Some(0),
            created_at,
            deadline: None,
            time_spent_ms: 0,
            sessions: Vec::new(),
            resources: Vec::new(),
            links: Vec::new(),
        }
    }

    /// Create a new subtask under a parent
    pub fn new_child(parent_id: u32, title: String, created_at: DateTime<Utc>) -> Self {
        Self {
            parent_id: Some(parent_id),
            ..Self::new_project(title, created_at)
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_done(&self) -> bool {
        self.status == TaskStatus::Done
    }

    /// Progress as seen by the parent's average
    ///
    /// The explicit value when set, otherwise 100 for done tasks and 0 for
    /// everything else.
    pub fn effective_progress(&self) -> u8 {
        match self.progress {
            Some(p) => p,
            None if self.is_done() => MAX_PROGRESS,
            None => 0,
        }
    }

    /// Past its deadline and not done
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        match self.deadline {
            Some(deadline) => now > deadline && !self.is_done(),
            None => false,
        }
    }

    /// Range checks applied to records coming from outside (backup files)
    pub fn validate(&self) -> DomainResult<()> {
        if self.title.trim().is_empty() {
            return Err(DomainError::InvalidInput(format!("Task {} has an empty title", self.id)));
        }
        if let Some(p) = self.progress {
            if p > MAX_PROGRESS {
                return Err(DomainError::InvalidInput(format!(
                    "Task {} progress {} exceeds {}",
                    self.id, p, MAX_PROGRESS
                )));
            }
        }
        if self.parent_id == Some(self.id) {
            return Err(DomainError::InvalidInput(format!("Task {} is its own parent", self.id)));
        }
        for session in &self.sessions {
            if let Some(level) = session.stress_level {
                validate_stress_level(level)?;
            }
        }
        Ok(())
    }
}

impl Entity for Task {
    type Id = u32;

    fn id(&self) -> Self::Id {
        self.id
    }
}

pub fn validate_stress_level(level: u8) -> DomainResult<()> {
    if level > MAX_STRESS_LEVEL {
        return Err(DomainError::InvalidInput(format!(
            "Stress level {} exceeds {}",
            level, MAX_STRESS_LEVEL
        )));
    }
    Ok(())
}

/// Rounded mean of the children's effective progress
///
/// Returns `None` for an empty slice. Halves round up.
pub fn average_progress(children: &[Task]) -> Option<u8> {
    if children.is_empty() {
        return None;
    }
    let n = children.len() as u64;
    let sum: u64 = children.iter().map(|c| u64::from(c.effective_progress())).sum();
    Some(((2 * sum + n) / (2 * n)) as u8)
}

/// Partial edit of the user-authored fields of a task
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    /// `Some(None)` clears the deadline
    pub deadline: Option<Option<DateTime<Utc>>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.deadline.is_none()
    }

    pub fn apply(&self, task: &mut Task) -> DomainResult<()> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(DomainError::InvalidInput("Title cannot be empty".into()));
            }
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(deadline) = self.deadline {
            task.deadline = deadline;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, h, m, s).unwrap()
    }

    fn leaf(status: TaskStatus, progress: Option<u8>) -> Task {
        let mut task = Task::new_child(1, "leaf".to_string(), at(9, 0, 0));
        task.status = status;
        task.progress = progress;
        task
    }

    #[test]
    fn test_project_creation() {
        let project = Task::new_project("Thesis".to_string(), at(9, 0, 0));
        assert!(project.is_root());
        assert_eq!(project.status, TaskStatus::Todo);
        assert_eq!(project.progress, Some(0));
        assert!(project.sessions.is_empty());
    }

    #[test]
    fn test_child_creation() {
        let child = Task::new_child(3, "Chapter".to_string(), at(9, 0, 0));
        assert_eq!(child.parent_id, Some(3));
        assert!(!child.is_root());
    }

    #[test]
    fn test_effective_progress() {
        assert_eq!(leaf(TaskStatus::Done, None).effective_progress(), 100);
        assert_eq!(leaf(TaskStatus::Todo, None).effective_progress(), 0);
        assert_eq!(leaf(TaskStatus::Done, Some(40)).effective_progress(), 40);
        assert_eq!(leaf(TaskStatus::Paused, Some(40)).effective_progress(), 40);
    }

    #[test]
    fn test_average_progress_rounds_half_up() {
        assert_eq!(average_progress(&[]), None);
        let children = vec![leaf(TaskStatus::Done, None), leaf(TaskStatus::Todo, Some(40))];
        assert_eq!(average_progress(&children), Some(70));

        let children = vec![leaf(TaskStatus::Todo, Some(1)), leaf(TaskStatus::Todo, Some(0))];
        assert_eq!(average_progress(&children), Some(1));

        let children = vec![
            leaf(TaskStatus::Done, None),
            leaf(TaskStatus::Todo, None),
            leaf(TaskStatus::Todo, None),
        ];
        assert_eq!(average_progress(&children), Some(33));
    }

    #[test]
    fn test_status_round_trip_strings() {
        assert_eq!(TaskStatus::InProgress.as_str(), "in_progress");
        assert_eq!(TaskStatus::from_str("paused"), TaskStatus::Paused);
        assert_eq!(TaskStatus::from_str("garbage"), TaskStatus::Todo);
    }

    #[test]
    fn test_session_duration_uses_now_when_open() {
        let mut session = SessionRecord::open_at(at(9, 0, 0));
        assert_eq!(session.duration_ms(at(10, 0, 0)), 0);
        session.end = None;
        assert_eq!(session.duration_ms(at(9, 1, 30)), 90_000);
    }

    #[test]
    fn test_overdue() {
        let mut task = leaf(TaskStatus::Todo, None);
        task.deadline = Some(at(12, 0, 0));
        assert!(task.is_overdue(at(13, 0, 0)));
        assert!(!task.is_overdue(at(11, 0, 0)));
        task.status = TaskStatus::Done;
        assert!(!task.is_overdue(at(13, 0, 0)));
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut task = leaf(TaskStatus::Todo, Some(120));
        assert!(task.validate().is_err());
        task.progress = Some(50);
        assert!(task.validate().is_ok());
        let mut session = SessionRecord::open_at(at(9, 0, 0));
        session.stress_level = Some(11);
        task.sessions.push(session);
        assert!(task.validate().is_err());
    }

    #[test]
    fn test_patch_apply() {
        let mut task = leaf(TaskStatus::Todo, None);
        task.deadline = Some(at(12, 0, 0));
        let patch = TaskPatch {
            title: Some("Renamed".into()),
            description: None,
            deadline: Some(None),
        };
        patch.apply(&mut task).unwrap();
        assert_eq!(task.title, "Renamed");
        assert_eq!(task.deadline, None);

        let blank = TaskPatch { title: Some("  ".into()), ..Default::default() };
        assert!(blank.apply(&mut task).is_err());
    }

    #[test]
    fn test_backup_field_names() {
        let json = r#"{
            "id": 4,
            "parentId": 2,
            "title": "Write intro",
            "status": "in_progress",
            "createdAt": "2024-03-10T09:00:00Z",
            "timeSpentMs": 5000,
            "sessions": [{"start": "2024-03-10T09:00:00Z", "end": "2024-03-10T09:00:05Z", "stressLevel": 6}]
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.parent_id, Some(2));
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.progress, None);
        assert_eq!(task.sessions[0].stress_level, Some(6));
        assert_eq!(task.sessions[0].duration_ms(at(12, 0, 0)), 5000);
    }
}
