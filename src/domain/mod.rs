//! Domain Layer
//!
//! Contains all domain entities and core abstractions.
//! This layer has NO I/O (only serde and chrono for data representation).

mod checkin;
mod entity;
mod task;

pub use checkin::{CheckIn, Mood};
pub use entity::{DomainError, DomainResult, Entity};
pub use task::{
    average_progress, validate_stress_level, ResourceKind, SessionRecord, Task, TaskLink, TaskPatch,
    TaskResource, TaskStatus, MAX_PROGRESS, MAX_STRESS_LEVEL,
};
