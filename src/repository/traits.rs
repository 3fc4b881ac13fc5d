//! Repository Layer - Core Traits
//!
//! Defines the abstract interfaces for data access.
//! Services depend on these traits, never on SQLite directly.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::{CheckIn, DomainResult, Entity, Task, TaskStatus};

/// Core repository trait for CRUD operations
///
/// Generic over any Entity type.
/// All operations are async to support various backends.
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    /// Create a new entity; the store assigns the ID
    async fn create(&self, entity: &T) -> DomainResult<T>;

    /// Find entity by ID
    async fn find_by_id(&self, id: T::Id) -> DomainResult<Option<T>>;

    /// List all entities
    async fn list(&self) -> DomainResult<Vec<T>>;

    /// Replace an existing entity (whole record)
    async fn update(&self, entity: &T) -> DomainResult<T>;

    /// Delete a single entity by ID
    async fn delete(&self, id: T::Id) -> DomainResult<()>;
}

/// Multi-record writes, each applied in one transaction
#[async_trait]
pub trait BulkRepository<T: Entity>: Repository<T> {
    /// Upsert keyed by ID; returns the number of records written
    async fn bulk_put(&self, entities: &[T]) -> DomainResult<usize>;

    /// Delete the given IDs; returns the number of records removed
    async fn bulk_delete(&self, ids: &[T::Id]) -> DomainResult<usize>;

    /// Remove every record
    async fn clear(&self) -> DomainResult<usize>;
}

/// Extension for repositories that support text search
#[async_trait]
pub trait SearchableRepository<T: Entity>: Repository<T> {
    /// Case-insensitive substring match on the display text
    async fn search(&self, query: &str) -> DomainResult<Vec<T>>;
}

/// Parent/child queries over tasks
#[async_trait]
pub trait TaskHierarchyOperations: Send + Sync {
    /// Direct children of a parent (None = root projects, newest first)
    async fn get_children(&self, parent_id: Option<u32>) -> DomainResult<Vec<Task>>;

    /// Tasks with the given status
    async fn find_by_status(&self, status: TaskStatus) -> DomainResult<Vec<Task>>;

    /// Point a task at a new parent without touching other fields
    async fn set_parent(&self, id: u32, parent_id: Option<u32>) -> DomainResult<()>;
}

/// Everything the engine, timer and reports need from a task store
pub trait TaskStore:
    Repository<Task> + BulkRepository<Task> + SearchableRepository<Task> + TaskHierarchyOperations
{
}

impl<T> TaskStore for T where
    T: Repository<Task> + BulkRepository<Task> + SearchableRepository<Task> + TaskHierarchyOperations
{
}

/// Date-indexed check-in queries
#[async_trait]
pub trait CheckInQueries: Send + Sync {
    async fn list_by_date(&self, date: NaiveDate) -> DomainResult<Vec<CheckIn>>;

    /// Inclusive range on the date index
    async fn list_between(&self, from: NaiveDate, to: NaiveDate) -> DomainResult<Vec<CheckIn>>;
}

pub trait CheckInStore: Repository<CheckIn> + BulkRepository<CheckIn> + CheckInQueries {}

impl<T> CheckInStore for T where T: Repository<CheckIn> + BulkRepository<CheckIn> + CheckInQueries {}
