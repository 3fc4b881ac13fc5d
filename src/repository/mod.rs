//! Repository Layer
//!
//! Data access abstractions and implementations.

mod checkin_repo;
mod db;
mod task;
mod traits;


pub use checkin_repo::CheckInRepository;
pub use db::{init_db, DbState, SharedConnection};
pub use task::TaskRepository;
pub use traits::{
    BulkRepository, CheckInQueries, CheckInStore, Repository, SearchableRepository, TaskHierarchyOperations,
    TaskStore,
};
