//! Task Repository Module
//!
//! Task storage split into specialized sub-modules:
//! - task_repo: Core CRUD, bulk and search operations
//! - task_hierarchy: Parent/child queries and re-parenting

mod task_hierarchy;
mod task_repo;

pub use task_repo::TaskRepository;
