//! Domain Layer - Core Entity Trait
//!
//! Every persisted record has a store-assigned identifier.

use serde::{Deserialize, Serialize};

/// Core trait for all persisted records
pub trait Entity: Sized + Send + Sync + Clone {
    /// The type of the record's unique identifier
    type Id: Copy + Eq + std::hash::Hash + Send + Sync + std::fmt::Debug;

    /// Returns the record's unique identifier
    fn id(&self) -> Self::Id;
}

/// Common result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level errors
///
/// - `NotFound`: an operation referenced a record that does not exist
/// - `InvalidInput`: a value is out of range or could not be parsed
/// - `Conflict`: the operation would break a structural rule (e.g. a cycle)
/// - `Internal`: the store failed or is unavailable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomainError {
    NotFound(String),
    InvalidInput(String),
    Conflict(String),
    Internal(String),
}

impl DomainError {
    pub fn task_not_found(id: u32) -> Self {
        DomainError::NotFound(format!("Task {} not found", id))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DomainError::NotFound(_))
    }
}

impl std::fmt::Display for DomainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DomainError::NotFound(msg) => write!(f, "Not found: {}", msg),
            DomainError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            DomainError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            DomainError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for DomainError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(DomainError::task_not_found(7).to_string(), "Not found: Task 7 not found");
        assert_eq!(
            DomainError::Conflict("cycle".into()).to_string(),
            "Conflict: cycle"
        );
    }

    #[test]
    fn test_is_not_found() {
        assert!(DomainError::task_not_found(1).is_not_found());
        assert!(!DomainError::Internal("db".into()).is_not_found());
    }
}
