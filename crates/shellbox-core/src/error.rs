//! Unified application error types for Shellbox.
//!
//! All crates map their internal errors into [`AppError`] for consistent
//! propagation through the ? operator. Callers branch on [`ErrorKind`]
//! instead of downcasting.

use std::fmt;
use thiserror::Error;

/// Top-level error kind categorization used across the entire application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// The requested resource was not found.
    NotFound,
    /// The caller does not own the resource it is acting on.
    AccessDenied,
    /// The requested slot name is already taken system-wide.
    SlotTaken,
    /// The slot is currently bound to a running box.
    SlotInUse,
    /// The user has reached the reserved-slot quota of their plan.
    SlotLimitReached,
    /// The user has reached the concurrent-box quota of their plan.
    BoxLimitReached,
    /// Random name generation exhausted its attempts budget.
    AllocationExhausted,
    /// Dispatching, polling, or resolving a cluster job failed.
    Launch,
    /// A scheduler client call failed (transient, retryable in background).
    Scheduler,
    /// Input validation failed.
    Validation,
    /// A database error occurred.
    Database,
    /// A configuration error occurred.
    Configuration,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// An internal server error occurred.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::AccessDenied => write!(f, "ACCESS_DENIED"),
            Self::SlotTaken => write!(f, "SLOT_TAKEN"),
            Self::SlotInUse => write!(f, "SLOT_IN_USE"),
            Self::SlotLimitReached => write!(f, "SLOT_LIMIT_REACHED"),
            Self::BoxLimitReached => write!(f, "BOX_LIMIT_REACHED"),
            Self::AllocationExhausted => write!(f, "ALLOCATION_EXHAUSTED"),
            Self::Launch => write!(f, "LAUNCH"),
            Self::Scheduler => write!(f, "SCHEDULER"),
            Self::Validation => write!(f, "VALIDATION"),
            Self::Database => write!(f, "DATABASE"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// The unified application error used throughout Shellbox.
///
/// All crate-specific errors are mapped into `AppError` using `From` impls
/// or explicit `.map_err()` calls. Policy violations (`AccessDenied`,
/// `Slot*`, `BoxLimitReached`) are client-correctable and surfaced as-is;
/// `Launch` and `Scheduler` carry the cluster failure semantics described
/// in the lifecycle controller.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create an access-denied error.
    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AccessDenied, message)
    }

    /// Create a slot-taken error.
    pub fn slot_taken(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SlotTaken, message)
    }

    /// Create a slot-in-use error.
    pub fn slot_in_use(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SlotInUse, message)
    }

    /// Create a slot-limit-reached error.
    pub fn slot_limit_reached(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SlotLimitReached, message)
    }

    /// Create a box-limit-reached error.
    pub fn box_limit_reached(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BoxLimitReached, message)
    }

    /// Create an allocation-exhausted error.
    pub fn allocation_exhausted(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AllocationExhausted, message)
    }

    /// Create a launch error.
    pub fn launch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Launch, message)
    }

    /// Create a scheduler client error.
    pub fn scheduler(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Scheduler, message)
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Whether this error is a client-correctable policy violation.
    pub fn is_policy_violation(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::AccessDenied
                | ErrorKind::SlotTaken
                | ErrorKind::SlotInUse
                | ErrorKind::SlotLimitReached
                | ErrorKind::BoxLimitReached
        )
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_display() {
        assert_eq!(ErrorKind::SlotTaken.to_string(), "SLOT_TAKEN");
        assert_eq!(ErrorKind::BoxLimitReached.to_string(), "BOX_LIMIT_REACHED");
        assert_eq!(ErrorKind::Launch.to_string(), "LAUNCH");
    }

    #[test]
    fn test_policy_violation_classification() {
        assert!(AppError::slot_in_use("bound").is_policy_violation());
        assert!(AppError::access_denied("not yours").is_policy_violation());
        assert!(!AppError::launch("Failed to create box").is_policy_violation());
        assert!(!AppError::database("down").is_policy_violation());
    }

    #[test]
    fn test_error_display_includes_kind_and_message() {
        let err = AppError::slot_taken("Requested slot is already reserved");
        assert_eq!(
            err.to_string(),
            "SLOT_TAKEN: Requested slot is already reserved"
        );
    }
}
