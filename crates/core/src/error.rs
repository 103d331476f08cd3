//! Error types for the clipflow domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Registry misconfiguration, handler failures and dispatch failures each
//! get their own type so the orchestrator can record them at the right scope.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::content::Category;

/// Errors raised by the role registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoleError {
    #[error("Duplicate role: {0}")]
    Duplicate(String),

    #[error("Unknown role: {0}")]
    Unknown(String),

    #[error("Role {role} does not accept {category} content")]
    CategoryMismatch { role: String, category: Category },
}

/// An opaque failure reported by a role handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    pub message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Why a single dispatch of an item to a role did not produce output.
///
/// These never escape the orchestrator: each one becomes a recorded
/// failed outcome for the item that caused it.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    #[error("Role {role} timed out after {timeout_ms}ms")]
    Timeout { role: String, timeout_ms: u64 },

    #[error("Role {role} failed: {source}")]
    Handler {
        role: String,
        #[source]
        source: HandlerError,
    },

    #[error(transparent)]
    Role(#[from] RoleError),

    #[error("Role {role} panicked while handling an item")]
    Panicked { role: String },
}

impl DispatchError {
    /// The failure category recorded alongside the message.
    pub fn kind(&self) -> FailureKind {
        match self {
            DispatchError::Timeout { .. } => FailureKind::Timeout,
            DispatchError::Handler { .. } => FailureKind::Handler,
            DispatchError::Role(RoleError::CategoryMismatch { .. }) => {
                FailureKind::CategoryMismatch
            }
            DispatchError::Role(RoleError::Unknown(_)) => FailureKind::UnknownRole,
            DispatchError::Role(RoleError::Duplicate(_)) => FailureKind::Handler,
            DispatchError::Panicked { .. } => FailureKind::Panicked,
        }
    }
}

/// Serializable failure category for recorded outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Handler,
    Timeout,
    CategoryMismatch,
    UnknownRole,
    Panicked,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Handler => "handler",
            FailureKind::Timeout => "timeout",
            FailureKind::CategoryMismatch => "category_mismatch",
            FailureKind::UnknownRole => "unknown_role",
            FailureKind::Panicked => "panicked",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
