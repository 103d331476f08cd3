//! Blueprints: declarative, ordered multi-step routing plans.
//!
//! A blueprint is written in a small line-oriented notation, one block per
//! step. Each step names the role that should process matching items and a
//! condition selecting which items match.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  parse   ┌─────────────┐  execute  ┌──────────────┐
//! │ source text  │─────────▶│  Blueprint  │──────────▶│ Orchestrator │
//! │ (.flow file) │◀─────────│  Step[]     │           │  (workflow)  │
//! └──────────────┘ serialize└─────────────┘           └──────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! let bp = clipflow_blueprint::parse(
//!     "blueprint: triage\n\nstep review:\n    when: category == sql\n    role: sql_reviewer\n",
//! )
//! .unwrap();
//! assert_eq!(bp.steps[0].target_role, "sql_reviewer");
//! ```

mod condition;
mod loader;
mod model;

pub use condition::{Atom, Field, Op, Predicate, STEP_STATES, Value, parse_condition};
pub use loader::{load_file, parse, serialize};
pub use model::{Blueprint, DEFAULT_NAME, Step};

/// Re-export for convenience.
pub type BlueprintResult<T> = std::result::Result<T, BlueprintError>;

/// Errors from loading or checking blueprints.
#[derive(Debug, thiserror::Error)]
pub enum BlueprintError {
    /// Malformed source text. `line` is 1-based.
    #[error("blueprint syntax error at line {line}: {message}")]
    Syntax { line: usize, message: String },

    /// A `Blueprint` value that breaks a structural invariant.
    #[error("invalid blueprint: {message}")]
    Invalid { message: String },

    #[error("blueprint file error: {0}")]
    Io(#[from] std::io::Error),
}

impl BlueprintError {
    /// Source line of a syntax error.
    pub fn line(&self) -> Option<usize> {
        match self {
            BlueprintError::Syntax { line, .. } => Some(*line),
            _ => None,
        }
    }
}
