//! Blueprint execution for clipflow.
//!
//! The [`router`] decides which content items a step selects; the
//! [`Orchestrator`] runs a blueprint's steps in order, fans each step out to
//! its role with bounded concurrency, and folds every dispatch into an
//! [`ExecutionResult`].

pub mod context;
pub mod executor;
pub mod result;
pub mod router;

pub use context::ExecutionContext;
pub use executor::{ExecuteError, Orchestrator, OrchestratorOptions};
pub use result::{
    ExecutionResult, IllegalTransition, ItemOutcome, OverallStatus, StepResult, StepStatus,
};
pub use router::{StepLookup, Truth, evaluate, matches, matches_with};
