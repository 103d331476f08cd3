//! Recorded outcomes of an execution.

use chrono::{DateTime, Utc};
use clipflow_core::{FailureKind, RoleOutput};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a single step.
///
/// ```text
/// pending ──▶ skipped
///    │
///    └──────▶ matched ──▶ succeeded
///                 │
///                 ├─────▶ failed
///                 └─────▶ skipped   (every matched item was a category mismatch)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Matched,
    Skipped,
    Succeeded,
    Failed,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Matched => "matched",
            StepStatus::Skipped => "skipped",
            StepStatus::Succeeded => "succeeded",
            StepStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Skipped | StepStatus::Succeeded | StepStatus::Failed
        )
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow.
    pub fn advance(self, next: StepStatus) -> Result<StepStatus, IllegalTransition> {
        use StepStatus::*;
        match (self, next) {
            (Pending, Skipped | Matched) | (Matched, Succeeded | Failed | Skipped) => Ok(next),
            (from, to) => Err(IllegalTransition { from, to }),
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal step transition {from} -> {to}")]
pub struct IllegalTransition {
    pub from: StepStatus,
    pub to: StepStatus,
}

/// What happened to one matched item within a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemOutcome {
    Succeeded {
        item_id: String,
        output: RoleOutput,
    },
    Failed {
        item_id: String,
        kind: FailureKind,
        message: String,
    },
    Skipped {
        item_id: String,
        reason: String,
    },
}

impl ItemOutcome {
    pub fn item_id(&self) -> &str {
        match self {
            ItemOutcome::Succeeded { item_id, .. }
            | ItemOutcome::Failed { item_id, .. }
            | ItemOutcome::Skipped { item_id, .. } => item_id,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ItemOutcome::Failed { .. })
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self, ItemOutcome::Succeeded { .. })
    }
}

/// Aggregated outcome of one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_index: usize,
    pub step_name: String,
    pub target_role: String,
    pub status: StepStatus,
    /// One entry per matched item, in context order.
    #[serde(default)]
    pub outputs: Vec<ItemOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Number of context items the step's condition matched.
    pub matched: usize,
    pub duration_ms: u64,
}

impl StepResult {
    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outputs.iter().filter(|o| o.is_failed())
    }

    pub fn successes(&self) -> impl Iterator<Item = &RoleOutput> {
        self.outputs.iter().filter_map(|o| match o {
            ItemOutcome::Succeeded { output, .. } => Some(output),
            _ => None,
        })
    }
}

/// Graded status of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Succeeded,
    Partial,
    Failed,
}

impl OverallStatus {
    /// `failed` only if every step failed, `partial` if some did, else
    /// `succeeded`. Cancellation always yields `partial`.
    pub fn from_steps(steps: &[StepResult], cancelled: bool) -> Self {
        if cancelled {
            return OverallStatus::Partial;
        }
        let failed = steps
            .iter()
            .filter(|s| s.status == StepStatus::Failed)
            .count();
        match failed {
            0 => OverallStatus::Succeeded,
            n if n == steps.len() => OverallStatus::Failed,
            _ => OverallStatus::Partial,
        }
    }
}

impl std::fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            OverallStatus::Succeeded => "succeeded",
            OverallStatus::Partial => "partial",
            OverallStatus::Failed => "failed",
        })
    }
}

/// Everything one `execute` call produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub run_id: Uuid,
    pub blueprint: String,
    /// Results of the steps that ran, in blueprint order.
    pub steps: Vec<StepResult>,
    pub overall_status: OverallStatus,
    #[serde(default)]
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ExecutionResult {
    pub fn step(&self, name: &str) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.step_name == name)
    }

    /// Total number of recorded item outcomes across all steps.
    pub fn dispatch_count(&self) -> usize {
        self.steps.iter().map(|s| s.outputs.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(status: StepStatus) -> StepResult {
        StepResult {
            step_index: 0,
            step_name: "s".into(),
            target_role: "r".into(),
            status,
            outputs: vec![],
            error: None,
            matched: 0,
            duration_ms: 0,
        }
    }

    #[test]
    fn legal_transitions() {
        use StepStatus::*;
        assert_eq!(Pending.advance(Matched), Ok(Matched));
        assert_eq!(Pending.advance(Skipped), Ok(Skipped));
        assert_eq!(Matched.advance(Succeeded), Ok(Succeeded));
        assert_eq!(Matched.advance(Failed), Ok(Failed));
        assert!(Succeeded.advance(Failed).is_err());
        assert!(Skipped.advance(Matched).is_err());
        assert!(Pending.advance(Succeeded).is_err());
        assert!(Pending.advance(Failed).is_err());
        assert!(Failed.is_terminal() && !Matched.is_terminal());
    }

    #[test]
    fn overall_status_policy() {
        use StepStatus::*;
        assert_eq!(OverallStatus::from_steps(&[], false), OverallStatus::Succeeded);
        assert_eq!(
            OverallStatus::from_steps(&[step(Skipped), step(Skipped)], false),
            OverallStatus::Succeeded
        );
        assert_eq!(
            OverallStatus::from_steps(&[step(Failed), step(Succeeded)], false),
            OverallStatus::Partial
        );
        assert_eq!(
            OverallStatus::from_steps(&[step(Failed), step(Failed)], false),
            OverallStatus::Failed
        );
        assert_eq!(
            OverallStatus::from_steps(&[step(Succeeded)], true),
            OverallStatus::Partial
        );
    }

    #[test]
    fn item_outcome_serializes_tagged() {
        let outcome = ItemOutcome::Failed {
            item_id: "i1".into(),
            kind: FailureKind::Timeout,
            message: "slow".into(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["kind"], "timeout");
        assert_eq!(outcome.item_id(), "i1");
    }
}
