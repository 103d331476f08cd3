//! The orchestrator: drives a blueprint over a set of content items.
//!
//! Steps run strictly in blueprint order. Within a step every matched item
//! is dispatched as its own task, bounded by a semaphore and a per-dispatch
//! timeout; all outcomes are collected before the step's result is recorded.
//! Failures are converted into recorded outcomes at the smallest scope
//! (item, then step) and never abort the run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use clipflow_blueprint::{Blueprint, BlueprintError, Step};
use clipflow_config::OrchestratorConfig;
use clipflow_core::{
    ContentItem, DispatchError, MismatchPolicy, Params, RawEntry, Role, RoleOutput,
    RoleRegistry,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::context::ExecutionContext;
use crate::result::{
    ExecutionResult, IllegalTransition, ItemOutcome, OverallStatus, StepResult, StepStatus,
};
use crate::router;

/// How many failure messages are folded into a step's error summary.
const ERROR_SUMMARY_LIMIT: usize = 3;

/// Tunables for an [`Orchestrator`].
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Upper bound on a single handler call.
    pub dispatch_timeout: Duration,
    /// Concurrent dispatches allowed within one step.
    pub max_concurrent_dispatches: usize,
    /// What to record when a matched item's category is not accepted.
    pub on_category_mismatch: MismatchPolicy,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self::from_config(&OrchestratorConfig::default())
    }
}

impl OrchestratorOptions {
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self {
            dispatch_timeout: Duration::from_millis(config.dispatch_timeout_ms),
            max_concurrent_dispatches: config.max_concurrent_dispatches,
            on_category_mismatch: config.on_category_mismatch,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch_timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, max: usize) -> Self {
        self.max_concurrent_dispatches = max;
        self
    }

    pub fn with_mismatch_policy(mut self, policy: MismatchPolicy) -> Self {
        self.on_category_mismatch = policy;
        self
    }
}

/// The only ways `execute` itself can fail: contract violations by the caller.
#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    #[error("malformed blueprint: {0}")]
    MalformedBlueprint(#[source] BlueprintError),

    #[error("step '{step}': {source}")]
    IllegalTransition {
        step: String,
        #[source]
        source: IllegalTransition,
    },
}

/// Executes blueprints against a shared, read-only role registry.
///
/// Cheap to clone; clones share the registry and may run concurrently.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    registry: Arc<RoleRegistry>,
    options: OrchestratorOptions,
}

impl Orchestrator {
    pub fn new(registry: Arc<RoleRegistry>) -> Self {
        Self {
            registry,
            options: OrchestratorOptions::default(),
        }
    }

    pub fn with_options(mut self, options: OrchestratorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn registry(&self) -> &RoleRegistry {
        &self.registry
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    /// Run `blueprint` over already-classified items.
    pub async fn execute(
        &self,
        blueprint: &Blueprint,
        items: Vec<ContentItem>,
    ) -> Result<ExecutionResult, ExecuteError> {
        self.execute_with_cancel(blueprint, items, &CancellationToken::new())
            .await
    }

    /// Classify raw entries, then run `blueprint` over them.
    pub async fn execute_entries(
        &self,
        blueprint: &Blueprint,
        entries: &[RawEntry],
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult, ExecuteError> {
        let items = clipflow_classifier::classify_all(entries);
        self.execute_with_cancel(blueprint, items, cancel).await
    }

    /// Run `blueprint`, checking `cancel` before each step.
    ///
    /// On cancellation the steps completed so far are returned and the overall
    /// status is forced to `partial`. A step already in flight finishes first.
    #[instrument(
        skip_all,
        fields(blueprint = %blueprint.name, items = items.len())
    )]
    pub async fn execute_with_cancel(
        &self,
        blueprint: &Blueprint,
        items: Vec<ContentItem>,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult, ExecuteError> {
        blueprint
            .validate()
            .map_err(ExecuteError::MalformedBlueprint)?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, steps = blueprint.steps.len(), "Starting execution");

        let mut ctx = ExecutionContext::new(items);
        let mut cancelled = false;

        for step in &blueprint.steps {
            if cancel.is_cancelled() {
                warn!(
                    %run_id,
                    completed = ctx.completed_steps(),
                    remaining = blueprint.steps.len() - ctx.completed_steps(),
                    "Execution cancelled"
                );
                cancelled = true;
                break;
            }
            let result = self.run_step(step, &ctx).await?;
            ctx.record(result);
        }

        let steps = ctx.into_results();
        let overall_status = OverallStatus::from_steps(&steps, cancelled);
        info!(%run_id, status = %overall_status, steps = steps.len(), "Execution finished");

        Ok(ExecutionResult {
            run_id,
            blueprint: blueprint.name.clone(),
            steps,
            overall_status,
            cancelled,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn run_step(
        &self,
        step: &Step,
        ctx: &ExecutionContext,
    ) -> Result<StepResult, ExecuteError> {
        let started = Instant::now();
        let advance = |from: StepStatus, to: StepStatus| {
            from.advance(to)
                .map_err(|source| ExecuteError::IllegalTransition {
                    step: step.name.clone(),
                    source,
                })
        };
        let record = |status: StepStatus, outputs: Vec<ItemOutcome>, error: Option<String>, matched: usize| {
            let result = StepResult {
                step_index: step.index,
                step_name: step.name.clone(),
                target_role: step.target_role.clone(),
                status,
                outputs,
                error,
                matched,
                duration_ms: started.elapsed().as_millis() as u64,
            };
            info!(
                step = %result.step_name,
                role = %result.target_role,
                status = %result.status,
                matched = result.matched,
                duration_ms = result.duration_ms,
                "Step finished"
            );
            result
        };

        let status = StepStatus::Pending;
        let matched: Vec<usize> = ctx
            .items()
            .iter()
            .enumerate()
            .filter(|(_, item)| router::matches_with(&step.condition, item, ctx))
            .map(|(idx, _)| idx)
            .collect();

        if matched.is_empty() {
            let status = advance(status, StepStatus::Skipped)?;
            return Ok(record(status, Vec::new(), None, 0));
        }
        let status = advance(status, StepStatus::Matched)?;
        debug!(step = %step.name, matched = matched.len(), "Step matched");

        let role = match self.registry.resolve(&step.target_role) {
            Ok(role) => role,
            Err(err) => {
                warn!(step = %step.name, error = %err, "Step role could not be resolved");
                let err = DispatchError::from(err);
                let outputs = matched
                    .iter()
                    .map(|&idx| ItemOutcome::Failed {
                        item_id: ctx.items()[idx].id.clone(),
                        kind: err.kind(),
                        message: err.to_string(),
                    })
                    .collect();
                let status = advance(status, StepStatus::Failed)?;
                return Ok(record(status, outputs, Some(err.to_string()), matched.len()));
            }
        };

        let outputs = self.dispatch_all(step, &role, ctx, &matched).await;

        let failures: Vec<&ItemOutcome> = outputs.iter().filter(|o| o.is_failed()).collect();
        let all_skipped = outputs
            .iter()
            .all(|o| matches!(o, ItemOutcome::Skipped { .. }));

        let (next, error) = if !failures.is_empty() {
            (StepStatus::Failed, Some(summarize_failures(&failures, outputs.len())))
        } else if all_skipped {
            (StepStatus::Skipped, None)
        } else {
            (StepStatus::Succeeded, None)
        };
        let status = advance(status, next)?;
        Ok(record(status, outputs, error, matched.len()))
    }

    /// Dispatch every matched item and return one outcome per item, in
    /// context order.
    async fn dispatch_all(
        &self,
        step: &Step,
        role: &Arc<Role>,
        ctx: &ExecutionContext,
        matched: &[usize],
    ) -> Vec<ItemOutcome> {
        let items = ctx.shared_items();
        let params = Arc::new(step.parameters.clone());
        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrent_dispatches.max(1)));
        let timeout = self.options.dispatch_timeout;

        let mut outcomes: Vec<Option<ItemOutcome>> = vec![None; matched.len()];
        let mut slots: HashMap<tokio::task::Id, usize> = HashMap::new();
        let mut tasks = JoinSet::new();

        for (slot, &idx) in matched.iter().enumerate() {
            let item = &items[idx];
            if let Err(err) = role.check(item) {
                outcomes[slot] = Some(match self.options.on_category_mismatch {
                    MismatchPolicy::Skip => {
                        debug!(step = %step.name, item = %item.id, reason = %err, "Skipping item");
                        ItemOutcome::Skipped {
                            item_id: item.id.clone(),
                            reason: err.to_string(),
                        }
                    }
                    MismatchPolicy::Fail => {
                        warn!(step = %step.name, item = %item.id, error = %err, "Category mismatch");
                        failed(&item.id, &DispatchError::from(err))
                    }
                });
                continue;
            }

            let role = Arc::clone(role);
            let items = Arc::clone(&items);
            let params = Arc::clone(&params);
            let semaphore = Arc::clone(&semaphore);
            let handle = tasks.spawn(async move {
                // The semaphore is never closed, so acquisition cannot fail.
                let _permit = semaphore.acquire_owned().await.ok();
                debug!(role = %role.name(), item = %items[idx].id, "Dispatching");
                dispatch_one(role, items, idx, params, timeout).await
            });
            slots.insert(handle.id(), slot);
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            let (id, outcome) = match joined {
                Ok((id, result)) => (id, result),
                Err(join_err) => (
                    join_err.id(),
                    Err(DispatchError::Panicked {
                        role: role.name().to_string(),
                    }),
                ),
            };
            let Some(&slot) = slots.get(&id) else {
                continue;
            };
            let item_id = &items[matched[slot]].id;
            outcomes[slot] = Some(match outcome {
                Ok(output) => succeeded(item_id, output),
                Err(err) => {
                    warn!(step = %step.name, item = %item_id, kind = ?err.kind(), error = %err, "Dispatch failed");
                    failed(item_id, &err)
                }
            });
        }

        outcomes.into_iter().flatten().collect()
    }
}

/// Run one handler in a task of its own and wait for it at most `timeout`.
///
/// The deadline is enforced from outside the handler's task, so a handler
/// that blocks its worker thread still times out on a multi-thread runtime.
/// On expiry the handler task is aborted.
async fn dispatch_one(
    role: Arc<Role>,
    items: Arc<[ContentItem]>,
    idx: usize,
    params: Arc<Params>,
    timeout: Duration,
) -> Result<RoleOutput, DispatchError> {
    let name = role.name().to_string();
    let mut handler = tokio::spawn(async move { role.invoke(&items[idx], &params).await });

    match tokio::time::timeout(timeout, &mut handler).await {
        Ok(Ok(result)) => result,
        Ok(Err(_join_err)) => Err(DispatchError::Panicked { role: name }),
        Err(_) => {
            handler.abort();
            Err(DispatchError::Timeout {
                role: name,
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    }
}

fn succeeded(item_id: &str, output: RoleOutput) -> ItemOutcome {
    ItemOutcome::Succeeded {
        item_id: item_id.to_string(),
        output,
    }
}

fn failed(item_id: &str, err: &DispatchError) -> ItemOutcome {
    ItemOutcome::Failed {
        item_id: item_id.to_string(),
        kind: err.kind(),
        message: err.to_string(),
    }
}

fn summarize_failures(failures: &[&ItemOutcome], total: usize) -> String {
    let mut messages: Vec<String> = failures
        .iter()
        .take(ERROR_SUMMARY_LIMIT)
        .filter_map(|o| match o {
            ItemOutcome::Failed {
                item_id, message, ..
            } => Some(format!("{item_id}: {message}")),
            _ => None,
        })
        .collect();
    if failures.len() > ERROR_SUMMARY_LIMIT {
        messages.push(format!("and {} more", failures.len() - ERROR_SUMMARY_LIMIT));
    }
    format!(
        "{} of {total} dispatches failed ({})",
        failures.len(),
        messages.join("; ")
    )
}
