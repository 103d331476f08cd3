//! `clipflow run`: execute a blueprint over clipboard entries.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clipflow_config::AppConfig;
use clipflow_core::{MismatchPolicy, RoleOutput};
use clipflow_workflow::{
    ExecutionResult, ItemOutcome, Orchestrator, OrchestratorOptions, OverallStatus,
};
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(clap::Args)]
pub struct RunArgs {
    /// Blueprint source file
    pub blueprint: PathBuf,

    /// JSON file of entries (`-` for stdin)
    #[arg(short, long)]
    pub entries: PathBuf,

    /// Per-dispatch timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Concurrent dispatches within a step
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// What to do with matched items a role does not accept (skip or fail)
    #[arg(long)]
    pub on_mismatch: Option<MismatchPolicy>,

    /// Print the full result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Exit code 0 when every step succeeded or was skipped, 2 for a partial
/// run, 1 when every step failed.
pub async fn run(config: &AppConfig, args: RunArgs) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let blueprint = clipflow_blueprint::load_file(&args.blueprint)?;
    let entries = super::read_entries(&args.entries)?;
    let options = resolve_options(config, &args)?;

    let orchestrator =
        Orchestrator::new(Arc::new(clipflow_roles::default_registry())).with_options(options);

    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping after the current step");
                cancel.cancel();
            }
        })
    };
    let result = orchestrator
        .execute_entries(&blueprint, &entries, &cancel)
        .await;
    watcher.abort();
    let result = result?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", render_report(&result));
    }

    Ok(match result.overall_status {
        OverallStatus::Succeeded => ExitCode::SUCCESS,
        OverallStatus::Partial => ExitCode::from(2),
        OverallStatus::Failed => ExitCode::FAILURE,
    })
}

fn resolve_options(config: &AppConfig, args: &RunArgs) -> Result<OrchestratorOptions, String> {
    let mut options = OrchestratorOptions::from_config(&config.orchestrator);
    if let Some(ms) = args.timeout_ms {
        if ms == 0 {
            return Err("--timeout-ms must be greater than 0".into());
        }
        options = options.with_timeout(Duration::from_millis(ms));
    }
    if let Some(n) = args.concurrency {
        if n == 0 {
            return Err("--concurrency must be at least 1".into());
        }
        options = options.with_concurrency(n);
    }
    if let Some(policy) = args.on_mismatch {
        options = options.with_mismatch_policy(policy);
    }
    Ok(options)
}

/// Human-readable run report.
pub fn render_report(result: &ExecutionResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Blueprint: {} (run {})", result.blueprint, result.run_id);
    for step in &result.steps {
        let _ = writeln!(
            out,
            "  [{}] {:<20} {:<16} {:<9} matched={} {}ms",
            step.step_index,
            step.step_name,
            step.target_role,
            step.status,
            step.matched,
            step.duration_ms
        );
        if let Some(error) = &step.error {
            let _ = writeln!(out, "      error: {error}");
        }
        for outcome in &step.outputs {
            let line = match outcome {
                ItemOutcome::Succeeded { item_id, output } => {
                    format!("ok    {item_id}: {}", preview(output))
                }
                ItemOutcome::Failed {
                    item_id,
                    kind,
                    message,
                } => format!("FAIL  {item_id} [{kind}]: {message}"),
                ItemOutcome::Skipped { item_id, reason } => format!("skip  {item_id}: {reason}"),
            };
            let _ = writeln!(out, "      {line}");
        }
    }
    let _ = writeln!(
        out,
        "Overall: {}{}",
        result.overall_status,
        if result.cancelled { " (cancelled)" } else { "" }
    );
    out
}

const PREVIEW_CHARS: usize = 100;

fn preview(output: &RoleOutput) -> String {
    let text = match output {
        RoleOutput::Text(text) => text.clone(),
        RoleOutput::Structured(map) => serde_json::Value::Object(map.clone()).to_string(),
    };
    if text.chars().count() > PREVIEW_CHARS {
        let cut: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}...")
    } else {
        text
    }
}
