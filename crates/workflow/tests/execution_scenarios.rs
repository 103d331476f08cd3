//! End-to-end execution scenarios: blueprint source in, ExecutionResult out.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use clipflow_blueprint::parse;
use clipflow_core::{
    Category, ContentItem, FailureKind, HandlerError, MismatchPolicy, Params, RawEntry,
    RoleOutput, RoleRegistry, handler_fn,
};
use clipflow_workflow::{
    ItemOutcome, Orchestrator, OrchestratorOptions, OverallStatus, StepStatus,
};
use tokio_util::sync::CancellationToken;

const SQL_THEN_CODE: &str = r#"
blueprint: sql-then-code

step review:
    when: category == sql
    role: sql_role

step analyze:
    when: category == code
    role: code_role
"#;

fn echo_registry() -> RoleRegistry {
    let mut registry = RoleRegistry::new();
    registry
        .register(
            "sql_role",
            [Category::Sql],
            handler_fn(|item: ContentItem, _params: Params| async move {
                Ok::<_, HandlerError>(RoleOutput::Text(format!("sql:{}", item.id)))
            }),
        )
        .unwrap();
    registry
        .register(
            "code_role",
            [Category::Code],
            handler_fn(|item: ContentItem, _params: Params| async move {
                Ok::<_, HandlerError>(RoleOutput::Text(format!("code:{}", item.id)))
            }),
        )
        .unwrap();
    registry
}

fn orchestrator(registry: RoleRegistry) -> Orchestrator {
    Orchestrator::new(Arc::new(registry))
}

fn sql_item() -> ContentItem {
    ContentItem::new("sql-1", "SELECT * FROM users", Category::Sql)
}

fn code_item() -> ContentItem {
    ContentItem::new("code-1", "def main():\n    pass", Category::Code)
}

fn text_item(id: &str) -> ContentItem {
    ContentItem::new(id, "remember to buy milk", Category::Text)
}

#[tokio::test]
async fn each_step_routes_only_its_category() {
    let bp = parse(SQL_THEN_CODE).unwrap();
    let result = orchestrator(echo_registry())
        .execute(&bp, vec![sql_item(), code_item()])
        .await
        .unwrap();

    assert_eq!(result.blueprint, "sql-then-code");
    assert_eq!(result.overall_status, OverallStatus::Succeeded);
    assert_eq!(result.steps.len(), 2);

    let review = result.step("review").unwrap();
    assert_eq!(review.status, StepStatus::Succeeded);
    assert_eq!(review.matched, 1);
    assert_eq!(review.outputs[0].item_id(), "sql-1");

    let analyze = result.step("analyze").unwrap();
    assert_eq!(analyze.status, StepStatus::Succeeded);
    assert_eq!(
        analyze.successes().collect::<Vec<_>>(),
        vec![&RoleOutput::Text("code:code-1".into())]
    );
    assert_eq!(result.dispatch_count(), 2);
}

#[tokio::test]
async fn no_applicable_steps_is_vacuous_success() {
    let bp = parse(SQL_THEN_CODE).unwrap();
    let result = orchestrator(echo_registry())
        .execute(&bp, vec![text_item("t-1")])
        .await
        .unwrap();

    assert!(result.steps.iter().all(|s| s.status == StepStatus::Skipped));
    assert!(result.steps.iter().all(|s| s.outputs.is_empty()));
    assert_eq!(result.overall_status, OverallStatus::Succeeded);
}

#[tokio::test]
async fn unregistered_role_fails_its_step() {
    let bp = parse(
        "step only:\n    when: category == text\n    role: ghost_writer\n",
    )
    .unwrap();
    let result = orchestrator(echo_registry())
        .execute(&bp, vec![text_item("t-1")])
        .await
        .unwrap();

    let step = &result.steps[0];
    assert_eq!(step.status, StepStatus::Failed);
    assert!(step.error.as_deref().unwrap().contains("ghost_writer"));
    assert!(matches!(
        &step.outputs[0],
        ItemOutcome::Failed { kind: FailureKind::UnknownRole, .. }
    ));
    assert_eq!(result.overall_status, OverallStatus::Failed);
}

#[tokio::test]
async fn failing_step_does_not_stop_independent_step() {
    let mut registry = echo_registry();
    registry
        .register(
            "broken",
            [Category::Sql],
            handler_fn(|_item: ContentItem, _params: Params| async move {
                Err::<RoleOutput, _>(HandlerError::new("upstream refused connection"))
            }),
        )
        .unwrap();
    let bp = parse(
        "step first:\n    when: category == sql\n    role: broken\n\n\
         step second:\n    when: category == code\n    role: code_role\n",
    )
    .unwrap();

    let result = orchestrator(registry)
        .execute(&bp, vec![sql_item(), code_item()])
        .await
        .unwrap();

    assert_eq!(result.steps[0].status, StepStatus::Failed);
    assert!(
        result.steps[0]
            .error
            .as_deref()
            .unwrap()
            .contains("upstream refused connection")
    );
    assert_eq!(result.steps[1].status, StepStatus::Succeeded);
    assert_eq!(result.overall_status, OverallStatus::Partial);
}

#[tokio::test]
async fn slow_handlers_time_out_without_hanging() {
    let mut registry = RoleRegistry::new();
    registry
        .register(
            "sleepy",
            [Category::Text],
            handler_fn(|_item: ContentItem, _params: Params| async move {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok::<_, HandlerError>(RoleOutput::Text("too late".into()))
            }),
        )
        .unwrap();
    let bp = parse("step nap:\n    role: sleepy\n").unwrap();
    let items: Vec<ContentItem> = (0..8).map(|i| text_item(&format!("t-{i}"))).collect();

    let orchestrator = orchestrator(registry).with_options(
        OrchestratorOptions::default()
            .with_timeout(Duration::from_millis(50))
            .with_concurrency(4),
    );
    let started = Instant::now();
    let result = orchestrator.execute(&bp, items).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    let step = &result.steps[0];
    assert_eq!(step.status, StepStatus::Failed);
    assert_eq!(step.outputs.len(), 8);
    assert!(step.outputs.iter().all(|o| matches!(
        o,
        ItemOutcome::Failed { kind: FailureKind::Timeout, .. }
    )));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn thread_blocking_handler_still_times_out() {
    let mut registry = RoleRegistry::new();
    registry
        .register(
            "blocking",
            [Category::Text],
            handler_fn(|item: ContentItem, _params: Params| async move {
                if item.id == "t-stuck" {
                    std::thread::sleep(Duration::from_millis(1500));
                }
                Ok::<_, HandlerError>(RoleOutput::Text("late".into()))
            }),
        )
        .unwrap();
    let bp = parse("step sync_io:\n    role: blocking\n").unwrap();

    let orchestrator = orchestrator(registry).with_options(
        OrchestratorOptions::default()
            .with_timeout(Duration::from_millis(50))
            .with_concurrency(2),
    );
    let started = Instant::now();
    let result = orchestrator
        .execute(&bp, vec![text_item("t-stuck"), text_item("t-quick")])
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_millis(1000));
    let step = &result.steps[0];
    assert_eq!(step.status, StepStatus::Failed);
    assert!(matches!(
        &step.outputs[0],
        ItemOutcome::Failed { item_id, kind: FailureKind::Timeout, .. } if item_id == "t-stuck"
    ));
    assert!(step.outputs[1].is_succeeded());
}

#[tokio::test]
async fn concurrency_is_bounded() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let mut registry = RoleRegistry::new();
    {
        let in_flight = Arc::clone(&in_flight);
        let peak = Arc::clone(&peak);
        registry
            .register(
                "counter",
                [Category::Text],
                handler_fn(move |_item: ContentItem, _params: Params| {
                    let in_flight = Arc::clone(&in_flight);
                    let peak = Arc::clone(&peak);
                    async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        Ok::<_, HandlerError>(RoleOutput::Text("ok".into()))
                    }
                }),
            )
            .unwrap();
    }
    let bp = parse("step count:\n    role: counter\n").unwrap();
    let items: Vec<ContentItem> = (0..10).map(|i| text_item(&format!("t-{i}"))).collect();

    let result = orchestrator(registry)
        .with_options(OrchestratorOptions::default().with_concurrency(2))
        .execute(&bp, items)
        .await
        .unwrap();

    assert_eq!(result.steps[0].status, StepStatus::Succeeded);
    assert_eq!(result.steps[0].outputs.len(), 10);
    assert!(peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn panicking_handler_is_recorded() {
    let mut registry = echo_registry();
    registry
        .register(
            "explodes",
            [Category::Text],
            handler_fn(|item: ContentItem, _params: Params| async move {
                if item.id == "t-bad" {
                    panic!("handler bug");
                }
                Ok::<_, HandlerError>(RoleOutput::Text("fine".into()))
            }),
        )
        .unwrap();
    let bp = parse("step risky:\n    role: explodes\n").unwrap();

    let result = orchestrator(registry)
        .execute(&bp, vec![text_item("t-ok"), text_item("t-bad")])
        .await
        .unwrap();

    let step = &result.steps[0];
    assert_eq!(step.status, StepStatus::Failed);
    assert!(step.outputs[0].is_succeeded());
    assert!(matches!(
        &step.outputs[1],
        ItemOutcome::Failed { item_id, kind: FailureKind::Panicked, .. } if item_id == "t-bad"
    ));
}

#[tokio::test]
async fn cancellation_between_steps_returns_partial() {
    let token = CancellationToken::new();
    let mut registry = RoleRegistry::new();
    {
        let token = token.clone();
        registry
            .register(
                "stopper",
                [Category::Text],
                handler_fn(move |_item: ContentItem, _params: Params| {
                    let token = token.clone();
                    async move {
                        token.cancel();
                        Ok::<_, HandlerError>(RoleOutput::Text("stopping".into()))
                    }
                }),
            )
            .unwrap();
    }
    let bp = parse(
        "step first:\n    role: stopper\n\nstep second:\n    role: stopper\n",
    )
    .unwrap();

    let result = orchestrator(registry)
        .execute_with_cancel(&bp, vec![text_item("t-1")], &token)
        .await
        .unwrap();

    assert!(result.cancelled);
    assert_eq!(result.steps.len(), 1);
    assert_eq!(result.steps[0].status, StepStatus::Succeeded);
    assert_eq!(result.overall_status, OverallStatus::Partial);
}

#[tokio::test]
async fn later_step_can_react_to_earlier_failure() {
    let mut registry = echo_registry();
    registry
        .register(
            "broken",
            [Category::Sql],
            handler_fn(|_item: ContentItem, _params: Params| async move {
                Err::<RoleOutput, _>(HandlerError::new("nope"))
            }),
        )
        .unwrap();
    registry
        .register(
            "fallback",
            [Category::Sql],
            handler_fn(|item: ContentItem, _params: Params| async move {
                Ok::<_, HandlerError>(RoleOutput::Text(format!("fallback:{}", item.id)))
            }),
        )
        .unwrap();
    let bp = parse(
        "step primary:\n    when: category == sql\n    role: broken\n\n\
         step recover:\n    when: category == sql AND step.primary == failed\n    role: fallback\n\n\
         step celebrate:\n    when: step.primary == succeeded\n    role: sql_role\n",
    )
    .unwrap();

    let result = orchestrator(registry)
        .execute(&bp, vec![sql_item()])
        .await
        .unwrap();

    assert_eq!(result.step("primary").unwrap().status, StepStatus::Failed);
    assert_eq!(result.step("recover").unwrap().status, StepStatus::Succeeded);
    assert_eq!(result.step("celebrate").unwrap().status, StepStatus::Skipped);
    assert_eq!(result.overall_status, OverallStatus::Partial);
}

#[tokio::test]
async fn parameters_reach_the_handler() {
    let mut registry = RoleRegistry::new();
    registry
        .register(
            "prefixer",
            [Category::Text],
            handler_fn(|item: ContentItem, params: Params| async move {
                let prefix = params
                    .get("prefix")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| HandlerError::new("prefix param required"))?
                    .to_string();
                Ok::<_, HandlerError>(RoleOutput::Text(format!("{prefix}{}", item.text)))
            }),
        )
        .unwrap();
    let bp = parse("step tag:\n    role: prefixer\n    param.prefix: \">> \"\n").unwrap();

    let result = orchestrator(registry)
        .execute(&bp, vec![text_item("t-1")])
        .await
        .unwrap();
    assert_eq!(
        result.steps[0].successes().next(),
        Some(&RoleOutput::Text(">> remember to buy milk".into()))
    );
}

#[tokio::test]
async fn mismatch_policy_is_configurable() {
    let bp = parse("step all:\n    role: sql_role\n").unwrap();
    let items = vec![sql_item(), text_item("t-1")];

    let skip = orchestrator(echo_registry())
        .execute(&bp, items.clone())
        .await
        .unwrap();
    assert_eq!(skip.steps[0].status, StepStatus::Succeeded);
    assert!(matches!(&skip.steps[0].outputs[1], ItemOutcome::Skipped { .. }));

    let fail = orchestrator(echo_registry())
        .with_options(OrchestratorOptions::default().with_mismatch_policy(MismatchPolicy::Fail))
        .execute(&bp, items)
        .await
        .unwrap();
    assert_eq!(fail.steps[0].status, StepStatus::Failed);
    assert!(matches!(
        &fail.steps[0].outputs[1],
        ItemOutcome::Failed { kind: FailureKind::CategoryMismatch, .. }
    ));
}

#[tokio::test]
async fn raw_entries_are_classified_before_routing() {
    let bp = parse(SQL_THEN_CODE).unwrap();
    let entries = vec![
        RawEntry::new("SELECT id, name FROM users WHERE id = 1").at(1_700_000_000.0),
        RawEntry::new("import os\n\ndef main():\n    print(os.getcwd())").at(1_700_000_005.0),
        RawEntry::new("lunch at noon?").at(1_700_000_010.0),
    ];

    let result = orchestrator(echo_registry())
        .execute_entries(&bp, &entries, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.overall_status, OverallStatus::Succeeded);
    assert_eq!(result.step("review").unwrap().matched, 1);
    assert_eq!(result.step("analyze").unwrap().matched, 1);
}

#[tokio::test]
async fn result_serializes_for_presentation() {
    let bp = parse(SQL_THEN_CODE).unwrap();
    let result = orchestrator(echo_registry())
        .execute(&bp, vec![sql_item()])
        .await
        .unwrap();

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["overall_status"], "succeeded");
    assert_eq!(json["steps"][0]["status"], "succeeded");
    assert_eq!(json["steps"][0]["outputs"][0]["status"], "succeeded");
    assert_eq!(json["steps"][1]["status"], "skipped");
}
