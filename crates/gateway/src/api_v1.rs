//! HTTP API v1.
//!
//! Endpoints:
//!
//! - `GET  /v1/roles`               List registered roles
//! - `POST /v1/classify`            Classify raw clipboard entries
//! - `POST /v1/predict`             Predict the user's current workflow
//! - `GET  /v1/blueprints`          List cached blueprints
//! - `POST /v1/blueprints`          Parse and cache a blueprint
//! - `GET  /v1/blueprints/{name}`   Canonical source and steps of a cached blueprint
//! - `POST /v1/execute`             Run a cached or inline blueprint over entries

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use clipflow_blueprint::{Blueprint, BlueprintError};
use clipflow_classifier::{WorkflowPrediction, classify_all, cluster_by_time, predict_workflow};
use clipflow_core::{ContentItem, Params, RawEntry, RoleInfo};
use clipflow_workflow::{ExecutionResult, OverallStatus};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{MAX_BLUEPRINTS, SharedState};

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedState) -> Router {
    Router::new()
        .route("/roles", get(list_roles_handler))
        .route("/classify", post(classify_handler))
        .route("/predict", post(predict_handler))
        .route("/blueprints", get(list_blueprints_handler))
        .route("/blueprints", post(create_blueprint_handler))
        .route("/blueprints/{name}", get(get_blueprint_handler))
        .route("/execute", post(execute_handler))
        .with_state(state)
}

// ── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Source line, for blueprint syntax errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            line: None,
        }),
    )
}

fn blueprint_error(err: BlueprintError) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            line: err.line(),
            error: err.to_string(),
        }),
    )
}

// ── Roles ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct RoleListResponse {
    pub roles: Vec<RoleInfo>,
    pub count: usize,
}

/// `GET /v1/roles`
async fn list_roles_handler(State(state): State<SharedState>) -> Json<RoleListResponse> {
    let roles = state.orchestrator.registry().infos();
    Json(RoleListResponse {
        count: roles.len(),
        roles,
    })
}

// ── Classification & prediction ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct EntriesRequest {
    pub entries: Vec<RawEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClassifyResponse {
    pub items: Vec<ContentItem>,
}

/// `POST /v1/classify`
async fn classify_handler(Json(payload): Json<EntriesRequest>) -> Json<ClassifyResponse> {
    Json(ClassifyResponse {
        items: classify_all(&payload.entries),
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    #[serde(flatten)]
    pub prediction: WorkflowPrediction,
    /// Sizes of the activity bursts found in the entries, newest first.
    pub clusters: Vec<usize>,
}

/// `POST /v1/predict`
async fn predict_handler(
    State(state): State<SharedState>,
    Json(payload): Json<EntriesRequest>,
) -> Json<PredictResponse> {
    let analyzer = &state.config.analyzer;
    let items = classify_all(&payload.entries);
    let clusters = cluster_by_time(&items, analyzer.cluster_threshold_secs)
        .iter()
        .map(Vec::len)
        .collect();
    Json(PredictResponse {
        prediction: predict_workflow(&items, analyzer.recent_window),
        clusters,
    })
}

// ── Blueprints ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct BlueprintSummary {
    pub name: String,
    pub steps: usize,
    pub roles: Vec<String>,
    /// Roles the blueprint targets that are not registered.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unknown_roles: Vec<String>,
}

impl BlueprintSummary {
    fn new(blueprint: &Blueprint, state: &SharedState) -> Self {
        let registry = state.orchestrator.registry();
        let roles: Vec<String> = blueprint.roles().into_iter().map(str::to_string).collect();
        let unknown_roles = roles
            .iter()
            .filter(|r| !registry.contains(r))
            .cloned()
            .collect();
        Self {
            name: blueprint.name.clone(),
            steps: blueprint.steps.len(),
            roles,
            unknown_roles,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BlueprintListResponse {
    pub blueprints: Vec<BlueprintSummary>,
}

/// `GET /v1/blueprints`
async fn list_blueprints_handler(State(state): State<SharedState>) -> Json<BlueprintListResponse> {
    let cache = state.blueprints.read().await;
    Json(BlueprintListResponse {
        blueprints: cache
            .values()
            .map(|bp| BlueprintSummary::new(bp, &state))
            .collect(),
    })
}

#[derive(Debug, Deserialize)]
pub struct CreateBlueprintRequest {
    pub source: String,
}

/// `POST /v1/blueprints`: parse, validate and cache. Re-posting a name
/// replaces the cached blueprint.
async fn create_blueprint_handler(
    State(state): State<SharedState>,
    Json(payload): Json<CreateBlueprintRequest>,
) -> Result<(StatusCode, Json<BlueprintSummary>), ApiError> {
    let blueprint = clipflow_blueprint::parse(&payload.source).map_err(blueprint_error)?;
    blueprint.validate().map_err(blueprint_error)?;
    let summary = BlueprintSummary::new(&blueprint, &state);
    if !summary.unknown_roles.is_empty() {
        warn!(blueprint = %blueprint.name, unknown = ?summary.unknown_roles, "Blueprint targets unregistered roles");
    }

    let mut cache = state.blueprints.write().await;
    if cache.len() >= MAX_BLUEPRINTS && !cache.contains_key(&blueprint.name) {
        return Err(api_error(
            StatusCode::CONFLICT,
            format!("blueprint cache is full ({MAX_BLUEPRINTS} entries)"),
        ));
    }
    info!(blueprint = %blueprint.name, steps = blueprint.steps.len(), "Cached blueprint");
    cache.insert(blueprint.name.clone(), Arc::new(blueprint));
    Ok((StatusCode::CREATED, Json(summary)))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StepView {
    pub index: usize,
    pub name: String,
    pub condition: String,
    pub role: String,
    #[serde(default)]
    pub parameters: Params,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BlueprintDetail {
    pub name: String,
    pub source: String,
    pub steps: Vec<StepView>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// `GET /v1/blueprints/{name}`
async fn get_blueprint_handler(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Result<Json<BlueprintDetail>, ApiError> {
    let blueprint = cached(&state, &name).await?;
    Ok(Json(BlueprintDetail {
        name: blueprint.name.clone(),
        source: clipflow_blueprint::serialize(&blueprint),
        steps: blueprint
            .steps
            .iter()
            .map(|s| StepView {
                index: s.index,
                name: s.name.clone(),
                condition: s.condition.to_string(),
                role: s.target_role.clone(),
                parameters: s.parameters.clone(),
            })
            .collect(),
        metadata: blueprint.metadata.clone(),
    }))
}

async fn cached(state: &SharedState, name: &str) -> Result<Arc<Blueprint>, ApiError> {
    state
        .blueprints
        .read()
        .await
        .get(name)
        .cloned()
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("blueprint '{name}' not found")))
}

// ── Execution ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    /// Name of a cached blueprint.
    #[serde(default)]
    pub blueprint: Option<String>,
    /// Inline blueprint source.
    #[serde(default)]
    pub source: Option<String>,
    pub entries: Vec<RawEntry>,
}

/// `POST /v1/execute`
async fn execute_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ExecuteRequest>,
) -> Result<Json<ExecutionResult>, ApiError> {
    let blueprint = match (payload.blueprint.as_deref(), payload.source.as_deref()) {
        (Some(name), None) => cached(&state, name).await?,
        (None, Some(source)) => Arc::new(clipflow_blueprint::parse(source).map_err(blueprint_error)?),
        _ => {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                "exactly one of 'blueprint' or 'source' is required",
            ));
        }
    };

    let result = state
        .orchestrator
        .execute_entries(&blueprint, &payload.entries, &CancellationToken::new())
        .await
        .map_err(|e| api_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;

    if result.overall_status != OverallStatus::Succeeded {
        warn!(run_id = %result.run_id, status = %result.overall_status, "Execution degraded");
    }
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GatewayState;
    use axum::body::Body;
    use axum::http::{Request, header};
    use clipflow_config::AppConfig;
    use clipflow_workflow::StepStatus;
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;

    const TRIAGE: &str = "blueprint: triage\n\n\
        step review:\n    when: category == sql\n    role: sql_reviewer\n\n\
        step links:\n    when: category == url OR text CONTAINS \"http\"\n    role: link_collector\n";

    fn test_api_state() -> SharedState {
        GatewayState::new(AppConfig::default(), clipflow_roles::default_registry()).shared()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn list_roles() {
        let response = v1_router(test_api_state()).oneshot(get("/roles")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let list: RoleListResponse = body_json(response).await;
        assert_eq!(list.count, 5);
        assert!(list.roles.iter().any(|r| r.name == "sql_reviewer"));
    }

    #[tokio::test]
    async fn classify_entries() {
        let req = post_json(
            "/classify",
            json!({"entries": [
                {"text": "SELECT 1 FROM dual"},
                {"text": "{\"a\": 1}", "type_hint": "application/json"},
                {"text": ""}
            ]}),
        );
        let response = v1_router(test_api_state()).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let out: serde_json::Value = body_json(response).await;
        let categories: Vec<&str> = out["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["category"].as_str().unwrap())
            .collect();
        assert_eq!(categories, vec!["sql", "json", "unknown"]);
    }

    #[tokio::test]
    async fn predict_workflow_from_entries() {
        let req = post_json(
            "/predict",
            json!({"entries": [
                {"text": "docker ps -a", "timestamp": 100.0},
                {"text": "kubectl get pods", "timestamp": 110.0},
                {"text": "docker compose up -d", "timestamp": 120.0}
            ]}),
        );
        let response = v1_router(test_api_state()).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let out: serde_json::Value = body_json(response).await;
        assert_eq!(out["name"], "DevOps/SRE");
        assert_eq!(out["clusters"], json!([3]));
    }

    #[tokio::test]
    async fn create_get_and_list_blueprints() {
        let state = test_api_state();

        let response = v1_router(state.clone())
            .oneshot(post_json("/blueprints", json!({"source": TRIAGE})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let summary: BlueprintSummary = body_json(response).await;
        assert_eq!(summary.name, "triage");
        assert_eq!(summary.steps, 2);
        assert!(summary.unknown_roles.is_empty());

        let response = v1_router(state.clone())
            .oneshot(get("/blueprints/triage"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let detail: BlueprintDetail = body_json(response).await;
        assert_eq!(detail.steps[1].role, "link_collector");
        assert_eq!(detail.steps[0].condition, "category == sql");
        assert_eq!(
            clipflow_blueprint::parse(&detail.source).unwrap(),
            clipflow_blueprint::parse(TRIAGE).unwrap()
        );

        let response = v1_router(state).oneshot(get("/blueprints")).await.unwrap();
        let list: BlueprintListResponse = body_json(response).await;
        assert_eq!(list.blueprints.len(), 1);
    }

    #[tokio::test]
    async fn syntax_error_reports_line() {
        let response = v1_router(test_api_state())
            .oneshot(post_json(
                "/blueprints",
                json!({"source": "step a:\n    when: category ==\n    role: x\n"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let err: ErrorResponse = body_json(response).await;
        assert_eq!(err.line, Some(2));
    }

    #[tokio::test]
    async fn unknown_roles_are_flagged() {
        let response = v1_router(test_api_state())
            .oneshot(post_json(
                "/blueprints",
                json!({"source": "step a:\n    role: ghost\n"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let summary: BlueprintSummary = body_json(response).await;
        assert_eq!(summary.unknown_roles, vec!["ghost"]);
    }

    #[tokio::test]
    async fn missing_blueprint_is_404() {
        let response = v1_router(test_api_state())
            .oneshot(get("/blueprints/nope"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn execute_cached_blueprint() {
        let state = test_api_state();
        v1_router(state.clone())
            .oneshot(post_json("/blueprints", json!({"source": TRIAGE})))
            .await
            .unwrap();

        let response = v1_router(state)
            .oneshot(post_json(
                "/execute",
                json!({
                    "blueprint": "triage",
                    "entries": [
                        {"text": "SELECT * FROM orders"},
                        {"text": "notes: see https://example.com/spec for details"}
                    ]
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let result: ExecutionResult = body_json(response).await;
        assert_eq!(result.blueprint, "triage");
        assert_eq!(result.overall_status, OverallStatus::Succeeded);
        assert_eq!(result.steps[0].status, StepStatus::Succeeded);
        assert_eq!(result.steps[1].status, StepStatus::Succeeded);
        assert_eq!(result.steps[1].matched, 1);
    }

    #[tokio::test]
    async fn execute_inline_source_with_failure() {
        let response = v1_router(test_api_state())
            .oneshot(post_json(
                "/execute",
                json!({
                    "source": "step links:\n    role: link_collector\n",
                    "entries": [{"text": "no links in this note"}]
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let result: ExecutionResult = body_json(response).await;
        assert_eq!(result.overall_status, OverallStatus::Failed);
        assert!(result.steps[0].error.as_deref().unwrap().contains("no links found"));
    }

    #[tokio::test]
    async fn execute_requires_exactly_one_blueprint_source() {
        let response = v1_router(test_api_state())
            .oneshot(post_json("/execute", json!({"entries": []})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = v1_router(test_api_state())
            .oneshot(post_json(
                "/execute",
                json!({"blueprint": "missing", "entries": []}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
