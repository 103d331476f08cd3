//! HTTP API gateway for clipflow.
//!
//! Exposes the classifier, the workflow analyzer and the orchestrator as a
//! small JSON API, plus a cache of parsed blueprints that can be executed by
//! name.
//!
//! Built on Axum.

pub mod api_v1;

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::{Router, extract::State, http::HeaderValue, response::Json, routing::get};
use chrono::{DateTime, Utc};
use clipflow_blueprint::Blueprint;
use clipflow_config::AppConfig;
use clipflow_core::RoleRegistry;
use clipflow_workflow::{Orchestrator, OrchestratorOptions};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

/// Maximum number of blueprints held in the cache.
pub const MAX_BLUEPRINTS: usize = 256;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub config: AppConfig,
    pub orchestrator: Orchestrator,
    /// Parsed blueprints by name.
    pub blueprints: RwLock<BTreeMap<String, Arc<Blueprint>>>,
    pub start_time: DateTime<Utc>,
}

pub type SharedState = Arc<GatewayState>;

impl GatewayState {
    pub fn new(config: AppConfig, registry: RoleRegistry) -> Self {
        let orchestrator = Orchestrator::new(Arc::new(registry))
            .with_options(OrchestratorOptions::from_config(&config.orchestrator));
        Self {
            config,
            orchestrator,
            blueprints: RwLock::new(BTreeMap::new()),
            start_time: Utc::now(),
        }
    }

    pub fn shared(self) -> SharedState {
        Arc::new(self)
    }
}

/// Build the full router: `/health` plus the v1 API.
///
/// Layers applied:
/// - request body size limit from `gateway.max_body_bytes`
/// - CORS for the configured origins
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    let body_limit = state.config.gateway.max_body_bytes;
    let cors = cors_layer(&state.config.gateway.cors_origins);

    Router::new()
        .route("/health", get(health_handler))
        .with_state(state.clone())
        .nest("/v1", api_v1::v1_router(state))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Only the listed origins are allowed; with none configured no
/// cross-origin request is allowed.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600))
}

/// Start the gateway HTTP server with the built-in roles.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let state = GatewayState::new(config, clipflow_roles::default_registry()).shared();
    let roles = state.orchestrator.registry().len();
    let app = build_router(state);

    info!(addr = %addr, roles, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

// --- Handlers ---

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub roles: usize,
    pub blueprints: usize,
    pub uptime_secs: i64,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        roles: state.orchestrator.registry().len(),
        blueprints: state.blueprints.read().await.len(),
        uptime_secs: (Utc::now() - state.start_time).num_seconds(),
    })
}
