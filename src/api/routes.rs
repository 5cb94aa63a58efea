//! HTTP route handlers and server bootstrap.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderValue, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::fs;
use super::types::{ApiError, HealthResponse, RunTaskRequest, TaskQuery};
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::tools::ToolInfo;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Build the application router.
pub fn router(state: AppState, config: &Config) -> Router {
    Router::new()
        .route("/run", post(run_task))
        .route("/read", get(fs::read_file))
        .route("/tools", get(list_tools))
        .route("/health", get(health))
        .layer(cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the configured address and serve until the process exits.
pub async fn serve(config: Arc<Config>, dispatcher: Arc<Dispatcher>) -> std::io::Result<()> {
    let app = router(AppState { dispatcher }, &config);
    let listener = TcpListener::bind(config.bind_addr()).await?;
    info!("Server listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await
}

/// `POST /run` - the task comes from `?task=` first, then from the JSON body.
async fn run_task(
    State(state): State<AppState>,
    Query(query): Query<TaskQuery>,
    body: Option<Json<RunTaskRequest>>,
) -> Result<Json<Value>, ApiError> {
    let task = query
        .task
        .filter(|t| !t.is_empty())
        .or_else(|| body.map(|Json(req)| req.task))
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::BAD_REQUEST,
                "Task must be provided either in query parameter or request body",
            )
        })?;

    match state.dispatcher.dispatch(&task).await {
        Ok(outcome) => Ok(Json(outcome.into_json())),
        Err(e) => {
            warn!("Task failed ({}): {}", e.kind(), e);
            Err(e.into())
        }
    }
}

async fn list_tools(State(state): State<AppState>) -> Json<Vec<ToolInfo>> {
    Json(state.dispatcher.registry().list_tools())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
