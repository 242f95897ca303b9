//! HTTP surface
//!
//! Endpoints:
//! - GET  /authorize                      - consent URL for the operator
//! - POST /callback, GET /callback?code=  - exchange the code, persist tokens
//! - POST /create_container_bound_script  - create-script
//! - PUT  /update_script_content          - push-content
//! - POST /run_script                     - run-function
//! - GET  /health                         - credential status, always 200
//! - GET  /metrics                        - Prometheus text exposition

use std::time::Instant;

use apps_script::{
    CreateScript, CreateScriptRequest, Gateway, Operation, PushContent, PushContentRequest,
    RunFunction, RunFunctionRequest,
};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use google_auth::{AuthorizationFlow, StatusReporter};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::error::ApiError;
use crate::metrics;

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub struct AppState {
    pub flow: AuthorizationFlow,
    pub gateway: Gateway,
    pub status: StatusReporter,
    pub prometheus: PrometheusHandle,
}

/// Build the router; `max_connections` bounds concurrent requests.
pub fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/authorize", get(authorize))
        .route("/callback", post(callback_post).get(callback_get))
        .route("/create_container_bound_script", post(create_script))
        .route("/update_script_content", put(update_script_content))
        .route("/run_script", post(run_script))
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

/// Unwrap a JSON body, turning axum's rejection into `InvalidRequestError`.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::MalformedBody(rejection.body_text()))
}

async fn authorize(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let url = state.flow.build_consent_url()?;
    Ok(Json(json!({ "authUrl": url })))
}

#[derive(Debug, Default, Deserialize)]
struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    /// Set by the consent screen when the operator declines.
    #[serde(default)]
    error: Option<String>,
}

async fn callback_post(
    State(state): State<AppState>,
    payload: Result<Json<CallbackParams>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let params = body(payload)?;
    complete_authorization(&state, params).await
}

async fn callback_get(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<Value>, ApiError> {
    complete_authorization(&state, params).await
}

async fn complete_authorization(
    state: &AppState,
    params: CallbackParams,
) -> Result<Json<Value>, ApiError> {
    let result = match (params.error, params.code) {
        (Some(denied), None) => Err(google_auth::Error::TokenExchange(format!(
            "consent denied: {denied}"
        ))),
        (_, code) => {
            state
                .flow
                .complete_exchange(code.as_deref().unwrap_or_default())
                .await
        }
    };

    match result {
        Ok(adoption) => {
            metrics::record_authorization("success");
            info!(token_saved = adoption.token_saved, "authorization completed");
            Ok(Json(json!({
                "success": true,
                "tokenSaved": adoption.token_saved,
            })))
        }
        Err(e) => {
            let err = ApiError::from(e);
            metrics::record_authorization(err.kind());
            Err(err)
        }
    }
}

/// Run one gateway operation and record its outcome and latency.
async fn execute<O: Operation>(
    gateway: &Gateway,
    op: O,
    payload: Result<Json<O::Request>, JsonRejection>,
) -> Result<O::Response, ApiError> {
    let started = Instant::now();
    let result = authenticate_then_execute(gateway, &op, payload).await;
    let outcome = match &result {
        Ok(_) => "success",
        Err(e) => e.outcome(),
    };
    metrics::record_operation(op.name(), outcome, started.elapsed().as_secs_f64());
    result
}

/// The auth gate runs before the body is parsed, so an unauthenticated
/// caller never gets a body error.
async fn authenticate_then_execute<O: Operation>(
    gateway: &Gateway,
    op: &O,
    payload: Result<Json<O::Request>, JsonRejection>,
) -> Result<O::Response, ApiError> {
    gateway.ensure_authenticated().await?;
    let request = body(payload)?;
    Ok(gateway.execute(op, &request).await?)
}

async fn create_script(
    State(state): State<AppState>,
    payload: Result<Json<CreateScriptRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let created = execute(&state.gateway, CreateScript, payload).await?;
    Ok(Json(created))
}

async fn update_script_content(
    State(state): State<AppState>,
    payload: Result<Json<PushContentRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let pushed = execute(&state.gateway, PushContent, payload).await?;
    Ok(Json(json!({
        "success": true,
        "updatedFiles": pushed.updated_files,
    })))
}

async fn run_script(
    State(state): State<AppState>,
    payload: Result<Json<RunFunctionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let ran = execute(&state.gateway, RunFunction, payload).await?;
    Ok(Json(ran))
}

/// Always 200; `status` is "degraded" until a usable credential is held.
async fn health(State(state): State<AppState>) -> Json<Value> {
    let report = state.status.report().await;
    Json(json!({
        "status": if report.authenticated { "healthy" } else { "degraded" },
        "authInitialized": report.client_identity_loaded,
        "hasToken": report.authenticated,
        "credentialsFileExists": report.identity_file_present,
        "tokenFileExists": report.credential_store_present,
        "timestamp": report.timestamp,
    }))
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.prometheus.render(),
    )
}
