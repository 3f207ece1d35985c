//! REST endpoints for driving the wizard.
//!
//! Every successful call answers with the full `WizardStatus`, so a client
//! can render from the response alone.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;

use crate::error::WizardError;

use super::engine::WizardEngine;
use super::state::FieldUpdate;

/// Shared state for wizard routes.
#[derive(Clone)]
pub struct WizardRouteState {
    pub engine: Arc<WizardEngine>,
}

/// Build the wizard REST routes.
pub fn wizard_routes(engine: Arc<WizardEngine>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/wizard", get(get_status))
        .route("/api/wizard/fields", patch(update_fields))
        .route("/api/wizard/advance", post(advance))
        .route("/api/wizard/retreat", post(retreat))
        .route("/api/wizard/submit", post(submit))
        .route("/api/wizard/autofill", post(autofill))
        .route("/api/wizard/goals", post(generate_goals))
        .route("/api/wizard/registry", post(refresh_registry))
        .route("/api/wizard/reset", post(reset))
        .layer(CorsLayer::permissive())
        .with_state(WizardRouteState { engine })
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "agent-onboard"
    }))
}

/// GET /api/wizard
async fn get_status(State(state): State<WizardRouteState>) -> impl IntoResponse {
    Json(state.engine.status())
}

/// PATCH /api/wizard/fields
///
/// Body: `[{"field": "first_name", "value": "Jane"}, ...]`. Edits never
/// validate and never clear errors.
async fn update_fields(
    State(state): State<WizardRouteState>,
    Json(updates): Json<Vec<FieldUpdate>>,
) -> Response {
    state.engine.edit(|s| {
        for update in updates {
            s.apply(update);
        }
    });
    Json(state.engine.status()).into_response()
}

/// POST /api/wizard/advance
async fn advance(State(state): State<WizardRouteState>) -> Response {
    let result = state.engine.advance().await.map(|_| ());
    respond(&state.engine, result)
}

/// POST /api/wizard/retreat
async fn retreat(State(state): State<WizardRouteState>) -> Response {
    let result = state.engine.retreat().map(|_| ());
    respond(&state.engine, result)
}

/// POST /api/wizard/submit
async fn submit(State(state): State<WizardRouteState>) -> Response {
    let result = state.engine.submit().await.map(|_| ());
    respond(&state.engine, result)
}

/// POST /api/wizard/autofill
async fn autofill(State(state): State<WizardRouteState>) -> Response {
    let result = state.engine.autofill_company().await.map(|_| ());
    respond(&state.engine, result)
}

/// POST /api/wizard/goals
async fn generate_goals(State(state): State<WizardRouteState>) -> Response {
    let result = state.engine.generate_goals().await.map(|_| ());
    respond(&state.engine, result)
}

/// POST /api/wizard/registry
async fn refresh_registry(State(state): State<WizardRouteState>) -> Response {
    let result = state.engine.refresh_registry().await.map(|_| ());
    respond(&state.engine, result)
}

/// POST /api/wizard/reset
async fn reset(State(state): State<WizardRouteState>) -> Response {
    let result = state.engine.reset();
    respond(&state.engine, result)
}

fn respond(engine: &WizardEngine, result: Result<(), WizardError>) -> Response {
    let status = engine.status();
    match result {
        Ok(()) => Json(status).into_response(),
        Err(err) => {
            let code = status_code(&err);
            let body = serde_json::json!({
                "error": err.to_string(),
                "status": status,
            });
            (code, Json(body)).into_response()
        }
    }
}

fn status_code(err: &WizardError) -> StatusCode {
    match err {
        WizardError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        WizardError::Busy
        | WizardError::WrongStep { .. }
        | WizardError::Terminal
        | WizardError::AtFirstStep => StatusCode::CONFLICT,
        WizardError::MissingDomain => StatusCode::BAD_REQUEST,
        WizardError::Service(_) => StatusCode::BAD_GATEWAY,
    }
}
