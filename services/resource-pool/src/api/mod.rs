//! HTTP API handlers and routing.

pub mod error;

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use falcon_pool_api::{AttachRequest, DetachRequest, Device};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::state::AppState;
use error::ApiError;

/// Create the registry router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/resources", get(list_resources))
        .route("/allocation", axum::routing::post(attach).delete(detach))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `GET /resources` - all devices with their current bindings, seed order.
async fn list_resources(state: axum::extract::State<AppState>) -> Json<Vec<Device>> {
    Json(state.list().await)
}

/// `POST /allocation` - bind an unattached device to a host port.
async fn attach(
    state: axum::extract::State<AppState>,
    body: Result<Json<AttachRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body.map_err(bad_payload)?;
    state.attach(&req.devid, &req.hostport).await?;
    info!(devid = %req.devid, hostport = %req.hostport, "Device attached");
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /allocation` - clear a device's binding. Idempotent.
async fn detach(
    state: axum::extract::State<AppState>,
    body: Result<Json<DetachRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body.map_err(bad_payload)?;
    state.detach(&req.devid).await?;
    info!(devid = %req.devid, "Device detached");
    Ok(StatusCode::NO_CONTENT)
}

fn bad_payload(rejection: JsonRejection) -> ApiError {
    ApiError::bad_request("invalid_payload", rejection.body_text())
}
