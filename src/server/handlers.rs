//! Request handlers.

use crate::container::{ContainerError, LifecycleController, Result, with_deadline};
use crate::server::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{info, warn};

/// `GET /create-container`
pub async fn create_container(State(state): State<AppState>) -> Response {
    match connect_and_start(&state).await {
        Ok(container_id) => {
            info!("Container {} created via HTTP", container_id);
            format!("Container {} created!", container_id).into_response()
        }
        Err(e) => {
            warn!("create-container request failed at {}: {}", e.stage(), e);
            (StatusCode::INTERNAL_SERVER_ERROR, failure_message(&e)).into_response()
        }
    }
}

async fn connect_and_start(state: &AppState) -> Result<String> {
    let engine = with_deadline("connect", state.timeout, state.connector.connect()).await?;

    LifecycleController::new(engine)
        .with_cleanup(state.cleanup)
        .with_timeout(state.timeout)
        .create_and_start(&state.spec)
        .await
}

/// Short caller-facing message; details stay in the server log.
fn failure_message(error: &ContainerError) -> &'static str {
    match error {
        ContainerError::Connection(_) => "Failed to initialize container engine client",
        ContainerError::Start { .. } => "Failed to start container",
        ContainerError::Timeout { .. } => "Timed out waiting for container engine",
        _ => "Failed to create container",
    }
}
