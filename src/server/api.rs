//! Router and shared handler state.

use crate::cli::DockhandConfig;
use crate::container::{CleanupPolicy, ContainerSpec, EngineConnector, Result};
use crate::env;
use crate::server::handlers;
use axum::Router;
use axum::routing::get;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

/// Immutable state shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub(crate) connector: Arc<dyn EngineConnector>,
    pub(crate) spec: Arc<ContainerSpec>,
    pub(crate) cleanup: CleanupPolicy,
    pub(crate) timeout: Option<Duration>,
}

impl AppState {
    pub fn new(connector: Arc<dyn EngineConnector>, spec: ContainerSpec) -> Self {
        Self {
            connector,
            spec: Arc::new(spec),
            cleanup: CleanupPolicy::default(),
            timeout: None,
        }
    }

    /// State for the configured server image and command.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the image is empty. An empty command
    /// runs the image's default command.
    pub fn from_config(config: &DockhandConfig, connector: Arc<dyn EngineConnector>) -> Result<Self> {
        let mut spec = ContainerSpec::builder().image(&config.server.image);
        if !config.server.command.is_empty() {
            spec = spec.cmd(&config.server.command);
        }
        let spec = spec.build()?;

        Ok(Self::new(connector, spec)
            .with_cleanup(config.cleanup)
            .with_timeout(config.operation_timeout()))
    }

    pub fn with_cleanup(mut self, cleanup: CleanupPolicy) -> Self {
        self.cleanup = cleanup;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Creates the router with the container endpoint.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            env::server::CREATE_CONTAINER_ROUTE,
            get(handlers::create_container),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
