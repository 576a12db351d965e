//! Container engine integration layer.
//!
//! This module talks to a Docker/Podman daemon through the bollard API. The
//! daemon owns image builds and container state; this crate only packages the
//! build context, submits requests and sequences the create/start lifecycle.
//!
//! ## Architecture
//!
//! - [`archive`]: tar packaging of the build context
//! - [`client`]: bollard client wrapper with API version negotiation
//! - [`engine`]: the [`ContainerEngine`] capability the other components use
//! - [`image`]: build orchestration (read, package, submit, drain logs)
//! - [`logs`]: build log demultiplexing into stdout/stderr sinks
//! - [`lifecycle`]: create-then-start state machine
//! - [`config`]: container configuration builder
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dockhand::container::{
//!     ContainerClient, ContainerSpec, EngineSettings, LifecycleController,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ContainerClient::connect(&EngineSettings::default()).await?;
//!     let controller = LifecycleController::new(Arc::new(client));
//!
//!     let spec = ContainerSpec::builder()
//!         .image("ubuntu:latest")
//!         .cmd(vec!["echo", "hello world"])
//!         .build()?;
//!
//!     let container_id = controller.create_and_start(&spec).await?;
//!     println!("Container {} started", container_id);
//!     Ok(())
//! }
//! ```

pub mod archive;
mod client;
mod config;
mod engine;
mod image;
mod lifecycle;
mod logs;

pub use archive::{ArchiveEntry, BuildDefinition};
pub use client::{ContainerClient, DockerConnector, EngineSettings};
pub use config::{ContainerSpec, ContainerSpecBuilder};
pub use engine::{BuildLog, BuildRequest, ContainerEngine, EngineConnector};
pub use image::{BuildReport, ImageBuilder};
pub use lifecycle::{CleanupPolicy, LifecycleController, LifecycleState};
pub use logs::{LogSinks, StdioSinks};

use std::future::Future;
use std::time::Duration;

/// Container engine errors.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// Build definition could not be read or written
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Tar header or content could not be written
    #[error("Archive write error: {0}")]
    ArchiveWrite(String),

    /// Archive could not be read back: malformed, truncated or unfinalized
    #[error("Archive read error: {0}")]
    ArchiveRead(String),

    /// Daemon unreachable or API version negotiation failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// Daemon rejected or failed the image build
    #[error("Build error: {0}")]
    Build(String),

    /// Build log stream broke in transport or could not be decoded
    #[error("Build log stream error: {0}")]
    LogStream(String),

    /// Daemon rejected container creation
    #[error("Create error: {0}")]
    Create(String),

    /// Daemon rejected container start; the container exists in "created" state
    #[error("Start error for container {container_id}: {message}")]
    Start {
        container_id: String,
        message: String,
    },

    /// An engine call exceeded its deadline
    #[error("Operation '{operation}' timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Docker/Podman API error
    #[error("Container API error: {0}")]
    Api(#[from] bollard::errors::Error),
}

impl ContainerError {
    /// Short name of the stage that failed, safe to show to HTTP callers.
    pub fn stage(&self) -> &'static str {
        match self {
            ContainerError::Io(_) => "io",
            ContainerError::ArchiveWrite(_) | ContainerError::ArchiveRead(_) => "archive",
            ContainerError::Connection(_) => "connect",
            ContainerError::Build(_) | ContainerError::LogStream(_) => "build",
            ContainerError::Create(_) => "create",
            ContainerError::Start { .. } => "start",
            ContainerError::Timeout { .. } => "timeout",
            ContainerError::Config(_) => "config",
            ContainerError::Api(_) => "engine",
        }
    }
}

/// Result type for container operations.
pub type Result<T> = std::result::Result<T, ContainerError>;

/// Run `fut` under an optional deadline.
pub(crate) async fn with_deadline<T, F>(
    operation: &'static str,
    timeout: Option<Duration>,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout {
        Some(timeout) => tokio::time::timeout(timeout, fut)
            .await
            .map_err(|_| ContainerError::Timeout { operation, timeout })?,
        None => fut.await,
    }
}
