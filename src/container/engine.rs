//! Engine capability used by the build and lifecycle components.
//!
//! [`ContainerClient`](super::ContainerClient) is the bollard-backed
//! implementation; tests substitute their own.

use crate::container::{ContainerSpec, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::sync::Arc;

/// An image build submission.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Tar archive holding the build context
    pub context: Vec<u8>,
    /// Tag applied to the built image
    pub tag: String,
    /// Name of the build definition inside the context
    pub dockerfile: String,
}

/// One demultiplexed message from the build log stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildLog {
    /// Build step output
    StdOut(Bytes),
    /// Status and progress messages
    StdErr(Bytes),
}

/// Operations the crate needs from a container engine daemon.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Submit a build. The stream yields log messages until the build ends;
    /// an `Err` item means the daemon reported a failure or the stream broke.
    fn build_image(&self, request: BuildRequest) -> BoxStream<'_, Result<BuildLog>>;

    /// Create a container and return the engine-assigned identifier.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String>;

    /// Start a previously created container.
    async fn start_container(&self, container_id: &str) -> Result<()>;

    /// Forcefully remove a container.
    async fn remove_container(&self, container_id: &str) -> Result<()>;
}

/// Opens a fresh engine connection on demand.
#[async_trait]
pub trait EngineConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn ContainerEngine>>;
}
