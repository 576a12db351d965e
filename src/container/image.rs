//! Image build orchestration.
//!
//! Reads a build definition, packages it as the build context, submits it to
//! the engine and drains the build log into a pair of sinks.

use crate::container::archive::{self, ArchiveEntry, BuildDefinition};
use crate::container::logs::{self, LogSinks};
use crate::container::{BuildRequest, ContainerEngine, Result, with_deadline};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWrite;
use tracing::{debug, info, warn};

/// Result of a build the engine completed.
#[derive(Debug)]
pub struct BuildReport {
    /// Tag of the built image
    pub image_tag: String,
    /// Size of the uploaded context in bytes
    pub context_bytes: usize,
    /// Bytes forwarded to the stdout sink
    pub stdout_bytes: u64,
    /// Bytes forwarded to the stderr sink
    pub stderr_bytes: u64,
    /// Set when forwarding the log failed; the image was still built
    pub log_error: Option<String>,
    /// Set when the log stream broke after the build started
    pub stream_error: Option<String>,
}

/// Image builder submitting build contexts to a container engine.
pub struct ImageBuilder {
    engine: Arc<dyn ContainerEngine>,
    timeout: Option<Duration>,
    compress_context: bool,
}

impl ImageBuilder {
    /// Create a new image builder.
    pub fn new(engine: Arc<dyn ContainerEngine>) -> Self {
        Self {
            engine,
            timeout: None,
            compress_context: false,
        }
    }

    /// Bound the build submission and log draining by `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Upload the build context gzip-compressed.
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress_context = compress;
        self
    }

    /// Build `image_tag` from the definition at `definition_path`.
    ///
    /// The definition is stored in the context as `entry_name` and named as
    /// the Dockerfile of the build. Steps run strictly in order: read,
    /// package, submit, drain.
    ///
    /// # Errors
    ///
    /// - [`ContainerError::Io`](crate::container::ContainerError::Io) if the definition cannot be read
    /// - [`ContainerError::ArchiveWrite`](crate::container::ContainerError::ArchiveWrite) if packaging fails
    /// - [`ContainerError::Build`](crate::container::ContainerError::Build) if the engine fails the build
    /// - [`ContainerError::Timeout`](crate::container::ContainerError::Timeout) if the deadline expires
    pub async fn build<O, E>(
        &self,
        definition_path: &Path,
        entry_name: &str,
        image_tag: &str,
        sinks: &mut LogSinks<O, E>,
    ) -> Result<BuildReport>
    where
        O: AsyncWrite + Unpin,
        E: AsyncWrite + Unpin,
    {
        info!("Building image: {}", image_tag);

        let definition = BuildDefinition::read(definition_path, entry_name).await?;
        debug!(
            "Read build definition {} ({} bytes)",
            definition_path.display(),
            definition.size()
        );

        let entries: [ArchiveEntry; 1] = [definition.into()];
        let context = if self.compress_context {
            archive::package_compressed(&entries)?
        } else {
            archive::package(&entries)?
        };
        let context_bytes = context.len();

        let request = BuildRequest {
            context,
            tag: image_tag.to_string(),
            dockerfile: entry_name.to_string(),
        };

        let outcome = with_deadline("build", self.timeout, async {
            let logs = self.engine.build_image(request);
            logs::drain(logs, sinks).await
        })
        .await?;

        let log_error = outcome.sink_error.map(|e| {
            warn!("Build log for {} was not fully forwarded: {}", image_tag, e);
            e.to_string()
        });

        if let Some(stream_error) = &outcome.stream_error {
            warn!(
                "Build log for {} ended early, continuing: {}",
                image_tag, stream_error
            );
        } else {
            info!("Successfully built: {}", image_tag);
        }

        Ok(BuildReport {
            image_tag: image_tag.to_string(),
            context_bytes,
            stdout_bytes: outcome.stdout_bytes,
            stderr_bytes: outcome.stderr_bytes,
            log_error,
            stream_error: outcome.stream_error,
        })
    }
}
