//! The `dockhand build` pipeline.
//!
//! Writes the build definition, builds the image, then creates and starts a
//! container from it. Each stage returns its error to the caller instead of
//! exiting, so the binary and the tests decide how to react.

use crate::cli::DockhandConfig;
use crate::container::archive::BuildDefinition;
use crate::container::{
    BuildReport, ContainerEngine, ContainerSpec, ImageBuilder, LifecycleController, LogSinks,
    Result,
};
use std::sync::Arc;
use tokio::io::AsyncWrite;
use tracing::info;

/// Outcome of a completed pipeline run.
#[derive(Debug)]
pub struct PipelineReport {
    pub build: BuildReport,
    pub container_id: String,
}

/// Build-then-run pipeline over a container engine.
pub struct BuildPipeline {
    config: DockhandConfig,
    engine: Arc<dyn ContainerEngine>,
}

impl BuildPipeline {
    pub fn new(config: DockhandConfig, engine: Arc<dyn ContainerEngine>) -> Self {
        Self { config, engine }
    }

    /// Write `definition` to the configured path, then build and run it.
    ///
    /// An existing file at the definition path is overwritten.
    pub async fn run<O, E>(
        &self,
        definition: &str,
        sinks: &mut LogSinks<O, E>,
    ) -> Result<PipelineReport>
    where
        O: AsyncWrite + Unpin,
        E: AsyncWrite + Unpin,
    {
        let config = &self.config;

        BuildDefinition::write_literal(&config.definition_path, definition).await?;
        info!(
            "Wrote build definition to {}",
            config.definition_path.display()
        );

        let build = ImageBuilder::new(self.engine.clone())
            .with_timeout(config.operation_timeout())
            .with_compression(config.compress_context)
            .build(
                &config.definition_path,
                &config.definition_name,
                &config.image_tag,
                sinks,
            )
            .await?;

        let spec = ContainerSpec::builder()
            .image(&build.image_tag)
            .name(&config.container_name)
            .build()?;

        let container_id = LifecycleController::new(self.engine.clone())
            .with_cleanup(config.cleanup)
            .with_timeout(config.operation_timeout())
            .create_and_start(&spec)
            .await?;

        Ok(PipelineReport {
            build,
            container_id,
        })
    }
}
