//! # Dockhand
//!
//! Builds a container image from a generated Dockerfile, then creates and
//! starts a container from it. A minimal HTTP endpoint triggers container
//! creation on demand.
//!
//! The container engine daemon (Docker or Podman) does the real work: image
//! builds, layer storage and the container runtime. Dockhand packages the build
//! context, talks to the daemon's remote API and sequences the lifecycle.
//!
//! ## Architecture Overview
//!
//! - **[`container`]**: build context packaging, engine client, image builds,
//!   and the create-then-start lifecycle
//! - **[`pipeline`]**: the `dockhand build` flow as a result-returning pipeline
//! - **[`server`]**: the `GET /create-container` endpoint
//! - **[`cli`]**: argument parsing and configuration discovery
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dockhand::container::{ContainerClient, LogSinks};
//! use dockhand::{BuildPipeline, DockhandConfig, env};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = DockhandConfig::default();
//!     let engine = Arc::new(ContainerClient::connect(&config.engine).await?);
//!
//!     let pipeline = BuildPipeline::new(config, engine);
//!     let report = pipeline
//!         .run(env::build::DEFINITION_CONTENT, &mut LogSinks::stdio())
//!         .await?;
//!
//!     println!("Container {} started", report.container_id);
//!     Ok(())
//! }
//! ```

/// Container engine integration.
///
/// Packages build contexts, wraps the bollard client behind the
/// [`container::ContainerEngine`] capability, and sequences image builds and
/// container lifecycles.
pub mod container;

/// Build pipeline driving the `dockhand build` command.
pub mod pipeline;

/// HTTP endpoint for on-demand container creation.
pub mod server;

/// Environment constants and path utilities.
pub mod env;

// CLI module for command-line interface
pub mod cli;

pub use cli::DockhandConfig;
pub use container::{ContainerError, Result};
pub use pipeline::{BuildPipeline, PipelineReport};
