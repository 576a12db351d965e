use anyhow::Context;
use clap::Parser;
use dockhand::cli::{Args, Commands, ConfigDiscovery};
use dockhand::container::{ContainerClient, DockerConnector, LogSinks};
use dockhand::server::{self, AppState};
use dockhand::{BuildPipeline, DockhandConfig, env};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_filter = if args.verbose {
        "dockhand=debug"
    } else {
        "dockhand=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    match args.command() {
        Commands::Build => {
            let config = ConfigDiscovery::load(args.config.as_deref())?;
            run_build(config).await
        }
        Commands::Serve { port } => {
            let mut config = ConfigDiscovery::load(args.config.as_deref())?;
            if let Some(port) = port {
                config.server.listen_port = port;
            }
            run_server(config).await
        }
        Commands::ShowConfig => {
            ConfigDiscovery::show_discovery_info();
            Ok(())
        }
    }
}

async fn run_build(config: DockhandConfig) -> anyhow::Result<()> {
    info!("Running build pipeline for image {}", config.image_tag);

    let client = ContainerClient::connect(&config.engine)
        .await
        .context("Initialize Docker client error")?;

    let pipeline = BuildPipeline::new(config, Arc::new(client));
    let report = pipeline
        .run(env::build::DEFINITION_CONTENT, &mut LogSinks::stdio())
        .await
        .context("Build pipeline failed")?;

    if let Some(log_error) = &report.build.log_error {
        eprintln!("Build log was not fully printed: {}", log_error);
    }
    if let Some(stream_error) = &report.build.stream_error {
        eprintln!("Build log stream ended early: {}", stream_error);
    }

    println!("Container {} started", report.container_id);
    Ok(())
}

async fn run_server(config: DockhandConfig) -> anyhow::Result<()> {
    let connector = Arc::new(DockerConnector::new(config.engine.clone()));
    let state = AppState::from_config(&config, connector).context("Invalid server configuration")?;

    server::serve(&config.server, state)
        .await
        .with_context(|| format!("Server on {} failed", config.server.bind_address()))
}
