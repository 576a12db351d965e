//! Command line argument parsing
//!
//! Subcommands:
//! - `build` (default): write the build definition, build the image, create and start a container
//! - `serve`: run the HTTP endpoint
//! - `show-config`: show configuration discovery information

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "dockhand")]
#[command(author = "Dockhand Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Builds an image from a generated Dockerfile, then creates and starts a container from it"
)]
#[command(long_about = None)]
pub struct Args {
    /// Configuration file path (skips discovery)
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,
    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Write the build definition, build the image, then create and start the container
    Build,
    /// Serve `GET /create-container`
    Serve {
        /// Port to listen on (overrides the configuration)
        #[arg(short = 'p', long = "port")]
        port: Option<u16>,
    },
    /// Show configuration discovery information
    ShowConfig,
}

impl Args {
    /// The subcommand to run; a bare `dockhand` runs the build.
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Build)
    }
}
