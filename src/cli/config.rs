//! Configuration discovery and loading
//!
//! This module handles the configuration discovery hierarchy:
//! 1. Current directory: ./dockhand.toml or ./.dockhand/config.toml
//! 2. User config: ~/.dockhand/config.toml
//! 3. System config: /etc/dockhand/config.toml
//! 4. Built-in defaults

use crate::container::{CleanupPolicy, EngineSettings};
use crate::env;
use crate::server::ServerSettings;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env as std_env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Everything the build pipeline and the HTTP endpoint need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockhandConfig {
    /// Tag of the image built by `dockhand build`
    pub image_tag: String,
    /// Name of the container started by `dockhand build`
    pub container_name: String,
    /// Where the build definition is written and read back
    pub definition_path: PathBuf,
    /// Name of the definition inside the build context
    pub definition_name: String,
    /// What to do with a container that was created but failed to start
    pub cleanup: CleanupPolicy,
    /// Deadline for each engine operation, in seconds
    pub operation_timeout_secs: Option<u64>,
    /// Upload the build context gzip-compressed
    pub compress_context: bool,
    pub server: ServerSettings,
    pub engine: EngineSettings,
}

impl Default for DockhandConfig {
    fn default() -> Self {
        Self {
            image_tag: env::build::DEFAULT_IMAGE_TAG.to_string(),
            container_name: env::build::DEFAULT_CONTAINER_NAME.to_string(),
            definition_path: PathBuf::from(env::build::DEFAULT_DEFINITION_PATH),
            definition_name: env::build::DEFAULT_DEFINITION_NAME.to_string(),
            cleanup: CleanupPolicy::default(),
            operation_timeout_secs: None,
            compress_context: false,
            server: ServerSettings::default(),
            engine: EngineSettings::default(),
        }
    }
}

impl DockhandConfig {
    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_secs.map(Duration::from_secs)
    }

    /// Load from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: DockhandConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Save to TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Configuration discovery system
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Load `override_path` if given, otherwise discover using the hierarchy
    pub fn load(override_path: Option<&Path>) -> anyhow::Result<DockhandConfig> {
        match override_path {
            Some(path) => {
                info!("Loading configuration override from: {:?}", path);
                DockhandConfig::from_toml_file(path)
            }
            None => Self::discover_config(),
        }
    }

    /// Discover and load configuration using the hierarchy
    pub fn discover_config() -> anyhow::Result<DockhandConfig> {
        if let Some(config_path) = Self::find_config_file() {
            info!("Loading configuration from: {:?}", config_path);
            return DockhandConfig::from_toml_file(config_path);
        }

        info!("No configuration file found, using defaults");
        Ok(DockhandConfig::default())
    }

    /// Find configuration file using discovery hierarchy
    pub fn find_config_file() -> Option<PathBuf> {
        Self::get_config_candidates()
            .into_iter()
            .inspect(|candidate| debug!("Checking for config file: {:?}", candidate))
            .find(|candidate| candidate.is_file())
    }

    /// Get list of configuration file candidates in priority order
    fn get_config_candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Ok(current_dir) = std_env::current_dir() {
            candidates.push(current_dir.join(env::LOCAL_CONFIG_FILE_NAME));
            candidates.push(env::local_config_file_path(&current_dir));
        }

        if let Some(home_dir) = Self::get_home_dir() {
            candidates.push(env::user_config_file_path(&home_dir));
        }

        #[cfg(unix)]
        candidates.push(PathBuf::from("/etc/dockhand/config.toml"));

        #[cfg(windows)]
        if let Ok(program_data) = std_env::var("PROGRAMDATA") {
            candidates.push(
                PathBuf::from(program_data)
                    .join("dockhand")
                    .join(env::CONFIG_FILE_NAME),
            );
        }

        candidates
    }

    fn get_home_dir() -> Option<PathBuf> {
        std_env::var("HOME")
            .ok()
            .or_else(|| std_env::var("USERPROFILE").ok())
            .map(PathBuf::from)
    }

    /// Show configuration discovery information for debugging
    pub fn show_discovery_info() {
        println!("Configuration Discovery Hierarchy:");
        println!();

        for (i, candidate) in Self::get_config_candidates().iter().enumerate() {
            let status = if candidate.is_file() {
                "✓ EXISTS"
            } else if candidate.exists() {
                "✗ NOT A FILE"
            } else {
                "✗ NOT FOUND"
            };

            println!("  {}. {:?} - {}", i + 1, candidate, status);
        }

        println!();
        match Self::find_config_file() {
            Some(found) => println!("Active configuration: {:?}", found),
            None => println!("Active configuration: Built-in defaults"),
        }
    }
}
