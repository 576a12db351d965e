//! Environment constants and path utilities.
//!
//! This module centralizes the default names, literals and configuration
//! paths used throughout the application.

use std::path::{Path, PathBuf};

/// Hidden application directory name
pub const DOCKHAND_DIR_NAME: &str = ".dockhand";

/// Configuration file name inside the application directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration file name looked up in the current directory
pub const LOCAL_CONFIG_FILE_NAME: &str = "dockhand.toml";

/// Build defaults used by `dockhand build`
pub mod build {
    /// Tag of the image built from the generated definition
    pub const DEFAULT_IMAGE_TAG: &str = "my-ubuntu-image";

    /// Name of the container started from the built image
    pub const DEFAULT_CONTAINER_NAME: &str = "ASANO";

    /// Where the generated definition is written
    pub const DEFAULT_DEFINITION_PATH: &str = "Dockerfile";

    /// Name of the definition inside the build context
    pub const DEFAULT_DEFINITION_NAME: &str = "Dockerfile";

    /// Build definition written before every build
    pub const DEFINITION_CONTENT: &str = "\nFROM ubuntu:latest\n# Additional setup or install commands\n";
}

/// HTTP endpoint defaults used by `dockhand serve`
pub mod server {
    pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0";

    pub const DEFAULT_LISTEN_PORT: u16 = 8080;

    /// Image every `GET /create-container` starts
    pub const DEFAULT_IMAGE: &str = "ubuntu:latest";

    /// Command every `GET /create-container` runs
    pub const DEFAULT_COMMAND: &[&str] = &["echo", "hello world"];

    pub const CREATE_CONTAINER_ROUTE: &str = "/create-container";
}

/// Build config directory path in user's home directory
pub fn user_config_dir_path(home_dir: &Path) -> PathBuf {
    home_dir.join(DOCKHAND_DIR_NAME)
}

/// Build config file path in user's home directory
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    user_config_dir_path(home_dir).join(CONFIG_FILE_NAME)
}

/// Build local config file path in current directory
pub fn local_config_file_path(current_dir: &Path) -> PathBuf {
    current_dir.join(DOCKHAND_DIR_NAME).join(CONFIG_FILE_NAME)
}
