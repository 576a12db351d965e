//! Container configuration builder.
//!
//! Provides a fluent API for describing the container to create: the image
//! reference plus the optional command and name.

use crate::container::{ContainerError, Result};

/// Container specification builder.
#[derive(Debug, Default)]
pub struct ContainerSpecBuilder {
    image: Option<String>,
    cmd: Option<Vec<String>>,
    name: Option<String>,
}

impl ContainerSpecBuilder {
    /// Create a new container specification builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the image reference.
    pub fn image<S: Into<String>>(mut self, image: S) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Set the command to run in the container.
    pub fn cmd<I, S>(mut self, cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cmd = Some(cmd.into_iter().map(|s| s.into()).collect());
        self
    }

    /// Set the container name (engine-generated if unset).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Build the container specification.
    ///
    /// # Errors
    ///
    /// Returns error if the image is missing or empty, or the command is empty.
    pub fn build(self) -> Result<ContainerSpec> {
        let image = self
            .image
            .filter(|image| !image.trim().is_empty())
            .ok_or_else(|| ContainerError::Config("Image is required".to_string()))?;

        if matches!(self.cmd, Some(ref cmd) if cmd.is_empty()) {
            return Err(ContainerError::Config(
                "Command must not be empty when set".to_string(),
            ));
        }

        Ok(ContainerSpec {
            image,
            cmd: self.cmd,
            name: self.name.filter(|name| !name.is_empty()),
        })
    }
}

/// What to ask the engine to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Image reference
    pub image: String,
    /// Command to run
    pub cmd: Option<Vec<String>>,
    /// Container name
    pub name: Option<String>,
}

impl ContainerSpec {
    /// Create a new specification builder.
    pub fn builder() -> ContainerSpecBuilder {
        ContainerSpecBuilder::new()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}
