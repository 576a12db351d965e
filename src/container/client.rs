//! Docker/Podman client wrapper.
//!
//! Resolves connection parameters once, negotiates the API version with the
//! daemon and exposes the [`ContainerEngine`] operations on top of bollard.

use crate::container::{
    BuildLog, BuildRequest, ContainerEngine, ContainerError, ContainerSpec, EngineConnector,
    Result,
};
use async_trait::async_trait;
use bollard::models::{BuildInfo, ContainerCreateBody};
use bollard::query_parameters::{
    BuildImageOptionsBuilder, CreateContainerOptionsBuilder, RemoveContainerOptionsBuilder,
    StartContainerOptions,
};
use bollard::{ClientVersion, Docker};
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use http_body_util::{Either, Full};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Engine connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Daemon address (`unix://`, `tcp://`, `http://`, `https://`).
    /// Falls back to `DOCKER_HOST` and the platform defaults when unset.
    pub host: Option<String>,
    /// Pinned API version such as `"1.43"`; negotiated with the daemon when unset
    pub api_version: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Client certificate for TLS connections
    pub tls_cert: Option<PathBuf>,
    /// Client key for TLS connections
    pub tls_key: Option<PathBuf>,
    /// CA certificate for TLS connections
    pub tls_ca: Option<PathBuf>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            host: None,
            api_version: None,
            timeout_secs: 120,
            tls_cert: None,
            tls_key: None,
            tls_ca: None,
        }
    }
}

impl EngineSettings {
    fn uses_tls(&self) -> bool {
        self.tls_cert.is_some() || self.tls_key.is_some() || self.tls_ca.is_some()
    }

    /// Parse the pinned API version, if any.
    pub fn pinned_version(&self) -> Result<Option<ClientVersion>> {
        self.api_version
            .as_deref()
            .map(parse_api_version)
            .transpose()
    }
}

/// Docker/Podman API client wrapper.
#[derive(Clone)]
pub struct ContainerClient {
    docker: Docker,
}

impl ContainerClient {
    /// Connect to the daemon described by `settings`.
    ///
    /// Unless an API version is pinned, the highest version supported by both
    /// sides is negotiated before the connection is verified with a ping.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Connection`] if the daemon is unreachable,
    /// the settings are invalid or version negotiation fails.
    pub async fn connect(settings: &EngineSettings) -> Result<Self> {
        let pinned = settings.pinned_version()?;
        let docker = Self::open(settings, pinned.as_ref())?;

        let docker = match pinned {
            Some(version) => {
                debug!(
                    "Using pinned API version {}.{}",
                    version.major_version, version.minor_version
                );
                docker
            }
            None => docker.negotiate_version().await.map_err(|e| {
                ContainerError::Connection(format!("API version negotiation failed: {}", e))
            })?,
        };

        let client = Self { docker };
        client.ping().await?;

        let version = client.docker.client_version();
        info!(
            "Connected to container engine (API {}.{})",
            version.major_version, version.minor_version
        );

        Ok(client)
    }

    fn open(settings: &EngineSettings, pinned: Option<&ClientVersion>) -> Result<Docker> {
        let version = pinned.unwrap_or(bollard::API_DEFAULT_VERSION);
        let timeout = settings.timeout_secs;
        let connection_error =
            |e: bollard::errors::Error| ContainerError::Connection(e.to_string());

        let Some(host) = settings.host.as_deref() else {
            debug!("No engine host configured, using environment defaults");
            let docker = Docker::connect_with_defaults().map_err(connection_error)?;
            return Ok(docker.with_timeout(Duration::from_secs(timeout)));
        };

        let url = Url::parse(host).map_err(|e| {
            ContainerError::Connection(format!("invalid engine host '{}': {}", host, e))
        })?;
        debug!("Connecting to container engine at {}", host);

        match url.scheme() {
            "unix" => Docker::connect_with_socket(host, timeout, version).map_err(connection_error),
            "tcp" | "http" | "https" if settings.uses_tls() => {
                Self::open_tls(host, settings, timeout, version)
            }
            "tcp" | "http" => {
                Docker::connect_with_http(host, timeout, version).map_err(connection_error)
            }
            "https" => Err(ContainerError::Connection(
                "https engine host requires tls_cert, tls_key and tls_ca".to_string(),
            )),
            other => Err(ContainerError::Connection(format!(
                "unsupported engine host scheme '{}'",
                other
            ))),
        }
    }

    #[cfg(feature = "tls")]
    fn open_tls(
        host: &str,
        settings: &EngineSettings,
        timeout: u64,
        version: &ClientVersion,
    ) -> Result<Docker> {
        let (Some(key), Some(cert), Some(ca)) = (
            settings.tls_key.as_deref(),
            settings.tls_cert.as_deref(),
            settings.tls_ca.as_deref(),
        ) else {
            return Err(ContainerError::Connection(
                "TLS requires tls_cert, tls_key and tls_ca".to_string(),
            ));
        };

        Docker::connect_with_ssl(host, key, cert, ca, timeout, version)
            .map_err(|e| ContainerError::Connection(e.to_string()))
    }

    #[cfg(not(feature = "tls"))]
    fn open_tls(
        _host: &str,
        _settings: &EngineSettings,
        _timeout: u64,
        _version: &ClientVersion,
    ) -> Result<Docker> {
        Err(ContainerError::Connection(
            "TLS settings given but dockhand was built without the `tls` feature".to_string(),
        ))
    }

    /// Ping the container runtime to verify connectivity.
    ///
    /// # Errors
    ///
    /// Returns error if ping fails.
    pub async fn ping(&self) -> Result<()> {
        self.docker.ping().await.map_err(|e| {
            ContainerError::Connection(format!("Failed to ping container runtime: {}", e))
        })?;
        debug!("Container runtime ping successful");
        Ok(())
    }
}

#[async_trait]
impl ContainerEngine for ContainerClient {
    fn build_image(&self, request: BuildRequest) -> BoxStream<'_, Result<BuildLog>> {
        let options = BuildImageOptionsBuilder::default()
            .dockerfile(&request.dockerfile)
            .t(&request.tag)
            .rm(true)
            .forcerm(true)
            .build();

        debug!(
            "Submitting build of '{}' ({} byte context)",
            request.tag,
            request.context.len()
        );

        let body = Full::new(Bytes::from(request.context));
        self.docker
            .build_image(options, None, Some(Either::Left(body)))
            .flat_map(|item| stream::iter(demux_build_info(item)))
            .boxed()
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        let options = spec
            .name()
            .map(|name| CreateContainerOptionsBuilder::default().name(name).build());

        let body = ContainerCreateBody {
            image: Some(spec.image.clone()),
            cmd: spec.cmd.clone(),
            ..Default::default()
        };

        let response = self
            .docker
            .create_container(options, body)
            .await
            .map_err(|e| ContainerError::Create(e.to_string()))?;

        for warning in &response.warnings {
            warn!("Engine warning for container {}: {}", response.id, warning);
        }

        Ok(response.id)
    }

    async fn start_container(&self, container_id: &str) -> Result<()> {
        self.docker
            .start_container(container_id, None::<StartContainerOptions>)
            .await
            .map_err(|e| ContainerError::Start {
                container_id: container_id.to_string(),
                message: e.to_string(),
            })
    }

    async fn remove_container(&self, container_id: &str) -> Result<()> {
        let options = RemoveContainerOptionsBuilder::default()
            .force(true)
            .v(true)
            .build();

        self.docker
            .remove_container(container_id, Some(options))
            .await?;
        Ok(())
    }
}

/// Split one decoded build message into log channels.
fn demux_build_info(
    item: std::result::Result<BuildInfo, bollard::errors::Error>,
) -> Vec<Result<BuildLog>> {
    let info = match item {
        Ok(info) => info,
        Err(e) => return vec![Err(ContainerError::LogStream(e.to_string()))],
    };

    if let Some(message) = info.error_detail.and_then(|detail| detail.message) {
        return vec![Err(ContainerError::Build(message))];
    }
    if let Some(error) = info.error {
        return vec![Err(ContainerError::Build(error))];
    }

    let mut logs = Vec::new();
    if let Some(output) = info.stream {
        logs.push(Ok(BuildLog::StdOut(Bytes::from(output))));
    }
    if let Some(status) = info.status {
        logs.push(Ok(BuildLog::StdErr(Bytes::from(format!("{}\n", status)))));
    }
    logs
}

/// Parse an API version pin such as `"1.43"` or `"v1.43"`.
fn parse_api_version(raw: &str) -> Result<ClientVersion> {
    let invalid = || ContainerError::Connection(format!("invalid API version '{}'", raw));

    let (major, minor) = raw
        .trim()
        .trim_start_matches('v')
        .split_once('.')
        .ok_or_else(invalid)?;

    Ok(ClientVersion {
        major_version: major.parse().map_err(|_| invalid())?,
        minor_version: minor.parse().map_err(|_| invalid())?,
    })
}

/// Opens a new [`ContainerClient`] for every call.
#[derive(Debug, Clone, Default)]
pub struct DockerConnector {
    settings: EngineSettings,
}

impl DockerConnector {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl EngineConnector for DockerConnector {
    async fn connect(&self) -> Result<Arc<dyn ContainerEngine>> {
        let client = ContainerClient::connect(&self.settings).await?;
        Ok(Arc::new(client))
    }
}
