//! Create-then-start container lifecycle.
//!
//! A container moves through `Uncreated → Created → Running`. A failed create
//! ends in `CreateFailed` and no start is attempted; a failed start ends in
//! `StartFailed`, where the [`CleanupPolicy`] decides whether the created
//! container is left behind or removed.

use crate::container::{ContainerEngine, ContainerError, ContainerSpec, Result, with_deadline};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What to do with a container whose start failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CleanupPolicy {
    /// Leave the container in the engine's "created" state
    #[default]
    Keep,
    /// Best-effort forced removal of the container
    RemoveOnStartFailure,
}

/// Lifecycle states observed by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleState {
    Uncreated,
    Created(String),
    Running(String),
    CreateFailed,
    StartFailed(String),
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Uncreated => write!(f, "uncreated"),
            LifecycleState::Created(id) => write!(f, "created({})", short_id(id)),
            LifecycleState::Running(id) => write!(f, "running({})", short_id(id)),
            LifecycleState::CreateFailed => write!(f, "create-failed"),
            LifecycleState::StartFailed(id) => write!(f, "start-failed({})", short_id(id)),
        }
    }
}

fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

/// Sequences container creation and start against an engine.
///
/// The controller keeps no state between calls; every call creates a new
/// container.
pub struct LifecycleController {
    engine: Arc<dyn ContainerEngine>,
    cleanup: CleanupPolicy,
    timeout: Option<Duration>,
}

impl LifecycleController {
    /// Create a controller with [`CleanupPolicy::Keep`] and no deadline.
    pub fn new(engine: Arc<dyn ContainerEngine>) -> Self {
        Self {
            engine,
            cleanup: CleanupPolicy::default(),
            timeout: None,
        }
    }

    pub fn with_cleanup(mut self, cleanup: CleanupPolicy) -> Self {
        self.cleanup = cleanup;
        self
    }

    /// Bound each engine call (create, start, remove) by `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create a container from `spec`, then start it.
    ///
    /// # Returns
    ///
    /// The engine-assigned container ID.
    ///
    /// # Errors
    ///
    /// - [`ContainerError::Create`] if creation fails; start is never issued
    /// - [`ContainerError::Start`] if start fails or exceeds the deadline,
    ///   carrying the ID returned by create
    /// - [`ContainerError::Timeout`] if create exceeds the deadline
    pub async fn create_and_start(&self, spec: &ContainerSpec) -> Result<String> {
        let mut state = LifecycleState::Uncreated;
        debug!("Container lifecycle for image {}: {}", spec.image, state);

        let container_id = match with_deadline(
            "create",
            self.timeout,
            self.engine.create_container(spec),
        )
        .await
        {
            Ok(id) => id,
            Err(e) => {
                state = LifecycleState::CreateFailed;
                debug!("Container lifecycle for image {}: {}", spec.image, state);
                return Err(e);
            }
        };

        state = LifecycleState::Created(container_id.clone());
        info!(
            "Created container {} from {}",
            short_id(&container_id),
            spec.image
        );
        debug!("Container lifecycle for image {}: {}", spec.image, state);

        let started = with_deadline(
            "start",
            self.timeout,
            self.engine.start_container(&container_id),
        )
        .await;

        if let Err(e) = started {
            state = LifecycleState::StartFailed(container_id.clone());
            debug!("Container lifecycle for image {}: {}", spec.image, state);
            self.cleanup_after_failed_start(&container_id).await;

            return Err(match e {
                ContainerError::Start { message, .. } => ContainerError::Start {
                    container_id,
                    message,
                },
                other => ContainerError::Start {
                    container_id,
                    message: other.to_string(),
                },
            });
        }

        state = LifecycleState::Running(container_id.clone());
        info!("Started container: {}", container_id);
        debug!("Container lifecycle for image {}: {}", spec.image, state);

        Ok(container_id)
    }

    async fn cleanup_after_failed_start(&self, container_id: &str) {
        match self.cleanup {
            CleanupPolicy::Keep => {
                warn!(
                    "Container {} was created but not started; leaving it in place",
                    short_id(container_id)
                );
            }
            CleanupPolicy::RemoveOnStartFailure => {
                match with_deadline(
                    "remove",
                    self.timeout,
                    self.engine.remove_container(container_id),
                )
                .await
                {
                    Ok(()) => info!(
                        "Removed container {} after failed start",
                        short_id(container_id)
                    ),
                    Err(e) => warn!(
                        "Failed to remove container {} after failed start: {}",
                        short_id(container_id),
                        e
                    ),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{BuildLog, BuildRequest};
    use async_trait::async_trait;
    use futures::stream::{self, BoxStream, StreamExt};
    use std::sync::Mutex;

    /// Engine stub recording every lifecycle call.
    #[derive(Default)]
    struct StubEngine {
        create_result: Option<std::result::Result<String, String>>,
        start_fails: bool,
        start_delay: Option<Duration>,
        remove_fails: bool,
        start_calls: Mutex<Vec<String>>,
        remove_calls: Mutex<Vec<String>>,
        created_specs: Mutex<Vec<ContainerSpec>>,
    }

    impl StubEngine {
        fn creating(id: &str) -> Self {
            Self {
                create_result: Some(Ok(id.to_string())),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl ContainerEngine for StubEngine {
        fn build_image(&self, _request: BuildRequest) -> BoxStream<'_, Result<BuildLog>> {
            stream::empty().boxed()
        }

        async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
            self.created_specs.lock().unwrap().push(spec.clone());
            match self.create_result.clone() {
                Some(Ok(id)) => Ok(id),
                Some(Err(message)) => Err(ContainerError::Create(message)),
                None => Err(ContainerError::Create("no stub configured".to_string())),
            }
        }

        async fn start_container(&self, container_id: &str) -> Result<()> {
            self.start_calls.lock().unwrap().push(container_id.to_string());
            if let Some(delay) = self.start_delay {
                tokio::time::sleep(delay).await;
            }
            if self.start_fails {
                Err(ContainerError::Start {
                    container_id: "engine-reported".to_string(),
                    message: "port is already allocated".to_string(),
                })
            } else {
                Ok(())
            }
        }

        async fn remove_container(&self, container_id: &str) -> Result<()> {
            self.remove_calls.lock().unwrap().push(container_id.to_string());
            if self.remove_fails {
                Err(ContainerError::Config("remove refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn spec() -> ContainerSpec {
        ContainerSpec::builder()
            .image("my-ubuntu-image")
            .name("ASANO")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_start_returns_created_id() {
        let engine = Arc::new(StubEngine::creating("abc123"));
        let controller = LifecycleController::new(engine.clone());

        let id = controller.create_and_start(&spec()).await.unwrap();

        assert_eq!(id, "abc123");
        assert_eq!(*engine.start_calls.lock().unwrap(), vec!["abc123".to_string()]);
        let specs = engine.created_specs.lock().unwrap();
        assert_eq!(specs[0].image, "my-ubuntu-image");
        assert_eq!(specs[0].name.as_deref(), Some("ASANO"));
    }

    #[tokio::test]
    async fn test_create_failure_never_starts() {
        let engine = Arc::new(StubEngine {
            create_result: Some(Err("No such image: my-ubuntu-image".to_string())),
            ..Default::default()
        });
        let controller = LifecycleController::new(engine.clone());

        let err = controller.create_and_start(&spec()).await.unwrap_err();

        assert!(matches!(err, ContainerError::Create(_)));
        assert!(engine.start_calls.lock().unwrap().is_empty());
        assert!(engine.remove_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_start_failure_keeps_created_id() {
        let engine = Arc::new(StubEngine {
            start_fails: true,
            ..StubEngine::creating("abc123")
        });
        let controller = LifecycleController::new(engine.clone());

        let err = controller.create_and_start(&spec()).await.unwrap_err();

        match err {
            ContainerError::Start {
                container_id,
                message,
            } => {
                assert_eq!(container_id, "abc123");
                assert_eq!(message, "port is already allocated");
            }
            other => panic!("expected start error, got {:?}", other),
        }
        assert_eq!(*engine.start_calls.lock().unwrap(), vec!["abc123".to_string()]);
        // default policy leaves the container behind
        assert!(engine.remove_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_on_start_failure() {
        let engine = Arc::new(StubEngine {
            start_fails: true,
            ..StubEngine::creating("abc123")
        });
        let controller = LifecycleController::new(engine.clone())
            .with_cleanup(CleanupPolicy::RemoveOnStartFailure);

        let err = controller.create_and_start(&spec()).await.unwrap_err();

        assert!(matches!(err, ContainerError::Start { ref container_id, .. } if container_id == "abc123"));
        assert_eq!(*engine.remove_calls.lock().unwrap(), vec!["abc123".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_cleanup_still_reports_start_error() {
        let engine = Arc::new(StubEngine {
            start_fails: true,
            remove_fails: true,
            ..StubEngine::creating("abc123")
        });
        let controller = LifecycleController::new(engine.clone())
            .with_cleanup(CleanupPolicy::RemoveOnStartFailure);

        let err = controller.create_and_start(&spec()).await.unwrap_err();
        assert!(matches!(err, ContainerError::Start { .. }));
    }

    #[tokio::test]
    async fn test_start_timeout_keeps_created_id() {
        let engine = Arc::new(StubEngine {
            start_delay: Some(Duration::from_secs(5)),
            ..StubEngine::creating("abc123")
        });
        let controller = LifecycleController::new(engine.clone())
            .with_cleanup(CleanupPolicy::RemoveOnStartFailure)
            .with_timeout(Some(Duration::from_millis(20)));

        let err = controller.create_and_start(&spec()).await.unwrap_err();

        match err {
            ContainerError::Start {
                container_id,
                message,
            } => {
                assert_eq!(container_id, "abc123");
                assert!(message.contains("timed out"), "{}", message);
            }
            other => panic!("expected start error, got {:?}", other),
        }
        assert_eq!(*engine.remove_calls.lock().unwrap(), vec!["abc123".to_string()]);
    }

    #[tokio::test]
    async fn test_create_timeout_is_timeout() {
        struct SlowCreate;

        #[async_trait]
        impl ContainerEngine for SlowCreate {
            fn build_image(&self, _request: BuildRequest) -> BoxStream<'_, Result<BuildLog>> {
                stream::empty().boxed()
            }

            async fn create_container(&self, _spec: &ContainerSpec) -> Result<String> {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok("late".to_string())
            }

            async fn start_container(&self, _container_id: &str) -> Result<()> {
                unreachable!("start after a timed out create")
            }

            async fn remove_container(&self, _container_id: &str) -> Result<()> {
                Ok(())
            }
        }

        let controller = LifecycleController::new(Arc::new(SlowCreate))
            .with_timeout(Some(Duration::from_millis(20)));

        let err = controller.create_and_start(&spec()).await.unwrap_err();
        assert!(matches!(err, ContainerError::Timeout { operation: "create", .. }));
    }

    #[tokio::test]
    async fn test_calls_are_independent() {
        let engine = Arc::new(StubEngine::creating("abc123"));
        let controller = LifecycleController::new(engine.clone());

        controller.create_and_start(&spec()).await.unwrap();
        controller.create_and_start(&spec()).await.unwrap();

        assert_eq!(engine.created_specs.lock().unwrap().len(), 2);
        assert_eq!(engine.start_calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(LifecycleState::Uncreated.to_string(), "uncreated");
        assert_eq!(
            LifecycleState::Running("0123456789abcdef".to_string()).to_string(),
            "running(0123456789ab)"
        );
    }

    #[test]
    fn test_cleanup_policy_serde() {
        #[derive(Deserialize)]
        struct Wrapper {
            cleanup: CleanupPolicy,
        }

        let parsed: Wrapper = toml::from_str("cleanup = \"remove-on-start-failure\"").unwrap();
        assert_eq!(parsed.cleanup, CleanupPolicy::RemoveOnStartFailure);
    }
}
