//! Integration tests for the build pipeline against a stub engine.

use async_trait::async_trait;
use bytes::Bytes;
use dockhand::container::archive;
use dockhand::container::{
    BuildLog, BuildRequest, CleanupPolicy, ContainerEngine, ContainerError, ContainerSpec,
    LogSinks,
};
use dockhand::{BuildPipeline, DockhandConfig, Result};
use futures::stream::{self, BoxStream, StreamExt};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Which engine call the stub should fail.
#[derive(Clone, Copy, PartialEq)]
enum Failure {
    None,
    Build,
    BrokenLog,
    Create,
    Start,
}

/// Records every call and answers with canned results.
struct StubEngine {
    container_id: String,
    failure: Failure,
    logs: Vec<BuildLog>,
    calls: Mutex<Vec<String>>,
    builds: Mutex<Vec<BuildRequest>>,
    specs: Mutex<Vec<ContainerSpec>>,
}

impl StubEngine {
    fn new(container_id: &str, failure: Failure) -> Arc<Self> {
        Self::with_logs(container_id, failure, Vec::new())
    }

    fn with_logs(container_id: &str, failure: Failure, logs: Vec<BuildLog>) -> Arc<Self> {
        Arc::new(Self {
            container_id: container_id.to_string(),
            failure,
            logs,
            calls: Mutex::new(Vec::new()),
            builds: Mutex::new(Vec::new()),
            specs: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContainerEngine for StubEngine {
    fn build_image(&self, request: BuildRequest) -> BoxStream<'_, Result<BuildLog>> {
        self.calls.lock().unwrap().push("build".to_string());
        self.builds.lock().unwrap().push(request);

        let mut logs: Vec<Result<BuildLog>> = self.logs.iter().cloned().map(Ok).collect();
        if self.failure == Failure::Build {
            logs.push(Err(ContainerError::Build(
                "failed to solve: ubuntu:missing: not found".to_string(),
            )));
        }
        if self.failure == Failure::BrokenLog {
            logs.push(Err(ContainerError::LogStream(
                "error decoding response body".to_string(),
            )));
        }
        stream::iter(logs).boxed()
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        self.calls.lock().unwrap().push("create".to_string());
        self.specs.lock().unwrap().push(spec.clone());
        if self.failure == Failure::Create {
            return Err(ContainerError::Create("Conflict: name already in use".to_string()));
        }
        Ok(self.container_id.clone())
    }

    async fn start_container(&self, container_id: &str) -> Result<()> {
        self.calls.lock().unwrap().push(format!("start {}", container_id));
        if self.failure == Failure::Start {
            return Err(ContainerError::Start {
                container_id: container_id.to_string(),
                message: "OCI runtime create failed".to_string(),
            });
        }
        Ok(())
    }

    async fn remove_container(&self, container_id: &str) -> Result<()> {
        self.calls.lock().unwrap().push(format!("remove {}", container_id));
        Ok(())
    }
}

fn config_in(dir: &Path) -> DockhandConfig {
    DockhandConfig {
        image_tag: "test-image".to_string(),
        container_name: "test-container".to_string(),
        definition_path: dir.join("Dockerfile"),
        definition_name: "Dockerfile".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_end_to_end_with_stub_engine() {
    let temp_dir = TempDir::new().unwrap();
    let engine = StubEngine::new("abc123", Failure::None);
    let pipeline = BuildPipeline::new(config_in(temp_dir.path()), engine.clone());
    let mut sinks = LogSinks::new(Vec::new(), Vec::new());

    let report = pipeline.run("FROM scratch\n", &mut sinks).await.unwrap();

    assert_eq!(report.container_id, "abc123");
    assert_eq!(report.build.image_tag, "test-image");
    assert!(report.build.log_error.is_none());
    assert!(report.build.stream_error.is_none());
    assert_eq!(engine.calls(), vec!["build", "create", "start abc123"]);

    let builds = engine.builds.lock().unwrap();
    assert_eq!(builds[0].tag, "test-image");
    assert_eq!(builds[0].dockerfile, "Dockerfile");
    let entries = archive::unpack(&builds[0].context).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "Dockerfile");
    assert_eq!(entries[0].content, b"FROM scratch\n");

    let specs = engine.specs.lock().unwrap();
    assert_eq!(specs[0].image, "test-image");
    assert_eq!(specs[0].name.as_deref(), Some("test-container"));
    assert!(specs[0].cmd.is_none());
}

#[tokio::test]
async fn test_definition_file_is_overwritten() {
    let temp_dir = TempDir::new().unwrap();
    let definition_path = temp_dir.path().join("Dockerfile");
    std::fs::write(&definition_path, "FROM stale-image\nRUN old-steps\n").unwrap();

    let engine = StubEngine::new("abc123", Failure::None);
    let pipeline = BuildPipeline::new(config_in(temp_dir.path()), engine.clone());
    let mut sinks = LogSinks::new(Vec::new(), Vec::new());

    pipeline.run("FROM scratch\n", &mut sinks).await.unwrap();

    assert_eq!(std::fs::read_to_string(&definition_path).unwrap(), "FROM scratch\n");
    let builds = engine.builds.lock().unwrap();
    assert_eq!(archive::unpack(&builds[0].context).unwrap()[0].content, b"FROM scratch\n");
}

#[tokio::test]
async fn test_build_logs_reach_their_sinks() {
    let temp_dir = TempDir::new().unwrap();
    let engine = StubEngine::with_logs(
        "abc123",
        Failure::None,
        vec![
            BuildLog::StdOut(Bytes::from_static(b"Step 1/1 : FROM scratch\n")),
            BuildLog::StdErr(Bytes::from_static(b"Pulling from library/ubuntu\n")),
            BuildLog::StdOut(Bytes::from_static(b"Successfully tagged test-image:latest\n")),
        ],
    );
    let pipeline = BuildPipeline::new(config_in(temp_dir.path()), engine);
    let mut sinks = LogSinks::new(Vec::new(), Vec::new());

    pipeline.run("FROM scratch\n", &mut sinks).await.unwrap();

    assert_eq!(
        String::from_utf8(sinks.stdout).unwrap(),
        "Step 1/1 : FROM scratch\nSuccessfully tagged test-image:latest\n"
    );
    assert_eq!(
        String::from_utf8(sinks.stderr).unwrap(),
        "Pulling from library/ubuntu\n"
    );
}

#[tokio::test]
async fn test_build_failure_creates_no_container() {
    let temp_dir = TempDir::new().unwrap();
    let engine = StubEngine::new("abc123", Failure::Build);
    let pipeline = BuildPipeline::new(config_in(temp_dir.path()), engine.clone());
    let mut sinks = LogSinks::new(Vec::new(), Vec::new());

    let err = pipeline.run("FROM ubuntu:missing\n", &mut sinks).await.unwrap_err();

    assert!(matches!(err, ContainerError::Build(_)));
    assert_eq!(engine.calls(), vec!["build"]);
}

#[tokio::test]
async fn test_broken_log_stream_still_runs_container() {
    let temp_dir = TempDir::new().unwrap();
    let engine = StubEngine::with_logs(
        "abc123",
        Failure::BrokenLog,
        vec![BuildLog::StdOut(Bytes::from_static(b"Successfully built abc\n"))],
    );
    let pipeline = BuildPipeline::new(config_in(temp_dir.path()), engine.clone());
    let mut sinks = LogSinks::new(Vec::new(), Vec::new());

    let report = pipeline.run("FROM scratch\n", &mut sinks).await.unwrap();

    assert_eq!(report.container_id, "abc123");
    assert_eq!(
        report.build.stream_error.as_deref(),
        Some("error decoding response body")
    );
    assert_eq!(engine.calls(), vec!["build", "create", "start abc123"]);
    assert_eq!(sinks.stdout, b"Successfully built abc\n");
}

#[tokio::test]
async fn test_broken_log_stream_before_any_output_fails_build() {
    let temp_dir = TempDir::new().unwrap();
    let engine = StubEngine::new("abc123", Failure::BrokenLog);
    let pipeline = BuildPipeline::new(config_in(temp_dir.path()), engine.clone());
    let mut sinks = LogSinks::new(Vec::new(), Vec::new());

    let err = pipeline.run("FROM scratch\n", &mut sinks).await.unwrap_err();

    assert!(matches!(err, ContainerError::Build(_)));
    assert_eq!(engine.calls(), vec!["build"]);
}

#[tokio::test]
async fn test_unwritable_definition_path_fails_before_build() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = config_in(temp_dir.path());
    config.definition_path = temp_dir.path().join("missing-dir").join("Dockerfile");

    let engine = StubEngine::new("abc123", Failure::None);
    let pipeline = BuildPipeline::new(config, engine.clone());
    let mut sinks = LogSinks::new(Vec::new(), Vec::new());

    let err = pipeline.run("FROM scratch\n", &mut sinks).await.unwrap_err();

    assert!(matches!(err, ContainerError::Io(_)));
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn test_create_failure_never_starts() {
    let temp_dir = TempDir::new().unwrap();
    let engine = StubEngine::new("abc123", Failure::Create);
    let pipeline = BuildPipeline::new(config_in(temp_dir.path()), engine.clone());
    let mut sinks = LogSinks::new(Vec::new(), Vec::new());

    let err = pipeline.run("FROM scratch\n", &mut sinks).await.unwrap_err();

    assert!(matches!(err, ContainerError::Create(_)));
    assert_eq!(engine.calls(), vec!["build", "create"]);
}

#[tokio::test]
async fn test_start_failure_with_cleanup_policy() {
    let temp_dir = TempDir::new().unwrap();
    let config = DockhandConfig {
        cleanup: CleanupPolicy::RemoveOnStartFailure,
        ..config_in(temp_dir.path())
    };
    let engine = StubEngine::new("abc123", Failure::Start);
    let pipeline = BuildPipeline::new(config, engine.clone());
    let mut sinks = LogSinks::new(Vec::new(), Vec::new());

    let err = pipeline.run("FROM scratch\n", &mut sinks).await.unwrap_err();

    match err {
        ContainerError::Start { container_id, .. } => assert_eq!(container_id, "abc123"),
        other => panic!("expected start error, got {:?}", other),
    }
    assert_eq!(
        engine.calls(),
        vec!["build", "create", "start abc123", "remove abc123"]
    );
}
