//! Build log demultiplexing.
//!
//! Forwards each [`BuildLog`] message to the sink of its channel until the
//! engine's stream is exhausted.

use crate::container::{BuildLog, ContainerError, Result};
use futures::stream::{Stream, StreamExt};
use std::io;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::warn;

/// Destination pair for the two build log channels.
#[derive(Debug)]
pub struct LogSinks<O, E> {
    pub stdout: O,
    pub stderr: E,
}

/// Sinks writing to the process's own stdout and stderr.
pub type StdioSinks = LogSinks<tokio::io::Stdout, tokio::io::Stderr>;

impl StdioSinks {
    pub fn stdio() -> Self {
        LogSinks {
            stdout: tokio::io::stdout(),
            stderr: tokio::io::stderr(),
        }
    }
}

impl<O, E> LogSinks<O, E>
where
    O: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    pub fn new(stdout: O, stderr: E) -> Self {
        Self { stdout, stderr }
    }

    async fn write(&mut self, log: &BuildLog) -> io::Result<()> {
        match log {
            BuildLog::StdOut(bytes) => self.stdout.write_all(bytes).await,
            BuildLog::StdErr(bytes) => self.stderr.write_all(bytes).await,
        }
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.stdout.flush().await?;
        self.stderr.flush().await
    }
}

/// What happened while draining a log stream.
#[derive(Debug, Default)]
pub(crate) struct DrainOutcome {
    pub stdout_bytes: u64,
    pub stderr_bytes: u64,
    /// Messages received from the engine
    pub messages: u64,
    /// First sink failure; the stream is still drained to the end after it.
    pub sink_error: Option<io::Error>,
    /// Transport or decode failure after the build started.
    pub stream_error: Option<String>,
}

/// Drain `logs` into `sinks`.
///
/// A daemon-reported build failure ends draining and is returned. A broken log
/// stream ([`ContainerError::LogStream`]) is a [`ContainerError::Build`] while
/// nothing has been received yet; once the build has started it is recorded
/// in the outcome and draining stops. A sink write failure only stops
/// forwarding; the rest of the stream is still consumed so the engine can
/// finish its work.
pub(crate) async fn drain<S, O, E>(logs: S, sinks: &mut LogSinks<O, E>) -> Result<DrainOutcome>
where
    S: Stream<Item = Result<BuildLog>>,
    O: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    let mut logs = std::pin::pin!(logs);
    let mut outcome = DrainOutcome::default();

    while let Some(log) = logs.next().await {
        let log = match log {
            Ok(log) => log,
            Err(ContainerError::LogStream(message)) if outcome.messages > 0 => {
                warn!(
                    "Build log stream broke after {} messages: {}",
                    outcome.messages, message
                );
                outcome.stream_error = Some(message);
                break;
            }
            Err(ContainerError::LogStream(message)) => return Err(ContainerError::Build(message)),
            Err(e) => return Err(e),
        };
        outcome.messages += 1;

        if outcome.sink_error.is_some() {
            continue;
        }

        match sinks.write(&log).await {
            Ok(()) => match &log {
                BuildLog::StdOut(bytes) => outcome.stdout_bytes += bytes.len() as u64,
                BuildLog::StdErr(bytes) => outcome.stderr_bytes += bytes.len() as u64,
            },
            Err(e) => {
                warn!("Failed to forward build log, discarding the rest: {}", e);
                outcome.sink_error = Some(e);
            }
        }
    }

    if outcome.sink_error.is_none() {
        if let Err(e) = sinks.flush().await {
            warn!("Failed to flush build log sinks: {}", e);
            outcome.sink_error = Some(e);
        }
    }

    Ok(outcome)
}
