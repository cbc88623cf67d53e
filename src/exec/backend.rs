// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The scheduler hands each admitted run to an `ExecutorBackend` instead of
//! spawning processes itself, so tests can swap in a fake executor that
//! records requests and simulates durations and exit codes.

use std::future::Future;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;

use crate::engine::RunOutcome;
use crate::errors::ProcessError;
use crate::output::{OutputSink, SegmentKind};

use super::process::ProcessRunner;

/// Everything needed to execute one admitted run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub rule: String,
    /// Command with `{PKG}` / `{FILE}` already substituted.
    pub command: String,
    /// Complete environment as `KEY=VALUE`.
    pub env: Vec<String>,
}

/// Trait abstracting how admitted runs are executed.
///
/// Production code uses [`RealExecutorBackend`]; tests can provide their own
/// implementation that doesn't spawn real processes. Implementations must
/// resolve to [`RunOutcome::Canceled`] once `cancel` fires.
pub trait ExecutorBackend: Send + Sync {
    fn execute(
        &self,
        request: RunRequest,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<RunOutcome, ProcessError>> + Send + '_>>;
}

/// Real executor backend: runs commands through [`ProcessRunner`] and
/// forwards their output to the sink.
#[derive(Debug, Clone)]
pub struct RealExecutorBackend {
    runner: ProcessRunner,
    sink: OutputSink,
}

impl RealExecutorBackend {
    pub fn new(runner: ProcessRunner, sink: OutputSink) -> Self {
        Self { runner, sink }
    }
}

impl ExecutorBackend for RealExecutorBackend {
    fn execute(
        &self,
        request: RunRequest,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<RunOutcome, ProcessError>> + Send + '_>> {
        Box::pin(async move {
            let stdout = self.sink.stream(&request.rule, SegmentKind::CommandOut);
            let stderr = self.sink.stream(&request.rule, SegmentKind::CommandErr);
            self.runner
                .run(&cancel, &request.command, &request.env, stdout, stderr)
                .await
        })
    }
}
