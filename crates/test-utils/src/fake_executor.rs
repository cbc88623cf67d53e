use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use rulewatch::engine::RunOutcome;
use rulewatch::errors::ProcessError;
use rulewatch::exec::{ExecutorBackend, RunRequest};

/// How a fake run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeRun {
    Succeeded,
    Failed(i32),
    Canceled,
}

/// Entry in the executor's ordered log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeEvent {
    Started(String),
    Finished(String, FakeRun),
}

#[derive(Debug, Clone, Copy)]
struct Plan {
    duration: Duration,
    exit_code: i32,
}

impl Default for Plan {
    fn default() -> Self {
        Self {
            duration: Duration::from_millis(10),
            exit_code: 0,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    plans: HashMap<String, Plan>,
    requests: Vec<RunRequest>,
    log: Vec<FakeEvent>,
    running: HashMap<String, usize>,
    max_running: HashMap<String, usize>,
}

/// A fake executor that:
/// - records every request it receives
/// - "runs" each rule for a configurable duration and exit code
/// - resolves to `Canceled` as soon as the run's token fires
/// - tracks the peak number of simultaneous runs per rule.
#[derive(Debug, Clone, Default)]
pub struct FakeExecutor {
    state: Arc<Mutex<State>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duration(self, rule: &str, duration: Duration) -> Self {
        self.lock().plans.entry(rule.to_string()).or_default().duration = duration;
        self
    }

    pub fn with_exit_code(self, rule: &str, code: i32) -> Self {
        self.lock().plans.entry(rule.to_string()).or_default().exit_code = code;
        self
    }

    pub fn requests(&self) -> Vec<RunRequest> {
        self.lock().requests.clone()
    }

    /// Rule names in the order their runs started.
    pub fn started(&self) -> Vec<String> {
        self.lock().requests.iter().map(|r| r.rule.clone()).collect()
    }

    pub fn log(&self) -> Vec<FakeEvent> {
        self.lock().log.clone()
    }

    pub fn finished(&self) -> Vec<(String, FakeRun)> {
        self.lock()
            .log
            .iter()
            .filter_map(|e| match e {
                FakeEvent::Finished(rule, run) => Some((rule.clone(), *run)),
                FakeEvent::Started(_) => None,
            })
            .collect()
    }

    pub fn finished_count(&self, rule: &str, run: FakeRun) -> usize {
        self.finished()
            .iter()
            .filter(|(r, outcome)| r == rule && *outcome == run)
            .count()
    }

    pub fn max_concurrency(&self, rule: &str) -> usize {
        self.lock().max_running.get(rule).copied().unwrap_or(0)
    }

    pub fn is_running(&self, rule: &str) -> bool {
        self.lock().running.get(rule).copied().unwrap_or(0) > 0
    }

    /// Poll until `n` runs have finished (in any way).
    pub async fn wait_for_finished(&self, n: usize) {
        while self.finished().len() < n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Poll until `rule` has started a run.
    pub async fn wait_for_start(&self, rule: &str) {
        while !self.started().iter().any(|r| r == rule) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn begin(&self, request: &RunRequest) -> Plan {
        let mut state = self.lock();
        state.requests.push(request.clone());
        state.log.push(FakeEvent::Started(request.rule.clone()));
        let running = state.running.entry(request.rule.clone()).or_default();
        *running += 1;
        let now = *running;
        let peak = state.max_running.entry(request.rule.clone()).or_default();
        *peak = (*peak).max(now);
        state.plans.get(&request.rule).copied().unwrap_or_default()
    }

    fn end(&self, rule: &str, run: FakeRun) {
        let mut state = self.lock();
        if let Some(running) = state.running.get_mut(rule) {
            *running -= 1;
        }
        state.log.push(FakeEvent::Finished(rule.to_string(), run));
    }
}

impl ExecutorBackend for FakeExecutor {
    fn execute(
        &self,
        request: RunRequest,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<RunOutcome, ProcessError>> + Send + '_>> {
        Box::pin(async move {
            let plan = self.begin(&request);

            let (run, result) = tokio::select! {
                _ = cancel.cancelled() => (FakeRun::Canceled, Ok(RunOutcome::Canceled)),
                _ = tokio::time::sleep(plan.duration) => match plan.exit_code {
                    0 => (FakeRun::Succeeded, Ok(RunOutcome::Success)),
                    code => (FakeRun::Failed(code), Err(ProcessError::Exited { code })),
                },
            };

            self.end(&request.rule, run);
            result
        })
    }
}
