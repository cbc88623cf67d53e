// src/engine/scheduler.rs

//! Drives triggers through debounce, admission, execution and chaining.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::config::ConfigFile;
use crate::engine::{RunOutcome, RunStateRegistry};
use crate::errors::{Result, RulewatchError};
use crate::exec::{EnvResolver, ExecutorBackend, RunRequest};
use crate::output::{OutputSink, SegmentKind};

/// Boxed trigger future; boxing lets chaining recurse into `trigger`.
pub type TriggerFuture = Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>;

struct SchedulerInner {
    config: Arc<ConfigFile>,
    registry: RunStateRegistry,
    env: EnvResolver,
    executor: Arc<dyn ExecutorBackend>,
    sink: OutputSink,
    tasks: TaskTracker,
}

/// Cloneable handle to the rule engine.
///
/// Each call to [`trigger`](Self::trigger) moves one rule through
/// `Debouncing -> Admitted/Running -> Succeeded | Failed | Canceled`. A newer
/// trigger of the same rule cancels the older one wherever it is; admitted
/// runs of one rule never overlap.
#[derive(Clone)]
pub struct RuleScheduler {
    inner: Arc<SchedulerInner>,
}

impl std::fmt::Debug for RuleScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleScheduler")
            .field("rules", &self.inner.config.rules.len())
            .field("registry", &self.inner.registry)
            .finish_non_exhaustive()
    }
}

impl RuleScheduler {
    pub fn new(
        config: ConfigFile,
        env: EnvResolver,
        executor: Arc<dyn ExecutorBackend>,
        sink: OutputSink,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                config: Arc::new(config),
                registry: RunStateRegistry::new(),
                env,
                executor,
                sink,
                tasks: TaskTracker::new(),
            }),
        }
    }

    pub fn config(&self) -> &ConfigFile {
        &self.inner.config
    }

    pub fn registry(&self) -> &RunStateRegistry {
        &self.inner.registry
    }

    pub fn sink(&self) -> &OutputSink {
        &self.inner.sink
    }

    pub(crate) fn tracker(&self) -> &TaskTracker {
        &self.inner.tasks
    }

    /// Trigger `rule` for a change in package `pkg` at `path`.
    ///
    /// Resolves once this trigger has run (and its sync chain has finished),
    /// was superseded, or failed. Supersession is not an error.
    pub fn trigger(&self, rule: &str, pkg: &str, path: &str) -> TriggerFuture {
        let this = self.clone();
        let (rule, pkg, path) = (rule.to_string(), pkg.to_string(), path.to_string());
        Box::pin(async move { this.run_trigger(rule, pkg, path).await })
    }

    /// Fire-and-forget trigger on the tracked task group. Failures are
    /// reported on the sink against the rule that failed.
    pub fn spawn_trigger(&self, rule: &str, pkg: &str, path: &str) -> JoinHandle<()> {
        let this = self.clone();
        let name = rule.to_string();
        let fut = self.trigger(rule, pkg, path);
        self.inner.tasks.spawn(async move {
            if let Err(err) = fut.await {
                this.report_failure(&name, &err).await;
            }
        })
    }

    /// Write a failure line for `rule`, or for the chained rule that
    /// actually failed if `err` carries one.
    pub async fn report_failure(&self, rule: &str, err: &RulewatchError) {
        let target = err.failing_rule().unwrap_or(rule);
        let cause = err.root_cause();
        warn!(rule = %target, error = %cause, "rule failed");
        self.inner
            .sink
            .line(target, SegmentKind::Fail, &cause.to_string())
            .await;
    }

    async fn run_trigger(self, rule: String, pkg: String, path: String) -> Result<()> {
        let config = Arc::clone(&self.inner.config);
        let Some(rule_cfg) = config.rule(&rule) else {
            return Err(RulewatchError::RuleNotFound(rule));
        };

        let ticket = self.inner.registry.begin(&rule);
        let Some(permit) = ticket.admit().await else {
            debug!(rule = %rule, "trigger superseded while waiting for admission");
            return Ok(());
        };

        let debounce = config.effective_debounce(rule_cfg);
        tokio::select! {
            biased;
            _ = ticket.token().cancelled() => {
                debug!(rule = %rule, "trigger superseded during debounce");
                return Ok(());
            }
            _ = sleep(debounce) => {}
        }

        let pkg_value = config.pkg_override.as_deref().unwrap_or(&pkg);
        let file_value = config.file_override.as_deref().unwrap_or(&path);
        let command = rule_cfg.render_command(pkg_value, file_value);
        let env = self.inner.env.resolve(&config.env, &rule_cfg.env)?;

        if !config.no_trace {
            info!(rule = %rule, %command, "running");
            self.inner.sink.line(&rule, SegmentKind::Ok, &command).await;
        }

        let request = RunRequest {
            rule: rule.clone(),
            command,
            env,
        };
        let outcome = self
            .inner
            .executor
            .execute(request, ticket.token().clone())
            .await;
        drop(permit);

        match outcome? {
            RunOutcome::Canceled => {
                debug!(rule = %rule, "run canceled");
                Ok(())
            }
            RunOutcome::Success => {
                debug!(rule = %rule, "run succeeded");
                self.propagate(rule_cfg, &pkg, &path).await
            }
        }
    }

    /// Wait for every tracked trigger (and whatever they chain into) to
    /// finish. The scheduler stays usable afterwards.
    pub async fn drain(&self) {
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
        self.inner.tasks.reopen();
    }

    /// Cancel everything, wait for running commands to be torn down, then
    /// wait for the tracked task group to empty.
    pub async fn shutdown(&self) {
        info!("shutting down; canceling all rules");
        self.inner.registry.cancel_all();
        for name in self.inner.config.rule_names() {
            self.inner.registry.wait_released(name).await;
        }
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
        debug!("all rule tasks finished");
    }
}
