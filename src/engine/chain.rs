// src/engine/chain.rs

//! Chaining: what a successful run triggers next.

use tracing::debug;

use crate::config::RuleConfig;
use crate::errors::{Result, RulewatchError};

use super::scheduler::RuleScheduler;

/// How a list of rule names is triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainMode {
    /// Each target starts concurrently on the tracked task group.
    Async,
    /// Targets run one after another; the first failure stops the list.
    Sync,
}

impl RuleScheduler {
    /// Fan out after a successful run of `rule`: async targets first, then
    /// the sync targets in order.
    pub(crate) async fn propagate(&self, rule: &RuleConfig, pkg: &str, path: &str) -> Result<()> {
        if !rule.trig_async.is_empty() || !rule.trig.is_empty() {
            debug!(
                rule = %rule.name,
                trig_async = ?rule.trig_async,
                trig = ?rule.trig,
                "chaining"
            );
        }
        self.trigger_names(ChainMode::Async, &rule.trig_async, pkg, path)
            .await?;
        self.trigger_names(ChainMode::Sync, &rule.trig, pkg, path)
            .await
    }

    /// Trigger each rule in `names`.
    ///
    /// An unknown name is reported on the sink for that name only; the rest
    /// of the list still runs. In [`ChainMode::Sync`] any other failure
    /// stops the list and is returned as [`RulewatchError::Chain`] naming
    /// the target that failed.
    pub async fn trigger_names(
        &self,
        mode: ChainMode,
        names: &[String],
        pkg: &str,
        path: &str,
    ) -> Result<()> {
        match mode {
            ChainMode::Async => {
                for name in names {
                    if self.config().rule(name).is_none() {
                        self.report_failure(name, &RulewatchError::RuleNotFound(name.clone()))
                            .await;
                        continue;
                    }
                    self.spawn_trigger(name, pkg, path);
                }
                Ok(())
            }
            ChainMode::Sync => {
                for name in names {
                    match self.trigger(name, pkg, path).await {
                        Ok(()) => {}
                        Err(err @ RulewatchError::RuleNotFound(_)) => {
                            self.report_failure(name, &err).await;
                        }
                        Err(err) => {
                            return Err(RulewatchError::Chain {
                                rule: name.clone(),
                                source: Box::new(err),
                            });
                        }
                    }
                }
                Ok(())
            }
        }
    }

    /// Run `names` as a sync chain in the background, reporting a failure
    /// against the rule that caused it.
    pub fn spawn_sequence(&self, names: Vec<String>, pkg: &str, path: &str) {
        if names.is_empty() {
            return;
        }
        let this = self.clone();
        let (pkg, path) = (pkg.to_string(), path.to_string());
        self.tracker().spawn(async move {
            if let Err(err) = this.trigger_names(ChainMode::Sync, &names, &pkg, &path).await {
                let first = names.first().map(String::as_str).unwrap_or_default();
                this.report_failure(first, &err).await;
            }
        });
    }
}
