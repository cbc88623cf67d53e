// src/engine/registry.rs

//! Per-rule run state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::RuleName;

#[derive(Debug)]
struct RuleRunState {
    /// Token of the newest trigger; canceling it supersedes that trigger.
    current: Option<CancellationToken>,
    /// Single permit: held by the run currently admitted for this rule.
    admission: Arc<Semaphore>,
}

impl RuleRunState {
    fn new() -> Self {
        Self {
            current: None,
            admission: Arc::new(Semaphore::new(1)),
        }
    }
}

/// Registry of cancellation tokens and admission slots, keyed by rule name.
///
/// Every token handed out is a child of one root token, so shutting down
/// cancels all pending and running triggers at once.
#[derive(Debug, Default)]
pub struct RunStateRegistry {
    root: CancellationToken,
    states: Mutex<HashMap<RuleName, RuleRunState>>,
}

impl RunStateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new trigger for `rule`, superseding whatever trigger came
    /// before it (debouncing, waiting for admission, or running).
    pub fn begin(&self, rule: &str) -> RunTicket {
        let mut states = self.lock();
        let state = states
            .entry(rule.to_string())
            .or_insert_with(RuleRunState::new);

        if let Some(previous) = state.current.take() {
            if !previous.is_cancelled() {
                debug!(rule, "superseding previous trigger");
            }
            previous.cancel();
        }

        let token = self.root.child_token();
        state.current = Some(token.clone());

        RunTicket {
            rule: rule.to_string(),
            token,
            admission: Arc::clone(&state.admission),
        }
    }

    /// Whether a run of `rule` currently holds its admission slot.
    pub fn is_admitted(&self, rule: &str) -> bool {
        self.lock()
            .get(rule)
            .is_some_and(|s| s.admission.available_permits() == 0)
    }

    /// Wait until `rule` has no admitted run.
    pub async fn wait_released(&self, rule: &str) {
        let admission = match self.lock().get(rule) {
            Some(state) => Arc::clone(&state.admission),
            None => return,
        };
        // Acquire and immediately release.
        let _ = admission.acquire().await;
    }

    /// Cancel every pending and running trigger; later tickets start out
    /// canceled.
    pub fn cancel_all(&self) {
        self.root.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.root.is_cancelled()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RuleName, RuleRunState>> {
        self.states
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// One trigger's handle on its rule's run state.
#[derive(Debug)]
pub struct RunTicket {
    rule: RuleName,
    token: CancellationToken,
    admission: Arc<Semaphore>,
}

impl RunTicket {
    pub fn rule(&self) -> &str {
        &self.rule
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Wait for the admission slot.
    ///
    /// Returns `None` if this trigger is superseded before the slot frees
    /// up; the caller must then give up without running.
    pub async fn admit(&self) -> Option<OwnedSemaphorePermit> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            permit = Arc::clone(&self.admission).acquire_owned() => permit.ok(),
        }
    }
}
