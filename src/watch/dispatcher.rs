// src/watch/dispatcher.rs

//! Turns file change events into rule triggers.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::engine::RuleScheduler;
use crate::watch::path_utils::{package_token, relative_str};
use crate::watch::patterns::PatternCache;

/// One filesystem change, as seen by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub is_dir: bool,
}

impl FileChange {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            is_dir: false,
        }
    }
}

#[derive(Debug)]
pub struct Dispatcher {
    root: PathBuf,
    patterns: Arc<PatternCache>,
    scheduler: RuleScheduler,
}

impl Dispatcher {
    pub fn new(root: impl Into<PathBuf>, patterns: Arc<PatternCache>, scheduler: RuleScheduler) -> Self {
        Self {
            root: root.into(),
            patterns,
            scheduler,
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// Match `change` against every rule and trigger the ones that match.
    ///
    /// Patterns see the event path as reported (`/home/me/proj/src/x.go`),
    /// and so does `{FILE}`; only `{PKG}` is relative to the watch root. The
    /// global `ignore` drops the event entirely; a rule's own `ignore` or
    /// its presence in `ignore_rules` only skips that rule. Returns the
    /// names of the rules triggered.
    pub async fn dispatch(&self, change: &FileChange) -> Vec<String> {
        if change.is_dir {
            return Vec::new();
        }

        let Some(rel) = relative_str(&self.root, &change.path) else {
            warn!(path = ?change.path, root = ?self.root, "could not relativize event path");
            return Vec::new();
        };
        let pkg = package_token(&rel);
        let path = change.path.to_string_lossy();
        let config = self.scheduler.config();

        if let Some(ignore) = config.ignore.as_deref() {
            match self.patterns.is_match(ignore, &path) {
                Ok(true) => {
                    debug!(%path, "ignored by global pattern");
                    return Vec::new();
                }
                Ok(false) => {}
                Err(err) => warn!(error = %err, "global ignore pattern unusable"),
            }
        }

        let mut triggered = Vec::new();
        for rule in &config.rules {
            if config.is_rule_ignored(&rule.name) {
                continue;
            }

            if let Some(ignore) = rule.ignore.as_deref().filter(|s| !s.is_empty()) {
                match self.patterns.is_match(ignore, &path) {
                    Ok(true) => continue,
                    Ok(false) => {}
                    Err(err) => {
                        self.scheduler.report_failure(&rule.name, &err).await;
                        continue;
                    }
                }
            }

            if rule.match_pattern.is_empty() {
                continue;
            }

            match self.patterns.is_match(&rule.match_pattern, &path) {
                Ok(true) => {
                    debug!(rule = %rule.name, %path, pkg = %pkg, "matched");
                    self.scheduler.spawn_trigger(&rule.name, &pkg, &path);
                    triggered.push(rule.name.clone());
                }
                Ok(false) => {}
                Err(err) => self.scheduler.report_failure(&rule.name, &err).await,
            }
        }
        triggered
    }
}
