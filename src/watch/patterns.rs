// src/watch/patterns.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use regex::Regex;
use tracing::trace;

use crate::errors::{Result, RulewatchError};

/// Memoizes compiled regexes by their exact source string.
///
/// Rules are matched against every filesystem event, so each pattern is
/// compiled once and then shared. `Regex` is internally reference counted,
/// so handing out clones is cheap.
#[derive(Default)]
pub struct PatternCache {
    compiled: Mutex<HashMap<String, Regex>>,
}

impl fmt::Debug for PatternCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.compiled.lock().map(|m| m.len()).unwrap_or(0);
        f.debug_struct("PatternCache")
            .field("cached", &len)
            .finish()
    }
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the compiled form of `pattern`, compiling it on first use.
    ///
    /// Compilation happens outside the lock; if two callers race on the same
    /// new pattern, both compile and the first insert wins.
    pub fn compile(&self, pattern: &str) -> Result<Regex> {
        if let Some(re) = self.lookup(pattern) {
            return Ok(re);
        }

        trace!(%pattern, "compiling pattern");
        let re = Regex::new(pattern).map_err(|source| RulewatchError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;

        let mut compiled = self
            .compiled
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(compiled
            .entry(pattern.to_string())
            .or_insert(re)
            .clone())
    }

    /// Compile `pattern` and test it against `haystack`.
    pub fn is_match(&self, pattern: &str, haystack: &str) -> Result<bool> {
        Ok(self.compile(pattern)?.is_match(haystack))
    }

    pub fn len(&self) -> usize {
        self.compiled
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, pattern: &str) -> Option<Regex> {
        self.compiled
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(pattern)
            .cloned()
    }
}
