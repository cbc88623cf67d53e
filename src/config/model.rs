// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::types::{EnvKind, KillSignal};

/// Default global debounce in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Configuration as read from a YAML file, before validation.
///
/// ```yaml
/// debounce: 300
/// ignore: \.git/
/// kill_signal: SIGTERM
/// kill_timeout: 5
/// trig: [build]
/// env:
///   - name: .env
///     type: file
/// rules:
///   - name: build
///     match: \.go$
///     command: go build
///     trig: [run]
///   - name: run
///     command: ./app
/// ```
///
/// All fields are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub no_trace: bool,

    /// Global ignore regex, matched against the changed path as the watcher
    /// reports it.
    #[serde(default)]
    pub ignore: Option<String>,

    /// Global debounce in milliseconds.
    #[serde(default)]
    pub debounce: Option<u64>,

    #[serde(default)]
    pub rules: Vec<RuleConfig>,

    /// Rules triggered synchronously at startup.
    #[serde(default)]
    pub trig: Vec<String>,

    /// Rules triggered asynchronously at startup.
    #[serde(default)]
    pub trig_async: Vec<String>,

    #[serde(default)]
    pub env: Vec<EnvEntry>,

    #[serde(default)]
    pub kill_signal: Option<KillSignal>,

    /// Seconds to wait after `kill_signal` before escalating to SIGKILL.
    #[serde(default)]
    pub kill_timeout: Option<u64>,

    #[serde(default)]
    pub format: FormatSection,
}

/// One `rules:` entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleConfig {
    pub name: String,

    /// Regex matched against changed paths. Empty means the rule is only
    /// reachable through `trig` / `trig_async` of another rule.
    #[serde(default, rename = "match")]
    pub match_pattern: String,

    #[serde(default)]
    pub ignore: Option<String>,

    /// Per-rule debounce in milliseconds; falls back to the global value.
    #[serde(default)]
    pub debounce: Option<u64>,

    /// Shell command; `{PKG}` and `{FILE}` are substituted per trigger.
    pub command: String,

    #[serde(default)]
    pub trig: Vec<String>,

    #[serde(default)]
    pub trig_async: Vec<String>,

    #[serde(default)]
    pub env: Vec<EnvEntry>,
}

/// One `env:` entry, global or per rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EnvEntry {
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default, rename = "type")]
    pub kind: EnvKind,
}

impl EnvEntry {
    pub fn literal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            kind: EnvKind::Literal,
        }
    }

    pub fn file(path: impl Into<String>) -> Self {
        Self {
            name: path.into(),
            value: String::new(),
            kind: EnvKind::File,
        }
    }
}

/// `format:` section: output templates using `{{.Time}}`, `{{.Title}}` and
/// `{{.Message}}`, plus the `{{.Time}}` layout (a Go layout such as
/// `15:04:05`, or a `chrono` strftime string when it contains `%`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FormatSection {
    #[serde(default)]
    pub ok: Option<String>,
    #[serde(default)]
    pub fail: Option<String>,
    #[serde(default)]
    pub command_ok: Option<String>,
    #[serde(default)]
    pub command_err: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
}

/// Validated configuration, immutable once the engine starts.
///
/// Built from [`RawConfigFile`] via `TryFrom` (see `validate.rs`); the
/// runtime override fields are filled in from the CLI by the caller.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub no_trace: bool,
    pub ignore: Option<String>,
    pub debounce: u64,
    pub rules: Vec<RuleConfig>,
    pub trig: Vec<String>,
    pub trig_async: Vec<String>,
    pub env: Vec<EnvEntry>,
    pub kill_signal: KillSignal,
    pub kill_timeout: Option<Duration>,
    pub format: FormatSection,

    /// Rule names never triggered by file events.
    pub ignore_rules: Vec<String>,
    /// Run `trig` once and exit instead of watching.
    pub exit_on_trig: bool,
    /// Replaces the `{PKG}` value of every trigger.
    pub pkg_override: Option<String>,
    /// Replaces the `{FILE}` value of every trigger.
    pub file_override: Option<String>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            no_trace: raw.no_trace,
            ignore: raw.ignore.filter(|s| !s.is_empty()),
            debounce: raw.debounce.unwrap_or(DEFAULT_DEBOUNCE_MS),
            rules: raw.rules,
            trig: raw.trig,
            trig_async: raw.trig_async,
            env: raw.env,
            kill_signal: raw.kill_signal.unwrap_or_default(),
            kill_timeout: raw.kill_timeout.map(Duration::from_secs),
            format: raw.format,
            ignore_rules: Vec::new(),
            exit_on_trig: false,
            pkg_override: None,
            file_override: None,
        }
    }

    pub fn rule(&self, name: &str) -> Option<&RuleConfig> {
        self.rules.iter().find(|r| r.name == name)
    }

    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.name.as_str())
    }

    /// Debounce applied to `rule`: its own override, else the global value.
    pub fn effective_debounce(&self, rule: &RuleConfig) -> Duration {
        Duration::from_millis(rule.debounce.unwrap_or(self.debounce))
    }

    pub fn is_rule_ignored(&self, name: &str) -> bool {
        self.ignore_rules.iter().any(|r| r == name)
    }
}

impl RuleConfig {
    /// Expand `{PKG}` and `{FILE}` in the command template.
    pub fn render_command(&self, pkg: &str, file: &str) -> String {
        self.command.replace("{PKG}", pkg).replace("{FILE}", file)
    }
}
