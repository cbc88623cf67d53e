// src/config/validate.rs

use std::collections::HashSet;

use regex::Regex;
use tracing::warn;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, RulewatchError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = RulewatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.rules.is_empty() {
        warn!("config defines no rules");
    }
    validate_rule_names(cfg)?;
    validate_global_ignore(cfg)?;
    warn_on_rule_patterns(cfg);
    warn_on_unknown_targets(cfg);
    Ok(())
}

fn validate_rule_names(cfg: &RawConfigFile) -> Result<()> {
    let mut seen = HashSet::new();
    for (idx, rule) in cfg.rules.iter().enumerate() {
        if rule.name.trim().is_empty() {
            return Err(RulewatchError::ConfigError(format!(
                "rule #{} has an empty `name`",
                idx + 1
            )));
        }
        if !seen.insert(rule.name.as_str()) {
            return Err(RulewatchError::ConfigError(format!(
                "duplicate rule name '{}'",
                rule.name
            )));
        }
        if rule.command.trim().is_empty() {
            return Err(RulewatchError::ConfigError(format!(
                "rule '{}' has an empty `command`",
                rule.name
            )));
        }
    }
    Ok(())
}

/// The global ignore affects every rule, so a broken one is fatal.
fn validate_global_ignore(cfg: &RawConfigFile) -> Result<()> {
    if let Some(pattern) = cfg.ignore.as_deref().filter(|p| !p.is_empty()) {
        Regex::new(pattern).map_err(|source| RulewatchError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
    }
    Ok(())
}

/// Rule-level patterns only disable their own rule; the dispatcher reports
/// them again whenever the rule would have been considered.
fn warn_on_rule_patterns(cfg: &RawConfigFile) {
    for rule in cfg.rules.iter() {
        let patterns = std::iter::once(rule.match_pattern.as_str())
            .chain(rule.ignore.as_deref())
            .filter(|p| !p.is_empty());
        for pattern in patterns {
            if let Err(err) = Regex::new(pattern) {
                warn!(rule = %rule.name, %pattern, error = %err, "invalid rule pattern; rule disabled for file events");
            }
        }
    }
}

fn warn_on_unknown_targets(cfg: &RawConfigFile) {
    let names: HashSet<&str> = cfg.rules.iter().map(|r| r.name.as_str()).collect();

    let edges = cfg
        .rules
        .iter()
        .flat_map(|r| {
            r.trig
                .iter()
                .chain(r.trig_async.iter())
                .map(move |t| (r.name.as_str(), t.as_str()))
        })
        .chain(
            cfg.trig
                .iter()
                .chain(cfg.trig_async.iter())
                .map(|t| ("<startup>", t.as_str())),
        );

    for (from, target) in edges {
        if !names.contains(target) {
            warn!(rule = %from, %target, "trigger target does not name a rule");
        }
    }
}
