// src/errors.rs

//! Crate-wide error types.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RulewatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("cannot read env file {path:?}: {message}")]
    EnvFile { path: PathBuf, message: String },

    #[error("rule not found")]
    RuleNotFound(String),

    #[error(transparent)]
    Process(#[from] ProcessError),

    /// A chained rule failed; `rule` is the chain target that failed.
    #[error("{source}")]
    Chain {
        rule: String,
        #[source]
        source: Box<RulewatchError>,
    },

    #[error("file watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RulewatchError {
    /// Name of the rule a failure should be reported against, if the error
    /// carries one more precise than the rule that was triggered.
    pub fn failing_rule(&self) -> Option<&str> {
        match self {
            RulewatchError::Chain { rule, source } => {
                source.failing_rule().or(Some(rule.as_str()))
            }
            RulewatchError::RuleNotFound(name) => Some(name.as_str()),
            _ => None,
        }
    }

    /// Innermost error, skipping chain wrappers.
    pub fn root_cause(&self) -> &RulewatchError {
        match self {
            RulewatchError::Chain { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Failure of a spawned command.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for process: {0}")]
    Wait(#[source] std::io::Error),

    #[error("exit status {code}")]
    Exited { code: i32 },

    #[error("terminated by signal {signal}")]
    Signaled { signal: i32 },
}

pub type Result<T> = std::result::Result<T, RulewatchError>;
