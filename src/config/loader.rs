// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::config::placeholders;
use crate::errors::Result;

/// File names probed, in order, when no explicit config path is given.
pub const DEFAULT_CONFIG_FILES: [&str; 4] = [
    "rulewatch.yaml",
    ".rulewatch.yaml",
    "rulewatch.yml",
    ".rulewatch.yml",
];

/// Parse YAML text into a `RawConfigFile`.
///
/// `%{NAME}%` references are expanded from the OS environment before the
/// document is decoded.
pub fn parse_str(contents: &str) -> Result<RawConfigFile> {
    let expanded = placeholders::expand(contents, |name| std::env::var(name).ok());
    let config: RawConfigFile = serde_yaml::from_str(&expanded)?;
    Ok(config)
}

/// Load a configuration file from a given path and return the raw
/// `RawConfigFile`.
///
/// This only performs placeholder expansion and YAML deserialization; use
/// [`load_and_validate`] for semantic checks.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    parse_str(&contents)
}

/// Load a configuration file from path and run validation.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Locate the config file to use.
///
/// An explicit path is returned as-is (loading it later fails loudly if it
/// does not exist). Otherwise the first of [`DEFAULT_CONFIG_FILES`] found in
/// `dir` is used; `None` means the caller must fall back to positional
/// arguments.
pub fn find_config(dir: &Path, explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    let found = DEFAULT_CONFIG_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file());
    debug!(?found, "config discovery finished");
    found
}
