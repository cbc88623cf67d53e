// src/config/mod.rs

//! Configuration loading and validation for rulewatch.
//!
//! Responsibilities:
//! - Define the YAML-backed data model (`model.rs`).
//! - Locate and load a config file from disk (`loader.rs`).
//! - Expand `%{NAME}%` environment references (`placeholders.rs`).
//! - Validate basic invariants like unique rule names (`validate.rs`).

pub mod loader;
pub mod model;
pub mod placeholders;
pub mod validate;

pub use loader::{find_config, load_and_validate, load_from_path, parse_str};
pub use model::{ConfigFile, EnvEntry, FormatSection, RawConfigFile, RuleConfig};
