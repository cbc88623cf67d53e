// src/watch/mod.rs

//! File watching and change dispatch.
//!
//! This module is responsible for:
//! - Compiling and caching the rules' regular expressions.
//! - Wiring up a cross-platform filesystem watcher (`notify`).
//! - Mapping each changed path to a package token and the rules it triggers.

pub mod dispatcher;
pub mod path_utils;
pub mod patterns;
pub mod watcher;

pub use dispatcher::{Dispatcher, FileChange};
pub use patterns::PatternCache;
pub use watcher::{spawn_watcher, WatcherHandle};
