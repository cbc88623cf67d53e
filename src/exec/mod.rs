// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`env`] builds the environment a command runs with.
//! - [`process`] spawns a command in its own process group and handles
//!   cancellation, signal escalation and exit normalization.
//! - [`backend`] provides the `ExecutorBackend` trait and the production
//!   `RealExecutorBackend`, which tests replace with a fake.

pub mod backend;
pub mod env;
pub mod process;

pub use backend::{ExecutorBackend, RealExecutorBackend, RunRequest};
pub use env::{parse_env_file, EnvResolver};
pub use process::ProcessRunner;
