use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use nix::sys::signal::Signal;
use serde::Deserialize;

/// Output rendering selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputStyle {
    #[default]
    Color,
    Plain,
}

/// How the value of an `env` entry is interpreted.
///
/// - `Literal`: `name=value` is used as-is.
/// - `File`: `name` is a path to a shell-style env file whose `KEY=VALUE`
///   lines are merged into the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvKind {
    #[default]
    Literal,
    File,
}

impl FromStr for EnvKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "literal" => Ok(EnvKind::Literal),
            "file" => Ok(EnvKind::File),
            other => Err(format!(
                "invalid env type: {other} (expected \"literal\" or \"file\")"
            )),
        }
    }
}

/// Signal delivered to a rule's process group when its run is canceled.
///
/// Accepts `SIGTERM`, `TERM`, `term` or a signal number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct KillSignal(Signal);

impl KillSignal {
    pub fn new(signal: Signal) -> Self {
        Self(signal)
    }

    pub fn signal(&self) -> Signal {
        self.0
    }

    /// Whether this is the unconditional kill, which never needs escalation.
    pub fn is_unconditional(&self) -> bool {
        self.0 == Signal::SIGKILL
    }
}

impl Default for KillSignal {
    fn default() -> Self {
        KillSignal(Signal::SIGKILL)
    }
}

impl fmt::Display for KillSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl FromStr for KillSignal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(num) = trimmed.parse::<i32>() {
            return Signal::try_from(num)
                .map(KillSignal)
                .map_err(|_| format!("invalid kill signal number: {num}"));
        }

        let upper = trimmed.to_uppercase();
        let name = if upper.starts_with("SIG") {
            upper
        } else {
            format!("SIG{upper}")
        };
        Signal::from_str(&name)
            .map(KillSignal)
            .map_err(|_| format!("invalid kill signal: {trimmed}"))
    }
}

impl TryFrom<String> for KillSignal {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
