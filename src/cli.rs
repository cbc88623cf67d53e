// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{CommandFactory, Parser, ValueEnum};

use crate::types::OutputStyle;

/// Command-line arguments for `rulewatch`.
#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "rulewatch",
    version,
    about = "Run commands when files matching a rule change.",
    long_about = None
)]
pub struct CliArgs {
    /// Without a config file: `REGEX COMMAND` defines a single rule named
    /// `run`. With a config file: one argument, a space-separated list of
    /// rules to trigger once before exiting.
    #[arg(value_name = "ARGS", num_args = 0..=2)]
    pub positional: Vec<String>,

    /// Path to the config file (YAML).
    ///
    /// Default: first of `rulewatch.yaml`, `.rulewatch.yaml`,
    /// `rulewatch.yml`, `.rulewatch.yml` in the current directory.
    #[arg(short = 'f', long, value_name = "PATH")]
    pub config: Option<String>,

    /// Global debounce in milliseconds.
    #[arg(long, value_name = "MS")]
    pub debounce: Option<u64>,

    /// Regex of paths that never trigger anything.
    #[arg(long, value_name = "REGEX")]
    pub ignore: Option<String>,

    /// Don't print the command line before each run.
    #[arg(long)]
    pub no_trace: bool,

    /// Space-separated rules to trigger once, then exit.
    #[arg(short = 't', long, value_name = "RULES")]
    pub trig: Option<String>,

    /// Comma-separated rules that file changes never trigger.
    #[arg(long, value_name = "RULES", value_delimiter = ',')]
    pub ignore_rules: Vec<String>,

    /// Value substituted for `{PKG}` in every command.
    #[arg(long, value_name = "VALUE")]
    pub pkg: Option<String>,

    /// Value substituted for `{FILE}` in every command.
    #[arg(long, value_name = "VALUE")]
    pub file: Option<String>,

    /// Trigger every rule with a `match` pattern once at startup.
    #[arg(long)]
    pub run_on_start: bool,

    /// Output style for rule output.
    #[arg(long, value_enum, value_name = "STYLE", default_value_t = OutputStyle::Color)]
    pub format: OutputStyle,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `RULEWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Load and validate the config, print the rules, don't run anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

/// Print the generated help text to stderr.
pub fn print_usage() {
    let help = CliArgs::command().render_help();
    eprintln!("{help}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_overrides() {
        let args = CliArgs::try_parse_from([
            "rulewatch",
            "--debounce",
            "50",
            "--ignore-rules",
            "lint,test",
            "-t",
            "build test",
            "--format",
            "plain",
        ])
        .expect("valid args");
        assert_eq!(args.debounce, Some(50));
        assert_eq!(args.ignore_rules, vec!["lint", "test"]);
        assert_eq!(args.trig.as_deref(), Some("build test"));
        assert_eq!(args.format, OutputStyle::Plain);
    }

    #[test]
    fn accepts_ad_hoc_rule() {
        let args = CliArgs::try_parse_from(["rulewatch", r"\.rs$", "cargo test"]).expect("valid");
        assert_eq!(args.positional, vec![r"\.rs$", "cargo test"]);
    }
}
