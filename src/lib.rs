// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod output;
pub mod types;
pub mod watch;

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{find_config, load_and_validate, ConfigFile, RawConfigFile, RuleConfig};
use crate::engine::{ChainMode, RuleScheduler};
use crate::exec::{EnvResolver, ExecutorBackend, ProcessRunner, RealExecutorBackend};
use crate::fs::RealFileSystem;
use crate::output::{Formatter, OutputSink};
use crate::watch::{spawn_watcher, Dispatcher, PatternCache};

/// Name of the rule defined by `rulewatch REGEX COMMAND`.
pub const AD_HOC_RULE: &str = "run";

/// Package and path used for triggers that don't come from a file event.
const STARTUP_TOKEN: &str = "./";

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and CLI overrides
/// - output sink, executor and scheduler
/// - either a one-shot `--trig` run, or startup triggers plus the watcher
/// - SIGINT / SIGTERM handling
pub async fn run(args: CliArgs) -> Result<()> {
    let root = std::env::current_dir().context("resolving working directory")?;
    let cfg = build_config(&args, &root)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let formatter = Formatter::for_style(args.format).with_overrides(&cfg.format);
    let sink = OutputSink::stdio(formatter);
    let executor: Arc<dyn ExecutorBackend> = Arc::new(RealExecutorBackend::new(
        ProcessRunner::from_config(&cfg),
        sink.clone(),
    ));
    let env = EnvResolver::new(Arc::new(RealFileSystem));
    let scheduler = RuleScheduler::new(cfg, env, executor, sink);

    if scheduler.config().exit_on_trig {
        let names = scheduler.config().trig.clone();
        info!(?names, "triggering once");
        if let Err(err) = scheduler
            .trigger_names(ChainMode::Sync, &names, STARTUP_TOKEN, STARTUP_TOKEN)
            .await
        {
            let first = names.first().map(String::as_str).unwrap_or_default();
            scheduler.report_failure(first, &err).await;
        }
        scheduler.drain().await;
        return Ok(());
    }

    seed_startup_triggers(&scheduler, args.run_on_start).await?;

    let dispatcher = Arc::new(Dispatcher::new(
        root,
        Arc::new(PatternCache::new()),
        scheduler.clone(),
    ));
    let watcher = spawn_watcher(dispatcher)?;

    let result = tokio::select! {
        res = watcher.wait() => res.context("file watcher failed"),
        res = shutdown_signal() => res,
    };

    scheduler.shutdown().await;
    result
}

/// Load the config file, or build the ad-hoc rule from positional
/// arguments, then apply command-line overrides.
pub fn build_config(args: &CliArgs, dir: &Path) -> Result<ConfigFile> {
    let explicit = args.config.as_deref().map(Path::new);
    let mut trig_list = args.trig.clone();

    let mut cfg = match find_config(dir, explicit) {
        Some(path) => {
            let cfg = load_and_validate(&path)
                .with_context(|| format!("loading config {}", path.display()))?;
            debug!(path = %path.display(), rules = cfg.rules.len(), "config loaded");
            match args.positional.as_slice() {
                [] => {}
                [names] => {
                    trig_list.get_or_insert_with(|| names.clone());
                }
                _ => bail!("with a config file, pass at most one argument (the rules to trigger)"),
            }
            cfg
        }
        None => match args.positional.as_slice() {
            [pattern, command] => ad_hoc_config(pattern, command)?,
            _ => {
                cli::print_usage();
                bail!("no config file found and no `REGEX COMMAND` given");
            }
        },
    };

    if let Some(ms) = args.debounce {
        cfg.debounce = ms;
    }
    if let Some(ignore) = &args.ignore {
        Regex::new(ignore).with_context(|| format!("invalid --ignore pattern '{ignore}'"))?;
        cfg.ignore = Some(ignore.clone()).filter(|s| !s.is_empty());
    }
    if args.no_trace {
        cfg.no_trace = true;
    }
    cfg.ignore_rules = args
        .ignore_rules
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    for name in &cfg.ignore_rules {
        if cfg.rule(name).is_none() {
            warn!(rule = %name, "--ignore-rules names an unknown rule");
        }
    }
    cfg.pkg_override = args.pkg.clone();
    cfg.file_override = args.file.clone();

    if let Some(list) = trig_list {
        cfg.trig = list.split_whitespace().map(str::to_string).collect();
        cfg.exit_on_trig = true;
    }

    Ok(cfg)
}

fn ad_hoc_config(pattern: &str, command: &str) -> Result<ConfigFile> {
    let raw = RawConfigFile {
        rules: vec![RuleConfig {
            name: AD_HOC_RULE.to_string(),
            match_pattern: pattern.to_string(),
            command: command.to_string(),
            ..RuleConfig::default()
        }],
        ..RawConfigFile::default()
    };
    Regex::new(pattern).with_context(|| format!("invalid pattern '{pattern}'"))?;
    Ok(ConfigFile::try_from(raw)?)
}

/// Startup triggers: `trig_async` concurrently, `trig` in order, and with
/// `--run-on-start` every rule that has a `match` pattern.
async fn seed_startup_triggers(scheduler: &RuleScheduler, run_on_start: bool) -> Result<()> {
    let cfg = scheduler.config();

    scheduler
        .trigger_names(ChainMode::Async, &cfg.trig_async, STARTUP_TOKEN, STARTUP_TOKEN)
        .await?;
    scheduler.spawn_sequence(cfg.trig.clone(), STARTUP_TOKEN, STARTUP_TOKEN);

    if run_on_start {
        let names: Vec<String> = cfg
            .rules
            .iter()
            .filter(|r| !r.match_pattern.is_empty())
            .map(|r| r.name.clone())
            .collect();
        info!(?names, "running matching rules on start");
        scheduler
            .trigger_names(ChainMode::Async, &names, STARTUP_TOKEN, STARTUP_TOKEN)
            .await?;
    }
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.context("listening for Ctrl+C")?,
        _ = term.recv() => {}
    }
    info!("shutdown requested");
    Ok(())
}

/// Simple dry-run output: print rules, patterns and chains.
fn print_dry_run(cfg: &ConfigFile) {
    println!("rulewatch dry-run");
    println!("  debounce = {}ms", cfg.debounce);
    if let Some(ignore) = &cfg.ignore {
        println!("  ignore = {ignore}");
    }
    println!("  kill_signal = {}", cfg.kill_signal);
    if let Some(timeout) = cfg.kill_timeout {
        println!("  kill_timeout = {}s", timeout.as_secs());
    }
    if !cfg.trig_async.is_empty() {
        println!("  trig_async: {:?}", cfg.trig_async);
    }
    if !cfg.trig.is_empty() {
        println!("  trig: {:?}", cfg.trig);
    }
    println!();

    println!("rules ({}):", cfg.rules.len());
    for rule in &cfg.rules {
        let ignored = if cfg.is_rule_ignored(&rule.name) {
            " (ignored)"
        } else {
            ""
        };
        println!("  - {}{ignored}", rule.name);
        println!("      command: {}", rule.command);
        if !rule.match_pattern.is_empty() {
            println!("      match: {}", rule.match_pattern);
        }
        if let Some(ignore) = &rule.ignore {
            println!("      ignore: {ignore}");
        }
        if let Some(ms) = rule.debounce {
            println!("      debounce: {ms}ms");
        }
        if !rule.trig_async.is_empty() {
            println!("      trig_async: {:?}", rule.trig_async);
        }
        if !rule.trig.is_empty() {
            println!("      trig: {:?}", rule.trig);
        }
        if !rule.env.is_empty() {
            println!("      env entries: {}", rule.env.len());
        }
    }

    debug!("dry-run complete (no execution)");
}

