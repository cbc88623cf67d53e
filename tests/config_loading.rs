// tests/config_loading.rs

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use nix::sys::signal::Signal;
use tempfile::NamedTempFile;

use rulewatch::cli::CliArgs;
use rulewatch::config::{find_config, load_and_validate, parse_str};
use rulewatch::errors::RulewatchError;
use rulewatch::types::EnvKind;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn full_document_loads() {
    let file = config_file(
        r#"
debounce: 150
ignore: '\.git/'
kill_signal: term
kill_timeout: 2
trig: [build]
env:
  - name: STAGE
    value: dev
  - name: ./.env
    type: file
format:
  ok: "OK {{.Title}} {{.Message}}"
rules:
  - name: build
    match: '\.go$'
    command: go build {PKG}
    trig: [run]
  - name: run
    command: ./app
    debounce: 0
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.debounce, 150);
    assert_eq!(cfg.ignore.as_deref(), Some(r"\.git/"));
    assert_eq!(cfg.kill_signal.signal(), Signal::SIGTERM);
    assert_eq!(cfg.kill_timeout, Some(Duration::from_secs(2)));
    assert_eq!(cfg.trig, vec!["build"]);
    assert_eq!(cfg.env.len(), 2);
    assert_eq!(cfg.env[1].kind, EnvKind::File);
    assert_eq!(cfg.format.ok.as_deref(), Some("OK {{.Title}} {{.Message}}"));
    assert_eq!(cfg.rule_names().collect::<Vec<_>>(), vec!["build", "run"]);
    let run = cfg.rule("run").unwrap();
    assert!(run.match_pattern.is_empty());
    assert_eq!(cfg.effective_debounce(run), Duration::ZERO);
}

#[test]
fn defaults_apply_when_fields_are_missing() {
    let file = config_file("rules:\n  - name: only\n    command: make\n");

    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.debounce, 300);
    assert!(cfg.kill_signal.is_unconditional());
    assert_eq!(cfg.kill_timeout, None);
    assert!(!cfg.no_trace);
}

#[test]
fn os_env_placeholders_are_expanded_before_parsing() {
    let path = std::env::var("PATH").unwrap_or_default();
    let raw = parse_str(
        "rules:\n  - name: x\n    command: 'echo %{PATH}% [%{RULEWATCH_TEST_SURELY_UNSET}%]'\n",
    )
    .unwrap();

    assert_eq!(raw.rules[0].command, format!("echo {path} []"));
}

#[test]
fn config_without_rules_is_accepted() {
    let file = config_file("debounce: 10\ntrig: [lint]\nenv:\n  - name: STAGE\n    value: ci\n");

    let cfg = load_and_validate(file.path()).unwrap();

    assert!(cfg.rules.is_empty());
    assert_eq!(cfg.trig, vec!["lint"]);
    assert_eq!(cfg.env.len(), 1);
}

#[test]
fn duplicate_rule_names_are_rejected() {
    let file = config_file(
        "rules:\n  - name: a\n    command: x\n  - name: a\n    command: y\n",
    );

    match load_and_validate(file.path()) {
        Err(RulewatchError::ConfigError(msg)) => {
            assert!(msg.contains("duplicate"));
            assert!(msg.contains('a'));
        }
        other => panic!("Expected ConfigError, got: {other:?}"),
    }
}

#[test]
fn invalid_global_ignore_is_fatal() {
    let file = config_file("ignore: '(['\nrules:\n  - name: a\n    command: x\n");

    match load_and_validate(file.path()) {
        Err(RulewatchError::InvalidPattern { pattern, .. }) => assert_eq!(pattern, "(["),
        other => panic!("Expected InvalidPattern, got: {other:?}"),
    }
}

#[test]
fn invalid_rule_pattern_only_warns() {
    let file = config_file(
        "rules:\n  - name: a\n    match: '(['\n    command: x\n  - name: b\n    command: y\n    trig: [missing]\n",
    );

    assert!(load_and_validate(file.path()).is_ok());
}

#[test]
fn unknown_kill_signal_is_a_yaml_error() {
    let file = config_file("kill_signal: SIGBOGUS\nrules:\n  - name: a\n    command: x\n");

    assert!(matches!(
        load_and_validate(file.path()),
        Err(RulewatchError::YamlError(_))
    ));
}

#[test]
fn config_discovery_prefers_first_conventional_name() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".rulewatch.yml"), "rules: []").unwrap();
    std::fs::write(dir.path().join(".rulewatch.yaml"), "rules: []").unwrap();

    let found = find_config(dir.path(), None).unwrap();
    assert!(found.ends_with(".rulewatch.yaml"));

    let explicit = PathBuf::from("custom.yaml");
    assert_eq!(find_config(dir.path(), Some(explicit.as_path())), Some(explicit.clone()));

    let empty = tempfile::tempdir().unwrap();
    assert_eq!(find_config(empty.path(), None), None);
}

#[test]
fn cli_overrides_apply_on_top_of_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("rulewatch.yaml"),
        "debounce: 500\nrules:\n  - name: build\n    command: make\n  - name: test\n    command: make test\n",
    )
    .unwrap();
    let args = CliArgs {
        positional: vec!["build test".to_string()],
        debounce: Some(5),
        ignore_rules: vec!["test".to_string()],
        pkg: Some("./only".to_string()),
        ..CliArgs::default()
    };

    let cfg = rulewatch::build_config(&args, dir.path()).unwrap();

    assert_eq!(cfg.debounce, 5);
    assert!(cfg.is_rule_ignored("test"));
    assert_eq!(cfg.pkg_override.as_deref(), Some("./only"));
    assert!(cfg.exit_on_trig);
    assert_eq!(cfg.trig, vec!["build", "test"]);
}

#[test]
fn positional_pair_defines_ad_hoc_rule() {
    let dir = tempfile::tempdir().unwrap();
    let args = CliArgs {
        positional: vec![r"\.rs$".to_string(), "cargo check".to_string()],
        ..CliArgs::default()
    };

    let cfg = rulewatch::build_config(&args, dir.path()).unwrap();

    assert_eq!(cfg.rules.len(), 1);
    assert_eq!(cfg.rules[0].name, rulewatch::AD_HOC_RULE);
    assert_eq!(cfg.rules[0].match_pattern, r"\.rs$");
    assert!(!cfg.exit_on_trig);
}

#[test]
fn no_config_and_no_command_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let args = CliArgs::default();

    assert!(rulewatch::build_config(&args, dir.path()).is_err());
}

#[test]
fn bad_cli_ignore_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let args = CliArgs {
        positional: vec!["x".to_string(), "true".to_string()],
        ignore: Some("([".to_string()),
        ..CliArgs::default()
    };

    assert!(rulewatch::build_config(&args, dir.path()).is_err());
}
