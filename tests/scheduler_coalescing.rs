use std::error::Error;
use std::time::Duration;

use rulewatch_test_utils::{
    init_tracing, with_timeout, ConfigFileBuilder, FakeExecutor, FakeRun, Harness,
    RuleConfigBuilder,
};

type TestResult = Result<(), Box<dyn Error>>;

fn test_rule(debounce_ms: u64) -> rulewatch::config::ConfigFile {
    ConfigFileBuilder::new()
        .with_rule(
            RuleConfigBuilder::new("test", "go test {FILE}")
                .matching(r"\.go$")
                .debounce(debounce_ms)
                .build(),
        )
        .build()
}

#[tokio::test]
async fn triggers_inside_debounce_spawn_only_the_latest() -> TestResult {
    init_tracing();
    let h = Harness::new(test_rule(300), FakeExecutor::new());

    let first = tokio::spawn(h.scheduler.trigger("test", "./pkg", "pkg/a_test.go"));
    tokio::time::sleep(Duration::from_millis(50)).await;
    with_timeout(h.scheduler.trigger("test", "./pkg", "pkg/b_test.go")).await?;
    first.await??;

    let requests = h.executor.requests();
    assert_eq!(requests.len(), 1, "only one run may spawn: {requests:?}");
    assert_eq!(requests[0].command, "go test pkg/b_test.go");
    Ok(())
}

#[tokio::test]
async fn newer_trigger_cancels_running_command() -> TestResult {
    init_tracing();
    let executor = FakeExecutor::new().with_duration("test", Duration::from_millis(500));
    let h = Harness::new(test_rule(10), executor);

    let first = tokio::spawn(h.scheduler.trigger("test", "./", "a.go"));
    with_timeout(h.executor.wait_for_start("test")).await;

    with_timeout(h.scheduler.trigger("test", "./", "b.go")).await?;
    first.await??;

    assert_eq!(
        h.executor.finished(),
        vec![
            ("test".to_string(), FakeRun::Canceled),
            ("test".to_string(), FakeRun::Succeeded),
        ]
    );
    assert_eq!(h.executor.max_concurrency("test"), 1);
    Ok(())
}

#[tokio::test]
async fn trigger_superseded_after_cancel_never_spawns() -> TestResult {
    init_tracing();
    let executor = FakeExecutor::new().with_duration("test", Duration::from_millis(300));
    let h = Harness::new(test_rule(200), executor);

    let running = tokio::spawn(h.scheduler.trigger("test", "./", "one.go"));
    with_timeout(h.executor.wait_for_start("test")).await;

    // Cancels the running command, then debounces.
    let second = tokio::spawn(h.scheduler.trigger("test", "./", "two.go"));
    with_timeout(h.executor.wait_for_finished(1)).await;
    // Supersedes the second trigger before it spawns anything.
    with_timeout(h.scheduler.trigger("test", "./", "three.go")).await?;

    running.await??;
    second.await??;

    let commands: Vec<String> = h.executor.requests().into_iter().map(|r| r.command).collect();
    assert_eq!(commands, vec!["go test one.go", "go test three.go"]);
    assert_eq!(h.executor.max_concurrency("test"), 1);
    Ok(())
}

#[tokio::test]
async fn different_rules_run_concurrently() -> TestResult {
    init_tracing();
    let cfg = ConfigFileBuilder::new()
        .with_rule(RuleConfigBuilder::new("api", "make api").build())
        .with_rule(RuleConfigBuilder::new("web", "make web").build())
        .build();
    let executor = FakeExecutor::new()
        .with_duration("api", Duration::from_millis(300))
        .with_duration("web", Duration::from_millis(300));
    let h = Harness::new(cfg, executor);

    let api = tokio::spawn(h.scheduler.trigger("api", "./", "x"));
    let web = tokio::spawn(h.scheduler.trigger("web", "./", "y"));
    with_timeout(async {
        h.executor.wait_for_start("api").await;
        h.executor.wait_for_start("web").await;
    })
    .await;

    assert!(h.executor.is_running("api"));
    assert!(h.executor.is_running("web"));
    assert!(h.scheduler.registry().is_admitted("api"));

    api.await??;
    web.await??;
    assert!(!h.scheduler.registry().is_admitted("api"));
    Ok(())
}

#[tokio::test]
async fn trace_line_shows_rendered_command() -> TestResult {
    init_tracing();
    let h = Harness::new(test_rule(10), FakeExecutor::new());

    with_timeout(h.scheduler.trigger("test", "./api", "api/x_test.go")).await?;

    let out = h.stdout.contents();
    assert!(out.contains("[test] go test api/x_test.go"), "stdout was: {out:?}");
    Ok(())
}

#[tokio::test]
async fn no_trace_suppresses_trace_line() -> TestResult {
    init_tracing();
    let cfg = ConfigFileBuilder::new()
        .no_trace()
        .with_rule(RuleConfigBuilder::new("test", "go test").build())
        .build();
    let h = Harness::new(cfg, FakeExecutor::new());

    with_timeout(h.scheduler.trigger("test", "./", "a.go")).await?;

    assert_eq!(h.executor.started(), vec!["test"]);
    assert_eq!(h.stdout.contents(), "");
    Ok(())
}

#[tokio::test]
async fn pkg_and_file_overrides_replace_event_values() -> TestResult {
    init_tracing();
    let mut cfg = ConfigFileBuilder::new()
        .with_rule(RuleConfigBuilder::new("test", "go test {PKG} -run {FILE} {PKG}").build())
        .build();
    cfg.pkg_override = Some("./fixed".to_string());
    cfg.file_override = Some("TestOnly".to_string());
    let h = Harness::new(cfg, FakeExecutor::new());

    with_timeout(h.scheduler.trigger("test", "./other", "other/a.go")).await?;

    assert_eq!(
        h.executor.requests()[0].command,
        "go test ./fixed -run TestOnly ./fixed"
    );
    Ok(())
}

#[tokio::test]
async fn unknown_rule_is_an_error() -> TestResult {
    init_tracing();
    let h = Harness::new(test_rule(10), FakeExecutor::new());

    let err = h
        .scheduler
        .trigger("nope", "./", "a.go")
        .await
        .expect_err("unknown rule must fail");
    assert!(matches!(err, rulewatch::errors::RulewatchError::RuleNotFound(ref n) if n == "nope"));
    assert!(h.executor.requests().is_empty());
    Ok(())
}

#[tokio::test]
async fn shutdown_cancels_running_and_waits() -> TestResult {
    init_tracing();
    let executor = FakeExecutor::new().with_duration("test", Duration::from_secs(30));
    let h = Harness::new(test_rule(10), executor);

    h.scheduler.spawn_trigger("test", "./", "a.go");
    with_timeout(h.executor.wait_for_start("test")).await;

    with_timeout(h.scheduler.shutdown()).await;

    assert_eq!(
        h.executor.finished(),
        vec![("test".to_string(), FakeRun::Canceled)]
    );
    assert!(!h.scheduler.registry().is_admitted("test"));

    // Nothing runs after shutdown.
    with_timeout(h.scheduler.trigger("test", "./", "b.go")).await?;
    assert_eq!(h.executor.started().len(), 1);
    Ok(())
}
