#![cfg(target_os = "linux")]

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use rulewatch::watch::{spawn_watcher, Dispatcher, PatternCache};
use rulewatch_test_utils::{
    init_tracing, with_timeout, ConfigFileBuilder, FakeExecutor, Harness, RuleConfigBuilder,
};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn removed_directory_never_triggers() -> TestResult {
    init_tracing();
    let tmp = tempfile::tempdir()?;
    let root = tmp.path().canonicalize()?;
    std::fs::create_dir(root.join("build_out"))?;

    let cfg = ConfigFileBuilder::new()
        .with_rule(
            RuleConfigBuilder::new("outputs", "x {FILE}")
                .matching("build_out")
                .build(),
        )
        .with_rule(
            RuleConfigBuilder::new("marker", "seen {FILE}")
                .matching(r"done\.txt$")
                .build(),
        )
        .build();
    let h = Harness::new(cfg, FakeExecutor::new());
    let dispatcher = Arc::new(Dispatcher::new(
        root.clone(),
        Arc::new(PatternCache::new()),
        h.scheduler.clone(),
    ));
    let _watcher = spawn_watcher(dispatcher)?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    std::fs::remove_dir(root.join("build_out"))?;
    tokio::time::sleep(Duration::from_millis(200)).await;
    // Events are dispatched in order, so once this file's rule has started
    // the removal has already been handled.
    std::fs::write(root.join("done.txt"), "x")?;

    with_timeout(h.executor.wait_for_start("marker")).await;
    with_timeout(h.scheduler.drain()).await;

    let requests = h.executor.requests();
    assert!(
        requests.iter().all(|r| r.rule == "marker"),
        "directory removal dispatched: {requests:?}"
    );
    let expected = format!("seen {}", root.join("done.txt").display());
    assert!(requests.iter().any(|r| r.command == expected), "requests: {requests:?}");
    Ok(())
}
