use std::error::Error;
use std::time::{Duration, Instant};

use rulewatch::config::FormatSection;
use rulewatch::output::{Formatter, OutputSink, SegmentKind, StreamId};
use rulewatch_test_utils::{init_tracing, with_timeout, SharedBuffer};

type TestResult = Result<(), Box<dyn Error>>;

/// Formatter without timestamps so output can be compared exactly.
fn bare() -> Formatter {
    let tpl = "[{{.Title}}] {{.Message}}\n".to_string();
    Formatter::plain().with_overrides(&FormatSection {
        ok: Some(tpl.clone()),
        fail: Some(tpl.clone()),
        command_ok: Some(tpl.clone()),
        command_err: Some(tpl),
        time: None,
    })
}

#[tokio::test]
async fn concurrent_producers_never_tear_lines() -> TestResult {
    init_tracing();
    let out = SharedBuffer::new();
    let sink = OutputSink::new(bare(), out.clone(), SharedBuffer::new());

    let a_line = "a".repeat(64);
    let b_line = "b".repeat(64);
    let a_input = format!("{a_line}\n").repeat(200);
    let b_input = format!("{b_line}\n").repeat(200);

    let a = sink.stream("one", SegmentKind::CommandOut);
    let b = sink.stream("two", SegmentKind::CommandOut);
    let (ra, rb) = with_timeout(async {
        tokio::join!(
            tokio::spawn(async move { a.forward(a_input.as_bytes()).await }),
            tokio::spawn(async move { b.forward(b_input.as_bytes()).await }),
        )
    })
    .await;
    ra??;
    rb??;

    let lines = out.lines();
    assert_eq!(lines.len(), 400);
    let expected_a = format!("[one] {a_line}");
    let expected_b = format!("[two] {b_line}");
    for line in &lines {
        assert!(*line == expected_a || *line == expected_b, "torn line: {line:?}");
    }
    Ok(())
}

#[tokio::test]
async fn open_segment_blocks_others_until_line_ends() -> TestResult {
    init_tracing();
    let out = SharedBuffer::new();
    let sink = OutputSink::with_idle_release(bare(), out.clone(), SharedBuffer::new(), Duration::from_secs(10));

    let prompt = StreamId::new("shell", SegmentKind::CommandOut);
    sink.emit(&prompt, "password: ", false).await;
    assert!(sink.is_held());

    let other = {
        let sink = sink.clone();
        tokio::spawn(async move { sink.line("build", SegmentKind::Ok, "started").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(out.contents(), "[shell] password: ");

    sink.emit(&prompt, "ok", true).await;
    with_timeout(other).await?;

    assert_eq!(out.contents(), "[shell] password: ok\n[build] started\n");
    assert!(!sink.is_held());
    Ok(())
}

#[tokio::test]
async fn idle_owner_is_closed_and_replaced() -> TestResult {
    init_tracing();
    let out = SharedBuffer::new();
    let idle = Duration::from_millis(150);
    let sink = OutputSink::with_idle_release(bare(), out.clone(), SharedBuffer::new(), idle);

    let slow = StreamId::new("slow", SegmentKind::CommandOut);
    sink.emit(&slow, "working...", false).await;

    let started = Instant::now();
    with_timeout(sink.line("fast", SegmentKind::CommandOut, "done")).await;
    assert!(started.elapsed() >= Duration::from_millis(100));

    // The stale owner re-opens its segment on its next write.
    sink.emit(&slow, "finished", true).await;

    assert_eq!(
        out.contents(),
        "[slow] working...\n[fast] done\n[slow] finished\n"
    );
    Ok(())
}

#[tokio::test]
async fn closed_stream_releases_its_segment() -> TestResult {
    init_tracing();
    let out = SharedBuffer::new();
    let sink = OutputSink::with_idle_release(bare(), out.clone(), SharedBuffer::new(), Duration::from_secs(10));

    // No trailing newline: flushed as a partial, closed at EOF.
    let writer = sink.stream("job", SegmentKind::CommandOut);
    with_timeout(writer.forward(&b"line one\r\nno newline"[..])).await?;

    assert!(!sink.is_held());
    assert_eq!(out.contents(), "[job] line one\n[job] no newline\n");
    Ok(())
}

#[tokio::test]
async fn failures_go_to_stderr() -> TestResult {
    init_tracing();
    let out = SharedBuffer::new();
    let err = SharedBuffer::new();
    let sink = OutputSink::new(bare(), out.clone(), err.clone());

    sink.line("build", SegmentKind::Fail, "exit status 1").await;
    sink.line("build", SegmentKind::CommandErr, "warning").await;

    assert_eq!(out.contents(), "");
    assert_eq!(err.contents(), "[build] exit status 1\n[build] warning\n");
    Ok(())
}
