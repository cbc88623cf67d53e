pub mod builders;
pub mod fake_executor;

use std::io::{self, Write};
use std::sync::{Arc, Mutex, Once};

use rulewatch::config::ConfigFile;
use rulewatch::engine::RuleScheduler;
use rulewatch::exec::{EnvResolver, ExecutorBackend};
use rulewatch::fs::mock::MockFileSystem;
use rulewatch::output::{Formatter, OutputSink};
use tracing_subscriber::{fmt, EnvFilter};

pub use builders::{ConfigFileBuilder, RuleConfigBuilder};
pub use fake_executor::{FakeEvent, FakeExecutor, FakeRun};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// In-memory writer shared between the sink and the test.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock().unwrap()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A scheduler wired to a fake executor, a mock filesystem and in-memory
/// plain-text output.
pub struct Harness {
    pub scheduler: RuleScheduler,
    pub executor: FakeExecutor,
    pub fs: MockFileSystem,
    pub stdout: SharedBuffer,
    pub stderr: SharedBuffer,
}

impl Harness {
    pub fn new(config: ConfigFile, executor: FakeExecutor) -> Self {
        let fs = MockFileSystem::new();
        let stdout = SharedBuffer::new();
        let stderr = SharedBuffer::new();
        let sink = OutputSink::new(Formatter::plain(), stdout.clone(), stderr.clone());
        let backend: Arc<dyn ExecutorBackend> = Arc::new(executor.clone());
        let scheduler = RuleScheduler::new(
            config,
            EnvResolver::new(Arc::new(fs.clone())),
            backend,
            sink,
        );
        Self {
            scheduler,
            executor,
            fs,
            stdout,
            stderr,
        }
    }
}
