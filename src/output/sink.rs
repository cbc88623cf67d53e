// src/output/sink.rs

//! Non-tearing output from concurrently running rules.
//!
//! The sink keeps one piece of shared state: which stream currently owns
//! the terminal, whether it has an unfinished segment open, and when it last
//! wrote. Producers emit whole lines where possible; a complete line is
//! written and closed under a single lock acquisition, so it can never be
//! split by another producer.
//!
//! A producer that flushes a partial line (a prompt, a progress dot) becomes
//! the owner of an open segment. Other producers wait until the owner
//! finishes the line, closes its stream, or stays silent for longer than the
//! idle release timeout, at which point its segment is closed on its behalf.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::Notify;
use tokio::time::{sleep, timeout};
use tracing::debug;

use crate::output::format::{Formatter, SegmentKind};

/// Silence after which an open segment may be taken over by another stream.
pub const IDLE_RELEASE: Duration = Duration::from_millis(500);

/// Quiet period after which a producer flushes an unterminated line.
pub const PARTIAL_FLUSH: Duration = Duration::from_millis(100);

/// Identity of one output stream: the rule (or other title) plus its kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamId {
    pub title: String,
    pub kind: SegmentKind,
}

impl StreamId {
    pub fn new(title: impl Into<String>, kind: SegmentKind) -> Self {
        Self {
            title: title.into(),
            kind,
        }
    }
}

struct SinkState {
    owner: Option<StreamId>,
    last_write: Instant,
    stdout: Box<dyn Write + Send>,
    stderr: Box<dyn Write + Send>,
}

impl SinkState {
    fn write(&mut self, kind: SegmentKind, text: &str) {
        let writer = if kind.is_stderr() {
            &mut self.stderr
        } else {
            &mut self.stdout
        };
        if let Err(err) = writer.write_all(text.as_bytes()).and_then(|_| writer.flush()) {
            debug!(error = %err, "output write failed");
        }
    }
}

struct SinkInner {
    state: Mutex<SinkState>,
    released: Notify,
    formatter: Formatter,
    idle_release: Duration,
}

/// Shared, cloneable handle to the output state machine.
#[derive(Clone)]
pub struct OutputSink {
    inner: Arc<SinkInner>,
}

impl fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputSink")
            .field("idle_release", &self.inner.idle_release)
            .finish_non_exhaustive()
    }
}

impl OutputSink {
    pub fn new<O, E>(formatter: Formatter, stdout: O, stderr: E) -> Self
    where
        O: Write + Send + 'static,
        E: Write + Send + 'static,
    {
        Self::with_idle_release(formatter, stdout, stderr, IDLE_RELEASE)
    }

    pub fn with_idle_release<O, E>(
        formatter: Formatter,
        stdout: O,
        stderr: E,
        idle_release: Duration,
    ) -> Self
    where
        O: Write + Send + 'static,
        E: Write + Send + 'static,
    {
        Self {
            inner: Arc::new(SinkInner {
                state: Mutex::new(SinkState {
                    owner: None,
                    last_write: Instant::now(),
                    stdout: Box::new(stdout),
                    stderr: Box::new(stderr),
                }),
                released: Notify::new(),
                formatter,
                idle_release,
            }),
        }
    }

    /// Sink writing to the process's own stdout / stderr.
    pub fn stdio(formatter: Formatter) -> Self {
        Self::new(formatter, io::stdout(), io::stderr())
    }

    /// Writer handle for one stream of one rule.
    pub fn stream(&self, title: &str, kind: SegmentKind) -> StreamWriter {
        StreamWriter {
            sink: self.clone(),
            id: StreamId::new(title, kind),
        }
    }

    /// Write a complete, self-contained segment.
    pub async fn line(&self, title: &str, kind: SegmentKind, message: &str) {
        self.emit(&StreamId::new(title, kind), message, true).await;
    }

    /// Write `text` for stream `id`, waiting for the current owner if another
    /// stream has an open segment.
    ///
    /// With `end_of_line` the segment is closed and ownership released;
    /// otherwise `id` keeps ownership until its next write ends the line, its
    /// stream closes, or it goes idle.
    pub async fn emit(&self, id: &StreamId, text: &str, end_of_line: bool) {
        loop {
            let notified = self.inner.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let wait = {
                let mut state = self.lock();
                let wait = match state.owner.clone() {
                    Some(owner) if owner != *id => {
                        let idle_for = state.last_write.elapsed();
                        if idle_for < self.inner.idle_release {
                            Some(self.inner.idle_release - idle_for)
                        } else {
                            debug!(stale = %owner.title, next = %id.title, "taking over idle output segment");
                            self.close_segment(&mut state, &owner);
                            None
                        }
                    }
                    _ => None,
                };
                if wait.is_none() {
                    self.write_segment(&mut state, id, text, end_of_line);
                }
                wait
            };

            match wait {
                None => return,
                Some(remaining) => {
                    tokio::select! {
                        _ = &mut notified => {}
                        _ = sleep(remaining) => {}
                    }
                }
            }
        }
    }

    /// Close `id`'s open segment, if it has one (its stream ended).
    pub fn release(&self, id: &StreamId) {
        let mut state = self.lock();
        if state.owner.as_ref() == Some(id) {
            self.close_segment(&mut state, id);
        }
    }

    /// Whether some stream currently holds an open segment.
    pub fn is_held(&self) -> bool {
        self.lock().owner.is_some()
    }

    fn write_segment(&self, state: &mut SinkState, id: &StreamId, text: &str, end_of_line: bool) {
        let formatter = &self.inner.formatter;
        let mut out = String::new();
        if state.owner.as_ref() != Some(id) {
            out.push_str(&formatter.open(id.kind, &id.title));
        }
        out.push_str(text);

        if end_of_line {
            out.push_str(&formatter.close(id.kind, &id.title));
            state.write(id.kind, &out);
            state.owner = None;
            self.inner.released.notify_waiters();
        } else {
            state.write(id.kind, &out);
            state.owner = Some(id.clone());
            state.last_write = Instant::now();
        }
    }

    fn close_segment(&self, state: &mut SinkState, owner: &StreamId) {
        let close = self.inner.formatter.close(owner.kind, &owner.title);
        state.write(owner.kind, &close);
        state.owner = None;
        self.inner.released.notify_waiters();
    }

    fn lock(&self) -> MutexGuard<'_, SinkState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// One producer's view of the sink: a rule's stdout or stderr.
#[derive(Debug, Clone)]
pub struct StreamWriter {
    sink: OutputSink,
    id: StreamId,
}

impl StreamWriter {
    pub fn id(&self) -> &StreamId {
        &self.id
    }

    /// Copy `reader` into the sink until EOF.
    ///
    /// Complete lines are emitted as they arrive; an unterminated tail is
    /// flushed once the reader has been quiet for [`PARTIAL_FLUSH`].
    pub async fn forward<R>(self, mut reader: R) -> io::Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = [0u8; 4096];
        let mut pending: Vec<u8> = Vec::new();

        let result = loop {
            let read = if pending.is_empty() {
                reader.read(&mut buf).await.map(Some)
            } else {
                match timeout(PARTIAL_FLUSH, reader.read(&mut buf)).await {
                    Ok(res) => res.map(Some),
                    Err(_) => Ok(None),
                }
            };

            match read {
                Ok(Some(0)) => {
                    if !pending.is_empty() {
                        let text = String::from_utf8_lossy(&pending).into_owned();
                        self.sink.emit(&self.id, &text, true).await;
                    }
                    break Ok(());
                }
                Ok(Some(n)) => {
                    pending.extend_from_slice(&buf[..n]);
                    while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
                        let line: Vec<u8> = pending.drain(..=pos).collect();
                        let text = String::from_utf8_lossy(&line[..line.len() - 1]);
                        self.sink
                            .emit(&self.id, text.trim_end_matches('\r'), true)
                            .await;
                    }
                }
                Ok(None) => {
                    // Only flush whole UTF-8 characters.
                    let valid = match std::str::from_utf8(&pending) {
                        Ok(s) => s.len(),
                        Err(e) => e.valid_up_to(),
                    };
                    if valid > 0 {
                        let chunk: Vec<u8> = pending.drain(..valid).collect();
                        let text = String::from_utf8_lossy(&chunk).into_owned();
                        self.sink.emit(&self.id, &text, false).await;
                    }
                }
                Err(err) => break Err(err),
            }
        };

        self.sink.release(&self.id);
        result
    }
}
