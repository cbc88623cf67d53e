// src/output/mod.rs

//! Rule output: the non-tearing sink and its templates.

pub mod format;
pub mod sink;

pub use format::{Formatter, SegmentKind};
pub use sink::{OutputSink, StreamId, StreamWriter};
