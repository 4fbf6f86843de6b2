//! Progress sinks.
//!
//! The engine reports what it is doing through a leveled progress callback.
//! A [`ProgressSink`] receives the finished text and routes it somewhere
//! visible: the terminal, the `log` facade, a channel, or memory.

use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

/// Severity of a progress message, ordered from most to least important.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Info,
    Debug,
    Trace,
}

impl Severity {
    /// Maps an engine progress level (`0=ERR`, `1=INFO`, `2=DEBUG`, `3=TRACE`).
    ///
    /// Negative levels are treated as errors and anything above `3` as trace.
    pub fn from_level(level: i32) -> Self {
        match level {
            i32::MIN..=0 => Severity::Error,
            1 => Severity::Info,
            2 => Severity::Debug,
            _ => Severity::Trace,
        }
    }

    pub fn level(self) -> i32 {
        match self {
            Severity::Error => 0,
            Severity::Info => 1,
            Severity::Debug => 2,
            Severity::Trace => 3,
        }
    }

    pub fn as_log_level(self) -> log::Level {
        match self {
            Severity::Error => log::Level::Error,
            Severity::Info => log::Level::Info,
            Severity::Debug => log::Level::Debug,
            Severity::Trace => log::Level::Trace,
        }
    }
}

/// A single diagnostic record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressMessage {
    pub severity: Severity,
    pub text: String,
}

impl ProgressMessage {
    pub fn new(severity: Severity, text: impl Into<String>) -> Self {
        Self {
            severity,
            text: text.into(),
        }
    }
}

/// Receiver of engine and driver diagnostics.
///
/// `emit` may be called from inside any engine call, including while a form
/// is being resolved, so implementations must be reentrant and must not
/// block for longer than a flush.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, severity: Severity, text: &str);
}

impl<S: ProgressSink + ?Sized> ProgressSink for Arc<S> {
    fn emit(&self, severity: Severity, text: &str) {
        (**self).emit(severity, text)
    }
}

fn lock_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ── StreamSink ────────────────────────────────────────────────────────────────

/// Writes errors to one stream and everything else to another.
///
/// Each message is written as one line and flushed while the stream is held,
/// so a concurrent reader never observes half a record.
pub struct StreamSink<O, E> {
    out: Mutex<O>,
    err: Mutex<E>,
    max_severity: Severity,
}

impl StreamSink<io::Stdout, io::Stderr> {
    /// Errors to stderr, all other severities to stdout.
    pub fn stdio() -> Self {
        Self::new(io::stdout(), io::stderr())
    }
}

impl<O: Write, E: Write> StreamSink<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self {
            out: Mutex::new(out),
            err: Mutex::new(err),
            max_severity: Severity::Trace,
        }
    }

    /// Drops messages that are more verbose than `max`.
    pub fn with_max_severity(mut self, max: Severity) -> Self {
        self.max_severity = max;
        self
    }

    pub fn into_inner(self) -> (O, E) {
        let out = self.out.into_inner().unwrap_or_else(|p| p.into_inner());
        let err = self.err.into_inner().unwrap_or_else(|p| p.into_inner());
        (out, err)
    }
}

fn write_record<W: Write>(stream: &mut W, text: &str) {
    let _ = writeln!(stream, "{}", text.trim_end_matches(['\r', '\n']));
    let _ = stream.flush();
}

impl<O: Write + Send, E: Write + Send> ProgressSink for StreamSink<O, E> {
    fn emit(&self, severity: Severity, text: &str) {
        if severity > self.max_severity {
            return;
        }
        match severity {
            Severity::Error => write_record(&mut *lock_recover(&self.err), text),
            _ => write_record(&mut *lock_recover(&self.out), text),
        }
    }
}

// ── LogSink ───────────────────────────────────────────────────────────────────

/// Log target used for forwarded engine progress.
pub const ENGINE_TARGET: &str = "ocauth::engine";

/// Forwards progress to the `log` facade under [`ENGINE_TARGET`].
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn emit(&self, severity: Severity, text: &str) {
        log::log!(
            target: ENGINE_TARGET,
            severity.as_log_level(),
            "{}",
            text.trim_end()
        );
    }
}

// ── ChannelSink ───────────────────────────────────────────────────────────────

/// Sends every message over a crossbeam channel.
///
/// A dropped receiver is not an error; messages are discarded.
#[derive(Clone)]
pub struct ChannelSink {
    tx: Sender<ProgressMessage>,
}

impl ChannelSink {
    pub fn new(tx: Sender<ProgressMessage>) -> Self {
        Self { tx }
    }

    pub fn unbounded() -> (Self, Receiver<ProgressMessage>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self::new(tx), rx)
    }
}

impl ProgressSink for ChannelSink {
    fn emit(&self, severity: Severity, text: &str) {
        let _ = self.tx.send(ProgressMessage::new(severity, text));
    }
}

// ── MemorySink ────────────────────────────────────────────────────────────────

/// Keeps every message in memory.
#[derive(Default)]
pub struct MemorySink {
    messages: Mutex<Vec<ProgressMessage>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<ProgressMessage> {
        lock_recover(&self.messages).clone()
    }

    pub fn count(&self, severity: Severity) -> usize {
        lock_recover(&self.messages)
            .iter()
            .filter(|m| m.severity == severity)
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.count(Severity::Error) > 0
    }
}

impl ProgressSink for MemorySink {
    fn emit(&self, severity: Severity, text: &str) {
        lock_recover(&self.messages).push(ProgressMessage::new(severity, text));
    }
}

// ── TeeSink ───────────────────────────────────────────────────────────────────

/// Delivers each message to several sinks, in the order they were added.
#[derive(Default)]
pub struct TeeSink {
    sinks: Vec<Arc<dyn ProgressSink>>,
}

impl TeeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl ProgressSink for TeeSink {
    fn emit(&self, severity: Severity, text: &str) {
        for sink in &self.sinks {
            sink.emit(severity, text);
        }
    }
}
