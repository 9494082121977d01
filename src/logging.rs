//! Thread-aware logging.
//!
//! The orchestrator drives every guest thread on the same OS thread
//! (cooperative scheduling, not real concurrency), but log output must still
//! read as "this line came from thread 3" rather than one interleaved
//! stream. [`ThreadLogLayer`] is a `tracing_subscriber::Layer` that, like the
//! teacher's `WebSocketLayer`, pulls the message back out of the event and
//! routes it — here to whichever [`LogSink`] is currently active for the
//! running guest thread, falling back to the root sink otherwise.

use std::cell::RefCell;
use std::sync::{Arc, Mutex};

use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// A destination for formatted log lines: either the process's own stdout,
/// or a guest thread's private buffer (captured rather than printed, so
/// multi-threaded guest output can be inspected after the fact).
#[derive(Clone)]
pub enum LogSink {
    Stdout,
    Captured(Arc<Mutex<Vec<String>>>),
}

impl LogSink {
    pub fn captured() -> LogSink {
        LogSink::Captured(Arc::new(Mutex::new(Vec::new())))
    }

    fn write(&self, level: &str, target: &str, msg: &str) {
        match self {
            LogSink::Stdout => println!("[{level}] {target}: {msg}"),
            LogSink::Captured(buf) => {
                buf.lock().unwrap().push(format!("[{level}] {target}: {msg}"));
            }
        }
    }

    /// Snapshot of captured lines; empty for [`LogSink::Stdout`].
    pub fn lines(&self) -> Vec<String> {
        match self {
            LogSink::Stdout => Vec::new(),
            LogSink::Captured(buf) => buf.lock().unwrap().clone(),
        }
    }
}

thread_local! {
    static CURRENT_SINK: RefCell<Option<LogSink>> = const { RefCell::new(None) };
}

/// Run `f` with `sink` installed as the active sink for this OS thread,
/// restoring whatever was active before on return (including on unwind).
pub fn with_sink<R>(sink: LogSink, f: impl FnOnce() -> R) -> R {
    let previous = CURRENT_SINK.with(|cell| cell.replace(Some(sink)));
    let result = f();
    CURRENT_SINK.with(|cell| *cell.borrow_mut() = previous);
    result
}

/// `tracing_subscriber::Layer` that routes every event's message through
/// [`CURRENT_SINK`], or the supplied root sink if none is installed.
pub struct ThreadLogLayer {
    root: LogSink,
}

impl ThreadLogLayer {
    pub fn new(root: LogSink) -> Self {
        Self { root }
    }
}

impl<S: Subscriber> Layer<S> for ThreadLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = match *event.metadata().level() {
            Level::ERROR => "error",
            Level::WARN => "warn",
            Level::INFO => "info",
            Level::DEBUG => "debug",
            Level::TRACE => "trace",
        };

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let Some(msg) = visitor.message else { return };
        let target = event.metadata().target();

        CURRENT_SINK.with(|cell| match &*cell.borrow() {
            Some(sink) => sink.write(level, target, &msg),
            None => self.root.write(level, target, &msg),
        });
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        }
    }
}

/// Emit a normal (non-debug) guest trace line, routed to the current thread's sink.
pub fn nprint(msg: impl std::fmt::Display) {
    tracing::info!(target: "binsim::guest", "{msg}");
}

/// Emit a verbose/debug guest trace line, routed to the current thread's sink.
pub fn dprint(msg: impl std::fmt::Display) {
    tracing::debug!(target: "binsim::guest", "{msg}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captured_sink_collects_lines() {
        let sink = LogSink::captured();
        with_sink(sink.clone(), || {
            sink.write("info", "t", "hello");
        });
        assert_eq!(sink.lines(), vec!["[info] t: hello".to_string()]);
    }

    #[test]
    fn with_sink_restores_previous_on_exit() {
        let outer = LogSink::captured();
        with_sink(outer.clone(), || {
            let inner = LogSink::captured();
            with_sink(inner.clone(), || {
                inner.write("info", "t", "inner");
            });
            CURRENT_SINK.with(|cell| {
                assert!(matches!(&*cell.borrow(), Some(LogSink::Captured(_))));
            });
        });
        CURRENT_SINK.with(|cell| assert!(cell.borrow().is_none()));
    }
}
