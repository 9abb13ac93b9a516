//! Progress reporting for long-running lifecycle operations (build, push, deploy).
//!
//! `Client` methods report through a `&dyn ProgressListener` rather than printing
//! directly, so the CLI can render status lines while library callers can plug in
//! their own listener (or none at all).

use colored::Colorize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub trait ProgressListener: Send + Sync {
    /// Declare how many steps this operation expects to report, for listeners that
    /// render a step counter. A listener that doesn't care may ignore this.
    fn set_total(&self, total: usize);
    /// Advance by one step and report what just happened.
    fn increment(&self, message: &str);
    /// Report a terminal success message and stop expecting further increments.
    fn complete(&self, message: &str);
    /// Report that the operation is being cancelled.
    fn stopping(&self);
    /// Report a terminal failure message.
    fn done(&self, message: &str);
}

/// Prints one colored status line per event to stdout. Safe to share across threads:
/// an internal counter, not the terminal itself, is the only mutable state.
pub struct TerminalProgressListener {
    total: AtomicUsize,
    step: AtomicUsize,
}

impl Default for TerminalProgressListener {
    fn default() -> Self {
        TerminalProgressListener {
            total: AtomicUsize::new(0),
            step: AtomicUsize::new(0),
        }
    }
}

impl TerminalProgressListener {
    pub fn new() -> Self {
        Self::default()
    }

    fn prefix(&self) -> String {
        let total = self.total.load(Ordering::Relaxed);
        if total == 0 {
            String::new()
        } else {
            let step = self.step.fetch_add(1, Ordering::Relaxed) + 1;
            format!("[{step}/{total}] ")
        }
    }
}

impl ProgressListener for TerminalProgressListener {
    fn set_total(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
        self.step.store(0, Ordering::Relaxed);
    }

    fn increment(&self, message: &str) {
        println!("{}{}", self.prefix().bright_black(), message);
    }

    fn complete(&self, message: &str) {
        println!("{} {}", "✓".bright_green(), message.bright_white());
    }

    fn stopping(&self) {
        println!("{}", "stopping...".bright_yellow());
    }

    fn done(&self, message: &str) {
        println!("{} {}", "✗".bright_red(), message.bright_white());
    }
}

/// Collects every reported line in order instead of printing, for tests and for
/// library callers who want to render progress their own way.
#[derive(Default)]
pub struct RecordingProgressListener {
    lines: Mutex<Vec<String>>,
}

impl RecordingProgressListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl ProgressListener for RecordingProgressListener {
    fn set_total(&self, total: usize) {
        self.lines.lock().unwrap().push(format!("total={total}"));
    }
    fn increment(&self, message: &str) {
        self.lines.lock().unwrap().push(format!("+ {message}"));
    }
    fn complete(&self, message: &str) {
        self.lines.lock().unwrap().push(format!("done: {message}"));
    }
    fn stopping(&self) {
        self.lines.lock().unwrap().push("stopping".to_string());
    }
    fn done(&self, message: &str) {
        self.lines.lock().unwrap().push(format!("failed: {message}"));
    }
}

/// Discards every event. The default for non-interactive library use.
pub struct NoopProgressListener;

impl ProgressListener for NoopProgressListener {
    fn set_total(&self, _total: usize) {}
    fn increment(&self, _message: &str) {}
    fn complete(&self, _message: &str) {}
    fn stopping(&self) {}
    fn done(&self, _message: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_listener_preserves_event_order() {
        let listener = RecordingProgressListener::new();
        listener.set_total(2);
        listener.increment("building");
        listener.increment("pushing");
        listener.complete("deployed");
        assert_eq!(
            listener.lines(),
            vec![
                "total=2".to_string(),
                "+ building".to_string(),
                "+ pushing".to_string(),
                "done: deployed".to_string(),
            ]
        );
    }

    #[test]
    fn noop_listener_never_panics() {
        let listener = NoopProgressListener;
        listener.set_total(3);
        listener.increment("x");
        listener.stopping();
        listener.done("y");
    }
}
