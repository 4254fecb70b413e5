//! Console progress reporting.
//!
//! Implements the engine's [`ProgressSink`] by rewriting one stderr line
//! per phase.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use strata_engine::ProgressSink;

/// Progress sink that renders `phase: N/M` on stderr.
pub struct ConsoleProgress {
    phase: Mutex<String>,
    total: AtomicU64,
    done: AtomicU64,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self {
            phase: Mutex::new(String::new()),
            total: AtomicU64::new(0),
            done: AtomicU64::new(0),
        }
    }

    /// Start a phase directly (used by commands that drive their own loop).
    pub fn begin_phase(&self, phase: &str, total: u64) {
        self.begin(phase, total);
    }

    /// Advance directly (used by commands that drive their own loop).
    pub fn advance_by(&self, amount: u64) {
        self.advance(amount);
    }

    /// Terminate the progress line before normal println output.
    pub fn finish(&self) {
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err);
    }

    fn render(&self) {
        let phase = self.phase.lock().expect("progress lock poisoned");
        let done = self.done.load(Ordering::Relaxed);
        let total = self.total.load(Ordering::Relaxed);

        let mut err = std::io::stderr().lock();
        if total > 0 {
            let pct = (done * 100) / total;
            let _ = write!(err, "\r{phase}: {done}/{total} ({pct}%)   ");
        } else {
            let _ = write!(err, "\r{phase}: {done}   ");
        }
        let _ = err.flush();
    }
}

impl ProgressSink for ConsoleProgress {
    fn begin(&self, phase: &str, total: u64) {
        *self.phase.lock().expect("progress lock poisoned") = phase.to_string();
        self.total.store(total, Ordering::Relaxed);
        self.done.store(0, Ordering::Relaxed);
        self.render();
    }

    fn advance(&self, amount: u64) {
        self.done.fetch_add(amount, Ordering::Relaxed);
        self.render();
    }
}
