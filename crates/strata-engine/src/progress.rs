//! Progress reporting for long-running operations.
//!
//! A sink is passed into the engine explicitly; the engine never prints.

/// Receives coarse progress events from create/apply/validate.
pub trait ProgressSink: Send + Sync {
    /// A new phase started, with an expected number of steps (0 = unknown).
    fn begin(&self, phase: &str, total: u64);

    /// `amount` steps of the current phase completed.
    fn advance(&self, amount: u64);
}

/// Discards all progress events.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn begin(&self, _phase: &str, _total: u64) {}
    fn advance(&self, _amount: u64) {}
}
