//! Caller-supplied diagnostic value for the record.
//!
//! The fault path must not run application code (an ADC conversion, a
//! driver call) to obtain context: that code may be what faulted. Instead
//! the application publishes its latest reading into a [`DiagnosticCell`]
//! during normal operation and the fault path copies it with one load.

use core::sync::atomic::{AtomicI32, Ordering};

/// Holds the most recent diagnostic sample (battery millivolts, a state
/// counter, whatever the application finds useful after a crash).
#[derive(Debug)]
pub struct DiagnosticCell {
    value: AtomicI32,
}

impl DiagnosticCell {
    /// Value reported when nothing was ever published.
    pub const UNSET: i32 = 0;

    /// Create an empty cell. `const` so it can back a `static`.
    pub const fn new() -> Self {
        Self {
            value: AtomicI32::new(Self::UNSET),
        }
    }

    /// Publish a new sample. Called from normal (non-fault) context.
    pub fn publish(&self, sample: i32) {
        self.value.store(sample, Ordering::Relaxed);
    }

    /// Latest sample. A single load; safe from the fault path.
    pub fn sample(&self) -> i32 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Default for DiagnosticCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::DiagnosticCell;

    #[test]
    fn test_starts_unset() {
        assert_eq!(DiagnosticCell::new().sample(), DiagnosticCell::UNSET);
    }

    #[test]
    fn test_sample_returns_last_published() {
        static CELL: DiagnosticCell = DiagnosticCell::new();
        CELL.publish(3_712);
        CELL.publish(-5);
        assert_eq!(CELL.sample(), -5);
    }
}
