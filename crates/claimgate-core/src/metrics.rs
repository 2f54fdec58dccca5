//! Global atomic counters for pipeline observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. before the CLI exits).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters with no allocation and no locking.
pub struct Metrics {
    comparisons: AtomicU64,
    ingestions: AtomicU64,
    attestations: AtomicU64,
    sandbox_runs: AtomicU64,
    promotions_executed: AtomicU64,
    rollbacks: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            comparisons: AtomicU64::new(0),
            ingestions: AtomicU64::new(0),
            attestations: AtomicU64::new(0),
            sandbox_runs: AtomicU64::new(0),
            promotions_executed: AtomicU64::new(0),
            rollbacks: AtomicU64::new(0),
        }
    }

    fn bump(counter: &AtomicU64, name: &'static str) {
        counter.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = name, "counter incremented");
    }

    pub fn inc_comparisons(&self) {
        Self::bump(&self.comparisons, "comparisons");
    }

    pub fn inc_ingestions(&self) {
        Self::bump(&self.ingestions, "ingestions");
    }

    pub fn inc_attestations(&self) {
        Self::bump(&self.attestations, "attestations");
    }

    pub fn inc_sandbox_runs(&self) {
        Self::bump(&self.sandbox_runs, "sandbox_runs");
    }

    /// Counts committed promotions only.
    pub fn inc_promotions_executed(&self) {
        Self::bump(&self.promotions_executed, "promotions_executed");
    }

    pub fn inc_rollbacks(&self) {
        Self::bump(&self.rollbacks, "rollbacks");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            comparisons = self.comparisons(),
            ingestions = self.ingestions(),
            attestations = self.attestations(),
            sandbox_runs = self.sandbox_runs(),
            promotions_executed = self.promotions_executed(),
            rollbacks = self.rollbacks(),
        );
    }

    pub fn comparisons(&self) -> u64 {
        self.comparisons.load(Ordering::Relaxed)
    }

    pub fn ingestions(&self) -> u64 {
        self.ingestions.load(Ordering::Relaxed)
    }

    pub fn attestations(&self) -> u64 {
        self.attestations.load(Ordering::Relaxed)
    }

    pub fn sandbox_runs(&self) -> u64 {
        self.sandbox_runs.load(Ordering::Relaxed)
    }

    pub fn promotions_executed(&self) -> u64 {
        self.promotions_executed.load(Ordering::Relaxed)
    }

    pub fn rollbacks(&self) -> u64 {
        self.rollbacks.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        for counter in [
            &self.comparisons,
            &self.ingestions,
            &self.attestations,
            &self.sandbox_runs,
            &self.promotions_executed,
            &self.rollbacks,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        assert_eq!(m.comparisons(), 0);
        m.inc_comparisons();
        m.inc_comparisons();
        assert_eq!(m.comparisons(), 2);

        m.inc_attestations();
        assert_eq!(m.attestations(), 1);

        m.inc_rollbacks();
        m.inc_promotions_executed();
        assert_eq!(m.rollbacks(), 1);
        assert_eq!(m.promotions_executed(), 1);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_ingestions();
        m.inc_sandbox_runs();
        m.inc_rollbacks();
        m.reset();
        assert_eq!(m.ingestions(), 0);
        assert_eq!(m.sandbox_runs(), 0);
        assert_eq!(m.rollbacks(), 0);
    }
}
