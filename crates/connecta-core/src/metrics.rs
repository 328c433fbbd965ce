//! Process-wide counters.
//!
//! Incremented at the call site; [`Metrics::flush`] emits the current values
//! as one `info!` event at the end of a command.

use std::sync::atomic::{AtomicU64, Ordering};

pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    fetches_issued: AtomicU64,
    sources_failed: AtomicU64,
    reports_built: AtomicU64,
    exports_written: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            fetches_issued: AtomicU64::new(0),
            sources_failed: AtomicU64::new(0),
            reports_built: AtomicU64::new(0),
            exports_written: AtomicU64::new(0),
        }
    }

    pub fn add_fetches(&self, n: u64) {
        self.fetches_issued.fetch_add(n, Ordering::Relaxed);
        tracing::trace!(metric = "fetches_issued", n, "counter incremented");
    }

    pub fn inc_sources_failed(&self) {
        self.sources_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "sources_failed", "counter incremented");
    }

    pub fn inc_reports_built(&self) {
        self.reports_built.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "reports_built", "counter incremented");
    }

    pub fn inc_exports_written(&self) {
        self.exports_written.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "exports_written", "counter incremented");
    }

    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            fetches_issued = self.fetches_issued(),
            sources_failed = self.sources_failed(),
            reports_built = self.reports_built(),
            exports_written = self.exports_written(),
        );
    }

    pub fn fetches_issued(&self) -> u64 {
        self.fetches_issued.load(Ordering::Relaxed)
    }

    pub fn sources_failed(&self) -> u64 {
        self.sources_failed.load(Ordering::Relaxed)
    }

    pub fn reports_built(&self) -> u64 {
        self.reports_built.load(Ordering::Relaxed)
    }

    pub fn exports_written(&self) -> u64 {
        self.exports_written.load(Ordering::Relaxed)
    }

    /// Zero every counter. Tests only.
    pub fn reset(&self) {
        self.fetches_issued.store(0, Ordering::Relaxed);
        self.sources_failed.store(0, Ordering::Relaxed);
        self.reports_built.store(0, Ordering::Relaxed);
        self.exports_written.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A local instance keeps these assertions independent of the global
    // counters other tests touch concurrently.
    #[test]
    fn counters_accumulate_and_reset() {
        let m = Metrics::new();
        m.add_fetches(3);
        m.inc_sources_failed();
        m.inc_reports_built();
        m.inc_exports_written();
        m.inc_exports_written();
        assert_eq!(m.fetches_issued(), 3);
        assert_eq!(m.sources_failed(), 1);
        assert_eq!(m.reports_built(), 1);
        assert_eq!(m.exports_written(), 2);
        m.flush();
        m.reset();
        assert_eq!(m.fetches_issued(), 0);
        assert_eq!(m.exports_written(), 0);
    }
}
