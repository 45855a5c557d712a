use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

/// Whether collection stopped early because of a configured limit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaxStats {
    pub hits_processed_exceeded: bool,
    pub hits_counted_exceeded: bool,
}

impl MaxStats {
    pub fn exceeded(&self) -> bool {
        self.hits_processed_exceeded || self.hits_counted_exceeded
    }
}

/// Counters of a running search, updated by fetch workers and read by
/// anyone. The processed count is always raised before the counted count,
/// so a reader never sees counting finished while processing lags behind.
#[derive(Debug, Default)]
pub struct ResultsStats {
    processed: AtomicI64,
    counted: AtomicI64,
    docs_processed: AtomicI64,
    docs_counted: AtomicI64,
    processed_exceeded: AtomicBool,
    counted_exceeded: AtomicBool,
    done: AtomicBool,
}

impl ResultsStats {
    pub fn new() -> Self {
        ResultsStats::default()
    }

    /// Record a document's worth of hits; `stored` is false once past the
    /// process limit (the hits were only counted)
    pub(crate) fn add_document(&self, hits: i64, stored: bool) {
        if stored {
            self.processed.fetch_add(hits, Ordering::AcqRel);
            self.docs_processed.fetch_add(1, Ordering::AcqRel);
        }
        self.counted.fetch_add(hits, Ordering::AcqRel);
        self.docs_counted.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn set_processed_exceeded(&self) {
        self.processed_exceeded.store(true, Ordering::Release);
    }

    pub(crate) fn set_counted_exceeded(&self) {
        self.counted_exceeded.store(true, Ordering::Release);
    }

    pub(crate) fn set_done(&self) {
        self.done.store(true, Ordering::Release);
    }

    pub fn processed_so_far(&self) -> i64 {
        self.processed.load(Ordering::Acquire)
    }

    pub fn counted_so_far(&self) -> i64 {
        self.counted.load(Ordering::Acquire)
    }

    pub fn docs_processed_so_far(&self) -> i64 {
        self.docs_processed.load(Ordering::Acquire)
    }

    pub fn docs_counted_so_far(&self) -> i64 {
        self.docs_counted.load(Ordering::Acquire)
    }

    pub fn done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// At least `n` hits stored so far, without waiting for more
    pub fn processed_at_least(&self, n: i64) -> bool {
        self.processed_so_far() >= n
    }

    pub fn max_stats(&self) -> MaxStats {
        MaxStats {
            hits_processed_exceeded: self.processed_exceeded.load(Ordering::Acquire),
            hits_counted_exceeded: self.counted_exceeded.load(Ordering::Acquire),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counting_only_documents() {
        let stats = ResultsStats::new();
        stats.add_document(3, true);
        stats.add_document(2, false);
        stats.set_processed_exceeded();
        assert_eq!(stats.processed_so_far(), 3);
        assert_eq!(stats.counted_so_far(), 5);
        assert_eq!(stats.docs_processed_so_far(), 1);
        assert_eq!(stats.docs_counted_so_far(), 2);
        assert!(stats.processed_at_least(3));
        assert!(!stats.processed_at_least(4));
        assert!(stats.max_stats().exceeded());
        assert!(!stats.max_stats().hits_counted_exceeded);
        assert!(!stats.done());
    }
}
