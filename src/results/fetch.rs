use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use parking_lot::Mutex;
use tracing::{debug, instrument, trace};
use crate::core::abort::AbortFlag;
use crate::core::config::SearchConfig;
use crate::core::error::{Error, Result};
use crate::core::types::NO_MORE_DOCS;
use crate::index::segment::IndexSegment;
use crate::matchinfo::{HitQueryContext, MatchInfoDefs};
use crate::parallel::pool::SegmentPool;
use crate::results::hit::Hit;
use crate::results::stats::ResultsStats;
use crate::results::store::{HitsBuilder, HitsStore, SharedHits};
use crate::spans::fetch_all::{collect_document, PreviousHit};
use crate::spans::query::SpanQuery;
use crate::spans::Spans;

/// State shared by every segment worker of one search
struct FetchShared {
    hits: SharedHits,
    stats: ResultsStats,
    // Stop (pause) once this many hits are stored
    requested: AtomicI64,
    max_hits_to_process: i64,
    max_hits_to_count: i64,
    abort: AbortFlag,
}

/// Hits of one segment, read a document at a time. Stores hits while the
/// search is under its process limit and only counts them beyond it.
struct SegmentFetch {
    segment: Arc<dyn IndexSegment>,
    // None once the segment has no more hits to give
    spans: Option<Box<dyn Spans>>,
    match_info_slots: Option<usize>,
    previous: PreviousHit,
    batch: HitsBuilder,
    hits_counted: i64,
}

impl SegmentFetch {
    fn is_done(&self) -> bool {
        self.spans.is_none()
    }

    #[instrument(skip_all, fields(segment = self.segment.ord()))]
    fn run(&mut self, shared: &FetchShared) -> Result<()> {
        let Some(spans) = self.spans.as_mut() else {
            return Ok(());
        };
        let doc_base = self.segment.doc_base();
        loop {
            if shared.stats.processed_so_far() >= shared.requested.load(Ordering::Acquire) {
                trace!("enough hits for now");
                return Ok(());
            }
            shared.abort.check()?;

            let doc = spans.approximation_next_doc()?;
            if doc == NO_MORE_DOCS {
                break;
            }
            if !self.segment.is_live(doc) || !spans.matches()? {
                continue;
            }
            self.batch.clear();
            let n = collect_document(
                spans.as_mut(),
                self.match_info_slots,
                doc_base,
                &mut self.batch,
                &mut self.previous,
            )? as i64;
            if n == 0 {
                continue;
            }

            if shared.stats.counted_so_far() >= shared.max_hits_to_count {
                shared.stats.set_counted_exceeded();
                break;
            }
            let storing = shared.stats.processed_so_far() < shared.max_hits_to_process;
            if storing {
                shared.hits.add_all(&self.batch)?;
            } else {
                shared.stats.set_processed_exceeded();
            }
            shared.stats.add_document(n, storing);
            self.hits_counted += n;
        }
        debug!(hits = self.hits_counted, "segment finished");
        self.spans = None;
        Ok(())
    }
}

/// Collects the hits of a query over a set of segments on demand, in
/// parallel. One caller at a time fetches; others wait for it by polling.
pub struct HitFetcher {
    shared: FetchShared,
    fetches: Mutex<Vec<SegmentFetch>>,
    failure: Mutex<Option<Error>>,
    pool: SegmentPool,
    context: HitQueryContext,
    fetch_hits_min: i64,
    polling: Duration,
}

impl HitFetcher {
    pub fn new(
        query: &dyn SpanQuery,
        segments: &[Arc<dyn IndexSegment>],
        config: &SearchConfig,
        abort: AbortFlag,
    ) -> Result<Self> {
        let context = HitQueryContext::new(query.field(), MatchInfoDefs::new());
        let mut fetches = Vec::new();
        for segment in segments {
            let Some(mut spans) = query.spans(segment)? else {
                continue;
            };
            spans.set_hit_query_context(&context);
            fetches.push(SegmentFetch {
                segment: segment.clone(),
                spans: Some(spans),
                match_info_slots: None,
                previous: None,
                batch: HitsBuilder::new(),
                hits_counted: 0,
            });
        }
        // Every segment has registered its captures by now
        let slots = context.number_of_match_infos();
        for fetch in &mut fetches {
            fetch.match_info_slots = (slots > 0).then_some(slots);
        }
        debug!(segments = segments.len(), with_hits = fetches.len(), captures = slots, "hit fetcher created");

        let shared = FetchShared {
            hits: SharedHits::new(),
            stats: ResultsStats::new(),
            requested: AtomicI64::new(0),
            max_hits_to_process: config.max_hits_to_process,
            max_hits_to_count: config.max_hits_to_count,
            abort,
        };
        if fetches.is_empty() {
            shared.stats.set_done();
        }
        Ok(HitFetcher {
            shared,
            fetches: Mutex::new(fetches),
            failure: Mutex::new(None),
            pool: SegmentPool::new(config.max_threads_per_search)?,
            context,
            fetch_hits_min: config.fetch_hits_min.max(0),
            polling: Duration::from_millis(config.hit_polling_ms.max(1)),
        })
    }

    // A failure is recorded before the stats are marked done, so reading it
    // after seeing `done()` never misses it
    fn check_failure(&self) -> Result<()> {
        match self.failure.lock().as_ref() {
            Some(e) => Err(Error::new(e.kind, e.context.clone())),
            None => Ok(()),
        }
    }

    /// Make sure at least `n` hits are stored, or all of them if `n` is
    /// negative (or there are fewer). Blocks while another caller fetches.
    pub fn ensure_results_read(&self, n: i64) -> Result<()> {
        let target = if n < 0 { i64::MAX } else { n.saturating_add(self.fetch_hits_min) };
        loop {
            self.check_failure()?;
            let stats = &self.shared.stats;
            if stats.done() || (n >= 0 && stats.processed_at_least(n)) {
                return self.check_failure();
            }
            let Some(mut fetches) = self.fetches.try_lock() else {
                std::thread::sleep(self.polling);
                continue;
            };
            if stats.done() {
                return self.check_failure();
            }
            self.shared.requested.fetch_max(target, Ordering::AcqRel);
            let pending = std::mem::take(&mut *fetches);
            match self.pool.run(pending, |fetch: &mut SegmentFetch| fetch.run(&self.shared)) {
                Ok(remaining) => {
                    fetches.extend(remaining.into_iter().filter(|f| !f.is_done()));
                    if fetches.is_empty() {
                        stats.set_done();
                        debug!(
                            processed = stats.processed_so_far(),
                            counted = stats.counted_so_far(),
                            "all segments finished"
                        );
                    }
                }
                Err(e) => {
                    *self.failure.lock() = Some(Error::new(e.kind, e.context.clone()));
                    stats.set_done();
                    return Err(e);
                }
            }
        }
    }

    pub fn stats(&self) -> &ResultsStats {
        &self.shared.stats
    }

    pub fn context(&self) -> &HitQueryContext {
        &self.context
    }

    pub fn match_info_defs(&self) -> &Arc<MatchInfoDefs> {
        self.context.defs()
    }

    /// Are there at least `n` hits? Fetches as many as needed to tell.
    pub fn processed_at_least(&self, n: i64) -> Result<bool> {
        self.ensure_results_read(n)?;
        Ok(self.shared.stats.processed_at_least(n))
    }

    /// Hit `index`, fetching up to it if needed
    pub fn get(&self, index: usize) -> Result<Option<Hit>> {
        self.ensure_results_read(index as i64 + 1)?;
        Ok(self.shared.hits.get(index))
    }

    /// Total number of stored hits
    pub fn size(&self) -> Result<i64> {
        self.ensure_results_read(-1)?;
        Ok(self.shared.stats.processed_so_far())
    }

    /// Hits stored so far, without fetching more
    pub fn hits_so_far(&self) -> HitsStore {
        self.shared.hits.snapshot()
    }

    /// Stored hits in `range`, without fetching more
    pub fn hits_range(&self, range: Range<usize>) -> HitsStore {
        self.shared.hits.range(range)
    }

    /// Fetch everything and hand over the hits
    pub fn into_store(self) -> Result<HitsStore> {
        self.ensure_results_read(-1)?;
        Ok(self.shared.hits.freeze())
    }
}
