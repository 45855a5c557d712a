use crate::core::error::Result;
use crate::core::types::{BEFORE_FIRST, NO_MORE_DOCS, NO_MORE_POSITIONS};
use crate::matchinfo::{HitQueryContext, MatchInfo, RelationInfo};
use crate::spans::buckets::{SpansInBuckets, NO_MORE_BUCKETS};
use crate::spans::{DocPhase, SpanGuarantees, Spans};

/// The clause if its hits are start-sorted, otherwise a sorting wrapper
pub fn ensure_sorted(spans: Box<dyn Spans>) -> Box<dyn Spans> {
    if spans.guarantees().hits_start_point_sorted {
        spans
    } else {
        Box::new(SpansSortedUnique::new(spans, false))
    }
}

/// The clause if its hits are start-sorted and unique, otherwise a wrapper
/// that sorts each document's hits and drops duplicates
pub fn ensure_sorted_unique(spans: Box<dyn Spans>) -> Box<dyn Spans> {
    if spans.guarantees().sorted_unique() {
        spans
    } else {
        Box::new(SpansSortedUnique::new(spans, true))
    }
}

/// Gathers all hits of a document, then replays them sorted by start and end
pub struct SpansSortedUnique {
    buckets: SpansInBuckets,
    unique: bool,
    // None before the first hit
    index: Option<usize>,
    guarantees: SpanGuarantees,
    phase: DocPhase,
}

impl SpansSortedUnique {
    pub fn new(source: Box<dyn Spans>, unique: bool) -> Self {
        let source_guarantees = source.guarantees();
        SpansSortedUnique {
            buckets: SpansInBuckets::sorted(source),
            unique,
            index: None,
            guarantees: SpanGuarantees {
                hits_start_point_sorted: true,
                hits_have_unique_start_end: unique || source_guarantees.hits_have_unique_start_end,
                ..source_guarantees
            },
            phase: DocPhase::Unconfirmed,
        }
    }

    /// Read the whole document; false if it turned out to have no hits
    fn load_doc(&mut self) -> Result<bool> {
        self.index = None;
        let loaded = self.buckets.next_bucket()? != NO_MORE_BUCKETS;
        if loaded {
            self.phase = DocPhase::Confirmed;
        }
        Ok(loaded)
    }
}

impl Spans for SpansSortedUnique {
    fn doc_id(&self) -> i32 {
        self.buckets.doc_id()
    }

    fn next_doc(&mut self) -> Result<i32> {
        loop {
            let doc = self.approximation_next_doc()?;
            if doc == NO_MORE_DOCS || self.matches()? {
                return Ok(doc);
            }
        }
    }

    fn advance(&mut self, target: i32) -> Result<i32> {
        let mut doc = self.approximation_advance(target)?;
        while doc != NO_MORE_DOCS && !self.matches()? {
            doc = self.approximation_next_doc()?;
        }
        Ok(doc)
    }

    fn next_start_position(&mut self) -> Result<i32> {
        debug_assert_eq!(self.phase, DocPhase::Confirmed, "positions read before the document was confirmed");
        let size = self.buckets.bucket_size();
        let mut next = self.index.map_or(0, |i| i + 1);
        if self.unique {
            if let Some(current) = self.index {
                while next < size && self.buckets.hits_equal(current, next) {
                    next += 1;
                }
            }
        }
        self.index = Some(next.min(size));
        Ok(self.start_position())
    }

    fn start_position(&self) -> i32 {
        match self.index {
            None => BEFORE_FIRST,
            Some(i) if i >= self.buckets.bucket_size() => NO_MORE_POSITIONS,
            Some(i) => self.buckets.start_position(i),
        }
    }

    fn end_position(&self) -> i32 {
        match self.index {
            None => BEFORE_FIRST,
            Some(i) if i >= self.buckets.bucket_size() => NO_MORE_POSITIONS,
            Some(i) => self.buckets.end_position(i),
        }
    }

    fn get_match_info(&self, match_info: &mut [Option<MatchInfo>]) {
        if let Some(i) = self.index.filter(|&i| i < self.buckets.bucket_size()) {
            self.buckets.get_match_info(i, match_info);
        }
    }

    fn has_match_info(&self) -> bool {
        self.buckets.has_match_info()
    }

    fn relation_info(&self) -> Option<&RelationInfo> {
        let i = self.index.filter(|&i| i < self.buckets.bucket_size())?;
        self.buckets.relation_info(i)
    }

    fn guarantees(&self) -> SpanGuarantees {
        self.guarantees
    }

    fn set_hit_query_context(&mut self, context: &HitQueryContext) {
        self.buckets.set_hit_query_context(context)
    }

    fn cost(&self) -> i64 {
        self.buckets.cost()
    }

    fn approximation_next_doc(&mut self) -> Result<i32> {
        self.index = None;
        self.phase = DocPhase::Unconfirmed;
        self.buckets.approximation_next_doc()
    }

    fn approximation_advance(&mut self, target: i32) -> Result<i32> {
        self.index = None;
        self.phase = DocPhase::Unconfirmed;
        self.buckets.approximation_advance(target)
    }

    fn matches(&mut self) -> Result<bool> {
        if !self.buckets.matches()? {
            return Ok(false);
        }
        self.load_doc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spans::list::ListSpans;
    use crate::spans::testutil::{collect_hits, collect_hits_two_phase};

    fn unsorted() -> Box<dyn Spans> {
        Box::new(ListSpans::new(vec![(0, 4, 5), (0, 1, 3), (0, 1, 2), (0, 4, 5), (2, 2, 3), (2, 0, 9)]))
    }

    #[test]
    fn sorts_and_dedups_per_document() {
        let mut spans = ensure_sorted_unique(unsorted());
        assert!(spans.guarantees().sorted_unique());
        assert_eq!(
            collect_hits(&mut *spans),
            vec![(0, 1, 2), (0, 1, 3), (0, 4, 5), (2, 0, 9), (2, 2, 3)]
        );
    }

    #[test]
    fn sorting_alone_keeps_duplicates() {
        let mut spans = ensure_sorted(unsorted());
        assert_eq!(collect_hits_two_phase(&mut *spans).len(), 6);
    }

    #[test]
    fn sorted_unique_clause_is_left_alone() {
        let spans = ensure_sorted_unique(Box::new(ListSpans::new(vec![(0, 1, 2), (0, 2, 3)])));
        assert_eq!(spans.cost(), 1);
        assert!(spans.guarantees().hits_all_same_length);
    }
}
