//! Span iterators: lazily evaluated cursors over (doc, start, end) hits.
//!
//! A spans tree is built per segment. Leaves read postings; every other
//! operator wraps one or more clauses and changes which hits come out,
//! where they start and end, and what they capture.
//!
//! Protocol, per spans object:
//! - `next_doc`/`advance` move to a document and reset the position to -1
//! - `next_start_position`/`advance_start_position` move to the next hit in
//!   that document, returning [`NO_MORE_POSITIONS`] at the end
//! - `start_position`/`end_position`/`get_match_info` describe the current hit
//!
//! Two-phase iteration: `approximation_next_doc`/`approximation_advance` may
//! stop on documents that don't really match; `matches` confirms the
//! document and must return true before positions are read. Spans without
//! a cheaper approximation use the exact methods for both.

pub mod adjust;
pub mod and_filtered;
pub mod buckets;
pub mod buffered;
pub mod capture_between;
pub mod capture_group;
pub mod capture_overlapping;
pub mod fetch_all;
pub mod filter;
pub mod list;
pub mod other_field;
pub mod query;
pub mod relations;
pub mod sorted_unique;
pub mod term;

use crate::core::error::Result;
use crate::core::types::NO_MORE_POSITIONS;
use crate::matchinfo::{HitQueryContext, MatchInfo, RelationInfo};

pub use adjust::SpansAdjustHits;
pub use and_filtered::{SpansAndFiltered, SpansFilter};
pub use buckets::{BucketStrategy, SpansInBuckets};
pub use buffered::SpansBuffered;
pub use capture_between::{SpansCaptureRelationsBetweenSpans, Target};
pub use capture_group::SpansCaptureGroup;
pub use capture_overlapping::{OverlappingSpansCapturer, SpansCaptureOverlappingSpans};
pub use fetch_all::fetch_all_segment_hits;
pub use filter::{Accept, FilterSpans, HitFilter};
pub use list::ListSpans;
pub use other_field::SpansOtherFieldHits;
pub use query::SpanQuery;
pub use relations::SpansRelations;
pub use sorted_unique::ensure_sorted_unique;
pub use term::TermSpans;

/// What a spans object promises about the order and shape of its hits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanGuarantees {
    pub hits_start_point_sorted: bool,
    pub hits_all_same_length: bool,
    pub hits_have_unique_start_end: bool,
}

impl SpanGuarantees {
    /// One hit per term occurrence
    pub const TERM: SpanGuarantees = SpanGuarantees {
        hits_start_point_sorted: true,
        hits_all_same_length: true,
        hits_have_unique_start_end: true,
    };

    pub const NONE: SpanGuarantees = SpanGuarantees {
        hits_start_point_sorted: false,
        hits_all_same_length: false,
        hits_have_unique_start_end: false,
    };

    pub fn sorted_unique(&self) -> bool {
        self.hits_start_point_sorted && self.hits_have_unique_start_end
    }
}

pub trait Spans: Send {
    fn doc_id(&self) -> i32;

    fn next_doc(&mut self) -> Result<i32>;

    /// First doc >= target
    fn advance(&mut self, target: i32) -> Result<i32>;

    fn next_start_position(&mut self) -> Result<i32>;

    /// First hit with start >= target. Only skips ahead when hits are known to
    /// be start-sorted; otherwise steps one hit at a time.
    fn advance_start_position(&mut self, target: i32) -> Result<i32> {
        naive_advance_start_position(self, target)
    }

    /// -1 before the first hit in a document
    fn start_position(&self) -> i32;

    fn end_position(&self) -> i32;

    /// Fill the slots this subtree owns; other slots are left alone
    fn get_match_info(&self, _match_info: &mut [Option<MatchInfo>]) {}

    fn has_match_info(&self) -> bool {
        false
    }

    /// The relation the current hit is about, if any
    fn relation_info(&self) -> Option<&RelationInfo> {
        None
    }

    fn guarantees(&self) -> SpanGuarantees;

    /// Register captures with the query-wide registry. Called once, before
    /// iterating.
    fn set_hit_query_context(&mut self, _context: &HitQueryContext) {}

    fn cost(&self) -> i64;

    /// Raw payload at the current position, for spans that read postings
    fn payload(&self) -> Option<&[u8]> {
        None
    }

    /// Indexed term at the current position, for spans that read postings
    fn term(&self) -> Option<&str> {
        None
    }

    fn approximation_next_doc(&mut self) -> Result<i32> {
        self.next_doc()
    }

    fn approximation_advance(&mut self, target: i32) -> Result<i32> {
        self.advance(target)
    }

    /// Confirm the document the approximation stopped on
    fn matches(&mut self) -> Result<bool> {
        Ok(true)
    }
}

impl<S: Spans + ?Sized> Spans for Box<S> {
    fn doc_id(&self) -> i32 {
        (**self).doc_id()
    }

    fn next_doc(&mut self) -> Result<i32> {
        (**self).next_doc()
    }

    fn advance(&mut self, target: i32) -> Result<i32> {
        (**self).advance(target)
    }

    fn next_start_position(&mut self) -> Result<i32> {
        (**self).next_start_position()
    }

    fn advance_start_position(&mut self, target: i32) -> Result<i32> {
        (**self).advance_start_position(target)
    }

    fn start_position(&self) -> i32 {
        (**self).start_position()
    }

    fn end_position(&self) -> i32 {
        (**self).end_position()
    }

    fn get_match_info(&self, match_info: &mut [Option<MatchInfo>]) {
        (**self).get_match_info(match_info)
    }

    fn has_match_info(&self) -> bool {
        (**self).has_match_info()
    }

    fn relation_info(&self) -> Option<&RelationInfo> {
        (**self).relation_info()
    }

    fn guarantees(&self) -> SpanGuarantees {
        (**self).guarantees()
    }

    fn set_hit_query_context(&mut self, context: &HitQueryContext) {
        (**self).set_hit_query_context(context)
    }

    fn cost(&self) -> i64 {
        (**self).cost()
    }

    fn payload(&self) -> Option<&[u8]> {
        (**self).payload()
    }

    fn term(&self) -> Option<&str> {
        (**self).term()
    }

    fn approximation_next_doc(&mut self) -> Result<i32> {
        (**self).approximation_next_doc()
    }

    fn approximation_advance(&mut self, target: i32) -> Result<i32> {
        (**self).approximation_advance(target)
    }

    fn matches(&mut self) -> Result<bool> {
        (**self).matches()
    }
}

/// Step through hits until one starts at or after target. Always moves at
/// least one hit, even if the current one already qualifies.
pub fn naive_advance_start_position<S: Spans + ?Sized>(spans: &mut S, target: i32) -> Result<i32> {
    if spans.start_position() == NO_MORE_POSITIONS {
        return Ok(NO_MORE_POSITIONS);
    }
    loop {
        let start = spans.next_start_position()?;
        if start >= target {
            return Ok(start);
        }
    }
}

/// Where a two-phase iterator stands in the current document. Only tracked
/// to catch protocol misuse in debug builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DocPhase {
    /// Not on a document, or the approximation stopped on one not yet confirmed
    Unconfirmed,
    /// `matches` returned true, or the exact iterator was used
    Confirmed,
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use crate::core::types::NO_MORE_DOCS;

    /// All (doc, start, end) hits of a spans, using the exact iterator
    pub fn collect_hits(spans: &mut dyn Spans) -> Vec<(i32, i32, i32)> {
        let mut hits = Vec::new();
        while spans.next_doc().unwrap() != NO_MORE_DOCS {
            loop {
                let start = spans.next_start_position().unwrap();
                if start == NO_MORE_POSITIONS {
                    break;
                }
                hits.push((spans.doc_id(), start, spans.end_position()));
            }
        }
        hits
    }

    /// Same, through approximation and confirmation
    pub fn collect_hits_two_phase(spans: &mut dyn Spans) -> Vec<(i32, i32, i32)> {
        let mut hits = Vec::new();
        while spans.approximation_next_doc().unwrap() != NO_MORE_DOCS {
            if !spans.matches().unwrap() {
                continue;
            }
            loop {
                let start = spans.next_start_position().unwrap();
                if start == NO_MORE_POSITIONS {
                    break;
                }
                hits.push((spans.doc_id(), start, spans.end_position()));
            }
        }
        hits
    }
}
