use std::sync::Arc;
use crate::core::error::Result;
use crate::core::types::{BEFORE_FIRST, NO_MORE_POSITIONS};
use crate::matchinfo::{merge_into, HitQueryContext, MatchInfo, RelationInfo};
use crate::spans::{SpanGuarantees, Spans};

/// Returned by `next_bucket` when the document has no more buckets
pub const NO_MORE_BUCKETS: i32 = NO_MORE_POSITIONS;

/// How hits are grouped into buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketStrategy {
    /// Chains of hits where each starts where the previous one ended
    Consecutive,
    /// Every hit in the document, in source order
    PerDocument,
    /// Every hit in the document, ordered by start (or end) point
    PerDocumentSorted { by_start: bool },
    /// Runs of hits with identical start and end; optionally keeps each
    /// member's payload and term
    SameStartEnd { collect_payloads: bool },
}

/// Groups the hits of a source into buckets, one bucket at a time.
///
/// Per document: `next_doc` (or a confirmed two-phase match), then
/// `next_bucket` until it returns [`NO_MORE_BUCKETS`]. The first position of
/// the source is only read by the first `next_bucket`, so the document can
/// be confirmed without touching positions. Gathering stops on the first
/// hit that doesn't belong, which then starts the next bucket.
pub struct SpansInBuckets {
    source: Box<dyn Spans>,
    strategy: BucketStrategy,
    before_first_bucket_hit: bool,
    context: Option<HitQueryContext>,
    do_match_info: bool,

    starts: Vec<i32>,
    ends: Vec<i32>,
    match_infos: Vec<Vec<Option<MatchInfo>>>,
    relations: Vec<Option<RelationInfo>>,
    payloads: Vec<Option<Vec<u8>>>,
    terms: Vec<Option<Arc<str>>>,
    // Bucket index -> storage index, for sorted buckets
    order: Vec<usize>,
}

impl SpansInBuckets {
    pub fn new(source: Box<dyn Spans>, strategy: BucketStrategy) -> Self {
        SpansInBuckets {
            source,
            strategy,
            before_first_bucket_hit: false,
            context: None,
            do_match_info: false,
            starts: Vec::new(),
            ends: Vec::new(),
            match_infos: Vec::new(),
            relations: Vec::new(),
            payloads: Vec::new(),
            terms: Vec::new(),
            order: Vec::new(),
        }
    }

    /// Per-document buckets in start order; skips the sort when the source is
    /// already start-sorted
    pub fn sorted(source: Box<dyn Spans>) -> Self {
        let strategy = if source.guarantees().hits_start_point_sorted {
            BucketStrategy::PerDocument
        } else {
            BucketStrategy::PerDocumentSorted { by_start: true }
        };
        SpansInBuckets::new(source, strategy)
    }

    pub fn strategy(&self) -> BucketStrategy {
        self.strategy
    }

    pub fn doc_id(&self) -> i32 {
        self.source.doc_id()
    }

    pub fn next_doc(&mut self) -> Result<i32> {
        self.prepare_for_first_bucket();
        self.source.next_doc()
    }

    pub fn advance(&mut self, target: i32) -> Result<i32> {
        self.prepare_for_first_bucket();
        self.source.advance(target)
    }

    pub fn approximation_next_doc(&mut self) -> Result<i32> {
        self.prepare_for_first_bucket();
        self.source.approximation_next_doc()
    }

    pub fn approximation_advance(&mut self, target: i32) -> Result<i32> {
        self.prepare_for_first_bucket();
        self.source.approximation_advance(target)
    }

    pub fn matches(&mut self) -> Result<bool> {
        self.prepare_for_first_bucket();
        self.source.matches()
    }

    pub fn cost(&self) -> i64 {
        self.source.cost()
    }

    fn prepare_for_first_bucket(&mut self) {
        self.before_first_bucket_hit = true;
        self.clear_bucket();
    }

    fn clear_bucket(&mut self) {
        self.starts.clear();
        self.ends.clear();
        self.match_infos.clear();
        self.relations.clear();
        self.payloads.clear();
        self.terms.clear();
        self.order.clear();
    }

    fn ensure_at_first_hit(&mut self) -> Result<()> {
        if self.before_first_bucket_hit {
            self.before_first_bucket_hit = false;
            if self.source.start_position() == BEFORE_FIRST {
                self.source.next_start_position()?;
            }
        }
        Ok(())
    }

    /// Gather the next bucket; returns the doc id or [`NO_MORE_BUCKETS`]
    pub fn next_bucket(&mut self) -> Result<i32> {
        self.ensure_at_first_hit()?;
        if self.source.start_position() == NO_MORE_POSITIONS {
            self.clear_bucket();
            return Ok(NO_MORE_BUCKETS);
        }
        self.gather()?;
        Ok(self.source.doc_id())
    }

    /// Gather the next bucket that starts at or after `target`
    pub fn advance_bucket(&mut self, target: i32) -> Result<i32> {
        if self.before_first_bucket_hit {
            self.before_first_bucket_hit = false;
        } else if self.source.start_position() >= target {
            return self.next_bucket();
        }
        if self.source.advance_start_position(target)? == NO_MORE_POSITIONS {
            self.clear_bucket();
            return Ok(NO_MORE_BUCKETS);
        }
        self.gather()?;
        Ok(self.source.doc_id())
    }

    fn gather(&mut self) -> Result<()> {
        self.clear_bucket();
        match self.strategy {
            BucketStrategy::Consecutive => {
                loop {
                    self.add_hit_from_source();
                    let last_end = self.source.end_position();
                    if self.source.next_start_position()? != last_end {
                        break;
                    }
                }
            }
            BucketStrategy::PerDocument => {
                loop {
                    self.add_hit_from_source();
                    if self.source.next_start_position()? == NO_MORE_POSITIONS {
                        break;
                    }
                }
            }
            BucketStrategy::PerDocumentSorted { by_start } => {
                loop {
                    self.add_hit_from_source();
                    if self.source.next_start_position()? == NO_MORE_POSITIONS {
                        break;
                    }
                }
                let (starts, ends) = (&self.starts, &self.ends);
                self.order = (0..starts.len()).collect();
                if by_start {
                    self.order.sort_by_key(|&i| (starts[i], ends[i]));
                } else {
                    self.order.sort_by_key(|&i| (ends[i], starts[i]));
                }
            }
            BucketStrategy::SameStartEnd { .. } => {
                let start = self.source.start_position();
                let end = self.source.end_position();
                loop {
                    self.add_hit_from_source();
                    if self.source.next_start_position()? != start || self.source.end_position() != end {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    fn add_hit_from_source(&mut self) {
        self.starts.push(self.source.start_position());
        self.ends.push(self.source.end_position());
        if self.do_match_info {
            let size = self.context.as_ref().map_or(0, |c| c.number_of_match_infos());
            let mut match_info = vec![None; size];
            self.source.get_match_info(&mut match_info);
            self.match_infos.push(match_info);
        }
        self.relations.push(self.source.relation_info().cloned());
        if let BucketStrategy::SameStartEnd { collect_payloads: true } = self.strategy {
            self.payloads.push(self.source.payload().map(|p| p.to_vec()));
            self.terms.push(self.source.term().map(Arc::from));
        }
    }

    fn index(&self, i: usize) -> usize {
        if self.order.is_empty() { i } else { self.order[i] }
    }

    pub fn bucket_size(&self) -> usize {
        self.starts.len()
    }

    pub fn start_position(&self, i: usize) -> i32 {
        self.starts[self.index(i)]
    }

    pub fn end_position(&self, i: usize) -> i32 {
        self.ends[self.index(i)]
    }

    /// Start of the bucket's first hit
    pub fn bucket_start(&self) -> i32 {
        if self.starts.is_empty() { BEFORE_FIRST } else { self.start_position(0) }
    }

    pub fn bucket_end(&self) -> i32 {
        if self.ends.is_empty() { BEFORE_FIRST } else { self.end_position(0) }
    }

    /// Same position and same captures
    pub fn hits_equal(&self, a: usize, b: usize) -> bool {
        let (a, b) = (self.index(a), self.index(b));
        self.starts[a] == self.starts[b]
            && self.ends[a] == self.ends[b]
            && self.match_infos.get(a) == self.match_infos.get(b)
            && self.relations[a] == self.relations[b]
    }

    pub fn get_match_info(&self, i: usize, match_info: &mut [Option<MatchInfo>]) {
        if let Some(source) = self.match_infos.get(self.index(i)) {
            merge_into(match_info, source);
        }
    }

    pub fn has_match_info(&self) -> bool {
        self.source.has_match_info()
    }

    pub fn relation_info(&self, i: usize) -> Option<&RelationInfo> {
        self.relations.get(self.index(i))?.as_ref()
    }

    pub fn payload(&self, i: usize) -> Option<&[u8]> {
        self.payloads.get(self.index(i))?.as_deref()
    }

    pub fn term(&self, i: usize) -> Option<&str> {
        self.terms.get(self.index(i))?.as_deref()
    }

    pub fn source_guarantees(&self) -> SpanGuarantees {
        self.source.guarantees()
    }

    /// What the concatenated bucket members guarantee
    pub fn guarantees(&self) -> SpanGuarantees {
        let source = self.source.guarantees();
        match self.strategy {
            BucketStrategy::PerDocumentSorted { by_start } => SpanGuarantees {
                hits_start_point_sorted: by_start || source.hits_all_same_length,
                ..source
            },
            _ => source,
        }
    }

    pub fn set_hit_query_context(&mut self, context: &HitQueryContext) {
        self.source.set_hit_query_context(context);
        self.do_match_info = (self.source.has_match_info() && context.number_of_match_infos() > 0)
            || context.has_relation_captures();
        self.context = Some(context.clone());
    }
}
