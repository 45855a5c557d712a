use std::sync::Arc;
use tracing::trace;
use crate::core::error::Result;
use crate::core::types::{BEFORE_FIRST, NO_MORE_DOCS, NO_MORE_POSITIONS};
use crate::matchinfo::{self, HitQueryContext, MatchInfo, MatchInfoType, RelationInfo, RelationListInfo};
use crate::spans::filter::{Accept, FilterSpans, HitFilter};
use crate::spans::Spans;

/// Collects the spans (usually inline tags) that overlap each hit it is shown.
/// Hits must come in order of doc id and start position.
pub struct OverlappingSpansCapturer {
    spans: Box<dyn Spans>,
    doc: i32,
    // Opened before the last hit's end and not known to be closed before its start
    possibly_overlapping: Vec<RelationInfo>,
}

impl OverlappingSpansCapturer {
    pub fn new(spans: Box<dyn Spans>) -> Self {
        OverlappingSpansCapturer {
            spans,
            doc: BEFORE_FIRST,
            possibly_overlapping: Vec::new(),
        }
    }

    /// Relations overlapping [start, end) in `doc`, sorted
    pub fn process_hit(&mut self, doc: i32, start: i32, end: i32) -> Result<Vec<RelationInfo>> {
        if doc != self.doc {
            self.doc = doc;
            self.possibly_overlapping.clear();
            if self.spans.doc_id() < doc && self.spans.advance(doc)? != NO_MORE_DOCS {
                self.spans.next_start_position()?;
            }
        }
        if self.spans.doc_id() == doc {
            self.possibly_overlapping.retain(|r| r.span_end() > start);
            loop {
                let span_start = self.spans.start_position();
                if span_start == NO_MORE_POSITIONS || span_start >= end {
                    break;
                }
                if span_start >= 0 && self.spans.end_position() > start {
                    match self.spans.relation_info() {
                        Some(relation) => self.possibly_overlapping.push(relation.clone()),
                        None => trace!(doc, span_start, "span without relation info not captured"),
                    }
                }
                self.spans.next_start_position()?;
            }
        }
        let mut captured: Vec<RelationInfo> = self
            .possibly_overlapping
            .iter()
            .filter(|r| r.span_start() < end && r.span_end() > start)
            .cloned()
            .collect();
        captured.sort();
        Ok(captured)
    }

    pub fn set_hit_query_context(&mut self, context: &HitQueryContext) {
        self.spans.set_hit_query_context(context)
    }
}

/// Captures, for each clause hit, the list of spans overlapping it
pub type SpansCaptureOverlappingSpans = FilterSpans<CaptureOverlapping>;

pub struct CaptureOverlapping {
    capturer: OverlappingSpansCapturer,
    capture_as: String,
    capture_index: usize,
    field: Arc<str>,
    context: Option<HitQueryContext>,
    match_info: Vec<Option<MatchInfo>>,
}

impl SpansCaptureOverlappingSpans {
    pub fn capture(clause: Box<dyn Spans>, spans: Box<dyn Spans>, capture_as: &str) -> Self {
        FilterSpans::new(
            clause,
            CaptureOverlapping {
                capturer: OverlappingSpansCapturer::new(spans),
                capture_as: capture_as.to_string(),
                capture_index: 0,
                field: Arc::from(""),
                context: None,
                match_info: Vec::new(),
            },
        )
    }
}

impl HitFilter for CaptureOverlapping {
    fn accept(&mut self, candidate: &mut dyn Spans) -> Result<Accept> {
        let start = candidate.start_position();
        let end = candidate.end_position();
        let captured = self.capturer.process_hit(candidate.doc_id(), start, end)?;

        let n = self.context.as_ref().map_or(0, |c| c.number_of_match_infos());
        self.match_info.clear();
        self.match_info.resize(n.max(self.capture_index + 1), None);
        candidate.get_match_info(&mut self.match_info);
        self.match_info[self.capture_index] =
            Some(MatchInfo::ListOfRelations(RelationListInfo::new(captured, self.field.clone())));
        Ok(Accept::Yes)
    }

    fn get_match_info(&self, _clause: &dyn Spans, match_info: &mut [Option<MatchInfo>]) {
        matchinfo::merge_into(match_info, &self.match_info)
    }

    fn has_match_info(&self, _clause: &dyn Spans) -> bool {
        true
    }

    fn set_hit_query_context(&mut self, clause: &mut dyn Spans, context: &HitQueryContext) {
        clause.set_hit_query_context(context);
        self.capturer.set_hit_query_context(context);
        self.capture_index = context.register_match_info(&self.capture_as, Some(MatchInfoType::ListOfRelations));
        self.field = context.field().clone();
        self.context = Some(context.clone());
    }
}
