use std::sync::Arc;
use crate::core::error::Result;
use crate::matchinfo::{HitQueryContext, MatchInfo, MatchInfoType, RelationInfo};
use crate::spans::filter::{Accept, FilterSpans, HitFilter};
use crate::spans::Spans;

/// Passes every clause hit on, capturing it (optionally shifted) under a name
pub type SpansCaptureGroup = FilterSpans<CaptureGroup>;

pub struct CaptureGroup {
    name: String,
    index: usize,
    left_adjust: i32,
    right_adjust: i32,
    // Capture as an inline tag with this name instead of a plain span
    tag_name: Option<String>,
    field: Arc<str>,
}

impl SpansCaptureGroup {
    pub fn capture(clause: Box<dyn Spans>, name: &str) -> Self {
        SpansCaptureGroup::capture_adjusted(clause, name, 0, 0, None)
    }

    /// Capture [start + left_adjust, end + right_adjust) of each hit
    pub fn capture_adjusted(
        clause: Box<dyn Spans>,
        name: &str,
        left_adjust: i32,
        right_adjust: i32,
        tag_name: Option<&str>,
    ) -> Self {
        FilterSpans::new(
            clause,
            CaptureGroup {
                name: name.to_string(),
                index: 0,
                left_adjust,
                right_adjust,
                tag_name: tag_name.map(|t| t.to_string()),
                field: Arc::from(""),
            },
        )
    }
}

impl HitFilter for CaptureGroup {
    fn accept(&mut self, _candidate: &mut dyn Spans) -> Result<Accept> {
        Ok(Accept::Yes)
    }

    fn get_match_info(&self, clause: &dyn Spans, match_info: &mut [Option<MatchInfo>]) {
        clause.get_match_info(match_info);
        let start = clause.start_position() + self.left_adjust;
        let end = clause.end_position() + self.right_adjust;
        let captured = match &self.tag_name {
            Some(tag) => MatchInfo::InlineTag(RelationInfo::tag(start, end, tag, self.field.clone())),
            None => MatchInfo::span(start, end, self.field.clone()),
        };
        if let Some(slot) = match_info.get_mut(self.index) {
            *slot = Some(captured);
        }
    }

    fn has_match_info(&self, _clause: &dyn Spans) -> bool {
        true
    }

    fn set_hit_query_context(&mut self, clause: &mut dyn Spans, context: &HitQueryContext) {
        clause.set_hit_query_context(context);
        self.index = context.register_match_info(&self.name, Some(MatchInfoType::Span));
        self.field = context.field().clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchinfo::MatchInfoDefs;
    use crate::spans::list::ListSpans;

    #[test]
    fn captures_each_hit() {
        let clause = Box::new(ListSpans::new(vec![(0, 1, 3), (0, 4, 5)]));
        let mut spans = SpansCaptureGroup::capture(clause, "A");
        let context = HitQueryContext::new("contents", MatchInfoDefs::new());
        context.register_match_info("other", None);
        spans.set_hit_query_context(&context);
        assert!(spans.has_match_info());

        spans.next_doc().unwrap();
        assert_eq!(spans.next_start_position().unwrap(), 1);
        let mut slots = vec![None; 2];
        spans.get_match_info(&mut slots);
        assert_eq!(slots, vec![None, Some(MatchInfo::span(1, 3, Arc::from("contents")))]);
    }

    #[test]
    fn adjusted_capture_as_tag() {
        let clause = Box::new(ListSpans::new(vec![(0, 2, 4)]));
        let mut spans = SpansCaptureGroup::capture_adjusted(clause, "s", -1, 1, Some("s"));
        let context = HitQueryContext::new("contents", MatchInfoDefs::new());
        spans.set_hit_query_context(&context);
        spans.next_doc().unwrap();
        spans.next_start_position().unwrap();
        let mut slots = vec![None];
        spans.get_match_info(&mut slots);
        let Some(MatchInfo::InlineTag(tag)) = &slots[0] else {
            panic!("expected a tag capture");
        };
        assert_eq!((tag.span_start(), tag.span_end()), (1, 5));
        assert_eq!(tag.relation_type(), "s");
        // The hit itself is unchanged
        assert_eq!((spans.start_position(), spans.end_position()), (2, 4));
    }
}
