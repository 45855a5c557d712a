use std::sync::Arc;
use crate::core::error::{Error, Result};
use crate::index::segment::IndexSegment;
use crate::spans::filter::{Accept, FilterSpans, HitFilter};
use crate::spans::Spans;

/// Shifts hit starts and ends by fixed amounts, dropping hits that end up
/// outside their document
pub type SpansAdjustHits = FilterSpans<AdjustHits>;

pub struct AdjustHits {
    segment: Arc<dyn IndexSegment>,
    field: String,
    start_adjust: i32,
    end_adjust: i32,
    length_doc: i32,
    length: i32,
}

impl SpansAdjustHits {
    /// `field` is the annotated field whose document lengths bound the hits
    pub fn adjust(
        segment: Arc<dyn IndexSegment>,
        field: &str,
        clause: Box<dyn Spans>,
        start_adjust: i32,
        end_adjust: i32,
    ) -> Self {
        FilterSpans::new(
            clause,
            AdjustHits {
                segment,
                field: field.to_string(),
                start_adjust,
                end_adjust,
                length_doc: -1,
                length: -1,
            },
        )
    }
}

impl AdjustHits {
    fn doc_length(&mut self, doc: i32) -> Result<i32> {
        if doc != self.length_doc {
            if doc < self.length_doc {
                return Err(Error::invalid_state(format!(
                    "spans out of order: doc {} after doc {}",
                    doc, self.length_doc
                )));
            }
            self.length = self.segment.doc_length(&self.field, doc)?;
            self.length_doc = doc;
        }
        Ok(self.length)
    }
}

impl HitFilter for AdjustHits {
    fn accept(&mut self, candidate: &mut dyn Spans) -> Result<Accept> {
        let start = candidate.start_position() + self.start_adjust;
        let end = candidate.end_position() + self.end_adjust;
        let length = self.doc_length(candidate.doc_id())?;
        if start < 0 || end < 0 || start >= length || end > length || start > end {
            return Ok(Accept::No);
        }
        Ok(Accept::Yes)
    }

    fn start(&self, clause: &dyn Spans) -> i32 {
        clause.start_position() + self.start_adjust
    }

    fn end(&self, clause: &dyn Spans) -> i32 {
        clause.end_position() + self.end_adjust
    }

    fn clause_target(&self, target: i32) -> Option<i32> {
        Some(target.saturating_sub(self.start_adjust))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::segment::{DocumentInput, FieldInput, SegmentBuilder};
    use crate::spans::list::ListSpans;
    use crate::spans::testutil::collect_hits;

    fn segment() -> Arc<dyn IndexSegment> {
        let mut builder = SegmentBuilder::new();
        builder.add_document(
            DocumentInput::new().field("contents", FieldInput::new().annotation("word", &["a", "b", "c"])),
        );
        builder.add_document(
            DocumentInput::new().field("contents", FieldInput::new().annotation("word", &["a", "b", "c", "d", "e"])),
        );
        Arc::new(builder.build(0, 0).unwrap())
    }

    #[test]
    fn rejects_hits_outside_the_document() {
        // Doc 0 has length 4 with its closing token, doc 1 length 6
        let clause = ListSpans::new(vec![(0, 0, 1), (0, 2, 3), (1, 1, 2), (1, 4, 5)]);
        let mut spans = SpansAdjustHits::adjust(segment(), "contents", Box::new(clause), -1, 2);
        assert_eq!(collect_hits(&mut spans), vec![(1, 0, 4)]);
    }

    #[test]
    fn shifts_within_bounds() {
        let clause = ListSpans::new(vec![(1, 1, 2), (1, 2, 3), (1, 3, 4)]);
        let mut spans = SpansAdjustHits::adjust(segment(), "contents", Box::new(clause), -1, 1);
        assert_eq!(collect_hits(&mut spans), vec![(1, 0, 3), (1, 1, 4), (1, 2, 5)]);
    }

    #[test]
    fn advance_start_position_accounts_for_the_shift() {
        let clause = ListSpans::new(vec![(1, 1, 2), (1, 2, 3), (1, 3, 4)]);
        let mut spans = SpansAdjustHits::adjust(segment(), "contents", Box::new(clause), 1, 1);
        assert_eq!(spans.next_doc().unwrap(), 1);
        assert_eq!(spans.advance_start_position(3).unwrap(), 3);
        assert_eq!(spans.end_position(), 4);
    }

    #[test]
    fn decreasing_docs_are_an_error() {
        let mut filter = AdjustHits {
            segment: segment(),
            field: "contents".into(),
            start_adjust: 0,
            end_adjust: 0,
            length_doc: -1,
            length: -1,
        };
        let mut late = ListSpans::new(vec![(1, 0, 1)]);
        late.next_doc().unwrap();
        late.next_start_position().unwrap();
        assert_eq!(filter.accept(&mut late).unwrap(), Accept::Yes);
        let mut early = ListSpans::new(vec![(0, 0, 1)]);
        early.next_doc().unwrap();
        early.next_start_position().unwrap();
        assert!(filter.accept(&mut early).is_err());
    }
}
