use crate::core::error::Result;
use crate::core::types::{BEFORE_FIRST, NO_MORE_DOCS, NO_MORE_POSITIONS};
use crate::index::postings::PostingsCursor;
use crate::spans::{SpanGuarantees, Spans};

/// One single-token hit per occurrence of a term (or of any term in a union)
pub struct TermSpans {
    postings: Box<dyn PostingsCursor>,
    freq: i32,
    count: i32,
    position: i32,
}

impl TermSpans {
    pub fn new(postings: Box<dyn PostingsCursor>) -> Self {
        TermSpans {
            postings,
            freq: 0,
            count: 0,
            position: BEFORE_FIRST,
        }
    }

    fn start_doc(&mut self, doc: i32) -> i32 {
        self.freq = if doc == NO_MORE_DOCS { 0 } else { self.postings.freq() };
        self.count = 0;
        self.position = BEFORE_FIRST;
        doc
    }
}

impl Spans for TermSpans {
    fn doc_id(&self) -> i32 {
        self.postings.doc_id()
    }

    fn next_doc(&mut self) -> Result<i32> {
        let doc = self.postings.next_doc()?;
        Ok(self.start_doc(doc))
    }

    fn advance(&mut self, target: i32) -> Result<i32> {
        let doc = self.postings.advance(target)?;
        Ok(self.start_doc(doc))
    }

    fn next_start_position(&mut self) -> Result<i32> {
        if self.count == self.freq {
            self.position = NO_MORE_POSITIONS;
            return Ok(NO_MORE_POSITIONS);
        }
        self.position = self.postings.next_position()?;
        self.count += 1;
        Ok(self.position)
    }

    fn start_position(&self) -> i32 {
        self.position
    }

    fn end_position(&self) -> i32 {
        match self.position {
            BEFORE_FIRST | NO_MORE_POSITIONS => self.position,
            p => p + 1,
        }
    }

    fn guarantees(&self) -> SpanGuarantees {
        SpanGuarantees::TERM
    }

    fn cost(&self) -> i64 {
        self.postings.cost()
    }

    fn payload(&self) -> Option<&[u8]> {
        self.postings.payload()
    }

    fn term(&self) -> Option<&str> {
        self.postings.term()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use super::*;
    use crate::index::postings::{DocPostings, MemoryPostings};
    use crate::spans::testutil::collect_hits;

    #[test]
    fn one_token_per_occurrence() {
        let postings = MemoryPostings::new(Arc::new(vec![
            DocPostings { doc: 0, positions: vec![(1, None), (4, None)] },
            DocPostings { doc: 2, positions: vec![(0, None)] },
        ]))
        .with_term("cat");
        let mut spans = TermSpans::new(Box::new(postings));
        assert_eq!(collect_hits(&mut spans), vec![(0, 1, 2), (0, 4, 5), (2, 0, 1)]);
    }

    #[test]
    fn exposes_term_and_advances_positions() {
        let postings = MemoryPostings::new(Arc::new(vec![DocPostings {
            doc: 3,
            positions: vec![(1, None), (2, None), (6, None)],
        }]))
        .with_term("dog");
        let mut spans = TermSpans::new(Box::new(postings));
        assert_eq!(spans.next_doc().unwrap(), 3);
        assert_eq!(spans.start_position(), BEFORE_FIRST);
        assert_eq!(spans.advance_start_position(2).unwrap(), 2);
        assert_eq!(spans.term(), Some("dog"));
        assert_eq!(spans.advance_start_position(3).unwrap(), 6);
        assert_eq!(spans.advance_start_position(7).unwrap(), NO_MORE_POSITIONS);
    }
}
