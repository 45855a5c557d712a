use crate::core::error::Result;
use crate::core::types::{BEFORE_FIRST, NO_MORE_DOCS, NO_MORE_POSITIONS};
use crate::matchinfo::{HitQueryContext, MatchInfo, RelationInfo};
use crate::spans::{naive_advance_start_position, DocPhase, SpanGuarantees, Spans};

/// Verdict on one clause hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accept {
    Yes,
    No,
    /// Reject this hit and every later one in the document
    NoMoreInCurrentDoc,
}

/// Decides which clause hits a [`FilterSpans`] passes on and what they look
/// like. Every method but `accept` defaults to passing the clause through.
pub trait HitFilter: Send {
    /// Called once per clause hit, in order. May record state for the
    /// accessors below, which are only asked about accepted hits.
    fn accept(&mut self, candidate: &mut dyn Spans) -> Result<Accept>;

    fn start(&self, clause: &dyn Spans) -> i32 {
        clause.start_position()
    }

    fn end(&self, clause: &dyn Spans) -> i32 {
        clause.end_position()
    }

    fn get_match_info(&self, clause: &dyn Spans, match_info: &mut [Option<MatchInfo>]) {
        clause.get_match_info(match_info)
    }

    fn has_match_info(&self, clause: &dyn Spans) -> bool {
        clause.has_match_info()
    }

    fn relation_info<'a>(&'a self, clause: &'a dyn Spans) -> Option<&'a RelationInfo> {
        clause.relation_info()
    }

    fn guarantees(&self, clause: &dyn Spans) -> SpanGuarantees {
        clause.guarantees()
    }

    fn set_hit_query_context(&mut self, clause: &mut dyn Spans, context: &HitQueryContext) {
        clause.set_hit_query_context(context)
    }

    /// Position to advance the clause to for hits starting at `target`, or
    /// None if hits must be stepped through one by one
    fn clause_target(&self, target: i32) -> Option<i32> {
        Some(target)
    }
}

/// Passes on the clause hits its filter accepts. Documents with no
/// accepted hit are skipped; through the two-phase methods that check
/// is deferred to `matches`.
pub struct FilterSpans<F> {
    pub(crate) clause: Box<dyn Spans>,
    pub(crate) filter: F,
    at_first_in_current_doc: bool,
    // Clause start of the current hit, or a sentinel
    start_pos: i32,
    phase: DocPhase,
}

impl<F: HitFilter> FilterSpans<F> {
    pub fn new(clause: Box<dyn Spans>, filter: F) -> Self {
        FilterSpans {
            clause,
            filter,
            at_first_in_current_doc: false,
            start_pos: BEFORE_FIRST,
            phase: DocPhase::Unconfirmed,
        }
    }

    pub fn filter(&self) -> &F {
        &self.filter
    }

    /// Find the first accepted hit in the clause's current doc and keep it
    /// for the first `next_start_position`
    fn two_phase_current_doc_matches(&mut self) -> Result<bool> {
        self.at_first_in_current_doc = false;
        self.start_pos = self.clause.next_start_position()?;
        if self.start_pos == NO_MORE_POSITIONS {
            return Ok(false);
        }
        loop {
            match self.filter.accept(&mut *self.clause)? {
                Accept::Yes => {
                    self.at_first_in_current_doc = true;
                    return Ok(true);
                }
                Accept::No => {
                    self.start_pos = self.clause.next_start_position()?;
                    if self.start_pos == NO_MORE_POSITIONS {
                        return Ok(false);
                    }
                }
                Accept::NoMoreInCurrentDoc => {
                    self.start_pos = BEFORE_FIRST;
                    return Ok(false);
                }
            }
        }
    }

    fn accept_from_clause(&mut self) -> Result<i32> {
        loop {
            if self.start_pos == NO_MORE_POSITIONS {
                return Ok(NO_MORE_POSITIONS);
            }
            match self.filter.accept(&mut *self.clause)? {
                Accept::Yes => return Ok(self.start_position()),
                Accept::No => self.start_pos = self.clause.next_start_position()?,
                Accept::NoMoreInCurrentDoc => {
                    self.start_pos = NO_MORE_POSITIONS;
                    return Ok(NO_MORE_POSITIONS);
                }
            }
        }
    }

    fn reset_doc(&mut self) {
        self.at_first_in_current_doc = false;
        self.start_pos = BEFORE_FIRST;
        self.phase = DocPhase::Unconfirmed;
    }
}

impl<F: HitFilter> Spans for FilterSpans<F> {
    fn doc_id(&self) -> i32 {
        self.clause.doc_id()
    }

    fn next_doc(&mut self) -> Result<i32> {
        self.reset_doc();
        loop {
            let doc = self.clause.next_doc()?;
            if doc == NO_MORE_DOCS {
                return Ok(NO_MORE_DOCS);
            }
            if self.two_phase_current_doc_matches()? {
                self.phase = DocPhase::Confirmed;
                return Ok(doc);
            }
        }
    }

    fn advance(&mut self, target: i32) -> Result<i32> {
        self.reset_doc();
        let mut doc = self.clause.advance(target)?;
        while doc != NO_MORE_DOCS {
            if self.two_phase_current_doc_matches()? {
                self.phase = DocPhase::Confirmed;
                break;
            }
            doc = self.clause.next_doc()?;
        }
        Ok(doc)
    }

    fn next_start_position(&mut self) -> Result<i32> {
        debug_assert_eq!(self.phase, DocPhase::Confirmed, "positions read before the document was confirmed");
        if self.at_first_in_current_doc {
            self.at_first_in_current_doc = false;
            return Ok(self.start_position());
        }
        if self.start_pos == NO_MORE_POSITIONS {
            return Ok(NO_MORE_POSITIONS);
        }
        self.start_pos = self.clause.next_start_position()?;
        self.accept_from_clause()
    }

    fn advance_start_position(&mut self, target: i32) -> Result<i32> {
        let Some(clause_target) = self.filter.clause_target(target) else {
            return naive_advance_start_position(self, target);
        };
        if self.at_first_in_current_doc {
            self.at_first_in_current_doc = false;
            if self.start_position() >= target {
                return Ok(self.start_position());
            }
        }
        if self.start_pos == NO_MORE_POSITIONS {
            return Ok(NO_MORE_POSITIONS);
        }
        self.start_pos = self.clause.advance_start_position(clause_target)?;
        self.accept_from_clause()
    }

    fn start_position(&self) -> i32 {
        if self.at_first_in_current_doc {
            return BEFORE_FIRST;
        }
        if self.start_pos == BEFORE_FIRST || self.start_pos == NO_MORE_POSITIONS {
            return self.start_pos;
        }
        self.filter.start(&*self.clause)
    }

    fn end_position(&self) -> i32 {
        if self.at_first_in_current_doc {
            return BEFORE_FIRST;
        }
        if self.start_pos == BEFORE_FIRST || self.start_pos == NO_MORE_POSITIONS {
            return self.start_pos;
        }
        self.filter.end(&*self.clause)
    }

    fn get_match_info(&self, match_info: &mut [Option<MatchInfo>]) {
        self.filter.get_match_info(&*self.clause, match_info)
    }

    fn has_match_info(&self) -> bool {
        self.filter.has_match_info(&*self.clause)
    }

    fn relation_info(&self) -> Option<&RelationInfo> {
        self.filter.relation_info(&*self.clause)
    }

    fn guarantees(&self) -> SpanGuarantees {
        self.filter.guarantees(&*self.clause)
    }

    fn set_hit_query_context(&mut self, context: &HitQueryContext) {
        self.filter.set_hit_query_context(&mut *self.clause, context)
    }

    fn cost(&self) -> i64 {
        self.clause.cost()
    }

    fn approximation_next_doc(&mut self) -> Result<i32> {
        self.reset_doc();
        self.clause.approximation_next_doc()
    }

    fn approximation_advance(&mut self, target: i32) -> Result<i32> {
        self.reset_doc();
        self.clause.approximation_advance(target)
    }

    fn matches(&mut self) -> Result<bool> {
        if !self.clause.matches()? {
            return Ok(false);
        }
        let matches = self.two_phase_current_doc_matches()?;
        if matches {
            self.phase = DocPhase::Confirmed;
        }
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spans::list::ListSpans;
    use crate::spans::testutil::{collect_hits, collect_hits_two_phase};

    struct EvenStarts;

    impl HitFilter for EvenStarts {
        fn accept(&mut self, candidate: &mut dyn Spans) -> Result<Accept> {
            Ok(if candidate.start_position() % 2 == 0 { Accept::Yes } else { Accept::No })
        }
    }

    struct StopAfter(i32);

    impl HitFilter for StopAfter {
        fn accept(&mut self, candidate: &mut dyn Spans) -> Result<Accept> {
            Ok(if candidate.start_position() > self.0 { Accept::NoMoreInCurrentDoc } else { Accept::Yes })
        }
    }

    fn clause() -> Box<dyn Spans> {
        Box::new(ListSpans::new(vec![(0, 1, 2), (0, 2, 3), (1, 3, 4), (2, 0, 1), (2, 4, 6), (2, 5, 6)]))
    }

    #[test]
    fn skips_documents_without_accepted_hits() {
        let mut spans = FilterSpans::new(clause(), EvenStarts);
        assert_eq!(collect_hits(&mut spans), vec![(0, 2, 3), (2, 0, 1), (2, 4, 6)]);
        let mut spans = FilterSpans::new(clause(), EvenStarts);
        assert_eq!(collect_hits_two_phase(&mut spans), vec![(0, 2, 3), (2, 0, 1), (2, 4, 6)]);
    }

    #[test]
    fn start_is_before_first_until_first_hit() {
        let mut spans = FilterSpans::new(clause(), EvenStarts);
        assert_eq!(spans.next_doc().unwrap(), 0);
        assert_eq!(spans.start_position(), BEFORE_FIRST);
        assert_eq!(spans.end_position(), BEFORE_FIRST);
        assert_eq!(spans.next_start_position().unwrap(), 2);
        assert_eq!(spans.end_position(), 3);
        assert_eq!(spans.next_start_position().unwrap(), NO_MORE_POSITIONS);
    }

    #[test]
    fn no_more_in_current_doc_ends_the_doc() {
        let mut spans = FilterSpans::new(clause(), StopAfter(3));
        assert_eq!(
            collect_hits(&mut spans),
            vec![(0, 1, 2), (0, 2, 3), (1, 3, 4), (2, 0, 1)]
        );
    }

    #[test]
    fn advance_start_position_skips() {
        let mut spans = FilterSpans::new(clause(), EvenStarts);
        assert_eq!(spans.advance(2).unwrap(), 2);
        assert_eq!(spans.advance_start_position(3).unwrap(), 4);
        assert_eq!(spans.advance_start_position(5).unwrap(), NO_MORE_POSITIONS);
    }
}
