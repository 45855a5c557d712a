use crate::core::error::Result;
use crate::core::types::{BEFORE_FIRST, NO_MORE_POSITIONS};
use crate::matchinfo::{self, HitQueryContext, MatchInfo, RelationInfo};
use crate::spans::{SpanGuarantees, Spans};

struct BufferedHit {
    start: i32,
    end: i32,
    match_info: Option<Vec<Option<MatchInfo>>>,
    relation: Option<RelationInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    /// Hits come straight from the clause (and are recorded)
    Clause,
    /// Replaying, before the first buffered hit
    BeforeFirst,
    /// Replaying buffered hit i
    Buffered(usize),
}

/// Spans that can be rewound to the last mark, within the current document.
///
/// Every hit read from the clause is recorded along with its captures, so
/// after `reset` the hits since the mark are replayed before reading on.
pub struct SpansBuffered {
    clause: Box<dyn Spans>,
    buffer: Vec<BufferedHit>,
    cursor: Cursor,
    mark_before_first_hit: bool,
    clause_exhausted: bool,
    do_match_info: bool,
    context: Option<HitQueryContext>,
}

impl SpansBuffered {
    pub fn new(clause: Box<dyn Spans>) -> Self {
        SpansBuffered {
            clause,
            buffer: Vec::new(),
            cursor: Cursor::Clause,
            mark_before_first_hit: true,
            clause_exhausted: false,
            do_match_info: false,
            context: None,
        }
    }

    fn start_doc(&mut self) {
        self.buffer.clear();
        self.cursor = Cursor::Clause;
        self.mark_before_first_hit = true;
        self.clause_exhausted = false;
    }

    /// Remember the current position; `reset` comes back here
    pub fn mark(&mut self) {
        match self.cursor {
            Cursor::Clause => {
                self.mark_before_first_hit = self.clause.start_position() == BEFORE_FIRST;
                // Only the current hit (the last one recorded) is still needed
                let keep_from = self.buffer.len().saturating_sub(1);
                self.buffer.drain(..keep_from);
            }
            Cursor::BeforeFirst => self.mark_before_first_hit = true,
            Cursor::Buffered(i) => {
                self.mark_before_first_hit = false;
                self.buffer.drain(..i);
                self.cursor = Cursor::Buffered(0);
            }
        }
    }

    /// Go back to the last mark. The next `next_start_position` returns the
    /// hit after the marked one.
    pub fn reset(&mut self) {
        self.cursor = if self.mark_before_first_hit {
            if self.clause.start_position() == BEFORE_FIRST {
                Cursor::Clause
            } else {
                Cursor::BeforeFirst
            }
        } else if self.buffer.is_empty() {
            Cursor::Clause
        } else {
            Cursor::Buffered(0)
        };
    }

    fn buffered(&self) -> Option<&BufferedHit> {
        match self.cursor {
            Cursor::Buffered(i) => self.buffer.get(i),
            _ => None,
        }
    }

    fn record_current(&mut self, start: i32) {
        let end = self.clause.end_position();
        let match_info = if self.do_match_info {
            let n = self.context.as_ref().map_or(0, |c| c.number_of_match_infos());
            let mut slots = vec![None; n];
            self.clause.get_match_info(&mut slots);
            Some(slots)
        } else {
            None
        };
        let relation = self.clause.relation_info().cloned();
        self.buffer.push(BufferedHit { start, end, match_info, relation });
    }
}

impl Spans for SpansBuffered {
    fn doc_id(&self) -> i32 {
        self.clause.doc_id()
    }

    fn next_doc(&mut self) -> Result<i32> {
        self.start_doc();
        self.clause.next_doc()
    }

    fn advance(&mut self, target: i32) -> Result<i32> {
        self.start_doc();
        self.clause.advance(target)
    }

    fn next_start_position(&mut self) -> Result<i32> {
        let next = match self.cursor {
            Cursor::Clause => None,
            Cursor::BeforeFirst => Some(0),
            Cursor::Buffered(i) => Some(i + 1),
        };
        if let Some(next) = next {
            if let Some(hit) = self.buffer.get(next) {
                self.cursor = Cursor::Buffered(next);
                return Ok(hit.start);
            }
            self.cursor = Cursor::Clause;
        }

        if self.clause_exhausted {
            return Ok(NO_MORE_POSITIONS);
        }
        let start = self.clause.next_start_position()?;
        if start == NO_MORE_POSITIONS {
            self.clause_exhausted = true;
            return Ok(NO_MORE_POSITIONS);
        }
        self.record_current(start);
        Ok(start)
    }

    fn start_position(&self) -> i32 {
        match self.cursor {
            Cursor::Clause => self.clause.start_position(),
            Cursor::BeforeFirst => BEFORE_FIRST,
            Cursor::Buffered(i) => self.buffer[i].start,
        }
    }

    fn end_position(&self) -> i32 {
        match self.cursor {
            Cursor::Clause => self.clause.end_position(),
            Cursor::BeforeFirst => BEFORE_FIRST,
            Cursor::Buffered(i) => self.buffer[i].end,
        }
    }

    fn get_match_info(&self, match_info: &mut [Option<MatchInfo>]) {
        if !self.do_match_info {
            return;
        }
        match self.cursor {
            Cursor::Clause => self.clause.get_match_info(match_info),
            _ => {
                if let Some(recorded) = self.buffered().and_then(|h| h.match_info.as_deref()) {
                    matchinfo::merge_into(match_info, recorded);
                }
            }
        }
    }

    fn has_match_info(&self) -> bool {
        self.clause.has_match_info()
    }

    fn relation_info(&self) -> Option<&RelationInfo> {
        match self.cursor {
            Cursor::Clause => self.clause.relation_info(),
            _ => self.buffered().and_then(|h| h.relation.as_ref()),
        }
    }

    fn guarantees(&self) -> SpanGuarantees {
        self.clause.guarantees()
    }

    fn set_hit_query_context(&mut self, context: &HitQueryContext) {
        self.clause.set_hit_query_context(context);
        self.do_match_info = (self.clause.has_match_info() && context.number_of_match_infos() > 0)
            || context.has_relation_captures();
        self.context = Some(context.clone());
    }

    fn cost(&self) -> i64 {
        self.clause.cost()
    }

    fn approximation_next_doc(&mut self) -> Result<i32> {
        self.start_doc();
        self.clause.approximation_next_doc()
    }

    fn approximation_advance(&mut self, target: i32) -> Result<i32> {
        self.start_doc();
        self.clause.approximation_advance(target)
    }

    fn matches(&mut self) -> Result<bool> {
        self.start_doc();
        self.clause.matches()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use super::*;
    use crate::core::types::NO_MORE_DOCS;
    use crate::matchinfo::MatchInfoDefs;
    use crate::spans::list::ListSpans;
    use crate::spans::testutil::collect_hits;

    fn buffered() -> SpansBuffered {
        SpansBuffered::new(Box::new(ListSpans::new(vec![(0, 1, 2), (0, 3, 5), (0, 4, 5), (1, 0, 1)])))
    }

    #[test]
    fn passes_hits_through() {
        let mut spans = buffered();
        assert_eq!(collect_hits(&mut spans), vec![(0, 1, 2), (0, 3, 5), (0, 4, 5), (1, 0, 1)]);
    }

    #[test]
    fn reset_replays_from_mark() {
        let mut spans = buffered();
        assert_eq!(spans.next_doc().unwrap(), 0);
        assert_eq!(spans.next_start_position().unwrap(), 1);
        spans.mark();
        assert_eq!(spans.next_start_position().unwrap(), 3);
        assert_eq!(spans.next_start_position().unwrap(), 4);
        spans.reset();
        assert_eq!(spans.start_position(), 1);
        assert_eq!(spans.next_start_position().unwrap(), 3);
        assert_eq!(spans.end_position(), 5);
        assert_eq!(spans.next_start_position().unwrap(), 4);
        assert_eq!(spans.next_start_position().unwrap(), NO_MORE_POSITIONS);
        spans.reset();
        assert_eq!(spans.next_start_position().unwrap(), 3);
    }

    #[test]
    fn mark_before_first_hit_replays_everything() {
        let mut spans = buffered();
        spans.next_doc().unwrap();
        assert_eq!(spans.next_start_position().unwrap(), 1);
        assert_eq!(spans.next_start_position().unwrap(), 3);
        spans.reset();
        assert_eq!(spans.start_position(), BEFORE_FIRST);
        assert_eq!(spans.next_start_position().unwrap(), 1);
        assert_eq!(spans.next_start_position().unwrap(), 3);
        assert_eq!(spans.next_start_position().unwrap(), 4);
        assert_eq!(spans.next_doc().unwrap(), 1);
        assert_eq!(spans.next_start_position().unwrap(), 0);
        assert_eq!(spans.next_doc().unwrap(), NO_MORE_DOCS);
    }

    #[test]
    fn mark_while_replaying_drops_earlier_hits() {
        let mut spans = buffered();
        spans.next_doc().unwrap();
        spans.next_start_position().unwrap();
        spans.next_start_position().unwrap();
        spans.next_start_position().unwrap();
        spans.reset();
        spans.next_start_position().unwrap();
        spans.next_start_position().unwrap();
        spans.mark();
        assert_eq!(spans.start_position(), 3);
        spans.reset();
        assert_eq!(spans.next_start_position().unwrap(), 4);
    }

    #[test]
    fn replays_captures() {
        let field: Arc<str> = Arc::from("contents");
        let clause = ListSpans::new(vec![(0, 1, 2), (0, 3, 4)]).with_match_infos(vec![
            vec![Some(MatchInfo::span(1, 2, field.clone()))],
            vec![Some(MatchInfo::span(3, 4, field.clone()))],
        ]);
        let mut spans = SpansBuffered::new(Box::new(clause));
        let context = HitQueryContext::new("contents", MatchInfoDefs::new());
        context.register_match_info("A", None);
        spans.set_hit_query_context(&context);
        spans.next_doc().unwrap();
        spans.next_start_position().unwrap();
        spans.next_start_position().unwrap();
        spans.reset();
        spans.next_start_position().unwrap();
        let mut slots = vec![None];
        spans.get_match_info(&mut slots);
        assert_eq!(slots[0], Some(MatchInfo::span(1, 2, field)));
    }
}
