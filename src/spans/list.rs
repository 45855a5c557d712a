use crate::core::error::Result;
use crate::core::types::{BEFORE_FIRST, NO_MORE_DOCS, NO_MORE_POSITIONS};
use crate::matchinfo::{merge_into, MatchInfo, RelationInfo};
use crate::spans::{SpanGuarantees, Spans};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    BeforeFirst,
    At(usize),
    Exhausted,
}

/// Spans over an explicit list of hits, grouped by document. Within a
/// document hits come out in the order given.
#[derive(Debug, Clone)]
pub struct ListSpans {
    hits: Vec<(i32, i32, i32)>,
    match_infos: Vec<Vec<Option<MatchInfo>>>,
    relations: Vec<Option<RelationInfo>>,
    payloads: Vec<Option<Vec<u8>>>,
    // (doc, first hit, end of hits)
    docs: Vec<(i32, usize, usize)>,
    doc_index: usize,
    started: bool,
    position: Position,
    guarantees: SpanGuarantees,
}

impl ListSpans {
    pub fn new(mut hits: Vec<(i32, i32, i32)>) -> Self {
        hits.sort_by_key(|h| h.0);
        let mut docs: Vec<(i32, usize, usize)> = Vec::new();
        for (i, &(doc, _, _)) in hits.iter().enumerate() {
            match docs.last_mut() {
                Some(last) if last.0 == doc => last.2 = i + 1,
                _ => docs.push((doc, i, i + 1)),
            }
        }
        let guarantees = compute_guarantees(&hits, &docs);
        ListSpans {
            hits,
            match_infos: Vec::new(),
            relations: Vec::new(),
            payloads: Vec::new(),
            docs,
            doc_index: 0,
            started: false,
            position: Position::BeforeFirst,
            guarantees,
        }
    }

    /// Hits made of relations: each spans its relation's full span
    pub fn from_relations(relations: Vec<(i32, RelationInfo)>) -> Self {
        let mut relations = relations;
        relations.sort_by_key(|(doc, _)| *doc);
        let hits = relations.iter().map(|(doc, r)| (*doc, r.span_start(), r.span_end())).collect();
        let mut spans = ListSpans::new(hits);
        spans.relations = relations.into_iter().map(|(_, r)| Some(r)).collect();
        spans
    }

    /// Match info per hit, in the order hits were given (must be doc-sorted)
    pub fn with_match_infos(mut self, match_infos: Vec<Vec<Option<MatchInfo>>>) -> Self {
        self.match_infos = match_infos;
        self
    }

    pub fn with_payloads(mut self, payloads: Vec<Option<Vec<u8>>>) -> Self {
        self.payloads = payloads;
        self
    }

    fn current(&self) -> Option<usize> {
        match self.position {
            Position::At(i) => Some(i),
            _ => None,
        }
    }
}

fn compute_guarantees(hits: &[(i32, i32, i32)], docs: &[(i32, usize, usize)]) -> SpanGuarantees {
    let mut sorted = true;
    let mut unique = true;
    for &(_, from, to) in docs {
        for pair in hits[from..to].windows(2) {
            let (a, b) = ((pair[0].1, pair[0].2), (pair[1].1, pair[1].2));
            sorted &= a.0 <= b.0;
            unique &= a != b;
        }
    }
    let same_length = hits.windows(2).all(|p| p[0].2 - p[0].1 == p[1].2 - p[1].1);
    SpanGuarantees {
        hits_start_point_sorted: sorted,
        hits_all_same_length: same_length,
        hits_have_unique_start_end: unique && sorted,
    }
}

impl Spans for ListSpans {
    fn doc_id(&self) -> i32 {
        if !self.started {
            return BEFORE_FIRST;
        }
        self.docs.get(self.doc_index).map_or(NO_MORE_DOCS, |d| d.0)
    }

    fn next_doc(&mut self) -> Result<i32> {
        if self.started {
            if self.doc_index < self.docs.len() {
                self.doc_index += 1;
            }
        } else {
            self.started = true;
        }
        self.position = Position::BeforeFirst;
        Ok(self.doc_id())
    }

    fn advance(&mut self, target: i32) -> Result<i32> {
        let from = if self.started { self.doc_index } else { 0 };
        self.started = true;
        let rest = self.docs.get(from..).unwrap_or(&[]);
        self.doc_index = from + rest.partition_point(|d| d.0 < target);
        self.position = Position::BeforeFirst;
        Ok(self.doc_id())
    }

    fn next_start_position(&mut self) -> Result<i32> {
        let Some(&(_, from, to)) = self.docs.get(self.doc_index).filter(|_| self.started) else {
            return Ok(NO_MORE_POSITIONS);
        };
        let next = match self.position {
            Position::BeforeFirst => from,
            Position::At(i) => i + 1,
            Position::Exhausted => to,
        };
        self.position = if next < to { Position::At(next) } else { Position::Exhausted };
        Ok(self.start_position())
    }

    fn start_position(&self) -> i32 {
        match self.position {
            Position::BeforeFirst => BEFORE_FIRST,
            Position::At(i) => self.hits[i].1,
            Position::Exhausted => NO_MORE_POSITIONS,
        }
    }

    fn end_position(&self) -> i32 {
        match self.position {
            Position::BeforeFirst => BEFORE_FIRST,
            Position::At(i) => self.hits[i].2,
            Position::Exhausted => NO_MORE_POSITIONS,
        }
    }

    fn get_match_info(&self, match_info: &mut [Option<MatchInfo>]) {
        if let Some(source) = self.current().and_then(|i| self.match_infos.get(i)) {
            merge_into(match_info, source);
        }
    }

    fn has_match_info(&self) -> bool {
        !self.match_infos.is_empty()
    }

    fn relation_info(&self) -> Option<&RelationInfo> {
        self.relations.get(self.current()?)?.as_ref()
    }

    fn guarantees(&self) -> SpanGuarantees {
        self.guarantees
    }

    fn cost(&self) -> i64 {
        self.docs.len() as i64
    }

    fn payload(&self) -> Option<&[u8]> {
        self.payloads.get(self.current()?)?.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spans::testutil::collect_hits;

    #[test]
    fn groups_hits_by_document() {
        let hits = vec![(3, 4, 5), (1, 1, 2), (1, 2, 3), (3, 5, 6)];
        let mut spans = ListSpans::new(hits);
        assert_eq!(collect_hits(&mut spans), vec![(1, 1, 2), (1, 2, 3), (3, 4, 5), (3, 5, 6)]);
        assert_eq!(spans.next_doc().unwrap(), NO_MORE_DOCS);
    }

    #[test]
    fn reports_guarantees() {
        let spans = ListSpans::new(vec![(0, 3, 4), (0, 1, 2)]);
        assert!(!spans.guarantees().hits_start_point_sorted);
        assert!(spans.guarantees().hits_all_same_length);
        let spans = ListSpans::new(vec![(0, 1, 2), (0, 1, 2)]);
        assert!(!spans.guarantees().hits_have_unique_start_end);
    }

    #[test]
    fn advance_lands_on_next_document() {
        let mut spans = ListSpans::new(vec![(1, 0, 1), (4, 0, 1), (7, 2, 3)]);
        assert_eq!(spans.advance(2).unwrap(), 4);
        assert_eq!(spans.next_start_position().unwrap(), 0);
        assert_eq!(spans.advance(8).unwrap(), NO_MORE_DOCS);
    }
}
