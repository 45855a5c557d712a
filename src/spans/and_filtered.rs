use std::collections::BTreeSet;
use crate::core::error::{Error, Result};
use crate::core::types::{BEFORE_FIRST, NO_MORE_DOCS, NO_MORE_POSITIONS};
use crate::matchinfo::{HitQueryContext, MatchInfo, RelationInfo};
use crate::spans::buckets::{BucketStrategy, SpansInBuckets, NO_MORE_BUCKETS};
use crate::spans::sorted_unique::ensure_sorted;
use crate::spans::{DocPhase, SpanGuarantees, Spans};
use crate::writer::relation_payload::read_relation_id;

/// Which combinations of clause hits at one position are matches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpansFilter {
    /// Every clause points at the same relation, by the relation id in its
    /// payload. Used to combine a relation type term with attribute terms;
    /// payload and term of a match come from the first clause.
    SameRelationId,
    /// Every clause matched a different relation, and this set of relations
    /// wasn't returned at this position before in another order
    UniqueRelations,
}

impl SpansFilter {
    fn bucket_strategy(&self) -> BucketStrategy {
        match self {
            SpansFilter::SameRelationId => BucketStrategy::SameStartEnd { collect_payloads: true },
            SpansFilter::UniqueRelations => BucketStrategy::SameStartEnd { collect_payloads: false },
        }
    }
}

/// AND of clauses that must match the same start and end, filtered per
/// combination of clause hits.
///
/// Every clause is bucketed by same start and end. The clause whose bucket
/// is furthest behind moves until all buckets line up; then every
/// combination of bucket members is tried, like a counter where member
/// index of clause 0 is the lowest digit.
pub struct SpansAndFiltered {
    clauses: Vec<SpansInBuckets>,
    filter: SpansFilter,
    index_in_bucket: Vec<usize>,
    one_exhausted_in_current_doc: bool,
    at_first_in_current_doc: bool,
    relations_returned_at_this_position: BTreeSet<Vec<RelationInfo>>,
    context: Option<HitQueryContext>,
    guarantees: SpanGuarantees,
    phase: DocPhase,
}

impl SpansAndFiltered {
    pub fn new(clauses: Vec<Box<dyn Spans>>, filter: SpansFilter) -> Result<Self> {
        if clauses.is_empty() {
            return Err(Error::invalid_argument("AND needs at least one clause"));
        }
        let all_same_length = clauses.iter().any(|c| c.guarantees().hits_all_same_length);
        let clauses: Vec<_> = clauses
            .into_iter()
            .map(|c| SpansInBuckets::new(ensure_sorted(c), filter.bucket_strategy()))
            .collect();
        Ok(SpansAndFiltered {
            index_in_bucket: vec![0; clauses.len()],
            clauses,
            filter,
            one_exhausted_in_current_doc: false,
            // Start and end are -1 before the first document too
            at_first_in_current_doc: true,
            relations_returned_at_this_position: BTreeSet::new(),
            context: None,
            guarantees: SpanGuarantees {
                hits_start_point_sorted: true,
                hits_all_same_length: all_same_length,
                hits_have_unique_start_end: false,
            },
            phase: DocPhase::Unconfirmed,
        })
    }

    /// Clause whose bucket is furthest behind
    fn top(&self) -> usize {
        let mut top = 0;
        for (i, clause) in self.clauses.iter().enumerate().skip(1) {
            let lead = &self.clauses[top];
            if (clause.bucket_start(), clause.bucket_end()) < (lead.bucket_start(), lead.bucket_end()) {
                top = i;
            }
        }
        top
    }

    fn start_document(&mut self) -> Result<()> {
        self.relations_returned_at_this_position.clear();
        for clause in &mut self.clauses {
            let doc = clause.next_bucket()?;
            debug_assert_ne!(doc, NO_MORE_BUCKETS, "confirmed clause without hits");
        }
        Ok(())
    }

    fn next_position(&mut self) -> Result<bool> {
        let top = self.top();
        if self.clauses[top].next_bucket()? == NO_MORE_BUCKETS {
            return Ok(false);
        }
        self.relations_returned_at_this_position.clear();
        Ok(true)
    }

    fn at_match(&self) -> bool {
        let first = &self.clauses[0];
        let (start, end) = (first.bucket_start(), first.bucket_end());
        self.clauses
            .iter()
            .all(|c| c.bucket_start() == start && c.bucket_end() == end)
    }

    fn two_phase_current_doc_matches(&mut self) -> Result<bool> {
        self.one_exhausted_in_current_doc = false;
        self.at_first_in_current_doc = false;
        self.start_document()?;
        loop {
            if self.at_match() {
                self.index_in_bucket.fill(0);
                if self.next_match_at_this_position(false)? != NO_MORE_POSITIONS {
                    self.at_first_in_current_doc = true;
                    return Ok(true);
                }
            }
            if !self.next_position()? {
                return Ok(false);
            }
        }
    }

    /// Next accepted combination of bucket members at the current position
    fn next_match_at_this_position(&mut self, immediately_go_to_next: bool) -> Result<i32> {
        if !immediately_go_to_next && self.accept()? {
            return Ok(self.clauses[self.top()].bucket_start());
        }
        loop {
            let mut i = 0;
            while i < self.clauses.len() {
                if self.index_in_bucket[i] + 1 >= self.clauses[i].bucket_size() {
                    // Roll over and carry
                    self.index_in_bucket[i] = 0;
                    i += 1;
                } else {
                    self.index_in_bucket[i] += 1;
                    break;
                }
            }
            if i == self.clauses.len() {
                return Ok(NO_MORE_POSITIONS);
            }
            if self.accept()? {
                return Ok(self.clauses[i].start_position(self.index_in_bucket[i]));
            }
        }
    }

    fn accept(&mut self) -> Result<bool> {
        match self.filter {
            SpansFilter::SameRelationId => {
                let mut relation_id = None;
                for (clause, &index) in self.clauses.iter().zip(&self.index_in_bucket) {
                    let payload = clause
                        .payload(index)
                        .ok_or_else(|| Error::invalid_index("relation term without payload"))?;
                    let id = read_relation_id(payload)?;
                    match relation_id {
                        None => relation_id = Some(id),
                        Some(first) if first != id => return Ok(false),
                        Some(_) => {}
                    }
                }
                Ok(true)
            }
            SpansFilter::UniqueRelations => {
                let mut seen: Vec<Option<&RelationInfo>> = Vec::with_capacity(self.clauses.len());
                for (clause, &index) in self.clauses.iter().zip(&self.index_in_bucket) {
                    let relation = clause.relation_info(index);
                    if seen.contains(&relation) {
                        return Ok(false);
                    }
                    seen.push(relation);
                }
                let relations = self.captured_relations_sorted();
                Ok(self.relations_returned_at_this_position.insert(relations))
            }
        }
    }

    fn captured_relations_sorted(&self) -> Vec<RelationInfo> {
        let size = self.context.as_ref().map_or(0, |c| c.number_of_match_infos());
        let mut match_info = vec![None; size];
        self.get_match_info(&mut match_info);
        let mut relations: Vec<RelationInfo> = match_info
            .into_iter()
            .filter_map(|m| match m {
                Some(MatchInfo::Relation(r)) => Some(r),
                _ => None,
            })
            .collect();
        relations.sort();
        relations
    }

    /// Bring all clauses to the same document, starting from the first clause's
    fn do_next(&mut self, mut doc: i32) -> Result<i32> {
        'lead: loop {
            if doc == NO_MORE_DOCS {
                return Ok(NO_MORE_DOCS);
            }
            for i in 1..self.clauses.len() {
                if self.clauses[i].doc_id() < doc {
                    let next = self.clauses[i].approximation_advance(doc)?;
                    if next > doc {
                        doc = self.clauses[0].approximation_advance(next)?;
                        continue 'lead;
                    }
                }
            }
            return Ok(doc);
        }
    }

    fn reset_doc(&mut self) {
        self.at_first_in_current_doc = true;
        self.one_exhausted_in_current_doc = false;
        self.phase = DocPhase::Unconfirmed;
    }
}

impl Spans for SpansAndFiltered {
    fn doc_id(&self) -> i32 {
        self.clauses[0].doc_id()
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
        if self.one_exhausted_in_current_doc {
            return Ok(NO_MORE_POSITIONS);
        }
        if self.at_first_in_current_doc {
            self.at_first_in_current_doc = false;
            return Ok(self.clauses[self.top()].bucket_start());
        }

        // Every combination at this position first
        let start = self.next_match_at_this_position(true)?;
        if start != NO_MORE_POSITIONS {
            return Ok(start);
        }
        loop {
            if !self.next_position()? {
                self.one_exhausted_in_current_doc = true;
                return Ok(NO_MORE_POSITIONS);
            }
            if self.at_match() {
                self.index_in_bucket.fill(0);
                let start = self.next_match_at_this_position(false)?;
                if start != NO_MORE_POSITIONS {
                    return Ok(start);
                }
            }
        }
    }

    fn start_position(&self) -> i32 {
        if self.at_first_in_current_doc {
            BEFORE_FIRST
        } else if self.one_exhausted_in_current_doc {
            NO_MORE_POSITIONS
        } else {
            self.clauses[self.top()].bucket_start()
        }
    }

    fn end_position(&self) -> i32 {
        if self.at_first_in_current_doc {
            BEFORE_FIRST
        } else if self.one_exhausted_in_current_doc {
            NO_MORE_POSITIONS
        } else {
            self.clauses[self.top()].bucket_end()
        }
    }

    fn get_match_info(&self, match_info: &mut [Option<MatchInfo>]) {
        for (clause, &index) in self.clauses.iter().zip(&self.index_in_bucket) {
            clause.get_match_info(index, match_info);
        }
    }

    fn has_match_info(&self) -> bool {
        self.clauses.iter().any(|c| c.has_match_info())
    }

    fn relation_info(&self) -> Option<&RelationInfo> {
        self.clauses
            .iter()
            .zip(&self.index_in_bucket)
            .find_map(|(clause, &index)| clause.relation_info(index))
    }

    fn guarantees(&self) -> SpanGuarantees {
        self.guarantees
    }

    fn set_hit_query_context(&mut self, context: &HitQueryContext) {
        for clause in &mut self.clauses {
            clause.set_hit_query_context(context);
        }
        self.context = Some(context.clone());
    }

    fn cost(&self) -> i64 {
        self.clauses.iter().map(|c| c.cost()).min().unwrap_or(0)
    }

    fn payload(&self) -> Option<&[u8]> {
        self.clauses[0].payload(self.index_in_bucket[0])
    }

    fn term(&self) -> Option<&str> {
        self.clauses[0].term(self.index_in_bucket[0])
    }

    fn approximation_next_doc(&mut self) -> Result<i32> {
        self.reset_doc();
        let doc = self.clauses[0].approximation_next_doc()?;
        self.do_next(doc)
    }

    fn approximation_advance(&mut self, target: i32) -> Result<i32> {
        self.reset_doc();
        let doc = self.clauses[0].approximation_advance(target)?;
        self.do_next(doc)
    }

    fn matches(&mut self) -> Result<bool> {
        for clause in &mut self.clauses {
            if !clause.matches()? {
                return Ok(false);
            }
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
    use std::sync::Arc;
    use super::*;
    use crate::index::segment::{DocumentInput, FieldInput, IndexSegment, SegmentBuilder};
    use crate::matchinfo::relation::Attributes;
    use crate::matchinfo::{MatchInfoDefs, MatchInfoType};
    use crate::spans::list::ListSpans;
    use crate::spans::term::TermSpans;
    use crate::spans::testutil::collect_hits;
    use crate::writer::relation_payload::{attribute_term, decode_relation, relation_field};

    fn attrs(name: &str, value: &str) -> Attributes {
        Attributes::from([(name.to_string(), vec![value.to_string()])])
    }

    #[test]
    fn same_relation_id_pairs_type_and_attribute_terms() {
        let mut builder = SegmentBuilder::new();
        builder.add_document(
            DocumentInput::new().field(
                "contents",
                FieldInput::new()
                    .annotation("word", &["a", "b", "c"])
                    .relation("dep", "nsubj", (0, 1), (1, 2), attrs("x", "1"))
                    .relation("dep", "nsubj", (0, 1), (2, 3), attrs("x", "2")),
            ),
        );
        let segment = builder.build(0, 0).unwrap();
        let field = relation_field("contents");
        let type_spans = TermSpans::new(segment.postings(&field, "dep::nsubj").unwrap());
        let attr_spans = TermSpans::new(segment.postings(&field, &attribute_term("dep::nsubj", "x", "2")).unwrap());

        let mut spans =
            SpansAndFiltered::new(vec![Box::new(type_spans), Box::new(attr_spans)], SpansFilter::SameRelationId)
                .unwrap();
        assert_eq!(spans.next_doc().unwrap(), 0);
        assert_eq!(spans.next_start_position().unwrap(), 0);
        assert_eq!(spans.end_position(), 1);
        let relation = decode_relation(0, spans.payload().unwrap(), Arc::from("contents")).unwrap();
        assert_eq!(relation.relation_id, 1);
        assert_eq!(relation.target_start(), 2);
        assert_eq!(spans.term(), Some("dep::nsubj"));
        assert_eq!(spans.next_start_position().unwrap(), NO_MORE_POSITIONS);
    }

    #[test]
    fn unique_relations_suppresses_permutations() {
        let field: Arc<str> = Arc::from("contents");
        let r1 = RelationInfo::new(false, 0, 1, 3, 4, 0, false, field.clone()).unwrap();
        let r2 = RelationInfo::new(false, 3, 4, 0, 1, 1, false, field.clone()).unwrap();

        let defs = MatchInfoDefs::new();
        let context = HitQueryContext::new("contents", defs);
        let a = context.register_match_info("a", Some(MatchInfoType::Relation));
        let b = context.register_match_info("b", Some(MatchInfoType::Relation));
        let slot = |index: usize, r: &RelationInfo| {
            let mut m = vec![None, None];
            m[index] = Some(MatchInfo::Relation(r.clone()));
            m
        };
        let clause_a = ListSpans::from_relations(vec![(0, r1.clone()), (0, r2.clone())])
            .with_match_infos(vec![slot(a, &r1), slot(a, &r2)]);
        let clause_b = ListSpans::from_relations(vec![(0, r1.clone()), (0, r2.clone())])
            .with_match_infos(vec![slot(b, &r1), slot(b, &r2)]);

        let mut spans =
            SpansAndFiltered::new(vec![Box::new(clause_a), Box::new(clause_b)], SpansFilter::UniqueRelations)
                .unwrap();
        spans.set_hit_query_context(&context);
        assert_eq!(spans.next_doc().unwrap(), 0);
        assert_eq!(spans.next_start_position().unwrap(), 0);
        let mut match_info = vec![None, None];
        spans.get_match_info(&mut match_info);
        assert_eq!(match_info[a], Some(MatchInfo::Relation(r2.clone())));
        assert_eq!(match_info[b], Some(MatchInfo::Relation(r1.clone())));
        assert_eq!(spans.next_start_position().unwrap(), NO_MORE_POSITIONS);
    }

    #[test]
    fn only_aligned_positions_match() {
        let a = ListSpans::new(vec![(0, 1, 2), (0, 3, 4), (1, 0, 1), (2, 5, 6)]).with_payloads(vec![
            Some(vec![0]),
            Some(vec![1]),
            Some(vec![0]),
            Some(vec![0]),
        ]);
        let b = ListSpans::new(vec![(0, 3, 4), (2, 5, 6), (2, 7, 8)]).with_payloads(vec![
            Some(vec![1]),
            Some(vec![0]),
            Some(vec![0]),
        ]);
        let mut spans =
            SpansAndFiltered::new(vec![Box::new(a), Box::new(b)], SpansFilter::SameRelationId).unwrap();
        assert_eq!(collect_hits(&mut spans), vec![(0, 3, 4), (2, 5, 6)]);
    }
}
