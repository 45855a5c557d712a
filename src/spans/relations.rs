use std::sync::Arc;
use crate::core::error::{Error, Result};
use crate::core::types::{Direction, SpanMode};
use crate::matchinfo::relation::{class_and_type, CLASS_INLINE_TAG};
use crate::matchinfo::{HitQueryContext, MatchInfo, MatchInfoType, RelationInfo};
use crate::reader::relation_info::RelationInfoReader;
use crate::spans::filter::{Accept, FilterSpans, HitFilter};
use crate::spans::{SpanGuarantees, Spans};
use crate::writer::relation_payload::{
    attributes_in_term, decode_relation, full_type_from_term, is_relation_info_term, parallel_version,
    relation_field, with_parallel_version, ATTR_SEPARATOR,
};

/// Turns relation term hits into relation hits: decodes each payload, keeps
/// the relations going the requested direction and reports the requested
/// part of each one as the hit.
pub type SpansRelations = FilterSpans<RelationsFilter>;

pub struct RelationsFilter {
    field: Arc<str>,
    relation_field: String,
    relation_type: String,
    direction: Direction,
    span_mode: SpanMode,
    capture_as: Option<String>,
    capture_index: usize,
    target_field: Arc<str>,
    reader: Option<RelationInfoReader>,
    current: Option<RelationInfo>,
    clause_guarantees: SpanGuarantees,
}

impl SpansRelations {
    /// `clause` matches terms in the relation postings of `field` and must
    /// expose their payloads and terms. `reader` is used to find attributes
    /// that weren't indexed with the term.
    pub fn create(
        field: &str,
        relation_type: &str,
        clause: Box<dyn Spans>,
        direction: Direction,
        span_mode: SpanMode,
        capture_as: Option<&str>,
        reader: Option<RelationInfoReader>,
    ) -> Result<Self> {
        if span_mode == SpanMode::AllSpans {
            return Err(Error::invalid_argument("all-spans mode is only valid for rspan()"));
        }
        let field: Arc<str> = Arc::from(field);
        let clause_guarantees = clause.guarantees();
        Ok(FilterSpans::new(
            clause,
            RelationsFilter {
                relation_field: relation_field(&field),
                target_field: field.clone(),
                field,
                relation_type: relation_type.to_string(),
                direction,
                span_mode,
                capture_as: capture_as.filter(|c| !c.is_empty()).map(|c| c.to_string()),
                capture_index: 0,
                reader,
                current: None,
                clause_guarantees,
            },
        ))
    }
}

impl RelationsFilter {
    /// Relation the last accepted hit is about
    pub fn current(&self) -> Option<&RelationInfo> {
        self.current.as_ref()
    }

    fn is_inline_tag(&self) -> bool {
        class_and_type(&self.relation_type).0 == CLASS_INLINE_TAG
    }

    fn decode(&mut self, candidate: &dyn Spans) -> Result<RelationInfo> {
        let position = candidate.start_position();
        let payload = candidate.payload().ok_or_else(|| {
            Error::invalid_index(format!(
                "relation term without payload in doc {} at {}",
                candidate.doc_id(),
                position
            ))
        })?;
        let mut relation = decode_relation(position, payload, self.field.clone())?
            .with_target_field(self.target_field.clone());

        let Some(term) = candidate.term() else {
            return Ok(relation);
        };
        relation.set_full_relation_type(Some(Arc::from(full_type_from_term(term))));
        let attributes = if is_relation_info_term(term) || term.contains(ATTR_SEPARATOR) {
            Arc::new(attributes_in_term(term)?)
        } else {
            match self.reader.as_mut() {
                Some(reader) if relation.may_have_info_in_relation_index() => {
                    reader.get_attributes(&self.relation_field, candidate.doc_id(), relation.relation_id)?
                }
                _ => Arc::default(),
            }
        };
        relation.set_attributes(Some(attributes));
        Ok(relation)
    }
}

impl HitFilter for RelationsFilter {
    fn accept(&mut self, candidate: &mut dyn Spans) -> Result<Accept> {
        let relation = self.decode(candidate)?;
        if self.span_mode == SpanMode::Source && relation.is_root() {
            return Ok(Accept::No);
        }
        let accepted = match self.direction {
            Direction::Root => relation.is_root(),
            Direction::Forward => relation.source_start() <= relation.target_start(),
            Direction::Backward => relation.source_start() >= relation.target_start(),
            Direction::BothDirections => true,
        };
        self.current = Some(relation);
        Ok(if accepted { Accept::Yes } else { Accept::No })
    }

    fn start(&self, clause: &dyn Spans) -> i32 {
        match (&self.current, self.span_mode) {
            (Some(r), SpanMode::Source) => r.source_start(),
            (Some(r), SpanMode::Target) => r.target_start(),
            (Some(r), _) => r.span_start(),
            (None, _) => clause.start_position(),
        }
    }

    fn end(&self, clause: &dyn Spans) -> i32 {
        match (&self.current, self.span_mode) {
            (Some(r), SpanMode::Source) => r.source_end(),
            (Some(r), SpanMode::Target) => r.target_end(),
            (Some(r), _) => r.span_end(),
            (None, _) => clause.end_position(),
        }
    }

    fn get_match_info(&self, clause: &dyn Spans, match_info: &mut [Option<MatchInfo>]) {
        clause.get_match_info(match_info);
        if self.capture_as.is_some() {
            if let (Some(relation), Some(slot)) = (&self.current, match_info.get_mut(self.capture_index)) {
                *slot = Some(MatchInfo::relation(relation.clone()));
            }
        }
    }

    fn has_match_info(&self, clause: &dyn Spans) -> bool {
        self.capture_as.is_some() || clause.has_match_info()
    }

    fn relation_info<'a>(&'a self, _clause: &'a dyn Spans) -> Option<&'a RelationInfo> {
        self.current.as_ref()
    }

    fn guarantees(&self, _clause: &dyn Spans) -> SpanGuarantees {
        let sorted = self.clause_guarantees.hits_start_point_sorted
            && match self.span_mode {
                // Relations are indexed at their source, roots at their target
                SpanMode::Source => true,
                SpanMode::FullSpan => matches!(self.direction, Direction::Forward | Direction::Root),
                _ => self.direction == Direction::Root,
            };
        SpanGuarantees {
            hits_start_point_sorted: sorted,
            ..SpanGuarantees::NONE
        }
    }

    fn set_hit_query_context(&mut self, clause: &mut dyn Spans, context: &HitQueryContext) {
        clause.set_hit_query_context(context);
        // A relation class like "al__de" points into the parallel field for "de"
        let relation_class = class_and_type(&self.relation_type).0;
        let is_inline_tag = self.is_inline_tag();
        self.target_field = match parallel_version(relation_class) {
            Some(version) if !is_inline_tag => Arc::from(with_parallel_version(context.default_field(), version)),
            _ => self.field.clone(),
        };
        if let Some(name) = &self.capture_as {
            let match_type = if is_inline_tag { MatchInfoType::InlineTag } else { MatchInfoType::Relation };
            self.capture_index =
                context.register_match_info_in(name, Some(match_type), &self.field, Some(&self.target_field));
        }
    }

    fn clause_target(&self, target: i32) -> Option<i32> {
        let in_order = self.span_mode == SpanMode::Source
            || (self.span_mode == SpanMode::FullSpan && self.direction == Direction::Forward);
        in_order.then_some(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::NO_MORE_POSITIONS;
    use crate::index::segment::{DocumentInput, FieldInput, IndexSegment, MemorySegment, SegmentBuilder};
    use crate::matchinfo::relation::Attributes;
    use crate::matchinfo::MatchInfoDefs;
    use crate::spans::term::TermSpans;
    use crate::spans::testutil::collect_hits;

    fn segment() -> MemorySegment {
        let mut attributes = Attributes::new();
        attributes.insert("lemma".into(), vec!["see".into()]);
        let content = FieldInput::new()
            .annotation("word", &["a", "b", "c", "d", "e", "f", "g"])
            .relation("dep", "obj", (2, 3), (5, 6), attributes)
            .relation("dep", "obj", (6, 7), (0, 1), Attributes::new())
            .root_relation("dep", "obj", (4, 5), Attributes::new());
        let mut builder = SegmentBuilder::new();
        builder.add_document(DocumentInput::new().field("contents", content));
        builder.build(0, 0).unwrap()
    }

    fn relations(segment: &MemorySegment, direction: Direction, span_mode: SpanMode) -> SpansRelations {
        let clause = TermSpans::new(segment.postings("contents%_relation", "dep::obj").unwrap());
        SpansRelations::create("contents", "dep::obj", Box::new(clause), direction, span_mode, None, None).unwrap()
    }

    #[test]
    fn filters_by_direction() {
        let segment = segment();
        let mut backward = relations(&segment, Direction::Backward, SpanMode::FullSpan);
        // Hits come in index order, which isn't start order for backward relations
        assert!(!backward.guarantees().hits_start_point_sorted);
        assert_eq!(collect_hits(&mut backward), vec![(0, 4, 5), (0, 0, 7)]);
        let mut forward = relations(&segment, Direction::Forward, SpanMode::FullSpan);
        assert_eq!(collect_hits(&mut forward), vec![(0, 2, 6), (0, 4, 5)]);
        let mut both = relations(&segment, Direction::BothDirections, SpanMode::FullSpan);
        assert_eq!(collect_hits(&mut both).len(), 3);
        let mut root = relations(&segment, Direction::Root, SpanMode::Target);
        assert_eq!(collect_hits(&mut root), vec![(0, 4, 5)]);
    }

    #[test]
    fn source_mode_skips_roots() {
        let segment = segment();
        let mut spans = relations(&segment, Direction::BothDirections, SpanMode::Source);
        assert!(spans.guarantees().hits_start_point_sorted);
        assert_eq!(collect_hits(&mut spans), vec![(0, 2, 3), (0, 6, 7)]);
    }

    #[test]
    fn captures_relation_with_type() {
        let segment = segment();
        let clause = TermSpans::new(segment.postings("contents%_relation", "dep::obj").unwrap());
        let mut spans = SpansRelations::create(
            "contents",
            "dep::obj",
            Box::new(clause),
            Direction::Forward,
            SpanMode::Target,
            Some("r"),
            None,
        )
        .unwrap();
        let context = HitQueryContext::new("contents", MatchInfoDefs::new());
        spans.set_hit_query_context(&context);
        assert!(spans.has_match_info());
        assert_eq!(spans.next_doc().unwrap(), 0);
        assert_eq!(spans.next_start_position().unwrap(), 5);
        let mut slots = vec![None; context.number_of_match_infos()];
        spans.get_match_info(&mut slots);
        let Some(MatchInfo::Relation(r)) = &slots[0] else {
            panic!("expected a relation capture, got {:?}", slots[0]);
        };
        assert_eq!(r.full_relation_type(), Some("dep::obj"));
        assert_eq!((r.source_start(), r.target_end()), (2, 6));
        // Attributes live in the relation-info store, which this segment lacks
        assert_eq!(r.attributes().map(|a| a.len()), Some(0));
    }

    #[test]
    fn info_term_carries_attributes() {
        let segment = segment();
        let clause = TermSpans::new(
            segment
                .postings_matching("contents%_relation", &|t| is_relation_info_term(t) && t.contains("lemma"))
                .unwrap(),
        );
        let mut spans =
            SpansRelations::create("contents", "dep::obj", Box::new(clause), Direction::BothDirections, SpanMode::Source, None, None)
                .unwrap();
        assert_eq!(spans.next_doc().unwrap(), 0);
        assert_eq!(spans.next_start_position().unwrap(), 2);
        let relation = spans.relation_info().unwrap();
        assert_eq!(relation.attributes().unwrap()["lemma"], vec!["see".to_string()]);
        assert_eq!(spans.next_start_position().unwrap(), NO_MORE_POSITIONS);
    }

    #[test]
    fn attributes_from_relation_info_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut attributes = Attributes::new();
        attributes.insert("pos".into(), vec!["NOUN".into()]);
        let content = FieldInput::new()
            .annotation("word", &["a", "b", "c"])
            .relation("dep", "amod", (0, 1), (1, 2), attributes.clone());
        let mut builder = SegmentBuilder::new();
        builder.add_document(DocumentInput::new().field("contents", content));
        let segment = builder.build_on_disk(dir.path(), 0, 0).unwrap();
        let reader = segment.relation_info().unwrap().reader().unwrap();
        let clause = TermSpans::new(segment.postings("contents%_relation", "dep::amod").unwrap());
        let mut spans = SpansRelations::create(
            "contents",
            "dep::amod",
            Box::new(clause),
            Direction::BothDirections,
            SpanMode::FullSpan,
            None,
            Some(reader),
        )
        .unwrap();
        assert_eq!(collect_hits(&mut spans), vec![(0, 0, 2)]);
        assert_eq!(spans.filter().current().unwrap().attributes(), Some(&attributes));
    }

    #[test]
    fn alignment_class_targets_parallel_field() {
        let segment = segment();
        let clause = TermSpans::new(segment.postings("contents%_relation", "dep::obj").unwrap());
        let mut spans = SpansRelations::create(
            "contents__en",
            "al__nl::word",
            Box::new(clause),
            Direction::BothDirections,
            SpanMode::Source,
            Some("al"),
            None,
        )
        .unwrap();
        let context = HitQueryContext::new("contents__en", MatchInfoDefs::new());
        spans.set_hit_query_context(&context);
        let def = context.defs().get(0).unwrap();
        assert_eq!(def.target_field.as_deref(), Some("contents__nl"));
        assert_eq!(def.match_type, Some(MatchInfoType::Relation));
    }

    #[test]
    fn all_spans_mode_is_rejected() {
        let segment = segment();
        let clause = TermSpans::new(segment.postings("contents%_relation", "dep::obj").unwrap());
        let result = SpansRelations::create(
            "contents",
            "dep::obj",
            Box::new(clause),
            Direction::BothDirections,
            SpanMode::AllSpans,
            None,
            None,
        );
        assert!(result.is_err());
    }
}
