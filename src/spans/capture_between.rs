use std::sync::Arc;
use crate::core::error::Result;
use crate::core::types::NO_MORE_POSITIONS;
use crate::matchinfo::{self, HitQueryContext, MatchInfo, MatchInfoType, RelationInfo, RelationListInfo};
use crate::spans::buckets::{BucketStrategy, SpansInBuckets};
use crate::spans::buffered::SpansBuffered;
use crate::spans::capture_overlapping::OverlappingSpansCapturer;
use crate::spans::filter::{Accept, FilterSpans, HitFilter};
use crate::spans::{SpanGuarantees, Spans};

struct TargetOverlaps {
    capturer: OverlappingSpansCapturer,
    capture_as: String,
    index: usize,
}

/// One side a source hit must be aligned to: the relations to match on, the
/// relations to capture and optionally hits the relation targets must fall in.
pub struct Target {
    match_relations: SpansBuffered,
    capture_relations: SpansBuffered,
    capture_relations_as: String,
    capture_relations_index: usize,
    // Per-document buckets of target hits; None if there are none in this segment
    target: Option<SpansInBuckets>,
    has_target_restrictions: bool,
    capture_target_as: Vec<String>,
    capture_target_indexes: Vec<usize>,
    target_field: Arc<str>,
    optional_match: bool,
    overlaps: Option<TargetOverlaps>,
}

impl Target {
    /// `match_relations` and `capture_relations` must produce relation hits
    /// at their sources, start-sorted.
    pub fn new(
        match_relations: Box<dyn Spans>,
        capture_relations: Box<dyn Spans>,
        capture_relations_as: &str,
        target_field: &str,
    ) -> Self {
        Target {
            match_relations: SpansBuffered::new(match_relations),
            capture_relations: SpansBuffered::new(capture_relations),
            capture_relations_as: capture_relations_as.to_string(),
            capture_relations_index: 0,
            target: None,
            has_target_restrictions: false,
            capture_target_as: Vec::new(),
            capture_target_indexes: Vec::new(),
            target_field: Arc::from(target_field),
            optional_match: false,
            overlaps: None,
        }
    }

    /// Relation targets must overlap one of these hits. `None` means the
    /// restriction exists but has no hits in this segment.
    pub fn restrict_to(mut self, target: Option<Box<dyn Spans>>) -> Self {
        self.target = target.map(|t| SpansInBuckets::new(t, BucketStrategy::PerDocument));
        self.has_target_restrictions = true;
        self
    }

    /// Capture the target span found for each hit
    pub fn capture_target_as(mut self, name: &str) -> Self {
        self.capture_target_as.push(name.to_string());
        self
    }

    /// Keep source hits even when nothing matches on this side
    pub fn optional(mut self) -> Self {
        self.optional_match = true;
        self
    }

    /// Without target restrictions: capture the spans overlapping each target span
    pub fn capture_target_overlaps(mut self, spans: Box<dyn Spans>, capture_as: &str) -> Self {
        self.overlaps = Some(TargetOverlaps {
            capturer: OverlappingSpansCapturer::new(spans),
            capture_as: capture_as.to_string(),
            index: 0,
        });
        self
    }

    fn set_hit_query_context(&mut self, context: &HitQueryContext) {
        self.match_relations.set_hit_query_context(context);
        self.capture_relations.set_hit_query_context(context);
        self.capture_relations_index = context.register_match_info_in(
            &self.capture_relations_as,
            Some(MatchInfoType::ListOfRelations),
            context.field(),
            Some(&self.target_field),
        );

        let target_context = context.with_field(Some(&self.target_field));
        self.capture_target_indexes = self
            .capture_target_as
            .iter()
            .map(|name| target_context.register_match_info(name, Some(MatchInfoType::Span)))
            .collect();
        if let Some(target) = self.target.as_mut() {
            target.set_hit_query_context(&target_context);
        }
        if let Some(overlaps) = self.overlaps.as_mut() {
            overlaps.capturer.set_hit_query_context(&target_context);
            overlaps.index = target_context.register_match_info_in(
                &overlaps.capture_as,
                Some(MatchInfoType::ListOfRelations),
                context.field(),
                Some(&self.target_field),
            );
        }
    }

    /// Match the current source hit against this side, recording captures
    /// in `hit`. False if nothing matched.
    fn capture(&mut self, doc: i32, source_start: i32, source_end: i32, hit: &mut CurrentHit) -> Result<bool> {
        let Some((min_target, max_target)) =
            find_overlapping_relations(&mut self.match_relations, doc, source_start, source_end, &mut hit.matching)?
        else {
            return Ok(false);
        };
        // The hit grows to cover the sources of every matched relation
        for relation in &hit.matching {
            hit.start = hit.start.min(relation.source_start());
            hit.end = hit.end.max(relation.source_end());
        }
        find_overlapping_relations(&mut self.capture_relations, doc, hit.start, hit.end, &mut hit.captured)?;

        let mut target_start = min_target;
        let mut target_end = max_target;
        let mut chosen = None;
        if self.has_target_restrictions {
            let Some(buckets) = self.target.as_mut() else {
                return Ok(false);
            };
            if buckets.doc_id() < doc && buckets.advance(doc)? == doc {
                buckets.next_bucket()?;
            }
            if buckets.doc_id() != doc {
                return Ok(false);
            }
            // Most matched relations covered, then shortest
            let mut best: Option<(usize, usize, i32)> = None;
            for i in 0..buckets.bucket_size() {
                let (start, end) = (buckets.start_position(i), buckets.end_position(i));
                if min_target >= end || max_target <= start {
                    continue;
                }
                let covered = hit
                    .matching
                    .iter()
                    .filter(|r| r.target_end() > start && r.target_start() < end)
                    .count();
                let length = end - start;
                let better = match best {
                    None => covered > 0,
                    Some((_, best_covered, best_length)) => {
                        covered > best_covered || (covered == best_covered && length < best_length)
                    }
                };
                if better {
                    best = Some((i, covered, length));
                }
            }
            let Some((i, _, _)) = best else {
                return Ok(false);
            };
            let (start, end) = (buckets.start_position(i), buckets.end_position(i));
            hit.captured.retain(|r| r.target_end() > start && r.target_start() < end);
            target_start = target_start.min(start);
            target_end = target_end.max(end);
            chosen = Some(i);
        }

        hit.captured.sort();
        let relations = RelationListInfo::new(hit.captured.clone(), hit.field.clone());
        set_slot(&mut hit.match_info, self.capture_relations_index, MatchInfo::ListOfRelations(relations));
        for &index in &self.capture_target_indexes {
            set_slot(
                &mut hit.match_info,
                index,
                MatchInfo::span(target_start, target_end, self.target_field.clone()),
            );
        }
        match (chosen, self.target.as_ref(), self.overlaps.as_mut()) {
            (Some(i), Some(buckets), _) => buckets.get_match_info(i, &mut hit.match_info),
            (None, _, Some(overlaps)) => {
                let spans = overlaps.capturer.process_hit(doc, target_start, target_end)?;
                let list = RelationListInfo::new(spans, self.target_field.clone());
                set_slot(&mut hit.match_info, overlaps.index, MatchInfo::ListOfRelations(list));
            }
            _ => {}
        }
        Ok(true)
    }
}

/// Relations in `relations` whose source overlaps [start, end), into `out`.
/// Returns the range their targets cover, or None if there are none.
///
/// Source hits may not overlap each other: the relations are only rewound
/// to the mark set at the previous source hit.
fn find_overlapping_relations(
    relations: &mut SpansBuffered,
    doc: i32,
    start: i32,
    end: i32,
    out: &mut Vec<RelationInfo>,
) -> Result<Option<(i32, i32)>> {
    out.clear();
    let mut relations_doc = relations.doc_id();
    if relations_doc < doc {
        relations_doc = relations.advance(doc)?;
    }
    if relations_doc != doc {
        return Ok(None);
    }
    if relations.start_position() > start {
        relations.reset();
    }
    while relations.end_position() <= start {
        if relations.next_start_position()? == NO_MORE_POSITIONS {
            break;
        }
    }
    relations.mark();

    let mut limits: Option<(i32, i32)> = None;
    while relations.start_position() < end {
        if relations.end_position() > start {
            if let Some(relation) = relations.relation_info() {
                limits = Some(match limits {
                    None => (relation.target_start(), relation.target_end()),
                    Some((min, max)) => (min.min(relation.target_start()), max.max(relation.target_end())),
                });
                out.push(relation.clone());
            }
        }
        relations.next_start_position()?;
    }
    Ok(limits)
}

fn set_slot(match_info: &mut Vec<Option<MatchInfo>>, index: usize, value: MatchInfo) {
    if match_info.len() <= index {
        match_info.resize(index + 1, None);
    }
    match_info[index] = Some(value);
}

struct CurrentHit {
    start: i32,
    end: i32,
    matching: Vec<RelationInfo>,
    captured: Vec<RelationInfo>,
    match_info: Vec<Option<MatchInfo>>,
    field: Arc<str>,
}

/// Captures the relations between each source hit and its targets
/// (alignments in a parallel corpus). The reported hit is widened to cover
/// the sources of every relation it matched.
pub type SpansCaptureRelationsBetweenSpans = FilterSpans<CaptureRelationsBetween>;

pub struct CaptureRelationsBetween {
    targets: Vec<Target>,
    context: Option<HitQueryContext>,
    hit: CurrentHit,
}

impl SpansCaptureRelationsBetweenSpans {
    pub fn between(source: Box<dyn Spans>, targets: Vec<Target>) -> Self {
        FilterSpans::new(
            source,
            CaptureRelationsBetween {
                targets,
                context: None,
                hit: CurrentHit {
                    start: -1,
                    end: -1,
                    matching: Vec::new(),
                    captured: Vec::new(),
                    match_info: Vec::new(),
                    field: Arc::from(""),
                },
            },
        )
    }
}

impl HitFilter for CaptureRelationsBetween {
    fn accept(&mut self, candidate: &mut dyn Spans) -> Result<Accept> {
        let n = self.context.as_ref().map_or(0, |c| c.number_of_match_infos());
        self.hit.match_info.clear();
        self.hit.match_info.resize(n, None);
        candidate.get_match_info(&mut self.hit.match_info);

        let doc = candidate.doc_id();
        let source_start = candidate.start_position();
        let source_end = candidate.end_position();
        self.hit.start = source_start;
        self.hit.end = source_end;
        for target in &mut self.targets {
            if !target.capture(doc, source_start, source_end, &mut self.hit)? && !target.optional_match {
                return Ok(Accept::No);
            }
        }
        Ok(Accept::Yes)
    }

    fn start(&self, _clause: &dyn Spans) -> i32 {
        self.hit.start
    }

    fn end(&self, _clause: &dyn Spans) -> i32 {
        self.hit.end
    }

    fn get_match_info(&self, _clause: &dyn Spans, match_info: &mut [Option<MatchInfo>]) {
        matchinfo::merge_into(match_info, &self.hit.match_info)
    }

    fn has_match_info(&self, _clause: &dyn Spans) -> bool {
        true
    }

    fn guarantees(&self, _clause: &dyn Spans) -> SpanGuarantees {
        SpanGuarantees::NONE
    }

    fn set_hit_query_context(&mut self, clause: &mut dyn Spans, context: &HitQueryContext) {
        clause.set_hit_query_context(context);
        self.hit.field = context.field().clone();
        for target in &mut self.targets {
            target.set_hit_query_context(context);
        }
        self.context = Some(context.clone());
    }

    // Widened starts can go below the clause's, so hits are stepped through
    fn clause_target(&self, _target: i32) -> Option<i32> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchinfo::MatchInfoDefs;
    use crate::spans::list::ListSpans;
    use crate::spans::testutil::collect_hits;

    const SOURCE: &str = "contents__en";
    const TARGET: &str = "contents__nl";

    fn alignment(source: (i32, i32), target: (i32, i32)) -> (i32, RelationInfo) {
        let relation = RelationInfo::new(false, source.0, source.1, target.0, target.1, 0, false, Arc::from(SOURCE))
            .unwrap()
            .with_target_field(Arc::from(TARGET))
            .with_type(Arc::from("al__nl::word"));
        (0, relation)
    }

    fn alignments() -> Box<dyn Spans> {
        Box::new(ListSpans::from_relations(vec![
            alignment((1, 2), (0, 1)),
            alignment((2, 3), (1, 2)),
            alignment((5, 6), (3, 4)),
        ]))
    }

    fn source() -> Box<dyn Spans> {
        Box::new(ListSpans::new(vec![(0, 1, 2), (0, 5, 6), (0, 8, 9)]))
    }

    fn context() -> HitQueryContext {
        HitQueryContext::new(SOURCE, MatchInfoDefs::new())
    }

    #[test]
    fn keeps_source_hits_with_aligned_relations() {
        let target = Target::new(alignments(), alignments(), "rels", TARGET).capture_target_as("T");
        let mut spans = SpansCaptureRelationsBetweenSpans::between(source(), vec![target]);
        let context = context();
        spans.set_hit_query_context(&context);
        assert_eq!(collect_hits(&mut spans), vec![(0, 1, 2), (0, 5, 6)]);
    }

    #[test]
    fn picks_target_hit_covering_most_relations() {
        let restriction = Box::new(ListSpans::new(vec![(0, 0, 1), (0, 0, 4), (0, 3, 5)]));
        let target = Target::new(alignments(), alignments(), "rels", TARGET)
            .restrict_to(Some(restriction))
            .capture_target_as("T");
        let mut spans = SpansCaptureRelationsBetweenSpans::between(source(), vec![target]);
        let context = context();
        spans.set_hit_query_context(&context);
        let defs = context.defs();
        let t = defs.index_of("T").unwrap();
        let rels = defs.index_of("rels").unwrap();
        assert_eq!(defs.get(t).unwrap().field.as_ref(), TARGET);

        assert_eq!(spans.next_doc().unwrap(), 0);
        assert_eq!(spans.next_start_position().unwrap(), 1);
        let mut slots = vec![None; context.number_of_match_infos()];
        spans.get_match_info(&mut slots);
        // (0,1) and (0,4) both cover the one relation; the shorter wins
        assert_eq!(slots[t], Some(MatchInfo::span(0, 1, Arc::from(TARGET))));
        let Some(MatchInfo::ListOfRelations(list)) = &slots[rels] else {
            panic!("expected captured relations");
        };
        assert_eq!(list.relations().len(), 1);

        assert_eq!(spans.next_start_position().unwrap(), 5);
        spans.get_match_info(&mut slots);
        assert_eq!(slots[t], Some(MatchInfo::span(3, 5, Arc::from(TARGET))));
        assert_eq!(spans.next_start_position().unwrap(), NO_MORE_POSITIONS);
    }

    #[test]
    fn widens_hit_to_matched_sources() {
        let source = Box::new(ListSpans::new(vec![(0, 2, 3)]));
        let relations = Box::new(ListSpans::from_relations(vec![alignment((1, 4), (0, 2))]));
        let capture = Box::new(ListSpans::from_relations(vec![alignment((1, 4), (0, 2))]));
        let target = Target::new(relations, capture, "rels", TARGET);
        let mut spans = SpansCaptureRelationsBetweenSpans::between(source, vec![target]);
        spans.set_hit_query_context(&context());
        assert_eq!(collect_hits(&mut spans), vec![(0, 1, 4)]);
    }

    #[test]
    fn restriction_without_hits_rejects_unless_optional() {
        let target = Target::new(alignments(), alignments(), "rels", TARGET).restrict_to(None);
        let mut spans = SpansCaptureRelationsBetweenSpans::between(source(), vec![target]);
        spans.set_hit_query_context(&context());
        assert!(collect_hits(&mut spans).is_empty());

        let target = Target::new(alignments(), alignments(), "rels", TARGET).restrict_to(None).optional();
        let mut spans = SpansCaptureRelationsBetweenSpans::between(source(), vec![target]);
        spans.set_hit_query_context(&context());
        assert_eq!(collect_hits(&mut spans).len(), 3);
    }
}
