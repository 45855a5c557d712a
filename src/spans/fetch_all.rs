use roaring::RoaringBitmap;
use crate::core::error::Result;
use crate::core::types::{NO_MORE_DOCS, NO_MORE_POSITIONS};
use crate::matchinfo::{HitQueryContext, MatchInfo};
use crate::results::hit::MatchInfos;
use crate::results::store::HitsBuilder;
use crate::spans::Spans;

/// The previous hit, to drop exact repeats
pub(crate) type PreviousHit = Option<(i32, i32, i32, Option<MatchInfos>)>;

/// Add the hits of the document `spans` is on (already confirmed) to
/// `hits`, with `doc_base` added to the doc id. Returns the number added.
pub(crate) fn collect_document(
    spans: &mut dyn Spans,
    match_info_slots: Option<usize>,
    doc_base: i32,
    hits: &mut HitsBuilder,
    previous: &mut PreviousHit,
) -> Result<usize> {
    let doc = spans.doc_id() + doc_base;
    let mut added = 0;
    loop {
        let start = spans.next_start_position()?;
        if start == NO_MORE_POSITIONS {
            break;
        }
        let end = spans.end_position();
        let match_infos: Option<MatchInfos> = match_info_slots.map(|n| {
            let mut slots: Vec<Option<MatchInfo>> = vec![None; n];
            spans.get_match_info(&mut slots);
            slots.into()
        });
        if let Some((d, s, e, m)) = previous {
            if *d == doc && *s == start && *e == end && *m == match_infos {
                continue;
            }
        }
        hits.add(doc, start, end, match_infos.clone())?;
        *previous = Some((doc, start, end, match_infos));
        added += 1;
    }
    Ok(added)
}

/// Every hit of one segment, in segment doc ids. The hit query context
/// must already have been set on `spans`; match info is stored when any
/// capture is registered.
pub fn fetch_all_segment_hits(
    spans: &mut dyn Spans,
    context: &HitQueryContext,
    live_docs: Option<&RoaringBitmap>,
) -> Result<HitsBuilder> {
    let slots = context.number_of_match_infos();
    let match_info_slots = (slots > 0).then_some(slots);
    let mut hits = HitsBuilder::new();
    let mut previous = None;
    loop {
        let doc = spans.approximation_next_doc()?;
        if doc == NO_MORE_DOCS {
            break;
        }
        if live_docs.is_some_and(|live| !live.contains(doc as u32)) {
            continue;
        }
        if !spans.matches()? {
            continue;
        }
        collect_document(spans, match_info_slots, 0, &mut hits, &mut previous)?;
    }
    Ok(hits)
}
