use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;
use crate::core::abort::AbortFlag;
use crate::core::config::ContextSize;
use crate::core::error::{Error, Result};
use crate::forward_index::terms::{insensitive_key, TermsSegmentReader};
use crate::forward_index::ForwardIndexSegmentReader;
use crate::index::segment::SegmentSet;
use crate::results::store::HitsStore;
use crate::writer::relation_payload::annotation_field;

/// Position of the hit in its context
pub const HIT_START: usize = 0;
/// Position of the first token after the hit
pub const AFTER_START: usize = 1;
/// Tokens per annotation in the context
pub const LENGTH: usize = 2;
pub const BOOKKEEPING_INTS: usize = 3;

/// Keyword-in-context for one hit and annotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kwic {
    pub before: Vec<String>,
    pub hit: Vec<String>,
    pub after: Vec<String>,
}

/// Token ids around each hit of a store, for one or more annotations.
///
/// Each hit gets `[HIT_START, AFTER_START, LENGTH]` followed by one block of
/// LENGTH token ids per annotation.
pub struct Contexts {
    annotations: Vec<String>,
    contexts: Vec<Vec<i32>>,
    // Per hit, index into `terms`
    hit_segments: Vec<usize>,
    // Per segment used, one terms reader per annotation
    terms: Vec<Vec<Arc<TermsSegmentReader>>>,
}

impl Contexts {
    pub fn contexts_for_hits(
        hits: &HitsStore,
        segments: &SegmentSet,
        field: &str,
        annotations: &[&str],
        context_size: ContextSize,
        abort: &AbortFlag,
    ) -> Result<Self> {
        if annotations.is_empty() {
            return Err(Error::invalid_argument("contexts need at least one annotation"));
        }
        let postings_fields: Vec<String> = annotations.iter().map(|a| annotation_field(field, a)).collect();

        let mut by_doc: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
        for i in 0..hits.len() {
            by_doc.entry(hits.doc(i)).or_default().push(i);
        }

        let mut contexts = vec![Vec::new(); hits.len()];
        let mut hit_segments = vec![0; hits.len()];
        let mut terms: Vec<Vec<Arc<TermsSegmentReader>>> = Vec::new();
        // Segment ord -> (index into terms, reader)
        let mut readers: HashMap<usize, (usize, ForwardIndexSegmentReader)> = HashMap::new();

        for (doc, indexes) in by_doc {
            abort.check()?;
            if indexes.len() > i32::MAX as usize {
                return Err(Error::unsupported(format!("too many hits in document {} to build contexts", doc)));
            }
            let (segment, local_doc) = segments.locate(doc)?;
            let slot = match readers.get(&segment.ord()) {
                Some((slot, _)) => *slot,
                None => {
                    let forward_index = segment.forward_index().ok_or_else(|| {
                        Error::invalid_argument(format!("segment {} has no forward index", segment.ord()))
                    })?;
                    let reader = forward_index.reader()?;
                    terms.push(
                        postings_fields
                            .iter()
                            .map(|f| reader.terms(f))
                            .collect::<Result<Vec<_>>>()?,
                    );
                    readers.insert(segment.ord(), (terms.len() - 1, reader));
                    terms.len() - 1
                }
            };
            let Some((_, reader)) = readers.get_mut(&segment.ord()) else {
                continue;
            };

            // The closing token is never part of a context
            let doc_length = (reader.document_length(&postings_fields[0], local_doc)? - 1).max(0);
            let mut starts = Vec::with_capacity(indexes.len());
            let mut ends = Vec::with_capacity(indexes.len());
            for &i in &indexes {
                let (start, end) = context_size.snippet_start_end(hits.start(i), hits.end(i));
                let end = end.min(doc_length);
                starts.push(start.min(end));
                ends.push(end);
            }
            let mut parts = Vec::with_capacity(postings_fields.len());
            for f in &postings_fields {
                parts.push(reader.retrieve_parts(f, local_doc, &starts, &ends)?);
            }

            for (j, &i) in indexes.iter().enumerate() {
                let length = ends[j] - starts[j];
                let mut context = Vec::with_capacity(BOOKKEEPING_INTS + parts.len() * length as usize);
                let hit_start = (hits.start(i) - starts[j]).clamp(0, length);
                context.push(hit_start);
                context.push((hits.end(i) - starts[j]).clamp(hit_start, length));
                context.push(length);
                for annotation_parts in &parts {
                    context.extend_from_slice(&annotation_parts[j]);
                }
                contexts[i] = context;
                hit_segments[i] = slot;
            }
        }
        debug!(hits = hits.len(), segments = terms.len(), "contexts built");
        Ok(Contexts {
            annotations: annotations.iter().map(|a| a.to_string()).collect(),
            contexts,
            hit_segments,
            terms,
        })
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    pub fn annotations(&self) -> &[String] {
        &self.annotations
    }

    /// Raw context array of hit `i`
    pub fn get(&self, i: usize) -> &[i32] {
        &self.contexts[i]
    }

    /// All tokens of annotation `a` around hit `i`
    pub fn tokens(&self, i: usize, a: usize) -> &[i32] {
        let context = &self.contexts[i];
        let length = context[LENGTH] as usize;
        let from = BOOKKEEPING_INTS + a * length;
        &context[from..from + length]
    }

    pub fn before(&self, i: usize, a: usize) -> &[i32] {
        &self.tokens(i, a)[..self.contexts[i][HIT_START] as usize]
    }

    pub fn hit(&self, i: usize, a: usize) -> &[i32] {
        let context = &self.contexts[i];
        &self.tokens(i, a)[context[HIT_START] as usize..context[AFTER_START] as usize]
    }

    pub fn after(&self, i: usize, a: usize) -> &[i32] {
        &self.tokens(i, a)[self.contexts[i][AFTER_START] as usize..]
    }

    /// Terms of annotation `a` in the segment hit `i` came from
    pub fn terms(&self, i: usize, a: usize) -> &TermsSegmentReader {
        &self.terms[self.hit_segments[i]][a]
    }

    pub fn strings(&self, i: usize, a: usize, ids: &[i32]) -> Result<Vec<String>> {
        let terms = self.terms(i, a);
        ids.iter().map(|&id| terms.get(id).map(|t| t.to_string())).collect()
    }

    pub fn kwic(&self, i: usize, a: usize) -> Result<Kwic> {
        Ok(Kwic {
            before: self.strings(i, a, self.before(i, a))?,
            hit: self.strings(i, a, self.hit(i, a))?,
            after: self.strings(i, a, self.after(i, a))?,
        })
    }
}

/// Term frequencies, most frequent first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermFrequencyList {
    entries: Vec<(String, i64)>,
    total_frequency: i64,
}

impl TermFrequencyList {
    pub fn from_counts(counts: HashMap<String, i64>) -> Self {
        let mut entries: Vec<(String, i64)> = counts.into_iter().collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let total_frequency = entries.iter().map(|e| e.1).sum();
        TermFrequencyList { entries, total_frequency }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_frequency(&self) -> i64 {
        self.total_frequency
    }

    pub fn frequency(&self, term: &str) -> i64 {
        self.entries.iter().find(|e| e.0 == term).map_or(0, |e| e.1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.entries.iter().map(|(t, f)| (t.as_str(), *f))
    }
}

/// Words in the contexts of the hits (not in the hits themselves), counted
pub fn collocations(
    hits: &HitsStore,
    segments: &SegmentSet,
    field: &str,
    annotation: &str,
    context_size: ContextSize,
    sensitive: bool,
    abort: &AbortFlag,
) -> Result<TermFrequencyList> {
    let contexts = Contexts::contexts_for_hits(hits, segments, field, &[annotation], context_size, abort)?;
    let mut counts: HashMap<String, i64> = HashMap::new();
    for i in 0..contexts.len() {
        let terms = contexts.terms(i, 0);
        for &id in contexts.before(i, 0).iter().chain(contexts.after(i, 0)) {
            let term = terms.get(id)?;
            if term.is_empty() {
                continue;
            }
            let term = if sensitive { term.to_string() } else { insensitive_key(term) };
            *counts.entry(term).or_insert(0) += 1;
        }
    }
    Ok(TermFrequencyList::from_counts(counts))
}
