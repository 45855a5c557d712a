use std::ops::Range;
use parking_lot::RwLock;
use crate::core::error::{Error, Result};
use crate::results::hit::{EphemeralHit, Hit, MatchInfos};

/// Column storage shared by the builder and the frozen store
#[derive(Debug, Clone, Default)]
struct Columns {
    docs: Vec<i32>,
    starts: Vec<i32>,
    ends: Vec<i32>,
    match_infos: Vec<MatchInfos>,
    // Set by the first hit: either every hit has match info or none does
    with_match_info: Option<bool>,
}

impl Columns {
    fn push(&mut self, doc: i32, start: i32, end: i32, match_infos: Option<MatchInfos>) -> Result<()> {
        let has = match_infos.is_some();
        match self.with_match_info {
            None => self.with_match_info = Some(has),
            Some(expected) if expected != has => {
                return Err(Error::invalid_state(if expected {
                    "hit without match info added to hits with match info"
                } else {
                    "hit with match info added to hits without match info"
                }));
            }
            _ => {}
        }
        self.docs.push(doc);
        self.starts.push(start);
        self.ends.push(end);
        if let Some(m) = match_infos {
            self.match_infos.push(m);
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.docs.len()
    }

    fn match_infos(&self, index: usize) -> Option<&MatchInfos> {
        if self.with_match_info == Some(true) {
            self.match_infos.get(index)
        } else {
            None
        }
    }

    fn get(&self, index: usize) -> Hit {
        Hit {
            doc: self.docs[index],
            start: self.starts[index],
            end: self.ends[index],
            match_infos: self.match_infos(index).cloned(),
        }
    }
}

/// Append-only hit storage with a single writer. `freeze` turns it into a
/// read-only `HitsStore`.
#[derive(Debug, Clone, Default)]
pub struct HitsBuilder {
    columns: Columns,
}

impl HitsBuilder {
    pub fn new() -> Self {
        HitsBuilder::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        HitsBuilder {
            columns: Columns {
                docs: Vec::with_capacity(capacity),
                starts: Vec::with_capacity(capacity),
                ends: Vec::with_capacity(capacity),
                ..Columns::default()
            },
        }
    }

    /// Fails if the hit disagrees with the earlier hits about having match info
    pub fn add(&mut self, doc: i32, start: i32, end: i32, match_infos: Option<MatchInfos>) -> Result<()> {
        self.columns.push(doc, start, end, match_infos)
    }

    pub fn add_hit(&mut self, hit: &Hit) -> Result<()> {
        self.columns.push(hit.doc, hit.start, hit.end, hit.match_infos.clone())
    }

    pub fn add_all(&mut self, other: &HitsBuilder) -> Result<()> {
        for i in 0..other.len() {
            let o = &other.columns;
            self.columns.push(o.docs[i], o.starts[i], o.ends[i], o.match_infos(i).cloned())?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Hit> {
        (index < self.len()).then(|| self.columns.get(index))
    }

    /// Number of distinct documents, assuming hits are grouped by document
    pub fn doc_count(&self) -> usize {
        count_runs(&self.columns.docs)
    }

    /// Forget all hits, keeping the match-info regime
    pub fn clear(&mut self) {
        let regime = self.columns.with_match_info;
        self.columns = Columns { with_match_info: regime, ..Columns::default() };
    }

    pub fn freeze(self) -> HitsStore {
        HitsStore { columns: self.columns }
    }
}

fn count_runs(docs: &[i32]) -> usize {
    docs.windows(2).filter(|w| w[0] != w[1]).count() + usize::from(!docs.is_empty())
}

/// Read-only hits. Cheap to share behind an `Arc`; sorting, windowing,
/// sampling and grouping return new values instead of changing this one.
#[derive(Debug, Clone, Default)]
pub struct HitsStore {
    columns: Columns,
}

impl HitsStore {
    pub fn empty() -> Self {
        HitsStore::default()
    }

    pub fn from_hits<'a>(hits: impl IntoIterator<Item = &'a Hit>) -> Result<Self> {
        let mut builder = HitsBuilder::new();
        for hit in hits {
            builder.add_hit(hit)?;
        }
        Ok(builder.freeze())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.len() == 0
    }

    pub fn doc(&self, index: usize) -> i32 {
        self.columns.docs[index]
    }

    pub fn start(&self, index: usize) -> i32 {
        self.columns.starts[index]
    }

    pub fn end(&self, index: usize) -> i32 {
        self.columns.ends[index]
    }

    pub fn match_infos(&self, index: usize) -> Option<&MatchInfos> {
        self.columns.match_infos(index)
    }

    pub fn has_match_info(&self) -> bool {
        self.columns.with_match_info == Some(true)
    }

    pub fn get(&self, index: usize) -> Hit {
        self.columns.get(index)
    }

    pub fn get_ephemeral(&self, index: usize, hit: &mut EphemeralHit) {
        let c = &self.columns;
        hit.set(c.docs[index], c.starts[index], c.ends[index], c.match_infos(index));
    }

    pub fn iter(&self) -> impl Iterator<Item = Hit> + '_ {
        (0..self.len()).map(|i| self.columns.get(i))
    }

    pub fn doc_count(&self) -> usize {
        count_runs(&self.columns.docs)
    }

    /// Hits at the given indexes, in that order
    pub fn select(&self, indexes: impl IntoIterator<Item = usize>) -> HitsStore {
        let c = &self.columns;
        let mut selected = Columns { with_match_info: c.with_match_info, ..Columns::default() };
        for i in indexes {
            selected.docs.push(c.docs[i]);
            selected.starts.push(c.starts[i]);
            selected.ends.push(c.ends[i]);
            if let Some(m) = c.match_infos(i) {
                selected.match_infos.push(m.clone());
            }
        }
        HitsStore { columns: selected }
    }

    pub fn range(&self, range: Range<usize>) -> HitsStore {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        self.select(start..end)
    }

    /// (doc, index range) for every run of hits in the same document. Hits
    /// must be grouped by document, as they are before sorting.
    pub fn per_document(&self) -> Vec<(i32, Range<usize>)> {
        let docs = &self.columns.docs;
        let mut runs = Vec::new();
        let mut run_start = 0;
        for i in 1..=docs.len() {
            if i == docs.len() || docs[i] != docs[run_start] {
                runs.push((docs[run_start], run_start..i));
                run_start = i;
            }
        }
        runs
    }
}

/// Hits that are still being added to while others read them. Every access
/// takes the lock; `freeze` once collection is complete.
#[derive(Debug, Default)]
pub struct SharedHits {
    inner: RwLock<HitsBuilder>,
}

impl SharedHits {
    pub fn new() -> Self {
        SharedHits::default()
    }

    pub fn add_all(&self, hits: &HitsBuilder) -> Result<()> {
        self.inner.write().add_all(hits)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Hit> {
        self.inner.read().get(index)
    }

    /// Copy of the hits in `range` collected so far
    pub fn range(&self, range: Range<usize>) -> HitsStore {
        let inner = self.inner.read();
        let mut columns = Columns { with_match_info: inner.columns.with_match_info, ..Columns::default() };
        for i in range.start..range.end.min(inner.len()) {
            let c = &inner.columns;
            columns.docs.push(c.docs[i]);
            columns.starts.push(c.starts[i]);
            columns.ends.push(c.ends[i]);
            if let Some(m) = c.match_infos(i) {
                columns.match_infos.push(m.clone());
            }
        }
        HitsStore { columns }
    }

    /// Copy of the hits collected so far
    pub fn snapshot(&self) -> HitsStore {
        self.inner.read().clone().freeze()
    }

    pub fn freeze(self) -> HitsStore {
        self.inner.into_inner().freeze()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::matchinfo::MatchInfo;

    fn store() -> HitsStore {
        let hits = [(1, 1, 2), (1, 2, 3), (2, 3, 4), (3, 4, 5), (3, 5, 6)].map(|(d, s, e)| Hit::new(d, s, e));
        HitsStore::from_hits(&hits).unwrap()
    }

    #[test]
    fn match_info_regime_is_fixed_by_first_hit() {
        let mut builder = HitsBuilder::new();
        builder.add(0, 1, 2, None).unwrap();
        let infos: MatchInfos = vec![Some(MatchInfo::span(1, 2, Arc::from("contents")))].into();
        let err = builder.add(0, 2, 3, Some(infos.clone())).unwrap_err();
        assert!(err.is(ErrorKind::InvalidState));

        let mut builder = HitsBuilder::new();
        builder.add(0, 1, 2, Some(infos)).unwrap();
        assert!(builder.add(0, 2, 3, None).is_err());
        assert_eq!(builder.len(), 1);
        let store = builder.freeze();
        assert!(store.has_match_info());
        assert!(store.get(0).match_info(0).is_some());
    }

    #[test]
    fn per_document_runs() {
        let runs = store().per_document();
        assert_eq!(runs, vec![(1, 0..2), (2, 2..3), (3, 3..5)]);
        assert_eq!(store().doc_count(), 3);
        assert!(HitsStore::empty().per_document().is_empty());
    }

    #[test]
    fn select_and_ephemeral() {
        let store = store();
        let picked = store.select([4, 0]);
        assert_eq!(picked.get(0), Hit::new(3, 5, 6));
        let mut cursor = EphemeralHit::new();
        picked.get_ephemeral(1, &mut cursor);
        assert_eq!(cursor.to_hit(), Hit::new(1, 1, 2));
        assert_eq!(store.range(3..99).len(), 2);
    }

    #[test]
    fn shared_hits_freeze() {
        let shared = SharedHits::new();
        let mut batch = HitsBuilder::new();
        batch.add(0, 0, 1, None).unwrap();
        batch.add(0, 3, 4, None).unwrap();
        shared.add_all(&batch).unwrap();
        assert_eq!(shared.len(), 2);
        assert_eq!(shared.snapshot().len(), 2);
        assert_eq!(shared.freeze().end(1), 4);
    }
}
