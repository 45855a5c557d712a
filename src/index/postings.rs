use std::collections::BTreeMap;
use std::sync::Arc;
use bytes::Bytes;
use crate::core::error::{Error, Result};
use crate::core::types::{BEFORE_FIRST, NO_MORE_DOCS, NO_MORE_POSITIONS};

/// Positions (and payloads) of one term in one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocPostings {
    pub doc: i32,
    pub positions: Vec<(i32, Option<Bytes>)>,
}

/// Iterates over the documents a term occurs in, and over its positions
/// within each document. Docs ascend; positions ascend within a doc.
///
/// Call `next_position` at most `freq` times per document; `payload` refers
/// to the position last returned.
pub trait PostingsCursor: Send {
    fn doc_id(&self) -> i32;

    fn next_doc(&mut self) -> Result<i32>;

    /// First doc >= target
    fn advance(&mut self, target: i32) -> Result<i32>;

    fn freq(&self) -> i32;

    fn next_position(&mut self) -> Result<i32>;

    fn payload(&self) -> Option<&[u8]>;

    /// Term at the position last returned, if the cursor knows it
    fn term(&self) -> Option<&str> {
        None
    }

    /// Upper bound on the number of documents
    fn cost(&self) -> i64;
}

/// Postings of one term kept in memory, shared by all cursors over it
#[derive(Debug, Clone)]
pub struct MemoryPostings {
    docs: Arc<Vec<DocPostings>>,
    term: Option<Arc<str>>,
    // Per doc and position, for unions of several terms
    position_terms: Option<Arc<Vec<Vec<Arc<str>>>>>,
    doc_index: usize,
    position_index: usize,
    started: bool,
}

impl MemoryPostings {
    pub fn new(docs: Arc<Vec<DocPostings>>) -> Self {
        MemoryPostings {
            docs,
            term: None,
            position_terms: None,
            doc_index: 0,
            position_index: 0,
            started: false,
        }
    }

    pub fn with_term(mut self, term: &str) -> Self {
        self.term = Some(Arc::from(term));
        self
    }

    pub fn empty() -> Self {
        MemoryPostings::new(Arc::new(Vec::new()))
    }

    /// Union of several term postings, ordered by doc then position.
    /// A position where several terms occur is kept once per term.
    pub fn union(lists: &[(Arc<str>, Arc<Vec<DocPostings>>)]) -> Self {
        let mut merged: BTreeMap<i32, Vec<(i32, Option<Bytes>, Arc<str>)>> = BTreeMap::new();
        for (term, list) in lists {
            for doc in list.iter() {
                merged
                    .entry(doc.doc)
                    .or_default()
                    .extend(doc.positions.iter().map(|(p, payload)| (*p, payload.clone(), term.clone())));
            }
        }
        let mut docs = Vec::with_capacity(merged.len());
        let mut position_terms = Vec::with_capacity(merged.len());
        for (doc, mut positions) in merged {
            // Stable, so equal positions keep term order
            positions.sort_by_key(|(p, _, _)| *p);
            position_terms.push(positions.iter().map(|(_, _, t)| t.clone()).collect());
            docs.push(DocPostings {
                doc,
                positions: positions.into_iter().map(|(p, payload, _)| (p, payload)).collect(),
            });
        }
        let mut postings = MemoryPostings::new(Arc::new(docs));
        postings.position_terms = Some(Arc::new(position_terms));
        postings
    }

    fn current(&self) -> Option<&DocPostings> {
        if !self.started {
            return None;
        }
        self.docs.get(self.doc_index)
    }
}

impl PostingsCursor for MemoryPostings {
    fn doc_id(&self) -> i32 {
        if !self.started {
            return BEFORE_FIRST;
        }
        self.docs.get(self.doc_index).map_or(NO_MORE_DOCS, |d| d.doc)
    }

    fn next_doc(&mut self) -> Result<i32> {
        if self.started {
            if self.doc_index < self.docs.len() {
                self.doc_index += 1;
            }
        } else {
            self.started = true;
        }
        self.position_index = 0;
        Ok(self.doc_id())
    }

    fn advance(&mut self, target: i32) -> Result<i32> {
        let from = if self.started { self.doc_index } else { 0 };
        self.started = true;
        let rest = self.docs.get(from..).unwrap_or(&[]);
        self.doc_index = from + rest.partition_point(|d| d.doc < target);
        self.position_index = 0;
        Ok(self.doc_id())
    }

    fn freq(&self) -> i32 {
        self.current().map_or(0, |d| d.positions.len() as i32)
    }

    fn next_position(&mut self) -> Result<i32> {
        let Some(doc) = self.current() else {
            return Err(Error::invalid_state("next_position called outside a document"));
        };
        let Some(&(position, _)) = doc.positions.get(self.position_index) else {
            return Ok(NO_MORE_POSITIONS);
        };
        self.position_index += 1;
        Ok(position)
    }

    fn payload(&self) -> Option<&[u8]> {
        let doc = self.current()?;
        let index = self.position_index.checked_sub(1)?;
        doc.positions.get(index)?.1.as_deref()
    }

    fn term(&self) -> Option<&str> {
        match &self.position_terms {
            Some(terms) => {
                let index = self.position_index.checked_sub(1)?;
                terms.get(self.doc_index)?.get(index).map(|t| &**t)
            }
            None => self.term.as_deref(),
        }
    }

    fn cost(&self) -> i64 {
        self.docs.len() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn postings() -> MemoryPostings {
        MemoryPostings::new(Arc::new(vec![
            DocPostings { doc: 1, positions: vec![(0, None), (3, Some(Bytes::from_static(&[7])))] },
            DocPostings { doc: 4, positions: vec![(2, None)] },
            DocPostings { doc: 9, positions: vec![(1, None)] },
        ]))
    }

    #[test]
    fn iterates_docs_and_positions() {
        let mut p = postings();
        assert_eq!(p.doc_id(), BEFORE_FIRST);
        assert_eq!(p.next_doc().unwrap(), 1);
        assert_eq!(p.freq(), 2);
        assert_eq!(p.next_position().unwrap(), 0);
        assert_eq!(p.payload(), None);
        assert_eq!(p.next_position().unwrap(), 3);
        assert_eq!(p.payload(), Some(&[7u8][..]));
        assert_eq!(p.advance(5).unwrap(), 9);
        assert_eq!(p.next_doc().unwrap(), NO_MORE_DOCS);
        assert_eq!(p.next_doc().unwrap(), NO_MORE_DOCS);
    }

    #[test]
    fn union_keeps_duplicate_positions() {
        let a = Arc::new(vec![DocPostings { doc: 2, positions: vec![(1, None)] }]);
        let b = Arc::new(vec![
            DocPostings { doc: 0, positions: vec![(4, None)] },
            DocPostings { doc: 2, positions: vec![(0, None), (1, None)] },
        ]);
        let mut u = MemoryPostings::union(&[(Arc::from("a"), a), (Arc::from("b"), b)]);
        assert_eq!(u.next_doc().unwrap(), 0);
        assert_eq!(u.next_position().unwrap(), 4);
        assert_eq!(u.term(), Some("b"));
        assert_eq!(u.next_doc().unwrap(), 2);
        assert_eq!(u.freq(), 3);
        let mut seen = Vec::new();
        for _ in 0..3 {
            let position = u.next_position().unwrap();
            seen.push((position, u.term().unwrap().to_string()));
        }
        assert_eq!(seen, vec![(0, "b".into()), (1, "a".into()), (1, "b".into())]);
    }
}
