use std::fmt;
use std::sync::Arc;
use crate::matchinfo::MatchInfo;

/// Captures of one hit, indexed like the query's `MatchInfoDefs`
pub type MatchInfos = Arc<[Option<MatchInfo>]>;

/// One hit with a global doc id. Owned and immutable; clone freely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub doc: i32,
    pub start: i32,
    pub end: i32,
    pub match_infos: Option<MatchInfos>,
}

impl Hit {
    pub fn new(doc: i32, start: i32, end: i32) -> Self {
        Hit { doc, start, end, match_infos: None }
    }

    pub fn with_match_infos(doc: i32, start: i32, end: i32, match_infos: Vec<Option<MatchInfo>>) -> Self {
        Hit { doc, start, end, match_infos: Some(match_infos.into()) }
    }

    /// Capture in slot `index`, if set
    pub fn match_info(&self, index: usize) -> Option<&MatchInfo> {
        self.match_infos
            .as_deref()
            .and_then(|m| crate::matchinfo::get(m, index))
    }

    pub fn len(&self) -> i32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

impl fmt::Display for Hit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc {}, {}-{}", self.doc, self.start, self.end)
    }
}

/// Reusable hit cursor. Filled in place by `HitsStore::get_ephemeral`;
/// its contents are only valid until the next fill. Use `to_hit` to keep one.
#[derive(Debug, Clone, Default)]
pub struct EphemeralHit {
    pub doc: i32,
    pub start: i32,
    pub end: i32,
    pub match_infos: Option<MatchInfos>,
}

impl EphemeralHit {
    pub fn new() -> Self {
        EphemeralHit { doc: -1, start: -1, end: -1, match_infos: None }
    }

    pub fn set(&mut self, doc: i32, start: i32, end: i32, match_infos: Option<&MatchInfos>) {
        self.doc = doc;
        self.start = start;
        self.end = end;
        self.match_infos = match_infos.cloned();
    }

    pub fn to_hit(&self) -> Hit {
        Hit {
            doc: self.doc,
            start: self.start,
            end: self.end,
            match_infos: self.match_infos.clone(),
        }
    }
}
