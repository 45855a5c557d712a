//! Captures recorded while matching: spans, relations, lists of relations
//! and inline tags, stored in slots assigned by a query-wide registry.

pub mod context;
pub mod defs;
pub mod list;
pub mod relation;
pub mod span;

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use serde::{Deserialize, Serialize};

pub use context::HitQueryContext;
pub use defs::{MatchInfoDef, MatchInfoDefs};
pub use list::RelationListInfo;
pub use relation::RelationInfo;
pub use span::SpanInfo;

use crate::core::error::Result;
use crate::core::types::SpanMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchInfoType {
    Span,
    Relation,
    ListOfRelations,
    InlineTag,
}

impl MatchInfoType {
    pub fn json_name(&self) -> &'static str {
        match self {
            MatchInfoType::Span => "span",
            MatchInfoType::Relation => "relation",
            MatchInfoType::ListOfRelations => "list",
            MatchInfoType::InlineTag => "tag",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchInfo {
    Span(SpanInfo),
    Relation(RelationInfo),
    ListOfRelations(RelationListInfo),
    InlineTag(RelationInfo),
}

impl MatchInfo {
    /// Wrap a relation, as an inline tag if it has the shape of one
    pub fn relation(relation: RelationInfo) -> Self {
        if relation.is_tag() {
            MatchInfo::InlineTag(relation)
        } else {
            MatchInfo::Relation(relation)
        }
    }

    pub fn span(start: i32, end: i32, field: Arc<str>) -> Self {
        MatchInfo::Span(SpanInfo::new(start, end, field))
    }

    pub fn match_type(&self) -> MatchInfoType {
        match self {
            MatchInfo::Span(_) => MatchInfoType::Span,
            MatchInfo::Relation(_) => MatchInfoType::Relation,
            MatchInfo::ListOfRelations(_) => MatchInfoType::ListOfRelations,
            MatchInfo::InlineTag(_) => MatchInfoType::InlineTag,
        }
    }

    pub fn field(&self) -> &Arc<str> {
        match self {
            MatchInfo::Span(s) => &s.field,
            MatchInfo::Relation(r) | MatchInfo::InlineTag(r) => r.field(),
            MatchInfo::ListOfRelations(l) => l.field(),
        }
    }

    pub fn span_start(&self) -> i32 {
        match self {
            MatchInfo::Span(s) => s.start,
            MatchInfo::Relation(r) | MatchInfo::InlineTag(r) => r.span_start(),
            MatchInfo::ListOfRelations(l) => l.span_start(),
        }
    }

    pub fn span_end(&self) -> i32 {
        match self {
            MatchInfo::Span(s) => s.end,
            MatchInfo::Relation(r) | MatchInfo::InlineTag(r) => r.span_end(),
            MatchInfo::ListOfRelations(l) => l.span_end(),
        }
    }

    /// Start for a relation span mode; non-relations just report their span
    pub fn span_start_for(&self, mode: SpanMode) -> Result<i32> {
        match self {
            MatchInfo::Relation(r) | MatchInfo::InlineTag(r) => r.span_start_for(mode),
            _ => Ok(self.span_start()),
        }
    }

    pub fn span_end_for(&self, mode: SpanMode) -> Result<i32> {
        match self {
            MatchInfo::Relation(r) | MatchInfo::InlineTag(r) => r.span_end_for(mode),
            _ => Ok(self.span_end()),
        }
    }

    pub fn is_span_empty(&self) -> bool {
        self.span_start() == self.span_end()
    }

    pub fn as_relation(&self) -> Option<&RelationInfo> {
        match self {
            MatchInfo::Relation(r) | MatchInfo::InlineTag(r) => Some(r),
            _ => None,
        }
    }

    fn variant_rank(&self) -> u8 {
        match self {
            MatchInfo::Span(_) => 0,
            MatchInfo::Relation(_) | MatchInfo::InlineTag(_) => 1,
            MatchInfo::ListOfRelations(_) => 2,
        }
    }
}

/// Slot `index`, or None if the array is too short (it may predate a registration)
pub fn get(match_infos: &[Option<MatchInfo>], index: usize) -> Option<&MatchInfo> {
    match_infos.get(index).and_then(|m| m.as_ref())
}

/// Copy every set slot of `source` into `target`, never clearing a target slot
pub fn merge_into(target: &mut [Option<MatchInfo>], source: &[Option<MatchInfo>]) {
    for (t, s) in target.iter_mut().zip(source) {
        if let Some(s) = s {
            *t = Some(s.clone());
        }
    }
}

impl PartialOrd for MatchInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MatchInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (MatchInfo::Span(a), MatchInfo::Span(b)) => a.cmp(b),
            (
                MatchInfo::Relation(a) | MatchInfo::InlineTag(a),
                MatchInfo::Relation(b) | MatchInfo::InlineTag(b),
            ) => a.cmp(b),
            (MatchInfo::ListOfRelations(a), MatchInfo::ListOfRelations(b)) => a.cmp(b),
            _ => self.variant_rank().cmp(&other.variant_rank()),
        }
    }
}

impl fmt::Display for MatchInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchInfo::Span(s) => s.fmt(f),
            MatchInfo::Relation(r) | MatchInfo::InlineTag(r) => r.fmt(f),
            MatchInfo::ListOfRelations(l) => l.fmt(f),
        }
    }
}
