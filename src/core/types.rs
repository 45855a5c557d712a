use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Document id returned once a spans has no more documents.
pub const NO_MORE_DOCS: i32 = i32::MAX;

/// Position returned once a spans has no more hits in the current document.
pub const NO_MORE_POSITIONS: i32 = i32::MAX;

/// Doc id / position before the first call to next.
pub const BEFORE_FIRST: i32 = -1;

/// Forward index token value for a position without a primary term.
pub const NO_TERM: i32 = -1;

/// Relation id for relations without an entry in the relation-info store.
pub const RELATION_ID_NO_INFO: i32 = -1;

/// Unique segment identifier, written into every segment file header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentId(pub Uuid);

impl SegmentId {
    pub fn new() -> Self {
        SegmentId(Uuid::new_v4())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        SegmentId(Uuid::from_bytes(bytes))
    }
}

impl Default for SegmentId {
    fn default() -> Self {
        SegmentId::new()
    }
}

/// Which part of a relation a relation spans reports as its hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpanMode {
    Source,
    Target,
    FullSpan,
    /// Cover sources and targets of every matched relation; rspan() only.
    AllSpans,
}

impl SpanMode {
    pub fn code(&self) -> &'static str {
        match self {
            SpanMode::Source => "source",
            SpanMode::Target => "target",
            SpanMode::FullSpan => "full",
            SpanMode::AllSpans => "all",
        }
    }

    pub fn from_code(code: &str) -> Option<SpanMode> {
        match code {
            "source" => Some(SpanMode::Source),
            "target" => Some(SpanMode::Target),
            "full" => Some(SpanMode::FullSpan),
            "all" => Some(SpanMode::AllSpans),
            _ => None,
        }
    }
}

/// Direction filter for relations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Root,
    Forward,
    Backward,
    BothDirections,
}

/// Allowed gap between two clauses of a sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SequenceGap {
    pub min: i32,
    /// `None` means unlimited.
    pub max: Option<i32>,
}

impl SequenceGap {
    pub const NONE: SequenceGap = SequenceGap { min: 0, max: Some(0) };
    pub const ANY: SequenceGap = SequenceGap { min: 0, max: None };

    pub fn fixed(n: i32) -> Self {
        SequenceGap { min: n, max: Some(n) }
    }

    pub fn at_least(min: i32) -> Self {
        SequenceGap { min, max: None }
    }

    pub fn is_fixed(&self) -> bool {
        self.max == Some(self.min)
    }

    pub fn accepts(&self, gap: i32) -> bool {
        gap >= self.min && self.max.is_none_or(|max| gap <= max)
    }
}

impl std::fmt::Display for SequenceGap {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "{}", self.min),
            Some(max) => write!(f, "{}-{}", self.min, max),
            None => write!(f, "{}-", self.min),
        }
    }
}
