use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// A captured subsequence of one field
#[derive(Debug, Clone)]
pub struct SpanInfo {
    pub start: i32,
    pub end: i32,
    pub field: Arc<str>,
}

impl SpanInfo {
    pub fn new(start: i32, end: i32, field: Arc<str>) -> Self {
        SpanInfo { start, end, field }
    }
}

// Field is not part of identity
impl PartialEq for SpanInfo {
    fn eq(&self, other: &Self) -> bool {
        self.start == other.start && self.end == other.end
    }
}

impl Eq for SpanInfo {}

impl PartialOrd for SpanInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SpanInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.start.cmp(&other.start).then(self.end.cmp(&other.end))
    }
}

impl fmt::Display for SpanInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "span({}-{})", self.start, self.end)
    }
}
