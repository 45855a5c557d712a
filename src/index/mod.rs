//! The inverted index the span iterators run on: per-segment term postings
//! with positions and payloads, document lengths and live docs.

pub mod postings;
pub mod segment;

pub use postings::{DocPostings, MemoryPostings, PostingsCursor};
pub use segment::{DocumentInput, FieldInput, IndexSegment, MemorySegment, RelationInput, SegmentBuilder, SegmentSet};
