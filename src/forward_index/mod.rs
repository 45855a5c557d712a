//! Per-segment forward index: token ids by position for every annotation,
//! plus term strings and their sort orders.

pub mod field;
pub mod reader;
pub mod terms;
pub mod writer;

pub use field::ForwardIndexField;
pub use reader::{ForwardIndexSegment, ForwardIndexSegmentReader};
pub use terms::TermsSegmentReader;
pub use writer::ForwardIndexPlugin;
