pub mod relation_info;

pub use relation_info::{RelationInfoReader, RelationInfoSegment};
