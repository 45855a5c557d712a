pub mod postings_writer;
pub mod relation_info;
pub mod relation_payload;

pub use postings_writer::{FieldInfo, PostingsWriter, PostingsWriterPlugin};
pub use relation_info::RelationInfoPlugin;
