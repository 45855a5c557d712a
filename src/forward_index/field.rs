use crate::core::error::Result;
use crate::storage::io::{DataInput, IndexOutput};

/// Per-segment descriptor of one field in the forward index: where its
/// term order, term index and tokens index tables start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardIndexField {
    pub name: String,
    pub number_of_terms: i32,
    pub term_order_offset: i64,
    pub term_index_offset: i64,
    pub tokens_index_offset: i64,
}

impl ForwardIndexField {
    pub fn read<I: DataInput + ?Sized>(input: &mut I) -> Result<Self> {
        Ok(ForwardIndexField {
            name: input.read_string()?,
            number_of_terms: input.read_i32()?,
            term_order_offset: input.read_i64()?,
            term_index_offset: input.read_i64()?,
            tokens_index_offset: input.read_i64()?,
        })
    }

    pub fn write(&self, out: &mut IndexOutput) -> Result<()> {
        out.write_string(&self.name)?;
        out.write_i32(self.number_of_terms)?;
        out.write_i64(self.term_order_offset)?;
        out.write_i64(self.term_index_offset)?;
        out.write_i64(self.tokens_index_offset)
    }
}
