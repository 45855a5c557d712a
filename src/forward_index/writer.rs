use std::collections::HashMap;
use tracing::debug;
use crate::compression::tokens_codec::TokensCodec;
use crate::core::error::{Error, Result};
use crate::core::types::NO_TERM;
use crate::forward_index::field::ForwardIndexField;
use crate::forward_index::terms::insensitive_key;
use crate::storage::header::IndexFooter;
use crate::storage::io::IndexOutput;
use crate::storage::layout::SegmentFiles;
use crate::writer::postings_writer::{FieldInfo, PostingsWriterPlugin};

pub const FIELDS_EXT: &str = "fields";
pub const TOKENS_INDEX_EXT: &str = "tokensindex";
pub const TOKENS_EXT: &str = "tokens";
pub const TERM_ORDER_EXT: &str = "termorder";
pub const TERM_INDEX_EXT: &str = "termindex";
pub const TERMS_EXT: &str = "terms";

/// offset i64 + length i32 + codec u8 + codec parameter u8
pub const TOKENS_INDEX_RECORD_SIZE: u64 = 14;

/// Builds the forward index while the postings are being written.
///
/// Terms arrive in byte order, so the order in which we see them is the
/// term id. The first term seen at a position is its primary value.
pub struct ForwardIndexPlugin {
    max_doc: i32,
    rle_block_size: i16,
    outputs: Option<Outputs>,
    fields: Vec<ForwardIndexField>,
    field: Option<FieldState>,
}

struct Outputs {
    tokens_index: IndexOutput,
    tokens: IndexOutput,
    term_order: IndexOutput,
    term_index: IndexOutput,
    terms: IndexOutput,
    fields: IndexOutput,
}

struct FieldState {
    name: String,
    term_index_offset: i64,
    terms: Vec<String>,
    current_term: i32,
    current_doc: i32,
    // doc -> term id per position
    doc_tokens: HashMap<i32, Vec<i32>>,
}

impl ForwardIndexPlugin {
    pub fn new(files: &SegmentFiles, max_doc: i32, rle_block_size: i16) -> Result<Self> {
        let outputs = Outputs {
            tokens_index: files.create_output(TOKENS_INDEX_EXT)?,
            tokens: files.create_output(TOKENS_EXT)?,
            term_order: files.create_output(TERM_ORDER_EXT)?,
            term_index: files.create_output(TERM_INDEX_EXT)?,
            terms: files.create_output(TERMS_EXT)?,
            fields: files.create_output(FIELDS_EXT)?,
        };
        Ok(ForwardIndexPlugin {
            max_doc,
            rle_block_size,
            outputs: Some(outputs),
            fields: Vec::new(),
            field: None,
        })
    }

    fn outputs(&mut self) -> Result<&mut Outputs> {
        self.outputs
            .as_mut()
            .ok_or_else(|| Error::invalid_state("forward index writer already finished"))
    }

    fn field_state(&mut self) -> Result<&mut FieldState> {
        self.field
            .as_mut()
            .ok_or_else(|| Error::invalid_state("no field being written"))
    }
}

/// Sort positions for a list of terms in id order.
/// Returns (id -> position, position -> id); terms that compare equal share
/// the position of the first of them.
pub fn term_sort_order<K: Ord>(terms: &[String], key: impl Fn(&str) -> K) -> (Vec<i32>, Vec<i32>) {
    let keys: Vec<K> = terms.iter().map(|t| key(t)).collect();
    let mut pos_to_id: Vec<i32> = (0..terms.len() as i32).collect();
    pos_to_id.sort_by(|&a, &b| keys[a as usize].cmp(&keys[b as usize]).then(a.cmp(&b)));

    let mut id_to_pos = vec![0i32; terms.len()];
    let mut group_pos = 0i32;
    for (pos, &id) in pos_to_id.iter().enumerate() {
        if pos == 0 || keys[id as usize] != keys[pos_to_id[pos - 1] as usize] {
            group_pos = pos as i32;
        }
        id_to_pos[id as usize] = group_pos;
    }
    (id_to_pos, pos_to_id)
}

impl PostingsWriterPlugin for ForwardIndexPlugin {
    fn start_field(&mut self, field: &FieldInfo) -> Result<bool> {
        if !field.has_forward_index {
            return Ok(false);
        }
        let term_index_offset = self.outputs()?.term_index.file_pointer() as i64;
        self.field = Some(FieldState {
            name: field.name.clone(),
            term_index_offset,
            terms: Vec::new(),
            current_term: -1,
            current_doc: -1,
            doc_tokens: HashMap::new(),
        });
        Ok(true)
    }

    fn start_term(&mut self, term: &[u8]) -> Result<()> {
        let term = std::str::from_utf8(term)
            .map_err(|e| Error::invalid_index(format!("term is not UTF-8: {}", e)))?
            .to_string();
        let outputs = self.outputs()?;
        let string_offset = outputs.terms.file_pointer() as i64;
        outputs.term_index.write_i64(string_offset)?;
        outputs.terms.write_string(&term)?;

        let state = self.field_state()?;
        if let Some(last) = state.terms.last() {
            if last.as_bytes() >= term.as_bytes() {
                return Err(Error::invalid_state(format!(
                    "terms out of order in field {}: {:?} after {:?}",
                    state.name, term, last
                )));
            }
        }
        state.current_term = state.terms.len() as i32;
        state.terms.push(term);
        Ok(())
    }

    fn start_document(&mut self, doc: i32, _n_occurrences: i32) -> Result<()> {
        self.field_state()?.current_doc = doc;
        Ok(())
    }

    fn term_occurrence(&mut self, position: i32, _payload: Option<&[u8]>) -> Result<()> {
        if position < 0 {
            return Err(Error::invalid_index(format!("negative position {}", position)));
        }
        let state = self.field_state()?;
        let term = state.current_term;
        let doc = state.current_doc;
        let tokens = state.doc_tokens.entry(doc).or_default();
        let position = position as usize;
        if tokens.len() <= position {
            tokens.resize(position + 1, NO_TERM);
        }
        if tokens[position] == NO_TERM {
            tokens[position] = term;
        }
        Ok(())
    }

    fn end_document(&mut self) -> Result<()> {
        Ok(())
    }

    fn end_term(&mut self) -> Result<()> {
        Ok(())
    }

    fn end_field(&mut self) -> Result<()> {
        let mut state = self
            .field
            .take()
            .ok_or_else(|| Error::invalid_state("end_field without start_field"))?;
        let max_doc = self.max_doc;
        let rle_block_size = self.rle_block_size;
        let outputs = self.outputs()?;

        // Term order: id -> insensitive pos, insensitive pos -> id, then the same sensitively
        let term_order_offset = outputs.term_order.file_pointer() as i64;
        let (id_to_ins, ins_to_id) = term_sort_order(&state.terms, insensitive_key);
        let (id_to_sens, sens_to_id) = term_sort_order(&state.terms, |t| t.as_bytes().to_vec());
        for table in [&id_to_ins, &ins_to_id, &id_to_sens, &sens_to_id] {
            for &value in table.iter() {
                outputs.term_order.write_i32(value)?;
            }
        }

        let tokens_index_offset = outputs.tokens_index.file_pointer() as i64;
        let mut encoded = Vec::new();
        for doc in 0..max_doc {
            let tokens = state.doc_tokens.remove(&doc).unwrap_or_default();
            let codec = TokensCodec::choose(&tokens, rle_block_size);
            encoded.clear();
            codec.encode(&tokens, &mut encoded)?;
            outputs.tokens_index.write_i64(outputs.tokens.file_pointer() as i64)?;
            outputs.tokens_index.write_i32(tokens.len() as i32)?;
            outputs.tokens_index.write_byte(codec.codec_type.code())?;
            outputs.tokens_index.write_byte(codec.parameter())?;
            outputs.tokens.write_bytes(&encoded)?;
        }
        if !state.doc_tokens.is_empty() {
            return Err(Error::invalid_index(format!(
                "field {} has postings for documents beyond max doc {}",
                state.name, max_doc
            )));
        }

        debug!(field = %state.name, terms = state.terms.len(), docs = max_doc, "wrote forward index field");
        self.fields.push(ForwardIndexField {
            name: state.name,
            number_of_terms: state.terms.len() as i32,
            term_order_offset,
            term_index_offset: state.term_index_offset,
            tokens_index_offset,
        });
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let mut outputs = self
            .outputs
            .take()
            .ok_or_else(|| Error::invalid_state("forward index writer already finished"))?;
        outputs.fields.write_i32(self.fields.len() as i32)?;
        for field in &self.fields {
            field.write(&mut outputs.fields)?;
        }
        for mut out in [
            outputs.tokens_index,
            outputs.tokens,
            outputs.term_order,
            outputs.term_index,
            outputs.terms,
            outputs.fields,
        ] {
            IndexFooter::write(&mut out)?;
            out.close()?;
        }
        Ok(())
    }
}
