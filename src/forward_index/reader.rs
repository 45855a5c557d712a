use std::collections::HashMap;
use std::fs::File;
use std::sync::Arc;
use memmap2::Mmap;
use tracing::{debug, instrument};
use crate::compression::tokens_codec::TokensCodec;
use crate::core::error::{Error, Result};
use crate::forward_index::field::ForwardIndexField;
use crate::forward_index::terms::TermsSegmentReader;
use crate::forward_index::writer::{
    FIELDS_EXT, TERMS_EXT, TERM_INDEX_EXT, TERM_ORDER_EXT, TOKENS_EXT, TOKENS_INDEX_EXT,
    TOKENS_INDEX_RECORD_SIZE,
};
use crate::storage::io::{DataInput, IndexInput};
use crate::storage::layout::SegmentFiles;

/// Forward index of one segment, opened once when the segment is loaded.
///
/// Holds the field descriptors, the shared term tables and the prototype
/// file handles that each `ForwardIndexSegmentReader` clones.
pub struct ForwardIndexSegment {
    max_doc: i32,
    fields: HashMap<String, ForwardIndexField>,
    terms: HashMap<String, Arc<TermsSegmentReader>>,
    tokens_index: IndexInput,
    tokens: IndexInput,
}

impl ForwardIndexSegment {
    #[instrument(skip(files), fields(segment = %files.name))]
    pub fn open(files: &SegmentFiles, max_doc: i32) -> Result<Arc<Self>> {
        let mut fields_file = files.open_input(FIELDS_EXT)?;
        let n_fields = fields_file.read_i32()?;
        if n_fields < 0 {
            return Err(Error::invalid_index(format!("negative field count {}", n_fields)));
        }
        let mut fields = HashMap::new();
        for _ in 0..n_fields {
            let field = ForwardIndexField::read(&mut fields_file)?;
            fields.insert(field.name.clone(), field);
        }

        // Validate then map the term strings; every field's terms share the mapping
        files.open_input(TERMS_EXT)?;
        let terms_path = files.path(TERMS_EXT);
        let terms_file = File::open(&terms_path)
            .map_err(|e| Error::invalid_index(format!("cannot open {}: {}", terms_path.display(), e)))?;
        // SAFETY: segment files are immutable once written
        let strings = Arc::new(unsafe {
            Mmap::map(&terms_file)
                .map_err(|e| Error::invalid_index(format!("cannot map {}: {}", terms_path.display(), e)))?
        });

        let mut term_index = files.open_input(TERM_INDEX_EXT)?;
        let mut term_order = files.open_input(TERM_ORDER_EXT)?;
        let mut terms = HashMap::new();
        for field in fields.values() {
            let reader = TermsSegmentReader::load(field, strings.clone(), &mut term_index, &mut term_order)?;
            terms.insert(field.name.clone(), Arc::new(reader));
        }

        debug!(fields = fields.len(), max_doc, "opened forward index");
        Ok(Arc::new(ForwardIndexSegment {
            max_doc,
            fields,
            terms,
            tokens_index: files.open_input(TOKENS_INDEX_EXT)?,
            tokens: files.open_input(TOKENS_EXT)?,
        }))
    }

    pub fn field(&self, name: &str) -> Result<&ForwardIndexField> {
        self.fields
            .get(name)
            .ok_or_else(|| Error::invalid_index(format!("field {} has no forward index in this segment", name)))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|s| s.as_str())
    }

    pub fn terms(&self, field: &str) -> Result<Arc<TermsSegmentReader>> {
        self.terms
            .get(field)
            .cloned()
            .ok_or_else(|| Error::invalid_index(format!("field {} has no terms in this segment", field)))
    }

    /// A reader with its own file handles, for use by one thread
    pub fn reader(self: &Arc<Self>) -> Result<ForwardIndexSegmentReader> {
        Ok(ForwardIndexSegmentReader {
            segment: Arc::clone(self),
            tokens_index: self.tokens_index.try_clone()?,
            tokens: self.tokens.try_clone()?,
        })
    }
}

/// Where one document's tokens live in the tokens file
#[derive(Debug, Clone, Copy)]
struct DocRecord {
    offset: u64,
    length: i32,
    codec: TokensCodec,
}

/// Positional reads from the forward index. Not shared between threads:
/// the file handles carry seek state.
pub struct ForwardIndexSegmentReader {
    segment: Arc<ForwardIndexSegment>,
    tokens_index: IndexInput,
    tokens: IndexInput,
}

impl ForwardIndexSegmentReader {
    pub fn segment(&self) -> &Arc<ForwardIndexSegment> {
        &self.segment
    }

    pub fn terms(&self, field: &str) -> Result<Arc<TermsSegmentReader>> {
        self.segment.terms(field)
    }

    fn doc_record(&mut self, field: &str, doc: i32) -> Result<DocRecord> {
        if doc < 0 || doc >= self.segment.max_doc {
            return Err(Error::invalid_index(format!(
                "document {} out of range (max doc {})",
                doc, self.segment.max_doc
            )));
        }
        let base = self.segment.field(field)?.tokens_index_offset as u64;
        self.tokens_index.seek(base + doc as u64 * TOKENS_INDEX_RECORD_SIZE)?;
        let offset = self.tokens_index.read_i64()?;
        let length = self.tokens_index.read_i32()?;
        let codec = self.tokens_index.read_byte()?;
        let parameter = self.tokens_index.read_byte()?;
        if offset < 0 || length < 0 {
            return Err(Error::invalid_index(format!(
                "bad tokens index record for doc {} (offset {}, length {})",
                doc, offset, length
            )));
        }
        Ok(DocRecord {
            offset: offset as u64,
            length,
            codec: TokensCodec::from_header(codec, parameter)?,
        })
    }

    /// Length in tokens, including the extra closing token
    pub fn document_length(&mut self, field: &str, doc: i32) -> Result<i32> {
        Ok(self.doc_record(field, doc)?.length)
    }

    pub fn retrieve_part(&mut self, field: &str, doc: i32, start: i32, end: i32) -> Result<Vec<i32>> {
        let mut parts = self.retrieve_parts(field, doc, &[start], &[end])?;
        parts
            .pop()
            .ok_or_else(|| Error::invalid_index("no snippet returned"))
    }

    /// Several (start, end) ranges of one document with a single tokens index lookup.
    /// -1 for start means 0; -1 for end (or an end past the document) means its length.
    pub fn retrieve_parts(&mut self, field: &str, doc: i32, starts: &[i32], ends: &[i32]) -> Result<Vec<Vec<i32>>> {
        if starts.len() != ends.len() {
            return Err(Error::invalid_argument(format!(
                "{} starts but {} ends",
                starts.len(),
                ends.len()
            )));
        }
        let record = self.doc_record(field, doc)?;
        let length = record.length;
        let mut actual_starts = Vec::with_capacity(starts.len());
        let mut actual_ends = Vec::with_capacity(ends.len());
        for (&start, &end) in starts.iter().zip(ends) {
            let start = if start == -1 { 0 } else { start };
            let end = if end == -1 || end > length { length } else { end };
            if start < 0 || end < 0 || start > end || start > length {
                return Err(Error::invalid_argument(format!(
                    "illegal snippet {}-{} for doc {} of length {}",
                    start, end, doc, length
                )));
            }
            actual_starts.push(start);
            actual_ends.push(end);
        }
        record
            .codec
            .read_snippets(&mut self.tokens, record.offset, &actual_starts, &actual_ends)
    }
}
