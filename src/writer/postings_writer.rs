use tracing::{debug, instrument};
use crate::core::error::Result;
use crate::index::postings::PostingsCursor;
use crate::index::segment::{IndexSegment, MemorySegment};
use crate::core::types::NO_MORE_DOCS;

/// What the postings writer knows about a field when it starts writing it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: String,
    pub has_forward_index: bool,
    pub is_relation_field: bool,
}

/// Extension that sees every (field, term, doc, position, payload) the
/// postings writer writes, in field / term / doc / position order.
///
/// `start_field` returns whether the plugin wants to see this field at all.
pub trait PostingsWriterPlugin {
    fn start_field(&mut self, field: &FieldInfo) -> Result<bool>;

    fn start_term(&mut self, term: &[u8]) -> Result<()>;

    fn start_document(&mut self, doc: i32, n_occurrences: i32) -> Result<()>;

    fn term_occurrence(&mut self, position: i32, payload: Option<&[u8]>) -> Result<()>;

    fn end_document(&mut self) -> Result<()>;

    fn end_term(&mut self) -> Result<()>;

    fn end_field(&mut self) -> Result<()>;

    /// Write footers and close all files
    fn finish(&mut self) -> Result<()>;
}

/// Drives a set of plugins over all postings of a segment.
pub struct PostingsWriter {
    plugins: Vec<Box<dyn PostingsWriterPlugin>>,
}

impl PostingsWriter {
    pub fn new(plugins: Vec<Box<dyn PostingsWriterPlugin>>) -> Self {
        PostingsWriter { plugins }
    }

    #[instrument(skip_all, fields(segment = segment.ord()))]
    pub fn write(&mut self, segment: &MemorySegment) -> Result<()> {
        for info in segment.field_infos() {
            if !info.has_forward_index && !info.is_relation_field {
                continue;
            }

            let mut active = Vec::new();
            for (i, plugin) in self.plugins.iter_mut().enumerate() {
                if plugin.start_field(&info)? {
                    active.push(i);
                }
            }
            if active.is_empty() {
                continue;
            }

            let mut n_terms = 0usize;
            for term in segment.terms(&info.name) {
                n_terms += 1;
                for &i in &active {
                    self.plugins[i].start_term(term.as_bytes())?;
                }
                let mut postings = segment.postings(&info.name, &term)?;
                loop {
                    let doc = postings.next_doc()?;
                    if doc == NO_MORE_DOCS {
                        break;
                    }
                    let freq = postings.freq();
                    for &i in &active {
                        self.plugins[i].start_document(doc, freq)?;
                    }
                    for _ in 0..freq {
                        let position = postings.next_position()?;
                        let payload = postings.payload();
                        for &i in &active {
                            self.plugins[i].term_occurrence(position, payload)?;
                        }
                    }
                    for &i in &active {
                        self.plugins[i].end_document()?;
                    }
                }
                for &i in &active {
                    self.plugins[i].end_term()?;
                }
            }
            for &i in &active {
                self.plugins[i].end_field()?;
            }
            debug!(field = %info.name, terms = n_terms, plugins = active.len(), "wrote field");
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        for plugin in self.plugins.iter_mut() {
            plugin.finish()?;
        }
        Ok(())
    }
}
