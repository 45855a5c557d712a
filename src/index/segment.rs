use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use bytes::Bytes;
use regex::Regex;
use roaring::RoaringBitmap;
use tracing::{debug, instrument};
use unicode_segmentation::UnicodeSegmentation;
use crate::core::error::{Error, Result};
use crate::core::types::SegmentId;
use crate::forward_index::{ForwardIndexPlugin, ForwardIndexSegment};
use crate::index::postings::{DocPostings, MemoryPostings, PostingsCursor};
use crate::matchinfo::relation::{full_relation_type, Attributes, CLASS_INLINE_TAG};
use crate::reader::relation_info::RelationInfoSegment;
use crate::storage::layout::SegmentFiles;
use crate::writer::postings_writer::{FieldInfo, PostingsWriter, PostingsWriterPlugin};
use crate::writer::relation_info::RelationInfoPlugin;
use crate::writer::relation_payload::{
    annotation_field, inline_tag_payload, relation_field, relation_id_only_payload, relation_payload,
    relation_terms,
};

/// Term a document gets at the position after its last token, so the
/// forward index stores one extra closing token per document.
pub const CLOSING_TOKEN_TERM: &str = "";

/// One searchable partition of the index, with its own doc ids and files.
///
/// Fields are postings fields: `"{field}%{annotation}"`, relations in
/// `"{field}%_relation"`. `doc_length` takes the annotated field name.
pub trait IndexSegment: Send + Sync {
    /// Position of this segment among the index's segments
    fn ord(&self) -> usize;

    /// Added to a segment doc id to get the global doc id
    fn doc_base(&self) -> i32;

    fn max_doc(&self) -> i32;

    /// Whether any document has this postings field
    fn has_field(&self, field: &str) -> bool;

    /// Live documents; None if no document was deleted
    fn live_docs(&self) -> Option<&RoaringBitmap>;

    fn is_live(&self, doc: i32) -> bool {
        self.live_docs().is_none_or(|live| live.contains(doc as u32))
    }

    /// Length in tokens including the closing token
    fn doc_length(&self, field: &str, doc: i32) -> Result<i32>;

    fn postings(&self, field: &str, term: &str) -> Result<Box<dyn PostingsCursor>>;

    /// Union of the postings of every term the predicate accepts
    fn postings_matching(&self, field: &str, predicate: &dyn Fn(&str) -> bool) -> Result<Box<dyn PostingsCursor>>;

    /// `postings_matching` for terms fully matching a regular expression
    fn postings_regex(&self, field: &str, pattern: &str) -> Result<Box<dyn PostingsCursor>> {
        let regex = Regex::new(&format!("^(?:{})$", pattern))?;
        self.postings_matching(field, &|term| regex.is_match(term))
    }

    fn forward_index(&self) -> Option<&Arc<ForwardIndexSegment>>;

    fn relation_info(&self) -> Option<&Arc<RelationInfoSegment>>;
}

type TermPostings = BTreeMap<String, Arc<Vec<DocPostings>>>;

struct FieldPostings {
    info: FieldInfo,
    terms: TermPostings,
}

/// Segment whose postings live in memory, optionally with forward index and
/// relation info written to disk.
pub struct MemorySegment {
    ord: usize,
    doc_base: i32,
    max_doc: i32,
    fields: BTreeMap<String, FieldPostings>,
    doc_lengths: HashMap<String, Vec<i32>>,
    live_docs: Option<RoaringBitmap>,
    forward_index: Option<Arc<ForwardIndexSegment>>,
    relation_info: Option<Arc<RelationInfoSegment>>,
}

impl MemorySegment {
    pub fn field_infos(&self) -> Vec<FieldInfo> {
        self.fields.values().map(|f| f.info.clone()).collect()
    }

    /// Terms of a postings field in byte order
    pub fn terms(&self, field: &str) -> impl Iterator<Item = String> + '_ {
        self.fields
            .get(field)
            .into_iter()
            .flat_map(|f| f.terms.keys().cloned())
    }

    pub fn delete_document(&mut self, doc: i32) -> Result<()> {
        if doc < 0 || doc >= self.max_doc {
            return Err(Error::invalid_argument(format!("no document {} in segment {}", doc, self.ord)));
        }
        let max_doc = self.max_doc as u32;
        self.live_docs
            .get_or_insert_with(|| (0..max_doc).collect())
            .remove(doc as u32);
        Ok(())
    }

    fn field(&self, field: &str) -> Result<&FieldPostings> {
        self.fields
            .get(field)
            .ok_or_else(|| Error::invalid_index(format!("no postings field {} in segment {}", field, self.ord)))
    }
}

impl IndexSegment for MemorySegment {
    fn ord(&self) -> usize {
        self.ord
    }

    fn doc_base(&self) -> i32 {
        self.doc_base
    }

    fn max_doc(&self) -> i32 {
        self.max_doc
    }

    fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    fn live_docs(&self) -> Option<&RoaringBitmap> {
        self.live_docs.as_ref()
    }

    fn doc_length(&self, field: &str, doc: i32) -> Result<i32> {
        let lengths = self
            .doc_lengths
            .get(field)
            .ok_or_else(|| Error::invalid_index(format!("no length values for field {}", field)))?;
        lengths
            .get(doc as usize)
            .copied()
            .ok_or_else(|| Error::invalid_index(format!("document {} out of range in field {}", doc, field)))
    }

    fn postings(&self, field: &str, term: &str) -> Result<Box<dyn PostingsCursor>> {
        let postings = match self.field(field)?.terms.get(term) {
            Some(docs) => MemoryPostings::new(docs.clone()).with_term(term),
            None => MemoryPostings::empty().with_term(term),
        };
        Ok(Box::new(postings))
    }

    fn postings_matching(&self, field: &str, predicate: &dyn Fn(&str) -> bool) -> Result<Box<dyn PostingsCursor>> {
        let lists: Vec<_> = self
            .field(field)?
            .terms
            .iter()
            .filter(|(term, _)| predicate(term))
            .map(|(term, docs)| (Arc::from(term.as_str()), docs.clone()))
            .collect();
        Ok(Box::new(MemoryPostings::union(&lists)))
    }

    fn forward_index(&self) -> Option<&Arc<ForwardIndexSegment>> {
        self.forward_index.as_ref()
    }

    fn relation_info(&self) -> Option<&Arc<RelationInfoSegment>> {
        self.relation_info.as_ref()
    }
}

/// A relation or inline tag to index with a document
#[derive(Debug, Clone, PartialEq)]
pub struct RelationInput {
    pub full_type: String,
    pub source: (i32, i32),
    pub target: (i32, i32),
    pub only_has_target: bool,
    pub is_tag: bool,
    pub attributes: Attributes,
}

/// Content of one annotated field of a document
#[derive(Debug, Clone, Default)]
pub struct FieldInput {
    annotations: BTreeMap<String, Vec<String>>,
    relations: Vec<RelationInput>,
}

impl FieldInput {
    pub fn new() -> Self {
        FieldInput::default()
    }

    pub fn annotation(mut self, name: &str, values: &[&str]) -> Self {
        self.annotations
            .insert(name.to_string(), values.iter().map(|v| v.to_string()).collect());
        self
    }

    /// Tokenize text into words for an annotation
    pub fn text(mut self, name: &str, text: &str) -> Self {
        self.annotations
            .insert(name.to_string(), text.unicode_words().map(|w| w.to_string()).collect());
        self
    }

    pub fn inline_tag(mut self, name: &str, start: i32, end: i32, attributes: Attributes) -> Self {
        self.relations.push(RelationInput {
            full_type: full_relation_type(CLASS_INLINE_TAG, name),
            source: (start, start),
            target: (end, end),
            only_has_target: false,
            is_tag: true,
            attributes,
        });
        self
    }

    pub fn relation(
        mut self,
        relation_class: &str,
        relation_type: &str,
        source: (i32, i32),
        target: (i32, i32),
        attributes: Attributes,
    ) -> Self {
        self.relations.push(RelationInput {
            full_type: full_relation_type(relation_class, relation_type),
            source,
            target,
            only_has_target: false,
            is_tag: false,
            attributes,
        });
        self
    }

    /// Relation without a source; indexed at its target start
    pub fn root_relation(mut self, relation_class: &str, relation_type: &str, target: (i32, i32), attributes: Attributes) -> Self {
        self.relations.push(RelationInput {
            full_type: full_relation_type(relation_class, relation_type),
            source: (target.0, target.0),
            target,
            only_has_target: true,
            is_tag: false,
            attributes,
        });
        self
    }

    /// Number of tokens: the longest annotation
    fn length(&self) -> usize {
        self.annotations.values().map(|v| v.len()).max().unwrap_or(0)
    }
}

/// A document: annotated field name -> content
#[derive(Debug, Clone, Default)]
pub struct DocumentInput {
    fields: BTreeMap<String, FieldInput>,
}

impl DocumentInput {
    pub fn new() -> Self {
        DocumentInput::default()
    }

    pub fn field(mut self, name: &str, content: FieldInput) -> Self {
        self.fields.insert(name.to_string(), content);
        self
    }
}

/// Collects documents and turns them into a segment
#[derive(Default)]
pub struct SegmentBuilder {
    docs: Vec<DocumentInput>,
    deleted: Vec<i32>,
    rle_block_size: Option<i16>,
}

impl SegmentBuilder {
    pub fn new() -> Self {
        SegmentBuilder::default()
    }

    pub fn with_rle_block_size(mut self, rle_block_size: i16) -> Self {
        self.rle_block_size = Some(rle_block_size);
        self
    }

    /// Returns the segment doc id
    pub fn add_document(&mut self, doc: DocumentInput) -> i32 {
        self.docs.push(doc);
        self.docs.len() as i32 - 1
    }

    pub fn delete_document(&mut self, doc: i32) {
        self.deleted.push(doc);
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// In-memory segment without forward index or relation info
    pub fn build(&self, ord: usize, doc_base: i32) -> Result<MemorySegment> {
        let max_doc = self.docs.len() as i32;
        let mut postings: BTreeMap<String, (FieldInfo, BTreeMap<String, BTreeMap<i32, Vec<(i32, Option<Bytes>)>>>)> =
            BTreeMap::new();
        let mut doc_lengths: HashMap<String, Vec<i32>> = HashMap::new();

        for (doc, input) in self.docs.iter().enumerate() {
            let doc = doc as i32;
            for (field_name, content) in &input.fields {
                let length = content.length();
                let lengths = doc_lengths.entry(field_name.clone()).or_default();
                lengths.resize(doc as usize, 0);
                lengths.push(length as i32 + 1);

                for (annotation, values) in &content.annotations {
                    let name = annotation_field(field_name, annotation);
                    let (_, terms) = postings.entry(name.clone()).or_insert_with(|| {
                        (FieldInfo { name, has_forward_index: true, is_relation_field: false }, BTreeMap::new())
                    });
                    for (position, value) in values.iter().enumerate() {
                        add_posting(terms, value, doc, position as i32, None);
                    }
                    add_posting(terms, CLOSING_TOKEN_TERM, doc, length as i32, None);
                }

                if !content.relations.is_empty() {
                    let name = relation_field(field_name);
                    let (_, terms) = postings.entry(name.clone()).or_insert_with(|| {
                        (FieldInfo { name, has_forward_index: false, is_relation_field: true }, BTreeMap::new())
                    });
                    // Ids are dense per document and field
                    for (relation_id, relation) in content.relations.iter().enumerate() {
                        index_relation(terms, doc, relation_id as i32, relation)?;
                    }
                }
            }
        }
        for lengths in doc_lengths.values_mut() {
            lengths.resize(max_doc as usize, 0);
        }

        let fields = postings
            .into_iter()
            .map(|(name, (info, terms))| {
                let terms = terms
                    .into_iter()
                    .map(|(term, docs)| {
                        let docs = docs
                            .into_iter()
                            .map(|(doc, mut positions)| {
                                positions.sort_by_key(|(p, _)| *p);
                                DocPostings { doc, positions }
                            })
                            .collect();
                        (term, Arc::new(docs))
                    })
                    .collect();
                (name, FieldPostings { info, terms })
            })
            .collect();

        let mut segment = MemorySegment {
            ord,
            doc_base,
            max_doc,
            fields,
            doc_lengths,
            live_docs: None,
            forward_index: None,
            relation_info: None,
        };
        for &doc in &self.deleted {
            segment.delete_document(doc)?;
        }
        debug!(ord, docs = max_doc, fields = segment.fields.len(), "built segment");
        Ok(segment)
    }

    /// Build the segment, write its forward index and relation info to `dir`
    /// and open readers over them
    #[instrument(skip(self, dir), fields(docs = self.docs.len()))]
    pub fn build_on_disk(&self, dir: &Path, ord: usize, doc_base: i32) -> Result<MemorySegment> {
        let mut segment = self.build(ord, doc_base)?;
        let files = SegmentFiles::new(dir, &format!("_{}", ord), "cx", SegmentId::new())?;
        let rle_block_size = self.rle_block_size.unwrap_or(100);
        let plugins: Vec<Box<dyn PostingsWriterPlugin>> = vec![
            Box::new(ForwardIndexPlugin::new(&files, segment.max_doc, rle_block_size)?),
            Box::new(RelationInfoPlugin::new(&files, segment.max_doc)?),
        ];
        let mut writer = PostingsWriter::new(plugins);
        writer.write(&segment)?;
        writer.finish()?;

        segment.forward_index = Some(ForwardIndexSegment::open(&files, segment.max_doc)?);
        segment.relation_info = Some(RelationInfoSegment::open(&files, segment.max_doc)?);
        Ok(segment)
    }
}

/// The segments of an index, ordered by doc base, for mapping global doc ids
/// back to a segment
#[derive(Clone, Default)]
pub struct SegmentSet {
    segments: Vec<Arc<dyn IndexSegment>>,
}

impl SegmentSet {
    pub fn new(mut segments: Vec<Arc<dyn IndexSegment>>) -> Self {
        segments.sort_by_key(|s| s.doc_base());
        SegmentSet { segments }
    }

    pub fn segments(&self) -> &[Arc<dyn IndexSegment>] {
        &self.segments
    }

    /// Segment holding global doc `doc`, and the doc id within it
    pub fn locate(&self, doc: i32) -> Result<(&Arc<dyn IndexSegment>, i32)> {
        let i = self.segments.partition_point(|s| s.doc_base() <= doc);
        let segment = i
            .checked_sub(1)
            .map(|i| &self.segments[i])
            .filter(|s| doc - s.doc_base() < s.max_doc())
            .ok_or_else(|| Error::invalid_argument(format!("document {} is not in any segment", doc)))?;
        Ok((segment, doc - segment.doc_base()))
    }

    pub fn max_doc(&self) -> i32 {
        self.segments.iter().map(|s| s.doc_base() + s.max_doc()).max().unwrap_or(0)
    }
}

fn add_posting(
    terms: &mut BTreeMap<String, BTreeMap<i32, Vec<(i32, Option<Bytes>)>>>,
    term: &str,
    doc: i32,
    position: i32,
    payload: Option<Vec<u8>>,
) {
    terms
        .entry(term.to_string())
        .or_default()
        .entry(doc)
        .or_default()
        .push((position, payload.map(Bytes::from)));
}

fn index_relation(
    terms: &mut BTreeMap<String, BTreeMap<i32, Vec<(i32, Option<Bytes>)>>>,
    doc: i32,
    relation_id: i32,
    relation: &RelationInput,
) -> Result<()> {
    let (source_start, source_end) = relation.source;
    let (target_start, target_end) = relation.target;
    if source_start < 0 || source_end < source_start || target_start < 0 || target_end < target_start {
        return Err(Error::invalid_argument(format!(
            "illegal relation {} {:?} -> {:?} in doc {}",
            relation.full_type, relation.source, relation.target, doc
        )));
    }
    let may_have_extra_info = !relation.attributes.is_empty();
    let payload = if relation.is_tag {
        inline_tag_payload(source_start, target_end, relation_id, may_have_extra_info)?
    } else {
        relation_payload(
            relation.only_has_target,
            source_start,
            source_end,
            target_start,
            target_end,
            relation_id,
            may_have_extra_info,
        )?
    };
    let (type_term, info_term, attribute_terms) = relation_terms(&relation.full_type, &relation.attributes);
    add_posting(terms, &type_term, doc, source_start, Some(payload.clone()));
    add_posting(terms, &info_term, doc, source_start, Some(payload));
    for term in attribute_terms {
        add_posting(terms, &term, doc, source_start, Some(relation_id_only_payload(relation_id)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::NO_MORE_DOCS;

    #[test]
    fn segment_set_locates_docs() {
        let mut builder = SegmentBuilder::new();
        builder.add_document(DocumentInput::new().field("contents", FieldInput::new().annotation("word", &["a"])));
        builder.add_document(DocumentInput::new().field("contents", FieldInput::new().annotation("word", &["b"])));
        let second: Arc<dyn IndexSegment> = Arc::new(builder.build(1, 2).unwrap());
        let first: Arc<dyn IndexSegment> = Arc::new(builder.build(0, 0).unwrap());
        let set = SegmentSet::new(vec![second, first]);
        assert_eq!(set.locate(1).map(|(s, d)| (s.ord(), d)).unwrap(), (0, 1));
        assert_eq!(set.locate(3).map(|(s, d)| (s.ord(), d)).unwrap(), (1, 1));
        assert!(set.locate(4).is_err());
        assert_eq!(set.max_doc(), 4);
    }

    #[test]
    fn closing_token_counts_in_length() {
        let mut builder = SegmentBuilder::new();
        builder.add_document(DocumentInput::new().field("contents", FieldInput::new().text("word", "The cat sat.")));
        builder.add_document(DocumentInput::new().field("contents", FieldInput::new().annotation("word", &["a"])));
        let segment = builder.build(0, 0).unwrap();
        assert_eq!(segment.doc_length("contents", 0).unwrap(), 4);
        assert_eq!(segment.doc_length("contents", 1).unwrap(), 2);

        let mut p = segment.postings("contents%word", "cat").unwrap();
        assert_eq!(p.next_doc().unwrap(), 0);
        assert_eq!(p.next_position().unwrap(), 1);
        assert_eq!(p.next_doc().unwrap(), NO_MORE_DOCS);
    }

    #[test]
    fn relations_get_dense_ids() {
        let mut builder = SegmentBuilder::new();
        let content = FieldInput::new()
            .annotation("word", &["I", "see", "it"])
            .relation("dep", "nsubj", (1, 2), (0, 1), Attributes::new())
            .relation("dep", "obj", (1, 2), (2, 3), Attributes::new())
            .inline_tag("s", 0, 3, Attributes::new());
        builder.add_document(DocumentInput::new().field("contents", content));
        let segment = builder.build(0, 0).unwrap();
        let infos = segment.field_infos();
        assert!(infos.iter().any(|f| f.is_relation_field && f.name == "contents%_relation"));

        let mut tag = segment.postings("contents%_relation", "__tag::s").unwrap();
        assert_eq!(tag.next_doc().unwrap(), 0);
        assert_eq!(tag.next_position().unwrap(), 0);
        let rel = crate::writer::relation_payload::decode_relation(0, tag.payload().unwrap(), Arc::from("contents")).unwrap();
        assert_eq!(rel.relation_id, 2);
        assert!(rel.is_tag());
        assert_eq!(rel.target_end(), 3);
    }

    #[test]
    fn regex_postings_union_terms() {
        let mut builder = SegmentBuilder::new();
        builder.add_document(
            DocumentInput::new().field("contents", FieldInput::new().annotation("word", &["cat", "car", "dog"])),
        );
        let segment = builder.build(0, 0).unwrap();
        let mut p = segment.postings_regex("contents%word", "ca.").unwrap();
        assert_eq!(p.next_doc().unwrap(), 0);
        assert_eq!(p.freq(), 2);
    }

    #[test]
    fn deleted_docs_are_not_live() {
        let mut builder = SegmentBuilder::new();
        builder.add_document(DocumentInput::new());
        builder.add_document(DocumentInput::new());
        builder.delete_document(1);
        let segment = builder.build(0, 0).unwrap();
        assert!(segment.is_live(0));
        assert!(!segment.is_live(1));
    }
}
