use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use lru::LruCache;
use tracing::{debug, instrument};
use crate::core::error::{Error, Result};
use crate::matchinfo::relation::Attributes;
use crate::storage::header::IndexFooter;
use crate::storage::io::{DataInput, IndexInput};
use crate::storage::layout::SegmentFiles;
use crate::writer::relation_info::{
    NO_INFO_OFFSET, RI_ATTR_NAMES_EXT, RI_ATTR_SETS_EXT, RI_ATTR_VALUES_EXT, RI_DOCS_EXT, RI_FIELDS_EXT,
    RI_RELATIONS_EXT,
};
use crate::writer::relation_payload::ATTR_VALUE_SEPARATOR;

const OFFSET_SIZE: u64 = 8;
const ATTRIBUTE_SET_CACHE_SIZE: usize = 256;

/// Relation-info store of one segment, opened once when the segment is loaded
pub struct RelationInfoSegment {
    max_doc: i32,
    docs_offsets: HashMap<String, i64>,
    attribute_names: Vec<String>,
    docs: IndexInput,
    relations: IndexInput,
    attr_sets: IndexInput,
    attr_values: IndexInput,
}

impl RelationInfoSegment {
    #[instrument(skip(files), fields(segment = %files.name))]
    pub fn open(files: &SegmentFiles, max_doc: i32) -> Result<Arc<Self>> {
        let mut fields_file = files.open_input(RI_FIELDS_EXT)?;
        let n_fields = fields_file.read_i32()?;
        if n_fields < 0 {
            return Err(Error::invalid_index(format!("negative relation field count {}", n_fields)));
        }
        let mut docs_offsets = HashMap::new();
        for _ in 0..n_fields {
            let name = fields_file.read_string()?;
            let offset = fields_file.read_i64()?;
            docs_offsets.insert(name, offset);
        }

        // Names file holds nothing but the names, in id order
        let mut names_file = files.open_input(RI_ATTR_NAMES_EXT)?;
        let names_end = names_file.length().saturating_sub(IndexFooter::LENGTH);
        let mut attribute_names = Vec::new();
        while names_file.file_pointer()? < names_end {
            attribute_names.push(names_file.read_string()?);
        }

        debug!(fields = docs_offsets.len(), attribute_names = attribute_names.len(), "opened relation info");
        Ok(Arc::new(RelationInfoSegment {
            max_doc,
            docs_offsets,
            attribute_names,
            docs: files.open_input(RI_DOCS_EXT)?,
            relations: files.open_input(RI_RELATIONS_EXT)?,
            attr_sets: files.open_input(RI_ATTR_SETS_EXT)?,
            attr_values: files.open_input(RI_ATTR_VALUES_EXT)?,
        }))
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.docs_offsets.contains_key(field)
    }

    pub fn attribute_names(&self) -> &[String] {
        &self.attribute_names
    }

    /// A reader with its own file handles
    pub fn reader(self: &Arc<Self>) -> Result<RelationInfoReader> {
        Ok(RelationInfoReader {
            segment: Arc::clone(self),
            docs: self.docs.try_clone()?,
            relations: self.relations.try_clone()?,
            attr_sets: self.attr_sets.try_clone()?,
            attr_values: self.attr_values.try_clone()?,
            cache: LruCache::new(NonZeroUsize::new(ATTRIBUTE_SET_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN)),
        })
    }
}

/// Looks up the attributes of relations that didn't carry them in their payload.
/// Attribute sets are shared by many relations, so decoded sets are cached.
pub struct RelationInfoReader {
    segment: Arc<RelationInfoSegment>,
    docs: IndexInput,
    relations: IndexInput,
    attr_sets: IndexInput,
    attr_values: IndexInput,
    cache: LruCache<i64, Arc<Attributes>>,
}

impl RelationInfoReader {
    /// Attributes of relation `relation_id` in `doc`. Empty when the document
    /// has no relations or the relation has no stored info.
    pub fn get_attributes(&mut self, field: &str, doc: i32, relation_id: i32) -> Result<Arc<Attributes>> {
        let Some(&docs_offset) = self.segment.docs_offsets.get(field) else {
            return Ok(Arc::default());
        };
        if doc < 0 || doc >= self.segment.max_doc || relation_id < 0 {
            return Ok(Arc::default());
        }

        self.docs.seek(docs_offset as u64 + doc as u64 * OFFSET_SIZE)?;
        let relations_offset = self.docs.read_i64()?;
        if relations_offset == NO_INFO_OFFSET {
            return Ok(Arc::default());
        }
        let entry = relations_offset as u64 + relation_id as u64 * OFFSET_SIZE;
        if relations_offset < 0 || entry + OFFSET_SIZE > self.relations.length() {
            return Err(Error::invalid_index(format!(
                "relation {} of doc {} points outside the relations file",
                relation_id, doc
            )));
        }
        self.relations.seek(entry)?;
        let set_offset = self.relations.read_i64()?;
        if set_offset == NO_INFO_OFFSET {
            return Ok(Arc::default());
        }

        if let Some(attributes) = self.cache.get(&set_offset) {
            return Ok(attributes.clone());
        }
        let attributes = Arc::new(self.read_attribute_set(set_offset)?);
        self.cache.put(set_offset, attributes.clone());
        Ok(attributes)
    }

    fn read_attribute_set(&mut self, offset: i64) -> Result<Attributes> {
        if offset < 0 {
            return Err(Error::invalid_index(format!("negative attribute set offset {}", offset)));
        }
        self.attr_sets.seek(offset as u64)?;
        let n = self.attr_sets.read_vint()?;
        let mut attributes = Attributes::new();
        for _ in 0..n {
            let name_id = self.attr_sets.read_vint()?;
            let value_offset = self.attr_sets.read_i64()?;
            let name = self
                .segment
                .attribute_names
                .get(name_id as usize)
                .ok_or_else(|| Error::invalid_index(format!("unknown attribute name id {}", name_id)))?
                .clone();
            self.attr_values.seek(value_offset as u64)?;
            let values = self.attr_values.read_string()?;
            attributes.insert(name, values.split(ATTR_VALUE_SEPARATOR).map(|v| v.to_string()).collect());
        }
        Ok(attributes)
    }
}
