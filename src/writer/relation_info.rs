use std::collections::{BTreeMap, HashMap};
use tracing::{debug, trace};
use crate::core::error::{Error, Result};
use crate::storage::header::IndexFooter;
use crate::storage::io::IndexOutput;
use crate::storage::layout::SegmentFiles;
use crate::writer::postings_writer::{FieldInfo, PostingsWriterPlugin};
use crate::writer::relation_payload::{is_relation_info_term, parse_relation_info_term, read_relation_id};

pub const RI_FIELDS_EXT: &str = "rifields";
pub const RI_DOCS_EXT: &str = "ridocs";
pub const RI_RELATIONS_EXT: &str = "rirelations";
pub const RI_ATTR_SETS_EXT: &str = "riattrsets";
pub const RI_ATTR_NAMES_EXT: &str = "riattrnames";
pub const RI_ATTR_VALUES_EXT: &str = "riattrvalues";

/// Offset written for documents without relations and relations without info
pub const NO_INFO_OFFSET: i64 = -1;

/// attribute name id -> attribute value offset
type AttributeSet = BTreeMap<i32, i64>;

/// Writes the relation-info store: for every document and relation id, the
/// set of attributes that relation has.
///
/// Only looks at relation fields, and there only at the relation-info terms,
/// which carry every attribute of their relation. Relation ids within a
/// document must run from 0 without gaps, so readers can find an entry at
/// `base + relation_id * 8`; a gap means the index is broken and fails the write.
pub struct RelationInfoPlugin {
    max_doc: i32,
    outputs: Option<Outputs>,
    fields: Vec<(String, i64)>,

    attribute_name_ids: HashMap<String, i32>,
    attribute_value_offsets: HashMap<String, i64>,
    attribute_set_offsets: HashMap<AttributeSet, i64>,

    // Per field: doc -> relation id -> attributes
    field: Option<String>,
    relations_per_doc: BTreeMap<i32, BTreeMap<i32, AttributeSet>>,

    // Per term
    ignore_current_term: bool,
    current_term_attributes: AttributeSet,
    current_doc: i32,
}

struct Outputs {
    fields: IndexOutput,
    docs: IndexOutput,
    relations: IndexOutput,
    attr_sets: IndexOutput,
    attr_names: IndexOutput,
    attr_values: IndexOutput,
}

impl RelationInfoPlugin {
    pub fn new(files: &SegmentFiles, max_doc: i32) -> Result<Self> {
        let outputs = Outputs {
            fields: files.create_output(RI_FIELDS_EXT)?,
            docs: files.create_output(RI_DOCS_EXT)?,
            relations: files.create_output(RI_RELATIONS_EXT)?,
            attr_sets: files.create_output(RI_ATTR_SETS_EXT)?,
            attr_names: files.create_output(RI_ATTR_NAMES_EXT)?,
            attr_values: files.create_output(RI_ATTR_VALUES_EXT)?,
        };
        Ok(RelationInfoPlugin {
            max_doc,
            outputs: Some(outputs),
            fields: Vec::new(),
            attribute_name_ids: HashMap::new(),
            attribute_value_offsets: HashMap::new(),
            attribute_set_offsets: HashMap::new(),
            field: None,
            relations_per_doc: BTreeMap::new(),
            ignore_current_term: true,
            current_term_attributes: AttributeSet::new(),
            current_doc: -1,
        })
    }

    fn outputs(&mut self) -> Result<&mut Outputs> {
        self.outputs
            .as_mut()
            .ok_or_else(|| Error::invalid_state("relation info writer already finished"))
    }

    /// Names get ids in first-seen order; the names file lists them in that order
    fn attribute_name_id(&mut self, name: &str) -> Result<i32> {
        if let Some(&id) = self.attribute_name_ids.get(name) {
            return Ok(id);
        }
        let id = self.attribute_name_ids.len() as i32;
        self.outputs()?.attr_names.write_string(name)?;
        self.attribute_name_ids.insert(name.to_string(), id);
        Ok(id)
    }

    fn attribute_value_offset(&mut self, value: &str) -> Result<i64> {
        if let Some(&offset) = self.attribute_value_offsets.get(value) {
            return Ok(offset);
        }
        let out = &mut self.outputs()?.attr_values;
        let offset = out.file_pointer() as i64;
        out.write_string(value)?;
        self.attribute_value_offsets.insert(value.to_string(), offset);
        Ok(offset)
    }

    fn attribute_set_offset(&mut self, set: &AttributeSet) -> Result<i64> {
        if let Some(&offset) = self.attribute_set_offsets.get(set) {
            return Ok(offset);
        }
        let out = &mut self.outputs()?.attr_sets;
        let offset = out.file_pointer() as i64;
        out.write_vint(set.len() as i32)?;
        for (&name_id, &value_offset) in set {
            out.write_vint(name_id)?;
            out.write_i64(value_offset)?;
        }
        self.attribute_set_offsets.insert(set.clone(), offset);
        Ok(offset)
    }
}

impl PostingsWriterPlugin for RelationInfoPlugin {
    fn start_field(&mut self, field: &FieldInfo) -> Result<bool> {
        if !field.is_relation_field {
            return Ok(false);
        }
        self.field = Some(field.name.clone());
        self.relations_per_doc.clear();
        Ok(true)
    }

    fn start_term(&mut self, term: &[u8]) -> Result<()> {
        let term = std::str::from_utf8(term)
            .map_err(|e| Error::invalid_index(format!("relation term is not UTF-8: {}", e)))?;
        self.ignore_current_term = !is_relation_info_term(term);
        self.current_term_attributes.clear();
        if self.ignore_current_term {
            return Ok(());
        }
        for (name, values) in parse_relation_info_term(term)? {
            let name_id = self.attribute_name_id(&name)?;
            let value_offset = self.attribute_value_offset(&values)?;
            self.current_term_attributes.insert(name_id, value_offset);
        }
        Ok(())
    }

    fn start_document(&mut self, doc: i32, _n_occurrences: i32) -> Result<()> {
        self.current_doc = doc;
        Ok(())
    }

    fn term_occurrence(&mut self, position: i32, payload: Option<&[u8]>) -> Result<()> {
        if self.ignore_current_term {
            return Ok(());
        }
        let Some(payload) = payload else {
            trace!(position, "relation info term without payload");
            return Ok(());
        };
        let relation_id = read_relation_id(payload)?;
        if relation_id < 0 {
            return Ok(());
        }
        self.relations_per_doc
            .entry(self.current_doc)
            .or_default()
            .entry(relation_id)
            .or_default()
            .extend(self.current_term_attributes.iter().map(|(&k, &v)| (k, v)));
        Ok(())
    }

    fn end_document(&mut self) -> Result<()> {
        Ok(())
    }

    fn end_term(&mut self) -> Result<()> {
        self.ignore_current_term = true;
        Ok(())
    }

    fn end_field(&mut self) -> Result<()> {
        let field = self
            .field
            .take()
            .ok_or_else(|| Error::invalid_state("end_field without start_field"))?;
        let relations_per_doc = std::mem::take(&mut self.relations_per_doc);

        let docs_offset = self.outputs()?.docs.file_pointer() as i64;
        let mut n_relations = 0usize;
        for doc in 0..self.max_doc {
            let Some(relations) = relations_per_doc.get(&doc) else {
                self.outputs()?.docs.write_i64(NO_INFO_OFFSET)?;
                continue;
            };
            let relations_offset = self.outputs()?.relations.file_pointer() as i64;
            self.outputs()?.docs.write_i64(relations_offset)?;
            for (expected, (&relation_id, attributes)) in relations.iter().enumerate() {
                if relation_id != expected as i32 {
                    return Err(Error::invalid_index(format!(
                        "relation ids in doc {} of field {} are not contiguous (expected {}, got {})",
                        doc, field, expected, relation_id
                    )));
                }
                let set_offset = self.attribute_set_offset(attributes)?;
                self.outputs()?.relations.write_i64(set_offset)?;
                n_relations += 1;
            }
        }
        if let Some((&doc, _)) = relations_per_doc.range(self.max_doc..).next() {
            return Err(Error::invalid_index(format!(
                "field {} has relations in doc {} beyond max doc {}",
                field, doc, self.max_doc
            )));
        }

        debug!(field = %field, relations = n_relations, "wrote relation info");
        self.fields.push((field, docs_offset));
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let mut outputs = self
            .outputs
            .take()
            .ok_or_else(|| Error::invalid_state("relation info writer already finished"))?;
        outputs.fields.write_i32(self.fields.len() as i32)?;
        for (name, docs_offset) in &self.fields {
            outputs.fields.write_string(name)?;
            outputs.fields.write_i64(*docs_offset)?;
        }
        for mut out in [
            outputs.fields,
            outputs.docs,
            outputs.relations,
            outputs.attr_sets,
            outputs.attr_names,
            outputs.attr_values,
        ] {
            IndexFooter::write(&mut out)?;
            out.close()?;
        }
        Ok(())
    }
}
