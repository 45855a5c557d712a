use std::cmp::Ordering;
use std::sync::Arc;
use fst::{Map, MapBuilder};
use memmap2::Mmap;
use crate::core::error::{Error, Result};
use crate::core::types::NO_TERM;
use crate::forward_index::field::ForwardIndexField;
use crate::storage::io::{DataInput, IndexInput, SliceInput};

/// Collation key used for insensitive comparisons
pub fn insensitive_key(term: &str) -> String {
    term.to_lowercase()
}

/// Term strings and sort orders of one field in one segment.
/// Immutable once loaded, so it's shared between all readers of the segment.
pub struct TermsSegmentReader {
    field: String,
    strings: Arc<Mmap>,
    string_offsets: Vec<u64>,
    id_to_insensitive_pos: Vec<i32>,
    insensitive_pos_to_id: Vec<i32>,
    id_to_sensitive_pos: Vec<i32>,
    sensitive_pos_to_id: Vec<i32>,
    lookup: Map<Vec<u8>>,
}

impl TermsSegmentReader {
    pub(crate) fn load(
        field: &ForwardIndexField,
        strings: Arc<Mmap>,
        term_index: &mut IndexInput,
        term_order: &mut IndexInput,
    ) -> Result<Self> {
        let n = field.number_of_terms.max(0) as usize;

        term_index.seek(field.term_index_offset as u64)?;
        let mut string_offsets = Vec::with_capacity(n);
        for _ in 0..n {
            let offset = term_index.read_i64()?;
            if offset < 0 || offset as usize >= strings.len() {
                return Err(Error::invalid_index(format!(
                    "term string offset {} outside terms file in field {}",
                    offset, field.name
                )));
            }
            string_offsets.push(offset as u64);
        }

        term_order.seek(field.term_order_offset as u64)?;
        let mut read_table = || -> Result<Vec<i32>> {
            let mut table = Vec::with_capacity(n);
            for _ in 0..n {
                table.push(term_order.read_i32()?);
            }
            Ok(table)
        };
        let id_to_insensitive_pos = read_table()?;
        let insensitive_pos_to_id = read_table()?;
        let id_to_sensitive_pos = read_table()?;
        let sensitive_pos_to_id = read_table()?;

        let mut reader = TermsSegmentReader {
            field: field.name.clone(),
            strings,
            string_offsets,
            id_to_insensitive_pos,
            insensitive_pos_to_id,
            id_to_sensitive_pos,
            sensitive_pos_to_id,
            lookup: Map::default(),
        };

        // Ids are assigned in byte order, which is exactly what the fst wants
        let mut builder = MapBuilder::memory();
        for id in 0..n {
            builder.insert(reader.get(id as i32)?, id as u64)?;
        }
        reader.lookup = builder.into_map();
        Ok(reader)
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn number_of_terms(&self) -> i32 {
        self.string_offsets.len() as i32
    }

    /// Term string for an id. `NO_TERM` yields the empty string.
    pub fn get(&self, id: i32) -> Result<&str> {
        if id == NO_TERM {
            return Ok("");
        }
        let offset = self.check_id(id)?;
        let mut input = SliceInput::new(&self.strings[..]);
        input.set_position(offset as usize)?;
        let len = input.read_vint()?;
        let start = input.position();
        let end = start + len.max(0) as usize;
        if len < 0 || end > self.strings.len() {
            return Err(Error::invalid_index(format!("bad term string length {} for term {}", len, id)));
        }
        std::str::from_utf8(&self.strings[start..end])
            .map_err(|e| Error::invalid_index(format!("term {} is not UTF-8: {}", id, e)))
    }

    /// Id of a term (sensitive match), or `NO_TERM`
    pub fn index_of(&self, term: &str) -> i32 {
        self.lookup.get(term).map(|id| id as i32).unwrap_or(NO_TERM)
    }

    /// First id (in insensitive sort order) of a term equal to this one, or `NO_TERM`
    pub fn index_of_insensitive(&self, term: &str) -> Result<i32> {
        let key = insensitive_key(term);
        let mut low = 0i64;
        let mut high = self.number_of_terms() as i64 - 1;
        let mut found = None;
        while low <= high {
            let mid = (low + high) / 2;
            let id = self.insensitive_pos_to_id[mid as usize];
            match insensitive_key(self.get(id)?).cmp(&key) {
                Ordering::Less => low = mid + 1,
                Ordering::Greater => high = mid - 1,
                Ordering::Equal => {
                    found = Some(id);
                    break;
                }
            }
        }
        // Equal terms share a sort position; that position points at the first of them
        Ok(match found {
            Some(id) => self.insensitive_pos_to_id[self.id_to_insensitive_pos[id as usize] as usize],
            None => NO_TERM,
        })
    }

    pub fn id_to_sort_position(&self, id: i32, sensitive: bool) -> Result<i32> {
        if id == NO_TERM {
            return Ok(NO_TERM);
        }
        self.check_id(id)?;
        let table = if sensitive { &self.id_to_sensitive_pos } else { &self.id_to_insensitive_pos };
        Ok(table[id as usize])
    }

    pub fn sort_position_to_id(&self, pos: i32, sensitive: bool) -> Result<i32> {
        let table = if sensitive { &self.sensitive_pos_to_id } else { &self.insensitive_pos_to_id };
        table
            .get(pos as usize)
            .copied()
            .filter(|_| pos >= 0)
            .ok_or_else(|| Error::invalid_index(format!("sort position {} out of range in field {}", pos, self.field)))
    }

    pub fn compare_sort_position(&self, a: i32, b: i32, sensitive: bool) -> Result<Ordering> {
        Ok(self
            .id_to_sort_position(a, sensitive)?
            .cmp(&self.id_to_sort_position(b, sensitive)?))
    }

    /// Do all these term ids denote the same term under the given sensitivity?
    pub fn terms_equal(&self, ids: &[i32], sensitive: bool) -> Result<bool> {
        let Some((&first, rest)) = ids.split_first() else {
            return Ok(true);
        };
        let pos = self.id_to_sort_position(first, sensitive)?;
        for &id in rest {
            if self.id_to_sort_position(id, sensitive)? != pos {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn check_id(&self, id: i32) -> Result<u64> {
        if id < 0 || id >= self.number_of_terms() {
            return Err(Error::invalid_index(format!(
                "term id {} out of range (field {} has {} terms)",
                id,
                self.field,
                self.number_of_terms()
            )));
        }
        Ok(self.string_offsets[id as usize])
    }
}
