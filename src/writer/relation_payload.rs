use std::sync::Arc;
use crate::core::error::{Error, Result};
use crate::matchinfo::relation::{Attributes, RelationInfo};
use crate::storage::io::{ByteOutput, DataInput, SliceInput};

/// Suffix of the annotation that holds relations and inline tags
pub const RELATION_ANNOTATION: &str = "_relation";

/// Separates annotated field and annotation in a postings field name
pub const ANNOTATION_SEPARATOR: &str = "%";

pub const ATTR_SEPARATOR: char = '\u{1}';
pub const KEY_VALUE_SEPARATOR: char = '\u{2}';
pub const ATTR_VALUE_SEPARATOR: char = '\u{3}';
/// Prefix of the term that carries every attribute of a relation
pub const RELATION_INFO_TERM_PREFIX: char = '\u{4}';

const FLAG_ONLY_HAS_TARGET: u8 = 0x02;
const FLAG_DEFAULT_LENGTH_ALT: u8 = 0x04;
const FLAG_NO_EXTRA_INFO: u8 = 0x08;

const DEFAULT_REL_OTHER_START: i32 = 1;
const DEFAULT_LENGTH: i32 = 0;
const DEFAULT_LENGTH_ALT: i32 = 1;

pub fn annotation_field(field: &str, annotation: &str) -> String {
    format!("{}{}{}", field, ANNOTATION_SEPARATOR, annotation)
}

pub fn relation_field(field: &str) -> String {
    annotation_field(field, RELATION_ANNOTATION)
}

pub fn is_relation_field(postings_field: &str) -> bool {
    postings_field
        .rsplit_once(ANNOTATION_SEPARATOR)
        .is_some_and(|(_, annotation)| annotation == RELATION_ANNOTATION)
}

/// Annotated field a postings field belongs to ("contents%word" -> "contents")
pub fn annotated_field_name(postings_field: &str) -> &str {
    postings_field
        .split_once(ANNOTATION_SEPARATOR)
        .map(|(field, _)| field)
        .unwrap_or(postings_field)
}

/// Separates an annotated field (or alignment class) from its parallel version
pub const PARALLEL_VERSION_SEPARATOR: &str = "__";

/// Version of a parallel field or alignment class ("contents__nl" -> "nl")
pub fn parallel_version(name: &str) -> Option<&str> {
    name.rsplit_once(PARALLEL_VERSION_SEPARATOR)
        .map(|(_, version)| version)
        .filter(|v| !v.is_empty())
}

/// The same parallel field in another version ("contents__en", "nl" -> "contents__nl")
pub fn with_parallel_version(field: &str, version: &str) -> String {
    let base = field
        .rsplit_once(PARALLEL_VERSION_SEPARATOR)
        .map_or(field, |(base, _)| base);
    format!("{}{}{}", base, PARALLEL_VERSION_SEPARATOR, version)
}

/// Payload stored with the relation type term, at the source start.
///
/// vint relation id, flags byte, then zint relative target start, vint source
/// length, vint target length; values equal to their default are left off the end.
#[allow(clippy::too_many_arguments)]
pub fn relation_payload(
    only_has_target: bool,
    source_start: i32,
    source_end: i32,
    target_start: i32,
    target_end: i32,
    relation_id: i32,
    may_have_extra_info: bool,
) -> Result<Vec<u8>> {
    if source_start < 0 || source_end < source_start || target_start < 0 || target_end < target_start {
        return Err(Error::invalid_argument(format!(
            "illegal relation {}-{} -> {}-{}",
            source_start, source_end, target_start, target_end
        )));
    }
    let source_length = source_end - source_start;
    let rel_target_start = target_start - source_start;
    let target_length = target_end - target_start;

    let use_alt = source_length == DEFAULT_LENGTH_ALT && target_length == DEFAULT_LENGTH_ALT;
    let default_length = if use_alt { DEFAULT_LENGTH_ALT } else { DEFAULT_LENGTH };
    let mut flags = 0u8;
    if only_has_target {
        flags |= FLAG_ONLY_HAS_TARGET;
    }
    if use_alt {
        flags |= FLAG_DEFAULT_LENGTH_ALT;
    }
    if !may_have_extra_info {
        flags |= FLAG_NO_EXTRA_INFO;
    }

    let write_target_length = target_length != default_length;
    let write_source_length = write_target_length || source_length != default_length;
    let write_rel_target_start = write_source_length || rel_target_start != DEFAULT_REL_OTHER_START;

    let mut out = ByteOutput::new();
    out.write_vint(relation_id);
    out.write_byte(flags);
    if write_rel_target_start {
        out.write_zint(rel_target_start);
    }
    if write_source_length {
        out.write_vint(source_length);
    }
    if write_target_length {
        out.write_vint(target_length);
    }
    Ok(out.into_bytes())
}

/// Inline tag: relation from the zero-length span at start to the one at end
pub fn inline_tag_payload(start: i32, end: i32, relation_id: i32, may_have_extra_info: bool) -> Result<Vec<u8>> {
    relation_payload(false, start, start, end, end, relation_id, may_have_extra_info)
}

/// Payload for attribute terms: the relation id, so they can be matched to their relation
pub fn relation_id_only_payload(relation_id: i32) -> Vec<u8> {
    let mut out = ByteOutput::new();
    out.write_vint(relation_id);
    out.into_bytes()
}

/// First vint of any relation payload
pub fn read_relation_id(payload: &[u8]) -> Result<i32> {
    SliceInput::new(payload).read_vint()
}

/// Decode a relation payload found at `position` (the source start).
pub fn decode_relation(position: i32, payload: &[u8], field: Arc<str>) -> Result<RelationInfo> {
    let mut input = SliceInput::new(payload);
    let relation_id = input.read_vint()?;
    let flags = if input.eof() { 0 } else { input.read_byte()? };
    let default_length = if flags & FLAG_DEFAULT_LENGTH_ALT != 0 { DEFAULT_LENGTH_ALT } else { DEFAULT_LENGTH };
    let rel_target_start = if input.eof() { DEFAULT_REL_OTHER_START } else { input.read_zint()? };
    let source_length = if input.eof() { default_length } else { input.read_vint()? };
    let target_length = if input.eof() { default_length } else { input.read_vint()? };

    let source_start = position;
    let target_start = position + rel_target_start;
    if source_length < 0 || target_length < 0 || target_start < 0 {
        return Err(Error::invalid_index(format!(
            "malformed relation payload at position {}: {:?}",
            position, payload
        )));
    }
    RelationInfo::new(
        flags & FLAG_ONLY_HAS_TARGET != 0,
        source_start,
        source_start + source_length,
        target_start,
        target_start + target_length,
        relation_id,
        flags & FLAG_NO_EXTRA_INFO == 0,
        field,
    )
    .map_err(|e| Error::invalid_index(format!("bad relation at position {}: {}", position, e.context)))
}

/// Terms to index for one relation: the type term and the relation-info term
/// with all attributes (both get the full payload), and one search term per
/// attribute value (relation id only).
pub fn relation_terms(full_type: &str, attributes: &Attributes) -> (String, String, Vec<String>) {
    let value_separator = ATTR_VALUE_SEPARATOR.to_string();
    let attr_separator = ATTR_SEPARATOR.to_string();
    let attr_part = attributes
        .iter()
        .map(|(name, values)| format!("{}{}{}", name, KEY_VALUE_SEPARATOR, values.join(value_separator.as_str())))
        .collect::<Vec<_>>()
        .join(attr_separator.as_str());
    let info_term = format!("{}{}{}{}", RELATION_INFO_TERM_PREFIX, full_type, ATTR_SEPARATOR, attr_part);
    let attribute_terms = attributes
        .iter()
        .flat_map(|(name, values)| values.iter().map(move |v| attribute_term(full_type, name, v)))
        .collect();
    (full_type.to_string(), info_term, attribute_terms)
}

pub fn attribute_term(full_type: &str, name: &str, value: &str) -> String {
    format!("{}{}{}{}{}", full_type, ATTR_SEPARATOR, name, KEY_VALUE_SEPARATOR, value)
}

pub fn is_relation_info_term(term: &str) -> bool {
    term.starts_with(RELATION_INFO_TERM_PREFIX)
}

/// Full relation type of any relation term (type, info or attribute term)
pub fn full_type_from_term(term: &str) -> &str {
    let term = term.strip_prefix(RELATION_INFO_TERM_PREFIX).unwrap_or(term);
    term.split(ATTR_SEPARATOR).next().unwrap_or(term)
}

/// Attributes in a relation-info term, values kept joined per name
pub fn parse_relation_info_term(term: &str) -> Result<Vec<(String, String)>> {
    let Some(rest) = term.strip_prefix(RELATION_INFO_TERM_PREFIX) else {
        return Ok(Vec::new());
    };
    let mut parts = rest.split(ATTR_SEPARATOR);
    parts.next(); // full type
    let mut attributes = Vec::new();
    for part in parts {
        if part.is_empty() {
            continue;
        }
        let (name, values) = part
            .split_once(KEY_VALUE_SEPARATOR)
            .ok_or_else(|| Error::invalid_index(format!("malformed attribute in relation info term {:?}", term)))?;
        attributes.push((name.to_string(), values.to_string()));
    }
    Ok(attributes)
}

/// Attributes in any relation term: every attribute of an info term, or the single
/// attribute of an attribute term
pub fn attributes_in_term(term: &str) -> Result<Attributes> {
    let mut attributes = Attributes::new();
    if is_relation_info_term(term) {
        for (name, values) in parse_relation_info_term(term)? {
            attributes.insert(name, values.split(ATTR_VALUE_SEPARATOR).map(|v| v.to_string()).collect());
        }
    } else if let Some((_, attr)) = term.split_once(ATTR_SEPARATOR) {
        if let Some((name, value)) = attr.split_once(KEY_VALUE_SEPARATOR) {
            attributes.insert(name.to_string(), vec![value.to_string()]);
        }
    }
    Ok(attributes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field() -> Arc<str> {
        Arc::from("contents")
    }

    #[test]
    fn dependency_payload_is_compact() {
        // 2-3 -> 3-4: relative target 1, lengths 1, all defaults with the alt flag
        let payload = relation_payload(false, 2, 3, 3, 4, 7, true).unwrap();
        assert_eq!(payload, vec![7, FLAG_DEFAULT_LENGTH_ALT]);
        let rel = decode_relation(2, &payload, field()).unwrap();
        assert_eq!((rel.source_start(), rel.source_end()), (2, 3));
        assert_eq!((rel.target_start(), rel.target_end()), (3, 4));
        assert_eq!(rel.relation_id, 7);
        assert!(rel.may_have_info_in_relation_index());
    }

    #[test]
    fn inline_tag_payload_roundtrip() {
        let payload = inline_tag_payload(5, 9, 0, false).unwrap();
        let rel = decode_relation(5, &payload, field()).unwrap();
        assert!(rel.is_tag());
        assert_eq!((rel.span_start(), rel.span_end()), (5, 9));
        assert!(!rel.may_have_info_in_relation_index());
    }

    #[test]
    fn root_relation_and_backward_target() {
        let payload = relation_payload(true, 4, 4, 4, 5, 3, true).unwrap();
        let rel = decode_relation(4, &payload, field()).unwrap();
        assert!(rel.is_root());
        assert_eq!((rel.target_start(), rel.target_end()), (4, 5));

        let payload = relation_payload(false, 6, 7, 1, 2, 2, true).unwrap();
        let rel = decode_relation(6, &payload, field()).unwrap();
        assert_eq!((rel.target_start(), rel.target_end()), (1, 2));
        assert_eq!(read_relation_id(&payload).unwrap(), 2);
        assert_eq!(read_relation_id(&relation_id_only_payload(300)).unwrap(), 300);
    }

    #[test]
    fn relation_info_term_carries_sorted_attributes() {
        let mut attrs = Attributes::new();
        attrs.insert("type".into(), vec!["np".into()]);
        attrs.insert("id".into(), vec!["a".into(), "b".into()]);
        let (type_term, info_term, attr_terms) = relation_terms("__tag::s", &attrs);
        assert_eq!(type_term, "__tag::s");
        assert_eq!(info_term, "\u{4}__tag::s\u{1}id\u{2}a\u{3}b\u{1}type\u{2}np");
        assert_eq!(attr_terms.len(), 3);
        assert_eq!(full_type_from_term(&info_term), "__tag::s");
        assert_eq!(full_type_from_term(&attr_terms[0]), "__tag::s");
        assert_eq!(attributes_in_term(&info_term).unwrap(), attrs);
        assert_eq!(attributes_in_term(&attr_terms[2]).unwrap().get("type"), Some(&vec!["np".to_string()]));

        let (_, bare, none) = relation_terms("dep::obj", &Attributes::new());
        assert_eq!(bare, "\u{4}dep::obj\u{1}");
        assert!(none.is_empty());
        assert!(parse_relation_info_term(&bare).unwrap().is_empty());
        assert!(parse_relation_info_term("\u{4}dep::x\u{1}broken").is_err());
    }

    #[test]
    fn field_names() {
        assert_eq!(relation_field("contents"), "contents%_relation");
        assert!(is_relation_field("contents%_relation"));
        assert!(!is_relation_field("contents%word"));
        assert_eq!(annotated_field_name("contents%word"), "contents");
    }
}
