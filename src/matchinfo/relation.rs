use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use crate::core::error::{Error, Result};
use crate::core::types::{SpanMode, RELATION_ID_NO_INFO};

pub const CLASS_INLINE_TAG: &str = "__tag";
pub const CLASS_DEFAULT: &str = "rel";
pub const CLASS_DEPENDENCY: &str = "dep";
pub const CLASS_ALIGNMENT: &str = "al";
pub const CLASS_TYPE_SEPARATOR: &str = "::";

pub type Attributes = BTreeMap<String, Vec<String>>;

pub fn full_relation_type(relation_class: &str, relation_type: &str) -> String {
    format!("{}{}{}", relation_class, CLASS_TYPE_SEPARATOR, relation_type)
}

/// (class, type) of a full relation type; class is empty if there is none
pub fn class_and_type(full_type: &str) -> (&str, &str) {
    match full_type.find(CLASS_TYPE_SEPARATOR) {
        Some(sep) => (&full_type[..sep], &full_type[sep + CLASS_TYPE_SEPARATOR.len()..]),
        None => ("", full_type),
    }
}

/// A captured relation: source span, target span, type and attributes.
///
/// Root relations only have a target; by convention their source is the
/// zero-length span at the target start (where they are indexed).
#[derive(Debug, Clone)]
pub struct RelationInfo {
    pub relation_id: i32,
    only_has_target: bool,
    source_start: i32,
    source_end: i32,
    target_start: i32,
    target_end: i32,
    may_have_info_in_relation_index: bool,
    full_relation_type: Option<Arc<str>>,
    attributes: Option<Arc<Attributes>>,
    field: Arc<str>,
    target_field: Arc<str>,
}

impl RelationInfo {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        only_has_target: bool,
        source_start: i32,
        source_end: i32,
        target_start: i32,
        target_end: i32,
        relation_id: i32,
        may_have_info_in_relation_index: bool,
        field: Arc<str>,
    ) -> Result<Self> {
        if only_has_target && (source_start != target_start || source_end != target_start) {
            return Err(Error::invalid_argument(format!(
                "root relation needs a zero-length source at its target start (source {}-{}, target {}-{})",
                source_start, source_end, target_start, target_end
            )));
        }
        Ok(RelationInfo {
            relation_id,
            only_has_target,
            source_start,
            source_end,
            target_start,
            target_end,
            may_have_info_in_relation_index,
            full_relation_type: None,
            attributes: None,
            target_field: field.clone(),
            field,
        })
    }

    /// Inline tag from start to end: zero-length source and target
    pub fn tag(start: i32, end: i32, tag_name: &str, field: Arc<str>) -> Self {
        RelationInfo {
            relation_id: RELATION_ID_NO_INFO,
            only_has_target: false,
            source_start: start,
            source_end: start,
            target_start: end,
            target_end: end,
            may_have_info_in_relation_index: false,
            full_relation_type: Some(full_relation_type(CLASS_INLINE_TAG, tag_name).into()),
            attributes: None,
            target_field: field.clone(),
            field,
        }
    }

    pub fn with_type(mut self, full_type: Arc<str>) -> Self {
        self.full_relation_type = Some(full_type);
        self
    }

    pub fn with_target_field(mut self, target_field: Arc<str>) -> Self {
        self.target_field = target_field;
        self
    }

    pub fn set_full_relation_type(&mut self, full_type: Option<Arc<str>>) {
        self.full_relation_type = full_type;
    }

    pub fn set_attributes(&mut self, attributes: Option<Arc<Attributes>>) {
        self.attributes = attributes;
    }

    pub fn is_root(&self) -> bool {
        self.only_has_target
    }

    pub fn source_start(&self) -> i32 {
        self.source_start
    }

    pub fn source_end(&self) -> i32 {
        self.source_end
    }

    pub fn target_start(&self) -> i32 {
        self.target_start
    }

    pub fn target_end(&self) -> i32 {
        self.target_end
    }

    pub fn has_target(&self) -> bool {
        self.target_start >= 0
    }

    pub fn may_have_info_in_relation_index(&self) -> bool {
        self.may_have_info_in_relation_index
    }

    pub fn full_relation_type(&self) -> Option<&str> {
        self.full_relation_type.as_deref()
    }

    pub fn relation_class(&self) -> &str {
        self.full_relation_type().map(|t| class_and_type(t).0).unwrap_or("")
    }

    pub fn relation_type(&self) -> &str {
        self.full_relation_type().map(|t| class_and_type(t).1).unwrap_or("")
    }

    pub fn attributes(&self) -> Option<&Attributes> {
        self.attributes.as_deref()
    }

    pub fn field(&self) -> &Arc<str> {
        &self.field
    }

    pub fn target_field(&self) -> &Arc<str> {
        &self.target_field
    }

    pub fn is_cross_field(&self) -> bool {
        self.target_field != self.field
    }

    /// Zero-length source and target, source not after target
    pub fn is_tag(&self) -> bool {
        !self.only_has_target
            && self.source_end == self.source_start
            && self.target_end == self.target_start
            && (self.target_start == -1 || self.source_start <= self.target_start)
    }

    /// Covers source and target, or only the source for a relation into another field
    pub fn span_start(&self) -> i32 {
        if self.is_cross_field() {
            self.source_start
        } else {
            self.source_start.min(self.target_start)
        }
    }

    pub fn span_end(&self) -> i32 {
        if self.is_cross_field() {
            self.source_end
        } else {
            self.source_end.max(self.target_end)
        }
    }

    pub fn span_start_for(&self, mode: SpanMode) -> Result<i32> {
        match mode {
            SpanMode::Source => Ok(self.source_start),
            SpanMode::Target => Ok(self.target_start),
            SpanMode::FullSpan => Ok(self.span_start()),
            SpanMode::AllSpans => Err(Error::invalid_argument("all-spans mode is only valid for rspan()")),
        }
    }

    pub fn span_end_for(&self, mode: SpanMode) -> Result<i32> {
        match mode {
            SpanMode::Source => Ok(self.source_end),
            SpanMode::Target => Ok(self.target_end),
            SpanMode::FullSpan => Ok(self.span_end()),
            SpanMode::AllSpans => Err(Error::invalid_argument("all-spans mode is only valid for rspan()")),
        }
    }
}

impl PartialEq for RelationInfo {
    fn eq(&self, other: &Self) -> bool {
        self.only_has_target == other.only_has_target
            && self.source_start == other.source_start
            && self.source_end == other.source_end
            && self.target_start == other.target_start
            && self.target_end == other.target_end
            && self.full_relation_type == other.full_relation_type
            && self.attributes == other.attributes
    }
}

impl Eq for RelationInfo {}

impl PartialOrd for RelationInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RelationInfo {
    /// Roots first, then source (non-roots only), target, type and attributes
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .only_has_target
            .cmp(&self.only_has_target)
            .then_with(|| {
                if !self.only_has_target && !other.only_has_target {
                    self.source_start
                        .cmp(&other.source_start)
                        .then(self.source_end.cmp(&other.source_end))
                } else {
                    Ordering::Equal
                }
            })
            .then(self.target_start.cmp(&other.target_start))
            .then(self.target_end.cmp(&other.target_end))
            .then_with(|| self.full_relation_type.cmp(&other.full_relation_type))
            .then_with(|| self.attributes.cmp(&other.attributes))
    }
}

impl fmt::Display for RelationInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_tag() {
            let name = match self.full_relation_type() {
                Some(_) => self.relation_type(),
                None => "UNKNOWN",
            };
            write!(f, "tag(<{}", name)?;
            if let Some(attributes) = self.attributes() {
                for (key, values) in attributes {
                    write!(f, " {}=\"{}\"", key, values.join("|"))?;
                }
            }
            return write!(f, "/> at {}-{} )", self.span_start(), self.span_end());
        }
        let target = if self.target_end - self.target_start != 1 {
            format!("{}-{}", self.target_start, self.target_end)
        } else {
            self.target_start.to_string()
        };
        if self.only_has_target {
            return write!(f, "rel( ^-{}-> {})", self.full_relation_type().unwrap_or("??"), target);
        }
        let source = if self.source_end - self.source_start != 1 {
            format!("{}-{}", self.source_start, self.source_end)
        } else {
            self.source_start.to_string()
        };
        write!(f, "rel({} -{}-> {})", source, self.full_relation_type().unwrap_or("??"), target)?;
        if self.is_cross_field() {
            write!(f, " ({} -> {})", self.field, self.target_field)?;
        }
        Ok(())
    }
}
