use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use crate::core::abort::AbortFlag;
use crate::core::config::ContextSize;
use crate::core::error::{Error, Result};
use crate::forward_index::terms::insensitive_key;
use crate::index::segment::SegmentSet;
use crate::matchinfo::MatchInfoDefs;
use crate::results::contexts::Contexts;
use crate::results::store::{HitsBuilder, HitsStore};

/// Value of a hit property. Equality and hashing go by the collation key,
/// so insensitive values that differ only in case are the same group.
#[derive(Debug, Clone)]
pub enum PropertyValue {
    Int(i64),
    Str { text: String, key: String },
    Multiple(Vec<PropertyValue>),
}

impl PropertyValue {
    pub fn string(text: String, sensitive: bool) -> Self {
        let key = if sensitive { text.clone() } else { insensitive_key(&text) };
        PropertyValue::Str { text, key }
    }

    fn rank(&self) -> u8 {
        match self {
            PropertyValue::Int(_) => 0,
            PropertyValue::Str { .. } => 1,
            PropertyValue::Multiple(_) => 2,
        }
    }
}

impl PartialEq for PropertyValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PropertyValue {}

impl PartialOrd for PropertyValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PropertyValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (PropertyValue::Int(a), PropertyValue::Int(b)) => a.cmp(b),
            (PropertyValue::Str { key: a, .. }, PropertyValue::Str { key: b, .. }) => a.cmp(b),
            (PropertyValue::Multiple(a), PropertyValue::Multiple(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for PropertyValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            PropertyValue::Int(v) => v.hash(state),
            PropertyValue::Str { key, .. } => key.hash(state),
            PropertyValue::Multiple(values) => values.hash(state),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Int(v) => write!(f, "{}", v),
            PropertyValue::Str { text, .. } => f.write_str(text),
            PropertyValue::Multiple(values) => {
                let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                f.write_str(&parts.join(" / "))
            }
        }
    }
}

/// Where property values come from besides the hits themselves
pub struct PropertyContext<'a> {
    pub segments: &'a SegmentSet,
    /// Needed to look up captures by name
    pub defs: Option<&'a MatchInfoDefs>,
    pub abort: &'a AbortFlag,
}

/// Something to sort or group hits by
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HitProperty {
    DocId,
    /// Hit start
    HitPosition,
    HitText { field: String, annotation: String, sensitive: bool },
    /// Words before the hit, closest first
    LeftContext { field: String, annotation: String, sensitive: bool, size: i32 },
    RightContext { field: String, annotation: String, sensitive: bool, size: i32 },
    /// Text of a captured span
    MatchInfo { name: String, field: String, annotation: String, sensitive: bool },
    Reverse(Box<HitProperty>),
    Multiple(Vec<HitProperty>),
}

impl HitProperty {
    pub fn hit_text(field: &str, annotation: &str, sensitive: bool) -> Self {
        HitProperty::HitText { field: field.to_string(), annotation: annotation.to_string(), sensitive }
    }

    pub fn reverse(self) -> Self {
        match self {
            HitProperty::Reverse(p) => *p,
            p => HitProperty::Reverse(Box::new(p)),
        }
    }

    /// Does this property read token text?
    pub fn needs_context(&self) -> bool {
        match self {
            HitProperty::DocId | HitProperty::HitPosition => false,
            HitProperty::Reverse(p) => p.needs_context(),
            HitProperty::Multiple(ps) => ps.iter().any(|p| p.needs_context()),
            _ => true,
        }
    }

    /// One value per hit, in hit order
    pub fn values(&self, hits: &HitsStore, context: &PropertyContext<'_>) -> Result<Vec<PropertyValue>> {
        match self {
            HitProperty::DocId => Ok((0..hits.len()).map(|i| PropertyValue::Int(hits.doc(i) as i64)).collect()),
            HitProperty::HitPosition => Ok((0..hits.len()).map(|i| PropertyValue::Int(hits.start(i) as i64)).collect()),
            HitProperty::HitText { field, annotation, sensitive } => {
                text_values(hits, context, field, annotation, *sensitive, TextPart::Hit)
            }
            HitProperty::LeftContext { field, annotation, sensitive, size } => {
                text_values(hits, context, field, annotation, *sensitive, TextPart::Before(*size))
            }
            HitProperty::RightContext { field, annotation, sensitive, size } => {
                text_values(hits, context, field, annotation, *sensitive, TextPart::After(*size))
            }
            HitProperty::MatchInfo { name, field, annotation, sensitive } => {
                capture_values(hits, context, name, field, annotation, *sensitive)
            }
            HitProperty::Reverse(p) => p.values(hits, context),
            HitProperty::Multiple(ps) => {
                let mut columns = ps.iter().map(|p| p.values(hits, context)).collect::<Result<Vec<_>>>()?;
                Ok((0..hits.len())
                    .map(|i| {
                        PropertyValue::Multiple(
                            columns.iter_mut().map(|c| std::mem::replace(&mut c[i], PropertyValue::Int(0))).collect(),
                        )
                    })
                    .collect())
            }
        }
    }

    /// Compare two values this property produced, honouring `Reverse`
    pub fn compare(&self, a: &PropertyValue, b: &PropertyValue) -> Ordering {
        match (self, a, b) {
            (HitProperty::Reverse(p), a, b) => p.compare(a, b).reverse(),
            (HitProperty::Multiple(ps), PropertyValue::Multiple(va), PropertyValue::Multiple(vb)) => ps
                .iter()
                .zip(va.iter().zip(vb))
                .map(|(p, (a, b))| p.compare(a, b))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal),
            _ => a.cmp(b),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum TextPart {
    Hit,
    Before(i32),
    After(i32),
}

fn text_values(
    hits: &HitsStore,
    context: &PropertyContext<'_>,
    field: &str,
    annotation: &str,
    sensitive: bool,
    part: TextPart,
) -> Result<Vec<PropertyValue>> {
    // A snippet length of 0 means uncapped
    let size = match part {
        TextPart::Hit => ContextSize::new(0, 0, 0),
        TextPart::Before(n) => ContextSize::new(n, 0, 0),
        TextPart::After(n) => ContextSize::new(0, n, 0),
    };
    let contexts = Contexts::contexts_for_hits(hits, context.segments, field, &[annotation], size, context.abort)?;
    (0..hits.len())
        .map(|i| {
            let words = match part {
                TextPart::Hit => contexts.strings(i, 0, contexts.hit(i, 0))?,
                TextPart::Before(_) => {
                    let mut words = contexts.strings(i, 0, contexts.before(i, 0))?;
                    words.reverse();
                    words
                }
                TextPart::After(_) => contexts.strings(i, 0, contexts.after(i, 0))?,
            };
            Ok(PropertyValue::string(words.join(" "), sensitive))
        })
        .collect()
}

fn capture_values(
    hits: &HitsStore,
    context: &PropertyContext<'_>,
    name: &str,
    field: &str,
    annotation: &str,
    sensitive: bool,
) -> Result<Vec<PropertyValue>> {
    let index = context
        .defs
        .and_then(|d| d.index_of(name))
        .ok_or_else(|| Error::invalid_argument(format!("unknown capture {}", name)))?;

    // Text of the captured spans, treated as hits of their own
    let mut spans = HitsBuilder::new();
    let mut span_of_hit = Vec::with_capacity(hits.len());
    for i in 0..hits.len() {
        let captured = hits.get(i).match_info(index).map(|m| (m.span_start(), m.span_end()));
        match captured {
            Some((start, end)) => {
                span_of_hit.push(Some(spans.len()));
                spans.add(hits.doc(i), start, end, None)?;
            }
            None => span_of_hit.push(None),
        }
    }
    let texts = text_values(&spans.freeze(), context, field, annotation, sensitive, TextPart::Hit)?;
    Ok(span_of_hit
        .into_iter()
        .map(|s| match s {
            Some(j) => texts[j].clone(),
            None => PropertyValue::string(String::new(), sensitive),
        })
        .collect())
}
