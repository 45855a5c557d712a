use std::sync::Arc;
use regex::Regex;
use crate::core::error::Result;
use crate::core::types::{Direction, SpanMode};
use crate::index::segment::IndexSegment;
use crate::matchinfo::relation::{full_relation_type, CLASS_INLINE_TAG};
use crate::spans::adjust::SpansAdjustHits;
use crate::spans::and_filtered::{SpansAndFiltered, SpansFilter};
use crate::spans::capture_group::SpansCaptureGroup;
use crate::spans::relations::SpansRelations;
use crate::spans::term::TermSpans;
use crate::spans::Spans;
use crate::writer::relation_payload::{
    annotation_field, full_type_from_term, is_relation_info_term, relation_field, ATTR_SEPARATOR,
    KEY_VALUE_SEPARATOR,
};

/// Builds the spans tree of a query for each segment it runs on
pub trait SpanQuery: Send + Sync {
    /// Spans over one segment, or None if nothing can match there
    fn spans(&self, segment: &Arc<dyn IndexSegment>) -> Result<Option<Box<dyn Spans>>>;

    /// Annotated field the hits are in
    fn field(&self) -> &str;
}

fn full_match(pattern: &str) -> Result<Regex> {
    Ok(Regex::new(&format!("^(?:{})$", pattern))?)
}

/// Every occurrence of one term of an annotation
#[derive(Debug, Clone)]
pub struct SpanTermQuery {
    field: String,
    annotation: String,
    term: String,
}

impl SpanTermQuery {
    pub fn new(field: &str, annotation: &str, term: &str) -> Self {
        SpanTermQuery { field: field.to_string(), annotation: annotation.to_string(), term: term.to_string() }
    }
}

impl SpanQuery for SpanTermQuery {
    fn spans(&self, segment: &Arc<dyn IndexSegment>) -> Result<Option<Box<dyn Spans>>> {
        let postings_field = annotation_field(&self.field, &self.annotation);
        if !segment.has_field(&postings_field) {
            return Ok(None);
        }
        let postings = segment.postings(&postings_field, &self.term)?;
        if postings.cost() == 0 {
            return Ok(None);
        }
        Ok(Some(Box::new(TermSpans::new(postings))))
    }

    fn field(&self) -> &str {
        &self.field
    }
}

/// Every occurrence of any term of an annotation that fully matches a regex
#[derive(Debug, Clone)]
pub struct SpanRegexQuery {
    field: String,
    annotation: String,
    pattern: String,
}

impl SpanRegexQuery {
    pub fn new(field: &str, annotation: &str, pattern: &str) -> Self {
        SpanRegexQuery { field: field.to_string(), annotation: annotation.to_string(), pattern: pattern.to_string() }
    }
}

impl SpanQuery for SpanRegexQuery {
    fn spans(&self, segment: &Arc<dyn IndexSegment>) -> Result<Option<Box<dyn Spans>>> {
        let postings_field = annotation_field(&self.field, &self.annotation);
        if !segment.has_field(&postings_field) {
            return Ok(None);
        }
        let postings = segment.postings_regex(&postings_field, &self.pattern)?;
        Ok(Some(Box::new(TermSpans::new(postings))))
    }

    fn field(&self) -> &str {
        &self.field
    }
}

/// Relations (or inline tags) of a type, optionally with attribute values
#[derive(Debug, Clone)]
pub struct SpanRelationsQuery {
    field: String,
    relation_type: String,
    attributes: Vec<(String, String)>,
    direction: Direction,
    span_mode: SpanMode,
    capture_as: Option<String>,
}

impl SpanRelationsQuery {
    /// `relation_type` is a regex for the full type (`class::type`)
    pub fn new(field: &str, relation_type: &str, direction: Direction, span_mode: SpanMode) -> Self {
        SpanRelationsQuery {
            field: field.to_string(),
            relation_type: relation_type.to_string(),
            attributes: Vec::new(),
            direction,
            span_mode,
            capture_as: None,
        }
    }

    /// Inline tags with this name, each hit covering the whole tag
    pub fn tags(field: &str, tag_name: &str) -> Self {
        let full_type = regex::escape(&full_relation_type(CLASS_INLINE_TAG, tag_name));
        SpanRelationsQuery::new(field, &full_type, Direction::Forward, SpanMode::FullSpan)
    }

    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.push((name.to_string(), value.to_string()));
        self
    }

    pub fn capture_as(mut self, name: &str) -> Self {
        self.capture_as = Some(name.to_string());
        self
    }

    /// Type terms, ANDed with one attribute term per required attribute
    fn term_clause(&self, segment: &Arc<dyn IndexSegment>, postings_field: &str) -> Result<Box<dyn Spans>> {
        let type_regex = full_match(&self.relation_type)?;
        let type_postings = segment.postings_matching(postings_field, &|term| {
            !is_relation_info_term(term) && !term.contains(ATTR_SEPARATOR) && type_regex.is_match(term)
        })?;
        let mut clauses: Vec<Box<dyn Spans>> = vec![Box::new(TermSpans::new(type_postings))];
        for (name, value) in &self.attributes {
            let attribute = format!("{}{}{}", name, KEY_VALUE_SEPARATOR, value);
            let postings = segment.postings_matching(postings_field, &|term| {
                !is_relation_info_term(term)
                    && term.split_once(ATTR_SEPARATOR).is_some_and(|(_, attr)| attr == attribute)
                    && type_regex.is_match(full_type_from_term(term))
            })?;
            clauses.push(Box::new(TermSpans::new(postings)));
        }
        if clauses.len() == 1 {
            return Ok(clauses.remove(0));
        }
        Ok(Box::new(SpansAndFiltered::new(clauses, SpansFilter::SameRelationId)?))
    }
}

impl SpanQuery for SpanRelationsQuery {
    fn spans(&self, segment: &Arc<dyn IndexSegment>) -> Result<Option<Box<dyn Spans>>> {
        let postings_field = relation_field(&self.field);
        if !segment.has_field(&postings_field) {
            return Ok(None);
        }
        let clause = self.term_clause(segment, &postings_field)?;
        let reader = segment.relation_info().map(|r| r.reader()).transpose()?;
        let spans = SpansRelations::create(
            &self.field,
            &self.relation_type,
            clause,
            self.direction,
            self.span_mode,
            self.capture_as.as_deref(),
            reader,
        )?;
        Ok(Some(Box::new(spans)))
    }

    fn field(&self) -> &str {
        &self.field
    }
}

/// Moves the hits of a clause by fixed amounts
pub struct SpanAdjustQuery {
    clause: Arc<dyn SpanQuery>,
    start_adjust: i32,
    end_adjust: i32,
}

impl SpanAdjustQuery {
    pub fn new(clause: Arc<dyn SpanQuery>, start_adjust: i32, end_adjust: i32) -> Self {
        SpanAdjustQuery { clause, start_adjust, end_adjust }
    }
}

impl SpanQuery for SpanAdjustQuery {
    fn spans(&self, segment: &Arc<dyn IndexSegment>) -> Result<Option<Box<dyn Spans>>> {
        let Some(clause) = self.clause.spans(segment)? else {
            return Ok(None);
        };
        let spans = SpansAdjustHits::adjust(segment.clone(), self.field(), clause, self.start_adjust, self.end_adjust);
        Ok(Some(Box::new(spans)))
    }

    fn field(&self) -> &str {
        self.clause.field()
    }
}

/// Captures each hit of a clause under a name
pub struct SpanCaptureQuery {
    clause: Arc<dyn SpanQuery>,
    name: String,
}

impl SpanCaptureQuery {
    pub fn new(clause: Arc<dyn SpanQuery>, name: &str) -> Self {
        SpanCaptureQuery { clause, name: name.to_string() }
    }
}

impl SpanQuery for SpanCaptureQuery {
    fn spans(&self, segment: &Arc<dyn IndexSegment>) -> Result<Option<Box<dyn Spans>>> {
        Ok(self
            .clause
            .spans(segment)?
            .map(|clause| Box::new(SpansCaptureGroup::capture(clause, &self.name)) as Box<dyn Spans>))
    }

    fn field(&self) -> &str {
        self.clause.field()
    }
}

/// Query assembled by a closure, for spans trees the other queries don't cover
pub struct FnSpanQuery<F> {
    field: String,
    build: F,
}

impl<F> FnSpanQuery<F>
where
    F: Fn(&Arc<dyn IndexSegment>) -> Result<Option<Box<dyn Spans>>> + Send + Sync,
{
    pub fn new(field: &str, build: F) -> Self {
        FnSpanQuery { field: field.to_string(), build }
    }
}

impl<F> SpanQuery for FnSpanQuery<F>
where
    F: Fn(&Arc<dyn IndexSegment>) -> Result<Option<Box<dyn Spans>>> + Send + Sync,
{
    fn spans(&self, segment: &Arc<dyn IndexSegment>) -> Result<Option<Box<dyn Spans>>> {
        (self.build)(segment)
    }

    fn field(&self) -> &str {
        &self.field
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::segment::{DocumentInput, FieldInput, SegmentBuilder};
    use crate::matchinfo::relation::Attributes;
    use crate::matchinfo::{HitQueryContext, MatchInfoDefs};
    use crate::spans::testutil::collect_hits;

    fn segment() -> Arc<dyn IndexSegment> {
        let mut builder = SegmentBuilder::new();
        let mut attrs = Attributes::new();
        attrs.insert("lang".to_string(), vec!["en".to_string()]);
        builder.add_document(
            DocumentInput::new().field(
                "contents",
                FieldInput::new()
                    .annotation("word", &["the", "cat", "sat", "on", "the", "mat"])
                    .inline_tag("s", 0, 6, attrs)
                    .inline_tag("np", 0, 2, Attributes::new())
                    .relation("dep", "det", (1, 2), (0, 1), Attributes::new()),
            ),
        );
        Arc::new(builder.build(0, 0).unwrap())
    }

    #[test]
    fn term_and_regex_queries() {
        let segment = segment();
        let mut spans = SpanTermQuery::new("contents", "word", "the").spans(&segment).unwrap().unwrap();
        assert_eq!(collect_hits(&mut spans), vec![(0, 0, 1), (0, 4, 5)]);
        assert!(SpanTermQuery::new("contents", "word", "dog").spans(&segment).unwrap().is_none());
        assert!(SpanTermQuery::new("contents", "lemma", "the").spans(&segment).unwrap().is_none());

        let mut spans = SpanRegexQuery::new("contents", "word", "[cm]at").spans(&segment).unwrap().unwrap();
        assert_eq!(collect_hits(&mut spans), vec![(0, 1, 2), (0, 5, 6)]);
    }

    #[test]
    fn tag_query_with_attribute() {
        let segment = segment();
        let mut spans = SpanRelationsQuery::tags("contents", "s").spans(&segment).unwrap().unwrap();
        assert_eq!(collect_hits(&mut spans), vec![(0, 0, 6)]);

        let query = SpanRelationsQuery::tags("contents", "s").with_attribute("lang", "en");
        let mut spans = query.spans(&segment).unwrap().unwrap();
        assert_eq!(collect_hits(&mut spans), vec![(0, 0, 6)]);

        let query = SpanRelationsQuery::tags("contents", "s").with_attribute("lang", "nl");
        let mut spans = query.spans(&segment).unwrap().unwrap();
        assert!(collect_hits(&mut spans).is_empty());
    }

    #[test]
    fn adjusted_capture() {
        let segment = segment();
        let relations: Arc<dyn SpanQuery> =
            Arc::new(SpanRelationsQuery::new("contents", "dep::.*", Direction::BothDirections, SpanMode::Source));
        let query = SpanCaptureQuery::new(Arc::new(SpanAdjustQuery::new(relations, -1, 1)), "A");
        let mut spans = query.spans(&segment).unwrap().unwrap();
        let context = HitQueryContext::new("contents", MatchInfoDefs::new());
        spans.set_hit_query_context(&context);
        assert_eq!(collect_hits(&mut spans), vec![(0, 0, 3)]);
        assert_eq!(context.defs().index_of("A"), Some(0));
    }
}
