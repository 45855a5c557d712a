use std::sync::Arc;
use corpusx::core::abort::AbortFlag;
use corpusx::index::{DocumentInput, FieldInput, IndexSegment, SegmentBuilder, SegmentSet};
use corpusx::results::{
    collocations, Contexts, Hit, HitFetcher, HitProperty, HitsStore, Kwic, PropertyContext, PropertyValue,
    SampleParameters,
};
use corpusx::spans::query::{SpanQuery, SpanRegexQuery, SpanTermQuery};
use corpusx::spans::{Accept, FilterSpans, HitFilter, Spans};
use corpusx::{ContextSize, Error, ErrorKind, Result, SearchConfig};
use tempfile::TempDir;

fn segment(dir: &TempDir, ord: usize, doc_base: i32, docs: &[&[&str]]) -> Arc<dyn IndexSegment> {
    let mut builder = SegmentBuilder::new();
    for words in docs {
        builder.add_document(DocumentInput::new().field("contents", FieldInput::new().annotation("word", words)));
    }
    Arc::new(builder.build_on_disk(dir.path(), ord, doc_base).unwrap())
}

fn config(threads: usize) -> SearchConfig {
    SearchConfig { max_threads_per_search: threads, hit_polling_ms: 1, ..SearchConfig::default() }
}

fn positions(hits: &HitsStore) -> Vec<(i32, i32, i32)> {
    hits.iter().map(|h| (h.doc, h.start, h.end)).collect()
}

/// Two segments; "cat" occurs in global docs 0, 1 (twice) and 3
fn cat_corpus(dir: &TempDir) -> Vec<Arc<dyn IndexSegment>> {
    vec![
        segment(dir, 0, 0, &[&["the", "cat", "sat"], &["a", "cat", "and", "a", "cat"]]),
        segment(dir, 1, 2, &[&["no", "dogs"], &["the", "cat"]]),
    ]
}

#[test]
fn fetches_hits_over_segments() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let dir = TempDir::new().unwrap();
    let segments = cat_corpus(&dir);
    let query = SpanTermQuery::new("contents", "word", "cat");
    let fetcher = HitFetcher::new(&query, &segments, &config(2), AbortFlag::new()).unwrap();

    assert!(fetcher.processed_at_least(1).unwrap());
    assert_eq!(fetcher.size().unwrap(), 4);
    assert!(fetcher.stats().done());
    assert_eq!(fetcher.stats().docs_processed_so_far(), 3);
    assert!(!fetcher.stats().max_stats().exceeded());

    let set = SegmentSet::new(segments);
    let abort = AbortFlag::new();
    let context = PropertyContext { segments: &set, defs: None, abort: &abort };
    let sorted = fetcher
        .into_store()
        .unwrap()
        .sorted_by(&HitProperty::Multiple(vec![HitProperty::DocId, HitProperty::HitPosition]), &context)
        .unwrap();
    assert_eq!(positions(&sorted), vec![(0, 1, 2), (1, 1, 2), (1, 4, 5), (3, 1, 2)]);
}

#[test]
fn process_limit_keeps_counting() {
    let dir = TempDir::new().unwrap();
    let segments = cat_corpus(&dir);
    let query = SpanTermQuery::new("contents", "word", "cat");
    let config = SearchConfig { max_hits_to_process: 2, ..config(1) };
    let fetcher = HitFetcher::new(&query, &segments, &config, AbortFlag::new()).unwrap();

    // Whole documents are stored, so the limit may be passed by a few hits
    let stored = fetcher.size().unwrap();
    assert!((2..4).contains(&stored));
    assert_eq!(fetcher.stats().counted_so_far(), 4);
    let max_stats = fetcher.stats().max_stats();
    assert!(max_stats.hits_processed_exceeded);
    assert!(!max_stats.hits_counted_exceeded);
}

#[test]
fn aborted_search_reports_error_again() {
    let dir = TempDir::new().unwrap();
    let segments = cat_corpus(&dir);
    let query = SpanTermQuery::new("contents", "word", "cat");
    let abort = AbortFlag::new();
    let fetcher = HitFetcher::new(&query, &segments, &config(1), abort.clone()).unwrap();
    abort.abort();
    assert!(fetcher.size().unwrap_err().is(ErrorKind::SearchInterrupted));
    assert!(fetcher.get(0).unwrap_err().is(ErrorKind::SearchInterrupted));
}

/// Rejects every hit with an error, or by panicking
struct CorruptPostings {
    panic: bool,
}

impl HitFilter for CorruptPostings {
    fn accept(&mut self, _candidate: &mut dyn Spans) -> Result<Accept> {
        if self.panic {
            panic!("postings decoder panicked");
        }
        Err(Error::invalid_index("postings checksum mismatch"))
    }
}

/// A term query whose hits cannot be read in one segment
struct BrokenInSegment {
    inner: SpanTermQuery,
    broken_ord: usize,
    panic: bool,
}

impl SpanQuery for BrokenInSegment {
    fn spans(&self, segment: &Arc<dyn IndexSegment>) -> Result<Option<Box<dyn Spans>>> {
        let spans = self.inner.spans(segment)?;
        Ok(spans.map(|spans| {
            if segment.ord() == self.broken_ord {
                Box::new(FilterSpans::new(spans, CorruptPostings { panic: self.panic })) as Box<dyn Spans>
            } else {
                spans
            }
        }))
    }

    fn field(&self) -> &str {
        self.inner.field()
    }
}

#[test]
fn worker_failure_reaches_every_caller() {
    let dir = TempDir::new().unwrap();
    let segments = cat_corpus(&dir);
    let query = BrokenInSegment { inner: SpanTermQuery::new("contents", "word", "cat"), broken_ord: 1, panic: false };
    let fetcher = HitFetcher::new(&query, &segments, &config(2), AbortFlag::new()).unwrap();

    // Two callers racing for the fetch both see the failure, never a short count
    let results: Vec<Result<i64>> = std::thread::scope(|scope| {
        let callers: Vec<_> = (0..2).map(|_| scope.spawn(|| fetcher.size())).collect();
        callers.into_iter().map(|c| c.join().unwrap()).collect()
    });
    for result in results {
        let err = result.unwrap_err();
        assert!(err.is(ErrorKind::InvalidIndex));
        assert!(err.to_string().contains("postings checksum mismatch"));
    }

    // Later calls report it again
    assert!(fetcher.stats().done());
    assert!(fetcher.size().unwrap_err().is(ErrorKind::InvalidIndex));
    assert!(fetcher.get(0).unwrap_err().is(ErrorKind::InvalidIndex));
    assert!(fetcher.processed_at_least(1).unwrap_err().is(ErrorKind::InvalidIndex));
    assert!(fetcher.window(0, 5).unwrap_err().is(ErrorKind::InvalidIndex));
    assert!(fetcher.into_store().unwrap_err().is(ErrorKind::InvalidIndex));
}

#[test]
fn panicking_worker_fails_the_search() {
    let dir = TempDir::new().unwrap();
    let segments = cat_corpus(&dir);
    let query = BrokenInSegment { inner: SpanTermQuery::new("contents", "word", "cat"), broken_ord: 0, panic: true };
    let fetcher = HitFetcher::new(&query, &segments, &config(1), AbortFlag::new()).unwrap();

    assert!(fetcher.size().unwrap_err().is(ErrorKind::Internal));
    assert!(fetcher.window(0, 10).unwrap_err().is(ErrorKind::Internal));
}

#[test]
fn kwic_and_collocations() {
    let dir = TempDir::new().unwrap();
    let segments = cat_corpus(&dir);
    let set = SegmentSet::new(segments);
    let abort = AbortFlag::new();
    let hits = HitsStore::from_hits(&[Hit::new(0, 1, 2), Hit::new(1, 1, 2), Hit::new(1, 4, 5), Hit::new(3, 1, 2)])
        .unwrap();

    let contexts = Contexts::contexts_for_hits(&hits, &set, "contents", &["word"], ContextSize::new(2, 2, 0), &abort)
        .unwrap();
    assert_eq!(contexts.len(), 4);
    assert_eq!(
        contexts.kwic(2, 0).unwrap(),
        Kwic { before: vec!["and".into(), "a".into()], hit: vec!["cat".into()], after: vec![] }
    );
    assert_eq!(
        contexts.kwic(0, 0).unwrap(),
        Kwic { before: vec!["the".into()], hit: vec!["cat".into()], after: vec!["sat".into()] }
    );

    let frequencies = collocations(&hits, &set, "contents", "word", ContextSize::new(1, 1, 0), false, &abort).unwrap();
    let entries: Vec<(&str, i64)> = frequencies.iter().collect();
    assert_eq!(entries, vec![("a", 2), ("the", 2), ("and", 1), ("sat", 1)]);
    assert_eq!(frequencies.total_frequency(), 6);
}

#[test]
fn group_by_document() {
    let hits = HitsStore::from_hits(&[
        Hit::new(1, 1, 2),
        Hit::new(1, 2, 3),
        Hit::new(2, 3, 4),
        Hit::new(3, 4, 5),
        Hit::new(3, 5, 6),
    ])
    .unwrap();
    let set = SegmentSet::default();
    let abort = AbortFlag::new();
    let context = PropertyContext { segments: &set, defs: None, abort: &abort };
    let groups = hits.group_by(&HitProperty::DocId, &context, &SearchConfig::default()).unwrap();

    assert_eq!(groups.len(), 3);
    let sizes: Vec<(String, i64)> = groups.iter().map(|g| (g.identity().to_string(), g.size())).collect();
    assert_eq!(sizes, vec![("1".to_string(), 2), ("2".to_string(), 1), ("3".to_string(), 2)]);
    assert_eq!(groups.total_hits(), 5);
}

#[test]
fn group_by_hit_text() {
    let dir = TempDir::new().unwrap();
    let segments = vec![segment(&dir, 0, 0, &[&["the", "cat", "The", "dog"]])];
    // Any non-empty word; the closing token is the empty term
    let query = SpanRegexQuery::new("contents", "word", ".+");
    let fetcher = HitFetcher::new(&query, &segments, &config(1), AbortFlag::new()).unwrap();
    let hits = fetcher.into_store().unwrap();
    assert_eq!(hits.len(), 4);

    let set = SegmentSet::new(segments);
    let abort = AbortFlag::new();
    let context = PropertyContext { segments: &set, defs: None, abort: &abort };
    let mut groups = hits
        .group_by(&HitProperty::hit_text("contents", "word", false), &context, &SearchConfig::default())
        .unwrap();
    groups.sort_by_size();

    assert_eq!(groups.len(), 3);
    assert_eq!(groups.get(0).unwrap().size(), 2);
    assert_eq!(groups.largest_group_size(), 2);
    let the = groups.group(&PropertyValue::string("THE".to_string(), false)).unwrap();
    assert_eq!(positions(the.hits()), vec![(0, 0, 1), (0, 2, 3)]);
    assert_eq!(groups.group(&PropertyValue::string("cat".to_string(), false)).unwrap().size(), 1);
    assert_eq!(groups.group(&PropertyValue::string("dog".to_string(), false)).unwrap().size(), 1);

    let sensitive = hits
        .group_by(&HitProperty::hit_text("contents", "word", true), &context, &SearchConfig::default())
        .unwrap();
    assert_eq!(sensitive.len(), 4);

    let limited = SearchConfig { max_number_of_groups: 2, ..SearchConfig::default() };
    let err = hits.group_by(&HitProperty::hit_text("contents", "word", false), &context, &limited).unwrap_err();
    assert!(err.is(ErrorKind::UnsupportedOperation));
}

#[test]
fn sort_by_text_and_context() {
    let dir = TempDir::new().unwrap();
    let segments = vec![segment(&dir, 0, 0, &[&["b", "x", "a", "x", "c", "x"]])];
    let query = SpanTermQuery::new("contents", "word", "x");
    let hits = HitFetcher::new(&query, &segments, &config(1), AbortFlag::new()).unwrap().into_store().unwrap();

    let set = SegmentSet::new(segments);
    let abort = AbortFlag::new();
    let context = PropertyContext { segments: &set, defs: None, abort: &abort };
    let left = HitProperty::LeftContext {
        field: "contents".into(),
        annotation: "word".into(),
        sensitive: false,
        size: 1,
    };
    let sorted = hits.sorted_by(&left, &context).unwrap();
    assert_eq!(positions(&sorted), vec![(0, 3, 4), (0, 1, 2), (0, 5, 6)]);
    let reversed = hits.sorted_by(&left.reverse(), &context).unwrap();
    assert_eq!(positions(&reversed), vec![(0, 5, 6), (0, 1, 2), (0, 3, 4)]);
}

#[test]
fn seeded_samples_repeat() {
    let hits: Vec<Hit> = (0..1000).map(|i| Hit::new(i / 10, i % 10, i % 10 + 1)).collect();
    let hits = HitsStore::from_hits(&hits).unwrap();

    let first = hits.sample(&SampleParameters::number(50, 1234)).unwrap();
    let second = hits.sample(&SampleParameters::number(50, 1234)).unwrap();
    assert_eq!(first.len(), 50);
    assert_eq!(positions(&first), positions(&second));
    // Sampled hits keep their original order
    let docs: Vec<(i32, i32)> = first.iter().map(|h| (h.doc, h.start)).collect();
    assert!(docs.windows(2).all(|w| w[0] < w[1]));

    assert_eq!(hits.sample(&SampleParameters::fraction(0.1, 99)).unwrap().len(), 100);
    assert_eq!(hits.sample(&SampleParameters::number(5000, 1)).unwrap().len(), 1000);
}

#[test]
fn windows_over_fetched_hits() {
    let dir = TempDir::new().unwrap();
    let words = ["x"; 12];
    let segments = vec![segment(&dir, 0, 0, &[&words])];
    let query = SpanTermQuery::new("contents", "word", "x");
    let fetcher = HitFetcher::new(&query, &segments, &config(1), AbortFlag::new()).unwrap();

    let window = fetcher.window(5, 10).unwrap();
    assert_eq!(window.len(), 7);
    assert!(!window.has_next());
    assert!(window.has_previous());
    assert_eq!(window.hits().start(0), 5);

    let window = fetcher.window(0, 5).unwrap();
    assert!(window.has_next());
    assert_eq!(window.next_window().map(|w| (w.first, w.number)), Some((5, 5)));

    assert!(fetcher.window(12, 5).unwrap_err().is(ErrorKind::InvalidArgument));
}
