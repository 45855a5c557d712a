use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use corpusx::core::abort::AbortFlag;
use corpusx::index::{DocumentInput, FieldInput, IndexSegment, SegmentBuilder, SegmentSet};
use corpusx::results::{Contexts, Hit, HitProperty, HitsStore, PropertyContext};
use corpusx::{ContextSize, SearchConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

const DOCS: usize = 300;

fn vocabulary(size: usize) -> Vec<String> {
    (0..size).map(|i| format!("w{}", i)).collect()
}

// Zipf-ish word choice, so some documents compress well and some don't
fn build_segment(dir: &tempfile::TempDir, rle_block_size: i16) -> (Arc<dyn IndexSegment>, Vec<i32>) {
    let words = vocabulary(2000);
    let mut rng = StdRng::seed_from_u64(7);
    let mut builder = SegmentBuilder::new().with_rle_block_size(rle_block_size);
    let mut lengths = Vec::with_capacity(DOCS);
    for _ in 0..DOCS {
        let length = rng.gen_range(100..2000);
        let doc: Vec<&str> = (0..length)
            .map(|_| {
                let r: f64 = rng.r#gen();
                words[((r * r * r) * words.len() as f64) as usize].as_str()
            })
            .collect();
        let lemmas: Vec<&str> = doc.iter().map(|w| if w.len() > 3 { "long" } else { "short" }).collect();
        builder.add_document(
            DocumentInput::new().field("contents", FieldInput::new().annotation("word", &doc).annotation("lemma", &lemmas)),
        );
        lengths.push(length);
    }
    (Arc::new(builder.build_on_disk(dir.path(), 0, 0).unwrap()), lengths)
}

fn random_hits(lengths: &[i32], n: usize) -> HitsStore {
    let mut rng = StdRng::seed_from_u64(11);
    let mut hits: Vec<Hit> = (0..n)
        .map(|_| {
            let doc = rng.gen_range(0..lengths.len());
            let start = rng.gen_range(0..lengths[doc] - 3);
            Hit::new(doc as i32, start, start + rng.gen_range(1..3))
        })
        .collect();
    hits.sort_by_key(|h| (h.doc, h.start));
    HitsStore::from_hits(&hits).unwrap()
}

fn bench_retrieve(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let (segment, lengths) = build_segment(&dir, 100);
    let forward_index = segment.forward_index().unwrap().clone();

    let mut group = c.benchmark_group("forward_index");
    for snippet in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("retrieve_part", snippet), &snippet, |b, &snippet| {
            let mut reader = forward_index.reader().unwrap();
            let mut rng = StdRng::seed_from_u64(3);
            b.iter(|| {
                let doc = rng.gen_range(0..lengths.len());
                let start = rng.gen_range(0..lengths[doc]);
                black_box(reader.retrieve_part("contents%word", doc as i32, start, start + snippet).unwrap())
            })
        });
    }
    group.bench_function("retrieve_parts_batched", |b| {
        let mut reader = forward_index.reader().unwrap();
        let starts: Vec<i32> = (0..20).map(|i| i * 5).collect();
        let ends: Vec<i32> = starts.iter().map(|s| s + 10).collect();
        b.iter(|| black_box(reader.retrieve_parts("contents%word", 17, &starts, &ends).unwrap()))
    });
    group.bench_function("open_terms", |b| {
        b.iter(|| black_box(forward_index.terms("contents%word").unwrap()))
    });
    group.finish();
}

fn bench_contexts(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let (segment, lengths) = build_segment(&dir, 100);
    let segments = SegmentSet::new(vec![segment]);
    let hits = random_hits(&lengths, 5000);
    let abort = AbortFlag::new();

    let mut group = c.benchmark_group("contexts");
    group.bench_function("kwic_two_annotations", |b| {
        b.iter(|| {
            black_box(
                Contexts::contexts_for_hits(&hits, &segments, "contents", &["word", "lemma"], ContextSize::default(), &abort)
                    .unwrap(),
            )
        })
    });
    let context = PropertyContext { segments: &segments, defs: None, abort: &abort };
    let right = HitProperty::RightContext {
        field: "contents".to_string(),
        annotation: "word".to_string(),
        sensitive: false,
        size: 2,
    };
    group.bench_function("sort_right_context", |b| b.iter(|| black_box(hits.sorted_by(&right, &context).unwrap())));
    let config = SearchConfig::default();
    group.bench_function("group_hit_text", |b| {
        b.iter(|| black_box(hits.group_by(&HitProperty::hit_text("contents", "word", false), &context, &config).unwrap()))
    });
    group.finish();
}

criterion_group!(benches, bench_retrieve, bench_contexts);
criterion_main!(benches);
