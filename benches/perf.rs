use std::path::Path;

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use cricket_graph::config::TournamentProfile;
use cricket_graph::graph::Upsert;
use cricket_graph::record::parse_match;
use cricket_graph::store::{SqliteGraph, apply_all};
use cricket_graph::transform::transform_match;

fn bench_match_parse(c: &mut Criterion) {
    c.bench_function("match_parse", |b| {
        b.iter(|| {
            let m = parse_match(black_box(FINAL_JSON), Path::new("final.json")).unwrap();
            black_box(m.record.innings.len());
        })
    });
}

fn bench_match_transform(c: &mut Criterion) {
    let m = parse_match(FINAL_JSON, Path::new("final.json")).expect("valid fixture json");
    let profile = TournamentProfile::default();
    c.bench_function("match_transform", |b| {
        b.iter(|| {
            let batch = transform_match(black_box(&m), &profile);
            black_box(batch.upserts.len());
        })
    });
}

fn bench_properties_encode(c: &mut Criterion) {
    let m = parse_match(FINAL_JSON, Path::new("final.json")).expect("valid fixture json");
    let batch = transform_match(&m, &TournamentProfile::default());
    c.bench_function("properties_encode", |b| {
        b.iter(|| {
            let mut bytes = 0;
            for op in &batch.upserts {
                if let Upsert::Node(node) = op {
                    bytes += node.properties().unwrap().to_string().len();
                }
            }
            black_box(bytes);
        })
    });
}

fn bench_store_upsert(c: &mut Criterion) {
    let m = parse_match(FINAL_JSON, Path::new("final.json")).expect("valid fixture json");
    let batch = transform_match(&m, &TournamentProfile::default());
    let store = SqliteGraph::open_in_memory().expect("in-memory store");
    c.bench_function("store_upsert_match", |b| {
        b.iter(|| {
            let applied = apply_all(&store, black_box(&batch.upserts)).unwrap();
            black_box(applied);
        })
    });
}

criterion_group!(
    perf,
    bench_match_parse,
    bench_match_transform,
    bench_properties_encode,
    bench_store_upsert
);
criterion_main!(perf);

static FINAL_JSON: &str = include_str!("../tests/fixtures/final_match.json");
