//! Compilation performance benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use indexmap::IndexSet;
use scenec::scene::{DocumentChange, Rgba};
use scenec::*;
use std::fs;
use tempfile::TempDir;

fn settings() -> Settings {
    Settings {
        compile_yield_ms: 0,
        ..Default::default()
    }
}

/// `count` cards, each with a title, body text and a button instance.
fn generate_document(count: usize) -> (Document, Vec<NodeId>) {
    let mut b = DocumentBuilder::new("Bench");
    let page = b.page("Components");
    b.paint_style("Brand", Rgba::rgb(0.2, 0.4, 0.8));

    let button = b.component(&page, "Button");
    b.text(&button, "Label", "Go");
    b.fill(&button, Rgba::rgb(0.2, 0.4, 0.8));

    let mut cards = Vec::new();
    for i in 0..count {
        let card = b.component(&page, &format!("Card {}", i));
        let header = b.frame(&card, "Header");
        b.text(&header, "Title", &format!("Card number {}", i));
        b.text(&card, "Body", "Lorem ipsum dolor sit amet");
        b.instance(&card, "Action", &button);
        cards.push(card);
    }
    (b.build(), cards)
}

fn bench_cold_compilation(c: &mut Criterion) {
    let mut group = c.benchmark_group("cold_compilation");
    for count in [10, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter_batched(
                || generate_document(count).0,
                |mut doc| {
                    let mut events: Vec<BuildEvent> = Vec::new();
                    compile_document(black_box(&mut doc), &settings(), true, &mut events).unwrap()
                },
                criterion::BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_cached_compilation(c: &mut Criterion) {
    let (mut doc, _) = generate_document(100);
    let mut orchestrator = Orchestrator::new(settings());
    let components = orchestrator.discover(&doc);
    let mut events: Vec<BuildEvent> = Vec::new();
    orchestrator.compile(&mut doc, &components, false, None, &mut events);

    c.bench_function("cached_compilation", |b| {
        b.iter(|| {
            let mut events: Vec<BuildEvent> = Vec::new();
            orchestrator.compile(black_box(&mut doc), &components, false, None, &mut events)
        })
    });
}

fn bench_incremental_pass(c: &mut Criterion) {
    let (mut doc, cards) = generate_document(100);
    let mut orchestrator = Orchestrator::new(settings());
    let mut events: Vec<BuildEvent> = Vec::new();
    orchestrator.load_components(&mut doc, &mut events);

    let changed = cards[cards.len() / 2].clone();
    let changes = vec![DocumentChange::property_change(changed, ["name"])];

    c.bench_function("incremental_pass", |b| {
        b.iter(|| {
            let mut events: Vec<BuildEvent> = Vec::new();
            orchestrator.handle_document_change(black_box(&mut doc), &changes, &mut events)
        })
    });
}

fn bench_theme_generation(c: &mut Criterion) {
    let (doc, _) = generate_document(10);
    let settings = settings();
    c.bench_function("theme_generation", |b| {
        b.iter(|| generate_theme(black_box(&doc), &settings))
    });
}

fn bench_document_round_trip(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let input_path = temp_dir.path().join("bench.json");
    let out_dir = temp_dir.path().join("generated");
    generate_document(50).0.save(&input_path).unwrap();
    let settings = settings();

    c.bench_function("document_file_compilation", |b| {
        b.iter(|| compile_document_file(black_box(&input_path), &out_dir, &settings).unwrap())
    });
    fs::remove_dir_all(&out_dir).ok();
}

fn bench_discovery(c: &mut Criterion) {
    let (doc, _) = generate_document(500);
    let orchestrator = Orchestrator::new(settings());
    c.bench_function("discovery", |b| {
        b.iter(|| {
            let found: IndexSet<NodeId> = orchestrator.discover(black_box(&doc));
            found
        })
    });
}

criterion_group!(
    benches,
    bench_cold_compilation,
    bench_cached_compilation,
    bench_incremental_pass,
    bench_theme_generation,
    bench_document_round_trip,
    bench_discovery
);
criterion_main!(benches);
