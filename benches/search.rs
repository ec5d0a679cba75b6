use cocktail_search::embeddings::HashingEmbedder;
use cocktail_search::index::{DistanceMetric, SimilarityIndex};
use cocktail_search::recipes::SourceRecord;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use serde_json::json;
use std::hint::black_box;
use std::sync::Arc;

const SPIRITS: [&str; 6] = ["Gin", "Rum", "Vodka", "Tequila", "Whiskey", "Brandy"];
const MIXERS: [&str; 5] = ["Lime juice", "Tonic water", "Ginger beer", "Cola", "Bitters"];

fn menu(size: usize) -> Vec<SourceRecord> {
    (0..size)
        .map(|i| {
            json!({
                "id": i,
                "name": format!("Drink {}", i),
                "instructions": "Shake with ice and strain.",
                "combined_ingredients": [
                    {"ingredient": SPIRITS[i % SPIRITS.len()], "measure": "2 oz"},
                    {"ingredient": MIXERS[i % MIXERS.len()], "measure": "4 oz"}
                ]
            })
            .as_object()
            .cloned()
            .expect("fixture is an object")
        })
        .collect()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    for size in [500, 5_000] {
        for metric in [DistanceMetric::SquaredEuclidean, DistanceMetric::Cosine] {
            let mut index = SimilarityIndex::new(Arc::new(HashingEmbedder::new(384)), metric);
            index.build(&menu(size)).expect("can build index");

            group.bench_with_input(
                BenchmarkId::new(metric.as_str(), size),
                &index,
                |b, index| b.iter(|| index.search(black_box("gin with lime"), black_box(5))),
            );
        }
    }
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
