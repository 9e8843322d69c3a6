//! Benchmarks for URL normalization, aggregation and a full fake-backed run.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use searchflow::core::{ExpandedQuerySet, Query};
use searchflow::pipeline::Pipeline;
use searchflow::stages::ResultAggregator;
use searchflow::testing::{graphene_fixture, hit, StaticSearchProvider, GRAPHENE_QUERY};
use searchflow::utils::normalize_url;
use std::sync::Arc;

fn normalize_benchmark(c: &mut Criterion) {
    c.bench_function("normalize_url", |b| {
        b.iter(|| {
            normalize_url(black_box(
                "HTTPS://Lab.Example:443/research/graphene/?q=1#results",
            ))
        })
    });
}

fn aggregate_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    let queries: Vec<String> = (0..5).map(|i| format!("query {i}")).collect();
    let mut provider = StaticSearchProvider::new();
    for (i, query) in queries.iter().enumerate() {
        // every other page overlaps with the previous query
        let hits = (0..10)
            .map(|j| hit(&format!("https://site{}.example/page", (i * 10 + j) / 2)))
            .collect();
        provider = provider.with_hits(query.as_str(), hits);
    }
    let aggregator = ResultAggregator::new(Arc::new(provider));

    let mut set = ExpandedQuerySet::new(&Query::new(queries[0].as_str()).unwrap(), queries.len());
    for query in &queries[1..] {
        set.try_push(query);
    }

    c.bench_function("aggregate_5x10", |b| {
        b.iter(|| runtime.block_on(aggregator.aggregate(black_box(&set), 10, 50)))
    });
}

fn pipeline_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();
    let fixture = graphene_fixture();
    let pipeline = Pipeline::builder()
        .search_provider(fixture.search.clone())
        .page_fetcher(fixture.fetcher.clone())
        .language_model(fixture.model.clone())
        .build()
        .unwrap();

    c.bench_function("pipeline_run_graphene", |b| {
        b.iter(|| runtime.block_on(pipeline.run(black_box(GRAPHENE_QUERY))).unwrap())
    });
}

criterion_group!(benches, normalize_benchmark, aggregate_benchmark, pipeline_benchmark);
criterion_main!(benches);
