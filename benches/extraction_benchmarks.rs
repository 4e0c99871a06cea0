// benches/extraction_benchmarks.rs
use criterion::{criterion_group, criterion_main, Criterion};
use std::{hint::black_box, sync::Arc, time::Duration};
use tokio::runtime::Runtime;

use aeo_scoring::domain::{PageContent, PageMetadata, ProjectContext};
use aeo_scoring::extractor::SignalExtractor;
use aeo_scoring::service::llm::DisabledLlm;
use aeo_scoring::service::{AeoScoringService, DomainResearchCache, RuleRegistry};
use aeo_scoring::ScoringConfig;

fn sample_page() -> String {
    let mut sections = String::new();
    for i in 0..40 {
        sections.push_str(&format!(
            "<h2>Section {i}</h2><p>Short sentence number {i}. Another line follows here. \
             See <a href=\"https://en.wikipedia.org/wiki/Item_{i}\">source {i}</a>.</p>\
             <ul><li>One</li><li>Two</li></ul>"
        ));
    }
    format!(
        r#"<html lang="en"><head><title>Benchmark article</title>
        <meta name="description" content="A long article used to measure signal extraction throughput.">
        <meta name="author" content="Jane Doe, PhD">
        <script type="application/ld+json">{{"@type":"BlogPosting","headline":"Benchmark"}}</script>
        </head><body><article><h1>Benchmark article</h1>{sections}</article></body></html>"#
    )
}

fn bench_extraction(c: &mut Criterion) {
    let html = sample_page();
    let extractor = SignalExtractor::default();
    let meta = PageMetadata::default();

    c.bench_function("extract_signals_40_sections", |b| {
        b.iter(|| black_box(extractor.extract(black_box(&html), &meta, "https://example.com/blog/bench")))
    });
    c.bench_function("clean_content_40_sections", |b| {
        b.iter(|| black_box(extractor.clean_content(black_box(&html))))
    });
}

fn bench_page_score(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let config = ScoringConfig::default();
    let registry = RuleRegistry::with_default_rules(&config, Arc::new(DomainResearchCache::new()));
    let service = AeoScoringService::new(Arc::new(config), Arc::new(registry));
    let page = PageContent::new("https://example.com/blog/bench", sample_page());
    let project = ProjectContext::brand("Example");

    c.bench_function("calculate_score_offline", |b| {
        b.to_async(&rt).iter(|| async {
            let score = service
                .calculate_score(&page.url, &page, &project, Arc::new(DisabledLlm))
                .await
                .expect("Failed");
            black_box(score)
        });
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .sample_size(20)
        .measurement_time(Duration::from_secs(5));
    targets = bench_extraction, bench_page_score
}

criterion_main!(benches);
