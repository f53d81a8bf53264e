//! Benchmarks for index building and matching.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use taxomatch::config::{MatchOptions, MatcherConfig};
use taxomatch::index::{IndexBuilder, MemoryIndex};
use taxomatch::infer::CompiledNetwork;
use taxomatch::matcher::ClassificationMatcher;
use taxomatch::network::Network;
use taxomatch::record::{LinnaeanClassification, TaxonomicStatus};

const GENERA: [&str; 8] = [
    "Acacia", "Banksia", "Eucalyptus", "Grevillea", "Hakea", "Melaleuca", "Pultenaea", "Xanthorrhoea",
];
const EPITHETS: [&str; 8] = [
    "alba", "dealbata", "longifolia", "mearnsii", "parviflora", "rubra", "serrata", "viminalis",
];

fn compiled() -> Arc<CompiledNetwork> {
    Arc::new(CompiledNetwork::compile(Arc::new(Network::linnaean().unwrap())).unwrap())
}

fn corpus() -> Vec<LinnaeanClassification> {
    let mut records = vec![
        LinnaeanClassification::named("Plantae")
            .with_id("k")
            .with_rank("kingdom")
            .with_status(TaxonomicStatus::Accepted),
    ];
    for (g, genus) in GENERA.iter().enumerate() {
        let genus_id = format!("g{g}");
        records.push(
            LinnaeanClassification::named(*genus)
                .with_id(genus_id.clone())
                .with_rank("genus")
                .with_parent("k")
                .with_status(TaxonomicStatus::Accepted),
        );
        for (s, epithet) in EPITHETS.iter().enumerate() {
            records.push(
                LinnaeanClassification::named(format!("{genus} {epithet}"))
                    .with_id(format!("s{g}-{s}"))
                    .with_rank("species")
                    .with_parent(genus_id.clone())
                    .with_status(TaxonomicStatus::Accepted),
            );
        }
    }
    records
}

fn build(compiled: &Arc<CompiledNetwork>) -> MemoryIndex {
    let mut builder = IndexBuilder::new(Arc::clone(compiled));
    for record in corpus() {
        builder.add_classification(&record);
    }
    builder.build().unwrap()
}

fn bench_build(c: &mut Criterion) {
    let compiled = compiled();
    c.bench_function("index_build_73", |bench| {
        bench.iter(|| black_box(build(&compiled)))
    });
}

fn bench_exact(c: &mut Criterion) {
    let compiled = compiled();
    let index = build(&compiled);
    let matcher = ClassificationMatcher::new(compiled, index, MatcherConfig::default()).unwrap();
    let query = LinnaeanClassification::named("Banksia serrata");
    let options = MatchOptions::default();

    c.bench_function("match_exact", |bench| {
        bench.iter(|| black_box(matcher.find_match(&query, &options).unwrap()))
    });
}

fn bench_misspelled(c: &mut Criterion) {
    let compiled = compiled();
    let index = build(&compiled);
    let matcher = ClassificationMatcher::new(compiled, index, MatcherConfig::default()).unwrap();
    let query = LinnaeanClassification::named("Banksia serata");
    let options = MatchOptions::default();

    c.bench_function("match_misspelled", |bench| {
        bench.iter(|| black_box(matcher.find_match(&query, &options).unwrap()))
    });
}

criterion_group!(benches, bench_build, bench_exact, bench_misspelled);
criterion_main!(benches);
