//! Benchmarks for script ordering and update analysis.
//!
//! ```bash
//! cargo bench --bench script_updates
//! ```

use chrono::Utc;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use strata::migrate::{
    ExecutedScript, MigrationConfig, QualifierFilter, ScriptFactory, ScriptIndexes,
    ScriptRepository, ScriptSource, ScriptUpdatesAnalyzer,
};

/// `count` indexed scripts in folders of ten, plus a few repeatable ones.
fn sources(count: usize) -> Vec<(String, ScriptSource)> {
    let mut sources = (0..count)
        .map(|i| {
            let path = format!("{:03}_release/{:02}_change.sql", i / 10 + 1, i % 10 + 1);
            let source = ScriptSource::new(path, 1_000, format!("UPDATE t SET v = {i};\n"));
            ("bench".to_string(), source)
        })
        .collect::<Vec<_>>();
    for i in 0..count / 10 {
        let source = ScriptSource::new(format!("views/v_{i}.sql"), 1_000, "CREATE VIEW v AS SELECT 1;\n");
        sources.push(("bench".to_string(), source));
    }
    sources
}

fn repository(config: &MigrationConfig, count: usize) -> ScriptRepository {
    let factory = ScriptFactory::new(&config.scripts).unwrap();
    let filter = QualifierFilter::new(
        &config.scripts.registered_qualifiers(),
        &config.scripts.included_qualifiers,
        &config.scripts.excluded_qualifiers,
    )
    .unwrap();
    ScriptRepository::build(&factory, &filter, &config.databases, sources(count)).unwrap()
}

fn bench_index_ordering(c: &mut Criterion) {
    let indexes = (0..1000)
        .map(|i| format!("{}.{}.x", i % 37, i % 11).parse::<ScriptIndexes>().unwrap())
        .collect::<Vec<_>>();

    c.bench_function("indexes/sort_1000", |b| {
        b.iter(|| {
            let mut sorted = indexes.clone();
            sorted.sort();
            black_box(sorted)
        })
    });
}

fn bench_repository_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("repository/build");
    let config = MigrationConfig::default();

    for count in [100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| repository(&config, black_box(count)))
        });
    }

    group.finish();
}

fn bench_analyze(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyzer/analyze");
    let config = MigrationConfig::default();

    for count in [100, 1000] {
        let repo = repository(&config, count);
        // history holds the first 90% of the indexed scripts
        let executed = repo
            .indexed_scripts()
            .iter()
            .take(count * 9 / 10)
            .map(|s| ExecutedScript::new(s.clone(), Utc::now(), true))
            .collect::<Vec<_>>();

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| ScriptUpdatesAnalyzer::new(black_box(&repo), &executed, false, false).analyze())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_index_ordering, bench_repository_build, bench_analyze);
criterion_main!(benches);
