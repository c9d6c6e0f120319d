use chrono::NaiveDate;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use table_reserve::{
    LocationZone, ReservationRequest, SeatingPreference, Table, TimeSlot,
    scoring::{self, TableScorer},
};

/// Build a floor of `n` tables cycling through zones and sizes
fn floor(n: u32) -> Vec<Table> {
    let zones = [
        LocationZone::Indoor,
        LocationZone::Outdoor,
        LocationZone::Bar,
        LocationZone::Private,
    ];
    let features = ["quiet", "window-view", "spacious", "business-friendly"];

    (1..=n)
        .map(|i| {
            Table::new(i64::from(i), i, 2 + (i % 5) * 2, zones[(i % 4) as usize])
                .with_features([features[(i % 4) as usize]])
        })
        .collect()
}

fn request() -> ReservationRequest {
    ReservationRequest::new(
        4,
        NaiveDate::from_ymd_opt(2030, 6, 1).unwrap(),
        TimeSlot::from_hm(19, 0).unwrap(),
    )
    .with_preference(SeatingPreference::Outdoor)
    .with_occasion("anniversary dinner")
}

/// Benchmark ranking a whole floor
fn bench_rank(c: &mut Criterion) {
    let mut group = c.benchmark_group("rank_tables");
    let request = request();

    for size in [10u32, 50, 200] {
        let tables = floor(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &tables, |b, tables| {
            b.iter(|| scoring::rank(black_box(tables), black_box(&request)));
        });
    }

    group.finish();
}

/// Benchmark picking only the best table
fn bench_best(c: &mut Criterion) {
    let tables = floor(50);
    let request = request();
    let scorer = TableScorer::default();

    c.bench_function("best_table_50", |b| {
        b.iter(|| scorer.best(black_box(&tables), black_box(&request)));
    });
}

/// Benchmark scoring one table, occasion matching included
fn bench_score_single(c: &mut Criterion) {
    let table = Table::new(1, 1, 4, LocationZone::Outdoor).with_features(["romantic", "window-view"]);
    let request = request();
    let scorer = TableScorer::default();

    c.bench_function("score_single_table", |b| {
        b.iter(|| scorer.score(black_box(&table), black_box(&request)));
    });
}

criterion_group!(benches, bench_rank, bench_best, bench_score_single);
criterion_main!(benches);
