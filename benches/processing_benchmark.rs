use chrono::{Days, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use solar_pipeline::models::{Cell, ObservationKey, ObservationRow, ObservationTable};
use solar_pipeline::processors::{FeatureEngineer, JoinEngine, LagStrategy};
use solar_pipeline::readers::extract_coordinates;

// Grid of points over Panama, one row per point and day
fn create_source(name: &str, columns: &[&str], points: usize, days: usize) -> ObservationTable {
    let base_date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    let mut rows = Vec::with_capacity(points * days);

    for point in 0..points {
        let lon = -82.0 + (point % 50) as f64 * 0.1;
        let lat = 7.5 + (point / 50) as f64 * 0.1;
        for day in 0..days {
            let date = base_date.checked_add_days(Days::new(day as u64)).unwrap();
            let key = ObservationKey::from_degrees(lon, lat, date).unwrap();
            let values = (0..columns.len())
                .map(|i| Cell::Number(100.0 + (point + day + i) as f64))
                .collect();
            rows.push(ObservationRow::new(key, values));
        }
    }

    ObservationTable::new(name, columns.iter().map(|c| c.to_string()).collect())
        .with_rows(rows)
        .unwrap()
}

fn create_sources(points: usize, days: usize) -> [ObservationTable; 3] {
    [
        create_source(
            "a",
            &["Cloud_Cover_Mean_24h", "temperature_2m", ".geo"],
            points,
            days,
        ),
        create_source(
            "b",
            &["relative_humidity", "temperature_2m", "surface_pressure", ".geo"],
            points,
            days,
        ),
        create_source(
            "c",
            &[
                "temperature_2m_C",
                "total_precipitation_sum",
                "surface_pressure",
                "elevation",
                "surface_net_solar_radiation_sum",
            ],
            points,
            days,
        ),
    ]
}

fn benchmark_join_engine(c: &mut Criterion) {
    let [a, b, source_c] = create_sources(100, 30);
    let engine = JoinEngine::new();

    c.bench_function("join_all_3000_rows", |bench| {
        bench.iter(|| {
            let merged = engine.join_all(&a, &b, &source_c).unwrap();
            black_box(merged.len())
        })
    });
}

fn benchmark_feature_engineer(c: &mut Criterion) {
    let [a, b, source_c] = create_sources(100, 30);
    let merged = JoinEngine::new().join_all(&a, &b, &source_c).unwrap();

    let mut group = c.benchmark_group("feature_engineer");
    for strategy in [LagStrategy::PartitionByLocation, LagStrategy::RowShift] {
        let engineer = FeatureEngineer::new().with_lag_strategy(strategy);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{:?}", strategy)),
            &merged,
            |bench, table| {
                bench.iter(|| {
                    let features = engineer.engineer_table(table).unwrap();
                    black_box(features.len())
                })
            },
        );
    }
    group.finish();
}

fn benchmark_geometry_extraction(c: &mut Criterion) {
    let geometries = [
        r#"{"type":"Point","coordinates":[-79.5,8.98]}"#,
        r#""{""type"":""Point"",""coordinates"":[-79.5123456789,8.98]}""#,
        "{'type': 'Point', 'coordinates': (-79.5, 8.98,), 'geodesic': False}",
        "not a geometry",
    ];

    c.bench_function("extract_coordinates", |bench| {
        bench.iter(|| {
            for geometry in &geometries {
                black_box(extract_coordinates(black_box(geometry)));
            }
        })
    });
}

fn benchmark_varying_data_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_and_features_by_size");

    for points in [10, 100, 500] {
        let [a, b, source_c] = create_sources(points, 30);
        group.bench_with_input(BenchmarkId::from_parameter(points), &points, |bench, _| {
            bench.iter(|| {
                let merged = JoinEngine::new().join_all(&a, &b, &source_c).unwrap();
                let features = FeatureEngineer::new().engineer_table(&merged).unwrap();
                black_box(features.len())
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_join_engine,
    benchmark_feature_engineer,
    benchmark_geometry_extraction,
    benchmark_varying_data_sizes
);
criterion_main!(benches);
