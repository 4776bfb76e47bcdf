use caremap::{
    BoundingBox, ClusterEngine, Config, FilterCriteria, FilterEngine, Point, RawServiceRecord,
    RecordPoint, ServiceRecord, SpatialIndex, SpatialIndexBuilder,
};
use criterion::{Criterion, black_box, criterion_group, criterion_main};

/// Deterministic lon/lat generator shared by all benchmarks.
fn scatter(count: u32) -> Vec<(f64, f64)> {
    (0..count)
        .map(|i| {
            let f = f64::from(i);
            (
                ((f * 97.13).sin() * 0.5 + 0.5) * 40.0 + 113.0,
                ((f * 53.71).cos() * 0.5 + 0.5) * 34.0 - 44.0,
            )
        })
        .collect()
}

fn build_index(points: &[(f64, f64)]) -> SpatialIndex {
    let mut builder = SpatialIndexBuilder::new(points.len());
    for &(lon, lat) in points {
        builder.add(&Point::new(lon, lat)).unwrap();
    }
    builder.finish()
}

fn benchmark_spatial_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("spatial_index");

    let points = scatter(20_000);

    group.bench_function("build_20k", |b| b.iter(|| build_index(black_box(&points))));

    let index = build_index(&points);
    let viewport = BoundingBox::new(150.0, -35.0, 152.0, -33.0);
    group.bench_function("query_viewport_20k", |b| {
        b.iter(|| index.query(black_box(&viewport)))
    });

    group.bench_function("serialize_20k", |b| b.iter(|| index.to_bytes()));

    let blob = index.to_bytes();
    group.bench_function("deserialize_20k", |b| {
        b.iter(|| SpatialIndex::from_bytes(black_box(&blob), points.len()).unwrap())
    });

    group.finish();
}

fn benchmark_clustering(c: &mut Criterion) {
    let mut group = c.benchmark_group("clustering");
    group.sample_size(20);

    let points: Vec<RecordPoint> = scatter(20_000)
        .into_iter()
        .enumerate()
        .map(|(i, (lon, lat))| RecordPoint::new(i as u32, lon, lat))
        .collect();

    group.bench_function("load_20k", |b| {
        b.iter(|| {
            let engine = ClusterEngine::new(Config::default());
            engine.load(black_box(&points));
            engine
        })
    });

    let engine = ClusterEngine::new(Config::default());
    engine.load(&points);
    let viewport = BoundingBox::new(140.0, -40.0, 155.0, -30.0);
    group.bench_function("get_clusters_zoom_5", |b| {
        b.iter(|| engine.get_clusters(black_box(&viewport), 5.0))
    });

    group.finish();
}

fn benchmark_filtering(c: &mut Criterion) {
    let mut group = c.benchmark_group("filtering");

    let records: Vec<ServiceRecord> = scatter(20_000)
        .into_iter()
        .enumerate()
        .map(|(i, (lon, lat))| {
            ServiceRecord::from_raw(&RawServiceRecord {
                latitude: lat.to_string(),
                longitude: lon.to_string(),
                rating: ["E", "X", "M", "W", "S", ""][i % 6].to_string(),
                service_type: ["LDC", "PRE;OSHC", "FDC", ""][i % 4].to_string(),
                places: if i % 5 == 0 {
                    String::new()
                } else {
                    ((i % 200) + 10).to_string()
                },
                start_time: "07:30".to_string(),
                end_time: "18:00".to_string(),
                ..RawServiceRecord::default()
            })
        })
        .collect();

    let engine = FilterEngine::new(&Config::default());
    let criteria = FilterCriteria::accept_all_with_types(["LDC", "PRE", "OSHC", "FDC"]);

    group.bench_function("evaluate_20k", |b| {
        b.iter(|| engine.evaluate(black_box(&records), black_box(&criteria)))
    });

    let candidates: Vec<u32> = (0..records.len() as u32).collect();
    group.bench_function("evaluate_candidates_20k", |b| {
        b.iter(|| engine.evaluate_candidates(&records, black_box(&candidates), &criteria))
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_spatial_index,
    benchmark_clustering,
    benchmark_filtering
);
criterion_main!(benches);
