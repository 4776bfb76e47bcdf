use caremap::filter::{CategorySelection, TypeSelection};
use caremap::{
    BoundingBox, ClockTime, ClusterEngine, Config, CoreError, FilterCriteria, FilterEngine,
    MapFeature, Point, RatingCode, RawServiceRecord, RecordPoint, ServiceRecord, SpatialIndex,
    SpatialIndexBuilder,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_single_point_index() {
    let mut builder = SpatialIndexBuilder::new(1);
    builder.add(&Point::new(133.7751, -25.2744)).unwrap();
    let index = builder.finish();

    assert_eq!(index.len(), 1);
    assert_eq!(index.query(&BoundingBox::WORLD), vec![0]);
    assert_eq!(
        index.query(&BoundingBox::new(133.7751, -25.2744, 133.7751, -25.2744)),
        vec![0]
    );
    assert!(index.query(&BoundingBox::new(0.0, 0.0, 1.0, 1.0)).is_empty());

    let restored = SpatialIndex::from_bytes(&index.to_bytes(), 1).unwrap();
    assert_eq!(restored.query(&BoundingBox::WORLD), vec![0]);
}

#[test]
fn test_coincident_points_all_reported() {
    let mut builder = SpatialIndexBuilder::new(5);
    for _ in 0..5 {
        builder.add(&Point::new(10.0, 10.0)).unwrap();
    }
    let index = builder.finish();

    let mut ids = index.query(&BoundingBox::new(9.0, 9.0, 11.0, 11.0));
    ids.sort_unstable();
    assert_eq!(ids, vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_count_mismatch_is_distinct_from_malformed() {
    init_logging();
    let mut builder = SpatialIndexBuilder::new(10);
    for i in 0..10 {
        builder.add(&Point::new(f64::from(i), f64::from(i))).unwrap();
    }
    let index = builder.finish();
    let blob = index.to_bytes();

    // Wrong metadata count: integrity error carrying both lengths.
    match SpatialIndex::from_bytes(&blob, 11) {
        Err(CoreError::IndexCountMismatch {
            count, actual_len, ..
        }) => {
            assert_eq!(count, 11);
            assert_eq!(actual_len, blob.len());
        }
        other => panic!("expected count mismatch, got {other:?}"),
    }

    // Truncated blob with the right count: also a count mismatch, since
    // the length no longer matches.
    assert!(matches!(
        SpatialIndex::from_bytes(&blob[..blob.len() - 8], 10),
        Err(CoreError::IndexCountMismatch { .. })
    ));

    // Structural damage: malformed, not a count problem.
    let mut bad = blob.to_vec();
    bad[1] = 9; // unsupported version
    assert!(matches!(
        SpatialIndex::from_bytes(&bad, 10),
        Err(CoreError::MalformedIndex(_))
    ));
}

#[test]
fn test_cluster_zoom_clamping() {
    let engine = ClusterEngine::new(Config::default().with_min_points(2));
    let points: Vec<RecordPoint> = (0..30)
        .map(|i| RecordPoint::new(i, 133.0 + f64::from(i) * 1e-4, -25.0))
        .collect();
    engine.load(&points);

    let at_min = engine.get_clusters(&BoundingBox::WORLD, 0.0);
    assert_eq!(engine.get_clusters(&BoundingBox::WORLD, -7.0), at_min);

    let at_max = engine.get_clusters(&BoundingBox::WORLD, 13.0);
    assert_eq!(engine.get_clusters(&BoundingBox::WORLD, 99.0), at_max);
    assert_eq!(at_max.len(), 30);

    assert!(engine.get_clusters(&BoundingBox::WORLD, f64::NAN).is_empty());
}

#[test]
fn test_cluster_threshold_boundary() {
    // Exactly min_points merges; one fewer stays individual.
    let engine = ClusterEngine::new(Config::default().with_min_points(4));

    let at_threshold: Vec<RecordPoint> = (0..4)
        .map(|i| RecordPoint::new(i, 10.0 + f64::from(i) * 1e-5, 10.0))
        .collect();
    engine.load(&at_threshold);
    let features = engine.get_clusters(&BoundingBox::WORLD, 0.0);
    assert_eq!(features.len(), 1);
    assert!(matches!(features[0], MapFeature::Cluster { point_count: 4, .. }));

    let below: Vec<RecordPoint> = (0..3)
        .map(|i| RecordPoint::new(i, 10.0 + f64::from(i) * 1e-5, 10.0))
        .collect();
    engine.load(&below);
    let features = engine.get_clusters(&BoundingBox::WORLD, 0.0);
    assert_eq!(features.len(), 3);
    assert!(features.iter().all(|f| matches!(f, MapFeature::Point { .. })));
}

#[test]
fn test_cluster_query_with_inverted_bbox() {
    let engine = ClusterEngine::new(Config::default().with_min_points(2));
    engine.load(&[RecordPoint::new(0, 10.0, 10.0)]);

    let inverted = BoundingBox::new(11.0, 11.0, 9.0, 9.0);
    let features = engine.get_clusters(&inverted, 5.0);
    assert_eq!(features.len(), 1);
}

#[test]
fn test_end_of_day_hours() {
    let around_the_clock = ServiceRecord::from_raw(&RawServiceRecord {
        start_time: "00:00".into(),
        end_time: "24:00".into(),
        ..RawServiceRecord::default()
    });
    assert_eq!(around_the_clock.open, Some(ClockTime::MIDNIGHT));
    assert_eq!(around_the_clock.close, Some(ClockTime::END_OF_DAY));

    let mut criteria = FilterCriteria::accept_all();
    criteria.filter_by_hours = true;
    criteria.include_unknown_hours = false;
    criteria.hours = caremap::TimeRange {
        min: ClockTime::from_hm(0, 0).unwrap(),
        max: ClockTime::from_hm(24, 0).unwrap(),
    };

    let engine = FilterEngine::new(&Config::default());
    assert_eq!(engine.evaluate(&[around_the_clock], &criteria), vec![0]);
}

#[test]
fn test_filter_on_empty_dataset() {
    let engine = FilterEngine::new(&Config::default());
    assert!(engine.evaluate(&[], &FilterCriteria::accept_all()).is_empty());
    assert!(
        engine
            .evaluate_candidates(&[], &[0, 1, 2], &FilterCriteria::accept_all())
            .is_empty()
    );
}

#[test]
fn test_all_unknown_record_passes_only_fully_permissive_criteria() {
    let blank = ServiceRecord::from_raw(&RawServiceRecord::default());
    let records = vec![blank];
    let engine = FilterEngine::new(&Config::default());

    assert_eq!(engine.evaluate(&records, &FilterCriteria::accept_all()), vec![0]);

    // Flip each unknown gate off in turn; the blank record must drop out.
    let mut criteria = FilterCriteria::accept_all();
    criteria.overall_rating.include_unknown = false;
    assert!(engine.evaluate(&records, &criteria).is_empty());

    let mut criteria = FilterCriteria::accept_all();
    criteria.service_types = TypeSelection::of(["LDC"]);
    assert!(engine.evaluate(&records, &criteria).is_empty());

    let mut criteria = FilterCriteria::accept_all();
    criteria.include_unknown_capacity = false;
    assert!(engine.evaluate(&records, &criteria).is_empty());

    let mut criteria = FilterCriteria::accept_all();
    criteria.filter_by_hours = true;
    criteria.include_unknown_hours = false;
    assert!(engine.evaluate(&records, &criteria).is_empty());

    let mut criteria = FilterCriteria::accept_all();
    criteria.quality_areas[0] = CategorySelection::of([RatingCode::Meeting]);
    assert!(engine.evaluate(&records, &criteria).is_empty());
}

#[test]
fn test_candidate_cap_bounds_work() {
    init_logging();
    let records: Vec<ServiceRecord> = (0..100)
        .map(|_| ServiceRecord::from_raw(&RawServiceRecord::default()))
        .collect();
    let huge_candidate_list: Vec<u32> = (0..100).cycle().take(50_000).collect();

    let engine = FilterEngine::new(&Config::default().with_max_candidates(1_000));
    let ids = engine.evaluate_candidates(&records, &huge_candidate_list, &FilterCriteria::accept_all());
    assert_eq!(ids.len(), 1_000);
}
