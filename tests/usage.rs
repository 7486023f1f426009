use mdindex::{DataPoint, IndexError, IndexKind, QueryRange, SpatialIndex};

fn grid() -> Vec<DataPoint> {
    let mut points = Vec::new();
    for x in 0..10u32 {
        for y in 0..10u32 {
            points.push(DataPoint::new(
                vec![f64::from(x), f64::from(y)],
                u64::from(x * 10 + y),
            ));
        }
    }
    points
}

fn sorted_ids(points: &[DataPoint]) -> Vec<u64> {
    let mut ids = points.iter().map(DataPoint::id).collect::<Vec<_>>();
    ids.sort_unstable();
    ids
}

#[test]
fn basic_usage() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut index = IndexKind::KdTree.create();
    index.build(&grid()).unwrap();
    assert_eq!(index.len(), 100);
    assert_eq!(index.dimensions(), 2);

    // Query a box on the grid
    let range = QueryRange::new(vec![2.0, 3.0], vec![5.0, 7.0]).unwrap();
    let found = index.query(&range).unwrap();

    // 4 x-values times 5 y-values
    assert_eq!(found.len(), 20);
    assert!(found.iter().all(|point| range.contains(point)));
}

#[test]
fn grid_box_for_every_index() {
    let range = QueryRange::new(vec![2.0, 3.0], vec![5.0, 7.0]).unwrap();
    let expected = (2..=5u64)
        .flat_map(|x| (3..=7u64).map(move |y| x * 10 + y))
        .collect::<Vec<_>>();

    for kind in IndexKind::ALL {
        let mut index = kind.create();
        index.build(&grid()).unwrap();
        let found = index.query(&range).unwrap();
        assert_eq!(sorted_ids(&found), expected, "{}", index.name());
    }
}

#[test]
fn empty_dataset() {
    for kind in IndexKind::ALL {
        let mut index = kind.create();
        index.build(&[]).unwrap();
        assert!(index.is_empty());
        assert!(index.size_mb() >= 0.0);
        assert!(index.build_time_ms() >= 0.0);

        for dims in 1..4 {
            let range = QueryRange::new(vec![-1e9; dims], vec![1e9; dims]).unwrap();
            assert!(index.query(&range).unwrap().is_empty());
        }
    }
}

#[test]
fn boundaries_are_inclusive() {
    let points = vec![
        DataPoint::new(vec![1.0, 1.0, 1.0], 0),
        DataPoint::new(vec![2.0, 2.0, 2.0], 1),
        DataPoint::new(vec![1.0, 2.0, 1.5], 2),
        DataPoint::new(vec![2.0 + 1e-9, 1.5, 1.5], 3),
    ];
    let range = QueryRange::new(vec![1.0, 1.0, 1.0], vec![2.0, 2.0, 2.0]).unwrap();
    let corner = QueryRange::new(vec![2.0, 2.0, 2.0], vec![2.0, 2.0, 2.0]).unwrap();

    for kind in IndexKind::ALL {
        let mut index = kind.create();
        index.build(&points).unwrap();
        assert_eq!(sorted_ids(&index.query(&range).unwrap()), vec![0, 1, 2], "{kind}");
        assert_eq!(sorted_ids(&index.query(&corner).unwrap()), vec![1], "{kind}");
    }
}

#[test]
fn inverted_range_matches_nothing() {
    let range = QueryRange::new(vec![5.0, 0.0], vec![2.0, 9.0]).unwrap();
    for kind in IndexKind::ALL {
        let mut index = kind.create();
        index.build(&grid()).unwrap();
        assert!(index.query(&range).unwrap().is_empty(), "{kind}");
    }
}

#[test]
fn dimension_mismatch() {
    let range = QueryRange::new(vec![0.0; 3], vec![1.0; 3]).unwrap();
    for kind in IndexKind::ALL {
        let mut index = kind.create();
        index.build(&grid()).unwrap();
        assert!(
            matches!(
                index.query(&range),
                Err(IndexError::DimensionMismatch {
                    expected: 2,
                    found: 3
                })
            ),
            "{kind}"
        );

        // A failed build keeps the previous contents.
        let mixed = vec![DataPoint::new(vec![0.0], 0), DataPoint::new(vec![0.0, 1.0], 1)];
        assert!(index.build(&mixed).is_err());
        assert_eq!(index.len(), 100, "{kind}");
        assert_eq!(index.dimensions(), 2, "{kind}");
    }
}

#[test]
fn duplicate_points_are_all_returned() {
    let points = (0..50)
        .map(|id| DataPoint::new(vec![3.0, 4.0], id))
        .chain((50..60).map(|id| DataPoint::new(vec![7.0, 7.0], id)))
        .collect::<Vec<_>>();
    let range = QueryRange::new(vec![3.0, 4.0], vec![3.0, 4.0]).unwrap();
    for kind in IndexKind::ALL {
        let mut index = kind.create();
        index.build(&points).unwrap();
        assert_eq!(index.query(&range).unwrap().len(), 50, "{kind}");
    }
}

#[test]
fn non_finite_coordinates_are_rejected() {
    let with_nan = vec![
        DataPoint::new(vec![0.0, 5.0], 0),
        DataPoint::new(vec![1.0, f64::NAN], 1),
        DataPoint::new(vec![2.0, 1.0], 2),
        DataPoint::new(vec![3.0, 1.0], 3),
    ];
    let with_infinity = vec![
        DataPoint::new(vec![0.0, 0.0], 0),
        DataPoint::new(vec![f64::INFINITY, 1.0], 1),
    ];

    for kind in IndexKind::ALL {
        let mut index = kind.create();
        index.build(&grid()).unwrap();

        assert!(
            matches!(
                index.build(&with_nan),
                Err(IndexError::NonFiniteCoordinate { id: 1, dim: 1 })
            ),
            "{kind}"
        );
        assert!(
            matches!(
                index.build(&with_infinity),
                Err(IndexError::NonFiniteCoordinate { id: 1, dim: 0 })
            ),
            "{kind}"
        );

        // The grid survives both failed builds.
        assert_eq!(index.len(), 100, "{kind}");
        let range = QueryRange::new(vec![0.0, 0.0], vec![3.0, 1.0]).unwrap();
        assert_eq!(index.query(&range).unwrap().len(), 8, "{kind}");
    }
}

#[test]
fn scan_reports_examined_candidates() {
    let range = QueryRange::new(vec![2.0, 3.0], vec![5.0, 7.0]).unwrap();
    for kind in IndexKind::ALL {
        let mut index = kind.create();
        index.build(&grid()).unwrap();
        let scan = index.scan(&range).unwrap();
        assert_eq!(scan.points.len(), 20, "{kind}");
        assert!(scan.scanned >= scan.points.len(), "{kind}");
        assert!(scan.scanned <= 100, "{kind}");
        assert_eq!(sorted_ids(&scan.points), sorted_ids(&index.query(&range).unwrap()));

        let mut empty = kind.create();
        empty.build(&[]).unwrap();
        assert_eq!(empty.scan(&range).unwrap().scanned, 0, "{kind}");
    }
}
