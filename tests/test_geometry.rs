use s1stack::core::burst_grid::{BurstGrid, SceneBurstGrid};
use s1stack::core::geometry::{
    aoi_contained, burst_alignment_distance, burst_counts_match, is_aligned, point_in_any_subswath,
    point_in_rectangle,
};
use s1stack::{Aoi, Point, Rectangle, StackError};

fn scene(offset: f64, counts: [usize; 3]) -> SceneBurstGrid {
    let footprints = [
        Rectangle::new(Point::new(17.0, 46.0), Point::new(18.0, 48.0)),
        Rectangle::new(Point::new(17.8, 46.0), Point::new(19.0, 48.0)),
        Rectangle::new(Point::new(18.8, 46.0), Point::new(20.0, 48.0)),
    ];

    let grid = |iw: usize| {
        let times: Vec<f64> = (0..counts[iw]).map(|i| 1000.0 + 2.75 * i as f64 + offset).collect();
        BurstGrid::new(&times, footprints[iw]).unwrap()
    };

    [grid(0), grid(1), grid(2)]
}

#[test]
fn test_interior_points_are_contained() {
    let r = Rectangle::new(Point::new(-10.0, -5.0), Point::new(10.0, 5.0));

    for i in 1..20 {
        for j in 1..10 {
            let p = Point::new(-10.0 + i as f64, -5.0 + j as f64);
            assert!(point_in_rectangle(&p, &r), "{:?} should be inside", p);
        }
    }

    for i in 0..=20 {
        let x = -10.0 + i as f64;
        assert!(!point_in_rectangle(&Point::new(x, -5.0), &r));
        assert!(!point_in_rectangle(&Point::new(x, 5.0), &r));
    }
}

#[test]
fn test_aoi_needs_every_corner() {
    let grids = scene(0.0, [9, 9, 9]);
    let inside = Aoi::from_bounds(17.2, 19.8, 46.2, 47.8);
    assert!(aoi_contained(&inside, &grids));

    for corner in 0..4 {
        let mut aoi = inside;
        aoi.0[corner] = Point::new(30.0, 47.0);
        assert!(!aoi_contained(&aoi, &grids), "corner {} outside must reject", corner);
        assert!(!point_in_any_subswath(&aoi.0[corner], &grids));
    }
}

#[test]
fn test_alignment_distance() {
    let master = scene(0.0, [9, 9, 10]);

    assert_eq!(burst_alignment_distance(&master, &master).unwrap(), 0.0);

    // 28 bursts shifted by 0.05 s each
    let close = scene(0.05, [9, 9, 10]);
    let d = burst_alignment_distance(&master, &close).unwrap();
    assert!((d - (28.0f64 * 0.0025).sqrt()).abs() < 1e-9);
    assert!(is_aligned(d));

    let far = scene(1.0, [9, 9, 10]);
    assert!(!is_aligned(burst_alignment_distance(&master, &far).unwrap()));
}

#[test]
fn test_count_mismatch_is_an_error() {
    let master = scene(0.0, [9, 9, 9]);

    for iw in 0..3 {
        let mut counts = [9, 9, 9];
        counts[iw] = 8;
        let other = scene(0.0, counts);

        assert!(!burst_counts_match(&master, &other));
        match burst_alignment_distance(&master, &other) {
            Err(StackError::BurstCountMismatch { swath, .. }) => assert_eq!(swath, iw + 1),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
