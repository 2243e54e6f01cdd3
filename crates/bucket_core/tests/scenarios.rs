use bucket_core::numerics::linspace;
use bucket_core::{Bucket, BucketError, BunchQuantity, Contour, PhysicalParameters};

fn params() -> PhysicalParameters {
    PhysicalParameters::new(0.9, 1e9, 1e-3)
}

fn parabola_bucket() -> Bucket {
    let time = linspace(-1.0, 1.0, 1000);
    let well = time.iter().map(|t| 100.0 * t * t).collect();
    Bucket::new(time, well, params()).expect("bucket should build")
}

fn gaussian_dips_bucket() -> Bucket {
    let time = linspace(-1.0, 1.0, 1000);
    let well = time
        .iter()
        .map(|t| {
            let dip = |c: f64| 30.0 * (-(t - c) * (t - c) / (2.0 * 0.2 * 0.2)).exp();
            100.0 * t * t - dip(-0.3) - dip(0.3)
        })
        .collect();
    Bucket::new(time, well, params()).expect("bucket should build")
}

#[test]
fn parabola_geometry_is_finite_and_positive() {
    let bucket = parabola_bucket();
    for value in [bucket.half_height(), bucket.area(), bucket.length()] {
        assert!(value.is_finite() && value > 0.0, "value {value}");
    }
    let expected_height = (100.0 * params().hamiltonian_factor()).sqrt();
    assert!((bucket.half_height() - expected_height).abs() / expected_height < 1e-5);
    // The separatrix of a parabola is an ellipse with semi-axes 1 and the half-height.
    let expected_area = std::f64::consts::PI * expected_height;
    assert!((bucket.area() - expected_area).abs() / expected_area < 1e-3);
}

#[test]
fn half_height_bunch_is_shorter_than_bucket() {
    let mut bucket = parabola_bucket();
    let target = bucket.half_height() / 2.0;
    let bunch = bucket.set_bunch_height(target).expect("bunch should match");
    let length = bunch.length;
    assert!(length < bucket.length());
    assert_eq!(bucket.bunch_length(), Some(length));
}

#[test]
fn single_well_has_no_sub_buckets() {
    let bucket = parabola_bucket();
    assert!(!bucket.has_subs());
    assert!(bucket.inner_wells().is_empty());
}

#[test]
fn two_dips_become_two_root_sub_buckets() {
    let bucket = gaussian_dips_bucket();
    assert!(bucket.has_subs());
    let subs = bucket.sub_buckets();
    assert_eq!(subs.len(), 2);
    assert!(subs.iter().all(|s| s.is_sub() && !s.has_subs()));
    assert!(subs[0].center() < 0.0 && subs[1].center() > 0.0);
    assert!(subs[0].loaded().stop() <= subs[1].loaded().start() + 1e-12);
}

#[test]
fn three_level_nesting_attaches_innermost_to_middle() {
    // Walls at 12 split the bucket in two; lower walls split each half again.
    let time: Vec<f64> = (0..11).map(|i| i as f64).collect();
    let well = vec![20.0, 15.0, 12.0, 4.0, 6.0, 2.0, 12.0, 8.0, 10.0, 5.0, 20.0];
    let bucket = Bucket::new(time, well, params()).expect("bucket should build");

    let roots = bucket.sub_buckets();
    assert_eq!(roots.len(), 2, "roots {:?}", intervals(roots));
    let middle = &roots[0];
    assert_eq!(middle.sub_buckets().len(), 2);
    assert!(middle.sub_buckets().iter().all(|c| !c.has_subs()));

    let middle_interval = middle.loaded().interval();
    for child in middle.sub_buckets() {
        let (start, stop) = child.loaded().interval();
        assert!(start >= middle_interval.0 && stop <= middle_interval.1);
    }
    for root in roots {
        let (start, stop) = root.loaded().interval();
        for child in middle.sub_buckets() {
            assert_ne!(child.loaded().interval(), (start, stop));
        }
    }
}

fn intervals(buckets: &[Bucket]) -> Vec<(f64, f64)> {
    buckets.iter().map(|b| b.loaded().interval()).collect()
}

#[test]
fn zero_targets_return_degenerate_outline() {
    let bucket = parabola_bucket();
    assert_eq!(bucket.outline_from_height(0.0).expect("height"), Contour::zero());
    assert_eq!(bucket.outline_from_length(0.0).expect("length"), Contour::zero());
    assert_eq!(
        bucket.outline_from_emittance(0.0).expect("emittance"),
        Contour::zero()
    );
}

#[test]
fn overlong_bunch_is_out_of_range() {
    let mut bucket = parabola_bucket();
    let err = bucket
        .set_bunch_length(bucket.length() * 1.5)
        .expect_err("expected out of range");
    match err {
        BucketError::TargetOutOfRange {
            quantity,
            target,
            capacity,
        } => {
            assert_eq!(quantity, BunchQuantity::Length);
            assert_eq!(target, 3.0);
            assert!((capacity - 2.0).abs() < 1e-12);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(bucket.bunch().is_none());
}

#[test]
fn full_length_outline_matches_bucket_length() {
    let bucket = parabola_bucket();
    let outline = bucket
        .outline_from_length(bucket.length())
        .expect("outline should match");
    assert!((outline.length() - bucket.length()).abs() / bucket.length() < 1e-6);
}

#[test]
fn length_outline_round_trips() {
    let bucket = parabola_bucket();
    for target in [0.25, 0.9, 1.6] {
        let outline = bucket.outline_from_length(target).expect("outline should match");
        let again = bucket
            .outline_from_length(outline.length())
            .expect("outline should match");
        assert!((outline.length() - target).abs() / target < 1e-6);
        assert!((again.length() - target).abs() / target < 1e-6);
    }
}

#[test]
fn full_emittance_outline_matches_bucket_area() {
    let bucket = parabola_bucket();
    let outline = bucket
        .outline_from_emittance(bucket.area())
        .expect("outline should match");
    assert!((outline.area() - bucket.area()).abs() / bucket.area() < 1e-3);
}

#[test]
fn sub_bucket_bunches_are_matched_independently() {
    let mut bucket = gaussian_dips_bucket();
    let mut sub = bucket.sub_buckets()[0].clone();
    let target = 0.5 * sub.area();
    let sub_length = sub.length();
    let bunch = sub.set_bunch_emittance(target).expect("bunch should match");
    assert!((bunch.emittance - target).abs() / target < 1e-3);
    assert!(bunch.length < sub_length);

    let top = bucket.set_bunch_emittance(target).expect("bunch should match");
    assert!(top.length > 0.0);
}
