use std::f64::consts::{FRAC_PI_2, PI, TAU};

use gwpe_core::RngHandle;
use gwpe_mcmc::{DimensionSpec, PriorKind, PriorSpace};
use proptest::prelude::*;

fn sky() -> PriorSpace {
    PriorSpace::new(vec![
        DimensionSpec::new("inc", 0.0, PI, PriorKind::Sin, false).unwrap(),
        DimensionSpec::new("beta", -FRAC_PI_2, FRAC_PI_2, PriorKind::Cos, false).unwrap(),
        DimensionSpec::new("psi", 0.0, PI, PriorKind::Uniform, true).unwrap(),
        DimensionSpec::new("phi0", 0.0, TAU, PriorKind::Uniform, true).unwrap(),
    ])
    .unwrap()
}

proptest! {
    #[test]
    fn wrapping_lands_in_range_and_is_idempotent(
        lo in -50.0f64..50.0,
        width in 0.1f64..20.0,
        x in -1.0e4f64..1.0e4,
    ) {
        let dim = DimensionSpec::new("angle", lo, lo + width, PriorKind::Uniform, true).unwrap();
        let once = dim.wrap_value(x);
        prop_assert!(once >= dim.lo && once < dim.hi, "{once} outside [{}, {})", dim.lo, dim.hi);
        prop_assert_eq!(dim.wrap_value(once), once);
    }

    #[test]
    fn wrapping_preserves_the_phase(x in -100.0f64..100.0) {
        let dim = DimensionSpec::new("phase", 0.0, TAU, PriorKind::Uniform, true).unwrap();
        let wrapped = dim.wrap_value(x);
        prop_assert!((wrapped.sin() - x.sin()).abs() < 1e-9);
        prop_assert!((wrapped.cos() - x.cos()).abs() < 1e-9);
    }

    #[test]
    fn non_periodic_values_pass_through(x in -10.0f64..10.0) {
        let dim = DimensionSpec::new("m", 0.0, 1.0, PriorKind::Uniform, false).unwrap();
        prop_assert_eq!(dim.wrap_value(x), x);
    }

    #[test]
    fn uniform_density_is_flat_inside_and_zero_outside(
        lo in -5.0f64..5.0,
        width in 0.5f64..10.0,
        u in 0.0f64..=1.0,
        excess in 1.0e-6f64..5.0,
    ) {
        let hi = lo + width;
        let inside = lo + u * width;
        let log = PriorKind::Uniform.log_density(inside, lo, hi);
        prop_assert!((log + width.ln()).abs() < 1e-12);
        prop_assert_eq!(PriorKind::Uniform.log_density(hi + excess, lo, hi), f64::NEG_INFINITY);
        prop_assert_eq!(PriorKind::Uniform.log_density(lo - excess, lo, hi), f64::NEG_INFINITY);
        prop_assert_eq!(PriorKind::Uniform.density(lo - excess, lo, hi), 0.0);
    }

    #[test]
    fn samples_have_finite_density(seed in any::<u64>()) {
        let space = sky();
        let mut rng = RngHandle::from_seed(seed);
        let point = space.sample(&mut rng);
        prop_assert_eq!(point.len(), 4);
        // The sin shape vanishes only on the poles.
        if point[0] > 0.0 && point[0] < PI {
            prop_assert!(space.log_density(&point).is_finite());
        }
        for (value, dim) in point.iter().zip(space.dims()) {
            prop_assert!(*value >= dim.lo && *value <= dim.hi);
        }
    }
}

#[test]
fn sin_and_cos_shapes_are_normalized() {
    let n = 20_000;
    for (kind, lo, hi) in [
        (PriorKind::Sin, 0.0, PI),
        (PriorKind::Cos, -FRAC_PI_2, FRAC_PI_2),
        (PriorKind::Sin, 0.2, 1.4),
    ] {
        let h = (hi - lo) / n as f64;
        let integral: f64 = (0..n)
            .map(|i| kind.density(lo + (i as f64 + 0.5) * h, lo, hi) * h)
            .sum();
        assert!((integral - 1.0).abs() < 1e-6, "{kind:?} integrates to {integral}");
    }
}

#[test]
fn sampled_histogram_follows_the_sin_shape() {
    let mut rng = RngHandle::from_seed(17);
    let n = 40_000;
    let upper_half = (0..n)
        .map(|_| PriorKind::Sin.sample(0.0, PI, &mut rng))
        .filter(|x| *x < FRAC_PI_2)
        .count();
    // The shape is symmetric about π/2.
    let fraction = upper_half as f64 / n as f64;
    assert!((fraction - 0.5).abs() < 0.01, "fraction {fraction}");

    let near_pole = (0..n)
        .map(|_| PriorKind::Sin.sample(0.0, PI, &mut rng))
        .filter(|x| *x < PI / 6.0)
        .count();
    // P(x < π/6) = (1 − cos(π/6)) / 2.
    let expected = (1.0 - (PI / 6.0).cos()) / 2.0;
    assert!((near_pole as f64 / n as f64 - expected).abs() < 0.01);
}

#[test]
fn product_density_matches_the_sum_of_logs() {
    let space = sky();
    let point = [1.0, 0.3, 2.0, 5.0];
    let expected: f64 = point
        .iter()
        .zip(space.dims())
        .map(|(x, dim)| dim.log_density(*x))
        .sum();
    assert!((space.log_density(&point) - expected).abs() < 1e-12);
    assert!((space.density(&point) - expected.exp()).abs() < 1e-12);
    // Periodic dimensions are evaluated after wrapping.
    let shifted = [1.0, 0.3, 2.0 + PI, 5.0 - TAU];
    assert!((space.log_density(&shifted) - expected).abs() < 1e-9);
    assert_eq!(space.log_density(&[-0.1, 0.3, 2.0, 5.0]), f64::NEG_INFINITY);
}
