//! Property tests for `LinearScale`.
//!
//! 1. `to_domain(to_range(x)) == x` inside the domain, endpoints included
//! 2. Clamped scales never leave the range
//! 3. `clamp_to_domain` output is always contained in the domain

use proptest::prelude::*;
use statlab_core::LinearScale;

fn bound() -> impl Strategy<Value = f64> {
    -1.0e4f64..1.0e4
}

/// Non-degenerate `(lo, hi)` pair, possibly reversed.
fn interval() -> impl Strategy<Value = (f64, f64)> {
    (bound(), 1.0f64..1.0e4, any::<bool>())
        .prop_map(|(lo, width, reversed)| {
            if reversed { (lo + width, lo) } else { (lo, lo + width) }
        })
}

fn tol(scale: &LinearScale) -> f64 {
    let (a, b) = scale.domain();
    1e-9 * (1.0 + a.abs().max(b.abs()))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn round_trip_inside_domain(
        domain in interval(),
        range in interval(),
        t in 0.0f64..=1.0,
        clamp in any::<bool>(),
    ) {
        let scale = LinearScale::new(domain, range).unwrap().clamped(clamp);
        let x = domain.0 + t * (domain.1 - domain.0);
        let back = scale.to_domain(scale.to_range(x));
        prop_assert!((back - x).abs() <= tol(&scale), "x={} back={}", x, back);
    }

    #[test]
    fn round_trip_endpoints(domain in interval(), range in interval()) {
        let scale = LinearScale::new(domain, range).unwrap();
        for x in [domain.0, domain.1] {
            let back = scale.to_domain(scale.to_range(x));
            prop_assert!((back - x).abs() <= tol(&scale));
        }
    }

    #[test]
    fn clamped_scale_stays_in_range(
        domain in interval(),
        range in interval(),
        x in -1.0e6f64..1.0e6,
    ) {
        let scale = LinearScale::new(domain, range).unwrap().clamped(true);
        let y = scale.to_range(x);
        let (lo, hi) = if range.0 <= range.1 { range } else { (range.1, range.0) };
        prop_assert!(y >= lo - 1e-9 && y <= hi + 1e-9);
    }

    #[test]
    fn clamp_to_domain_is_contained(
        domain in interval(),
        x in -1.0e6f64..1.0e6,
    ) {
        let scale = LinearScale::new(domain, (0.0, 1.0)).unwrap();
        prop_assert!(scale.contains(scale.clamp_to_domain(x)));
    }
}
