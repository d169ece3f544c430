//! Property-based checks of the fitting core.

use approx::assert_relative_eq;
use proptest::prelude::*;

use growth_curves::data::blank_trace;
use growth_curves::domain::ManualLikeParams;
use growth_curves::fit::{candidate_region, detect_phase, doubling_time};
use growth_curves::math::Uncertain;
use growth_curves::models::modified_gompertz;

fn trace(n: usize, a: f64, mu: f64, l: f64) -> (Vec<f64>, Vec<f64>) {
    let t: Vec<f64> = (0..n).map(|i| i as f64 * 0.25).collect();
    let y = t.iter().map(|&x| 0.01 * modified_gompertz(x, a, mu, l).exp()).collect();
    (t, y)
}

fn maybe_value() -> impl Strategy<Value = Option<f64>> {
    prop_oneof![1 => Just(None), 4 => (-1.0f64..2.0).prop_map(Some)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_blanking_subtracts_the_blank_mean(
        rows in prop::collection::vec(prop::collection::vec(maybe_value(), 12), 2..5),
    ) {
        let times: Vec<f64> = (0..12).map(|i| i as f64).collect();
        let (sample, blanks) = rows.split_first().unwrap();
        let blank_refs: Vec<&[Option<f64>]> = blanks.iter().map(|b| b.as_slice()).collect();
        let out = blank_trace(&times, sample, &blank_refs).unwrap();

        let mut k = 0;
        for i in 0..times.len() {
            let present: Vec<f64> = blanks.iter().filter_map(|b| b[i]).collect();
            match (sample[i], present.is_empty()) {
                (Some(v), false) => {
                    let mean = present.iter().sum::<f64>() / present.len() as f64;
                    prop_assert_eq!(out.index[k], i);
                    prop_assert_eq!(out.t[k], times[i]);
                    prop_assert!((out.y[k] - (v - mean)).abs() < 1e-12);
                    k += 1;
                }
                _ => prop_assert!(!out.index.contains(&i)),
            }
        }
        prop_assert_eq!(k, out.len());
    }

    #[test]
    fn prop_doubling_time_matches_growth_rate(mu in 0.01f64..3.0, sd in 0.0f64..0.2) {
        let dt = doubling_time(&Uncertain::new(mu, sd));
        assert_relative_eq!(dt.value(), std::f64::consts::LN_2 / mu, max_relative = 1e-12);
        assert_relative_eq!(dt.std_dev(), std::f64::consts::LN_2 * sd / (mu * mu), max_relative = 1e-9, epsilon = 1e-15);
    }

    #[test]
    fn prop_manual_like_is_deterministic(a in 2.0f64..5.0, mu in 0.3f64..1.2, l in 1.0f64..4.0) {
        let (t, y) = trace(80, a, mu, l);
        let params = ManualLikeParams::default();
        let first = detect_phase(&t, &y, &params);
        let second = detect_phase(&t, &y, &params);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_lower_slope_range_never_narrows_the_region(
        a in 2.0f64..5.0,
        mu in 0.3f64..1.2,
        l in 1.0f64..4.0,
        lo in 0.05f64..0.9,
        gap in 0.01f64..0.5,
    ) {
        let (_, y) = trace(80, a, mu, l);
        let hi = (lo + gap).min(0.95);
        let wide = candidate_region(&y, 10, lo);
        let narrow = candidate_region(&y, 10, hi);
        if let (Ok((ws, we)), Ok((ns, ne))) = (wide, narrow) {
            prop_assert!(ws <= ns);
            prop_assert!(we >= ne);
            prop_assert!(we - ws >= ne - ns);
        }
    }
}
