use lattica_core::value::DEFAULT_DISCOUNT;
use lattica_core::{evaluate, top_value, top_value_with_cycles, Accumulator, ValueKind};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Limit values are always bracketed by the extremes, and the
    /// limit-average band sits inside the limit band.
    #[test]
    fn test_value_ordering_law(weights in prop::collection::vec(-100.0f64..100.0, 1..200)) {
        let inf = evaluate(ValueKind::Inf, &weights).unwrap();
        let sup = evaluate(ValueKind::Sup, &weights).unwrap();
        let lim_inf = evaluate(ValueKind::LimInf, &weights).unwrap();
        let lim_sup = evaluate(ValueKind::LimSup, &weights).unwrap();
        let lim_inf_avg = evaluate(ValueKind::LimInfAvg, &weights).unwrap();
        let lim_sup_avg = evaluate(ValueKind::LimSupAvg, &weights).unwrap();

        prop_assert!(inf <= lim_inf + 1e-12);
        prop_assert!(lim_inf <= lim_inf_avg + 1e-12);
        prop_assert!(lim_inf_avg <= lim_sup_avg + 1e-12);
        prop_assert!(lim_sup_avg <= lim_sup + 1e-12);
        prop_assert!(lim_sup <= sup + 1e-12);
    }

    #[test]
    fn test_sum_and_discount_match_direct_formulas(
        weights in prop::collection::vec(-10.0f64..10.0, 1..50)
    ) {
        let sum = evaluate(ValueKind::Sum, &weights).unwrap();
        prop_assert!((sum - weights.iter().sum::<f64>()).abs() < 1e-9);

        let discounted = evaluate(ValueKind::Discount(0.9), &weights).unwrap();
        let expected: f64 = weights
            .iter()
            .enumerate()
            .map(|(i, w)| 0.9f64.powi(i as i32) * w)
            .sum();
        prop_assert!((discounted - expected).abs() < 1e-9);
    }

    /// Streaming accumulation agrees with batch evaluation for the
    /// whole-sequence kinds.
    #[test]
    fn test_accumulator_matches_batch(
        weights in prop::collection::vec(-50.0f64..50.0, 1..100)
    ) {
        for kind in [ValueKind::Inf, ValueKind::Sup, ValueKind::Sum, ValueKind::Discount(DEFAULT_DISCOUNT)] {
            let mut acc = Accumulator::new(kind);
            for &w in &weights {
                acc.accumulate(w);
            }
            let batch = evaluate(kind, &weights).unwrap();
            let streamed = acc.current_value().unwrap();
            prop_assert!((batch - streamed).abs() < 1e-9, "kind {kind:?}: {batch} vs {streamed}");
        }
    }
}

#[test]
fn test_empty_sequence_has_no_value() {
    for kind in [
        ValueKind::Inf,
        ValueKind::Sup,
        ValueKind::LimInf,
        ValueKind::LimSup,
        ValueKind::LimInfAvg,
        ValueKind::LimSupAvg,
        ValueKind::Sum,
        ValueKind::Discount(0.5),
    ] {
        assert!(evaluate(kind, &[]).is_none());
    }
    assert!(Accumulator::new(ValueKind::Sup).current_value().is_none());
}

#[test]
fn test_cycle_closed_form_agrees_with_window_on_periodic_trace() {
    // A short spike then a long strict 4/6 alternation: the eventual
    // average is 5 exactly.
    let mut trace = vec![9u32];
    for _ in 0..100 {
        trace.push(4);
        trace.push(6);
    }
    let weight = |s: &u32| *s as f64;
    let exact = top_value_with_cycles(&trace, weight, ValueKind::LimSupAvg).unwrap();
    assert!((exact - 5.0).abs() < 1e-12);

    let windowed = top_value(&trace, weight, ValueKind::LimSupAvg).unwrap();
    assert!((exact - windowed).abs() < 0.05);
}

#[test]
fn test_limit_values_ignore_transients() {
    // A huge head value must not leak into the limit band.
    let mut trace = vec![1000.0];
    trace.extend(std::iter::repeat(2.0).take(400));
    assert_eq!(evaluate(ValueKind::LimSup, &trace), Some(2.0));
    assert_eq!(evaluate(ValueKind::LimSupAvg, &trace), Some(2.0));
    assert_eq!(evaluate(ValueKind::Sup, &trace), Some(1000.0));
}
