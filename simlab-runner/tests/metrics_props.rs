use proptest::prelude::*;

use simlab_runner::metrics::{
    equity_curve, max_consecutive_losses, max_drawdown, median, profit_factor, win_rate, PROFIT_FACTOR_CAP,
};

// ── Generators ──

fn arb_pnls() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-0.95f64..3.0, 0..60)
}

// ── Properties ──

proptest! {
    #[test]
    fn drawdown_is_a_non_positive_fraction(pnls in arb_pnls()) {
        let dd = max_drawdown(&equity_curve(&pnls));
        prop_assert!((-1.0..=0.0).contains(&dd), "dd = {dd}");
    }

    #[test]
    fn equity_curve_starts_at_one(pnls in arb_pnls()) {
        let curve = equity_curve(&pnls);
        prop_assert_eq!(curve.len(), pnls.len() + 1);
        prop_assert_eq!(curve[0], 1.0);
        prop_assert!(curve.iter().all(|eq| *eq > 0.0));
    }

    #[test]
    fn ratios_stay_in_range(pnls in arb_pnls()) {
        let wr = win_rate(&pnls);
        prop_assert!((0.0..=1.0).contains(&wr));
        let pf = profit_factor(&pnls);
        prop_assert!((0.0..=PROFIT_FACTOR_CAP).contains(&pf));
        prop_assert!(max_consecutive_losses(&pnls) <= pnls.len());
    }

    #[test]
    fn median_lies_within_sample(pnls in arb_pnls()) {
        prop_assume!(!pnls.is_empty());
        let m = median(&pnls);
        let lo = pnls.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = pnls.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        prop_assert!(m >= lo && m <= hi);
    }
}
