//! Property tests for engine invariants.
//!
//! Uses proptest to verify:
//! 1. SMA equals the mean of the window ending at each bar
//! 2. EMA stays within the range of closes seen so far; its seed is the SMA
//! 3. Running peak never decreases; drawdown lies in [0, 1)
//! 4. Forward labels: K = 0 is coincident, labels grow with K, last K unknown
//! 5. The table always has one row per bar

use chrono::NaiveDate;
use malabel_core::config::FeatureConfig;
use malabel_core::drawdown::{DrawdownTracker, PeakMode};
use malabel_core::indicators::{Ema, MaSpec, Sma};
use malabel_core::labels::{LabelMode, LabelParams, Labels};
use malabel_core::pipeline::build_features;
use malabel_core::{PriceBar, PriceSeries};
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_closes(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(1.0..1000.0_f64, 1..max_len)
        .prop_map(|v| v.into_iter().map(|p| (p * 100.0).round() / 100.0).collect())
}

fn arb_drawdowns() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.0..0.5_f64, 1..120)
}

fn series_from_closes(closes: &[f64]) -> PriceSeries {
    let base_date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| PriceBar {
            date: base_date + chrono::Duration::days(i as i64),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1_000,
        })
        .collect();
    PriceSeries::new("PROP", bars).unwrap()
}

// ── 1-2. Moving averages ─────────────────────────────────────────────

proptest! {
    #[test]
    fn sma_is_window_mean(closes in arb_closes(200), window in 1usize..40) {
        let values: Vec<_> = Sma::new(window).values(&closes).collect();
        prop_assert_eq!(values.len(), closes.len());
        for (i, v) in values.iter().enumerate() {
            if i + 1 < window {
                prop_assert!(v.is_none());
            } else {
                let mean = closes[i + 1 - window..=i].iter().sum::<f64>() / window as f64;
                let v = v.unwrap();
                prop_assert!((v - mean).abs() <= 1e-9 * mean.abs().max(1.0), "i={} v={} mean={}", i, v, mean);
            }
        }
    }

    #[test]
    fn ema_bounded_and_seeded_by_sma(closes in arb_closes(200), window in 1usize..40) {
        let ema: Vec<_> = Ema::new(window).values(&closes).collect();
        let sma: Vec<_> = Sma::new(window).values(&closes).collect();
        prop_assert_eq!(ema.len(), closes.len());

        if window <= closes.len() {
            let seed = ema[window - 1].unwrap();
            let sma_seed = sma[window - 1].unwrap();
            prop_assert!((seed - sma_seed).abs() <= 1e-9 * sma_seed.abs());
        }

        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for (i, v) in ema.iter().enumerate() {
            lo = lo.min(closes[i]);
            hi = hi.max(closes[i]);
            match v {
                None => prop_assert!(i + 1 < window),
                Some(v) => prop_assert!(*v >= lo - 1e-9 && *v <= hi + 1e-9, "i={} v={} range=[{}, {}]", i, v, lo, hi),
            }
        }
    }
}

// ── 3. Drawdown ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn peak_monotonic_and_drawdown_in_range(closes in arb_closes(300), threshold in 0.01..0.5_f64) {
        let states = DrawdownTracker::new(PeakMode::SinceInception, threshold).track(&closes);
        for (i, s) in states.iter().enumerate() {
            prop_assert!(s.drawdown >= 0.0 && s.drawdown < 1.0);
            prop_assert!(s.running_peak >= closes[i]);
            prop_assert_eq!(s.drawdown == 0.0, s.running_peak == closes[i]);
            if i > 0 {
                prop_assert!(s.running_peak >= states[i - 1].running_peak);
            }
        }
    }

    #[test]
    fn reset_mode_drawdown_in_range(closes in arb_closes(300)) {
        let states = DrawdownTracker::new(PeakMode::ResetAfterCorrection, 0.10).track(&closes);
        for (i, s) in states.iter().enumerate() {
            prop_assert!(s.drawdown >= 0.0 && s.drawdown < 1.0);
            prop_assert!(s.running_peak >= closes[i]);
        }
    }
}

// ── 4. Labels ────────────────────────────────────────────────────────

fn label_params(k: usize, mode: LabelMode) -> LabelParams {
    LabelParams {
        forward_window: Some(k),
        mode,
        ..LabelParams::default()
    }
}

proptest! {
    #[test]
    fn zero_horizon_is_coincident(dd in arb_drawdowns(), multiclass in any::<bool>()) {
        let mode = if multiclass { LabelMode::Multiclass } else { LabelMode::Binary };
        let coincident = Labels::compute(&dd, &LabelParams { mode, ..LabelParams::default() });
        let zero = Labels::compute(&dd, &label_params(0, mode));
        prop_assert_eq!(coincident, zero);
    }

    #[test]
    fn labels_monotone_in_horizon(dd in arb_drawdowns(), k1 in 1usize..30, extra in 1usize..30, multiclass in any::<bool>()) {
        let mode = if multiclass { LabelMode::Multiclass } else { LabelMode::Binary };
        let short = Labels::compute(&dd, &label_params(k1, mode));
        let long = Labels::compute(&dd, &label_params(k1 + extra, mode));
        for (a, b) in short.label.iter().zip(&long.label) {
            if let (Some(a), Some(b)) = (a, b) {
                prop_assert!(a <= b);
            }
        }
    }

    #[test]
    fn last_k_labels_unknown(dd in arb_drawdowns(), k in 1usize..40) {
        let labels = Labels::compute(&dd, &label_params(k, LabelMode::Binary));
        let n = dd.len();
        for (i, l) in labels.label.iter().enumerate() {
            prop_assert_eq!(l.is_none(), i + k >= n, "i={} k={} n={}", i, k, n);
        }
    }
}

// ── 5. Table shape ───────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn row_count_equals_series_length(
        closes in arb_closes(150),
        fast in 1usize..20,
        slow_extra in 0usize..40,
        slope_window in 1usize..15,
        forward in proptest::option::of(0usize..50),
    ) {
        let slow = fast + slow_extra;
        let config = FeatureConfig {
            sma_windows: vec![fast, slow],
            ema_windows: vec![fast, slow],
            cross_fast: fast,
            cross_slow: slow,
            distance_windows: vec![MaSpec::sma(slow), MaSpec::ema(slow)],
            slope_windows: vec![MaSpec::sma(fast), MaSpec::ema(slow)],
            slope_window,
            forward_window: forward,
            ..FeatureConfig::default()
        };
        let series = series_from_closes(&closes);
        let out = build_features(&series, &config).unwrap();
        prop_assert_eq!(out.table.len(), closes.len());
        for (_, column) in out.table.columns() {
            prop_assert_eq!(column.len(), closes.len());
        }
    }
}
