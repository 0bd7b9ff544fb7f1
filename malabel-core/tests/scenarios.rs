//! End-to-end scenarios through `build_features`.
//!
//! Each scenario builds a hand-made close series, runs the whole pipeline and
//! checks the resulting table by column name, the way a consumer of the CSV
//! would read it.

use chrono::NaiveDate;
use malabel_core::config::FeatureConfig;
use malabel_core::drawdown::PeakMode;
use malabel_core::features::{ColumnData, FeatureTable};
use malabel_core::labels::{ForwardEvent, LabelMode};
use malabel_core::pipeline::{build_features, DataWarning};
use malabel_core::{Cell, PriceBar, PriceSeries};

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
    PriceSeries::new("TEST", bars).unwrap()
}

fn floats(table: &FeatureTable, name: &str) -> Vec<Cell> {
    match table.column(name) {
        Some(ColumnData::Float(v)) => v,
        other => panic!("{name}: expected a float column, got {other:?}"),
    }
}

fn codes(table: &FeatureTable, name: &str) -> Vec<Option<u8>> {
    match table.column(name) {
        Some(ColumnData::Code(v)) => v,
        other => panic!("{name}: expected a code column, got {other:?}"),
    }
}

/// 50 bars at 100, one-day drop to 85, then 60 more bars at 85.
fn drop_closes() -> Vec<f64> {
    let mut closes = vec![100.0; 50];
    closes.extend(std::iter::repeat(85.0).take(61));
    closes
}

const DROP_DAY: usize = 50;

#[test]
fn constant_series() {
    let series = series_from_closes(&[100.0; 300]);
    let out = build_features(&series, &FeatureConfig::default()).unwrap();
    let table = &out.table;
    assert_eq!(table.len(), 300);
    assert!(out.warnings.is_empty());

    for (name, window) in [
        ("SMA50", 50),
        ("SMA100", 100),
        ("SMA200", 200),
        ("EMA50", 50),
        ("EMA200", 200),
    ] {
        let column = floats(table, name);
        assert!(column[..window - 1].iter().all(Option::is_none), "{name} warm-up");
        for (i, v) in column.iter().enumerate().skip(window - 1) {
            let v = v.unwrap_or_else(|| panic!("{name}[{i}] missing"));
            assert!((v - 100.0).abs() < 1e-9, "{name}[{i}] = {v}");
        }
    }

    let cross = codes(table, "GoldenCross");
    assert!(cross[..199].iter().all(Option::is_none));
    // SMA50 == SMA200: not strictly above, so no golden cross.
    assert!(cross[199..].iter().all(|c| *c == Some(0)));

    let ratio = floats(table, "SMA_ratio");
    assert!((ratio[250].unwrap() - 1.0).abs() < 1e-12);

    let slope = floats(table, "Slope_SMA50");
    assert_eq!(slope[58], None);
    assert!(slope[59].unwrap().abs() < 1e-12);

    let drawdown = floats(table, "DrawdownFraction");
    assert!(drawdown.iter().all(|d| *d == Some(0.0)));
    assert!(codes(table, "Label").iter().all(|l| *l == Some(0)));
    assert_eq!(out.max_drawdown, 0.0);
}

#[test]
fn single_drop_drawdown_and_flags() {
    let closes = drop_closes();
    let series = series_from_closes(&closes);
    let out = build_features(&series, &FeatureConfig::default()).unwrap();
    let table = &out.table;

    let drawdown = floats(table, "DrawdownFraction");
    let in_correction = codes(table, "InCorrection");
    let in_bear = codes(table, "InBearMarket");
    for i in 0..closes.len() {
        let peak = table.rows()[i].running_peak;
        assert_eq!(peak, 100.0, "peak stays at 100 at {i}");
        if i < DROP_DAY {
            assert_eq!(drawdown[i], Some(0.0));
            assert_eq!(in_correction[i], Some(0));
        } else {
            assert!((drawdown[i].unwrap() - 0.15).abs() < 1e-12);
            assert_eq!(in_correction[i], Some(1));
        }
        assert_eq!(in_bear[i], Some(0));
    }
}

#[test]
fn single_drop_forward_labels() {
    let closes = drop_closes();
    let n = closes.len();
    let k = 30;
    let series = series_from_closes(&closes);
    let config = FeatureConfig {
        forward_window: Some(k),
        ..FeatureConfig::default()
    };
    let out = build_features(&series, &config).unwrap();
    let labels = codes(&out.table, "Label");

    // Dates more than K bars before the drop see nothing.
    assert!(labels[..DROP_DAY - k].iter().all(|l| *l == Some(0)));
    // From K bars before the drop on, the window contains a correction bar.
    assert!(labels[DROP_DAY - k..n - k].iter().all(|l| *l == Some(1)));
    // The trailing K rows are unknown, never 0.
    assert!(labels[n - k..].iter().all(Option::is_none));
}

#[test]
fn single_drop_onset_labels() {
    let closes = drop_closes();
    let n = closes.len();
    let k = 30;
    let series = series_from_closes(&closes);
    let config = FeatureConfig {
        forward_window: Some(k),
        forward_event: ForwardEvent::Onset,
        ..FeatureConfig::default()
    };
    let out = build_features(&series, &config).unwrap();
    let labels = codes(&out.table, "Label");

    assert!(labels[..DROP_DAY - k].iter().all(|l| *l == Some(0)));
    assert!(labels[DROP_DAY - k..DROP_DAY].iter().all(|l| *l == Some(1)));
    // No new episode starts after the drop.
    assert!(labels[DROP_DAY..n - k].iter().all(|l| *l == Some(0)));
    assert!(labels[n - k..].iter().all(Option::is_none));
}

#[test]
fn bear_threshold_tie_is_inclusive() {
    let series = series_from_closes(&[100.0, 80.0, 90.0]);
    let config = FeatureConfig {
        label_mode: LabelMode::Multiclass,
        ..FeatureConfig::default()
    };
    let out = build_features(&series, &config).unwrap();
    let table = &out.table;
    assert_eq!(floats(table, "DrawdownFraction")[1], Some(0.20));
    assert_eq!(codes(table, "InBearMarket")[1], Some(1));
    assert_eq!(codes(table, "InCorrection")[1], Some(1));
    assert_eq!(codes(table, "Label"), vec![Some(0), Some(2), Some(1)]);
}

#[test]
fn correction_threshold_tie_is_inclusive() {
    let series = series_from_closes(&[100.0, 90.0]);
    let out = build_features(&series, &FeatureConfig::default()).unwrap();
    assert_eq!(codes(&out.table, "InCorrection"), vec![Some(0), Some(1)]);
}

#[test]
fn reset_mode_measures_from_post_correction_peak() {
    // 100 -> 85 (correction) -> 95 (recovered below threshold) -> 86
    let series = series_from_closes(&[100.0, 85.0, 95.0, 86.0]);
    let inception = build_features(&series, &FeatureConfig::default()).unwrap();
    let reset = build_features(
        &series,
        &FeatureConfig {
            peak_mode: PeakMode::ResetAfterCorrection,
            ..FeatureConfig::default()
        },
    )
    .unwrap();

    // Since inception: 86 is 14% below 100.
    assert_eq!(codes(&inception.table, "InCorrection")[3], Some(1));
    // Reset: 86 is under 10% below 95.
    assert_eq!(codes(&reset.table, "InCorrection")[3], Some(0));
}

#[test]
fn short_history_keeps_every_row() {
    let series = series_from_closes(&[100.0, 101.0, 99.0]);
    let out = build_features(&series, &FeatureConfig::default()).unwrap();
    assert_eq!(out.table.len(), 3);
    assert!(out
        .warnings
        .iter()
        .any(|w| matches!(w, DataWarning::InsufficientData { column, .. } if column == "SMA200")));
    assert!(floats(&out.table, "SMA50").iter().all(Option::is_none));
    assert_eq!(out.table.complete_rows().count(), 0);
}
