//! Indicators derived from moving averages: cross, ratio, distance, slope.
//!
//! All functions work position by position over already-computed series and
//! propagate `None` structurally. A zero is a real value here (a death cross
//! reads as `Some(0)`), so missing inputs never collapse to zero.

use super::{MaSpec, MovingAverages};
use crate::domain::Cell;

/// Denominators with a magnitude below this produce `None` instead of a ratio.
pub const DENOMINATOR_EPSILON: f64 = 1e-12;

/// `num / den`, or `None` when the denominator is (near) zero or the result is not finite.
pub fn safe_div(num: f64, den: f64) -> Cell {
    if den.abs() < DENOMINATOR_EPSILON {
        return None;
    }
    let value = num / den;
    value.is_finite().then_some(value)
}

/// 1 where `fast > slow`, 0 otherwise, `None` where either side is missing.
pub fn golden_cross(fast: &[Cell], slow: &[Cell]) -> Vec<Option<u8>> {
    fast.iter()
        .zip(slow)
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(u8::from(f > s)),
            _ => None,
        })
        .collect()
}

/// Element-wise `num / den` with the zero guard.
pub fn ratio(num: &[Cell], den: &[Cell]) -> Vec<Cell> {
    num.iter()
        .zip(den)
        .map(|(n, d)| match (n, d) {
            (Some(n), Some(d)) => safe_div(*n, *d),
            _ => None,
        })
        .collect()
}

/// `(close - ma) / ma` per position.
pub fn distance(closes: &[f64], ma: &[Cell]) -> Vec<Cell> {
    closes
        .iter()
        .zip(ma)
        .map(|(close, ma)| ma.and_then(|ma| safe_div(close - ma, ma)))
        .collect()
}

/// `(ma[i] - ma[i - n]) / n`, an absolute rate per trading day.
///
/// `None` for i < n or when either endpoint is missing.
pub fn slope(ma: &[Cell], n: usize) -> Vec<Cell> {
    assert!(n >= 1, "slope window must be >= 1");
    (0..ma.len())
        .map(|i| {
            if i < n {
                return None;
            }
            match (ma[i], ma[i - n]) {
                (Some(now), Some(then)) => Some((now - then) / n as f64),
                _ => None,
            }
        })
        .collect()
}

/// Which derived columns to compute.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedParams {
    /// Fast window of the cross and the ratios (default 50).
    pub cross_fast: usize,
    /// Slow window of the cross and the ratios (default 200).
    pub cross_slow: usize,
    pub distance_specs: Vec<MaSpec>,
    pub slope_specs: Vec<MaSpec>,
    /// Look-back N of the slope, in trading days.
    pub slope_window: usize,
}

impl Default for DerivedParams {
    fn default() -> Self {
        Self {
            cross_fast: 50,
            cross_slow: 200,
            distance_specs: vec![MaSpec::sma(200), MaSpec::ema(200)],
            slope_specs: vec![
                MaSpec::sma(50),
                MaSpec::ema(50),
                MaSpec::sma(200),
                MaSpec::ema(200),
            ],
            slope_window: 10,
        }
    }
}

/// Derived series, each the same length as the price series.
#[derive(Debug, Clone, Default)]
pub struct DerivedIndicators {
    pub golden_cross: Vec<Option<u8>>,
    pub sma_ratio: Vec<Cell>,
    pub ema_ratio: Vec<Cell>,
    /// Per moving average, in configured order.
    pub distances: Vec<(MaSpec, Vec<Cell>)>,
    pub slopes: Vec<(MaSpec, Vec<Cell>)>,
}

impl DerivedIndicators {
    /// Compute every derived column. A moving average missing from `mas`
    /// yields an all-`None` column rather than an error.
    pub fn compute(closes: &[f64], mas: &MovingAverages, params: &DerivedParams) -> Self {
        let n = closes.len();
        let missing = vec![None; n];
        let series = |spec: MaSpec| mas.get_series(spec).unwrap_or(missing.as_slice());

        let sma_fast = series(MaSpec::sma(params.cross_fast));
        let sma_slow = series(MaSpec::sma(params.cross_slow));
        let ema_fast = series(MaSpec::ema(params.cross_fast));
        let ema_slow = series(MaSpec::ema(params.cross_slow));

        let distances = unique(&params.distance_specs)
            .map(|spec| (spec, distance(closes, series(spec))))
            .collect();
        let slopes = unique(&params.slope_specs)
            .map(|spec| (spec, slope(series(spec), params.slope_window)))
            .collect();

        Self {
            golden_cross: golden_cross(sma_fast, sma_slow),
            sma_ratio: ratio(sma_fast, sma_slow),
            ema_ratio: ratio(ema_fast, ema_slow),
            distances,
            slopes,
        }
    }

    pub fn distance(&self, spec: MaSpec) -> Option<&[Cell]> {
        lookup(&self.distances, spec)
    }

    pub fn slope(&self, spec: MaSpec) -> Option<&[Cell]> {
        lookup(&self.slopes, spec)
    }
}

/// Specs in first-seen order without repeats.
fn unique(specs: &[MaSpec]) -> impl Iterator<Item = MaSpec> + '_ {
    specs
        .iter()
        .enumerate()
        .filter(|(i, spec)| !specs[..*i].contains(spec))
        .map(|(_, spec)| *spec)
}

fn lookup(columns: &[(MaSpec, Vec<Cell>)], spec: MaSpec) -> Option<&[Cell]> {
    columns
        .iter()
        .find(|(s, _)| *s == spec)
        .map(|(_, v)| v.as_slice())
}
