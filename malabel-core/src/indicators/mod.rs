//! Moving averages and the indicators derived from them.
//!
//! Moving averages are computed once over the close series and stored in a
//! `MovingAverages` container keyed by `MaSpec`. Derived indicators (cross,
//! ratio, distance, slope) read from that container and never touch prices
//! other than the close.
//!
//! Every series has the same length as the price series. Warm-up positions
//! hold `None`, never a numeric sentinel.

pub mod derived;
pub mod ema;
pub mod sma;

pub use derived::{DerivedIndicators, DerivedParams};
pub use ema::Ema;
pub use sma::Sma;

use crate::domain::{Cell, PriceSeries};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Moving average flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaKind {
    Sma,
    Ema,
}

impl fmt::Display for MaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaKind::Sma => f.write_str("SMA"),
            MaKind::Ema => f.write_str("EMA"),
        }
    }
}

/// A (kind, window) pair such as SMA200. Displays and parses as `SMA200`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MaSpec {
    pub kind: MaKind,
    pub window: usize,
}

impl MaSpec {
    pub const fn sma(window: usize) -> Self {
        Self {
            kind: MaKind::Sma,
            window,
        }
    }

    pub const fn ema(window: usize) -> Self {
        Self {
            kind: MaKind::Ema,
            window,
        }
    }

    /// Build the moving average this spec describes.
    pub fn build(&self) -> Box<dyn MovingAverage> {
        match self.kind {
            MaKind::Sma => Box::new(Sma::new(self.window)),
            MaKind::Ema => Box::new(Ema::new(self.window)),
        }
    }
}

impl fmt::Display for MaSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind, self.window)
    }
}

impl FromStr for MaSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() < 4 || !s.is_char_boundary(3) {
            return Err(format!("invalid moving average '{s}' (expected e.g. SMA200)"));
        }
        let (prefix, digits) = s.split_at(3);
        let kind = match prefix.to_ascii_lowercase().as_str() {
            "sma" => MaKind::Sma,
            "ema" => MaKind::Ema,
            _ => return Err(format!("unknown moving average kind in '{s}'")),
        };
        let window = digits
            .parse::<usize>()
            .map_err(|e| format!("invalid window in '{s}': {e}"))?;
        Ok(Self { kind, window })
    }
}

impl TryFrom<String> for MaSpec {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MaSpec> for String {
    fn from(spec: MaSpec) -> Self {
        spec.to_string()
    }
}

/// A moving average over close prices.
///
/// Implementations produce one value per input position. The first
/// `lookback()` values are `None`.
///
/// # Look-ahead guard
/// The value at position t depends only on closes at positions <= t.
pub trait MovingAverage: Send + Sync {
    /// Column name, e.g. "SMA50".
    fn name(&self) -> &str;

    fn window(&self) -> usize;

    /// Number of leading positions without a value.
    fn lookback(&self) -> usize {
        self.window().saturating_sub(1)
    }

    /// Compute the full series, same length as `closes`.
    fn compute(&self, closes: &[f64]) -> Vec<Cell>;
}

/// Container for computed moving-average series.
///
/// `BTreeMap` keeps iteration order deterministic (SMA before EMA, then by window).
#[derive(Debug, Clone, Default)]
pub struct MovingAverages {
    len: usize,
    series: BTreeMap<MaSpec, Vec<Cell>>,
}

impl MovingAverages {
    /// Compute every requested moving average over the series closes.
    pub fn compute(series: &PriceSeries, specs: &[MaSpec]) -> Self {
        let closes = series.closes();
        let mut out = Self {
            len: closes.len(),
            series: BTreeMap::new(),
        };
        for spec in specs {
            if out.series.contains_key(spec) {
                continue;
            }
            let values = spec.build().compute(&closes);
            out.insert(*spec, values);
        }
        out
    }

    /// Insert a named series. Panics if the length differs from the others.
    pub fn insert(&mut self, spec: MaSpec, values: Vec<Cell>) {
        if self.series.is_empty() && self.len == 0 {
            self.len = values.len();
        }
        assert_eq!(
            values.len(),
            self.len,
            "{spec}: series length does not match the price series"
        );
        self.series.insert(spec, values);
    }

    /// Value at a position. `None` for warm-up, unknown spec or out of range.
    pub fn get(&self, spec: MaSpec, position: usize) -> Cell {
        self.series
            .get(&spec)
            .and_then(|v| v.get(position).copied())
            .flatten()
    }

    pub fn get_series(&self, spec: MaSpec) -> Option<&[Cell]> {
        self.series.get(&spec).map(|v| v.as_slice())
    }

    /// Specs in column order.
    pub fn specs(&self) -> impl Iterator<Item = MaSpec> + '_ {
        self.series.keys().copied()
    }

    /// Length of each stored series.
    pub fn series_len(&self) -> usize {
        self.len
    }

    /// Number of stored series.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Build a series from close prices for testing.
///
/// Dates advance one calendar day per bar; open = previous close,
/// high/low bracket open and close by 1.0, volume = 1000.
#[cfg(test)]
pub fn make_series(closes: &[f64]) -> PriceSeries {
    use crate::domain::PriceBar;
    let base_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            PriceBar {
                date: base_date + chrono::Duration::days(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000,
            }
        })
        .collect();
    PriceSeries::new("TEST", bars).unwrap()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
