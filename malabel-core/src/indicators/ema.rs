//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = alpha * close[t] + (1 - alpha) * EMA[t-1], alpha = 2 / (window + 1).
//! Seed: EMA[window-1] = SMA of the first `window` closes.
//! Lookback: window - 1.

use super::{MaKind, MaSpec, MovingAverage};
use crate::domain::Cell;
use std::iter::FusedIterator;

#[derive(Debug, Clone)]
pub struct Ema {
    window: usize,
    name: String,
}

impl Ema {
    pub fn new(window: usize) -> Self {
        assert!(window >= 1, "EMA window must be >= 1");
        Self {
            window,
            name: MaSpec {
                kind: MaKind::Ema,
                window,
            }
            .to_string(),
        }
    }

    /// Smoothing factor.
    pub fn alpha(&self) -> f64 {
        2.0 / (self.window as f64 + 1.0)
    }

    /// Lazy per-position values. Each call starts a fresh pass.
    pub fn values<'a>(&self, closes: &'a [f64]) -> EmaValues<'a> {
        EmaValues {
            closes,
            window: self.window,
            alpha: self.alpha(),
            position: 0,
            seed_sum: 0.0,
            prev: None,
        }
    }
}

impl MovingAverage for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn window(&self) -> usize {
        self.window
    }

    fn compute(&self, closes: &[f64]) -> Vec<Cell> {
        self.values(closes).collect()
    }
}

/// Iterator over EMA values, one per close.
#[derive(Debug, Clone)]
pub struct EmaValues<'a> {
    closes: &'a [f64],
    window: usize,
    alpha: f64,
    position: usize,
    seed_sum: f64,
    prev: Option<f64>,
}

impl Iterator for EmaValues<'_> {
    type Item = Cell;

    fn next(&mut self) -> Option<Self::Item> {
        let i = self.position;
        let close = *self.closes.get(i)?;
        self.position += 1;

        let value = match self.prev {
            Some(prev) => self.alpha * close + (1.0 - self.alpha) * prev,
            None => {
                self.seed_sum += close;
                if i + 1 < self.window {
                    return Some(None);
                }
                self.seed_sum / self.window as f64
            }
        };
        self.prev = Some(value);
        Some(Some(value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.closes.len() - self.position;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for EmaValues<'_> {}
impl FusedIterator for EmaValues<'_> {}
