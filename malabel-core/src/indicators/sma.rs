//! Simple Moving Average (SMA).
//!
//! Rolling mean of close prices over a trailing window of positions.
//! Lookback: window - 1 (first value at position window-1).

use super::{MaKind, MaSpec, MovingAverage};
use crate::domain::Cell;
use std::iter::FusedIterator;

#[derive(Debug, Clone)]
pub struct Sma {
    window: usize,
    name: String,
}

impl Sma {
    pub fn new(window: usize) -> Self {
        assert!(window >= 1, "SMA window must be >= 1");
        Self {
            window,
            name: MaSpec {
                kind: MaKind::Sma,
                window,
            }
            .to_string(),
        }
    }

    /// Lazy per-position values. Each call starts a fresh pass.
    pub fn values<'a>(&self, closes: &'a [f64]) -> SmaValues<'a> {
        SmaValues {
            closes,
            window: self.window,
            position: 0,
            sum: 0.0,
        }
    }
}

impl MovingAverage for Sma {
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

/// Iterator over SMA values, one per close.
#[derive(Debug, Clone)]
pub struct SmaValues<'a> {
    closes: &'a [f64],
    window: usize,
    position: usize,
    sum: f64,
}

impl Iterator for SmaValues<'_> {
    type Item = Cell;

    fn next(&mut self) -> Option<Self::Item> {
        let i = self.position;
        let entering = *self.closes.get(i)?;
        self.position += 1;

        self.sum += entering;
        if i >= self.window {
            self.sum -= self.closes[i - self.window];
        }

        if i + 1 < self.window {
            return Some(None);
        }
        Some(Some(self.sum / self.window as f64))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.closes.len() - self.position;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SmaValues<'_> {}
impl FusedIterator for SmaValues<'_> {}
