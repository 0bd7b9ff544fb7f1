//! PriceSeries: validated, ascending daily bars for one ticker.

use super::bar::PriceBar;
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

/// Malformed input: the series violates an ordering or price invariant.
///
/// Every variant carries the offending position (0-based) and date so the
/// caller can locate the bad record. The series is never reordered or
/// deduplicated to make it valid.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("price series for '{symbol}' is empty")]
    Empty { symbol: String },

    #[error("duplicate date {date} at position {position}")]
    DuplicateDate { position: usize, date: NaiveDate },

    #[error("date {date} at position {position} is earlier than previous date {previous}")]
    NonMonotonicDate {
        position: usize,
        date: NaiveDate,
        previous: NaiveDate,
    },

    #[error("close must be positive and finite, got {close} on {date} (position {position})")]
    InvalidClose {
        position: usize,
        date: NaiveDate,
        close: f64,
    },
}

/// Ordered daily bars for a single ticker.
///
/// Windows downstream are positional: bar `i` is the i-th trading day, and
/// calendar gaps never create synthetic rows.
#[derive(Debug, Clone, Serialize)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Validate and wrap a bar list.
    pub fn new(symbol: impl Into<String>, bars: Vec<PriceBar>) -> Result<Self, SeriesError> {
        let symbol = symbol.into();
        if bars.is_empty() {
            return Err(SeriesError::Empty { symbol });
        }

        for (position, bar) in bars.iter().enumerate() {
            if !(bar.close.is_finite() && bar.close > 0.0) {
                return Err(SeriesError::InvalidClose {
                    position,
                    date: bar.date,
                    close: bar.close,
                });
            }
            if position == 0 {
                continue;
            }
            let previous = bars[position - 1].date;
            if bar.date == previous {
                return Err(SeriesError::DuplicateDate {
                    position,
                    date: bar.date,
                });
            }
            if bar.date < previous {
                return Err(SeriesError::NonMonotonicDate {
                    position,
                    date: bar.date,
                    previous,
                });
            }
        }

        Ok(Self { symbol, bars })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Always false for a constructed series; kept for clippy's `len_without_is_empty`.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&PriceBar> {
        self.bars.get(position)
    }

    /// Close prices in positional order.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn first_date(&self) -> NaiveDate {
        self.bars[0].date
    }

    pub fn last_date(&self) -> NaiveDate {
        self.bars[self.bars.len() - 1].date
    }

    /// The first `len` bars as a new series. A prefix of a valid series is
    /// itself valid; `len` is clamped to `1..=self.len()`.
    pub fn prefix(&self, len: usize) -> PriceSeries {
        let len = len.clamp(1, self.bars.len());
        PriceSeries {
            symbol: self.symbol.clone(),
            bars: self.bars[..len].to_vec(),
        }
    }

    /// Number of bars failing the OHLC sanity check.
    pub fn insane_bar_count(&self) -> usize {
        self.bars.iter().filter(|b| !b.is_sane()).count()
    }
}
