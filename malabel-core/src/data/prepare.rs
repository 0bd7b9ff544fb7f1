//! Raw provider bars to a validated `PriceSeries`.
//!
//! Missing values are forward-filled column by column from the last known
//! value. Rows that are still incomplete after the fill (only possible before
//! the first value of some column) are dropped. The result then goes through
//! `PriceSeries::new`, which rejects bad ordering and bad closes.

use super::provider::{DataError, RawBar};
use crate::domain::{PriceBar, PriceSeries};
use tracing::debug;

/// What `fill_forward` had to do to make the bars complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FillReport {
    /// Individual cells taken from the previous row.
    pub filled_cells: usize,
    /// Leading rows dropped because some column had no earlier value.
    pub dropped_rows: usize,
}

/// Forward-fill each column and drop rows that remain incomplete.
pub fn fill_forward(raw: &[RawBar]) -> (Vec<PriceBar>, FillReport) {
    let mut report = FillReport::default();
    let mut last = RawBar {
        date: raw.first().map(|b| b.date).unwrap_or_default(),
        open: None,
        high: None,
        low: None,
        close: None,
        volume: None,
    };
    let mut bars = Vec::with_capacity(raw.len());

    for bar in raw {
        let mut filled = 0;
        let mut fill = |value: Option<f64>, previous: Option<f64>| {
            if value.is_none() && previous.is_some() {
                filled += 1;
            }
            value.or(previous)
        };
        let open = fill(bar.open, last.open);
        let high = fill(bar.high, last.high);
        let low = fill(bar.low, last.low);
        let close = fill(bar.close, last.close);
        let volume = match (bar.volume, last.volume) {
            (None, Some(v)) => {
                filled += 1;
                Some(v)
            }
            (v, _) => v,
        };

        last = RawBar {
            date: bar.date,
            open,
            high,
            low,
            close,
            volume,
        };

        match (open, high, low, close, volume) {
            (Some(open), Some(high), Some(low), Some(close), Some(volume)) => {
                report.filled_cells += filled;
                bars.push(PriceBar {
                    date: bar.date,
                    open,
                    high,
                    low,
                    close,
                    volume,
                });
            }
            _ => report.dropped_rows += 1,
        }
    }

    (bars, report)
}

/// Forward-fill, drop incomplete leading rows, validate.
pub fn prepare(symbol: &str, raw: &[RawBar]) -> Result<PriceSeries, DataError> {
    let (bars, report) = fill_forward(raw);
    debug!(
        symbol,
        filled_cells = report.filled_cells,
        dropped_rows = report.dropped_rows,
        "prepared raw bars"
    );
    Ok(PriceSeries::new(symbol, bars)?)
}
