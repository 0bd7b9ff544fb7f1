//! CSV import provider: daily bars from a local file.
//!
//! Expects a header row with `Date,Open,High,Low,Close,Volume` (case
//! insensitive, any order, extra columns ignored). Empty or `null`/`NaN`
//! fields become missing values and are forward-filled later by `prepare`.

use super::provider::{DataError, DataProvider, DataSource, FetchResult, RawBar};
use chrono::NaiveDate;
use std::path::PathBuf;
use tracing::info;

const REQUIRED: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

/// Reads bars from a CSV file instead of the network.
#[derive(Debug, Clone)]
pub struct CsvProvider {
    path: PathBuf,
}

impl CsvProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Every bar in the file, in file order.
    pub fn read_all(&self) -> Result<Vec<RawBar>, DataError> {
        let file = std::fs::File::open(&self.path).map_err(|source| DataError::Io {
            path: self.path.display().to_string(),
            source,
        })?;
        parse_bars(file, &self.path.display().to_string())
    }
}

impl DataProvider for CsvProvider {
    fn name(&self) -> &str {
        "csv_import"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        let bars: Vec<RawBar> = self
            .read_all()?
            .into_iter()
            .filter(|b| b.date >= start && b.date <= end)
            .collect();
        if bars.is_empty() {
            return Err(DataError::NoData {
                symbol: symbol.to_string(),
                start,
                end,
            });
        }
        info!(symbol, bars = bars.len(), path = %self.path.display(), "imported from CSV");
        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars,
            source: DataSource::CsvImport,
        })
    }
}

/// Parse bars from any CSV reader. `origin` names the source in errors.
pub fn parse_bars<R: std::io::Read>(reader: R, origin: &str) -> Result<Vec<RawBar>, DataError> {
    let csv_err = |message: String| DataError::Csv {
        path: origin.to_string(),
        message,
    };

    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers().map_err(|e| csv_err(e.to_string()))?.clone();
    let mut index = [0usize; 6];
    for (slot, name) in index.iter_mut().zip(REQUIRED) {
        *slot = headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or_else(|| csv_err(format!("missing column '{name}'")))?;
    }
    let [date_ix, open_ix, high_ix, low_ix, close_ix, volume_ix] = index;

    let mut bars = Vec::new();
    for (row, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| csv_err(e.to_string()))?;
        let line = row + 2;
        let field = |ix: usize| record.get(ix).unwrap_or("");

        let date = parse_date(field(date_ix))
            .ok_or_else(|| csv_err(format!("line {line}: invalid date '{}'", field(date_ix))))?;
        let number = |ix: usize| -> Result<Option<f64>, DataError> {
            parse_number(field(ix))
                .map_err(|raw| csv_err(format!("line {line}: invalid number '{raw}'")))
        };

        let volume = match number(volume_ix)? {
            Some(v) if v < 0.0 => {
                return Err(csv_err(format!(
                    "line {line}: negative volume '{}'",
                    field(volume_ix)
                )));
            }
            v => v.map(|v| v.round() as u64),
        };

        let bar = RawBar {
            date,
            open: number(open_ix)?,
            high: number(high_ix)?,
            low: number(low_ix)?,
            close: number(close_ix)?,
            volume,
        };
        if !bar.is_blank() {
            bars.push(bar);
        }
    }
    Ok(bars)
}

/// `YYYY-MM-DD`, optionally followed by a time part.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn parse_number(raw: &str) -> Result<Option<f64>, String> {
    if raw.is_empty() || raw.eq_ignore_ascii_case("null") || raw.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(|v| v.is_finite().then_some(v))
        .map_err(|_| raw.to_string())
}
