//! Feature table: one row per bar, joining every engine output by position.
//!
//! Rows are never dropped: the table always has exactly as many rows as the
//! price series, and any value that could not be computed is `None`.
//! Consumers pick their own missing-value policy.

use crate::domain::{Cell, PriceSeries};
use crate::drawdown::DrawdownState;
use crate::indicators::{DerivedIndicators, MaSpec, MovingAverages};
use crate::labels::Labels;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// One bar's features and labels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    /// Moving averages, in `FeatureTable::moving_average_columns()` order.
    pub moving_averages: Vec<Cell>,
    pub golden_cross: Option<u8>,
    pub sma_ratio: Cell,
    pub ema_ratio: Cell,
    /// In `FeatureTable::distance_columns()` order.
    pub distances: Vec<Cell>,
    /// In `FeatureTable::slope_columns()` order.
    pub slopes: Vec<Cell>,
    pub running_peak: f64,
    pub drawdown: f64,
    pub in_correction: bool,
    pub in_bear_market: bool,
    /// `None` = unknown (forward window not available).
    pub label: Option<u8>,
}

/// A whole column, typed by what it holds.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Date(Vec<NaiveDate>),
    Float(Vec<Cell>),
    Volume(Vec<u64>),
    /// Small integer codes (0/1 flags, class labels) with optional missing values.
    Code(Vec<Option<u8>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Date(v) => v.len(),
            ColumnData::Float(v) => v.len(),
            ColumnData::Volume(v) => v.len(),
            ColumnData::Code(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of missing cells.
    pub fn null_count(&self) -> usize {
        match self {
            ColumnData::Date(_) | ColumnData::Volume(_) => 0,
            ColumnData::Float(v) => v.iter().filter(|c| c.is_none()).count(),
            ColumnData::Code(v) => v.iter().filter(|c| c.is_none()).count(),
        }
    }
}

/// Ordered feature rows for one ticker.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureTable {
    symbol: String,
    moving_average_columns: Vec<MaSpec>,
    distance_columns: Vec<MaSpec>,
    slope_columns: Vec<MaSpec>,
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    /// Join engine outputs by position.
    ///
    /// All inputs must have the series length; this is guaranteed when they
    /// were computed from the same series.
    pub fn assemble(
        series: &PriceSeries,
        mas: &MovingAverages,
        derived: &DerivedIndicators,
        drawdown: &[DrawdownState],
        labels: &Labels,
    ) -> Self {
        let n = series.len();
        debug_assert_eq!(drawdown.len(), n);
        debug_assert_eq!(labels.len(), n);

        let moving_average_columns: Vec<MaSpec> = mas.specs().collect();
        let distance_columns: Vec<MaSpec> = derived.distances.iter().map(|(s, _)| *s).collect();
        let slope_columns: Vec<MaSpec> = derived.slopes.iter().map(|(s, _)| *s).collect();

        let rows = series
            .bars()
            .iter()
            .enumerate()
            .map(|(i, bar)| FeatureRow {
                date: bar.date,
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
                moving_averages: moving_average_columns
                    .iter()
                    .map(|&spec| mas.get(spec, i))
                    .collect(),
                golden_cross: derived.golden_cross[i],
                sma_ratio: derived.sma_ratio[i],
                ema_ratio: derived.ema_ratio[i],
                distances: cells_at(&derived.distances, i),
                slopes: cells_at(&derived.slopes, i),
                running_peak: drawdown[i].running_peak,
                drawdown: drawdown[i].drawdown,
                in_correction: labels.in_correction[i],
                in_bear_market: labels.in_bear_market[i],
                label: labels.label[i],
            })
            .collect();

        Self {
            symbol: series.symbol().to_string(),
            moving_average_columns,
            distance_columns,
            slope_columns,
            rows,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn moving_average_columns(&self) -> &[MaSpec] {
        &self.moving_average_columns
    }

    pub fn distance_columns(&self) -> &[MaSpec] {
        &self.distance_columns
    }

    pub fn slope_columns(&self) -> &[MaSpec] {
        &self.slope_columns
    }

    /// Column names in output order.
    pub fn column_names(&self) -> Vec<String> {
        let mut names: Vec<String> = ["Date", "Open", "High", "Low", "Close", "Volume"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        names.extend(self.moving_average_columns.iter().map(|s| s.to_string()));
        names.extend(
            ["GoldenCross", "SMA_ratio", "EMA_ratio"]
                .iter()
                .map(|s| s.to_string()),
        );
        names.extend(self.distance_columns.iter().map(|s| format!("Dist_{s}")));
        names.extend(self.slope_columns.iter().map(|s| format!("Slope_{s}")));
        names.extend(
            ["DrawdownFraction", "InCorrection", "InBearMarket", "Label"]
                .iter()
                .map(|s| s.to_string()),
        );
        names
    }

    /// Extract a column by output name.
    pub fn column(&self, name: &str) -> Option<ColumnData> {
        let data = match name {
            "Date" => ColumnData::Date(self.rows.iter().map(|r| r.date).collect()),
            "Open" => self.floats(|r| Some(r.open)),
            "High" => self.floats(|r| Some(r.high)),
            "Low" => self.floats(|r| Some(r.low)),
            "Close" => self.floats(|r| Some(r.close)),
            "Volume" => ColumnData::Volume(self.rows.iter().map(|r| r.volume).collect()),
            "GoldenCross" => self.codes(|r| r.golden_cross),
            "SMA_ratio" => self.floats(|r| r.sma_ratio),
            "EMA_ratio" => self.floats(|r| r.ema_ratio),
            "DrawdownFraction" => self.floats(|r| Some(r.drawdown)),
            "InCorrection" => self.codes(|r| Some(u8::from(r.in_correction))),
            "InBearMarket" => self.codes(|r| Some(u8::from(r.in_bear_market))),
            "Label" => self.codes(|r| r.label),
            other => {
                if let Some(idx) = position_of(&self.moving_average_columns, other, "") {
                    self.floats(|r| r.moving_averages[idx])
                } else if let Some(idx) = position_of(&self.distance_columns, other, "Dist_") {
                    self.floats(|r| r.distances[idx])
                } else if let Some(idx) = position_of(&self.slope_columns, other, "Slope_") {
                    self.floats(|r| r.slopes[idx])
                } else {
                    return None;
                }
            }
        };
        Some(data)
    }

    fn floats(&self, cell: impl Fn(&FeatureRow) -> Cell) -> ColumnData {
        ColumnData::Float(self.rows.iter().map(cell).collect())
    }

    fn codes(&self, cell: impl Fn(&FeatureRow) -> Option<u8>) -> ColumnData {
        ColumnData::Code(self.rows.iter().map(cell).collect())
    }

    /// Every column in output order.
    pub fn columns(&self) -> Vec<(String, ColumnData)> {
        self.column_names()
            .into_iter()
            .filter_map(|name| self.column(&name).map(|data| (name, data)))
            .collect()
    }

    /// Count of each known label value; unknown labels are excluded.
    pub fn label_counts(&self) -> BTreeMap<u8, usize> {
        let mut counts = BTreeMap::new();
        for label in self.rows.iter().filter_map(|r| r.label) {
            *counts.entry(label).or_insert(0) += 1;
        }
        counts
    }

    /// Rows where every feature and the label are present.
    pub fn complete_rows(&self) -> impl Iterator<Item = &FeatureRow> {
        self.rows.iter().filter(|r| {
            r.label.is_some()
                && r.golden_cross.is_some()
                && r.sma_ratio.is_some()
                && r.ema_ratio.is_some()
                && r.moving_averages.iter().all(Option::is_some)
                && r.distances.iter().all(Option::is_some)
                && r.slopes.iter().all(Option::is_some)
        })
    }
}

fn cells_at(columns: &[(MaSpec, Vec<Cell>)], i: usize) -> Vec<Cell> {
    columns.iter().map(|(_, v)| v[i]).collect()
}

fn position_of(specs: &[MaSpec], name: &str, prefix: &str) -> Option<usize> {
    let rest = name.strip_prefix(prefix)?;
    specs.iter().position(|s| s.to_string() == rest)
}
