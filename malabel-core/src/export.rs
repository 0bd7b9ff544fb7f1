//! Export: feature table to CSV or Parquet, plus a JSON run manifest.
//!
//! Missing cells are written as an empty CSV field or a Parquet null; they
//! are never replaced by zero. The manifest records what produced a table
//! (configuration, input hash, label distribution, warnings) and carries a
//! `schema_version`; newer versions are rejected on load.

use crate::config::FeatureConfig;
use crate::data::DataSource;
use crate::domain::PriceSeries;
use crate::features::{ColumnData, FeatureTable};
use crate::pipeline::{DataWarning, FeatureOutput};
use chrono::{NaiveDate, NaiveTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

/// Current manifest schema version.
pub const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parquet write failed: {0}")]
    Parquet(#[from] PolarsError),

    #[error("manifest serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported manifest schema version {found} (max supported: {max})")]
    UnsupportedSchema { found: u32, max: u32 },
}

/// Table file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Parquet,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Parquet => "parquet",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "parquet" => Ok(ExportFormat::Parquet),
            other => Err(format!("unknown format '{other}' (expected csv or parquet)")),
        }
    }
}

/// Write the table in the given format.
pub fn write_table(
    table: &FeatureTable,
    path: &Path,
    format: ExportFormat,
) -> Result<(), ExportError> {
    match format {
        ExportFormat::Csv => write_csv(table, path),
        ExportFormat::Parquet => write_parquet(table, path),
    }
}

// ─── CSV ────────────────────────────────────────────────────────────

/// Write the table as CSV with a header row.
pub fn write_csv(table: &FeatureTable, path: &Path) -> Result<(), ExportError> {
    let file = File::create(path).map_err(|source| ExportError::Io {
        path: path.display().to_string(),
        source,
    })?;
    write_csv_to(table, file)?;
    info!(rows = table.len(), path = %path.display(), "feature table written (csv)");
    Ok(())
}

/// Render the table as a CSV string.
pub fn to_csv_string(table: &FeatureTable) -> Result<String, ExportError> {
    let mut buf = Vec::new();
    write_csv_to(table, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn write_csv_to<W: std::io::Write>(table: &FeatureTable, writer: W) -> Result<(), ExportError> {
    let columns = table.columns();
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(columns.iter().map(|(name, _)| name.as_str()))?;
    for i in 0..table.len() {
        wtr.write_record(columns.iter().map(|(_, data)| cell_text(data, i)))?;
    }
    wtr.flush().map_err(|source| ExportError::Io {
        path: "<csv writer>".to_string(),
        source,
    })?;
    Ok(())
}

fn cell_text(data: &ColumnData, i: usize) -> String {
    match data {
        ColumnData::Date(v) => v[i].format("%Y-%m-%d").to_string(),
        ColumnData::Float(v) => v[i].map(|x| x.to_string()).unwrap_or_default(),
        ColumnData::Volume(v) => v[i].to_string(),
        ColumnData::Code(v) => v[i].map(|x| x.to_string()).unwrap_or_default(),
    }
}

// ─── Parquet ────────────────────────────────────────────────────────

/// Convert the table to a Polars DataFrame, one typed column per feature.
pub fn to_dataframe(table: &FeatureTable) -> Result<DataFrame, ExportError> {
    let columns = table
        .columns()
        .into_iter()
        .map(|(name, data)| to_column(&name, data))
        .collect::<Result<Vec<Column>, PolarsError>>()?;
    Ok(DataFrame::new(columns)?)
}

fn to_column(name: &str, data: ColumnData) -> Result<Column, PolarsError> {
    let name = PlSmallStr::from(name);
    let column = match data {
        ColumnData::Date(v) => {
            let days: Vec<i32> = v.iter().map(|d| days_since_epoch(*d)).collect();
            Column::new(name, days).cast(&DataType::Date)?
        }
        ColumnData::Float(v) => Column::new(name, v),
        ColumnData::Volume(v) => Column::new(name, v),
        ColumnData::Code(v) => {
            let codes: Vec<Option<u32>> = v.into_iter().map(|c| c.map(u32::from)).collect();
            Column::new(name, codes)
        }
    };
    Ok(column)
}

fn days_since_epoch(date: NaiveDate) -> i32 {
    (date.and_time(NaiveTime::MIN).and_utc().timestamp() / 86_400) as i32
}

/// Write the table as a Parquet file.
pub fn write_parquet(table: &FeatureTable, path: &Path) -> Result<(), ExportError> {
    let mut df = to_dataframe(table)?;
    let file = File::create(path).map_err(|source| ExportError::Io {
        path: path.display().to_string(),
        source,
    })?;
    ParquetWriter::new(file).finish(&mut df)?;
    info!(rows = table.len(), path = %path.display(), "feature table written (parquet)");
    Ok(())
}

// ─── Manifest ───────────────────────────────────────────────────────

/// JSON sidecar describing how a feature table was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub schema_version: u32,
    pub tool_version: String,
    pub symbol: String,
    pub source: Option<DataSource>,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub rows: usize,
    pub columns: Vec<String>,
    pub config: FeatureConfig,
    /// BLAKE3 over the serialized configuration.
    pub config_hash: String,
    /// BLAKE3 over every bar's date and OHLCV values.
    pub data_hash: String,
    /// Known label value to row count.
    pub label_counts: BTreeMap<u8, usize>,
    pub unknown_labels: usize,
    pub max_drawdown: f64,
    pub warnings: Vec<DataWarning>,
}

impl RunManifest {
    pub fn new(
        series: &PriceSeries,
        config: &FeatureConfig,
        output: &FeatureOutput,
        source: Option<DataSource>,
    ) -> Result<Self, ExportError> {
        let table = &output.table;
        let label_counts = table.label_counts();
        let known: usize = label_counts.values().sum();
        Ok(Self {
            schema_version: MANIFEST_VERSION,
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            symbol: series.symbol().to_string(),
            source,
            first_date: series.first_date(),
            last_date: series.last_date(),
            rows: table.len(),
            columns: table.column_names(),
            config: config.clone(),
            config_hash: config_hash(config)?,
            data_hash: series_hash(series),
            label_counts,
            unknown_labels: table.len() - known,
            max_drawdown: output.max_drawdown,
            warnings: output.warnings.clone(),
        })
    }

    pub fn to_json(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a manifest, rejecting schema versions newer than this build.
    pub fn from_json(json: &str) -> Result<Self, ExportError> {
        let manifest: RunManifest = serde_json::from_str(json)?;
        if manifest.schema_version > MANIFEST_VERSION {
            return Err(ExportError::UnsupportedSchema {
                found: manifest.schema_version,
                max: MANIFEST_VERSION,
            });
        }
        Ok(manifest)
    }

    pub fn write(&self, path: &Path) -> Result<(), ExportError> {
        std::fs::write(path, self.to_json()?).map_err(|source| ExportError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn read(path: &Path) -> Result<Self, ExportError> {
        let json = std::fs::read_to_string(path).map_err(|source| ExportError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }
}

/// `SPY_features.csv` -> `SPY_features.manifest.json`.
pub fn manifest_path(table_path: &Path) -> PathBuf {
    table_path.with_extension("manifest.json")
}

/// Deterministic BLAKE3 hash of the configuration.
pub fn config_hash(config: &FeatureConfig) -> Result<String, ExportError> {
    let json = serde_json::to_string(config)?;
    Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
}

/// Deterministic BLAKE3 hash of the symbol and every bar.
pub fn series_hash(series: &PriceSeries) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(series.symbol().as_bytes());
    for bar in series.bars() {
        hasher.update(bar.date.to_string().as_bytes());
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
        hasher.update(&bar.volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
