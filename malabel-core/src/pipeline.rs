//! Feature pipeline: price series + configuration to a feature table.
//!
//! Validation runs before any computation. The only soft failure is a window
//! longer than the series, which leaves that column all `None` and is
//! reported as a `DataWarning` instead of an error.

use crate::config::{ConfigError, FeatureConfig};
use crate::domain::{PriceBar, PriceSeries, SeriesError};
use crate::drawdown::{self, DrawdownTracker};
use crate::features::FeatureTable;
use crate::indicators::{DerivedIndicators, MovingAverages};
use crate::labels::Labels;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Hard failures: nothing is computed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("malformed price series: {0}")]
    Series(#[from] SeriesError),
}

/// Soft problems found while building the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataWarning {
    /// A column's window exceeds the series length; the column is all `None`.
    InsufficientData {
        column: String,
        window: usize,
        bars: usize,
    },
    /// Bars whose OHLC relationship is inconsistent (e.g. high below low).
    /// They are kept; only the close feeds the features.
    InsaneBars { count: usize },
}

impl std::fmt::Display for DataWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataWarning::InsufficientData {
                column,
                window,
                bars,
            } => write!(
                f,
                "{column}: window {window} exceeds the {bars} available bars, column is empty"
            ),
            DataWarning::InsaneBars { count } => {
                write!(f, "{count} bar(s) have inconsistent OHLC values")
            }
        }
    }
}

/// The assembled table plus any warnings raised on the way.
#[derive(Debug, Clone)]
pub struct FeatureOutput {
    pub table: FeatureTable,
    pub warnings: Vec<DataWarning>,
    /// Largest drawdown over the series.
    pub max_drawdown: f64,
}

/// Run every engine over `series` and join the results.
pub fn build_features(
    series: &PriceSeries,
    config: &FeatureConfig,
) -> Result<FeatureOutput, PipelineError> {
    config.validate()?;

    let n = series.len();
    let closes = series.closes();
    let specs = config.moving_averages();
    let mut warnings = insufficient_data(series, config);
    for w in &warnings {
        warn!(symbol = series.symbol(), "{w}");
    }

    let mas = MovingAverages::compute(series, &specs);
    let derived = DerivedIndicators::compute(&closes, &mas, &config.derived_params());
    debug!(moving_averages = mas.len(), "indicators computed");

    let tracker = DrawdownTracker::new(config.peak_mode, config.correction_threshold);
    let states = tracker.track(&closes);
    let labels = Labels::compute(&drawdown::drawdowns(&states), &config.label_params());

    let table = FeatureTable::assemble(series, &mas, &derived, &states, &labels);
    let max_drawdown = drawdown::max_drawdown(&states);

    let insane = series.insane_bar_count();
    if insane > 0 {
        warn!(symbol = series.symbol(), count = insane, "bars with inconsistent OHLC");
        warnings.push(DataWarning::InsaneBars { count: insane });
    }

    info!(
        symbol = series.symbol(),
        rows = n,
        unknown_labels = labels.unknown_count(),
        max_drawdown,
        "feature table assembled"
    );

    Ok(FeatureOutput {
        table,
        warnings,
        max_drawdown,
    })
}

/// Validate raw bars into a series, then build the table.
pub fn build_features_from_bars(
    symbol: &str,
    bars: Vec<PriceBar>,
    config: &FeatureConfig,
) -> Result<FeatureOutput, PipelineError> {
    config.validate()?;
    let series = PriceSeries::new(symbol, bars)?;
    build_features(&series, config)
}

/// One warning per configured window that cannot produce a single value.
fn insufficient_data(series: &PriceSeries, config: &FeatureConfig) -> Vec<DataWarning> {
    let bars = series.len();
    let mut warnings: Vec<DataWarning> = config
        .moving_averages()
        .into_iter()
        .filter(|spec| spec.window > bars)
        .map(|spec| DataWarning::InsufficientData {
            column: spec.to_string(),
            window: spec.window,
            bars,
        })
        .collect();

    // Slopes need the MA plus slope_window more bars.
    for spec in &config.slope_windows {
        let needed = spec.window + config.slope_window;
        if spec.window <= bars && needed > bars {
            warnings.push(DataWarning::InsufficientData {
                column: format!("Slope_{spec}"),
                window: needed,
                bars,
            });
        }
    }

    if let Some(k) = config.forward_window.filter(|&k| k >= bars && k > 0) {
        warnings.push(DataWarning::InsufficientData {
            column: "Label".to_string(),
            window: k,
            bars,
        });
    }
    warnings
}
