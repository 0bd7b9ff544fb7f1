//! MALabel Core: moving-average features and drawdown labels for one ticker.
//!
//! This crate contains the feature and label engine:
//! - Domain types (price bars, validated price series)
//! - SMA/EMA engine and the indicators derived from it
//! - Running-peak drawdown tracker
//! - Correction / bear-market flags and forward-looking labels
//! - Feature table assembly and the pipeline that wires it together
//!
//! Price-history providers (`data`) and exporters (`export`) are collaborators
//! around the engine; nothing in the engine performs I/O.

pub mod config;
pub mod data;
pub mod domain;
pub mod drawdown;
pub mod export;
pub mod features;
pub mod indicators;
pub mod labels;
pub mod pipeline;

pub use config::{ConfigError, FeatureConfig, HistoryRange, RunConfig};
pub use domain::{Cell, PriceBar, PriceSeries, SeriesError};
pub use features::{FeatureRow, FeatureTable};
pub use pipeline::{build_features, DataWarning, FeatureOutput, PipelineError};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: all core types are Send + Sync.
    ///
    /// Callers may move a table or a series to a worker thread; if any type
    /// stops satisfying this, the build breaks here.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::PriceBar>();
        require_sync::<domain::PriceBar>();
        require_send::<domain::PriceSeries>();
        require_sync::<domain::PriceSeries>();

        // Engines
        require_send::<indicators::MovingAverages>();
        require_sync::<indicators::MovingAverages>();
        require_send::<indicators::DerivedIndicators>();
        require_sync::<indicators::DerivedIndicators>();
        require_send::<drawdown::DrawdownTracker>();
        require_sync::<drawdown::DrawdownTracker>();
        require_send::<drawdown::DrawdownState>();
        require_sync::<drawdown::DrawdownState>();
        require_send::<labels::Labels>();
        require_sync::<labels::Labels>();

        // Output
        require_send::<features::FeatureTable>();
        require_sync::<features::FeatureTable>();
        require_send::<pipeline::FeatureOutput>();
        require_sync::<pipeline::FeatureOutput>();
        require_send::<export::RunManifest>();
        require_sync::<export::RunManifest>();

        // Config and errors
        require_send::<config::RunConfig>();
        require_sync::<config::RunConfig>();
        require_send::<pipeline::PipelineError>();
        require_sync::<pipeline::PipelineError>();

        // Providers
        require_send::<data::YahooProvider>();
        require_sync::<data::YahooProvider>();
        require_send::<data::CsvProvider>();
        require_sync::<data::CsvProvider>();
    }

    /// The engines only ever see closes: the moving-average trait takes a
    /// slice of prices and nothing else, so it cannot observe labels or
    /// future drawdowns.
    #[test]
    fn moving_average_trait_sees_only_closes() {
        fn _check_trait_object_builds(
            ma: &dyn indicators::MovingAverage,
            closes: &[f64],
        ) -> Vec<Cell> {
            ma.compute(closes)
        }
    }
}
