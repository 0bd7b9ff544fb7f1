//! Feature and labeling configuration.
//!
//! A `RunConfig` has two sections, both optional in TOML:
//!
//! ```toml
//! [history]
//! years_back = 20
//! start = "2005-01-03"   # optional
//! end = "2024-12-31"     # optional
//!
//! [features]
//! slope_window = 10
//! correction_threshold = 0.10
//! bear_threshold = 0.20
//! forward_window = 30    # omit for coincident labels
//! label_mode = "binary"  # or "multiclass"
//! ```
//!
//! `validate()` runs before any computation and rejects the whole
//! configuration on the first problem.

use crate::drawdown::PeakMode;
use crate::indicators::{DerivedParams, MaKind, MaSpec};
use crate::labels::{ForwardEvent, LabelMode, LabelParams, LabelTarget};
use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Invalid configuration. Raised before any bar is processed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be >= 1, got {window}")]
    InvalidWindow { field: &'static str, window: usize },

    #[error("{field} must be in (0, 1), got {value}")]
    ThresholdOutOfRange { field: &'static str, value: f64 },

    #[error("bear_threshold ({bear}) must not be below correction_threshold ({correction})")]
    BearBelowCorrection { correction: f64, bear: f64 },

    #[error("forward window must not be negative, got {0}")]
    NegativeForwardWindow(i64),

    #[error("{field} references {spec}, which is not in the computed moving averages")]
    UnknownMovingAverage { field: &'static str, spec: MaSpec },

    #[error("start date {start} is after end date {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("years_back {0} does not produce a valid start date")]
    YearsBackOutOfRange(u32),

    #[error("read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize config TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Which part of the price history to request from the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryRange {
    /// Years of history when `start` is not given.
    pub years_back: u32,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl Default for HistoryRange {
    fn default() -> Self {
        Self {
            years_back: 20,
            start: None,
            end: None,
        }
    }
}

impl HistoryRange {
    /// Resolve to a concrete `(start, end)`.
    ///
    /// `end` defaults to `today`; `start` defaults to `years_back` years
    /// before the resolved end. `years_back` is ignored when both dates are set.
    pub fn resolve(&self, today: NaiveDate) -> Result<(NaiveDate, NaiveDate), ConfigError> {
        let end = self.end.unwrap_or(today);
        let start = match self.start {
            Some(start) => start,
            None => end
                .checked_sub_months(Months::new(self.years_back.saturating_mul(12)))
                .ok_or(ConfigError::YearsBackOutOfRange(self.years_back))?,
        };
        if start > end {
            return Err(ConfigError::InvalidDateRange { start, end });
        }
        Ok((start, end))
    }
}

/// Everything the core needs to turn a price series into a feature table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub sma_windows: Vec<usize>,
    pub ema_windows: Vec<usize>,
    /// Fast/slow pair for the golden cross and the SMA/EMA ratios.
    pub cross_fast: usize,
    pub cross_slow: usize,
    pub distance_windows: Vec<MaSpec>,
    pub slope_windows: Vec<MaSpec>,
    /// Slope look-back N in trading days.
    pub slope_window: usize,
    pub correction_threshold: f64,
    pub bear_threshold: f64,
    /// Forward label horizon K in trading days. No default: `None` means
    /// coincident labels.
    pub forward_window: Option<usize>,
    pub label_mode: LabelMode,
    pub label_target: LabelTarget,
    pub forward_event: ForwardEvent,
    pub peak_mode: PeakMode,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        let derived = DerivedParams::default();
        Self {
            sma_windows: vec![50, 100, 200],
            ema_windows: vec![50, 200],
            cross_fast: derived.cross_fast,
            cross_slow: derived.cross_slow,
            distance_windows: derived.distance_specs,
            slope_windows: derived.slope_specs,
            slope_window: derived.slope_window,
            correction_threshold: 0.10,
            bear_threshold: 0.20,
            forward_window: None,
            label_mode: LabelMode::default(),
            label_target: LabelTarget::default(),
            forward_event: ForwardEvent::default(),
            peak_mode: PeakMode::default(),
        }
    }
}

impl FeatureConfig {
    /// Check every option. Returns the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for &window in &self.sma_windows {
            check_window("sma_windows", window)?;
        }
        for &window in &self.ema_windows {
            check_window("ema_windows", window)?;
        }
        check_window("cross_fast", self.cross_fast)?;
        check_window("cross_slow", self.cross_slow)?;
        check_window("slope_window", self.slope_window)?;

        check_threshold("correction_threshold", self.correction_threshold)?;
        check_threshold("bear_threshold", self.bear_threshold)?;
        if self.bear_threshold < self.correction_threshold {
            return Err(ConfigError::BearBelowCorrection {
                correction: self.correction_threshold,
                bear: self.bear_threshold,
            });
        }

        for spec in [MaSpec::sma(self.cross_fast), MaSpec::ema(self.cross_fast)] {
            self.check_known("cross_fast", spec)?;
        }
        for spec in [MaSpec::sma(self.cross_slow), MaSpec::ema(self.cross_slow)] {
            self.check_known("cross_slow", spec)?;
        }
        for spec in &self.distance_windows {
            self.check_known("distance_windows", *spec)?;
        }
        for spec in &self.slope_windows {
            self.check_known("slope_windows", *spec)?;
        }
        Ok(())
    }

    /// Set K from a signed value, rejecting negatives.
    pub fn set_forward_window(&mut self, k: i64) -> Result<(), ConfigError> {
        let k = usize::try_from(k).map_err(|_| ConfigError::NegativeForwardWindow(k))?;
        self.forward_window = Some(k);
        Ok(())
    }

    /// Moving averages to compute, in column order (SMAs then EMAs, ascending window).
    pub fn moving_averages(&self) -> Vec<MaSpec> {
        let mut specs: Vec<MaSpec> = self
            .sma_windows
            .iter()
            .map(|&w| MaSpec::sma(w))
            .chain(self.ema_windows.iter().map(|&w| MaSpec::ema(w)))
            .collect();
        specs.sort();
        specs.dedup();
        specs
    }

    pub fn derived_params(&self) -> DerivedParams {
        DerivedParams {
            cross_fast: self.cross_fast,
            cross_slow: self.cross_slow,
            distance_specs: self.distance_windows.clone(),
            slope_specs: self.slope_windows.clone(),
            slope_window: self.slope_window,
        }
    }

    pub fn label_params(&self) -> LabelParams {
        LabelParams {
            correction_threshold: self.correction_threshold,
            bear_threshold: self.bear_threshold,
            forward_window: self.forward_window,
            mode: self.label_mode,
            target: self.label_target,
            event: self.forward_event,
        }
    }

    fn check_known(&self, field: &'static str, spec: MaSpec) -> Result<(), ConfigError> {
        let windows = match spec.kind {
            MaKind::Sma => &self.sma_windows,
            MaKind::Ema => &self.ema_windows,
        };
        if windows.contains(&spec.window) {
            Ok(())
        } else {
            Err(ConfigError::UnknownMovingAverage { field, spec })
        }
    }
}

fn check_window(field: &'static str, window: usize) -> Result<(), ConfigError> {
    if window == 0 {
        return Err(ConfigError::InvalidWindow { field, window });
    }
    Ok(())
}

fn check_threshold(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(value > 0.0 && value < 1.0) {
        return Err(ConfigError::ThresholdOutOfRange { field, value });
    }
    Ok(())
}

/// Full configuration file: history range plus feature options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub history: HistoryRange,
    pub features: FeatureConfig,
}

impl RunConfig {
    /// Load a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn default_config_is_valid() {
        let config = FeatureConfig::default();
        config.validate().unwrap();
        assert_eq!(config.forward_window, None);
        assert_eq!(
            config.moving_averages(),
            vec![
                MaSpec::sma(50),
                MaSpec::sma(100),
                MaSpec::sma(200),
                MaSpec::ema(50),
                MaSpec::ema(200)
            ]
        );
    }

    #[test]
    fn rejects_zero_window() {
        let config = FeatureConfig {
            slope_window: 0,
            ..FeatureConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidWindow {
                field: "slope_window",
                window: 0
            }
        ));

        let config = FeatureConfig {
            sma_windows: vec![50, 0],
            ..FeatureConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidWindow { field: "sma_windows", .. })
        ));
    }

    #[test]
    fn rejects_threshold_outside_unit_interval() {
        for bad in [0.0, 1.0, -0.1, 1.5, f64::NAN] {
            let config = FeatureConfig {
                correction_threshold: bad,
                ..FeatureConfig::default()
            };
            assert!(
                matches!(config.validate(), Err(ConfigError::ThresholdOutOfRange { .. })),
                "threshold {bad} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_bear_below_correction() {
        let config = FeatureConfig {
            correction_threshold: 0.25,
            bear_threshold: 0.20,
            ..FeatureConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BearBelowCorrection { .. })
        ));
    }

    #[test]
    fn rejects_negative_forward_window() {
        let mut config = FeatureConfig::default();
        assert!(matches!(
            config.set_forward_window(-3),
            Err(ConfigError::NegativeForwardWindow(-3))
        ));
        assert_eq!(config.forward_window, None);
        config.set_forward_window(30).unwrap();
        assert_eq!(config.forward_window, Some(30));
    }

    #[test]
    fn rejects_unknown_slope_spec() {
        let config = FeatureConfig {
            slope_windows: vec![MaSpec::ema(100)],
            ..FeatureConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownMovingAverage {
                field: "slope_windows",
                ..
            })
        ));
    }

    #[test]
    fn rejects_cross_pair_missing_from_windows() {
        let config = FeatureConfig {
            sma_windows: vec![20, 60],
            ema_windows: vec![20, 60],
            distance_windows: vec![MaSpec::sma(60)],
            slope_windows: vec![MaSpec::ema(20)],
            ..FeatureConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownMovingAverage {
                field: "cross_fast",
                ..
            })
        ));

        // SMA side present, EMA slow side absent
        let config = FeatureConfig {
            sma_windows: vec![20, 60],
            ema_windows: vec![20],
            cross_fast: 20,
            cross_slow: 60,
            distance_windows: vec![],
            slope_windows: vec![],
            ..FeatureConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownMovingAverage {
                field: "cross_slow",
                spec,
            }) if spec == MaSpec::ema(60)
        ));

        let config = FeatureConfig {
            ema_windows: vec![20, 60],
            ..config
        };
        config.validate().unwrap();
    }

    #[test]
    fn history_defaults_to_years_back_from_end() {
        let range = HistoryRange::default();
        let (start, end) = range.resolve(date(2024, 6, 14)).unwrap();
        assert_eq!(end, date(2024, 6, 14));
        assert_eq!(start, date(2004, 6, 14));
    }

    #[test]
    fn history_explicit_dates_ignore_years_back() {
        let range = HistoryRange {
            years_back: 1,
            start: Some(date(2000, 1, 3)),
            end: Some(date(2010, 12, 31)),
        };
        let (start, end) = range.resolve(date(2024, 6, 14)).unwrap();
        assert_eq!((start, end), (date(2000, 1, 3), date(2010, 12, 31)));
    }

    #[test]
    fn history_rejects_inverted_range() {
        let range = HistoryRange {
            start: Some(date(2020, 1, 1)),
            end: Some(date(2019, 1, 1)),
            ..HistoryRange::default()
        };
        assert!(matches!(
            range.resolve(date(2024, 1, 1)),
            Err(ConfigError::InvalidDateRange { .. })
        ));
    }

    #[test]
    fn parses_partial_toml() {
        let config = RunConfig::from_toml(
            r#"
[history]
years_back = 5

[features]
forward_window = 30
label_mode = "multiclass"
peak_mode = "reset_after_correction"
slope_windows = ["SMA200"]
"#,
        )
        .unwrap();
        assert_eq!(config.history.years_back, 5);
        assert_eq!(config.features.forward_window, Some(30));
        assert_eq!(config.features.label_mode, LabelMode::Multiclass);
        assert_eq!(config.features.peak_mode, PeakMode::ResetAfterCorrection);
        assert_eq!(config.features.slope_windows, vec![MaSpec::sma(200)]);
        // untouched fields keep their defaults
        assert_eq!(config.features.slope_window, 10);
        config.features.validate().unwrap();
    }

    #[test]
    fn toml_roundtrip() {
        let mut config = RunConfig::default();
        config.features.forward_window = Some(60);
        config.history.start = Some(date(2010, 1, 4));
        let text = config.to_toml().unwrap();
        assert_eq!(RunConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn rejects_bad_toml() {
        assert!(matches!(
            RunConfig::from_toml("[features]\nslope_window = \"ten\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            RunConfig::from_toml("[features]\nslope_windows = [\"WMA20\"]"),
            Err(ConfigError::Parse(_))
        ));
    }
}
