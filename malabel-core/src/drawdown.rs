//! Drawdown tracking: running peak and peak-to-close decline per bar.
//!
//! **Core rule:** in the default mode the running peak may rise, never fall.
//!
//! The tracker is a fold: `advance(previous state, next close) -> new state`.
//! There is no hidden state; re-running over the same closes yields the same
//! states.
//!
//! # Example
//! ```
//! use malabel_core::drawdown::{DrawdownTracker, PeakMode};
//!
//! let tracker = DrawdownTracker::new(PeakMode::SinceInception, 0.10);
//! let states = tracker.track(&[100.0, 110.0, 99.0]);
//! assert_eq!(states[1].running_peak, 110.0);
//! assert!((states[2].drawdown - 0.10).abs() < 1e-12);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the running peak evolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeakMode {
    /// Highest close since the first bar. Never decreases.
    #[default]
    SinceInception,
    /// Highest close since the last correction ended. When the drawdown has
    /// been at or above the correction threshold and then falls back below
    /// it, the peak resets to that bar's close.
    ResetAfterCorrection,
}

impl fmt::Display for PeakMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeakMode::SinceInception => f.write_str("since_inception"),
            PeakMode::ResetAfterCorrection => f.write_str("reset_after_correction"),
        }
    }
}

impl FromStr for PeakMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "since_inception" => Ok(PeakMode::SinceInception),
            "reset_after_correction" => Ok(PeakMode::ResetAfterCorrection),
            other => Err(format!(
                "unknown peak mode '{other}' (expected since_inception or reset_after_correction)"
            )),
        }
    }
}

/// Tracker state after one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrawdownState {
    pub running_peak: f64,
    /// `(running_peak - close) / running_peak`, in [0, 1).
    pub drawdown: f64,
    /// True while the drawdown is at or above the correction threshold.
    pub in_correction_episode: bool,
}

/// Running-peak drawdown tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawdownTracker {
    mode: PeakMode,
    correction_threshold: f64,
}

impl DrawdownTracker {
    pub fn new(mode: PeakMode, correction_threshold: f64) -> Self {
        Self {
            mode,
            correction_threshold,
        }
    }

    /// State for the first bar: the peak is its close, drawdown zero.
    pub fn start(&self, close: f64) -> DrawdownState {
        DrawdownState {
            running_peak: close,
            drawdown: 0.0,
            in_correction_episode: false,
        }
    }

    /// Pure transition to the next bar.
    pub fn advance(&self, prev: &DrawdownState, close: f64) -> DrawdownState {
        let running_peak = prev.running_peak.max(close);
        let drawdown = (running_peak - close) / running_peak;
        let in_episode = drawdown >= self.correction_threshold;

        if self.mode == PeakMode::ResetAfterCorrection && prev.in_correction_episode && !in_episode
        {
            return self.start(close);
        }

        DrawdownState {
            running_peak,
            drawdown,
            in_correction_episode: in_episode,
        }
    }

    /// Fold over all closes in order.
    pub fn track(&self, closes: &[f64]) -> Vec<DrawdownState> {
        let mut states: Vec<DrawdownState> = Vec::with_capacity(closes.len());
        for &close in closes {
            let next = match states.last() {
                Some(prev) => self.advance(prev, close),
                None => self.start(close),
            };
            states.push(next);
        }
        states
    }
}

/// Drawdown fractions only.
pub fn drawdowns(states: &[DrawdownState]) -> Vec<f64> {
    states.iter().map(|s| s.drawdown).collect()
}

/// Largest drawdown seen, 0.0 for an empty slice.
pub fn max_drawdown(states: &[DrawdownState]) -> f64 {
    states.iter().map(|s| s.drawdown).fold(0.0, f64::max)
}
