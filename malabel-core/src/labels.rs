//! Correction / bear-market flags and training labels.
//!
//! Flags are coincident: a bar is "in correction" when its drawdown is at or
//! above the correction threshold (ties trigger). Labels are either the
//! coincident class, or a forward-looking class computed over the window
//! (i, i+K]. Rows whose forward window runs past the end of the series get
//! `None` ("unknown"); they are never defaulted to 0.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

/// Label alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelMode {
    /// 0 = no event, 1 = event (see `LabelTarget`).
    #[default]
    Binary,
    /// 0 = none, 1 = correction, 2 = bear market. Bear takes precedence.
    Multiclass,
}

/// Which flag a binary label tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelTarget {
    #[default]
    Correction,
    Bear,
}

/// What counts as an event inside the forward window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForwardEvent {
    /// Any bar in the window is flagged.
    #[default]
    State,
    /// A bar in the window is the first bar of a flagged episode.
    Onset,
}

macro_rules! str_enum {
    ($ty:ty, $field:literal, { $($text:literal => $variant:path),+ $(,)? }) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $($variant => f.write_str($text),)+
                }
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_ascii_lowercase().as_str() {
                    $($text => Ok($variant),)+
                    other => Err(format!(
                        "unknown {} '{other}' (expected one of: {})",
                        $field,
                        [$($text),+].join(", ")
                    )),
                }
            }
        }
    };
}

str_enum!(LabelMode, "label mode", {
    "binary" => LabelMode::Binary,
    "multiclass" => LabelMode::Multiclass,
});

str_enum!(LabelTarget, "label target", {
    "correction" => LabelTarget::Correction,
    "bear" => LabelTarget::Bear,
});

str_enum!(ForwardEvent, "forward event", {
    "state" => ForwardEvent::State,
    "onset" => ForwardEvent::Onset,
});

/// Inputs of the labeling rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelParams {
    pub correction_threshold: f64,
    pub bear_threshold: f64,
    /// K in trading days. `None` or `Some(0)` means coincident labels.
    pub forward_window: Option<usize>,
    pub mode: LabelMode,
    pub target: LabelTarget,
    pub event: ForwardEvent,
}

impl Default for LabelParams {
    fn default() -> Self {
        Self {
            correction_threshold: 0.10,
            bear_threshold: 0.20,
            forward_window: None,
            mode: LabelMode::Binary,
            target: LabelTarget::Correction,
            event: ForwardEvent::State,
        }
    }
}

impl LabelParams {
    /// Effective K; zero means coincident.
    pub fn horizon(&self) -> usize {
        self.forward_window.unwrap_or(0)
    }
}

/// Per-bar flags and labels, same length as the drawdown input.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Labels {
    pub in_correction: Vec<bool>,
    pub in_bear_market: Vec<bool>,
    pub label: Vec<Option<u8>>,
}

impl Labels {
    /// Apply the thresholds and the labeling rule to a drawdown series.
    pub fn compute(drawdowns: &[f64], params: &LabelParams) -> Self {
        let in_correction = flags(drawdowns, params.correction_threshold);
        let in_bear_market = flags(drawdowns, params.bear_threshold);

        let k = params.horizon();
        let label = if k == 0 {
            coincident_codes(&in_correction, &in_bear_market, params)
                .into_iter()
                .map(Some)
                .collect()
        } else {
            let (correction, bear) = match params.event {
                ForwardEvent::State => (in_correction.clone(), in_bear_market.clone()),
                ForwardEvent::Onset => (onsets(&in_correction), onsets(&in_bear_market)),
            };
            forward_max(&coincident_codes(&correction, &bear, params), k)
        };

        Self {
            in_correction,
            in_bear_market,
            label,
        }
    }

    pub fn len(&self) -> usize {
        self.label.len()
    }

    pub fn is_empty(&self) -> bool {
        self.label.is_empty()
    }

    /// Number of rows whose label is unknown.
    pub fn unknown_count(&self) -> usize {
        self.label.iter().filter(|l| l.is_none()).count()
    }
}

/// `drawdown >= threshold` per bar.
pub fn flags(drawdowns: &[f64], threshold: f64) -> Vec<bool> {
    drawdowns.iter().map(|&d| d >= threshold).collect()
}

/// True where a flag switches on (position 0 counts if set).
pub fn onsets(flags: &[bool]) -> Vec<bool> {
    flags
        .iter()
        .enumerate()
        .map(|(i, &on)| on && (i == 0 || !flags[i - 1]))
        .collect()
}

/// Class code per bar for the configured mode.
fn coincident_codes(correction: &[bool], bear: &[bool], params: &LabelParams) -> Vec<u8> {
    correction
        .iter()
        .zip(bear)
        .map(|(&c, &b)| match params.mode {
            LabelMode::Binary => match params.target {
                LabelTarget::Correction => u8::from(c),
                LabelTarget::Bear => u8::from(b),
            },
            LabelMode::Multiclass => {
                if b {
                    2
                } else if c {
                    1
                } else {
                    0
                }
            }
        })
        .collect()
}

/// Maximum of `codes` over (i, i+k] for each i, `None` where i + k runs
/// past the end.
///
/// Walks the series backwards with a monotonic deque holding candidate
/// indices in decreasing code order, so each index is pushed and popped at
/// most once.
pub fn forward_max(codes: &[u8], k: usize) -> Vec<Option<u8>> {
    let n = codes.len();
    if k == 0 {
        return codes.iter().copied().map(Some).collect();
    }
    let k = k.min(n);
    let mut out = vec![None; n];

    let mut window: VecDeque<usize> = VecDeque::with_capacity(k + 1);
    for i in (0..n).rev() {
        let entering = i + 1;
        if entering < n {
            while window.back().is_some_and(|&j| codes[j] <= codes[entering]) {
                window.pop_back();
            }
            window.push_back(entering);
        }
        while window.front().is_some_and(|&j| j > i + k) {
            window.pop_front();
        }
        if i + k < n {
            out[i] = window.front().map(|&j| codes[j]);
        }
    }
    out
}
