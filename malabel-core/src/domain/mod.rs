//! Domain types for MALabel

pub mod bar;
pub mod series;

pub use bar::PriceBar;
pub use series::{PriceSeries, SeriesError};

/// A single feature cell. `None` means "not yet computable" and is distinct
/// from any numeric value, including zero.
pub type Cell = Option<f64>;
