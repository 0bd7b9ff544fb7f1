//! Price-history collaborators: providers and preparation of raw bars.
//!
//! The core never calls into this module; the CLI fetches raw bars here and
//! hands a prepared `PriceSeries` to the pipeline.

pub mod csv_import;
pub mod prepare;
pub mod provider;
pub mod yahoo;

pub use csv_import::CsvProvider;
pub use prepare::{fill_forward, prepare, FillReport};
pub use provider::{DataError, DataProvider, DataSource, FetchResult, RawBar};
pub use yahoo::YahooProvider;
