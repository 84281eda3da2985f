//! pointstore — append-only storage for sparse, multi-column time series.
//!
//! The crate records irregularly-sampled numeric readings (up to 64 columns
//! per series, vehicle telemetry being the motivating workload) keyed by
//! millisecond timestamp, and serves point and range queries over them.
//!
//! # Components
//!
//! - [`Schema`] / [`Row`]: column layout and one timestamped sample
//! - [`MemorySeries`]: ordered in-memory index with merge-on-duplicate and
//!   carry-forward semantics
//! - [`PersistentSeries`]: two-file, delta-encoded, append-only repository
//! - [`CachedSeries`]: warm in-memory window over the durable log
//! - [`SeriesReader`] / [`export`]: range streaming and tabular export
//!
//! # Example
//!
//! ```rust,ignore
//! use pointstore::{CachedSeries, RepoConfig, Schema, SeriesReader, TimeRange};
//! use std::sync::Arc;
//!
//! let schema = Arc::new(Schema::new(["speed", "power"])?);
//! let mut series = CachedSeries::open(dir, "telemetry", schema, RepoConfig::default())?;
//!
//! series.store_value(1_000, "speed", 88.0)?;
//! series.store_value(1_000, "power", 11.5)?;
//! series.store_value(2_000, "speed", 91.0)?;
//!
//! series.stream_rows(TimeRange::all(), &mut |row| {
//!     println!("{row}");
//!     true
//! })?;
//! series.close()?;
//! ```

#![deny(missing_docs)]

pub mod cached;
pub mod error;
pub mod export;
pub mod memory;
pub mod range;
pub mod repo;
pub mod row;
pub mod schema;
pub mod series;

pub use cached::{CachedSeries, RangeIndex};
pub use error::{Result, StoreError};
pub use export::{export, Cell, CsvSink, TableSink};
pub use memory::MemorySeries;
pub use range::TimeRange;
pub use repo::{PersistentSeries, RepoConfig};
pub use row::Row;
pub use schema::{Schema, MAX_COLUMNS};
pub use series::{SeriesReader, TimedValue};
