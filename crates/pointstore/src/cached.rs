//! Two-tier series: a warm in-memory window over a persistent log.
//!
//! Writes always land in the in-memory window first and are then forwarded
//! to the repository, so the window covers everything from its earliest row
//! onward. Reads pick exactly one authoritative backend per range: the warm
//! window when it covers the range, otherwise a scratch index materialized
//! from the repository.

use crate::error::Result;
use crate::memory::MemorySeries;
use crate::range::TimeRange;
use crate::repo::{PersistentSeries, RepoConfig};
use crate::row::Row;
use crate::schema::Schema;
use crate::series::SeriesReader;
use std::collections::{btree_map, BTreeMap};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Which backend is authoritative for a query range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    /// The warm in-memory window.
    Warm,
    /// The persistent repository.
    Durable,
}

enum Repr<'a> {
    Warm(&'a BTreeMap<i64, Row>, TimeRange),
    Loaded(BTreeMap<i64, Row>),
}

/// A read-only, timestamp-ordered index over a query range.
///
/// Warm ranges borrow the live in-memory index; ranges served from the
/// repository own a freshly loaded map.
pub struct RangeIndex<'a>(Repr<'a>);

impl RangeIndex<'_> {
    /// Iterates `(timestamp, row)` pairs in timestamp order.
    pub fn iter(&self) -> btree_map::Range<'_, i64, Row> {
        let (map, range) = match &self.0 {
            Repr::Warm(map, range) => (*map, *range),
            Repr::Loaded(map) => (map, TimeRange::all()),
        };
        map.range(range.as_bounds())
    }

    /// Number of rows in the view.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// True if the view holds no rows.
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// The first row in the view.
    pub fn first(&self) -> Option<(&i64, &Row)> {
        self.iter().next()
    }

    /// The last row in the view.
    pub fn last(&self) -> Option<(&i64, &Row)> {
        self.iter().next_back()
    }
}

/// A persistent series fronted by a warm in-memory window.
pub struct CachedSeries {
    schema: Arc<Schema>,
    memory: MemorySeries,
    persistent: Arc<PersistentSeries>,
}

impl CachedSeries {
    /// Opens the series with an empty warm window.
    pub fn open(
        dir: &Path,
        base: &str,
        schema: Arc<Schema>,
        config: RepoConfig,
    ) -> Result<Self> {
        let memory = MemorySeries::new(Arc::clone(&schema), true);
        let persistent = PersistentSeries::open(dir, base, Arc::clone(&schema), config)?;
        Ok(Self {
            schema,
            memory,
            persistent,
        })
    }

    /// Opens the series and pre-loads `cache_range` from the repository
    /// into the warm window.
    pub fn open_with_cache(
        dir: &Path,
        base: &str,
        schema: Arc<Schema>,
        cache_range: TimeRange,
        config: RepoConfig,
    ) -> Result<Self> {
        let mut series = Self::open(dir, base, schema, config)?;
        series.persistent.load_into(&mut series.memory, cache_range)?;
        Ok(series)
    }

    /// Stores a row in the warm window and forwards the merged result to
    /// the repository.
    pub fn store_row(&mut self, row: &Row) -> Result<Row> {
        let stored = self.memory.store_row(row)?;
        self.persistent.store_row(&stored)
    }

    /// Stores a single named-column reading at `timestamp`.
    ///
    /// NaN and infinite values are elided, so the stored row may carry no
    /// explicit column at all.
    ///
    /// # Errors
    ///
    /// Returns `UnknownColumn` if the schema has no such column.
    pub fn store_value(&mut self, timestamp: i64, column: &str, value: f64) -> Result<Row> {
        let mut row = Row::new(timestamp, 0, self.schema.len());
        row.set(&self.schema, column, value)?;
        self.store_row(&row)
    }

    /// An ordered read-only index over `range`, served by the authoritative
    /// backend for that range.
    pub fn index(&self, range: TimeRange) -> Result<RangeIndex<'_>> {
        match self.backend_for(range) {
            Backend::Warm => Ok(RangeIndex(Repr::Warm(self.memory.index(), range))),
            Backend::Durable => {
                let mut scratch = MemorySeries::new(Arc::clone(&self.schema), false);
                self.persistent.load_into(&mut scratch, range)?;
                Ok(RangeIndex(Repr::Loaded(scratch.into_index())))
            }
        }
    }

    /// Read-only access to the warm in-memory window.
    pub fn memory(&self) -> &MemorySeries {
        &self.memory
    }

    /// Forces the repository to durably write its pending row.
    pub fn flush(&self) -> Result<()> {
        self.persistent.flush()
    }

    /// Flushes, then releases the repository's file handles.
    pub fn close(&self) -> Result<()> {
        self.persistent.close()
    }

    /// Selects the authoritative backend for `range`.
    ///
    /// The warm window serves a range iff its earliest timestamp is at most
    /// the repository's earliest, or at most the range's lower bound; any
    /// other range is answered from the repository. A partially warmed
    /// window could in principle leave a window-straddling range
    /// under-covered, but with write-through warming the window always
    /// covers everything from its earliest row onward.
    fn backend_for(&self, range: TimeRange) -> Backend {
        let first_warm = self.memory.first_time();
        let first_durable = self.persistent.first_time();
        let warm = first_warm <= first_durable
            || range.lower().map_or(false, |lower| first_warm <= lower);
        debug!(warm, "selected query backend");
        if warm {
            Backend::Warm
        } else {
            Backend::Durable
        }
    }
}

impl SeriesReader for CachedSeries {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    fn first_time(&self) -> i64 {
        self.memory.first_time().min(self.persistent.first_time())
    }

    fn stream_rows(&self, range: TimeRange, visitor: &mut dyn FnMut(&Row) -> bool) -> Result<()> {
        match self.backend_for(range) {
            Backend::Warm => self.memory.stream_rows(range, visitor),
            Backend::Durable => self.persistent.stream_rows(range, visitor),
        }
    }
}
