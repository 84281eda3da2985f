//! Ordered in-memory store for a series of rows.
//!
//! Rows live in a `BTreeMap` keyed by timestamp, so key order equals time
//! order. Storing a row at the newest timestamp coalesces it into the
//! existing row; storing at a later timestamp appends a row whose unset
//! columns inherit the last known readings (carry-forward). A synthetic
//! zeroth row backs the "previous row" so both rules are defined before any
//! real data arrives; it is never visible to readers.

use crate::error::{Result, StoreError};
use crate::range::TimeRange;
use crate::row::Row;
use crate::schema::{bit_for_index, Schema};
use crate::series::SeriesReader;
use std::collections::{btree_map, BTreeMap};
use std::sync::Arc;
use tracing::debug;

/// In-memory time series with an ordered timestamp index.
pub struct MemorySeries {
    schema: Arc<Schema>,
    index: BTreeMap<i64, Row>,
    zeroth: Row,
    force_ordering: bool,
}

impl MemorySeries {
    /// Creates an empty store.
    ///
    /// With `force_ordering`, a row older than the newest stored row is
    /// clamped to the newest timestamp (and coalesced there); without it,
    /// such a row is rejected with `OutOfOrderTimestamp`.
    pub fn new(schema: Arc<Schema>, force_ordering: bool) -> Self {
        let zeroth = Row::empty(schema.len());
        Self {
            schema,
            index: BTreeMap::new(),
            zeroth,
            force_ordering,
        }
    }

    /// Appends or coalesces a row and returns the stored result.
    ///
    /// # Errors
    ///
    /// Returns `OutOfOrderTimestamp` for an old timestamp when forced
    /// ordering is off; the store is left unchanged.
    pub fn store_row(&mut self, row: &Row) -> Result<Row> {
        let prev_ts = self.last_timestamp();
        let effective = if row.timestamp >= prev_ts {
            row.timestamp
        } else if self.force_ordering {
            debug!(latest = prev_ts, got = row.timestamp, "clamping out-of-order timestamp");
            prev_ts
        } else {
            return Err(StoreError::OutOfOrderTimestamp {
                latest: prev_ts,
                got: row.timestamp,
            });
        };

        if effective == prev_ts {
            // Same-instant partial updates accumulate into one row.
            if let Some(existing) = self.index.get_mut(&effective) {
                existing.merge_from(row);
                return Ok(existing.clone());
            }
            // No real row yet: the update lands on the invisible zeroth row.
            self.zeroth.merge_from(row);
            return Ok(self.zeroth.clone());
        }

        // Unset columns inherit the last known readings.
        let prev_values = self
            .index
            .get(&prev_ts)
            .map_or(&self.zeroth.values, |r| &r.values);
        let mut stored = Row::with_values(effective, row.bits, prev_values);
        for i in 0..row.values.len().min(stored.values.len()) {
            if row.includes(bit_for_index(i)) {
                stored.values[i] = row.values[i];
            }
        }
        self.index.insert(effective, stored.clone());
        Ok(stored)
    }

    /// The full timestamp index. The returned view must not be mutated
    /// through interior means; it reflects live store contents.
    pub fn index(&self) -> &BTreeMap<i64, Row> {
        &self.index
    }

    /// The sub-range of the index bounded by `range`.
    pub fn index_range(&self, range: TimeRange) -> btree_map::Range<'_, i64, Row> {
        self.index.range(range.as_bounds())
    }

    /// Consumes the store, yielding its index.
    pub fn into_index(self) -> BTreeMap<i64, Row> {
        self.index
    }

    /// Number of visible rows.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// True if no real row has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn last_timestamp(&self) -> i64 {
        self.index
            .keys()
            .next_back()
            .copied()
            .unwrap_or(self.zeroth.timestamp)
    }
}

impl SeriesReader for MemorySeries {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    fn first_time(&self) -> i64 {
        self.index.keys().next().copied().unwrap_or(i64::MAX)
    }

    fn stream_rows(&self, range: TimeRange, visitor: &mut dyn FnMut(&Row) -> bool) -> Result<()> {
        for row in self.index_range(range).map(|(_, r)| r) {
            if !visitor(row) {
                break;
            }
        }
        Ok(())
    }
}
