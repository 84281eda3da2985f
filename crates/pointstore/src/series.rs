//! The read surface shared by every series flavor.

use crate::error::{Result, StoreError};
use crate::memory::MemorySeries;
use crate::range::TimeRange;
use crate::row::Row;
use crate::schema::{self, Schema};
use std::sync::Arc;

/// One explicit sample of a single column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedValue {
    /// Sample time in milliseconds.
    pub timestamp: i64,
    /// The explicit reading.
    pub value: f64,
}

/// Read operations common to every series implementation.
///
/// `stream_values`, `load_into`, and `values_for_range` are derived from
/// [`stream_rows`](SeriesReader::stream_rows) and rarely need overriding.
pub trait SeriesReader {
    /// The schema shared by every row of this series.
    fn schema(&self) -> &Arc<Schema>;

    /// Timestamp of the earliest stored row, `i64::MAX` when empty.
    fn first_time(&self) -> i64;

    /// Streams the rows in `range` in timestamp order.
    ///
    /// Unset columns of each row hold carried-forward values. The visitor
    /// returns `false` to stop early.
    fn stream_rows(&self, range: TimeRange, visitor: &mut dyn FnMut(&Row) -> bool) -> Result<()>;

    /// Streams every explicit value in `range`, in row order and ascending
    /// column order within a row. The visitor returns `false` to stop early.
    fn stream_values(
        &self,
        range: TimeRange,
        visitor: &mut dyn FnMut(i64, &str, f64) -> bool,
    ) -> Result<()> {
        let schema = Arc::clone(self.schema());
        self.stream_rows(range, &mut |row| {
            for (i, column) in schema.columns().iter().enumerate() {
                if row.includes(schema::bit_for_index(i))
                    && !visitor(row.timestamp, column, row.values[i])
                {
                    return false;
                }
            }
            true
        })
    }

    /// Copies every row in `range` into `target`.
    fn load_into(&self, target: &mut MemorySeries, range: TimeRange) -> Result<()> {
        let mut failure = None;
        self.stream_rows(range, &mut |row| match target.store_row(row) {
            Ok(_) => true,
            Err(e) => {
                failure = Some(e);
                false
            }
        })?;
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Collects the explicit samples of `column` with timestamps in
    /// `[low, high]`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownColumn` if the schema has no such column.
    fn values_for_range(&self, column: &str, low: i64, high: i64) -> Result<Vec<TimedValue>> {
        let bit = self
            .schema()
            .bit_for(column)
            .ok_or_else(|| StoreError::UnknownColumn(column.to_string()))?;
        let index = schema::index_for_bit(bit);
        let mut samples = Vec::new();
        self.stream_rows(TimeRange::between(low, high), &mut |row| {
            if row.includes(bit) {
                samples.push(TimedValue {
                    timestamp: row.timestamp,
                    value: row.values[index],
                });
            }
            true
        })?;
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_store() -> (Arc<Schema>, MemorySeries) {
        let schema = Arc::new(Schema::new(["a", "b"]).unwrap());
        let mut store = MemorySeries::new(schema.clone(), false);
        let mut r1 = Row::new(1000, 0, 2);
        r1.set(&schema, "a", 1.0).unwrap();
        r1.set(&schema, "b", 2.0).unwrap();
        store.store_row(&r1).unwrap();
        let mut r2 = Row::new(2000, 0, 2);
        r2.set(&schema, "a", 5.0).unwrap();
        store.store_row(&r2).unwrap();
        (schema, store)
    }

    #[test]
    fn stream_values_visits_explicit_values_in_order() {
        let (_, store) = filled_store();
        let mut seen = Vec::new();
        store
            .stream_values(TimeRange::all(), &mut |t, c, v| {
                seen.push((t, c.to_string(), v));
                true
            })
            .unwrap();
        assert_eq!(
            seen,
            vec![
                (1000, "a".to_string(), 1.0),
                (1000, "b".to_string(), 2.0),
                (2000, "a".to_string(), 5.0),
            ]
        );
    }

    #[test]
    fn stream_values_skips_carried_values() {
        let (_, store) = filled_store();
        // "b" at t=2000 is carried forward, so it must not be reported.
        let mut count = 0;
        store
            .stream_values(TimeRange::since(2000), &mut |_, c, _| {
                assert_eq!(c, "a");
                count += 1;
                true
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn values_for_range_bounds_are_inclusive() {
        let (_, store) = filled_store();
        let samples = store.values_for_range("a", 1000, 2000).unwrap();
        assert_eq!(
            samples,
            vec![
                TimedValue { timestamp: 1000, value: 1.0 },
                TimedValue { timestamp: 2000, value: 5.0 },
            ]
        );
        assert!(store.values_for_range("a", 1001, 1999).unwrap().is_empty());
        assert!(store.values_for_range("nope", 0, 1).is_err());
    }

    #[test]
    fn load_into_copies_rows() {
        let (schema, store) = filled_store();
        let mut target = MemorySeries::new(schema, false);
        store.load_into(&mut target, TimeRange::all()).unwrap();
        assert_eq!(target.len(), 2);
        assert_eq!(target.index()[&2000].values, vec![5.0, 2.0]);
    }
}
