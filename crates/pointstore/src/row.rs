//! A single sample: timestamp, column mask, and values.

use crate::error::{Result, StoreError};
use crate::schema::{bit_for_index, Schema};
use std::fmt;

/// A row of readings collected at one timestamp.
///
/// A value at index *i* is explicit (freshly observed) iff bit *i* of
/// [`bits`](Row::bits) is set; otherwise the slot holds a carried-forward or
/// default value and must not be treated as a new observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Sample time in milliseconds.
    pub timestamp: i64,
    /// Mask of the columns with an explicit value at this timestamp.
    pub bits: u64,
    /// One slot per schema column, explicit or carried forward.
    pub values: Vec<f64>,
}

impl Row {
    /// Creates an empty row at timestamp 0 with no columns set.
    pub fn empty(n_columns: usize) -> Self {
        Self::new(0, 0, n_columns)
    }

    /// Creates a row with the given mask and zeroed values.
    pub fn new(timestamp: i64, bits: u64, n_columns: usize) -> Self {
        Self {
            timestamp,
            bits,
            values: vec![0.0; n_columns],
        }
    }

    /// Creates a row whose values are copied from `values`.
    pub fn with_values(timestamp: i64, bits: u64, values: &[f64]) -> Self {
        Self {
            timestamp,
            bits,
            values: values.to_vec(),
        }
    }

    /// True if the column addressed by `bit` has an explicit value.
    pub fn includes(&self, bit: u64) -> bool {
        self.bits & bit != 0
    }

    /// True if the column addressed by `bit` has no explicit value.
    pub fn excludes(&self, bit: u64) -> bool {
        self.bits & bit == 0
    }

    /// Sets the named column to `value` and marks it explicit.
    ///
    /// NaN and infinite readings are elided: the call succeeds but neither
    /// the value nor the mask bit is recorded.
    ///
    /// # Errors
    ///
    /// Returns `UnknownColumn` if the schema has no such column.
    pub fn set(&mut self, schema: &Schema, column: &str, value: f64) -> Result<()> {
        let index = schema
            .index_of(column)
            .ok_or_else(|| StoreError::UnknownColumn(column.to_string()))?;
        if !value.is_finite() {
            return Ok(());
        }
        self.values[index] = value;
        self.bits |= bit_for_index(index);
        Ok(())
    }

    /// Value of the named column, explicit or carried forward.
    pub fn get(&self, schema: &Schema, column: &str) -> Option<f64> {
        schema.index_of(column).map(|i| self.values[i])
    }

    /// Clears the explicit marker for the column addressed by `bit`.
    pub fn clear(&mut self, bit: u64) {
        self.bits &= !bit;
    }

    /// Merges another row's explicit values into this one.
    ///
    /// The timestamp is unchanged; the mask becomes the union of both masks.
    pub fn merge_from(&mut self, other: &Row) {
        for i in 0..other.values.len() {
            let bit = bit_for_index(i);
            if other.includes(bit) {
                self.values[i] = other.values[i];
                self.bits |= bit;
            }
        }
    }
}

impl fmt::Display for Row {
    /// Renders carried-forward values in parentheses.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ts: {}, bits: {:#x}, [", self.timestamp, self.bits)?;
        for (i, value) in self.values.iter().enumerate() {
            if i != 0 {
                write!(f, ", ")?;
            }
            if self.includes(bit_for_index(i)) {
                write!(f, "{value}")?;
            } else {
                write!(f, "({value})")?;
            }
        }
        write!(f, "]}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new(["a", "b", "c"]).unwrap()
    }

    #[test]
    fn set_marks_column_explicit() {
        let schema = schema();
        let mut row = Row::empty(schema.len());
        row.set(&schema, "b", 2.5).unwrap();
        assert_eq!(row.bits, 0b10);
        assert_eq!(row.get(&schema, "b"), Some(2.5));
        assert!(row.excludes(0b1));
    }

    #[test]
    fn set_elides_non_finite_values() {
        let schema = schema();
        let mut row = Row::empty(schema.len());
        row.set(&schema, "a", f64::NAN).unwrap();
        row.set(&schema, "b", f64::INFINITY).unwrap();
        assert_eq!(row.bits, 0);
    }

    #[test]
    fn set_rejects_unknown_column() {
        let schema = schema();
        let mut row = Row::empty(schema.len());
        let err = row.set(&schema, "nope", 1.0).unwrap_err();
        assert!(matches!(err, StoreError::UnknownColumn(_)));
    }

    #[test]
    fn merge_overwrites_explicit_columns_only() {
        let mut base = Row::with_values(1000, 0b011, &[1.0, 2.0, 3.0]);
        let update = Row::with_values(9999, 0b110, &[0.0, 20.0, 30.0]);
        base.merge_from(&update);
        assert_eq!(base.timestamp, 1000);
        assert_eq!(base.bits, 0b111);
        assert_eq!(base.values, vec![1.0, 20.0, 30.0]);
    }

    #[test]
    fn display_parenthesizes_carried_values() {
        let row = Row::with_values(5, 0b01, &[1.5, 2.5]);
        assert_eq!(row.to_string(), "{ts: 5, bits: 0x1, [1.5, (2.5)]}");
    }
}
