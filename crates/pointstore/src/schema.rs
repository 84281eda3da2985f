//! Column schema shared by every row of a series.
//!
//! A [`Schema`] is an immutable, ordered list of up to 64 column names fixed
//! when the series is created. Column *i* is addressed by index `i` in a
//! row's value array and by bit `1 << i` in its column mask. Every component
//! operating on one series shares a single schema by reference
//! (`Arc<Schema>`).

use crate::error::{Result, StoreError};
use std::collections::HashMap;

/// Maximum number of columns addressable by the 64-bit column mask.
pub const MAX_COLUMNS: usize = 64;

/// Immutable mapping from column name to (bit, index).
#[derive(Debug, Clone)]
pub struct Schema {
    columns: Vec<String>,
    index: HashMap<String, usize>,
}

impl Schema {
    /// Creates a schema from an ordered list of column names.
    ///
    /// # Errors
    ///
    /// Returns `TooManyColumns` for more than [`MAX_COLUMNS`] names and
    /// `DuplicateColumn` if a name repeats.
    pub fn new<S, I>(names: I) -> Result<Self>
    where
        S: Into<String>,
        I: IntoIterator<Item = S>,
    {
        let columns: Vec<String> = names.into_iter().map(Into::into).collect();
        if columns.len() > MAX_COLUMNS {
            return Err(StoreError::TooManyColumns(columns.len()));
        }
        let mut index = HashMap::with_capacity(columns.len());
        for (i, name) in columns.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(StoreError::DuplicateColumn(name.clone()));
            }
        }
        Ok(Self { columns, index })
    }

    /// Number of columns in a row.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// True if the schema has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// The ordered column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Index of the named column in a row's value array.
    pub fn index_of(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }

    /// The single-bit mask for the named column.
    pub fn bit_for(&self, column: &str) -> Option<u64> {
        self.index_of(column).map(bit_for_index)
    }
}

/// The single-bit mask addressing column `index`.
pub fn bit_for_index(index: usize) -> u64 {
    1 << index
}

/// The column index addressed by a single-bit mask.
pub fn index_for_bit(bit: u64) -> usize {
    bit.trailing_zeros() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_names_to_bits_and_indices() {
        let schema = Schema::new(["speed", "power", "odometer"]).unwrap();
        assert_eq!(schema.len(), 3);
        assert_eq!(schema.index_of("speed"), Some(0));
        assert_eq!(schema.index_of("odometer"), Some(2));
        assert_eq!(schema.bit_for("power"), Some(0b10));
        assert_eq!(schema.bit_for("missing"), None);
        assert_eq!(index_for_bit(0b100), 2);
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = Schema::new(["a", "b", "a"]).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateColumn(name) if name == "a"));
    }

    #[test]
    fn rejects_more_than_64_columns() {
        let names: Vec<String> = (0..65).map(|i| format!("c{i}")).collect();
        let err = Schema::new(names).unwrap_err();
        assert!(matches!(err, StoreError::TooManyColumns(65)));
    }

    #[test]
    fn allows_exactly_64_columns() {
        let names: Vec<String> = (0..64).map(|i| format!("c{i}")).collect();
        let schema = Schema::new(names).unwrap();
        assert_eq!(schema.bit_for("c63"), Some(1 << 63));
    }
}
