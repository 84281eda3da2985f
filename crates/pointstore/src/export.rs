//! Row-oriented tabular export.
//!
//! [`export`] streams a time range of any readable series into a
//! [`TableSink`]: one sink row per stored sample, restricted to a column
//! selection, with carried-forward values either included or blanked.
//! [`CsvSink`] is the bundled sink.

use crate::error::{Result, StoreError};
use crate::range::TimeRange;
use crate::schema::bit_for_index;
use crate::series::SeriesReader;
use chrono::{Local, TimeZone};
use std::io::Write;

/// One cell of an exported row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    /// The cell value (0 when a carried value is excluded).
    pub value: f64,
    /// True if the value was carried forward rather than observed.
    pub derived: bool,
}

/// Receives the rows of a tabular export.
pub trait TableSink {
    /// Called once with the exported column names, before any row.
    fn begin(&mut self, columns: &[&str]) -> Result<()>;

    /// Called once per exported row, cells in the order given to `begin`.
    fn row(&mut self, timestamp: i64, cells: &[Cell]) -> Result<()>;

    /// Called once after the last row.
    fn finish(&mut self) -> Result<()>;
}

/// Exports the rows of `range` to `sink`.
///
/// `columns` restricts the export to the named columns (`None` means all);
/// the output order always follows the schema. Rows with no explicit value
/// among the selected columns are skipped. When `include_derived` is false,
/// carried-forward cells are written as 0.
///
/// # Errors
///
/// Returns `UnknownColumn` for a selected name missing from the schema;
/// sink failures propagate.
pub fn export<S, K>(
    series: &S,
    sink: &mut K,
    range: TimeRange,
    columns: Option<&[&str]>,
    include_derived: bool,
) -> Result<()>
where
    S: SeriesReader + ?Sized,
    K: TableSink,
{
    let schema = Arc::clone(series.schema());
    let selected: Vec<usize> = match columns {
        None => (0..schema.len()).collect(),
        Some(names) => {
            for name in names {
                if schema.index_of(name).is_none() {
                    return Err(StoreError::UnknownColumn((*name).to_string()));
                }
            }
            (0..schema.len())
                .filter(|&i| names.iter().any(|n| *n == schema.columns()[i]))
                .collect()
        }
    };
    let mask: u64 = selected.iter().fold(0, |m, &i| m | bit_for_index(i));
    let names: Vec<&str> = selected
        .iter()
        .map(|&i| schema.columns()[i].as_str())
        .collect();
    sink.begin(&names)?;

    let mut cells = Vec::with_capacity(selected.len());
    let mut failure = None;
    series.stream_rows(range, &mut |row| {
        // Rows holding only carried values for this selection say nothing.
        if row.bits & mask == 0 {
            return true;
        }
        cells.clear();
        for &i in &selected {
            let derived = row.excludes(bit_for_index(i));
            let value = if !derived || include_derived {
                row.values[i]
            } else {
                0.0
            };
            cells.push(Cell { value, derived });
        }
        match sink.row(row.timestamp, &cells) {
            Ok(()) => true,
            Err(e) => {
                failure = Some(e);
                false
            }
        }
    })?;
    if let Some(e) = failure {
        return Err(e);
    }
    sink.finish()
}

use std::sync::Arc;

/// Comma-separated sink writing one line per row: the raw timestamp first,
/// the selected columns, and a formatted local date last.
pub struct CsvSink<W: Write> {
    out: W,
}

impl<W: Write> CsvSink<W> {
    /// Wraps a writer.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> TableSink for CsvSink<W> {
    fn begin(&mut self, columns: &[&str]) -> Result<()> {
        write!(self.out, "Timestamp")?;
        for column in columns {
            write!(self.out, ",{column}")?;
        }
        writeln!(self.out, ",Date")?;
        Ok(())
    }

    fn row(&mut self, timestamp: i64, cells: &[Cell]) -> Result<()> {
        write!(self.out, "{timestamp}")?;
        for cell in cells {
            write!(self.out, ",{}", cell.value)?;
        }
        let date = Local
            .timestamp_millis_opt(timestamp)
            .single()
            .map(|d| d.format("%m/%d/%y %H:%M:%S").to_string())
            .unwrap_or_default();
        writeln!(self.out, ",{date}")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySeries;
    use crate::row::Row;
    use crate::schema::Schema;

    struct Collected {
        columns: Vec<String>,
        rows: Vec<(i64, Vec<Cell>)>,
        finished: bool,
    }

    impl Collected {
        fn new() -> Self {
            Self {
                columns: Vec::new(),
                rows: Vec::new(),
                finished: false,
            }
        }
    }

    impl TableSink for Collected {
        fn begin(&mut self, columns: &[&str]) -> Result<()> {
            self.columns = columns.iter().map(|c| c.to_string()).collect();
            Ok(())
        }

        fn row(&mut self, timestamp: i64, cells: &[Cell]) -> Result<()> {
            self.rows.push((timestamp, cells.to_vec()));
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            self.finished = true;
            Ok(())
        }
    }

    fn store() -> MemorySeries {
        let schema = Arc::new(Schema::new(["a", "b"]).unwrap());
        let mut store = MemorySeries::new(schema.clone(), false);
        let mut r1 = Row::new(1000, 0, 2);
        r1.set(&schema, "a", 1.0).unwrap();
        r1.set(&schema, "b", 2.0).unwrap();
        store.store_row(&r1).unwrap();
        let mut r2 = Row::new(2000, 0, 2);
        r2.set(&schema, "a", 5.0).unwrap();
        store.store_row(&r2).unwrap();
        store
    }

    #[test]
    fn exports_all_columns_with_derived_values() {
        let store = store();
        let mut sink = Collected::new();
        export(&store, &mut sink, TimeRange::all(), None, true).unwrap();
        assert_eq!(sink.columns, vec!["a", "b"]);
        assert_eq!(sink.rows.len(), 2);
        let (timestamp, cells) = &sink.rows[1];
        assert_eq!(*timestamp, 2000);
        assert_eq!(cells[0], Cell { value: 5.0, derived: false });
        assert_eq!(cells[1], Cell { value: 2.0, derived: true });
        assert!(sink.finished);
    }

    #[test]
    fn excluded_derived_values_are_blanked() {
        let store = store();
        let mut sink = Collected::new();
        export(&store, &mut sink, TimeRange::all(), None, false).unwrap();
        let (_, cells) = &sink.rows[1];
        assert_eq!(cells[1], Cell { value: 0.0, derived: true });
    }

    #[test]
    fn selection_skips_rows_without_explicit_values() {
        let store = store();
        let mut sink = Collected::new();
        // Only "b" selected: the row at 2000 carries b forward, so it is
        // skipped entirely.
        export(&store, &mut sink, TimeRange::all(), Some(&["b"]), true).unwrap();
        assert_eq!(sink.columns, vec!["b"]);
        assert_eq!(sink.rows.len(), 1);
        assert_eq!(sink.rows[0].0, 1000);
    }

    #[test]
    fn unknown_selection_fails() {
        let store = store();
        let mut sink = Collected::new();
        let err = export(&store, &mut sink, TimeRange::all(), Some(&["zz"]), true).unwrap_err();
        assert!(matches!(err, StoreError::UnknownColumn(_)));
    }

    #[test]
    fn csv_sink_writes_header_values_and_date() {
        let store = store();
        let mut sink = CsvSink::new(Vec::new());
        export(&store, &mut sink, TimeRange::all(), None, true).unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Timestamp,a,b,Date");
        assert!(lines[1].starts_with("1000,1,2,"));
        assert!(lines[2].starts_with("2000,5,2,"));
    }
}
