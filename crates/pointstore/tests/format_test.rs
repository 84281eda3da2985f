//! Byte-level checks of the on-disk representation.

use pointstore::{PersistentSeries, RepoConfig, Row, Schema, SeriesReader, TimeRange};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn config() -> RepoConfig {
    RepoConfig {
        background_flush: false,
        ..RepoConfig::default()
    }
}

fn schema() -> Arc<Schema> {
    Arc::new(Schema::new(["volts", "amps"]).unwrap())
}

/// The record lines of the data file, comments stripped.
fn data_lines(dir: &std::path::Path, base: &str) -> Vec<String> {
    let text = fs::read_to_string(dir.join(format!("{base}.pts.data"))).unwrap();
    text.lines()
        .filter(|l| !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[test]
fn header_is_version_then_columns() {
    let dir = TempDir::new().unwrap();
    let series = PersistentSeries::open(dir.path(), "charge", schema(), config()).unwrap();
    series.close().unwrap();
    let header = fs::read_to_string(dir.path().join("charge.pts.hdr")).unwrap();
    assert_eq!(header, "1\nvolts\tamps\n");
}

#[test]
fn records_are_deflated_deltas_with_star_dedup() {
    let dir = TempDir::new().unwrap();
    let series = PersistentSeries::open(dir.path(), "charge", schema(), config()).unwrap();
    series
        .store_row(&Row::with_values(120_000, 0b11, &[240.0, 32.5]))
        .unwrap();
    series
        .store_row(&Row::with_values(180_000, 0b11, &[240.0, 30.0]))
        .unwrap();
    series
        .store_row(&Row::with_values(240_000, 0b01, &[240.0, 30.0]))
        .unwrap();
    series.close().unwrap();

    assert_eq!(
        data_lines(dir.path(), "charge"),
        vec![
            // First record carries the negative deflated absolute time.
            "-1200\t3\t240\t32.5",
            "600\t3\t*\t30",
            "600\t1\t*",
        ]
    );
}

#[test]
fn non_finite_readings_become_bang_tokens() {
    let dir = TempDir::new().unwrap();
    let series = PersistentSeries::open(dir.path(), "charge", schema(), config()).unwrap();
    series
        .store_row(&Row::with_values(100_000, 0b01, &[5.0, 0.0]))
        .unwrap();
    series
        .store_row(&Row::with_values(200_000, 0b01, &[f64::INFINITY, 0.0]))
        .unwrap();
    series.close().unwrap();

    assert_eq!(
        data_lines(dir.path(), "charge"),
        vec!["-1000\t1\t5", "1000\t1\t!"]
    );
}

#[test]
fn reopened_repository_appends_an_absolute_record() {
    let dir = TempDir::new().unwrap();
    {
        let series = PersistentSeries::open(dir.path(), "charge", schema(), config()).unwrap();
        series
            .store_row(&Row::with_values(100_000, 0b01, &[1.5, 0.0]))
            .unwrap();
        series.close().unwrap();
    }
    {
        let series = PersistentSeries::open(dir.path(), "charge", schema(), config()).unwrap();
        series
            .store_row(&Row::with_values(300_000, 0b01, &[2.5, 0.0]))
            .unwrap();
        series.close().unwrap();
    }

    // A fresh writer restarts the delta chain with an absolute time.
    assert_eq!(
        data_lines(dir.path(), "charge"),
        vec!["-1000\t1\t1.5", "-3000\t1\t2.5"]
    );

    // Readers treat any negative time field as a clock reset.
    let series = PersistentSeries::open(dir.path(), "charge", schema(), config()).unwrap();
    let mut rows = Vec::new();
    series
        .stream_rows(TimeRange::all(), &mut |row| {
            rows.push((row.timestamp, row.values[0]));
            true
        })
        .unwrap();
    assert_eq!(rows, vec![(100_000, 1.5), (300_000, 2.5)]);
    series.close().unwrap();
}

#[test]
fn comment_lines_are_preserved_and_ignored() {
    let dir = TempDir::new().unwrap();
    {
        let series = PersistentSeries::open(dir.path(), "charge", schema(), config()).unwrap();
        series
            .store_row(&Row::with_values(100_000, 0b01, &[1.5, 0.0]))
            .unwrap();
        series.close().unwrap();
    }
    let text = fs::read_to_string(dir.path().join("charge.pts.data")).unwrap();
    assert!(text.starts_with("# created "));

    let series = PersistentSeries::open(dir.path(), "charge", schema(), config()).unwrap();
    let mut count = 0;
    series
        .stream_rows(TimeRange::all(), &mut |_| {
            count += 1;
            true
        })
        .unwrap();
    assert_eq!(count, 1);
    series.close().unwrap();
}
