//! Persistent, append-only repository for a series.
//!
//! A repository is two files named after a base name:
//!
//! ```text
//! <base>.pts.hdr    line 1: format version
//!                   line 2: tab-separated column names
//! <base>.pts.data   `#` comments and delta-encoded records (see codec)
//! ```
//!
//! The header's declared columns must be a prefix of the runtime schema;
//! a schema with extra trailing columns rewrites the header (additive
//! evolution). Writes funnel through a single pending row that coalesces
//! same-instant updates before they reach the data file; the pending row is
//! emitted when a later row arrives, on an explicit flush, and periodically
//! by a background flusher thread. Reads scan the data file front to back,
//! reconstructing carry-forward values as they go.

mod codec;
mod flusher;

use crate::error::{Result, StoreError};
use crate::range::TimeRange;
use crate::row::Row;
use crate::schema::Schema;
use crate::series::SeriesReader;
use chrono::Local;
use codec::{RecordDecoder, RecordEncoder};
use flusher::FlushTask;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Current repository format version.
pub const REPO_VERSION: u32 = 1;

/// Extension of the header file.
pub const HEADER_EXTENSION: &str = "pts.hdr";

/// Extension of the data file.
pub const DATA_EXTENSION: &str = "pts.data";

/// Default interval between background flushes.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(20);

/// Default emitted-row cadence for flushing the output stream.
pub const DEFAULT_FLUSH_EVERY: u64 = 10;

/// Configuration for repository flush behavior.
#[derive(Debug, Clone)]
pub struct RepoConfig {
    /// Interval between background flushes.
    pub flush_interval: Duration,
    /// Number of emitted rows between output stream flushes.
    pub flush_every: u64,
    /// Whether to run the background flusher thread.
    pub background_flush: bool,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            flush_every: DEFAULT_FLUSH_EVERY,
            background_flush: true,
        }
    }
}

#[derive(Debug)]
struct WriterState {
    out: Option<BufWriter<File>>,
    encoder: RecordEncoder,
    pending: Option<Row>,
    rows_emitted: u64,
}

/// A persistent repository for time-series rows.
///
/// All mutating operations and scans serialize on one internal lock: they
/// share the pending row and the output stream. Stream visitors must not
/// call back into the same repository.
#[derive(Debug)]
pub struct PersistentSeries {
    schema: Arc<Schema>,
    data_path: PathBuf,
    state: Mutex<WriterState>,
    earliest: AtomicI64,
    flusher: Mutex<Option<FlushTask>>,
    config: RepoConfig,
}

impl PersistentSeries {
    /// Opens (or creates) the repository `<base>.pts.{hdr,data}` in `dir`.
    ///
    /// # Errors
    ///
    /// - `OrphanedDataFile` if a data file exists without its header.
    /// - `UnsupportedVersion` if the header was written by a newer
    ///   implementation.
    /// - `SchemaMismatch` if the declared columns are not a prefix of
    ///   `schema`.
    /// - `Io` for any underlying file failure.
    pub fn open(
        dir: &Path,
        base: &str,
        schema: Arc<Schema>,
        config: RepoConfig,
    ) -> Result<Arc<Self>> {
        let header_path = header_path(dir, base);
        let data_path = data_path(dir, base);

        if !header_path.exists() && data_path.exists() {
            // The data is valuable and the schema that produced it is
            // unknown; refuse rather than fabricate a header.
            return Err(StoreError::OrphanedDataFile(data_path));
        }
        ensure_valid_header(&header_path, &schema)?;
        if !data_path.exists() {
            create_data_file(&data_path)?;
        }

        let file = OpenOptions::new().append(true).open(&data_path)?;
        let config = RepoConfig {
            flush_every: config.flush_every.max(1),
            ..config
        };
        let n_columns = schema.len();
        let series = Arc::new(Self {
            schema,
            data_path,
            state: Mutex::new(WriterState {
                out: Some(BufWriter::new(file)),
                encoder: RecordEncoder::new(n_columns),
                pending: None,
                rows_emitted: 0,
            }),
            earliest: AtomicI64::new(i64::MAX),
            flusher: Mutex::new(None),
            config: config.clone(),
        });

        // Establish the earliest stored timestamp with a short scan.
        let mut first = i64::MAX;
        series.scan(TimeRange::all(), &mut |row| {
            first = row.timestamp;
            false
        });
        series.earliest.store(first, Ordering::Relaxed);

        if config.background_flush {
            let task = FlushTask::spawn(Arc::downgrade(&series), config.flush_interval)?;
            *series.flusher.lock() = Some(task);
        }
        Ok(series)
    }

    /// True if both repository files exist for `base` in `dir`.
    pub fn exists(dir: &Path, base: &str) -> bool {
        header_path(dir, base).exists() && data_path(dir, base).exists()
    }

    /// Appends or coalesces a row into the write path and returns it.
    ///
    /// The row becomes the single pending row; a row whose deflated
    /// timestamp matches the pending row's merges into it, otherwise the
    /// pending row is emitted first.
    ///
    /// # Errors
    ///
    /// Returns `Closed` after [`close`](Self::close), `Io` on write failure.
    pub fn store_row(&self, row: &Row) -> Result<Row> {
        let mut state = self.state.lock();
        if state.out.is_none() {
            return Err(StoreError::Closed);
        }
        match state.pending.take() {
            None => state.pending = Some(row.clone()),
            Some(mut pending) => {
                if codec::deflate(row.timestamp) == codec::deflate(pending.timestamp) {
                    pending.merge_from(row);
                    state.pending = Some(pending);
                } else {
                    self.emit(&mut state, &pending)?;
                    state.pending = Some(row.clone());
                }
            }
        }
        Ok(row.clone())
    }

    /// Emits the pending row, if any, and flushes the output stream.
    pub fn flush(&self) -> Result<()> {
        let mut state = self.state.lock();
        self.flush_locked(&mut state)
    }

    /// Stops the background flusher, flushes, and releases the data file.
    ///
    /// Subsequent writes fail with [`StoreError::Closed`].
    pub fn close(&self) -> Result<()> {
        if let Some(task) = self.flusher.lock().take() {
            task.stop();
        }
        let mut state = self.state.lock();
        self.flush_locked(&mut state)?;
        state.out = None;
        Ok(())
    }

    fn flush_locked(&self, state: &mut WriterState) -> Result<()> {
        if let Some(pending) = state.pending.take() {
            self.emit(state, &pending)?;
        }
        if let Some(out) = state.out.as_mut() {
            out.flush()?;
        }
        Ok(())
    }

    fn emit(&self, state: &mut WriterState, row: &Row) -> Result<()> {
        let line = state.encoder.encode(row);
        let out = state.out.as_mut().ok_or(StoreError::Closed)?;
        writeln!(out, "{line}")?;
        state.rows_emitted += 1;
        if state.rows_emitted % self.config.flush_every == 0 {
            out.flush()?;
        }
        self.earliest.fetch_min(row.timestamp, Ordering::Relaxed);
        Ok(())
    }

    /// Streams matching rows from the data file.
    ///
    /// The repository lock is held for the duration, so writes cannot
    /// interleave with the scan. Rows still pending in the write buffer are
    /// not visible until flushed. I/O failures are logged and end the scan
    /// early with whatever was already delivered.
    fn scan(&self, range: TimeRange, visitor: &mut dyn FnMut(&Row) -> bool) {
        let _guard = self.state.lock();
        let file = match File::open(&self.data_path) {
            Ok(f) => f,
            Err(e) => {
                error!(path = %self.data_path.display(), "cannot open data file: {e}");
                return;
            }
        };
        let mut decoder = RecordDecoder::new(self.schema.len());
        let lower = range.lower_or_zero();
        let upper = range.upper_or_max();
        for line in BufReader::new(file).lines() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    error!(path = %self.data_path.display(), "error reading data file: {e}");
                    return;
                }
            };
            let Some(timestamp) = decoder.advance_time(&line) else {
                continue;
            };
            if timestamp < lower {
                continue;
            }
            if timestamp > upper {
                // Records are time-ordered; nothing further can match.
                break;
            }
            let Some(row) = decoder.decode_row(timestamp, &line) else {
                continue;
            };
            if !visitor(&row) {
                break;
            }
        }
    }
}

impl SeriesReader for PersistentSeries {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    fn first_time(&self) -> i64 {
        self.earliest.load(Ordering::Relaxed)
    }

    fn stream_rows(&self, range: TimeRange, visitor: &mut dyn FnMut(&Row) -> bool) -> Result<()> {
        self.scan(range, visitor);
        Ok(())
    }
}

impl Drop for PersistentSeries {
    fn drop(&mut self) {
        // Best effort to persist the pending row.
        let mut state = self.state.lock();
        if let Err(e) = self.flush_locked(&mut state) {
            warn!("failed to flush repository on drop: {e}");
        }
    }
}

fn header_path(dir: &Path, base: &str) -> PathBuf {
    dir.join(format!("{base}.{HEADER_EXTENSION}"))
}

fn data_path(dir: &Path, base: &str) -> PathBuf {
    dir.join(format!("{base}.{DATA_EXTENSION}"))
}

fn ensure_valid_header(path: &Path, schema: &Schema) -> Result<()> {
    if !path.exists() {
        return write_header(path, schema);
    }

    let content = fs::read_to_string(path)?;
    let mut lines = content.lines();
    let version_line = lines
        .next()
        .ok_or_else(|| StoreError::InvalidHeader("empty header file".into()))?;
    let version: u32 = version_line
        .trim()
        .parse()
        .map_err(|_| StoreError::InvalidHeader(format!("bad version: {version_line:?}")))?;
    if version > REPO_VERSION {
        return Err(StoreError::UnsupportedVersion {
            found: version,
            supported: REPO_VERSION,
        });
    }
    let columns_line = lines
        .next()
        .ok_or_else(|| StoreError::InvalidHeader("missing column declarations".into()))?;
    let declared: Vec<&str> = if columns_line.is_empty() {
        Vec::new()
    } else {
        columns_line.split('\t').collect()
    };

    if declared.len() > schema.len() {
        return Err(StoreError::SchemaMismatch(format!(
            "header declares {} columns, schema has only {}",
            declared.len(),
            schema.len()
        )));
    }
    for (declared_name, schema_name) in declared.iter().zip(schema.columns()) {
        if declared_name != schema_name {
            return Err(StoreError::SchemaMismatch(format!(
                "header column {declared_name:?} does not match schema column {schema_name:?}"
            )));
        }
    }

    if schema.len() > declared.len() {
        // Additive evolution: new trailing columns rewrite the header.
        info!(
            path = %path.display(),
            added = schema.len() - declared.len(),
            "declaring new column(s) in repository header"
        );
        return write_header(path, schema);
    }
    Ok(())
}

fn write_header(path: &Path, schema: &Schema) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "{REPO_VERSION}")?;
    writeln!(out, "{}", schema.columns().join("\t"))?;
    out.flush()?;
    Ok(())
}

fn create_data_file(path: &Path) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "# created {}", Local::now().format("%Y-%m-%d %H:%M:%S"))?;
    out.flush()?;
    Ok(())
}
