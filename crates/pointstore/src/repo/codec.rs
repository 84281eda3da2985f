//! Wire grammar for the on-disk data log.
//!
//! Each data line is either a `#` comment or one record:
//!
//! ```text
//! DELTA_TIME<TAB>HEX_MASK<TAB>VAL[<TAB>VAL]*
//! ```
//!
//! - `DELTA_TIME` — time since the previous record in deflated units
//!   (milliseconds / 100), as a decimal integer. A negative value marks the
//!   deflated *absolute* timestamp of the first record.
//! - `HEX_MASK` — hex string of the 64-bit mask of columns present on the
//!   line.
//! - `VAL` — one token per set mask bit, in ascending column order: a float
//!   literal, `*` (unchanged from the column's last emitted value), or `!`
//!   (the reading was NaN/infinite and the bit must be cleared on load).

use crate::row::Row;
use crate::schema::bit_for_index;
use tracing::warn;

/// Fixed time-resolution-reduction factor for on-disk deltas.
pub(super) const TIME_SCALE: i64 = 100;

/// Token marking a value unchanged from the column's last emitted value.
const SAME_VALUE: &str = "*";

/// Token marking a NaN/infinite reading elided from the record.
const ELIDED_VALUE: &str = "!";

/// Reduces a millisecond timestamp to on-disk resolution.
pub(super) fn deflate(timestamp: i64) -> i64 {
    timestamp / TIME_SCALE
}

/// Restores a deflated timestamp to milliseconds.
pub(super) fn inflate(timestamp: i64) -> i64 {
    timestamp * TIME_SCALE
}

fn mask_for(n_columns: usize) -> u64 {
    if n_columns >= 64 {
        u64::MAX
    } else {
        (1u64 << n_columns) - 1
    }
}

/// Encodes rows into data lines, deduplicating each column against its last
/// emitted value.
///
/// Dedup memory is kept per column, mirroring the decoder's `*` resolution,
/// so rows stored without carried-forward values still round-trip.
#[derive(Debug)]
pub(super) struct RecordEncoder {
    last_deflated: Option<i64>,
    last_values: Vec<Option<f64>>,
}

impl RecordEncoder {
    pub(super) fn new(n_columns: usize) -> Self {
        Self {
            last_deflated: None,
            last_values: vec![None; n_columns],
        }
    }

    /// Renders one record line (no trailing newline) and remembers the
    /// emitted values for future dedup comparisons.
    pub(super) fn encode(&mut self, row: &Row) -> String {
        let deflated = deflate(row.timestamp);
        let delta = match self.last_deflated {
            None => -deflated,
            Some(last) => deflated - last,
        };
        self.last_deflated = Some(deflated);
        let mut line = format!("{delta}\t{:x}", row.bits);
        for i in 0..self.last_values.len() {
            if row.excludes(bit_for_index(i)) {
                continue;
            }
            line.push('\t');
            let value = row.values[i];
            if !value.is_finite() {
                line.push_str(ELIDED_VALUE);
            } else if self.last_values[i] == Some(value) {
                line.push_str(SAME_VALUE);
            } else {
                line.push_str(&value.to_string());
                self.last_values[i] = Some(value);
            }
        }
        line
    }
}

enum ValueToken {
    Literal(f64),
    Same,
    Elided,
}

/// Streaming decoder for data lines.
///
/// Keeps the running clock, the per-column memory of last explicit values
/// for `*` resolution, and the carry-forward accumulator across calls.
pub(super) struct RecordDecoder {
    n_columns: usize,
    clock: i64,
    accumulator: Vec<f64>,
    last_explicit: Vec<Option<f64>>,
}

impl RecordDecoder {
    pub(super) fn new(n_columns: usize) -> Self {
        Self {
            n_columns,
            clock: 0,
            accumulator: vec![0.0; n_columns],
            last_explicit: vec![None; n_columns],
        }
    }

    /// Decodes the time field of a line and advances the running clock.
    ///
    /// Returns the inflated (millisecond) timestamp, or `None` for comments,
    /// blank lines, and lines whose time field does not parse (warned and
    /// skipped).
    pub(super) fn advance_time(&mut self, line: &str) -> Option<i64> {
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        let field = line.split('\t').next().unwrap_or("");
        let raw: i64 = match field.parse() {
            Ok(v) => v,
            Err(_) => {
                warn!(token = field, "skipping data line with invalid time field");
                return None;
            }
        };
        self.clock = if raw < 0 { -raw } else { raw + self.clock };
        Some(inflate(self.clock))
    }

    /// Decodes the mask and value tokens of a line whose time was accepted,
    /// updates the carry-forward state, and builds the full row.
    ///
    /// Returns `None` — leaving the decoder state untouched — when the mask
    /// or any value token is malformed or missing, so a bad line is skipped
    /// atomically.
    pub(super) fn decode_row(&mut self, timestamp: i64, line: &str) -> Option<Row> {
        let mut tokens = line.split('\t');
        tokens.next(); // time field, consumed by advance_time

        let Some(mask_token) = tokens.next() else {
            warn!("skipping data line without a column mask");
            return None;
        };
        let bits = match u64::from_str_radix(mask_token, 16) {
            Ok(v) => v,
            Err(_) => {
                warn!(token = mask_token, "skipping data line with invalid column mask");
                return None;
            }
        };

        // Parse every token before touching decoder state.
        let mut parsed = Vec::new();
        for i in 0..self.n_columns {
            if bits & bit_for_index(i) == 0 {
                continue;
            }
            let Some(token) = tokens.next() else {
                warn!("skipping data line with fewer values than mask bits");
                return None;
            };
            let value = match token {
                SAME_VALUE => ValueToken::Same,
                ELIDED_VALUE => ValueToken::Elided,
                literal => match literal.parse::<f64>() {
                    Ok(v) => ValueToken::Literal(v),
                    Err(_) => {
                        warn!(token = literal, "skipping data line with invalid value");
                        return None;
                    }
                },
            };
            parsed.push((i, value));
        }

        let mut row = Row::new(timestamp, bits & mask_for(self.n_columns), self.n_columns);
        for (i, token) in parsed {
            match token {
                ValueToken::Elided => row.clear(bit_for_index(i)),
                ValueToken::Same => {
                    // A `*` with no prior explicit value (e.g. across a
                    // range-filtered prefix) falls back to the accumulator.
                    let value = self.last_explicit[i].unwrap_or(self.accumulator[i]);
                    self.accumulator[i] = value;
                    self.last_explicit[i] = Some(value);
                    row.values[i] = value;
                }
                ValueToken::Literal(value) => {
                    self.accumulator[i] = value;
                    self.last_explicit[i] = Some(value);
                    row.values[i] = value;
                }
            }
        }
        for i in 0..self.n_columns {
            if row.excludes(bit_for_index(i)) {
                row.values[i] = self.accumulator[i];
            }
        }
        Some(row)
    }
}
