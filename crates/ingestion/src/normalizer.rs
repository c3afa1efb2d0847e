//! Spreadsheet-epoch time conversion.
//!
//! Vendor files carry time as fractional days since 1899-12-30 (UTC). The
//! normalizer turns that into instants in the target timezone and returns the
//! batch as quotes sorted by time.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use polars::prelude::{DataFrame, Float64Chunked, Int32Chunked};
use quotegrid_core::{columns, Error, Quote, RawBatch, Result};
use tracing::debug;

/// Unix timestamp of 1899-12-30T00:00:00Z.
pub const SPREADSHEET_EPOCH_UNIX_SECS: i64 = -2_209_161_600;

const MICROS_PER_DAY: f64 = 86_400_000_000.0;

/// Convert a spreadsheet day count to a UTC instant, rounded to the microsecond.
pub fn from_spreadsheet_days(days: f64) -> Option<DateTime<Utc>> {
    if !days.is_finite() {
        return None;
    }
    // Whole days and the fraction are scaled separately to keep sub-microsecond precision
    let whole = days.floor();
    if whole.abs() >= (i64::MAX / MICROS_PER_DAY as i64) as f64 {
        return None;
    }
    let fraction = ((days - whole) * MICROS_PER_DAY).round() as i64;
    let micros = (whole as i64)
        .checked_mul(MICROS_PER_DAY as i64)?
        .checked_add(fraction)?
        .checked_add(SPREADSHEET_EPOCH_UNIX_SECS * 1_000_000)?;
    DateTime::from_timestamp_micros(micros)
}

/// Inverse of [`from_spreadsheet_days`].
pub fn to_spreadsheet_days(ts: DateTime<Utc>) -> f64 {
    (ts.timestamp_micros() - SPREADSHEET_EPOCH_UNIX_SECS * 1_000_000) as f64 / MICROS_PER_DAY
}

/// Converts coerced quote batches into time-sorted quotes.
#[derive(Debug, Clone, Copy)]
pub struct TimeNormalizer {
    tz: Tz,
}

impl TimeNormalizer {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Convert a quote-schema batch and sort it ascending by timestamp.
    ///
    /// Rows with a null or unrepresentable time are dropped.
    pub fn normalize(&self, batch: &RawBatch) -> Result<Vec<Quote>> {
        let frame = batch.frame();
        let time = float_column(frame, columns::TIME)?;
        let bid_px = float_column(frame, columns::BID_PRICE)?;
        let bid_sz = int_column(frame, columns::BID_VOLUME)?;
        let ask_px = float_column(frame, columns::ASK_PRICE)?;
        let ask_sz = int_column(frame, columns::ASK_VOLUME)?;

        let rows = time
            .into_iter()
            .zip(bid_px)
            .zip(bid_sz)
            .zip(ask_px)
            .zip(ask_sz);
        let mut quotes = Vec::with_capacity(batch.len());
        for ((((days, bid_px), bid_sz), ask_px), ask_sz) in rows {
            let Some(ts) = days.and_then(from_spreadsheet_days) else {
                continue;
            };
            quotes.push(Quote {
                ts: ts.with_timezone(&self.tz),
                bid_px,
                bid_sz,
                ask_px,
                ask_sz,
            });
        }

        let dropped = batch.len() - quotes.len();
        if dropped > 0 {
            debug!(dropped, "dropped rows without a usable time value");
        }

        quotes.sort_by_key(|q| q.ts);
        Ok(quotes)
    }
}

fn float_column<'a>(frame: &'a DataFrame, name: &str) -> Result<&'a Float64Chunked> {
    let column = frame
        .column(name)
        .map_err(|_| Error::missing_column(name))?;
    column.f64().map_err(|e| type_error(name, e))
}

fn int_column<'a>(frame: &'a DataFrame, name: &str) -> Result<&'a Int32Chunked> {
    let column = frame
        .column(name)
        .map_err(|_| Error::missing_column(name))?;
    column.i32().map_err(|e| type_error(name, e))
}

fn type_error(name: &str, err: impl std::fmt::Display) -> Error {
    Error::data(format!("column {name}: {err}; coerce the batch first"))
}
