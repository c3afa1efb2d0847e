//! Core data types for the quotegrid pipeline.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use serde::Serialize;

/// Seconds since the Unix epoch.
pub type EpochSeconds = i64;

/// Floor an epoch timestamp onto a `deltat`-second boundary.
#[inline]
pub fn bucket_floor(ts: EpochSeconds, deltat: i64) -> EpochSeconds {
    ts.div_euclid(deltat) * deltat
}

/// A Level 1 quote (best bid/ask) after time normalization.
///
/// Prices and sizes stay nullable: schema repair turns malformed cells into nulls
/// rather than rejecting the row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    /// Instant of the quote in the target timezone.
    pub ts: DateTime<Tz>,
    /// Best bid price.
    pub bid_px: Option<f64>,
    /// Best bid size.
    pub bid_sz: Option<i32>,
    /// Best ask price.
    pub ask_px: Option<f64>,
    /// Best ask size.
    pub ask_sz: Option<i32>,
}

impl Quote {
    /// Calculate mid price.
    #[inline]
    pub fn mid(&self) -> Option<f64> {
        Some((self.bid_px? + self.ask_px?) / 2.0)
    }

    /// Local calendar date of the quote.
    #[inline]
    pub fn date(&self) -> NaiveDate {
        self.ts.date_naive()
    }
}

/// A fixed-width time bucket with its representative price.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket {
    /// Start of the bucket (epoch aligned).
    pub start: DateTime<Tz>,
    /// Mean of the bid and ask VWAPs, `None` when undefined or removed.
    pub price: Option<f64>,
}

impl Bucket {
    pub fn new(start: DateTime<Tz>, price: Option<f64>) -> Self {
        Self { start, price }
    }

    #[inline]
    pub fn epoch_seconds(&self) -> EpochSeconds {
        self.start.timestamp()
    }
}

/// Cleaned fixed-interval series for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanSeries {
    /// Instrument identifier (e.g. "EWW").
    pub instrument: String,
    /// Buckets ordered by start.
    pub buckets: Vec<Bucket>,
}

impl CleanSeries {
    pub fn new(instrument: impl Into<String>, buckets: Vec<Bucket>) -> Self {
        Self {
            instrument: instrument.into(),
            buckets,
        }
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Distinct local dates covered by the series.
    pub fn dates(&self) -> BTreeSet<NaiveDate> {
        self.buckets.iter().map(|b| b.start.date_naive()).collect()
    }

    pub fn first(&self) -> Option<&Bucket> {
        self.buckets.first()
    }

    pub fn last(&self) -> Option<&Bucket> {
        self.buckets.last()
    }
}
