//! Fixed-width bucketing of quote ticks.
//!
//! Every quote lands in the bucket `floor(epoch_seconds / deltat) * deltat`, and
//! each bucket is priced as the mean of its ask and bid volume-weighted averages.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use quotegrid_core::{bucket_floor, Bucket, EpochSeconds, Error, Quote, Result};

/// Sparse bucket series plus the local dates seen in the ticks it came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BucketedSeries {
    /// Populated buckets, ascending by start.
    pub buckets: Vec<Bucket>,
    /// Distinct local dates of the raw quotes.
    pub dates: BTreeSet<NaiveDate>,
}

/// A bucket that is still accumulating quotes.
#[derive(Debug, Clone, Default)]
struct BucketInProgress {
    ask_notional: f64,
    ask_volume: f64,
    bid_notional: f64,
    bid_volume: f64,
}

impl BucketInProgress {
    /// Null prices are left out of the notional but their sizes still count as volume.
    fn add_quote(&mut self, quote: &Quote) {
        if let Some(sz) = quote.ask_sz {
            let sz = f64::from(sz);
            self.ask_volume += sz;
            if let Some(px) = quote.ask_px {
                self.ask_notional += px * sz;
            }
        }
        if let Some(sz) = quote.bid_sz {
            let sz = f64::from(sz);
            self.bid_volume += sz;
            if let Some(px) = quote.bid_px {
                self.bid_notional += px * sz;
            }
        }
    }

    fn ask_vwap(&self) -> Option<f64> {
        vwap(self.ask_notional, self.ask_volume)
    }

    fn bid_vwap(&self) -> Option<f64> {
        vwap(self.bid_notional, self.bid_volume)
    }

    fn price(&self) -> Option<f64> {
        Some((self.ask_vwap()? + self.bid_vwap()?) / 2.0)
    }
}

fn vwap(notional: f64, volume: f64) -> Option<f64> {
    if volume == 0.0 {
        return None;
    }
    let value = notional / volume;
    value.is_finite().then_some(value)
}

/// Builder of epoch-aligned buckets.
#[derive(Debug, Clone, Copy)]
pub struct Bucketizer {
    deltat: i64,
    tz: Tz,
}

impl Bucketizer {
    /// Create a bucketizer for `deltat`-second buckets reported in `tz`.
    pub fn new(deltat: i64, tz: Tz) -> Result<Self> {
        if deltat <= 0 {
            return Err(Error::config(format!("bucket width must be positive, got {deltat}")));
        }
        Ok(Self { deltat, tz })
    }

    pub fn deltat(&self) -> i64 {
        self.deltat
    }

    /// Bucket an instrument's quote series.
    pub fn bucketize(&self, quotes: &[Quote]) -> BucketedSeries {
        // Dates come from the raw ticks, before any bucketing
        let dates = quotes.iter().map(Quote::date).collect();

        let mut open: BTreeMap<EpochSeconds, BucketInProgress> = BTreeMap::new();
        for quote in quotes {
            let key = bucket_floor(quote.ts.timestamp(), self.deltat);
            open.entry(key).or_default().add_quote(quote);
        }

        let buckets = open
            .into_iter()
            .filter_map(|(key, bucket)| {
                let start = DateTime::from_timestamp(key, 0)?.with_timezone(&self.tz);
                Some(Bucket::new(start, bucket.price()))
            })
            .collect();

        BucketedSeries { buckets, dates }
    }
}
