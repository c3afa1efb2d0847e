//! Alignment of sparse buckets onto the regular calendar grid.
//!
//! The grid spans the whole analysis window at `deltat` spacing, but output is only
//! ever produced on dates the instrument actually traded. [`GridAligner`] therefore
//! walks the grid one observed date at a time and carries the last known price
//! across everything it skips, which gives the same result as joining onto the full
//! grid, forward-filling and filtering afterwards.

use std::ops::Range;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use quotegrid_core::{
    AnalysisWindow, Bucket, EpochSeconds, Error, PipelineConfig, Result, TradingHours,
};

use crate::bucketizer::BucketedSeries;
use crate::fill::drop_leading_nulls;

/// Regularly spaced instants covering an analysis window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarGrid {
    start: EpochSeconds,
    step: i64,
    len: i64,
    tz: Tz,
}

impl CalendarGrid {
    /// Grid from the window start (local time in `tz`) up to and including the
    /// window end, every `deltat` seconds.
    pub fn new(window: &AnalysisWindow, tz: Tz, deltat: i64) -> Result<Self> {
        if deltat <= 0 {
            return Err(Error::config(format!("grid step must be positive, got {deltat}")));
        }
        window.validate()?;

        let start = localize(tz, window.start, true)?.timestamp();
        let end = localize(tz, window.end, false)?.timestamp();
        if end < start {
            return Err(Error::config("analysis window is empty in the target timezone"));
        }

        Ok(Self {
            start,
            step: deltat,
            len: (end - start) / deltat + 1,
            tz,
        })
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn step(&self) -> i64 {
        self.step
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Epoch seconds of the `k`-th grid point.
    #[inline]
    pub fn epoch_at(&self, k: i64) -> EpochSeconds {
        self.start + k * self.step
    }

    /// The `k`-th grid point in the grid's timezone.
    pub fn point(&self, k: i64) -> Option<DateTime<Tz>> {
        if !(0..self.len).contains(&k) {
            return None;
        }
        to_local(self.epoch_at(k), self.tz)
    }

    /// Index of `ts` if it is a grid point.
    pub fn position(&self, ts: EpochSeconds) -> Option<i64> {
        let offset = ts - self.start;
        if offset < 0 || offset % self.step != 0 {
            return None;
        }
        let k = offset / self.step;
        (k < self.len).then_some(k)
    }

    /// Every grid point in order.
    pub fn iter(&self) -> impl Iterator<Item = DateTime<Tz>> + '_ {
        (0..self.len).filter_map(move |k| self.point(k))
    }

    /// Indices of the grid points whose local date is `date`.
    pub fn indices_on(&self, date: NaiveDate) -> Range<i64> {
        let (Some(lo), Some(hi)) = (
            day_start(self.tz, date),
            date.succ_opt().and_then(|next| day_start(self.tz, next)),
        ) else {
            return 0..0;
        };
        let first = ceil_div(lo - self.start, self.step).clamp(0, self.len);
        let past_last = ceil_div(hi - self.start, self.step).clamp(0, self.len);
        first..past_last.max(first)
    }
}

/// Reindexes bucket series onto the calendar grid.
#[derive(Debug, Clone, Copy)]
pub struct GridAligner {
    grid: CalendarGrid,
    hours: Option<TradingHours>,
}

impl GridAligner {
    pub fn new(grid: CalendarGrid, hours: Option<TradingHours>) -> Self {
        Self { grid, hours }
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let grid = CalendarGrid::new(&config.window, config.timezone, config.deltat())?;
        Ok(Self::new(grid, config.trading_hours()?))
    }

    pub fn grid(&self) -> &CalendarGrid {
        &self.grid
    }

    /// Forward-filled grid points restricted to trading hours and observed dates.
    ///
    /// Buckets that do not sit on a grid point (outside the window, or misaligned
    /// with its start) never contribute a price.
    pub fn align(&self, series: &BucketedSeries) -> Vec<Bucket> {
        let mut known: Vec<(EpochSeconds, f64)> = series
            .buckets
            .iter()
            .filter(|b| self.grid.position(b.epoch_seconds()).is_some())
            .filter_map(|b| Some((b.epoch_seconds(), b.price?)))
            .collect();
        known.sort_by_key(|(ts, _)| *ts);

        let mut out = Vec::new();
        let mut cursor = 0;
        let mut last = None;

        for &date in &series.dates {
            for k in self.grid.indices_on(date) {
                let ts = self.grid.epoch_at(k);
                let Some(local) = to_local(ts, self.grid.tz) else {
                    continue;
                };
                if let Some(hours) = self.hours {
                    if !hours.contains(local.num_seconds_from_midnight()) {
                        continue;
                    }
                }
                while cursor < known.len() && known[cursor].0 <= ts {
                    last = Some(known[cursor].1);
                    cursor += 1;
                }
                out.push(Bucket::new(local, last));
            }
        }

        drop_leading_nulls(&mut out);
        out
    }
}

fn localize(tz: Tz, naive: NaiveDateTime, earliest: bool) -> Result<DateTime<Tz>> {
    let local = tz.from_local_datetime(&naive);
    let resolved = if earliest {
        local.earliest()
    } else {
        local.latest()
    };
    resolved.ok_or_else(|| Error::config(format!("{naive} does not exist in {tz}")))
}

/// First instant of a local calendar day, in epoch seconds.
fn day_start(tz: Tz, date: NaiveDate) -> Option<EpochSeconds> {
    let midnight = date.and_time(NaiveTime::MIN);
    // Where midnight is skipped by a DST jump the day starts when the gap ends
    (0..=2)
        .find_map(|h| tz.from_local_datetime(&(midnight + Duration::hours(h))).earliest())
        .map(|dt| dt.timestamp())
}

fn to_local(ts: EpochSeconds, tz: Tz) -> Option<DateTime<Tz>> {
    DateTime::<Utc>::from_timestamp(ts, 0).map(|dt| dt.with_timezone(&tz))
}

#[inline]
fn ceil_div(a: i64, b: i64) -> i64 {
    -((-a).div_euclid(b))
}
