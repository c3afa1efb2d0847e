//! Outlier removal against the per-instrument, per-year bound table.

use chrono::Datelike;
use quotegrid_core::{BoundTable, Bucket, PriceBounds};
use tracing::{debug, warn};

use crate::fill::forward_fill;

/// Nulls out-of-range prices and fills the holes from the previous bucket.
#[derive(Debug, Clone, Copy)]
pub struct OutlierScrubber<'a> {
    table: &'a BoundTable,
}

impl<'a> OutlierScrubber<'a> {
    pub fn new(table: &'a BoundTable) -> Self {
        Self { table }
    }

    /// Scrub one instrument's aligned series.
    ///
    /// A bucket's year is taken from its local start time. A leading out-of-range
    /// price has no predecessor and stays null.
    pub fn scrub(&self, instrument: &str, mut buckets: Vec<Bucket>) -> Vec<Bucket> {
        if self.table.is_unknown(instrument) {
            warn!(
                instrument,
                "bound data for this instrument is unreliable, applying default bounds"
            );
        }

        buckets.sort_by_key(|b| b.start);

        let mut cached: Option<(i32, PriceBounds)> = None;
        let mut removed = 0usize;
        for bucket in buckets.iter_mut() {
            let Some(price) = bucket.price else {
                continue;
            };
            let year = bucket.start.year();
            let bounds = match cached {
                Some((y, bounds)) if y == year => bounds,
                _ => {
                    let bounds = self.table.bounds_for(instrument, year);
                    cached = Some((year, bounds));
                    bounds
                }
            };
            if !bounds.contains(price) {
                bucket.price = None;
                removed += 1;
            }
        }

        if removed > 0 {
            debug!(instrument, removed, "removed out-of-bound prices");
        }

        forward_fill(&mut buckets);
        buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use chrono_tz::America::New_York;
    use quotegrid_core::{BoundRule, BoundTableSpec, InstrumentBounds};
    use std::collections::BTreeMap;

    fn series(year: i32, prices: &[Option<f64>]) -> Vec<Bucket> {
        let start = New_York.with_ymd_and_hms(year, 6, 15, 10, 0, 0).unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, p)| Bucket::new(start + Duration::seconds(5 * i as i64), *p))
            .collect()
    }

    fn prices(buckets: &[Bucket]) -> Vec<Option<f64>> {
        buckets.iter().map(|b| b.price).collect()
    }

    #[test]
    fn test_out_of_bound_filled_from_previous() {
        let table = BoundTable::country_etfs().unwrap();
        let scrubber = OutlierScrubber::new(&table);
        let out = scrubber.scrub("EFNL", series(2010, &[Some(20.0), Some(950.0), Some(21.0)]));
        assert_eq!(prices(&out), vec![Some(20.0), Some(20.0), Some(21.0)]);
    }

    #[test]
    fn test_leading_outlier_stays_null() {
        let table = BoundTable::country_etfs().unwrap();
        let scrubber = OutlierScrubber::new(&table);
        // EIS upper bound is 100
        let out = scrubber.scrub("EIS", series(2011, &[Some(150.0), Some(40.0)]));
        assert_eq!(prices(&out), vec![None, Some(40.0)]);
    }

    #[test]
    fn test_in_bound_unchanged() {
        let table = BoundTable::country_etfs().unwrap();
        let scrubber = OutlierScrubber::new(&table);
        let input = series(2010, &[Some(27.0), Some(27.5), Some(27.7)]);
        assert_eq!(scrubber.scrub("EUSA", input.clone()), input);
    }

    #[test]
    fn test_year_specific_bounds() {
        let table = BoundTable::country_etfs().unwrap();
        let scrubber = OutlierScrubber::new(&table);
        // EUSA is capped at 27.8 in 2010 and 35 in 2011
        let in_2010 = scrubber.scrub("EUSA", series(2010, &[Some(27.0), Some(30.0)]));
        assert_eq!(prices(&in_2010), vec![Some(27.0), Some(27.0)]);
        let in_2011 = scrubber.scrub("EUSA", series(2011, &[Some(27.0), Some(30.0)]));
        assert_eq!(prices(&in_2011), vec![Some(27.0), Some(30.0)]);
    }

    #[test]
    fn test_lower_only_bound() {
        let spec = BoundTableSpec {
            instruments: BTreeMap::from([(
                "EWK".to_string(),
                InstrumentBounds::lower(BoundRule::PerYear(BTreeMap::from([(2010, 9.0)]))),
            )]),
            ..Default::default()
        };
        let table = BoundTable::from_spec(&spec).unwrap();
        let scrubber = OutlierScrubber::new(&table);
        let out = scrubber.scrub("EWK", series(2010, &[Some(12.0), Some(8.5), Some(500.0)]));
        assert_eq!(prices(&out), vec![Some(12.0), Some(12.0), Some(500.0)]);
    }

    #[test]
    fn test_unknown_instrument_uses_defaults() {
        let table = BoundTable::country_etfs().unwrap();
        let scrubber = OutlierScrubber::new(&table);
        let out = scrubber.scrub("EDEN", series(2012, &[Some(40.0), Some(1000.0)]));
        assert_eq!(prices(&out), vec![Some(40.0), Some(40.0)]);
        let unlisted = scrubber.scrub("ZZZ", series(2012, &[Some(-950.0), Some(5.0)]));
        assert_eq!(prices(&unlisted), vec![None, Some(5.0)]);
    }

    #[test]
    fn test_year_boundary_uses_local_year() {
        let table = BoundTable::country_etfs().unwrap();
        let scrubber = OutlierScrubber::new(&table);
        // 2010-12-31 21:00 local is already 2011 in UTC; EUSA's 2010 cap applies
        let start = New_York.with_ymd_and_hms(2010, 12, 31, 21, 0, 0).unwrap();
        let buckets = vec![
            Bucket::new(start, Some(27.0)),
            Bucket::new(start + Duration::seconds(5), Some(30.0)),
        ];
        let out = scrubber.scrub("EUSA", buckets);
        assert_eq!(prices(&out), vec![Some(27.0), Some(27.0)]);
    }
}
