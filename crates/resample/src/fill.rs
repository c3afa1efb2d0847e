//! Forward-fill gap repair.

use quotegrid_core::Bucket;

/// Replace every null price with the closest preceding non-null price.
///
/// Leading nulls have nothing to take a value from and stay null.
pub fn forward_fill(buckets: &mut [Bucket]) {
    let mut last = None;
    for bucket in buckets {
        match bucket.price {
            Some(price) => last = Some(price),
            None => bucket.price = last,
        }
    }
}

/// Drop the leading run of null prices.
pub fn drop_leading_nulls(buckets: &mut Vec<Bucket>) {
    let first = buckets
        .iter()
        .position(|b| b.price.is_some())
        .unwrap_or(buckets.len());
    buckets.drain(..first);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use chrono_tz::America::New_York;

    fn series(prices: &[Option<f64>]) -> Vec<Bucket> {
        let start = New_York.with_ymd_and_hms(2010, 6, 15, 10, 0, 0).unwrap();
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
    fn test_fills_gaps() {
        let mut s = series(&[Some(1.0), None, None, Some(2.0), None]);
        forward_fill(&mut s);
        assert_eq!(
            prices(&s),
            vec![Some(1.0), Some(1.0), Some(1.0), Some(2.0), Some(2.0)]
        );
    }

    #[test]
    fn test_leading_nulls_stay() {
        let mut s = series(&[None, None, Some(3.0), None]);
        forward_fill(&mut s);
        assert_eq!(prices(&s), vec![None, None, Some(3.0), Some(3.0)]);

        drop_leading_nulls(&mut s);
        assert_eq!(prices(&s), vec![Some(3.0), Some(3.0)]);
    }

    #[test]
    fn test_idempotent() {
        let mut once = series(&[None, Some(1.0), None, Some(4.0), None, None]);
        forward_fill(&mut once);
        let mut twice = once.clone();
        forward_fill(&mut twice);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_all_null() {
        let mut s = series(&[None, None]);
        forward_fill(&mut s);
        drop_leading_nulls(&mut s);
        assert!(s.is_empty());
    }
}
