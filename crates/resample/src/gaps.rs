//! Tick spacing diagnostics.

use chrono::TimeDelta;
use quotegrid_core::Quote;

/// Mean time between successive quotes.
///
/// `None` when there are fewer than two quotes.
pub fn mean_inter_quote_gap(quotes: &[Quote]) -> Option<TimeDelta> {
    if quotes.len() < 2 {
        return None;
    }
    let total: i128 = quotes
        .windows(2)
        .filter_map(|pair| (pair[1].ts - pair[0].ts).num_microseconds())
        .map(i128::from)
        .sum();
    let mean = total / (quotes.len() as i128 - 1);
    Some(TimeDelta::microseconds(i64::try_from(mean).ok()?))
}
