//! Per-instrument merging of normalized partitions.

use std::collections::BTreeMap;

use quotegrid_core::Quote;
use tracing::{info, warn};

/// Accumulates the quote series of every instrument across source partitions.
#[derive(Debug, Default)]
pub struct InstrumentAggregator {
    series: BTreeMap<String, InstrumentSeries>,
}

#[derive(Debug, Default)]
struct InstrumentSeries {
    quotes: Vec<Quote>,
    /// Set once a partition starts before the end of what was already merged.
    out_of_order: bool,
}

impl InstrumentAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a time-sorted partition to an instrument's series.
    pub fn push(&mut self, instrument: &str, quotes: Vec<Quote>) {
        let series = self.series.entry(instrument.to_string()).or_default();

        if let (Some(last), Some(first)) = (series.quotes.last(), quotes.first()) {
            if first.ts < last.ts && !series.out_of_order {
                warn!(
                    instrument,
                    merged_until = %last.ts,
                    partition_start = %first.ts,
                    "partition arrived out of chronological order; series will be re-sorted"
                );
                series.out_of_order = true;
            }
        }

        series.quotes.extend(quotes);
        info!(
            instrument,
            rows = series.quotes.len(),
            "combined series updated"
        );
    }

    /// Number of instruments seen so far.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Hand out the merged series, each sorted ascending by timestamp.
    pub fn finish(self) -> BTreeMap<String, Vec<Quote>> {
        self.series
            .into_iter()
            .map(|(instrument, mut series)| {
                if series.out_of_order {
                    // Stable: equal timestamps keep arrival order
                    series.quotes.sort_by_key(|q| q.ts);
                }
                (instrument, series.quotes)
            })
            .collect()
    }
}
