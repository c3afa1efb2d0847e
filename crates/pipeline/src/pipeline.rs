//! End-to-end orchestration.
//!
//! Partitions are coerced, stacked and normalized one at a time, merged per
//! instrument, then every instrument goes through bucketing, grid alignment and
//! outlier scrubbing independently.

use std::collections::BTreeMap;

use chrono::TimeDelta;
use quotegrid_core::{BoundTable, CleanSeries, PipelineConfig, Quote, RawBatch, Result, Schema};
use quotegrid_ingestion::{
    InstrumentAggregator, Partition, PartitionSource, SchemaCoercer, SourceKind, TimeNormalizer,
};
use quotegrid_resample::{mean_inter_quote_gap, Bucketizer, GridAligner, OutlierScrubber};
use rayon::prelude::*;
use tracing::{info, warn};

/// Result of a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    /// Cleaned grid series per instrument.
    pub series: BTreeMap<String, CleanSeries>,
    /// Mean spacing of the raw quotes, for instruments with at least two quotes.
    pub mean_gaps: BTreeMap<String, TimeDelta>,
}

/// Configured quote resampling pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    bounds: BoundTable,
    coercer: SchemaCoercer,
    normalizer: TimeNormalizer,
    bucketizer: Bucketizer,
    aligner: GridAligner,
}

impl Pipeline {
    /// Build every stage up front so configuration errors surface before any data is read.
    pub fn new(config: PipelineConfig, bounds: BoundTable) -> Result<Self> {
        config.validate()?;

        let coercer = SchemaCoercer::new(Schema::quote());
        let normalizer = TimeNormalizer::new(config.timezone);
        let bucketizer = Bucketizer::new(config.deltat(), config.timezone)?;
        let aligner = GridAligner::from_config(&config)?;

        Ok(Self {
            config,
            bounds,
            coercer,
            normalizer,
            bucketizer,
            aligner,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn bounds(&self) -> &BoundTable {
        &self.bounds
    }

    /// Discover partitions for `years` and `instruments` and process them.
    pub fn run<S>(&self, source: &S, years: &[i32], instruments: &[String]) -> Result<PipelineOutput>
    where
        S: PartitionSource + ?Sized,
    {
        let partitions = source.discover(years, instruments)?;
        info!(partitions = partitions.len(), "discovered partitions");
        self.run_partitions(partitions)
    }

    /// Process partitions that are already decoded.
    pub fn run_partitions(&self, partitions: Vec<Partition>) -> Result<PipelineOutput> {
        let quotes = self.ingest(partitions)?;
        Ok(self.process(quotes))
    }

    /// Load every quote partition and merge the results per instrument.
    pub fn ingest(&self, partitions: Vec<Partition>) -> Result<BTreeMap<String, Vec<Quote>>> {
        let mut aggregator = InstrumentAggregator::new();

        for partition in partitions {
            match partition.kind() {
                SourceKind::Quote => {}
                kind => {
                    info!(partition = %partition.name, ?kind, "skipping non-quote partition");
                    continue;
                }
            }
            let Some(instrument) = partition.instrument() else {
                warn!(partition = %partition.name, "cannot derive an instrument id, skipping");
                continue;
            };

            match self.load_partition(&partition) {
                Ok(Some(quotes)) => aggregator.push(&instrument, quotes),
                Ok(None) => {
                    warn!(partition = %partition.name, "no usable batch in partition");
                }
                Err(e) if e.is_batch_local() => {
                    warn!(partition = %partition.name, error = %e, "skipping partition");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(aggregator.finish())
    }

    /// Coerce each batch, stack the survivors and normalize them together.
    ///
    /// `None` when every batch was skipped, so the partition contributes nothing.
    fn load_partition(&self, partition: &Partition) -> Result<Option<Vec<Quote>>> {
        let mut coerced = Vec::with_capacity(partition.batches.len());
        for (index, batch) in partition.batches.iter().enumerate() {
            match self.coercer.coerce(batch) {
                Ok(batch) => coerced.push(batch),
                Err(e) if e.is_batch_local() => {
                    warn!(partition = %partition.name, batch = index, error = %e, "skipping batch");
                }
                Err(e) => return Err(e),
            }
        }
        if coerced.is_empty() {
            return Ok(None);
        }

        let stacked = RawBatch::vstack(coerced)?;
        self.normalizer.normalize(&stacked).map(Some)
    }

    /// Resample every instrument, in parallel when configured.
    pub fn process(&self, quotes: BTreeMap<String, Vec<Quote>>) -> PipelineOutput {
        let results: Vec<(String, CleanSeries, Option<TimeDelta>)> = if self.config.parallel {
            quotes
                .into_par_iter()
                .map(|(instrument, quotes)| self.process_one(instrument, &quotes))
                .collect()
        } else {
            quotes
                .into_iter()
                .map(|(instrument, quotes)| self.process_one(instrument, &quotes))
                .collect()
        };

        let mut output = PipelineOutput::default();
        for (instrument, series, gap) in results {
            if let Some(gap) = gap {
                output.mean_gaps.insert(instrument.clone(), gap);
            }
            output.series.insert(instrument, series);
        }
        output
    }

    fn process_one(
        &self,
        instrument: String,
        quotes: &[Quote],
    ) -> (String, CleanSeries, Option<TimeDelta>) {
        let gap = self.mean_gap(&instrument, quotes);
        let series = self.resample(&instrument, quotes);
        (instrument, series, gap)
    }

    fn mean_gap(&self, instrument: &str, quotes: &[Quote]) -> Option<TimeDelta> {
        if !self.config.compute_mean_gaps {
            return None;
        }
        let gap = mean_inter_quote_gap(quotes)?;
        info!(instrument, mean_gap_ms = gap.num_milliseconds(), "mean inter-quote gap");
        Some(gap)
    }

    /// Bucket, align and scrub one instrument's time-sorted quotes.
    pub fn resample(&self, instrument: &str, quotes: &[Quote]) -> CleanSeries {
        let bucketed = self.bucketizer.bucketize(quotes);
        let aligned = self.aligner.align(&bucketed);
        let cleaned = OutlierScrubber::new(&self.bounds).scrub(instrument, aligned);

        info!(
            instrument,
            quotes = quotes.len(),
            buckets = bucketed.buckets.len(),
            grid_points = cleaned.len(),
            dates = bucketed.dates.len(),
            "instrument resampled"
        );
        CleanSeries::new(instrument, cleaned)
    }
}
