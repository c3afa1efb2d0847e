//! PyO3 bindings for the quotegrid resampling pipeline.
//!
//! Exposes the Rust pipeline to Python:
//! - Grid buckets of the cleaned series
//! - A pipeline object that collects decoded partitions and runs them

use std::collections::HashMap;

use polars::df;
use polars::prelude::NamedFrom;
use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;

use quotegrid_core::{
    columns, BoundTable, Bucket as RustBucket, Error as RustError, PipelineConfig, RawBatch,
};
use quotegrid_ingestion::{MemorySource, Partition};
use quotegrid_pipeline::{load_bounds, Pipeline, PipelineOutput};

fn to_py_err(err: RustError) -> PyErr {
    match err {
        RustError::Io(e) => PyIOError::new_err(e.to_string()),
        other => PyValueError::new_err(other.to_string()),
    }
}

// ============================================================================
// Python-exposed Types
// ============================================================================

/// One grid point of a cleaned series.
#[pyclass]
#[derive(Clone)]
pub struct Bucket {
    /// Bucket start, RFC 3339 with the local offset.
    #[pyo3(get)]
    pub timestamp: String,
    #[pyo3(get)]
    pub epoch_seconds: i64,
    #[pyo3(get)]
    pub price: Option<f64>,
}

#[pymethods]
impl Bucket {
    fn __repr__(&self) -> String {
        match self.price {
            Some(price) => format!("Bucket(timestamp={}, price={:.4})", self.timestamp, price),
            None => format!("Bucket(timestamp={}, price=None)", self.timestamp),
        }
    }
}

impl From<&RustBucket> for Bucket {
    fn from(b: &RustBucket) -> Self {
        Bucket {
            timestamp: b.start.to_rfc3339(),
            epoch_seconds: b.epoch_seconds(),
            price: b.price,
        }
    }
}

/// Output of a pipeline run.
#[pyclass]
#[derive(Clone)]
pub struct RunResult {
    /// Cleaned series per instrument.
    #[pyo3(get)]
    pub series: HashMap<String, Vec<Bucket>>,
    /// Mean spacing of the raw quotes per instrument, in milliseconds.
    #[pyo3(get)]
    pub mean_gap_ms: HashMap<String, i64>,
}

#[pymethods]
impl RunResult {
    fn __repr__(&self) -> String {
        format!("RunResult(instruments={})", self.series.len())
    }
}

impl From<PipelineOutput> for RunResult {
    fn from(output: PipelineOutput) -> Self {
        RunResult {
            series: output
                .series
                .iter()
                .map(|(instrument, s)| (instrument.clone(), s.buckets.iter().map(Into::into).collect()))
                .collect(),
            mean_gap_ms: output
                .mean_gaps
                .iter()
                .map(|(instrument, gap)| (instrument.clone(), gap.num_milliseconds()))
                .collect(),
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Quote resampling pipeline over partitions handed in from Python.
#[pyclass]
pub struct PyQuotePipeline {
    inner: Pipeline,
    source: MemorySource,
}

#[pymethods]
impl PyQuotePipeline {
    #[new]
    #[pyo3(signature = (
        interval_secs = 5,
        only_trading_hours = true,
        opening_time = "10:00:00",
        closing_time = "15:30:00",
        parallel = true,
        bounds_path = None,
    ))]
    fn new(
        interval_secs: u32,
        only_trading_hours: bool,
        opening_time: &str,
        closing_time: &str,
        parallel: bool,
        bounds_path: Option<&str>,
    ) -> PyResult<Self> {
        let config = PipelineConfig {
            interval_secs,
            only_trading_hours,
            opening_time: opening_time.to_string(),
            closing_time: closing_time.to_string(),
            parallel,
            ..Default::default()
        };
        let bounds = match bounds_path {
            Some(path) => load_bounds(path).map_err(to_py_err)?,
            None => BoundTable::country_etfs().map_err(to_py_err)?,
        };
        Ok(PyQuotePipeline {
            inner: Pipeline::new(config, bounds).map_err(to_py_err)?,
            source: MemorySource::default(),
        })
    }

    /// Add a decoded quote partition, e.g. `bbo/US.PEWW_2010`.
    ///
    /// `xltime` holds fractional days since 1899-12-30 (UTC).
    #[pyo3(signature = (name, year, xltime, bid_px, bid_sz, ask_px, ask_sz))]
    #[allow(clippy::too_many_arguments)]
    fn add_partition(
        &mut self,
        name: String,
        year: i32,
        xltime: Vec<Option<f64>>,
        bid_px: Vec<Option<f64>>,
        bid_sz: Vec<Option<i64>>,
        ask_px: Vec<Option<f64>>,
        ask_sz: Vec<Option<i64>>,
    ) -> PyResult<()> {
        let frame = df!(
            columns::TIME => xltime,
            columns::BID_PRICE => bid_px,
            columns::BID_VOLUME => bid_sz,
            columns::ASK_PRICE => ask_px,
            columns::ASK_VOLUME => ask_sz,
        )
        .map_err(|e| to_py_err(e.into()))?;
        self.source
            .push(Partition::new(name, year, vec![RawBatch::new(frame)]));
        Ok(())
    }

    /// Number of partitions added so far.
    fn num_partitions(&self) -> usize {
        self.source.len()
    }

    /// Run the pipeline; every added instrument is processed when `instruments` is omitted.
    #[pyo3(signature = (years, instruments = None))]
    fn run(&self, py: Python<'_>, years: Vec<i32>, instruments: Option<Vec<String>>) -> PyResult<RunResult> {
        let instruments =
            instruments.unwrap_or_else(|| self.source.instruments().into_iter().collect());
        let output = py
            .allow_threads(|| self.inner.run(&self.source, &years, &instruments))
            .map_err(to_py_err)?;
        Ok(output.into())
    }

    /// Drop all added partitions.
    fn clear(&mut self) {
        self.source = MemorySource::default();
    }
}

// ============================================================================
// Module Definition
// ============================================================================

/// quotegrid - bid/ask quote resampling onto a cleaned calendar grid.
#[pymodule]
fn quotegrid(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<Bucket>()?;
    m.add_class::<RunResult>()?;
    m.add_class::<PyQuotePipeline>()?;
    Ok(())
}
