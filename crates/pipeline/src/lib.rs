//! Quote resampling pipeline for the quotegrid workspace.
//!
//! Wires the ingestion and resampling stages together:
//! - Partition discovery, coercion and normalization
//! - Per-instrument merging
//! - Bucketing, grid alignment and outlier scrubbing, optionally in parallel

pub mod pipeline;

use std::fs;
use std::path::Path;

use quotegrid_core::{BoundTable, BoundTableSpec, PipelineConfig, Result};
use serde::de::DeserializeOwned;

pub use pipeline::{Pipeline, PipelineOutput};

/// Deserialize a JSON file.
pub fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Pipeline configuration from a JSON file; missing fields take their defaults.
pub fn load_config(path: impl AsRef<Path>) -> Result<PipelineConfig> {
    let config: PipelineConfig = read_json(path)?;
    config.validate()?;
    Ok(config)
}

/// Bound table from a JSON [`BoundTableSpec`].
pub fn load_bounds(path: impl AsRef<Path>) -> Result<BoundTable> {
    let spec: BoundTableSpec = read_json(path)?;
    BoundTable::from_spec(&spec)
}
