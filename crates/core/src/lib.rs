//! Core types and configuration for the quotegrid pipeline.
//!
//! This crate provides shared types used across all other crates:
//! - Raw tabular batches and expected schemas
//! - Quote, bucket and clean series types
//! - Pipeline configuration and per-instrument bound tables
//! - Common error types

pub mod bounds;
pub mod config;
pub mod error;
pub mod table;
pub mod types;

pub use bounds::{BoundRule, BoundTable, BoundTableSpec, InstrumentBounds, PriceBounds};
pub use config::{AnalysisWindow, PipelineConfig, TradingHours};
pub use error::{Error, Result};
pub use table::{columns, ColumnType, RawBatch, Schema};
pub use types::*;
