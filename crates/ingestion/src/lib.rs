//! Data ingestion and normalization for the quotegrid pipeline.
//!
//! This crate handles:
//! - Schema validation and repair of raw batches
//! - Spreadsheet-epoch time conversion and sorting
//! - Merging partitions per instrument
//! - The partition source seam towards archive discovery

pub mod aggregator;
pub mod normalizer;
pub mod schema;
pub mod source;

pub use aggregator::InstrumentAggregator;
pub use normalizer::{from_spreadsheet_days, to_spreadsheet_days, TimeNormalizer};
pub use schema::SchemaCoercer;
pub use source::{instrument_id, MemorySource, Partition, PartitionSource, SourceKind};
