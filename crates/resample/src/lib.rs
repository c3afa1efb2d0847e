//! Resampling stages of the quotegrid pipeline.
//!
//! Quote series go through the stages in this order:
//! - [`Bucketizer`]: fixed-width, volume-weighted mid buckets
//! - [`GridAligner`]: reindexing onto the calendar grid with forward fill
//! - [`OutlierScrubber`]: bound checks and gap repair

pub mod bucketizer;
pub mod fill;
pub mod gaps;
pub mod grid;
pub mod outliers;

pub use bucketizer::{BucketedSeries, Bucketizer};
pub use fill::{drop_leading_nulls, forward_fill};
pub use gaps::mean_inter_quote_gap;
pub use grid::{CalendarGrid, GridAligner};
pub use outliers::OutlierScrubber;
