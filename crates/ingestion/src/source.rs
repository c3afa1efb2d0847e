//! Hand-off point with the archive discovery and file decoding collaborators.
//!
//! A [`PartitionSource`] finds the files for a set of years and instruments and
//! delivers them as decoded [`RawBatch`]es grouped into partitions (one per
//! inner archive in the vendor layout, i.e. one instrument, year and file kind).

use std::collections::BTreeSet;

use quotegrid_core::{RawBatch, Result};
use serde::Deserialize;

/// Kind of vendor file a partition holds, derived from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Best bid/offer quotes.
    Quote,
    /// Trade prints.
    Trade,
    Other,
}

impl SourceKind {
    pub fn from_name(name: &str) -> Self {
        if name.contains("bbo") {
            SourceKind::Quote
        } else if name.contains("trade") {
            SourceKind::Trade
        } else {
            SourceKind::Other
        }
    }
}

/// Decoded batches of one discovered archive member.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Partition {
    /// Raw member name, e.g. `bbo/US.PEWW_2010`.
    pub name: String,
    /// Calendar year of the yearly archive the member came from.
    pub year: i32,
    #[serde(default)]
    pub batches: Vec<RawBatch>,
}

impl Partition {
    pub fn new(name: impl Into<String>, year: i32, batches: Vec<RawBatch>) -> Self {
        Self {
            name: name.into(),
            year,
            batches,
        }
    }

    pub fn kind(&self) -> SourceKind {
        SourceKind::from_name(&self.name)
    }

    /// Instrument identifier encoded in the member name.
    pub fn instrument(&self) -> Option<String> {
        instrument_id(&self.name)
    }

    pub fn rows(&self) -> usize {
        self.batches.iter().map(RawBatch::len).sum()
    }
}

/// Strip the vendor naming convention from a member name.
///
/// `<path>.<venue-char><TICKER>_<suffix>` becomes `<TICKER>`; for example
/// `bbo/US.PEWW_2010` yields `EWW`.
pub fn instrument_id(member_name: &str) -> Option<String> {
    let stem = member_name
        .rsplit_once('_')
        .map_or(member_name, |(stem, _)| stem);
    let after_dot = stem.split('.').nth(1)?;
    let mut chars = after_dot.chars();
    chars.next()?;
    let id = chars.as_str();
    (!id.is_empty()).then(|| id.to_string())
}

/// Discovery and extraction service.
pub trait PartitionSource {
    /// Partitions for the given years and instruments, in source order.
    fn discover(&self, years: &[i32], instruments: &[String]) -> Result<Vec<Partition>>;
}

/// Source over partitions that are already decoded in memory.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct MemorySource {
    partitions: Vec<Partition>,
}

impl MemorySource {
    pub fn new(partitions: Vec<Partition>) -> Self {
        Self { partitions }
    }

    pub fn push(&mut self, partition: Partition) {
        self.partitions.push(partition);
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Distinct instrument ids across the stored partitions.
    pub fn instruments(&self) -> BTreeSet<String> {
        self.partitions
            .iter()
            .filter_map(Partition::instrument)
            .collect()
    }
}

impl PartitionSource for MemorySource {
    /// Walks years in the requested order, then instruments, then stored order,
    /// the same way a yearly archive scan does.
    fn discover(&self, years: &[i32], instruments: &[String]) -> Result<Vec<Partition>> {
        let mut found = Vec::new();
        for year in years {
            for instrument in instruments {
                found.extend(
                    self.partitions
                        .iter()
                        .filter(|p| p.year == *year && p.name.contains(instrument.as_str()))
                        .cloned(),
                );
            }
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instrument_id() {
        assert_eq!(instrument_id("bbo/US.PEWW_2010").as_deref(), Some("EWW"));
        assert_eq!(instrument_id("ETFs-2011/bbo/US.NINDA_bbo").as_deref(), Some("INDA"));
        assert_eq!(instrument_id("no-dot_here"), None);
        assert_eq!(instrument_id("x.P_2010"), None);
    }

    #[test]
    fn test_kind_from_name() {
        assert_eq!(SourceKind::from_name("US.PEWW_bbo.tar"), SourceKind::Quote);
        assert_eq!(SourceKind::from_name("US.PEWW_trade.tar"), SourceKind::Trade);
        assert_eq!(SourceKind::from_name("US.PEWW_ref.tar"), SourceKind::Other);
    }

    #[test]
    fn test_memory_source_order() {
        let source = MemorySource::new(vec![
            Partition::new("bbo/US.PEWZ_2010", 2010, vec![]),
            Partition::new("bbo/US.PEWW_2010", 2010, vec![]),
            Partition::new("bbo/US.PEWW_2009", 2009, vec![]),
            Partition::new("bbo/US.PEWA_2009", 2009, vec![]),
        ]);
        let found = source
            .discover(&[2009, 2010], &["EWW".to_string(), "EWZ".to_string()])
            .unwrap();
        let names: Vec<_> = found.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["bbo/US.PEWW_2009", "bbo/US.PEWW_2010", "bbo/US.PEWZ_2010"]
        );
    }
}
