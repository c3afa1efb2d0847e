//! Per-instrument, per-year price bounds used for outlier removal.
//!
//! Bounds are written declaratively as a [`BoundTableSpec`] and resolved once into a
//! flat [`BoundTable`] keyed by `(instrument, year)`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Lower bound applied when nothing is listed.
pub const DEFAULT_LOWER_BOUND: f64 = -900.0;
/// Upper bound applied when nothing is listed.
pub const DEFAULT_UPPER_BOUND: f64 = 900.0;

/// Inclusive price range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBounds {
    pub lower: f64,
    pub upper: f64,
}

impl Default for PriceBounds {
    fn default() -> Self {
        Self {
            lower: DEFAULT_LOWER_BOUND,
            upper: DEFAULT_UPPER_BOUND,
        }
    }
}

impl PriceBounds {
    #[inline]
    pub fn contains(&self, price: f64) -> bool {
        price >= self.lower && price <= self.upper
    }
}

/// One side of an instrument's bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundRule {
    /// Same bound for every year of the scalar range.
    Scalar(f64),
    /// Explicit bound per calendar year.
    PerYear(BTreeMap<i32, f64>),
}

/// Declared bounds of one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentBounds {
    /// The data is known to be unreliable; no bounds are applied.
    Unknown,
    /// Bounds per side, a missing side falls back to the default.
    Known {
        #[serde(default)]
        lower: Option<BoundRule>,
        #[serde(default)]
        upper: Option<BoundRule>,
    },
}

impl InstrumentBounds {
    pub fn upper(rule: BoundRule) -> Self {
        InstrumentBounds::Known {
            lower: None,
            upper: Some(rule),
        }
    }

    pub fn lower(rule: BoundRule) -> Self {
        InstrumentBounds::Known {
            lower: Some(rule),
            upper: None,
        }
    }

    pub fn both(lower: BoundRule, upper: BoundRule) -> Self {
        InstrumentBounds::Known {
            lower: Some(lower),
            upper: Some(upper),
        }
    }
}

/// Declarative form of a bound table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundTableSpec {
    /// Years a [`BoundRule::Scalar`] expands to.
    #[serde(default = "default_scalar_years")]
    pub scalar_years: RangeInclusive<i32>,
    /// Bounds for unlisted instrument/year combinations.
    #[serde(default)]
    pub default: PriceBounds,
    #[serde(default)]
    pub instruments: BTreeMap<String, InstrumentBounds>,
}

fn default_scalar_years() -> RangeInclusive<i32> {
    2009..=2012
}

impl Default for BoundTableSpec {
    fn default() -> Self {
        Self {
            scalar_years: default_scalar_years(),
            default: PriceBounds::default(),
            instruments: BTreeMap::new(),
        }
    }
}

impl BoundTableSpec {
    /// Hand-tuned limits for the iShares country ETF universe.
    pub fn country_etfs() -> Self {
        use BoundRule::Scalar;

        fn years<const N: usize>(entries: [(i32, f64); N]) -> BoundRule {
            BoundRule::PerYear(entries.into_iter().collect())
        }

        let instruments = [
            ("EDEN", InstrumentBounds::Unknown),
            ("EFNL", InstrumentBounds::upper(Scalar(900.0))),
            ("EIS", InstrumentBounds::upper(Scalar(100.0))),
            ("EUSA", InstrumentBounds::upper(years([(2010, 27.8), (2011, 35.0)]))),
            ("EWA", InstrumentBounds::upper(Scalar(900.0))),
            (
                "EWC",
                InstrumentBounds::upper(years([
                    (2009, 28.0),
                    (2010, 900.0),
                    (2011, 900.0),
                    (2012, 900.0),
                ])),
            ),
            ("EWD", InstrumentBounds::both(years([(2010, 13.0)]), Scalar(900.0))),
            ("EWG", InstrumentBounds::both(years([(2009, 13.2)]), Scalar(900.0))),
            ("EWH", InstrumentBounds::upper(Scalar(25.0))),
            ("EWI", InstrumentBounds::upper(years([(2011, 21.5)]))),
            ("EWJ", InstrumentBounds::upper(Scalar(900.0))),
            ("EWK", InstrumentBounds::both(years([(2010, 9.0)]), Scalar(22.5))),
            ("EWL", InstrumentBounds::both(years([(2011, 15.0)]), Scalar(75.0))),
            (
                "EWN",
                InstrumentBounds::both(years([(2010, 15.0), (2011, 14.0)]), Scalar(75.0)),
            ),
            (
                "EWO",
                InstrumentBounds::upper(years([
                    (2009, 50.0),
                    (2010, 50.0),
                    (2011, 25.0),
                    (2012, 21.5),
                ])),
            ),
            ("EWP", InstrumentBounds::upper(Scalar(55.0))),
            ("EWQ", InstrumentBounds::upper(Scalar(29.0))),
            ("EWS", InstrumentBounds::both(years([(2011, 8.0)]), Scalar(20.0))),
            ("EWT", InstrumentBounds::both(years([(2011, 9.0)]), years([(2009, 14.0)]))),
            ("EWU", InstrumentBounds::upper(years([(2009, 100.0), (2012, 20.0)]))),
            ("EWW", InstrumentBounds::upper(Scalar(900.0))),
            ("EWY", InstrumentBounds::upper(Scalar(900.0))),
            ("EWZ", InstrumentBounds::upper(Scalar(900.0))),
            ("INDA", InstrumentBounds::upper(years([(2012, 30.0)]))),
            ("MCHI", InstrumentBounds::upper(Scalar(900.0))),
        ];

        Self {
            instruments: instruments
                .into_iter()
                .map(|(name, bounds)| (name.to_string(), bounds))
                .collect(),
            ..Self::default()
        }
    }
}

/// Resolved `(instrument, year) -> bounds` lookup.
#[derive(Debug, Clone, Default)]
pub struct BoundTable {
    entries: HashMap<String, BTreeMap<i32, PriceBounds>>,
    unknown: HashSet<String>,
    default: PriceBounds,
}

impl BoundTable {
    /// Expand a declarative spec into the flat lookup.
    pub fn from_spec(spec: &BoundTableSpec) -> Result<Self> {
        let default = spec.default;
        if default.lower > default.upper {
            return Err(Error::config("default lower bound exceeds upper bound"));
        }

        let mut entries: HashMap<String, BTreeMap<i32, PriceBounds>> = HashMap::new();
        let mut unknown = HashSet::new();

        for (instrument, bounds) in &spec.instruments {
            let (lower, upper) = match bounds {
                InstrumentBounds::Unknown => {
                    unknown.insert(instrument.clone());
                    continue;
                }
                InstrumentBounds::Known { lower, upper } => (
                    expand(lower.as_ref(), &spec.scalar_years),
                    expand(upper.as_ref(), &spec.scalar_years),
                ),
            };

            let years = lower.keys().chain(upper.keys()).copied();
            for year in years {
                let resolved = PriceBounds {
                    lower: lower.get(&year).copied().unwrap_or(default.lower),
                    upper: upper.get(&year).copied().unwrap_or(default.upper),
                };
                if resolved.lower > resolved.upper {
                    return Err(Error::config(format!(
                        "{instrument} {year}: lower bound {} exceeds upper bound {}",
                        resolved.lower, resolved.upper
                    )));
                }
                entries
                    .entry(instrument.clone())
                    .or_default()
                    .insert(year, resolved);
            }
        }

        Ok(Self {
            entries,
            unknown,
            default,
        })
    }

    /// The built-in country ETF table.
    pub fn country_etfs() -> Result<Self> {
        Self::from_spec(&BoundTableSpec::country_etfs())
    }

    /// Bounds for `instrument` in calendar `year`.
    pub fn bounds_for(&self, instrument: &str, year: i32) -> PriceBounds {
        if self.unknown.contains(instrument) {
            return self.default;
        }
        self.entries
            .get(instrument)
            .and_then(|years| years.get(&year))
            .copied()
            .unwrap_or(self.default)
    }

    /// Whether the instrument is flagged as having unreliable bound data.
    pub fn is_unknown(&self, instrument: &str) -> bool {
        self.unknown.contains(instrument)
    }

    pub fn default_bounds(&self) -> PriceBounds {
        self.default
    }
}

fn expand(rule: Option<&BoundRule>, scalar_years: &RangeInclusive<i32>) -> BTreeMap<i32, f64> {
    match rule {
        None => BTreeMap::new(),
        Some(BoundRule::Scalar(bound)) => scalar_years.clone().map(|y| (y, *bound)).collect(),
        Some(BoundRule::PerYear(map)) => map.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table_resolves() {
        let spec = BoundTableSpec::country_etfs();
        let table = BoundTable::from_spec(&spec).unwrap();
        // Every listed instrument is either resolved or marked unknown
        for instrument in spec.instruments.keys() {
            assert!(table.is_unknown(instrument) || table.entries.contains_key(instrument));
        }
        assert!(table.entries.contains_key("EWW"));
    }

    #[test]
    fn test_unlisted_defaults() {
        let table = BoundTable::country_etfs().unwrap();
        assert_eq!(table.bounds_for("SPY", 2010), PriceBounds::default());
        // Scalars only cover 2009..=2012
        assert_eq!(table.bounds_for("EIS", 2008), PriceBounds::default());
    }

    #[test]
    fn test_scalar_expansion() {
        let table = BoundTable::country_etfs().unwrap();
        for year in 2009..=2012 {
            let b = table.bounds_for("EIS", year);
            assert_eq!(b.upper, 100.0);
            assert_eq!(b.lower, DEFAULT_LOWER_BOUND);
        }
    }

    #[test]
    fn test_asymmetric_sides() {
        let table = BoundTable::country_etfs().unwrap();
        // EWT: lower only in 2011, upper only in 2009
        assert_eq!(
            table.bounds_for("EWT", 2009),
            PriceBounds {
                lower: DEFAULT_LOWER_BOUND,
                upper: 14.0
            }
        );
        assert_eq!(
            table.bounds_for("EWT", 2011),
            PriceBounds {
                lower: 9.0,
                upper: DEFAULT_UPPER_BOUND
            }
        );
        assert_eq!(table.bounds_for("EWT", 2010), PriceBounds::default());
    }

    #[test]
    fn test_unknown_instrument() {
        let table = BoundTable::country_etfs().unwrap();
        assert!(table.is_unknown("EDEN"));
        assert_eq!(table.bounds_for("EDEN", 2010), PriceBounds::default());
        assert!(!table.is_unknown("EWW"));
    }

    #[test]
    fn test_efnl_upper() {
        let table = BoundTable::country_etfs().unwrap();
        let b = table.bounds_for("EFNL", 2010);
        assert!(b.contains(899.0));
        assert!(!b.contains(950.0));
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let mut spec = BoundTableSpec::default();
        spec.instruments.insert(
            "XYZ".to_string(),
            InstrumentBounds::both(BoundRule::Scalar(50.0), BoundRule::Scalar(10.0)),
        );
        assert!(matches!(BoundTable::from_spec(&spec), Err(Error::Config(_))));
    }

    #[test]
    fn test_spec_from_json() {
        let json = r#"{
            "instruments": {
                "EDEN": "unknown",
                "EWU": {"known": {"upper": {"per_year": {"2009": 100.0, "2012": 20.0}}}},
                "EWK": {"known": {"lower": {"per_year": {"2010": 9.0}}, "upper": {"scalar": 22.5}}}
            }
        }"#;
        let spec: BoundTableSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.scalar_years, 2009..=2012);
        let table = BoundTable::from_spec(&spec).unwrap();
        assert!(table.is_unknown("EDEN"));
        assert_eq!(table.bounds_for("EWU", 2012).upper, 20.0);
        assert_eq!(table.bounds_for("EWU", 2010).upper, DEFAULT_UPPER_BOUND);
        assert_eq!(table.bounds_for("EWK", 2010).lower, 9.0);
        assert_eq!(table.bounds_for("EWK", 2011).upper, 22.5);
    }
}
