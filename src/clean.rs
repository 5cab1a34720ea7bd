//! Cleaning of raw indicator records into one table per indicator.
//!
//! The World Bank mixes regions and income groups ("aggregates") into the
//! `country/all` responses. They are dropped here against an explicit code
//! list, values are normalized, and the (country_code, year) key is made unique.

use crate::error::ValidationError;
use crate::models::{CountryYear, Indicator, IndicatorRecord};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry as MapEntry;
use std::collections::{BTreeMap, BTreeSet};

/// ISO3 codes the World Bank uses for regional, lending and income-group
/// aggregates.
pub const WORLD_BANK_AGGREGATES: &[&str] = &[
    "AFE", "AFW", "ARB", "CEB", "CSS", "EAP", "EAR", "EAS", "ECA", "ECS", "EMU", "EUU", "FCS",
    "HIC", "HPC", "IBD", "IBT", "IDA", "IDB", "IDX", "INX", "LAC", "LCN", "LDC", "LIC", "LMC",
    "LMY", "LTE", "MEA", "MIC", "MNA", "NAC", "OED", "OSS", "PRE", "PSS", "PST", "SAS", "SSA",
    "SSF", "SST", "TEA", "TEC", "TLA", "TMN", "TSA", "TSS", "UMC", "WLD",
];

/// Which country codes survive cleaning.
///
/// `exclude` is always applied; when `include` is set, only the listed codes are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CountryFilter {
    pub exclude: BTreeSet<String>,
    pub include: Option<BTreeSet<String>>,
}

impl Default for CountryFilter {
    fn default() -> Self {
        Self {
            exclude: WORLD_BANK_AGGREGATES.iter().map(|c| c.to_string()).collect(),
            include: None,
        }
    }
}

impl CountryFilter {
    pub fn is_country(&self, code: &str) -> bool {
        let code = code.trim().to_ascii_uppercase();
        if code.is_empty() || self.exclude.iter().any(|c| c.eq_ignore_ascii_case(&code)) {
            return false;
        }
        match &self.include {
            Some(allowed) => allowed.iter().any(|c| c.eq_ignore_ascii_case(&code)),
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanOptions {
    pub countries: CountryFilter,
    /// Drop rows whose value is absent after coercion.
    pub drop_missing: bool,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            countries: CountryFilter::default(),
            drop_missing: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub country_name: String,
    pub value: Option<f64>,
}

/// One indicator after cleaning. Keys are unique by construction.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanTable {
    /// Column name in the merged table.
    pub name: String,
    pub indicator_code: String,
    pub rows: BTreeMap<CountryYear, Observation>,
}

impl CleanTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Back to flat records, ordered by (country_code, year).
    pub fn to_records(&self) -> Vec<IndicatorRecord> {
        self.rows
            .iter()
            .map(|(key, obs)| IndicatorRecord {
                country_code: key.country_code.clone(),
                country_name: obs.country_name.clone(),
                year: key.year,
                indicator_code: self.indicator_code.clone(),
                value: obs.value,
            })
            .collect()
    }
}

fn coerce(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Clean the raw records of one indicator.
///
/// Exact duplicates collapse, and a present value wins over an absent one for the
/// same key. Two different present values for one key are a [`ValidationError`].
pub fn clean_indicator(
    indicator: &Indicator,
    records: &[IndicatorRecord],
    opts: &CleanOptions,
) -> Result<CleanTable, ValidationError> {
    let mut rows: BTreeMap<CountryYear, Observation> = BTreeMap::new();
    let mut dropped = 0usize;

    for r in records {
        if !r.indicator_code.eq_ignore_ascii_case(&indicator.code) {
            return Err(ValidationError::MixedIndicators {
                expected: indicator.code.clone(),
                found: r.indicator_code.clone(),
            });
        }
        if !opts.countries.is_country(&r.country_code) {
            dropped += 1;
            continue;
        }
        let value = coerce(r.value);
        if value.is_none() && opts.drop_missing {
            dropped += 1;
            continue;
        }

        let key = CountryYear::new(r.country_code.trim().to_ascii_uppercase(), r.year);
        match rows.entry(key) {
            MapEntry::Vacant(slot) => {
                slot.insert(Observation {
                    country_name: r.country_name.trim().to_string(),
                    value,
                });
            }
            MapEntry::Occupied(mut slot) => {
                let existing = slot.get().value;
                match (existing, value) {
                    (_, None) => {}
                    (None, Some(_)) => slot.get_mut().value = value,
                    (Some(a), Some(b)) if a == b => {}
                    (Some(_), Some(_)) => {
                        return Err(ValidationError::DuplicateKey {
                            indicator: indicator.name.clone(),
                            key: slot.key().clone(),
                            first: existing,
                            second: value,
                        });
                    }
                }
            }
        }
    }

    debug!(
        "{}: kept {} rows, dropped {} of {}",
        indicator.name,
        rows.len(),
        dropped,
        records.len()
    );

    Ok(CleanTable {
        name: indicator.name.clone(),
        indicator_code: indicator.code.clone(),
        rows,
    })
}
