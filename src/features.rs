//! Derived columns over a merged [`Panel`].
//!
//! Features look back along calendar years of the same country: a lag of one
//! period at (USA, 2020) reads (USA, 2019). If that row or value does not
//! exist the feature is absent. Nothing here fabricates values, and every
//! output is a pure function of the input panel.

use crate::error::FeatureError;
use crate::models::CountryYear;
use crate::panel::{Panel, is_key_column};
use log::debug;
use serde::{Deserialize, Serialize};

fn one() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Feature {
    /// Value of the same country `periods` years earlier.
    Lag {
        column: String,
        #[serde(default = "one")]
        periods: u32,
        #[serde(default)]
        name: Option<String>,
    },
    /// Absolute change against `periods` years earlier.
    Delta {
        column: String,
        #[serde(default = "one")]
        periods: u32,
        #[serde(default)]
        name: Option<String>,
    },
    /// Relative change against `periods` years earlier.
    Growth {
        column: String,
        #[serde(default = "one")]
        periods: u32,
        #[serde(default)]
        name: Option<String>,
    },
    /// Natural logarithm.
    Log {
        column: String,
        #[serde(default)]
        name: Option<String>,
    },
    /// Efficiency ratio: outcome divided by expenditure.
    Ratio {
        numerator: String,
        denominator: String,
        #[serde(default)]
        name: Option<String>,
    },
}

impl Feature {
    pub fn lag(column: impl Into<String>, periods: u32) -> Self {
        Feature::Lag {
            column: column.into(),
            periods,
            name: None,
        }
    }

    pub fn delta(column: impl Into<String>) -> Self {
        Feature::Delta {
            column: column.into(),
            periods: 1,
            name: None,
        }
    }

    pub fn growth(column: impl Into<String>) -> Self {
        Feature::Growth {
            column: column.into(),
            periods: 1,
            name: None,
        }
    }

    pub fn log(column: impl Into<String>) -> Self {
        Feature::Log {
            column: column.into(),
            name: None,
        }
    }

    pub fn ratio(numerator: impl Into<String>, denominator: impl Into<String>) -> Self {
        Feature::Ratio {
            numerator: numerator.into(),
            denominator: denominator.into(),
            name: None,
        }
    }

    /// Write the feature to `name` instead of the default column name.
    pub fn named(mut self, new_name: impl Into<String>) -> Self {
        match &mut self {
            Feature::Lag { name, .. }
            | Feature::Delta { name, .. }
            | Feature::Growth { name, .. }
            | Feature::Log { name, .. }
            | Feature::Ratio { name, .. } => *name = Some(new_name.into()),
        }
        self
    }

    /// Column name the feature is written to.
    pub fn output_name(&self) -> String {
        match self {
            Feature::Lag { name: Some(n), .. }
            | Feature::Delta { name: Some(n), .. }
            | Feature::Growth { name: Some(n), .. }
            | Feature::Log { name: Some(n), .. }
            | Feature::Ratio { name: Some(n), .. } => n.clone(),
            Feature::Lag { column, periods: 1, .. } => format!("lag_{column}"),
            Feature::Lag { column, periods, .. } => format!("lag{periods}_{column}"),
            Feature::Delta { column, periods: 1, .. } => format!("delta_{column}"),
            Feature::Delta { column, periods, .. } => format!("delta{periods}_{column}"),
            Feature::Growth { column, periods: 1, .. } => format!("growth_{column}"),
            Feature::Growth { column, periods, .. } => format!("growth{periods}_{column}"),
            Feature::Log { column, .. } => format!("log_{column}"),
            Feature::Ratio {
                numerator,
                denominator,
                ..
            } => format!("{numerator}_per_{denominator}"),
        }
    }

    fn inputs(&self) -> Vec<&str> {
        match self {
            Feature::Lag { column, .. }
            | Feature::Delta { column, .. }
            | Feature::Growth { column, .. }
            | Feature::Log { column, .. } => vec![column.as_str()],
            Feature::Ratio {
                numerator,
                denominator,
                ..
            } => vec![numerator.as_str(), denominator.as_str()],
        }
    }

    fn periods(&self) -> Option<u32> {
        match self {
            Feature::Lag { periods, .. }
            | Feature::Delta { periods, .. }
            | Feature::Growth { periods, .. } => Some(*periods),
            _ => None,
        }
    }
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

pub fn log_value(v: Option<f64>) -> Option<f64> {
    v.filter(|x| *x > 0.0).and_then(|x| finite(x.ln()))
}

pub fn ratio_value(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0.0 => finite(n / d),
        _ => None,
    }
}

fn compute(panel: &Panel, feature: &Feature, idx: &[usize]) -> Vec<Option<f64>> {
    let back = |key: &CountryYear, periods: u32| {
        key.shifted_back(periods)
            .and_then(|k| panel.value_at(&k, idx[0]))
    };
    panel
        .rows()
        .map(|(key, row)| {
            let cur = row.values.get(idx[0]).copied().flatten();
            match feature {
                Feature::Lag { periods, .. } => back(key, *periods),
                Feature::Delta { periods, .. } => match (cur, back(key, *periods)) {
                    (Some(c), Some(p)) => finite(c - p),
                    _ => None,
                },
                Feature::Growth { periods, .. } => match (cur, back(key, *periods)) {
                    (Some(c), Some(p)) if p != 0.0 => finite((c - p) / p),
                    _ => None,
                },
                Feature::Log { .. } => log_value(cur),
                Feature::Ratio { .. } => {
                    ratio_value(cur, row.values.get(idx[1]).copied().flatten())
                }
            }
        })
        .collect()
}

/// Append every feature, in order, to a copy of `panel`. Later features may read
/// columns produced by earlier ones.
pub fn build_features(panel: &Panel, features: &[Feature]) -> Result<Panel, FeatureError> {
    let mut out = panel.clone();
    for feature in features {
        let name = feature.output_name();
        if is_key_column(&name) {
            return Err(FeatureError::ReservedName(name));
        }
        if feature.periods() == Some(0) {
            return Err(FeatureError::ZeroPeriods(name));
        }
        if out.column_index(&name).is_some() {
            return Err(FeatureError::DuplicateColumn(name));
        }
        let idx = feature
            .inputs()
            .into_iter()
            .map(|c| {
                out.column_index(c).ok_or_else(|| FeatureError::UnknownColumn {
                    feature: name.clone(),
                    column: c.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let values = compute(&out, feature, &idx);
        debug!(
            "feature {}: {} of {} rows present",
            name,
            values.iter().filter(|v| v.is_some()).count(),
            values.len()
        );
        out.push_column(name, values);
    }
    Ok(out)
}
