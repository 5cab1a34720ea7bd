use crate::panel::Panel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Grouping key used in stats: one panel column for one country.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey {
    pub column: String,
    pub country_code: String,
}

/// Summary statistics for a group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    pub key: GroupKey,
    pub count: usize,
    pub missing: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
}

fn summarize(key: GroupKey, mut vals: Vec<f64>, missing: usize) -> Summary {
    vals.sort_by(f64::total_cmp);
    let count = vals.len();
    let min = vals.first().cloned();
    let max = vals.last().cloned();
    let mean = if count > 0 {
        Some(vals.iter().copied().sum::<f64>() / count as f64)
    } else {
        None
    };
    let median = if count == 0 {
        None
    } else if count % 2 == 1 {
        Some(vals[count / 2])
    } else {
        Some((vals[count / 2 - 1] + vals[count / 2]) / 2.0)
    };
    Summary {
        key,
        count,
        missing,
        min,
        max,
        mean,
        median,
    }
}

/// Compute grouped statistics by (column, country_code).
pub fn grouped_summary(panel: &Panel) -> Vec<Summary> {
    let mut groups: BTreeMap<GroupKey, (Vec<f64>, usize)> = BTreeMap::new();
    for (idx, column) in panel.columns().iter().enumerate() {
        for (key, value) in panel.column_values(idx) {
            let entry = groups
                .entry(GroupKey {
                    column: column.clone(),
                    country_code: key.country_code.clone(),
                })
                .or_default();
            match value {
                Some(v) => entry.0.push(v),
                None => entry.1 += 1,
            }
        }
    }

    groups
        .into_iter()
        .map(|(key, (vals, missing))| summarize(key, vals, missing))
        .collect()
}

/// Statistics per column across all countries. The `country_code` of each key is `"*"`.
pub fn column_summary(panel: &Panel) -> Vec<Summary> {
    panel
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            let (vals, missing): (Vec<_>, Vec<_>) =
                panel.column_values(idx).map(|(_, v)| v).partition(Option::is_some);
            summarize(
                GroupKey {
                    column: column.clone(),
                    country_code: "*".into(),
                },
                vals.into_iter().flatten().collect(),
                missing.len(),
            )
        })
        .collect()
}
