//! Wide country-year table: one row per (country_code, year), one value
//! column per indicator or derived feature.

use crate::clean::CleanTable;
use crate::models::CountryYear;
use serde::Serialize;
use std::collections::BTreeMap;

/// Key columns written ahead of the value columns; no value column may use
/// one of these names.
pub const KEY_COLUMNS: [&str; 3] = ["country_code", "country_name", "year"];

pub fn is_key_column(name: &str) -> bool {
    KEY_COLUMNS.contains(&name)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelRow {
    pub country_name: String,
    /// Aligned with [`Panel::columns`].
    pub values: Vec<Option<f64>>,
}

/// Rows are kept ordered by (country_code, year); the key is unique.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Panel {
    columns: Vec<String>,
    rows: BTreeMap<CountryYear, PanelRow>,
}

impl Panel {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: BTreeMap::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = (&CountryYear, &PanelRow)> {
        self.rows.iter()
    }

    pub fn row(&self, key: &CountryYear) -> Option<&PanelRow> {
        self.rows.get(key)
    }

    /// Value of `column` at `key`; `None` when the row, the column or the value is absent.
    pub fn get(&self, key: &CountryYear, column: &str) -> Option<f64> {
        let idx = self.column_index(column)?;
        self.value_at(key, idx)
    }

    pub(crate) fn value_at(&self, key: &CountryYear, idx: usize) -> Option<f64> {
        self.rows.get(key).and_then(|r| r.values.get(idx).copied().flatten())
    }

    /// Insert or replace a row. Missing trailing values are padded as absent.
    pub fn insert_row(
        &mut self,
        key: CountryYear,
        country_name: impl Into<String>,
        mut values: Vec<Option<f64>>,
    ) {
        values.resize(self.columns.len(), None);
        self.rows.insert(
            key,
            PanelRow {
                country_name: country_name.into(),
                values,
            },
        );
    }

    /// Append a column; `values` follow row order.
    pub(crate) fn push_column(&mut self, name: String, values: Vec<Option<f64>>) {
        debug_assert_eq!(values.len(), self.rows.len());
        self.columns.push(name);
        for (row, v) in self.rows.values_mut().zip(values) {
            row.values.push(v);
        }
    }

    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = (&CountryYear, Option<f64>)> {
        self.rows
            .iter()
            .map(move |(k, r)| (k, r.values.get(idx).copied().flatten()))
    }
}

impl From<&CleanTable> for Panel {
    fn from(t: &CleanTable) -> Self {
        let mut p = Panel::new(vec![t.name.clone()]);
        for (key, obs) in &t.rows {
            p.insert_row(key.clone(), obs.country_name.clone(), vec![obs.value]);
        }
        p
    }
}
