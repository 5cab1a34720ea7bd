//! Outer join of cleaned indicator tables on (country_code, year).
//!
//! The result does not depend on the order of the inputs: columns are sorted
//! by name, rows by key, and differing country names for one code resolve to
//! the smallest non-empty one.

use crate::clean::CleanTable;
use crate::error::MergeError;
use crate::panel::Panel;
use log::debug;
use std::collections::BTreeSet;

fn pick_name<'a>(a: &'a str, b: &'a str) -> &'a str {
    match (a.is_empty(), b.is_empty()) {
        (true, _) => b,
        (_, true) => a,
        _ => a.min(b),
    }
}

/// Outer-join two panels. Keys present on one side only get absent values
/// for the other side's columns, never zero.
pub fn outer_join(left: &Panel, right: &Panel) -> Result<Panel, MergeError> {
    let mut columns: Vec<String> = Vec::new();
    for c in left.columns().iter().chain(right.columns()) {
        if columns.contains(c) {
            return Err(MergeError::DuplicateColumn(c.clone()));
        }
        columns.push(c.clone());
    }
    columns.sort();

    let from_left: Vec<(usize, usize)> = left
        .columns()
        .iter()
        .enumerate()
        .filter_map(|(i, c)| columns.iter().position(|x| x == c).map(|j| (i, j)))
        .collect();
    let from_right: Vec<(usize, usize)> = right
        .columns()
        .iter()
        .enumerate()
        .filter_map(|(i, c)| columns.iter().position(|x| x == c).map(|j| (i, j)))
        .collect();

    let keys: BTreeSet<_> = left
        .rows()
        .map(|(k, _)| k)
        .chain(right.rows().map(|(k, _)| k))
        .collect();

    let mut out = Panel::new(columns);
    let width = out.columns().len();
    for key in keys {
        let mut values = vec![None; width];
        let l = left.row(key);
        let r = right.row(key);
        if let Some(row) = l {
            for &(i, j) in &from_left {
                values[j] = row.values.get(i).copied().flatten();
            }
        }
        if let Some(row) = r {
            for &(i, j) in &from_right {
                values[j] = row.values.get(i).copied().flatten();
            }
        }
        let name = pick_name(
            l.map(|x| x.country_name.as_str()).unwrap_or(""),
            r.map(|x| x.country_name.as_str()).unwrap_or(""),
        );
        out.insert_row(key.clone(), name, values);
    }
    Ok(out)
}

/// Merge N cleaned indicator tables into one wide panel.
pub fn merge_tables(tables: &[CleanTable]) -> Result<Panel, MergeError> {
    let mut iter = tables.iter();
    let first = iter.next().ok_or(MergeError::Empty)?;
    let mut merged = Panel::from(first);
    for t in iter {
        merged = outer_join(&merged, &Panel::from(t))?;
    }
    debug!(
        "merged {} tables into {} rows x {} columns",
        tables.len(),
        merged.len(),
        merged.columns().len()
    );
    Ok(merged)
}
