use crate::error::StorageError;
use crate::models::{CountryYear, IndicatorRecord};
use crate::panel::{KEY_COLUMNS, Panel};
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

/// File format of everything the pipeline writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Csv,
    Json,
}

impl Format {
    pub fn extension(self) -> &'static str {
        match self {
            Format::Csv => "csv",
            Format::Json => "json",
        }
    }
}

const RECORD_HEADER: [&str; 5] = [
    "country_code",
    "country_name",
    "year",
    "indicator_code",
    "value",
];

// Spreadsheet apps evaluate cells starting with these characters as formulas.
fn is_formula_start(c: char) -> bool {
    matches!(c, '=' | '+' | '-' | '@')
}

/// Prefix text cells that would be read as a formula with a single quote.
pub fn sanitize_cell(s: &str) -> Cow<'_, str> {
    match s.chars().next() {
        Some(c) if is_formula_start(c) => Cow::Owned(format!("'{s}")),
        _ => Cow::Borrowed(s),
    }
}

fn unsanitize_cell(s: &str) -> &str {
    match s.strip_prefix('\'') {
        Some(rest) if rest.chars().next().is_some_and(is_formula_start) => rest,
        _ => s,
    }
}

fn ensure_parent(path: &Path) -> Result<(), StorageError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            fs::create_dir_all(dir).map_err(|e| StorageError::io(dir, e))
        }
        _ => Ok(()),
    }
}

fn write_json<P: AsRef<Path>>(value: &impl Serialize, path: P) -> Result<(), StorageError> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let mut f = File::create(path).map_err(|e| StorageError::io(path, e))?;
    let s = serde_json::to_string_pretty(value)?;
    f.write_all(s.as_bytes()).map_err(|e| StorageError::io(path, e))?;
    Ok(())
}

/// Save indicator records as CSV with header.
pub fn save_records_csv<P: AsRef<Path>>(
    records: &[IndicatorRecord],
    path: P,
) -> Result<(), StorageError> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let mut wtr = WriterBuilder::new().from_path(path)?;
    wtr.write_record(RECORD_HEADER)?;
    for r in records {
        wtr.serialize((
            sanitize_cell(&r.country_code),
            sanitize_cell(&r.country_name),
            r.year,
            sanitize_cell(&r.indicator_code),
            r.value,
        ))?;
    }
    wtr.flush().map_err(|e| StorageError::io(path, e))?;
    Ok(())
}

/// Save indicator records as pretty JSON array.
pub fn save_records_json<P: AsRef<Path>>(
    records: &[IndicatorRecord],
    path: P,
) -> Result<(), StorageError> {
    write_json(&records, path)
}

pub fn save_records<P: AsRef<Path>>(
    records: &[IndicatorRecord],
    path: P,
    format: Format,
) -> Result<(), StorageError> {
    match format {
        Format::Csv => save_records_csv(records, path),
        Format::Json => save_records_json(records, path),
    }
}

/// Read records written by [`save_records_csv`].
pub fn read_records_csv<P: AsRef<Path>>(path: P) -> Result<Vec<IndicatorRecord>, StorageError> {
    let mut rdr = ReaderBuilder::new().from_path(path.as_ref())?;
    let mut out = Vec::new();
    for row in rdr.deserialize::<IndicatorRecord>() {
        let mut r = row?;
        r.country_code = unsanitize_cell(&r.country_code).to_string();
        r.country_name = unsanitize_cell(&r.country_name).to_string();
        r.indicator_code = unsanitize_cell(&r.indicator_code).to_string();
        out.push(r);
    }
    Ok(out)
}

pub fn read_records_json<P: AsRef<Path>>(path: P) -> Result<Vec<IndicatorRecord>, StorageError> {
    let path = path.as_ref();
    let f = File::open(path).map_err(|e| StorageError::io(path, e))?;
    Ok(serde_json::from_reader(std::io::BufReader::new(f))?)
}

pub fn read_records<P: AsRef<Path>>(
    path: P,
    format: Format,
) -> Result<Vec<IndicatorRecord>, StorageError> {
    match format {
        Format::Csv => read_records_csv(path),
        Format::Json => read_records_json(path),
    }
}

/// Save a panel as wide CSV: `country_code,country_name,year,<columns...>`.
/// Absent values are written as empty cells.
pub fn save_panel_csv<P: AsRef<Path>>(panel: &Panel, path: P) -> Result<(), StorageError> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let mut wtr = WriterBuilder::new().from_path(path)?;
    let mut header: Vec<Cow<'_, str>> = KEY_COLUMNS.iter().map(|k| Cow::from(*k)).collect();
    header.extend(panel.columns().iter().map(|c| sanitize_cell(c)));
    wtr.write_record(header.iter().map(|h| h.as_bytes()))?;

    for (key, row) in panel.rows() {
        let mut rec: Vec<String> = Vec::with_capacity(header.len());
        rec.push(sanitize_cell(&key.country_code).into_owned());
        rec.push(sanitize_cell(&row.country_name).into_owned());
        rec.push(key.year.to_string());
        rec.extend(
            row.values
                .iter()
                .map(|v| v.map(|x| x.to_string()).unwrap_or_default()),
        );
        wtr.write_record(&rec)?;
    }
    wtr.flush().map_err(|e| StorageError::io(path, e))?;
    Ok(())
}

/// Save a panel as a JSON array of row objects; absent values are `null`.
pub fn save_panel_json<P: AsRef<Path>>(panel: &Panel, path: P) -> Result<(), StorageError> {
    let rows: Vec<Value> = panel
        .rows()
        .map(|(key, row)| {
            let mut obj = Map::new();
            obj.insert("country_code".into(), Value::from(key.country_code.as_str()));
            obj.insert("country_name".into(), Value::from(row.country_name.as_str()));
            obj.insert("year".into(), Value::from(key.year));
            for (col, v) in panel.columns().iter().zip(&row.values) {
                obj.insert(col.clone(), v.map(Value::from).unwrap_or(Value::Null));
            }
            Value::Object(obj)
        })
        .collect();
    write_json(&rows, path)
}

pub fn save_panel<P: AsRef<Path>>(panel: &Panel, path: P, format: Format) -> Result<(), StorageError> {
    match format {
        Format::Csv => save_panel_csv(panel, path),
        Format::Json => save_panel_json(panel, path),
    }
}

/// Read a wide CSV written by [`save_panel_csv`].
pub fn read_panel_csv<P: AsRef<Path>>(path: P) -> Result<Panel, StorageError> {
    let path = path.as_ref();
    let mut rdr = ReaderBuilder::new().from_path(path)?;
    let headers = rdr.headers()?.clone();
    if headers.len() < 3 || &headers[0] != "country_code" || &headers[2] != "year" {
        return Err(StorageError::Format {
            path: path.to_path_buf(),
            reason: "expected country_code,country_name,year header".into(),
        });
    }
    let columns = headers
        .iter()
        .skip(3)
        .map(|h| unsanitize_cell(h).to_string())
        .collect();
    let mut panel = Panel::new(columns);

    for (line, rec) in rdr.records().enumerate() {
        let rec = rec?;
        let bad = |what: &str| StorageError::Format {
            path: path.to_path_buf(),
            reason: format!("row {}: {}", line + 1, what),
        };
        let year: i32 = rec[2].trim().parse().map_err(|_| bad("invalid year"))?;
        let values = rec
            .iter()
            .skip(3)
            .map(|cell| {
                let cell = cell.trim();
                if cell.is_empty() {
                    Ok(None)
                } else {
                    cell.parse::<f64>().map(Some).map_err(|_| bad("invalid number"))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        panel.insert_row(
            CountryYear::new(unsanitize_cell(&rec[0]), year),
            unsanitize_cell(&rec[1]),
            values,
        );
    }
    Ok(panel)
}
