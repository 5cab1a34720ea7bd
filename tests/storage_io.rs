use std::fs;
use tempfile::TempDir;
use wbi_health::models::{CountryYear, IndicatorRecord};
use wbi_health::panel::Panel;
use wbi_health::storage;

fn sample(n: usize) -> Vec<IndicatorRecord> {
    (0..n)
        .map(|i| IndicatorRecord {
            country_code: "DEU".into(),
            country_name: "Germany".into(),
            year: 2000 + i as i32,
            indicator_code: "SP.DYN.IMRT.IN".into(),
            value: if i == 1 { None } else { Some(4.0 - i as f64 * 0.1) },
        })
        .collect()
}

#[test]
fn save_records_csv_and_json() {
    let dir = TempDir::new().unwrap();
    let rows = sample(3);

    let csv_path = dir.path().join("infant_mortality.csv");
    storage::save_records_csv(&rows, &csv_path).unwrap();
    let csv_txt = fs::read_to_string(&csv_path).unwrap();
    assert!(csv_txt.starts_with("country_code,country_name,year,indicator_code,value"));
    assert_eq!(csv_txt.lines().count(), 1 + rows.len());
    // Absent values are empty cells.
    assert!(csv_txt.lines().nth(2).unwrap().ends_with(','));
    assert_eq!(storage::read_records_csv(&csv_path).unwrap(), rows);

    let json_path = dir.path().join("infant_mortality.json");
    storage::save_records_json(&rows, &json_path).unwrap();
    let json_txt = fs::read_to_string(&json_path).unwrap();
    let v: serde_json::Value = serde_json::from_str(&json_txt).unwrap();
    assert!(v.as_array().unwrap().len() == rows.len());
    assert!(v[1]["value"].is_null());
}

#[test]
fn panel_csv_round_trips_absent_values() {
    let dir = TempDir::new().unwrap();
    let mut p = Panel::new(vec!["life_expectancy".into(), "log_gdp_per_capita".into()]);
    p.insert_row(CountryYear::new("USA", 2020), "United States", vec![Some(77.0), None]);
    p.insert_row(CountryYear::new("DEU", 2020), "Germany", vec![None, Some(10.75)]);

    let path = dir.path().join("processed").join("merged.csv");
    storage::save_panel_csv(&p, &path).unwrap();
    let txt = fs::read_to_string(&path).unwrap();
    let mut lines = txt.lines();
    assert_eq!(
        lines.next().unwrap(),
        "country_code,country_name,year,life_expectancy,log_gdp_per_capita"
    );
    // Rows come out ordered by key.
    assert_eq!(lines.next().unwrap(), "DEU,Germany,2020,,10.75");
    assert_eq!(lines.next().unwrap(), "USA,United States,2020,77,");

    assert_eq!(storage::read_panel_csv(&path).unwrap(), p);
}

#[test]
fn panel_csv_rejects_foreign_files() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("other.csv");
    fs::write(&path, "a,b,c\n1,2,3\n").unwrap();
    assert!(storage::read_panel_csv(&path).is_err());
}

//test if the CSV file is save and won't include executable formulas
//this is a security issue, as the CSV file can be opened in Excel and the formulas
//can be executed, which can lead to data loss or other issues
//we prefix the cells with a single quote to avoid this issue
#[test]
fn csv_cells_are_prefixed_to_avoid_formulas() {
    // Arrange: craft a row with classic CSV/Excel injection starters
    let records = vec![IndicatorRecord {
        country_code: "=HYPERLINK(\"http://evil\")".into(), // leading '='
        country_name: "@foo".into(),                         // leading '@'
        year: 2020,
        indicator_code: "+SUM(A1:A9)".into(), // leading '+'
        value: Some(-1.0),
    }];

    let dir = TempDir::new().unwrap();
    let tmp = dir.path().join("csv_injection.csv");
    storage::save_records_csv(&records, &tmp).unwrap();

    let mut rdr = csv::Reader::from_path(&tmp).unwrap();
    let headers = rdr.headers().unwrap().clone();
    let row = rdr.records().next().expect("one data row expected").unwrap();

    let cell = |name: &str| {
        let idx = headers
            .iter()
            .position(|h| h == name)
            .expect("header present");
        row.get(idx).unwrap().to_string()
    };

    let code = cell("country_code");
    assert!(code.starts_with('\''), "country_code not prefixed: {code}");
    assert!(code.contains("=HYPERLINK"), "country_code content changed: {code}");

    let name = cell("country_name");
    assert!(name.starts_with('\''), "country_name not prefixed: {name}");

    let ind = cell("indicator_code");
    assert!(ind.starts_with('\''), "indicator_code not prefixed: {ind}");

    // Numbers are left alone.
    assert_eq!(cell("value"), "-1.0");

    // Reading back strips the guard again.
    let back = storage::read_records_csv(&tmp).unwrap();
    assert_eq!(back, records);
}

#[test]
fn panel_csv_headers_are_prefixed_to_avoid_formulas() {
    let dir = TempDir::new().unwrap();
    let mut p = Panel::new(vec!["=cmd".into(), "life_expectancy".into()]);
    p.insert_row(CountryYear::new("USA", 2020), "United States", vec![Some(1.0), Some(77.0)]);

    let path = dir.path().join("features.csv");
    storage::save_panel_csv(&p, &path).unwrap();
    let txt = fs::read_to_string(&path).unwrap();
    assert_eq!(
        txt.lines().next().unwrap(),
        "country_code,country_name,year,'=cmd,life_expectancy"
    );
    assert_eq!(storage::read_panel_csv(&path).unwrap(), p);
}
