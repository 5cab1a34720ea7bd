use std::collections::HashMap;
use tempfile::TempDir;
use wbi_health::error::{FetchError, PipelineError, ValidationError};
use wbi_health::features::Feature;
use wbi_health::pipeline::{Pipeline, RawFiles};
use wbi_health::storage::{self, Format};
use wbi_health::{CountryYear, Indicator, IndicatorRecord, IndicatorSource, PipelineConfig, YearRange};

/// Serves canned records per indicator code; unknown codes fail like an exhausted fetch.
struct Canned(HashMap<String, Vec<IndicatorRecord>>);

impl IndicatorSource for Canned {
    fn fetch_indicator(
        &self,
        indicator_code: &str,
        _countries: &[String],
        _years: YearRange,
    ) -> Result<Vec<IndicatorRecord>, FetchError> {
        self.0
            .get(indicator_code)
            .cloned()
            .ok_or_else(|| FetchError::Exhausted {
                attempts: 3,
                last: Box::new(FetchError::Status { status: 500 }),
            })
    }
}

fn series(indicator: &str, country: &str, start: i32, values: &[f64]) -> Vec<IndicatorRecord> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| IndicatorRecord {
            country_code: country.into(),
            country_name: "United States".into(),
            year: start + i as i32,
            indicator_code: indicator.into(),
            value: Some(*v),
        })
        .collect()
}

fn usa_source() -> Canned {
    let mut m = HashMap::new();
    m.insert("EXP".to_string(), series("EXP", "USA", 2019, &[8.0, 8.5, 9.0]));
    m.insert("LE".to_string(), series("LE", "USA", 2019, &[78.5, 78.8, 79.0]));
    Canned(m)
}

fn config(dir: &TempDir) -> PipelineConfig {
    PipelineConfig {
        indicators: vec![
            Indicator::new("expenditure", "EXP"),
            Indicator::new("life_expectancy", "LE"),
        ],
        countries: vec!["USA".into()],
        start_year: 2019,
        end_year: 2021,
        raw_dir: dir.path().join("raw"),
        processed_dir: dir.path().join("processed"),
        features: vec![
            Feature::lag("expenditure", 1),
            Feature::delta("expenditure"),
            Feature::ratio("life_expectancy", "expenditure"),
        ],
        ..PipelineConfig::default()
    }
}

#[test]
fn usa_end_to_end() {
    let dir = TempDir::new().unwrap();
    let out = Pipeline::new(usa_source(), config(&dir)).run().unwrap();

    let f = &out.features;
    assert_eq!(f.len(), 3);
    let key = |y| CountryYear::new("USA", y);
    assert_eq!(f.get(&key(2019), "lag_expenditure"), None);
    assert_eq!(f.get(&key(2020), "lag_expenditure"), Some(8.0));
    assert_eq!(f.get(&key(2019), "delta_expenditure"), None);
    let d = f.get(&key(2021), "delta_expenditure").unwrap();
    assert!((d - 0.5).abs() < 1e-12);
    let r = f.get(&key(2019), "life_expectancy_per_expenditure").unwrap();
    assert!((r - 78.5 / 8.0).abs() < 1e-12);

    let s = &out.summary;
    assert_eq!(s.rows, 3);
    assert_eq!(s.raw_files.len(), 2);
    assert_eq!(s.cleaned_files.len(), 2);
    assert!(s.raw_files.iter().all(|p| p.exists()));
    assert!(s.cleaned_files.iter().all(|p| p.exists()));
    assert!(dir.path().join("processed/cleaned/expenditure_clean.csv").exists());
    assert!(s.merged_file.exists());

    let reread = storage::read_panel_csv(&s.features_file).unwrap();
    assert_eq!(&reread, f);
}

#[test]
fn rerun_from_raw_files_matches() {
    let dir = TempDir::new().unwrap();
    let cfg = config(&dir);
    let first = Pipeline::new(usa_source(), cfg.clone()).run().unwrap();

    let again = Pipeline::new(RawFiles::from_config(&cfg), cfg)
        .without_raw_output()
        .run()
        .unwrap();
    assert_eq!(again.features, first.features);
    assert!(again.summary.raw_files.is_empty());
}

#[test]
fn json_output_is_supported() {
    let dir = TempDir::new().unwrap();
    let cfg = PipelineConfig {
        format: Format::Json,
        ..config(&dir)
    };
    let out = Pipeline::new(usa_source(), cfg).run().unwrap();
    assert!(out.summary.features_file.ends_with("features.json"));

    let txt = std::fs::read_to_string(&out.summary.features_file).unwrap();
    let v: serde_json::Value = serde_json::from_str(&txt).unwrap();
    let rows = v.as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows[0]["lag_expenditure"].is_null());
    assert_eq!(rows[1]["lag_expenditure"], serde_json::json!(8.0));
}

#[test]
fn fetch_failure_aborts_before_writing() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(&dir);
    cfg.indicators.push(Indicator::new("gdp", "MISSING"));

    let err = Pipeline::new(usa_source(), cfg).run().unwrap_err();
    match err {
        PipelineError::Fetch { indicator, source } => {
            assert_eq!(indicator, "gdp");
            assert!(matches!(source, FetchError::Exhausted { .. }));
        }
        other => panic!("expected fetch error, got {other:?}"),
    }
    assert!(!dir.path().join("raw").exists());
    assert!(!dir.path().join("processed").exists());
}

#[test]
fn conflicting_duplicates_abort_the_run() {
    let dir = TempDir::new().unwrap();
    let mut source = usa_source();
    source
        .0
        .get_mut("EXP")
        .unwrap()
        .extend(series("EXP", "USA", 2019, &[7.0]));

    let err = Pipeline::new(source, config(&dir)).run().unwrap_err();
    match err {
        PipelineError::Validation { indicator, source } => {
            assert_eq!(indicator, "expenditure");
            assert!(matches!(source, ValidationError::DuplicateKey { .. }));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert!(!dir.path().join("processed").exists());
}
