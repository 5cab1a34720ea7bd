//! Live API tests. Run with: `cargo test --features online -- --nocapture`
#![cfg(feature = "online")]

use wbi_health::api::IndicatorSource;
use wbi_health::clean::{CleanOptions, clean_indicator};
use wbi_health::config::default_indicators;
use wbi_health::{Client, YearRange};

#[test]
fn fetch_small_range() {
    let cli = Client::default();
    let pts = cli
        .fetch_indicator("SP.DYN.LE00.IN", &["DEU".into()], YearRange::new(2019, 2020))
        .unwrap();
    assert!(!pts.is_empty());
    assert!(pts.iter().all(|p| p.country_code == "DEU"));
    assert!(pts.iter().all(|p| p.year >= 2019 && p.year <= 2020));
}

#[test]
fn all_countries_clean_without_aggregates() {
    let cli = Client::default();
    let indicator = &default_indicators()[0];
    let raw = cli
        .fetch_indicator(&indicator.code, &[], YearRange::new(2020, 2020))
        .unwrap();
    assert!(raw.iter().any(|r| r.country_code == "WLD"));

    let t = clean_indicator(indicator, &raw, &CleanOptions::default()).unwrap();
    assert!(!t.is_empty());
    assert!(t.rows.keys().all(|k| k.country_code != "WLD" && k.country_code != "EUU"));
}

#[test]
fn fetch_all_default_indicators() {
    let cli = Client::default();
    let report = cli.fetch_all(&default_indicators(), &["USA".into()], YearRange::new(2019, 2021));
    assert!(report.is_complete());
    assert_eq!(report.fetched.len(), 4);
}
