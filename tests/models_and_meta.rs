use wbi_health::error::FetchError;
use wbi_health::models::{CountryYear, Entry, IndicatorRecord, Meta, YearRange};

#[test]
fn meta_per_page_accepts_string_or_number() {
    // per_page as string
    let m: Meta =
        serde_json::from_str(r#"{"page":1,"pages":2,"per_page":"1000","total":2000}"#).unwrap();
    assert_eq!(m.per_page, 1000);
    // per_page as number
    let m: Meta =
        serde_json::from_str(r#"{"page":1,"pages":2,"per_page":500,"total":2000}"#).unwrap();
    assert_eq!(m.per_page, 500);
}

fn entry(date: &str, value: &str) -> Entry {
    serde_json::from_str(&format!(
        r#"
    {{
      "indicator":{{"id":"SH.XPD.CHEX.GD.ZS","value":"Current health expenditure (% of GDP)"}},
      "country":{{"id":"DE","value":"Germany"}},
      "countryiso3code":"DEU",
      "date":"{date}",
      "value":{value},
      "unit":"",
      "obs_status":null,
      "decimal":1
    }}"#
    ))
    .unwrap()
}

#[test]
fn record_from_entry_parses_year_and_names() {
    let r = IndicatorRecord::try_from(entry("2020", "12.8")).unwrap();
    assert_eq!(r.year, 2020);
    assert_eq!(r.indicator_code, "SH.XPD.CHEX.GD.ZS");
    assert_eq!(r.country_name, "Germany");
    assert_eq!(r.country_code, "DEU");
    assert_eq!(r.value, Some(12.8));
}

#[test]
fn entry_values_are_coerced_leniently() {
    assert_eq!(entry("2020", r#""12.5""#).value, Some(12.5));
    assert_eq!(entry("2020", r#""n/a""#).value, None);
    assert_eq!(entry("2020", "null").value, None);
    assert_eq!(entry("2020", "13").value, Some(13.0));
}

#[test]
fn non_annual_dates_are_malformed() {
    let err = IndicatorRecord::try_from(entry("2020Q1", "1.0")).unwrap_err();
    assert!(matches!(err, FetchError::Malformed(_)));
}

#[test]
fn year_range_query_param() {
    assert_eq!(YearRange::new(2000, 2023).to_query_param(), "2000:2023");
    assert_eq!(YearRange::new(2020, 2020).to_query_param(), "2020");
    assert!(YearRange::new(2019, 2021).contains(2021));
    assert!(!YearRange::new(2019, 2021).contains(2018));
}

#[test]
fn country_year_orders_by_code_then_year() {
    let mut keys = vec![
        CountryYear::new("USA", 2019),
        CountryYear::new("DEU", 2021),
        CountryYear::new("DEU", 2019),
    ];
    keys.sort();
    assert_eq!(keys[0], CountryYear::new("DEU", 2019));
    assert_eq!(keys[2], CountryYear::new("USA", 2019));
    assert_eq!(
        CountryYear::new("USA", 2021).shifted_back(2),
        Some(CountryYear::new("USA", 2019))
    );
    assert_eq!(CountryYear::new("USA", 2021).shifted_back(u32::MAX), None);
    assert_eq!(CountryYear::new("USA", i32::MIN).shifted_back(1), None);
}
