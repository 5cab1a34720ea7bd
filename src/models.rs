use crate::error::FetchError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive range of calendar years, e.g. 2000..=2023.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    pub fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    pub fn to_query_param(&self) -> String {
        if self.start == self.end {
            self.start.to_string()
        } else {
            format!("{}:{}", self.start, self.end)
        }
    }

    pub fn contains(&self, year: i32) -> bool {
        self.start <= year && year <= self.end
    }
}

/// A configured indicator: the column name it gets in the merged table and
/// its World Bank code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indicator {
    pub name: String,
    pub code: String,
}

impl Indicator {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
        }
    }
}

/// Metadata section returned by the API (position 0).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meta {
    pub page: u32,
    pub pages: u32,
    /// Some responses encode `per_page` as a string, others as a number.
    /// Accept both and normalize to `u32`.
    #[serde(deserialize_with = "de_u32_from_string_or_number")]
    pub per_page: u32,
    pub total: u32,
}

/// Serde helper: parse `u32` from either a JSON number or a string.
fn de_u32_from_string_or_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};
    struct U32Visitor;

    impl<'de> Visitor<'de> for U32Visitor {
        type Value = u32;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "a string or integer representing a non-negative number")
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            u32::try_from(v).map_err(E::custom)
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            u32::try_from(v).map_err(|_| E::custom("value out of range for u32"))
        }

        fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            s.trim().parse::<u32>().map_err(E::custom)
        }
    }

    deserializer.deserialize_any(U32Visitor)
}

/// Serde helper: observation values arrive as numbers, numeric strings or null.
/// Anything that does not read as a number is treated as absent.
fn de_lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};
    struct ValueVisitor;

    impl<'de> Visitor<'de> for ValueVisitor {
        type Value = Option<f64>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "a number, a numeric string or null")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(v as f64))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(v as f64))
        }

        fn visit_str<E: de::Error>(self, s: &str) -> Result<Self::Value, E> {
            Ok(s.trim().parse::<f64>().ok())
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }
    }

    deserializer.deserialize_any(ValueVisitor)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeName {
    pub id: String,
    pub value: String,
}

/// Raw entry from the API (position 1 array).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub indicator: CodeName,
    pub country: CodeName,
    #[serde(default)]
    pub countryiso3code: String,
    pub date: String,
    #[serde(default, deserialize_with = "de_lenient_f64")]
    pub value: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(rename = "obs_status", default)]
    pub obs_status: Option<String>,
    #[serde(default)]
    pub decimal: Option<i32>,
}

/// One observation of one indicator (country, year, value). Produced by the
/// fetcher and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndicatorRecord {
    pub country_code: String, // ISO3
    pub country_name: String,
    pub year: i32,
    pub indicator_code: String,
    pub value: Option<f64>,
}

impl TryFrom<Entry> for IndicatorRecord {
    type Error = FetchError;

    fn try_from(e: Entry) -> Result<Self, Self::Error> {
        let year = e.date.trim().parse::<i32>().map_err(|_| {
            FetchError::Malformed(format!(
                "entry for {}/{} has non-annual date {:?}",
                e.countryiso3code, e.indicator.id, e.date
            ))
        })?;
        Ok(Self {
            country_code: e.countryiso3code.trim().to_string(),
            country_name: e.country.value,
            year,
            indicator_code: e.indicator.id,
            value: e.value,
        })
    }
}

/// Primary key of every table after cleaning: (country_code, year).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CountryYear {
    pub country_code: String,
    pub year: i32,
}

impl CountryYear {
    pub fn new(country_code: impl Into<String>, year: i32) -> Self {
        Self {
            country_code: country_code.into(),
            year,
        }
    }

    /// The same country `periods` years earlier; `None` if that year is not
    /// representable.
    pub fn shifted_back(&self, periods: u32) -> Option<Self> {
        let year = i32::try_from(periods)
            .ok()
            .and_then(|p| self.year.checked_sub(p))?;
        Some(Self {
            country_code: self.country_code.clone(),
            year,
        })
    }
}

impl fmt::Display for CountryYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.country_code, self.year)
    }
}
