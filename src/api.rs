//! Synchronous client for the **World Bank Indicators API (v2)**.
//!
//! This module focuses on the `country/{codes}/indicator/{code}` endpoint and returns
//! results as `models::IndicatorRecord` rows. Pagination is handled automatically and
//! every page request goes through a bounded retry with backoff.
//!
//! ### Notes
//! - The API sometimes serializes `per_page` as a **string**; we accept both string/number.
//! - Indicators are requested one at a time; [`IndicatorSource::fetch_all`] walks a list
//!   and reports which ones failed instead of stopping at the first failure.
//! - Network timeouts use a sane default (60s) and can be adjusted via [`ClientOptions`].
//!
//! Typical usage:
//! ```no_run
//! # use wbi_health::{Client, YearRange};
//! # use wbi_health::api::IndicatorSource;
//! let client = Client::default();
//! let rows = client.fetch_indicator(
//!     "SP.DYN.LE00.IN",
//!     &["DEU".into()],
//!     YearRange::new(2019, 2021),
//! )?;
//! # Ok::<(), wbi_health::error::FetchError>(())
//! ```
use crate::error::FetchError;
use crate::models::{Entry, Indicator, IndicatorRecord, Meta, YearRange};
use log::{debug, info, warn};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};
use reqwest::blocking::Client as HttpClient;
use reqwest::redirect::Policy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.worldbank.org/v2";

// Safety cap to avoid pathological jobs
const MAX_PAGES: u32 = 1000;

/// How often and how patiently a single request is retried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 100,
            multiplier: 3,
        }
    }
}

impl RetryPolicy {
    /// No sleeping between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms: 0,
            multiplier: 1,
        }
    }

    /// Delay after the given (1-based) failed attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = u64::from(self.multiplier).saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.initial_backoff_ms.saturating_mul(factor))
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the policy
/// runs out of attempts. `op` receives the 1-based attempt number.
pub fn with_retry<T>(
    policy: &RetryPolicy,
    mut op: impl FnMut(u32) -> Result<T, FetchError>,
) -> Result<T, FetchError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(v) => return Ok(v),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) if attempt >= max_attempts => {
                return Err(FetchError::Exhausted {
                    attempts: attempt,
                    last: Box::new(e),
                });
            }
            Err(e) => {
                let delay = policy.backoff(attempt);
                warn!(
                    "attempt {}/{} failed: {}; retrying in {:?}",
                    attempt, max_attempts, e, delay
                );
                std::thread::sleep(delay);
                attempt += 1;
            }
        }
    }
}

/// Anything the pipeline can pull indicator observations from.
pub trait IndicatorSource {
    /// Fetch every observation of one indicator for the given countries and years.
    /// An empty country list (or `"all"`) means every country the API knows.
    fn fetch_indicator(
        &self,
        indicator_code: &str,
        countries: &[String],
        years: YearRange,
    ) -> Result<Vec<IndicatorRecord>, FetchError>;

    /// Fetch several indicators, one request series each. Failures are collected
    /// in the report next to the successes.
    fn fetch_all(
        &self,
        indicators: &[Indicator],
        countries: &[String],
        years: YearRange,
    ) -> FetchReport {
        let mut report = FetchReport::default();
        for indicator in indicators {
            info!("Fetching {} ({})", indicator.name, indicator.code);
            match self.fetch_indicator(&indicator.code, countries, years) {
                Ok(records) => {
                    info!("Fetched {} records for {}", records.len(), indicator.name);
                    report.fetched.push((indicator.clone(), records));
                }
                Err(e) => {
                    warn!("Fetching {} failed: {}", indicator.name, e);
                    report.failed.push((indicator.clone(), e));
                }
            }
        }
        report
    }
}

/// Outcome of [`IndicatorSource::fetch_all`].
#[derive(Debug, Default)]
pub struct FetchReport {
    pub fetched: Vec<(Indicator, Vec<IndicatorRecord>)>,
    pub failed: Vec<(Indicator, FetchError)>,
}

impl FetchReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// All fetched tables, or the first failure if any indicator failed.
    pub fn into_complete(
        self,
    ) -> Result<Vec<(Indicator, Vec<IndicatorRecord>)>, (Indicator, FetchError)> {
        match self.failed.into_iter().next() {
            Some(first) => Err(first),
            None => Ok(self.fetched),
        }
    }
}

/// Connection settings for [`Client`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    pub base_url: String,
    pub per_page: u32,
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            per_page: 1000,
            timeout_secs: 60,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Client {
    pub base_url: String,
    pub per_page: u32,
    pub retry: RetryPolicy,
    http: HttpClient,
}

impl Default for Client {
    fn default() -> Self {
        Self::new(ClientOptions::default()).expect("reqwest client build")
    }
}

// Allow -, _, . unescaped in codes (common for indicator ids)
const SAFE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

fn enc_join<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .map(|s| percent_encoding::utf8_percent_encode(s.trim(), SAFE).to_string())
        .collect::<Vec<_>>()
        .join(";")
}

/// Path segment for the requested countries; `all` when none (or `all`) is given.
pub fn country_spec(countries: &[String]) -> String {
    let codes: Vec<&str> = countries
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect();
    if codes.is_empty() || codes.iter().any(|c| c.eq_ignore_ascii_case("all")) {
        "all".into()
    } else {
        enc_join(codes)
    }
}

/// Split one response page into its metadata and entries.
///
/// The API returns `[Meta, [Entry, ...]]`, or a `message` object in position 0 on error.
/// A page without the second element carries no observations.
pub fn parse_page(v: &Value) -> Result<(Meta, Vec<Entry>), FetchError> {
    let arr = v
        .as_array()
        .ok_or_else(|| FetchError::Malformed("not a top-level array".into()))?;
    let head = arr
        .first()
        .ok_or_else(|| FetchError::Malformed("empty array".into()))?;

    if let Some(msg) = head.get("message") {
        let text = msg
            .get(0)
            .and_then(|m| m.get("value"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| msg.to_string());
        return Err(FetchError::Api(text));
    }

    let meta: Meta = serde_json::from_value(head.clone())
        .map_err(|e| FetchError::Malformed(format!("meta: {}", e)))?;
    let entries: Vec<Entry> = match arr.get(1) {
        Some(Value::Null) | None => vec![],
        Some(list) => serde_json::from_value(list.clone())
            .map_err(|e| FetchError::Malformed(format!("entries: {}", e)))?,
    };
    Ok((meta, entries))
}

impl Client {
    pub fn new(opts: ClientOptions) -> Result<Self, FetchError> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(opts.timeout_secs)) // total request timeout
            .connect_timeout(Duration::from_secs(10))
            .redirect(Policy::limited(5))
            .user_agent(concat!("wbi_health/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self {
            base_url: opts.base_url.trim_end_matches('/').to_string(),
            per_page: opts.per_page.max(1),
            retry: opts.retry,
            http,
        })
    }

    fn get_json_once(&self, url: &str) -> Result<Value, FetchError> {
        let resp = self.http.get(url).send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }
        resp.json::<Value>()
            .map_err(|e| FetchError::Decode(e.to_string()))
    }

    /// GET `url` as JSON with the client's retry policy.
    pub fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        with_retry(&self.retry, |attempt| {
            debug!("GET {} (attempt {})", url, attempt);
            self.get_json_once(url)
        })
    }

    fn indicator_url(
        &self,
        indicator_code: &str,
        countries: &[String],
        years: YearRange,
    ) -> String {
        format!(
            "{}/country/{}/indicator/{}?format=json&per_page={}&date={}",
            self.base_url,
            country_spec(countries),
            enc_join([indicator_code]),
            self.per_page,
            years.to_query_param()
        )
    }
}

impl IndicatorSource for Client {
    fn fetch_indicator(
        &self,
        indicator_code: &str,
        countries: &[String],
        years: YearRange,
    ) -> Result<Vec<IndicatorRecord>, FetchError> {
        let url = self.indicator_url(indicator_code, countries, years);

        // Paginate until we retrieved all pages.
        let mut page = 1u32;
        let mut out: Vec<IndicatorRecord> = Vec::new();
        loop {
            if page > MAX_PAGES {
                return Err(FetchError::PageLimit(MAX_PAGES));
            }
            let page_url = format!("{}&page={}", url, page);
            let v = self.get_json(&page_url)?;
            let (meta, entries) = parse_page(&v)?;
            debug!(
                "{}: page {}/{} with {} entries",
                indicator_code,
                meta.page,
                meta.pages,
                entries.len()
            );

            for entry in entries {
                out.push(IndicatorRecord::try_from(entry)?);
            }

            if page >= meta.pages {
                break;
            }
            page += 1;
        }
        Ok(out)
    }
}
