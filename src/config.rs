//! Pipeline configuration.
//!
//! Defaults reproduce the standard health run: four indicators for every
//! country from 2000 to 2023, written under `data/`. A config file
//! (`.toml`, `.yaml`/`.yml` or `.json`) only needs the fields it changes.
//!
//! ```toml
//! countries = ["USA", "DEU"]
//! start_year = 2010
//!
//! [api.retry]
//! max_attempts = 5
//!
//! [[features]]
//! kind = "lag"
//! column = "gdp_per_capita"
//! periods = 2
//! ```

use crate::api::ClientOptions;
use crate::clean::CleanOptions;
use crate::error::ConfigError;
use crate::features::Feature;
use crate::models::{Indicator, YearRange};
use crate::panel::is_key_column;
use crate::storage::Format;
use ::config::{Config, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub const LIFE_EXPECTANCY: &str = "life_expectancy";
pub const HEALTH_EXPENDITURE: &str = "health_expenditure_pct_gdp";
pub const INFANT_MORTALITY: &str = "infant_mortality";
pub const GDP_PER_CAPITA: &str = "gdp_per_capita";

pub fn default_indicators() -> Vec<Indicator> {
    vec![
        Indicator::new(LIFE_EXPECTANCY, "SP.DYN.LE00.IN"),
        Indicator::new(HEALTH_EXPENDITURE, "SH.XPD.CHEX.GD.ZS"),
        Indicator::new(INFANT_MORTALITY, "SP.DYN.IMRT.IN"),
        Indicator::new(GDP_PER_CAPITA, "NY.GDP.PCAP.CD"),
    ]
}

pub fn default_features() -> Vec<Feature> {
    vec![
        Feature::log(GDP_PER_CAPITA),
        Feature::growth(HEALTH_EXPENDITURE).named("health_exp_yoy_growth"),
        Feature::delta(LIFE_EXPECTANCY).named("life_expectancy_yoy_change"),
        Feature::lag(HEALTH_EXPENDITURE, 1).named("health_exp_lag_1y"),
        Feature::ratio(LIFE_EXPECTANCY, HEALTH_EXPENDITURE).named("life_expectancy_per_health_exp"),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub indicators: Vec<Indicator>,
    /// ISO3 codes to request; empty means all countries.
    pub countries: Vec<String>,
    pub start_year: i32,
    pub end_year: i32,
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub format: Format,
    pub api: ClientOptions,
    pub cleaning: CleanOptions,
    pub features: Vec<Feature>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            indicators: default_indicators(),
            countries: vec![],
            start_year: 2000,
            end_year: 2023,
            raw_dir: PathBuf::from("data/raw"),
            processed_dir: PathBuf::from("data/processed"),
            format: Format::Csv,
            api: ClientOptions::default(),
            cleaning: CleanOptions::default(),
            features: default_features(),
        }
    }
}

impl PipelineConfig {
    /// Load a config file; the format follows the extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };
        let cfg: PipelineConfig = Config::builder()
            .add_source(File::from(path).format(format))
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.start_year > self.end_year {
            return Err(ConfigError::YearRange {
                start: self.start_year,
                end: self.end_year,
            });
        }
        if self.indicators.is_empty() {
            return Err(ConfigError::NoIndicators);
        }
        let mut seen = BTreeSet::new();
        for i in &self.indicators {
            if is_key_column(&i.name) {
                return Err(ConfigError::ReservedName(i.name.clone()));
            }
            if !seen.insert(i.name.as_str()) {
                return Err(ConfigError::DuplicateIndicator(i.name.clone()));
            }
        }
        if self.api.retry.max_attempts == 0 {
            return Err(ConfigError::Retry("max_attempts must be at least 1".into()));
        }
        Ok(())
    }

    pub fn years(&self) -> YearRange {
        YearRange::new(self.start_year, self.end_year)
    }

    pub fn cleaned_dir(&self) -> PathBuf {
        self.processed_dir.join("cleaned")
    }
}
