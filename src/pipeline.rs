//! Pipeline driver: fetch -> clean -> merge -> features, then persist.
//!
//! Every stage runs to completion before anything is written, so a run that
//! fails leaves the files of the previous successful run untouched.

use crate::api::IndicatorSource;
use crate::clean::{CleanTable, clean_indicator};
use crate::config::PipelineConfig;
use crate::error::{FetchError, PipelineError};
use crate::features::build_features;
use crate::merge::merge_tables;
use crate::models::{Indicator, IndicatorRecord, YearRange};
use crate::panel::Panel;
use crate::storage::{self, Format};
use log::{error, info};
use std::path::PathBuf;

/// Raw tables written by an earlier run, used in place of the API.
#[derive(Debug, Clone)]
pub struct RawFiles {
    pub dir: PathBuf,
    pub format: Format,
    pub indicators: Vec<Indicator>,
}

impl RawFiles {
    pub fn from_config(cfg: &PipelineConfig) -> Self {
        Self {
            dir: cfg.raw_dir.clone(),
            format: cfg.format,
            indicators: cfg.indicators.clone(),
        }
    }

    pub fn path_for(&self, indicator: &Indicator) -> PathBuf {
        raw_path(&self.dir, indicator, self.format)
    }
}

impl IndicatorSource for RawFiles {
    fn fetch_indicator(
        &self,
        indicator_code: &str,
        countries: &[String],
        years: YearRange,
    ) -> Result<Vec<IndicatorRecord>, FetchError> {
        let indicator = self
            .indicators
            .iter()
            .find(|i| i.code == indicator_code)
            .ok_or_else(|| FetchError::RawFile(format!("no raw table for {indicator_code}")))?;
        let path = self.path_for(indicator);
        let records = storage::read_records(&path, self.format)
            .map_err(|e| FetchError::RawFile(format!("{}: {}", path.display(), e)))?;

        let all = countries.is_empty() || countries.iter().any(|c| c.eq_ignore_ascii_case("all"));
        Ok(records
            .into_iter()
            .filter(|r| years.contains(r.year))
            .filter(|r| all || countries.iter().any(|c| c.eq_ignore_ascii_case(&r.country_code)))
            .collect())
    }
}

fn raw_path(dir: &std::path::Path, indicator: &Indicator, format: Format) -> PathBuf {
    dir.join(format!("{}.{}", indicator.name, format.extension()))
}

/// Where a run put its files.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub raw_files: Vec<PathBuf>,
    pub cleaned_files: Vec<PathBuf>,
    pub merged_file: PathBuf,
    pub features_file: PathBuf,
    pub rows: usize,
    pub columns: usize,
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub summary: RunSummary,
    pub merged: Panel,
    pub features: Panel,
}

pub struct Pipeline<S> {
    source: S,
    config: PipelineConfig,
    write_raw: bool,
}

impl<S: IndicatorSource> Pipeline<S> {
    pub fn new(source: S, config: PipelineConfig) -> Self {
        Self {
            source,
            config,
            write_raw: true,
        }
    }

    /// Do not (re)write the raw area, e.g. when the source already is the raw area.
    pub fn without_raw_output(mut self) -> Self {
        self.write_raw = false;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self) -> Result<RunOutput, PipelineError> {
        self.config.validate()?;

        let fetched = self.extract()?;
        let cleaned = self.clean(&fetched)?;
        let merged = merge_tables(&cleaned)?;
        info!(
            "Merged {} tables into {} rows",
            cleaned.len(),
            merged.len()
        );
        let features = build_features(&merged, &self.config.features)?;
        info!(
            "Built {} feature columns",
            features.columns().len() - merged.columns().len()
        );

        let summary = self.persist(&fetched, &cleaned, &merged, &features)?;
        Ok(RunOutput {
            summary,
            merged,
            features,
        })
    }

    /// Fetch every configured indicator. Any failure aborts with the first error,
    /// after all failures have been logged.
    pub fn extract(&self) -> Result<Vec<(Indicator, Vec<IndicatorRecord>)>, PipelineError> {
        info!("Starting extract");
        let report = self.source.fetch_all(
            &self.config.indicators,
            &self.config.countries,
            self.config.years(),
        );
        if !report.is_complete() {
            for (indicator, e) in &report.failed {
                error!("{} could not be fetched: {}", indicator.name, e);
            }
            info!(
                "{} of {} indicators fetched",
                report.fetched.len(),
                self.config.indicators.len()
            );
        }
        report
            .into_complete()
            .map_err(|(indicator, source)| PipelineError::Fetch {
                indicator: indicator.name,
                source,
            })
    }

    pub fn clean(
        &self,
        fetched: &[(Indicator, Vec<IndicatorRecord>)],
    ) -> Result<Vec<CleanTable>, PipelineError> {
        info!("Starting cleaning");
        fetched
            .iter()
            .map(|(indicator, records)| {
                clean_indicator(indicator, records, &self.config.cleaning).map_err(|source| {
                    PipelineError::Validation {
                        indicator: indicator.name.clone(),
                        source,
                    }
                })
            })
            .collect()
    }

    fn persist(
        &self,
        fetched: &[(Indicator, Vec<IndicatorRecord>)],
        cleaned: &[CleanTable],
        merged: &Panel,
        features: &Panel,
    ) -> Result<RunSummary, PipelineError> {
        let cfg = &self.config;
        let ext = cfg.format.extension();
        let mut summary = RunSummary::default();

        if self.write_raw {
            for (indicator, records) in fetched {
                let path = raw_path(&cfg.raw_dir, indicator, cfg.format);
                storage::save_records(records, &path, cfg.format)?;
                info!("Raw data saved to {}", path.display());
                summary.raw_files.push(path);
            }
        }

        for table in cleaned {
            let path = cfg.cleaned_dir().join(format!("{}_clean.{}", table.name, ext));
            storage::save_records(&table.to_records(), &path, cfg.format)?;
            summary.cleaned_files.push(path);
        }
        info!("Cleaned indicators saved to {}", cfg.cleaned_dir().display());

        summary.merged_file = cfg.processed_dir.join(format!("merged.{ext}"));
        storage::save_panel(merged, &summary.merged_file, cfg.format)?;

        summary.features_file = cfg.processed_dir.join(format!("features.{ext}"));
        storage::save_panel(features, &summary.features_file, cfg.format)?;
        info!(
            "Feature table ({} rows) saved to {}",
            features.len(),
            summary.features_file.display()
        );

        summary.rows = features.len();
        summary.columns = features.columns().len();
        Ok(summary)
    }
}
