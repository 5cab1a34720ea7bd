//! wbi_health
//!
//! A small Rust library for turning World Bank health indicators into an
//! analysis-ready country-year table. Pairs with the `wbi-health` CLI.
//!
//! ### Features
//! - Fetch indicators for all (or selected) countries over a year range, with retry
//! - Drop regional / income-group aggregates and enforce one row per country-year
//! - Outer-join the indicators into one wide table
//! - Derive lag, year-over-year, log and efficiency-ratio columns
//! - Save raw, cleaned, merged and feature tables as CSV or JSON
//!
//! ### Example
//! ```no_run
//! use wbi_health::{Client, Pipeline, PipelineConfig};
//!
//! let cfg = PipelineConfig {
//!     countries: vec!["USA".into(), "DEU".into()],
//!     ..PipelineConfig::default()
//! };
//! let out = Pipeline::new(Client::default(), cfg).run()?;
//! println!("{} rows in {}", out.summary.rows, out.summary.features_file.display());
//! let stats = wbi_health::stats::grouped_summary(&out.features);
//! println!("{:#?}", stats);
//! # Ok::<(), wbi_health::error::PipelineError>(())
//! ```

pub mod api;
pub mod clean;
pub mod config;
pub mod error;
pub mod features;
pub mod merge;
pub mod models;
pub mod panel;
pub mod pipeline;
pub mod stats;
pub mod storage;

pub use crate::api::{Client, IndicatorSource};
pub use crate::config::PipelineConfig;
pub use crate::models::{CountryYear, Indicator, IndicatorRecord, YearRange};
pub use crate::panel::Panel;
pub use crate::pipeline::Pipeline;
