use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use wbi_health::pipeline::{Pipeline, RawFiles};
use wbi_health::storage::Format;
use wbi_health::{Client, PipelineConfig, stats};

#[derive(Parser, Debug)]
#[command(
    name = "wbi-health",
    version,
    about = "Fetch, clean, merge & engineer features from World Bank health indicators"
)]
struct Cli {
    /// Pipeline config file (.toml, .yaml, .yml or .json). Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Country codes separated by comma or semicolon (e.g., USA,DEU). Default: all countries.
    #[arg(long)]
    countries: Option<String>,
    /// First year of the range.
    #[arg(long)]
    start_year: Option<i32>,
    /// Last year of the range (inclusive).
    #[arg(long)]
    end_year: Option<i32>,
    /// Directory for raw indicator tables.
    #[arg(long)]
    raw_dir: Option<PathBuf>,
    /// Directory for cleaned, merged and feature tables.
    #[arg(long)]
    processed_dir: Option<PathBuf>,
    /// Output format for every table.
    #[arg(long, value_enum)]
    format: Option<OutFormat>,
    /// Re-run cleaning and features from the raw tables of an earlier run instead of the API.
    #[arg(long, default_value_t = false)]
    from_raw: bool,
    /// Print grouped statistics of the feature table to stdout.
    #[arg(long, default_value_t = false)]
    stats: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OutFormat {
    Csv,
    Json,
}

impl From<OutFormat> for Format {
    fn from(f: OutFormat) -> Self {
        match f {
            OutFormat::Csv => Format::Csv,
            OutFormat::Json => Format::Json,
        }
    }
}

fn fmt_opt(v: Option<f64>) -> String {
    match v {
        Some(x) if x.is_finite() => {
            // Format up to 4 decimals, then trim trailing zeros and trailing dot.
            let s = format!("{:.4}", x);
            s.trim_end_matches('0').trim_end_matches('.').to_string()
        }
        _ => "NA".to_string(),
    }
}

fn parse_list(s: &str) -> Vec<String> {
    s.split([',', ';'])
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut cfg = match &cli.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(c) = &cli.countries {
        cfg.countries = parse_list(c);
    }
    if let Some(y) = cli.start_year {
        cfg.start_year = y;
    }
    if let Some(y) = cli.end_year {
        cfg.end_year = y;
    }
    if let Some(d) = &cli.raw_dir {
        cfg.raw_dir = d.clone();
    }
    if let Some(d) = &cli.processed_dir {
        cfg.processed_dir = d.clone();
    }
    if let Some(f) = cli.format {
        cfg.format = f.into();
    }
    cfg.validate().context("invalid configuration")?;
    Ok(cfg)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let cfg = load_config(&cli)?;

    let out = if cli.from_raw {
        let source = RawFiles::from_config(&cfg);
        Pipeline::new(source, cfg).without_raw_output().run()?
    } else {
        let client = Client::new(cfg.api.clone()).context("building http client")?;
        Pipeline::new(client, cfg).run()?
    };

    eprintln!(
        "Saved {} rows x {} columns to {}",
        out.summary.rows,
        out.summary.columns,
        out.summary.features_file.display()
    );

    if cli.stats {
        for s in stats::grouped_summary(&out.features) {
            println!(
                "{} • {}  count={} missing={}  min={} max={} mean={} median={}",
                s.key.country_code,
                s.key.column,
                s.count,
                s.missing,
                fmt_opt(s.min),
                fmt_opt(s.max),
                fmt_opt(s.mean),
                fmt_opt(s.median)
            );
        }
    }

    Ok(())
}
