use crate::config::toml_config::{RechargeConfig, RegionConfig, RunMode};
use crate::domain::roi::Roi;
use crate::utils::error::{RechargeError, Result};
use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliRunMode {
    Roi,
    Pixel,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "groundwater-recharge")]
#[command(about = "Monthly groundwater recharge from precipitation, PET and soil texture")]
pub struct CliConfig {
    /// Path to TOML run configuration
    #[arg(short, long, default_value = "recharge.toml")]
    pub config: String,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[arg(long, value_enum, default_value = "compact")]
    pub log_format: LogFormat,

    /// Validate and summarise the run without fetching any data
    #[arg(long)]
    pub dry_run: bool,

    /// Replace the configured regions with one region, e.g. '[[10.5,46.2]]'
    #[arg(long)]
    pub roi: Option<String>,

    /// Override period start (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<String>,

    /// Override period end, exclusive (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<String>,

    #[arg(long, value_enum)]
    pub mode: Option<CliRunMode>,

    #[arg(long)]
    pub output_path: Option<String>,

    #[arg(long)]
    pub concurrent_regions: Option<usize>,
}

impl CliConfig {
    /// Applies command line overrides on top of the file configuration.
    pub fn apply_overrides(&self, config: &mut RechargeConfig) -> Result<()> {
        if let Some(roi) = &self.roi {
            let parsed = Roi::parse(roi)?;
            let roi = match parsed {
                Roi::Point(c) => vec![vec![c.lon, c.lat]],
                Roi::Polygon(ring) => ring.iter().map(|c| vec![c.lon, c.lat]).collect(),
            };
            config.regions = vec![RegionConfig {
                name: "cli".to_string(),
                roi,
            }];
            tracing::info!("🔧 Region overridden from command line");
        }
        if let Some(start) = &self.start {
            config.period.start = start.clone();
        }
        if let Some(end) = &self.end {
            config.period.end = end.clone();
        }
        if let Some(mode) = self.mode {
            config.run.mode = match mode {
                CliRunMode::Roi => RunMode::Roi,
                CliRunMode::Pixel => RunMode::Pixel,
            };
            tracing::info!("🔧 Run mode overridden to: {:?}", config.run.mode);
        }
        if let Some(path) = &self.output_path {
            config.load.output_path = path.clone();
        }
        if let Some(n) = self.concurrent_regions {
            if n == 0 {
                return Err(RechargeError::InvalidConfigValueError {
                    field: "--concurrent-regions".to_string(),
                    value: n.to_string(),
                    reason: "Value must be at least 1".to_string(),
                });
            }
            config.run.concurrent_regions = Some(n);
        }
        Ok(())
    }
}
