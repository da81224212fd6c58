use crate::domain::model::DateRange;
use crate::domain::roi::Roi;
use crate::utils::error::{RechargeError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_positive_number, validate_range, validate_url, Validate,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RechargeConfig {
    pub run: RunConfig,
    pub source: SourceConfig,
    pub period: PeriodConfig,
    #[serde(default)]
    pub soil: SoilConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    pub load: LoadConfig,
    #[serde(default)]
    pub regions: Vec<RegionConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Reduce inputs to the region first, then run one water balance.
    Roi,
    /// Run the water balance per raster cell, then reduce the results.
    Pixel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_mode")]
    pub mode: RunMode,
    pub concurrent_regions: Option<usize>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Http,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub r#type: SourceType,
    pub endpoint: Option<String>,
    pub path: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodConfig {
    /// Inclusive, `YYYY-MM-DD`.
    pub start: String,
    /// Exclusive, `YYYY-MM-DD`.
    pub end: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoilConfig {
    #[serde(default = "default_root_depth")]
    pub root_depth_m: f64,
    #[serde(default = "default_partition")]
    pub partition_coefficient: f64,
}

impl Default for SoilConfig {
    fn default() -> Self {
        Self {
            root_depth_m: default_root_depth(),
            partition_coefficient: default_partition(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Reduction scale in metres.
    #[serde(default = "default_scale")]
    pub scale: f64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self { scale: default_scale() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub output_path: String,
    #[serde(default = "default_true")]
    pub soil_moisture: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionConfig {
    pub name: String,
    /// `[[lon, lat]]` for a point, three or more pairs for a polygon.
    pub roi: Vec<Vec<f64>>,
}

/// Output archive file name for a region; characters unsafe in file names become `_`.
pub fn archive_file_name(region: &str) -> String {
    let safe: String = region
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{}_recharge.zip", safe)
}

fn default_mode() -> RunMode {
    RunMode::Roi
}

fn default_root_depth() -> f64 {
    0.5
}

fn default_partition() -> f64 {
    0.5
}

fn default_scale() -> f64 {
    1000.0
}

fn default_true() -> bool {
    true
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|e| RechargeError::InvalidConfigValueError {
        field: field.to_string(),
        value: value.to_string(),
        reason: format!("expected YYYY-MM-DD: {}", e),
    })
}

impl RechargeConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(RechargeError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| RechargeError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unknown variables are left as is.
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| RechargeError::ConfigValidationError {
            field: "environment".to_string(),
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("run.name", &self.run.name)?;
        validate_positive_number("run.concurrent_regions", self.concurrent_regions(), 1)?;
        validate_positive_number("run.timeout_seconds", self.timeout_seconds() as usize, 1)?;

        match self.source.r#type {
            SourceType::Http => {
                let endpoint = self.source.endpoint.as_deref().ok_or_else(|| RechargeError::MissingConfigError {
                    field: "source.endpoint".to_string(),
                })?;
                validate_url("source.endpoint", endpoint)?;
            }
            SourceType::File => {
                let path = self.source.path.as_deref().ok_or_else(|| RechargeError::MissingConfigError {
                    field: "source.path".to_string(),
                })?;
                validate_path("source.path", path)?;
            }
        }
        if let Some(timeout) = self.source.timeout_seconds {
            validate_positive_number("source.timeout_seconds", timeout as usize, 1)?;
        }

        self.date_range()?;

        validate_range("soil.root_depth_m", self.soil.root_depth_m, 0.01, 10.0)?;
        validate_range("soil.partition_coefficient", self.soil.partition_coefficient, 0.0, 1.0)?;
        if self.soil.partition_coefficient == 0.0 {
            return Err(RechargeError::InvalidConfigValueError {
                field: "soil.partition_coefficient".to_string(),
                value: "0".to_string(),
                reason: "stored water at field capacity would be zero".to_string(),
            });
        }
        validate_range("extraction.scale", self.extraction.scale, 1.0, 1_000_000.0)?;

        validate_path("load.output_path", &self.load.output_path)?;

        if self.regions.is_empty() {
            return Err(RechargeError::MissingConfigError {
                field: "regions".to_string(),
            });
        }
        let mut archives = HashSet::new();
        for region in &self.regions {
            validate_non_empty_string("regions.name", &region.name)?;
            let archive = archive_file_name(&region.name);
            if !archives.insert(archive.clone()) {
                return Err(RechargeError::InvalidConfigValueError {
                    field: "regions.name".to_string(),
                    value: region.name.clone(),
                    reason: format!("another region already writes {}", archive),
                });
            }
        }
        self.regions()?;

        Ok(())
    }

    pub fn date_range(&self) -> Result<DateRange> {
        let start = parse_date("period.start", &self.period.start)?;
        let end = parse_date("period.end", &self.period.end)?;
        DateRange::new(start, end).map_err(|_| RechargeError::InvalidConfigValueError {
            field: "period".to_string(),
            value: format!("{}..{}", self.period.start, self.period.end),
            reason: "start must be before end".to_string(),
        })
    }

    /// Parsed regions, in configuration order.
    pub fn regions(&self) -> Result<Vec<(String, Roi)>> {
        self.regions
            .iter()
            .map(|r| {
                let roi = Roi::from_pairs(&r.roi).map_err(|e| match e {
                    RechargeError::InputGeometry { reason } => RechargeError::InputGeometry {
                        reason: format!("region '{}': {}", r.name, reason),
                    },
                    other => other,
                })?;
                Ok((r.name.clone(), roi))
            })
            .collect()
    }

    pub fn output_path(&self) -> &str {
        &self.load.output_path
    }

    pub fn concurrent_regions(&self) -> usize {
        self.run.concurrent_regions.unwrap_or(4)
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.run.timeout_seconds.unwrap_or(600)
    }

    pub fn source_timeout_seconds(&self) -> u64 {
        self.source.timeout_seconds.unwrap_or(60)
    }

    /// Root depth in millimetres of water per unit volumetric content.
    pub fn root_depth_factor(&self) -> f64 {
        self.soil.root_depth_m * crate::core::hydraulics::MM_PER_M
    }
}

impl Validate for RechargeConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
