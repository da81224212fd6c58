use thiserror::Error;

#[derive(Error, Debug)]
pub enum RechargeError {
    #[error("Invalid region of interest: {reason}")]
    InputGeometry { reason: String },

    #[error("Missing {variable} for {period}: the water balance cannot continue past this month")]
    DataGap { period: String, variable: String },

    #[error("Degenerate hydraulic parameter {parameter} = {value}: {reason}")]
    DegenerateParameter {
        parameter: String,
        value: f64,
        reason: String,
    },

    #[error("Numeric domain error at {period}: {reason}")]
    NumericDomain { period: String, reason: String },

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("Raster service request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Region {region} timed out after {seconds}s")]
    Timeout { region: String, seconds: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Data,
    Numeric,
    Network,
    Io,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl RechargeError {
    pub fn geometry(reason: impl Into<String>) -> Self {
        Self::InputGeometry {
            reason: reason.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    pub fn degenerate(parameter: &str, value: f64, reason: impl Into<String>) -> Self {
        Self::DegenerateParameter {
            parameter: parameter.to_string(),
            value,
            reason: reason.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InputGeometry { .. } => ErrorCategory::Input,
            Self::DataGap { .. } | Self::DegenerateParameter { .. } | Self::ValidationError { .. } => {
                ErrorCategory::Data
            }
            Self::NumericDomain { .. } => ErrorCategory::Numeric,
            Self::ApiError(_) | Self::Timeout { .. } => ErrorCategory::Network,
            Self::ZipError(_) | Self::CsvError(_) | Self::IoError(_) | Self::SerializationError(_) => {
                ErrorCategory::Io
            }
            Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Input | ErrorCategory::Data | ErrorCategory::Configuration => {
                ErrorSeverity::High
            }
            ErrorCategory::Numeric | ErrorCategory::Io => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            Self::InputGeometry { .. } => {
                "Provide [[lon, lat]] for a point or at least three distinct [lon, lat] vertices for a polygon".to_string()
            }
            Self::DataGap { period, .. } => format!(
                "Check the raster service coverage for {} or shorten the date range to end before it",
                period
            ),
            Self::DegenerateParameter { parameter, .. } => format!(
                "Inspect the soil rasters for the region; {} must be physically valid (field capacity above wilting point)",
                parameter
            ),
            Self::NumericDomain { .. } => {
                "Check the hydraulic parameters and forcing values for extreme or zero storage".to_string()
            }
            Self::ApiError(_) => "Verify the raster service endpoint is reachable and retry".to_string(),
            Self::Timeout { .. } => "Increase run.timeout_seconds or reduce the region size".to_string(),
            Self::ZipError(_) | Self::IoError(_) => {
                "Check that the output path exists and is writable".to_string()
            }
            Self::CsvError(_) | Self::SerializationError(_) => {
                "Check the input file format against the documented layout".to_string()
            }
            Self::ConfigValidationError { field, .. }
            | Self::InvalidConfigValueError { field, .. }
            | Self::MissingConfigError { field } => {
                format!("Fix '{}' in the configuration file", field)
            }
            Self::ValidationError { .. } => "Check the input data for consistency".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Input => format!("The region of interest is not usable: {}", self),
            ErrorCategory::Data => format!("The input data cannot be processed: {}", self),
            ErrorCategory::Numeric => format!("The water balance hit an invalid value: {}", self),
            ErrorCategory::Network => format!("The raster service could not be reached: {}", self),
            ErrorCategory::Io => format!("Reading or writing files failed: {}", self),
            ErrorCategory::Configuration => format!("The configuration is invalid: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, RechargeError>;
