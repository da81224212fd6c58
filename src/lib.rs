pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{FileRasterSource, HttpRasterSource, LocalStorage};
pub use app::pipelines::{BatchRunner, RechargePipeline, RechargeReport, RegionOutcome, RegionRequest};
pub use config::RechargeConfig;
pub use core::engine::PipelineEngine;
pub use core::hydraulics::HydraulicParameters;
pub use core::water_balance::{WaterBalance, WaterBalanceState};
pub use domain::roi::Roi;
pub use utils::error::{RechargeError, Result};
