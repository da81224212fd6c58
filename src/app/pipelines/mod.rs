pub mod batch_pipeline;
pub mod recharge_pipeline;

#[cfg(test)]
pub(crate) mod fixtures;

pub use batch_pipeline::{BatchRunner, RegionOutcome};
pub use recharge_pipeline::{RechargePipeline, RechargeReport, RegionRequest};
