use crate::app::pipelines::recharge_pipeline::{RechargePipeline, RegionRequest};
use crate::core::engine::PipelineEngine;
use crate::domain::ports::{RasterSource, Storage};
use crate::utils::error::{RechargeError, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Result of one region; a failed region never affects the others.
#[derive(Debug)]
pub struct RegionOutcome {
    pub region: String,
    pub elapsed: Duration,
    /// Storage path of the region archive.
    pub result: Result<String>,
}

/// Runs the recharge pipeline for many regions concurrently.
pub struct BatchRunner<R: RasterSource + 'static, S: Storage + 'static> {
    source: Arc<R>,
    storage: Arc<S>,
    concurrent_regions: usize,
    timeout: Duration,
}

impl<R: RasterSource + 'static, S: Storage + 'static> BatchRunner<R, S> {
    pub fn new(source: Arc<R>, storage: Arc<S>, concurrent_regions: usize, timeout_seconds: u64) -> Self {
        Self {
            source,
            storage,
            concurrent_regions: concurrent_regions.max(1),
            timeout: Duration::from_secs(timeout_seconds),
        }
    }

    /// One outcome per request, in request order.
    pub async fn run(&self, requests: Vec<RegionRequest>) -> Vec<RegionOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.concurrent_regions));
        let names: Vec<String> = requests.iter().map(|r| r.name.clone()).collect();
        let mut set = JoinSet::new();

        tracing::info!(
            "🚀 Processing {} region(s), up to {} at a time",
            requests.len(),
            self.concurrent_regions
        );

        for (idx, request) in requests.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let source = self.source.clone();
            let storage = self.storage.clone();
            let timeout = self.timeout;

            set.spawn(async move {
                let started = Instant::now();
                let region = request.name.clone();

                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        let engine =
                            PipelineEngine::with_label(RechargePipeline::new(source, storage, request), region.clone());
                        match tokio::time::timeout(timeout, engine.run()).await {
                            Ok(result) => result,
                            Err(_) => Err(RechargeError::Timeout {
                                region: region.clone(),
                                seconds: timeout.as_secs(),
                            }),
                        }
                    }
                    Err(e) => Err(RechargeError::validation(format!("region scheduler closed: {}", e))),
                };

                (
                    idx,
                    RegionOutcome {
                        region,
                        elapsed: started.elapsed(),
                        result,
                    },
                )
            });
        }

        let mut outcomes: Vec<Option<RegionOutcome>> = names.iter().map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, outcome)) => {
                    match &outcome.result {
                        Ok(path) => tracing::info!("✅ Region '{}' done in {:.2?}: {}", outcome.region, outcome.elapsed, path),
                        Err(e) => tracing::error!(
                            "❌ Region '{}' failed: {} (Category: {:?}, Severity: {:?})",
                            outcome.region,
                            e,
                            e.category(),
                            e.severity()
                        ),
                    }
                    outcomes[idx] = Some(outcome);
                }
                Err(e) => tracing::error!("❌ Region task aborted: {}", e),
            }
        }

        outcomes
            .into_iter()
            .zip(names)
            .map(|(outcome, region)| {
                outcome.unwrap_or_else(|| RegionOutcome {
                    result: Err(RechargeError::validation(format!("region '{}' did not complete", region))),
                    region,
                    elapsed: Duration::ZERO,
                })
            })
            .collect()
    }
}
