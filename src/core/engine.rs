use crate::domain::ports::Pipeline;
use crate::utils::error::Result;
use std::time::Instant;

/// Drives one pipeline through extract, transform and load.
pub struct PipelineEngine<P: Pipeline> {
    pipeline: P,
    label: String,
}

impl<P: Pipeline> PipelineEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self {
            pipeline,
            label: "recharge".to_string(),
        }
    }

    pub fn with_label(pipeline: P, label: impl Into<String>) -> Self {
        Self {
            pipeline,
            label: label.into(),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub async fn run(&self) -> Result<String> {
        let started = Instant::now();
        tracing::info!("🚀 [{}] Starting pipeline", self.label);

        let phase = Instant::now();
        let extracted = self.pipeline.extract().await?;
        tracing::info!("📥 [{}] Extract finished in {:.2?}", self.label, phase.elapsed());

        let phase = Instant::now();
        let report = self.pipeline.transform(extracted).await?;
        tracing::info!("🔄 [{}] Transform finished in {:.2?}", self.label, phase.elapsed());

        let phase = Instant::now();
        let output_path = self.pipeline.load(report).await?;
        tracing::info!("💾 [{}] Load finished in {:.2?}", self.label, phase.elapsed());

        tracing::info!(
            "✅ [{}] Pipeline completed in {:.2?}, output: {}",
            self.label,
            started.elapsed(),
            output_path
        );
        Ok(output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::RechargeError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingPipeline {
        calls: AtomicUsize,
        fail_transform: bool,
    }

    #[async_trait]
    impl Pipeline for CountingPipeline {
        type Extracted = Vec<f64>;
        type Report = f64;

        async fn extract(&self) -> Result<Vec<f64>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![1.0, 2.0, 3.5])
        }

        async fn transform(&self, data: Vec<f64>) -> Result<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_transform {
                return Err(RechargeError::validation("boom"));
            }
            Ok(data.iter().sum())
        }

        async fn load(&self, report: f64) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("total={}", report))
        }
    }

    #[tokio::test]
    async fn test_engine_runs_all_phases() {
        let engine = PipelineEngine::new(CountingPipeline {
            calls: AtomicUsize::new(0),
            fail_transform: false,
        });
        assert_eq!(engine.run().await.unwrap(), "total=6.5");
        assert_eq!(engine.pipeline().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_engine_stops_on_error() {
        let engine = PipelineEngine::with_label(
            CountingPipeline {
                calls: AtomicUsize::new(0),
                fail_transform: true,
            },
            "failing",
        );
        assert!(engine.run().await.is_err());
        assert_eq!(engine.pipeline().calls.load(Ordering::SeqCst), 2);
    }
}
