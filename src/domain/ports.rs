use crate::domain::model::{Dataset, DateRange, Raster, RasterSeries, SoilProperty};
use crate::domain::roi::Roi;
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// The raster-processing collaborator. Must be deterministic for a fixed
/// ROI, scale and window, and must preserve band names.
pub trait RasterSource: Send + Sync {
    /// Multi-depth soil property raster (bands `b0` … `b200`) covering the ROI.
    fn soil_property(
        &self,
        property: SoilProperty,
        roi: &Roi,
        scale: f64,
    ) -> impl std::future::Future<Output = Result<Raster>> + Send;

    /// Native-cadence time series covering the ROI within `range`.
    fn series(
        &self,
        dataset: Dataset,
        roi: &Roi,
        scale: f64,
        range: &DateRange,
    ) -> impl std::future::Future<Output = Result<RasterSeries>> + Send;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    type Extracted: Send;
    type Report: Send;

    async fn extract(&self) -> Result<Self::Extracted>;
    async fn transform(&self, data: Self::Extracted) -> Result<Self::Report>;
    async fn load(&self, report: Self::Report) -> Result<String>;
}
