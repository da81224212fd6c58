use crate::domain::model::{soil_depth_bands, Dataset, DateRange, Raster, RasterSeries, SoilProperty};
use crate::domain::ports::{RasterSource, Storage};
use crate::domain::roi::Roi;
use crate::utils::error::{RechargeError, Result};

/// [`RasterSource`] over pre-exported JSON rasters in a [`Storage`]:
/// `soil/{property}.json` and `series/{dataset}.json`.
///
/// The files are taken as already covering the region at the wanted scale;
/// series are only cut to the requested window.
#[derive(Debug, Clone)]
pub struct FileRasterSource<S: Storage> {
    storage: S,
}

impl<S: Storage> FileRasterSource<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    async fn read_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let bytes = self.storage.read_file(path).await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            RechargeError::validation(format!("{} is not a valid raster file: {}", path, e))
        })
    }
}

impl<S: Storage> RasterSource for FileRasterSource<S> {
    async fn soil_property(&self, property: SoilProperty, _roi: &Roi, _scale: f64) -> Result<Raster> {
        let path = format!("soil/{}.json", property.id());
        let raster: Raster = self.read_json(&path).await?;
        raster.check()?;
        for band in soil_depth_bands() {
            raster.band(&band)?;
        }
        Ok(raster)
    }

    async fn series(&self, dataset: Dataset, _roi: &Roi, _scale: f64, range: &DateRange) -> Result<RasterSeries> {
        let path = format!("series/{}.json", dataset.id());
        let series: RasterSeries = self.read_json(&path).await?;
        let series = RasterSeries::new(series.entries)?.filter_range(range);
        for entry in &series.entries {
            for band in dataset.bands() {
                entry.raster.band(band)?;
            }
        }
        tracing::debug!("Loaded {} {} observations from {}", series.len(), dataset.id(), path);
        Ok(series)
    }
}
