//! In-memory raster source and storage shared by the pipeline tests.

use crate::domain::model::{
    soil_depth_bands, Dataset, DateRange, Grid, Raster, RasterEntry, RasterSeries, SoilProperty,
};
use crate::domain::ports::{RasterSource, Storage};
use crate::domain::roi::Roi;
use crate::utils::error::{RechargeError, Result};
use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub const MONTHLY_PR: [f64; 12] = [120.0, 90.0, 80.0, 60.0, 40.0, 20.0, 10.0, 15.0, 50.0, 90.0, 130.0, 140.0];
/// Raw PET, ten times the value in mm.
pub const MONTHLY_PET_RAW: [f64; 12] =
    [100.0, 150.0, 300.0, 500.0, 800.0, 1100.0, 1300.0, 1200.0, 800.0, 400.0, 200.0, 100.0];

/// 2 x 2 cells of 0.01° with the north-west corner at (10.0, 46.0).
pub fn grid() -> Grid {
    Grid {
        west: 10.0,
        north: 46.0,
        cell_width: 0.01,
        cell_height: 0.01,
        cols: 2,
        rows: 2,
    }
}

pub fn point_roi() -> Roi {
    Roi::parse("[[10.005, 45.995]]").unwrap()
}

pub fn polygon_roi() -> Roi {
    Roi::parse("[[10.001,45.981],[10.019,45.981],[10.019,45.999],[10.001,45.999]]").unwrap()
}

pub fn year_2020() -> DateRange {
    DateRange::new(
        chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        chrono::NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
    )
    .unwrap()
}

pub fn soil(value: f64) -> Raster {
    let mut raster = Raster::new(grid());
    for band in soil_depth_bands() {
        raster.insert_band(&band, vec![Some(value); 4]).unwrap();
    }
    raster
}

/// Two observations per month in 2020, each carrying half the monthly value.
pub fn monthly_series(band: &str, values: &[Option<f64>]) -> RasterSeries {
    let entries = values
        .iter()
        .enumerate()
        .flat_map(|(m, v)| {
            [5, 20].into_iter().map(move |day| RasterEntry {
                timestamp: Utc.with_ymd_and_hms(2020, m as u32 + 1, day, 6, 0, 0).unwrap(),
                raster: Raster::new(grid())
                    .with_band(band, vec![v.map(|v| v / 2.0); 4])
                    .unwrap(),
            })
        })
        .collect();
    RasterSeries::new(entries).unwrap()
}

#[derive(Clone, Default)]
pub struct MockSource {
    pub soil: HashMap<SoilProperty, Raster>,
    pub series: HashMap<Dataset, RasterSeries>,
    pub delay: Option<Duration>,
}

impl MockSource {
    /// Loam (40 % sand, 20 % clay, 2.5 % organic matter) under a wet-winter climate.
    pub fn loam() -> Self {
        let mut source = Self::default();
        source.soil.insert(SoilProperty::Sand, soil(40.0));
        source.soil.insert(SoilProperty::Clay, soil(20.0));
        source.soil.insert(SoilProperty::OrganicCarbon, soil(2.9));
        source.series.insert(
            Dataset::Precipitation,
            monthly_series("precipitation", &MONTHLY_PR.map(Some)),
        );
        source.series.insert(
            Dataset::PotentialEvapotranspiration,
            monthly_series("PET", &MONTHLY_PET_RAW.map(Some)),
        );

        let ssm = monthly_series("ssm", &[Some(40.0); 12]);
        let susm = monthly_series("susm", &[Some(120.0); 12]);
        let entries = ssm
            .entries
            .into_iter()
            .zip(susm.entries)
            .map(|(mut a, b)| {
                a.raster
                    .insert_band("susm", b.raster.band("susm").unwrap().to_vec())
                    .unwrap();
                a
            })
            .collect();
        source
            .series
            .insert(Dataset::SoilMoisture, RasterSeries::new(entries).unwrap());
        source
    }
}

impl RasterSource for MockSource {
    async fn soil_property(&self, property: SoilProperty, _roi: &Roi, _scale: f64) -> Result<Raster> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.soil
            .get(&property)
            .cloned()
            .ok_or_else(|| RechargeError::validation(format!("no {} raster", property.id())))
    }

    async fn series(&self, dataset: Dataset, _roi: &Roi, _scale: f64, range: &DateRange) -> Result<RasterSeries> {
        self.series
            .get(&dataset)
            .map(|s| s.filter_range(range))
            .ok_or_else(|| RechargeError::validation(format!("no {} series", dataset.id())))
    }
}

#[derive(Clone, Default)]
pub struct MockStorage {
    pub files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl Storage for MockStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let files = self.files.lock().await;
        files.get(path).cloned().ok_or_else(|| {
            RechargeError::IoError(std::io::Error::new(std::io::ErrorKind::NotFound, path.to_string()))
        })
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        self.files.lock().await.insert(path.to_string(), data.to_vec());
        Ok(())
    }
}
