use crate::config::toml_config::{archive_file_name, RechargeConfig, RunMode};
use crate::core::aggregate::MonthlyResampler;
use crate::core::extract::{extract_at_roi, reduce_raster, sample_cells};
use crate::core::hydraulics::{
    compute_hydro_properties, convert_orgc_to_orgm, local_soil_profile, olm_prop_mean, profiles_to_table,
    HydraulicParameters,
};
use crate::core::table::{resample_annual, Aggregation, AnnualTable, MonthlyTable, Table};
use crate::core::water_balance::{PixelWaterBalance, WaterBalance, BALANCE_COLUMNS};
use crate::domain::model::{Dataset, DateRange, Raster, RasterEntry, RasterSeries, SoilProperty};
use crate::domain::ports::{Pipeline, RasterSource, Storage};
use crate::domain::roi::Roi;
use crate::utils::error::{RechargeError, Result};
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;
use zip::write::{FileOptions, ZipWriter};

/// Everything needed to compute recharge for one region.
#[derive(Debug, Clone)]
pub struct RegionRequest {
    pub name: String,
    pub roi: Roi,
    pub range: DateRange,
    /// Reduction scale in metres.
    pub scale: f64,
    pub root_depth_factor: f64,
    pub partition_coefficient: f64,
    pub mode: RunMode,
    pub soil_moisture: bool,
}

impl RegionRequest {
    pub fn from_config(config: &RechargeConfig, name: &str, roi: Roi) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            roi,
            range: config.date_range()?,
            scale: config.extraction.scale,
            root_depth_factor: config.root_depth_factor(),
            partition_coefficient: config.soil.partition_coefficient,
            mode: config.run.mode,
            soil_moisture: config.load.soil_moisture,
        })
    }

    /// All configured regions, in configuration order.
    pub fn all_from_config(config: &RechargeConfig) -> Result<Vec<Self>> {
        config
            .regions()?
            .into_iter()
            .map(|(name, roi)| Self::from_config(config, &name, roi))
            .collect()
    }

    /// Archive name derived from the region name.
    pub fn archive_name(&self) -> String {
        archive_file_name(&self.name)
    }
}

/// Raw rasters as delivered by the source.
#[derive(Debug, Clone)]
pub struct ExtractedData {
    pub sand: Raster,
    pub clay: Raster,
    pub orgc: Raster,
    pub precipitation: RasterSeries,
    pub pet: RasterSeries,
    pub soil_moisture: Option<RasterSeries>,
}

#[derive(Debug, Clone)]
pub struct RechargeReport {
    pub region: String,
    pub parameters: HydraulicParameters,
    /// `pr`, `pet`
    pub meteo: MonthlyTable,
    /// `pr`, `pet`, `apwl`, `st`, `rech`
    pub water_balance: MonthlyTable,
    /// Yearly sums of `pr`, `pet`, `rech`.
    pub annual: AnnualTable,
    pub mean_annual_recharge: Option<f64>,
    /// Keyed by depth in cm.
    pub soil_profile: Table<u32>,
    /// `ssm`, `susm`
    pub soil_moisture: Option<MonthlyTable>,
}

#[derive(Serialize)]
struct RunSummary<'a> {
    region: &'a str,
    roi: String,
    start: String,
    end: String,
    mode: RunMode,
    scale_m: f64,
    root_depth_factor: f64,
    partition_coefficient: f64,
    parameters: &'a HydraulicParameters,
    months: usize,
    mean_annual_recharge_mm: Option<f64>,
}

pub struct RechargePipeline<R: RasterSource, S: Storage> {
    source: Arc<R>,
    storage: Arc<S>,
    request: RegionRequest,
}

impl<R: RasterSource, S: Storage> RechargePipeline<R, S> {
    pub fn new(source: Arc<R>, storage: Arc<S>, request: RegionRequest) -> Self {
        Self {
            source,
            storage,
            request,
        }
    }

    pub fn request(&self) -> &RegionRequest {
        &self.request
    }
}

fn monthly(req: &RegionRequest, series: &RasterSeries, dataset: Dataset, column: &str) -> Result<RasterSeries> {
    let band = dataset.bands()[0];
    let factor = dataset.scale_factor();
    let scaled = if factor == 1.0 {
        series.clone()
    } else {
        series.map_values(move |v| v * factor)
    };
    if scaled.is_empty() {
        return Err(RechargeError::DataGap {
            period: format!("{}..{}", req.range.start, req.range.end),
            variable: column.to_string(),
        });
    }
    MonthlyResampler::new(&[band])
        .resample(&scaled, Some(&req.range))?
        .rename_bands(&[band], &[column])
}

fn region_mean(req: &RegionRequest, raster: &Raster, band: &str) -> Result<f64> {
    reduce_raster(raster, &req.roi, req.scale, &[band])?[0]
        .ok_or_else(|| RechargeError::degenerate(band, f64::NAN, "no valid soil data inside the region"))
}

/// Per-cell balance on the precipitation grid. PET and soil values are read
/// at each precipitation cell centre, so the layers may differ in resolution.
fn pixel_balance(
    req: &RegionRequest,
    pr: &RasterSeries,
    pet: &RasterSeries,
    fc_mean: &Raster,
    wp_mean: &Raster,
) -> Result<MonthlyTable> {
    if pr.len() != pet.len() {
        return Err(RechargeError::validation(format!(
            "precipitation has {} months, PET has {}",
            pr.len(),
            pet.len()
        )));
    }
    let entries = pr
        .entries
        .iter()
        .zip(&pet.entries)
        .map(|(p, e)| {
            if p.timestamp != e.timestamp {
                return Err(RechargeError::validation(format!(
                    "precipitation month {} pairs with PET month {}",
                    p.timestamp, e.timestamp
                )));
            }
            let pet_values = e.raster.band_on_grid("pet", &p.raster.grid)?;
            Ok(RasterEntry {
                timestamp: p.timestamp,
                raster: p.raster.clone().with_band("pet", pet_values)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let combined = RasterSeries::new(entries)?;

    let cells = match combined.grid() {
        Some(grid) => sample_cells(&grid, &req.roi, req.scale)?,
        None => Vec::new(),
    };
    let balance = PixelWaterBalance::new(req.root_depth_factor, req.partition_coefficient)
        .run(&combined, fc_mean, wp_mean, &cells)?;

    let meteo = extract_at_roi(&combined, &req.roi, req.scale, &["pr", "pet"])?;
    let balance = extract_at_roi(&balance, &req.roi, req.scale, &BALANCE_COLUMNS)?;
    meteo.merge(&balance)
}

/// Soil parameters, monthly forcing, the water balance and its summaries for one region.
fn compute_report(req: &RegionRequest, data: ExtractedData) -> Result<RechargeReport> {
    let sand = data.sand.map_values(|v| v * SoilProperty::Sand.scale_factor());
    let clay = data.clay.map_values(|v| v * SoilProperty::Clay.scale_factor());
    let orgc = data.orgc.map_values(|v| v * SoilProperty::OrganicCarbon.scale_factor());
    let orgm = convert_orgc_to_orgm(&orgc);

    let (fc, wp) = compute_hydro_properties(&sand, &clay, &orgm)?;
    let fc_mean = olm_prop_mean(&fc, "fc_mean")?;
    let wp_mean = olm_prop_mean(&wp, "wp_mean")?;

    let parameters = HydraulicParameters::resolve(
        region_mean(req, &fc_mean, "fc_mean")?,
        region_mean(req, &wp_mean, "wp_mean")?,
        req.root_depth_factor,
        req.partition_coefficient,
    )?;
    tracing::info!(
        "🧮 Region '{}': TAW {:.2} mm, STFC {:.2} mm",
        req.name,
        parameters.taw,
        parameters.stfc
    );

    let pr = monthly(req, &data.precipitation, Dataset::Precipitation, "pr")?;
    let pet = monthly(req, &data.pet, Dataset::PotentialEvapotranspiration, "pet")?;

    let water_balance = match req.mode {
        RunMode::Roi => {
            let meteo = extract_at_roi(&pr, &req.roi, req.scale, &["pr"])?
                .merge(&extract_at_roi(&pet, &req.roi, req.scale, &["pet"])?)?;
            WaterBalance::new(&parameters)?.run_table(&meteo, "pr", "pet")?
        }
        RunMode::Pixel => pixel_balance(req, &pr, &pet, &fc_mean, &wp_mean)?,
    };

    let expected = req.range.months().len();
    if water_balance.len() != expected {
        return Err(RechargeError::validation(format!(
            "expected {} monthly rows for region '{}', got {}",
            expected,
            req.name,
            water_balance.len()
        )));
    }

    let meteo = water_balance.select(&["pr", "pet"])?;
    let annual = resample_annual(&water_balance.select(&["pr", "pet", "rech"])?, Aggregation::Sum)?;
    let mean_annual_recharge = annual.mean_of_column("rech")?;

    let mut profiles = Vec::new();
    for (name, raster) in [("sand", &sand), ("clay", &clay), ("orgm", &orgm), ("fc", &fc), ("wp", &wp)] {
        profiles.push(local_soil_profile(raster, &req.roi, req.scale, name)?);
    }
    let soil_profile = profiles_to_table(&profiles)?;

    let soil_moisture = match &data.soil_moisture {
        Some(series) if !series.is_empty() => {
            Some(extract_at_roi(series, &req.roi, req.scale, Dataset::SoilMoisture.bands())?)
        }
        _ => None,
    };

    tracing::info!(
        "📊 Region '{}': {} months, mean annual recharge {}",
        req.name,
        water_balance.len(),
        mean_annual_recharge
            .map(|v| format!("{:.1} mm", v))
            .unwrap_or_else(|| "n/a".to_string())
    );

    Ok(RechargeReport {
        region: req.name.clone(),
        parameters,
        meteo,
        water_balance,
        annual,
        mean_annual_recharge,
        soil_profile,
        soil_moisture,
    })
}

fn zip_csv<K: crate::core::table::TableKey, W: Write + std::io::Seek>(
    zip: &mut ZipWriter<W>,
    name: &str,
    table: &Table<K>,
    key_header: &str,
) -> Result<()> {
    zip.start_file::<_, ()>(name, FileOptions::default())?;
    table.write_csv(&mut *zip, key_header)?;
    Ok(())
}

#[async_trait::async_trait]
impl<R: RasterSource, S: Storage> Pipeline for RechargePipeline<R, S> {
    type Extracted = ExtractedData;
    type Report = RechargeReport;

    async fn extract(&self) -> Result<ExtractedData> {
        let req = &self.request;
        tracing::info!(
            "🌍 Fetching rasters for region '{}' ({} to {}, scale {} m)",
            req.name,
            req.range.start,
            req.range.end,
            req.scale
        );

        let source = self.source.as_ref();
        let (sand, clay, orgc, precipitation, pet) = tokio::try_join!(
            source.soil_property(SoilProperty::Sand, &req.roi, req.scale),
            source.soil_property(SoilProperty::Clay, &req.roi, req.scale),
            source.soil_property(SoilProperty::OrganicCarbon, &req.roi, req.scale),
            source.series(Dataset::Precipitation, &req.roi, req.scale, &req.range),
            source.series(Dataset::PotentialEvapotranspiration, &req.roi, req.scale, &req.range),
        )?;

        let soil_moisture = if req.soil_moisture {
            match source.series(Dataset::SoilMoisture, &req.roi, req.scale, &req.range).await {
                Ok(series) => Some(series),
                Err(e) => {
                    tracing::warn!("⚠️ Soil moisture unavailable for '{}': {}", req.name, e);
                    None
                }
            }
        } else {
            None
        };

        tracing::debug!(
            "Extracted {} precipitation and {} PET observations",
            precipitation.len(),
            pet.len()
        );
        Ok(ExtractedData {
            sand,
            clay,
            orgc,
            precipitation,
            pet,
            soil_moisture,
        })
    }

    async fn transform(&self, data: ExtractedData) -> Result<RechargeReport> {
        let request = self.request.clone();
        tokio::task::spawn_blocking(move || compute_report(&request, data))
            .await
            .map_err(|e| RechargeError::validation(format!("transform of region '{}' failed: {}", self.request.name, e)))?
    }

    async fn load(&self, report: RechargeReport) -> Result<String> {
        let req = &self.request;
        let archive = req.archive_name();

        let zip_data = {
            let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));

            zip_csv(&mut zip, "meteo_data.csv", &report.meteo, "period")?;
            zip_csv(&mut zip, "water_recharge_data.csv", &report.water_balance, "period")?;
            zip_csv(&mut zip, "annual_recharge.csv", &report.annual, "year")?;
            zip_csv(&mut zip, "soil_profile.csv", &report.soil_profile, "depth_cm")?;
            if let Some(soil_moisture) = &report.soil_moisture {
                zip_csv(&mut zip, "soilmoisture_data.csv", soil_moisture, "period")?;
            }

            let summary = RunSummary {
                region: &report.region,
                roi: req.roi.to_json(),
                start: req.range.start.to_string(),
                end: req.range.end.to_string(),
                mode: req.mode,
                scale_m: req.scale,
                root_depth_factor: req.root_depth_factor,
                partition_coefficient: req.partition_coefficient,
                parameters: &report.parameters,
                months: report.water_balance.len(),
                mean_annual_recharge_mm: report.mean_annual_recharge,
            };
            zip.start_file::<_, ()>("parameters.json", FileOptions::default())?;
            zip.write_all(serde_json::to_string_pretty(&summary)?.as_bytes())?;

            let cursor = zip.finish()?;
            cursor.into_inner()
        };

        tracing::debug!("Writing {} ({} bytes) to storage", archive, zip_data.len());
        self.storage.write_file(&archive, &zip_data).await?;

        tracing::info!("📦 Region '{}' output saved: {}", report.region, archive);
        Ok(archive)
    }
}
