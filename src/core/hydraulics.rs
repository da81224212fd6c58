//! Soil hydraulic parameters from texture and organic matter.
//!
//! Field capacity (θ at 33 kPa) and wilting point (θ at 1500 kPa) follow the
//! Saxton & Rawls (2006) pedotransfer regressions. Sand and clay are mass
//! fractions, organic matter enters the regressions in percent.

use crate::core::extract::reduce_raster;
use crate::core::table::Table;
use crate::domain::model::{soil_depth_bands, Raster, SOIL_DEPTHS_CM};
use crate::domain::roi::Roi;
use crate::utils::error::{RechargeError, Result};
use serde::Serialize;

/// Van Bemmelen factor, organic carbon to organic matter.
pub const ORGANIC_MATTER_FACTOR: f64 = 1.724;

/// Millimetres of water per metre of root depth per unit volumetric content.
pub const MM_PER_M: f64 = 1000.0;

pub fn convert_orgc_to_orgm(orgc: &Raster) -> Raster {
    orgc.map_values(|v| v * ORGANIC_MATTER_FACTOR)
}

/// θ1500: volumetric water content at the permanent wilting point.
pub fn wilting_point(sand: f64, clay: f64, om_pct: f64) -> f64 {
    let t = -0.024 * sand + 0.487 * clay + 0.006 * om_pct + 0.005 * (sand * om_pct)
        - 0.013 * (clay * om_pct)
        + 0.068 * (sand * clay)
        + 0.031;
    t + (0.14 * t - 0.02)
}

/// θ33: volumetric water content at field capacity.
pub fn field_capacity(sand: f64, clay: f64, om_pct: f64) -> f64 {
    let t = -0.251 * sand + 0.195 * clay + 0.011 * om_pct + 0.006 * (sand * om_pct)
        - 0.027 * (clay * om_pct)
        + 0.452 * (sand * clay)
        + 0.299;
    t + (1.283 * t * t - 0.374 * t - 0.015)
}

/// Field capacity and wilting point rasters with the depth bands of the inputs.
///
/// A cell is `None` wherever any of the three inputs is missing.
pub fn compute_hydro_properties(
    sand: &Raster,
    clay: &Raster,
    orgm: &Raster,
) -> Result<(Raster, Raster)> {
    if sand.grid != clay.grid || sand.grid != orgm.grid {
        return Err(RechargeError::validation(
            "sand, clay and organic matter rasters must share one grid",
        ));
    }

    let mut fc = Raster::new(sand.grid);
    let mut wp = Raster::new(sand.grid);

    for band in soil_depth_bands() {
        let (s, c, om) = (sand.band(&band)?, clay.band(&band)?, orgm.band(&band)?);
        let mut fc_band = Vec::with_capacity(s.len());
        let mut wp_band = Vec::with_capacity(s.len());
        for i in 0..s.len() {
            match (s[i], c[i], om[i]) {
                (Some(s), Some(c), Some(om)) => {
                    let om_pct = om * 100.0;
                    fc_band.push(Some(field_capacity(s, c, om_pct)));
                    wp_band.push(Some(wilting_point(s, c, om_pct)));
                }
                _ => {
                    fc_band.push(None);
                    wp_band.push(None);
                }
            }
        }
        fc.insert_band(&band, fc_band)?;
        wp.insert_band(&band, wp_band)?;
    }

    Ok((fc, wp))
}

/// Unweighted mean over the six depth bands, as a single band named `output`.
pub fn olm_prop_mean(raster: &Raster, output: &str) -> Result<Raster> {
    let bands = soil_depth_bands()
        .iter()
        .map(|b| raster.band(b))
        .collect::<Result<Vec<_>>>()?;

    let n = bands.len() as f64;
    let values = (0..raster.grid.len())
        .map(|i| {
            bands
                .iter()
                .map(|band| band[i])
                .sum::<Option<f64>>()
                .map(|total| total / n)
        })
        .collect();

    Raster::new(raster.grid).with_band(output, values)
}

/// Total available water: `(fc_mean - wp_mean) * root_depth_factor`.
///
/// A negative result means the soil data is malformed and is reported, not clamped.
pub fn calculate_available_water(fc_mean: f64, wp_mean: f64, root_depth_factor: f64) -> Result<f64> {
    let taw = (fc_mean - wp_mean) * root_depth_factor;
    if !taw.is_finite() {
        return Err(RechargeError::degenerate("taw", taw, "is not a finite number"));
    }
    if taw < 0.0 {
        return Err(RechargeError::degenerate(
            "taw",
            taw,
            format!(
                "wilting point mean {:.4} exceeds field capacity mean {:.4}",
                wp_mean, fc_mean
            ),
        ));
    }
    Ok(taw)
}

pub fn calculate_stored_water_at_fc(taw: f64, partition_coefficient: f64) -> f64 {
    taw * partition_coefficient
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HydraulicParameters {
    /// `None` when TAW and STFC were supplied directly.
    pub field_capacity_mean: Option<f64>,
    pub wilting_point_mean: Option<f64>,
    pub taw: f64,
    pub stfc: f64,
}

impl HydraulicParameters {
    pub fn resolve(
        field_capacity_mean: f64,
        wilting_point_mean: f64,
        root_depth_factor: f64,
        partition_coefficient: f64,
    ) -> Result<Self> {
        let taw = calculate_available_water(field_capacity_mean, wilting_point_mean, root_depth_factor)?;
        let params = Self {
            field_capacity_mean: Some(field_capacity_mean),
            wilting_point_mean: Some(wilting_point_mean),
            taw,
            stfc: calculate_stored_water_at_fc(taw, partition_coefficient),
        };
        params.validate()?;
        Ok(params)
    }

    /// Parameters given directly, e.g. from the command line.
    pub fn from_storage(taw: f64, stfc: f64) -> Result<Self> {
        let params = Self {
            field_capacity_mean: None,
            wilting_point_mean: None,
            taw,
            stfc,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.taw.is_finite() || self.taw < 0.0 {
            return Err(RechargeError::degenerate("taw", self.taw, "must be finite and >= 0"));
        }
        if !self.stfc.is_finite() || self.stfc <= 0.0 {
            return Err(RechargeError::degenerate("stfc", self.stfc, "must be finite and > 0"));
        }
        Ok(())
    }
}

/// One soil property sampled at every depth for a region.
#[derive(Debug, Clone, PartialEq)]
pub struct SoilProfile {
    pub property: String,
    /// Indexed like [`SOIL_DEPTHS_CM`].
    pub values: Vec<Option<f64>>,
}

pub fn local_soil_profile(raster: &Raster, roi: &Roi, scale: f64, property: &str) -> Result<SoilProfile> {
    let bands = soil_depth_bands();
    let band_refs: Vec<&str> = bands.iter().map(String::as_str).collect();
    let reduced = reduce_raster(raster, roi, scale, &band_refs)?;
    Ok(SoilProfile {
        property: property.to_string(),
        values: reduced,
    })
}

/// Depth-indexed table with one column per profile.
pub fn profiles_to_table(profiles: &[SoilProfile]) -> Result<Table<u32>> {
    let columns: Vec<String> = profiles.iter().map(|p| p.property.clone()).collect();
    let mut table = Table::new(columns)?;
    for (i, depth) in SOIL_DEPTHS_CM.iter().enumerate() {
        let row = profiles.iter().map(|p| p.values.get(i).copied().flatten()).collect();
        table.push_row(*depth, row)?;
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Grid;
    use approx::assert_abs_diff_eq;

    fn grid() -> Grid {
        Grid {
            west: 0.0,
            north: 2.0,
            cell_width: 1.0,
            cell_height: 1.0,
            cols: 2,
            rows: 2,
        }
    }

    fn uniform(value: f64) -> Raster {
        let mut raster = Raster::new(grid());
        for band in soil_depth_bands() {
            raster.insert_band(&band, vec![Some(value); 4]).unwrap();
        }
        raster
    }

    #[test]
    fn test_loam_pedotransfer_values() {
        assert_abs_diff_eq!(field_capacity(0.4, 0.2, 2.5), 0.2796, epsilon = 1e-4);
        assert_abs_diff_eq!(wilting_point(0.4, 0.2, 2.5), 0.1370, epsilon = 1e-4);
    }

    #[test]
    fn test_orgc_conversion() {
        let orgm = convert_orgc_to_orgm(&uniform(0.01));
        assert_abs_diff_eq!(orgm.band("b30").unwrap()[2].unwrap(), 0.01724, epsilon = 1e-12);
    }

    #[test]
    fn test_hydro_properties_keep_band_structure() {
        let mut sand = uniform(0.4);
        sand.insert_band("b60", vec![Some(0.4), None, Some(0.4), Some(0.4)])
            .unwrap();
        let (fc, wp) = compute_hydro_properties(&sand, &uniform(0.2), &uniform(0.025)).unwrap();

        assert_eq!(fc.bands.len(), 6);
        assert_eq!(wp.bands.len(), 6);
        assert_abs_diff_eq!(fc.band("b0").unwrap()[0].unwrap(), 0.2796, epsilon = 1e-4);
        assert_eq!(fc.band("b60").unwrap()[1], None);
        assert!(fc.band("b0").unwrap()[0] > wp.band("b0").unwrap()[0]);
    }

    #[test]
    fn test_depth_mean_is_unweighted() {
        let mut raster = Raster::new(grid());
        for (i, band) in soil_depth_bands().iter().enumerate() {
            raster.insert_band(band, vec![Some(i as f64); 4]).unwrap();
        }
        raster.insert_band("b200", vec![Some(5.0), Some(5.0), Some(5.0), None]).unwrap();
        let mean = olm_prop_mean(&raster, "fc_mean").unwrap();
        let values = mean.band("fc_mean").unwrap();
        assert_abs_diff_eq!(values[0].unwrap(), 2.5, epsilon = 1e-12);
        assert_eq!(values[3], None);
    }

    #[test]
    fn test_available_water() {
        assert_abs_diff_eq!(calculate_available_water(0.3, 0.1, 500.0).unwrap(), 100.0, epsilon = 1e-9);
        assert_abs_diff_eq!(calculate_stored_water_at_fc(100.0, 0.5), 50.0);
    }

    #[test]
    fn test_negative_available_water_is_flagged() {
        let err = calculate_available_water(0.1, 0.2, 500.0).unwrap_err();
        assert!(matches!(err, RechargeError::DegenerateParameter { ref parameter, .. } if parameter == "taw"));
    }

    #[test]
    fn test_zero_storage_is_degenerate() {
        assert!(HydraulicParameters::resolve(0.2, 0.2, 500.0, 0.5).is_err());
        assert!(HydraulicParameters::resolve(0.3, 0.1, 500.0, 0.0).is_err());
        let params = HydraulicParameters::resolve(0.3, 0.1, 500.0, 0.5).unwrap();
        assert_abs_diff_eq!(params.stfc, 50.0, epsilon = 1e-9);
    }

    #[test]
    fn test_local_profile_table() {
        let roi = Roi::parse("[[0.5, 1.5]]").unwrap();
        let sand = local_soil_profile(&uniform(0.4), &roi, 1000.0, "sand").unwrap();
        let clay = local_soil_profile(&uniform(0.2), &roi, 1000.0, "clay").unwrap();
        let table = profiles_to_table(&[sand, clay]).unwrap();

        assert_eq!(table.len(), 6);
        assert_eq!(table.columns(), &["sand".to_string(), "clay".to_string()]);
        assert_eq!(table.value(&100, "clay").unwrap(), Some(0.2));
    }
}
