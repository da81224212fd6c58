//! Spatial reduction of rasters to a region of interest.
//!
//! The region is sampled on a regular lattice whose spacing is the reduction
//! `scale` in metres; every sample reads the raster cell containing it and the
//! region value is the mean of the valid samples. A point is a single sample.
//! A polygon too small to hold any lattice sample is read at its centroid.

use crate::core::table::{Aggregation, MonthlyTable, Table};
use crate::domain::model::{Grid, Raster, RasterSeries, YearMonth};
use crate::domain::roi::Roi;
use crate::utils::error::{RechargeError, Result};
use std::collections::BTreeMap;

/// Mean length of one degree of latitude.
pub const METERS_PER_DEGREE: f64 = 111_320.0;

const MAX_SAMPLES: usize = 4_000_000;

/// Sample coordinates `(lon, lat)` covering the region.
pub fn sample_points(roi: &Roi, scale: f64) -> Result<Vec<(f64, f64)>> {
    if !(scale.is_finite() && scale > 0.0) {
        return Err(RechargeError::validation(format!(
            "reduction scale must be a positive number of metres, got {}",
            scale
        )));
    }

    let polygon = match roi {
        Roi::Point(c) => return Ok(vec![(c.lon, c.lat)]),
        Roi::Polygon(_) => roi,
    };

    let bbox = polygon.bounding_box();
    let mid_lat = ((bbox.south + bbox.north) / 2.0).to_radians();
    let d_lat = scale / METERS_PER_DEGREE;
    let d_lon = scale / (METERS_PER_DEGREE * mid_lat.cos().max(1e-6));

    let n_lat = ((bbox.north - bbox.south) / d_lat).ceil() as usize;
    let n_lon = ((bbox.east - bbox.west) / d_lon).ceil() as usize;
    if n_lat.saturating_mul(n_lon) > MAX_SAMPLES {
        return Err(RechargeError::geometry(format!(
            "region needs {} x {} samples at {} m; use a coarser scale",
            n_lon, n_lat, scale
        )));
    }

    let mut points = Vec::new();
    for i in 0..n_lat {
        let lat = bbox.south + (i as f64 + 0.5) * d_lat;
        for j in 0..n_lon {
            let lon = bbox.west + (j as f64 + 0.5) * d_lon;
            if polygon.contains(lon, lat) {
                points.push((lon, lat));
            }
        }
    }

    if points.is_empty() {
        let c = polygon.centroid();
        points.push((c.lon, c.lat));
    }
    Ok(points)
}

/// Cell index for every sample that lands on the grid. Repeats are kept so
/// each sample weighs equally in the mean.
pub fn sample_cells(grid: &Grid, roi: &Roi, scale: f64) -> Result<Vec<usize>> {
    let cells: Vec<usize> = sample_points(roi, scale)?
        .into_iter()
        .filter_map(|(lon, lat)| grid.cell_at(lon, lat))
        .collect();
    if cells.is_empty() {
        tracing::warn!("Region {} does not overlap the raster grid", roi.to_json());
    }
    Ok(cells)
}

fn mean_at(values: &[Option<f64>], cells: &[usize]) -> Option<f64> {
    Aggregation::Mean.apply(cells.iter().map(|&c| values[c].filter(|v| v.is_finite())))
}

/// Region mean of each band, in band order. `None` where no sample is valid.
pub fn reduce_raster(raster: &Raster, roi: &Roi, scale: f64, bands: &[&str]) -> Result<Vec<Option<f64>>> {
    let cells = sample_cells(&raster.grid, roi, scale)?;
    bands
        .iter()
        .map(|band| Ok(mean_at(raster.band(band)?, &cells)))
        .collect()
}

/// Region means per month for the requested bands, one column per band.
///
/// Observations from the same calendar month collapse into one row holding
/// the mean of their region means.
pub fn extract_at_roi(series: &RasterSeries, roi: &Roi, scale: f64, bands: &[&str]) -> Result<MonthlyTable> {
    series.check()?;
    let mut table = Table::new(bands.iter().map(|b| b.to_string()).collect())?;
    let grid = match series.grid() {
        Some(grid) => grid,
        None => return Ok(table),
    };
    let cells = sample_cells(&grid, roi, scale)?;

    let mut months: BTreeMap<YearMonth, Vec<Vec<Option<f64>>>> = BTreeMap::new();
    for entry in &series.entries {
        let reduced = bands
            .iter()
            .map(|band| Ok(mean_at(entry.raster.band(band)?, &cells)))
            .collect::<Result<Vec<_>>>()?;
        months
            .entry(YearMonth::of(&entry.timestamp))
            .or_default()
            .push(reduced);
    }

    for (month, observations) in months {
        let values = (0..bands.len())
            .map(|b| Aggregation::Mean.apply(observations.iter().map(|o| o[b])))
            .collect();
        table.push_row(month, values)?;
    }

    tracing::debug!(
        "Extracted {} months from {} observations over {} samples",
        table.len(),
        series.len(),
        cells.len()
    );
    Ok(table)
}
