#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use groundwater_recharge::domain::model::{soil_depth_bands, Grid, Raster, RasterEntry, RasterSeries};

pub const PR: [f64; 12] = [120.0, 90.0, 80.0, 60.0, 40.0, 20.0, 10.0, 15.0, 50.0, 90.0, 130.0, 140.0];
/// Raw service values, ten times the PET in mm.
pub const PET_RAW: [f64; 12] = [100.0, 150.0, 300.0, 500.0, 800.0, 1100.0, 1300.0, 1200.0, 800.0, 400.0, 200.0, 100.0];

pub fn grid() -> Grid {
    Grid {
        west: 10.0,
        north: 46.0,
        cell_width: 0.01,
        cell_height: 0.01,
        cols: 3,
        rows: 3,
    }
}

pub fn soil(value: f64) -> Raster {
    let mut raster = Raster::new(grid());
    for band in soil_depth_bands() {
        raster.insert_band(&band, vec![Some(value); 9]).unwrap();
    }
    raster
}

/// Weekly observations through 2021 spreading each monthly total evenly.
pub fn weekly_series(band: &str, monthly: &[f64; 12]) -> RasterSeries {
    let mut entries = Vec::new();
    for (m, total) in monthly.iter().enumerate() {
        let days = [1, 8, 15, 22];
        for day in days {
            entries.push(RasterEntry {
                timestamp: Utc.with_ymd_and_hms(2021, m as u32 + 1, day, 0, 0, 0).unwrap(),
                raster: Raster::new(grid())
                    .with_band(band, vec![Some(total / days.len() as f64); 9])
                    .unwrap(),
            });
        }
    }
    RasterSeries::new(entries).unwrap()
}

pub fn soil_moisture_series() -> RasterSeries {
    let entries = (1..=12)
        .map(|m| RasterEntry {
            timestamp: Utc.with_ymd_and_hms(2021, m, 10, 0, 0, 0).unwrap(),
            raster: Raster::new(grid())
                .with_band("ssm", vec![Some(15.0 + m as f64); 9])
                .unwrap()
                .with_band("susm", vec![Some(80.0); 9])
                .unwrap(),
        })
        .collect();
    RasterSeries::new(entries).unwrap()
}

pub fn config_toml(source: &str, output_path: &str, mode: &str) -> String {
    format!(
        r#"
[run]
name = "integration"
mode = "{mode}"
concurrent_regions = 2
timeout_seconds = 60

{source}

[period]
start = "2021-01-01"
end = "2022-01-01"

[soil]
root_depth_m = 0.5
partition_coefficient = 0.5

[extraction]
scale = 500.0

[load]
output_path = "{output_path}"

[[regions]]
name = "station"
roi = [[10.015, 45.985]]

[[regions]]
name = "catchment"
roi = [[10.002, 45.972], [10.028, 45.972], [10.028, 45.998], [10.002, 45.998]]
"#
    )
}
