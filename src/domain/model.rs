use crate::utils::error::{RechargeError, Result};
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Soil depths (cm) published by the soil property rasters.
pub const SOIL_DEPTHS_CM: [u32; 6] = [0, 10, 30, 60, 100, 200];

/// Band names matching [`SOIL_DEPTHS_CM`], e.g. `b0`, `b10`.
pub fn soil_depth_bands() -> Vec<String> {
    SOIL_DEPTHS_CM.iter().map(|d| format!("b{}", d)).collect()
}

/// A calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(RechargeError::validation(format!(
                "month {} is outside 1..=12",
                month
            )));
        }
        Ok(Self { year, month })
    }

    pub fn of<D: Datelike>(date: &D) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Months since year 0, used for month arithmetic.
    fn ordinal(self) -> i64 {
        self.year as i64 * 12 + (self.month as i64 - 1)
    }

    fn from_ordinal(ordinal: i64) -> Self {
        Self {
            year: ordinal.div_euclid(12) as i32,
            month: ordinal.rem_euclid(12) as u32 + 1,
        }
    }

    pub fn add_months(self, months: i64) -> Self {
        Self::from_ordinal(self.ordinal() + months)
    }

    pub fn months_until(self, other: YearMonth) -> i64 {
        other.ordinal() - self.ordinal()
    }

    pub fn first_day(self) -> NaiveDate {
        // month is always 1..=12 and day 1 exists in every month
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default()
    }

    /// First instant of the month in UTC.
    pub fn start(self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.first_day().and_hms_opt(0, 0, 0).unwrap_or_default())
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl std::str::FromStr for YearMonth {
    type Err = RechargeError;

    /// Accepts `YYYY-MM` or a full `YYYY-MM-DD` date.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(Self::of(&date));
        }
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| RechargeError::validation(format!("invalid year-month '{}'", s)))?;
        let year = year
            .parse::<i32>()
            .map_err(|_| RechargeError::validation(format!("invalid year in '{}'", s)))?;
        let month = month
            .parse::<u32>()
            .map_err(|_| RechargeError::validation(format!("invalid month in '{}'", s)))?;
        Self::new(year, month)
    }
}

/// Half-open date window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start >= end {
            return Err(RechargeError::validation(format!(
                "date range start {} must be before end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        let date = timestamp.date_naive();
        date >= self.start && date < self.end
    }

    pub fn first_month(&self) -> YearMonth {
        YearMonth::of(&self.start)
    }

    /// Month holding the last day of the window.
    pub fn last_month(&self) -> YearMonth {
        let last_day = self.end.pred_opt().unwrap_or(self.start);
        YearMonth::of(&last_day)
    }

    /// Every distinct month intersecting the window, in order.
    pub fn months(&self) -> Vec<YearMonth> {
        let first = self.first_month();
        let count = first.months_until(self.last_month()) + 1;
        (0..count).map(|i| first.add_months(i)).collect()
    }
}

/// North-up regular grid in geographic degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub west: f64,
    pub north: f64,
    pub cell_width: f64,
    pub cell_height: f64,
    pub cols: usize,
    pub rows: usize,
}

impl Grid {
    /// `cols * rows`, or `None` when that overflows.
    pub fn cell_count(&self) -> Option<usize> {
        self.cols.checked_mul(self.rows)
    }

    pub fn len(&self) -> usize {
        self.cols.saturating_mul(self.rows)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row-major index of the cell containing `(lon, lat)`.
    pub fn cell_at(&self, lon: f64, lat: f64) -> Option<usize> {
        if !(self.cell_width > 0.0 && self.cell_height > 0.0) {
            return None;
        }
        let col = ((lon - self.west) / self.cell_width).floor();
        let row = ((self.north - lat) / self.cell_height).floor();
        if col < 0.0 || row < 0.0 || col >= self.cols as f64 || row >= self.rows as f64 {
            return None;
        }
        Some(row as usize * self.cols + col as usize)
    }

    /// Centre coordinate `(lon, lat)` of a cell.
    pub fn cell_center(&self, index: usize) -> (f64, f64) {
        let row = index / self.cols.max(1);
        let col = index % self.cols.max(1);
        (
            self.west + (col as f64 + 0.5) * self.cell_width,
            self.north - (row as f64 + 0.5) * self.cell_height,
        )
    }
}

/// One multi-band raster; every band holds `grid.len()` cells, `None` = no data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Raster {
    pub grid: Grid,
    pub bands: BTreeMap<String, Vec<Option<f64>>>,
}

impl Raster {
    pub fn new(grid: Grid) -> Self {
        Self {
            grid,
            bands: BTreeMap::new(),
        }
    }

    pub fn with_band(mut self, name: &str, values: Vec<Option<f64>>) -> Result<Self> {
        self.insert_band(name, values)?;
        Ok(self)
    }

    pub fn insert_band(&mut self, name: &str, values: Vec<Option<f64>>) -> Result<()> {
        if values.len() != self.grid.len() {
            return Err(RechargeError::validation(format!(
                "band '{}' has {} cells, grid has {}",
                name,
                values.len(),
                self.grid.len()
            )));
        }
        self.bands.insert(name.to_string(), values);
        Ok(())
    }

    pub fn band(&self, name: &str) -> Result<&[Option<f64>]> {
        self.bands
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| RechargeError::validation(format!("raster has no band '{}'", name)))
    }

    /// Checks the grid size is representable and every band matches it.
    pub fn check(&self) -> Result<()> {
        let cells = self.grid.cell_count().ok_or_else(|| {
            RechargeError::validation(format!(
                "grid of {} x {} cells is too large",
                self.grid.cols, self.grid.rows
            ))
        })?;
        for (name, values) in &self.bands {
            if values.len() != cells {
                return Err(RechargeError::validation(format!(
                    "band '{}' has {} cells, grid has {}",
                    name,
                    values.len(),
                    cells
                )));
            }
        }
        Ok(())
    }

    /// Values of `name` at the centre of every cell of `target`. `None` where
    /// a centre falls outside this raster.
    pub fn band_on_grid(&self, name: &str, target: &Grid) -> Result<Vec<Option<f64>>> {
        let values = self.band(name)?;
        if self.grid == *target {
            return Ok(values.to_vec());
        }
        Ok((0..target.len())
            .map(|i| {
                let (lon, lat) = target.cell_center(i);
                self.grid.cell_at(lon, lat).and_then(|c| values.get(c).copied().flatten())
            })
            .collect())
    }

    /// Applies `f` to every valid cell of every band.
    pub fn map_values(&self, f: impl Fn(f64) -> f64) -> Self {
        let bands = self
            .bands
            .iter()
            .map(|(name, values)| (name.clone(), values.iter().map(|v| v.map(&f)).collect()))
            .collect();
        Self {
            grid: self.grid,
            bands,
        }
    }

    /// Keeps the listed bands, renamed pairwise.
    pub fn rename_bands(&self, from: &[&str], to: &[&str]) -> Result<Self> {
        if from.len() != to.len() {
            return Err(RechargeError::validation("band rename lists differ in length"));
        }
        let mut out = Raster::new(self.grid);
        for (old, new) in from.iter().zip(to) {
            out.insert_band(new, self.band(old)?.to_vec())?;
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterEntry {
    pub timestamp: DateTime<Utc>,
    pub raster: Raster,
}

/// Time-indexed rasters on a shared grid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RasterSeries {
    pub entries: Vec<RasterEntry>,
}

impl RasterSeries {
    pub fn new(entries: Vec<RasterEntry>) -> Result<Self> {
        let series = Self { entries };
        series.check()?;
        Ok(series)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn grid(&self) -> Option<Grid> {
        self.entries.first().map(|e| e.raster.grid)
    }

    /// Strictly increasing timestamps and one grid for every entry.
    pub fn check(&self) -> Result<()> {
        let grid = self.grid();
        for (i, entry) in self.entries.iter().enumerate() {
            entry.raster.check()?;
            if Some(entry.raster.grid) != grid {
                return Err(RechargeError::validation(format!(
                    "entry {} at {} is on a different grid",
                    i, entry.timestamp
                )));
            }
            if i > 0 && self.entries[i - 1].timestamp >= entry.timestamp {
                return Err(RechargeError::validation(format!(
                    "timestamps must be strictly increasing ({} follows {})",
                    entry.timestamp,
                    self.entries[i - 1].timestamp
                )));
            }
        }
        Ok(())
    }

    pub fn filter_range(&self, range: &DateRange) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|e| range.contains(&e.timestamp))
                .cloned()
                .collect(),
        }
    }

    pub fn map_values(&self, f: impl Fn(f64) -> f64 + Copy) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .map(|e| RasterEntry {
                    timestamp: e.timestamp,
                    raster: e.raster.map_values(f),
                })
                .collect(),
        }
    }

    pub fn rename_bands(&self, from: &[&str], to: &[&str]) -> Result<Self> {
        let entries = self
            .entries
            .iter()
            .map(|e| {
                Ok(RasterEntry {
                    timestamp: e.timestamp,
                    raster: e.raster.rename_bands(from, to)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }
}

/// Soil property layers published per depth band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoilProperty {
    Sand,
    Clay,
    OrganicCarbon,
}

impl SoilProperty {
    pub const ALL: [SoilProperty; 3] = [Self::Sand, Self::Clay, Self::OrganicCarbon];

    pub fn id(self) -> &'static str {
        match self {
            Self::Sand => "sand",
            Self::Clay => "clay",
            Self::OrganicCarbon => "orgc",
        }
    }

    /// Raw service units to kg/kg: sand and clay come in percent,
    /// organic carbon in units of 5 g/kg.
    pub fn scale_factor(self) -> f64 {
        match self {
            Self::Sand | Self::Clay => 0.01,
            Self::OrganicCarbon => 5.0 / 1000.0,
        }
    }
}

/// Time series datasets served by the raster collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    Precipitation,
    PotentialEvapotranspiration,
    SoilMoisture,
}

impl Dataset {
    pub fn id(self) -> &'static str {
        match self {
            Self::Precipitation => "precipitation",
            Self::PotentialEvapotranspiration => "pet",
            Self::SoilMoisture => "soil_moisture",
        }
    }

    pub fn bands(self) -> &'static [&'static str] {
        match self {
            Self::Precipitation => &["precipitation"],
            Self::PotentialEvapotranspiration => &["PET"],
            Self::SoilMoisture => &["ssm", "susm"],
        }
    }

    /// PET is published in 0.1 kg/m² units.
    pub fn scale_factor(self) -> f64 {
        match self {
            Self::PotentialEvapotranspiration => 0.1,
            Self::Precipitation | Self::SoilMoisture => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn grid_2x2() -> Grid {
        Grid {
            west: 10.0,
            north: 50.0,
            cell_width: 1.0,
            cell_height: 1.0,
            cols: 2,
            rows: 2,
        }
    }

    #[test]
    fn test_year_month_arithmetic() {
        let ym = YearMonth::new(2019, 11).unwrap();
        assert_eq!(ym.add_months(2), YearMonth::new(2020, 1).unwrap());
        assert_eq!(ym.add_months(-11), YearMonth::new(2018, 12).unwrap());
        assert_eq!(ym.months_until(YearMonth::new(2020, 3).unwrap()), 4);
        assert_eq!(ym.to_string(), "2019-11");
        assert!(YearMonth::new(2019, 13).is_err());
    }

    #[test]
    fn test_year_month_parse() {
        assert_eq!("2015-01".parse::<YearMonth>().unwrap(), YearMonth::new(2015, 1).unwrap());
        assert_eq!("2015-07-31".parse::<YearMonth>().unwrap(), YearMonth::new(2015, 7).unwrap());
        assert!("2015/07".parse::<YearMonth>().is_err());
    }

    #[test]
    fn test_date_range_months_end_exclusive() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2016, 1, 1).unwrap(),
        )
        .unwrap();
        let months = range.months();
        assert_eq!(months.len(), 12);
        assert_eq!(months[11], YearMonth::new(2015, 12).unwrap());

        let partial = DateRange::new(
            NaiveDate::from_ymd_opt(2015, 1, 15).unwrap(),
            NaiveDate::from_ymd_opt(2015, 3, 2).unwrap(),
        )
        .unwrap();
        assert_eq!(partial.months().len(), 3);
        assert!(DateRange::new(partial.end, partial.start).is_err());
    }

    #[test]
    fn test_grid_cell_lookup() {
        let grid = grid_2x2();
        assert_eq!(grid.cell_at(10.5, 49.5), Some(0));
        assert_eq!(grid.cell_at(11.5, 49.5), Some(1));
        assert_eq!(grid.cell_at(10.5, 48.5), Some(2));
        assert_eq!(grid.cell_at(9.9, 49.5), None);
        assert_eq!(grid.cell_at(10.5, 50.5), None);
        assert_eq!(grid.cell_center(3), (11.5, 48.5));
    }

    #[test]
    fn test_series_rejects_unordered_timestamps() {
        let raster = Raster::new(grid_2x2())
            .with_band("pr", vec![Some(1.0); 4])
            .unwrap();
        let entries = vec![
            RasterEntry {
                timestamp: ts(2020, 2, 1),
                raster: raster.clone(),
            },
            RasterEntry {
                timestamp: ts(2020, 1, 1),
                raster,
            },
        ];
        assert!(RasterSeries::new(entries).is_err());
    }

    #[test]
    fn test_oversized_grid_rejected() {
        let grid = Grid {
            cols: usize::MAX / 2,
            rows: 3,
            ..grid_2x2()
        };
        assert_eq!(grid.cell_count(), None);

        let mut raster = Raster::new(grid);
        raster.bands.insert("pr".to_string(), vec![Some(1.0); 4]);
        let err = raster.check().unwrap_err();
        assert!(err.to_string().contains("too large"));
        assert!(Raster::new(grid).check().is_err());
    }

    #[test]
    fn test_band_on_finer_grid() {
        let coarse = Raster::new(grid_2x2())
            .with_band("pr", vec![Some(1.0), Some(2.0), Some(3.0), None])
            .unwrap();
        let fine = Grid {
            cell_width: 0.5,
            cell_height: 0.5,
            cols: 5,
            rows: 4,
            ..grid_2x2()
        };

        let values = coarse.band_on_grid("pr", &fine).unwrap();
        assert_eq!(values.len(), 20);
        assert_eq!(&values[0..5], &[Some(1.0), Some(1.0), Some(2.0), Some(2.0), None]);
        assert_eq!(values[10], Some(3.0));
        assert_eq!(values[13], None);
        assert_eq!(coarse.band_on_grid("pr", &grid_2x2()).unwrap(), coarse.band("pr").unwrap());
    }

    #[test]
    fn test_band_length_checked() {
        let result = Raster::new(grid_2x2()).with_band("pr", vec![Some(1.0); 3]);
        assert!(result.is_err());
    }
}
