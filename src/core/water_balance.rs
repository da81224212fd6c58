//! Thornthwaite–Mather monthly soil-water balance.
//!
//! The store starts full (`ST = STFC`, `APWL = 0`). Each month the moisture
//! surplus `D = P - PET` either refills the store, with the excess leaving as
//! recharge, or deepens the accumulated potential water loss, from which storage
//! decays exponentially.

use crate::core::hydraulics::HydraulicParameters;
use crate::core::table::MonthlyTable;
use crate::domain::model::{Grid, Raster, RasterEntry, RasterSeries, YearMonth};
use crate::utils::error::{RechargeError, Result};
use serde::Serialize;
use std::fmt;

/// Output columns appended by [`WaterBalance::run_table`] and bands produced
/// by [`PixelWaterBalance::run`].
pub const BALANCE_COLUMNS: [&str; 3] = ["apwl", "st", "rech"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WaterBalanceState {
    pub apwl: f64,
    pub st: f64,
    pub rech: f64,
}

#[derive(Debug, Clone)]
pub struct WaterBalance {
    params: HydraulicParameters,
}

fn require(value: Option<f64>, period: &str, variable: &str) -> Result<f64> {
    match value {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(RechargeError::DataGap {
            period: period.to_string(),
            variable: variable.to_string(),
        }),
    }
}

impl WaterBalance {
    pub fn new(params: &HydraulicParameters) -> Result<Self> {
        params.validate()?;
        Ok(Self { params: *params })
    }

    pub fn params(&self) -> &HydraulicParameters {
        &self.params
    }

    pub fn initial_state(&self) -> WaterBalanceState {
        WaterBalanceState {
            apwl: 0.0,
            st: self.params.stfc,
            rech: 0.0,
        }
    }

    /// Advances one month from `prev`.
    pub fn step(
        &self,
        prev: &WaterBalanceState,
        pr: Option<f64>,
        pet: Option<f64>,
        period: &str,
    ) -> Result<WaterBalanceState> {
        let pr = require(pr, period, "pr")?;
        let pet = require(pet, period, "pet")?;
        let stfc = self.params.stfc;
        let surplus = pr - pet;

        if surplus >= 0.0 {
            let st = (prev.st + surplus).min(stfc);
            if !(st > 0.0) {
                return Err(RechargeError::NumericDomain {
                    period: period.to_string(),
                    reason: format!("soil storage {} must be positive to derive APWL", st),
                });
            }
            Ok(WaterBalanceState {
                // ln(1) may come out as -0.0
                apwl: (stfc * (stfc / st).ln()).max(0.0),
                st,
                rech: (prev.st + surplus - stfc).max(0.0),
            })
        } else {
            let apwl = prev.apwl - surplus;
            Ok(WaterBalanceState {
                apwl,
                st: stfc * (-apwl / stfc).exp(),
                rech: 0.0,
            })
        }
    }

    /// One state per input month, in input order.
    pub fn run<L: fmt::Display>(&self, months: &[(L, Option<f64>, Option<f64>)]) -> Result<Vec<WaterBalanceState>> {
        let mut state = self.initial_state();
        let mut states = Vec::with_capacity(months.len());
        for (period, pr, pet) in months {
            state = self.step(&state, *pr, *pet, &period.to_string())?;
            states.push(state);
        }
        Ok(states)
    }

    /// Runs over the table rows and appends `apwl`, `st` and `rech` columns.
    pub fn run_table(&self, table: &MonthlyTable, pr_column: &str, pet_column: &str) -> Result<MonthlyTable> {
        let (pr_idx, pet_idx) = (table.column_index(pr_column)?, table.column_index(pet_column)?);
        let months: Vec<_> = table
            .rows()
            .iter()
            .map(|row| (row.key, row.values[pr_idx], row.values[pet_idx]))
            .collect();

        let states = self.run(&months)?;
        let total: f64 = states.iter().map(|s| s.rech).sum();
        tracing::debug!(
            "Water balance over {} months, STFC {:.2} mm, recharge total {:.2} mm",
            states.len(),
            self.params.stfc,
            total
        );

        table
            .with_column("apwl", states.iter().map(|s| Some(s.apwl)).collect())?
            .with_column("st", states.iter().map(|s| Some(s.st)).collect())?
            .with_column("rech", states.iter().map(|s| Some(s.rech)).collect())
    }
}

/// The recurrence run independently for each selected cell of monthly
/// `pr`/`pet` rasters, with per-cell hydraulic parameters.
#[derive(Debug, Clone)]
pub struct PixelWaterBalance {
    root_depth_factor: f64,
    partition_coefficient: f64,
}

impl PixelWaterBalance {
    pub fn new(root_depth_factor: f64, partition_coefficient: f64) -> Self {
        Self {
            root_depth_factor,
            partition_coefficient,
        }
    }

    /// `cells` index the series grid. `fc_mean`/`wp_mean` are single-band
    /// rasters on any grid and are read at each series cell centre. Cells
    /// outside soil coverage, or not in `cells`, stay `None` in every band.
    pub fn run(
        &self,
        series: &RasterSeries,
        fc_mean: &Raster,
        wp_mean: &Raster,
        cells: &[usize],
    ) -> Result<RasterSeries> {
        series.check()?;
        let grid = match series.grid() {
            Some(grid) => grid,
            None => return Ok(RasterSeries::default()),
        };
        let fc = single_band_on(fc_mean, &grid)?;
        let wp = single_band_on(wp_mean, &grid)?;

        let months = series.len();
        let mut out: Vec<[Vec<Option<f64>>; 3]> = (0..months)
            .map(|_| [vec![None; grid.len()], vec![None; grid.len()], vec![None; grid.len()]])
            .collect();

        let mut cells = cells.to_vec();
        cells.sort_unstable();
        cells.dedup();

        let mut computed = 0usize;
        for &cell in &cells {
            let (Some(cell_fc), Some(cell_wp)) = (fc.get(cell).copied().flatten(), wp.get(cell).copied().flatten())
            else {
                continue;
            };
            let params = HydraulicParameters::resolve(
                cell_fc,
                cell_wp,
                self.root_depth_factor,
                self.partition_coefficient,
            )?;
            let balance = WaterBalance::new(&params)?;

            let inputs = series
                .entries
                .iter()
                .map(|e| {
                    Ok((
                        YearMonth::of(&e.timestamp),
                        e.raster.band("pr")?[cell],
                        e.raster.band("pet")?[cell],
                    ))
                })
                .collect::<Result<Vec<_>>>()?;

            for (m, state) in balance.run(&inputs)?.into_iter().enumerate() {
                out[m][0][cell] = Some(state.apwl);
                out[m][1][cell] = Some(state.st);
                out[m][2][cell] = Some(state.rech);
            }
            computed += 1;
        }

        tracing::debug!("Pixel water balance computed for {} of {} cells", computed, cells.len());

        let entries = series
            .entries
            .iter()
            .zip(out)
            .map(|(entry, [apwl, st, rech])| {
                let raster = Raster::new(grid)
                    .with_band(BALANCE_COLUMNS[0], apwl)?
                    .with_band(BALANCE_COLUMNS[1], st)?
                    .with_band(BALANCE_COLUMNS[2], rech)?;
                Ok(RasterEntry {
                    timestamp: entry.timestamp,
                    raster,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        RasterSeries::new(entries)
    }
}

fn single_band_on(raster: &Raster, grid: &Grid) -> Result<Vec<Option<f64>>> {
    match raster.bands.keys().next() {
        Some(name) if raster.bands.len() == 1 => raster.band_on_grid(name, grid),
        _ => Err(RechargeError::validation(format!(
            "expected a single-band raster, found {} bands",
            raster.bands.len()
        ))),
    }
}
