//! Monthly temporal aggregation of raster series.
//!
//! Values are accumulated into a running total per band and cell over the whole
//! series; the aggregate for a period is the running total at the period's end
//! boundary minus the running total at its start boundary. Each observation is
//! therefore counted in exactly one period.
//!
//! Partial months at either end of the series are aggregated from whatever
//! observations they contain.

use crate::domain::model::{DateRange, Raster, RasterEntry, RasterSeries, YearMonth};
use crate::utils::error::{RechargeError, Result};

#[derive(Debug, Clone)]
pub struct MonthlyResampler {
    bands: Vec<String>,
    step: u32,
}

impl MonthlyResampler {
    pub fn new(bands: &[&str]) -> Self {
        Self {
            bands: bands.iter().map(|b| b.to_string()).collect(),
            step: 1,
        }
    }

    /// Number of calendar months per output period.
    pub fn with_step(mut self, step: u32) -> Result<Self> {
        if step == 0 {
            return Err(RechargeError::validation("resampling step must be at least 1"));
        }
        self.step = step;
        Ok(self)
    }

    /// One entry per period, stamped with the first instant of its first month.
    ///
    /// With a `window`, observations outside it are ignored and the output holds
    /// exactly one entry per period intersecting the window, zero-filled where
    /// no observation falls. Cells with no valid observation anywhere in the
    /// series stay `None`.
    pub fn resample(&self, series: &RasterSeries, window: Option<&DateRange>) -> Result<RasterSeries> {
        series.check()?;
        let series = match window {
            Some(range) => series.filter_range(range),
            None => series.clone(),
        };

        let grid = series.grid().ok_or_else(|| {
            RechargeError::validation("cannot aggregate a series without observations")
        })?;

        let (first, last) = match window {
            Some(range) => (range.first_month(), range.last_month()),
            None => {
                // grid() returned Some, so there is at least one entry
                let first = &series.entries[0];
                let last = &series.entries[series.len() - 1];
                (YearMonth::of(&first.timestamp), YearMonth::of(&last.timestamp))
            }
        };

        let step = self.step as i64;
        let periods = first.months_until(last) / step + 1;
        let starts: Vec<YearMonth> = (0..periods).map(|k| first.add_months(k * step)).collect();
        let boundaries: Vec<usize> = (0..=periods)
            .map(|k| {
                let boundary = first.add_months(k * step).start();
                series.entries.partition_point(|e| e.timestamp < boundary)
            })
            .collect();

        let cells = grid.len();
        let mut outputs: Vec<Raster> = starts.iter().map(|_| Raster::new(grid)).collect();

        for band in &self.bands {
            let mut running = vec![vec![0.0_f64; cells]; series.len() + 1];
            let mut observed = vec![false; cells];
            // entries up to i holding at least one valid value
            let mut valid_entries = vec![0usize; series.len() + 1];

            for (i, entry) in series.entries.iter().enumerate() {
                let values = entry.raster.band(band).map_err(|_| {
                    RechargeError::validation(format!(
                        "band '{}' missing at {}",
                        band, entry.timestamp
                    ))
                })?;
                let mut any_valid = false;
                for c in 0..cells {
                    let increment = match values[c] {
                        Some(v) if v.is_finite() => {
                            observed[c] = true;
                            any_valid = true;
                            v
                        }
                        _ => 0.0,
                    };
                    running[i + 1][c] = running[i][c] + increment;
                }
                valid_entries[i + 1] = valid_entries[i] + usize::from(any_valid);
            }

            for (k, output) in outputs.iter_mut().enumerate() {
                let (lo, hi) = (boundaries[k], boundaries[k + 1]);
                if valid_entries[hi] == valid_entries[lo] && observed.contains(&true) {
                    tracing::warn!(
                        "⚠️ No valid '{}' observation in period starting {}, filled with 0",
                        band,
                        starts[k]
                    );
                }
                let values = (0..cells)
                    .map(|c| observed[c].then(|| running[hi][c] - running[lo][c]))
                    .collect();
                output.insert_band(band, values)?;
            }
        }

        tracing::debug!(
            "Resampled {} observations into {} periods of {} month(s)",
            series.len(),
            periods,
            self.step
        );

        RasterSeries::new(
            starts
                .into_iter()
                .zip(outputs)
                .map(|(month, raster)| RasterEntry {
                    timestamp: month.start(),
                    raster,
                })
                .collect(),
        )
    }
}
