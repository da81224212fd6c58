use crate::domain::model::{soil_depth_bands, Dataset, DateRange, Raster, RasterSeries, SoilProperty};
use crate::domain::ports::RasterSource;
use crate::domain::roi::Roi;
use crate::utils::error::{RechargeError, Result};
use reqwest::Client;
use std::time::Duration;

/// [`RasterSource`] backed by a raster-processing service speaking JSON.
///
/// `GET {endpoint}/soil/{property}` answers a [`Raster`] and
/// `GET {endpoint}/series/{dataset}` a [`RasterSeries`]. Both take the
/// `roi`, `scale` and `bands` query parameters, series also `start` and `end`.
#[derive(Debug, Clone)]
pub struct HttpRasterSource {
    client: Client,
    endpoint: String,
}

impl HttpRasterSource {
    pub fn new(endpoint: &str, timeout_seconds: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}/{}", self.endpoint, path);
        tracing::debug!("Requesting {}", url);

        let response = self.client.get(&url).query(query).send().await?;
        tracing::debug!("Raster service response status: {}", response.status());

        let response = response.error_for_status()?;
        Ok(response.json::<T>().await?)
    }
}

fn require_bands(raster: &Raster, bands: &[&str], what: &str) -> Result<()> {
    raster.check()?;
    for band in bands {
        if !raster.bands.contains_key(*band) {
            return Err(RechargeError::validation(format!(
                "{} response has no band '{}'",
                what, band
            )));
        }
    }
    Ok(())
}

impl RasterSource for HttpRasterSource {
    async fn soil_property(&self, property: SoilProperty, roi: &Roi, scale: f64) -> Result<Raster> {
        let bands = soil_depth_bands();
        let query = [
            ("roi", roi.to_json()),
            ("scale", scale.to_string()),
            ("bands", bands.join(",")),
        ];
        let raster: Raster = self.get_json(&format!("soil/{}", property.id()), &query).await?;

        let band_refs: Vec<&str> = bands.iter().map(String::as_str).collect();
        require_bands(&raster, &band_refs, property.id())?;
        Ok(raster)
    }

    async fn series(&self, dataset: Dataset, roi: &Roi, scale: f64, range: &DateRange) -> Result<RasterSeries> {
        let query = [
            ("roi", roi.to_json()),
            ("scale", scale.to_string()),
            ("start", range.start.to_string()),
            ("end", range.end.to_string()),
            ("bands", dataset.bands().join(",")),
        ];
        let series: RasterSeries = self.get_json(&format!("series/{}", dataset.id()), &query).await?;

        let series = RasterSeries::new(series.entries)?.filter_range(range);
        for entry in &series.entries {
            require_bands(&entry.raster, dataset.bands(), dataset.id())?;
        }
        tracing::debug!("Received {} {} observations", series.len(), dataset.id());
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Grid, RasterEntry};
    use chrono::{NaiveDate, TimeZone, Utc};
    use httpmock::prelude::*;

    fn grid() -> Grid {
        Grid {
            west: 10.0,
            north: 46.0,
            cell_width: 0.01,
            cell_height: 0.01,
            cols: 2,
            rows: 1,
        }
    }

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2020, 3, 1).unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_soil_property_request() {
        let server = MockServer::start();
        let mut raster = Raster::new(grid());
        for band in soil_depth_bands() {
            raster.insert_band(&band, vec![Some(40.0), Some(42.0)]).unwrap();
        }

        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/soil/sand")
                .query_param("scale", "250")
                .query_param("bands", "b0,b10,b30,b60,b100,b200");
            then.status(200).json_body(serde_json::to_value(&raster).unwrap());
        });

        let source = HttpRasterSource::new(&server.base_url(), 5).unwrap();
        let roi = Roi::parse("[[10.005, 45.995]]").unwrap();
        let received = source.soil_property(SoilProperty::Sand, &roi, 250.0).await.unwrap();

        mock.assert();
        assert_eq!(received, raster);
    }

    #[tokio::test]
    async fn test_series_filters_to_window() {
        let server = MockServer::start();
        let entries: Vec<RasterEntry> = [(2019, 12), (2020, 1), (2020, 2), (2020, 3)]
            .iter()
            .map(|(y, m)| RasterEntry {
                timestamp: Utc.with_ymd_and_hms(*y, *m, 10, 0, 0, 0).unwrap(),
                raster: Raster::new(grid()).with_band("PET", vec![Some(300.0); 2]).unwrap(),
            })
            .collect();
        let body = RasterSeries { entries };

        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/series/pet")
                .query_param("start", "2020-01-01")
                .query_param("end", "2020-03-01")
                .query_param("bands", "PET");
            then.status(200).json_body(serde_json::to_value(&body).unwrap());
        });

        let source = HttpRasterSource::new(&format!("{}/", server.base_url()), 5).unwrap();
        let roi = Roi::parse("[[10.005, 45.995]]").unwrap();
        let series = source
            .series(Dataset::PotentialEvapotranspiration, &roi, 500.0, &range())
            .await
            .unwrap();

        mock.assert();
        assert_eq!(series.len(), 2);
    }

    #[tokio::test]
    async fn test_server_error_is_api_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/series/precipitation");
            then.status(503);
        });

        let source = HttpRasterSource::new(&server.base_url(), 5).unwrap();
        let roi = Roi::parse("[[10.005, 45.995]]").unwrap();
        let err = source
            .series(Dataset::Precipitation, &roi, 500.0, &range())
            .await
            .unwrap_err();
        assert!(matches!(err, RechargeError::ApiError(_)));
    }

    #[tokio::test]
    async fn test_missing_band_rejected() {
        let server = MockServer::start();
        let raster = Raster::new(grid()).with_band("b0", vec![Some(1.0); 2]).unwrap();
        server.mock(|when, then| {
            when.method(GET).path("/soil/clay");
            then.status(200).json_body(serde_json::to_value(&raster).unwrap());
        });

        let source = HttpRasterSource::new(&server.base_url(), 5).unwrap();
        let roi = Roi::parse("[[10.005, 45.995]]").unwrap();
        assert!(source.soil_property(SoilProperty::Clay, &roi, 250.0).await.is_err());
    }
}
