mod common;

use groundwater_recharge::core::table::{AnnualTable, MonthlyTable};
use groundwater_recharge::domain::model::YearMonth;
use groundwater_recharge::utils::validation::Validate;
use groundwater_recharge::{BatchRunner, HttpRasterSource, LocalStorage, RechargeConfig, RechargeError, RegionRequest};
use httpmock::prelude::*;
use std::io::Read;
use std::sync::Arc;
use tempfile::TempDir;

fn mock_service(server: &MockServer) -> Vec<httpmock::Mock<'_>> {
    let mut mocks = Vec::new();
    for (property, value) in [("sand", 40.0), ("clay", 20.0), ("orgc", 2.9)] {
        let body = serde_json::to_value(common::soil(value)).unwrap();
        mocks.push(server.mock(|when, then| {
            when.method(GET).path(format!("/soil/{}", property)).query_param("scale", "500");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(body);
        }));
    }

    let series = [
        ("precipitation", common::weekly_series("precipitation", &common::PR)),
        ("pet", common::weekly_series("PET", &common::PET_RAW)),
        ("soil_moisture", common::soil_moisture_series()),
    ];
    for (dataset, body) in series {
        let body = serde_json::to_value(body).unwrap();
        mocks.push(server.mock(|when, then| {
            when.method(GET)
                .path(format!("/series/{}", dataset))
                .query_param("start", "2021-01-01")
                .query_param("end", "2022-01-01");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(body);
        }));
    }
    mocks
}

fn read_entry(archive: &std::path::Path, name: &str) -> String {
    let data = std::fs::read(archive).unwrap();
    let mut zip = zip::ZipArchive::new(std::io::Cursor::new(data)).unwrap();
    let mut content = String::new();
    zip.by_name(name).unwrap().read_to_string(&mut content).unwrap();
    content
}

#[tokio::test]
async fn test_end_to_end_recharge_over_http() {
    let temp_dir = TempDir::new().unwrap();
    let output_path = temp_dir.path().to_str().unwrap().to_string();
    let server = MockServer::start();
    let mocks = mock_service(&server);

    let source_section = format!("[source]\ntype = \"http\"\nendpoint = \"{}\"\ntimeout_seconds = 10", server.base_url());
    let config = RechargeConfig::from_toml_str(&common::config_toml(&source_section, &output_path, "roi")).unwrap();
    config.validate().unwrap();

    let source = HttpRasterSource::new(config.source.endpoint.as_deref().unwrap(), 10).unwrap();
    let runner = BatchRunner::new(
        Arc::new(source),
        Arc::new(LocalStorage::new(config.output_path())),
        config.concurrent_regions(),
        config.timeout_seconds(),
    );
    let outcomes = runner.run(RegionRequest::all_from_config(&config).unwrap()).await;

    assert_eq!(outcomes.len(), 2);
    for outcome in &outcomes {
        assert!(outcome.result.is_ok(), "{} failed: {:?}", outcome.region, outcome.result);
    }
    for mock in &mocks {
        assert_eq!(mock.hits(), 2);
    }

    let archive = temp_dir.path().join("station_recharge.zip");
    assert!(archive.exists());

    let balance = MonthlyTable::read_csv(read_entry(&archive, "water_recharge_data.csv").as_bytes()).unwrap();
    assert_eq!(balance.len(), 12);
    assert_eq!(balance.columns(), &["pr", "pet", "apwl", "st", "rech"].map(String::from));

    let jan = YearMonth::new(2021, 1).unwrap();
    let jan_pr = balance.value(&jan, "pr").unwrap().unwrap();
    let jan_pet = balance.value(&jan, "pet").unwrap().unwrap();
    assert!((jan_pr - 120.0).abs() < 1e-9);
    assert!((jan_pet - 10.0).abs() < 1e-9);
    assert!((balance.value(&jan, "rech").unwrap().unwrap() - 110.0).abs() < 1e-9);

    let stfc = balance.column("st").unwrap()[0].unwrap();
    for row in balance.rows() {
        let st = row.values[3].unwrap();
        assert!(st > 0.0 && st <= stfc + 1e-9);
        assert!(row.values[2].unwrap() >= 0.0);
        assert!(row.values[4].unwrap() >= 0.0);
    }

    let annual = AnnualTable::read_csv(read_entry(&archive, "annual_recharge.csv").as_bytes()).unwrap();
    let monthly_sum: f64 = balance.column("rech").unwrap().iter().flatten().sum();
    // CSV round trip keeps shortest exact float text
    assert!((annual.value(&2021, "rech").unwrap().unwrap() - monthly_sum).abs() < 1e-6);

    let soil_moisture = read_entry(&archive, "soilmoisture_data.csv");
    assert!(soil_moisture.starts_with("period,ssm,susm\n2021-01,16,80\n"));

    let profile = read_entry(&archive, "soil_profile.csv");
    assert!(profile.starts_with("depth_cm,sand,clay,orgm,fc,wp\n0,"));
    assert_eq!(profile.lines().count(), 7);

    let parameters: serde_json::Value =
        serde_json::from_str(&read_entry(&archive, "parameters.json")).unwrap();
    assert_eq!(parameters["region"], "station");
    assert!(parameters["parameters"]["stfc"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn test_service_failure_is_reported_per_region() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET);
        then.status(500);
    });

    let source = HttpRasterSource::new(&server.base_url(), 5).unwrap();
    let source_section = format!("[source]\ntype = \"http\"\nendpoint = \"{}\"", server.base_url());
    let config = RechargeConfig::from_toml_str(&common::config_toml(
        &source_section,
        temp_dir.path().to_str().unwrap(),
        "roi",
    ))
    .unwrap();

    let runner = BatchRunner::new(
        Arc::new(source),
        Arc::new(LocalStorage::new(config.output_path())),
        1,
        config.timeout_seconds(),
    );
    let outcomes = runner.run(RegionRequest::all_from_config(&config).unwrap()).await;

    assert_eq!(outcomes.len(), 2);
    for outcome in outcomes {
        assert!(matches!(outcome.result, Err(RechargeError::ApiError(_))));
    }
    assert!(!temp_dir.path().join("station_recharge.zip").exists());
}
