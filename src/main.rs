use clap::Parser;
use groundwater_recharge::config::{CliConfig, LogFormat, RechargeConfig, RunMode, SourceType};
use groundwater_recharge::domain::ports::RasterSource;
use groundwater_recharge::utils::error::ErrorSeverity;
use groundwater_recharge::utils::{logger, validation::Validate};
use groundwater_recharge::{
    BatchRunner, FileRasterSource, HttpRasterSource, LocalStorage, RechargeError, RegionOutcome, RegionRequest,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliConfig::parse();

    match args.log_format {
        LogFormat::Compact => logger::init_cli_logger(args.verbose),
        LogFormat::Json => logger::init_json_logger(args.verbose),
    }

    tracing::info!("🚀 Starting groundwater recharge estimation");
    tracing::info!("📁 Loading configuration from: {}", args.config);

    let mut config = match RechargeConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    if let Err(e) = args.apply_overrides(&mut config).and_then(|_| config.validate()) {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("✅ Configuration loaded and validated successfully");
    display_config_summary(&config, &args);

    let requests = RegionRequest::all_from_config(&config)?;
    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No data will be fetched");
        perform_dry_run(&config, &requests);
        return Ok(());
    }

    let storage = Arc::new(LocalStorage::new(config.output_path()));
    let outcomes = match config.source.r#type {
        SourceType::Http => {
            let endpoint = config.source.endpoint.clone().unwrap_or_default();
            let source = HttpRasterSource::new(&endpoint, config.source_timeout_seconds())?;
            run_batch(source, storage, &config, requests).await
        }
        SourceType::File => {
            let path = config.source.path.clone().unwrap_or_default();
            let source = FileRasterSource::new(LocalStorage::new(path));
            run_batch(source, storage, &config, requests).await
        }
    };

    report_outcomes(&config, &outcomes);

    let code = worst_error(&outcomes).map(exit_code).unwrap_or(0);
    if code > 0 {
        std::process::exit(code);
    }

    Ok(())
}

async fn run_batch<R: RasterSource + 'static>(
    source: R,
    storage: Arc<LocalStorage>,
    config: &RechargeConfig,
    requests: Vec<RegionRequest>,
) -> Vec<RegionOutcome> {
    BatchRunner::new(
        Arc::new(source),
        storage,
        config.concurrent_regions(),
        config.timeout_seconds(),
    )
    .run(requests)
    .await
}

/// The failure with the highest severity; the first one wins on ties.
fn worst_error(outcomes: &[RegionOutcome]) -> Option<&RechargeError> {
    outcomes
        .iter()
        .filter_map(|o| o.result.as_ref().err())
        .fold(None, |worst: Option<&RechargeError>, e| match worst {
            Some(w) if w.severity() >= e.severity() => Some(w),
            _ => Some(e),
        })
}

fn exit_code(e: &RechargeError) -> i32 {
    match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}

fn report_outcomes(config: &RechargeConfig, outcomes: &[RegionOutcome]) {
    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    println!();
    println!("📋 Results ({} ok, {} failed):", outcomes.len() - failed, failed);
    for outcome in outcomes {
        match &outcome.result {
            Ok(path) => println!(
                "  ✅ {} -> {}/{} ({:.1?})",
                outcome.region,
                config.output_path(),
                path,
                outcome.elapsed
            ),
            Err(e) => {
                println!("  ❌ {}: {}", outcome.region, e.user_friendly_message());
                println!("     💡 {}", e.recovery_suggestion());
            }
        }
    }
}

fn display_config_summary(config: &RechargeConfig, args: &CliConfig) {
    println!("📋 Configuration Summary:");
    println!("  Run: {}", config.run.name);
    match config.source.r#type {
        SourceType::Http => println!("  Source: {}", config.source.endpoint.as_deref().unwrap_or("")),
        SourceType::File => println!("  Source: files in {}", config.source.path.as_deref().unwrap_or("")),
    }
    println!("  Period: {} to {} (end exclusive)", config.period.start, config.period.end);
    println!(
        "  Mode: {}",
        match config.run.mode {
            RunMode::Roi => "region mean, then water balance",
            RunMode::Pixel => "per-cell water balance, then region mean",
        }
    );
    println!("  Regions: {}", config.regions.len());
    println!("  Output: {}", config.output_path());
    println!("  Concurrent Regions: {}", config.concurrent_regions());

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}

fn perform_dry_run(config: &RechargeConfig, requests: &[RegionRequest]) {
    println!("🔍 Dry Run Analysis:");
    println!();
    println!("🌱 Soil:");
    println!(
        "  Root depth: {} m (factor {} mm)",
        config.soil.root_depth_m,
        config.root_depth_factor()
    );
    println!("  Partition coefficient: {}", config.soil.partition_coefficient);
    println!("  Reduction scale: {} m", config.extraction.scale);

    println!();
    println!("🗺️ Regions:");
    for request in requests {
        println!(
            "  {} -> {} ({} months)",
            request.name,
            request.archive_name(),
            request.range.months().len()
        );
    }

    println!();
    println!("✅ Dry run analysis complete. Use --verbose for more details during actual run.");
}
