use clap::Parser;
use groundwater_recharge::core::hydraulics::HydraulicParameters;
use groundwater_recharge::core::table::{resample_annual, Aggregation, MonthlyTable};
use groundwater_recharge::utils::logger;
use groundwater_recharge::{RechargeError, WaterBalance};
use std::fs::File;
use std::io;

#[derive(Parser)]
#[command(name = "water_balance")]
#[command(about = "Runs the monthly soil-water balance over a period,pr,pet CSV")]
struct Args {
    /// Monthly input CSV with a `period` (YYYY-MM) key column; `-` reads stdin
    #[arg(short, long, default_value = "-")]
    input: String,

    /// Total available water (mm); needs --stfc
    #[arg(long, requires = "stfc", conflicts_with_all = ["fc", "wp"])]
    taw: Option<f64>,

    /// Stored water at field capacity (mm)
    #[arg(long, requires = "taw")]
    stfc: Option<f64>,

    /// Mean field capacity (volumetric fraction); needs --wp
    #[arg(long, requires = "wp")]
    fc: Option<f64>,

    /// Mean wilting point (volumetric fraction)
    #[arg(long, requires = "fc")]
    wp: Option<f64>,

    /// Root depth in metres, used with --fc/--wp
    #[arg(long, default_value = "0.5")]
    root_depth_m: f64,

    /// Partition coefficient, used with --fc/--wp
    #[arg(long, default_value = "0.5")]
    partition_coefficient: f64,

    #[arg(long, default_value = "pr")]
    pr_column: String,

    #[arg(long, default_value = "pet")]
    pet_column: String,

    /// Print yearly sums instead of the monthly table
    #[arg(long)]
    annual: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn parameters(args: &Args) -> groundwater_recharge::Result<HydraulicParameters> {
    match (args.taw, args.stfc, args.fc, args.wp) {
        (Some(taw), Some(stfc), _, _) => HydraulicParameters::from_storage(taw, stfc),
        (_, _, Some(fc), Some(wp)) => HydraulicParameters::resolve(
            fc,
            wp,
            args.root_depth_m * groundwater_recharge::core::hydraulics::MM_PER_M,
            args.partition_coefficient,
        ),
        _ => Err(RechargeError::MissingConfigError {
            field: "--taw/--stfc or --fc/--wp".to_string(),
        }),
    }
}

fn run(args: &Args) -> groundwater_recharge::Result<()> {
    let params = parameters(args)?;
    tracing::info!("TAW {:.2} mm, STFC {:.2} mm", params.taw, params.stfc);

    let table = if args.input == "-" {
        MonthlyTable::read_csv(io::stdin().lock())?
    } else {
        MonthlyTable::read_csv(File::open(&args.input)?)?
    };
    tracing::info!("Read {} months from {}", table.len(), args.input);

    let balance = WaterBalance::new(&params)?.run_table(&table, &args.pr_column, &args.pet_column)?;
    let out = balance.select(&["apwl", "st", "rech"])?;

    if args.annual {
        resample_annual(&out.select(&["rech"])?, Aggregation::Sum)?.write_csv(io::stdout().lock(), "year")
    } else {
        out.write_csv(io::stdout().lock(), "period")
    }
}

fn main() {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    if let Err(e) = run(&args) {
        tracing::error!("❌ Water balance failed: {} (Category: {:?})", e, e.category());
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());
        std::process::exit(1);
    }
}
