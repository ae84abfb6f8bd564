use anyhow::Context;
use clap::{ArgAction, Parser, ValueEnum};
use log::LevelFilter;
use std::path::PathBuf;
use std::process::ExitCode;
use urma_wind::{format_failure, format_success, SpatialPolicy, UrmaWind};

#[derive(Parser, Debug)]
#[command(name = "urma-wind")]
#[command(about = "Near-surface wind speed at a point from the NOAA URMA analysis")]
struct Args {
    /// Latitude in degrees
    #[arg(long, default_value_t = 40.7128, allow_negative_numbers = true)]
    lat: f64,

    /// Longitude in degrees
    #[arg(long, default_value_t = -74.0060, allow_negative_numbers = true)]
    lon: f64,

    /// Valid time (UTC) as YYYY-MM-DD HH:MM
    #[arg(long, default_value = "2024-12-28 12:00")]
    time: String,

    /// Cache directory for downloaded GRIB2 subsets
    #[arg(long)]
    save_dir: Option<PathBuf>,

    /// Download again even if a cached subset exists
    #[arg(long)]
    overwrite: bool,

    /// How the point value is read from the grid
    #[arg(long, value_enum, default_value_t = PolicyArg::Nearest)]
    policy: PolicyArg,

    /// Print the full result as JSON
    #[arg(long)]
    json: bool,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PolicyArg {
    Nearest,
    Bilinear,
}

impl From<PolicyArg> for SpatialPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Nearest => SpatialPolicy::NearestCell,
            PolicyArg::Bilinear => SpatialPolicy::Bilinear,
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Warn,
        (false, 1) => LevelFilter::Info,
        (false, 2) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    };
    // RUST_LOG wins when set.
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    let client = match UrmaWind::configure()
        .maybe_save_dir(args.save_dir.clone())
        .overwrite(args.overwrite)
        .policy(args.policy.into())
        .call()
        .await
    {
        Ok(client) => client,
        Err(e) => {
            eprintln!("{}", format_failure(&e));
            return Ok(ExitCode::FAILURE);
        }
    };

    match client.resolve(args.lat, args.lon, &args.time).await {
        Ok(result) if args.json => {
            let json = serde_json::to_string_pretty(&result)
                .context("Failed to serialize wind speed result")?;
            println!("{}", json);
            Ok(ExitCode::SUCCESS)
        }
        Ok(result) => {
            println!(
                "{}",
                format_success(args.lat, args.lon, &args.time, result.speed_m_s)
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{}", format_failure(&e));
            Ok(ExitCode::FAILURE)
        }
    }
}
