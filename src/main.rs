//! Command-line entry point for the basin term service.
//!
//! Payloads are printed as JSON on stdout; log output goes to stderr.
//! Exit codes: 0 success, 1 request failed, 2 bad invocation or configuration.

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Utc;
use clap::{Parser, Subcommand};

use basin_service::config::ServiceConfig;
use basin_service::logging::{self, Component, LogLevel};
use basin_service::response;
use basin_service::{BasinError, BasinQuery, BasinTermResolver, ErrorClass, RegionIndex};

// ---------------------------------------------------------------------------
// Argument parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Parser)]
#[command(name = "basin_service")]
#[command(about = "Resolve z1p0 / z2p5 basin terms for a point", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// GeoJSON region file instead of the bundled set
    #[arg(long, global = true)]
    regions: Option<PathBuf>,

    /// Directory of per-basin CSV grids, used instead of the ArcGIS service
    #[arg(long, global = true)]
    grid: Option<PathBuf>,
}

#[derive(Debug, PartialEq, Subcommand)]
enum Command {
    /// Resolve the basin terms at a point and print the result payload
    Query {
        /// Latitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        latitude: Option<String>,

        /// Longitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        longitude: Option<String>,

        /// Basin model id overriding the region default
        #[arg(long)]
        model: Option<String>,
    },
    /// Print the usage document listing models and regions
    Usage,
    /// Print the basin regions as a GeoJSON feature collection
    Geojson,
}

/// Parses a raw coordinate argument. Kept as a string through clap so that a
/// missing or garbage value still yields an error payload.
fn parse_coordinate_arg(name: &str, raw: Option<&str>) -> Result<f64, BasinError> {
    let raw = raw
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| BasinError::InvalidCoordinate(format!("Missing query key: {}", name)))?;
    raw.trim()
        .parse()
        .map_err(|_| BasinError::InvalidCoordinate(format!("{} [{}] is not a number", name, raw)))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn run_query(
    config: &ServiceConfig,
    regions: &RegionIndex,
    latitude: Option<&str>,
    longitude: Option<&str>,
    model: Option<&str>,
) -> ExitCode {
    let url = response::request_url(
        latitude.unwrap_or_default(),
        longitude.unwrap_or_default(),
        model,
    );

    let query = parse_coordinate_arg("latitude", latitude).and_then(|lat| {
        let lon = parse_coordinate_arg("longitude", longitude)?;
        BasinQuery::new(lat, lon, model)
    });
    let query = match query {
        Ok(q) => q,
        Err(e) => return fail(&url, &e),
    };

    let client = match config.point_client(regions) {
        Ok(c) => c,
        Err(e) => return fail(&url, &e),
    };

    let resolver = BasinTermResolver::new(regions, client);
    match resolver.resolve(&query) {
        Ok(resolution) => {
            let payload = response::success(&resolution, &url, Utc::now());
            println!("{}", response::to_pretty_string(&payload));
            ExitCode::SUCCESS
        }
        Err(e) => fail(&url, &e),
    }
}

fn fail(request: &str, err: &BasinError) -> ExitCode {
    match err.class() {
        ErrorClass::Validation => logging::warn(Component::Cli, None, &err.to_string()),
        _ => logging::error(Component::Cli, None, &err.to_string()),
    }
    println!("{}", response::to_pretty_string(&response::error(request, err)));
    exit_code(err)
}

fn exit_code(err: &BasinError) -> ExitCode {
    match err.class() {
        ErrorClass::Configuration => ExitCode::from(2),
        ErrorClass::Validation | ErrorClass::Dependency => ExitCode::from(1),
    }
}

fn main() -> ExitCode {
    // clap exits with status 2 on a malformed invocation.
    let cli = Cli::parse();

    let mut config = match ServiceConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(2);
        }
    };
    if let Some(path) = cli.regions {
        config.regions.path = Some(path);
    }
    if let Some(dir) = cli.grid {
        config.grid.data_dir = Some(dir);
    }

    logging::init_logger(
        config.logging.log_level().unwrap_or(LogLevel::Info),
        config.logging.file.as_deref(),
        config.logging.console_timestamps,
    );

    // Region configuration is required by every command; fail fast.
    let regions = match config.load_regions() {
        Ok(r) => r,
        Err(e) => {
            logging::error(Component::Config, None, &e.to_string());
            return exit_code(&e);
        }
    };

    match cli.command {
        Command::Usage => {
            let payload = response::usage(&regions, &config.service.base_url);
            println!("{}", response::to_pretty_string(&payload));
            ExitCode::SUCCESS
        }
        Command::Geojson => {
            let payload = response::feature_collection(&regions);
            println!("{}", response::to_pretty_string(&payload));
            ExitCode::SUCCESS
        }
        Command::Query {
            latitude,
            longitude,
            model,
        } => run_query(
            &config,
            &regions,
            latitude.as_deref(),
            longitude.as_deref(),
            model.as_deref(),
        ),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
