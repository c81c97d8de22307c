//! Service configuration.
//!
//! Loaded from TOML. Search order:
//!   1. `$BASIN_SERVICE_CONFIG`
//!   2. `./basin_service.toml`
//!   3. built-in defaults
//!
//! A `.env` file is read first (via `dotenv`), so either variable may live
//! there. `$ARCGIS_HOST` overrides `arcgis.host` after the file is applied.
//!
//! ```toml
//! [service]
//! base_url = "https://earthquake.usgs.gov"
//!
//! [arcgis]
//! host = "https://earthquake.usgs.gov"
//! timeout_secs = 30
//!
//! [regions]
//! path = "data/basins.geojson"
//!
//! [grid]
//! data_dir = "data/grid"
//!
//! [logging]
//! level = "info"
//! file = "basin_service.log"
//! console_timestamps = false
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::ingest::PointValueClient;
use crate::ingest::arcgis::{ArcGisClient, DEFAULT_ARCGIS_HOST};
use crate::ingest::grid::GridValueClient;
use crate::logging::{self, Component, LogLevel};
use crate::model::BasinError;
use crate::regions::RegionIndex;

pub const CONFIG_ENV_VAR: &str = "BASIN_SERVICE_CONFIG";
pub const ARCGIS_HOST_ENV_VAR: &str = "ARCGIS_HOST";
pub const DEFAULT_CONFIG_FILE: &str = "basin_service.toml";

// ---------------------------------------------------------------------------
// Configuration sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    pub service: ServiceUrlConfig,
    pub arcgis: ArcGisConfig,
    pub regions: RegionsConfig,
    pub grid: GridConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceUrlConfig {
    /// Public base URL of this service, prefixed to the links in the usage
    /// document. Empty gives host-relative links.
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArcGisConfig {
    pub host: String,
    pub timeout_secs: u64,
}

impl Default for ArcGisConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_ARCGIS_HOST.to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegionsConfig {
    /// GeoJSON region file; the bundled reference set when absent.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridConfig {
    /// Directory of per-region CSV grids. When set, lookups use the grid
    /// files instead of the ArcGIS service.
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub console_timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            console_timestamps: false,
        }
    }
}

impl LoggingConfig {
    pub fn log_level(&self) -> Result<LogLevel, BasinError> {
        self.level.parse().map_err(BasinError::Configuration)
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl ServiceConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, BasinError> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| BasinError::Configuration(format!("invalid TOML: {}", e)))?;
        config.logging.log_level()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, BasinError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            BasinError::Configuration(format!(
                "could not read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Loads configuration following the documented search order and applies
    /// environment overrides.
    pub fn load() -> Result<Self, BasinError> {
        dotenv::dotenv().ok();

        let mut config = match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) => Self::from_path(Path::new(&path))?,
            Err(_) => {
                let local = Path::new(DEFAULT_CONFIG_FILE);
                if local.exists() {
                    Self::from_path(local)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies overrides from an environment lookup function.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(ARCGIS_HOST_ENV_VAR).filter(|h| !h.trim().is_empty()) {
            self.arcgis.host = host;
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.arcgis.timeout_secs)
    }

    /// Loads the configured region file, or the bundled set.
    pub fn load_regions(&self) -> Result<RegionIndex, BasinError> {
        match &self.regions.path {
            Some(path) => RegionIndex::from_path(path),
            None => RegionIndex::bundled(),
        }
    }

    /// Builds the point-value client selected by this configuration.
    pub fn point_client(
        &self,
        regions: &RegionIndex,
    ) -> Result<Box<dyn PointValueClient + Send + Sync>, BasinError> {
        match &self.grid.data_dir {
            Some(dir) => {
                logging::info(
                    Component::Config,
                    None,
                    &format!("Using basin grids from {}", dir.display()),
                );
                Ok(Box::new(GridValueClient::load(dir, regions)?))
            }
            None => {
                logging::info(
                    Component::Config,
                    None,
                    &format!("Using ArcGIS identify service at {}", self.arcgis.host),
                );
                Ok(Box::new(ArcGisClient::new(&self.arcgis.host, self.timeout())?))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
