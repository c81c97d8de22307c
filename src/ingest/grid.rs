//! Offline basin depth grids.
//!
//! Each basin region may ship a CSV of precomputed depths on a regular
//! 0.05° grid, named after the region id (`bayArea.csv`, `pugetLowland.csv`,
//! ...). Columns are `lat`, `lon`, `z1p0` and `z2p5`, in any order; depths
//! are in meters like the live service, and `null` or an empty field means
//! no data. Values are published under the region's default model keys.
//!
//! When live data is unavailable, this client stands in for the ArcGIS
//! service behind the same `PointValueClient` trait.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::ingest::PointValueClient;
use crate::ingest::arcgis::{ATTR_LAT, ATTR_LON};
use crate::logging::{self, Component};
use crate::model::{BasinError, Coordinate, RawAttributeSet, round_to};
use crate::models::BasinModel;
use crate::regions::RegionIndex;

/// Spacing, in degrees, of the precomputed basin grids.
pub const BASIN_DATA_SPACING: f64 = 0.05;

/// Integer grid node index, so that lookups never compare floats.
type NodeKey = (i64, i64);

fn node_key(latitude: f64, longitude: f64) -> NodeKey {
    (
        (latitude / BASIN_DATA_SPACING).round() as i64,
        (longitude / BASIN_DATA_SPACING).round() as i64,
    )
}

// ============================================================================
// Single basin grid
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
struct GridValues {
    z1p0: Option<f64>,
    z2p5: Option<f64>,
}

/// Depth grid for one basin region.
#[derive(Debug, Clone)]
pub struct BasinGrid {
    region_id: String,
    model: &'static BasinModel,
    records: HashMap<NodeKey, GridValues>,
}

impl BasinGrid {
    /// Parses a grid CSV. The first line must be the header.
    pub fn parse_csv(
        region_id: &str,
        model: &'static BasinModel,
        csv: &str,
    ) -> Result<Self, BasinError> {
        let invalid = |msg: String| {
            BasinError::Configuration(format!("grid [{}]: {}", region_id, msg))
        };

        let mut lines = csv.lines().filter(|l| !l.trim().is_empty());
        let header = lines.next().ok_or_else(|| invalid("file is empty".to_string()))?;

        let mut columns = [None; 4]; // lat, lon, z1p0, z2p5
        for (i, key) in header.split(',').map(str::trim).enumerate() {
            let slot = match key {
                "lat" => 0,
                "lon" => 1,
                "z1p0" => 2,
                "z2p5" => 3,
                other => return Err(invalid(format!("Key [{}] not supported", other))),
            };
            columns[slot] = Some(i);
        }
        let [Some(lat_col), Some(lon_col), Some(z1_col), Some(z2_col)] = columns else {
            return Err(invalid(
                "header must name lat, lon, z1p0 and z2p5".to_string(),
            ));
        };
        let width = header.split(',').count();

        // Helper to parse values that might be "null"
        let parse_field = |s: &str| -> Result<Option<f64>, ()> {
            let s = s.trim();
            if s.is_empty() || s.eq_ignore_ascii_case("null") {
                Ok(None)
            } else {
                s.parse().map(Some).map_err(|_| ())
            }
        };

        let mut records = HashMap::new();
        for (row, line) in lines.enumerate() {
            let fields: Vec<&str> = line.split(',').collect();
            if fields.len() != width {
                return Err(invalid(format!(
                    "row {} has {} fields, expected {}",
                    row + 1,
                    fields.len(),
                    width
                )));
            }
            let bad_row = |_| invalid(format!("row {} is malformed: {}", row + 1, line));

            let lat = parse_field(fields[lat_col]).map_err(bad_row)?;
            let lon = parse_field(fields[lon_col]).map_err(bad_row)?;
            let (Some(lat), Some(lon)) = (lat, lon) else {
                return Err(invalid(format!("row {} has no location", row + 1)));
            };
            let values = GridValues {
                z1p0: parse_field(fields[z1_col]).map_err(bad_row)?,
                z2p5: parse_field(fields[z2_col]).map_err(bad_row)?,
            };
            records.insert(node_key(lat, lon), values);
        }

        Ok(Self {
            region_id: region_id.to_string(),
            model,
            records,
        })
    }

    pub fn region_id(&self) -> &str {
        &self.region_id
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the attributes at the grid node nearest `coord`, if any.
    fn values_at(&self, coord: Coordinate) -> Option<RawAttributeSet> {
        let lat = round_to(coord.latitude(), BASIN_DATA_SPACING);
        let lon = round_to(coord.longitude(), BASIN_DATA_SPACING);
        let values = self.records.get(&node_key(lat, lon))?;

        let mut raw = RawAttributeSet::new();
        raw.insert(self.model.z1p0, values.z1p0);
        raw.insert(self.model.z2p5, values.z2p5);
        raw.insert(ATTR_LAT, Some(lat));
        raw.insert(ATTR_LON, Some(lon));
        Some(raw)
    }
}

// ============================================================================
// Client over every basin grid
// ============================================================================

/// Point-value client backed by the per-basin grid files.
#[derive(Debug, Clone)]
pub struct GridValueClient {
    source: String,
    grids: Vec<BasinGrid>,
}

impl GridValueClient {
    pub fn new(source: impl Into<String>, grids: Vec<BasinGrid>) -> Self {
        Self {
            source: source.into(),
            grids,
        }
    }

    /// Reads `{data_dir}/{region_id}.csv` for every region in the index.
    ///
    /// A missing or malformed file is a configuration error: the service
    /// must not start with a partial data set.
    pub fn load(data_dir: &Path, regions: &RegionIndex) -> Result<Self, BasinError> {
        let mut grids = Vec::with_capacity(regions.len());
        for region in regions {
            let path: PathBuf = data_dir.join(format!("{}.csv", region.id));
            let csv = std::fs::read_to_string(&path).map_err(|e| {
                BasinError::Configuration(format!(
                    "could not read grid file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            let grid = BasinGrid::parse_csv(&region.id, region.default_model, &csv)?;
            logging::info(
                Component::Grid,
                Some(&region.id),
                &format!("Loaded {} grid nodes from {}", grid.len(), path.display()),
            );
            grids.push(grid);
        }
        Ok(Self::new(format!("grid:{}", data_dir.display()), grids))
    }

    pub fn grids(&self) -> &[BasinGrid] {
        &self.grids
    }
}

impl PointValueClient for GridValueClient {
    fn name(&self) -> &str {
        "grid"
    }

    fn lookup(&self, coord: Coordinate) -> Result<RawAttributeSet, BasinError> {
        self.grids
            .iter()
            .find_map(|grid| grid.values_at(coord))
            .ok_or_else(|| BasinError::UpstreamEmpty {
                target: self.source.clone(),
                reason: format!("Location [{}] not found in any basin grid", coord),
            })
    }
}

// ============================================================================
// Tests
// ============================================================================
