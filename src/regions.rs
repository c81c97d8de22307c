//! Basin region index.
//!
//! Holds the predefined basin regions loaded from a GeoJSON feature
//! collection, each with a default [`BasinModel`], and answers "which region
//! contains this coordinate?". The index is built once at startup and is
//! read-only afterwards, so a single instance can be shared by reference
//! across any number of concurrent requests.
//!
//! Each feature must be a `Polygon` whose properties carry:
//!   - `title`        - human-readable name, e.g. "Puget Lowland"
//!   - `id`           - stable identifier, e.g. "pugetLowland"
//!   - `defaultModel` - one of the ids in `models::MODEL_REGISTRY`

use std::path::Path;

use serde_json::Value;

use crate::logging::{self, Component};
use crate::model::{BasinError, Coordinate};
use crate::models::BasinModel;

/// Reference region configuration compiled into the binary.
pub const BUNDLED_BASINS: &str = include_str!("../data/basins.geojson");

/// Id of the Puget Lowland region, which derives z1p0 from z2p5.
pub const PUGET_LOWLAND_ID: &str = "pugetLowland";

/// Tolerance, in degrees, for treating a point as lying on a boundary edge.
const EDGE_TOLERANCE: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Region metadata
// ---------------------------------------------------------------------------

/// A predefined basin region.
#[derive(Debug, Clone, PartialEq)]
pub struct BasinRegion {
    pub title: String,
    pub id: String,
    pub default_model: &'static BasinModel,
    /// Outer ring, without the repeated closing vertex.
    boundary: Vec<Coordinate>,
}

impl BasinRegion {
    /// Builds a region from an explicit boundary ring.
    ///
    /// A trailing vertex equal to the first is dropped; the ring is always
    /// treated as closed. Fails if fewer than three vertices remain.
    pub fn new(
        title: impl Into<String>,
        id: impl Into<String>,
        default_model: &'static BasinModel,
        mut boundary: Vec<Coordinate>,
    ) -> Result<Self, BasinError> {
        let id = id.into();
        if boundary.len() > 1 && boundary.first() == boundary.last() {
            boundary.pop();
        }
        if boundary.len() < 3 {
            return Err(BasinError::Configuration(format!(
                "region [{}] boundary needs at least 3 vertices, got {}",
                id,
                boundary.len()
            )));
        }
        Ok(Self {
            title: title.into(),
            id,
            default_model,
            boundary,
        })
    }

    pub fn boundary(&self) -> &[Coordinate] {
        &self.boundary
    }

    /// Boundary-inclusive point-in-polygon test.
    pub fn contains(&self, coord: Coordinate) -> bool {
        point_in_ring(coord.longitude(), coord.latitude(), &self.boundary)
    }
}

/// Returns true if (x, y) lies inside or on the ring.
///
/// Edges are checked first so that points exactly on the boundary are
/// always contained; the interior test is standard ray casting with the ring
/// implicitly closed (last vertex connects back to first). x is longitude
/// and y is latitude.
fn point_in_ring(px: f64, py: f64, ring: &[Coordinate]) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = (ring[i].longitude(), ring[i].latitude());
        let (xj, yj) = (ring[j].longitude(), ring[j].latitude());

        if on_segment(px, py, xi, yi, xj, yj) {
            return true;
        }

        // Check if the ray from (px, py) going right crosses edge (i, j).
        if ((yi > py) != (yj > py)) && (px < (xj - xi) * (py - yi) / (yj - yi) + xi) {
            inside = !inside;
        }
        j = i;
    }
    inside
}

fn on_segment(px: f64, py: f64, ax: f64, ay: f64, bx: f64, by: f64) -> bool {
    let cross = (bx - ax) * (py - ay) - (by - ay) * (px - ax);
    let length = ((bx - ax).powi(2) + (by - ay).powi(2)).sqrt();
    if cross.abs() > EDGE_TOLERANCE * length.max(1.0) {
        return false;
    }
    px >= ax.min(bx) - EDGE_TOLERANCE
        && px <= ax.max(bx) + EDGE_TOLERANCE
        && py >= ay.min(by) - EDGE_TOLERANCE
        && py <= ay.max(by) + EDGE_TOLERANCE
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

/// Ordered collection of basin regions. The first containing region wins.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionIndex {
    regions: Vec<BasinRegion>,
}

impl RegionIndex {
    /// Builds an index from explicit regions, in priority order.
    pub fn new(regions: Vec<BasinRegion>) -> Result<Self, BasinError> {
        if regions.is_empty() {
            return Err(BasinError::Configuration(
                "region configuration contains no regions".to_string(),
            ));
        }
        for (i, region) in regions.iter().enumerate() {
            if regions[..i].iter().any(|r| r.id == region.id) {
                return Err(BasinError::Configuration(format!(
                    "duplicate region id [{}]",
                    region.id
                )));
            }
        }
        Ok(Self { regions })
    }

    /// Parses a GeoJSON feature collection of basin regions.
    pub fn load(geojson: &str) -> Result<Self, BasinError> {
        let json: Value = serde_json::from_str(geojson)
            .map_err(|e| BasinError::Configuration(format!("region GeoJSON parse error: {}", e)))?;

        let features = json
            .get("features")
            .and_then(|f| f.as_array())
            .ok_or_else(|| {
                BasinError::Configuration("region GeoJSON has no 'features' array".to_string())
            })?;

        let regions = features
            .iter()
            .enumerate()
            .map(|(i, feature)| parse_feature(i, feature))
            .collect::<Result<Vec<_>, _>>()?;

        let index = Self::new(regions)?;
        logging::info(
            Component::Regions,
            None,
            &format!("Loaded {} basin regions", index.len()),
        );
        Ok(index)
    }

    /// Reads and parses a GeoJSON file.
    pub fn from_path(path: &Path) -> Result<Self, BasinError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            BasinError::Configuration(format!(
                "could not read region file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::load(&contents)
    }

    /// Loads the reference configuration compiled into the crate.
    pub fn bundled() -> Result<Self, BasinError> {
        Self::load(BUNDLED_BASINS)
    }

    /// Returns the first region, in load order, containing `coord`.
    pub fn find_region(&self, coord: Coordinate) -> Option<&BasinRegion> {
        self.regions.iter().find(|r| r.contains(coord))
    }

    pub fn find_by_id(&self, id: &str) -> Option<&BasinRegion> {
        self.regions.iter().find(|r| r.id == id)
    }

    pub fn all_regions(&self) -> &[BasinRegion] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BasinRegion> {
        self.regions.iter()
    }
}

impl<'a> IntoIterator for &'a RegionIndex {
    type Item = &'a BasinRegion;
    type IntoIter = std::slice::Iter<'a, BasinRegion>;

    fn into_iter(self) -> Self::IntoIter {
        self.regions.iter()
    }
}

// ---------------------------------------------------------------------------
// GeoJSON decoding
// ---------------------------------------------------------------------------

fn parse_feature(index: usize, feature: &Value) -> Result<BasinRegion, BasinError> {
    let properties = feature.get("properties").ok_or_else(|| {
        BasinError::Configuration(format!("feature {} has no properties", index))
    })?;

    let title = read_property(properties, index, "title")?;
    let id = read_property(properties, index, "id")?;
    let model_id = read_property(properties, index, "defaultModel")?;
    let default_model = BasinModel::from_id(model_id).map_err(|_| {
        BasinError::Configuration(format!(
            "region [{}] references unknown default model [{}]",
            id, model_id
        ))
    })?;

    let geometry = feature.get("geometry").ok_or_else(|| {
        BasinError::Configuration(format!("region [{}] has no geometry", id))
    })?;
    match geometry.get("type").and_then(|t| t.as_str()) {
        Some("Polygon") => {}
        other => {
            return Err(BasinError::Configuration(format!(
                "region [{}] geometry must be a Polygon, got {:?}",
                id, other
            )));
        }
    }

    // Only the outer ring is used; basin regions have no holes.
    let ring = geometry
        .get("coordinates")
        .and_then(|c| c.as_array())
        .and_then(|rings| rings.first())
        .and_then(|r| r.as_array())
        .ok_or_else(|| {
            BasinError::Configuration(format!("region [{}] polygon has no outer ring", id))
        })?;

    let boundary = ring
        .iter()
        .map(|position| parse_position(id, position))
        .collect::<Result<Vec<_>, _>>()?;

    BasinRegion::new(title, id, default_model, boundary)
}

fn read_property<'a>(properties: &'a Value, index: usize, key: &str) -> Result<&'a str, BasinError> {
    properties
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            BasinError::Configuration(format!(
                "feature {} is missing string property '{}'",
                index, key
            ))
        })
}

/// GeoJSON positions are `[longitude, latitude]`.
fn parse_position(region_id: &str, position: &Value) -> Result<Coordinate, BasinError> {
    let pair = position.as_array().filter(|p| p.len() >= 2);
    let lon = pair.and_then(|p| p[0].as_f64());
    let lat = pair.and_then(|p| p[1].as_f64());
    match (lat, lon) {
        (Some(lat), Some(lon)) => Coordinate::new(lat, lon).map_err(|e| {
            BasinError::Configuration(format!("region [{}] vertex invalid: {}", region_id, e))
        }),
        _ => Err(BasinError::Configuration(format!(
            "region [{}] has a malformed position: {}",
            region_id, position
        ))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
