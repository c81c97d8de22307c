//! Core data types for the basin term service.
//!
//! This module defines the shared domain model imported by all other modules:
//! coordinates, raw upstream attributes, derived basin terms and the crate
//! error type. It performs no I/O.

use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Coordinates
// ---------------------------------------------------------------------------

/// Precision, in degrees, that every coordinate is rounded to before lookup.
pub const COORDINATE_PRECISION: f64 = 0.01;

/// A WGS84 point, in degrees.
///
/// Construction through [`Coordinate::new`] guarantees the latitude lies in
/// [-90, 90] and the longitude in [-180, 180].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, BasinError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(BasinError::InvalidCoordinate(format!(
                "latitude [{}] must be within [-90, 90]",
                latitude
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(BasinError::InvalidCoordinate(format!(
                "longitude [{}] must be within [-180, 180]",
                longitude
            )));
        }
        Ok(Self { latitude, longitude })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Returns this coordinate rounded to [`COORDINATE_PRECISION`].
    ///
    /// Rounding an already-rounded coordinate returns it unchanged, so the
    /// resolver can normalize freely.
    pub fn rounded(&self) -> Self {
        Self {
            latitude: round_to(self.latitude, COORDINATE_PRECISION),
            longitude: round_to(self.longitude, COORDINATE_PRECISION),
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.latitude, self.longitude)
    }
}

/// Rounds `value` to the nearest multiple of `spacing`.
///
/// The result is produced by dividing by the reciprocal so that values such
/// as 47.61 come back as the shortest decimal representation rather than
/// 47.610000000000006.
pub fn round_to(value: f64, spacing: f64) -> f64 {
    let scale = (1.0 / spacing).round();
    (value * scale).round() / scale
}

// ---------------------------------------------------------------------------
// Upstream attributes
// ---------------------------------------------------------------------------

/// Raw attribute values returned by a point-value lookup for one coordinate.
///
/// A key may be present with no value (`None`), which means the upstream
/// source has no data for that model at this point. That is different from
/// the key being absent altogether, which is reported as
/// [`BasinError::MissingAttribute`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawAttributeSet {
    values: BTreeMap<String, Option<f64>>,
}

impl RawAttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Option<f64>) {
        self.values.insert(key.into(), value);
    }

    /// Looks up a value that must be present (possibly as an explicit null).
    pub fn value(&self, key: &str) -> Result<Option<f64>, BasinError> {
        self.values
            .get(key)
            .copied()
            .ok_or_else(|| BasinError::MissingAttribute {
                key: key.to_string(),
            })
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<f64>)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, Option<f64>)> for RawAttributeSet {
    fn from_iter<I: IntoIterator<Item = (String, Option<f64>)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Basin terms
// ---------------------------------------------------------------------------

/// One derived basin term, labeled with the upstream key it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct BasinTerm {
    pub model: String,
    /// Depth in kilometers; `None` when not computable at this point.
    pub value: Option<f64>,
}

impl BasinTerm {
    /// The term reported for coordinates outside every basin region.
    pub fn null() -> Self {
        Self {
            model: String::new(),
            value: None,
        }
    }
}

/// Both basin terms for a single request.
#[derive(Debug, Clone, PartialEq)]
pub struct BasinTerms {
    /// Depth to the 1.0 km/s shear-wave velocity horizon.
    pub z1p0: BasinTerm,
    /// Depth to the 2.5 km/s shear-wave velocity horizon.
    pub z2p5: BasinTerm,
}

impl BasinTerms {
    pub fn null() -> Self {
        Self {
            z1p0: BasinTerm::null(),
            z2p5: BasinTerm::null(),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Broad category of a [`BasinError`], used to pick exit codes and log levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The caller supplied something unusable; correctable by the caller.
    Validation,
    /// The upstream point-value source failed.
    Dependency,
    /// Static configuration could not be loaded; fatal at startup.
    Configuration,
}

/// Errors that can arise while resolving basin terms.
#[derive(Debug, Clone, PartialEq)]
pub enum BasinError {
    /// Latitude or longitude missing, unparseable or out of range.
    InvalidCoordinate(String),
    /// The requested basin model id is not in the model table.
    InvalidModel(String),
    /// The upstream service could not be reached or answered with a
    /// non-success status.
    UpstreamUnavailable { target: String, reason: String },
    /// The upstream service answered but had no usable record for the point.
    UpstreamEmpty { target: String, reason: String },
    /// The upstream record lacks an attribute the selected model needs.
    MissingAttribute { key: String },
    /// Region or model configuration failed to load.
    Configuration(String),
}

impl BasinError {
    pub fn class(&self) -> ErrorClass {
        match self {
            BasinError::InvalidCoordinate(_) | BasinError::InvalidModel(_) => {
                ErrorClass::Validation
            }
            BasinError::UpstreamUnavailable { .. }
            | BasinError::UpstreamEmpty { .. }
            | BasinError::MissingAttribute { .. } => ErrorClass::Dependency,
            BasinError::Configuration(_) => ErrorClass::Configuration,
        }
    }
}

impl fmt::Display for BasinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BasinError::InvalidCoordinate(msg) => write!(f, "Invalid coordinate: {}", msg),
            BasinError::InvalidModel(id) => write!(f, "Basin model [{}] does not exist", id),
            BasinError::UpstreamUnavailable { target, reason } => {
                write!(f, "Could not reach: {} ({})", target, reason)
            }
            BasinError::UpstreamEmpty { target, reason } => {
                write!(f, "No data returned from: {} ({})", target, reason)
            }
            BasinError::MissingAttribute { key } => {
                write!(f, "Could not get [{}] from the upstream point service", key)
            }
            BasinError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for BasinError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
