//! Point-value sources for raw basin depths.
//!
//! The resolver never talks to a data source directly; it goes through the
//! [`PointValueClient`] trait so that the live ArcGIS service, the offline
//! grid files and test doubles are interchangeable.
//!
//! Submodules:
//! - `arcgis` - blocking client for the ArcGIS basin identify service.
//! - `grid`   - per-basin CSV grids read from disk.

pub mod arcgis;
pub mod grid;

use crate::model::{BasinError, Coordinate, RawAttributeSet};

/// A source of raw upstream attributes for a single point.
///
/// Implementations receive a coordinate already rounded to
/// `model::COORDINATE_PRECISION` and must not retry. Connectivity failures
/// are reported as [`BasinError::UpstreamUnavailable`], and a response
/// without a usable record as [`BasinError::UpstreamEmpty`].
pub trait PointValueClient {
    /// Short name used in log entries.
    fn name(&self) -> &str;

    fn lookup(&self, coord: Coordinate) -> Result<RawAttributeSet, BasinError>;
}

impl<T: PointValueClient + ?Sized> PointValueClient for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn lookup(&self, coord: Coordinate) -> Result<RawAttributeSet, BasinError> {
        (**self).lookup(coord)
    }
}

impl<T: PointValueClient + ?Sized> PointValueClient for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn lookup(&self, coord: Coordinate) -> Result<RawAttributeSet, BasinError> {
        (**self).lookup(coord)
    }
}
