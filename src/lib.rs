//! Basin term service.
//!
//! Resolves a latitude/longitude to one of the predefined sedimentary basin
//! regions, selects a basin velocity model, fetches raw depths for the point
//! and publishes the z1p0 / z2p5 basin terms used in seismic hazard
//! calculations.
//!
//! Modules:
//! - `model`    - coordinates, raw attributes, basin terms, errors
//! - `models`   - basin velocity model registry
//! - `regions`  - GeoJSON-loaded basin region index
//! - `ingest`   - point-value clients (ArcGIS service, offline grids)
//! - `resolver` - region → model → fetch → derived terms
//! - `response` - JSON payloads
//! - `config`   - TOML configuration
//! - `logging`  - structured console/file logging

pub mod config;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod models;
pub mod regions;
pub mod resolver;
pub mod response;

pub use ingest::PointValueClient;
pub use model::{BasinError, BasinTerm, BasinTerms, Coordinate, ErrorClass, RawAttributeSet};
pub use models::BasinModel;
pub use regions::{BasinRegion, RegionIndex};
pub use resolver::{BasinQuery, BasinTermResolver, Resolution};
