//! JSON payloads for the basin term service.
//!
//! Every payload is built field by field with `serde_json::json!`, so the
//! wire shape is visible here rather than implied by derives on the domain
//! types. Functions that stamp a date take `now` as a parameter, which keeps
//! tests deterministic without mocking the clock.

use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use crate::model::BasinError;
use crate::models::all_models;
use crate::regions::{BasinRegion, RegionIndex};
use crate::resolver::Resolution;

pub const SERVICE_NAME: &str = "Basin Term Service";
pub const SERVICE_DESCRIPTION: &str = "Get basin terms";
pub const SERVICE_PATH: &str = "/nshmp-site-ws/basin";

/// Status tag carried by every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Error,
    Usage,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::Error => "error",
            Status::Usage => "usage",
        }
    }
}

// ---------------------------------------------------------------------------
// Request echo
// ---------------------------------------------------------------------------

/// Formats a request as the service query it corresponds to, for echoing
/// back in success and error payloads.
pub fn request_url(latitude: impl Display, longitude: impl Display, model: Option<&str>) -> String {
    let mut url = format!("{}?latitude={}&longitude={}", SERVICE_PATH, latitude, longitude);
    if let Some(model) = model {
        url.push_str("&model=");
        url.push_str(model);
    }
    url
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Success payload for a resolved query.
///
/// Outside every region, `request.region` and `request.model` are null and
/// both terms are `{model: "", value: null}`.
pub fn success(resolution: &Resolution<'_>, url: &str, now: DateTime<Utc>) -> Value {
    let region = resolution
        .region
        .map(|r| json!({ "title": r.title, "id": r.id }))
        .unwrap_or(Value::Null);
    let model = resolution.model.map(|m| m.id);
    let terms = &resolution.terms;

    json!({
        "status": Status::Success.as_str(),
        "name": SERVICE_NAME,
        "date": now.to_rfc3339(),
        "url": url,
        "request": {
            "latitude": resolution.coordinate.latitude(),
            "longitude": resolution.coordinate.longitude(),
            "region": region,
            "model": model,
        },
        "response": {
            "z1p0": { "model": terms.z1p0.model, "value": terms.z1p0.value },
            "z2p5": { "model": terms.z2p5.model, "value": terms.z2p5.value },
        },
    })
}

/// Error payload echoing the original request.
pub fn error(request: &str, err: &BasinError) -> Value {
    json!({
        "status": Status::Error.as_str(),
        "request": request,
        "message": err.to_string(),
    })
}

/// Usage document listing every model and region.
///
/// `base_url` is this service's public origin; an empty string gives
/// host-relative links.
pub fn usage(regions: &RegionIndex, base_url: &str) -> Value {
    let base = format!("{}{}", base_url.trim_end_matches('/'), SERVICE_PATH);
    let models: Vec<Value> = all_models()
        .iter()
        .map(|m| json!({ "id": m.id, "z1p0": m.z1p0, "z2p5": m.z2p5 }))
        .collect();
    let basin_regions: Vec<Value> = regions
        .iter()
        .map(|r| {
            json!({
                "title": r.title,
                "id": r.id,
                "defaultModel": r.default_model.id,
            })
        })
        .collect();

    json!({
        "status": Status::Usage.as_str(),
        "name": SERVICE_NAME,
        "description": SERVICE_DESCRIPTION,
        "usage": base,
        "geojson": format!("{}/geojson", base),
        "syntax": format!("{}?latitude={{latitude}}&longitude={{longitude}}&model={{basinModel}}", base),
        "basinModels": {
            "label": "Basin models",
            "values": models,
        },
        "basinRegions": basin_regions,
    })
}

/// GeoJSON feature collection of every region, in load order.
pub fn feature_collection(regions: &RegionIndex) -> Value {
    let features: Vec<Value> = regions.iter().map(region_feature).collect();
    json!({
        "type": "FeatureCollection",
        "properties": { "title": "Basin Regions" },
        "features": features,
    })
}

fn region_feature(region: &BasinRegion) -> Value {
    // GeoJSON rings are explicitly closed and positions are [lon, lat].
    let mut ring: Vec<Value> = region
        .boundary()
        .iter()
        .map(|c| json!([c.longitude(), c.latitude()]))
        .collect();
    if let Some(first) = ring.first().cloned() {
        ring.push(first);
    }

    json!({
        "type": "Feature",
        "id": region.id,
        "properties": {
            "title": region.title,
            "id": region.id,
            "defaultModel": region.default_model.id,
        },
        "geometry": {
            "type": "Polygon",
            "coordinates": [ring],
        },
    })
}

/// Pretty-prints a payload for output.
pub fn to_pretty_string(payload: &Value) -> String {
    serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
