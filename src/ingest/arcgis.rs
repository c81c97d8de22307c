//! ArcGIS basin identify service client.
//!
//! Retrieves raw basin depths for a single point from the USGS ArcGIS
//! `haz/basin` MapServer `identify` endpoint. Each result carries an
//! `attributes` object with one `z1p0<model>` / `z2p5<model>` pair per basin
//! model plus the `Vs30`, `Lat` and `Lon` of the grid cell that was hit.
//!
//! Attribute values come back as JSON numbers, numeric strings, JSON `null`
//! or the literal string `"Null"`; the last two both mean "no data".

use std::time::Duration;

use serde_json::Value;

use crate::ingest::PointValueClient;
use crate::logging::{self, Component};
use crate::model::{BasinError, Coordinate, RawAttributeSet};
use crate::models::{Z1P0_PREFIX, Z2P5_PREFIX};

pub const DEFAULT_ARCGIS_HOST: &str = "https://earthquake.usgs.gov";

const IDENTIFY_PATH: &str = "/arcgis/rest/services/haz/basin/MapServer/identify";

/// Ancillary attribute keys carried through alongside the model depths.
pub const ATTR_VS30: &str = "Vs30";
pub const ATTR_LAT: &str = "Lat";
pub const ATTR_LON: &str = "Lon";

// ============================================================================
// Response Structures
// ============================================================================

/// A single parsed result from the identify service.
#[derive(Debug, Clone, PartialEq)]
pub struct ArcGisResult {
    /// Every model depth key plus the ancillary keys, as returned upstream.
    pub attributes: RawAttributeSet,
    pub vs30: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

// ============================================================================
// URL Construction and Parsing
// ============================================================================

/// Builds the identify URL for a point geometry.
///
/// ArcGIS expects `geometry=<x>,<y>`, i.e. longitude first.
pub fn build_identify_url(host: &str, coord: Coordinate) -> String {
    format!(
        "{}{}?geometryType=esriGeometryPoint&geometry={},{}&tolerance=1&mapExtent=1&imageDisplay=1&f=json",
        host.trim_end_matches('/'),
        IDENTIFY_PATH,
        coord.longitude(),
        coord.latitude()
    )
}

/// Parses an identify response body. `target` is the URL, for error messages.
pub fn parse_identify_response(body: &str, target: &str) -> Result<ArcGisResult, BasinError> {
    let empty = |reason: String| BasinError::UpstreamEmpty {
        target: target.to_string(),
        reason,
    };

    let json: Value =
        serde_json::from_str(body).map_err(|e| empty(format!("Parse error: {}", e)))?;

    if let Some(message) = json
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
    {
        return Err(empty(format!("service error: {}", message)));
    }

    let first = json
        .get("results")
        .and_then(|r| r.as_array())
        .and_then(|r| r.first())
        .ok_or_else(|| empty("Empty results array".to_string()))?;

    let attributes_json = first
        .get("attributes")
        .and_then(|a| a.as_object())
        .ok_or_else(|| empty("result has no attributes".to_string()))?;

    let mut attributes = RawAttributeSet::new();
    for (key, value) in attributes_json {
        let wanted = key.contains(Z1P0_PREFIX)
            || key.contains(Z2P5_PREFIX)
            || key == ATTR_VS30
            || key == ATTR_LAT
            || key == ATTR_LON;
        if !wanted {
            continue;
        }
        let parsed = read_arc_value(value)
            .map_err(|raw| empty(format!("attribute [{}] is not numeric: {}", key, raw)))?;
        attributes.insert(key.clone(), parsed);
    }

    let ancillary = |key: &str| attributes.value(key).ok().flatten();
    let vs30 = ancillary(ATTR_VS30);
    let latitude = ancillary(ATTR_LAT);
    let longitude = ancillary(ATTR_LON);

    Ok(ArcGisResult {
        attributes,
        vs30,
        latitude,
        longitude,
    })
}

/// Reads one attribute value, mapping the service's null spellings to `None`.
fn read_arc_value(value: &Value) -> Result<Option<f64>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64().filter(|v| !v.is_nan())),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() || s.eq_ignore_ascii_case("null") {
                Ok(None)
            } else {
                s.parse::<f64>()
                    .map(|v| if v.is_nan() { None } else { Some(v) })
                    .map_err(|_| s.to_string())
            }
        }
        other => Err(other.to_string()),
    }
}

// ============================================================================
// API Client
// ============================================================================

/// Blocking client for the identify service.
///
/// `reqwest::blocking::Client` is reference-counted internally, so one
/// instance can serve concurrent requests from several threads.
pub struct ArcGisClient {
    client: reqwest::blocking::Client,
    host: String,
}

impl ArcGisClient {
    pub fn new(host: &str, timeout: Duration) -> Result<Self, BasinError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BasinError::Configuration(format!("could not build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, host))
    }

    pub fn with_client(client: reqwest::blocking::Client, host: &str) -> Self {
        Self {
            client,
            host: host.to_string(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Fetches and parses the identify result for a point.
    pub fn call_point_service(&self, coord: Coordinate) -> Result<ArcGisResult, BasinError> {
        let url = build_identify_url(&self.host, coord);
        logging::debug(Component::ArcGis, Some(&coord.to_string()), &url);

        let unavailable = |reason: String| BasinError::UpstreamUnavailable {
            target: url.clone(),
            reason,
        };

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .map_err(|e| unavailable(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(unavailable(format!("HTTP error: {}", response.status())));
        }

        let body = response
            .text()
            .map_err(|e| unavailable(format!("Failed to read response: {}", e)))?;

        parse_identify_response(&body, &url)
    }
}

impl PointValueClient for ArcGisClient {
    fn name(&self) -> &str {
        "arcgis"
    }

    fn lookup(&self, coord: Coordinate) -> Result<RawAttributeSet, BasinError> {
        self.call_point_service(coord).map(|result| result.attributes)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: &str = "https://example.test/identify";

    fn seattle() -> Coordinate {
        Coordinate::new(47.61, -122.33).unwrap()
    }

    /// Trimmed identify response for a point in the Puget Lowland.
    const SEATTLE_RESPONSE: &str = r#"{
        "results": [{
            "layerId": 0,
            "layerName": "basin",
            "attributes": {
                "OBJECTID": "1234",
                "Lat": "47.61",
                "Lon": "-122.33",
                "Vs30": 360.0,
                "z1p0Seattle": "Null",
                "z2p5Seattle": 2850.0,
                "z1p0bayarea": null,
                "z2p5bayarea": "Null",
                "z1p0cvms426m01": "Null",
                "z2p5cvms426m01": "Null"
            }
        }]
    }"#;

    #[test]
    fn test_identify_url_puts_longitude_first() {
        let url = build_identify_url("https://earthquake.usgs.gov/", seattle());
        assert_eq!(
            url,
            "https://earthquake.usgs.gov/arcgis/rest/services/haz/basin/MapServer/identify\
             ?geometryType=esriGeometryPoint&geometry=-122.33,47.61\
             &tolerance=1&mapExtent=1&imageDisplay=1&f=json"
        );
    }

    #[test]
    fn test_parse_response_keeps_model_and_ancillary_keys() {
        let result = parse_identify_response(SEATTLE_RESPONSE, TARGET).expect("should parse");

        assert_eq!(result.attributes.value("z2p5Seattle"), Ok(Some(2850.0)));
        assert_eq!(result.attributes.value("z1p0Seattle"), Ok(None));
        assert_eq!(result.attributes.value("z1p0bayarea"), Ok(None));
        assert!(!result.attributes.contains_key("OBJECTID"));

        assert_eq!(result.vs30, Some(360.0));
        assert_eq!(result.latitude, Some(47.61));
        assert_eq!(result.longitude, Some(-122.33));
    }

    #[test]
    fn test_parse_response_empty_results_is_upstream_empty() {
        let result = parse_identify_response(r#"{"results": []}"#, TARGET);
        match result {
            Err(BasinError::UpstreamEmpty { target, reason }) => {
                assert_eq!(target, TARGET);
                assert!(reason.contains("Empty results"), "reason: {}", reason);
            }
            other => panic!("expected UpstreamEmpty, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_response_missing_results_is_upstream_empty() {
        let result = parse_identify_response(r#"{"foo": 1}"#, TARGET);
        assert!(matches!(result, Err(BasinError::UpstreamEmpty { .. })));
    }

    #[test]
    fn test_parse_response_service_error_payload() {
        let body = r#"{"error": {"code": 400, "message": "Unable to complete operation."}}"#;
        let result = parse_identify_response(body, TARGET);
        assert!(matches!(result, Err(BasinError::UpstreamEmpty { .. })));
    }

    #[test]
    fn test_parse_response_garbage_body() {
        let result = parse_identify_response("<html>502 Bad Gateway</html>", TARGET);
        assert!(matches!(result, Err(BasinError::UpstreamEmpty { .. })));
    }

    #[test]
    fn test_non_numeric_depth_is_rejected() {
        let body = r#"{"results": [{"attributes": {"z2p5Seattle": "deep"}}]}"#;
        let result = parse_identify_response(body, TARGET);
        assert!(matches!(result, Err(BasinError::UpstreamEmpty { .. })));
    }

    #[test]
    fn test_read_arc_value_null_spellings() {
        assert_eq!(read_arc_value(&Value::Null), Ok(None));
        assert_eq!(read_arc_value(&Value::String("Null".into())), Ok(None));
        assert_eq!(read_arc_value(&Value::String("NULL".into())), Ok(None));
        assert_eq!(read_arc_value(&Value::String("".into())), Ok(None));
        assert_eq!(read_arc_value(&Value::String("NaN".into())), Ok(None));
        assert_eq!(read_arc_value(&serde_json::json!(1500)), Ok(Some(1500.0)));
        assert_eq!(read_arc_value(&Value::String(" 12.5 ".into())), Ok(Some(12.5)));
        assert!(read_arc_value(&serde_json::json!([1, 2])).is_err());
    }

    #[test]
    fn test_unreachable_host_is_upstream_unavailable() {
        // Port 9 (discard) on localhost is not expected to accept HTTP.
        let client = ArcGisClient::new("http://127.0.0.1:9", Duration::from_secs(2))
            .expect("client should build");
        let result = client.lookup(seattle());
        assert!(
            matches!(result, Err(BasinError::UpstreamUnavailable { .. })),
            "got {:?}",
            result
        );
    }

    #[test]
    #[ignore] // Don't run in CI - depends on external API
    fn arcgis_live_seattle_returns_seattle_model_keys() {
        let client = ArcGisClient::new(DEFAULT_ARCGIS_HOST, Duration::from_secs(30))
            .expect("client should build");
        let raw = client.lookup(seattle()).expect("live identify call should succeed");
        assert!(raw.contains_key("z2p5Seattle"), "keys: {:?}", raw);
        assert!(raw.contains_key("z1p0Seattle"), "keys: {:?}", raw);
    }
}
