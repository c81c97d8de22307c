//! Basin term resolution.
//!
//! Turns a query coordinate into the two basin terms:
//!
//!   1. round the coordinate to 0.01°
//!   2. find the containing basin region (none → null terms, no upstream call)
//!   3. pick the explicit model or the region default
//!   4. fetch raw attributes from the point-value client
//!   5. convert meters to kilometers, and in the Puget Lowland replace z1p0
//!      with the regression on z2p5
//!
//! The resolver holds no mutable state; one instance can serve concurrent
//! requests as long as its client can.

use crate::ingest::PointValueClient;
use crate::logging::{self, Component};
use crate::model::{BasinError, BasinTerm, BasinTerms, Coordinate};
use crate::models::BasinModel;
use crate::regions::{BasinRegion, PUGET_LOWLAND_ID, RegionIndex};

/// Upstream depths are in meters; basin terms are published in kilometers.
pub const METERS_PER_KILOMETER: f64 = 1000.0;

// ---------------------------------------------------------------------------
// Request / result types
// ---------------------------------------------------------------------------

/// A single basin term request.
#[derive(Debug, Clone, PartialEq)]
pub struct BasinQuery {
    pub coordinate: Coordinate,
    /// Explicit model id overriding the region default.
    pub model: Option<String>,
}

impl BasinQuery {
    pub fn new(latitude: f64, longitude: f64, model: Option<&str>) -> Result<Self, BasinError> {
        Ok(Self {
            coordinate: Coordinate::new(latitude, longitude)?,
            model: model.map(String::from),
        })
    }
}

/// Outcome of resolving one query.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<'a> {
    /// The query coordinate after rounding.
    pub coordinate: Coordinate,
    pub region: Option<&'a BasinRegion>,
    /// `None` exactly when `region` is `None`.
    pub model: Option<&'static BasinModel>,
    pub terms: BasinTerms,
}

// ---------------------------------------------------------------------------
// Derivation rules
// ---------------------------------------------------------------------------

/// Converts a raw upstream depth in meters to kilometers. Null stays null.
pub fn meters_to_kilometers(value: Option<f64>) -> Option<f64> {
    value.map(|m| m / METERS_PER_KILOMETER)
}

/// Puget Lowland z1p0 proxy from z2p5 (both in kilometers).
///
/// Equal-weight blend of two linear fits of z1p0 on z2p5. The upstream z1p0
/// for this basin is unreliable, so it is never used directly.
pub fn puget_lowland_z1p0(z2p5_km: f64) -> f64 {
    0.5 * (0.1146 * z2p5_km + 0.2826) + 0.5 * (0.0933 * z2p5_km + 0.1444)
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

pub struct BasinTermResolver<'a, C> {
    regions: &'a RegionIndex,
    client: C,
}

impl<'a, C: PointValueClient> BasinTermResolver<'a, C> {
    pub fn new(regions: &'a RegionIndex, client: C) -> Self {
        Self { regions, client }
    }

    pub fn regions(&self) -> &'a RegionIndex {
        self.regions
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn resolve(&self, query: &BasinQuery) -> Result<Resolution<'a>, BasinError> {
        let coordinate = query.coordinate.rounded();
        let context = coordinate.to_string();

        let Some(region) = self.regions.find_region(coordinate) else {
            logging::debug(Component::Resolver, Some(&context), "outside all basin regions");
            return Ok(Resolution {
                coordinate,
                region: None,
                model: None,
                terms: BasinTerms::null(),
            });
        };

        let model = match query.model.as_deref() {
            Some(id) => BasinModel::from_id(id)?,
            None => region.default_model,
        };

        let log_failure = |e: &BasinError| {
            logging::log_upstream_failure(Component::Resolver, &context, self.client.name(), e)
        };

        let raw = self.client.lookup(coordinate).inspect_err(log_failure)?;
        let attribute = |key: &str| raw.value(key).inspect_err(log_failure);

        let z2p5 = meters_to_kilometers(attribute(model.z2p5)?);
        let z1p0 = if region.id == PUGET_LOWLAND_ID {
            z2p5.map(puget_lowland_z1p0)
        } else {
            meters_to_kilometers(attribute(model.z1p0)?)
        };

        logging::debug(
            Component::Resolver,
            Some(&context),
            &format!(
                "region={} model={} z1p0={:?} z2p5={:?}",
                region.id, model.id, z1p0, z2p5
            ),
        );

        Ok(Resolution {
            coordinate,
            region: Some(region),
            model: Some(model),
            terms: BasinTerms {
                z1p0: BasinTerm {
                    model: model.z1p0.to_string(),
                    value: z1p0,
                },
                z2p5: BasinTerm {
                    model: model.z2p5.to_string(),
                    value: z2p5,
                },
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawAttributeSet;
    use std::cell::Cell;

    /// Returns a fixed attribute set and counts calls.
    struct FixedClient {
        raw: RawAttributeSet,
        calls: Cell<usize>,
    }

    impl FixedClient {
        fn new(pairs: &[(&str, Option<f64>)]) -> Self {
            Self {
                raw: pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
                calls: Cell::new(0),
            }
        }
    }

    impl PointValueClient for FixedClient {
        fn name(&self) -> &str {
            "fixed"
        }

        fn lookup(&self, _coord: Coordinate) -> Result<RawAttributeSet, BasinError> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.raw.clone())
        }
    }

    fn regions() -> RegionIndex {
        RegionIndex::bundled().unwrap()
    }

    // --- Derivation rules -------------------------------------------------

    #[test]
    fn test_puget_regression_at_1000() {
        let expected = 0.5 * 114.8826 + 0.5 * 93.4444;
        assert!((puget_lowland_z1p0(1000.0) - expected).abs() < 1e-9);
        assert!((puget_lowland_z1p0(1000.0) - 104.1635).abs() < 1e-9);
    }

    #[test]
    fn test_puget_regression_at_2km() {
        assert!((puget_lowland_z1p0(2.0) - 0.4214).abs() < 1e-9);
    }

    #[test]
    fn test_unit_conversion() {
        assert_eq!(meters_to_kilometers(Some(1500.0)), Some(1.5));
        assert_eq!(meters_to_kilometers(None), None);
    }

    // --- Model selection --------------------------------------------------

    #[test]
    fn test_default_model_used_without_override() {
        let regions = regions();
        let client = FixedClient::new(&[
            ("z1p0cvms426m01", Some(1500.0)),
            ("z2p5cvms426m01", Some(4200.0)),
        ]);
        let resolver = BasinTermResolver::new(&regions, &client);

        let res = resolver.resolve(&BasinQuery::new(34.05, -118.25, None).unwrap()).unwrap();
        assert_eq!(res.model.map(|m| m.id), Some("cvms426m01"));
        assert_eq!(res.terms.z1p0.value, Some(1.5));
        assert_eq!(res.terms.z2p5.value, Some(4.2));
    }

    #[test]
    fn test_explicit_model_overrides_default() {
        let regions = regions();
        let client = FixedClient::new(&[("z1p0cvmh1510", Some(300.0)), ("z2p5cvmh1510", Some(2000.0))]);
        let resolver = BasinTermResolver::new(&regions, &client);

        let query = BasinQuery::new(34.05, -118.25, Some("cvmh1510")).unwrap();
        let res = resolver.resolve(&query).unwrap();
        assert_eq!(res.model.map(|m| m.id), Some("cvmh1510"));
        assert_eq!(res.terms.z1p0.model, "z1p0cvmh1510");
        assert_eq!(res.terms.z1p0.value, Some(0.3));
    }

    #[test]
    fn test_unknown_model_never_reaches_client() {
        let regions = regions();
        let client = FixedClient::new(&[]);
        let resolver = BasinTermResolver::new(&regions, &client);

        let query = BasinQuery::new(47.61, -122.33, Some("Portland")).unwrap();
        assert_eq!(
            resolver.resolve(&query),
            Err(BasinError::InvalidModel("Portland".to_string()))
        );
        assert_eq!(client.calls.get(), 0);
    }

    // --- Null handling ----------------------------------------------------

    #[test]
    fn test_null_values_propagate_with_labels() {
        let regions = regions();
        let client = FixedClient::new(&[("z1p0bayarea", None), ("z2p5bayarea", None)]);
        let resolver = BasinTermResolver::new(&regions, &client);

        let res = resolver.resolve(&BasinQuery::new(37.77, -122.42, None).unwrap()).unwrap();
        assert_eq!(res.terms.z1p0, BasinTerm { model: "z1p0bayarea".into(), value: None });
        assert_eq!(res.terms.z2p5, BasinTerm { model: "z2p5bayarea".into(), value: None });
    }

    #[test]
    fn test_puget_null_z2p5_gives_null_z1p0() {
        let regions = regions();
        let client = FixedClient::new(&[("z1p0Seattle", Some(500.0)), ("z2p5Seattle", None)]);
        let resolver = BasinTermResolver::new(&regions, &client);

        let res = resolver.resolve(&BasinQuery::new(47.61, -122.33, None).unwrap()).unwrap();
        assert_eq!(res.terms.z1p0.value, None, "z1p0 must not be computed from a missing z2p5");
        assert_eq!(res.terms.z1p0.model, "z1p0Seattle");
    }

    #[test]
    fn test_puget_does_not_need_raw_z1p0() {
        let regions = regions();
        let client = FixedClient::new(&[("z2p5Seattle", Some(1000.0))]);
        let resolver = BasinTermResolver::new(&regions, &client);

        let res = resolver.resolve(&BasinQuery::new(47.61, -122.33, None).unwrap()).unwrap();
        let z1p0 = res.terms.z1p0.value.expect("z1p0 should be derived");
        assert!((z1p0 - puget_lowland_z1p0(1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_absent_key_is_missing_attribute() {
        let regions = regions();
        let client = FixedClient::new(&[("z2p5Wasatch", Some(900.0))]);
        let resolver = BasinTermResolver::new(&regions, &client);

        let result = resolver.resolve(&BasinQuery::new(40.76, -111.89, None).unwrap());
        assert_eq!(
            result,
            Err(BasinError::MissingAttribute { key: "z1p0Wasatch".to_string() })
        );
    }

    #[test]
    fn test_absent_key_is_logged_as_unexpected_upstream_failure() {
        let regions = regions();
        let client = FixedClient::new(&[("z1p0Seattle", Some(400.0))]);
        let resolver = BasinTermResolver::new(&regions, &client);

        let err = resolver
            .resolve(&BasinQuery::new(47.61, -122.33, None).unwrap())
            .unwrap_err();
        assert_eq!(err, BasinError::MissingAttribute { key: "z2p5Seattle".to_string() });
        assert_eq!(
            logging::classify_upstream_failure(&err.to_string()),
            logging::FailureType::Unexpected,
            "a missing upstream key signals a schema change"
        );
        assert_eq!(client.calls.get(), 1);
    }

    #[test]
    fn test_outside_regions_is_null_and_skips_client() {
        let regions = regions();
        let client = FixedClient::new(&[]);
        let resolver = BasinTermResolver::new(&regions, &client);

        let res = resolver.resolve(&BasinQuery::new(40.83, -115.76, None).unwrap()).unwrap();
        assert!(res.region.is_none());
        assert!(res.model.is_none());
        assert_eq!(res.terms, BasinTerms::null());
        assert_eq!(client.calls.get(), 0);
    }

    #[test]
    fn test_coordinate_is_rounded_before_lookup() {
        let regions = regions();
        let client = FixedClient::new(&[("z1p0Wasatch", Some(1.0)), ("z2p5Wasatch", Some(2.0))]);
        let resolver = BasinTermResolver::new(&regions, &client);

        let res = resolver.resolve(&BasinQuery::new(40.7608, -111.8910, None).unwrap()).unwrap();
        assert_eq!(res.coordinate, Coordinate::new(40.76, -111.89).unwrap());
    }
}
