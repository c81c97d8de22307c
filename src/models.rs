//! Basin model registry.
//!
//! Defines the canonical list of basin velocity models known to the upstream
//! point service, along with the two attribute keys each model publishes.
//! This is the single source of truth for model ids: all other modules
//! resolve models through [`BasinModel::from_id`] rather than hardcoding keys.

use crate::model::BasinError;

/// Prefix of the upstream attribute holding depth to Vs = 1.0 km/s.
pub const Z1P0_PREFIX: &str = "z1p0";

/// Prefix of the upstream attribute holding depth to Vs = 2.5 km/s.
pub const Z2P5_PREFIX: &str = "z2p5";

// ---------------------------------------------------------------------------
// Model metadata
// ---------------------------------------------------------------------------

/// A basin velocity model and the upstream keys carrying its values.
#[derive(Debug, PartialEq, Eq)]
pub struct BasinModel {
    /// Model id as published by the upstream service. Case-sensitive.
    pub id: &'static str,
    /// Attribute key for depth to the 1.0 km/s horizon (`"z1p0" + id`).
    pub z1p0: &'static str,
    /// Attribute key for depth to the 2.5 km/s horizon (`"z2p5" + id`).
    pub z2p5: &'static str,
}

macro_rules! basin_model {
    ($id:literal) => {
        BasinModel {
            id: $id,
            z1p0: concat!("z1p0", $id),
            z2p5: concat!("z2p5", $id),
        }
    };
}

/// All supported basin models.
///
/// Ids are legacy strings shared with the upstream service and are matched
/// exactly, so their mixed casing must be preserved.
pub static MODEL_REGISTRY: &[BasinModel] = &[
    basin_model!("bayarea"),
    basin_model!("cca06"),
    basin_model!("cvmh1510"),
    basin_model!("cvms4"),
    basin_model!("cvms426"),
    basin_model!("cvms426m01"),
    basin_model!("linthurber"),
    basin_model!("SchmandtLin"),
    basin_model!("Seattle"),
    basin_model!("SchenRitzwoller"),
    basin_model!("Wasatch"),
];

impl BasinModel {
    /// Looks up a model by id.
    ///
    /// Returns [`BasinError::InvalidModel`] if the id is not in
    /// [`MODEL_REGISTRY`].
    pub fn from_id(id: &str) -> Result<&'static BasinModel, BasinError> {
        MODEL_REGISTRY
            .iter()
            .find(|m| m.id == id)
            .ok_or_else(|| BasinError::InvalidModel(id.to_string()))
    }
}

/// Returns every model in registry order, for the usage document.
pub fn all_models() -> &'static [BasinModel] {
    MODEL_REGISTRY
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_prefix_plus_id() {
        for model in MODEL_REGISTRY {
            assert_eq!(model.z1p0, format!("{}{}", Z1P0_PREFIX, model.id));
            assert_eq!(model.z2p5, format!("{}{}", Z2P5_PREFIX, model.id));
        }
    }

    #[test]
    fn test_no_duplicate_model_ids() {
        let mut seen = std::collections::HashSet::new();
        for model in MODEL_REGISTRY {
            assert!(
                seen.insert(model.id),
                "duplicate model id '{}' found in MODEL_REGISTRY",
                model.id
            );
        }
    }

    #[test]
    fn test_from_id_returns_correct_entry() {
        let model = BasinModel::from_id("cvms426m01").expect("cvms426m01 should be in registry");
        assert_eq!(model.z1p0, "z1p0cvms426m01");
        assert_eq!(model.z2p5, "z2p5cvms426m01");
    }

    #[test]
    fn test_from_id_is_case_sensitive() {
        assert!(BasinModel::from_id("Seattle").is_ok());
        assert_eq!(
            BasinModel::from_id("seattle"),
            Err(BasinError::InvalidModel("seattle".to_string()))
        );
        assert!(BasinModel::from_id("BAYAREA").is_err());
    }

    #[test]
    fn test_from_id_rejects_unknown_and_empty() {
        assert!(BasinModel::from_id("portland").is_err());
        assert!(BasinModel::from_id("").is_err());
    }

    #[test]
    fn test_registry_contains_region_defaults() {
        for id in ["bayarea", "cvms426m01", "Seattle", "Wasatch"] {
            assert!(
                BasinModel::from_id(id).is_ok(),
                "MODEL_REGISTRY missing default model '{}'",
                id
            );
        }
        assert_eq!(all_models().len(), 11);
    }
}
