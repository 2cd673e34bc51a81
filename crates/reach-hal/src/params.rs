//! Parameter store adapter – read-only calibration lookup.
//!
//! Parameters live in a TOML document whose nested tables are addressed by
//! `/`-separated paths, e.g. `/amigo/skills/arm/offset/left`.
//!
//! # Arm parameters
//!
//! | Path (under `/<robot>/skills/arm/`) | Content | Required |
//! |---|---|---|
//! | `offset/<side>` | table `x y z roll pitch yaw` | yes |
//! | `joint_names` | list of joint names, suffixed with `_<side>` on load | yes |
//! | `default_configurations` | table name → list of joint positions | yes |
//! | `default_trajectories` | table name → list of waypoints | yes |
//! | `offset/marker_to_grippoint` | table `x y z roll pitch yaw` | no |

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use reach_types::{ArmError, ArmSide, CalibrationOffset, Pose6};
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// Read-only lookup of configuration values by path.
pub trait ParamStore: Send + Sync {
    /// Return the raw value stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ArmError::ConfigurationMissing`] when nothing is stored there.
    fn get_value(&self, path: &str) -> Result<toml::Value, ArmError>;
}

impl dyn ParamStore + '_ {
    /// Look up `path` and deserialize it into `T`.
    ///
    /// # Errors
    ///
    /// [`ArmError::ConfigurationMissing`] if the path is absent,
    /// [`ArmError::ConfigurationInvalid`] if the value has the wrong shape.
    pub fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ArmError> {
        let value = self.get_value(path)?;
        <T as Deserialize>::deserialize(value).map_err(|e| ArmError::ConfigurationInvalid {
            path: path.to_string(),
            details: e.to_string(),
        })
    }

    /// Like [`get`](Self::get), but an absent path yields `Ok(None)`.
    pub fn get_opt<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, ArmError> {
        match self.get::<T>(path) {
            Ok(v) => Ok(Some(v)),
            Err(ArmError::ConfigurationMissing { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// [`ParamStore`] backed by an in-memory TOML table.
#[derive(Debug, Clone, Default)]
pub struct TomlParamStore {
    root: toml::Table,
}

impl TomlParamStore {
    pub fn from_table(root: toml::Table) -> Self {
        Self { root }
    }

    /// Parse a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self, ArmError> {
        let root = raw
            .parse::<toml::Table>()
            .map_err(|e| ArmError::Parsing(format!("Failed to parse parameters: {e}")))?;
        Ok(Self { root })
    }

    /// Load a TOML document from disk.
    pub fn load_from(path: &Path) -> Result<Self, ArmError> {
        if !path.exists() {
            return Err(ArmError::ConfigurationMissing {
                path: path.display().to_string(),
            });
        }
        let raw = fs::read_to_string(path).map_err(|e| ArmError::ConfigurationInvalid {
            path: path.display().to_string(),
            details: e.to_string(),
        })?;
        Self::from_toml_str(&raw)
    }
}

impl ParamStore for TomlParamStore {
    fn get_value(&self, path: &str) -> Result<toml::Value, ArmError> {
        let missing = || ArmError::ConfigurationMissing {
            path: path.to_string(),
        };
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let first = segments.next().ok_or_else(missing)?;
        let mut current = self.root.get(first).ok_or_else(missing)?;
        for segment in segments {
            current = current
                .as_table()
                .and_then(|t| t.get(segment))
                .ok_or_else(missing)?;
        }
        Ok(current.clone())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Arm parameters
// ────────────────────────────────────────────────────────────────────────────

/// Calibration of one arm, loaded once at construction and immutable after.
#[derive(Debug, Clone, PartialEq)]
pub struct ArmParams {
    pub offset: CalibrationOffset,
    pub marker_to_grippoint: Option<Pose6>,
    /// Side-qualified, in actuation order.
    pub joint_names: Vec<String>,
    pub default_configurations: BTreeMap<String, Vec<f64>>,
    pub default_trajectories: BTreeMap<String, Vec<Vec<f64>>>,
}

impl ArmParams {
    /// Read every arm parameter for `side` of `robot_name`.
    ///
    /// # Errors
    ///
    /// Fails on the first required path that is missing or malformed.
    pub fn load(store: &dyn ParamStore, robot_name: &str, side: ArmSide) -> Result<Self, ArmError> {
        let base = format!("/{robot_name}/skills/arm");

        let offset = store.get::<Pose6>(&format!("{base}/offset/{side}"))?;
        let marker_to_grippoint = store.get_opt::<Pose6>(&format!("{base}/offset/marker_to_grippoint"))?;
        let joint_names = store
            .get::<Vec<String>>(&format!("{base}/joint_names"))?
            .into_iter()
            .map(|name| format!("{name}_{side}"))
            .collect();
        let default_configurations = store.get(&format!("{base}/default_configurations"))?;
        let default_trajectories = store.get(&format!("{base}/default_trajectories"))?;

        Ok(Self {
            offset,
            marker_to_grippoint,
            joint_names,
            default_configurations,
            default_trajectories,
        })
    }
}
