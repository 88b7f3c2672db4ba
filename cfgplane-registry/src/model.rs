//! Model metadata reported by plugins, and the capability view derived
//! from it.

use cfgplane_types::ValueType;
use serde::{Deserialize, Serialize};

/// Protocol version marker reported in [`Capabilities`].
pub const GNMI_VERSION: &str = "0.7.0";

/// A schema module supported by a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelData {
    pub name: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub version: String,
}

/// A configuration encoding a plugin understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    Json,
    Bytes,
    Proto,
    Ascii,
    JsonIetf,
}

/// A read-only (state) leaf below a read-only path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadOnlySubPath {
    pub sub_path: String,
    pub value_type: ValueType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub units: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadOnlyPath {
    pub path: String,
    #[serde(default)]
    pub sub_path: Vec<ReadOnlySubPath>,
}

/// A configurable leaf and its constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadWritePath {
    pub path: String,
    pub value_type: ValueType,
    #[serde(default)]
    pub type_opts: Vec<u64>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub units: String,
    #[serde(default)]
    pub is_a_key: bool,
    #[serde(default)]
    pub attr_name: String,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default)]
    pub default: String,
    #[serde(default)]
    pub range: Vec<String>,
    #[serde(default)]
    pub length: Vec<String>,
}

/// Everything a plugin reports about the model it serves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub model_data: Vec<ModelData>,
    #[serde(default)]
    pub supported_encodings: Vec<Encoding>,
    #[serde(default)]
    pub read_only_path: Vec<ReadOnlyPath>,
    #[serde(default)]
    pub read_write_path: Vec<ReadWritePath>,
}

impl ModelInfo {
    /// Registry identity of the model, `"{name}-{version}"`.
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}

/// Capability view of a plugin returned to northbound callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    pub supported_models: Vec<ModelData>,
    pub supported_encodings: Vec<Encoding>,
    pub gnmi_version: String,
}
