//! Per-target materialized configuration.

use crate::{Index, PathValue, Revision, TargetId, TargetType, TargetVersion};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigurationState {
    /// Values changed and have not yet been pushed to the target.
    #[default]
    Pending,
    Complete,
    Failed,
}

impl fmt::Display for ConfigurationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Complete => "COMPLETE",
            Self::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationStatus {
    pub state: ConfigurationState,
    /// Index of the last transaction that wrote to this configuration.
    #[serde(default)]
    pub transaction_index: Index,
}

/// The intended state of one target, keyed by path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Configurations are keyed by their target.
    pub id: TargetId,
    pub target_type: TargetType,
    pub target_version: TargetVersion,
    #[serde(default)]
    pub revision: Revision,
    #[serde(default)]
    pub values: BTreeMap<String, PathValue>,
    #[serde(default)]
    pub status: ConfigurationStatus,
}

impl Configuration {
    /// Creates an empty configuration for a target.
    pub fn new(
        target_id: impl Into<TargetId>,
        target_type: impl Into<TargetType>,
        target_version: impl Into<TargetVersion>,
    ) -> Self {
        Self {
            id: target_id.into(),
            target_type: target_type.into(),
            target_version: target_version.into(),
            revision: Revision::default(),
            values: BTreeMap::new(),
            status: ConfigurationStatus::default(),
        }
    }

    #[must_use]
    pub fn target_id(&self) -> &TargetId {
        &self.id
    }

    /// Looks up the current value at `path`, ignoring removed entries.
    #[must_use]
    pub fn value(&self, path: &str) -> Option<&PathValue> {
        self.values.get(path).filter(|v| !v.removed)
    }
}
