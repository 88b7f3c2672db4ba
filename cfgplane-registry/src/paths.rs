//! Path maps rebuilt from a plugin's model metadata.

use crate::model::{ModelInfo, ReadWritePath};
use cfgplane_types::ValueType;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// The read-only (state) paths of a model. Only existence is tracked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOnlyPathMap {
    paths: BTreeSet<String>,
}

impl ReadOnlyPathMap {
    pub fn from_model(info: &ModelInfo) -> Self {
        Self {
            paths: info.read_only_path.iter().map(|p| p.path.clone()).collect(),
        }
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }
}

/// Attributes shared by read-only and read-write leaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOnlyAttrib {
    pub value_type: ValueType,
    pub type_opts: Vec<u8>,
    pub description: String,
    pub units: String,
    pub is_a_key: bool,
    pub attr_name: String,
}

/// A configurable leaf with its constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadWritePathElem {
    pub attrib: ReadOnlyAttrib,
    pub mandatory: bool,
    pub default: String,
    pub range: Vec<String>,
    pub length: Vec<String>,
}

impl ReadWritePathElem {
    fn from_wire(path: &ReadWritePath) -> Self {
        Self {
            attrib: ReadOnlyAttrib {
                value_type: path.value_type,
                type_opts: type_opts(&path.path, &path.type_opts),
                description: path.description.clone(),
                units: path.units.clone(),
                is_a_key: path.is_a_key,
                attr_name: path.attr_name.clone(),
            },
            mandatory: path.mandatory,
            default: path.default.clone(),
            range: path.range.clone(),
            length: path.length.clone(),
        }
    }
}

/// The configurable paths of a model, keyed by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadWritePathMap {
    paths: BTreeMap<String, ReadWritePathElem>,
}

impl ReadWritePathMap {
    pub fn from_model(info: &ModelInfo) -> Self {
        Self {
            paths: info
                .read_write_path
                .iter()
                .map(|p| (p.path.clone(), ReadWritePathElem::from_wire(p)))
                .collect(),
        }
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&ReadWritePathElem> {
        self.paths.get(path)
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains_key(path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ReadWritePathElem)> {
        self.paths.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Type options travel as u64 on the wire but are byte-sized. Out-of-range
/// entries are dropped.
fn type_opts(path: &str, opts: &[u64]) -> Vec<u8> {
    opts.iter()
        .filter_map(|&opt| match u8::try_from(opt) {
            Ok(b) => Some(b),
            Err(_) => {
                warn!(path = %path, opt, "Dropping out-of-range type option");
                None
            }
        })
        .collect()
}
