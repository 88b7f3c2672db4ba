//! Model plugin registry for cfgplane.
//!
//! Model plugins are separate processes that own the schema of one device
//! model. The registry discovers them on a fixed set of local ports, keeps a
//! directory keyed by `"{name}-{version}"`, and proxies validation and
//! path-value decomposition calls to them.
//!
//! Discovery is a single best-effort pass: a plugin that is down when the
//! registry starts stays absent until the next pass.

mod client;
mod error;
mod model;
mod paths;
mod plugin;
mod registry;

pub use client::{
    ClientConfig, HttpPluginClient, MODEL_INFO_ROUTE, PATH_VALUES_ROUTE, PluginClient,
    RetryPolicy, TlsConfig, VALIDATE_ROUTE,
};
pub use error::{RegistryError, RegistryResult};
pub use model::{
    Capabilities, Encoding, GNMI_VERSION, ModelData, ModelInfo, ReadOnlyPath, ReadOnlySubPath,
    ReadWritePath,
};
pub use paths::{ReadOnlyAttrib, ReadOnlyPathMap, ReadWritePathElem, ReadWritePathMap};
pub use plugin::ModelPlugin;
pub use registry::PluginRegistry;
