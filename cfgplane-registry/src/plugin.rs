//! Client-side proxy for one discovered model plugin.

use crate::client::PluginClient;
use crate::error::{RegistryError, RegistryResult};
use crate::model::{Capabilities, GNMI_VERSION, ModelInfo};
use crate::paths::{ReadOnlyPathMap, ReadWritePathMap};
use cfgplane_types::PathValue;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A model plugin as seen by the control plane.
///
/// Created once during discovery and immutable afterwards.
pub struct ModelPlugin {
    id: String,
    port: u16,
    info: ModelInfo,
    client: Arc<dyn PluginClient>,
    read_only_paths: ReadOnlyPathMap,
    read_write_paths: ReadWritePathMap,
}

impl ModelPlugin {
    /// Builds the proxy from the metadata the plugin reported.
    pub fn new(port: u16, info: ModelInfo, client: Arc<dyn PluginClient>) -> Self {
        Self {
            id: info.id(),
            port,
            read_only_paths: ReadOnlyPathMap::from_model(&info),
            read_write_paths: ReadWritePathMap::from_model(&info),
            info,
            client,
        }
    }

    /// Asks the plugin for its metadata and builds the proxy.
    pub async fn load(port: u16, client: Arc<dyn PluginClient>) -> RegistryResult<Self> {
        let info = client.get_model_info().await?;
        Ok(Self::new(port, info, client))
    }

    /// Registry identity, `"{name}-{version}"`.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn info(&self) -> &ModelInfo {
        &self.info
    }

    #[must_use]
    pub fn read_only_paths(&self) -> &ReadOnlyPathMap {
        &self.read_only_paths
    }

    #[must_use]
    pub fn read_write_paths(&self) -> &ReadWritePathMap {
        &self.read_write_paths
    }

    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            supported_models: self.info.model_data.clone(),
            supported_encodings: self.info.supported_encodings.clone(),
            gnmi_version: GNMI_VERSION.to_string(),
        }
    }

    /// Validates a JSON document against the plugin's model.
    ///
    /// Returns [`RegistryError::InvalidConfig`] when the plugin rejects the
    /// document. Transport and RPC failures are returned unchanged.
    pub async fn validate(&self, document: &Value) -> RegistryResult<()> {
        if self.client.validate_config(document).await? {
            debug!(plugin_id = %self.id, "Configuration validated");
            Ok(())
        } else {
            Err(RegistryError::InvalidConfig {
                model: self.id.clone(),
            })
        }
    }

    /// Decomposes a JSON document into typed path values below `path_prefix`.
    pub async fn get_path_values(
        &self,
        path_prefix: &str,
        document: &Value,
    ) -> RegistryResult<Vec<PathValue>> {
        self.client.get_path_values(path_prefix, document).await
    }
}

impl fmt::Debug for ModelPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelPlugin")
            .field("id", &self.id)
            .field("port", &self.port)
            .field("read_only_paths", &self.read_only_paths.len())
            .field("read_write_paths", &self.read_write_paths.len())
            .finish_non_exhaustive()
    }
}
