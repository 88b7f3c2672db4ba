//! Directory of discovered model plugins.

use crate::client::{ClientConfig, HttpPluginClient, PluginClient};
use crate::error::{RegistryError, RegistryResult};
use crate::plugin::ModelPlugin;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Discovers model plugins on a fixed set of ports and serves lookups by
/// model identity.
pub struct PluginRegistry {
    ports: Vec<u16>,
    config: ClientConfig,
    plugins: RwLock<HashMap<String, Arc<ModelPlugin>>>,
}

impl PluginRegistry {
    pub fn new(ports: Vec<u16>, config: ClientConfig) -> Self {
        Self {
            ports,
            config,
            plugins: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    // ================================================================
    // Discovery
    // ================================================================

    /// Launches one discovery pass in the background.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        info!(ports = ?self.ports, "Starting model plugin discovery");
        let registry = Arc::clone(self);
        tokio::spawn(async move { registry.discover().await })
    }

    /// Probes every configured port once, concurrently. Unreachable ports
    /// are logged and skipped.
    pub async fn discover(&self) {
        join_all(self.ports.iter().map(|&port| self.discover_plugin(port))).await;
        let count = self.plugins.read().await.len();
        info!(plugins = count, "Model plugin discovery finished");
    }

    /// Probes a single port. Returns the plugin's identity on success.
    pub async fn discover_plugin(&self, port: u16) -> Option<String> {
        match self.load_plugin(port).await {
            Ok(plugin) => {
                let id = plugin.id().to_string();
                info!(plugin_id = %id, port, "Discovered model plugin");
                self.register(plugin).await;
                Some(id)
            }
            Err(e) => {
                warn!(port, error = %e, "Model plugin discovery failed");
                None
            }
        }
    }

    async fn load_plugin(&self, port: u16) -> RegistryResult<ModelPlugin> {
        let client: Arc<dyn PluginClient> = Arc::new(HttpPluginClient::new(&self.config, port)?);
        ModelPlugin::load(port, client).await
    }

    /// Publishes a plugin, replacing any earlier plugin with the same
    /// identity.
    pub async fn register(&self, plugin: ModelPlugin) -> Arc<ModelPlugin> {
        let plugin = Arc::new(plugin);
        let previous = self
            .plugins
            .write()
            .await
            .insert(plugin.id().to_string(), Arc::clone(&plugin));
        if previous.is_some() {
            debug!(plugin_id = %plugin.id(), "Replaced model plugin");
        }
        plugin
    }

    // ================================================================
    // Lookup
    // ================================================================

    pub async fn get_plugin(&self, id: &str) -> RegistryResult<Arc<ModelPlugin>> {
        self.plugins
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::PluginNotFound(id.to_string()))
    }

    /// All known plugins, keyed by identity.
    pub async fn get_plugins(&self) -> HashMap<String, Arc<ModelPlugin>> {
        self.plugins.read().await.clone()
    }

    pub fn stop(&self) {
        info!("Stopping model plugin registry");
    }
}
