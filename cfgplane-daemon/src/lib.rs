//! Configuration and wiring for the cfgplane daemon.
//!
//! The daemon hosts the in-memory stores, discovers model plugins and runs
//! the transaction controller until shut down.

use anyhow::{Context, Result};
use cfgplane_controller::{Controller, ControllerConfig, DEFAULT_RECONCILE_TIMEOUT, transaction};
use cfgplane_registry::{ClientConfig, PluginRegistry, TlsConfig};
use cfgplane_store::{MemoryConfigurationStore, MemoryTransactionStore};
use cfgplane_types::TransactionId;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug, Default)]
#[command(name = "cfgplaned")]
#[command(about = "Network device configuration control plane")]
pub struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Model plugin port to probe (repeatable; replaces the file's list)
    #[arg(short = 'p', long = "plugin-port")]
    pub plugin_ports: Vec<u16>,

    /// Host the model plugins listen on
    #[arg(long)]
    pub plugin_host: Option<String>,

    /// Client certificate presented to model plugins
    #[arg(long, requires = "client_key")]
    pub client_cert: Option<PathBuf>,

    /// Private key for the client certificate
    #[arg(long, requires = "client_cert")]
    pub client_key: Option<PathBuf>,

    /// Reach model plugins over plain HTTP when no client certificate is set
    #[arg(long)]
    pub insecure_plaintext: bool,

    /// Number of reconcile workers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Loads the configuration file, if any, and applies flag overrides.
    pub fn resolve(&self) -> Result<DaemonConfig> {
        let mut config = match &self.config {
            Some(path) => DaemonConfig::load(path)?,
            None => DaemonConfig::default(),
        };
        config.apply_args(self);
        Ok(config)
    }
}

/// Model plugin discovery settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsConfig {
    /// Ports probed once at startup.
    pub ports: Vec<u16>,
    #[serde(flatten)]
    pub client: ClientConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub plugins: PluginsConfig,
    pub controller: ControllerConfig,
    /// Deadline for one reconcile pass (ms).
    pub reconcile_timeout_ms: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            plugins: PluginsConfig::default(),
            controller: ControllerConfig::default(),
            reconcile_timeout_ms: DEFAULT_RECONCILE_TIMEOUT.as_millis() as u64,
        }
    }
}

impl DaemonConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn apply_args(&mut self, args: &Args) {
        if !args.plugin_ports.is_empty() {
            self.plugins.ports = args.plugin_ports.clone();
        }
        if let Some(host) = &args.plugin_host {
            self.plugins.client.host = host.clone();
        }
        if let (Some(cert), Some(key)) = (&args.client_cert, &args.client_key) {
            self.plugins.client.tls = Some(TlsConfig {
                client_cert: cert.clone(),
                client_key: key.clone(),
            });
        }
        if args.insecure_plaintext {
            self.plugins.client.insecure_plaintext = true;
        }
        if let Some(workers) = args.workers {
            self.controller.workers = workers;
        }
    }

    #[must_use]
    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_millis(self.reconcile_timeout_ms)
    }
}

/// The running control plane.
pub struct Daemon {
    transactions: Arc<MemoryTransactionStore>,
    configurations: Arc<MemoryConfigurationStore>,
    registry: Arc<PluginRegistry>,
    controller: Controller<TransactionId>,
}

impl Daemon {
    /// Wires the stores, registry and controller. Fails when plugin ports
    /// are configured without TLS and without `insecure_plaintext`.
    pub fn new(config: &DaemonConfig) -> Result<Self> {
        if !config.plugins.ports.is_empty() {
            config
                .plugins
                .client
                .check_transport()
                .context("Refusing to reach model plugins over plaintext")?;
            if config.plugins.client.tls.is_none() {
                warn!("Model plugins are reached over plaintext HTTP");
            }
        }

        let transactions = Arc::new(MemoryTransactionStore::new());
        let configurations = Arc::new(MemoryConfigurationStore::new());
        let registry = Arc::new(PluginRegistry::new(
            config.plugins.ports.clone(),
            config.plugins.client.clone(),
        ));
        let controller = transaction::new_controller(
            transactions.clone(),
            configurations.clone(),
            Arc::clone(&registry),
            config.controller.clone(),
            config.reconcile_timeout(),
        );
        Ok(Self {
            transactions,
            configurations,
            registry,
            controller,
        })
    }

    /// Runs plugin discovery to completion, then starts the controller.
    pub async fn start(&self) -> Result<()> {
        self.registry
            .start()
            .await
            .context("Model plugin discovery panicked")?;
        let plugins = self.registry.get_plugins().await;
        info!(plugins = plugins.len(), "Model plugins ready");

        self.controller
            .start()
            .await
            .context("Failed to start transaction controller")?;
        Ok(())
    }

    pub async fn stop(&self) {
        self.controller.stop().await;
        self.registry.stop();
    }

    #[must_use]
    pub fn transactions(&self) -> &Arc<MemoryTransactionStore> {
        &self.transactions
    }

    #[must_use]
    pub fn configurations(&self) -> &Arc<MemoryConfigurationStore> {
        &self.configurations
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }
}
