//! Configuration module for the syslog monitor
//!
//! Handles loading and validating configuration from YAML files and environment variables.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Metrics export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether metrics are enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Port to expose metrics on
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Node name (from K8s downward API)
    #[serde(default)]
    pub node_name: Option<String>,

    /// Agent name stamped on every health event
    #[serde(default = "default_agent_name")]
    pub agent_name: String,

    /// Component class stamped on every health event
    #[serde(default = "default_component_class")]
    pub component_class: String,

    /// Check name for GPU driver error events
    #[serde(default = "default_check_name")]
    pub check_name: String,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_name: None,
            agent_name: default_agent_name(),
            component_class: default_component_class(),
            check_name: default_check_name(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse YAML configuration")
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        match self.node_name.as_deref() {
            None => anyhow::bail!(
                "node_name must be specified via config, --node-name, or NODE_NAME env"
            ),
            Some(name) if name.trim().is_empty() => anyhow::bail!("node_name must not be empty"),
            Some(_) => {}
        }
        if self.metrics.enabled && self.metrics.port == 0 {
            anyhow::bail!("metrics.port must be > 0 when metrics are enabled");
        }
        Ok(())
    }

    /// Override node_name from environment if not set
    pub fn with_node_name_from_env(mut self) -> Self {
        if self.node_name.is_none() {
            self.node_name = std::env::var("NODE_NAME").ok();
        }
        self
    }
}

// Default value functions
fn default_agent_name() -> String {
    "syslog-health-monitor".to_string()
}

fn default_component_class() -> String {
    "GPU".to_string()
}

fn default_check_name() -> String {
    "SysLogsGPUDriverError".to_string()
}

fn default_metrics_port() -> u16 {
    2112
}

fn default_true() -> bool {
    true
}
