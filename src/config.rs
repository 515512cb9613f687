//! Proxy configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Proxy server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Address the listener binds to
    pub listen_addr: String,

    /// Port the listener binds to
    pub port: u16,

    /// Accept backlog for pending connections
    pub backlog: u32,

    /// Origin port for plain HTTP fetches and revalidation probes.
    /// Ports encoded in a request are ignored; this value applies to
    /// every origin.
    pub http_port: u16,

    /// Origin port for CONNECT tunnels. Ports in the CONNECT target are
    /// ignored the same way.
    pub https_port: u16,

    /// Optional cap on concurrently handled connections. `None` keeps
    /// the unbounded one-task-per-connection model.
    pub max_connections: Option<usize>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1".to_string(),
            port: 4000,
            backlog: 10,
            http_port: 80,
            https_port: 443,
            max_connections: None,
        }
    }
}

impl ProxyConfig {
    /// Load configuration from file, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = match path {
            Some(p) => PathBuf::from(p),
            None => Self::default_config_path()?,
        };

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config from {:?}", config_path))?;

            let config: ProxyConfig =
                toml::from_str(&contents).context("Failed to parse configuration file")?;

            tracing::info!("Loaded configuration from {:?}", config_path);
            Ok(config)
        } else {
            tracing::info!("No configuration file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to file.
    pub fn save(&self, path: Option<&str>) -> Result<()> {
        let config_path = match path {
            Some(p) => PathBuf::from(p),
            None => Self::default_config_path()?,
        };

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, contents)?;

        tracing::info!("Saved configuration to {:?}", config_path);
        Ok(())
    }

    /// Default configuration file path.
    fn default_config_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("io", "cachegate", "cachegate")
            .context("Failed to determine config directory")?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}
