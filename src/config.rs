//! Server configuration.
//!
//! Configuration comes from an optional YAML file, overridden field by field by
//! `ROOTSERVE_*` environment variables, and is then validated into an immutable
//! [`ServerConfig`].
//!
//! ```yaml
//! server:
//!   address: 127.0.0.1
//!   port: 8080
//!   workers: 7
//!   idle_timeout_secs: 30
//!   max_header_bytes: 8192
//! static_files:
//!   root: ./public
//! logging:
//!   level: info
//! ```

use anyhow::{Context, bail};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the YAML config file.
pub const CONFIG_PATH_ENV: &str = "ROOTSERVE_CONFIG";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerSection,
    pub static_files: StaticFilesSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub address: String,
    pub port: u32,
    /// Total worker contexts, the invoking thread included.
    pub workers: usize,
    pub idle_timeout_secs: u64,
    pub max_header_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StaticFilesSection {
    pub root: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 8080,
            workers: num_cpus::get(),
            idle_timeout_secs: 30,
            max_header_bytes: 8192,
        }
    }
}

impl Default for StaticFilesSection {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Validated, immutable configuration shared by every part of the server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: IpAddr,
    pub port: u16,
    /// Canonical absolute path of the served directory.
    pub root: PathBuf,
    pub workers: usize,
    pub idle_timeout: Duration,
    pub max_header_bytes: usize,
    pub log_level: tracing::Level,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}

impl Config {
    /// Loads configuration from the process environment.
    ///
    /// `path` takes precedence over `ROOTSERVE_CONFIG` when given.
    pub fn load(path: Option<PathBuf>) -> anyhow::Result<Self> {
        let path = path.or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));

        let text = match &path {
            Some(path) => Some(
                std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file {}", path.display()))?,
            ),
            None => None,
        };

        Self::from_sources(text.as_deref(), |key| std::env::var(key).ok())
    }

    /// Builds a configuration from optional YAML text and an environment lookup.
    pub fn from_sources(
        yaml: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let mut cfg = match yaml {
            Some(text) if !text.trim().is_empty() => {
                serde_yaml::from_str::<Config>(text).context("invalid YAML configuration")?
            }
            _ => Config::default(),
        };

        if let Some(address) = env("ROOTSERVE_ADDRESS") {
            cfg.server.address = address;
        }
        if let Some(port) = env("ROOTSERVE_PORT") {
            cfg.server.port = port
                .parse()
                .with_context(|| format!("ROOTSERVE_PORT is not a number: {port}"))?;
        }
        if let Some(root) = env("ROOTSERVE_ROOT") {
            cfg.static_files.root = PathBuf::from(root);
        }
        if let Some(workers) = env("ROOTSERVE_WORKERS") {
            cfg.server.workers = workers
                .parse()
                .with_context(|| format!("ROOTSERVE_WORKERS is not a number: {workers}"))?;
        }
        if let Some(secs) = env("ROOTSERVE_IDLE_TIMEOUT_SECS") {
            cfg.server.idle_timeout_secs = secs
                .parse()
                .with_context(|| format!("ROOTSERVE_IDLE_TIMEOUT_SECS is not a number: {secs}"))?;
        }
        if let Some(bytes) = env("ROOTSERVE_MAX_HEADER_BYTES") {
            cfg.server.max_header_bytes = bytes
                .parse()
                .with_context(|| format!("ROOTSERVE_MAX_HEADER_BYTES is not a number: {bytes}"))?;
        }
        if let Some(level) = env("ROOTSERVE_LOG") {
            cfg.logging.level = level;
        }

        Ok(cfg)
    }

    /// Checks every field and canonicalizes the served root.
    ///
    /// Fails if the root does not exist or is not a readable directory.
    pub fn validate(&self) -> anyhow::Result<ServerConfig> {
        let address: IpAddr = self
            .server
            .address
            .parse()
            .with_context(|| format!("invalid bind address: {}", self.server.address))?;

        let port = match u16::try_from(self.server.port) {
            Ok(port) if port != 0 => port,
            _ => bail!("port must be between 1 and 65535, got {}", self.server.port),
        };

        if self.server.workers == 0 {
            bail!("workers must be at least 1");
        }
        if self.server.idle_timeout_secs == 0 {
            bail!("idle_timeout_secs must be at least 1");
        }
        if self.server.max_header_bytes == 0 {
            bail!("max_header_bytes must be at least 1");
        }

        let root = std::fs::canonicalize(&self.static_files.root).with_context(|| {
            format!("root directory {} does not exist", self.static_files.root.display())
        })?;
        if !root.is_dir() {
            bail!("root {} is not a directory", root.display());
        }
        std::fs::read_dir(&root)
            .with_context(|| format!("root directory {} is not readable", root.display()))?;

        let log_level = self
            .logging
            .level
            .parse::<tracing::Level>()
            .map_err(|_| anyhow::anyhow!("invalid log level: {}", self.logging.level))?;

        Ok(ServerConfig {
            address,
            port,
            root,
            workers: self.server.workers,
            idle_timeout: Duration::from_secs(self.server.idle_timeout_secs),
            max_header_bytes: self.server.max_header_bytes,
            log_level,
        })
    }
}
