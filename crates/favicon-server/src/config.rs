//! Configuration loading

use anyhow::{Context, Result};
use favicon_core::{DEFAULT_ROUTE, FaviconOptions, LifetimeSpec, ResourceRoute, parse_duration};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub icon: IconConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

/// Icon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IconConfig {
    /// Path to the icon file, resolved relative to the working directory
    #[serde(default = "default_icon_path")]
    pub path: String,
    /// Request path the icon is served from
    #[serde(default = "default_route")]
    pub route: String,
    /// Cache lifetime: milliseconds or a string such as "30d"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<LifetimeSpec>,
}

impl Default for IconConfig {
    fn default() -> Self {
        Self {
            path: default_icon_path(),
            route: default_route(),
            max_age: None,
        }
    }
}

impl IconConfig {
    /// Responder options for this icon
    pub fn options(&self) -> FaviconOptions {
        if let Some(LifetimeSpec::Text(text)) = &self.max_age
            && parse_duration(text).is_err()
        {
            warn!("Unrecognized max_age {:?}, using one year", text);
        }

        FaviconOptions {
            max_age: self.max_age.clone(),
            route: ResourceRoute::new(self.route.clone()),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: "pretty".to_string(),
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_icon_path() -> String {
    "./static/favicon.ico".to_string()
}

fn default_route() -> String {
    DEFAULT_ROUTE.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &str) -> Result<Self> {
        let config_path = Path::new(path);

        if !config_path.exists() {
            info!("Config file not found at {}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        info!("Loaded configuration from {}", path);
        Ok(config)
    }

    fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
