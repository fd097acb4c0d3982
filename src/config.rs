use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Monitored TeamSpeak instances.
    pub servers: Vec<TargetConfig>,
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
}

/// One monitored TeamSpeak server and the credentials for its
/// ServerQuery interface.
#[derive(Debug, Deserialize, Clone)]
pub struct TargetConfig {
    /// Label for this server in exported metrics. Falls back to
    /// `host:port` when empty.
    #[serde(default)]
    pub name: String,
    pub host: String,
    #[serde(default = "default_query_port")]
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    #[serde(default)]
    pub protocol: TransportKind,
}

/// How the ServerQuery channel is carried.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Raw query port (10011 by default).
    #[default]
    Tcp,
    /// Query shell tunneled over SSH (10022 on a stock server).
    Ssh,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ListenConfig {
    #[serde(default = "default_addr")]
    pub addr: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScrapeConfig {
    #[serde(default = "default_scrape_interval")]
    pub interval_seconds: u64,
    /// Upper bound on concurrent ServerQuery connections per server.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Read/write deadline for a single query command.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_seconds: u64,
}

impl TargetConfig {
    pub fn label(&self) -> String {
        if self.name.is_empty() {
            format!("{}:{}", self.host, self.port)
        } else {
            self.name.clone()
        }
    }
}

impl ScrapeConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_seconds)
    }
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            port: default_port(),
        }
    }
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_scrape_interval(),
            pool_size: default_pool_size(),
            command_timeout_seconds: default_command_timeout(),
        }
    }
}

fn default_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_query_port() -> u16 {
    10011
}

fn default_scrape_interval() -> u64 {
    60
}

fn default_pool_size() -> usize {
    5
}

fn default_command_timeout() -> u64 {
    10
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        // Load environment variables from .env if present
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("TS3_EXPORTER").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}
