//! TeamSpeak ServerQuery Prometheus Exporter
//!
//! Polls one or more TeamSpeak 3 servers over the ServerQuery protocol
//! and republishes virtual-server and client state as Prometheus
//! metrics.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐   ServerQuery (tcp/ssh)   ┌──────────────┐
//! │ TeamSpeak 3 │ ◄───────────────────────► │   Exporter   │
//! │   server    │    line protocol          │              │
//! └─────────────┘                           │ ┌──────────┐ │    HTTP     ┌────────────┐
//!       ...one session pool per server      │ │Collector │ │ ◄─────────► │ Prometheus │
//! ┌─────────────┐                           │ └──────────┘ │  /metrics   └────────────┘
//! │ TeamSpeak 3 │ ◄───────────────────────► │ ┌──────────┐ │
//! │   server    │                           │ │ Metrics  │ │
//! └─────────────┘                           │ └──────────┘ │
//!                                           └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`query`] - ServerQuery client stack: escaping, response parsing,
//!   TCP/SSH transports, sessions, and the per-server session pool
//! - [`collector`] - two-level concurrent fan-out over servers and
//!   their virtual servers
//! - [`metrics`] - Prometheus metric definitions
//! - [`server`] - HTTP server and collection loop
//! - [`config`] - Configuration management
//! - [`error`] - Error types
//!
//! # Quick Start
//!
//! ```no_run
//! use teamspeak_exporter::{config::Config, server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/default.toml")?;
//!     server::start(config).await?;
//!     Ok(())
//! }
//! ```

pub mod collector;
pub mod config;
pub mod error;
pub mod metrics;
pub mod query;
pub mod server;
