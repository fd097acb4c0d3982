use anyhow::Result;
use clap::Parser;
use teamspeak_exporter::{config::Config, server};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Address to bind to (overrides config)
    #[arg(long, env = "TS3_EXPORTER_ADDR")]
    addr: Option<String>,

    /// Port to listen on for metrics (overrides config)
    #[arg(short, long, env = "TS3_EXPORTER_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting TeamSpeak Prometheus Exporter v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration
    let mut config = Config::load(&args.config)?;

    // Override with CLI arguments if provided
    if let Some(addr) = args.addr {
        config.listen.addr = addr;
    }
    if let Some(port) = args.port {
        config.listen.port = port;
    }

    info!("Configuration loaded successfully");
    info!("Monitoring {} TeamSpeak server(s)", config.servers.len());
    info!(
        "Metrics endpoint: http://{}:{}/metrics",
        config.listen.addr, config.listen.port
    );

    // Start the metrics server
    if let Err(e) = server::start(config).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
