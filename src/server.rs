//! HTTP server and collection loop.
//!
//! # Endpoints
//!
//! - `GET /` - HTML landing page with links to metrics and health
//! - `GET /metrics` - Prometheus metrics in text format
//! - `GET /health` - 200 while the last cycle reached at least one
//!   server, 503 otherwise
//!
//! The collection loop runs every `scrape.interval_seconds`, resets the
//! per-scrape series, runs one full fan-out via the [`Collector`], and
//! sets `teamspeak_up` from the number of reachable servers. Individual
//! server or virtual-server failures are logged inside the collector
//! and never stop the loop.

use crate::collector::Collector;
use crate::config::Config;
use crate::metrics::MetricsCollector;
use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{info, warn};

#[derive(Clone)]
struct AppState {
    metrics: MetricsCollector,
}

pub async fn start(config: Config) -> anyhow::Result<()> {
    let metrics = MetricsCollector::new()?;
    let collector = Arc::new(Collector::new(&config, Arc::new(metrics.clone())));

    let state = AppState {
        metrics: metrics.clone(),
    };

    // Start background metrics collection
    let loop_metrics = metrics.clone();
    let loop_collector = Arc::clone(&collector);
    let every = config.scrape.interval();
    tokio::spawn(async move {
        collect_loop(loop_collector, loop_metrics, every).await;
    });

    // Build the router
    let app = Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    // Start the server
    let addr = format!("{}:{}", config.listen.addr, config.listen.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Metrics server listening on {}", addr);
    info!("Metrics available at http://{}/metrics", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn collect_loop(collector: Arc<Collector>, metrics: MetricsCollector, every: Duration) {
    let mut ticker = interval(every);

    loop {
        ticker.tick().await;

        info!("Collecting metrics from TeamSpeak servers");
        metrics.reset_series();
        let reachable = collector.collect().await;
        if reachable == 0 {
            warn!("No configured server was reachable this cycle");
        }
        metrics.up.set(if reachable > 0 { 1.0 } else { 0.0 });
    }
}

async fn root_handler() -> impl IntoResponse {
    r#"<html>
<head><title>TeamSpeak Exporter</title></head>
<body>
<h1>TeamSpeak Prometheus Exporter</h1>
<p><a href="/metrics">Metrics</a></p>
<p><a href="/health">Health</a></p>
</body>
</html>"#
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(metrics) => metrics.into_response(),
        Err(e) => {
            warn!("Failed to render metrics: {}", e);
            (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error rendering metrics: {}", e),
            )
                .into_response()
        }
    }
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    if state.metrics.up.get() > 0.0 {
        (axum::http::StatusCode::OK, "OK")
    } else {
        (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            "No TeamSpeak server reachable",
        )
    }
}
