//! Prometheus metric definitions.
//!
//! Two families mirror what the query protocol reports per virtual
//! server: a fixed table of numeric `serverinfo` fields republished as
//! gauges, and one `player_online` series per connected voice client
//! with the client's state as labels. All metrics use the `teamspeak_`
//! namespace.
//!
//! Values arrive as decoded text records; a field that is absent or
//! non-numeric is skipped, never emitted as zero.

use crate::collector::RecordSink;
use crate::query::Record;
use prometheus::{Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};
use std::collections::HashMap;
use std::sync::Arc;

/// Numeric `serverinfo` fields exported per virtual server.
pub const VIRTUAL_SERVER_FIELDS: &[&str] = &[
    "connection_bandwidth_received_last_minute_total",
    "connection_bandwidth_received_last_second_total",
    "connection_bandwidth_sent_last_minute_total",
    "connection_bandwidth_sent_last_second_total",
    "connection_bytes_received_control",
    "connection_bytes_received_keepalive",
    "connection_bytes_received_speech",
    "connection_bytes_received_total",
    "connection_bytes_sent_control",
    "connection_bytes_sent_keepalive",
    "connection_bytes_sent_speech",
    "connection_bytes_sent_total",
    "connection_filetransfer_bandwidth_received",
    "connection_filetransfer_bandwidth_sent",
    "connection_filetransfer_bytes_received_total",
    "connection_filetransfer_bytes_sent_total",
    "connection_packets_received_control",
    "connection_packets_received_keepalive",
    "connection_packets_received_speech",
    "connection_packets_received_total",
    "connection_packets_sent_control",
    "connection_packets_sent_keepalive",
    "connection_packets_sent_speech",
    "connection_packets_sent_total",
    "virtualserver_channelsonline",
    "virtualserver_client_connections",
    "virtualserver_clientsonline",
    "virtualserver_maxclients",
    "virtualserver_month_bytes_downloaded",
    "virtualserver_month_bytes_uploaded",
    "virtualserver_query_client_connections",
    "virtualserver_queryclientsonline",
    "virtualserver_reserved_slots",
    "virtualserver_total_bytes_downloaded",
    "virtualserver_total_bytes_uploaded",
    "virtualserver_total_packetloss_control",
    "virtualserver_total_packetloss_keepalive",
    "virtualserver_total_packetloss_speech",
    "virtualserver_total_packetloss_total",
    "virtualserver_total_ping",
    "virtualserver_uptime",
];

/// `clientlist` fields attached to `player_online` as labels, in
/// addition to `server_name` and `virtualserver_name`.
pub const CLIENT_FIELDS: &[&str] = &[
    "clid",
    "cid",
    "client_database_id",
    "client_nickname",
    "client_type",
    "client_away",
    "client_away_message",
    "client_flag_talking",
    "client_input_muted",
    "client_output_muted",
    "client_input_hardware",
    "client_output_hardware",
    "client_talk_power",
    "client_is_talker",
    "client_is_priority_speaker",
    "client_is_recording",
    "client_is_channel_commander",
    "client_unique_identifier",
    "client_servergroups",
    "client_channel_group_id",
    "client_channel_group_inherited_channel_id",
    "client_version",
    "client_platform",
    "client_idle_time",
    "client_created",
    "client_lastconnected",
    "client_country",
    "connection_client_ip",
    "client_badges",
];

/// Metrics collector for the exporter
#[derive(Clone)]
pub struct MetricsCollector {
    registry: Arc<Registry>,

    /// One gauge per entry in [`VIRTUAL_SERVER_FIELDS`], labeled by
    /// server and virtual server.
    virtual_server: Arc<HashMap<&'static str, GaugeVec>>,

    /// 1 per connected voice client, client state as labels.
    player_online: Arc<GaugeVec>,

    /// Per-target reachability (1 = last cycle reached the server).
    pub server_up: Arc<GaugeVec>,

    /// 1 while the last cycle reached at least one configured server.
    pub up: Arc<Gauge>,
}

impl MetricsCollector {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let mut virtual_server = HashMap::with_capacity(VIRTUAL_SERVER_FIELDS.len());
        for &field in VIRTUAL_SERVER_FIELDS {
            let gauge = GaugeVec::new(
                Opts::new(field, format!("TeamSpeak virtual server metric {field}"))
                    .namespace("teamspeak"),
                &["server_name", "virtualserver_name"],
            )?;
            registry.register(Box::new(gauge.clone()))?;
            virtual_server.insert(field, gauge);
        }

        let mut player_labels = vec!["server_name", "virtualserver_name"];
        player_labels.extend_from_slice(CLIENT_FIELDS);
        let player_online = GaugeVec::new(
            Opts::new("player_online", "Online players").namespace("teamspeak"),
            &player_labels,
        )?;
        registry.register(Box::new(player_online.clone()))?;

        let server_up = GaugeVec::new(
            Opts::new(
                "server_up",
                "Whether the last collection reached this server (1 = reachable)",
            )
            .namespace("teamspeak"),
            &["server_name"],
        )?;
        registry.register(Box::new(server_up.clone()))?;

        let up = Gauge::with_opts(
            Opts::new(
                "up",
                "Whether the last collection reached at least one server",
            )
            .namespace("teamspeak"),
        )?;
        registry.register(Box::new(up.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            virtual_server: Arc::new(virtual_server),
            player_online: Arc::new(player_online),
            server_up: Arc::new(server_up),
            up: Arc::new(up),
        })
    }

    /// Render metrics in Prometheus text format
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Drop all per-scrape series so a virtual server or client that
    /// vanished (or failed to scrape) does not linger with stale values.
    /// Reachability gauges keep their last state.
    pub fn reset_series(&self) {
        for gauge in self.virtual_server.values() {
            gauge.reset();
        }
        self.player_online.reset();
    }
}

impl RecordSink for MetricsCollector {
    fn server_up(&self, server: &str, reachable: bool) {
        self.server_up
            .with_label_values(&[server])
            .set(if reachable { 1.0 } else { 0.0 });
    }

    fn virtual_server(&self, server: &str, virtual_server: &str, fields: &Record) {
        for (&field, gauge) in self.virtual_server.iter() {
            let Some(raw) = fields.get(field) else {
                continue;
            };
            if let Ok(value) = raw.parse::<f64>() {
                gauge.with_label_values(&[server, virtual_server]).set(value);
            }
        }
    }

    fn client(&self, server: &str, virtual_server: &str, fields: &Record) {
        let mut values = Vec::with_capacity(2 + CLIENT_FIELDS.len());
        values.push(server);
        values.push(virtual_server);
        for &field in CLIENT_FIELDS {
            values.push(fields.get_or_empty(field));
        }
        self.player_online.with_label_values(&values).set(1.0);
    }
}
