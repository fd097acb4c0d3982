//! In-process ServerQuery server for exercising the client stack.
//!
//! Serves a canned command table per connection: banner, permissive
//! `login`, then scripted replies. Two sentinel replies steer failure
//! tests: [`CLOSE`] drops the connection instead of answering,
//! [`HANG`] never answers at all.

#![allow(dead_code)]

use secrecy::SecretString;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use teamspeak_exporter::config::{TargetConfig, TransportKind};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

pub const BANNER: &str =
    "TS3\nWelcome to the TeamSpeak 3 ServerQuery interface, type \"help\" for a list of commands\n";

pub const CLOSE: &str = "<close>";
pub const HANG: &str = "<hang>";

pub struct MockServer {
    pub addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
}

impl MockServer {
    pub async fn spawn(responses: HashMap<String, String>) -> Self {
        Self::spawn_with_banner(responses, BANNER).await
    }

    pub async fn spawn_with_banner(responses: HashMap<String, String>, banner: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&accepted);
        let responses = Arc::new(responses);
        let banner = banner.to_string();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve_connection(
                    stream,
                    Arc::clone(&responses),
                    banner.clone(),
                ));
            }
        });

        Self { addr, accepted }
    }

    /// Connections accepted so far; distinguishes reused sessions from
    /// freshly constructed ones.
    pub fn connections(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn target(&self) -> TargetConfig {
        TargetConfig {
            name: "mock".to_string(),
            host: self.addr.ip().to_string(),
            port: self.addr.port(),
            username: "serveradmin".to_string(),
            password: SecretString::from("secret"),
            protocol: TransportKind::Tcp,
        }
    }
}

async fn serve_connection(
    stream: TcpStream,
    responses: Arc<HashMap<String, String>>,
    banner: String,
) {
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read);

    if !banner.is_empty() && write.write_all(banner.as_bytes()).await.is_err() {
        return;
    }

    let mut selected = String::new();
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let command = line.trim();

        // A script may answer per selected virtual server: a key like
        // "serverinfo @1" takes precedence over plain "serverinfo"
        // once "use 1" succeeded on this connection.
        let contextual = format!("{command} @{selected}");
        let reply = match responses.get(&contextual).or_else(|| responses.get(command)) {
            Some(reply) => reply.clone(),
            None if command.starts_with("login ") => ok(""),
            None => "error id=256 msg=command\\snot\\sfound\n".to_string(),
        };
        if let Some(sid) = command.strip_prefix("use ") {
            if reply.contains("error id=0") {
                selected = sid.to_string();
            }
        }
        if reply == CLOSE {
            return;
        }
        if reply == HANG {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            return;
        }
        if write.write_all(reply.as_bytes()).await.is_err() {
            return;
        }
    }
}

/// Body plus success terminator, ready to send.
pub fn ok(body: &str) -> String {
    if body.is_empty() {
        "error id=0 msg=ok\n".to_string()
    } else {
        format!("{body}\nerror id=0 msg=ok\n")
    }
}

/// Error terminator with an already-escaped message.
pub fn server_error(id: u32, escaped_msg: &str) -> String {
    format!("error id={id} msg={escaped_msg}\n")
}

pub fn short_timeout() -> Duration {
    Duration::from_secs(2)
}
