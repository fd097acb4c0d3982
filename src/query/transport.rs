//! Byte transports for the ServerQuery channel.
//!
//! Two carriers, one surface: a raw TCP connection to the query port,
//! or an interactive shell opened over SSH. Either way the session
//! layer sees a line-oriented duplex channel with a per-operation
//! deadline. Handshake differences (banner, `login` command) beyond
//! connection establishment live in the session, not here - with one
//! exception: the TCP query port greets with a banner before accepting
//! commands, and that banner is consumed here so the first command
//! never races it.

use crate::config::{TargetConfig, TransportKind};
use crate::error::{QueryError, Result};
use russh::client::{self, Handle};
use russh::keys::ssh_key;
use russh::Disconnect;
use secrecy::ExposeSecret;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time;
use tracing::debug;

/// Grace period per banner line. The query port usually sends two
/// lines ("TS3" and a welcome notice), but the exact count is not
/// guaranteed, so consumption gives up quietly instead of failing.
const GREETING_GRACE: Duration = Duration::from_secs(1);

trait ByteStream: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin> ByteStream for T {}

/// Accepts any host key, matching the trust model of the query
/// credential itself: the password is sent to whatever answers.
struct AcceptingHost;

impl client::Handler for AcceptingHost {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        Ok(true)
    }
}

/// An open duplex line channel to one server.
pub struct Transport {
    stream: BufReader<Box<dyn ByteStream>>,
    /// Kept for teardown: dropping the shell channel alone leaves the
    /// SSH connection task running.
    ssh: Option<Handle<AcceptingHost>>,
    deadline: Duration,
}

impl Transport {
    /// Establish the carrier selected by the target configuration.
    pub async fn connect(target: &TargetConfig, deadline: Duration) -> Result<Self> {
        match target.protocol {
            TransportKind::Tcp => Self::connect_tcp(target, deadline).await,
            TransportKind::Ssh => Self::connect_ssh(target, deadline).await,
        }
    }

    async fn connect_tcp(target: &TargetConfig, deadline: Duration) -> Result<Self> {
        debug!("connecting to {}:{} (tcp)", target.host, target.port);
        let stream = time::timeout(
            deadline,
            TcpStream::connect((target.host.as_str(), target.port)),
        )
        .await
        .map_err(|_| connect_timeout(target))??;

        let mut transport = Self {
            stream: BufReader::new(Box::new(stream) as Box<dyn ByteStream>),
            ssh: None,
            deadline,
        };
        transport.consume_greeting().await;
        Ok(transport)
    }

    async fn connect_ssh(target: &TargetConfig, deadline: Duration) -> Result<Self> {
        debug!("connecting to {}:{} (ssh)", target.host, target.port);
        let config = Arc::new(client::Config::default());
        let mut handle = time::timeout(
            deadline,
            client::connect(config, (target.host.as_str(), target.port), AcceptingHost),
        )
        .await
        .map_err(|_| connect_timeout(target))??;

        let auth = handle
            .authenticate_password(target.username.as_str(), target.password.expose_secret())
            .await?;
        if !auth.success() {
            return Err(QueryError::Auth {
                user: target.username.clone(),
            });
        }

        let channel = handle.channel_open_session().await?;
        channel.request_shell(true).await?;

        Ok(Self {
            stream: BufReader::new(Box::new(channel.into_stream()) as Box<dyn ByteStream>),
            ssh: Some(handle),
            deadline,
        })
    }

    /// Drain the query port's banner, tolerating 0, 1 or 2 lines.
    async fn consume_greeting(&mut self) {
        for i in 0..2 {
            let mut line = String::new();
            match time::timeout(GREETING_GRACE, self.stream.read_line(&mut line)).await {
                Ok(Ok(0)) => break, // EOF surfaces on the first real read
                Ok(Ok(_)) => {
                    let line = line.trim();
                    if i == 0 && !line.contains("TS3") {
                        debug!("unexpected greeting line: {line:?}");
                    }
                }
                Ok(Err(e)) => {
                    debug!("greeting read failed: {e}");
                    break;
                }
                Err(_) => break, // banner shorter than expected
            }
        }
    }

    /// Read one newline-terminated line, bounded by the deadline.
    pub async fn read_line(&mut self) -> io::Result<String> {
        let mut line = String::new();
        let n = time::timeout(self.deadline, self.stream.read_line(&mut line))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "read deadline exceeded"))??;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by server",
            ));
        }
        Ok(line)
    }

    /// Write one line (newline appended), bounded by the deadline.
    pub async fn write_line(&mut self, line: &str) -> io::Result<()> {
        time::timeout(self.deadline, async {
            self.stream.write_all(line.as_bytes()).await?;
            self.stream.write_all(b"\n").await?;
            self.stream.flush().await
        })
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "write deadline exceeded"))?
    }

    /// Tear the carrier down. Best-effort: the peer may already be gone.
    pub async fn close(&mut self) {
        let _ = time::timeout(self.deadline, async {
            let _ = self.stream.shutdown().await;
            if let Some(handle) = self.ssh.take() {
                let _ = handle
                    .disconnect(Disconnect::ByApplication, "closing", "en")
                    .await;
            }
        })
        .await;
    }
}

fn connect_timeout(target: &TargetConfig) -> QueryError {
    QueryError::Io(io::Error::new(
        io::ErrorKind::TimedOut,
        format!("connect to {}:{} timed out", target.host, target.port),
    ))
}
