//! Authenticated ServerQuery command channel.
//!
//! A session owns exactly one transport and is owned by exactly one
//! caller at a time - the pool's checkout discipline guarantees a
//! session never has two commands in flight, so there is no locking
//! here.

use crate::config::{TargetConfig, TransportKind};
use crate::error::{QueryError, Result};
use crate::query::escape::{escape, unescape};
use crate::query::transport::Transport;
use secrecy::ExposeSecret;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

pub struct QuerySession {
    id: u64,
    target: String,
    transport: Transport,
}

impl std::fmt::Debug for QuerySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuerySession")
            .field("id", &self.id)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl QuerySession {
    /// Open a transport to the target and run the handshake it needs.
    ///
    /// The SSH carrier authenticates at the tunnel layer and is ready
    /// as soon as the shell is up; the raw query port expects an
    /// explicit `login` command after its banner. A failed login
    /// closes the transport before the error propagates.
    pub async fn connect(target: &TargetConfig, timeout: Duration) -> Result<Self> {
        let mut session = Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            target: target.label(),
            transport: Transport::connect(target, timeout).await?,
        };

        if target.protocol == TransportKind::Tcp {
            let login = format!(
                "login {} {}",
                escape(&target.username),
                escape(target.password.expose_secret())
            );
            if let Err(e) = session.execute(&login).await {
                session.transport.close().await;
                return Err(e);
            }
        }

        debug!("session #{} to {} established", session.id, session.target);
        Ok(session)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Send one command and collect its response body.
    ///
    /// Lines are read until the `error id=<n> msg=<text>` terminator;
    /// everything before it is trimmed and newline-joined. `id == 0`
    /// returns the body (possibly empty - write-only commands answer
    /// with nothing but the terminator), any other id returns a
    /// [`QueryError::Server`] and the body is dropped. I/O failures
    /// and deadline expiries abort immediately.
    pub async fn execute(&mut self, command: &str) -> Result<String> {
        self.transport.write_line(command).await?;

        let mut body = String::new();
        loop {
            let line = self.transport.read_line().await?;
            let line = line.trim();

            if let Some(status) = parse_status_line(line) {
                if status.id == 0 {
                    return Ok(body);
                }
                return Err(QueryError::Server {
                    id: status.id,
                    message: status.message,
                });
            }

            if !body.is_empty() {
                body.push('\n');
            }
            body.push_str(line);
        }
    }

    /// Close the underlying transport. Consumes the session; a closed
    /// channel must never be handed back to the pool.
    pub async fn close(mut self) {
        debug!("closing session #{} to {}", self.id, self.target);
        self.transport.close().await;
    }
}

struct StatusLine {
    id: u32,
    message: String,
}

/// Recognize the response terminator. A line that merely starts with
/// "error" but carries no parseable `id=` field is treated as body, not
/// as a terminator.
fn parse_status_line(line: &str) -> Option<StatusLine> {
    let rest = line.strip_prefix("error ")?;

    let mut id = None;
    let mut message = String::new();
    for token in rest.split(' ') {
        if let Some(v) = token.strip_prefix("id=") {
            id = v.parse().ok();
        } else if let Some(v) = token.strip_prefix("msg=") {
            message = unescape(v);
        }
    }

    id.map(|id| StatusLine { id, message })
}
