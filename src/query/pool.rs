//! Bounded per-target session pool.
//!
//! The semaphore counts checked-out sessions; idle sessions hold no
//! permits. A new session is only constructed under a claimed permit
//! with the idle queue observed empty, so idle + checked-out never
//! exceeds the configured capacity. `release` re-queues the session
//! before its permit drops, so a waiter woken by the permit always
//! finds the session it was promised.

use crate::config::TargetConfig;
use crate::error::{QueryError, Result};
use crate::query::session::QuerySession;
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time;
use tracing::{debug, warn};

/// How long `acquire` waits for an idle session or a freed slot before
/// reporting exhaustion.
const ACQUIRE_WAIT: Duration = Duration::from_secs(10);

pub struct SessionPool {
    target: TargetConfig,
    command_timeout: Duration,
    capacity: usize,
    slots: Arc<Semaphore>,
    idle: Mutex<VecDeque<QuerySession>>,
}

/// A session checked out of a pool. Moves by value: hand it back with
/// [`SessionPool::release`] when every command on it succeeded, or
/// [`SessionPool::discard`] once it is no longer trusted. Dropping it
/// outright also frees the slot; the connection then dies with the
/// socket instead of getting an orderly shutdown.
pub struct PooledSession {
    session: QuerySession,
    _permit: OwnedSemaphorePermit,
}

impl std::fmt::Debug for PooledSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledSession")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl Deref for PooledSession {
    type Target = QuerySession;

    fn deref(&self) -> &Self::Target {
        &self.session
    }
}

impl DerefMut for PooledSession {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.session
    }
}

impl SessionPool {
    pub fn new(target: TargetConfig, capacity: usize, command_timeout: Duration) -> Self {
        Self {
            target,
            command_timeout,
            capacity,
            slots: Arc::new(Semaphore::new(capacity)),
            idle: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Check a session out, reusing an idle one when possible and
    /// connecting a fresh one otherwise. Waits up to ten seconds for a
    /// slot under contention; a constructor failure frees the claimed
    /// slot before the error propagates.
    pub async fn acquire(&self) -> Result<PooledSession> {
        let permit = match time::timeout(ACQUIRE_WAIT, Arc::clone(&self.slots).acquire_owned())
            .await
        {
            Ok(Ok(permit)) => permit,
            // The semaphore is never closed.
            Ok(Err(_)) => return Err(QueryError::PoolExhausted),
            Err(_) => return Err(QueryError::PoolExhausted),
        };

        if let Some(session) = self.idle.lock().await.pop_front() {
            return Ok(PooledSession {
                session,
                _permit: permit,
            });
        }

        match QuerySession::connect(&self.target, self.command_timeout).await {
            Ok(session) => {
                debug!(
                    "pool for {} opened session #{}",
                    self.target.label(),
                    session.id()
                );
                Ok(PooledSession {
                    session,
                    _permit: permit,
                })
            }
            Err(e) => {
                drop(permit);
                Err(e)
            }
        }
    }

    /// Return a healthy session for reuse. Ownership transfers fully;
    /// the caller keeps nothing that could race a future borrower.
    pub async fn release(&self, pooled: PooledSession) {
        let PooledSession { session, _permit } = pooled;

        let mut idle = self.idle.lock().await;
        if idle.len() >= self.capacity {
            // Cannot happen while the permit accounting holds; close
            // rather than grow past the bound.
            warn!(
                "idle queue full for {}, closing session #{}",
                self.target.label(),
                session.id()
            );
            drop(idle);
            session.close().await;
            return;
        }
        idle.push_back(session);
        drop(idle);
        // _permit drops here, after the session is queued.
    }

    /// Close a session the caller no longer trusts and free its slot.
    pub async fn discard(&self, pooled: PooledSession) {
        let PooledSession { session, _permit } = pooled;
        debug!(
            "pool for {} discarding session #{}",
            self.target.label(),
            session.id()
        );
        session.close().await;
    }

    /// Close every idle session. Checked-out sessions are their
    /// borrowers' responsibility.
    pub async fn shutdown(&self) {
        let drained: Vec<QuerySession> = self.idle.lock().await.drain(..).collect();
        for session in drained {
            session.close().await;
        }
    }
}
