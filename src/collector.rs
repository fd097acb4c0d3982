//! Collection orchestrator.
//!
//! One scrape cycle fans out twice: a task per configured server lists
//! that server's virtual servers, then a task per virtual server
//! selects it, reads `serverinfo`, and walks the client list. Every
//! task borrows a session from the server's pool and decides on return
//! whether the session is still trustworthy. Records are pushed to the
//! [`RecordSink`] as they are produced, but [`Collector::collect`] only
//! returns after every spawned task has finished - a cycle is never
//! reported complete while sub-tasks are still running.
//!
//! Failures stay local: a virtual server whose selection fails is
//! skipped for the cycle (its session discarded) without touching its
//! siblings, and an unreachable server only marks itself down.

use crate::config::{Config, TargetConfig};
use crate::error::Result;
use crate::query::{parse_response, PooledSession, Record, SessionPool};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Consumer of scraped state. The exporter's Prometheus registry
/// implements this; tests substitute their own.
pub trait RecordSink: Send + Sync {
    /// Reachability of one configured server for the current cycle.
    fn server_up(&self, server: &str, reachable: bool);
    /// Summary fields of one virtual server (`serverinfo`).
    fn virtual_server(&self, server: &str, virtual_server: &str, fields: &Record);
    /// One connected voice client.
    fn client(&self, server: &str, virtual_server: &str, fields: &Record);
}

const CLIENT_LIST: &str = "clientlist -uid -away -voice -times -groups -info -country -ip -badges";

pub struct Collector {
    targets: Vec<Arc<TargetConfig>>,
    pools: HashMap<String, Arc<SessionPool>>,
    sink: Arc<dyn RecordSink>,
}

impl Collector {
    /// Build one pool per configured server. Pools live as long as the
    /// collector; sessions inside them are created lazily on first
    /// acquisition.
    pub fn new(config: &Config, sink: Arc<dyn RecordSink>) -> Self {
        let mut targets = Vec::with_capacity(config.servers.len());
        let mut pools = HashMap::with_capacity(config.servers.len());
        for target in &config.servers {
            let target = Arc::new(target.clone());
            pools.insert(
                target.label(),
                Arc::new(SessionPool::new(
                    (*target).clone(),
                    config.scrape.pool_size,
                    config.scrape.command_timeout(),
                )),
            );
            targets.push(target);
        }
        Self {
            targets,
            pools,
            sink,
        }
    }

    /// Scrape every configured server once, all servers concurrently.
    /// Returns the number of reachable servers, after all fan-out
    /// tasks have completed.
    pub async fn collect(&self) -> usize {
        let mut tasks = Vec::with_capacity(self.targets.len());
        for target in &self.targets {
            let target = Arc::clone(target);
            let pool = Arc::clone(&self.pools[&target.label()]);
            let sink = Arc::clone(&self.sink);
            tasks.push(tokio::spawn(collect_server(target, pool, sink)));
        }

        let mut reachable = 0;
        for task in tasks {
            match task.await {
                Ok(true) => reachable += 1,
                Ok(false) => {}
                Err(e) => warn!("server collection task failed: {e}"),
            }
        }
        reachable
    }

    /// Close every idle pooled session.
    pub async fn shutdown(&self) {
        for pool in self.pools.values() {
            pool.shutdown().await;
        }
    }
}

async fn collect_server(
    target: Arc<TargetConfig>,
    pool: Arc<SessionPool>,
    sink: Arc<dyn RecordSink>,
) -> bool {
    let label = target.label();

    let mut session = match pool.acquire().await {
        Ok(session) => session,
        Err(e) => {
            warn!("failed to get connection for {label}: {e}");
            sink.server_up(&label, false);
            return false;
        }
    };

    let response = match session.execute("serverlist").await {
        Ok(response) => {
            pool.release(session).await;
            response
        }
        Err(e) => {
            warn!("failed to list virtual servers on {label}: {e}");
            pool.discard(session).await;
            sink.server_up(&label, false);
            return false;
        }
    };
    sink.server_up(&label, true);

    let mut tasks = Vec::new();
    for record in parse_response(&response) {
        let sid = record.get_or_empty("virtualserver_id");
        if sid.is_empty() {
            continue;
        }
        tasks.push(tokio::spawn(collect_virtual_server(
            label.clone(),
            Arc::clone(&pool),
            sid.to_string(),
            Arc::clone(&sink),
        )));
    }
    for task in tasks {
        if let Err(e) = task.await {
            warn!("virtual server task on {label} failed: {e}");
        }
    }
    true
}

async fn collect_virtual_server(
    server: String,
    pool: Arc<SessionPool>,
    sid: String,
    sink: Arc<dyn RecordSink>,
) {
    let mut session = match pool.acquire().await {
        Ok(session) => session,
        Err(e) => {
            warn!("failed to get connection for virtual server {sid} on {server}: {e}");
            return;
        }
    };

    // Any failed command invalidates the session. Some protocol errors
    // (an invalid server id, say) leave the channel healthy, but reuse
    // after one is not worth telling those apart.
    match scrape_virtual_server(&mut session, &server, &sid, sink.as_ref()).await {
        Ok(()) => pool.release(session).await,
        Err(e) => {
            warn!("scrape of virtual server {sid} on {server} failed: {e}");
            pool.discard(session).await;
        }
    }
}

async fn scrape_virtual_server(
    session: &mut PooledSession,
    server: &str,
    sid: &str,
    sink: &dyn RecordSink,
) -> Result<()> {
    session.execute(&format!("use {sid}")).await?;

    let info = session.execute("serverinfo").await?;
    let Some(info) = parse_response(&info).into_iter().next() else {
        return Ok(());
    };
    let virtual_server = info.get_or_empty("virtualserver_name").to_string();
    sink.virtual_server(server, &virtual_server, &info);

    let clients = session.execute(CLIENT_LIST).await?;
    for client in parse_response(&clients) {
        // Skip the query identity and anything that is not a voice
        // client (client_type 1 is a ServerQuery connection).
        if client.get_or_empty("client_nickname") == "serveradmin"
            || client.get_or_empty("client_type") == "1"
        {
            continue;
        }
        sink.client(server, &virtual_server, &client);
    }

    Ok(())
}
