use std::sync::Arc;

use serde::Serialize;
use tokio::{runtime::Handle, sync::broadcast::error::RecvError};

use crate::{
    common::{MemCache, Shutdown},
    events::ExchangeEvent,
    runtime::Channel,
};

const ROUTE_STATS_CACHE_SIZE: usize = 1024;

/// Counters of one route, aggregated from the event channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RouteStats {
    /// exchanges created by the route
    pub total: u64,
    pub completed: u64,
    pub failed: u64,
    /// sends to endpoints performed by the route's nodes
    pub sent: u64,
    /// lines logged by the route's `log` nodes and endpoints
    pub logs: u64,
    pub last_failure: Option<String>,
}

pub struct Monitor {
    channel: Arc<Channel>,
    stats: Arc<MemCache<String, RouteStats>>,

    runtime: Handle,
    shutdown: Arc<Shutdown>,
}

impl Monitor {
    pub fn new(
        channel: Arc<Channel>,
        runtime: Handle,
        shutdown: Arc<Shutdown>,
    ) -> Self {
        Self {
            channel,
            stats: Arc::new(MemCache::new(ROUTE_STATS_CACHE_SIZE)),
            runtime,
            shutdown,
        }
    }

    pub fn stats(
        &self,
        route_id: &str,
    ) -> Option<RouteStats> {
        self.stats.get(&route_id.to_string())
    }

    pub fn remove(
        &self,
        route_id: &str,
    ) {
        self.stats.remove(&route_id.to_string());
    }

    pub fn monitor(&self) {
        let stats = self.stats.clone();
        let shutdown = self.shutdown.clone();
        let mut event_queue = self.channel.event_queue().subscribe();

        self.runtime.spawn(async move {
            loop {
                let event_msg = tokio::select! {
                    _ = shutdown.wait() => break,
                    msg = event_queue.recv() => match msg {
                        Ok(msg) => msg,
                        Err(RecvError::Lagged(n)) => {
                            tracing::warn!("route monitor lagged behind, {} events skipped", n);
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    },
                };

                let mut route = stats.get(&event_msg.route_id).unwrap_or_default();
                match &event_msg.event {
                    ExchangeEvent::Created => route.total += 1,
                    ExchangeEvent::Completed => route.completed += 1,
                    ExchangeEvent::Failed(e) => {
                        route.failed += 1;
                        route.last_failure = Some(e.to_string());
                    }
                    ExchangeEvent::Sent {
                        ..
                    } => route.sent += 1,
                    ExchangeEvent::Sending {
                        ..
                    } => continue,
                }
                stats.set(event_msg.route_id.clone(), route);
            }
        });

        let stats = self.stats.clone();
        let shutdown = self.shutdown.clone();
        let mut log_queue = self.channel.log_queue().subscribe();

        self.runtime.spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    Ok(log) = log_queue.recv() => {
                        let mut route = stats.get(&log.route_id).unwrap_or_default();
                        route.logs += 1;
                        stats.set(log.route_id.clone(), route);
                    }
                }
            }
        });
    }
}
