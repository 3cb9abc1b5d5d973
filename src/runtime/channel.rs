use std::sync::{Arc, RwLock};

use futures::future::BoxFuture;
use tokio::runtime::Handle;

use crate::{
    Result, ShareLock,
    common::{BroadcastQueue, Shutdown},
    events::{Event, Log, Message},
    runtime::ExchangeId,
};

macro_rules! dispatch_event {
    ($handles:expr, $(&$item:ident), +) => {
        let handlers = $handles.read().unwrap();
        for handle in handlers.iter() {
            (handle)($(&$item),+);
        }
    };
}

macro_rules! dispatch_event_async {
    ($handles:expr, $(&$item:ident), +) => {
        let handles = $handles.clone();

        tokio::spawn(async move {
            let handlers = handles.read().unwrap().clone();
            for handle in handlers.iter() {
                (handle)($(&$item),+).await;
            }
        });
    };
}

const EVENT_QUEUE_SIZE: usize = 2048;
const LOG_QUEUE_SIZE: usize = 4096;

pub type ExchangeEventHandle = Arc<dyn Fn(&Event<Message>) + Send + Sync>;
pub type ExchangeLogHandle = Arc<dyn Fn(&Event<Log>) + Send + Sync>;
pub type ExchangeEventHandleAsync = Arc<dyn Fn(&Event<Message>) -> BoxFuture<'static, ()> + Send + Sync>;
pub type ExchangeLogHandleAsync = Arc<dyn Fn(&Event<Log>) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ChannelOptions {
    /// use the glob pattern to match the route id
    /// eg. orders*
    pub route_id: String,

    /// use the glob pattern to match the exchange id
    pub exchange_id: String,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            route_id: "*".to_string(),
            exchange_id: "*".to_string(),
        }
    }
}

#[allow(unused)]
impl ChannelOptions {
    pub fn new(
        route_id: String,
        exchange_id: String,
    ) -> Self {
        Self {
            route_id,
            exchange_id,
        }
    }

    pub fn with_route_id(route_id: String) -> Self {
        Self {
            route_id,
            exchange_id: "*".to_string(),
        }
    }

    pub fn with_exchange_id(exchange_id: String) -> Self {
        Self {
            route_id: "*".to_string(),
            exchange_id,
        }
    }
}

/// Pub/sub channel for exchange events and log lines.
#[derive(Clone)]
pub struct Channel {
    event_queue: Arc<BroadcastQueue<Event<Message>>>,
    log_queue: Arc<BroadcastQueue<Event<Log>>>,

    events: ShareLock<Vec<ExchangeEventHandle>>,
    logs: ShareLock<Vec<ExchangeLogHandle>>,
    events_async: ShareLock<Vec<ExchangeEventHandleAsync>>,
    logs_async: ShareLock<Vec<ExchangeLogHandleAsync>>,

    runtime: Handle,
    shutdown: Arc<Shutdown>,
}

impl Channel {
    pub(crate) fn new(runtime: Handle) -> Self {
        Self {
            event_queue: BroadcastQueue::new(EVENT_QUEUE_SIZE),
            log_queue: BroadcastQueue::new(LOG_QUEUE_SIZE),
            events: Arc::new(RwLock::new(Vec::new())),
            logs: Arc::new(RwLock::new(Vec::new())),
            events_async: Arc::new(RwLock::new(Vec::new())),
            logs_async: Arc::new(RwLock::new(Vec::new())),
            runtime,
            shutdown: Arc::new(Shutdown::new()),
        }
    }

    pub(crate) fn log_queue(&self) -> Arc<BroadcastQueue<Event<Log>>> {
        self.log_queue.clone()
    }

    pub(crate) fn event_queue(&self) -> Arc<BroadcastQueue<Event<Message>>> {
        self.event_queue.clone()
    }

    /// Publish an event. Events published while nobody listens are dropped.
    pub(crate) fn emit(
        &self,
        message: Message,
    ) {
        let _ = self.event_queue.send(Event::new(&message));
    }

    pub(crate) fn emit_log(
        &self,
        log: Log,
    ) {
        let _ = self.log_queue.send(Event::new(&log));
    }

    pub(crate) fn listen(&self) {
        let mut event_queue = self.event_queue.subscribe();
        let mut log_queue = self.log_queue.subscribe();
        let events = self.events.clone();
        let logs = self.logs.clone();
        let events_async = self.events_async.clone();
        let logs_async = self.logs_async.clone();

        let shutdown = self.shutdown.clone();
        self.runtime.spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    Ok(e) = event_queue.recv() => {
                        let evt = e.clone();
                        dispatch_event!(events, &evt);
                        dispatch_event_async!(events_async, &e);
                    }
                    Ok(log) = log_queue.recv() => {
                        let l = log.clone();
                        dispatch_event!(logs, &l);
                        dispatch_event_async!(logs_async, &log);
                    }
                }
            }
        });
    }

    pub(crate) fn shutdown(&self) {
        self.shutdown.shutdown();
    }
}

/// Subscription helper filtering channel events by route and exchange id.
#[derive(Clone)]
pub struct ChannelEvent {
    channel: Arc<Channel>,

    glob: (globset::GlobMatcher, globset::GlobMatcher),
}

#[allow(unused)]
impl ChannelEvent {
    pub fn channel(
        channel: Arc<Channel>,
        options: ChannelOptions,
    ) -> Result<Self> {
        Ok(Self {
            channel,
            glob: (globset::Glob::new(&options.route_id)?.compile_matcher(), globset::Glob::new(&options.exchange_id)?.compile_matcher()),
        })
    }

    pub fn on_complete(
        &self,
        f: impl Fn(ExchangeId) + Send + Sync + 'static,
    ) {
        let glob = self.glob.clone();

        self.channel.events.write().unwrap().push(Arc::new(move |e| {
            if e.is_complete() && is_match(&glob, &e.route_id, &e.exchange_id) {
                f(e.exchange_id.clone());
            }
        }));
    }

    pub fn on_failed(
        &self,
        f: impl Fn(&Event<Message>) + Send + Sync + 'static,
    ) {
        let glob = self.glob.clone();

        self.channel.events.write().unwrap().push(Arc::new(move |e| {
            if e.is_error() && is_match(&glob, &e.route_id, &e.exchange_id) {
                f(e);
            }
        }));
    }

    pub fn on_event(
        &self,
        f: impl Fn(&Event<Message>) + Send + Sync + 'static,
    ) {
        let glob = self.glob.clone();

        self.channel.events.write().unwrap().push(Arc::new(move |e| {
            if is_match(&glob, &e.route_id, &e.exchange_id) {
                f(e);
            }
        }));
    }

    pub fn on_log(
        &self,
        f: impl Fn(&Event<Log>) + Send + Sync + 'static,
    ) {
        let glob = self.glob.clone();

        self.channel.logs.write().unwrap().push(Arc::new(move |e| {
            if is_match(&glob, &e.route_id, &e.exchange_id) {
                f(e);
            }
        }));
    }

    pub fn on_event_async<F>(
        &self,
        f: F,
    ) where
        F: Fn(&Event<Message>) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        let glob = self.glob.clone();

        self.channel.events_async.write().unwrap().push(Arc::new(move |e| {
            if is_match(&glob, &e.route_id, &e.exchange_id) {
                f(e)
            } else {
                Box::pin(async {})
            }
        }));
    }

    pub fn on_log_async<F>(
        &self,
        f: F,
    ) where
        F: Fn(&Event<Log>) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        let glob = self.glob.clone();

        self.channel.logs_async.write().unwrap().push(Arc::new(move |e| {
            if is_match(&glob, &e.route_id, &e.exchange_id) {
                f(e)
            } else {
                Box::pin(async {})
            }
        }));
    }
}

fn is_match(
    glob: &(globset::GlobMatcher, globset::GlobMatcher),
    route_id: &str,
    exchange_id: &str,
) -> bool {
    let (pat_route, pat_exchange) = glob;
    pat_route.is_match(route_id) && pat_exchange.is_match(exchange_id)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::events::ExchangeEvent;

    fn message(
        route_id: &str,
        event: ExchangeEvent,
    ) -> Message {
        Message {
            exchange_id: "ex-1".to_string(),
            route_id: route_id.to_string(),
            event,
        }
    }

    #[tokio::test]
    async fn test_on_event_filters_by_route() {
        let channel = Arc::new(Channel::new(Handle::current()));
        let (tx, rx) = flume::unbounded();
        ChannelEvent::channel(channel.clone(), ChannelOptions::with_route_id("orders*".to_string())).unwrap().on_event(move |e| {
            let _ = tx.send(e.route_id.clone());
        });
        channel.listen();

        channel.emit(message("billing", ExchangeEvent::Created));
        channel.emit(message("orders-eu", ExchangeEvent::Created));

        let got = tokio::time::timeout(Duration::from_secs(1), rx.recv_async()).await.unwrap().unwrap();
        assert_eq!(got, "orders-eu");
        channel.shutdown();
    }

    #[tokio::test]
    async fn test_on_complete_and_failed() {
        let channel = Arc::new(Channel::new(Handle::current()));
        let (tx, rx) = flume::unbounded();
        let sub = ChannelEvent::channel(channel.clone(), ChannelOptions::default()).unwrap();
        let tx2 = tx.clone();
        sub.on_complete(move |id| {
            let _ = tx.send(format!("complete:{}", id));
        });
        sub.on_failed(move |e| {
            let _ = tx2.send(format!("failed:{}", e.exchange_id));
        });
        channel.listen();

        channel.emit(message("r", ExchangeEvent::Completed));
        channel.emit(message("r", ExchangeEvent::Failed(crate::RouteError::Processing("x".to_string()))));

        let first = tokio::time::timeout(Duration::from_secs(1), rx.recv_async()).await.unwrap().unwrap();
        let second = tokio::time::timeout(Duration::from_secs(1), rx.recv_async()).await.unwrap().unwrap();
        assert_eq!(first, "complete:ex-1");
        assert_eq!(second, "failed:ex-1");
        channel.shutdown();
    }

    #[test]
    fn test_invalid_glob() {
        let channel = Arc::new(Channel::new(tokio::runtime::Runtime::new().unwrap().handle().clone()));
        assert!(ChannelEvent::channel(channel, ChannelOptions::with_route_id("[".to_string())).is_err());
    }
}
