use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use super::TraceEventMessage;
use crate::{Result, common::MemCache};

/// Bounded store of the most recent trace events.
pub struct TraceBacklog {
    events: MemCache<u64, Arc<TraceEventMessage>>,
    counter: AtomicU64,
}

impl TraceBacklog {
    pub fn new(size: usize) -> Self {
        Self {
            events: MemCache::new(size),
            counter: AtomicU64::new(0),
        }
    }

    pub fn push(
        &self,
        event: Arc<TraceEventMessage>,
    ) {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        self.events.set(seq, event);
    }

    /// Events of one node, oldest first.
    pub fn dump_traced_messages(
        &self,
        node_id: &str,
    ) -> Vec<Arc<TraceEventMessage>> {
        self.sorted().into_iter().filter(|e| e.to_node_id == node_id).collect()
    }

    /// All events, oldest first.
    pub fn dump_all(&self) -> Vec<Arc<TraceEventMessage>> {
        self.sorted()
    }

    pub fn dump_all_as_json(&self) -> Result<String> {
        let sorted = self.sorted_ref();
        let events: Vec<&TraceEventMessage> = sorted.iter().map(|(_, e)| e.as_ref()).collect();
        Ok(serde_json::to_string_pretty(&events)?)
    }

    pub fn clear(&self) {
        self.events.clear();
    }

    fn sorted_ref(&self) -> Vec<(u64, Arc<TraceEventMessage>)> {
        let mut entries: Vec<(u64, Arc<TraceEventMessage>)> = self.events.entries().into_iter().map(|(k, v)| (*k, v)).collect();
        entries.sort_by_key(|(seq, _)| *seq);
        entries
    }

    fn sorted(&self) -> Vec<Arc<TraceEventMessage>> {
        self.sorted_ref().into_iter().map(|(_, e)| e).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::NodeDefinition,
        runtime::Exchange,
        tracer::TraceDirection,
    };

    #[test]
    fn test_dump_by_node() {
        let backlog = TraceBacklog::new(100);
        let exchange = Exchange::with_body("x");
        for id in ["to1", "to2", "to1"] {
            backlog.push(Arc::new(TraceEventMessage::new(&NodeDefinition::to("mock:a").with_id(id), &exchange, TraceDirection::Complete)));
        }

        assert_eq!(backlog.dump_traced_messages("to1").len(), 2);
        assert_eq!(backlog.dump_all().len(), 3);

        let json: serde_json::Value = serde_json::from_str(&backlog.dump_all_as_json().unwrap()).unwrap();
        assert_eq!(json.as_array().map(|a| a.len()), Some(3));

        backlog.clear();
        assert!(backlog.dump_all().is_empty());
    }
}
