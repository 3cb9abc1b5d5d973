use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use super::{NodeDefinition, RouteDefinition};

/// Generates structural ids (`to1`, `choice2`, `route3`).
///
/// One factory is shared by all routes of an engine so generated ids are
/// unique across routes.
#[derive(Debug, Default)]
pub struct NodeIdFactory {
    counters: Mutex<HashMap<String, u64>>,
    routes: AtomicU64,
}

impl NodeIdFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_id(
        &self,
        node: &NodeDefinition,
    ) -> String {
        let mut counters = self.counters.lock().unwrap();
        let counter = counters.entry(node.short_name().to_string()).or_insert(0);
        *counter += 1;
        format!("{}{}", node.short_name(), counter)
    }

    pub fn create_route_id(&self) -> String {
        format!("route{}", self.routes.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Assign ids to every node without one, depth-first.
    pub fn assign_ids(
        &self,
        nodes: &mut [NodeDefinition],
    ) {
        for node in nodes {
            if node.id.is_none() {
                node.id = Some(self.create_id(node));
                node.custom_id = false;
            }
            self.assign_ids(&mut node.children);
        }
    }

    /// Assign the route id (if missing) and ids of all its nodes.
    pub fn assign_route(
        &self,
        route: &mut RouteDefinition,
    ) {
        if route.id.is_none() {
            route.id = Some(self.create_route_id());
        }
        self.assign_ids(&mut route.outputs);
        for intercept in &mut route.intercept_send_to_endpoints {
            self.assign_ids(&mut intercept.outputs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeKind;

    #[test]
    fn test_ids_are_per_short_name() {
        let factory = NodeIdFactory::new();
        let mut nodes = vec![
            NodeDefinition::to("mock:a"),
            NodeDefinition::new(NodeKind::Multicast).with_children(vec![NodeDefinition::to("mock:b")]),
            NodeDefinition::to("mock:c").with_id("custom"),
        ];
        factory.assign_ids(&mut nodes);

        assert_eq!(nodes[0].id(), Some("to1"));
        assert_eq!(nodes[1].id(), Some("multicast1"));
        assert_eq!(nodes[1].children()[0].id(), Some("to2"));
        assert_eq!(nodes[2].id(), Some("custom"));
        assert!(nodes[2].has_custom_id());
        assert!(!nodes[0].has_custom_id());
    }

    #[test]
    fn test_route_ids() {
        let factory = NodeIdFactory::new();
        assert_eq!(factory.create_route_id(), "route1");
        assert_eq!(factory.create_route_id(), "route2");
    }
}
