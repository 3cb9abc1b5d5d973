use std::fmt;

use regex::Regex;

use crate::{
    Result, RouteError,
    model::{NodeDefinition, RouteDefinition},
    runtime::matches_endpoint,
};

/// Position of a node as child indices, starting at the route's outputs.
///
/// Paths order like a depth-first pre-order walk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    pub fn new(indices: Vec<usize>) -> Self {
        Self(indices)
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Index of the node among its siblings.
    pub fn index(&self) -> Option<usize> {
        self.0.last().copied()
    }

    /// Path of the parent node; `None` for top-level nodes.
    pub fn parent(&self) -> Option<NodePath> {
        match self.0.len() {
            0 | 1 => None,
            n => Some(NodePath(self.0[..n - 1].to_vec())),
        }
    }

    fn child(
        &self,
        index: usize,
    ) -> NodePath {
        let mut indices = self.0.clone();
        indices.push(index);
        NodePath(indices)
    }
}

impl fmt::Display for NodePath {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let indices = self.0.iter().map(|i| i.to_string()).collect::<Vec<_>>().join("/");
        write!(f, "/{}", indices)
    }
}

/// A node found in a route together with its path.
#[derive(Debug, Clone)]
pub struct NodeRef<'a> {
    pub path: NodePath,
    pub node: &'a NodeDefinition,
}

/// Every node of the route with its path, in depth-first pre-order.
pub fn index(route: &RouteDefinition) -> Vec<NodeRef<'_>> {
    fn visit<'a>(
        nodes: &'a [NodeDefinition],
        parent: &NodePath,
        out: &mut Vec<NodeRef<'a>>,
    ) {
        for (i, node) in nodes.iter().enumerate() {
            let path = parent.child(i);
            out.push(NodeRef {
                path: path.clone(),
                node,
            });
            visit(node.children(), &path, out);
        }
    }

    let mut out = Vec::new();
    visit(route.outputs(), &NodePath::default(), &mut out);
    out
}

pub fn node_at<'a>(
    route: &'a RouteDefinition,
    path: &NodePath,
) -> Option<&'a NodeDefinition> {
    let (first, rest) = path.indices().split_first()?;
    let mut node = route.outputs().get(*first)?;
    for i in rest {
        node = node.children().get(*i)?;
    }
    Some(node)
}

/// The parent node of `path`, `None` for top-level nodes.
pub fn parent_of<'a>(
    route: &'a RouteDefinition,
    path: &NodePath,
) -> Option<&'a NodeDefinition> {
    node_at(route, &path.parent()?)
}

/// The sibling list holding the node at `path`.
pub(crate) fn siblings_mut<'a>(
    route: &'a mut RouteDefinition,
    path: &NodePath,
) -> Option<&'a mut Vec<NodeDefinition>> {
    let (_, parents) = path.indices().split_last()?;
    let mut nodes = route.outputs_mut();
    for i in parents {
        nodes = nodes.get_mut(*i)?.children_mut();
    }
    Some(nodes)
}

/// First node in depth-first order whose id is exactly `id`.
pub fn find_by_id<'a>(
    route: &'a RouteDefinition,
    id: &str,
) -> Result<NodeRef<'a>> {
    index(route)
        .into_iter()
        .find(|r| r.node.id() == Some(id))
        .ok_or_else(|| RouteError::NotFound(format!("Cannot find node with id: {} in route: {}", id, route)))
}

/// Nodes sending to an endpoint matching `pattern` (exact, wildcard or regex).
pub fn find_by_endpoint_uri<'a>(
    route: &'a RouteDefinition,
    pattern: &str,
) -> Result<Vec<NodeRef<'a>>> {
    let matches = index(route).into_iter().filter(|r| r.node.kind().endpoint_uri().is_some_and(|uri| matches_endpoint(uri, pattern))).collect();
    non_empty(route, pattern, matches)
}

/// Nodes whose to-string form contains a match of the regex `pattern`.
pub fn find_by_to_string<'a>(
    route: &'a RouteDefinition,
    pattern: &str,
) -> Result<Vec<NodeRef<'a>>> {
    let re = Regex::new(pattern)?;
    let matches = index(route).into_iter().filter(|r| re.is_match(&r.node.to_string())).collect();
    non_empty(route, pattern, matches)
}

/// Nodes of a kind, by short name (`to`, `choice`, `multicast`, ...).
pub fn find_by_type<'a>(
    route: &'a RouteDefinition,
    short_name: &str,
) -> Result<Vec<NodeRef<'a>>> {
    let matches = index(route).into_iter().filter(|r| r.node.short_name() == short_name).collect();
    non_empty(route, short_name, matches)
}

fn non_empty<'a>(
    route: &RouteDefinition,
    pattern: &str,
    matches: Vec<NodeRef<'a>>,
) -> Result<Vec<NodeRef<'a>>> {
    if matches.is_empty() {
        return Err(RouteError::IllegalArgument(format!("There are no outputs which matches: {} in the route: {}", pattern, route)));
    }
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeIdFactory, Predicate, RouteBuilder, StepsDsl};

    fn route() -> RouteDefinition {
        let mut route = RouteBuilder::from("direct:start")
            .route_id("r1")
            .to("mock:foo")
            .id("foo")
            .choice(|c| c.when(Predicate::header_exists("vip"), |s| s.to("mock:bar")).otherwise(|s| s.to("seda:bar")))
            .to("mock:result")
            .build();
        NodeIdFactory::new().assign_route(&mut route);
        route
    }

    #[test]
    fn test_index_is_pre_order() {
        let route = route();
        let paths: Vec<String> = index(&route).iter().map(|r| r.path.to_string()).collect();
        assert_eq!(paths, vec!["/0", "/1", "/1/0", "/1/0/0", "/1/1", "/1/1/0", "/2"]);
    }

    #[test]
    fn test_find_by_id() {
        let route = route();
        let found = find_by_id(&route, "foo").unwrap();
        assert_eq!(found.path, NodePath::new(vec![0]));
        assert_eq!(found.node.label(), "mock:foo");

        assert!(matches!(find_by_id(&route, "FOO"), Err(RouteError::NotFound(_))));
    }

    #[test]
    fn test_find_by_endpoint_uri() {
        let route = route();
        let found = find_by_endpoint_uri(&route, "mock:*").unwrap();
        let labels: Vec<String> = found.iter().map(|r| r.node.label()).collect();
        assert_eq!(labels, vec!["mock:foo", "mock:bar", "mock:result"]);

        let found = find_by_endpoint_uri(&route, "bar").unwrap();
        assert_eq!(found.len(), 2);

        let err = find_by_endpoint_uri(&route, "kafka:*").unwrap_err();
        assert_eq!(err.to_string(), format!("There are no outputs which matches: kafka:* in the route: {}", route));
    }

    #[test]
    fn test_find_by_to_string_contains() {
        let route = route();
        let found = find_by_to_string(&route, "mock:ba").unwrap();
        // the choice, the when clause and the send itself
        assert_eq!(found.iter().map(|r| r.node.short_name()).collect::<Vec<_>>(), vec!["choice", "when", "to"]);

        assert!(matches!(find_by_to_string(&route, "nothing"), Err(RouteError::IllegalArgument(_))));
        assert!(find_by_to_string(&route, "(").is_err());
    }

    #[test]
    fn test_find_by_type_and_parent() {
        let route = route();
        let found = find_by_type(&route, "otherwise").unwrap();
        assert_eq!(parent_of(&route, &found[0].path).map(|n| n.short_name()), Some("choice"));
        assert!(parent_of(&route, &NodePath::new(vec![0])).is_none());
        assert!(node_at(&route, &NodePath::new(vec![9])).is_none());
    }
}
