use std::fmt;

use super::matcher::{self, NodePath};
use crate::{
    Result, RouteError,
    model::{NodeDefinition, NodeIdFactory, RouteDefinition},
};

/// Which nodes an edit applies to.
#[derive(Debug, Clone, PartialEq)]
pub enum WeaveSelector {
    Id(String),
    ToUri(String),
    ToString(String),
    Type(String),
    /// Start of the top-level chain.
    First,
    /// End of the top-level chain.
    Last,
}

/// Narrows the matches of a selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    All,
    First,
    Last,
    Index(usize),
    /// Inclusive range of match indices.
    Range(usize, usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum WeaveOperation {
    Before,
    After,
    Replace,
    Remove,
}

/// A pending structural edit of a route.
#[derive(Debug, Clone, PartialEq)]
pub struct WeaveEdit {
    pub selector: WeaveSelector,
    pub selection: Selection,
    pub operation: WeaveOperation,
    pub replacement: Vec<NodeDefinition>,
}

impl WeaveEdit {
    pub fn new(
        selector: WeaveSelector,
        operation: WeaveOperation,
        replacement: Vec<NodeDefinition>,
    ) -> Self {
        Self {
            selector,
            selection: Selection::All,
            operation,
            replacement,
        }
    }

    pub fn with_selection(
        mut self,
        selection: Selection,
    ) -> Self {
        self.selection = selection;
        self
    }
}

impl fmt::Display for WeaveSelector {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            WeaveSelector::Id(id) => write!(f, "id {}", id),
            WeaveSelector::ToUri(pattern) => write!(f, "uri {}", pattern),
            WeaveSelector::ToString(pattern) => write!(f, "toString {}", pattern),
            WeaveSelector::Type(name) => write!(f, "type {}", name),
            WeaveSelector::First => write!(f, "first"),
            WeaveSelector::Last => write!(f, "last"),
        }
    }
}

/// Apply edits to a copy of `route`, in order. A later edit sees the result
/// of the earlier ones. The input route is never changed.
pub fn apply_edits(
    route: &RouteDefinition,
    edits: &[WeaveEdit],
    ids: &NodeIdFactory,
) -> Result<RouteDefinition> {
    let mut advised = route.clone();
    for edit in edits {
        apply_edit(&mut advised, edit, ids)?;
    }
    Ok(advised)
}

/// Apply one edit in place to every selected node.
///
/// Nodes are edited in reverse depth-first order so the paths of the
/// remaining matches stay valid. Inserted nodes get fresh ids.
pub fn apply_edit(
    route: &mut RouteDefinition,
    edit: &WeaveEdit,
    ids: &NodeIdFactory,
) -> Result<()> {
    match &edit.selector {
        WeaveSelector::First | WeaveSelector::Last => return add_at_end(route, edit, ids),
        _ => {}
    }

    let mut paths = select(route, edit)?;
    paths.sort();
    for path in paths.iter().rev() {
        let mut nodes = edit.replacement.clone();
        ids.assign_ids(&mut nodes);

        let index = path.index().unwrap_or_default();
        let Some(siblings) = matcher::siblings_mut(route, path) else {
            return Err(RouteError::NotFound(format!("No node at {}", path)));
        };
        let matched = siblings[index].to_string();
        let inserted = describe(&nodes);
        let count = nodes.len();
        let (at, removed, added) = match edit.operation {
            WeaveOperation::Before => {
                siblings.splice(index..index, nodes);
                (index, 0, count)
            }
            WeaveOperation::After => {
                siblings.splice(index + 1..index + 1, nodes);
                (index + 1, 0, count)
            }
            WeaveOperation::Replace => {
                siblings.splice(index..=index, nodes);
                (index, 1, count)
            }
            WeaveOperation::Remove => {
                siblings.remove(index);
                (index, 1, 0)
            }
        };
        if path.depth() == 1 {
            route.shift_stream_caching(at, removed, added);
        }

        if edit.operation == WeaveOperation::Remove {
            tracing::info!(route_id = %route.route_id(), "AdviceWith ({}) : [{}] --> remove", edit.selector, matched);
        } else {
            tracing::info!(route_id = %route.route_id(), "AdviceWith ({}) : [{}] --> {} [{}]", edit.selector, matched, edit.operation, inserted);
        }
    }
    Ok(())
}

fn add_at_end(
    route: &mut RouteDefinition,
    edit: &WeaveEdit,
    ids: &NodeIdFactory,
) -> Result<()> {
    if matches!(edit.operation, WeaveOperation::Replace | WeaveOperation::Remove) {
        return Err(RouteError::IllegalArgument(format!("Cannot {} at the {} position of route {}", edit.operation, edit.selector, route.route_id())));
    }

    let mut nodes = edit.replacement.clone();
    ids.assign_ids(&mut nodes);
    let inserted = describe(&nodes);
    let count = nodes.len();
    let outputs = route.outputs_mut();
    let index = match edit.selector {
        WeaveSelector::First => 0,
        _ => outputs.len(),
    };
    outputs.splice(index..index, nodes);
    route.shift_stream_caching(index, 0, count);
    tracing::info!(route_id = %route.route_id(), "AdviceWith ({}) : add [{}]", edit.selector, inserted);
    Ok(())
}

/// Paths of the nodes the edit selects.
fn select(
    route: &RouteDefinition,
    edit: &WeaveEdit,
) -> Result<Vec<NodePath>> {
    let matches: Vec<NodePath> = match &edit.selector {
        WeaveSelector::Id(id) => match matcher::find_by_id(route, id) {
            Ok(found) => vec![found.path],
            Err(RouteError::NotFound(_)) => {
                return Err(RouteError::IllegalArgument(format!("There are no outputs which matches: {} in the route: {}", id, route)));
            }
            Err(e) => return Err(e),
        },
        WeaveSelector::ToUri(pattern) => matcher::find_by_endpoint_uri(route, pattern)?.into_iter().map(|r| r.path).collect(),
        WeaveSelector::ToString(pattern) => matcher::find_by_to_string(route, pattern)?.into_iter().map(|r| r.path).collect(),
        WeaveSelector::Type(name) => matcher::find_by_type(route, name)?.into_iter().map(|r| r.path).collect(),
        WeaveSelector::First | WeaveSelector::Last => Vec::new(),
    };

    let last = matches.len().saturating_sub(1);
    let selected: Vec<NodePath> = match edit.selection {
        Selection::All => matches,
        Selection::First => matches.into_iter().take(1).collect(),
        Selection::Last => matches.into_iter().skip(last).collect(),
        Selection::Index(i) => matches.into_iter().skip(i).take(1).collect(),
        Selection::Range(from, to) => matches.into_iter().enumerate().filter(|(i, _)| *i >= from && *i <= to).map(|(_, p)| p).collect(),
    };
    if selected.is_empty() {
        return Err(RouteError::IllegalArgument(format!("There are no outputs which matches: {} ({:?}) in the route: {}", edit.selector, edit.selection, route)));
    }

    // a node nested in another selected node disappears with it
    if matches!(edit.operation, WeaveOperation::Replace | WeaveOperation::Remove) {
        let outer: Vec<NodePath> = selected.iter().filter(|p| !selected.iter().any(|q| q != *p && p.indices().starts_with(q.indices()))).cloned().collect();
        return Ok(outer);
    }
    Ok(selected)
}

fn describe(nodes: &[NodeDefinition]) -> String {
    nodes.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(", ")
}
