use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Expression, Predicate};

/// The kind of a route step.
///
/// The short name (`to`, `choice`, `wireTap`, ...) is used as the `type`
/// tag in JSON and as the prefix of generated node ids.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, strum::AsRefStr)]
#[serde(tag = "type", rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum NodeKind {
    To {
        uri: String,
    },
    WireTap {
        uri: String,
    },
    Choice,
    When {
        predicate: Predicate,
    },
    Otherwise,
    Multicast,
    Filter {
        predicate: Predicate,
    },
    Pipeline,
    Transform {
        expression: Expression,
    },
    SetBody {
        expression: Expression,
    },
    SetHeader {
        name: String,
        expression: Expression,
    },
    RemoveHeader {
        name: String,
    },
    SetProperty {
        name: String,
        expression: Expression,
    },
    Log {
        message: String,
    },
    Process {
        #[serde(rename = "ref")]
        reference: String,
    },
    Delay {
        millis: u64,
    },
    ThrowException {
        ecode: String,
        message: String,
    },
    Stop,
    OnException {
        exceptions: Vec<String>,
        #[serde(default)]
        handled: bool,
    },
}

impl NodeKind {
    pub fn short_name(&self) -> &str {
        self.as_ref()
    }

    /// Endpoint uri for kinds that send to an endpoint.
    pub fn endpoint_uri(&self) -> Option<&str> {
        match self {
            NodeKind::To {
                uri,
            }
            | NodeKind::WireTap {
                uri,
            } => Some(uri),
            _ => None,
        }
    }

    /// Kinds that only structure their parent and never run on their own.
    pub fn is_abstract(&self) -> bool {
        matches!(self, NodeKind::When { .. } | NodeKind::Otherwise | NodeKind::OnException { .. })
    }
}

/// One step of a route.
///
/// A node owns its children. Parents are never referenced from a node;
/// they are resolved through a [`NodePath`](crate::advice::NodePath).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NodeDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) id: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) custom_id: bool,
    #[serde(flatten)]
    pub(crate) kind: NodeKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) children: Vec<NodeDefinition>,
}

impl NodeDefinition {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            id: None,
            custom_id: false,
            kind,
            children: Vec::new(),
        }
    }

    pub fn to(uri: impl Into<String>) -> Self {
        Self::new(NodeKind::To {
            uri: uri.into(),
        })
    }

    pub fn with_children(
        mut self,
        children: Vec<NodeDefinition>,
    ) -> Self {
        self.children = children;
        self
    }

    /// Set an explicit id.
    pub fn with_id(
        mut self,
        id: impl Into<String>,
    ) -> Self {
        self.set_id(id);
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(
        &mut self,
        id: impl Into<String>,
    ) {
        self.id = Some(id.into());
        self.custom_id = true;
    }

    pub fn has_custom_id(&self) -> bool {
        self.custom_id
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn short_name(&self) -> &str {
        self.kind.short_name()
    }

    pub fn children(&self) -> &[NodeDefinition] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<NodeDefinition> {
        &mut self.children
    }

    /// Human readable label, e.g. `mock:foo` for sends or `choice`.
    pub fn label(&self) -> String {
        match &self.kind {
            NodeKind::To {
                uri,
            }
            | NodeKind::WireTap {
                uri,
            } => uri.clone(),
            NodeKind::When {
                predicate,
            }
            | NodeKind::Filter {
                predicate,
            } => predicate.to_string(),
            NodeKind::Transform {
                expression,
            }
            | NodeKind::SetBody {
                expression,
            } => expression.to_string(),
            NodeKind::SetHeader {
                name, ..
            }
            | NodeKind::SetProperty {
                name, ..
            }
            | NodeKind::RemoveHeader {
                name,
            } => format!("{}[{}]", self.short_name(), name),
            NodeKind::Log {
                message,
            } => message.clone(),
            NodeKind::Process {
                reference,
            } => format!("ref:{}", reference),
            NodeKind::Delay {
                millis,
            } => format!("delay[{}]", millis),
            NodeKind::ThrowException {
                ecode, ..
            } => format!("throwException[{}]", ecode),
            _ => self.short_name().to_string(),
        }
    }

    /// Visit this node and all descendants in depth-first pre-order.
    pub fn walk<'a>(
        &'a self,
        f: &mut impl FnMut(&'a NodeDefinition),
    ) {
        f(self);
        for child in &self.children {
            child.walk(f);
        }
    }

    fn fmt_children(&self) -> String {
        self.children.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for NodeDefinition {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match &self.kind {
            NodeKind::To {
                uri,
            } => write!(f, "To[{}]", uri),
            NodeKind::WireTap {
                uri,
            } => write!(f, "WireTap[{}]", uri),
            NodeKind::Choice => write!(f, "Choice[{}]", self.fmt_children()),
            NodeKind::When {
                predicate,
            } => write!(f, "When[{} -> [{}]]", predicate, self.fmt_children()),
            NodeKind::Otherwise => write!(f, "Otherwise[[{}]]", self.fmt_children()),
            NodeKind::Multicast => write!(f, "Multicast[[{}]]", self.fmt_children()),
            NodeKind::Filter {
                predicate,
            } => write!(f, "Filter[{} -> [{}]]", predicate, self.fmt_children()),
            NodeKind::Pipeline => write!(f, "Pipeline[[{}]]", self.fmt_children()),
            NodeKind::Transform {
                expression,
            } => write!(f, "Transform[{}]", expression),
            NodeKind::SetBody {
                expression,
            } => write!(f, "SetBody[{}]", expression),
            NodeKind::SetHeader {
                name,
                expression,
            } => write!(f, "SetHeader[{}, {}]", name, expression),
            NodeKind::RemoveHeader {
                name,
            } => write!(f, "RemoveHeader[{}]", name),
            NodeKind::SetProperty {
                name,
                expression,
            } => write!(f, "SetProperty[{}, {}]", name, expression),
            NodeKind::Log {
                message,
            } => write!(f, "Log[{}]", message),
            NodeKind::Process {
                reference,
            } => write!(f, "Process[ref:{}]", reference),
            NodeKind::Delay {
                millis,
            } => write!(f, "Delay[{}]", millis),
            NodeKind::ThrowException {
                ecode,
                message,
            } => write!(f, "ThrowException[{}: {}]", ecode, message),
            NodeKind::Stop => write!(f, "Stop"),
            NodeKind::OnException {
                exceptions, ..
            } => write!(f, "OnException[[{}] -> [{}]]", exceptions.join(", "), self.fmt_children()),
        }
    }
}
