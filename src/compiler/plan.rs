//! The output of the graph compiler: an ordered list of construction steps, the build script.

use serde::{Deserialize, Serialize};

pub use crate::backend::ConnectionKind;
use crate::registry::NodeType;
use crate::symbolic::ExprId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    /// A free variable, realised as a compound input port.
    Input,
    Operator,
    Literal,
}

/// One graph node per distinct sub-expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledNode {
    pub expr: ExprId,
    pub role: NodeRole,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub node_type: Option<NodeType>,
    /// Value of a literal node.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub value: Option<f64>,
    /// Compound input port of an input node.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub port: Option<String>,
}

/// A data-flow link between compiled nodes, in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConnectionRecord {
    /// The result of the expression feeds the compound output.
    Output { source: ExprId },
    /// A compound input feeds a node.
    Input { symbol: String, target: ExprId },
    Node { source: ExprId, target: ExprId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    Node(ExprId),
    CompoundInput(String),
    CompoundOutput(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BuildOp {
    CreateCompound {
        parent: String,
        name: String,
    },
    CreateOutputPort {
        name: String,
    },
    CreateInputPort {
        name: String,
        skip_existing: bool,
    },
    CreateNode {
        expr: ExprId,
        node_type: NodeType,
    },
    SetLiteralValue {
        expr: ExprId,
        value: f64,
    },
    Connect {
        kind: ConnectionKind,
        source: Endpoint,
        target: Endpoint,
    },
}

/// Everything needed to build one compound, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildPlan {
    pub compound_name: String,
    pub parent: String,
    pub output_port: String,
    pub root: ExprId,
    pub ops: Vec<BuildOp>,
    pub nodes: Vec<CompiledNode>,
    pub connections: Vec<ConnectionRecord>,
}

impl BuildPlan {
    pub fn node(&self, expr: ExprId) -> Option<&CompiledNode> {
        self.nodes.iter().find(|node| node.expr == expr)
    }

    /// Names of the compound input ports, in creation order.
    pub fn input_ports(&self) -> Vec<&str> {
        let mut ports: Vec<&str> = vec![];
        for port in self.nodes.iter().filter_map(|n| n.port.as_deref()) {
            if !ports.contains(&port) {
                ports.push(port);
            }
        }
        ports
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
