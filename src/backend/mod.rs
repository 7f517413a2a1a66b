//! The narrow interface to the graph engine the compound is built in.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::registry::NodeType;

pub use self::memory::{MemoryBackend, MemoryConnection, MemoryNode, MemoryNodeKind};

mod memory;

/// Opaque handle of a node (or compound) created by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(pub String);

/// Opaque handle of a compound port created by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortHandle(pub String);

impl Display for NodeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for PortHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One end of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortRef {
    /// The output of a node as a source, its next free input as a target.
    Node(NodeHandle),
    CompoundInput(PortHandle),
    CompoundOutput(PortHandle),
}

impl Display for PortRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortRef::Node(node) => write!(f, "{node}"),
            PortRef::CompoundInput(port) | PortRef::CompoundOutput(port) => write!(f, "{port}"),
        }
    }
}

/// What a connection links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    NodeToNode,
    SymbolToInput,
    NodeToOutput,
    /// A bare symbol expression passes its input straight through.
    InputToOutput,
}

impl Display for ConnectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionKind::NodeToNode => "node-to-node",
            ConnectionKind::SymbolToInput => "symbol-to-input",
            ConnectionKind::NodeToOutput => "node-to-output",
            ConnectionKind::InputToOutput => "input-to-output",
        };
        write!(f, "{s}")
    }
}

/// The backend primitives, used to give errors context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOp {
    CreateCompound,
    CreateInputPort,
    CreateOutputPort,
    CreateNode,
    SetLiteralValue,
    Connect,
    DeleteNode,
    ListNodes,
}

impl Display for BackendOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BackendOp::CreateCompound => "create compound",
            BackendOp::CreateInputPort => "create input port",
            BackendOp::CreateOutputPort => "create output port",
            BackendOp::CreateNode => "create node",
            BackendOp::SetLiteralValue => "set literal value",
            BackendOp::Connect => "connect",
            BackendOp::DeleteNode => "delete node",
            BackendOp::ListNodes => "list nodes",
        };
        write!(f, "{s}")
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("nothing exists at `{0}`")]
    NotFound(String),

    #[error("`{node}` has no port `{port}`")]
    PortNotFound { node: String, port: String },

    #[error("cannot connect `{from}` to `{to}`: {reason}")]
    InvalidConnection {
        from: String,
        to: String,
        reason: String,
    },

    #[error("injected failure of `{0}`")]
    Injected(BackendOp),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Capabilities the compound emitter needs from a graph engine.
///
/// Handles returned by one call are only ever passed back to the same backend.
pub trait GraphBackend {
    /// Create an empty compound named `name` (or a unique variation of it) inside `parent`.
    fn create_compound(&mut self, parent: &str, name: &str) -> BackendResult<NodeHandle>;

    /// Create an input port on a compound. With `skip_existing`, an existing port of that name is
    /// returned instead of creating a renamed duplicate.
    fn create_input_port(
        &mut self,
        compound: &NodeHandle,
        name: &str,
        skip_existing: bool,
    ) -> BackendResult<PortHandle>;

    fn create_output_port(&mut self, compound: &NodeHandle, name: &str)
        -> BackendResult<PortHandle>;

    fn create_node(&mut self, compound: &NodeHandle, node_type: &NodeType)
        -> BackendResult<NodeHandle>;

    fn set_literal_value(&mut self, node: &NodeHandle, value: f64) -> BackendResult<()>;

    /// Connect `source` to `target`. A [PortRef::Node] target is connected through its first
    /// unconnected input port, a new one is created if all are taken.
    fn connect(
        &mut self,
        compound: &NodeHandle,
        source: &PortRef,
        target: &PortRef,
        kind: ConnectionKind,
    ) -> BackendResult<()>;

    /// Delete a node with everything inside it and every connection touching it.
    fn delete_node(&mut self, node: &NodeHandle) -> BackendResult<()>;

    /// Direct children of a container.
    fn list_nodes(&self, container: &str) -> BackendResult<Vec<NodeHandle>>;

    /// The container the user is currently looking at.
    fn current_container(&self) -> String;
}
