//! A graph engine that lives in memory. Used by the command line tool and in tests.

use fnv::{FnvHashMap, FnvHashSet};

use super::{
    BackendError, BackendOp, BackendResult, ConnectionKind, GraphBackend, NodeHandle, PortHandle,
    PortRef,
};
use crate::registry::NodeType;

const ROOT: &str = "/";
const NODE_INPUT: &str = "input";
const NODE_OUTPUT: &str = "output";

#[derive(Debug, Clone, PartialEq)]
pub enum MemoryNodeKind {
    Compound,
    Operator(NodeType),
}

/// A node or compound stored by the [MemoryBackend].
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryNode {
    pub name: String,
    pub container: String,
    pub kind: MemoryNodeKind,
    pub value: Option<f64>,
    /// Input port names, in creation order.
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

impl MemoryNode {
    pub fn is_compound(&self) -> bool {
        matches!(self.kind, MemoryNodeKind::Compound)
    }

    pub fn node_type(&self) -> Option<&NodeType> {
        match &self.kind {
            MemoryNodeKind::Operator(t) => Some(t),
            MemoryNodeKind::Compound => None,
        }
    }
}

/// A stored connection between two port paths like `/expr/add.input` or `/expr.x`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryConnection {
    pub source: String,
    pub target: String,
    pub kind: ConnectionKind,
}

/// Names taken in one container and the last suffix handed out per base name.
#[derive(Debug, Clone, Default)]
struct Children {
    names: FnvHashSet<String>,
    suffixes: FnvHashMap<String, usize>,
}

#[derive(Debug, Clone)]
pub struct MemoryBackend {
    nodes: FnvHashMap<String, MemoryNode>,
    /// Paths in creation order.
    order: Vec<String>,
    children: FnvHashMap<String, Children>,
    connections: Vec<MemoryConnection>,
    /// Port paths with an incoming connection.
    connected: FnvHashSet<String>,
    focus: String,
    calls: FnvHashMap<BackendOp, usize>,
    failures: Vec<(BackendOp, usize)>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn child_path(container: &str, name: &str) -> String {
    if container == ROOT {
        format!("/{name}")
    } else {
        format!("{container}/{name}")
    }
}

fn port_path(node: &str, port: &str) -> String {
    format!("{node}.{port}")
}

/// `name`, or the next free `name_N` after `counter` if taken.
fn unique_name<F>(name: &str, counter: &mut usize, is_taken: F) -> String
where
    F: Fn(&str) -> bool,
{
    let mut candidate = name.to_string();
    while is_taken(&candidate) {
        *counter += 1;
        candidate = format!("{name}_{counter}");
    }
    candidate
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            nodes: FnvHashMap::default(),
            order: vec![],
            children: FnvHashMap::default(),
            connections: vec![],
            connected: FnvHashSet::default(),
            focus: ROOT.to_string(),
            calls: FnvHashMap::default(),
            failures: vec![],
        }
    }

    /// Make the `nth` (counting from 1) future call of `op` fail.
    pub fn fail_on(&mut self, op: BackendOp, nth: usize) {
        let already = self.calls.get(&op).copied().unwrap_or(0);
        self.failures.push((op, already + nth));
    }

    pub fn set_current_container<S>(&mut self, container: S)
    where
        S: ToString,
    {
        self.focus = container.to_string();
    }

    pub fn node(&self, path: &str) -> Option<&MemoryNode> {
        self.nodes.get(path)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Every node path, in creation order.
    pub fn paths(&self) -> &[String] {
        &self.order
    }

    /// Connections made inside `compound`, in the order they were made.
    pub fn connections(&self, compound: &NodeHandle) -> Vec<&MemoryConnection> {
        let prefix = format!("{}/", compound.0);
        let own = format!("{}.", compound.0);
        self.connections
            .iter()
            .filter(|c| {
                [&c.source, &c.target]
                    .iter()
                    .all(|p| p.starts_with(&prefix) || p.starts_with(&own))
            })
            .collect()
    }

    pub fn all_connections(&self) -> &[MemoryConnection] {
        &self.connections
    }

    fn record_call(&mut self, op: BackendOp) -> BackendResult<()> {
        let count = self.calls.entry(op).or_insert(0);
        *count += 1;
        let count = *count;
        if self.failures.contains(&(op, count)) {
            return Err(BackendError::Injected(op));
        }
        Ok(())
    }

    fn get(&self, path: &str) -> BackendResult<&MemoryNode> {
        self.nodes
            .get(path)
            .ok_or_else(|| BackendError::NotFound(path.to_string()))
    }

    fn get_compound(&self, path: &str) -> BackendResult<&MemoryNode> {
        match self.get(path)? {
            node if node.is_compound() => Ok(node),
            _ => Err(BackendError::NotFound(path.to_string())),
        }
    }

    fn container_exists(&self, container: &str) -> bool {
        container == ROOT || self.nodes.get(container).is_some_and(MemoryNode::is_compound)
    }

    fn insert_node(&mut self, container: &str, node: MemoryNode) -> String {
        let children = self.children.entry(container.to_string()).or_default();
        let counter = children.suffixes.entry(node.name.clone()).or_insert(0);
        let name = unique_name(&node.name, counter, |n| children.names.contains(n));
        children.names.insert(name.clone());
        let path = child_path(container, &name);
        self.nodes.insert(path.clone(), MemoryNode { name, ..node });
        self.order.push(path.clone());
        path
    }

    fn list_children<'a>(
        &'a self,
        container: &'a str,
    ) -> impl Iterator<Item = &'a MemoryNode> + 'a {
        self.order
            .iter()
            .filter_map(move |p| self.nodes.get(p))
            .filter(move |n| n.container == container)
    }

    fn is_connected(&self, port: &str) -> bool {
        self.connected.contains(port)
    }

    fn is_inside(compound: &NodeHandle, path: &str) -> bool {
        path.starts_with(&format!("{}/", compound.0))
    }

    /// Port path a connection leaves from.
    fn resolve_source(&self, compound: &NodeHandle, source: &PortRef) -> BackendResult<String> {
        match source {
            PortRef::Node(node) if Self::is_inside(compound, &node.0) => {
                let stored = self.get(&node.0)?;
                match stored.outputs.first() {
                    Some(port) => Ok(port_path(&node.0, port)),
                    None => Err(BackendError::PortNotFound {
                        node: node.0.clone(),
                        port: NODE_OUTPUT.to_string(),
                    }),
                }
            }
            PortRef::CompoundInput(port) => {
                self.compound_port(compound, port, |n| &n.inputs)?;
                Ok(port.0.clone())
            }
            other => Err(BackendError::InvalidConnection {
                from: other.to_string(),
                to: compound.to_string(),
                reason: "not a source inside the compound".to_string(),
            }),
        }
    }

    /// Check that `port` is one of `compound`'s ports.
    fn compound_port<F>(&self, compound: &NodeHandle, port: &PortHandle, ports: F) -> BackendResult<()>
    where
        F: Fn(&MemoryNode) -> &Vec<String>,
    {
        let stored = self.get_compound(&compound.0)?;
        let found = ports(stored)
            .iter()
            .any(|name| port_path(&compound.0, name) == port.0);
        if found {
            Ok(())
        } else {
            Err(BackendError::PortNotFound {
                node: compound.0.clone(),
                port: port.0.clone(),
            })
        }
    }

    /// Port path a connection arrives at, creating a node input port if none is free.
    fn resolve_target(&mut self, compound: &NodeHandle, target: &PortRef) -> BackendResult<String> {
        match target {
            PortRef::Node(node) if Self::is_inside(compound, &node.0) => {
                let stored = self.get(&node.0)?;
                if let Some(free) = stored
                    .inputs
                    .iter()
                    .map(|port| port_path(&node.0, port))
                    .find(|path| !self.is_connected(path))
                {
                    return Ok(free);
                }
                // Node inputs are only ever added here, so `input_N` is free.
                let name = match stored.inputs.len() {
                    0 => NODE_INPUT.to_string(),
                    n => format!("{NODE_INPUT}_{n}"),
                };
                let path = port_path(&node.0, &name);
                if let Some(stored) = self.nodes.get_mut(&node.0) {
                    stored.inputs.push(name);
                }
                Ok(path)
            }
            PortRef::CompoundOutput(port) => {
                self.compound_port(compound, port, |n| &n.outputs)?;
                if self.is_connected(&port.0) {
                    return Err(BackendError::InvalidConnection {
                        from: compound.to_string(),
                        to: port.to_string(),
                        reason: "the output port is already connected".to_string(),
                    });
                }
                Ok(port.0.clone())
            }
            other => Err(BackendError::InvalidConnection {
                from: compound.to_string(),
                to: other.to_string(),
                reason: "not a target inside the compound".to_string(),
            }),
        }
    }
}

impl GraphBackend for MemoryBackend {
    fn create_compound(&mut self, parent: &str, name: &str) -> BackendResult<NodeHandle> {
        self.record_call(BackendOp::CreateCompound)?;
        if !self.container_exists(parent) {
            return Err(BackendError::NotFound(parent.to_string()));
        }
        let path = self.insert_node(
            parent,
            MemoryNode {
                name: name.to_string(),
                container: parent.to_string(),
                kind: MemoryNodeKind::Compound,
                value: None,
                inputs: vec![],
                outputs: vec![],
            },
        );
        log::debug!("created compound `{path}`");
        Ok(NodeHandle(path))
    }

    fn create_input_port(
        &mut self,
        compound: &NodeHandle,
        name: &str,
        skip_existing: bool,
    ) -> BackendResult<PortHandle> {
        self.record_call(BackendOp::CreateInputPort)?;
        let stored = self.get_compound(&compound.0)?;
        if skip_existing && stored.inputs.iter().any(|p| p == name) {
            return Ok(PortHandle(port_path(&compound.0, name)));
        }
        let name = unique_name(name, &mut 0, |n| stored.inputs.iter().any(|p| p == n));
        let handle = PortHandle(port_path(&compound.0, &name));
        if let Some(stored) = self.nodes.get_mut(&compound.0) {
            stored.inputs.push(name);
        }
        Ok(handle)
    }

    fn create_output_port(
        &mut self,
        compound: &NodeHandle,
        name: &str,
    ) -> BackendResult<PortHandle> {
        self.record_call(BackendOp::CreateOutputPort)?;
        let stored = self.get_compound(&compound.0)?;
        let name = unique_name(name, &mut 0, |n| stored.outputs.iter().any(|p| p == n));
        let handle = PortHandle(port_path(&compound.0, &name));
        if let Some(stored) = self.nodes.get_mut(&compound.0) {
            stored.outputs.push(name);
        }
        Ok(handle)
    }

    fn create_node(
        &mut self,
        compound: &NodeHandle,
        node_type: &NodeType,
    ) -> BackendResult<NodeHandle> {
        self.record_call(BackendOp::CreateNode)?;
        self.get_compound(&compound.0)?;
        let inputs = if node_type.is_constant() {
            vec![]
        } else {
            vec![NODE_INPUT.to_string()]
        };
        let path = self.insert_node(
            &compound.0,
            MemoryNode {
                name: node_type.short_name().to_string(),
                container: compound.0.clone(),
                kind: MemoryNodeKind::Operator(node_type.clone()),
                value: None,
                inputs,
                outputs: vec![NODE_OUTPUT.to_string()],
            },
        );
        Ok(NodeHandle(path))
    }

    fn set_literal_value(&mut self, node: &NodeHandle, value: f64) -> BackendResult<()> {
        self.record_call(BackendOp::SetLiteralValue)?;
        match self.nodes.get_mut(&node.0) {
            Some(stored) if stored.node_type().is_some_and(NodeType::is_constant) => {
                stored.value = Some(value);
                Ok(())
            }
            Some(_) => Err(BackendError::PortNotFound {
                node: node.0.clone(),
                port: "value".to_string(),
            }),
            None => Err(BackendError::NotFound(node.0.clone())),
        }
    }

    fn connect(
        &mut self,
        compound: &NodeHandle,
        source: &PortRef,
        target: &PortRef,
        kind: ConnectionKind,
    ) -> BackendResult<()> {
        self.record_call(BackendOp::Connect)?;
        let matches_kind = matches!(
            (kind, source, target),
            (ConnectionKind::NodeToNode, PortRef::Node(_), PortRef::Node(_))
                | (ConnectionKind::SymbolToInput, PortRef::CompoundInput(_), PortRef::Node(_))
                | (ConnectionKind::NodeToOutput, PortRef::Node(_), PortRef::CompoundOutput(_))
                | (
                    ConnectionKind::InputToOutput,
                    PortRef::CompoundInput(_),
                    PortRef::CompoundOutput(_)
                )
        );
        if !matches_kind {
            return Err(BackendError::InvalidConnection {
                from: source.to_string(),
                to: target.to_string(),
                reason: format!("endpoints do not fit a {kind} connection"),
            });
        }

        let source = self.resolve_source(compound, source)?;
        let target = self.resolve_target(compound, target)?;
        log::trace!("connected `{source}` -> `{target}`");
        self.connected.insert(target.clone());
        self.connections.push(MemoryConnection {
            source,
            target,
            kind,
        });
        Ok(())
    }

    fn delete_node(&mut self, node: &NodeHandle) -> BackendResult<()> {
        self.record_call(BackendOp::DeleteNode)?;
        self.get(&node.0)?;
        let nested = format!("{}/", node.0);
        let removed: FnvHashSet<String> = self
            .order
            .iter()
            .filter(|p| **p == node.0 || p.starts_with(&nested))
            .cloned()
            .collect();
        for path in &removed {
            if let Some(stored) = self.nodes.remove(path) {
                if let Some(siblings) = self.children.get_mut(&stored.container) {
                    siblings.names.remove(&stored.name);
                }
            }
            self.children.remove(path);
        }
        self.order.retain(|p| !removed.contains(p));

        let own_port = format!("{}.", node.0);
        let touches = |p: &String| p.starts_with(&nested) || p.starts_with(&own_port);
        let connected = &mut self.connected;
        self.connections.retain(|c| {
            let keep = !touches(&c.source) && !touches(&c.target);
            if !keep {
                connected.remove(&c.target);
            }
            keep
        });
        Ok(())
    }

    fn list_nodes(&self, container: &str) -> BackendResult<Vec<NodeHandle>> {
        if !self.container_exists(container) {
            return Err(BackendError::NotFound(container.to_string()));
        }
        Ok(self
            .list_children(container)
            .map(|n| NodeHandle(child_path(container, &n.name)))
            .collect())
    }

    fn current_container(&self) -> String {
        self.focus.clone()
    }
}
