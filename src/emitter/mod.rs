//! Replays a [BuildPlan] against a [GraphBackend].
//!
//! Every node the emitter creates is journalled. When any backend call fails the journalled nodes
//! are deleted again, newest first, so the compound itself goes last and the backend is left as it
//! was before the emission started.

use fnv::FnvHashMap;

use crate::backend::{BackendError, BackendOp, GraphBackend, NodeHandle, PortHandle, PortRef};
use crate::compiler::plan::{BuildOp, BuildPlan, Endpoint};
use crate::diagnostics::{CompilationError, CompilationResult};
use crate::symbolic::ExprId;

/// Handles of everything an emission created.
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedCompound {
    pub compound: NodeHandle,
    pub output_port: PortHandle,
    /// Compound input ports by symbol name, in creation order.
    pub input_ports: Vec<(String, PortHandle)>,
    pub nodes: FnvHashMap<ExprId, NodeHandle>,
}

impl EmittedCompound {
    pub fn input_port(&self, symbol: &str) -> Option<&PortHandle> {
        self.input_ports
            .iter()
            .find(|(name, _)| name == symbol)
            .map(|(_, port)| port)
    }
}

pub struct Emitter<'a> {
    backend: &'a mut dyn GraphBackend,
    journal: Vec<NodeHandle>,
    compound: Option<NodeHandle>,
    output_ports: Vec<(String, PortHandle)>,
    input_ports: Vec<(String, PortHandle)>,
    nodes: FnvHashMap<ExprId, NodeHandle>,
}

impl<'a> Emitter<'a> {
    pub fn new(backend: &'a mut dyn GraphBackend) -> Self {
        Self {
            backend,
            journal: vec![],
            compound: None,
            output_ports: vec![],
            input_ports: vec![],
            nodes: FnvHashMap::default(),
        }
    }

    /// Build the compound described by `plan`. On failure nothing created here is left behind.
    pub fn emit(mut self, plan: &BuildPlan) -> CompilationResult<EmittedCompound> {
        for op in &plan.ops {
            if let Err(e) = self.apply(op) {
                return Err(self.rollback(e));
            }
        }

        let compound = match self.compound.take() {
            Some(compound) => compound,
            None => return Err(self.rollback(missing(BackendOp::CreateCompound, "compound"))),
        };
        let output_port = match lookup(&self.output_ports, &plan.output_port) {
            Some(port) => port.clone(),
            None => {
                return Err(self.rollback(missing(BackendOp::CreateOutputPort, &plan.output_port)))
            }
        };

        log::info!(
            "built `{}` with {} nodes and {} inputs",
            compound,
            self.nodes.len(),
            self.input_ports.len()
        );
        Ok(EmittedCompound {
            compound,
            output_port,
            input_ports: self.input_ports,
            nodes: self.nodes,
        })
    }

    fn compound(&self, operation: BackendOp) -> CompilationResult<&NodeHandle> {
        self.compound
            .as_ref()
            .ok_or_else(|| missing(operation, "compound"))
    }

    fn node(&self, operation: BackendOp, expr: ExprId) -> CompilationResult<&NodeHandle> {
        self.nodes
            .get(&expr)
            .ok_or_else(|| missing(operation, &expr.to_string()))
    }

    fn endpoint(&self, endpoint: &Endpoint) -> CompilationResult<PortRef> {
        let op = BackendOp::Connect;
        Ok(match endpoint {
            Endpoint::Node(expr) => PortRef::Node(self.node(op, *expr)?.clone()),
            Endpoint::CompoundInput(name) => PortRef::CompoundInput(
                lookup(&self.input_ports, name)
                    .ok_or_else(|| missing(op, name))?
                    .clone(),
            ),
            Endpoint::CompoundOutput(name) => PortRef::CompoundOutput(
                lookup(&self.output_ports, name)
                    .ok_or_else(|| missing(op, name))?
                    .clone(),
            ),
        })
    }

    fn apply(&mut self, op: &BuildOp) -> CompilationResult<()> {
        log::debug!("{:?}", op);
        match op {
            BuildOp::CreateCompound { parent, name } => {
                let compound = self
                    .backend
                    .create_compound(parent, name)
                    .map_err(|e| CompilationError::backend(BackendOp::CreateCompound, name, e))?;
                self.journal.push(compound.clone());
                self.compound = Some(compound);
            }
            BuildOp::CreateOutputPort { name } => {
                let operation = BackendOp::CreateOutputPort;
                let compound = self.compound(operation)?.clone();
                let port = self
                    .backend
                    .create_output_port(&compound, name)
                    .map_err(|e| CompilationError::backend(operation, name, e))?;
                self.output_ports.push((name.clone(), port));
            }
            BuildOp::CreateInputPort {
                name,
                skip_existing,
            } => {
                let operation = BackendOp::CreateInputPort;
                let compound = self.compound(operation)?.clone();
                let port = self
                    .backend
                    .create_input_port(&compound, name, *skip_existing)
                    .map_err(|e| CompilationError::backend(operation, name, e))?;
                if lookup(&self.input_ports, name).is_none() {
                    self.input_ports.push((name.clone(), port));
                }
            }
            BuildOp::CreateNode { expr, node_type } => {
                let operation = BackendOp::CreateNode;
                let compound = self.compound(operation)?.clone();
                let node = self
                    .backend
                    .create_node(&compound, node_type)
                    .map_err(|e| CompilationError::backend(operation, node_type, e))?;
                self.journal.push(node.clone());
                self.nodes.insert(*expr, node);
            }
            BuildOp::SetLiteralValue { expr, value } => {
                let operation = BackendOp::SetLiteralValue;
                let node = self.node(operation, *expr)?.clone();
                self.backend
                    .set_literal_value(&node, *value)
                    .map_err(|e| CompilationError::backend(operation, &node, e))?;
            }
            BuildOp::Connect {
                kind,
                source,
                target,
            } => {
                let operation = BackendOp::Connect;
                let compound = self.compound(operation)?.clone();
                let source = self.endpoint(source)?;
                let target = self.endpoint(target)?;
                self.backend
                    .connect(&compound, &source, &target, *kind)
                    .map_err(|e| {
                        CompilationError::backend(operation, format!("{source} -> {target}"), e)
                    })?;
            }
        }
        Ok(())
    }

    /// Undo everything journalled so far and hand back the error to report.
    fn rollback(&mut self, cause: CompilationError) -> CompilationError {
        log::warn!(
            "{cause}, removing {} created nodes",
            self.journal.len()
        );
        let mut first_failure = None;
        while let Some(node) = self.journal.pop() {
            if let Err(e) = self.backend.delete_node(&node) {
                log::warn!("could not delete `{node}`: {e}");
                first_failure.get_or_insert(e);
            }
        }
        match first_failure {
            Some(source) => CompilationError::RollbackFailed {
                cause: Box::new(cause),
                source,
            },
            None => cause,
        }
    }
}

fn lookup<'p>(ports: &'p [(String, PortHandle)], name: &str) -> Option<&'p PortHandle> {
    ports.iter().find(|(n, _)| n == name).map(|(_, port)| port)
}

/// Error for a plan referring to something that was never created.
fn missing(operation: BackendOp, target: &str) -> CompilationError {
    CompilationError::backend(
        operation,
        target,
        BackendError::NotFound(target.to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::registry::NodeType;
    use pretty_assertions::assert_eq;

    fn plan(ops: Vec<BuildOp>) -> BuildPlan {
        BuildPlan {
            compound_name: "expr".to_string(),
            parent: "/".to_string(),
            output_port: "output".to_string(),
            root: ExprId(0),
            ops,
            nodes: vec![],
            connections: vec![],
        }
    }

    #[test]
    fn bare_symbol_is_passed_through() {
        let mut backend = MemoryBackend::new();
        let plan = plan(vec![
            BuildOp::CreateCompound {
                parent: "/".to_string(),
                name: "expr".to_string(),
            },
            BuildOp::CreateOutputPort {
                name: "output".to_string(),
            },
            BuildOp::CreateInputPort {
                name: "x".to_string(),
                skip_existing: true,
            },
            BuildOp::Connect {
                kind: crate::backend::ConnectionKind::InputToOutput,
                source: Endpoint::CompoundInput("x".to_string()),
                target: Endpoint::CompoundOutput("output".to_string()),
            },
        ]);
        let emitted = Emitter::new(&mut backend).emit(&plan).unwrap();
        assert_eq!(emitted.compound.0, "/expr");
        assert_eq!(emitted.input_port("x").unwrap().0, "/expr.x");
        let connections = backend.connections(&emitted.compound);
        assert_eq!(connections.len(), 1);
        assert_eq!(connections[0].source, "/expr.x");
        assert_eq!(connections[0].target, "/expr.output");
    }

    #[test]
    fn plan_referring_to_unknown_nodes_is_rolled_back() {
        let mut backend = MemoryBackend::new();
        let plan = plan(vec![
            BuildOp::CreateCompound {
                parent: "/".to_string(),
                name: "expr".to_string(),
            },
            BuildOp::CreateNode {
                expr: ExprId(1),
                node_type: NodeType::new("Core::Math,sin"),
            },
            BuildOp::SetLiteralValue {
                expr: ExprId(7),
                value: 1.0,
            },
        ]);
        let err = Emitter::new(&mut backend).emit(&plan).unwrap_err();
        assert!(matches!(
            err,
            CompilationError::Backend {
                operation: BackendOp::SetLiteralValue,
                ..
            }
        ));
        assert_eq!(backend.node_count(), 0);
    }

    #[test]
    fn failing_rollback_keeps_both_errors() {
        let mut backend = MemoryBackend::new();
        backend.fail_on(BackendOp::CreateOutputPort, 1);
        backend.fail_on(BackendOp::DeleteNode, 1);
        let plan = plan(vec![
            BuildOp::CreateCompound {
                parent: "/".to_string(),
                name: "expr".to_string(),
            },
            BuildOp::CreateOutputPort {
                name: "output".to_string(),
            },
        ]);
        let err = Emitter::new(&mut backend).emit(&plan).unwrap_err();
        match err {
            CompilationError::RollbackFailed { cause, source } => {
                assert!(matches!(*cause, CompilationError::Backend { .. }));
                assert_eq!(source, BackendError::Injected(BackendOp::DeleteNode));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
