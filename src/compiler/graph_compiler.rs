use std::collections::VecDeque;

use fnv::{FnvHashMap, FnvHashSet};

use crate::compiler::plan::*;
use crate::compiler::CompilerOptions;
use crate::diagnostics::{CompilationError, CompilationResult, DiagnosticsBagRef};
use crate::registry::OperatorRegistry;
use crate::symbolic::{ExprArena, ExprId, Literal, OperatorKind, SymExpr};

/// Name of the single compound output port.
pub const OUTPUT_PORT: &str = "output";

/// Turns one expression DAG into a [BuildPlan].
pub struct GraphCompiler<'a> {
    arena: &'a ExprArena,
    registry: &'a OperatorRegistry,
    options: &'a CompilerOptions,
    diagnostics_bag: DiagnosticsBagRef,
    ops: Vec<BuildOp>,
    nodes: Vec<CompiledNode>,
    compiled: FnvHashMap<ExprId, usize>,
    /// (child, parent) pairs in discovery order.
    queue: VecDeque<(ExprId, ExprId)>,
}

impl<'a> GraphCompiler<'a> {
    pub fn new(
        arena: &'a ExprArena,
        registry: &'a OperatorRegistry,
        options: &'a CompilerOptions,
        diagnostics_bag: DiagnosticsBagRef,
    ) -> Self {
        Self {
            arena,
            registry,
            options,
            diagnostics_bag,
            ops: vec![],
            nodes: vec![],
            compiled: FnvHashMap::default(),
            queue: VecDeque::new(),
        }
    }

    pub fn compile(mut self, root: ExprId) -> CompilationResult<BuildPlan> {
        let count = self.arena.reachable_count(root);
        if count > self.options.max_nodes {
            return Err(CompilationError::ResourceLimitExceeded {
                count,
                limit: self.options.max_nodes,
            });
        }

        self.ops.push(BuildOp::CreateCompound {
            parent: self.options.parent_container.clone(),
            name: self.options.compound_name.clone(),
        });
        self.ops.push(BuildOp::CreateOutputPort {
            name: OUTPUT_PORT.to_string(),
        });

        self.build_nodes(root)?;
        let connections = self.connect_nodes(root);

        log::debug!(
            "compiled {} nodes and {} connections",
            self.nodes.len(),
            connections.len()
        );

        Ok(BuildPlan {
            compound_name: self.options.compound_name.clone(),
            parent: self.options.parent_container.clone(),
            output_port: OUTPUT_PORT.to_string(),
            root,
            ops: self.ops,
            nodes: self.nodes,
            connections,
        })
    }

    /// Pre-order walk creating every node once and queueing the links to its arguments.
    fn build_nodes(&mut self, root: ExprId) -> CompilationResult<()> {
        let arena = self.arena;
        let mut visited = FnvHashSet::default();
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            self.compile_node(id)?;

            let args = arena.get(id).args();
            for arg in args {
                self.compile_node(*arg)?;
                self.queue.push_back((*arg, id));
            }
            stack.extend(args.iter().rev());
        }
        Ok(())
    }

    fn compile_node(&mut self, id: ExprId) -> CompilationResult<()> {
        if self.compiled.contains_key(&id) {
            return Ok(());
        }

        let arena = self.arena;
        let node = match arena.get(id) {
            SymExpr::Symbol(name) => {
                self.ops.push(BuildOp::CreateInputPort {
                    name: name.clone(),
                    skip_existing: true,
                });
                CompiledNode {
                    expr: id,
                    role: NodeRole::Input,
                    node_type: None,
                    value: None,
                    port: Some(name.clone()),
                }
            }
            SymExpr::Literal(literal) => {
                self.compile_registered(id, literal.kind(), Some(literal))?
            }
            SymExpr::Operation { op, .. } => self.compile_registered(id, op.clone(), None)?,
        };

        log::trace!("{} -> {:?}", id, node);
        self.compiled.insert(id, self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }

    /// A node whose type comes from the registry. Constant nodes get the literal's value.
    fn compile_registered(
        &mut self,
        id: ExprId,
        kind: OperatorKind,
        literal: Option<&Literal>,
    ) -> CompilationResult<CompiledNode> {
        let node_type = match self.registry.resolve(&kind) {
            Some(t) => t.clone(),
            None => return Err(CompilationError::UnmappedOperator { kind }),
        };
        let value = literal
            .filter(|_| node_type.is_constant())
            .map(Literal::evalf);

        self.ops.push(BuildOp::CreateNode {
            expr: id,
            node_type: node_type.clone(),
        });
        if let Some(value) = value {
            self.ops.push(BuildOp::SetLiteralValue { expr: id, value });
        }
        Ok(CompiledNode {
            expr: id,
            role: if kind.is_literal() {
                NodeRole::Literal
            } else {
                NodeRole::Operator
            },
            node_type: Some(node_type),
            value,
            port: None,
        })
    }

    fn port_of(&self, id: ExprId) -> Option<&str> {
        self.compiled
            .get(&id)
            .and_then(|i| self.nodes[*i].port.as_deref())
    }

    /// Drain the queue into connection records, the output binding first.
    fn connect_nodes(&mut self, root: ExprId) -> Vec<ConnectionRecord> {
        let mut connections = vec![];

        if let Some(name) = self.port_of(root).map(str::to_string) {
            self.ops.push(BuildOp::Connect {
                kind: ConnectionKind::InputToOutput,
                source: Endpoint::CompoundInput(name),
                target: Endpoint::CompoundOutput(OUTPUT_PORT.to_string()),
            });
            return connections;
        }

        if let Some((_, head)) = self.queue.front() {
            if *head != root {
                self.diagnostics_bag.borrow_mut().report_warning(format!(
                    "The first queued connection targets {} rather than the expression root {}.",
                    head, root
                ));
            }
        }

        connections.push(ConnectionRecord::Output { source: root });
        self.ops.push(BuildOp::Connect {
            kind: ConnectionKind::NodeToOutput,
            source: Endpoint::Node(root),
            target: Endpoint::CompoundOutput(OUTPUT_PORT.to_string()),
        });

        while let Some((source, target)) = self.queue.pop_front() {
            let (record, op) = match self.port_of(source) {
                Some(symbol) => (
                    ConnectionRecord::Input {
                        symbol: symbol.to_string(),
                        target,
                    },
                    BuildOp::Connect {
                        kind: ConnectionKind::SymbolToInput,
                        source: Endpoint::CompoundInput(symbol.to_string()),
                        target: Endpoint::Node(target),
                    },
                ),
                None => (
                    ConnectionRecord::Node { source, target },
                    BuildOp::Connect {
                        kind: ConnectionKind::NodeToNode,
                        source: Endpoint::Node(source),
                        target: Endpoint::Node(target),
                    },
                ),
            };
            connections.push(record);
            self.ops.push(op);
        }
        connections
    }
}
