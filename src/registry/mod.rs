//! Mapping from operator kinds to the graph node types that implement them.

use std::fmt::Display;

use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};

use crate::symbolic::OperatorKind;

/// Node type every numeric literal is created as.
pub const CONSTANT_NODE_TYPE: &str = "Core::Constants,float";

/// Identifier of a node type in the graph engine, like `Core::Math,add`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeType(String);

impl NodeType {
    pub fn new<S>(name: S) -> Self
    where
        S: ToString,
    {
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether nodes of this type hold a literal value.
    pub fn is_constant(&self) -> bool {
        self.0 == CONSTANT_NODE_TYPE
    }

    /// Short name used when naming nodes, `add` for `Core::Math,add`.
    pub fn short_name(&self) -> &str {
        match self.0.rsplit_once(',') {
            Some((_, name)) => name,
            None => self.0.rsplit("::").next().unwrap_or(&self.0),
        }
    }
}

impl Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable operator table. Build one and pass it to the compiler.
#[derive(Debug, Clone)]
pub struct OperatorRegistry {
    entries: Vec<(OperatorKind, NodeType)>,
    index: FnvHashMap<OperatorKind, usize>,
}

impl OperatorRegistry {
    /// Registry with exactly the given entries. Later entries for the same kind win.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (OperatorKind, S)>,
        S: ToString,
    {
        let mut registry = Self {
            entries: vec![],
            index: FnvHashMap::default(),
        };
        for (kind, node_type) in entries {
            let node_type = NodeType::new(node_type);
            match registry.index.get(&kind) {
                Some(i) => registry.entries[*i].1 = node_type,
                None => {
                    registry.index.insert(kind.clone(), registry.entries.len());
                    registry.entries.push((kind, node_type));
                }
            }
        }
        registry
    }

    /// Look up the node type for an operator kind.
    pub fn resolve(&self, kind: &OperatorKind) -> Option<&NodeType> {
        self.index.get(kind).map(|i| &self.entries[*i].1)
    }

    pub fn entries(&self) -> &[(OperatorKind, NodeType)] {
        &self.entries
    }

    pub fn print(&self) {
        let width = self
            .entries
            .iter()
            .map(|(kind, _)| kind.name().len())
            .max()
            .unwrap_or(0);
        for (kind, node_type) in &self.entries {
            println!("{:width$}  {}", kind.name(), node_type, width = width);
        }
    }
}

impl Default for OperatorRegistry {
    /// The `Core::` node library of the Bifrost graph.
    fn default() -> Self {
        use OperatorKind::*;

        let math = [
            (Add, "add"),
            (Mul, "multiply"),
            (Pow, "power"),
            (Mod, "modulo"),
            (Abs, "absolute_value"),
            (Exp, "exponential"),
            (Log, "log_base_e"),
            (Sin, "sin"),
            (Cos, "cos"),
            (Tan, "tan"),
            (Asin, "asin"),
            (Acos, "acos"),
            (Atan, "atan"),
            (Atan2, "atan_2D"),
            (Sinh, "sin_hyperbolic"),
            (Cosh, "cos_hyperbolic"),
            (Tanh, "tan_hyperbolic"),
            (Asinh, "asin_hyperbolic"),
            (Acosh, "acos_hyperbolic"),
            (Atanh, "atan_hyperbolic"),
            (Min, "min"),
            (Max, "max"),
            (Floor, "round_to_floor"),
            (Ceiling, "round_to_ceiling"),
            (Sqrt, "square_root"),
            (Cbrt, "cube_root"),
        ]
        .into_iter()
        .map(|(kind, name)| (kind, format!("Core::Math,{name}")));

        let constants = [
            Integer,
            Rational,
            Float,
            Zero,
            One,
            NegativeOne,
            Half,
            Pi,
            Exp1,
        ]
        .into_iter()
        .map(|kind| (kind, CONSTANT_NODE_TYPE.to_string()));

        Self::new(math.chain(constants))
    }
}
