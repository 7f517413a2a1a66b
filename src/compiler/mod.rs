//! Compilation of a symbolic expression into the steps that build a compound.

use crate::diagnostics::{CompilationResult, DiagnosticsBagRef};
use crate::registry::OperatorRegistry;
use crate::symbolic::{ExprArena, ExprId};

use self::graph_compiler::GraphCompiler;
use self::plan::BuildPlan;

pub mod graph_compiler;
pub mod graph_visualizer;
pub mod plan;

pub const DEFAULT_MAX_NODES: usize = 2048;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerOptions {
    /// Requested compound name. The backend may rename it to keep names unique.
    pub compound_name: String,
    /// Container the compound is created in.
    pub parent_container: String,
    /// Most distinct expression nodes a compound may be built from.
    pub max_nodes: usize,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            compound_name: "expr".to_string(),
            parent_container: "/".to_string(),
            max_nodes: DEFAULT_MAX_NODES,
        }
    }
}

/// Compile the expression rooted at `root` into a build plan.
pub fn compile(
    arena: &ExprArena,
    root: ExprId,
    registry: &OperatorRegistry,
    options: &CompilerOptions,
    diagnostics_bag: DiagnosticsBagRef,
) -> CompilationResult<BuildPlan> {
    GraphCompiler::new(arena, registry, options, diagnostics_bag).compile(root)
}
