//! Jotun turns infix math expressions into compounds of a node graph.
//!
//! The pipeline has three stages, each usable on its own:
//!
//! 1. [parse] lexes and parses the text and lowers it into an [ExprArena],
//! 2. [compiler::compile] maps every distinct sub-expression to a node type from an
//!    [OperatorRegistry] and orders the construction steps into a [compiler::plan::BuildPlan],
//! 3. [Emitter] replays the plan against a [GraphBackend], rolling back on failure.
//!
//! [expression_to_compound] runs all of them.

use std::rc::Rc;

pub mod ast;
pub mod backend;
pub mod cli;
pub mod compiler;
pub mod diagnostics;
pub mod emitter;
pub mod registry;
pub mod symbolic;
pub mod text;
pub mod utils;

#[cfg(test)]
mod tests;

pub use crate::backend::{GraphBackend, MemoryBackend};
pub use crate::compiler::CompilerOptions;
pub use crate::diagnostics::{CompilationError, CompilationResult, DiagnosticsBag, DiagnosticsBagRef};
pub use crate::emitter::{EmittedCompound, Emitter};
pub use crate::registry::OperatorRegistry;
pub use crate::symbolic::{ExprArena, ExprId};

use crate::ast::AST;
use crate::text::SourceText;

/// Parse `text` into `arena`, returning the root of the expression.
pub fn parse(text: &str, arena: &mut ExprArena) -> CompilationResult<ExprId> {
    let ast = AST::from_source(Rc::new(SourceText::from_str(text)))?;
    symbolic::lower(&ast, arena)
}

/// Build a compound computing `text` in `backend`.
///
/// Errors are also reported to `diagnostics_bag`. On error the backend is left as it was.
pub fn expression_to_compound(
    text: &str,
    backend: &mut dyn GraphBackend,
    registry: &OperatorRegistry,
    options: &CompilerOptions,
    diagnostics_bag: DiagnosticsBagRef,
) -> CompilationResult<EmittedCompound> {
    let result = build_compound(text, backend, registry, options, diagnostics_bag.clone());
    if let Err(e) = &result {
        diagnostics_bag.borrow_mut().report_compilation_error(e);
    }
    result
}

fn build_compound(
    text: &str,
    backend: &mut dyn GraphBackend,
    registry: &OperatorRegistry,
    options: &CompilerOptions,
    diagnostics_bag: DiagnosticsBagRef,
) -> CompilationResult<EmittedCompound> {
    let mut arena = ExprArena::new();
    let root = parse(text, &mut arena)?;
    let plan = compiler::compile(&arena, root, registry, options, diagnostics_bag)?;
    Emitter::new(backend).emit(&plan)
}
