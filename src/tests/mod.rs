
use pretty_assertions::assert_eq;

use crate::backend::{GraphBackend, MemoryBackend};
use crate::compiler::plan::BuildPlan;
use crate::compiler::{self, CompilerOptions};
use crate::diagnostics::{CompilationResult, DiagnosticsBag, DiagnosticsBagRef};
use crate::emitter::EmittedCompound;
use crate::registry::OperatorRegistry;
use crate::symbolic::{ExprArena, ExprId};

/// Parse and compile with the default registry and options.
fn plan(text: &str) -> (ExprArena, ExprId, BuildPlan) {
    let mut arena = ExprArena::new();
    let root = crate::parse(text, &mut arena).unwrap();
    let plan = compiler::compile(
        &arena,
        root,
        &OperatorRegistry::default(),
        &CompilerOptions::default(),
        DiagnosticsBag::new_ref(),
    )
    .unwrap();
    (arena, root, plan)
}

/// Build `text` in `backend` with the default registry.
fn cook_in(
    backend: &mut MemoryBackend,
    text: &str,
    options: &CompilerOptions,
) -> (CompilationResult<EmittedCompound>, DiagnosticsBagRef) {
    let bag = DiagnosticsBag::new_ref();
    let result = crate::expression_to_compound(
        text,
        backend,
        &OperatorRegistry::default(),
        options,
        bag.clone(),
    );
    (result, bag)
}

fn cook(text: &str) -> (MemoryBackend, EmittedCompound) {
    let mut backend = MemoryBackend::new();
    let (result, bag) = cook_in(&mut backend, text, &CompilerOptions::default());
    bag.borrow().print();
    assert_eq!(bag.borrow().error_count(), 0);
    (backend, result.unwrap())
}

/// Source and target of every connection in the compound, in order.
fn wires(backend: &MemoryBackend, emitted: &EmittedCompound) -> Vec<(String, String)> {
    backend
        .connections(&emitted.compound)
        .iter()
        .map(|c| (c.source.clone(), c.target.clone()))
        .collect()
}

fn wire(source: &str, target: &str) -> (String, String) {
    (source.to_string(), target.to_string())
}

#[test]
fn a_plus_b() {
    let (backend, emitted) = cook("a + b");

    let compound = backend.node("/expr").unwrap();
    assert_eq!(compound.inputs, vec!["a", "b"]);
    assert_eq!(compound.outputs, vec!["output"]);
    assert_eq!(
        backend.list_nodes("/expr").unwrap(),
        vec![crate::backend::NodeHandle("/expr/add".to_string())]
    );
    assert_eq!(
        wires(&backend, &emitted),
        vec![
            wire("/expr/add.output", "/expr.output"),
            wire("/expr.a", "/expr/add.input"),
            wire("/expr.b", "/expr/add.input_1"),
        ]
    );
}

#[test]
fn compound_is_placed_in_the_requested_container() {
    let mut backend = MemoryBackend::new();
    backend.create_compound("/", "graph").unwrap();
    let options = CompilerOptions {
        compound_name: "wave".to_string(),
        parent_container: "/graph".to_string(),
        ..CompilerOptions::default()
    };

    let (first, _) = cook_in(&mut backend, "sin(t)", &options);
    let (second, _) = cook_in(&mut backend, "cos(t)", &options);
    assert_eq!(first.unwrap().compound.0, "/graph/wave");
    assert_eq!(second.unwrap().compound.0, "/graph/wave_1");
    assert_eq!(backend.list_nodes("/graph").unwrap().len(), 2);
}

#[test]
fn parse_errors_are_reported() {
    let mut backend = MemoryBackend::new();
    let (result, bag) = cook_in(&mut backend, "2x", &CompilerOptions::default());
    assert!(result.unwrap_err().is_parse_error());
    assert_eq!(bag.borrow().error_count(), 1);
    assert_eq!(backend.node_count(), 0);
}
