use std::process::exit;
use std::rc::Rc;

use clap::Parser;

use jotun::ast::AST;
use jotun::backend::{BackendOp, GraphBackend, MemoryBackend, NodeHandle};
use jotun::cli::{self, Command, CookOpts, Opts, ParseOpts};
use jotun::compiler::{self, graph_visualizer};
use jotun::diagnostics::{CompilationError, CompilationResult, DiagnosticsBag, DiagnosticsBagRef};
use jotun::emitter::{EmittedCompound, Emitter};
use jotun::registry::OperatorRegistry;
use jotun::symbolic::{self, ExprArena};
use jotun::text::SourceText;
use jotun::utils::VisualizerError;

/// Unwrap a result, or print the diagnostics and quit.
fn report<T>(diagnostics_bag: &DiagnosticsBagRef, result: CompilationResult<T>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            diagnostics_bag.borrow_mut().report_compilation_error(&e);
            diagnostics_bag.borrow().print();
            exit(1);
        }
    }
}

/// Create the containers along `path` in a fresh backend, returning the innermost one.
fn create_containers(backend: &mut MemoryBackend, path: &str) -> CompilationResult<String> {
    let mut parent = "/".to_string();
    for name in path.split('/').filter(|s| !s.is_empty()) {
        let container = backend
            .create_compound(&parent, name)
            .map_err(|e| CompilationError::backend(BackendOp::CreateCompound, name, e))?;
        parent = container.0;
    }
    Ok(parent)
}

fn print_compound(backend: &MemoryBackend, emitted: &EmittedCompound) -> CompilationResult<()> {
    let inputs: Vec<&str> = emitted.input_ports.iter().map(|(n, _)| n.as_str()).collect();
    println!("compound {}", emitted.compound);
    println!("  inputs: {}", inputs.join(", "));
    println!("  output: {}", emitted.output_port);

    let nodes: Vec<NodeHandle> = backend
        .list_nodes(&emitted.compound.0)
        .map_err(|e| CompilationError::backend(BackendOp::ListNodes, &emitted.compound, e))?;
    for handle in nodes {
        let Some(node) = backend.node(&handle.0) else {
            continue;
        };
        let node_type = node.node_type().map(|t| t.to_string()).unwrap_or_default();
        match node.value {
            Some(value) => println!("  {:<24} {} = {}", handle.0, node_type, value),
            None => println!("  {:<24} {}", handle.0, node_type),
        }
    }

    println!("connections:");
    for connection in backend.connections(&emitted.compound) {
        println!(
            "  {} -> {} ({})",
            connection.source, connection.target, connection.kind
        );
    }
    Ok(())
}

fn cook(opts: &Opts, cook_opts: &CookOpts) {
    let text = Rc::new(SourceText::from_str(&cook_opts.expression));
    let diagnostics_bag = DiagnosticsBag::new_ref();

    let ast = report(&diagnostics_bag, AST::from_source(text));
    if opts.verbose {
        cli::print_label("AST");
        ast.print();
    }

    let mut arena = ExprArena::new();
    let root = report(&diagnostics_bag, symbolic::lower(&ast, &mut arena));
    if opts.verbose {
        cli::print_label("Expression");
        println!("{}", arena.srepr(root));
    }

    let mut backend = MemoryBackend::new();
    let parent = match &cook_opts.container {
        Some(container) => report(&diagnostics_bag, create_containers(&mut backend, container)),
        None => backend.current_container(),
    };
    let options = cook_opts.compiler_options(parent);
    let registry = OperatorRegistry::default();

    let plan = report(
        &diagnostics_bag,
        compiler::compile(&arena, root, &registry, &options, diagnostics_bag.clone()),
    );

    if cook_opts.script {
        match plan.to_json() {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error writing build script: `{}`", e);
                exit(1);
            }
        }
        diagnostics_bag.borrow().print();
        return;
    }

    let emitted = report(&diagnostics_bag, Emitter::new(&mut backend).emit(&plan));

    if let Some(graph_path) = cook_opts.graph.as_ref() {
        if let Err(e) = graph_visualizer::visualize(&backend, &emitted.compound, graph_path) {
            match e {
                VisualizerError::GraphvizIoError(_) => {
                    eprintln!("Error calling graphviz. Do you have it installed?");
                    exit(1);
                }
                e => eprintln!("{e}"),
            }
        }
    }

    if cook_opts.dot {
        println!("{}", graph_visualizer::create_dot(&backend, &emitted.compound));
    } else {
        report(&diagnostics_bag, print_compound(&backend, &emitted));
    }

    diagnostics_bag.borrow().print();
}

fn parse(opts: &Opts, parse_opts: &ParseOpts) {
    let text = Rc::new(SourceText::from_str(&parse_opts.expression));
    let diagnostics_bag = DiagnosticsBag::new_ref();

    let ast = report(&diagnostics_bag, AST::from_source(text));
    if !opts.quiet {
        cli::print_label("AST");
    }
    ast.print();

    let mut arena = ExprArena::new();
    let root = report(&diagnostics_bag, symbolic::lower(&ast, &mut arena));
    if !opts.quiet {
        cli::print_label("Expression");
    }
    println!("{}", arena.srepr(root));
    if opts.verbose {
        println!("free symbols: {}", arena.free_symbols(root).join(", "));
        println!("distinct nodes: {}", arena.reachable_count(root));
    }
}

fn main() {
    let opts = Opts::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(opts.log_filter()))
        .init();

    match &opts.command {
        Command::Cook(cook_opts) => cook(&opts, cook_opts),
        Command::Parse(parse_opts) => parse(&opts, parse_opts),
        Command::Operators => OperatorRegistry::default().print(),
    }
}
