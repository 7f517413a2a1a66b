use std::{fs::OpenOptions, io::Write};

use crate::backend::{ConnectionKind, MemoryBackend, NodeHandle};
use crate::utils::{self, VisualizerError};

fn quote(id: &str) -> String {
    format!("\"{}\"", id.replace('"', "\\\""))
}

/// Node a port path like `/expr/add.input_1` belongs to, and the port name.
fn split_port(port: &str) -> (&str, &str) {
    port.rsplit_once('.').unwrap_or((port, ""))
}

/// DOT representation of a compound built in a [MemoryBackend].
pub fn create_dot(backend: &MemoryBackend, compound: &NodeHandle) -> String {
    let mut dot = "strict digraph {\n\trankdir=LR\n\tnodesep=0.5\n".to_string();

    if let Some(stored) = backend.node(&compound.0) {
        for input in &stored.inputs {
            let id = format!("{}.{}", compound.0, input);
            dot += &format!(
                "\t{}\t[shape=box style=filled fillcolor=lightgreen label=\"{}\"]\n",
                quote(&id),
                input
            );
        }
        for output in &stored.outputs {
            let id = format!("{}.{}", compound.0, output);
            dot += &format!(
                "\t{}\t[shape=box style=filled fillcolor=orange label=\"{}\"]\n",
                quote(&id),
                output
            );
        }
    }

    let prefix = format!("{}/", compound.0);
    for path in backend.paths().iter().filter(|p| p.starts_with(&prefix)) {
        let Some(node) = backend.node(path) else {
            continue;
        };
        let (color, label) = match (node.node_type(), node.value) {
            (Some(_), Some(value)) => ("lightgray", format!("{value}")),
            (Some(_), None) => ("white", node.name.clone()),
            (None, _) => ("lightblue", node.name.clone()),
        };
        dot += &format!(
            "\t{}\t[style=filled fillcolor={} label=\"{}\"]\n",
            quote(path),
            color,
            label
        );
    }

    for connection in backend.connections(compound) {
        let (from, _) = split_port(&connection.source);
        let from = match connection.kind {
            ConnectionKind::SymbolToInput | ConnectionKind::InputToOutput => connection.source.as_str(),
            _ => from,
        };
        let (to, port) = split_port(&connection.target);
        let to = match connection.kind {
            ConnectionKind::NodeToOutput | ConnectionKind::InputToOutput => connection.target.as_str(),
            _ => to,
        };
        let color = match connection.kind {
            ConnectionKind::NodeToNode => "black",
            ConnectionKind::SymbolToInput => "darkgreen",
            ConnectionKind::NodeToOutput => "orange",
            ConnectionKind::InputToOutput => "blue",
        };
        dot += &format!(
            "\t{} -> {}\t[label=\"{}\" color={} fontcolor={}]\n",
            quote(from),
            quote(to),
            port,
            color,
            color
        );
    }
    dot += "}\n";
    dot
}

/// Render a compound to an SVG file with Graphviz.
pub fn visualize(
    backend: &MemoryBackend,
    compound: &NodeHandle,
    output_path: &str,
) -> Result<(), VisualizerError> {
    let dot = create_dot(backend, compound);
    let svg = utils::dot_to_svg(dot)?;

    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(output_path)
        .map_err(VisualizerError::IoErr)?
        .write_all(svg.as_bytes())
        .map_err(VisualizerError::IoErr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{GraphBackend, PortRef};
    use crate::registry::NodeType;

    #[test]
    fn dot_lists_ports_nodes_and_wires() {
        let mut backend = MemoryBackend::new();
        let c = backend.create_compound("/", "expr").unwrap();
        let out = backend.create_output_port(&c, "output").unwrap();
        let x = backend.create_input_port(&c, "x", true).unwrap();
        let sin = backend
            .create_node(&c, &NodeType::new("Core::Math,sin"))
            .unwrap();
        backend
            .connect(
                &c,
                &PortRef::Node(sin.clone()),
                &PortRef::CompoundOutput(out),
                ConnectionKind::NodeToOutput,
            )
            .unwrap();
        backend
            .connect(
                &c,
                &PortRef::CompoundInput(x),
                &PortRef::Node(sin),
                ConnectionKind::SymbolToInput,
            )
            .unwrap();

        let dot = create_dot(&backend, &c);
        assert!(dot.starts_with("strict digraph {"));
        assert!(dot.contains("\"/expr.x\"\t[shape=box style=filled fillcolor=lightgreen label=\"x\"]"));
        assert!(dot.contains("\"/expr/sin\"\t[style=filled fillcolor=white label=\"sin\"]"));
        assert!(dot.contains("\"/expr/sin\" -> \"/expr.output\""));
        assert!(dot.contains("\"/expr.x\" -> \"/expr/sin\"\t[label=\"input\" color=darkgreen"));
        assert!(dot.ends_with("}\n"));
    }
}
