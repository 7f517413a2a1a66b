//! Utilities for jotun.

use std::io;

use graphviz_rust::{self, cmd::Format, printer::PrinterContext};

pub type VisualizerResult = Result<String, VisualizerError>;

#[derive(thiserror::Error, Debug)]
pub enum VisualizerError {
    #[error("could not write the graph file: {0}")]
    IoErr(io::Error),
    #[error("could not run graphviz: {0}")]
    GraphvizIoError(io::Error),
    #[error("could not create the graph: {0}")]
    GraphvizError(String),
}

pub fn dot_to_svg(dot: String) -> VisualizerResult {
    let dot_graph = graphviz_rust::parse(dot.as_str()).map_err(VisualizerError::GraphvizError)?;

    let svg = graphviz_rust::exec(
        dot_graph,
        &mut PrinterContext::default(),
        vec![Format::Svg.into()],
    )
    .map_err(VisualizerError::GraphvizIoError)?;

    String::from_utf8(svg).map_err(|e| VisualizerError::GraphvizError(e.to_string()))
}
