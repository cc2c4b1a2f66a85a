//! Graphviz backend

use std::fmt::Write;

use super::{Backend, CodegenOptions, CodegenOutput};
use crate::error::{Error, Result};
use crate::graph::{Graph, NodeId, SINK};
use crate::ir::Element;
use crate::traversal::reverse_dfs;

/// Renders the graph as a Graphviz `digraph`
#[derive(Debug, Default)]
pub struct DotBackend;

impl DotBackend {
    /// Create the backend
    pub fn new() -> Self {
        Self
    }
}

impl Backend for DotBackend {
    fn name(&self) -> &'static str {
        "dot"
    }

    fn generate(&self, graph: &Graph, options: &CodegenOptions) -> Result<CodegenOutput> {
        let mut out = String::new();
        writeln!(out, "digraph \"{}\" {{", escape(&options.analysis_name)).map_err(fmt_error)?;
        writeln!(out, "  rankdir=LR;").map_err(fmt_error)?;

        reverse_dfs(
            graph,
            &[SINK],
            |_| Ok(()),
            |id| {
                node_fragment(&mut out, graph, id, options.debug).map_err(fmt_error)?;
                edge_fragment(&mut out, graph, id)
            },
        )?;

        out.push_str("}\n");
        Ok(CodegenOutput::Visualization(out))
    }
}

fn node_fragment(out: &mut String, graph: &Graph, id: NodeId, debug: bool) -> std::fmt::Result {
    let Some(node) = graph.node(id) else {
        return Ok(());
    };
    let suffix = if debug { format!(" [{}]", id) } else { String::new() };

    match &node.element {
        Element::Stream(stream) => writeln!(
            out,
            "  {} [label=\"{}\\n{}{}\", shape=ellipse];",
            id,
            escape(&stream.name),
            escape(&stream.ty),
            suffix
        ),
        Element::Analyzer(analyzer) => writeln!(
            out,
            "  {} [label=\"{}\\n{}{}\", shape=box];",
            id,
            escape(&analyzer.name),
            escape(&analyzer.operator.name),
            suffix
        ),
        Element::Sentinel(sentinel) => writeln!(
            out,
            "  {} [label=\"{}\", shape=point];",
            id,
            escape(&sentinel.name)
        ),
    }
}

fn edge_fragment(out: &mut String, graph: &Graph, id: NodeId) -> Result<()> {
    for edge in graph.in_edges(id)? {
        let style = if Graph::is_sentinel_edge(&edge) {
            " [style=dashed]"
        } else {
            ""
        };
        writeln!(out, "  {} -> {}{};", edge.src, edge.dst, style).map_err(fmt_error)?;
    }
    Ok(())
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn fmt_error(e: std::fmt::Error) -> Error {
    Error::Internal(format!("failed to write dot output: {}", e))
}
