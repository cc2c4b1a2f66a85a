//! Analysis definition to graph builder
//!
//! Turns an [`AnalysisDefinition`] plus an operator registry into a
//! well-formed [`Graph`]. Either the whole graph is built and verified, or
//! no graph is returned at all.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use lva_core::analysis::{AnalysisDefinition, AnalyzerDefinition};
use lva_core::registry::OperatorRegistry;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};
use crate::graph::{Graph, NodeId};
use crate::ir::{AnalyzerInfo, Element, StreamInfo};
use crate::traversal::{fixup_source_and_sink_edges, refresh_sentinel_names};
use crate::verify::verify_well_formed;

static ANALYZER_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z][a-z0-9]*(_[a-z0-9]+)*$").expect("analyzer name pattern is valid")
});

/// Check an analyzer name against `[a-z][a-z0-9]*(_[a-z0-9]+)*`
pub fn is_valid_analyzer_name(name: &str) -> bool {
    ANALYZER_NAME.is_match(name)
}

/// Name of the stream produced by an analyzer's output argument
pub fn stream_name(analyzer: &str, argument: &str) -> String {
    format!("{}:{}", analyzer, argument)
}

/// A parsed analysis
#[derive(Debug)]
pub struct ParsedAnalysis {
    /// Name from the definition, if it has one
    pub name: Option<String>,

    /// The verified graph
    pub graph: Graph,
}

/// Builder of analysis graphs
pub struct Parser {
    registry: Arc<OperatorRegistry>,
}

impl Parser {
    /// Create a parser resolving operators in `registry`
    pub fn new(registry: Arc<OperatorRegistry>) -> Self {
        Self { registry }
    }

    /// Parse an analysis definition file
    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<ParsedAnalysis> {
        let content = std::fs::read_to_string(path.as_ref())?;
        self.parse_yaml(&content)
    }

    /// Parse an analysis definition from YAML
    pub fn parse_yaml(&self, yaml: &str) -> Result<ParsedAnalysis> {
        let definition: AnalysisDefinition = serde_yaml::from_str(yaml)?;
        let graph = self.build(&definition)?;
        Ok(ParsedAnalysis {
            name: definition.name,
            graph,
        })
    }

    /// Build and verify the graph of a definition
    pub fn build(&self, definition: &AnalysisDefinition) -> Result<Graph> {
        let mut graph = Graph::new();
        let mut symbols: HashMap<String, NodeId> = HashMap::new();
        let mut analyzers = Vec::with_capacity(definition.analyzers.len());

        for decl in &definition.analyzers {
            let id = self.add_analyzer(&mut graph, &mut symbols, decl)?;
            analyzers.push((id, decl));
        }

        for (id, decl) in &analyzers {
            for (port, reference) in decl.inputs.iter().enumerate() {
                let stream = symbols
                    .get(reference)
                    .copied()
                    .filter(|s| matches!(graph.node(*s), Some(n) if n.element.as_stream().is_some()))
                    .ok_or_else(|| Error::UndefinedReference {
                        analyzer: decl.analyzer.clone(),
                        reference: reference.clone(),
                    })?;
                graph.add_edge(stream, 0, *id, to_port(port)?)?;
            }
        }

        fixup_source_and_sink_edges(&mut graph)?;
        refresh_sentinel_names(&mut graph)?;
        verify_well_formed(&graph)?;

        tracing::debug!(
            "Built graph with {} nodes and {} edges",
            graph.num_nodes(),
            graph.num_edges()
        );
        Ok(graph)
    }

    fn add_analyzer(
        &self,
        graph: &mut Graph,
        symbols: &mut HashMap<String, NodeId>,
        decl: &AnalyzerDefinition,
    ) -> Result<NodeId> {
        let name = &decl.analyzer;
        if !is_valid_analyzer_name(name) {
            return Err(Error::InvalidName { name: name.clone() });
        }
        if symbols.contains_key(name) {
            return Err(Error::DuplicateName { name: name.clone() });
        }

        let operator = self
            .registry
            .lookup(&decl.operator)
            .ok_or_else(|| Error::UnknownOperator {
                analyzer: name.clone(),
                operator: decl.operator.clone(),
            })?;

        if let Some(attribute) = decl.attrs.keys().find(|a| operator.attribute(a).is_none()) {
            return Err(Error::UnknownAttribute {
                analyzer: name.clone(),
                operator: operator.name.clone(),
                attribute: attribute.clone(),
            });
        }

        let outputs: Vec<(String, String)> = operator
            .output_args
            .iter()
            .map(|arg| (stream_name(name, &arg.name), arg.ty.clone()))
            .collect();

        let mut info = AnalyzerInfo::new(name.clone(), operator);
        info.attributes = decl.attrs.clone();
        info.resources.env.extend(decl.debug_environment());
        info.monitoring = decl.monitoring.clone();

        tracing::debug!("Adding analyzer '{}' ({})", name, info.operator.name);
        let id = graph.add_node(Element::Analyzer(info));
        symbols.insert(name.clone(), id);

        for (port, (stream, ty)) in outputs.into_iter().enumerate() {
            if symbols.contains_key(&stream) {
                return Err(Error::DuplicateName { name: stream });
            }
            let stream_id = graph.add_node(Element::Stream(StreamInfo::new(stream.clone(), ty)));
            graph.add_edge(id, to_port(port)?, stream_id, 0)?;
            symbols.insert(stream, stream_id);
        }

        Ok(id)
    }
}

fn to_port(index: usize) -> Result<i32> {
    i32::try_from(index).map_err(|_| Error::Internal(format!("port index {} out of range", index)))
}
