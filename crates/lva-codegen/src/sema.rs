//! Semantic analysis
//!
//! A single reverse walk from Sink. Each node is handled when it is left, so
//! an analyzer is always finished before the streams it produces and every
//! stream before the analyzers consuming it. Per node, in order:
//!
//! 1. argument and stream type resolution
//! 2. attribute resolution and defaulting
//! 3. attribute overrides
//! 4. stream fan-out
//!
//! Only element payloads change. The topology is left untouched.

use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;

use lva_core::operators::{AttributeValue, OperatorInfo};

use crate::error::{Error, Result};
use crate::graph::{Edge, Graph, NodeId, SINK};
use crate::ir::{types_match, Element};
use crate::traversal::reverse_dfs_mut;

/// An `analyzer:attribute=value` override
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeOverride {
    /// Target analyzer
    pub analyzer: String,
    /// Target attribute
    pub attribute: String,
    /// Unparsed value, typed against the attribute's declaration
    pub value: String,
}

impl FromStr for AttributeOverride {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        let invalid = |message: &str| Error::InvalidOverride {
            text: text.to_string(),
            message: message.to_string(),
        };

        let (target, value) = text
            .split_once('=')
            .ok_or_else(|| invalid("expected analyzer:attribute=value"))?;
        let (analyzer, attribute) = target
            .split_once(':')
            .ok_or_else(|| invalid("expected analyzer:attribute=value"))?;

        let analyzer = analyzer.trim();
        let attribute = attribute.trim();
        if analyzer.is_empty() || attribute.is_empty() {
            return Err(invalid("analyzer and attribute names must not be empty"));
        }

        Ok(Self {
            analyzer: analyzer.to_string(),
            attribute: attribute.to_string(),
            value: value.to_string(),
        })
    }
}

impl std::fmt::Display for AttributeOverride {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}={}", self.analyzer, self.attribute, self.value)
    }
}

/// Semantic analyzer
#[derive(Debug, Default)]
pub struct Sema {
    overrides: Vec<AttributeOverride>,
}

impl Sema {
    /// Create an analyzer without overrides
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and attach `analyzer:attribute=value` overrides
    pub fn with_overrides<S: AsRef<str>>(mut self, overrides: &[S]) -> Result<Self> {
        for text in overrides {
            self.overrides.push(text.as_ref().parse()?);
        }
        Ok(self)
    }

    /// Attached overrides
    pub fn overrides(&self) -> &[AttributeOverride] {
        &self.overrides
    }

    /// Resolve types and attributes of a well-formed graph in place
    pub fn run(&self, graph: &mut Graph) -> Result<()> {
        let mut overridden: HashSet<String> = HashSet::new();

        reverse_dfs_mut(
            graph,
            &[SINK],
            |_, _| Ok(()),
            |graph, id| match graph.element(id)? {
                Element::Sentinel(_) => Ok(()),
                Element::Analyzer(_) => self.resolve_analyzer(graph, id, &mut overridden),
                Element::Stream(_) => resolve_stream(graph, id),
            },
        )?;

        if let Some(unused) = self
            .overrides
            .iter()
            .find(|o| !overridden.contains(&o.analyzer))
        {
            return Err(Error::InvalidOverride {
                text: unused.to_string(),
                message: format!("no analyzer named '{}'", unused.analyzer),
            });
        }

        tracing::debug!("Sema resolved {} nodes", graph.num_nodes());
        Ok(())
    }

    fn resolve_analyzer(
        &self,
        graph: &mut Graph,
        id: NodeId,
        overridden: &mut HashSet<String>,
    ) -> Result<()> {
        let analyzer = graph
            .element(id)?
            .as_analyzer()
            .ok_or_else(|| Error::Internal(format!("{} is not an analyzer", id)))?;
        let name = analyzer.name.clone();

        let input_streams = resolve_inputs(graph, id, &name, &analyzer.operator)?;
        let mut attributes = resolve_attributes(&name, &analyzer.operator, &analyzer.attributes)?;

        for o in self.overrides.iter().filter(|o| o.analyzer == name) {
            apply_override(&name, &analyzer.operator, &mut attributes, o)?;
            overridden.insert(name.clone());
        }

        tracing::debug!(
            "Resolved analyzer '{}': {} inputs, {} attributes",
            name,
            input_streams.len(),
            attributes.len()
        );

        let analyzer = graph
            .element_mut(id)?
            .as_analyzer_mut()
            .ok_or_else(|| Error::Internal(format!("{} is not an analyzer", id)))?;
        analyzer.input_streams = input_streams;
        analyzer.attributes = attributes;
        Ok(())
    }
}

fn resolve_inputs(
    graph: &Graph,
    id: NodeId,
    name: &str,
    operator: &OperatorInfo,
) -> Result<Vec<NodeId>> {
    let args = &operator.input_args;
    let mut by_port: Vec<Vec<Edge>> = vec![Vec::new(); args.len()];

    for edge in graph.in_edges(id)? {
        // A Source edge only says the analyzer has no inputs at all.
        if Graph::is_sentinel_edge(&edge) {
            continue;
        }
        let slot = usize::try_from(edge.dst_port)
            .ok()
            .and_then(|port| by_port.get_mut(port))
            .ok_or_else(|| Error::ExtraInput {
                analyzer: name.to_string(),
                stream: graph.name_of(edge.src),
                port: edge.dst_port,
            })?;
        slot.push(edge);
    }

    let mut input_streams = Vec::with_capacity(args.len());
    for ((port, arg), edges) in args.iter().enumerate().zip(&by_port) {
        let edge = match edges.as_slice() {
            [edge] => edge,
            [] => {
                return Err(Error::MissingInput {
                    analyzer: name.to_string(),
                    argument: arg.name.clone(),
                });
            }
            [_, extra, ..] => {
                return Err(Error::ExtraInput {
                    analyzer: name.to_string(),
                    stream: graph.name_of(extra.src),
                    port: extra.dst_port,
                });
            }
        };

        let element = graph.element(edge.src)?;
        let stream = element.as_stream().ok_or_else(|| Error::TypeMismatch {
            node: name.to_string(),
            message: format!(
                "input {} is the {} '{}', not a stream",
                port,
                element.kind(),
                element.name()
            ),
        })?;

        if !types_match(&stream.ty, &arg.ty) {
            return Err(Error::TypeMismatch {
                node: name.to_string(),
                message: format!(
                    "stream '{}' of type '{}' cannot feed argument '{}' of type '{}'",
                    stream.name, stream.ty, arg.name, arg.ty
                ),
            });
        }
        input_streams.push(edge.src);
    }

    Ok(input_streams)
}

fn resolve_attributes(
    name: &str,
    operator: &OperatorInfo,
    supplied: &BTreeMap<String, AttributeValue>,
) -> Result<BTreeMap<String, AttributeValue>> {
    for (attribute, value) in supplied {
        let signature = operator
            .attribute(attribute)
            .ok_or_else(|| Error::UnknownAttribute {
                analyzer: name.to_string(),
                operator: operator.name.clone(),
                attribute: attribute.clone(),
            })?;
        if value.attribute_type() != signature.ty {
            return Err(Error::AttributeTypeMismatch {
                analyzer: name.to_string(),
                attribute: attribute.clone(),
                expected: signature.ty.to_string(),
                actual: value.attribute_type().to_string(),
            });
        }
        check_finite(name, attribute, value)?;
    }

    let mut resolved = BTreeMap::new();
    for signature in &operator.attributes {
        let value = supplied
            .get(&signature.name)
            .or(signature.default.as_ref())
            .ok_or_else(|| Error::MissingAttribute {
                analyzer: name.to_string(),
                attribute: signature.name.clone(),
            })?;
        check_finite(name, &signature.name, value)?;
        resolved.insert(signature.name.clone(), value.clone());
    }
    Ok(resolved)
}

// Runtime configs are JSON, which has no NaN or infinity.
fn check_finite(name: &str, attribute: &str, value: &AttributeValue) -> Result<()> {
    if value.is_finite() {
        return Ok(());
    }
    Err(Error::AttributeTypeMismatch {
        analyzer: name.to_string(),
        attribute: attribute.to_string(),
        expected: "finite float".to_string(),
        actual: value.to_string(),
    })
}

fn apply_override(
    name: &str,
    operator: &OperatorInfo,
    attributes: &mut BTreeMap<String, AttributeValue>,
    o: &AttributeOverride,
) -> Result<()> {
    let signature = operator
        .attribute(&o.attribute)
        .ok_or_else(|| Error::UnknownAttribute {
            analyzer: name.to_string(),
            operator: operator.name.clone(),
            attribute: o.attribute.clone(),
        })?;
    let value = AttributeValue::parse_as(signature.ty, &o.value).map_err(|e| {
        Error::InvalidOverride {
            text: o.to_string(),
            message: e.to_string(),
        }
    })?;

    if let Some(previous) = attributes.insert(o.attribute.clone(), value.clone())
        && previous != value
    {
        tracing::warn!(
            "Overriding {}:{} ({} -> {})",
            name,
            o.attribute,
            previous,
            value
        );
    }
    Ok(())
}

fn resolve_stream(graph: &mut Graph, id: NodeId) -> Result<()> {
    let stream = graph
        .element(id)?
        .as_stream()
        .ok_or_else(|| Error::Internal(format!("{} is not a stream", id)))?;
    let mismatch = |message: String| Error::TypeMismatch {
        node: stream.name.clone(),
        message,
    };

    let producers: Vec<Edge> = graph
        .in_edges(id)?
        .into_iter()
        .filter(|e| !Graph::is_sentinel_edge(e))
        .collect();
    let [edge] = producers.as_slice() else {
        return Err(mismatch(format!(
            "expected one producing analyzer, found {}",
            producers.len()
        )));
    };

    let element = graph.element(edge.src)?;
    let producer = element.as_analyzer().ok_or_else(|| {
        mismatch(format!(
            "produced by the {} '{}', not an analyzer",
            element.kind(),
            element.name()
        ))
    })?;
    let index = usize::try_from(edge.src_port)
        .ok()
        .filter(|i| *i < producer.operator.output_args.len())
        .ok_or_else(|| {
            mismatch(format!(
                "'{}' has no output argument at port {}",
                producer.name, edge.src_port
            ))
        })?;
    let arg = &producer.operator.output_args[index];

    if !types_match(&stream.ty, &arg.ty) {
        return Err(mismatch(format!(
            "stream type '{}' does not match output argument '{}' of type '{}'",
            stream.ty, arg.name, arg.ty
        )));
    }

    let fan_out = graph
        .out_edges(id)?
        .iter()
        .filter(|e| e.dst != SINK)
        .count();
    let producer_id = edge.src;

    let slot = graph
        .element_mut(producer_id)?
        .as_analyzer_mut()
        .and_then(|a| a.output_streams.get_mut(index))
        .ok_or_else(|| {
            Error::Internal(format!("no output slot {} on {}", index, producer_id))
        })?;
    *slot = Some(id);

    match graph.element_mut(id)? {
        Element::Stream(stream) => {
            stream.fan_out = fan_out;
            Ok(())
        }
        other => Err(Error::Internal(format!(
            "{} turned into a {} during sema",
            id,
            other.kind()
        ))),
    }
}
