//! Abstract semantic graph
//!
//! A directed multigraph stored as two arenas. Nodes and edges are addressed
//! by integer ids that are never reused: removing an edge leaves a tombstone
//! in its slot, so ids held elsewhere stay valid references (or become
//! detectably stale).
//!
//! Two nodes exist from construction: [`SOURCE`] (id 0) and [`SINK`] (id 1).
//! Edges touching them use port [`SENTINEL_PORT`].

use std::fmt;

use crate::error::{Error, Result};
use crate::ir::{Element, SentinelInfo};

/// Port index on a node's inputs or outputs
pub type Port = i32;

/// Port used by every edge touching a sentinel
pub const SENTINEL_PORT: Port = -1;

/// Identifier of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Identifier of an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub usize);

/// The Source sentinel
pub const SOURCE: NodeId = NodeId(0);

/// The Sink sentinel
pub const SINK: NodeId = NodeId(1);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// A graph node
#[derive(Debug, Clone)]
pub struct Node {
    /// Node id
    pub id: NodeId,

    /// Incoming edges (order not significant)
    pub in_edges: Vec<EdgeId>,

    /// Outgoing edges (order not significant)
    pub out_edges: Vec<EdgeId>,

    /// Payload
    pub element: Element,
}

/// A graph edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    /// Edge id
    pub id: EdgeId,

    /// Source node
    pub src: NodeId,

    /// Output port on the source node
    pub src_port: Port,

    /// Destination node
    pub dst: NodeId,

    /// Input port on the destination node
    pub dst_port: Port,
}

/// Arena-backed directed multigraph
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: Vec<Option<Node>>,
    edges: Vec<Option<Edge>>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl AsRef<Graph> for Graph {
    fn as_ref(&self) -> &Graph {
        self
    }
}

impl Graph {
    /// Create a graph holding only the Source and Sink sentinels
    pub fn new() -> Self {
        let mut graph = Self {
            nodes: Vec::new(),
            edges: Vec::new(),
        };
        graph.add_node(Element::Sentinel(SentinelInfo::new("Source")));
        graph.add_node(Element::Sentinel(SentinelInfo::new("Sink")));
        graph
    }

    /// Add a node and return its fresh id
    pub fn add_node(&mut self, element: Element) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(Node {
            id,
            in_edges: Vec::new(),
            out_edges: Vec::new(),
            element,
        }));
        id
    }

    /// Connect `src` at `src_port` to `dst` at `dst_port`
    ///
    /// Ports and payload types are not checked here; that is the verifiers'
    /// and sema's job.
    pub fn add_edge(
        &mut self,
        src: NodeId,
        src_port: Port,
        dst: NodeId,
        dst_port: Port,
    ) -> Result<EdgeId> {
        self.try_node(src)?;
        self.try_node(dst)?;

        let id = EdgeId(self.edges.len());
        self.edges.push(Some(Edge {
            id,
            src,
            src_port,
            dst,
            dst_port,
        }));
        self.try_node_mut(src)?.out_edges.push(id);
        self.try_node_mut(dst)?.in_edges.push(id);
        Ok(id)
    }

    /// Remove an edge from both adjacency lists and tombstone it
    pub fn remove_edge(&mut self, id: EdgeId) -> Result<()> {
        let edge = *self.try_edge(id)?;

        let out_pos = Self::position(&self.try_node(edge.src)?.out_edges, id, "outgoing")?;
        let in_pos = Self::position(&self.try_node(edge.dst)?.in_edges, id, "incoming")?;

        self.try_node_mut(edge.src)?.out_edges.swap_remove(out_pos);
        self.try_node_mut(edge.dst)?.in_edges.swap_remove(in_pos);
        self.edges[id.0] = None;
        Ok(())
    }

    fn position(list: &[EdgeId], id: EdgeId, which: &str) -> Result<usize> {
        list.iter().position(|e| *e == id).ok_or_else(|| {
            Error::Internal(format!("edge {} missing from its {} adjacency list", id, which))
        })
    }

    /// Node by id, `None` if absent
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    /// Mutable node by id, `None` if absent
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Node by id, internal error if absent
    pub fn try_node(&self, id: NodeId) -> Result<&Node> {
        self.node(id)
            .ok_or_else(|| Error::Internal(format!("node {} is not in the graph", id)))
    }

    /// Mutable node by id, internal error if absent
    pub fn try_node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.node_mut(id)
            .ok_or_else(|| Error::Internal(format!("node {} is not in the graph", id)))
    }

    /// Edge by id, `None` if absent or removed
    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.0).and_then(Option::as_ref)
    }

    /// Edge by id, internal error if absent
    pub fn try_edge(&self, id: EdgeId) -> Result<&Edge> {
        self.edge(id)
            .ok_or_else(|| Error::Internal(format!("edge {} is not in the graph", id)))
    }

    /// Payload of a node
    pub fn element(&self, id: NodeId) -> Result<&Element> {
        Ok(&self.try_node(id)?.element)
    }

    /// Mutable payload of a node
    pub fn element_mut(&mut self, id: NodeId) -> Result<&mut Element> {
        Ok(&mut self.try_node_mut(id)?.element)
    }

    /// Display name of a node, or its id if absent
    pub fn name_of(&self, id: NodeId) -> String {
        self.node(id)
            .map(|n| n.element.name().to_string())
            .unwrap_or_else(|| id.to_string())
    }

    /// Whether `id` is Source or Sink
    pub fn is_sentinel(id: NodeId) -> bool {
        id == SOURCE || id == SINK
    }

    /// Whether an edge touches a sentinel
    pub fn is_sentinel_edge(edge: &Edge) -> bool {
        Self::is_sentinel(edge.src) || Self::is_sentinel(edge.dst)
    }

    /// Number of present nodes
    pub fn num_nodes(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Number of present edges
    pub fn num_edges(&self) -> usize {
        self.edges.iter().filter(|e| e.is_some()).count()
    }

    /// Present nodes in id order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter_map(Option::as_ref)
    }

    /// Present edges in id order
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter_map(Option::as_ref)
    }

    /// Ids of present non-sentinel nodes in id order
    pub fn inner_node_ids(&self) -> Vec<NodeId> {
        self.nodes()
            .map(|n| n.id)
            .filter(|id| !Self::is_sentinel(*id))
            .collect()
    }

    /// Incoming edges of a node, resolved
    pub fn in_edges(&self, id: NodeId) -> Result<Vec<Edge>> {
        self.try_node(id)?
            .in_edges
            .iter()
            .map(|e| self.try_edge(*e).copied())
            .collect()
    }

    /// Outgoing edges of a node, resolved
    pub fn out_edges(&self, id: NodeId) -> Result<Vec<Edge>> {
        self.try_node(id)?
            .out_edges
            .iter()
            .map(|e| self.try_edge(*e).copied())
            .collect()
    }
}
