//! Well-formedness checks
//!
//! A well-formed graph satisfies, in order of checking:
//!
//! 1. no node has two in-edges at the same input port;
//! 2. Source has no in-edges and Sink no out-edges, sentinel edges use
//!    port -1 on both ends, and a node is connected to Source exactly when it
//!    has no other inputs (to Sink exactly when it has no other outputs);
//! 3. ignoring sentinel edges, there are no cycles;
//! 4. every non-sentinel node is reachable from Source and reaches Sink.
//!
//! Every failure is terminal; callers never try to repair a graph.

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::graph::{Edge, Graph, NodeId, SENTINEL_PORT, SINK, SOURCE};
use crate::traversal::{dfs, reverse_dfs};

/// Run every check
pub fn verify_well_formed(graph: &Graph) -> Result<()> {
    verify_no_duplicate_inputs(graph)?;
    verify_source_and_sink_edges(graph)?;
    verify_graph_has_no_cycles(graph)?;
    verify_reachable_from_source(graph)?;
    verify_reaches_sink(graph)?;

    tracing::debug!(
        "Graph is well-formed ({} nodes, {} edges)",
        graph.num_nodes(),
        graph.num_edges()
    );
    Ok(())
}

/// No node has two ordinary in-edges at the same port
pub fn verify_no_duplicate_inputs(graph: &Graph) -> Result<()> {
    for id in graph.inner_node_ids() {
        let mut ports = HashSet::new();
        for edge in graph.in_edges(id)? {
            if Graph::is_sentinel_edge(&edge) {
                continue;
            }
            if !ports.insert(edge.dst_port) {
                return Err(Error::DuplicateInput {
                    node: graph.name_of(id),
                    port: edge.dst_port,
                });
            }
        }
    }
    Ok(())
}

/// Sentinel edges are exactly the ones fixup would produce
pub fn verify_source_and_sink_edges(graph: &Graph) -> Result<()> {
    let linkage = |node: NodeId, message: String| Error::SentinelLinkage {
        node: graph.name_of(node),
        message,
    };

    if !graph.try_node(SOURCE)?.in_edges.is_empty() {
        return Err(linkage(SOURCE, "Source has incoming edges".to_string()));
    }
    if !graph.try_node(SINK)?.out_edges.is_empty() {
        return Err(linkage(SINK, "Sink has outgoing edges".to_string()));
    }

    for edge in graph.edges() {
        if Graph::is_sentinel_edge(edge) {
            if edge.src_port != SENTINEL_PORT || edge.dst_port != SENTINEL_PORT {
                return Err(linkage(
                    edge.src,
                    format!(
                        "sentinel edge to '{}' uses ports {}/{} instead of {}",
                        graph.name_of(edge.dst),
                        edge.src_port,
                        edge.dst_port,
                        SENTINEL_PORT
                    ),
                ));
            }
            if Graph::is_sentinel(edge.src) && Graph::is_sentinel(edge.dst) {
                return Err(linkage(edge.src, "sentinels are connected to each other".to_string()));
            }
        } else if edge.src_port < 0 || edge.dst_port < 0 {
            return Err(linkage(
                edge.src,
                format!(
                    "edge to '{}' uses a negative port outside a sentinel edge",
                    graph.name_of(edge.dst)
                ),
            ));
        }
    }

    for id in graph.inner_node_ids() {
        let in_edges = graph.in_edges(id)?;
        let out_edges = graph.out_edges(id)?;
        check_sentinel_side(graph, id, &in_edges, |e| e.src, SOURCE, "Source", "inputs")?;
        check_sentinel_side(graph, id, &out_edges, |e| e.dst, SINK, "Sink", "outputs")?;
    }

    Ok(())
}

fn check_sentinel_side(
    graph: &Graph,
    node: NodeId,
    edges: &[Edge],
    other_end: impl Fn(&Edge) -> NodeId,
    sentinel: NodeId,
    sentinel_name: &str,
    what: &str,
) -> Result<()> {
    let linkage = |message: String| Error::SentinelLinkage {
        node: graph.name_of(node),
        message,
    };

    let to_sentinel = edges.iter().filter(|e| other_end(e) == sentinel).count();
    let ordinary = edges
        .iter()
        .filter(|e| !Graph::is_sentinel(other_end(e)))
        .count();

    if edges.len() != to_sentinel + ordinary {
        return Err(linkage(format!(
            "has {} attached to the wrong sentinel",
            what
        )));
    }
    if to_sentinel > 1 {
        return Err(linkage(format!(
            "connected to {} {} times",
            sentinel_name, to_sentinel
        )));
    }
    match (to_sentinel == 1, ordinary == 0) {
        (true, false) => Err(linkage(format!(
            "connected to {} but has other {}",
            sentinel_name, what
        ))),
        (false, true) => Err(linkage(format!(
            "has no {} and no {} edge",
            what, sentinel_name
        ))),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Completed,
}

/// No cycles once sentinel edges are ignored
///
/// On a back-edge the cycle is rebuilt from parent links and reported in
/// edge order, starting at the node the back-edge points to.
pub fn verify_graph_has_no_cycles(graph: &Graph) -> Result<()> {
    let mut marks: HashMap<NodeId, Mark> = HashMap::new();
    let mut parent: HashMap<NodeId, NodeId> = HashMap::new();

    for root in graph.inner_node_ids() {
        if marks.contains_key(&root) {
            continue;
        }

        marks.insert(root, Mark::Visiting);
        let mut stack: Vec<(NodeId, Vec<NodeId>, usize)> =
            vec![(root, inner_successors(graph, root)?, 0)];

        while let Some((node, successors, next)) = stack.last_mut() {
            let node = *node;
            let Some(&succ) = successors.get(*next) else {
                marks.insert(node, Mark::Completed);
                stack.pop();
                continue;
            };
            *next += 1;

            match marks.get(&succ) {
                None => {
                    marks.insert(succ, Mark::Visiting);
                    parent.insert(succ, node);
                    stack.push((succ, inner_successors(graph, succ)?, 0));
                }
                Some(Mark::Visiting) => {
                    let mut path = vec![node];
                    let mut cur = node;
                    while cur != succ {
                        cur = *parent.get(&cur).ok_or_else(|| {
                            Error::Internal(format!(
                                "cycle walk from '{}' lost its parent link",
                                graph.name_of(cur)
                            ))
                        })?;
                        path.push(cur);
                    }
                    path.reverse();
                    return Err(Error::Cycle {
                        path: path.into_iter().map(|id| graph.name_of(id)).collect(),
                    });
                }
                Some(Mark::Completed) => {}
            }
        }
    }

    Ok(())
}

fn inner_successors(graph: &Graph, node: NodeId) -> Result<Vec<NodeId>> {
    Ok(graph
        .out_edges(node)?
        .iter()
        .map(|e| e.dst)
        .filter(|dst| !Graph::is_sentinel(*dst))
        .collect())
}

/// Every node is discovered by a walk from Source
pub fn verify_reachable_from_source(graph: &Graph) -> Result<()> {
    let mut seen = HashSet::new();
    dfs(
        graph,
        &[SOURCE],
        |node| {
            seen.insert(node);
            Ok(())
        },
        |_| Ok(()),
    )?;
    report_missing(graph, &seen, "Source")
}

/// Every node is discovered by a reverse walk from Sink
pub fn verify_reaches_sink(graph: &Graph) -> Result<()> {
    let mut seen = HashSet::new();
    reverse_dfs(
        graph,
        &[SINK],
        |node| {
            seen.insert(node);
            Ok(())
        },
        |_| Ok(()),
    )?;
    report_missing(graph, &seen, "Sink")
}

fn report_missing(graph: &Graph, seen: &HashSet<NodeId>, origin: &str) -> Result<()> {
    match graph
        .inner_node_ids()
        .into_iter()
        .find(|id| !seen.contains(id))
    {
        Some(id) => Err(Error::Unreachable {
            node: graph.name_of(id),
            origin: origin.to_string(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Element, StreamInfo};
    use crate::traversal::fixup_source_and_sink_edges;

    fn node(graph: &mut Graph, name: &str) -> NodeId {
        graph.add_node(Element::Stream(StreamInfo::new(name, "special/any")))
    }

    fn chain() -> (Graph, Vec<NodeId>) {
        let mut graph = Graph::new();
        let ids: Vec<NodeId> = ["a", "b", "c"].iter().map(|n| node(&mut graph, n)).collect();
        graph.add_edge(ids[0], 0, ids[1], 0).unwrap();
        graph.add_edge(ids[1], 0, ids[2], 0).unwrap();
        fixup_source_and_sink_edges(&mut graph).unwrap();
        (graph, ids)
    }

    #[test]
    fn test_chain_is_well_formed() {
        let (graph, _) = chain();
        verify_well_formed(&graph).unwrap();
    }

    #[test]
    fn test_empty_graph_is_well_formed() {
        verify_well_formed(&Graph::new()).unwrap();
    }

    #[test]
    fn test_duplicate_input_port() {
        let (mut graph, ids) = chain();
        let extra = node(&mut graph, "extra");
        graph.add_edge(extra, 0, ids[2], 0).unwrap();
        fixup_source_and_sink_edges(&mut graph).unwrap();

        let err = verify_no_duplicate_inputs(&graph).unwrap_err();
        assert!(matches!(err, Error::DuplicateInput { ref node, port: 0 } if node == "c"));
        assert!(verify_well_formed(&graph).is_err());
    }

    #[test]
    fn test_missing_fixup_is_linkage_error() {
        let mut graph = Graph::new();
        node(&mut graph, "a");
        let err = verify_source_and_sink_edges(&graph).unwrap_err();
        assert!(matches!(err, Error::SentinelLinkage { .. }));
        assert!(err.to_string().contains("no inputs and no Source edge"));
    }

    #[test]
    fn test_double_source_connection() {
        let (mut graph, ids) = chain();
        graph
            .add_edge(SOURCE, SENTINEL_PORT, ids[0], SENTINEL_PORT)
            .unwrap();
        let err = verify_source_and_sink_edges(&graph).unwrap_err();
        assert!(err.to_string().contains("connected to Source 2 times"));
    }

    #[test]
    fn test_source_edge_with_other_inputs() {
        let (mut graph, ids) = chain();
        graph
            .add_edge(SOURCE, SENTINEL_PORT, ids[1], SENTINEL_PORT)
            .unwrap();
        let err = verify_source_and_sink_edges(&graph).unwrap_err();
        assert!(err.to_string().contains("connected to Source but has other inputs"));
    }

    #[test]
    fn test_sink_edge_with_other_outputs() {
        let (mut graph, ids) = chain();
        graph.add_edge(ids[0], SENTINEL_PORT, SINK, SENTINEL_PORT).unwrap();
        let err = verify_source_and_sink_edges(&graph).unwrap_err();
        assert!(err.to_string().contains("connected to Sink but has other outputs"));
    }

    #[test]
    fn test_sentinel_edge_with_ordinary_port() {
        let mut graph = Graph::new();
        let a = node(&mut graph, "a");
        graph.add_edge(SOURCE, 0, a, SENTINEL_PORT).unwrap();
        graph.add_edge(a, SENTINEL_PORT, SINK, SENTINEL_PORT).unwrap();
        let err = verify_source_and_sink_edges(&graph).unwrap_err();
        assert!(err.to_string().contains("instead of -1"));
    }

    #[test]
    fn test_ordinary_edge_with_sentinel_port() {
        let (mut graph, ids) = chain();
        graph.add_edge(ids[0], SENTINEL_PORT, ids[2], 1).unwrap();
        let err = verify_source_and_sink_edges(&graph).unwrap_err();
        assert!(err.to_string().contains("negative port"));
    }

    #[test]
    fn test_edge_into_source() {
        let (mut graph, ids) = chain();
        graph.add_edge(ids[2], SENTINEL_PORT, SOURCE, SENTINEL_PORT).unwrap();
        let err = verify_source_and_sink_edges(&graph).unwrap_err();
        assert!(err.to_string().contains("Source has incoming edges"));
    }

    #[test]
    fn test_two_node_cycle() {
        let mut graph = Graph::new();
        let a = node(&mut graph, "a");
        let b = node(&mut graph, "b");
        graph.add_edge(a, 0, b, 0).unwrap();
        let back = graph.add_edge(b, 0, a, 0).unwrap();
        fixup_source_and_sink_edges(&mut graph).unwrap();

        let err = verify_graph_has_no_cycles(&graph).unwrap_err();
        match &err {
            Error::Cycle { path } => assert_eq!(path, &vec!["a".to_string(), "b".to_string()]),
            other => panic!("Expected cycle, got {other}"),
        }
        assert!(verify_well_formed(&graph).is_err());

        graph.remove_edge(back).unwrap();
        fixup_source_and_sink_edges(&mut graph).unwrap();
        verify_graph_has_no_cycles(&graph).unwrap();
        verify_well_formed(&graph).unwrap();
    }

    #[test]
    fn test_cycle_path_excludes_tail() {
        // t -> a -> b -> c -> a
        let mut graph = Graph::new();
        let t = node(&mut graph, "t");
        let a = node(&mut graph, "a");
        let b = node(&mut graph, "b");
        let c = node(&mut graph, "c");
        graph.add_edge(t, 0, a, 0).unwrap();
        graph.add_edge(a, 0, b, 0).unwrap();
        graph.add_edge(b, 0, c, 0).unwrap();
        graph.add_edge(c, 0, a, 1).unwrap();
        fixup_source_and_sink_edges(&mut graph).unwrap();

        let err = verify_graph_has_no_cycles(&graph).unwrap_err();
        assert_eq!(err.to_string(), "cycle detected: a -> b -> c -> a");
    }

    #[test]
    fn test_self_loop() {
        let mut graph = Graph::new();
        let a = node(&mut graph, "a");
        graph.add_edge(a, 0, a, 0).unwrap();
        let err = verify_graph_has_no_cycles(&graph).unwrap_err();
        assert!(matches!(err, Error::Cycle { ref path } if path == &vec!["a".to_string()]));
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let mut graph = Graph::new();
        let a = node(&mut graph, "a");
        let b = node(&mut graph, "b");
        let c = node(&mut graph, "c");
        let d = node(&mut graph, "d");
        graph.add_edge(a, 0, b, 0).unwrap();
        graph.add_edge(a, 1, c, 0).unwrap();
        graph.add_edge(b, 0, d, 0).unwrap();
        graph.add_edge(c, 0, d, 1).unwrap();
        verify_graph_has_no_cycles(&graph).unwrap();
    }

    #[test]
    fn test_cycle_unreachable_from_source() {
        let (mut graph, _) = chain();
        let x = node(&mut graph, "x");
        let y = node(&mut graph, "y");
        graph.add_edge(x, 0, y, 0).unwrap();
        graph.add_edge(y, 0, x, 0).unwrap();
        fixup_source_and_sink_edges(&mut graph).unwrap();

        let err = verify_reachable_from_source(&graph).unwrap_err();
        assert!(matches!(
            err,
            Error::Unreachable { ref node, ref origin } if node == "x" && origin == "Source"
        ));
        let err = verify_reaches_sink(&graph).unwrap_err();
        assert!(matches!(err, Error::Unreachable { ref origin, .. } if origin == "Sink"));
    }

    #[test]
    fn test_unreachable_without_fixup() {
        let (mut graph, _) = chain();
        node(&mut graph, "orphan");
        let err = verify_reachable_from_source(&graph).unwrap_err();
        assert_eq!(err.to_string(), "'orphan' is not reachable from Source");
    }
}
