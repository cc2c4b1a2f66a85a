//! Graph traversal
//!
//! Depth-first walks with `enter`/`leave` hooks, driven by an explicit stack
//! so postorder callbacks never need native recursion. Also holds the
//! sentinel-edge normalization every topology edit must be followed by.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::graph::{EdgeId, Graph, NodeId, SENTINEL_PORT, SINK, SOURCE};
use crate::ir::Element;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Reverse,
}

/// Per-node traversal state; also tags stack frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Undiscovered,
    Visiting,
    Completed,
}

/// Walk out-edges depth-first from `starts`
///
/// `enter` fires once per node when it is first discovered; `leave` fires
/// once after every node reachable through its out-edges has been explored.
/// The first callback error aborts the walk and is returned.
pub fn dfs<E, L>(graph: &Graph, starts: &[NodeId], mut enter: E, mut leave: L) -> Result<()>
where
    E: FnMut(NodeId) -> Result<()>,
    L: FnMut(NodeId) -> Result<()>,
{
    let mut view = graph;
    walk(
        &mut view,
        Direction::Forward,
        starts,
        |_, node| enter(node),
        |_, node| leave(node),
    )
}

/// Walk in-edges depth-first from `starts`
///
/// Same contract as [`dfs`] with edge direction flipped. Started from
/// [`SINK`], `leave` visits every node after all of its producers.
pub fn reverse_dfs<E, L>(graph: &Graph, starts: &[NodeId], mut enter: E, mut leave: L) -> Result<()>
where
    E: FnMut(NodeId) -> Result<()>,
    L: FnMut(NodeId) -> Result<()>,
{
    let mut view = graph;
    walk(
        &mut view,
        Direction::Reverse,
        starts,
        |_, node| enter(node),
        |_, node| leave(node),
    )
}

/// [`dfs`] whose callbacks may edit node payloads
///
/// Callbacks must not add or remove nodes or edges.
pub fn dfs_mut<E, L>(graph: &mut Graph, starts: &[NodeId], enter: E, leave: L) -> Result<()>
where
    E: FnMut(&mut Graph, NodeId) -> Result<()>,
    L: FnMut(&mut Graph, NodeId) -> Result<()>,
{
    walk(graph, Direction::Forward, starts, enter, leave)
}

/// [`reverse_dfs`] whose callbacks may edit node payloads
///
/// Callbacks must not add or remove nodes or edges.
pub fn reverse_dfs_mut<E, L>(graph: &mut Graph, starts: &[NodeId], enter: E, leave: L) -> Result<()>
where
    E: FnMut(&mut Graph, NodeId) -> Result<()>,
    L: FnMut(&mut Graph, NodeId) -> Result<()>,
{
    walk(graph, Direction::Reverse, starts, enter, leave)
}

fn walk<G, E, L>(
    graph: &mut G,
    direction: Direction,
    starts: &[NodeId],
    mut enter: E,
    mut leave: L,
) -> Result<()>
where
    G: AsRef<Graph>,
    E: FnMut(&mut G, NodeId) -> Result<()>,
    L: FnMut(&mut G, NodeId) -> Result<()>,
{
    let mut state: HashMap<NodeId, VisitState> = HashMap::new();
    let mut stack: Vec<(NodeId, VisitState)> = starts
        .iter()
        .rev()
        .map(|node| (*node, VisitState::Undiscovered))
        .collect();

    while let Some((node, frame)) = stack.pop() {
        match frame {
            VisitState::Undiscovered => {
                if state.contains_key(&node) {
                    continue;
                }
                AsRef::<Graph>::as_ref(&*graph).try_node(node)?;

                state.insert(node, VisitState::Visiting);
                enter(graph, node)?;
                stack.push((node, VisitState::Visiting));

                let next = neighbors(AsRef::<Graph>::as_ref(&*graph), node, direction)?;
                for neighbor in next.into_iter().rev() {
                    if !state.contains_key(&neighbor) {
                        stack.push((neighbor, VisitState::Undiscovered));
                    }
                }
            }
            VisitState::Visiting => {
                leave(graph, node)?;
                state.insert(node, VisitState::Completed);
            }
            VisitState::Completed => {
                return Err(Error::Internal(format!(
                    "completed node {} pushed back onto the traversal stack",
                    node
                )));
            }
        }
    }

    Ok(())
}

fn neighbors(graph: &Graph, node: NodeId, direction: Direction) -> Result<Vec<NodeId>> {
    Ok(match direction {
        Direction::Forward => graph.out_edges(node)?.iter().map(|e| e.dst).collect(),
        Direction::Reverse => graph.in_edges(node)?.iter().map(|e| e.src).collect(),
    })
}

/// Re-derive every edge touching Source or Sink
///
/// Removes all sentinel edges, then connects Source to each node with no
/// remaining in-edges and each node with no remaining out-edges to Sink.
/// Idempotent; run it after any topology edit and before verification.
pub fn fixup_source_and_sink_edges(graph: &mut Graph) -> Result<()> {
    let sentinel_edges: Vec<EdgeId> = graph
        .edges()
        .filter(|e| Graph::is_sentinel_edge(e))
        .map(|e| e.id)
        .collect();
    for edge in sentinel_edges {
        graph.remove_edge(edge)?;
    }

    for id in graph.inner_node_ids() {
        let node = graph.try_node(id)?;
        let needs_source = node.in_edges.is_empty();
        let needs_sink = node.out_edges.is_empty();

        if needs_source {
            graph.add_edge(SOURCE, SENTINEL_PORT, id, SENTINEL_PORT)?;
        }
        if needs_sink {
            graph.add_edge(id, SENTINEL_PORT, SINK, SENTINEL_PORT)?;
        }
    }

    Ok(())
}

/// Fill the Source/Sink payloads with the names of their neighbors
pub fn refresh_sentinel_names(graph: &mut Graph) -> Result<()> {
    for sentinel in [SOURCE, SINK] {
        let mut inputs: Vec<NodeId> = graph.in_edges(sentinel)?.iter().map(|e| e.src).collect();
        let mut outputs: Vec<NodeId> = graph.out_edges(sentinel)?.iter().map(|e| e.dst).collect();
        inputs.sort();
        outputs.sort();

        let input_names: Vec<String> = inputs.iter().map(|id| graph.name_of(*id)).collect();
        let output_names: Vec<String> = outputs.iter().map(|id| graph.name_of(*id)).collect();

        match graph.element_mut(sentinel)? {
            Element::Sentinel(info) => {
                info.input_node_names = input_names;
                info.output_node_names = output_names;
            }
            other => {
                return Err(Error::Internal(format!(
                    "sentinel slot {} holds a {}",
                    sentinel,
                    other.kind()
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::StreamInfo;
    use std::collections::HashSet;

    fn node(graph: &mut Graph, name: &str) -> NodeId {
        graph.add_node(Element::Stream(StreamInfo::new(name, "special/any")))
    }

    fn edge_set(graph: &Graph) -> HashSet<(NodeId, i32, NodeId, i32)> {
        graph
            .edges()
            .map(|e| (e.src, e.src_port, e.dst, e.dst_port))
            .collect()
    }

    fn names(graph: &Graph, ids: &[NodeId]) -> Vec<String> {
        ids.iter().map(|id| graph.name_of(*id)).collect()
    }

    /// a -> b -> d, a -> c -> d
    fn diamond() -> (Graph, [NodeId; 4]) {
        let mut graph = Graph::new();
        let a = node(&mut graph, "a");
        let b = node(&mut graph, "b");
        let c = node(&mut graph, "c");
        let d = node(&mut graph, "d");
        graph.add_edge(a, 0, b, 0).unwrap();
        graph.add_edge(a, 0, c, 0).unwrap();
        graph.add_edge(b, 0, d, 0).unwrap();
        graph.add_edge(c, 0, d, 1).unwrap();
        fixup_source_and_sink_edges(&mut graph).unwrap();
        (graph, [a, b, c, d])
    }

    #[test]
    fn test_dfs_enter_and_leave_once() {
        let (graph, _) = diamond();
        let mut entered = Vec::new();
        let mut left = Vec::new();

        dfs(
            &graph,
            &[SOURCE],
            |n| {
                entered.push(n);
                Ok(())
            },
            |n| {
                left.push(n);
                Ok(())
            },
        )
        .unwrap();

        assert_eq!(entered.len(), 6);
        assert_eq!(left.len(), 6);
        assert_eq!(entered.iter().collect::<HashSet<_>>().len(), 6);
        assert_eq!(entered[0], SOURCE);
        assert_eq!(*left.last().unwrap(), SOURCE);
    }

    #[test]
    fn test_dfs_leave_is_postorder() {
        let (graph, [a, b, c, d]) = diamond();
        let mut left = Vec::new();
        dfs(&graph, &[SOURCE], |_| Ok(()), |n| {
            left.push(n);
            Ok(())
        })
        .unwrap();

        let pos = |n: NodeId| left.iter().position(|x| *x == n).unwrap();
        assert!(pos(SINK) < pos(d));
        assert!(pos(d) < pos(b));
        assert!(pos(d) < pos(c));
        assert!(pos(b) < pos(a));
        assert!(pos(c) < pos(a));
    }

    #[test]
    fn test_reverse_dfs_leave_is_topological() {
        let (graph, [a, b, c, d]) = diamond();
        let mut left = Vec::new();
        reverse_dfs(&graph, &[SINK], |_| Ok(()), |n| {
            left.push(n);
            Ok(())
        })
        .unwrap();

        assert_eq!(left.first(), Some(&SOURCE));
        assert_eq!(left.last(), Some(&SINK));
        let pos = |n: NodeId| left.iter().position(|x| *x == n).unwrap();
        assert!(pos(a) < pos(b));
        assert!(pos(a) < pos(c));
        assert!(pos(b) < pos(d));
        assert!(pos(c) < pos(d));
    }

    #[test]
    fn test_dfs_from_subset_of_forest() {
        // Two disconnected trees: r1 -> {x1, y1}, r2 -> {x2}
        let mut graph = Graph::new();
        let r1 = node(&mut graph, "r1");
        let x1 = node(&mut graph, "x1");
        let y1 = node(&mut graph, "y1");
        let r2 = node(&mut graph, "r2");
        let x2 = node(&mut graph, "x2");
        graph.add_edge(r1, 0, x1, 0).unwrap();
        graph.add_edge(r1, 1, y1, 0).unwrap();
        graph.add_edge(r2, 0, x2, 0).unwrap();

        let mut seen = Vec::new();
        dfs(&graph, &[r1], |n| {
            seen.push(n);
            Ok(())
        }, |_| Ok(()))
        .unwrap();
        assert_eq!(
            seen.iter().copied().collect::<HashSet<_>>(),
            HashSet::from([r1, x1, y1])
        );

        let mut seen = Vec::new();
        reverse_dfs(&graph, &[x2], |n| {
            seen.push(n);
            Ok(())
        }, |_| Ok(()))
        .unwrap();
        assert_eq!(names(&graph, &seen), vec!["x2", "r2"]);
    }

    #[test]
    fn test_dfs_multiple_starts() {
        let mut graph = Graph::new();
        let a = node(&mut graph, "a");
        let b = node(&mut graph, "b");
        let c = node(&mut graph, "c");
        graph.add_edge(a, 0, c, 0).unwrap();
        graph.add_edge(b, 0, c, 1).unwrap();

        let mut seen = Vec::new();
        dfs(&graph, &[a, b], |n| {
            seen.push(n);
            Ok(())
        }, |_| Ok(()))
        .unwrap();
        assert_eq!(seen, vec![a, c, b]);
    }

    #[test]
    fn test_dfs_terminates_on_cycle() {
        let mut graph = Graph::new();
        let a = node(&mut graph, "a");
        let b = node(&mut graph, "b");
        graph.add_edge(a, 0, b, 0).unwrap();
        graph.add_edge(b, 0, a, 0).unwrap();

        let mut left = 0;
        dfs(&graph, &[a], |_| Ok(()), |_| {
            left += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(left, 2);
    }

    #[test]
    fn test_callback_error_aborts() {
        let (graph, [_, b, _, _]) = diamond();
        let mut entered = 0;
        let err = dfs(
            &graph,
            &[SOURCE],
            |n| {
                entered += 1;
                if n == b {
                    return Err(Error::Internal("stop".to_string()));
                }
                Ok(())
            },
            |_| panic!("leave fired after the walk was aborted"),
        )
        .unwrap_err();

        assert!(matches!(err, Error::Internal(ref m) if m == "stop"));
        assert!(entered <= 3);
    }

    #[test]
    fn test_dfs_unknown_start() {
        let graph = Graph::new();
        let err = dfs(&graph, &[NodeId(99)], |_| Ok(()), |_| Ok(())).unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[test]
    fn test_reverse_dfs_mut_edits_payloads() {
        let (mut graph, [a, ..]) = diamond();
        reverse_dfs_mut(&mut graph, &[SINK], |_, _| Ok(()), |g, n| {
            if let Element::Stream(s) = g.element_mut(n)? {
                s.fan_out = n.0;
            }
            Ok(())
        })
        .unwrap();

        assert_eq!(graph.element(a).unwrap().as_stream().unwrap().fan_out, a.0);
    }

    #[test]
    fn test_dfs_mut_visits_same_nodes_as_dfs() {
        let (mut graph, _) = diamond();
        let mut plain = Vec::new();
        dfs(&graph, &[SOURCE], |n| {
            plain.push(n);
            Ok(())
        }, |_| Ok(()))
        .unwrap();

        let mut mutable = Vec::new();
        dfs_mut(&mut graph, &[SOURCE], |_, n| {
            mutable.push(n);
            Ok(())
        }, |_, _| Ok(()))
        .unwrap();

        assert_eq!(plain, mutable);
    }

    #[test]
    fn test_fixup_connects_open_ends() {
        let (graph, [a, b, c, d]) = diamond();

        let sources: Vec<NodeId> = graph.out_edges(SOURCE).unwrap().iter().map(|e| e.dst).collect();
        let sinks: Vec<NodeId> = graph.in_edges(SINK).unwrap().iter().map(|e| e.src).collect();
        assert_eq!(sources, vec![a]);
        assert_eq!(sinks, vec![d]);
        for id in [b, c] {
            assert!(graph
                .in_edges(id)
                .unwrap()
                .iter()
                .all(|e| !Graph::is_sentinel_edge(e)));
        }
        assert!(graph
            .edges()
            .filter(|e| Graph::is_sentinel_edge(e))
            .all(|e| e.src_port == SENTINEL_PORT && e.dst_port == SENTINEL_PORT));
    }

    #[test]
    fn test_fixup_is_idempotent() {
        let (mut graph, _) = diamond();
        let once = edge_set(&graph);
        let count = graph.num_edges();

        fixup_source_and_sink_edges(&mut graph).unwrap();
        assert_eq!(edge_set(&graph), once);
        assert_eq!(graph.num_edges(), count);
    }

    #[test]
    fn test_fixup_after_topology_edit() {
        let (mut graph, [a, b, _, d]) = diamond();
        let ab = graph
            .out_edges(a)
            .unwrap()
            .into_iter()
            .find(|e| e.dst == b)
            .unwrap();
        graph.remove_edge(ab.id).unwrap();
        fixup_source_and_sink_edges(&mut graph).unwrap();

        // b lost its only producer and now hangs off Source
        let sourced: HashSet<NodeId> = graph.out_edges(SOURCE).unwrap().iter().map(|e| e.dst).collect();
        assert_eq!(sourced, HashSet::from([a, b]));
        assert_eq!(graph.in_edges(SINK).unwrap().len(), 1);
        assert_eq!(graph.in_edges(SINK).unwrap()[0].src, d);
    }

    #[test]
    fn test_fixup_isolated_node() {
        let mut graph = Graph::new();
        let lone = node(&mut graph, "lone");
        fixup_source_and_sink_edges(&mut graph).unwrap();

        assert_eq!(graph.num_edges(), 2);
        assert_eq!(graph.in_edges(lone).unwrap()[0].src, SOURCE);
        assert_eq!(graph.out_edges(lone).unwrap()[0].dst, SINK);
    }

    #[test]
    fn test_refresh_sentinel_names() {
        let (mut graph, _) = diamond();
        refresh_sentinel_names(&mut graph).unwrap();

        match graph.element(SOURCE).unwrap() {
            Element::Sentinel(s) => {
                assert!(s.input_node_names.is_empty());
                assert_eq!(s.output_node_names, vec!["a"]);
            }
            _ => panic!("Expected sentinel"),
        }
        match graph.element(SINK).unwrap() {
            Element::Sentinel(s) => {
                assert_eq!(s.input_node_names, vec!["d"]);
                assert!(s.output_node_names.is_empty());
            }
            _ => panic!("Expected sentinel"),
        }
    }
}
