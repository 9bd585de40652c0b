use super::CompileError;
use crate::core::graph::GraphModel;
use crate::core::models::ids::NodeId;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// How compiled commands are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeOrdering {
    /// Ascending canvas `x`, ties kept in insertion order.
    #[default]
    Horizontal,
    /// Dependency order over connections.
    Topological,
}

impl fmt::Display for NodeOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeOrdering::Horizontal => f.write_str("horizontal"),
            NodeOrdering::Topological => f.write_str("topological"),
        }
    }
}

impl FromStr for NodeOrdering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "horizontal" => Ok(NodeOrdering::Horizontal),
            "topological" => Ok(NodeOrdering::Topological),
            other => Err(format!(
                "unknown ordering '{}' (expected 'horizontal' or 'topological')",
                other
            )),
        }
    }
}

/// Which nodes a preview or run request covers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    All,
    Nodes(Vec<NodeId>),
}

impl Selection {
    fn resolve(&self, graph: &GraphModel) -> Result<Vec<NodeId>, CompileError> {
        match self {
            Selection::All => Ok(graph.node_ids().to_vec()),
            Selection::Nodes(ids) => {
                let wanted: HashSet<NodeId> = ids.iter().copied().collect();
                if let Some(missing) = ids.iter().find(|id| !graph.contains(**id)) {
                    return Err(CompileError::NodeNotFound(*missing));
                }
                Ok(graph
                    .node_ids()
                    .iter()
                    .copied()
                    .filter(|id| wanted.contains(id))
                    .collect())
            }
        }
    }
}

/// Orders the selected nodes of `graph`.
pub fn order_nodes(
    graph: &GraphModel,
    selection: &Selection,
    ordering: NodeOrdering,
) -> Result<Vec<NodeId>, CompileError> {
    let mut ids = selection.resolve(graph)?;
    sort_horizontally(graph, &mut ids);
    match ordering {
        NodeOrdering::Horizontal => Ok(ids),
        NodeOrdering::Topological => sort_topologically(graph, &ids),
    }
}

fn sort_horizontally(graph: &GraphModel, ids: &mut [NodeId]) {
    let x = |id: &NodeId| graph.node(*id).map_or(0.0, |n| n.position().x);
    ids.sort_by(|a, b| x(a).total_cmp(&x(b)));
}

fn sort_topologically(graph: &GraphModel, seeded: &[NodeId]) -> Result<Vec<NodeId>, CompileError> {
    let mut dependency_graph: DiGraph<NodeId, ()> = DiGraph::new();
    let mut node_indices = HashMap::new();

    for id in seeded {
        let idx = dependency_graph.add_node(*id);
        node_indices.insert(*id, idx);
    }

    for connection in graph.connections() {
        let (Some(&from_idx), Some(&to_idx)) = (
            node_indices.get(&connection.source.node),
            node_indices.get(&connection.dest.node),
        ) else {
            continue;
        };
        if from_idx != to_idx {
            dependency_graph.update_edge(from_idx, to_idx, ());
        }
    }

    let sorted = toposort(&dependency_graph, None).map_err(|cycle| {
        let id = dependency_graph[cycle.node_id()];
        CompileError::Cycle {
            node: graph
                .node(id)
                .map_or_else(|| format!("{:?}", id), |n| n.name().to_string()),
        }
    })?;

    Ok(sorted.into_iter().map(|idx| dependency_graph[idx]).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::node::Position;
    use crate::core::models::port::PortRef;
    use crate::core::registry::PortTypeRegistry;
    use std::sync::Arc;

    fn graph() -> GraphModel {
        GraphModel::new(Arc::new(PortTypeRegistry::builtin().unwrap()))
    }

    #[test]
    fn horizontal_order_sorts_by_x_and_keeps_ties_stable() {
        let mut g = graph();
        let c = g.add_node("solvate", Position::new(200.0, 0.0)).unwrap();
        let a = g.add_node("pdb2gmx", Position::new(-50.0, 10.0)).unwrap();
        let b1 = g.add_node("editconf", Position::new(100.0, 0.0)).unwrap();
        let b2 = g.add_node("editconf", Position::new(100.0, 90.0)).unwrap();

        let ids = order_nodes(&g, &Selection::All, NodeOrdering::Horizontal).unwrap();
        assert_eq!(ids, vec![a, b1, b2, c]);
    }

    #[test]
    fn selection_restricts_and_rejects_unknown_nodes() {
        let mut g = graph();
        let a = g.add_node("pdb2gmx", Position::new(0.0, 0.0)).unwrap();
        let b = g.add_node("editconf", Position::new(100.0, 0.0)).unwrap();
        let c = g.add_node("solvate", Position::new(200.0, 0.0)).unwrap();

        let ids = order_nodes(&g, &Selection::Nodes(vec![c, a]), NodeOrdering::Horizontal).unwrap();
        assert_eq!(ids, vec![a, c]);

        g.remove_node(b).unwrap();
        assert!(matches!(
            order_nodes(&g, &Selection::Nodes(vec![b]), NodeOrdering::Horizontal),
            Err(CompileError::NodeNotFound(_))
        ));
    }

    #[test]
    fn topological_order_follows_connections_not_positions() {
        let mut g = graph();
        let solv = g.add_node("solvate", Position::new(0.0, 0.0)).unwrap();
        let boxed = g.add_node("editconf", Position::new(100.0, 0.0)).unwrap();
        let prep = g.add_node("pdb2gmx", Position::new(200.0, 0.0)).unwrap();
        g.connect(PortRef::new(prep, "out_gro"), PortRef::new(boxed, "in_gro"))
            .unwrap();
        g.connect(PortRef::new(boxed, "out_gro"), PortRef::new(solv, "in_gro"))
            .unwrap();

        let ids = order_nodes(&g, &Selection::All, NodeOrdering::Topological).unwrap();
        assert_eq!(ids, vec![prep, boxed, solv]);
    }

    #[test]
    fn topological_order_reports_cycles() {
        let mut g = graph();
        let a = g.add_node("solvate", Position::new(0.0, 0.0)).unwrap();
        let b = g.add_node("solvate", Position::new(100.0, 0.0)).unwrap();
        g.connect(PortRef::new(a, "out_gro"), PortRef::new(b, "in_gro"))
            .unwrap();
        g.connect(PortRef::new(b, "out_gro"), PortRef::new(a, "in_gro"))
            .unwrap();

        assert!(matches!(
            order_nodes(&g, &Selection::All, NodeOrdering::Topological),
            Err(CompileError::Cycle { .. })
        ));
    }

    #[test]
    fn ordering_parses_case_insensitively() {
        assert_eq!("Topological".parse::<NodeOrdering>(), Ok(NodeOrdering::Topological));
        assert!("diagonal".parse::<NodeOrdering>().is_err());
    }
}
