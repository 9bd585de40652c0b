use crate::core::graph::GraphModel;
use crate::core::models::ids::NodeId;
use crate::core::models::port::{Connection, PortRef};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Recoverable problems met while copying values across edges. They are
/// logged and collected; they never abort a propagation pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropagationWarning {
    #[error("Source property '{flag}' on node {node:?} is not materialized; nothing to copy")]
    SourceNotMaterialized { node: NodeId, flag: String },

    #[error("Destination property '{flag}' on node {node:?} is not materialized; value not written")]
    DestinationNotMaterialized { node: NodeId, flag: String },

    #[error("Node {node:?} has no optional property '{flag}' to add")]
    UnknownMenuSelection { node: NodeId, flag: String },

    #[error("Value '{value}' of '{flag}' on node {node:?} is not one of the declared choices")]
    ValueNotInChoices {
        node: NodeId,
        flag: String,
        value: String,
    },
}

/// Outcome of one propagation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropagationReport {
    /// Every `(node, flag)` written by the pass, in write order.
    pub updated: Vec<(NodeId, String)>,
    pub warnings: Vec<PropagationWarning>,
}

impl PropagationReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn was_updated(&self, node: NodeId, flag: &str) -> bool {
        self.updated.iter().any(|(n, f)| *n == node && f == flag)
    }

    pub(crate) fn warn(&mut self, warning: PropagationWarning) {
        warn!("{}", warning);
        self.warnings.push(warning);
    }

    pub fn merge(&mut self, other: PropagationReport) {
        self.updated.extend(other.updated);
        self.warnings.extend(other.warnings);
    }
}

type Visited = HashSet<(NodeId, String)>;

/// Keeps downstream properties consistent with upstream outputs.
///
/// Propagation is a one-shot copy, not a live binding: values move only when
/// a connection is made ([`sync_connection`](Self::sync_connection)) or when a
/// property mapped to an output port is edited
/// ([`propagate_edit`](Self::propagate_edit)). Both walk downstream depth-first
/// and visit each `(node, flag)` at most once per pass, so cycles terminate.
pub struct PropertyPropagator;

impl PropertyPropagator {
    /// Copies the source's mapped value onto the destination of a freshly made
    /// connection, then carries the change further downstream.
    pub fn sync_connection(graph: &mut GraphModel, connection: &Connection) -> PropagationReport {
        let mut report = PropagationReport::default();
        let mut visited = Visited::new();
        Self::copy_across(graph, connection, &mut visited, &mut report);
        report
    }

    /// Pushes the current value of `flag` on `node` through every outgoing
    /// connection of the output ports mapping it, transitively.
    pub fn propagate_edit(graph: &mut GraphModel, node: NodeId, flag: &str) -> PropagationReport {
        let mut report = PropagationReport::default();
        let mut visited = Visited::new();
        Self::propagate_from(graph, node, flag, &mut visited, &mut report);
        report
    }

    fn propagate_from(
        graph: &mut GraphModel,
        node: NodeId,
        flag: &str,
        visited: &mut Visited,
        report: &mut PropagationReport,
    ) {
        if !visited.insert((node, flag.to_string())) {
            return;
        }
        let Some(instance) = graph.node(node) else {
            return;
        };

        let sources: Vec<PortRef> = instance
            .outputs()
            .filter(|port| port.property.as_deref() == Some(flag))
            .map(|port| PortRef::new(node, port.name.clone()))
            .collect();

        for source in sources {
            let edges: Vec<Connection> = graph.outgoing(&source).cloned().collect();
            for edge in edges {
                Self::copy_across(graph, &edge, visited, report);
            }
        }
    }

    fn copy_across(
        graph: &mut GraphModel,
        connection: &Connection,
        visited: &mut Visited,
        report: &mut PropagationReport,
    ) {
        let (Ok(source_port), Ok(dest_port)) =
            (graph.port(&connection.source), graph.port(&connection.dest))
        else {
            debug!("Skipping dangling connection {:?}", connection);
            return;
        };
        let (Some(source_flag), Some(dest_flag)) =
            (source_port.property.clone(), dest_port.property.clone())
        else {
            trace!(
                "No property mapping across {} -> {}; nothing to copy",
                connection.source.port, connection.dest.port
            );
            return;
        };

        let source_node = connection.source.node;
        let dest_node = connection.dest.node;

        let Some(value) = graph
            .node(source_node)
            .and_then(|n| n.value(&source_flag))
            .map(str::to_owned)
        else {
            report.warn(PropagationWarning::SourceNotMaterialized {
                node: source_node,
                flag: source_flag,
            });
            return;
        };

        visited.insert((source_node, source_flag));
        if visited.contains(&(dest_node, dest_flag.clone())) {
            debug!(
                "Property '{}' on node {:?} already visited in this pass; stopping at cycle",
                dest_flag, dest_node
            );
            return;
        }

        match graph.write_property(dest_node, &dest_flag, value) {
            Ok(_) => {
                report.updated.push((dest_node, dest_flag.clone()));
                Self::propagate_from(graph, dest_node, &dest_flag, visited, report);
            }
            Err(_) => report.warn(PropagationWarning::DestinationNotMaterialized {
                node: dest_node,
                flag: dest_flag,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::node::Position;
    use crate::core::models::property::MENU_SELECTOR_KEY;
    use crate::core::registry::PortTypeRegistry;
    use std::sync::Arc;

    fn graph() -> GraphModel {
        GraphModel::new(Arc::new(PortTypeRegistry::builtin().unwrap()))
    }

    fn at(x: f64) -> Position {
        Position::new(x, 0.0)
    }

    #[test]
    fn edit_reaches_every_direct_destination() {
        let mut g = graph();
        let prep = g.add_node("pdb2gmx", at(0.0)).unwrap();
        let targets = [
            (g.add_node("editconf", at(100.0)).unwrap(), "-f"),
            (g.add_node("solvate", at(100.0)).unwrap(), "-cp"),
            (g.add_node("grompp", at(100.0)).unwrap(), "-c"),
        ];
        for (node, _) in targets {
            g.connect(PortRef::new(prep, "out_gro"), PortRef::new(node, "in_gro"))
                .unwrap();
        }

        let report = g.set_property(prep, "-o", "fresh.gro").unwrap();

        assert_eq!(report.updated.len(), 3);
        for (node, flag) in targets {
            assert_eq!(g.node(node).unwrap().value(flag), Some("fresh.gro"));
            assert!(report.was_updated(node, flag));
        }
    }

    #[test]
    fn edit_carries_through_pass_through_ports() {
        let mut g = graph();
        let prep = g.add_node("pdb2gmx", at(0.0)).unwrap();
        let solv = g.add_node("solvate", at(100.0)).unwrap();
        let pre = g.add_node("grompp", at(200.0)).unwrap();
        g.connect(PortRef::new(prep, "out_top"), PortRef::new(solv, "in_top"))
            .unwrap();
        g.connect(PortRef::new(solv, "out_top"), PortRef::new(pre, "in_top"))
            .unwrap();

        let report = g.set_property(prep, "-p", "complex.top").unwrap();

        assert_eq!(g.node(solv).unwrap().value("-p"), Some("complex.top"));
        assert_eq!(g.node(pre).unwrap().value("-p"), Some("complex.top"));
        assert_eq!(
            report.updated,
            vec![(solv, "-p".to_string()), (pre, "-p".to_string())]
        );
    }

    #[test]
    fn edit_of_unmapped_flag_stays_local() {
        let mut g = graph();
        let boxed = g.add_node("editconf", at(0.0)).unwrap();
        let solv = g.add_node("solvate", at(100.0)).unwrap();
        g.connect(PortRef::new(boxed, "out_gro"), PortRef::new(solv, "in_gro"))
            .unwrap();

        let report = g.set_property(boxed, "-box", "9").unwrap();

        assert!(report.updated.is_empty());
        assert_eq!(g.node(solv).unwrap().value("-cp"), Some("box.gro"));
    }

    #[test]
    fn cycles_terminate_and_each_property_is_written_once() {
        let mut g = graph();
        let a = g.add_node("solvate", at(0.0)).unwrap();
        let b = g.add_node("solvate", at(100.0)).unwrap();
        g.connect(PortRef::new(a, "out_top"), PortRef::new(b, "in_top"))
            .unwrap();
        g.connect(PortRef::new(b, "out_top"), PortRef::new(a, "in_top"))
            .unwrap();

        let report = g.set_property(a, "-p", "loop.top").unwrap();

        assert_eq!(report.updated, vec![(b, "-p".to_string())]);
        assert_eq!(g.node(a).unwrap().value("-p"), Some("loop.top"));
        assert_eq!(g.node(b).unwrap().value("-p"), Some("loop.top"));
    }

    #[test]
    fn self_loop_is_harmless() {
        let mut g = graph();
        let solv = g.add_node("solvate", at(0.0)).unwrap();
        let outcome = g
            .connect(PortRef::new(solv, "out_top"), PortRef::new(solv, "in_top"))
            .unwrap();
        assert!(outcome.propagation.updated.is_empty());

        let report = g.set_property(solv, "-p", "self.top").unwrap();
        assert!(report.updated.is_empty());
        assert_eq!(g.node(solv).unwrap().value("-p"), Some("self.top"));
    }

    #[test]
    fn unmaterialized_destination_warns_until_activated() {
        let mut g = graph();
        let em = g.add_node("em", at(0.0)).unwrap();
        let pre = g.add_node("grompp", at(100.0)).unwrap();

        let first = g
            .connect(PortRef::new(em, "out_cpt"), PortRef::new(pre, "in_cpt"))
            .unwrap();
        assert!(matches!(
            first.propagation.warnings.as_slice(),
            [PropagationWarning::DestinationNotMaterialized { flag, .. }] if flag == "-t"
        ));
        assert_eq!(g.connections().len(), 1);

        g.set_property(pre, MENU_SELECTOR_KEY, "-t").unwrap();
        let report = g.set_property(em, "-cpo", "minimized.cpt").unwrap();
        assert!(report.is_clean());
        assert_eq!(g.node(pre).unwrap().value("-t"), Some("minimized.cpt"));
    }

    #[test]
    fn ports_without_property_mapping_copy_nothing() {
        let catalogue = r#"
            [[node]]
            type-id = "producer"
            display-name = "Producer"
            command = "produce {-o}"

            [[node.property]]
            flag = "-o"
            label = "Output"
            default = "out.dat"

            [[node.output]]
            name = "out_any"
            kind = "dat_file"

            [[node]]
            type-id = "consumer"
            display-name = "Consumer"
            command = "consume {-f}"

            [[node.property]]
            flag = "-f"
            label = "Input"
            default = "in.dat"

            [[node.input]]
            name = "in_any"
            kind = "dat_file"
            property = "-f"
        "#;
        let registry = PortTypeRegistry::from_toml_str(catalogue, "inline").unwrap();
        let mut g = GraphModel::new(Arc::new(registry));
        let p = g.add_node("producer", at(0.0)).unwrap();
        let c = g.add_node("consumer", at(100.0)).unwrap();

        let outcome = g
            .connect(PortRef::new(p, "out_any"), PortRef::new(c, "in_any"))
            .unwrap();

        assert!(outcome.propagation.updated.is_empty());
        assert!(outcome.propagation.is_clean());
        assert_eq!(g.node(c).unwrap().value("-f"), Some("in.dat"));
    }
}
