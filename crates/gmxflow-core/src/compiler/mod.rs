//! # Command Compiler
//!
//! Turns node instances into literal shell command lines.
//!
//! Two renderings exist. [`CommandCompiler::compile_node`] fills the node
//! type's command template and is what actually gets executed; composite
//! types yield several lines in template order. [`CommandCompiler::compile_graph`]
//! produces the flag-pair preview (`<tool> flag value ...`) shown to the user
//! after every edit. Both consume nodes in the order chosen by [`NodeOrdering`].

mod ordering;
mod script;
mod template;

pub use ordering::{NodeOrdering, Selection, order_nodes};
pub use script::to_bash_script;

use crate::core::graph::GraphModel;
use crate::core::models::ids::NodeId;
use crate::core::models::node::NodeInstance;
use crate::core::registry::{PortTypeRegistry, RegistryError};
use std::fmt;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Node '{node}' ({type_id}) references property '{flag}', which has no value and no default")]
    MissingProperty {
        node: String,
        type_id: String,
        flag: String,
    },

    #[error(transparent)]
    UnknownType(#[from] RegistryError),

    #[error("Node {0:?} does not exist in the graph")]
    NodeNotFound(NodeId),

    #[error("Connections form a cycle through node '{node}'; no dependency order exists")]
    Cycle { node: String },
}

/// Output of compiling one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompiledCommand {
    Single(String),
    /// Lines of a composite step, to be run in this order.
    Sequence(Vec<String>),
}

impl CompiledCommand {
    pub fn lines(&self) -> &[String] {
        match self {
            CompiledCommand::Single(line) => std::slice::from_ref(line),
            CompiledCommand::Sequence(lines) => lines,
        }
    }

    pub fn into_lines(self) -> Vec<String> {
        match self {
            CompiledCommand::Single(line) => vec![line],
            CompiledCommand::Sequence(lines) => lines,
        }
    }
}

impl fmt::Display for CompiledCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lines().join("\n"))
    }
}

/// Stateless renderer from graph state to command lines.
pub struct CommandCompiler;

impl CommandCompiler {
    /// Fills the node type's command template with the node's property values.
    ///
    /// # Errors
    ///
    /// * [`CompileError::UnknownType`] if the node's type is not registered.
    /// * [`CompileError::MissingProperty`] if a placeholder names a flag that is
    ///   neither materialized on the node nor declared with a default.
    pub fn compile_node(
        registry: &PortTypeRegistry,
        node: &NodeInstance,
    ) -> Result<CompiledCommand, CompileError> {
        template::compile_node(registry, node)
    }

    /// Flag-pair rendering of a single node, as shown in the preview.
    pub fn preview_node(
        registry: &PortTypeRegistry,
        node: &NodeInstance,
    ) -> Result<String, CompileError> {
        template::render_preview(registry, node)
    }

    /// Flag-pair preview of the selected nodes, one line per node.
    #[instrument(skip(graph), level = "debug")]
    pub fn compile_graph(
        graph: &GraphModel,
        selection: &Selection,
        ordering: NodeOrdering,
    ) -> Result<Vec<String>, CompileError> {
        Self::ordered(graph, selection, ordering)?
            .into_iter()
            .map(|node| template::render_preview(graph.registry(), node))
            .collect()
    }

    /// Template commands of the selected nodes, flattened into the list a run executes.
    #[instrument(skip(graph), level = "debug")]
    pub fn compile_script(
        graph: &GraphModel,
        selection: &Selection,
        ordering: NodeOrdering,
    ) -> Result<Vec<String>, CompileError> {
        let mut commands = Vec::new();
        for node in Self::ordered(graph, selection, ordering)? {
            commands.extend(template::compile_node(graph.registry(), node)?.into_lines());
        }
        debug!("Compiled {} command(s)", commands.len());
        Ok(commands)
    }

    fn ordered<'g>(
        graph: &'g GraphModel,
        selection: &Selection,
        ordering: NodeOrdering,
    ) -> Result<Vec<&'g NodeInstance>, CompileError> {
        order_nodes(graph, selection, ordering)?
            .into_iter()
            .map(|id| graph.node(id).ok_or(CompileError::NodeNotFound(id)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::node::Position;
    use crate::core::models::port::PortRef;
    use crate::core::models::property::MENU_SELECTOR_KEY;
    use std::sync::Arc;

    fn graph() -> GraphModel {
        GraphModel::new(Arc::new(PortTypeRegistry::builtin().unwrap()))
    }

    fn at(x: f64) -> Position {
        Position::new(x, 0.0)
    }

    #[test]
    fn editconf_defaults_compile_to_literal_command() {
        let mut g = graph();
        let id = g.add_node("editconf", at(0.0)).unwrap();
        let node = g.node(id).unwrap();

        let compiled = CommandCompiler::compile_node(g.registry(), node).unwrap();
        assert_eq!(
            compiled,
            CompiledCommand::Single("gmx editconf -f init_conf.gro -o box.gro -bt cubic -box 7".into())
        );
        assert_eq!(
            CommandCompiler::preview_node(g.registry(), node).unwrap(),
            "gmx editconf -f init_conf.gro -o box.gro -bt cubic -box 7"
        );
    }

    #[test]
    fn compile_is_deterministic_and_tracks_edits_token_by_token() {
        let mut g = graph();
        let id = g.add_node("editconf", at(0.0)).unwrap();
        let before = CommandCompiler::compile_node(g.registry(), g.node(id).unwrap()).unwrap();
        let again = CommandCompiler::compile_node(g.registry(), g.node(id).unwrap()).unwrap();
        assert_eq!(before, again);

        g.set_property(id, "-box", "9.5").unwrap();
        let after = CommandCompiler::compile_node(g.registry(), g.node(id).unwrap()).unwrap();

        let old: Vec<&str> = before.lines()[0].split(' ').collect();
        let new: Vec<&str> = after.lines()[0].split(' ').collect();
        let differing: Vec<_> = old.iter().zip(&new).filter(|(a, b)| a != b).collect();
        assert_eq!(old.len(), new.len());
        assert_eq!(differing, vec![(&"7", &"9.5")]);
    }

    #[test]
    fn composite_nodes_keep_template_line_order() {
        let mut g = graph();
        let id = g.add_node("em", at(0.0)).unwrap();
        let compiled = CommandCompiler::compile_node(g.registry(), g.node(id).unwrap()).unwrap();

        let lines = compiled.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("gmx grompp -f em.mdp -c ions.gro"));
        assert!(lines[1].starts_with("gmx mdrun -s em.tpr -deffnm em -c em.gro"));
    }

    #[test]
    fn activated_optionals_land_on_their_template_line() {
        let mut g = graph();
        let em = g.add_node("em", at(0.0)).unwrap();
        g.set_property(em, MENU_SELECTOR_KEY, "-ntomp").unwrap();
        g.set_property(em, "-ntomp", "4").unwrap();
        g.set_property(em, MENU_SELECTOR_KEY, "-t").unwrap();

        let boxed = g.add_node("editconf", at(0.0)).unwrap();
        g.set_property(boxed, MENU_SELECTOR_KEY, "-d").unwrap();

        let em_lines =
            CommandCompiler::compile_node(g.registry(), g.node(em).unwrap()).unwrap().into_lines();
        assert!(em_lines[0].ends_with(" -t state.cpt"));
        assert!(em_lines[1].ends_with(" -ntomp 4"));

        let boxed_line =
            CommandCompiler::compile_node(g.registry(), g.node(boxed).unwrap()).unwrap();
        assert_eq!(
            boxed_line.lines()[0],
            "gmx editconf -f init_conf.gro -o box.gro -bt cubic -box 7 -d 1.0"
        );
    }

    #[test]
    fn missing_property_is_reported() {
        let catalogue = r#"
            [[node]]
            type-id = "broken"
            display-name = "Broken"
            command = "tool -x {-x} -y {-y}"

            [[node.property]]
            flag = "-x"
            label = "X"
            default = "1"
        "#;
        let registry = PortTypeRegistry::from_toml_str(catalogue, "inline").unwrap();
        let mut g = GraphModel::new(Arc::new(registry));
        let id = g.add_node("broken", at(0.0)).unwrap();

        let err = CommandCompiler::compile_node(g.registry(), g.node(id).unwrap()).unwrap_err();
        assert!(matches!(err, CompileError::MissingProperty { flag, .. } if flag == "-y"));
    }

    #[test]
    fn graph_preview_follows_horizontal_order() {
        let mut g = graph();
        let late = g.add_node("solvate", at(300.0)).unwrap();
        let early = g.add_node("editconf", at(10.0)).unwrap();
        g.connect(PortRef::new(early, "out_gro"), PortRef::new(late, "in_gro"))
            .unwrap();

        let preview = CommandCompiler::compile_graph(&g, &Selection::All, NodeOrdering::Horizontal)
            .unwrap();
        assert_eq!(
            preview,
            vec![
                "gmx editconf -f init_conf.gro -o box.gro -bt cubic -box 7".to_string(),
                "gmx solvate -cp box.gro -o solv.gro -cs spc216.gro -p topol.top".to_string(),
            ]
        );
    }

    #[test]
    fn script_flattens_composite_nodes() {
        let mut g = graph();
        g.add_node("em", at(100.0)).unwrap();
        g.add_node("editconf", at(0.0)).unwrap();

        let script =
            CommandCompiler::compile_script(&g, &Selection::All, NodeOrdering::Horizontal).unwrap();
        assert_eq!(script.len(), 3);
        assert!(script[0].starts_with("gmx editconf"));
        assert!(script[1].starts_with("gmx grompp"));
        assert!(script[2].starts_with("gmx mdrun"));
    }
}
