use crate::cli::{ConfigArgs, NewArgs};
use crate::config::{AppConfig, CliOverrides, build_config, user_config_path};
use crate::error::{CliError, Result};
use crate::utils::parser::{self, NodeSpec};
use gmxflow::core::models::ids::NodeId;
use gmxflow::core::models::node::Position;
use gmxflow::core::models::port::PortRef;
use gmxflow::workflows::Pipeline;
use tracing::{debug, info};

/// Horizontal distance between nodes laid out automatically.
const NODE_SPACING: f64 = 200.0;

pub fn run(args: NewArgs, config_args: &ConfigArgs) -> Result<()> {
    let config = build_config(config_args, user_config_path().as_deref(), &CliOverrides::default())?;

    if args.session.exists() && !args.force {
        return Err(CliError::Argument(format!(
            "Session file {:?} already exists. Use --force to overwrite.",
            args.session
        )));
    }

    let specs = args
        .types
        .iter()
        .map(|spec| parser::parse_node_spec(spec))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| CliError::Argument(e.to_string()))?;

    let pipeline = build_pipeline(&config, &specs, args.chain)?;
    pipeline.save(&args.session)?;
    info!("Session written to {:?}", &args.session);

    for line in pipeline.preview()? {
        println!("{}", line);
    }
    println!(
        "✓ Session with {} node(s) written to: {}",
        pipeline.graph().len(),
        args.session.display()
    );
    Ok(())
}

fn build_pipeline(config: &AppConfig, specs: &[NodeSpec], chain: bool) -> Result<Pipeline> {
    let mut pipeline = Pipeline::new(super::load_registry(config)?).with_ordering(config.ordering);

    let mut previous: Option<NodeId> = None;
    for (i, spec) in specs.iter().enumerate() {
        let (x, y) = spec.position.unwrap_or((i as f64 * NODE_SPACING, 0.0));
        let node = pipeline.add_node(&spec.type_id, Position::new(x, y))?;
        if let (true, Some(upstream)) = (chain, previous) {
            chain_nodes(&mut pipeline, upstream, node)?;
        }
        previous = Some(node);
    }
    Ok(pipeline)
}

/// Connects every input of `downstream` that accepts an output kind of `upstream`.
///
/// Each output feeds at most one input here, so `out_gro` and `out_top` of
/// one step land on the matching ports of the next.
fn chain_nodes(pipeline: &mut Pipeline, upstream: NodeId, downstream: NodeId) -> Result<usize> {
    let graph = pipeline.graph();
    let (Some(source), Some(dest)) = (graph.node(upstream), graph.node(downstream)) else {
        return Ok(0);
    };

    let mut links = Vec::new();
    let mut used_outputs = Vec::new();
    for input in dest.inputs() {
        let matching = source
            .outputs()
            .filter(|output| !used_outputs.contains(&output.name))
            .find(|output| input.accepts_kind(&output.kind));
        if let Some(output) = matching {
            used_outputs.push(output.name.clone());
            links.push((
                PortRef::new(upstream, output.name.clone()),
                PortRef::new(downstream, input.name.clone()),
            ));
        }
    }

    let count = links.len();
    for (a, b) in links {
        debug!("Chaining {} -> {}", a.port, b.port);
        pipeline.connect(a, b)?;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::default_config;

    fn spec(type_id: &str) -> NodeSpec {
        NodeSpec {
            type_id: type_id.into(),
            position: None,
        }
    }

    #[test]
    fn nodes_are_laid_out_left_to_right() {
        let specs = [
            spec("pdb2gmx"),
            NodeSpec {
                type_id: "editconf".into(),
                position: Some((50.0, 80.0)),
            },
            spec("solvate"),
        ];
        let pipeline = build_pipeline(&default_config(), &specs, false).unwrap();

        let xs: Vec<f64> = pipeline.graph().nodes().map(|n| n.position().x).collect();
        assert_eq!(xs, vec![0.0, 50.0, 400.0]);
        assert!(pipeline.graph().connections().is_empty());
    }

    #[test]
    fn chaining_connects_matching_kinds() {
        let specs = [spec("pdb2gmx"), spec("editconf"), spec("solvate")];
        let pipeline = build_pipeline(&default_config(), &specs, true).unwrap();
        let graph = pipeline.graph();

        let links: Vec<(String, String)> = graph
            .connections()
            .iter()
            .map(|c| (c.source.port.clone(), c.dest.port.clone()))
            .collect();
        assert_eq!(
            links,
            vec![
                ("out_gro".to_string(), "in_gro".to_string()),
                ("out_gro".to_string(), "in_gro".to_string()),
            ]
        );

        let preview = pipeline.preview().unwrap();
        assert!(preview[1].starts_with("gmx editconf -f init_conf.gro -o box.gro"));
        assert!(preview[2].starts_with("gmx solvate -cp box.gro"));
    }

    #[test]
    fn unknown_type_is_reported() {
        let result = build_pipeline(&default_config(), &[spec("gmx-magic")], false);
        assert!(result.is_err());
    }
}
