use crate::cli::{ConfigArgs, PreviewArgs};
use crate::config::{AppConfig, CliOverrides, build_config, user_config_path};
use crate::error::Result;
use gmxflow::compiler::{CommandCompiler, Selection};
use std::path::Path;
use tracing::info;

pub fn run(args: PreviewArgs, config_args: &ConfigArgs) -> Result<()> {
    let overrides = CliOverrides {
        ordering: args.ordering,
        ..Default::default()
    };
    let config = build_config(config_args, user_config_path().as_deref(), &overrides)?;

    info!("Rendering preview of {:?}", &args.session);
    for line in preview_lines(&config, &args.session, args.node.as_deref())? {
        println!("{}", line);
    }
    Ok(())
}

fn preview_lines(config: &AppConfig, session: &Path, node: Option<&str>) -> Result<Vec<String>> {
    let (pipeline, index) = super::open_session(config, session)?;
    let Some(document_id) = node else {
        return Ok(pipeline.preview()?);
    };
    let node = super::resolve_node(&index, document_id)?;
    Ok(CommandCompiler::compile_graph(
        pipeline.graph(),
        &Selection::Nodes(vec![node]),
        pipeline.ordering(),
    )?)
}
