use crate::cli::{ConfigArgs, LinkArgs, SetArgs};
use crate::config::{AppConfig, CliOverrides, build_config, user_config_path};
use crate::error::Result;
use gmxflow::core::models::port::{Connection, PortRef};
use gmxflow::core::propagation::PropagationReport;
use gmxflow::session::SessionCodec;
use gmxflow::workflows::Pipeline;
use tracing::info;

fn config(config_args: &ConfigArgs) -> Result<AppConfig> {
    build_config(config_args, user_config_path().as_deref(), &CliOverrides::default())
}

pub fn run_set(args: SetArgs, config_args: &ConfigArgs) -> Result<()> {
    print_lines(set_property(&config(config_args)?, &args)?);
    Ok(())
}

pub fn run_connect(args: LinkArgs, config_args: &ConfigArgs) -> Result<()> {
    print_lines(connect(&config(config_args)?, &args)?);
    Ok(())
}

pub fn run_disconnect(args: LinkArgs, config_args: &ConfigArgs) -> Result<()> {
    print_lines(disconnect(&config(config_args)?, &args)?);
    Ok(())
}

fn print_lines(lines: Vec<String>) {
    lines.iter().for_each(|line| println!("{}", line));
}

/// Applies a property-changed event and writes the session back.
fn set_property(config: &AppConfig, args: &SetArgs) -> Result<Vec<String>> {
    let (mut pipeline, index) = super::open_session(config, &args.session)?;
    super::ensure_lossless(&index, &args.session, args.force)?;
    let node = super::resolve_node(&index, &args.node)?;

    let update = pipeline.property_changed(node, &args.flag, &args.value)?;
    pipeline.save(&args.session)?;
    info!("Saved {:?}", &args.session);

    let mut lines = vec![format!("✓ {} {} = {}", args.node, args.flag, args.value)];
    lines.extend(describe_propagation(&pipeline, &update.propagation));
    Ok(lines)
}

fn connect(config: &AppConfig, args: &LinkArgs) -> Result<Vec<String>> {
    let (mut pipeline, index) = super::open_session(config, &args.session)?;
    super::ensure_lossless(&index, &args.session, args.force)?;
    let source = super::resolve_node(&index, &args.source)?;
    let dest = super::resolve_node(&index, &args.dest)?;

    let (outcome, update) = pipeline.connect(
        PortRef::new(source, args.source_port.as_str()),
        PortRef::new(dest, args.dest_port.as_str()),
    )?;
    pipeline.save(&args.session)?;

    let mut lines = vec![format!(
        "✓ Connected {}.{} -> {}.{}",
        args.source, args.source_port, args.dest, args.dest_port
    )];
    if let Some(replaced) = outcome.replaced {
        let ids = SessionCodec::document_ids(pipeline.graph());
        lines.push(format!(
            "  replaced the link from {}.{}",
            ids.get(&replaced.source.node).map_or("?", String::as_str),
            replaced.source.port
        ));
    }
    lines.extend(describe_propagation(&pipeline, &update.propagation));
    Ok(lines)
}

fn disconnect(config: &AppConfig, args: &LinkArgs) -> Result<Vec<String>> {
    let (mut pipeline, index) = super::open_session(config, &args.session)?;
    super::ensure_lossless(&index, &args.session, args.force)?;
    let connection = Connection {
        source: PortRef::new(super::resolve_node(&index, &args.source)?, args.source_port.as_str()),
        dest: PortRef::new(super::resolve_node(&index, &args.dest)?, args.dest_port.as_str()),
    };

    pipeline.disconnect(&connection)?;
    pipeline.save(&args.session)?;
    Ok(vec![format!(
        "✓ Disconnected {}.{} -> {}.{}",
        args.source, args.source_port, args.dest, args.dest_port
    )])
}

fn describe_propagation(pipeline: &Pipeline, report: &PropagationReport) -> Vec<String> {
    let ids = SessionCodec::document_ids(pipeline.graph());
    let mut lines: Vec<String> = report
        .updated
        .iter()
        .map(|(node, flag)| {
            let value = pipeline
                .graph()
                .node(*node)
                .and_then(|n| n.value(flag))
                .unwrap_or_default();
            format!(
                "  {} {} = {}",
                ids.get(node).map_or("?", String::as_str),
                flag,
                value
            )
        })
        .collect();
    lines.extend(report.warnings.iter().map(|w| format!("  warning: {}", w)));
    lines
}
