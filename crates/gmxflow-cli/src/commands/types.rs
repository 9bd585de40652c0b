use crate::config::AppConfig;
use crate::error::Result;
use gmxflow::core::models::property::PropertyKind;
use gmxflow::core::registry::{NodeType, PortTypeRegistry, PropertySpec};
use std::fmt::Write;

pub fn run(config: &AppConfig) -> Result<()> {
    let registry = super::load_registry(config)?;
    print!("{}", render_catalogue(&registry));
    Ok(())
}

fn render_catalogue(registry: &PortTypeRegistry) -> String {
    let mut out = String::new();
    for node_type in registry.iter() {
        render_type(&mut out, node_type);
        out.push('\n');
    }
    out
}

fn render_type(out: &mut String, node_type: &NodeType) {
    let _ = writeln!(out, "{} - {}", node_type.type_id, node_type.display_name);
    for line in node_type.command.lines() {
        let _ = writeln!(out, "    $ {}", line);
    }
    for (name, port) in &node_type.inputs {
        let _ = writeln!(
            out,
            "    in   {:<10} {:<10} {}",
            name,
            port.kind.as_str(),
            port.property.as_deref().unwrap_or("-")
        );
    }
    for (name, port) in &node_type.outputs {
        let _ = writeln!(
            out,
            "    out  {:<10} {:<10} {}",
            name,
            port.kind.as_str(),
            port.property.as_deref().unwrap_or("-")
        );
    }
    for (flag, spec) in &node_type.base_properties {
        let _ = writeln!(out, "    prop {:<10} {}", flag, describe(spec));
    }
    for (flag, spec) in &node_type.optional_properties {
        let _ = writeln!(out, "    opt  {:<10} {}", flag, describe(spec));
    }
}

fn describe(spec: &PropertySpec) -> String {
    match &spec.kind {
        PropertyKind::Text => format!("{} [{}]", spec.label, spec.default),
        PropertyKind::Choice(choices) => format!("{} [{}]", spec.label, choices.join("|")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_shows_ports_and_properties() {
        let registry = PortTypeRegistry::builtin().unwrap();
        let listing = render_catalogue(&registry);

        assert!(listing.starts_with("pdb2gmx - "));
        assert!(listing.contains("editconf - "));
        assert!(listing.contains("    $ gmx editconf"));
        assert!(listing.contains("    in   in_gro     gro_file   -f\n"));
        assert!(listing.contains("cubic|"));
        assert_eq!(listing.matches("\n\n").count(), registry.len());
    }
}
