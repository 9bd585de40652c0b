use crate::cli::{CompileArgs, ConfigArgs};
use crate::config::{AppConfig, CliOverrides, build_config, user_config_path};
use crate::error::Result;
use gmxflow::compiler::to_bash_script;
use std::path::Path;
use tracing::info;

pub fn run(args: CompileArgs, config_args: &ConfigArgs) -> Result<()> {
    let overrides = CliOverrides {
        ordering: args.ordering,
        ..Default::default()
    };
    let config = build_config(config_args, user_config_path().as_deref(), &overrides)?;
    let commands = compile_commands(&config, &args.session, &args.nodes)?;

    match &args.bash {
        Some(path) => {
            write_script(&config, &args.session, &commands, path)?;
            println!(
                "✓ {} command(s) written to: {}",
                commands.len(),
                path.display()
            );
        }
        None => commands.iter().for_each(|command| println!("{}", command)),
    }
    Ok(())
}

fn compile_commands(config: &AppConfig, session: &Path, nodes: &[String]) -> Result<Vec<String>> {
    let (pipeline, index) = super::open_session(config, session)?;
    let selection = super::selection(&index, nodes)?;
    let commands = pipeline.commands(&selection)?;
    info!(
        "Compiled {} command(s) with {} ordering",
        commands.len(),
        pipeline.ordering()
    );
    Ok(commands)
}

/// Writes the bash export, sourcing the configured GROMACS environment first.
fn write_script(config: &AppConfig, session: &Path, commands: &[String], path: &Path) -> Result<()> {
    let prelude = config
        .environment(&super::session_dir(session))?
        .prelude_lines();
    std::fs::write(path, to_bash_script(commands, &prelude))?;
    make_executable(path)?;
    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut permissions = std::fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o111);
    std::fs::set_permissions(path, permissions)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
