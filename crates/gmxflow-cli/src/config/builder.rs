use super::defaults::DefaultsConfig;
use super::file::{FileCompileConfig, FileConfig, FileExecutionConfig};
use super::models::{AppConfig, ExecutionSettings};
use crate::cli::ConfigArgs;
use crate::error::{CliError, Result};
use crate::utils::parser;
use gmxflow::compiler::NodeOrdering;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Values given as dedicated command-line flags. They win over everything else.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub ordering: Option<NodeOrdering>,
    pub workdir: Option<PathBuf>,
    pub gmxrc: Option<PathBuf>,
}

/// Merges defaults, the config file, `-S` values and `overrides`.
///
/// An explicit `--config` must exist; `user_config` is only read when present.
pub fn build_config(
    args: &ConfigArgs,
    user_config: Option<&Path>,
    overrides: &CliOverrides,
) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();

    let file_config = match (&args.config, user_config) {
        (Some(path), _) => FileConfig::from_file(path)?,
        (None, Some(path)) if path.is_file() => FileConfig::from_file(path)?,
        _ => {
            debug!("No configuration file found, using built-in defaults.");
            FileConfig::default()
        }
    };

    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    let execution_file = file_config.execution.take().unwrap_or_default();
    let compile_file = file_config.compile.take().unwrap_or_default();

    let execution = ExecutionSettings {
        workdir: overrides.workdir.clone().or(execution_file.workdir),
        shell: execution_file.shell.unwrap_or(defaults.shell),
        shell_arg: execution_file.shell_arg.unwrap_or(defaults.shell_arg),
        gmxrc: overrides.gmxrc.clone().or(execution_file.gmxrc),
        gmxlib: execution_file.gmxlib.filter(|v| !v.is_empty()),
        gmx_program: execution_file.gmx_program.unwrap_or(defaults.gmx_program),
        env: execution_file.env,
    };

    Ok(AppConfig {
        catalogue: file_config.catalogue.filter(|p| !p.as_os_str().is_empty()),
        ordering: overrides
            .ordering
            .or(compile_file.ordering)
            .unwrap_or(defaults.ordering),
        execution,
    })
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let (key, value) =
            parser::parse_set_value(kv_pair).map_err(|e| CliError::Config(e.to_string()))?;

        if let Some(name) = key.strip_prefix("execution.env.") {
            if name.is_empty() {
                return Err(CliError::Config(format!(
                    "Missing variable name in --set key '{}'",
                    key
                )));
            }
            execution(&mut config).env.insert(name.to_string(), value.to_string());
            continue;
        }

        match key {
            "catalogue" => config.catalogue = Some(PathBuf::from(value)),
            "execution.workdir" => execution(&mut config).workdir = Some(PathBuf::from(value)),
            "execution.shell" => execution(&mut config).shell = Some(value.to_string()),
            "execution.shell-arg" => execution(&mut config).shell_arg = Some(value.to_string()),
            "execution.gmxrc" => execution(&mut config).gmxrc = Some(PathBuf::from(value)),
            "execution.gmxlib" => execution(&mut config).gmxlib = Some(value.to_string()),
            "execution.gmx-program" => {
                execution(&mut config).gmx_program = Some(value.to_string())
            }
            "compile.ordering" => {
                let ordering = value.parse::<NodeOrdering>().map_err(|e| {
                    CliError::Config(format!("Invalid value for {}: {}", key, e))
                })?;
                config
                    .compile
                    .get_or_insert_with(FileCompileConfig::default)
                    .ordering = Some(ordering);
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}

fn execution(config: &mut FileConfig) -> &mut FileExecutionConfig {
    config.execution.get_or_insert_with(Default::default)
}
