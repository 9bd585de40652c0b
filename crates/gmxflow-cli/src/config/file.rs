use crate::error::{CliError, Result};
use directories::ProjectDirs;
use gmxflow::compiler::NodeOrdering;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileExecutionConfig {
    pub workdir: Option<PathBuf>,
    pub shell: Option<String>,
    pub shell_arg: Option<String>,
    pub gmxrc: Option<PathBuf>,
    pub gmxlib: Option<String>,
    pub gmx_program: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileCompileConfig {
    pub ordering: Option<NodeOrdering>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    pub catalogue: Option<PathBuf>,
    pub execution: Option<FileExecutionConfig>,
    pub compile: Option<FileCompileConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        let mut config: FileConfig =
            toml::from_str(&content).map_err(|e| CliError::FileParsing {
                path: path.to_path_buf(),
                source: e.into(),
            })?;
        config.resolve_relative_paths(path.parent().unwrap_or_else(|| Path::new("")));
        Ok(config)
    }

    /// Paths in a config file are relative to the file, not to the caller.
    fn resolve_relative_paths(&mut self, base: &Path) {
        let anchor = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        if let Some(catalogue) = self.catalogue.as_mut() {
            anchor(catalogue);
        }
        if let Some(execution) = self.execution.as_mut() {
            for path in [execution.workdir.as_mut(), execution.gmxrc.as_mut()]
                .into_iter()
                .flatten()
            {
                anchor(path);
            }
        }
    }
}

/// `config.toml` in the per-user configuration directory.
pub fn user_config_path() -> Option<PathBuf> {
    ProjectDirs::from("org", "gmxflow", "gmxflow").map(|dirs| dirs.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn full_file_parses_with_kebab_case_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
            catalogue = "nodes.toml"

            [execution]
            workdir = "runs"
            shell = "/bin/zsh"
            shell-arg = "-c"
            gmxrc = "/opt/gromacs/bin/GMXRC"
            gmxlib = "/opt/forcefields"
            gmx-program = "gmx_mpi"

            [execution.env]
            OMP_NUM_THREADS = "4"

            [compile]
            ordering = "topological"
            "#,
        )
        .unwrap();

        let config = FileConfig::from_file(&path).unwrap();
        assert_eq!(config.catalogue, Some(dir.path().join("nodes.toml")));
        let execution = config.execution.unwrap();
        assert_eq!(execution.workdir, Some(dir.path().join("runs")));
        assert_eq!(execution.shell_arg.as_deref(), Some("-c"));
        assert_eq!(execution.gmxrc, Some(PathBuf::from("/opt/gromacs/bin/GMXRC")));
        assert_eq!(execution.gmx_program.as_deref(), Some("gmx_mpi"));
        assert_eq!(execution.env["OMP_NUM_THREADS"], "4");
        assert_eq!(config.compile.unwrap().ordering, Some(NodeOrdering::Topological));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[execution]\nshel = \"/bin/sh\"\n").unwrap();

        let err = FileConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, CliError::FileParsing { .. }));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempdir().unwrap();
        let err = FileConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, CliError::Io(_)));
    }
}
