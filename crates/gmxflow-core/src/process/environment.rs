use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_SHELL: &str = "/bin/bash";
pub const DEFAULT_SHELL_ARG: &str = "-lc";

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
}

/// Where and how external commands are launched.
///
/// Every command is wrapped into one shell line that first sources the
/// GROMACS environment script and exports `GMXLIB`, so tools resolve the same
/// way they would in an interactive login shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionEnvironment {
    pub workdir: PathBuf,
    pub shell: String,
    pub shell_arg: String,
    pub gmxrc: Option<PathBuf>,
    pub gmxlib: Option<String>,
    /// Extra variables set on the child process.
    pub env: IndexMap<String, String>,
}

fn single_quoted(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

impl ExecutionEnvironment {
    /// Environment with the default shell and no GROMACS setup.
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            shell: DEFAULT_SHELL.to_string(),
            shell_arg: DEFAULT_SHELL_ARG.to_string(),
            gmxrc: None,
            gmxlib: None,
            env: IndexMap::new(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Setup statements run before every command, in order.
    pub fn prelude_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(gmxrc) = &self.gmxrc {
            lines.push(format!("source {}", single_quoted(&gmxrc.to_string_lossy())));
        }
        if let Some(gmxlib) = &self.gmxlib {
            lines.push(format!("export GMXLIB={}", single_quoted(gmxlib)));
        }
        lines
    }

    /// The single shell line actually handed to `shell shell_arg`.
    pub fn compose(&self, command: &str) -> String {
        let mut parts = self.prelude_lines();
        parts.push(command.to_string());
        parts.join("; ")
    }
}

#[derive(Debug, Default)]
pub struct ExecutionEnvironmentBuilder {
    workdir: Option<PathBuf>,
    shell: Option<String>,
    shell_arg: Option<String>,
    gmxrc: Option<PathBuf>,
    gmxlib: Option<String>,
    env: IndexMap<String, String>,
}

impl ExecutionEnvironmentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workdir(mut self, path: impl Into<PathBuf>) -> Self {
        self.workdir = Some(path.into());
        self
    }
    pub fn shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = Some(shell.into());
        self
    }
    pub fn shell_arg(mut self, arg: impl Into<String>) -> Self {
        self.shell_arg = Some(arg.into());
        self
    }
    pub fn gmxrc(mut self, path: Option<PathBuf>) -> Self {
        self.gmxrc = path;
        self
    }
    pub fn gmxlib(mut self, value: Option<String>) -> Self {
        self.gmxlib = value;
        self
    }
    pub fn env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Result<ExecutionEnvironment, ConfigError> {
        Ok(ExecutionEnvironment {
            workdir: self.workdir.ok_or(ConfigError::MissingParameter("workdir"))?,
            shell: self.shell.unwrap_or_else(|| DEFAULT_SHELL.to_string()),
            shell_arg: self
                .shell_arg
                .unwrap_or_else(|| DEFAULT_SHELL_ARG.to_string()),
            gmxrc: self.gmxrc,
            gmxlib: self.gmxlib,
            env: self.env,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_without_setup_is_the_bare_command() {
        let env = ExecutionEnvironment::new("/tmp");
        assert_eq!(env.compose("gmx --version"), "gmx --version");
        assert_eq!(env.shell, "/bin/bash");
        assert_eq!(env.shell_arg, "-lc");
    }

    #[test]
    fn compose_sources_gmxrc_and_exports_gmxlib() {
        let env = ExecutionEnvironmentBuilder::new()
            .workdir("/work")
            .gmxrc(Some(PathBuf::from("/opt/gromacs/bin/GMXRC")))
            .gmxlib(Some("/opt/ff".to_string()))
            .build()
            .unwrap();
        assert_eq!(
            env.compose("gmx pdb2gmx -f a.pdb"),
            "source '/opt/gromacs/bin/GMXRC'; export GMXLIB='/opt/ff'; gmx pdb2gmx -f a.pdb"
        );
    }

    #[test]
    fn quotes_inside_values_are_escaped() {
        let mut env = ExecutionEnvironment::new("/work");
        env.gmxlib = Some("it's here".to_string());
        assert_eq!(env.compose("true"), r"export GMXLIB='it'\''s here'; true");
    }

    #[test]
    fn builder_requires_workdir() {
        let result = ExecutionEnvironmentBuilder::new().shell("/bin/sh").build();
        assert_eq!(result, Err(ConfigError::MissingParameter("workdir")));
    }

    #[test]
    fn builder_collects_extra_variables() {
        let env = ExecutionEnvironmentBuilder::new()
            .workdir(".")
            .env_var("OMP_NUM_THREADS", "4")
            .build()
            .unwrap();
        assert_eq!(env.env.get("OMP_NUM_THREADS").map(String::as_str), Some("4"));
    }
}
