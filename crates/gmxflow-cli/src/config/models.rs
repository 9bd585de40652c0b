use gmxflow::compiler::NodeOrdering;
use gmxflow::process::{ConfigError, ExecutionEnvironment, ExecutionEnvironmentBuilder};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Fully merged settings for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Extra node catalogue registered on top of the built-in one.
    pub catalogue: Option<PathBuf>,
    pub ordering: NodeOrdering,
    pub execution: ExecutionSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionSettings {
    /// `None` means "next to the session file".
    pub workdir: Option<PathBuf>,
    pub shell: String,
    pub shell_arg: String,
    pub gmxrc: Option<PathBuf>,
    pub gmxlib: Option<String>,
    /// Program probed for a GMXRC when none is configured.
    pub gmx_program: String,
    pub env: BTreeMap<String, String>,
}

impl AppConfig {
    /// Builds the process environment, falling back to `default_workdir`.
    pub fn environment(&self, default_workdir: &Path) -> Result<ExecutionEnvironment, ConfigError> {
        let settings = &self.execution;
        let workdir = settings
            .workdir
            .clone()
            .unwrap_or_else(|| default_workdir.to_path_buf());

        settings
            .env
            .iter()
            .fold(ExecutionEnvironmentBuilder::new(), |builder, (key, value)| {
                builder.env_var(key, value)
            })
            .workdir(workdir)
            .shell(&settings.shell)
            .shell_arg(&settings.shell_arg)
            .gmxrc(settings.gmxrc.clone())
            .gmxlib(settings.gmxlib.clone())
            .build()
    }
}
