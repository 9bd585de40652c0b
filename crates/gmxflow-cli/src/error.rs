use gmxflow::compiler::CompileError;
use gmxflow::core::error::GraphError;
use gmxflow::core::registry::RegistryError;
use gmxflow::process::{ConfigError, ExecutionError};
use gmxflow::session::SessionError;
use gmxflow::workflows::PipelineError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Catalogue(#[from] RegistryError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse file '{path}': {source}", path = path.display())]
    FileParsing {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Command '{command}' failed{}", .exit_code.map(|c| format!(" with exit code {c}")).unwrap_or_default())]
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
    },

    #[error("Run interrupted by user")]
    Interrupted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_failure_mentions_exit_code_when_known() {
        let err = CliError::CommandFailed {
            command: "gmx grompp".into(),
            exit_code: Some(1),
        };
        assert_eq!(err.to_string(), "Command 'gmx grompp' failed with exit code 1");

        let err = CliError::CommandFailed {
            command: "gmx mdrun".into(),
            exit_code: None,
        };
        assert_eq!(err.to_string(), "Command 'gmx mdrun' failed");
    }
}
