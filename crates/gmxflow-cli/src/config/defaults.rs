use gmxflow::compiler::NodeOrdering;
use gmxflow::process::environment::{DEFAULT_SHELL, DEFAULT_SHELL_ARG};

pub struct DefaultsConfig {
    pub shell: String,
    pub shell_arg: String,
    pub ordering: NodeOrdering,
    pub gmx_program: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            shell: DEFAULT_SHELL.to_string(),
            shell_arg: DEFAULT_SHELL_ARG.to_string(),
            ordering: NodeOrdering::Horizontal,
            gmx_program: "gmx".to_string(),
        }
    }
}
