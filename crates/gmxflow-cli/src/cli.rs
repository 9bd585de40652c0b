use clap::{Args, Parser, Subcommand};
use gmxflow::compiler::NodeOrdering;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "GROMACS Node Workflow contributors",
    version,
    about = "gmxflow - Build, preview and run GROMACS preparation and simulation pipelines described as node graphs.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Configuration sources shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Path to a configuration file in TOML format.
    /// Defaults to `config.toml` in the per-user configuration directory, if present.
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S execution.gmxlib=/opt/ff
    #[arg(short = 'S', long = "set", global = true, value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the node types of the catalogue with their ports and properties.
    Types,
    /// Show the flag-pair preview of a session, one line per node.
    Preview(PreviewArgs),
    /// Compile a session into the command list a run would execute.
    Compile(CompileArgs),
    /// Execute a session's commands one after another, streaming their output.
    Run(RunArgs),
    /// Create a new session file from a list of node types.
    New(NewArgs),
    /// Change one property of a node and propagate it downstream.
    Set(SetArgs),
    /// Connect an output port to an input port.
    Connect(LinkArgs),
    /// Remove the connection between two ports.
    Disconnect(LinkArgs),
}

/// Arguments for the `preview` subcommand.
#[derive(Args, Debug)]
pub struct PreviewArgs {
    /// Path to the session document (JSON).
    #[arg(required = true, value_name = "SESSION")]
    pub session: PathBuf,

    /// Only show the node with this document id (e.g., 'node-2').
    #[arg(short, long, value_name = "ID")]
    pub node: Option<String>,

    /// Node ordering: 'horizontal' (canvas x) or 'topological' (connections).
    #[arg(long, value_name = "ORDERING")]
    pub ordering: Option<NodeOrdering>,
}

/// Arguments for the `compile` subcommand.
#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Path to the session document (JSON).
    #[arg(required = true, value_name = "SESSION")]
    pub session: PathBuf,

    /// Write the commands as an executable bash script instead of printing them.
    #[arg(short, long, value_name = "PATH")]
    pub bash: Option<PathBuf>,

    /// Node ordering: 'horizontal' (canvas x) or 'topological' (connections).
    #[arg(long, value_name = "ORDERING")]
    pub ordering: Option<NodeOrdering>,

    /// Restrict compilation to these document ids. All nodes when omitted.
    #[arg(short, long = "nodes", value_name = "ID", num_args(1..))]
    pub nodes: Vec<String>,
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the session document (JSON).
    #[arg(required = true, value_name = "SESSION")]
    pub session: PathBuf,

    /// Restrict the run to these document ids. All nodes when omitted.
    #[arg(short, long = "nodes", value_name = "ID", num_args(1..))]
    pub nodes: Vec<String>,

    /// Working directory of the commands, overriding the config file.
    /// Defaults to the directory containing the session.
    #[arg(short, long, value_name = "DIR")]
    pub workdir: Option<PathBuf>,

    /// Node ordering: 'horizontal' (canvas x) or 'topological' (connections).
    #[arg(long, value_name = "ORDERING")]
    pub ordering: Option<NodeOrdering>,

    /// GROMACS environment script sourced before each command, overriding the config file.
    #[arg(long, value_name = "PATH")]
    pub gmxrc: Option<PathBuf>,

    /// Do not probe `gmx --version` for a GMXRC script when none is configured.
    #[arg(long)]
    pub no_discover: bool,
}

/// Arguments for the `new` subcommand.
#[derive(Args, Debug)]
pub struct NewArgs {
    /// Path of the session document to create.
    #[arg(required = true, value_name = "SESSION")]
    pub session: PathBuf,

    /// Node type to add, optionally with a canvas position (e.g., 'editconf@200,0').
    /// Can be used multiple times; nodes without a position are laid out left to right.
    #[arg(short = 't', long = "type", value_name = "TYPE[@X,Y]", required = true, num_args(1..))]
    pub types: Vec<String>,

    /// Connect each node to the previous one wherever an output kind matches an input.
    #[arg(long)]
    pub chain: bool,

    /// Overwrite the session file if it already exists.
    #[arg(short, long)]
    pub force: bool,
}

/// Arguments for the `set` subcommand.
#[derive(Args, Debug)]
pub struct SetArgs {
    /// Path to the session document (JSON).
    #[arg(required = true, value_name = "SESSION")]
    pub session: PathBuf,

    /// Document id of the node (e.g., 'node-0').
    #[arg(required = true, value_name = "NODE")]
    pub node: String,

    /// Property flag (e.g., '-o'). Use 'add_property' to activate an optional property.
    #[arg(required = true, value_name = "FLAG", allow_hyphen_values = true)]
    pub flag: String,

    /// New value of the property.
    #[arg(required = true, value_name = "VALUE", allow_hyphen_values = true)]
    pub value: String,

    /// Save even if parts of the session could not be restored; those parts are dropped.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `connect` and `disconnect` subcommands.
#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Path to the session document (JSON).
    #[arg(required = true, value_name = "SESSION")]
    pub session: PathBuf,

    /// Document id of the source node.
    #[arg(required = true, value_name = "SOURCE")]
    pub source: String,

    /// Output port of the source node (e.g., 'out_gro').
    #[arg(required = true, value_name = "SOURCE_PORT")]
    pub source_port: String,

    /// Document id of the destination node.
    #[arg(required = true, value_name = "DEST")]
    pub dest: String,

    /// Input port of the destination node (e.g., 'in_gro').
    #[arg(required = true, value_name = "DEST_PORT")]
    pub dest_port: String,

    /// Save even if parts of the session could not be restored; those parts are dropped.
    #[arg(long)]
    pub force: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn set_accepts_hyphenated_flags_and_values() {
        let cli = Cli::parse_from(["gmxflow", "set", "s.json", "node-1", "-box", "-1"]);
        match cli.command {
            Commands::Set(args) => {
                assert_eq!(args.flag, "-box");
                assert_eq!(args.value, "-1");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn ordering_is_parsed_case_insensitively() {
        let cli = Cli::parse_from(["gmxflow", "compile", "s.json", "--ordering", "Topological"]);
        match cli.command {
            Commands::Compile(args) => assert_eq!(args.ordering, Some(NodeOrdering::Topological)),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_config_arguments_follow_the_subcommand() {
        let cli = Cli::parse_from([
            "gmxflow",
            "types",
            "-S",
            "compile.ordering=topological",
            "--config",
            "gmxflow.toml",
        ]);
        assert_eq!(cli.config.set_values, vec!["compile.ordering=topological"]);
        assert_eq!(cli.config.config, Some(PathBuf::from("gmxflow.toml")));
    }
}
