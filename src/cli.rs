use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "converge")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(
    about = "Converge one resource or run one action, then report its state as JSON",
    long_about = None
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (default: ~/.config/converge/config.toml)
    #[arg(long, global = true, env = "CONVERGE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub apply: ApplyArgs,
}

#[derive(Subcommand)]
pub enum Command {
    /// Execute a request read from a file or stdin (the default)
    Apply(ApplyArgs),

    /// Show registered resource kinds with their properties, actions and providers
    Describe {
        /// Only show this kind
        kind: Option<String>,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct ApplyArgs {
    /// Read the request from FILE instead of stdin
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Report needed changes without making them
    #[arg(short, long)]
    pub noop: bool,

    /// Pretty-print the JSON output
    #[arg(short, long)]
    pub pretty: bool,

    /// Detect facts from the running host
    #[arg(long)]
    pub detect_facts: bool,
}

impl Cli {
    /// The command to run; `apply` when none is given
    pub fn into_command(self) -> Command {
        self.command.unwrap_or(Command::Apply(self.apply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_command_is_apply() {
        let cli = Cli::try_parse_from(["converge", "--noop", "-i", "req.json"]).unwrap();
        match cli.into_command() {
            Command::Apply(args) => {
                assert!(args.noop);
                assert_eq!(args.input, Some(PathBuf::from("req.json")));
            }
            Command::Describe { .. } => panic!("expected apply"),
        }
    }

    #[test]
    fn test_apply_subcommand() {
        let cli = Cli::try_parse_from(["converge", "-vv", "apply", "--pretty"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.into_command() {
            Command::Apply(args) => assert!(args.pretty),
            Command::Describe { .. } => panic!("expected apply"),
        }
    }

    #[test]
    fn test_describe_kind() {
        let cli = Cli::try_parse_from(["converge", "describe", "file"]).unwrap();
        match cli.into_command() {
            Command::Describe { kind } => assert_eq!(kind.as_deref(), Some("file")),
            Command::Apply(_) => panic!("expected describe"),
        }
    }
}
