use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::config::Overrides;

#[derive(Parser)]
#[command(name = "preparer")]
#[command(version)]
#[command(about = "Install the artifacts and configs this node is declared to run", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: /etc/preparer/preparer.toml)
    #[arg(short, long, global = true, env = "PREPARER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Converge this node to its declared state
    Run(RunArgs),

    /// Show what a run would change, without changing anything
    Status(NodeArgs),

    /// List installed artifacts and stored configs under a basedir
    List {
        /// Application basedir to inspect
        basedir: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Where to read intent and artifacts from
#[derive(Args, Debug, Clone, Default)]
pub struct NodeArgs {
    /// Node name to resolve (default: system hostname)
    #[arg(long)]
    pub hostname: Option<String>,

    /// Artifact repository: directory, file:// or http(s):// URL
    #[arg(long)]
    pub repo: Option<String>,

    /// KV store address
    #[arg(long, env = "PREPARER_KV_ADDR")]
    pub kv_addr: Option<String>,

    /// KV store ACL token
    #[arg(long, env = "PREPARER_KV_TOKEN", hide_env_values = true)]
    pub kv_token: Option<String>,
}

impl NodeArgs {
    pub fn overrides(&self, jobs: Option<usize>) -> Overrides {
        Overrides {
            hostname: self.hostname.clone(),
            artifact_repo: self.repo.clone(),
            kv_address: self.kv_addr.clone(),
            kv_token: self.kv_token.clone(),
            jobs,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub node: NodeArgs,

    /// Number of concurrent installs
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Show what would be done without making changes
    #[arg(long)]
    pub dry_run: bool,

    /// Poll again every SECS seconds instead of exiting
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "preparer",
            "-v",
            "run",
            "--hostname",
            "testhost",
            "--jobs",
            "4",
            "--dry-run",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.node.hostname.as_deref(), Some("testhost"));
        assert_eq!(args.jobs, Some(4));
        assert!(args.dry_run);
        assert_eq!(args.interval, None);
    }

    #[test]
    fn test_parse_list() {
        let cli = Cli::try_parse_from(["preparer", "list", "/sometmp"]).unwrap();
        assert!(matches!(cli.command, Command::List { basedir } if basedir == PathBuf::from("/sometmp")));
    }

    #[test]
    fn test_overrides_carry_flags() {
        let args = NodeArgs {
            repo: Some("/srv/repo".into()),
            ..NodeArgs::default()
        };
        let overrides = args.overrides(Some(2));
        assert_eq!(overrides.artifact_repo.as_deref(), Some("/srv/repo"));
        assert_eq!(overrides.jobs, Some(2));
        assert!(overrides.hostname.is_none());
    }
}
