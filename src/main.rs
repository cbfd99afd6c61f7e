mod cli;
mod commands;
mod config;
mod engine;
mod fsutil;
mod install;
mod intent;
mod inventory;
mod materialize;
mod paths;
mod resource;
mod ui;

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub config: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity; RUST_LOG still wins
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .parse_default_env()
        .format_timestamp_secs()
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: cli.config,
    };

    let result = match cli.command {
        Command::Run(args) => commands::run::run(&ctx, args),
        Command::Status(args) => commands::status::run(&ctx, args),
        Command::List { basedir } => commands::list::run(&basedir),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "preparer", &mut io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        log::error!("{e:#}");
        std::process::exit(1);
    }
}
