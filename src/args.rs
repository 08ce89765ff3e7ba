use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Use this config file instead of the one in the platform config directory
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Print snapshots as JSON
    #[arg(long, action = ArgAction::SetTrue, default_value_t = false)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show every configured server
    Status,
    /// Show one server (numbered from 1, in config order)
    Server { index: usize },
    /// Print the raw match JSON a server reports
    MatchJson { index: usize },
    /// Run a console command on a server and print the reply (`status` if
    /// no command is given)
    Rcon {
        index: usize,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Print the loaded settings with credentials hidden
    Config,
    /// Keep showing every server until interrupted
    Watch {
        /// Seconds between refreshes, overriding the config file
        #[arg(long)]
        interval: Option<u64>,
    },
}
