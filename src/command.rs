use clap::{Parser, Subcommand};
use std::path::PathBuf;
use thiserror::Error;

mod run;

pub use run::run;


#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Flock(#[from] crate::Error),
    #[error("interrupted")]
    Interrupted,
}


#[derive(Debug, Parser)]
#[command(name = "flock", version, about = "Run commands across a fleet of hosts")]
pub struct Cli {
    /// Path to the Supfile
    #[arg(short = 'f', long = "file", default_value = "Supfile")]
    pub supfile: PathBuf,

    /// Trace remote commands with `set -x`
    #[arg(short = 'D', long)]
    pub debug: bool,

    /// Keep running remaining tasks after a failure
    #[arg(long)]
    pub keep_going: bool,

    /// Extra environment variable, KEY=VALUE
    #[arg(short = 'e', long = "env", value_parser = parse_env)]
    pub env: Vec<(String, String)>,

    #[command(subcommand)]
    pub command: Command,
}


#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run commands or targets on a network
    Run {
        network: String,
        #[arg(required = true)]
        commands: Vec<String>,
    },
    /// List networks, commands and targets
    List {
        network: Option<String>,
    },
}


fn parse_env(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {:?}", s)),
    }
}
