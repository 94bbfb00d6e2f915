//! Command-line entry point. Parsed flags seed [`crate::config::ConfigOverrides`], which
//! win over a TOML config file, which wins over the built-in defaults.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::ConfigOverrides;

#[derive(Debug, Parser)]
#[command(name = "libri", about = "A peer-to-peer, content-addressed document store")]
pub struct Cli {
    /// Directory holding this node's identity and local state.
    #[arg(long, default_value = "~/.libri", global = true)]
    pub data_dir: String,

    /// Path to a TOML config file layered under CLI flags and over defaults.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the librarian node and begin serving peers.
    Start {
        #[arg(long)]
        port: Option<u16>,

        #[arg(long, value_delimiter = ',')]
        bootstrap: Option<Vec<String>>,
    },
    /// Print a document and its stored pages to a local store, without joining the network.
    Print {
        /// Path to the file whose content will be printed.
        input: PathBuf,

        #[arg(long, default_value = "application/octet-stream")]
        media_type: String,
    },
    /// Scan (reassemble) a document previously printed, given its envelope key.
    Scan {
        envelope_key: String,
    },
}

impl Cli {
    pub fn resolved_data_dir(&self) -> PathBuf {
        match self.data_dir.strip_prefix("~/") {
            Some(rest) => dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(rest),
            None => PathBuf::from(&self.data_dir),
        }
    }

    pub fn overrides(&self) -> ConfigOverrides {
        let (local_port, bootstrap_addrs) = match &self.command {
            Command::Start { port, bootstrap } => (*port, bootstrap.clone()),
            _ => (None, None),
        };
        ConfigOverrides { local_port, bootstrap_addrs, log_level: self.log_level.clone() }
    }
}
