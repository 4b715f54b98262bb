use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "dstore",
    about = "Caching data store directory server",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the directory server
    Serve(ServeArgs),
    /// Print the default configuration, or validate a config file
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// TOML config file; defaults apply to anything it leaves out
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Override the node request listener address
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    /// Override the admin HTTP listener address
    #[arg(long)]
    pub admin: Option<SocketAddr>,
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Config file to validate and print with defaults filled in
    pub path: Option<PathBuf>,
}
