use std::sync::Arc;

use colored::Colorize;
use dstore_server::{DstoreServer, ServerConfig};
use dstore_store::InMemoryBackingStore;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args),
        Command::Config(args) => cmd_config(args),
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<ServerConfig> {
    match path {
        Some(path) => Ok(ServerConfig::load(path)?),
        None => Ok(ServerConfig::default()),
    }
}

fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(admin) = args.admin {
        config.admin_addr = admin;
    }

    println!("{} dstore directory server", "▶".green().bold());
    println!("  Requests: {}", config.bind_addr.to_string().bold());
    println!("  Admin:    {}", config.admin_addr.to_string().bold());
    println!(
        "  Update queue ports: {}",
        format!("{}..={}", config.update_queue_ports.first, config.update_queue_ports.last).cyan()
    );
    tracing::warn!("serving from an in-memory backing store; data is lost on exit");

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(DstoreServer::new(config).serve(Arc::new(InMemoryBackingStore::new())))?;
    Ok(())
}

fn cmd_config(args: ConfigArgs) -> anyhow::Result<()> {
    let config = load_config(args.path.as_deref())?;
    if let Some(path) = &args.path {
        println!("# {} {}", "✓".green(), path.display());
    }
    print!("{}", config.to_toml()?);
    Ok(())
}
