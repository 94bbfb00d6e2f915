use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use libri::cli::{Cli, Command};
use libri::config;
use libri::node::{Node, Registry};
use libri::store::InMemoryStore;
use libri_crypto::Identity;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let data_dir = cli.resolved_data_dir();
    std::fs::create_dir_all(&data_dir)?;

    let config = config::load(&data_dir, cli.config.as_deref(), cli.overrides())?;
    info!(local_port = config.local_port, "loaded libri configuration");

    let identity = load_or_generate_identity(&data_dir)?;
    let store: Arc<dyn libri::store::KvStore> = Arc::new(InMemoryStore::new());
    let registry = Registry::new();
    let node = Node::new(identity, config, store, registry.clone());
    registry.join(node.clone());

    match cli.command {
        Command::Start { .. } => {
            info!(id = %node.id(), "librarian node ready");
            let inserted = node.bootstrap(Vec::new()).await.unwrap_or(0);
            info!(inserted, "bootstrap complete");
        }
        Command::Print { input, media_type } => {
            let content = std::fs::read(&input)?;
            let reader = node.identity().public_key_bytes();
            let params = libri_pipeline::Parameters::default();
            let output = libri_pipeline::print(&content, &media_type, node.identity(), &reader, &params).await?;
            info!(entry_key = %output.envelope.entry_key, pages = output.pages.len(), "printed document");
        }
        Command::Scan { envelope_key } => {
            info!(envelope_key, "scan is not wired to a persistent store in this node; use the library API directly");
        }
    }

    Ok(())
}

fn load_or_generate_identity(data_dir: &std::path::Path) -> Result<Identity> {
    let key_path = data_dir.join("identity.key");
    if let Ok(bytes) = std::fs::read(&key_path) {
        return Ok(Identity::from_scalar_bytes(&bytes)?);
    }
    Ok(Identity::generate())
}
