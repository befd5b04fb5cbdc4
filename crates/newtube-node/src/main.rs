//! Entry point for the newtube node binary.
//!
//! Structured around three subcommands instead of a single always-on
//! API+P2P server, since this node's channels are opened on demand
//! rather than fixed at startup.

mod cli;
mod config;
mod operator;

use clap::Parser;
use cli::{Cli, Command, InviteAction};
use config::NodeConfig;
use newtube_channel::Channel;
use newtube_core::ChannelKey;
use newtube_storage::{CoreStore, RocksBackend};
use newtube_swarm::{AttachRegistry, ConnectionIdAllocator, DiscoverySwarm, Timeouts};
use std::str::FromStr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run { config } => run(&config).await,
        Command::Keygen { output } => keygen(&output),
        Command::Invite {
            action: InviteAction::Create {
                config,
                channel,
                ttl_secs,
            },
        } => invite_create(&config, &channel, ttl_secs).await,
    }
}

fn init_tracing(log_level: &str) {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("newtube={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

async fn run(config_path: &std::path::Path) -> anyhow::Result<()> {
    let config = NodeConfig::load(config_path).unwrap_or_default();
    init_tracing(&config.log_level);

    tracing::info!(
        storage_path = %config.storage_path.display(),
        "starting newtube node"
    );

    if !config.swarm_key_path.exists() {
        let public_key = operator::keygen_to_file(&config.swarm_key_path)?;
        tracing::info!(%public_key, "generated a new swarm identity");
    }
    let keypair = operator::load_keypair(&config.swarm_key_path)?;
    tracing::info!(public_key = %keypair.public_key(), "node identity loaded");

    std::fs::create_dir_all(&config.storage_path)?;
    let _corestore: CoreStore<RocksBackend> = CoreStore::new(&config.storage_path);
    let _discovery = DiscoverySwarm::new();
    let _attach = AttachRegistry::new();
    let _connections = ConnectionIdAllocator::new();
    let _timeouts = Timeouts::default();

    tracing::info!("newtube node ready, press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    Ok(())
}

fn keygen(output: &std::path::Path) -> anyhow::Result<()> {
    init_tracing("info");
    let public_key = operator::keygen_to_file(output)?;
    println!("{public_key}");
    Ok(())
}

async fn invite_create(
    config_path: &std::path::Path,
    channel_hex: &str,
    ttl_secs: u64,
) -> anyhow::Result<()> {
    init_tracing("info");
    let config = NodeConfig::load(config_path).unwrap_or_default();

    let channel_key = ChannelKey::from_str(channel_hex)
        .map_err(|e| anyhow::anyhow!("invalid --channel: {e}"))?;
    let keypair = operator::load_keypair(&config.swarm_key_path)?;

    let corestore: CoreStore<RocksBackend> = CoreStore::new(&config.storage_path);
    let store = corestore.get_or_create(channel_key)?;
    let channel = Channel::open(channel_key, keypair, store)?;

    let invite = newtube_pairing::create_invite(
        &channel,
        std::time::Duration::from_secs(ttl_secs),
    )
    .await?;
    println!("{invite}");
    Ok(())
}
