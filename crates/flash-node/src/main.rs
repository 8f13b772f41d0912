//! flash — a peer-to-peer value-transfer node.
//!
//! Startup sequence:
//!   1. Load the identity key and the genesis endowments
//!   2. Start the libp2p host (tcp + noise + yamux)
//!   3. Sync tx logs from the bootstrap peers and replay balances
//!   4. Serve the snapshot / verify / commit protocols until interrupted

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use libp2p_identity::PeerId;
use tracing::info;

use flash_crypto::{create_keypair, read_private_key, write_private_key};
use flash_node::config::read_genesis;
use flash_node::Node;
use flash_p2p::{P2pConfig, P2pNetwork};

#[derive(Parser, Debug)]
#[command(name = "flash", version, about = "flash node — signed transfers with stake-weighted verification")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a key pair and write it to a key file.
    Gen {
        /// Where to store the private key.
        keyfile: PathBuf,
    },
    /// Start the node.
    Start {
        /// Key file created with `flash gen`.
        keyfile: PathBuf,

        /// Genesis endowments JSON (peer-id → balance).
        #[arg(long, default_value = "genesis.json")]
        genesis: PathBuf,

        /// Bootstrap peer multiaddresses (comma-separated).
        #[arg(long, value_delimiter = ',')]
        bootstrap: Vec<String>,

        /// Listen multiaddress.
        #[arg(long, default_value = "/ip4/0.0.0.0/tcp/0")]
        listen: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,flash=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    match args.command {
        Command::Gen { keyfile } => {
            let keypair = create_keypair().context("generating key pair")?;
            write_private_key(&keyfile, &keypair)
                .with_context(|| format!("writing key file {}", keyfile.display()))?;
            info!(
                peer = %PeerId::from_public_key(&keypair.public()),
                keyfile = %keyfile.display(),
                "key pair written"
            );
        }

        Command::Start { keyfile, genesis, bootstrap, listen } => {
            let keypair = read_private_key(&keyfile)
                .with_context(|| format!("reading key file {}", keyfile.display()))?;
            let endowments = read_genesis(&genesis)
                .with_context(|| format!("reading genesis file {}", genesis.display()))?;

            let p2p_config = P2pConfig { listen_addr: listen, ..P2pConfig::default() };
            let (network, host) =
                P2pNetwork::new(keypair.clone(), &p2p_config).context("building p2p host")?;
            tokio::spawn(network.run());

            let node = Node::new(keypair, host, endowments, bootstrap);
            node.start().await.context("starting node")?;

            tokio::signal::ctrl_c().await.context("waiting for interrupt")?;
            info!("shutting down");
        }
    }

    Ok(())
}
