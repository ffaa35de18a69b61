//! Wallet Bridge CLI
//!
//! Command-line front end for the wallet bridge: inspect the wallet, classify
//! and render dApp payloads, sign a payload directly, or run the HTTP
//! approval server.
//!
//! Logs go to stderr so that stdout carries only command output.

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use wallet_bridge_core::ChainId;
use wallet_bridge_engine::classifier::{is_conflux_method, namespace};
use wallet_bridge_engine::{
    ApprovedResponse, BridgeConfig, BridgeServer, Connector, JsonRpcRequest, RejectedResponse,
    RouteAction, WalletBridge, is_bridge_request, is_channel_request, is_signing_method,
    render_request,
};

#[derive(Parser)]
#[command(name = "wallet-bridge")]
#[command(about = "Wallet bridge for Ethereum and Conflux dApp requests", version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the wallet seed; in-memory when unset
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Account index to activate
    #[arg(long, global = true)]
    index: Option<u32>,

    /// Chain id to activate
    #[arg(long, global = true)]
    chain_id: Option<u64>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the active account and configured endpoints
    Info,

    /// Classify a JSON-RPC method name
    Classify {
        method: String,
    },

    /// Render a JSON-RPC payload as the approval prompt would show it
    Render {
        /// Payload file, or `-` for stdin
        #[arg(default_value = "-")]
        input: String,
    },

    /// List derived accounts
    Accounts {
        /// Number of accounts; the configured count when unset
        #[arg(short = 'n', long)]
        count: Option<u32>,
    },

    /// Route a JSON-RPC payload and approve it without prompting
    Sign {
        /// Payload file, or `-` for stdin
        #[arg(default_value = "-")]
        input: String,
    },

    /// Run the HTTP approval server
    Serve {
        /// Listen address; the configured `server.bind` when unset
        #[arg(short, long)]
        addr: Option<SocketAddr>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Commands::Info => show_info(load_config(&cli)?).await,
        Commands::Classify { method } => {
            classify(method);
            Ok(())
        }
        Commands::Render { input } => render(input),
        Commands::Accounts { count } => list_accounts(load_config(&cli)?, *count).await,
        Commands::Sign { input } => sign(load_config(&cli)?, input).await,
        Commands::Serve { addr } => serve(load_config(&cli)?, *addr).await,
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Configuration file (or defaults) with command-line overrides applied
fn load_config(cli: &Cli) -> Result<BridgeConfig> {
    let mut config = match &cli.config {
        Some(path) => BridgeConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => BridgeConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config = config.with_data_dir(dir);
    }
    if let Some(index) = cli.index {
        config = config.with_active_index(index);
    }
    if let Some(chain_id) = cli.chain_id {
        config = config.with_chain_id(chain_id);
    }
    Ok(config)
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut source = String::new();
        std::io::stdin().read_to_string(&mut source)?;
        Ok(source)
    } else {
        std::fs::read_to_string(input).with_context(|| format!("failed to read {}", input))
    }
}

// ============================================================================
// Commands
// ============================================================================

async fn show_info(config: BridgeConfig) -> Result<()> {
    let bridge = WalletBridge::from_config(config.clone()).await?;
    let snapshot = bridge.session().snapshot();

    println!("Wallet Bridge v{}", wallet_bridge_core::VERSION);
    println!();
    println!("Active account:");
    println!("  Index: {}", snapshot.active_index);
    println!("  Address: {}", snapshot.address.as_deref().unwrap_or("-"));
    println!("  Chain: {}", ChainId(snapshot.chain_id));
    println!("  Derivation path: {}", config.derivation_path);
    println!();
    println!("Endpoints:");
    if config.ethereum_rpc.is_empty() && config.conflux.rpc_urls.is_empty() {
        println!("  (none configured)");
    }
    for (chain_id, urls) in &config.ethereum_rpc {
        println!("  Ethereum {}: {}", chain_id, urls.join(", "));
    }
    if !config.conflux.rpc_urls.is_empty() {
        println!(
            "  Conflux {}: {}",
            config.conflux.chain_id,
            config.conflux.rpc_urls.join(", ")
        );
    }
    match &config.storage.data_dir {
        Some(dir) => println!("Storage: {}", dir.display()),
        None => println!("Storage: in-memory (seed is discarded on exit)"),
    }
    Ok(())
}

fn classify(method: &str) {
    let output = serde_json::json!({
        "method": method,
        "namespace": namespace(method),
        "bridge": is_bridge_request(method),
        "signing": is_signing_method(method),
        "conflux": is_conflux_method(method),
        "channel": is_channel_request(method),
    });
    println!("{:#}", output);
}

fn render(input: &str) -> Result<()> {
    let request = JsonRpcRequest::from_json(&read_input(input)?)?;
    for field in render_request(&request) {
        if field.value.contains('\n') {
            println!("{}:\n{}", field.label, field.value);
        } else {
            println!("{}: {}", field.label, field.value);
        }
    }
    Ok(())
}

async fn list_accounts(config: BridgeConfig, count: Option<u32>) -> Result<()> {
    let bridge = WalletBridge::from_config(config).await?;
    for account in bridge.accounts(count).await? {
        println!(
            "{:>3}  {}  {}  {}",
            account.index, account.path, account.address, account.conflux_address
        );
    }
    Ok(())
}

async fn sign(config: BridgeConfig, input: &str) -> Result<()> {
    let request = JsonRpcRequest::from_json(&read_input(input)?)?;
    let id = request.id.clone();

    let bridge = WalletBridge::from_config(config).await?;
    bridge.connect(Arc::new(StdoutConnector));

    match bridge.route(request).await? {
        RouteAction::Queued { .. } => {
            info!(id = %id, "Approving queued request");
            bridge.approve(&id).await?;
        }
        action => info!(id = %id, ?action, "Request answered without approval"),
    }
    Ok(())
}

async fn serve(config: BridgeConfig, addr: Option<SocketAddr>) -> Result<()> {
    let addr = match addr {
        Some(addr) => addr,
        None => config
            .server
            .bind
            .parse()
            .with_context(|| format!("invalid server.bind: {}", config.server.bind))?,
    };
    let server_config = config.server.clone();

    let bridge = WalletBridge::from_config(config).await?;
    BridgeServer::new(bridge, server_config).serve(addr).await
}

// ============================================================================
// Connector
// ============================================================================

/// Prints each outcome as a JSON-RPC response line
struct StdoutConnector;

#[async_trait]
impl Connector for StdoutConnector {
    async fn approve_request(&self, response: ApprovedResponse) -> wallet_bridge_engine::Result<()> {
        let line = serde_json::json!({
            "id": response.id,
            "jsonrpc": "2.0",
            "result": response.result,
        });
        println!("{}", line);
        Ok(())
    }

    async fn reject_request(&self, response: RejectedResponse) -> wallet_bridge_engine::Result<()> {
        let line = serde_json::json!({
            "id": response.id,
            "jsonrpc": "2.0",
            "error": response.error,
        });
        println!("{}", line);
        Ok(())
    }
}
