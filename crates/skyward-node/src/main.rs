//! skyward-node — the Skyward bonus-system server binary.
//!
//! Startup sequence:
//!   1. Build the tier catalog and generate the per-(tier, action) RSA keys
//!   2. Start the JSON-RPC server
//!   3. Wait for ctrl-c or a `system/exit` request

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use skyward_rpc::{RpcServer, RpcServerState};
use skyward_state::Server;

#[derive(Parser, Debug)]
#[command(
    name = "skyward-node",
    version,
    about = "Skyward server — anonymous hierarchical loyalty rewards"
)]
struct Args {
    /// Listen host.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Listen port.
    #[arg(long, default_value_t = 8545)]
    port: u16,

    /// Log mode: "debug" (verbose) or "release".
    #[arg(long, default_value = "debug")]
    mode: String,

    /// Directory where `system/debug` also writes its dumps.
    #[arg(long)]
    result_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = match args.mode.as_str() {
        "release" => "info",
        _ => "info,skyward_state=debug,skyward_rpc=debug,skyward_tiers=debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.parse().expect("static filter parses")),
        )
        .init();

    info!("Skyward node starting");

    // ── Server state (RSA keygen happens here) ────────────────────────────────
    let server = Server::with_default_catalog().context("building server state")?;

    if let Some(dir) = &args.result_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating result dir {}", dir.display()))?;
    }

    // ── RPC server ────────────────────────────────────────────────────────────
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
    let state = Arc::new(RpcServerState {
        server,
        result_dir: args.result_dir.clone(),
        shutdown_tx,
    });

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .context("parsing listen address")?;
    let handle = RpcServer::new(state).start(addr).await.context("starting RPC server")?;

    info!("node ready");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("interrupt received"),
        _ = shutdown_rx.recv() => info!("exit endpoint called"),
    }

    let _ = handle.stop();
    handle.stopped().await;
    info!("node stopped");
    Ok(())
}
