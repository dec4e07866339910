//! Kademlia bootstrap node entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config from the environment
//!   3. Init logger
//!   4. Resolve identity (generate from seed, or decode `PRIVATE_KEY`)
//!   5. Generated key: print it and exit, unless `START_WITH_GENERATED_KEY`
//!   6. Build host + DHT, listen, print the bootstrap address
//!   7. Run until Ctrl-C / SIGTERM

use kad_bootstrap::{
    announce, config,
    error::AppError,
    identity::{self, Launch},
    logger,
    network::{self, BootstrapNode},
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present; the file is optional.
    let _ = dotenvy::dotenv();

    let config = config::load();

    logger::init(&config.log_level, config.log_level_explicit)?;

    for warning in &config.warnings {
        warn!("{warning}");
    }

    info!(
        host = %config.host,
        port = config.port,
        private_key_set = config.has_private_key(),
        start_with_generated_key = config.start_with_generated_key,
        "config loaded"
    );

    for line in announce::preamble_lines(&config) {
        println!("{line}");
    }

    let launch = identity::resolve(&config)?;
    let Launch::Start { keypair, .. } = &launch else {
        for line in announce::launch_lines(&launch, None) {
            println!("{line}");
        }
        return Ok(());
    };

    let mut node = BootstrapNode::new(
        keypair.clone(),
        network::listen_address(config.host, config.port),
    )?;
    node.start()?;

    for line in announce::launch_lines(&launch, Some(&node.bootstrap_address())) {
        println!("{line}");
    }

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        signal_token.cancel();
    });

    info!(listen_addr = %node.listen_addr(), "bootstrap node running, waiting for peers");
    node.run(shutdown).await;

    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "cannot install SIGTERM handler, only Ctrl-C will stop the node");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("ctrl-c received"),
        _ = sigterm.recv() => info!("SIGTERM received"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("ctrl-c received");
    }
}
