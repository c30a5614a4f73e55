use clap::Parser;
use std::time::Duration;
use stripefs::config::{MasterArgs, MasterConfig, setup_logging};
use stripefs::master::Master;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = MasterArgs::parse();
    setup_logging(args.silent, args.verbose);

    let config = MasterConfig::from_args(&args)?;

    tracing::info!(
        "Starting master on {} for a cluster of {} peers",
        config.bind,
        config.target_size
    );
    tracing::info!(
        "Health interval {:?}, dial timeout {:?}, call timeout {:?}",
        config.health.interval,
        config.health.dial_timeout,
        config.call_timeout
    );

    // 1. Coordinator facade (registry + stripe coordinator):
    let master = Master::new(&config)?;

    // 2. Spawn stats reporter:
    let stats_master = master.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));

        loop {
            interval.tick().await;
            let cluster = stats_master.cluster();
            let peers = cluster.snapshot().await;
            tracing::info!(
                "Cluster stats: {}/{} peers registered, ready={}",
                peers.len(),
                cluster.target_size(),
                cluster.is_ready()
            );
            for peer in peers {
                tracing::debug!("  - {} {:?}", peer.address, peer.status);
            }
        }
    });

    // 3. Start HTTP server:
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!("HTTP server listening on {}", listener.local_addr()?);
    tracing::info!("Press Ctrl+C to shutdown");

    master
        .clone()
        .serve(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    // 4. Stop the peers that are still reachable:
    let stopped = master.shutdown_peers().await;
    tracing::info!("Master stopped ({} peer(s) shut down)", stopped);

    Ok(())
}
