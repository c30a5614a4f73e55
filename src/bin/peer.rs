use clap::Parser;
use stripefs::client::DfsClient;
use stripefs::config::{PeerArgs, PeerConfig, advertise_address, setup_logging};
use stripefs::peer::{PeerService, register_with_master};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = PeerArgs::parse();
    setup_logging(args.silent, args.verbose);

    let config = PeerConfig::from_args(&args)?;

    // 1. Local store:
    let service = PeerService::open(&config.fsdir).await?;

    // 2. Start serving before announcing ourselves, so the first ping succeeds:
    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    let bound = listener.local_addr()?;
    let advertise = advertise_address(args.advertise.as_deref(), bound)?;
    tracing::info!("Peer listening on {} (advertised as {})", bound, advertise);

    let server = tokio::spawn(service.clone().serve(listener));

    // 3. Stop on Ctrl+C as well as on the master's command:
    let signal_service = service.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl+C received");
            signal_service.request_shutdown();
        }
    });

    // 4. Register with the master:
    let client = DfsClient::new(&config.master)?;
    if let Err(e) = register_with_master(&client, &advertise, config.register_attempts).await {
        tracing::error!("Registration with {} failed: {}", config.master, e);
        service.request_shutdown();
        server.await??;
        return Err(e.into());
    }

    server.await??;
    tracing::info!("Peer stopped");

    Ok(())
}
