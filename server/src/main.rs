use aeromatrix_server::{logger, FleetServer, ServerArgs, ServerConfig};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ServerArgs::parse();
    logger::init(args.verbose);

    let config = ServerConfig::load(&args)?;
    info!(
        listen = %config.listen_addr,
        idle_timeout_secs = config.idle_timeout_secs,
        max_frame_bytes = config.max_frame_bytes,
        seeded_matrices = config.fleet.matrices.len(),
        "Starting AeroMatrix server"
    );

    let listener = TcpListener::bind(config.listen_addr).await?;
    let server = FleetServer::from_config(config).await?;

    server
        .run(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
}
