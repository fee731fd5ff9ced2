mod cli;
mod connection;
mod logger;
mod render;
mod transport;

use aeromatrix_shared::Response;
use anyhow::bail;
use clap::Parser;
use cli::Cli;
use connection::{ClientConfig, FleetClient};
use std::time::Duration;
use tracing::debug;
use transport::TcpConnector;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logger::init(cli.verbose);

    let connector = TcpConnector::new(cli.server.clone(), Duration::from_secs(cli.connect_timeout_secs));
    let config = ClientConfig {
        client_id: format!("console-{}", std::process::id()),
        retries: cli.retries,
        ..Default::default()
    };

    let request = cli.command.into_request();
    debug!(?request, "Sending request");

    let mut client = FleetClient::connect(&connector, config).await?;
    let response = client.call(request).await?;
    client.close().await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print!("{}", render::response(&response));
    }

    if let Response::Error(body) = &response {
        bail!("request refused: {:?}", body.kind);
    }
    Ok(())
}
