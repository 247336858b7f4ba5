use clap::Parser;
use location_relay::{RelayServer, ServerConfig};
use tracing::{span, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // set up logging
    tracing_subscriber::fmt::init();
    let span = span!(Level::INFO, "server");
    let _guard = span.enter();

    let config = ServerConfig::parse();
    let server = RelayServer::bind(&config).await?;
    server.run().await?;

    Ok(())
}
