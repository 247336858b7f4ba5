use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use location_relay::client::geolocation::{Geolocation, StaticGeolocation, WatchOptions};
use location_relay::client::renderer::{MapRenderer, MemoryMap};
use location_relay::client::session::LocationClient;
use location_relay::protocol::LocationSample;
use tracing::{info, span, Level};

/// Headless relay client: reports scripted positions and tracks everyone's markers.
#[derive(Debug, Parser)]
#[command(name = "location-client", version)]
struct Args {
    /// Relay WebSocket URL.
    #[arg(long, env = "LOCATION_RELAY_URL", default_value = "ws://127.0.0.1:9090")]
    url: String,
    /// Position to report, as `LAT,LON`. Repeat to walk a path. With none
    /// given the client has no geolocation and only watches.
    #[arg(long = "position", value_parser = parse_position)]
    positions: Vec<LocationSample>,
    /// Pause between reported positions, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,
}

fn parse_position(s: &str) -> Result<LocationSample, String> {
    let (lat, lon) = s
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LON, got `{s}`"))?;
    let lat = lat.trim().parse::<f64>().map_err(|e| format!("latitude: {e}"))?;
    let lon = lon.trim().parse::<f64>().map_err(|e| format!("longitude: {e}"))?;
    Ok(LocationSample::new(lat, lon))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let span = span!(Level::INFO, "client");
    let _guard = span.enter();

    let args = Args::parse();
    let mut client = LocationClient::connect(&args.url)
        .await
        .with_context(|| format!("failed to connect to {}", args.url))?;

    let geolocation: Option<Arc<dyn Geolocation>> = if args.positions.is_empty() {
        None
    } else {
        Some(Arc::new(
            StaticGeolocation::from_samples(args.positions)
                .with_interval(Duration::from_millis(args.interval_ms)),
        ))
    };
    let _reporter = client.spawn_reporter(geolocation, WatchOptions::default());

    let mut renderer = MapRenderer::new(MemoryMap::new());
    client.render(&mut renderer).await?;

    let map = renderer.view();
    info!(
        markers = renderer.marker_count(),
        lat = map.center().lat,
        lng = map.center().lng,
        "relay closed"
    );
    Ok(())
}
