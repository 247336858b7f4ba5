//! Pushes local position fixes to the relay as `send-location` frames.

use futures_channel::mpsc::UnboundedSender;
use futures_util::StreamExt;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use super::geolocation::{Geolocation, WatchOptions};
use crate::protocol::ClientEvent;

/// Watch `geolocation` and forward every fix to `outbound` as it arrives.
///
/// With no geolocation available this returns at once without sending
/// anything. Failed fixes are logged and skipped; the watch decides when
/// to try again. Returns the number of samples queued.
pub async fn report(
    geolocation: Option<&dyn Geolocation>,
    options: &WatchOptions,
    outbound: &UnboundedSender<Message>,
) -> usize {
    let Some(geolocation) = geolocation else {
        debug!("geolocation unavailable, not reporting");
        return 0;
    };

    let mut watch = geolocation.watch_position(options);
    let mut sent = 0;
    while let Some(fix) = watch.next().await {
        let sample = match fix {
            Ok(sample) => sample,
            Err(e) => {
                warn!("Error: {e}");
                continue;
            }
        };
        let text = match ClientEvent::SendLocation(sample).encode() {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "failed to serialize location");
                continue;
            }
        };
        if outbound.unbounded_send(Message::Text(text)).is_err() {
            debug!("connection closed, stopping reporter");
            break;
        }
        sent += 1;
    }
    sent
}
