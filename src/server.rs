//! TCP accept loop and per-connection WebSocket handling.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{future, pin_mut, stream, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{interval_at, timeout, Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, instrument, warn};

use crate::broadcaster::Broadcaster;
use crate::config::{Heartbeat, ServerConfig};
use crate::protocol::{ConnectionId, Envelope, SEND_LOCATION};

/// Pause before retrying after a failed `accept`.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub struct RelayServer {
    listener: TcpListener,
    broadcaster: Arc<Broadcaster>,
    heartbeat: Heartbeat,
}

impl RelayServer {
    pub async fn bind(config: &ServerConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(config.addr()).await?;
        Ok(Self {
            listener,
            broadcaster: Arc::new(Broadcaster::new()),
            heartbeat: config.heartbeat(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn broadcaster(&self) -> Arc<Broadcaster> {
        Arc::clone(&self.broadcaster)
    }

    /// Accept connections forever, one task per peer.
    pub async fn run(self) -> io::Result<()> {
        info!("Listening on: {}", self.listener.local_addr()?);
        loop {
            let (stream, addr) = accept_next(|| self.listener.accept()).await;
            tokio::spawn(handle_connection(
                stream,
                addr,
                Arc::clone(&self.broadcaster),
                self.heartbeat,
            ));
        }
    }
}

/// Keep calling `accept` until it yields a peer, backing off after errors
/// such as running out of file descriptors.
async fn accept_next<T, F, Fut>(mut accept: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    loop {
        match accept().await {
            Ok(peer) => return peer,
            Err(e) => {
                warn!(error = %e, "accept failed");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

#[instrument(skip(raw_stream, broadcaster, heartbeat))]
async fn handle_connection(
    raw_stream: TcpStream,
    addr: SocketAddr,
    broadcaster: Arc<Broadcaster>,
    heartbeat: Heartbeat,
) {
    let ws_stream = match set_up_stream(raw_stream, &addr).await {
        Ok(ws_stream) => ws_stream,
        Err(e) => {
            warn!(error = %e, "websocket handshake failed");
            return;
        }
    };
    serve_socket(ws_stream, broadcaster, heartbeat).await;
    info!("{} disconnected", addr);
}

/// Run one registered connection until it closes, errors, or goes quiet
/// for longer than the heartbeat allows.
async fn serve_socket<S>(
    ws_stream: WebSocketStream<S>,
    broadcaster: Arc<Broadcaster>,
    heartbeat: Heartbeat,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (outgoing, mut incoming) = ws_stream.split();
    let (id, rx) = broadcaster.on_connect().await;
    info!(%id, "connected");

    let relay = async {
        loop {
            match timeout(heartbeat.idle_deadline(), incoming.next()).await {
                Ok(Some(Ok(msg))) => dispatch(&broadcaster, id, msg).await,
                Ok(Some(Err(e))) => {
                    debug!(%id, error = %e, "read failed");
                    break;
                }
                Ok(None) => break,
                Err(_) => {
                    info!(%id, "heartbeat timed out");
                    break;
                }
            }
        }
    };

    let pings = stream::unfold(ping_timer(heartbeat.interval), |mut timer| async move {
        let _ = timer.tick().await;
        Some((Message::Ping(Vec::new()), timer))
    });
    let receive = stream::select(rx, pings).map(Ok).forward(outgoing);
    pin_mut!(relay, receive);
    future::select(relay, receive).await;

    broadcaster.on_disconnect(id).await;
}

fn ping_timer(period: Duration) -> Interval {
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

async fn dispatch(broadcaster: &Broadcaster, id: ConnectionId, msg: Message) {
    let text = match msg {
        Message::Text(text) => text,
        Message::Ping(_) | Message::Pong(_) | Message::Close(_) => return,
        other => {
            debug!(%id, len = other.len(), "ignoring non-text frame");
            return;
        }
    };
    let envelope = match Envelope::decode(&text) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(%id, error = %e, "Received malformed message");
            return;
        }
    };
    match envelope.event.as_str() {
        SEND_LOCATION => {
            debug!(%id, "location update");
            broadcaster.on_location_update(id, envelope.data).await;
        }
        other => warn!(%id, "Received unexpected message type: {other}"),
    }
}

async fn set_up_stream(
    raw_stream: TcpStream,
    addr: &SocketAddr,
) -> Result<WebSocketStream<TcpStream>, tungstenite::Error> {
    info!("Incoming TCP connection from: {}", addr);

    let ws_stream = tokio_tungstenite::accept_async(raw_stream).await?;
    info!("WebSocket connection established: {}", addr);
    Ok(ws_stream)
}
