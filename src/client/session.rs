//! WebSocket session against a running relay.

use std::sync::Arc;

use futures_channel::mpsc::{unbounded, UnboundedSender};
use futures_util::stream::SplitStream;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, instrument, warn};

use super::geolocation::{Geolocation, WatchOptions};
use super::renderer::{MapRenderer, MapView};
use super::reporter;
use crate::error::{ClientError, ProtocolError};
use crate::protocol::{ClientEvent, LocationSample, ServerEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct LocationClient {
    outbound: UnboundedSender<Message>,
    inbound: SplitStream<WsStream>,
    writer: JoinHandle<()>,
    reporters: Vec<AbortHandle>,
}

impl LocationClient {
    #[instrument]
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let (ws_stream, _) = connect_async(url).await?;
        info!("connected to relay");
        let (sink, inbound) = ws_stream.split();
        let (outbound, rx) = unbounded::<Message>();
        let writer = tokio::spawn(async move {
            if let Err(e) = rx.map(Ok).forward(sink).await {
                debug!(error = %e, "writer stopped");
            }
        });
        Ok(Self {
            outbound,
            inbound,
            writer,
            reporters: Vec::new(),
        })
    }

    /// Start reporting positions from `geolocation` in the background.
    ///
    /// The task resolves to the number of samples sent. [`close`](Self::close)
    /// cancels it if it is still watching.
    pub fn spawn_reporter(
        &mut self,
        geolocation: Option<Arc<dyn Geolocation>>,
        options: WatchOptions,
    ) -> JoinHandle<usize> {
        let outbound = self.outbound.clone();
        let handle = tokio::spawn(async move {
            reporter::report(geolocation.as_deref(), &options, &outbound).await
        });
        self.reporters.retain(|reporter| !reporter.is_finished());
        self.reporters.push(handle.abort_handle());
        handle
    }

    pub fn send_location(&self, sample: LocationSample) -> Result<(), ClientError> {
        let text = ClientEvent::SendLocation(sample)
            .encode()
            .map_err(ProtocolError::from)?;
        self.outbound
            .unbounded_send(Message::Text(text))
            .map_err(|_| ClientError::Closed)
    }

    /// Next event from the relay, or `None` once the server has closed.
    pub async fn next_event(&mut self) -> Result<Option<ServerEvent>, ClientError> {
        while let Some(msg) = self.inbound.next().await {
            match msg? {
                Message::Text(text) => return Ok(Some(ServerEvent::decode(&text)?)),
                Message::Close(_) => return Ok(None),
                _ => continue,
            }
        }
        Ok(None)
    }

    /// Feed relay events into `renderer` until the server goes away.
    pub async fn render<V: MapView>(
        &mut self,
        renderer: &mut MapRenderer<V>,
    ) -> Result<(), ClientError> {
        loop {
            match self.next_event().await {
                Ok(Some(event)) => renderer.apply(&event),
                Ok(None) => return Ok(()),
                Err(ClientError::Protocol(e)) => warn!(error = %e, "skipping unreadable event"),
                Err(e) => return Err(e),
            }
        }
    }

    /// Stop any running reporters and close the socket once everything
    /// already queued has been written.
    pub async fn close(self) {
        let Self {
            outbound,
            writer,
            reporters,
            ..
        } = self;
        for reporter in reporters {
            reporter.abort();
        }
        outbound.close_channel();
        drop(outbound);
        if let Err(e) = writer.await {
            debug!(error = %e, "writer task failed");
        }
    }
}
