//! Socket seam between the STOMP session and the wire.
//!
//! A [`Transport`] opens a URL and hands back the two halves of a text
//! message socket. [`crate::sockjs::SockJsTransport`] is the real one;
//! [`MemoryTransport`] is an in-process pipe whose far end is driven by
//! tests playing the broker.

use futures::channel::mpsc;
use futures::future::BoxFuture;
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use crate::stomp::ConnError;

/// Outbound half of an open socket.
pub type SocketSink = Pin<Box<dyn Sink<String, Error = ConnError> + Send>>;

/// Inbound half of an open socket. The stream ends when the peer closes.
pub type SocketStream = Pin<Box<dyn Stream<Item = Result<String, ConnError>> + Send>>;

/// Opens text-message sockets.
pub trait Transport: Send + Sync + 'static {
    fn open(&self, url: String) -> BoxFuture<'static, Result<(SocketSink, SocketStream), ConnError>>;
}

/// Broker side of a [`MemoryTransport`] socket.
pub struct MemoryPeer {
    /// URL passed to `open`.
    pub url: String,
    /// Messages written by the client.
    pub from_client: mpsc::UnboundedReceiver<String>,
    /// Push messages to the client; drop to close the socket.
    pub to_client: mpsc::UnboundedSender<Result<String, ConnError>>,
}

impl MemoryPeer {
    /// Wait for the next message written by the client.
    pub async fn recv(&mut self) -> Option<String> {
        self.from_client.next().await
    }

    /// Deliver `text` to the client. Returns false once the client is gone.
    pub fn push(&self, text: impl Into<String>) -> bool {
        self.to_client.unbounded_send(Ok(text.into())).is_ok()
    }
}

/// In-process transport. Every `open` creates a fresh pipe and queues its
/// broker end, retrievable with [`MemoryTransport::accept`].
#[derive(Clone, Default)]
pub struct MemoryTransport {
    peers_tx: Arc<Mutex<Option<mpsc::UnboundedSender<MemoryPeer>>>>,
    peers_rx: Arc<tokio::sync::Mutex<Option<mpsc::UnboundedReceiver<MemoryPeer>>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded();
        Self {
            peers_tx: Arc::new(Mutex::new(Some(tx))),
            peers_rx: Arc::new(tokio::sync::Mutex::new(Some(rx))),
        }
    }

    /// Wait for the next socket opened through this transport.
    pub async fn accept(&self) -> Option<MemoryPeer> {
        let mut guard = self.peers_rx.lock().await;
        match guard.as_mut() {
            Some(rx) => rx.next().await,
            None => None,
        }
    }

    /// Make every later `open` fail, as a refused connection would.
    pub fn refuse(&self) {
        if let Ok(mut guard) = self.peers_tx.lock() {
            guard.take();
        }
    }
}

impl Transport for MemoryTransport {
    fn open(&self, url: String) -> BoxFuture<'static, Result<(SocketSink, SocketStream), ConnError>> {
        let peers_tx = self
            .peers_tx
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().cloned());
        Box::pin(async move {
            let peers_tx = peers_tx.ok_or_else(|| {
                ConnError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    format!("connection refused: {}", url),
                ))
            })?;

            let (client_tx, from_client) = mpsc::unbounded::<String>();
            let (to_client, client_rx) = mpsc::unbounded::<Result<String, ConnError>>();
            peers_tx
                .unbounded_send(MemoryPeer {
                    url,
                    from_client,
                    to_client,
                })
                .map_err(|_| ConnError::Protocol("memory transport closed".into()))?;

            let sink: SocketSink =
                Box::pin(client_tx.sink_map_err(|_| ConnError::Protocol("socket closed".into())));
            let stream: SocketStream = Box::pin(client_rx);
            Ok((sink, stream))
        })
    }
}
