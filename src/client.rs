use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, error};

use crate::frame::{Frame, Headers};
use crate::payload::{Inbound, Payload, classify};
use crate::protocol::{ClientFactory, ConnectCallback, MessageHandler, ProtocolClient, SubscriptionId};
use crate::stomp::{ConnError, SockJsFactory};

/// Errors returned immediately by [`StompClient`] operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// `send`/`subscribe`/`unsubscribe` called without a session
    #[error("client must be configured before {operation}")]
    Unconfigured { operation: &'static str },
}

/// When [`StompClient::is_connected`] starts reporting `true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectedWhen {
    /// As soon as `connect` has created the protocol client, before the
    /// broker has answered.
    #[default]
    ClientCreated,
    /// Only after the broker's CONNECTED frame has been received.
    Handshake,
}

/// Where and how a [`StompClient`] connects.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Scheme, host and port, e.g. `http://localhost:8080`.
    pub host: String,
    /// Service path appended verbatim to `host`, e.g. `/websocket`.
    pub service: String,
    pub connected_when: ConnectedWhen,
    /// Extra CONNECT headers; empty by default.
    pub connect_headers: Headers,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            service: service.into(),
            connected_when: ConnectedWhen::default(),
            connect_headers: Vec::new(),
        }
    }

    pub fn connected_when(mut self, when: ConnectedWhen) -> Self {
        self.connected_when = when;
        self
    }

    /// Add a CONNECT header such as `login` or `passcode`.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.connect_headers.push((key.into(), value.into()));
        self
    }

    /// Transport target: `host` followed by `service`.
    pub fn url(&self) -> String {
        format!("{}{}", self.host, self.service)
    }
}

enum Session {
    Disconnected,
    Connected {
        client: Box<dyn ProtocolClient>,
        /// Set once the broker has acknowledged the CONNECT.
        handshake: Arc<AtomicBool>,
    },
}

/// Session adapter over a STOMP endpoint.
///
/// Holds at most one protocol client. `connect` creates it, `disconnect`
/// drops it; `send` and `subscribe` forward to it and fail with
/// [`ClientError::Unconfigured`] while there is none.
///
/// ```no_run
/// # use sockjs_stomp::StompClient;
/// # use serde_json::json;
/// # async fn demo() -> Result<(), sockjs_stomp::ClientError> {
/// let mut client = StompClient::new("http://localhost:8080", "/websocket");
/// client.connect(|_| println!("connected"), |e| eprintln!("error: {e}"));
/// client.subscribe("/topic/greetings", |msg| println!("{msg}"))?;
/// client.send("/app/hello", json!({ "name": "stomp" }))?;
/// client.disconnect(|| println!("bye"));
/// # Ok(())
/// # }
/// ```
pub struct StompClient<F = SockJsFactory> {
    config: ClientConfig,
    factory: F,
    session: Session,
}

impl StompClient<SockJsFactory> {
    /// Client for `host + service` over SockJS with default options.
    pub fn new(host: impl Into<String>, service: impl Into<String>) -> Self {
        Self::from_config(ClientConfig::new(host, service))
    }

    pub fn from_config(config: ClientConfig) -> Self {
        Self::with_factory(config, SockJsFactory::default())
    }
}

impl<F: ClientFactory> StompClient<F> {
    /// Client that obtains its protocol clients from `factory`.
    pub fn with_factory(config: ClientConfig, factory: F) -> Self {
        Self {
            config,
            factory,
            session: Session::Disconnected,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Open a session unless one already exists.
    ///
    /// `on_success` receives the broker's CONNECTED frame. `on_error` may
    /// fire more than once: for a failed handshake and for any later
    /// transport or broker error.
    pub fn connect(
        &mut self,
        on_success: impl FnOnce(Frame) + Send + 'static,
        on_error: impl FnMut(ConnError) + Send + 'static,
    ) {
        if matches!(self.session, Session::Connected { .. }) {
            debug!("connect ignored: client already configured");
            return;
        }

        let url = self.config.url();
        debug!(url = %url, "connecting");
        let client = self.factory.create(&url);
        let handshake = Arc::new(AtomicBool::new(false));
        let confirmed = handshake.clone();
        let on_connect: ConnectCallback = Box::new(move |frame: Frame| {
            confirmed.store(true, Ordering::SeqCst);
            on_success(frame);
        });
        client.connect(
            self.config.connect_headers.clone(),
            on_connect,
            Box::new(on_error),
        );
        self.session = Session::Connected { client, handshake };
    }

    /// Whether the client counts as connected under its [`ConnectedWhen`]
    /// policy. This is local state, not a liveness probe.
    pub fn is_connected(&self) -> bool {
        match &self.session {
            Session::Disconnected => false,
            Session::Connected { handshake, .. } => match self.config.connected_when {
                ConnectedWhen::ClientCreated => true,
                ConnectedWhen::Handshake => handshake.load(Ordering::SeqCst),
            },
        }
    }

    /// Close the session. The client is cleared before this returns;
    /// `callback` fires once the protocol client has shut down.
    pub fn disconnect(&mut self, callback: impl FnOnce() + Send + 'static) {
        let Session::Connected { client, .. } =
            std::mem::replace(&mut self.session, Session::Disconnected)
        else {
            return;
        };
        debug!("disconnecting");
        client.disconnect(Box::new(callback));
    }

    /// Publish `payload` to `endpoint`.
    pub fn send(&self, endpoint: &str, payload: impl Into<Payload>) -> Result<(), ClientError> {
        let client = self.client("sending")?;
        let body = payload.into().into_body();
        debug!(endpoint, bytes = body.len(), "send");
        client.send(endpoint, Vec::new(), body);
        Ok(())
    }

    /// [`send`](Self::send), then run `callback` once the frame has been
    /// handed off. There is no delivery confirmation.
    pub fn send_with(
        &self,
        endpoint: &str,
        payload: impl Into<Payload>,
        callback: impl FnOnce(),
    ) -> Result<(), ClientError> {
        self.send(endpoint, payload)?;
        callback();
        Ok(())
    }

    /// Deliver the JSON body of every message on `endpoint` to
    /// `on_message`. Messages with an empty body are dropped.
    pub fn subscribe(
        &self,
        endpoint: &str,
        on_message: impl FnMut(Value) + Send + 'static,
    ) -> Result<SubscriptionId, ClientError> {
        self.register(endpoint, on_message, None)
    }

    /// Like [`subscribe`](Self::subscribe), handing messages with an empty
    /// body to `on_invalid` as raw frames.
    pub fn subscribe_with_error(
        &self,
        endpoint: &str,
        on_message: impl FnMut(Value) + Send + 'static,
        on_invalid: impl FnMut(Frame) + Send + 'static,
    ) -> Result<SubscriptionId, ClientError> {
        self.register(endpoint, on_message, Some(Box::new(on_invalid)))
    }

    pub fn unsubscribe(&self, id: &SubscriptionId) -> Result<(), ClientError> {
        self.client("unsubscribing")?.unsubscribe(id);
        Ok(())
    }

    fn register(
        &self,
        endpoint: &str,
        mut on_message: impl FnMut(Value) + Send + 'static,
        mut on_invalid: Option<Box<dyn FnMut(Frame) + Send>>,
    ) -> Result<SubscriptionId, ClientError> {
        let client = self.client("subscribing")?;
        let destination = endpoint.to_string();
        let handler: MessageHandler = Box::new(move |frame: Frame| match classify(frame) {
            Inbound::Parsed(value) => on_message(value),
            Inbound::Empty(frame) => {
                if let Some(on_invalid) = on_invalid.as_mut() {
                    on_invalid(frame);
                }
            }
            Inbound::Malformed(e, frame) => {
                error!(destination = %destination, error = %e, body = %frame.body, "message body is not JSON");
            }
        });
        Ok(client.subscribe(endpoint, handler))
    }

    fn client(&self, operation: &'static str) -> Result<&dyn ProtocolClient, ClientError> {
        match &self.session {
            Session::Connected { client, .. } if self.is_connected() => Ok(client.as_ref()),
            _ => Err(ClientError::Unconfigured { operation }),
        }
    }
}
