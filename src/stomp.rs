use futures::{SinkExt, StreamExt, future};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::codec::{StompItem, TextDecoder, encode_text};
use crate::frame::{Frame, Headers};
use crate::protocol::{
    ClientFactory, ConnectCallback, DisconnectCallback, ErrorCallback, MessageHandler,
    ProtocolClient, SubscriptionId,
};
use crate::sockjs::SockJsTransport;
use crate::transport::{SocketSink, SocketStream, Transport};

/// Errors reported by a STOMP session.
#[derive(Error, Debug)]
pub enum ConnError {
    /// I/O-level error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// WebSocket-level error from the SockJS transport
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    /// A SockJS frame carried invalid JSON
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// The SockJS framing itself was not understood
    #[error("sockjs error: {0}")]
    SockJs(String),
    /// Protocol-level error
    #[error("protocol error: {0}")]
    Protocol(String),
    /// The socket was closed by the peer
    #[error("connection closed ({code}): {reason}")]
    Closed { code: u16, reason: String },
    /// The broker sent an ERROR frame
    #[error("broker error: {message}")]
    Broker { message: String, frame: Frame },
}

impl ConnError {
    fn lost() -> Self {
        ConnError::Closed {
            code: 1006,
            reason: "connection lost".to_string(),
        }
    }

    fn from_error_frame(frame: Frame) -> Self {
        let message = frame
            .get_header("message")
            .map(str::to_string)
            .unwrap_or_else(|| frame.body.trim().to_string());
        ConnError::Broker { message, frame }
    }
}

/// Parse the STOMP `heart-beat` header value (format: "cx,cy").
///
/// Returns `(cx, cy)` in milliseconds. Missing or invalid fields default
/// to `0`.
pub fn parse_heartbeat_header(header: &str) -> (u64, u64) {
    let mut parts = header.split(',');
    let mut field = || {
        parts
            .next()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(0)
    };
    let cx = field();
    let cy = field();
    (cx, cy)
}

/// Negotiate heartbeat intervals between client and server.
///
/// Each direction uses the larger of the two peers' values; `0` on either
/// side disables that direction. Returns `(outgoing, incoming)`.
pub fn negotiate_heartbeats(
    client_out: u64,
    client_in: u64,
    server_out: u64,
    server_in: u64,
) -> (Option<Duration>, Option<Duration>) {
    let direction = |ours: u64, theirs: u64| {
        if ours == 0 || theirs == 0 {
            None
        } else {
            Some(Duration::from_millis(ours.max(theirs)))
        }
    };
    (direction(client_out, server_in), direction(client_in, server_out))
}

/// Knobs for a [`StompSession`].
#[derive(Debug, Clone)]
pub struct StompOptions {
    /// Client `heart-beat` header ("cx,cy" in milliseconds).
    pub heartbeat: String,
    /// How long `disconnect` waits for the broker's RECEIPT.
    pub disconnect_timeout: Duration,
}

impl Default for StompOptions {
    fn default() -> Self {
        Self {
            heartbeat: "10000,10000".to_string(),
            disconnect_timeout: Duration::from_secs(5),
        }
    }
}

impl StompOptions {
    pub fn with_heartbeat(mut self, heartbeat: impl Into<String>) -> Self {
        self.heartbeat = heartbeat.into();
        self
    }

    pub fn with_disconnect_timeout(mut self, timeout: Duration) -> Self {
        self.disconnect_timeout = timeout;
        self
    }
}

enum Command {
    Send(Frame),
    Subscribe {
        id: SubscriptionId,
        destination: String,
        handler: MessageHandler,
    },
    Unsubscribe(SubscriptionId),
    Disconnect(DisconnectCallback),
}

/// STOMP protocol client over a [`Transport`].
///
/// Nothing touches the network until [`ProtocolClient::connect`]; that
/// spawns one tokio task owning the socket. Commands issued before the
/// handshake completes are queued and flushed once CONNECTED arrives.
pub struct StompSession {
    transport: Arc<dyn Transport>,
    url: String,
    options: StompOptions,
    commands: mpsc::UnboundedSender<Command>,
    /// Receiving end, moved into the session task by `connect`.
    pending: Mutex<Option<mpsc::UnboundedReceiver<Command>>>,
    /// Monotonic counter used to allocate subscription ids.
    sub_id_counter: AtomicU64,
}

impl StompSession {
    /// Wrap `transport` for `url`. No I/O happens yet.
    pub fn over(transport: impl Transport, url: impl Into<String>, options: StompOptions) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        Self {
            transport: Arc::new(transport),
            url: url.into(),
            options,
            commands,
            pending: Mutex::new(Some(rx)),
            sub_id_counter: AtomicU64::new(0),
        }
    }

    /// Target URL handed to the transport.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ProtocolClient for StompSession {
    fn connect(&self, headers: Headers, on_connect: ConnectCallback, mut on_error: ErrorCallback) {
        let Some(commands) = self.pending.lock().ok().and_then(|mut rx| rx.take()) else {
            on_error(ConnError::Protocol("session already connected".into()));
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            on_error(ConnError::Protocol("no tokio runtime available".into()));
            return;
        };

        let task = SessionTask {
            transport: self.transport.clone(),
            url: self.url.clone(),
            options: self.options.clone(),
            handlers: HashMap::new(),
            on_error,
        };
        runtime.spawn(task.run(headers, on_connect, commands));
    }

    fn disconnect(&self, on_disconnect: DisconnectCallback) {
        if let Err(mpsc::error::SendError(cmd)) =
            self.commands.send(Command::Disconnect(on_disconnect))
        {
            // session task already gone
            if let Command::Disconnect(done) = cmd {
                done();
            }
        }
    }

    fn send(&self, destination: &str, headers: Headers, body: String) {
        let frame = Frame::new("SEND")
            .header("destination", destination)
            .with_headers(headers)
            .set_body(body);
        if self.commands.send(Command::Send(frame)).is_err() {
            warn!(destination, "send dropped: session closed");
        }
    }

    fn subscribe(&self, destination: &str, handler: MessageHandler) -> SubscriptionId {
        let n = self.sub_id_counter.fetch_add(1, Ordering::SeqCst);
        let id = SubscriptionId::new(format!("sub-{}", n));
        let cmd = Command::Subscribe {
            id: id.clone(),
            destination: destination.to_string(),
            handler,
        };
        if self.commands.send(cmd).is_err() {
            warn!(destination, "subscribe dropped: session closed");
        }
        id
    }

    fn unsubscribe(&self, id: &SubscriptionId) {
        if self.commands.send(Command::Unsubscribe(id.clone())).is_err() {
            warn!(subscription = %id, "unsubscribe dropped: session closed");
        }
    }
}

/// [`ClientFactory`] producing a [`StompSession`] per `create` call.
#[derive(Debug, Clone, Default)]
pub struct StompFactory<T> {
    transport: T,
    options: StompOptions,
}

/// The factory used by [`crate::StompClient::new`].
pub type SockJsFactory = StompFactory<SockJsTransport>;

impl<T> StompFactory<T> {
    pub fn new(transport: T, options: StompOptions) -> Self {
        Self { transport, options }
    }

    pub fn options(&self) -> &StompOptions {
        &self.options
    }
}

impl<T: Transport + Clone> ClientFactory for StompFactory<T> {
    fn create(&self, url: &str) -> Box<dyn ProtocolClient> {
        Box::new(StompSession::over(
            self.transport.clone(),
            url,
            self.options.clone(),
        ))
    }
}

/// How the handshake phase ended.
enum Handshake {
    Connected(Frame, Vec<Frame>),
    Disconnected(DisconnectCallback),
    Failed(ConnError),
    Abandoned,
}

struct SessionTask {
    transport: Arc<dyn Transport>,
    url: String,
    options: StompOptions,
    handlers: HashMap<SubscriptionId, MessageHandler>,
    on_error: ErrorCallback,
}

impl SessionTask {
    async fn run(
        mut self,
        headers: Headers,
        on_connect: ConnectCallback,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) {
        self.drive(headers, on_connect, &mut commands).await;

        // Anyone still waiting on a disconnect gets told it is done.
        commands.close();
        while let Ok(cmd) = commands.try_recv() {
            if let Command::Disconnect(done) = cmd {
                done();
            }
        }
    }

    async fn drive(
        &mut self,
        headers: Headers,
        on_connect: ConnectCallback,
        commands: &mut mpsc::UnboundedReceiver<Command>,
    ) {
        debug!(url = %self.url, "opening socket");
        let (mut sink, mut stream) = match self.transport.open(self.url.clone()).await {
            Ok(halves) => halves,
            Err(e) => {
                warn!(url = %self.url, error = %e, "socket open failed");
                (self.on_error)(e);
                return;
            }
        };

        let connect = Frame::new("CONNECT")
            .header("accept-version", "1.2,1.1,1.0")
            .header("heart-beat", self.options.heartbeat.as_str())
            .with_headers(headers);
        if let Err(e) = write(&mut sink, StompItem::Frame(connect)).await {
            (self.on_error)(e);
            return;
        }

        let mut decoder = TextDecoder::new();
        let mut queued = Vec::new();
        let (connected, early) =
            match handshake(&mut stream, &mut decoder, commands, &mut queued).await {
                Handshake::Connected(frame, early) => (frame, early),
                Handshake::Disconnected(done) => {
                    let _ = sink.close().await;
                    done();
                    return;
                }
                Handshake::Failed(e) => {
                    warn!(url = %self.url, error = %e, "handshake failed");
                    let _ = sink.close().await;
                    (self.on_error)(e);
                    return;
                }
                Handshake::Abandoned => {
                    let _ = sink.close().await;
                    return;
                }
            };

        let (cx, cy) = parse_heartbeat_header(&self.options.heartbeat);
        let (sx, sy) = parse_heartbeat_header(connected.get_header("heart-beat").unwrap_or("0,0"));
        let (send_interval, recv_interval) = negotiate_heartbeats(cx, cy, sx, sy);
        debug!(?send_interval, ?recv_interval, "session connected");
        on_connect(connected);

        for cmd in queued {
            if let Err(e) = self.apply(&mut sink, cmd).await {
                (self.on_error)(e);
                return;
            }
        }
        for frame in early {
            self.dispatch(frame);
        }

        let mut last_sent = Instant::now();
        let mut last_received = Instant::now();
        let mut hb_tick = tokio::time::interval(send_interval.unwrap_or(Duration::from_secs(86400)));
        // checked on its own schedule; other select! arms must not delay it
        let mut watchdog = recv_interval.map(|d| tokio::time::interval(d / 2));

        loop {
            tokio::select! {
                cmd = commands.recv() => {
                    match cmd {
                        Some(Command::Disconnect(done)) => {
                            self.shutdown(&mut sink, &mut stream, &mut decoder).await;
                            done();
                            return;
                        }
                        Some(cmd) => {
                            if let Err(e) = self.apply(&mut sink, cmd).await {
                                (self.on_error)(e);
                                return;
                            }
                            last_sent = Instant::now();
                        }
                        None => {
                            // every handle dropped without disconnecting
                            let _ = sink.close().await;
                            return;
                        }
                    }
                }
                msg = stream.next() => {
                    match msg {
                        Some(Ok(text)) => {
                            last_received = Instant::now();
                            match decoder.feed(&text) {
                                Ok(items) => {
                                    for item in items {
                                        if let StompItem::Frame(frame) = item {
                                            self.dispatch(frame);
                                        }
                                    }
                                }
                                Err(e) => {
                                    let _ = sink.close().await;
                                    (self.on_error)(e.into());
                                    return;
                                }
                            }
                        }
                        Some(Err(e)) => {
                            (self.on_error)(e);
                            return;
                        }
                        None => {
                            (self.on_error)(ConnError::lost());
                            return;
                        }
                    }
                }
                _ = hb_tick.tick() => {
                    if let Some(dur) = send_interval {
                        if last_sent.elapsed() >= dur {
                            if let Err(e) = write(&mut sink, StompItem::Heartbeat).await {
                                (self.on_error)(e);
                                return;
                            }
                            last_sent = Instant::now();
                        }
                    }
                }
                _ = async {
                    match watchdog.as_mut() {
                        Some(interval) => {
                            interval.tick().await;
                        }
                        None => future::pending::<()>().await,
                    }
                } => {
                    if let Some(recv_dur) = recv_interval {
                        if last_received.elapsed() > recv_dur * 2 {
                            warn!(url = %self.url, "no heartbeat from broker");
                            let _ = sink.close().await;
                            (self.on_error)(ConnError::Protocol("heartbeat timeout".into()));
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn apply(&mut self, sink: &mut SocketSink, cmd: Command) -> Result<(), ConnError> {
        match cmd {
            Command::Send(frame) => write(sink, StompItem::Frame(frame)).await,
            Command::Subscribe {
                id,
                destination,
                handler,
            } => {
                let frame = Frame::new("SUBSCRIBE")
                    .header("id", id.as_str())
                    .header("destination", destination);
                self.handlers.insert(id, handler);
                write(sink, StompItem::Frame(frame)).await
            }
            Command::Unsubscribe(id) => {
                if self.handlers.remove(&id).is_none() {
                    debug!(subscription = %id, "unsubscribe for unknown id");
                    return Ok(());
                }
                let frame = Frame::new("UNSUBSCRIBE").header("id", id.as_str());
                write(sink, StompItem::Frame(frame)).await
            }
            Command::Disconnect(done) => {
                // handled by the caller; keep the contract if one slips through
                done();
                Ok(())
            }
        }
    }

    fn dispatch(&mut self, frame: Frame) {
        match frame.command.as_str() {
            "MESSAGE" => {
                let Some(id) = frame.get_header("subscription").map(SubscriptionId::new) else {
                    warn!("MESSAGE without subscription header dropped");
                    return;
                };
                match self.handlers.get_mut(&id) {
                    Some(handler) => handler(frame),
                    None => warn!(subscription = %id, "MESSAGE for unknown subscription dropped"),
                }
            }
            "ERROR" => (self.on_error)(ConnError::from_error_frame(frame)),
            other => debug!(command = other, "ignoring frame"),
        }
    }

    /// Send DISCONNECT and give the broker a bounded window to confirm it.
    async fn shutdown(
        &mut self,
        sink: &mut SocketSink,
        stream: &mut SocketStream,
        decoder: &mut TextDecoder,
    ) {
        const RECEIPT: &str = "disconnect";
        let frame = Frame::new("DISCONNECT").header("receipt", RECEIPT);
        if write(sink, StompItem::Frame(frame)).await.is_ok() {
            let waited =
                tokio::time::timeout(self.options.disconnect_timeout, wait_receipt(stream, decoder, RECEIPT))
                    .await;
            if waited.is_err() {
                debug!("no RECEIPT for DISCONNECT before timeout");
            }
        }
        let _ = sink.close().await;
        self.handlers.clear();
    }
}

async fn write(sink: &mut SocketSink, item: StompItem) -> Result<(), ConnError> {
    if let StompItem::Frame(frame) = &item {
        debug!(command = %frame.command, "sending frame");
    }
    let text = encode_text(item)?;
    sink.send(text).await
}

async fn handshake(
    stream: &mut SocketStream,
    decoder: &mut TextDecoder,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    queued: &mut Vec<Command>,
) -> Handshake {
    loop {
        tokio::select! {
            cmd = commands.recv() => {
                match cmd {
                    Some(Command::Disconnect(done)) => return Handshake::Disconnected(done),
                    Some(cmd) => queued.push(cmd),
                    None => return Handshake::Abandoned,
                }
            }
            msg = stream.next() => {
                let text = match msg {
                    Some(Ok(text)) => text,
                    Some(Err(e)) => return Handshake::Failed(e),
                    None => return Handshake::Failed(ConnError::lost()),
                };
                let items = match decoder.feed(&text) {
                    Ok(items) => items,
                    Err(e) => return Handshake::Failed(e.into()),
                };
                let mut frames = items.into_iter().filter_map(|item| match item {
                    StompItem::Frame(frame) => Some(frame),
                    StompItem::Heartbeat => None,
                });
                while let Some(frame) = frames.next() {
                    match frame.command.as_str() {
                        "CONNECTED" => return Handshake::Connected(frame, frames.collect()),
                        "ERROR" => return Handshake::Failed(ConnError::from_error_frame(frame)),
                        other => debug!(command = other, "frame before CONNECTED ignored"),
                    }
                }
            }
        }
    }
}

async fn wait_receipt(stream: &mut SocketStream, decoder: &mut TextDecoder, receipt: &str) {
    while let Some(Ok(text)) = stream.next().await {
        let Ok(items) = decoder.feed(&text) else {
            return;
        };
        let confirmed = items.iter().any(|item| {
            matches!(item, StompItem::Frame(f)
                if f.command == "RECEIPT" && f.get_header("receipt-id") == Some(receipt))
        });
        if confirmed {
            return;
        }
    }
}
