//! SockJS websocket transport.
//!
//! Only the websocket leg of SockJS is spoken: the URL gets the
//! `/{server}/{session}/websocket` suffix and every websocket text message
//! carries one SockJS frame. The streaming and polling fallbacks are not
//! implemented.

use futures::future::BoxFuture;
use futures::{SinkExt, StreamExt, stream};
use rand::Rng;
use serde::Deserialize;
use std::collections::VecDeque;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

use crate::stomp::ConnError;
use crate::transport::{SocketSink, SocketStream, Transport};

type WsStream = futures::stream::SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

const SESSION_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// One frame of the SockJS framing protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SockJsFrame {
    /// `o`: the session is open
    Open,
    /// `h`: server heartbeat
    Heartbeat,
    /// `a[...]` or `m"..."`: application messages
    Messages(Vec<String>),
    /// `c[code,"reason"]`: the server closed the session
    Close { code: u16, reason: String },
}

#[derive(Deserialize)]
struct CloseBody(u16, String);

impl SockJsFrame {
    /// Parse the text of one websocket message.
    pub fn parse(text: &str) -> Result<Self, ConnError> {
        let Some(kind) = text.chars().next() else {
            return Err(ConnError::SockJs("empty frame".into()));
        };
        let rest = &text[kind.len_utf8()..];
        match kind {
            'o' => Ok(SockJsFrame::Open),
            'h' => Ok(SockJsFrame::Heartbeat),
            'a' => Ok(SockJsFrame::Messages(serde_json::from_str(rest)?)),
            'm' => Ok(SockJsFrame::Messages(vec![serde_json::from_str(rest)?])),
            'c' => {
                let CloseBody(code, reason) = serde_json::from_str(rest)?;
                Ok(SockJsFrame::Close { code, reason })
            }
            _ => Err(ConnError::SockJs(format!("unknown frame type: {:?}", text))),
        }
    }
}

/// Encode outgoing messages the way a SockJS client sends them.
pub fn encode_messages(messages: &[String]) -> Result<String, serde_json::Error> {
    serde_json::to_string(messages)
}

/// Build the websocket URL for a SockJS endpoint such as
/// `http://localhost:8080/websocket`.
pub fn websocket_url(base: &str) -> Result<String, ConnError> {
    let mut rng = rand::thread_rng();
    let server = rng.gen_range(0..1000u16);
    let session: String = (0..8)
        .map(|_| SESSION_ALPHABET[rng.gen_range(0..SESSION_ALPHABET.len())] as char)
        .collect();
    websocket_url_with(base, server, &session)
}

/// [`websocket_url`] with explicit server and session ids.
pub fn websocket_url_with(base: &str, server: u16, session: &str) -> Result<String, ConnError> {
    let (scheme, rest) = base
        .split_once("://")
        .ok_or_else(|| ConnError::SockJs(format!("url without scheme: {}", base)))?;
    let scheme = match scheme.to_ascii_lowercase().as_str() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(ConnError::SockJs(format!("unsupported scheme: {}", other))),
    };
    let (path, query) = match rest.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (rest, None),
    };
    let mut url = format!(
        "{}://{}/{:03}/{}/websocket",
        scheme,
        path.trim_end_matches('/'),
        server % 1000,
        session
    );
    if let Some(query) = query {
        url.push('?');
        url.push_str(query);
    }
    Ok(url)
}

/// [`Transport`] that opens the SockJS websocket leg.
#[derive(Debug, Clone, Copy, Default)]
pub struct SockJsTransport;

impl Transport for SockJsTransport {
    fn open(&self, url: String) -> BoxFuture<'static, Result<(SocketSink, SocketStream), ConnError>> {
        Box::pin(async move {
            let ws_url = websocket_url(&url)?;
            debug!(url = %ws_url, "opening sockjs websocket");
            let (ws, _) = connect_async(ws_url.as_str()).await?;
            let (ws_sink, mut ws_stream) = ws.split();
            await_open(&mut ws_stream).await?;

            let sink: SocketSink = Box::pin(ws_sink.with(|text: String| async move {
                let framed = encode_messages(&[text])?;
                Ok::<_, ConnError>(Message::Text(framed.into()))
            }));
            Ok((sink, inbound(ws_stream)))
        })
    }
}

async fn await_open(ws: &mut WsStream) -> Result<(), ConnError> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => match SockJsFrame::parse(text.as_str())? {
                SockJsFrame::Open => return Ok(()),
                SockJsFrame::Heartbeat => {}
                SockJsFrame::Close { code, reason } => {
                    return Err(ConnError::Closed { code, reason });
                }
                SockJsFrame::Messages(_) => {
                    return Err(ConnError::SockJs("message before open frame".into()));
                }
            },
            Some(Ok(Message::Close(_))) | None => {
                return Err(ConnError::Closed {
                    code: 1006,
                    reason: "closed before open frame".into(),
                });
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e.into()),
        }
    }
}

/// Unwrap SockJS frames into the message strings they carry.
///
/// The stream yields one error and then ends when the server closes the
/// session or the framing breaks.
fn inbound(ws: WsStream) -> SocketStream {
    let state = (ws, VecDeque::<String>::new(), false);
    Box::pin(stream::unfold(state, |(mut ws, mut queue, done)| async move {
        if done {
            return None;
        }
        loop {
            if let Some(msg) = queue.pop_front() {
                return Some((Ok(msg), (ws, queue, false)));
            }
            let err = match ws.next().await {
                Some(Ok(Message::Text(text))) => match SockJsFrame::parse(text.as_str()) {
                    Ok(SockJsFrame::Messages(msgs)) => {
                        queue.extend(msgs);
                        continue;
                    }
                    Ok(SockJsFrame::Open) | Ok(SockJsFrame::Heartbeat) => continue,
                    Ok(SockJsFrame::Close { code, reason }) => ConnError::Closed { code, reason },
                    Err(e) => e,
                },
                Some(Ok(Message::Close(_))) | None => return None,
                Some(Ok(_)) => continue,
                Some(Err(e)) => e.into(),
            };
            return Some((Err(err), (ws, queue, true)));
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_url_has_sockjs_shape() {
        let url = websocket_url("http://localhost:8080/websocket").unwrap();
        let tail = url
            .strip_prefix("ws://localhost:8080/websocket/")
            .expect("prefix");
        let parts: Vec<&str> = tail.split('/').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 3);
        assert!(parts[0].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[1].len(), 8);
        assert!(parts[1].bytes().all(|b| SESSION_ALPHABET.contains(&b)));
        assert_eq!(parts[2], "websocket");
    }
}
