use bytes::{Buf, BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

use crate::frame::Frame;
use crate::parser::{escapes_headers, parse_frame};

/// Escape a STOMP 1.2 header key or value for wire transmission.
///
/// - backslash (0x5c) → `\\`
/// - carriage return (0x0d) → `\r`
/// - line feed (0x0a) → `\n`
/// - colon (0x3a) → `\c`
fn escape_header_value(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '\\' => result.push_str("\\\\"),
            '\r' => result.push_str("\\r"),
            '\n' => result.push_str("\\n"),
            ':' => result.push_str("\\c"),
            _ => result.push(ch),
        }
    }
    result
}

/// Items produced or consumed by the codec.
///
/// A `StompItem` is either a decoded `Frame` or a `Heartbeat` marker
/// representing a single EOL received on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StompItem {
    /// A decoded STOMP frame (command + headers + body)
    Frame(Frame),
    /// A single heartbeat pulse (LF or CRLF)
    Heartbeat,
}

/// `StompCodec` implements `tokio_util::codec::{Decoder, Encoder}` for the
/// STOMP wire format as carried inside SockJS text messages.
///
/// Bodies are text. `content-length` is honored on decode and emitted on
/// encode only when the body contains a NUL.
#[derive(Debug, Default)]
pub struct StompCodec {}

impl StompCodec {
    pub fn new() -> Self {
        Self {}
    }
}

impl Decoder for StompCodec {
    type Item = StompItem;
    type Error = io::Error;

    /// Decode the next item from `src`.
    ///
    /// Returns `Ok(None)` and leaves `src` untouched when the buffered
    /// bytes do not yet hold a complete item.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match src.chunk() {
            [b'\n', ..] => {
                src.advance(1);
                return Ok(Some(StompItem::Heartbeat));
            }
            [b'\r', b'\n', ..] => {
                src.advance(2);
                return Ok(Some(StompItem::Heartbeat));
            }
            _ => {}
        }

        match parse_frame(src.chunk()) {
            Ok(Some((frame, consumed))) => {
                src.advance(consumed);
                Ok(Some(StompItem::Frame(frame)))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("parse error: {}", e),
            )),
        }
    }
}

impl Encoder<StompItem> for StompCodec {
    type Error = io::Error;

    fn encode(&mut self, item: StompItem, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            StompItem::Heartbeat => {
                dst.put_u8(b'\n');
            }
            StompItem::Frame(frame) => {
                dst.extend_from_slice(frame.command.as_bytes());
                dst.put_u8(b'\n');

                let escaped = escapes_headers(&frame.command);
                let mut headers = frame.headers;
                let has_cl = headers
                    .iter()
                    .any(|(k, _)| k.eq_ignore_ascii_case("content-length"));
                if !has_cl && frame.body.contains('\0') {
                    headers.push(("content-length".to_string(), frame.body.len().to_string()));
                }

                for (k, v) in headers {
                    if escaped {
                        dst.extend_from_slice(escape_header_value(&k).as_bytes());
                        dst.put_u8(b':');
                        dst.extend_from_slice(escape_header_value(&v).as_bytes());
                    } else {
                        dst.extend_from_slice(k.as_bytes());
                        dst.put_u8(b':');
                        dst.extend_from_slice(v.as_bytes());
                    }
                    dst.put_u8(b'\n');
                }

                dst.put_u8(b'\n');
                dst.extend_from_slice(frame.body.as_bytes());
                dst.put_u8(0);
            }
        }

        Ok(())
    }
}

/// Encode one item into the text form sent inside a SockJS message.
pub fn encode_text(item: StompItem) -> io::Result<String> {
    let mut buf = BytesMut::new();
    StompCodec::new().encode(item, &mut buf)?;
    String::from_utf8(buf.to_vec()).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Decoder state for a stream of SockJS text messages.
///
/// A single STOMP frame may be split across messages, and one message may
/// hold several frames, so bytes are buffered between calls.
#[derive(Debug, Default)]
pub struct TextDecoder {
    codec: StompCodec,
    buf: BytesMut,
}

impl TextDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one message and drain every complete item it finishes.
    pub fn feed(&mut self, text: &str) -> io::Result<Vec<StompItem>> {
        self.buf.extend_from_slice(text.as_bytes());
        let mut items = Vec::new();
        while let Some(item) = self.codec.decode(&mut self.buf)? {
            items.push(item);
        }
        Ok(items)
    }

    /// Bytes held back waiting for the rest of a frame.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}
