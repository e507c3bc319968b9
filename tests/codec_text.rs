//! Unit tests for the STOMP codec on text payloads: heartbeats, header
//! escaping and frames split across SockJS messages.

use bytes::BytesMut;
use sockjs_stomp::Frame;
use sockjs_stomp::codec::{StompCodec, StompItem, TextDecoder, encode_text};
use tokio_util::codec::Decoder;

fn decode_one(raw: &[u8]) -> StompItem {
    let mut codec = StompCodec::new();
    let mut buf = BytesMut::from(raw);
    codec.decode(&mut buf).expect("decode failed").expect("no item")
}

fn decode_frame(raw: &[u8]) -> Frame {
    match decode_one(raw) {
        StompItem::Frame(frame) => frame,
        StompItem::Heartbeat => panic!("expected frame"),
    }
}

// =============================================================================
// Heartbeats
// =============================================================================

#[test]
fn decode_lf_and_crlf_as_heartbeat() {
    assert_eq!(decode_one(b"\n"), StompItem::Heartbeat);
    assert_eq!(decode_one(b"\r\n"), StompItem::Heartbeat);
}

#[test]
fn heartbeat_encodes_as_single_lf() {
    assert_eq!(encode_text(StompItem::Heartbeat).unwrap(), "\n");
}

// =============================================================================
// Header escaping
// =============================================================================

#[test]
fn unescape_all_sequences() {
    let frame = decode_frame(b"MESSAGE\nheader:a\\\\b\\nc\\rd\\ce\n\n\0");
    assert_eq!(frame.get_header("header"), Some("a\\b\nc\rd:e"));
}

#[test]
fn escape_on_encode() {
    let frame = Frame::new("SEND").header("k:ey", "line1\nline2");
    let text = encode_text(StompItem::Frame(frame)).unwrap();
    assert!(text.contains("k\\cey:line1\\nline2\n"));
}

#[test]
fn connect_headers_are_not_escaped() {
    let frame = Frame::new("CONNECT").header("passcode", "a:b");
    let text = encode_text(StompItem::Frame(frame)).unwrap();
    assert_eq!(text, "CONNECT\npasscode:a:b\n\n\0");
}

#[test]
fn invalid_escape_is_an_error() {
    let mut codec = StompCodec::new();
    let mut buf = BytesMut::from(&b"MESSAGE\nheader:bad\\t\n\n\0"[..]);
    assert!(codec.decode(&mut buf).is_err());
}

// =============================================================================
// Bodies
// =============================================================================

#[test]
fn content_length_added_only_for_embedded_nul() {
    let plain = encode_text(StompItem::Frame(Frame::new("SEND").set_body("hi"))).unwrap();
    assert!(!plain.contains("content-length"));

    let nul = encode_text(StompItem::Frame(Frame::new("SEND").set_body("a\0b"))).unwrap();
    assert!(nul.contains("content-length:3\n"));
    assert_eq!(decode_frame(nul.as_bytes()).body, "a\0b");
}

#[test]
fn encoded_frame_decodes_back() {
    let frame = Frame::new("MESSAGE")
        .header("destination", "/topic/x")
        .header("subscription", "sub-0")
        .set_body("{\"x\":1}");
    let text = encode_text(StompItem::Frame(frame.clone())).unwrap();
    assert_eq!(decode_frame(text.as_bytes()), frame);
}

// =============================================================================
// TextDecoder
// =============================================================================

#[test]
fn frame_split_across_messages() {
    let mut decoder = TextDecoder::new();
    assert!(decoder.feed("MESSAGE\nsubscription:sub-0\n").unwrap().is_empty());
    assert!(decoder.pending() > 0);
    let items = decoder.feed("\n{\"a\":1}\0").unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(decoder.pending(), 0);
}

#[test]
fn several_items_in_one_message() {
    let mut decoder = TextDecoder::new();
    let items = decoder
        .feed("\nRECEIPT\nreceipt-id:1\n\n\0MESSAGE\nsubscription:s\n\nx\0")
        .unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0], StompItem::Heartbeat);
    assert!(matches!(&items[1], StompItem::Frame(f) if f.command == "RECEIPT"));
    assert!(matches!(&items[2], StompItem::Frame(f) if f.body == "x"));
}

#[test]
fn malformed_header_line_is_an_error() {
    let mut decoder = TextDecoder::new();
    assert!(decoder.feed("MESSAGE\nno-colon-here\n\n\0").is_err());
}
