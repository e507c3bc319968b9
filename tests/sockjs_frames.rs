//! Unit tests for SockJS framing and websocket URL derivation.

use sockjs_stomp::ConnError;
use sockjs_stomp::sockjs::{SockJsFrame, encode_messages, websocket_url_with};

// =============================================================================
// Frame parsing
// =============================================================================

#[test]
fn parse_open_and_heartbeat() {
    assert_eq!(SockJsFrame::parse("o").unwrap(), SockJsFrame::Open);
    assert_eq!(SockJsFrame::parse("h").unwrap(), SockJsFrame::Heartbeat);
}

#[test]
fn parse_message_array() {
    let frame = SockJsFrame::parse(r#"a["CONNECTED\nversion:1.2\n\n\u0000","\n"]"#).unwrap();
    assert_eq!(
        frame,
        SockJsFrame::Messages(vec![
            "CONNECTED\nversion:1.2\n\n\0".to_string(),
            "\n".to_string()
        ])
    );
}

#[test]
fn parse_single_message() {
    assert_eq!(
        SockJsFrame::parse(r#"m"hello""#).unwrap(),
        SockJsFrame::Messages(vec!["hello".to_string()])
    );
}

#[test]
fn parse_close() {
    assert_eq!(
        SockJsFrame::parse(r#"c[3000,"Go away!"]"#).unwrap(),
        SockJsFrame::Close {
            code: 3000,
            reason: "Go away!".to_string()
        }
    );
}

#[test]
fn parse_rejects_unknown_and_empty() {
    assert!(matches!(SockJsFrame::parse("x[]"), Err(ConnError::SockJs(_))));
    assert!(matches!(SockJsFrame::parse(""), Err(ConnError::SockJs(_))));
}

#[test]
fn parse_rejects_bad_json() {
    assert!(matches!(SockJsFrame::parse("a[oops"), Err(ConnError::Json(_))));
}

#[test]
fn encode_wraps_in_json_array() {
    let encoded = encode_messages(&["SEND\ndestination:/q\n\nhi\0".to_string()]).unwrap();
    assert_eq!(encoded, r#"["SEND\ndestination:/q\n\nhi\u0000"]"#);
}

// =============================================================================
// URL derivation
// =============================================================================

#[test]
fn http_becomes_ws() {
    let url = websocket_url_with("http://localhost:8080/websocket", 7, "abcdefgh").unwrap();
    assert_eq!(url, "ws://localhost:8080/websocket/007/abcdefgh/websocket");
}

#[test]
fn https_becomes_wss_and_trailing_slash_is_dropped() {
    let url = websocket_url_with("https://example.com/stomp/", 123, "s1s2s3s4").unwrap();
    assert_eq!(url, "wss://example.com/stomp/123/s1s2s3s4/websocket");
}

#[test]
fn query_string_stays_at_the_end() {
    let url = websocket_url_with("http://h/ws?t=1", 123, "abcdefgh").unwrap();
    assert_eq!(url, "ws://h/ws/123/abcdefgh/websocket?t=1");
    let url = websocket_url_with("https://h/ws/?a=b&c=d", 5, "abcdefgh").unwrap();
    assert_eq!(url, "wss://h/ws/005/abcdefgh/websocket?a=b&c=d");
}

#[test]
fn unsupported_scheme_is_rejected() {
    assert!(websocket_url_with("ftp://h/ws", 0, "x").is_err());
    assert!(websocket_url_with("no-scheme", 0, "x").is_err());
}
