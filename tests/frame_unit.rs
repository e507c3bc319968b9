//! Unit tests for the Frame struct.

use sockjs_stomp::Frame;

#[test]
fn frame_new_creates_empty() {
    let frame = Frame::new("SEND");
    assert_eq!(frame.command, "SEND");
    assert!(frame.headers.is_empty());
    assert!(!frame.has_body());
}

#[test]
fn frame_header_builder_preserves_order() {
    let frame = Frame::new("SEND")
        .header("z-header", "z")
        .header("a-header", "a")
        .with_headers(vec![("m-header".to_string(), "m".to_string())]);
    let keys: Vec<&str> = frame.headers.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, ["z-header", "a-header", "m-header"]);
}

#[test]
fn get_header_returns_first_occurrence() {
    let frame = Frame::new("MESSAGE")
        .header("destination", "/topic/first")
        .header("destination", "/topic/second");
    assert_eq!(frame.get_header("destination"), Some("/topic/first"));
    assert_eq!(frame.get_header("Destination"), None);
}

#[test]
fn set_body_accepts_str_and_string() {
    assert_eq!(Frame::new("SEND").set_body("hi").body, "hi");
    assert_eq!(Frame::new("SEND").set_body(String::from("yo")).body, "yo");
    assert!(Frame::new("SEND").set_body("x").has_body());
}

#[test]
fn display_lists_headers_and_body_size() {
    let frame = Frame::new("MESSAGE")
        .header("subscription", "sub-0")
        .set_body("{\"a\":1}");
    let shown = frame.to_string();
    assert!(shown.starts_with("Command: MESSAGE\n"));
    assert!(shown.contains("subscription: sub-0"));
    assert!(shown.contains("Body (7 bytes)"));
}
