//! Unit tests for outbound payload encoding and inbound body classification.

use serde::Serialize;
use serde_json::json;
use sockjs_stomp::Frame;
use sockjs_stomp::Payload;
use sockjs_stomp::payload::{Inbound, classify};

#[test]
fn text_payload_is_untouched() {
    assert_eq!(Payload::from("{\"a\":1}").into_body(), "{\"a\":1}");
    assert_eq!(Payload::from(String::from("  spaced ")).into_body(), "  spaced ");
}

#[test]
fn json_payload_is_compact() {
    let body = Payload::from(json!({"list": [1, 2], "nested": {"k": "v"}})).into_body();
    assert_eq!(body, "{\"list\":[1,2],\"nested\":{\"k\":\"v\"}}");
}

#[test]
fn json_string_value_is_quoted() {
    // a JSON string is not text: it gets encoded like any other value
    assert_eq!(Payload::from(json!("hi")).into_body(), "\"hi\"");
}

#[derive(Serialize)]
struct Reading {
    sensor: &'static str,
    value: f64,
}

#[test]
fn serializable_struct_keeps_field_order() {
    let payload = Payload::json(&Reading {
        sensor: "t1",
        value: 21.5,
    })
    .unwrap();
    assert_eq!(payload.into_body(), "{\"sensor\":\"t1\",\"value\":21.5}");
}

#[test]
fn classify_parses_non_empty_body() {
    let frame = Frame::new("MESSAGE").set_body("{\"a\":1}");
    match classify(frame) {
        Inbound::Parsed(v) => assert_eq!(v, json!({"a": 1})),
        other => panic!("expected parsed body, got {other:?}"),
    }
}

#[test]
fn classify_hands_back_empty_frame() {
    let frame = Frame::new("MESSAGE").header("message-id", "7");
    match classify(frame.clone()) {
        Inbound::Empty(raw) => assert_eq!(raw, frame),
        other => panic!("expected empty, got {other:?}"),
    }
}

#[test]
fn classify_flags_malformed_json() {
    let frame = Frame::new("MESSAGE").set_body("not json");
    assert!(matches!(classify(frame), Inbound::Malformed(_, f) if f.body == "not json"));
}
