//! Unit tests for heartbeat parsing and negotiation.

use sockjs_stomp::{negotiate_heartbeats, parse_heartbeat_header};
use std::time::Duration;

// =============================================================================
// parse_heartbeat_header tests
// =============================================================================

#[test]
fn parse_standard_heartbeat() {
    assert_eq!(parse_heartbeat_header("10000,10000"), (10000, 10000));
}

#[test]
fn parse_asymmetric_heartbeat() {
    assert_eq!(parse_heartbeat_header("5000,15000"), (5000, 15000));
}

#[test]
fn parse_whitespace_padded() {
    assert_eq!(parse_heartbeat_header(" 10000 , 10000 "), (10000, 10000));
}

#[test]
fn parse_missing_second_value() {
    assert_eq!(parse_heartbeat_header("10000"), (10000, 0));
}

#[test]
fn parse_empty_string() {
    assert_eq!(parse_heartbeat_header(""), (0, 0));
}

#[test]
fn parse_invalid_values_default_to_zero() {
    assert_eq!(parse_heartbeat_header("abc,10000"), (0, 10000));
    assert_eq!(parse_heartbeat_header("-5,7"), (0, 7));
}

#[test]
fn parse_extra_fields_ignored() {
    assert_eq!(parse_heartbeat_header("1,2,3"), (1, 2));
}

// =============================================================================
// negotiate_heartbeats tests
// =============================================================================

#[test]
fn negotiate_both_zero_disables() {
    assert_eq!(negotiate_heartbeats(0, 0, 0, 0), (None, None));
}

#[test]
fn negotiate_takes_larger_value() {
    // client can send every 10s, server wants one every 20s
    let (out, inc) = negotiate_heartbeats(10000, 5000, 15000, 20000);
    assert_eq!(out, Some(Duration::from_millis(20000)));
    assert_eq!(inc, Some(Duration::from_millis(15000)));
}

#[test]
fn negotiate_zero_on_either_side_disables_direction() {
    // server does not want client heartbeats, and sends none itself
    let (out, inc) = negotiate_heartbeats(10000, 10000, 0, 0);
    assert!(out.is_none());
    assert!(inc.is_none());

    // client sends none, server sends every 5s
    let (out, inc) = negotiate_heartbeats(0, 1000, 5000, 8000);
    assert!(out.is_none());
    assert_eq!(inc, Some(Duration::from_millis(5000)));
}
