//! Minimal STOMP-over-SockJS session adapter.
//!
//! [`StompClient`] offers connect / send / subscribe / disconnect with JSON
//! payloads. The protocol work happens in [`stomp::StompSession`] over a
//! [`transport::Transport`], by default the SockJS websocket leg.

pub mod client;
pub mod codec;
pub mod frame;
pub mod parser;
pub mod payload;
pub mod protocol;
pub mod sockjs;
pub mod stomp;
pub mod transport;

pub use client::{ClientConfig, ClientError, ConnectedWhen, StompClient};
pub use codec::{StompCodec, StompItem};
pub use frame::{Frame, Headers};
pub use payload::Payload;
pub use protocol::{ClientFactory, ProtocolClient, SubscriptionId};
pub use sockjs::SockJsTransport;
pub use stomp::{
    ConnError, SockJsFactory, StompFactory, StompOptions, StompSession, negotiate_heartbeats,
    parse_heartbeat_header,
};
pub use transport::{MemoryTransport, Transport};
