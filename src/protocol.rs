//! Collaborator contract the session adapter drives.
//!
//! Every method returns immediately; outcomes arrive through the boxed
//! callbacks, which run on whatever task the implementation owns.

use std::fmt;

use crate::frame::{Frame, Headers};
use crate::stomp::ConnError;

/// Called once with the CONNECTED frame.
pub type ConnectCallback = Box<dyn FnOnce(Frame) + Send>;
/// Called for a failed connect and for every error after it.
pub type ErrorCallback = Box<dyn FnMut(ConnError) + Send>;
/// Called once the session has shut down.
pub type DisconnectCallback = Box<dyn FnOnce() + Send>;
/// Called for each MESSAGE frame delivered to a subscription.
pub type MessageHandler = Box<dyn FnMut(Frame) + Send>;

/// Identifier of a subscription within one protocol session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A STOMP client bound to one socket.
pub trait ProtocolClient: Send + Sync {
    /// Start the handshake, sending `headers` with the CONNECT frame.
    fn connect(&self, headers: Headers, on_connect: ConnectCallback, on_error: ErrorCallback);

    /// Close the session; `on_disconnect` fires when it is done.
    fn disconnect(&self, on_disconnect: DisconnectCallback);

    /// Publish `body` to `destination`.
    fn send(&self, destination: &str, headers: Headers, body: String);

    /// Register `handler` for `destination` and return its id.
    fn subscribe(&self, destination: &str, handler: MessageHandler) -> SubscriptionId;

    /// Drop the subscription `id`.
    fn unsubscribe(&self, id: &SubscriptionId);
}

/// Builds a protocol client over a fresh socket for `url`.
pub trait ClientFactory: Send + Sync {
    fn create(&self, url: &str) -> Box<dyn ProtocolClient>;
}
