use serde::Serialize;
use serde_json::Value;

use crate::frame::Frame;

/// Body handed to [`crate::StompClient::send`].
///
/// Text goes on the wire unchanged; anything else is JSON-encoded first.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Already-serialized text
    Text(String),
    /// A JSON value, encoded compactly
    Json(Value),
}

impl Payload {
    /// Capture any serializable value as JSON.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Payload::Json)
    }

    /// Text that will be sent as the frame body.
    pub fn into_body(self) -> String {
        match self {
            Payload::Text(text) => text,
            Payload::Json(value) => value.to_string(),
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

/// What a subscription does with an inbound MESSAGE.
#[derive(Debug)]
pub enum Inbound {
    /// Non-empty body that parsed as JSON
    Parsed(Value),
    /// Empty body: the raw frame goes to the error path
    Empty(Frame),
    /// Non-empty body that is not JSON
    Malformed(serde_json::Error, Frame),
}

/// Sort an inbound frame into the path it should take.
pub fn classify(frame: Frame) -> Inbound {
    if !frame.has_body() {
        return Inbound::Empty(frame);
    }
    match serde_json::from_str(&frame.body) {
        Ok(value) => Inbound::Parsed(value),
        Err(e) => Inbound::Malformed(e, frame),
    }
}
