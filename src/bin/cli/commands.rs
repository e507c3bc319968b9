use serde_json::Value;
use sockjs_stomp::{ConnError, Frame, Payload, SockJsFactory, StompClient, SubscriptionId};
use tokio::sync::mpsc;

pub type Client = StompClient<SockJsFactory>;

/// Things the session callbacks report back to the command loop.
pub enum Event {
    Connected(Frame),
    Error(ConnError),
    Message { destination: String, body: Value },
    Invalid { destination: String, frame: Frame },
    Disconnected,
}

pub type EventSender = mpsc::UnboundedSender<Event>;

/// Result of executing a command
pub enum CommandResult {
    /// Command executed successfully
    Ok,
    /// Command produced output for the user
    Info(String),
    /// Command requests exit
    Quit,
    /// Error executing command
    Error(String),
}

/// Parse and execute a command
pub fn execute_command(line: &str, client: &Client, events: &EventSender) -> CommandResult {
    let parts: Vec<&str> = line.trim().splitn(3, ' ').collect();
    if parts.is_empty() || parts[0].is_empty() {
        return CommandResult::Ok;
    }

    match parts[0] {
        "quit" | "exit" | "q" => CommandResult::Quit,

        "send" => {
            if parts.len() < 3 {
                return CommandResult::Error("Usage: send <destination> <text|json>".to_string());
            }
            match client.send(parts[1], payload(parts[2])) {
                Ok(()) => CommandResult::Ok,
                Err(e) => CommandResult::Error(format!("Send error: {}", e)),
            }
        }

        "sub" | "subscribe" => {
            if parts.len() < 2 {
                return CommandResult::Error("Usage: sub <destination>".to_string());
            }
            match subscribe(client, parts[1], events) {
                Ok(id) => CommandResult::Info(format!("Subscribed to {} as {}", parts[1], id)),
                Err(e) => CommandResult::Error(e),
            }
        }

        "unsub" | "unsubscribe" => {
            if parts.len() < 2 {
                return CommandResult::Error("Usage: unsub <id>".to_string());
            }
            match client.unsubscribe(&SubscriptionId::new(parts[1])) {
                Ok(()) => CommandResult::Info(format!("Unsubscribed {}", parts[1])),
                Err(e) => CommandResult::Error(format!("Unsubscribe error: {}", e)),
            }
        }

        "status" => {
            let state = if client.is_connected() {
                "connected"
            } else {
                "not connected"
            };
            CommandResult::Info(format!("{} ({})", client.config().url(), state))
        }

        "help" | "?" => {
            print_help();
            CommandResult::Ok
        }

        _ => CommandResult::Error(format!(
            "Unknown command: {}. Type 'help' for commands.",
            parts[0]
        )),
    }
}

/// Subscribe `destination`, routing its messages into `events`.
pub fn subscribe(
    client: &Client,
    destination: &str,
    events: &EventSender,
) -> Result<SubscriptionId, String> {
    let on_message = {
        let events = events.clone();
        let destination = destination.to_string();
        move |body: Value| {
            let _ = events.send(Event::Message {
                destination: destination.clone(),
                body,
            });
        }
    };
    let on_invalid = {
        let events = events.clone();
        let destination = destination.to_string();
        move |frame: Frame| {
            let _ = events.send(Event::Invalid {
                destination: destination.clone(),
                frame,
            });
        }
    };
    client
        .subscribe_with_error(destination, on_message, on_invalid)
        .map_err(|e| format!("Failed to subscribe to '{}': {}", destination, e))
}

/// Text that parses as JSON is sent as a value, anything else verbatim.
fn payload(text: &str) -> Payload {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => Payload::Json(value),
        Err(_) => Payload::Text(text.to_string()),
    }
}

/// Print help text
pub fn print_help() {
    println!("Commands:");
    println!("  send <destination> <text|json>  - Send a message");
    println!("  sub <destination>               - Subscribe to a destination");
    println!("  unsub <id>                      - Drop a subscription");
    println!("  status                          - Show connection state");
    println!("  quit                            - Disconnect and exit");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_looking_text_is_sent_as_value() {
        assert_eq!(payload("{\"a\": 1}").into_body(), "{\"a\":1}");
        assert_eq!(payload("hello world"), Payload::Text("hello world".into()));
    }
}
