//! Connect to a SockJS STOMP endpoint, subscribe, publish one JSON
//! message and wait for it to come back.
//!
//! ```sh
//! cargo run --example quickstart -- http://localhost:8080 /websocket
//! ```

use serde_json::json;
use sockjs_stomp::StompClient;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "http://localhost:8080".to_string());
    let service = args.next().unwrap_or_else(|| "/websocket".to_string());

    let mut client = StompClient::new(host, service);
    let (connected_tx, connected_rx) = oneshot::channel();
    client.connect(
        move |frame| {
            let _ = connected_tx.send(frame);
        },
        |e| eprintln!("session error: {e}"),
    );
    let frame = connected_rx.await?;
    println!("connected: version {:?}", frame.get_header("version"));

    let (tx, mut rx) = mpsc::unbounded_channel();
    client.subscribe("/topic/greetings", move |value| {
        let _ = tx.send(value);
    })?;
    client.send_with("/app/hello", json!({ "name": "quickstart" }), || {
        println!("sent");
    })?;

    match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
        Ok(Some(value)) => println!("received: {value}"),
        _ => println!("nothing received within 5s"),
    }

    let (done_tx, done_rx) = oneshot::channel();
    client.disconnect(move || {
        let _ = done_tx.send(());
    });
    done_rx.await?;
    println!("disconnected");
    Ok(())
}
