use sockjs_stomp::{
    ClientConfig, ConnError, ConnectedWhen, Frame, SockJsFactory, SockJsTransport, StompClient,
    StompOptions,
};
use std::io::{self, BufRead, Write};
use tokio::sync::mpsc;

use super::args::Cli;
use super::commands::{CommandResult, Event, execute_command, print_help, subscribe};
use super::exit_codes;

/// Run the interactive client
pub async fn run(cli: &Cli) -> Result<(), (String, u8)> {
    let mut config = ClientConfig::new(&cli.host, &cli.service);
    if let Some(login) = &cli.login {
        config = config.header("login", login);
    }
    if let Some(passcode) = &cli.passcode {
        config = config.header("passcode", passcode);
    }
    if cli.wait_handshake {
        config = config.connected_when(ConnectedWhen::Handshake);
    }
    let url = config.url();
    let options = StompOptions::default().with_heartbeat(&cli.heartbeat);
    let mut client = StompClient::with_factory(config, SockJsFactory::new(SockJsTransport, options));

    println!("Connecting to {}...", url);

    let (events_tx, mut events) = mpsc::unbounded_channel::<Event>();
    let on_connect = {
        let events = events_tx.clone();
        move |frame: Frame| {
            let _ = events.send(Event::Connected(frame));
        }
    };
    let on_error = {
        let events = events_tx.clone();
        move |e: ConnError| {
            let _ = events.send(Event::Error(e));
        }
    };
    client.connect(on_connect, on_error);

    match events.recv().await {
        Some(Event::Connected(frame)) => {
            let version = frame.get_header("version").unwrap_or("?");
            println!("Connected (STOMP {}).", version);
        }
        Some(Event::Error(e)) => return Err(format_connection_error(&e, &url)),
        _ => {
            return Err((
                "Connection closed during handshake".to_string(),
                exit_codes::PROTOCOL_ERROR,
            ));
        }
    }

    for dest in &cli.subscribe {
        let id = subscribe(&client, dest, &events_tx).map_err(|e| (e, exit_codes::PROTOCOL_ERROR))?;
        println!("Subscribed to {} as {}", dest, id);
    }

    // Channel to receive user commands from stdin reader
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<String>(16);

    // Spawn blocking stdin reader
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(l) => {
                    if cmd_tx.blocking_send(l).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    println!();
    print_help();
    println!();
    prompt();

    loop {
        tokio::select! {
            line = cmd_rx.recv() => {
                let Some(line) = line else { break };
                match execute_command(&line, &client, &events_tx) {
                    CommandResult::Ok => {}
                    CommandResult::Info(msg) => println!("{}", msg),
                    CommandResult::Error(msg) => eprintln!("{}", msg),
                    CommandResult::Quit => break,
                }
                prompt();
            }
            event = events.recv() => {
                match event {
                    Some(Event::Message { destination, body }) => {
                        println!("\n[{}] {}", destination, body);
                    }
                    Some(Event::Invalid { destination, frame }) => {
                        println!("\n[{}] MESSAGE without body:", destination);
                        for (k, v) in &frame.headers {
                            println!("  {}: {}", k, v);
                        }
                    }
                    Some(Event::Error(e)) => {
                        if let ConnError::Broker { frame, .. } = &e {
                            eprintln!("\n[BROKER ERROR] {}", e);
                            for (k, v) in &frame.headers {
                                eprintln!("  {}: {}", k, v);
                            }
                        } else {
                            return Err(format_connection_error(&e, &url));
                        }
                    }
                    Some(Event::Connected(_)) | Some(Event::Disconnected) | None => {}
                }
                prompt();
            }
        }
    }

    println!("Disconnecting...");
    let done = events_tx.clone();
    client.disconnect(move || {
        let _ = done.send(Event::Disconnected);
    });
    while let Some(event) = events.recv().await {
        if matches!(event, Event::Disconnected) {
            break;
        }
    }
    Ok(())
}

fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

/// Format a session error with user-friendly messaging
fn format_connection_error(err: &ConnError, url: &str) -> (String, u8) {
    match err {
        ConnError::Io(io_err) => {
            let message = match io_err.kind() {
                io::ErrorKind::ConnectionRefused => format!("Connection refused: {}", url),
                io::ErrorKind::TimedOut => format!("Connection timed out: {}", url),
                _ => format!("Connection failed: {}", io_err),
            };
            (message, exit_codes::NETWORK_ERROR)
        }
        ConnError::WebSocket(e) => (
            format!("WebSocket error: {}", e),
            exit_codes::NETWORK_ERROR,
        ),
        ConnError::Closed { code, reason } => (
            format!("Connection closed ({}): {}", code, reason),
            exit_codes::NETWORK_ERROR,
        ),
        ConnError::Broker { message, frame } => {
            let mut message = format!("Broker rejected session: {}", message);
            if frame.has_body() {
                message.push_str(&format!(" ({})", frame.body.trim()));
            }
            (message, exit_codes::PROTOCOL_ERROR)
        }
        ConnError::Json(_) | ConnError::SockJs(_) | ConnError::Protocol(_) => (
            format!("Protocol error: {}", err),
            exit_codes::PROTOCOL_ERROR,
        ),
    }
}
