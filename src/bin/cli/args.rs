use clap::Parser;

#[derive(Parser)]
#[command(name = "stomp")]
#[command(version)]
#[command(about = "Interactive STOMP-over-SockJS client")]
pub struct Cli {
    /// Server root (scheme, host and port)
    #[arg(long, default_value = "http://localhost:8080")]
    pub host: String,

    /// SockJS service path appended to the host
    #[arg(long, default_value = "/websocket")]
    pub service: String,

    /// Login header sent with CONNECT
    #[arg(short, long)]
    pub login: Option<String>,

    /// Passcode header sent with CONNECT
    #[arg(short, long)]
    pub passcode: Option<String>,

    /// Heartbeat settings (client-send,client-receive in ms)
    #[arg(long, default_value = "10000,10000")]
    pub heartbeat: String,

    /// Destinations to subscribe to (can be specified multiple times)
    #[arg(short, long)]
    pub subscribe: Vec<String>,

    /// Report connected only after the broker's CONNECTED frame
    #[arg(long)]
    pub wait_handshake: bool,
}
