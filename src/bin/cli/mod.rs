pub mod args;
pub mod commands;
pub mod plain;

/// Exit codes for different error conditions
pub mod exit_codes {
    /// Successful execution
    pub const SUCCESS: u8 = 0;
    /// Network/connection error (e.g., host unreachable, socket lost)
    pub const NETWORK_ERROR: u8 = 1;
    /// Protocol error (e.g., broker ERROR frame, bad SockJS framing)
    pub const PROTOCOL_ERROR: u8 = 3;
}
