use thiserror::Error;

/// Every way a trade-channel operation can fail.
///
/// Errors are `Clone` so a single failure can be delivered to every waiter it affects.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TradeWsError {
    #[error("Authentication timed out waiting for the exchange acknowledgement")]
    AuthTimeout,

    #[error("Authentication failed: {message} (code: {code})")]
    AuthFailed { code: i64, message: String },

    #[error("Trade channel is not connected")]
    NotConnected,

    #[error("Order creation timed out")]
    OrderTimeout,

    #[error("Connection to the trade channel was lost")]
    ConnectionLost,

    #[error("Maximum reconnection attempts ({0}) exceeded")]
    MaxReconnectAttemptsExceeded(u32),

    #[error("Malformed frame from the trade channel: {0}")]
    MalformedFrame(String),

    #[error("WebSocket transport error: {0}")]
    Transport(String),

    #[error("Failed to serialize frame: {0}")]
    Serialization(String),

    #[error("Invalid order: {0}")]
    InvalidOrder(#[from] core_types::CoreError),

    #[error("The trade client session task has stopped")]
    ClientClosed,
}

impl From<serde_json::Error> for TradeWsError {
    fn from(e: serde_json::Error) -> Self {
        TradeWsError::Serialization(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TradeWsError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        TradeWsError::Transport(e.to_string())
    }
}
