//! Client for Bybit's private trade WebSocket (`/v5/trade`).
//!
//! A `TradeClient` keeps one authenticated session open: it signs the `auth`
//! frame, pings while authenticated, matches `order.create` responses to the
//! futures waiting on them, and reconnects with capped exponential backoff when
//! the socket drops.
use async_trait::async_trait;
use core_types::{OrderRequest, OrderResult};

pub mod auth;
mod client;
mod correlator;
pub mod error;
mod handshake;
mod keepalive;
pub mod notifier;
pub mod reconnect;
pub mod requests;
pub mod responses;
mod router;
mod session;
pub mod transport;

// --- Public API ---
pub use client::TradeClient;
pub use error::TradeWsError;
pub use notifier::{LogNotifier, NotificationSink};
pub use responses::InboundFrame;
pub use session::ConnectionState;
pub use transport::{Connection, Connector, TransportEvent, TungsteniteConnector};

/// The order-placement surface a trading component depends on.
///
/// `TradeClient` is the live implementation; anything else that can place
/// orders (a paper broker, a test double) can stand in for it.
#[async_trait]
pub trait TradeChannel: Send + Sync {
    /// Connects and authenticates.
    async fn connect(&self) -> Result<(), TradeWsError>;

    /// Places an order and waits for the exchange's answer.
    async fn submit_order(&self, order: OrderRequest) -> Result<OrderResult, TradeWsError>;

    /// Closes the session without scheduling a reconnect.
    async fn disconnect(&self);

    fn is_connected(&self) -> bool;
}
