use serde::Deserialize;
use std::time::Duration;

/// Production endpoint of the private trade channel.
pub const MAINNET_TRADE_WS_URL: &str = "wss://stream.bybit.com/v5/trade";
/// Testnet endpoint of the private trade channel.
pub const TESTNET_TRADE_WS_URL: &str = "wss://stream-testnet.bybit.com/v5/trade";

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub bybit: ExchangeCredentials,
    #[serde(default)]
    pub trade_ws: TradeWsSettings,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// API key pair for the exchange account.
#[derive(Clone, Default, Deserialize)]
pub struct ExchangeCredentials {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub secret: String,
}

impl ExchangeCredentials {
    pub fn new(api_key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret: secret.into(),
        }
    }

    pub fn has_valid_credentials(&self) -> bool {
        !self.api_key.is_empty() && !self.secret.is_empty()
    }
}

// Keeps the secret out of logs.
impl std::fmt::Debug for ExchangeCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let masked: String = self.api_key.chars().take(4).collect();
        f.debug_struct("ExchangeCredentials")
            .field("api_key", &format!("{masked}..."))
            .field("secret", &"***")
            .finish()
    }
}

/// Which trade-channel endpoint to dial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeEndpoint {
    Mainnet,
    Testnet,
}

impl TradeEndpoint {
    pub fn url(&self) -> &'static str {
        match self {
            TradeEndpoint::Mainnet => MAINNET_TRADE_WS_URL,
            TradeEndpoint::Testnet => TESTNET_TRADE_WS_URL,
        }
    }
}

/// Session, timeout and reconnection parameters for the trade channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TradeWsSettings {
    /// Dial the testnet endpoint instead of production.
    pub testnet: bool,
    /// Explicit endpoint, overrides `testnet` when set.
    pub url: Option<String>,
    /// Tolerance in milliseconds the exchange applies to request timestamps.
    pub recv_window_ms: u64,
    /// Upper bound on opening the socket, TCP and TLS included.
    pub connect_timeout_secs: u64,
    pub auth_timeout_secs: u64,
    /// How far in the future the signed auth expiry is placed.
    pub auth_expiry_lookahead_ms: u64,
    pub order_timeout_secs: u64,
    pub ping_interval_secs: u64,
    pub reconnect_base_delay_ms: u64,
    pub reconnect_max_delay_ms: u64,
    pub max_reconnect_attempts: u32,
}

impl Default for TradeWsSettings {
    fn default() -> Self {
        Self {
            testnet: false,
            url: None,
            recv_window_ms: 5_000,
            connect_timeout_secs: 10,
            auth_timeout_secs: 10,
            auth_expiry_lookahead_ms: 10_000,
            order_timeout_secs: 30,
            ping_interval_secs: 20,
            reconnect_base_delay_ms: 1_000,
            reconnect_max_delay_ms: 16_000,
            max_reconnect_attempts: 5,
        }
    }
}

impl TradeWsSettings {
    pub fn endpoint(&self) -> TradeEndpoint {
        if self.testnet {
            TradeEndpoint::Testnet
        } else {
            TradeEndpoint::Mainnet
        }
    }

    /// The URL the client dials.
    pub fn endpoint_url(&self) -> String {
        match &self.url {
            Some(url) if !url.is_empty() => url.clone(),
            _ => self.endpoint().url().to_string(),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }

    pub fn auth_expiry_lookahead(&self) -> Duration {
        Duration::from_millis(self.auth_expiry_lookahead_ms)
    }

    pub fn order_timeout(&self) -> Duration {
        Duration::from_secs(self.order_timeout_secs)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn reconnect_base_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_delay_ms)
    }

    pub fn reconnect_max_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_delay_ms)
    }
}

/// Telegram bot used for lifecycle notifications.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub chat_id: String,
}

/// Log output settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive, `RUST_LOG` takes precedence.
    pub filter: String,
    /// When set, logs are also written to a daily rolling file in this directory.
    pub directory: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            directory: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_exchange_session_rules() {
        let settings = TradeWsSettings::default();
        assert_eq!(settings.connect_timeout(), Duration::from_secs(10));
        assert_eq!(settings.auth_timeout(), Duration::from_secs(10));
        assert_eq!(settings.order_timeout(), Duration::from_secs(30));
        assert_eq!(settings.ping_interval(), Duration::from_secs(20));
        assert_eq!(settings.reconnect_base_delay(), Duration::from_secs(1));
        assert_eq!(settings.max_reconnect_attempts, 5);
        assert_eq!(settings.endpoint_url(), MAINNET_TRADE_WS_URL);
    }

    #[test]
    fn url_override_wins_over_testnet_flag() {
        let mut settings = TradeWsSettings {
            testnet: true,
            ..TradeWsSettings::default()
        };
        assert_eq!(settings.endpoint_url(), TESTNET_TRADE_WS_URL);

        settings.url = Some("ws://127.0.0.1:9000".to_string());
        assert_eq!(settings.endpoint_url(), "ws://127.0.0.1:9000");
    }

    #[test]
    fn credentials_debug_hides_secret() {
        let credentials = ExchangeCredentials::new("abcdefgh", "topsecret");
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("abcd..."));
        assert!(!rendered.contains("topsecret"));
        assert!(credentials.has_valid_credentials());
        assert!(!ExchangeCredentials::default().has_valid_credentials());
    }
}
