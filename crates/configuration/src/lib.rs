use crate::error::ConfigError;
use crate::settings::Settings;
use std::env;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use logging::init_tracing;
pub use settings::{
    ExchangeCredentials, LoggingConfig, MAINNET_TRADE_WS_URL, TESTNET_TRADE_WS_URL, TelegramConfig,
    TradeEndpoint, TradeWsSettings,
};

/// Environment variables that override values from `config.toml`.
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("bybit.api_key", "BYBIT_API_KEY"),
    ("bybit.secret", "BYBIT_SECRET"),
    ("trade_ws.testnet", "BYBIT_TESTNET"),
    ("trade_ws.url", "BYBIT_TRADE_WS_URL"),
    ("telegram.token", "TELEGRAM_BOT_TOKEN"),
    ("telegram.chat_id", "TELEGRAM_CHAT_ID"),
    ("logging.directory", "LOG_DIR"),
];

/// Loads the application configuration.
///
/// Reads the optional `config.toml` from the working directory, then applies the
/// environment overrides listed in `ENV_OVERRIDES`. Every section has defaults, so
/// an empty environment still yields a usable (if unauthenticated) `Settings`.
pub fn load_config() -> Result<Settings, ConfigError> {
    let mut builder = config::Config::builder()
        // Tells the builder to look for a file named `config.toml`
        .add_source(config::File::with_name("config").required(false));

    for (key, var) in ENV_OVERRIDES {
        builder = builder.set_override_option(*key, env::var(var).ok())?;
    }

    let settings = builder.build()?.try_deserialize::<Settings>()?;
    Ok(settings)
}

impl Settings {
    /// Checks that the settings are enough to open an authenticated session.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.bybit.has_valid_credentials() {
            return Err(ConfigError::ValidationError {
                field: "bybit",
                reason: "BYBIT_API_KEY and BYBIT_SECRET must both be set".to_string(),
            });
        }
        if self.trade_ws.max_reconnect_attempts == 0 {
            return Err(ConfigError::ValidationError {
                field: "trade_ws.max_reconnect_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.trade_ws.ping_interval_secs == 0 {
            return Err(ConfigError::ValidationError {
                field: "trade_ws.ping_interval_secs",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}
