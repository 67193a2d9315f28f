use crate::error::AlerterError;
use async_trait::async_trait;
use configuration::TelegramConfig;
use reqwest::Client;
use serde::Serialize;
use trade_client::{NotificationSink, TradeWsError};
pub mod error;

/// The JSON payload for the Telegram `sendMessage` endpoint.
#[derive(Debug, Serialize)]
struct SendMessagePayload<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

/// A client for sending messages to the Telegram Bot API.
pub struct TelegramAlerter {
    client: Client,
    base_url: String,
    token: String,
    chat_id: String,
}

impl TelegramAlerter {
    /// Creates a new `TelegramAlerter`.
    ///
    /// Returns `None` if the token or chat_id is missing from the configuration,
    /// allowing the system to gracefully disable alerting.
    pub fn new(config: &TelegramConfig) -> Option<Self> {
        if config.token.is_empty() || config.chat_id.is_empty() {
            tracing::warn!("Telegram alerter is not configured (missing token or chat_id).");
            return None;
        }
        Some(Self {
            client: Client::new(),
            base_url: "https://api.telegram.org".to_string(),
            token: config.token.clone(),
            chat_id: config.chat_id.clone(),
        })
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.base_url, self.token)
    }

    /// Sends a MarkdownV2 message to the configured Telegram chat.
    ///
    /// The text is sent as-is; use `escape_markdown` for anything that is not
    /// already formatted.
    pub async fn send_message(&self, message: &str) -> Result<(), AlerterError> {
        let payload = SendMessagePayload {
            chat_id: &self.chat_id,
            text: message,
            parse_mode: "MarkdownV2",
        };

        let response = self
            .client
            .post(self.send_message_url())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to decode error response".to_string());
            return Err(AlerterError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }

    async fn deliver(&self, text: &str) {
        match self.send_message(&escape_markdown(text)).await {
            Ok(()) => tracing::info!("{}", text),
            Err(e) => tracing::error!(error = ?e, message = text, "Failed to send Telegram message."),
        }
    }
}

#[async_trait]
impl NotificationSink for TelegramAlerter {
    async fn notify(&self, text: &str) {
        self.deliver(text).await;
    }

    async fn notify_error(&self, text: &str, error: &TradeWsError) {
        self.deliver(&format_error_message(text, error)).await;
    }
}

/// The body of an error alert: a fixed banner, the caller's context, then the error.
pub fn format_error_message(context: &str, error: &impl std::fmt::Display) -> String {
    format!("❌ APPLICATION ERROR:\n{context}\n\n{error}")
}

/// A helper function to escape characters that have special meaning in Telegram's MarkdownV2.
pub fn escape_markdown(text: &str) -> String {
    let special_chars = r"\_*[]()~`>#+-=|{}.!";
    special_chars
        .chars()
        .fold(text.to_string(), |s, c| s.replace(c, &format!("\\{}", c)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    /// Collects formatted log output for inspection.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn lines(&self) -> Vec<String> {
            let bytes = self.0.lock().unwrap().clone();
            String::from_utf8(bytes)
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    fn config(token: &str, chat_id: &str) -> TelegramConfig {
        TelegramConfig {
            token: token.to_string(),
            chat_id: chat_id.to_string(),
        }
    }

    #[test]
    fn missing_credentials_disable_the_alerter() {
        assert!(TelegramAlerter::new(&config("", "42")).is_none());
        assert!(TelegramAlerter::new(&config("token", "")).is_none());
        assert!(TelegramAlerter::new(&config("token", "42")).is_some());
    }

    #[test]
    fn url_embeds_the_bot_token() {
        let alerter = TelegramAlerter::new(&config("123:abc", "42")).unwrap();
        assert_eq!(
            alerter.send_message_url(),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }

    #[test]
    fn error_message_layout() {
        let text = format_error_message("Order placement failed", &TradeWsError::OrderTimeout);
        assert_eq!(
            text,
            "❌ APPLICATION ERROR:\nOrder placement failed\n\nOrder creation timed out"
        );
    }

    #[test]
    fn escapes_markdown_v2_specials() {
        assert_eq!(escape_markdown("a_b*c"), "a\\_b\\*c");
        assert_eq!(escape_markdown("(attempt 1/5)..."), "\\(attempt 1/5\\)\\.\\.\\.");
        assert_eq!(escape_markdown("back\\slash"), "back\\\\slash");
        assert_eq!(escape_markdown("plain text"), "plain text");
    }

    #[tokio::test]
    async fn delivery_failures_are_swallowed() {
        let mut alerter = TelegramAlerter::new(&config("token", "42")).unwrap();
        // Nothing listens on port 9, so the request fails fast.
        alerter.base_url = "http://127.0.0.1:9".to_string();
        alerter.notify("hello").await;
        alerter
            .notify_error("context", &TradeWsError::ConnectionLost)
            .await;
    }

    #[tokio::test]
    async fn failed_error_alert_is_logged_once() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut alerter = TelegramAlerter::new(&config("token", "42")).unwrap();
        alerter.base_url = "http://127.0.0.1:9".to_string();
        alerter
            .notify_error("Reconnect gave up", &TradeWsError::ConnectionLost)
            .await;

        let errors: Vec<String> = logs
            .lines()
            .into_iter()
            .filter(|line| line.contains("ERROR"))
            .collect();
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert!(errors[0].contains("Failed to send Telegram message."));
    }
}
