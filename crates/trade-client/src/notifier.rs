use crate::error::TradeWsError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Receives human-readable lifecycle and error notifications from the session.
///
/// Implementations must not fail: delivery problems are theirs to log.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, text: &str);

    async fn notify_error(&self, text: &str, error: &TradeWsError);
}

/// A sink that only writes to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn notify(&self, text: &str) {
        tracing::info!("{}", text);
    }

    async fn notify_error(&self, text: &str, error: &TradeWsError) {
        tracing::error!(error = %error, "{}", text);
    }
}

/// A notification queued by the session.
pub(crate) enum Notice {
    Info(String),
    Error(String, TradeWsError),
}

/// Starts the task that feeds `sink`. Notices are delivered one at a time, in
/// queue order; the task ends when the returned sender is dropped.
pub(crate) fn spawn_delivery(sink: Arc<dyn NotificationSink>) -> mpsc::UnboundedSender<Notice> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(notice) = rx.recv().await {
            match notice {
                Notice::Info(text) => sink.notify(&text).await,
                Notice::Error(text, error) => sink.notify_error(&text, &error).await,
            }
        }
    });
    tx
}
