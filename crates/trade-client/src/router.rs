use crate::responses::InboundFrame;
use serde_json::Value;
use tokio::sync::broadcast;

const GENERIC_CHANNEL_CAPACITY: usize = 1024;

/// Turns raw socket text into classified frames and fans out the ones nobody
/// inside the client owns.
pub struct MessageRouter {
    generic_tx: broadcast::Sender<Value>,
}

impl MessageRouter {
    pub fn new() -> Self {
        let (generic_tx, _) = broadcast::channel(GENERIC_CHANNEL_CAPACITY);
        Self { generic_tx }
    }

    /// Parses a text frame. Malformed input is logged and dropped.
    pub fn classify(&self, text: &str) -> Option<InboundFrame> {
        match InboundFrame::parse(text) {
            Ok(frame) => {
                tracing::debug!(?frame, "Trade channel frame received.");
                Some(frame)
            }
            Err(e) => {
                tracing::warn!(error = %e, raw = text, "Dropping unparseable trade channel frame.");
                None
            }
        }
    }

    /// Hands a frame to external observers. Having no observers is not an error.
    pub fn publish(&self, frame: Value) {
        if self.generic_tx.send(frame).is_err() {
            tracing::trace!("No subscribers for generic trade channel frame.");
        }
    }

    pub fn sender(&self) -> broadcast::Sender<Value> {
        self.generic_tx.clone()
    }
}

impl Default for MessageRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn malformed_text_is_dropped() {
        let router = MessageRouter::new();
        assert!(router.classify("{oops").is_none());
        assert_eq!(router.classify(r#"{"op":"pong"}"#), Some(InboundFrame::Heartbeat));
    }

    #[tokio::test]
    async fn published_frames_reach_subscribers() {
        let router = MessageRouter::new();
        let mut rx = router.sender().subscribe();

        router.publish(json!({"topic": "execution"}));

        assert_eq!(rx.recv().await.unwrap(), json!({"topic": "execution"}));
    }

    #[test]
    fn publish_without_subscribers_is_a_no_op() {
        MessageRouter::new().publish(json!({"topic": "execution"}));
    }
}
