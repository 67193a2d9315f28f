#![allow(dead_code)]

use async_trait::async_trait;
use configuration::{ExchangeCredentials, TradeWsSettings};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use trade_client::{
    Connection, Connector, NotificationSink, TradeClient, TradeWsError, TransportEvent,
};

/// The exchange's end of one in-memory socket.
pub struct ServerSocket {
    frames: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl ServerSocket {
    /// The next frame the client wrote, as JSON.
    pub async fn next_frame(&mut self) -> Value {
        let text = self.frames.recv().await.expect("client closed the socket");
        serde_json::from_str(&text).expect("client wrote invalid JSON")
    }

    /// A frame the client already wrote, without waiting.
    pub fn try_next_frame(&mut self) -> Option<Value> {
        self.frames
            .try_recv()
            .ok()
            .map(|text| serde_json::from_str(&text).expect("client wrote invalid JSON"))
    }

    pub fn push(&self, frame: Value) {
        self.push_text(frame.to_string());
    }

    pub fn push_text(&self, text: impl Into<String>) {
        let _ = self.events.send(TransportEvent::Message(text.into()));
    }

    pub fn error(&self, message: &str) {
        let _ = self.events.send(TransportEvent::Error(message.to_string()));
    }

    pub fn close(&self) {
        let _ = self.events.send(TransportEvent::Closed);
    }

    pub fn ack_auth(&self) {
        self.push(json!({
            "op": "auth",
            "success": true,
            "retCode": 0,
            "retMsg": "OK",
            "connId": "conn-1"
        }));
    }

    /// Answers an `order.create` frame with an accepted order.
    pub fn accept_order(&self, req_id: &str, order_id: &str) {
        self.push(json!({
            "reqId": req_id,
            "retCode": 0,
            "retMsg": "OK",
            "op": "order.create",
            "data": { "orderId": order_id, "orderLinkId": "" },
            "header": { "X-Bapi-Limit": "10" },
            "connId": "conn-1"
        }));
    }
}

/// An in-memory `Connector`. Every successful dial hands the server end to the test.
pub struct MockConnector {
    sockets: mpsc::UnboundedSender<ServerSocket>,
    failures: AtomicU32,
    stalls: AtomicU32,
    dials: Mutex<Vec<Instant>>,
}

impl MockConnector {
    /// Makes the next `count` dials fail.
    pub fn fail_next(&self, count: u32) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Makes the next `count` dials hang forever.
    pub fn stall_next(&self, count: u32) {
        self.stalls.store(count, Ordering::SeqCst);
    }

    /// When each dial happened, in order.
    pub fn dials(&self) -> Vec<Instant> {
        self.dials.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _url: &str) -> Result<Connection, TradeWsError> {
        self.dials.lock().unwrap().push(Instant::now());

        let stalled = self
            .stalls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if stalled {
            return std::future::pending().await;
        }

        let refused = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(TradeWsError::Transport("connection refused".to_string()));
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let _ = self.sockets.send(ServerSocket {
            frames: outbound_rx,
            events: events_tx,
        });
        Ok(Connection::new(outbound_tx, events_rx))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Info(String),
    Error(String, TradeWsError),
}

/// A `NotificationSink` that records everything it is told.
pub struct RecordingSink {
    tx: mpsc::UnboundedSender<Notification>,
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, text: &str) {
        let _ = self.tx.send(Notification::Info(text.to_string()));
    }

    async fn notify_error(&self, text: &str, error: &TradeWsError) {
        let _ = self.tx.send(Notification::Error(text.to_string(), error.clone()));
    }
}

pub struct Harness {
    pub client: TradeClient,
    pub connector: Arc<MockConnector>,
    sockets: mpsc::UnboundedReceiver<ServerSocket>,
    notifications: mpsc::UnboundedReceiver<Notification>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(TradeWsSettings::default())
    }

    pub fn with_settings(settings: TradeWsSettings) -> Self {
        let (sockets_tx, sockets) = mpsc::unbounded_channel();
        let (notify_tx, notifications) = mpsc::unbounded_channel();
        let connector = Arc::new(MockConnector {
            sockets: sockets_tx,
            failures: AtomicU32::new(0),
            stalls: AtomicU32::new(0),
            dials: Mutex::new(Vec::new()),
        });
        let client = TradeClient::with_connector(
            &ExchangeCredentials::new("test-key", "test-secret"),
            &settings,
            connector.clone(),
            Some(Arc::new(RecordingSink { tx: notify_tx })),
        );
        Self {
            client,
            connector,
            sockets,
            notifications,
        }
    }

    /// Waits for the client to open its next socket.
    pub async fn accept(&mut self) -> ServerSocket {
        self.sockets.recv().await.expect("connector dropped")
    }

    /// Runs `connect()` against a fresh socket and acknowledges the auth frame.
    pub async fn authenticate(&mut self) -> ServerSocket {
        let client = self.client.clone();
        let connecting = tokio::spawn(async move { client.connect().await });
        let mut socket = self.accept().await;
        let auth = socket.next_frame().await;
        assert_eq!(auth["op"], "auth");
        socket.ack_auth();
        connecting.await.unwrap().expect("connect should succeed");
        socket
    }

    /// Acknowledges the auth frame of an automatic reconnect.
    pub async fn accept_reconnect(&mut self) -> ServerSocket {
        let mut socket = self.accept().await;
        let auth = socket.next_frame().await;
        assert_eq!(auth["op"], "auth");
        socket.ack_auth();
        socket
    }

    pub async fn next_notification(&mut self) -> Notification {
        self.notifications
            .recv()
            .await
            .expect("notification sink dropped")
    }

    /// Skips notifications until one matches.
    pub async fn wait_for_notification(&mut self, matches: impl Fn(&Notification) -> bool) -> Notification {
        loop {
            let notification = self
                .notifications
                .recv()
                .await
                .expect("notification sink dropped");
            if matches(&notification) {
                return notification;
            }
        }
    }
}

/// Asserts a paused-clock delay, allowing for the timer wheel's millisecond rounding.
pub fn assert_delay(actual: Duration, expected: Duration) {
    assert!(
        actual >= expected && actual < expected + Duration::from_millis(50),
        "expected a delay of {expected:?}, got {actual:?}"
    );
}
