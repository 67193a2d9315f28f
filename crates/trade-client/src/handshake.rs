use crate::error::TradeWsError;
use crate::requests::{AuthRequest, OutboundFrame};
use crate::session::SessionEvent;
use chrono::Utc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;

pub type ConnectReply = oneshot::Sender<Result<(), TradeWsError>>;

/// The single authentication exchange of a connection, plus everyone waiting on it.
///
/// Callers of `connect()` park here from the moment a dial starts until the
/// exchange acknowledges (or refuses) the signed `auth` frame.
#[derive(Default)]
pub struct AuthHandshake {
    waiters: Vec<ConnectReply>,
    timeout: Option<AbortHandle>,
    in_flight: bool,
}

impl AuthHandshake {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_waiter(&mut self, reply: ConnectReply) {
        self.waiters.push(reply);
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Signs a fresh auth frame and arms the handshake timeout.
    ///
    /// `epoch` identifies the connection, so a timeout armed for an older socket
    /// is recognised as stale.
    pub fn begin(
        &mut self,
        api_key: &str,
        secret: &str,
        expiry_lookahead: Duration,
        timeout: Duration,
        epoch: u64,
        events: &mpsc::UnboundedSender<SessionEvent>,
    ) -> OutboundFrame {
        self.clear_timeout();
        self.in_flight = true;

        let expires = Utc::now().timestamp_millis() + expiry_lookahead.as_millis() as i64;
        let events = events.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = events.send(SessionEvent::HandshakeTimeout { epoch });
        });
        self.timeout = Some(task.abort_handle());

        tracing::debug!(expires, "Sending trade channel auth request.");
        OutboundFrame::Auth(AuthRequest::signed(api_key, secret, expires))
    }

    /// Settles the handshake from the exchange's acknowledgement.
    pub fn complete(&mut self, success: bool, code: i64, message: &str) -> Result<(), TradeWsError> {
        let outcome = if success {
            Ok(())
        } else {
            Err(TradeWsError::AuthFailed {
                code,
                message: message.to_string(),
            })
        };
        self.settle(outcome.clone());
        outcome
    }

    /// Rejects every waiter and abandons the exchange, if one is running.
    pub fn fail(&mut self, error: TradeWsError) {
        self.settle(Err(error));
    }

    fn settle(&mut self, outcome: Result<(), TradeWsError>) {
        self.clear_timeout();
        self.in_flight = false;
        for waiter in self.waiters.drain(..) {
            // The caller may have stopped waiting.
            let _ = waiter.send(outcome.clone());
        }
    }

    fn clear_timeout(&mut self) {
        if let Some(handle) = self.timeout.take() {
            handle.abort();
        }
    }
}

impl Drop for AuthHandshake {
    fn drop(&mut self) {
        self.clear_timeout();
    }
}
