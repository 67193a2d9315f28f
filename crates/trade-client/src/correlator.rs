use crate::error::TradeWsError;
use crate::session::SessionEvent;
use chrono::Utc;
use core_types::OrderResult;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;
use tokio::time::Instant;

pub type OrderReply = oneshot::Sender<Result<OrderResult, TradeWsError>>;

/// One order waiting for the exchange's answer.
struct PendingRequest {
    submitted_at: Instant,
    timeout: AbortHandle,
    reply: OrderReply,
}

impl PendingRequest {
    /// Settles the request. Consumes it, so it can only happen once.
    fn settle(self, outcome: Result<OrderResult, TradeWsError>) {
        self.timeout.abort();
        // The caller may have stopped waiting.
        let _ = self.reply.send(outcome);
    }
}

/// Matches order replies to the futures waiting for them.
///
/// Every registered request leaves the table exactly once, through `resolve`,
/// `expire`, or `drain`.
pub struct RequestCorrelator {
    sequence: u64,
    pending: HashMap<String, PendingRequest>,
}

impl RequestCorrelator {
    pub fn new() -> Self {
        Self {
            sequence: 1,
            pending: HashMap::new(),
        }
    }

    /// A request id of the form `req_<sequence>_<millis>`.
    ///
    /// The sequence is never reset, so ids stay unique across reconnects.
    pub fn next_request_id(&mut self) -> String {
        let sequence = self.sequence;
        self.sequence += 1;
        format!("req_{}_{}", sequence, Utc::now().timestamp_millis())
    }

    /// Tracks a sent order and arms its timeout.
    pub fn register(
        &mut self,
        request_id: String,
        reply: OrderReply,
        timeout: Duration,
        events: &mpsc::UnboundedSender<SessionEvent>,
    ) {
        let events = events.clone();
        let timer_id = request_id.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = events.send(SessionEvent::OrderTimeout { request_id: timer_id });
        });

        let previous = self.pending.insert(
            request_id,
            PendingRequest {
                submitted_at: Instant::now(),
                timeout: task.abort_handle(),
                reply,
            },
        );
        debug_assert!(previous.is_none(), "request id reused while pending");
    }

    /// Delivers a reply. Returns `false` when nothing was waiting for `request_id`.
    pub fn resolve(&mut self, request_id: &str, result: OrderResult) -> bool {
        match self.pending.remove(request_id) {
            Some(request) => {
                tracing::debug!(
                    request_id,
                    ret_code = result.ret_code,
                    elapsed_ms = request.submitted_at.elapsed().as_millis() as u64,
                    "Order response matched."
                );
                request.settle(Ok(result));
                true
            }
            None => false,
        }
    }

    /// Fails a request whose timeout fired. A no-op if it was already settled.
    pub fn expire(&mut self, request_id: &str) -> bool {
        match self.pending.remove(request_id) {
            Some(request) => {
                tracing::warn!(request_id, "Order creation timed out.");
                request.settle(Err(TradeWsError::OrderTimeout));
                true
            }
            None => false,
        }
    }

    /// Fails every outstanding request with `error`. Returns how many there were.
    pub fn drain(&mut self, error: TradeWsError) -> usize {
        let count = self.pending.len();
        for (request_id, request) in self.pending.drain() {
            tracing::debug!(request_id, error = %error, "Draining pending order.");
            request.settle(Err(error.clone()));
        }
        count
    }

    pub fn contains(&self, request_id: &str) -> bool {
        self.pending.contains_key(request_id)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Default for RequestCorrelator {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RequestCorrelator {
    fn drop(&mut self) {
        self.drain(TradeWsError::ClientClosed);
    }
}
