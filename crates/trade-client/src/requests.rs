use crate::auth::sign_realtime_auth;
use core_types::OrderRequest;
use serde::Serialize;

pub const OP_AUTH: &str = "auth";
pub const OP_PING: &str = "ping";
pub const OP_PONG: &str = "pong";
pub const OP_ORDER_CREATE: &str = "order.create";
pub const TOPIC_ORDER: &str = "order";

/// `{"op":"auth","args":[apiKey, expires, signature]}`
#[derive(Debug, Clone, Serialize)]
pub struct AuthRequest {
    op: &'static str,
    args: (String, i64, String),
}

impl AuthRequest {
    /// Builds the auth frame, signing `expires` with the account secret.
    pub fn signed(api_key: &str, secret: &str, expires: i64) -> Self {
        let signature = sign_realtime_auth(secret, expires);
        Self {
            op: OP_AUTH,
            args: (api_key.to_string(), expires, signature),
        }
    }
}

/// Timing headers the exchange uses to reject stale requests.
#[derive(Debug, Clone, Serialize)]
pub struct RequestHeader {
    #[serde(rename = "X-BAPI-TIMESTAMP")]
    pub timestamp: String,
    #[serde(rename = "X-BAPI-RECV-WINDOW")]
    pub recv_window: String,
}

/// `{"reqId", "header", "op":"order.create", "args":[order]}`
#[derive(Debug, Clone, Serialize)]
pub struct OrderCreateRequest {
    #[serde(rename = "reqId")]
    pub req_id: String,
    pub header: RequestHeader,
    op: &'static str,
    args: [OrderRequest; 1],
}

impl OrderCreateRequest {
    pub fn new(req_id: String, timestamp_ms: i64, recv_window_ms: u64, order: OrderRequest) -> Self {
        Self {
            req_id,
            header: RequestHeader {
                timestamp: timestamp_ms.to_string(),
                recv_window: recv_window_ms.to_string(),
            },
            op: OP_ORDER_CREATE,
            args: [order],
        }
    }
}

/// `{"op":"ping"}`
#[derive(Debug, Clone, Serialize)]
pub struct PingRequest {
    op: &'static str,
}

impl Default for PingRequest {
    fn default() -> Self {
        Self { op: OP_PING }
    }
}

/// Any frame the client writes to the trade channel.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OutboundFrame {
    Auth(AuthRequest),
    OrderCreate(OrderCreateRequest),
    Ping(PingRequest),
}

impl OutboundFrame {
    pub fn op(&self) -> &'static str {
        match self {
            OutboundFrame::Auth(_) => OP_AUTH,
            OutboundFrame::OrderCreate(_) => OP_ORDER_CREATE,
            OutboundFrame::Ping(_) => OP_PING,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, OutboundFrame::Auth(_))
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::OrderSide;
    use rust_decimal_macros::dec;
    use serde_json::{Value, json};

    #[test]
    fn auth_frame_has_key_expiry_and_signature() {
        let frame = OutboundFrame::Auth(AuthRequest::signed("test-api-key", "test-secret", 1_000));
        let value: Value = serde_json::from_str(&frame.to_text().unwrap()).unwrap();

        assert_eq!(value["op"], "auth");
        assert_eq!(value["args"][0], "test-api-key");
        assert_eq!(value["args"][1], 1_000);
        assert_eq!(value["args"][2], sign_realtime_auth("test-secret", 1_000));
    }

    #[test]
    fn auth_frame_differs_when_any_input_differs() {
        let text = |key: &str, secret: &str, expires: i64| {
            OutboundFrame::Auth(AuthRequest::signed(key, secret, expires)).to_text().unwrap()
        };
        let base = text("key", "secret", 1_000);
        assert_eq!(base, text("key", "secret", 1_000));
        assert_ne!(base, text("other", "secret", 1_000));
        assert_ne!(base, text("key", "other", 1_000));
        assert_ne!(base, text("key", "secret", 1_001));
    }

    #[test]
    fn order_frame_carries_header_and_payload() {
        let order = OrderRequest::market("BTCUSDT", OrderSide::Buy, dec!(0.01));
        let frame = OutboundFrame::OrderCreate(OrderCreateRequest::new(
            "req_1_1700000000000".to_string(),
            1_700_000_000_000,
            5_000,
            order,
        ));
        let value: Value = serde_json::from_str(&frame.to_text().unwrap()).unwrap();

        assert_eq!(value["reqId"], "req_1_1700000000000");
        assert_eq!(value["op"], "order.create");
        assert_eq!(
            value["header"],
            json!({"X-BAPI-TIMESTAMP": "1700000000000", "X-BAPI-RECV-WINDOW": "5000"})
        );
        assert_eq!(value["args"][0]["symbol"], "BTCUSDT");
        assert_eq!(value["args"][0]["qty"], "0.01");
    }

    #[test]
    fn ping_frame_is_minimal() {
        let frame = OutboundFrame::Ping(PingRequest::default());
        assert_eq!(frame.to_text().unwrap(), r#"{"op":"ping"}"#);
    }
}
