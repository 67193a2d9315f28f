use crate::error::TradeWsError;
use crate::requests::{OP_AUTH, OP_ORDER_CREATE, OP_PONG, TOPIC_ORDER};
use core_types::OrderResult;
use serde_json::Value;

/// A frame received on the trade channel, classified by what it answers.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Reply to our `auth` request.
    AuthAck { success: bool, code: i64, message: String },
    /// Reply to our `ping`.
    Heartbeat,
    /// Reply to an `order.create` request, or an order-topic push.
    OrderResponse(OrderResponseFrame),
    /// Anything else, passed through untouched.
    Generic(Value),
}

/// The parts of an order reply the client needs to settle a pending request.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderResponseFrame {
    pub request_id: Option<String>,
    pub code: i64,
    pub message: String,
    pub data: Value,
    pub raw: Value,
}

impl OrderResponseFrame {
    /// The exchange's order id, present on accepted orders.
    pub fn order_id(&self) -> Option<String> {
        match self.data.get("orderId") {
            Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
            Some(Value::Number(id)) => Some(id.to_string()),
            _ => None,
        }
    }

    pub fn into_result(self, request_id: String) -> OrderResult {
        let order_id = self.order_id();
        OrderResult {
            request_id,
            ret_code: self.code,
            ret_msg: self.message,
            order_id,
            data: self.data,
        }
    }
}

impl InboundFrame {
    /// Parses and classifies a text frame.
    ///
    /// Classification order: `op == "auth"`, then `op == "pong"`, then an order
    /// discriminator (`op == "order.create"` or `topic == "order"`), then `Generic`.
    /// Only text that is not JSON at all is an error.
    pub fn parse(text: &str) -> Result<Self, TradeWsError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| TradeWsError::MalformedFrame(e.to_string()))?;

        let op = value.get("op").and_then(Value::as_str);
        let topic = value.get("topic").and_then(Value::as_str);

        if op == Some(OP_AUTH) {
            let code = ret_code(&value);
            let message = ret_msg(&value);
            let success = value.get("success").and_then(Value::as_bool).unwrap_or(false)
                || code == Some(0)
                || message == "OK";
            return Ok(InboundFrame::AuthAck {
                success,
                code: code.unwrap_or(-1),
                message,
            });
        }

        if op == Some(OP_PONG) {
            return Ok(InboundFrame::Heartbeat);
        }

        if op == Some(OP_ORDER_CREATE) || topic == Some(TOPIC_ORDER) {
            let request_id = value
                .get("reqId")
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
                .map(str::to_string);
            return Ok(InboundFrame::OrderResponse(OrderResponseFrame {
                request_id,
                code: ret_code(&value).unwrap_or(-1),
                message: ret_msg(&value),
                data: value.get("data").cloned().unwrap_or(Value::Null),
                raw: value,
            }));
        }

        Ok(InboundFrame::Generic(value))
    }
}

fn ret_code(value: &Value) -> Option<i64> {
    value
        .get("retCode")
        .or_else(|| value.get("ret_code"))
        .and_then(|code| match code {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        })
}

fn ret_msg(value: &Value) -> String {
    value
        .get("retMsg")
        .or_else(|| value.get("ret_msg"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
