use crate::enums::{Category, OrderSide, OrderType, TimeInForce, TriggerDirection};
use crate::error::CoreError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An already-priced order, ready to be placed on the trade channel.
///
/// Quantities and prices are produced upstream; this type only carries them.
/// Serializes to the `order.create` argument object, with decimals as strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub qty: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_in_force: Option<TimeInForce>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reduce_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_direction: Option<TriggerDirection>,
}

impl OrderRequest {
    /// A linear market order with immediate-or-cancel semantics.
    pub fn market(symbol: impl Into<String>, side: OrderSide, qty: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type: OrderType::Market,
            qty,
            price: None,
            category: Category::Linear,
            time_in_force: Some(TimeInForce::default_for(OrderType::Market)),
            reduce_only: None,
            trigger_price: None,
            trigger_direction: None,
        }
    }

    /// A linear good-till-cancelled limit order.
    pub fn limit(symbol: impl Into<String>, side: OrderSide, qty: Decimal, price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type: OrderType::Limit,
            qty,
            price: Some(price),
            category: Category::Linear,
            time_in_force: Some(TimeInForce::default_for(OrderType::Limit)),
            reduce_only: None,
            trigger_price: None,
            trigger_direction: None,
        }
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn with_time_in_force(mut self, time_in_force: TimeInForce) -> Self {
        self.time_in_force = Some(time_in_force);
        self
    }

    /// Marks the order as only allowed to shrink an existing position.
    pub fn reduce_only(mut self) -> Self {
        self.reduce_only = Some(true);
        self
    }

    /// Turns the order into a conditional order.
    pub fn with_trigger(mut self, trigger_price: Decimal, direction: TriggerDirection) -> Self {
        self.trigger_price = Some(trigger_price);
        self.trigger_direction = Some(direction);
        self
    }

    /// Rejects payloads the exchange would refuse anyway.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.symbol.trim().is_empty() {
            return Err(CoreError::InvalidInput("symbol".to_string(), "empty".to_string()));
        }
        if self.qty <= Decimal::ZERO {
            return Err(CoreError::InvalidInput("qty".to_string(), self.qty.to_string()));
        }
        match (self.order_type, self.price) {
            (OrderType::Limit, None) => Err(CoreError::MissingField("price")),
            (_, Some(price)) if price <= Decimal::ZERO => {
                Err(CoreError::InvalidInput("price".to_string(), price.to_string()))
            }
            _ => Ok(()),
        }
    }
}

/// The exchange's answer to a single order submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResult {
    pub request_id: String,
    pub ret_code: i64,
    pub ret_msg: String,
    /// Remote order identifier, present when the order was accepted.
    pub order_id: Option<String>,
    pub data: Value,
}

impl OrderResult {
    pub fn is_success(&self) -> bool {
        self.ret_code == 0 && self.order_id.is_some()
    }

    /// Human-readable rejection text in the form `<retCode>: <retMsg>`.
    pub fn error_text(&self) -> Option<String> {
        if self.is_success() {
            return None;
        }
        let message = if self.ret_msg.is_empty() { "Unknown error" } else { &self.ret_msg };
        Some(format!("{}: {}", self.ret_code, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn market_order_serializes_to_exchange_shape() {
        let order = OrderRequest::market("BTCUSDT", OrderSide::Buy, dec!(0.010)).reduce_only();
        let value = serde_json::to_value(&order).unwrap();
        assert_eq!(
            value,
            json!({
                "symbol": "BTCUSDT",
                "side": "Buy",
                "orderType": "Market",
                "qty": "0.010",
                "category": "linear",
                "timeInForce": "IOC",
                "reduceOnly": true,
            })
        );
    }

    #[test]
    fn limit_order_carries_price_and_gtc() {
        let order = OrderRequest::limit("ETHUSDT", OrderSide::Sell, dec!(1), dec!(2500.5));
        let value = serde_json::to_value(&order).unwrap();
        assert_eq!(value["price"], json!("2500.5"));
        assert_eq!(value["timeInForce"], json!("GTC"));
        assert!(value.get("reduceOnly").is_none());
    }

    #[test]
    fn trigger_direction_is_numeric_on_the_wire() {
        let order = OrderRequest::market("BTCUSDT", OrderSide::Sell, dec!(1))
            .with_trigger(dec!(60000), TriggerDirection::Falling);
        let value = serde_json::to_value(&order).unwrap();
        assert_eq!(value["triggerDirection"], json!(2));
        assert_eq!(value["triggerPrice"], json!("60000"));
    }

    #[test]
    fn validate_rejects_limit_without_price_and_non_positive_qty() {
        let mut order = OrderRequest::limit("BTCUSDT", OrderSide::Buy, dec!(1), dec!(100));
        order.price = None;
        assert_eq!(order.validate(), Err(CoreError::MissingField("price")));

        let order = OrderRequest::market("BTCUSDT", OrderSide::Buy, Decimal::ZERO);
        assert!(order.validate().is_err());

        let order = OrderRequest::market("BTCUSDT", OrderSide::Buy, dec!(0.5));
        assert!(order.validate().is_ok());
    }

    #[test]
    fn error_text_uses_code_and_message() {
        let result = OrderResult {
            request_id: "req_1_1".to_string(),
            ret_code: 110007,
            ret_msg: "ab not enough for new order".to_string(),
            order_id: None,
            data: Value::Null,
        };
        assert!(!result.is_success());
        assert_eq!(result.error_text().unwrap(), "110007: ab not enough for new order");
    }

    #[test]
    fn side_parses_case_insensitively() {
        assert_eq!("BUY".parse::<OrderSide>().unwrap(), OrderSide::Buy);
        assert_eq!("short".parse::<OrderSide>().unwrap(), OrderSide::Sell);
        assert!("hold".parse::<OrderSide>().is_err());
    }
}
