use crate::error::CoreError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl FromStr for OrderSide {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "buy" | "long" => Ok(OrderSide::Buy),
            "sell" | "short" => Ok(OrderSide::Sell),
            other => Err(CoreError::InvalidInput("side".to_string(), other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
}

/// How long an order stays working on the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    #[serde(rename = "GTC")]
    Gtc,
    #[serde(rename = "IOC")]
    Ioc,
    #[serde(rename = "FOK")]
    Fok,
    PostOnly,
}

impl TimeInForce {
    /// The time-in-force used when the caller does not pick one.
    ///
    /// Market orders fill immediately or not at all, limit orders rest until cancelled.
    pub fn default_for(order_type: OrderType) -> Self {
        match order_type {
            OrderType::Market => TimeInForce::Ioc,
            OrderType::Limit => TimeInForce::Gtc,
        }
    }
}

/// Product line an order is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Linear,
    Spot,
    Option,
    Inverse,
}

impl FromStr for Category {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linear" => Ok(Category::Linear),
            "spot" => Ok(Category::Spot),
            "option" => Ok(Category::Option),
            "inverse" => Ok(Category::Inverse),
            other => Err(CoreError::InvalidInput("category".to_string(), other.to_string())),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Linear => "linear",
            Category::Spot => "spot",
            Category::Option => "option",
            Category::Inverse => "inverse",
        };
        f.write_str(name)
    }
}

/// Direction the market must move through `triggerPrice` for a conditional order.
///
/// Encoded on the wire as `1` (rising) or `2` (falling).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerDirection {
    Rising,
    Falling,
}

impl Serialize for TriggerDirection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let code = match self {
            TriggerDirection::Rising => 1,
            TriggerDirection::Falling => 2,
        };
        serializer.serialize_u8(code)
    }
}

impl<'de> Deserialize<'de> for TriggerDirection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match u8::deserialize(deserializer)? {
            1 => Ok(TriggerDirection::Rising),
            2 => Ok(TriggerDirection::Falling),
            other => Err(serde::de::Error::custom(format!(
                "invalid trigger direction {other}, expected 1 or 2"
            ))),
        }
    }
}
