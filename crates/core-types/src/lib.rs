//! Order payloads and outcomes shared by the trade client, the alerter and the CLI.
pub mod enums;
pub mod error;
pub mod structs;

pub use enums::{Category, OrderSide, OrderType, TimeInForce, TriggerDirection};
pub use error::CoreError;
pub use structs::{OrderRequest, OrderResult};
