use thiserror::Error;

/// Rejections raised while parsing or checking order data, before anything is sent.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Invalid input for {0}: {1}")]
    InvalidInput(String, String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}
