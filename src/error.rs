use thiserror::Error;

use crate::orders::OrderStatus;
use crate::pricing::PricingError;

#[derive(Debug, Error)]
pub enum DeskError {
    #[error("Store error: {0}")]
    Store(String),

    #[error("Keychain error: {0}")]
    Keychain(String),

    #[error("Stock item not found: {0}")]
    StockNotFound(String),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Invalid material: {0}")]
    InvalidMaterial(String),

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Invalid price for {field}: {value}")]
    InvalidPrice { field: &'static str, value: f64 },

    #[error("Order {id} cannot move from '{from}' to '{to}'")]
    InvalidTransition {
        id: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error(transparent)]
    Pricing(#[from] PricingError),
}

impl From<DeskError> for String {
    fn from(err: DeskError) -> Self {
        err.to_string()
    }
}

pub type DeskResult<T> = Result<T, DeskError>;
