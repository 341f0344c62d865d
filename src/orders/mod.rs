//! Order queue model.

mod types;

use chrono::NaiveDate;
use rand::Rng;

pub use types::{NewOrder, Order, OrderStatus, Priority};

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Mint an order id: `o` followed by four random base-36 characters.
pub fn new_order_id() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..4)
        .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("o{}", suffix)
}

/// Build a pending order from a submission.
pub fn create_order(request: NewOrder, created_at: NaiveDate) -> Order {
    Order {
        id: new_order_id(),
        customer: request.customer.trim().to_string(),
        details: request.details.trim().to_string(),
        status: OrderStatus::Pending,
        priority: request.priority,
        created_at,
    }
}

/// Newest first; same-day orders by id so the order is stable.
pub fn sort_newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
}

/// The two example jobs written alongside the seed catalog.
pub fn sample_orders() -> Vec<Order> {
    vec![
        Order {
            id: "o1".to_string(),
            customer: "Juan".to_string(),
            details: "2 Mates rojos".to_string(),
            status: OrderStatus::Pending,
            priority: Priority::Medium,
            created_at: NaiveDate::from_ymd_opt(2024, 5, 15).unwrap_or_default(),
        },
        Order {
            id: "o2".to_string(),
            customer: "Empresa X".to_string(),
            details: "50 Llaveros logo".to_string(),
            status: OrderStatus::Printing,
            priority: Priority::High,
            created_at: NaiveDate::from_ymd_opt(2024, 5, 16).unwrap_or_default(),
        },
    ]
}
