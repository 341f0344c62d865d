use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Production stage of an order. Variants are declared in workflow order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    #[serde(rename = "Pendiente")]
    Pending,
    #[serde(rename = "En Diseño")]
    InDesign,
    #[serde(rename = "Imprimiendo")]
    Printing,
    #[serde(rename = "Listo para entregar", alias = "Listo")]
    Ready,
    #[serde(rename = "Entregado")]
    Delivered,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::InDesign,
        OrderStatus::Printing,
        OrderStatus::Ready,
        OrderStatus::Delivered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pendiente",
            OrderStatus::InDesign => "En Diseño",
            OrderStatus::Printing => "Imprimiendo",
            OrderStatus::Ready => "Listo para entregar",
            OrderStatus::Delivered => "Entregado",
        }
    }

    /// Orders only move forward. Skipping stages is allowed; moving back is not.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        next >= *self
    }

    /// The stage after this one, if any.
    pub fn next(&self) -> Option<OrderStatus> {
        Self::ALL.iter().copied().find(|s| s > self)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Priority {
    #[serde(rename = "Alta")]
    High,
    #[default]
    #[serde(rename = "Media")]
    Medium,
    #[serde(rename = "Baja")]
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "Alta",
            Priority::Medium => "Media",
            Priority::Low => "Baja",
        }
    }

    /// Parse the Spanish labels used on the wire, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "alta" => Some(Priority::High),
            "media" => Some(Priority::Medium),
            "baja" => Some(Priority::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A customer job in the production queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub customer: String,
    pub details: String,
    pub status: OrderStatus,
    #[serde(default)]
    pub priority: Priority,
    pub created_at: NaiveDate,
}

/// Submission payload for a new order.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewOrder {
    pub customer: String,
    pub details: String,
    #[serde(default)]
    pub priority: Priority,
}
