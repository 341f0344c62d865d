//! Persistence boundary: a document store keyed by entity id, split into
//! the `stock`, `orders` and `settings` collections.
//!
//! Writes are upserts with merge semantics. After every committed write the
//! store pushes the full, current contents of the touched collection to all
//! subscribers, so mirrors never have to apply deltas.

mod sqlite;

use tokio::sync::broadcast;

use crate::error::DeskResult;
use crate::orders::Order;
use crate::pricing::PriceSettings;
use crate::stock::StockItem;

pub use sqlite::SqliteStore;

pub const STOCK_COLLECTION: &str = "stock";
pub const ORDERS_COLLECTION: &str = "orders";
pub const SETTINGS_COLLECTION: &str = "settings";
/// Id of the single settings document.
pub const PRICES_DOCUMENT: &str = "prices";

/// Snapshot pushed to subscribers after a write.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Stock(Vec<StockItem>),
    Orders(Vec<Order>),
    Settings(PriceSettings),
}

/// What the rest of the crate needs from a document store.
///
/// Implementations are blocking; async callers go through
/// `tokio::task::spawn_blocking`.
pub trait DocumentStore: Send + Sync {
    fn load_stock(&self) -> DeskResult<Vec<StockItem>>;

    fn load_orders(&self) -> DeskResult<Vec<Order>>;

    /// The settings document, if one has been written.
    fn load_settings(&self) -> DeskResult<Option<PriceSettings>>;

    /// Upsert many stock items in one transaction.
    fn upsert_stock(&self, items: &[StockItem]) -> DeskResult<()>;

    /// Remove a catalog entry. Returns whether it existed.
    fn delete_stock(&self, id: &str) -> DeskResult<bool>;

    fn upsert_order(&self, order: &Order) -> DeskResult<()>;

    fn save_settings(&self, settings: &PriceSettings) -> DeskResult<()>;

    /// Write the seed catalog and sample orders when the stock collection is
    /// empty. Returns whether anything was written.
    fn seed_if_empty(&self) -> DeskResult<bool>;

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}
