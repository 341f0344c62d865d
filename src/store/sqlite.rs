use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{info, warn};

use super::{
    DocumentStore, StoreEvent, ORDERS_COLLECTION, PRICES_DOCUMENT, SETTINGS_COLLECTION,
    STOCK_COLLECTION,
};
use crate::error::{DeskError, DeskResult};
use crate::orders::{sample_orders, sort_newest_first, Order};
use crate::pricing::PriceSettings;
use crate::stock::seed::initial_stock;
use crate::stock::StockItem;

const EVENT_CAPACITY: usize = 64;

/// SQLite-backed document store.
///
/// Every document is a JSON body in one `documents` table keyed by
/// `(collection, id)`. All operations are synchronous (rusqlite is blocking).
pub struct SqliteStore {
    conn: Mutex<Connection>,
    events: broadcast::Sender<StoreEvent>,
}

impl SqliteStore {
    /// Create or open the store at `db_path`, creating the parent directory.
    pub fn open(db_path: &Path) -> DeskResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| DeskError::Store(format!("Failed to create data dir: {}", e)))?;
        }

        let conn = Connection::open(db_path).map_err(|e| {
            DeskError::Store(format!("Failed to open store at {:?}: {}", db_path, e))
        })?;
        info!("Opened document store at {:?}", db_path);
        Self::with_connection(conn)
    }

    /// A private in-memory store, used by tests and dry runs.
    pub fn open_in_memory() -> DeskResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DeskError::Store(format!("Failed to open in-memory store: {}", e)))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> DeskResult<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                body TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            );",
        )
        .map_err(|e| DeskError::Store(format!("Failed to create documents table: {}", e)))?;

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            conn: Mutex::new(conn),
            events,
        })
    }

    fn conn(&self) -> DeskResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| DeskError::Store("Store connection lock poisoned".to_string()))
    }

    fn load_collection<T: DeserializeOwned>(
        conn: &Connection,
        collection: &str,
    ) -> DeskResult<Vec<T>> {
        let mut stmt = conn
            .prepare("SELECT id, body FROM documents WHERE collection = ?1 ORDER BY id")
            .map_err(|e| DeskError::Store(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![collection], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| DeskError::Store(format!("Failed to query {}: {}", collection, e)))?;

        let mut docs = Vec::new();
        for row in rows {
            let (id, body) =
                row.map_err(|e| DeskError::Store(format!("Failed to read row: {}", e)))?;
            match serde_json::from_str(&body) {
                Ok(doc) => docs.push(doc),
                Err(e) => warn!("Skipping malformed {} document '{}': {}", collection, id, e),
            }
        }
        Ok(docs)
    }

    fn publish(&self, event: StoreEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn publish_stock(&self, conn: &Connection) -> DeskResult<()> {
        let stock = Self::load_collection(conn, STOCK_COLLECTION)?;
        self.publish(StoreEvent::Stock(stock));
        Ok(())
    }

    fn publish_orders(&self, conn: &Connection) -> DeskResult<()> {
        let mut orders: Vec<Order> = Self::load_collection(conn, ORDERS_COLLECTION)?;
        sort_newest_first(&mut orders);
        self.publish(StoreEvent::Orders(orders));
        Ok(())
    }
}

/// Merge `patch` into `base`: objects merge key by key, anything else replaces.
fn merge_json(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                if let Some(existing) = base_map.get_mut(&key) {
                    if existing.is_object() && value.is_object() {
                        merge_json(existing, value);
                        continue;
                    }
                }
                base_map.insert(key, value);
            }
        }
        (base, patch) => *base = patch,
    }
}

/// Upsert one document with merge semantics.
fn upsert_document<T: Serialize>(
    conn: &Connection,
    collection: &str,
    id: &str,
    doc: &T,
) -> DeskResult<()> {
    let incoming = serde_json::to_value(doc)
        .map_err(|e| DeskError::Store(format!("Failed to serialize {} '{}': {}", collection, id, e)))?;

    let existing: Option<String> = conn
        .query_row(
            "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection, id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| DeskError::Store(format!("Failed to read {} '{}': {}", collection, id, e)))?;

    let merged = match existing.and_then(|body| serde_json::from_str::<Value>(&body).ok()) {
        Some(mut current) => {
            merge_json(&mut current, incoming);
            current
        }
        None => incoming,
    };

    conn.execute(
        "INSERT OR REPLACE INTO documents (collection, id, body, updated_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![collection, id, merged.to_string(), Utc::now().to_rfc3339()],
    )
    .map_err(|e| DeskError::Store(format!("Failed to write {} '{}': {}", collection, id, e)))?;
    Ok(())
}

impl DocumentStore for SqliteStore {
    fn load_stock(&self) -> DeskResult<Vec<StockItem>> {
        let conn = self.conn()?;
        Self::load_collection(&conn, STOCK_COLLECTION)
    }

    fn load_orders(&self) -> DeskResult<Vec<Order>> {
        let conn = self.conn()?;
        let mut orders: Vec<Order> = Self::load_collection(&conn, ORDERS_COLLECTION)?;
        sort_newest_first(&mut orders);
        Ok(orders)
    }

    fn load_settings(&self) -> DeskResult<Option<PriceSettings>> {
        let conn = self.conn()?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                params![SETTINGS_COLLECTION, PRICES_DOCUMENT],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| DeskError::Store(format!("Failed to read settings: {}", e)))?;

        match body {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| DeskError::Store(format!("Malformed settings document: {}", e))),
            None => Ok(None),
        }
    }

    fn upsert_stock(&self, items: &[StockItem]) -> DeskResult<()> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| DeskError::Store(format!("Failed to begin transaction: {}", e)))?;
        for item in items {
            upsert_document(&tx, STOCK_COLLECTION, &item.id, item)?;
        }
        tx.commit()
            .map_err(|e| DeskError::Store(format!("Failed to commit stock batch: {}", e)))?;

        info!("Wrote {} stock item(s)", items.len());
        self.publish_stock(&conn)
    }

    fn delete_stock(&self, id: &str) -> DeskResult<bool> {
        let conn = self.conn()?;
        let removed = conn
            .execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                params![STOCK_COLLECTION, id],
            )
            .map_err(|e| DeskError::Store(format!("Failed to delete stock '{}': {}", id, e)))?;

        if removed > 0 {
            info!("Deleted stock item {}", id);
            self.publish_stock(&conn)?;
        }
        Ok(removed > 0)
    }

    fn upsert_order(&self, order: &Order) -> DeskResult<()> {
        let conn = self.conn()?;
        upsert_document(&conn, ORDERS_COLLECTION, &order.id, order)?;
        info!("Wrote order {} ({})", order.id, order.status);
        self.publish_orders(&conn)
    }

    fn save_settings(&self, settings: &PriceSettings) -> DeskResult<()> {
        let conn = self.conn()?;
        upsert_document(&conn, SETTINGS_COLLECTION, PRICES_DOCUMENT, settings)?;
        info!("Saved price settings");
        self.publish(StoreEvent::Settings(*settings));
        Ok(())
    }

    fn seed_if_empty(&self) -> DeskResult<bool> {
        let mut conn = self.conn()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM documents WHERE collection = ?1",
                params![STOCK_COLLECTION],
                |row| row.get(0),
            )
            .map_err(|e| DeskError::Store(format!("Failed to count stock: {}", e)))?;
        if count > 0 {
            return Ok(false);
        }

        info!("Stock collection is empty, writing seed catalog");
        let tx = conn
            .transaction()
            .map_err(|e| DeskError::Store(format!("Failed to begin transaction: {}", e)))?;
        for item in initial_stock() {
            upsert_document(&tx, STOCK_COLLECTION, &item.id, &item)?;
        }
        for order in sample_orders() {
            upsert_document(&tx, ORDERS_COLLECTION, &order.id, &order)?;
        }
        tx.commit()
            .map_err(|e| DeskError::Store(format!("Failed to commit seed: {}", e)))?;

        self.publish_stock(&conn)?;
        self.publish_orders(&conn)?;
        Ok(true)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::OrderStatus;
    use crate::stock::FilamentType;
    use tempfile::TempDir;

    fn item(id: &str, color: &str, closed: u32) -> StockItem {
        StockItem {
            id: id.to_string(),
            color: color.to_string(),
            filament_type: FilamentType::Pla,
            closed_count: closed,
            open_count: 0,
            min_closed: None,
            hex_color: None,
        }
    }

    #[test]
    fn test_seed_runs_once() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.seed_if_empty().unwrap());
        assert!(!store.seed_if_empty().unwrap());

        let stock = store.load_stock().unwrap();
        assert_eq!(stock.len(), initial_stock().len());
        let orders = store.load_orders().unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].id, "o2");
    }

    #[test]
    fn test_upsert_merges_existing_fields() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut first = item("pla-x", "Rojo", 2);
        first.min_closed = Some(4);
        store.upsert_stock(&[first]).unwrap();

        // minClosed is skipped when None, so the stored value survives the merge.
        store.upsert_stock(&[item("pla-x", "Rojo", 5)]).unwrap();

        let stock = store.load_stock().unwrap();
        assert_eq!(stock.len(), 1);
        assert_eq!(stock[0].closed_count, 5);
        assert_eq!(stock[0].min_closed, Some(4));
    }

    #[test]
    fn test_delete_stock() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert_stock(&[item("a", "Rojo", 1), item("b", "Azul", 1)]).unwrap();

        assert!(store.delete_stock("a").unwrap());
        assert!(!store.delete_stock("a").unwrap());
        let ids: Vec<String> = store.load_stock().unwrap().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["b".to_string()]);
    }

    #[test]
    fn test_settings_absent_until_saved() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.load_settings().unwrap().is_none());

        let settings = PriceSettings {
            pla_price_per_kg: 27000.0,
            ..PriceSettings::default()
        };
        store.save_settings(&settings).unwrap();
        assert_eq!(store.load_settings().unwrap(), Some(settings));
    }

    #[test]
    fn test_order_status_update_overwrites() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.seed_if_empty().unwrap();

        let mut order = store
            .load_orders()
            .unwrap()
            .into_iter()
            .find(|o| o.id == "o1")
            .unwrap();
        order.status = OrderStatus::InDesign;
        store.upsert_order(&order).unwrap();

        let reloaded = store.load_orders().unwrap();
        let o1 = reloaded.iter().find(|o| o.id == "o1").unwrap();
        assert_eq!(o1.status, OrderStatus::InDesign);
    }

    #[test]
    fn test_subscribers_receive_full_snapshots() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut rx = store.subscribe();

        store.upsert_stock(&[item("a", "Rojo", 1)]).unwrap();
        store.upsert_stock(&[item("b", "Azul", 2)]).unwrap();

        assert!(matches!(rx.try_recv().unwrap(), StoreEvent::Stock(s) if s.len() == 1));
        match rx.try_recv().unwrap() {
            StoreEvent::Stock(stock) => {
                assert_eq!(stock.len(), 2);
                assert_eq!(stock[1].color, "Azul");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_documents_are_skipped() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert_stock(&[item("a", "Rojo", 1)]).unwrap();
        store
            .conn()
            .unwrap()
            .execute(
                "INSERT INTO documents (collection, id, body, updated_at) VALUES ('stock', 'bad', '{\"nope\":1}', '')",
                [],
            )
            .unwrap();

        assert_eq!(store.load_stock().unwrap().len(), 1);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("desk.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.upsert_stock(&[item("a", "Rojo", 3)]).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.load_stock().unwrap()[0].closed_count, 3);
    }

    #[test]
    fn test_merge_json_nested() {
        let mut base = serde_json::json!({"a": 1, "nested": {"x": 1, "y": 2}});
        merge_json(&mut base, serde_json::json!({"b": 2, "nested": {"y": 3}}));
        assert_eq!(
            base,
            serde_json::json!({"a": 1, "b": 2, "nested": {"x": 1, "y": 3}})
        );
    }
}
