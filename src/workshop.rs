//! The coordinator that owns application state.
//!
//! `Workshop` holds the mirrored stock, orders and price settings, applies
//! every command in one place, and writes through to the document store.
//! Other sessions' writes reach it through the store subscription
//! (`spawn_sync`); last write wins.

use std::sync::Arc;

use chrono::{Local, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::{DeskError, DeskResult};
use crate::orders::{create_order, new_order_id, sort_newest_first, NewOrder, Order, OrderStatus};
use crate::pricing::{compute_budget, Budget, BudgetRequest, PriceSettings, PriceUpdate};
use crate::stock::seed::swatch_for;
use crate::stock::{
    CountField, FilamentType, MaterialPatch, NewMaterial, RestockAlert, StockItem, ThresholdTable,
};
use crate::store::{DocumentStore, StoreEvent};

/// Everything the dashboard shows, as last seen by this session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AppState {
    pub stock: Vec<StockItem>,
    pub orders: Vec<Order>,
    pub settings: PriceSettings,
}

/// A stock item as shown on the board, with its restock verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockEntry {
    #[serde(flatten)]
    pub item: StockItem,
    pub minimum: u32,
    pub low: bool,
}

pub struct Workshop {
    store: Arc<dyn DocumentStore>,
    state: RwLock<AppState>,
    thresholds: ThresholdTable,
}

/// Run a blocking store call off the async runtime.
async fn with_store<T, F>(store: &Arc<dyn DocumentStore>, f: F) -> DeskResult<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn DocumentStore) -> DeskResult<T> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || f(store.as_ref()))
        .await
        .map_err(|e| DeskError::Store(format!("Store task panicked: {}", e)))?
}

impl Workshop {
    /// Seed the store if it is empty and pull the current state.
    /// `default_settings` is used until a settings document exists.
    pub async fn open(
        store: Arc<dyn DocumentStore>,
        thresholds: ThresholdTable,
        default_settings: PriceSettings,
    ) -> DeskResult<Self> {
        let seeded = with_store(&store, |s| s.seed_if_empty()).await?;
        if seeded {
            info!("Initialized store with the seed catalog");
        }

        let workshop = Self {
            store,
            state: RwLock::new(AppState {
                settings: default_settings,
                ..AppState::default()
            }),
            thresholds,
        };
        workshop.refresh().await?;
        Ok(workshop)
    }

    /// Pull every collection from the store.
    pub async fn refresh(&self) -> DeskResult<()> {
        let (stock, orders, settings) = with_store(&self.store, |s| {
            Ok((s.load_stock()?, s.load_orders()?, s.load_settings()?))
        })
        .await?;

        let mut state = self.state.write().await;
        state.stock = stock;
        state.orders = orders;
        if let Some(settings) = settings {
            state.settings = settings;
        }
        info!(
            "Loaded {} stock items and {} orders",
            state.stock.len(),
            state.orders.len()
        );
        Ok(())
    }

    /// Mirror a snapshot pushed by the store.
    pub async fn apply_event(&self, event: StoreEvent) {
        let mut state = self.state.write().await;
        match event {
            StoreEvent::Stock(stock) => state.stock = stock,
            StoreEvent::Orders(mut orders) => {
                sort_newest_first(&mut orders);
                state.orders = orders;
            }
            StoreEvent::Settings(settings) => state.settings = settings,
        }
    }

    /// Follow the store subscription until the store goes away.
    pub fn spawn_sync(self: &Arc<Self>) -> JoinHandle<()> {
        let workshop = Arc::clone(self);
        let mut events = self.store.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => workshop.apply_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Sync lagged by {} events, reloading", skipped);
                        if let Err(e) = workshop.refresh().await {
                            warn!("Failed to reload after lag: {}", e);
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    pub async fn snapshot(&self) -> AppState {
        self.state.read().await.clone()
    }

    // ---- stock -------------------------------------------------------------

    /// The stock board: optionally one filament type, restock alerts first.
    pub async fn stock_board(&self, filter: Option<FilamentType>) -> Vec<StockEntry> {
        let mut items: Vec<StockItem> = self
            .state
            .read()
            .await
            .stock
            .iter()
            .filter(|item| filter.map_or(true, |t| item.filament_type == t))
            .cloned()
            .collect();
        self.thresholds.sort_for_display(&mut items);

        items
            .into_iter()
            .map(|item| StockEntry {
                minimum: self.thresholds.minimum_for(&item),
                low: self.thresholds.is_low_stock(&item),
                item,
            })
            .collect()
    }

    pub async fn low_stock(&self) -> Vec<RestockAlert> {
        let state = self.state.read().await;
        self.thresholds.low_stock_report(&state.stock)
    }

    async fn persist_stock(&self, items: Vec<StockItem>) -> DeskResult<()> {
        with_store(&self.store, move |s| s.upsert_stock(&items)).await
    }

    /// Add `delta` rolls to one counter of an item; never goes below zero.
    pub async fn adjust_stock(
        &self,
        id: &str,
        field: CountField,
        delta: i64,
    ) -> DeskResult<StockItem> {
        let mut state = self.state.write().await;
        let index = state
            .stock
            .iter()
            .position(|item| item.id == id)
            .ok_or_else(|| DeskError::StockNotFound(id.to_string()))?;

        let mut updated = state.stock[index].clone();
        updated.adjust(field, delta);
        self.persist_stock(vec![updated.clone()]).await?;

        info!(
            "Adjusted {:?} of {} by {} (closed={}, open={})",
            field, id, delta, updated.closed_count, updated.open_count
        );
        state.stock[index] = updated.clone();
        Ok(updated)
    }

    /// Set absolute counts on the item matching `color` and `filament_type`.
    pub async fn set_stock_counts(
        &self,
        color: &str,
        filament_type: FilamentType,
        closed_count: Option<u32>,
        open_count: Option<u32>,
    ) -> DeskResult<StockItem> {
        let mut state = self.state.write().await;
        let index = state
            .stock
            .iter()
            .position(|item| item.matches(color, filament_type))
            .ok_or_else(|| DeskError::StockNotFound(format!("{} {}", filament_type, color.trim())))?;

        let mut updated = state.stock[index].clone();
        if let Some(closed) = closed_count {
            updated.closed_count = closed;
        }
        if let Some(open) = open_count {
            updated.open_count = open;
        }
        self.persist_stock(vec![updated.clone()]).await?;

        info!(
            "Set stock of {} {} to closed={}, open={}",
            filament_type, updated.color, updated.closed_count, updated.open_count
        );
        state.stock[index] = updated.clone();
        Ok(updated)
    }

    /// Register a new color. Starts with zero rolls.
    pub async fn add_material(&self, material: NewMaterial) -> DeskResult<StockItem> {
        let color = material.color.trim().to_string();
        if color.is_empty() {
            return Err(DeskError::InvalidMaterial("color cannot be empty".to_string()));
        }

        let mut state = self.state.write().await;
        if state
            .stock
            .iter()
            .any(|item| item.matches(&color, material.filament_type))
        {
            return Err(DeskError::InvalidMaterial(format!(
                "{} {} already exists",
                material.filament_type, color
            )));
        }

        let base_id = format!(
            "{}-{}",
            material.filament_type.id_prefix(),
            Utc::now().timestamp_millis()
        );
        let mut id = base_id.clone();
        let mut n = 1;
        while state.stock.iter().any(|item| item.id == id) {
            id = format!("{}-{}", base_id, n);
            n += 1;
        }

        let hex_color = material
            .hex_color
            .unwrap_or_else(|| swatch_for(&color).to_string());
        let item = StockItem {
            id,
            color,
            filament_type: material.filament_type,
            closed_count: 0,
            open_count: 0,
            min_closed: material.min_closed,
            hex_color: Some(hex_color),
        };
        self.persist_stock(vec![item.clone()]).await?;

        info!("Added material {} {} as {}", item.filament_type, item.color, item.id);
        state.stock.push(item.clone());
        Ok(item)
    }

    /// Edit name, minimum or swatch of a catalog entry.
    pub async fn update_material(&self, id: &str, patch: MaterialPatch) -> DeskResult<StockItem> {
        let mut state = self.state.write().await;
        let index = state
            .stock
            .iter()
            .position(|item| item.id == id)
            .ok_or_else(|| DeskError::StockNotFound(id.to_string()))?;

        let mut updated = state.stock[index].clone();
        if let Some(color) = patch.color {
            let color = color.trim().to_string();
            if color.is_empty() {
                return Err(DeskError::InvalidMaterial("color cannot be empty".to_string()));
            }
            if state
                .stock
                .iter()
                .any(|item| item.id != id && item.matches(&color, updated.filament_type))
            {
                return Err(DeskError::InvalidMaterial(format!(
                    "{} {} already exists",
                    updated.filament_type, color
                )));
            }
            updated.color = color;
        }
        if let Some(min) = patch.min_closed {
            updated.min_closed = Some(min);
        }
        if let Some(hex) = patch.hex_color {
            updated.hex_color = Some(hex);
        }
        self.persist_stock(vec![updated.clone()]).await?;

        info!("Updated material {}", id);
        state.stock[index] = updated.clone();
        Ok(updated)
    }

    /// Remove a color from the catalog.
    pub async fn remove_material(&self, id: &str) -> DeskResult<StockItem> {
        let mut state = self.state.write().await;
        let index = state
            .stock
            .iter()
            .position(|item| item.id == id)
            .ok_or_else(|| DeskError::StockNotFound(id.to_string()))?;

        let owned_id = id.to_string();
        with_store(&self.store, move |s| s.delete_stock(&owned_id)).await?;

        info!("Removed material {}", id);
        Ok(state.stock.remove(index))
    }

    /// Zero every counter, for a full physical recount. One batched write.
    pub async fn reset_all_stock(&self) -> DeskResult<usize> {
        let mut state = self.state.write().await;
        let zeroed: Vec<StockItem> = state
            .stock
            .iter()
            .cloned()
            .map(|mut item| {
                item.closed_count = 0;
                item.open_count = 0;
                item
            })
            .collect();
        let count = zeroed.len();
        self.persist_stock(zeroed.clone()).await?;

        warn!("Reset all {} stock counters to zero", count);
        state.stock = zeroed;
        Ok(count)
    }

    // ---- orders ------------------------------------------------------------

    /// The queue, newest first.
    pub async fn orders(&self) -> Vec<Order> {
        self.state.read().await.orders.clone()
    }

    /// Queue a new pending order dated today.
    pub async fn add_order(&self, request: NewOrder) -> DeskResult<Order> {
        if request.customer.trim().is_empty() {
            return Err(DeskError::InvalidOrder("customer cannot be empty".to_string()));
        }
        if request.details.trim().is_empty() {
            return Err(DeskError::InvalidOrder("details cannot be empty".to_string()));
        }

        let mut state = self.state.write().await;
        let mut order = create_order(request, Local::now().date_naive());
        while state.orders.iter().any(|o| o.id == order.id) {
            order.id = new_order_id();
        }

        let to_store = order.clone();
        with_store(&self.store, move |s| s.upsert_order(&to_store)).await?;

        info!("Queued order {} for {}", order.id, order.customer);
        state.orders.push(order.clone());
        sort_newest_first(&mut state.orders);
        Ok(order)
    }

    /// Move an order to `status`. Orders only move forward.
    pub async fn advance_order(&self, id: &str, status: OrderStatus) -> DeskResult<Order> {
        let mut state = self.state.write().await;
        let index = state
            .orders
            .iter()
            .position(|o| o.id == id)
            .ok_or_else(|| DeskError::OrderNotFound(id.to_string()))?;

        let current = state.orders[index].status;
        if !current.can_transition_to(status) {
            return Err(DeskError::InvalidTransition {
                id: id.to_string(),
                from: current,
                to: status,
            });
        }
        if current == status {
            return Ok(state.orders[index].clone());
        }

        let mut updated = state.orders[index].clone();
        updated.status = status;
        let to_store = updated.clone();
        with_store(&self.store, move |s| s.upsert_order(&to_store)).await?;

        info!("Order {} moved from '{}' to '{}'", id, current, status);
        state.orders[index] = updated.clone();
        Ok(updated)
    }

    /// Move an order one stage forward.
    pub async fn promote_order(&self, id: &str) -> DeskResult<Order> {
        let current = self
            .state
            .read()
            .await
            .orders
            .iter()
            .find(|o| o.id == id)
            .map(|o| o.status)
            .ok_or_else(|| DeskError::OrderNotFound(id.to_string()))?;
        let next = current
            .next()
            .ok_or_else(|| DeskError::InvalidOrder(format!("{} is already '{}'", id, current)))?;
        self.advance_order(id, next).await
    }

    // ---- pricing -----------------------------------------------------------

    pub async fn settings(&self) -> PriceSettings {
        self.state.read().await.settings
    }

    pub async fn update_prices(&self, update: PriceUpdate) -> DeskResult<PriceSettings> {
        let mut state = self.state.write().await;
        let mut settings = state.settings;
        settings.apply(&update)?;
        if update.is_empty() {
            return Ok(settings);
        }

        with_store(&self.store, move |s| s.save_settings(&settings)).await?;
        info!("Updated prices: {:?}", update);
        state.settings = settings;
        Ok(settings)
    }

    /// Quote with the current price settings.
    pub async fn quote(&self, request: &BudgetRequest) -> DeskResult<Option<Budget>> {
        let settings = self.settings().await;
        Ok(compute_budget(request, &settings)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::Priority;
    use crate::stock::default_thresholds;
    use crate::stock::seed::DEFAULT_SWATCH;
    use crate::store::SqliteStore;

    async fn open_workshop() -> Workshop {
        let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
        Workshop::open(store, default_thresholds().clone(), PriceSettings::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_open_seeds_empty_store() {
        let workshop = open_workshop().await;
        let state = workshop.snapshot().await;
        assert_eq!(state.stock.len(), 26);
        assert_eq!(state.orders.len(), 2);
        assert_eq!(state.settings, PriceSettings::default());
    }

    #[tokio::test]
    async fn test_adjust_stock_clamps_and_persists() {
        let workshop = open_workshop().await;
        let item = workshop
            .adjust_stock("pla-0", CountField::ClosedCount, -10)
            .await
            .unwrap();
        assert_eq!(item.closed_count, 0);

        workshop.refresh().await.unwrap();
        let board = workshop.stock_board(Some(FilamentType::Pla)).await;
        assert_eq!(board[0].item.id, "pla-0");
        assert!(board[0].low);
        assert_eq!(board[0].minimum, 3);
    }

    #[tokio::test]
    async fn test_adjust_unknown_item() {
        let workshop = open_workshop().await;
        let err = workshop
            .adjust_stock("nope", CountField::OpenCount, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::StockNotFound(_)));
    }

    #[tokio::test]
    async fn test_set_stock_counts_by_color() {
        let workshop = open_workshop().await;
        let item = workshop
            .set_stock_counts("gris", FilamentType::Petg, Some(4), None)
            .await
            .unwrap();
        assert_eq!(item.id, "petg-2");
        assert_eq!(item.closed_count, 4);
        assert_eq!(item.open_count, 1);
    }

    #[tokio::test]
    async fn test_add_material_rejects_duplicates() {
        let workshop = open_workshop().await;
        let added = workshop
            .add_material(NewMaterial {
                color: "Turquesa".to_string(),
                filament_type: FilamentType::Petg,
                min_closed: None,
                hex_color: None,
            })
            .await
            .unwrap();
        assert!(added.id.starts_with("petg-"));
        assert_eq!(added.min_closed, None);
        assert_eq!(workshop.thresholds.minimum_for(&added), 1);
        assert_eq!(added.hex_color.as_deref(), Some(DEFAULT_SWATCH));
        assert!(workshop.low_stock().await.iter().any(|a| a.item.id == added.id));

        let err = workshop
            .add_material(NewMaterial {
                color: "turquesa".to_string(),
                filament_type: FilamentType::Petg,
                min_closed: None,
                hex_color: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::InvalidMaterial(_)));
    }

    #[tokio::test]
    async fn test_readded_white_pla_keeps_table_minimum() {
        let workshop = open_workshop().await;
        workshop.remove_material("pla-1").await.unwrap();
        let added = workshop
            .add_material(NewMaterial {
                color: "Blanco".to_string(),
                filament_type: FilamentType::Pla,
                min_closed: None,
                hex_color: None,
            })
            .await
            .unwrap();
        assert_eq!(added.hex_color.as_deref(), Some("#ffffff"));

        workshop
            .set_stock_counts("Blanco", FilamentType::Pla, Some(2), None)
            .await
            .unwrap();
        let board = workshop.stock_board(Some(FilamentType::Pla)).await;
        let blanco = board.iter().find(|e| e.item.id == added.id).unwrap();
        assert_eq!(blanco.minimum, 3);
        assert!(blanco.low);
    }

    #[tokio::test]
    async fn test_update_material_rename_and_minimum() {
        let workshop = open_workshop().await;
        let renamed = workshop
            .update_material(
                "pla-2",
                MaterialPatch {
                    color: Some(" Gris topo ".to_string()),
                    min_closed: Some(2),
                    hex_color: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.color, "Gris topo");
        assert_eq!(renamed.min_closed, Some(2));
        assert!(workshop.low_stock().await.iter().any(|a| a.item.id == "pla-2"));

        workshop.refresh().await.unwrap();
        let state = workshop.snapshot().await;
        let stored = state.stock.iter().find(|i| i.id == "pla-2").unwrap();
        assert_eq!(stored.color, "Gris topo");
        assert_eq!(stored.hex_color.as_deref(), Some("#94a3b8"));
    }

    #[tokio::test]
    async fn test_update_material_rejects_duplicate_name() {
        let workshop = open_workshop().await;
        let err = workshop
            .update_material(
                "pla-2",
                MaterialPatch {
                    color: Some("negro".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::InvalidMaterial(_)));

        let negros = workshop
            .snapshot()
            .await
            .stock
            .iter()
            .filter(|i| i.matches("Negro", FilamentType::Pla))
            .count();
        assert_eq!(negros, 1);

        // Keeping its own name is not a clash.
        workshop
            .update_material(
                "pla-2",
                MaterialPatch {
                    color: Some("Gris".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unknown_material_update() {
        let workshop = open_workshop().await;
        let err = workshop
            .update_material("nope", MaterialPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::StockNotFound(_)));
    }

    #[tokio::test]
    async fn test_remove_material() {
        let workshop = open_workshop().await;
        let removed = workshop.remove_material("petg-0").await.unwrap();
        assert_eq!(removed.color, "Blanco");
        workshop.refresh().await.unwrap();
        assert_eq!(workshop.snapshot().await.stock.len(), 25);
    }

    #[tokio::test]
    async fn test_reset_all_stock() {
        let workshop = open_workshop().await;
        assert_eq!(workshop.reset_all_stock().await.unwrap(), 26);
        workshop.refresh().await.unwrap();
        let state = workshop.snapshot().await;
        assert!(state.stock.iter().all(|i| i.closed_count == 0 && i.open_count == 0));
        assert_eq!(workshop.low_stock().await.len(), 26);
    }

    #[tokio::test]
    async fn test_add_and_advance_order() {
        let workshop = open_workshop().await;
        let order = workshop
            .add_order(NewOrder {
                customer: "Lucía".to_string(),
                details: "Soporte de auriculares".to_string(),
                priority: Priority::High,
            })
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(workshop.orders().await[0].id, order.id);

        let printing = workshop
            .advance_order(&order.id, OrderStatus::Printing)
            .await
            .unwrap();
        assert_eq!(printing.status, OrderStatus::Printing);

        let err = workshop
            .advance_order(&order.id, OrderStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_promote_order_steps_through_stages() {
        let workshop = open_workshop().await;
        let order = workshop
            .add_order(NewOrder {
                customer: "Lucía".to_string(),
                details: "Maceta".to_string(),
                priority: Priority::Low,
            })
            .await
            .unwrap();
        let promoted = workshop.promote_order(&order.id).await.unwrap();
        assert_eq!(promoted.status, OrderStatus::InDesign);

        for _ in 0..3 {
            workshop.promote_order(&order.id).await.unwrap();
        }
        let orders = workshop.orders().await;
        let stored = orders.iter().find(|o| o.id == order.id).unwrap();
        assert_eq!(stored.status, OrderStatus::Delivered);

        let err = workshop.promote_order(&order.id).await.unwrap_err();
        assert!(matches!(err, DeskError::InvalidOrder(_)));
        assert!(matches!(
            workshop.promote_order("zzz").await.unwrap_err(),
            DeskError::OrderNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_add_order_requires_customer() {
        let workshop = open_workshop().await;
        let err = workshop
            .add_order(NewOrder {
                customer: "  ".to_string(),
                details: "algo".to_string(),
                priority: Priority::default(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::InvalidOrder(_)));
    }

    #[tokio::test]
    async fn test_update_prices_drives_quotes() {
        let workshop = open_workshop().await;
        workshop
            .update_prices(PriceUpdate {
                pla: Some(30000.0),
                ..Default::default()
            })
            .await
            .unwrap();

        let budget = workshop
            .quote(&BudgetRequest {
                weight_grams: Some(100.0),
                ..Default::default()
            })
            .await
            .unwrap()
            .unwrap();
        // 3000 * 1.4 * 4 = 16800
        assert_eq!(budget.printing_price, 16800.0);

        workshop.refresh().await.unwrap();
        assert_eq!(workshop.settings().await.pla_price_per_kg, 30000.0);
    }

    #[tokio::test]
    async fn test_apply_event_mirrors_other_sessions() {
        let workshop = open_workshop().await;
        workshop.apply_event(StoreEvent::Stock(Vec::new())).await;
        assert!(workshop.stock_board(None).await.is_empty());
    }
}
