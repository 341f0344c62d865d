pub mod assistant;
pub mod config;
mod error;
pub mod keychain;
pub mod logging;
pub mod orders;
pub mod pricing;
pub mod stock;
pub mod store;
pub mod workshop;

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

pub use assistant::{AssistantReply, ChatHistory, ChatModel, ChatSession, HttpChatModel, Provider};
pub use config::DeskConfig;
pub use error::{DeskError, DeskResult};
pub use orders::{NewOrder, Order, OrderStatus, Priority};
pub use pricing::{compute_budget, Budget, BudgetRequest, ClientTier, PriceSettings, PriceUpdate};
pub use stock::{FilamentType, StockItem, ThresholdTable};
pub use store::{DocumentStore, SqliteStore, StoreEvent};
pub use workshop::{AppState, StockEntry, Workshop};

fn build_model(config: &DeskConfig, api_key: Option<String>) -> anyhow::Result<Arc<dyn ChatModel>> {
    let assistant = &config.assistant;
    let model = HttpChatModel::new(
        assistant.provider,
        assistant.model(),
        api_key,
        assistant.base_url.as_deref(),
    )?;
    Ok(Arc::new(model))
}

/// Open everything from the user config and run the terminal chat loop
/// until stdin closes or the user types `/salir`.
pub async fn run() -> anyhow::Result<()> {
    logging::init_tracing();

    let config = DeskConfig::load_default()?;
    let thresholds = match &config.stock.rules_path {
        Some(path) => stock::load_thresholds(path)
            .with_context(|| format!("Failed to load stock rules from {:?}", path))?,
        None => stock::default_thresholds().clone(),
    };

    let store_path = config.store_path();
    let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::open(&store_path)?);
    let workshop = Arc::new(Workshop::open(store, thresholds, config.pricing).await?);
    let _sync = workshop.spawn_sync();
    info!("Workshop ready (store at {:?})", store_path);

    let provider = config.assistant.provider;
    let api_key = keychain::get_api_key(provider).unwrap_or_else(|e| {
        warn!("Could not read API key for {}: {}", provider, e);
        None
    });

    let mut session = ChatSession::new(
        build_model(&config, api_key)?,
        Arc::clone(&workshop),
        config.assistant.max_tool_rounds,
    )
    .with_max_exchanges(config.assistant.max_exchanges);
    if config.assistant.persist_transcript {
        let history = ChatHistory::new(&config.history_path()).map_err(anyhow::Error::msg)?;
        session = session.with_history(Arc::new(history));
    }

    println!("{}", session.greeting());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line == "/salir" {
            break;
        }
        if let Some(key) = line.strip_prefix("/key ") {
            keychain::set_api_key(provider, key)?;
            session.replace_model(build_model(&config, Some(key.trim().to_string()))?);
            println!("Listo, guardé la API key de {}.", provider);
            continue;
        }
        if line == "/borrar-key" {
            keychain::delete_api_key(provider)?;
            session.replace_model(build_model(&config, None)?);
            println!("Borré la API key de {}.", provider);
            continue;
        }
        if line == "/nuevo" {
            session.reset();
            println!("{}", session.greeting());
            continue;
        }
        if let Some(id) = line.strip_prefix("/avanzar ") {
            match workshop.promote_order(id.trim()).await {
                Ok(order) => println!("Pedido de {} ahora está '{}'.", order.customer, order.status),
                Err(e) => println!("No pude avanzar el pedido: {}", e),
            }
            continue;
        }
        if line == "/faltantes" {
            for alert in workshop.low_stock().await {
                println!(
                    "{} {}: {} cerrados (mínimo {})",
                    alert.item.filament_type, alert.item.color, alert.item.closed_count, alert.minimum
                );
            }
            continue;
        }

        match session.send(line).await {
            AssistantReply::Text(text) if text.is_empty() => {}
            AssistantReply::Text(text) => println!("{}", text),
            AssistantReply::NeedsApiKey => println!(
                "Necesito una API key válida de {}. Escribila con: /key <tu-key>",
                provider
            ),
        }
    }

    info!("Bye");
    Ok(())
}
