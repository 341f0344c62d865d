use serde_json::{json, Value};
use tracing::{info, warn};

use super::prompts::{ORDER_ADDED_MESSAGE, STOCK_UPDATED_MESSAGE};
use super::tools::ToolRequest;
use super::ToolCall;
use crate::workshop::Workshop;

/// Execute one tool call against the workshop.
///
/// Always yields a JSON object for the model: `{"result": ...}` on success,
/// `{"error": "..."}` for unknown tools, bad arguments or failed commands.
pub async fn dispatch(workshop: &Workshop, call: &ToolCall) -> Value {
    info!("Dispatching tool call: {}", call.name);

    let request = match ToolRequest::parse(call) {
        Ok(request) => request,
        Err(msg) => {
            warn!("Rejected tool call {}: {}", call.name, msg);
            return json!({ "error": msg });
        }
    };

    match execute(workshop, request).await {
        Ok(result) => json!({ "result": result }),
        Err(msg) => {
            warn!("Tool {} failed: {}", call.name, msg);
            json!({ "error": msg })
        }
    }
}

async fn execute(workshop: &Workshop, request: ToolRequest) -> Result<Value, String> {
    match request {
        ToolRequest::GetStock => to_value(workshop.stock_board(None).await),
        ToolRequest::GetOrders => to_value(workshop.orders().await),
        ToolRequest::UpdateStock {
            color,
            filament_type,
            closed_count,
            open_count,
        } => {
            let item = workshop
                .set_stock_counts(&color, filament_type, closed_count, open_count)
                .await?;
            Ok(json!({ "message": STOCK_UPDATED_MESSAGE, "item": to_value(item)? }))
        }
        ToolRequest::AddOrder(new_order) => {
            let order = workshop.add_order(new_order).await?;
            Ok(json!({ "message": ORDER_ADDED_MESSAGE, "order": to_value(order)? }))
        }
        ToolRequest::CalculateBudget(request) => match workshop.quote(&request).await? {
            Some(budget) => Ok(json!({
                "budget": to_value(budget)?,
                "quote": budget.client_quote(&request),
            })),
            None => Err(
                "Not enough data to quote: give a weight or design/post-processing minutes"
                    .to_string(),
            ),
        },
    }
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| format!("Failed to serialize tool result: {}", e))
}
