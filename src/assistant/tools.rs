//! The tool set exposed to the model: JSON schemas going out, typed
//! requests coming back.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::ToolCall;
use crate::orders::{NewOrder, Priority};
use crate::pricing::{BudgetRequest, ClientTier};
use crate::stock::FilamentType;

pub const GET_STOCK: &str = "get_stock";
pub const UPDATE_STOCK: &str = "update_stock";
pub const GET_ORDERS: &str = "get_orders";
pub const ADD_ORDER: &str = "add_order";
pub const CALCULATE_BUDGET: &str = "calculate_budget";

/// A tool declaration in the provider-neutral shape
/// (name, description, JSON-schema parameters).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

pub fn tool_specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: GET_STOCK,
            description: "Obtiene la lista actual de stock de filamentos (rollos cerrados y abiertos), con el mínimo de cada uno y si hay que reponer.",
            parameters: json!({ "type": "object", "properties": {} }),
        },
        ToolSpec {
            name: UPDATE_STOCK,
            description: "Actualiza el stock de un filamento específico.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "color": { "type": "string" },
                    "type": { "type": "string", "enum": ["PLA", "PET-G"] },
                    "closedCount": { "type": "number" },
                    "openCount": { "type": "number" }
                },
                "required": ["color", "type"]
            }),
        },
        ToolSpec {
            name: GET_ORDERS,
            description: "Obtiene la lista de pedidos en la cola de producción.",
            parameters: json!({ "type": "object", "properties": {} }),
        },
        ToolSpec {
            name: ADD_ORDER,
            description: "Registra un nuevo pedido en la cola.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "customer": { "type": "string" },
                    "details": { "type": "string" },
                    "priority": { "type": "string", "enum": ["Alta", "Media", "Baja"] }
                },
                "required": ["customer", "details"]
            }),
        },
        ToolSpec {
            name: CALCULATE_BUDGET,
            description: "Calcula el presupuesto de una impresión con los precios vigentes.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "weightGrams": { "type": "number" },
                    "filamentType": { "type": "string", "enum": ["PLA", "PET-G"] },
                    "clientType": { "type": "string", "enum": ["minorista", "mayorista"] },
                    "designMinutes": { "type": "number" },
                    "postProcessMinutes": { "type": "number" },
                    "modelCost": { "type": "number" }
                },
                "required": ["weightGrams", "filamentType", "clientType"]
            }),
        },
    ]
}

/// A parsed, validated tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolRequest {
    GetStock,
    UpdateStock {
        color: String,
        filament_type: FilamentType,
        closed_count: Option<u32>,
        open_count: Option<u32>,
    },
    GetOrders,
    AddOrder(NewOrder),
    CalculateBudget(BudgetRequest),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateStockArgs {
    color: String,
    #[serde(rename = "type")]
    filament_type: String,
    closed_count: Option<f64>,
    open_count: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct AddOrderArgs {
    customer: String,
    details: String,
    priority: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BudgetArgs {
    weight_grams: Option<f64>,
    filament_type: String,
    client_type: String,
    design_minutes: Option<f64>,
    post_process_minutes: Option<f64>,
    model_cost: Option<f64>,
}

/// Models send counts as JSON numbers; negatives clamp to zero.
fn to_count(value: f64) -> u32 {
    if value.is_finite() {
        value.max(0.0).round() as u32
    } else {
        0
    }
}

fn parse_args<T: for<'de> Deserialize<'de>>(call: &ToolCall) -> Result<T, String> {
    let args = if call.args.is_null() {
        json!({})
    } else {
        call.args.clone()
    };
    serde_json::from_value(args).map_err(|e| format!("Invalid arguments for {}: {}", call.name, e))
}

fn parse_filament(value: &str) -> Result<FilamentType, String> {
    FilamentType::parse(value).ok_or_else(|| format!("Unknown filament type: '{}'", value))
}

impl ToolRequest {
    pub fn parse(call: &ToolCall) -> Result<Self, String> {
        match call.name.as_str() {
            GET_STOCK => Ok(ToolRequest::GetStock),
            GET_ORDERS => Ok(ToolRequest::GetOrders),
            UPDATE_STOCK => {
                let args: UpdateStockArgs = parse_args(call)?;
                Ok(ToolRequest::UpdateStock {
                    color: args.color,
                    filament_type: parse_filament(&args.filament_type)?,
                    closed_count: args.closed_count.map(to_count),
                    open_count: args.open_count.map(to_count),
                })
            }
            ADD_ORDER => {
                let args: AddOrderArgs = parse_args(call)?;
                let priority = match args.priority.as_deref() {
                    None => Priority::default(),
                    Some(p) => {
                        Priority::parse(p).ok_or_else(|| format!("Unknown priority: '{}'", p))?
                    }
                };
                Ok(ToolRequest::AddOrder(NewOrder {
                    customer: args.customer,
                    details: args.details,
                    priority,
                }))
            }
            CALCULATE_BUDGET => {
                let args: BudgetArgs = parse_args(call)?;
                let client_tier = ClientTier::parse(&args.client_type)
                    .ok_or_else(|| format!("Unknown client type: '{}'", args.client_type))?;
                Ok(ToolRequest::CalculateBudget(BudgetRequest {
                    weight_grams: args.weight_grams,
                    filament_type: parse_filament(&args.filament_type)?,
                    client_tier,
                    design_minutes: args.design_minutes.unwrap_or(0.0),
                    post_process_minutes: args.post_process_minutes.unwrap_or(0.0),
                    model_cost: args.model_cost,
                }))
            }
            other => Err(format!("Unknown tool: '{}'", other)),
        }
    }
}
