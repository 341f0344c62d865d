//! Filament inventory: the stock model, restock thresholds and the seed catalog.

pub mod rules;
pub mod seed;
pub mod types;

pub use rules::{
    default_thresholds, is_low_stock, load_thresholds, minimum_for, sort_for_display,
    RestockAlert, ThresholdRule, ThresholdTable,
};
pub use types::{CountField, FilamentType, MaterialPatch, NewMaterial, StockItem};
