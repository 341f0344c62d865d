//! Restock thresholds and the display ordering for the stock board.
//!
//! Thresholds are data: a TOML table maps (filament type, color) to the
//! minimum number of closed rolls. The embedded default lives in
//! `config/stock_rules.toml`; a custom table can be loaded from disk.

use std::cmp::Ordering;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::types::{FilamentType, StockItem};

/// Default thresholds embedded in the binary at compile time.
const DEFAULT_THRESHOLDS: &str = include_str!("../../config/stock_rules.toml");

/// Root of a threshold table file.
#[derive(Debug, Clone, Deserialize)]
pub struct ThresholdTable {
    /// Minimum used when no rule matches.
    #[serde(default = "one")]
    pub default_min_closed: u32,
    #[serde(default)]
    pub thresholds: Vec<ThresholdRule>,
}

/// Minimum for a set of colors of one filament type.
/// An empty `colors` list applies to every color of that type.
#[derive(Debug, Clone, Deserialize)]
pub struct ThresholdRule {
    #[serde(rename = "type")]
    pub filament_type: FilamentType,
    #[serde(default)]
    pub colors: Vec<String>,
    pub min_closed: u32,
}

fn one() -> u32 {
    1
}

impl ThresholdTable {
    /// Minimum closed rolls for a (type, color) pair, ignoring per-item overrides.
    ///
    /// A rule naming the color beats a catch-all rule for the type, which
    /// beats the table default.
    pub fn minimum_for_color(&self, filament_type: FilamentType, color: &str) -> u32 {
        let color = normalize_color(color);
        let mut catch_all = None;

        for rule in self.thresholds.iter().filter(|r| r.filament_type == filament_type) {
            if rule.colors.is_empty() {
                catch_all.get_or_insert(rule.min_closed);
            } else if rule.colors.iter().any(|c| normalize_color(c) == color) {
                return rule.min_closed;
            }
        }

        catch_all.unwrap_or(self.default_min_closed)
    }

    /// Minimum closed rolls for an item. An explicit `min_closed` on the item wins.
    pub fn minimum_for(&self, item: &StockItem) -> u32 {
        item.min_closed
            .unwrap_or_else(|| self.minimum_for_color(item.filament_type, &item.color))
    }

    pub fn is_low_stock(&self, item: &StockItem) -> bool {
        item.closed_count < self.minimum_for(item)
    }

    /// Compare two items for the stock board: restock alerts first, then fewer
    /// closed rolls, then fewer open rolls, then color name.
    pub fn display_cmp(&self, a: &StockItem, b: &StockItem) -> Ordering {
        let a_low = self.is_low_stock(a);
        let b_low = self.is_low_stock(b);

        b_low
            .cmp(&a_low)
            .then(a.closed_count.cmp(&b.closed_count))
            .then(a.open_count.cmp(&b.open_count))
            .then_with(|| normalize_color(&a.color).cmp(&normalize_color(&b.color)))
    }

    pub fn sort_for_display(&self, items: &mut [StockItem]) {
        items.sort_by(|a, b| self.display_cmp(a, b));
    }

    /// Every item below its minimum, in display order.
    pub fn low_stock_report(&self, items: &[StockItem]) -> Vec<RestockAlert> {
        let mut low: Vec<StockItem> = items
            .iter()
            .filter(|item| self.is_low_stock(item))
            .cloned()
            .collect();
        self.sort_for_display(&mut low);

        low.into_iter()
            .map(|item| {
                let minimum = self.minimum_for(&item);
                RestockAlert {
                    shortfall: minimum - item.closed_count,
                    minimum,
                    item,
                }
            })
            .collect()
    }
}

/// A stock entry that needs replenishing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestockAlert {
    pub item: StockItem,
    pub minimum: u32,
    /// Closed rolls missing to reach the minimum.
    pub shortfall: u32,
}

fn normalize_color(color: &str) -> String {
    color.trim().to_lowercase()
}

/// Load a threshold table from a TOML file.
pub fn load_thresholds(path: &Path) -> Result<ThresholdTable> {
    let content = std::fs::read_to_string(path)?;
    let table: ThresholdTable = toml::from_str(&content)?;
    Ok(table)
}

/// The embedded threshold table.
///
/// # Panics
/// Panics if the embedded TOML is invalid (a build-time bug).
pub fn default_thresholds() -> &'static ThresholdTable {
    static TABLE: OnceLock<ThresholdTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        toml::from_str(DEFAULT_THRESHOLDS).expect("embedded stock_rules.toml must be valid TOML")
    })
}

/// Minimum closed rolls for `item` under the default table.
pub fn minimum_for(item: &StockItem) -> u32 {
    default_thresholds().minimum_for(item)
}

/// Whether `item` needs restocking under the default table.
pub fn is_low_stock(item: &StockItem) -> bool {
    default_thresholds().is_low_stock(item)
}

/// Sort for the stock board under the default table.
pub fn sort_for_display(items: &mut [StockItem]) {
    default_thresholds().sort_for_display(items)
}
