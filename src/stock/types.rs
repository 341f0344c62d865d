use std::fmt;

use serde::{Deserialize, Serialize};

/// Filament families stocked by the workshop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FilamentType {
    #[default]
    #[serde(rename = "PLA")]
    Pla,
    #[serde(rename = "PET-G", alias = "PETG")]
    Petg,
}

impl FilamentType {
    pub const ALL: [FilamentType; 2] = [FilamentType::Pla, FilamentType::Petg];

    /// Display name, also used as the wire value.
    pub fn as_str(&self) -> &'static str {
        match self {
            FilamentType::Pla => "PLA",
            FilamentType::Petg => "PET-G",
        }
    }

    /// Lowercase prefix used when minting stock ids (`pla-…`, `petg-…`).
    pub fn id_prefix(&self) -> &'static str {
        match self {
            FilamentType::Pla => "pla",
            FilamentType::Petg => "petg",
        }
    }

    /// Lenient parse for user or model supplied names ("pla", "PETG", "pet-g").
    pub fn parse(value: &str) -> Option<Self> {
        let normalized: String = value
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != ' ')
            .collect::<String>()
            .to_uppercase();
        match normalized.as_str() {
            "PLA" => Some(FilamentType::Pla),
            "PETG" => Some(FilamentType::Petg),
            _ => None,
        }
    }
}

impl fmt::Display for FilamentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One color/type entry of the filament inventory.
///
/// Closed rolls are sealed spools; open rolls are the ones already on a
/// printer or in use. Counts are unsigned and every decrement saturates at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockItem {
    pub id: String,
    pub color: String,
    #[serde(rename = "type")]
    pub filament_type: FilamentType,
    #[serde(default)]
    pub closed_count: u32,
    #[serde(default)]
    pub open_count: u32,
    /// Explicit restock minimum; when absent the threshold table decides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_closed: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hex_color: Option<String>,
}

/// Which counter an adjustment touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CountField {
    ClosedCount,
    OpenCount,
}

impl StockItem {
    /// Apply a signed delta to one counter, clamping at zero.
    pub fn adjust(&mut self, field: CountField, delta: i64) {
        let slot = match field {
            CountField::ClosedCount => &mut self.closed_count,
            CountField::OpenCount => &mut self.open_count,
        };
        let next = (*slot as i64).saturating_add(delta).clamp(0, u32::MAX as i64);
        *slot = next as u32;
    }

    /// Case-insensitive color + exact type match, as used by the assistant.
    pub fn matches(&self, color: &str, filament_type: FilamentType) -> bool {
        self.filament_type == filament_type
            && self.color.trim().to_lowercase() == color.trim().to_lowercase()
    }
}

/// Input for registering a new material in the catalog.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMaterial {
    pub color: String,
    #[serde(rename = "type")]
    pub filament_type: FilamentType,
    #[serde(default)]
    pub min_closed: Option<u32>,
    #[serde(default)]
    pub hex_color: Option<String>,
}

/// Partial edit of an existing catalog entry. `None` keeps the current value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialPatch {
    pub color: Option<String>,
    pub min_closed: Option<u32>,
    pub hex_color: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(closed: u32, open: u32) -> StockItem {
        StockItem {
            id: "pla-0".to_string(),
            color: "Negro".to_string(),
            filament_type: FilamentType::Pla,
            closed_count: closed,
            open_count: open,
            min_closed: None,
            hex_color: None,
        }
    }

    #[test]
    fn test_adjust_clamps_at_zero() {
        let mut it = item(1, 0);
        it.adjust(CountField::ClosedCount, -5);
        assert_eq!(it.closed_count, 0);
        it.adjust(CountField::OpenCount, -1);
        assert_eq!(it.open_count, 0);
        it.adjust(CountField::OpenCount, 2);
        assert_eq!(it.open_count, 2);
    }

    #[test]
    fn test_wire_format_matches_store_layout() {
        let json = serde_json::to_value(item(3, 1)).unwrap();
        assert_eq!(json["type"], "PLA");
        assert_eq!(json["closedCount"], 3);
        assert_eq!(json["openCount"], 1);
        assert!(json.get("minClosed").is_none());

        let petg: StockItem = serde_json::from_value(serde_json::json!({
            "id": "petg-1", "color": "Gris", "type": "PET-G", "closedCount": 2
        }))
        .unwrap();
        assert_eq!(petg.filament_type, FilamentType::Petg);
        assert_eq!(petg.open_count, 0);
    }

    #[test]
    fn test_filament_type_parse_is_lenient() {
        assert_eq!(FilamentType::parse("pla"), Some(FilamentType::Pla));
        assert_eq!(FilamentType::parse(" PET-G "), Some(FilamentType::Petg));
        assert_eq!(FilamentType::parse("petg"), Some(FilamentType::Petg));
        assert_eq!(FilamentType::parse("ABS"), None);
    }

    #[test]
    fn test_matches_ignores_case_and_padding() {
        let it = item(0, 0);
        assert!(it.matches(" negro", FilamentType::Pla));
        assert!(!it.matches("Negro", FilamentType::Petg));
    }
}
