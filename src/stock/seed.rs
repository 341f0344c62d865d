//! Catalog used the first time the store is opened empty.

use super::types::{FilamentType, StockItem};

const PLA_COLORS: &[&str] = &[
    "Negro",
    "Blanco",
    "Gris",
    "Gris claro",
    "Gris Plata",
    "Azul",
    "Celeste",
    "Celeste claro (pastel)",
    "Aqua",
    "Rojo",
    "Dorado",
    "Amarillo",
    "Amarillo pastel",
    "Naranja",
    "Piel",
    "Verde claro",
    "Verde Oscuro",
    "Rosa",
    "Violeta",
    "Lila",
    "Fucsia",
    "Marron",
    "Marron chocolate",
];

const PETG_COLORS: &[&str] = &["Blanco", "Negro", "Gris"];

const SWATCHES: &[(&str, &str)] = &[
    ("Negro", "#1a1a1a"),
    ("Blanco", "#ffffff"),
    ("Gris", "#94a3b8"),
    ("Gris claro", "#cbd5e1"),
    ("Gris Plata", "#e2e8f0"),
    ("Azul", "#2563eb"),
    ("Celeste", "#60a5fa"),
    ("Celeste claro (pastel)", "#bfdbfe"),
    ("Aqua", "#2dd4bf"),
    ("Rojo", "#dc2626"),
    ("Dorado", "#fbbf24"),
    ("Amarillo", "#fde047"),
    ("Amarillo pastel", "#fef08a"),
    ("Naranja", "#f97316"),
    ("Piel", "#ffedd5"),
    ("Verde claro", "#4ade80"),
    ("Verde Oscuro", "#166534"),
    ("Rosa", "#f472b6"),
    ("Violeta", "#8b5cf6"),
    ("Lila", "#ddd6fe"),
    ("Fucsia", "#db2777"),
    ("Marron", "#78350f"),
    ("Marron chocolate", "#451a03"),
];

/// Fallback swatch for colors without a known hex value.
pub const DEFAULT_SWATCH: &str = "#cccccc";

/// Hex swatch for a catalog color name.
pub fn swatch_for(color: &str) -> &'static str {
    SWATCHES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(color.trim()))
        .map(|(_, hex)| *hex)
        .unwrap_or(DEFAULT_SWATCH)
}

/// The starting inventory: every PLA and PET-G color with one open roll,
/// three closed rolls of white/black PLA and one of everything else.
pub fn initial_stock() -> Vec<StockItem> {
    let pla = PLA_COLORS.iter().enumerate().map(|(index, color)| StockItem {
        id: format!("pla-{}", index),
        color: color.to_string(),
        filament_type: FilamentType::Pla,
        closed_count: if *color == "Blanco" || *color == "Negro" { 3 } else { 1 },
        open_count: 1,
        min_closed: None,
        hex_color: Some(swatch_for(color).to_string()),
    });

    let petg = PETG_COLORS.iter().enumerate().map(|(index, color)| StockItem {
        id: format!("petg-{}", index),
        color: color.to_string(),
        filament_type: FilamentType::Petg,
        closed_count: 1,
        open_count: 1,
        min_closed: None,
        hex_color: Some(swatch_for(color).to_string()),
    });

    pla.chain(petg).collect()
}
