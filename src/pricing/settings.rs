use serde::{Deserialize, Serialize};

use crate::error::{DeskError, DeskResult};
use crate::stock::FilamentType;

pub const DEFAULT_PLA_PRICE: f64 = 25000.0;
pub const DEFAULT_PETG_PRICE: f64 = 32000.0;
pub const DEFAULT_DESIGN_PRICE: f64 = 8000.0;
pub const DEFAULT_POST_PROCESS_PRICE: f64 = 7000.0;

/// Unit prices shared by every quote: filament per kilo, labour per hour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PriceSettings {
    #[serde(alias = "plaPrice")]
    pub pla_price_per_kg: f64,
    #[serde(alias = "petgPrice")]
    pub petg_price_per_kg: f64,
    #[serde(alias = "designPrice")]
    pub design_price_per_hour: f64,
    #[serde(alias = "postProcessPrice")]
    pub post_process_price_per_hour: f64,
}

impl Default for PriceSettings {
    fn default() -> Self {
        Self {
            pla_price_per_kg: DEFAULT_PLA_PRICE,
            petg_price_per_kg: DEFAULT_PETG_PRICE,
            design_price_per_hour: DEFAULT_DESIGN_PRICE,
            post_process_price_per_hour: DEFAULT_POST_PROCESS_PRICE,
        }
    }
}

impl PriceSettings {
    pub fn price_per_kg(&self, filament_type: FilamentType) -> f64 {
        match filament_type {
            FilamentType::Pla => self.pla_price_per_kg,
            FilamentType::Petg => self.petg_price_per_kg,
        }
    }

    /// Apply a partial update. Absent fields keep their value; present ones
    /// must be finite and positive or nothing is changed.
    pub fn apply(&mut self, update: &PriceUpdate) -> DeskResult<()> {
        let fields = [
            ("pla", update.pla),
            ("petg", update.petg),
            ("design", update.design),
            ("postProcess", update.post_process),
        ];
        for (field, value) in fields {
            if let Some(v) = value {
                if !v.is_finite() || v <= 0.0 {
                    return Err(DeskError::InvalidPrice { field, value: v });
                }
            }
        }

        if let Some(v) = update.pla {
            self.pla_price_per_kg = v;
        }
        if let Some(v) = update.petg {
            self.petg_price_per_kg = v;
        }
        if let Some(v) = update.design {
            self.design_price_per_hour = v;
        }
        if let Some(v) = update.post_process {
            self.post_process_price_per_hour = v;
        }
        Ok(())
    }
}

/// Partial price change coming from the settings form or the assistant.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceUpdate {
    pub pla: Option<f64>,
    pub petg: Option<f64>,
    pub design: Option<f64>,
    pub post_process: Option<f64>,
}

impl PriceUpdate {
    pub fn is_empty(&self) -> bool {
        self.pla.is_none() && self.petg.is_none() && self.design.is_none() && self.post_process.is_none()
    }
}
