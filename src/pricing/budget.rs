use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::settings::PriceSettings;
use crate::stock::FilamentType;

/// Overhead surcharge on material cost (waste, power, machine wear), in percent.
pub const OVERHEAD_PERCENT: f64 = 40.0;
pub const RETAIL_MULTIPLIER: f64 = 4.0;
pub const WHOLESALE_MULTIPLIER: f64 = 3.0;

#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    #[error("Invalid {field}: {value} (must be a non-negative number)")]
    InvalidInput { field: &'static str, value: f64 },
}

/// Who the quote is for. Retail pays the higher markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientTier {
    #[default]
    #[serde(alias = "minorista")]
    Retail,
    #[serde(alias = "mayorista")]
    Wholesale,
}

impl ClientTier {
    pub fn multiplier(&self) -> f64 {
        match self {
            ClientTier::Retail => RETAIL_MULTIPLIER,
            ClientTier::Wholesale => WHOLESALE_MULTIPLIER,
        }
    }

    /// Accepts English or Spanish labels.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "retail" | "minorista" => Some(ClientTier::Retail),
            "wholesale" | "mayorista" => Some(ClientTier::Wholesale),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ClientTier::Retail => "Minorista",
            ClientTier::Wholesale => "Mayorista",
        }
    }
}

/// Inputs for a quote.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetRequest {
    #[serde(default)]
    pub weight_grams: Option<f64>,
    pub filament_type: FilamentType,
    #[serde(default, alias = "clientType")]
    pub client_tier: ClientTier,
    #[serde(default)]
    pub design_minutes: f64,
    #[serde(default)]
    pub post_process_minutes: f64,
    /// Flat cost of a purchased model, passed through unchanged.
    #[serde(default)]
    pub model_cost: Option<f64>,
}

/// Cost breakdown for a quote.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    pub material_cost: f64,
    pub base_cost: f64,
    pub printing_price: f64,
    pub design_cost: f64,
    pub post_process_cost: f64,
    pub model_cost: f64,
    pub final_price: f64,
}

/// Round to the nearest 100, halves away from zero.
pub fn round_to_hundred(value: f64) -> f64 {
    (value / 100.0).round() * 100.0
}

fn check(field: &'static str, value: f64) -> Result<f64, PricingError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(PricingError::InvalidInput { field, value })
    }
}

/// Compute a quote.
///
/// Returns `Ok(None)` when there is nothing to price: no weight and no
/// design or post-processing time. Negative or non-finite inputs are rejected.
pub fn compute_budget(
    request: &BudgetRequest,
    settings: &PriceSettings,
) -> Result<Option<Budget>, PricingError> {
    let weight = check("weightGrams", request.weight_grams.unwrap_or(0.0))?;
    let design_minutes = check("designMinutes", request.design_minutes)?;
    let post_process_minutes = check("postProcessMinutes", request.post_process_minutes)?;
    let model_cost = check("modelCost", request.model_cost.unwrap_or(0.0))?;

    if weight == 0.0 && design_minutes == 0.0 && post_process_minutes == 0.0 {
        return Ok(None);
    }

    let cost_per_gram = settings.price_per_kg(request.filament_type) / 1000.0;
    let material_cost = cost_per_gram * weight;
    let base_cost = material_cost * (100.0 + OVERHEAD_PERCENT) / 100.0;
    let printing_price = round_to_hundred(base_cost * request.client_tier.multiplier());

    let design_cost = settings.design_price_per_hour * design_minutes / 60.0;
    let post_process_cost = settings.post_process_price_per_hour * post_process_minutes / 60.0;

    Ok(Some(Budget {
        material_cost,
        base_cost,
        printing_price,
        design_cost,
        post_process_cost,
        model_cost,
        final_price: printing_price + design_cost + post_process_cost + model_cost,
    }))
}

impl Budget {
    /// Plain-text quote to paste into a client conversation.
    pub fn client_quote(&self, request: &BudgetRequest) -> String {
        let mut lines = vec![format!(
            "Presupuesto Sinapsis 3D ({})",
            request.client_tier.label()
        )];
        if let Some(weight) = request.weight_grams.filter(|w| *w > 0.0) {
            lines.push(format!(
                "Impresión {} ({} g): ${}",
                request.filament_type,
                format_amount(weight),
                format_amount(self.printing_price)
            ));
        }
        if self.design_cost > 0.0 {
            lines.push(format!("Diseño: ${}", format_amount(self.design_cost)));
        }
        if self.post_process_cost > 0.0 {
            lines.push(format!(
                "Post-procesado: ${}",
                format_amount(self.post_process_cost)
            ));
        }
        if self.model_cost > 0.0 {
            lines.push(format!("Modelo: ${}", format_amount(self.model_cost)));
        }
        lines.push(format!("Total: ${}", format_amount(self.final_price)));
        lines.join("\n")
    }
}

/// Format an amount with `.` thousands separators and, when needed, a `,`
/// decimal part with two digits (es-AR style): 21000 -> "21.000", 1234.5 -> "1.234,50".
pub fn format_amount(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u64;
    let whole = cents / 100;
    let fraction = cents % 100;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    if fraction == 0 {
        format!("{}{}", sign, grouped)
    } else {
        format!("{}{},{:02}", sign, grouped, fraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pla_request(weight: f64, tier: ClientTier) -> BudgetRequest {
        BudgetRequest {
            weight_grams: Some(weight),
            filament_type: FilamentType::Pla,
            client_tier: tier,
            ..Default::default()
        }
    }

    #[test]
    fn test_retail_150g_pla() {
        let budget = compute_budget(&pla_request(150.0, ClientTier::Retail), &PriceSettings::default())
            .unwrap()
            .unwrap();
        assert_eq!(budget.material_cost, 3750.0);
        assert_eq!(budget.base_cost, 5250.0);
        assert_eq!(budget.printing_price, 21000.0);
        assert_eq!(budget.final_price, 21000.0);
    }

    #[test]
    fn test_wholesale_rounds_half_up() {
        let budget = compute_budget(
            &pla_request(150.0, ClientTier::Wholesale),
            &PriceSettings::default(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(budget.base_cost * 3.0, 15750.0);
        assert_eq!(budget.printing_price, 15800.0);
    }

    #[test]
    fn test_design_and_post_process_costs() {
        let request = BudgetRequest {
            weight_grams: None,
            design_minutes: 30.0,
            post_process_minutes: 15.0,
            ..Default::default()
        };
        let budget = compute_budget(&request, &PriceSettings::default())
            .unwrap()
            .unwrap();
        assert_eq!(budget.design_cost, 4000.0);
        assert_eq!(budget.post_process_cost, 1750.0);
        assert_eq!(budget.printing_price, 0.0);
        assert_eq!(budget.final_price, 5750.0);
    }

    #[test]
    fn test_model_cost_is_added_flat() {
        let mut request = pla_request(150.0, ClientTier::Retail);
        request.model_cost = Some(2500.0);
        let budget = compute_budget(&request, &PriceSettings::default())
            .unwrap()
            .unwrap();
        assert_eq!(budget.final_price, 23500.0);
    }

    #[test]
    fn test_petg_uses_petg_price() {
        let mut request = pla_request(100.0, ClientTier::Retail);
        request.filament_type = FilamentType::Petg;
        let budget = compute_budget(&request, &PriceSettings::default())
            .unwrap()
            .unwrap();
        assert_eq!(budget.material_cost, 3200.0);
        // 3200 * 1.4 * 4 = 17920 -> 17900
        assert_eq!(budget.printing_price, 17900.0);
    }

    #[test]
    fn test_no_weight_no_time_is_no_result() {
        let request = BudgetRequest::default();
        assert_eq!(compute_budget(&request, &PriceSettings::default()), Ok(None));

        let model_only = BudgetRequest {
            model_cost: Some(1000.0),
            ..Default::default()
        };
        assert_eq!(compute_budget(&model_only, &PriceSettings::default()), Ok(None));
    }

    #[test]
    fn test_negative_inputs_rejected() {
        let err = compute_budget(&pla_request(-1.0, ClientTier::Retail), &PriceSettings::default())
            .unwrap_err();
        assert_eq!(
            err,
            PricingError::InvalidInput {
                field: "weightGrams",
                value: -1.0
            }
        );

        let mut request = pla_request(10.0, ClientTier::Retail);
        request.design_minutes = -5.0;
        assert!(compute_budget(&request, &PriceSettings::default()).is_err());

        request.design_minutes = f64::NAN;
        assert!(compute_budget(&request, &PriceSettings::default()).is_err());
    }

    #[test]
    fn test_request_accepts_spanish_client_labels() {
        let request: BudgetRequest = serde_json::from_value(serde_json::json!({
            "weightGrams": 150, "filamentType": "PLA", "clientType": "mayorista"
        }))
        .unwrap();
        assert_eq!(request.client_tier, ClientTier::Wholesale);
        assert_eq!(ClientTier::parse("Minorista"), Some(ClientTier::Retail));
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(21000.0), "21.000");
        assert_eq!(format_amount(999.0), "999");
        assert_eq!(format_amount(1234.5), "1.234,50");
        assert_eq!(format_amount(1_000_000.0), "1.000.000");
        assert_eq!(format_amount(0.0), "0");
    }

    #[test]
    fn test_client_quote_lists_non_zero_lines() {
        let mut request = pla_request(150.0, ClientTier::Retail);
        request.design_minutes = 30.0;
        let budget = compute_budget(&request, &PriceSettings::default())
            .unwrap()
            .unwrap();
        let quote = budget.client_quote(&request);

        assert!(quote.contains("Minorista"));
        assert!(quote.contains("Impresión PLA (150 g): $21.000"));
        assert!(quote.contains("Diseño: $4.000"));
        assert!(!quote.contains("Post-procesado"));
        assert!(quote.ends_with("Total: $25.000"));
    }

    proptest! {
        #[test]
        fn rounding_is_idempotent(value in 0.0f64..1.0e9) {
            let once = round_to_hundred(value);
            prop_assert_eq!(round_to_hundred(once), once);
        }

        #[test]
        fn monotonic_in_weight(
            w1 in 0.1f64..5000.0,
            extra in 0.0f64..5000.0,
            wholesale in any::<bool>(),
        ) {
            let tier = if wholesale { ClientTier::Wholesale } else { ClientTier::Retail };
            let settings = PriceSettings::default();
            let lighter = compute_budget(&pla_request(w1, tier), &settings).unwrap().unwrap();
            let heavier = compute_budget(&pla_request(w1 + extra, tier), &settings).unwrap().unwrap();
            prop_assert!(heavier.final_price >= lighter.final_price);
        }

        #[test]
        fn monotonic_in_filament_price(
            p1 in 0.0f64..100000.0,
            extra in 0.0f64..100000.0,
            weight in 0.1f64..2000.0,
        ) {
            let cheap = PriceSettings { pla_price_per_kg: p1, ..PriceSettings::default() };
            let dear = PriceSettings { pla_price_per_kg: p1 + extra, ..PriceSettings::default() };
            let request = pla_request(weight, ClientTier::Retail);
            let a = compute_budget(&request, &cheap).unwrap().unwrap();
            let b = compute_budget(&request, &dear).unwrap().unwrap();
            prop_assert!(b.final_price >= a.final_price);
        }
    }
}
