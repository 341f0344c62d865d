//! Quote calculator: filament cost with overhead and markup, plus labour.

mod budget;
mod settings;

pub use budget::{
    compute_budget, format_amount, round_to_hundred, Budget, BudgetRequest, ClientTier,
    PricingError, OVERHEAD_PERCENT, RETAIL_MULTIPLIER, WHOLESALE_MULTIPLIER,
};
pub use settings::{
    PriceSettings, PriceUpdate, DEFAULT_DESIGN_PRICE, DEFAULT_PETG_PRICE, DEFAULT_PLA_PRICE,
    DEFAULT_POST_PROCESS_PRICE,
};
