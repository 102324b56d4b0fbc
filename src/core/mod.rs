mod engine;
mod types;
mod validation;
mod valuation;

pub use engine::{ProjectionEngine, depletion_age, simulate_withdrawal};
pub use types::{
    AccumulationRequest, AllocationSlice, DEFAULT_MAX_AGE, DEFAULT_WITHDRAWAL_TIERS, GraphData,
    GrowthDataset, Money, PerPortfolio, Portfolio, PortfolioFunding, PortfolioKey,
    PortfolioScenario, ProjectionConfig, ProjectionResult, WithdrawalProjection,
    WithdrawalRequest, WithdrawalScenario,
};
pub use validation::{
    AccumulationPayload, ValidationReport, ValidationRules, WithdrawalPayload,
    validate_accumulation, validate_withdrawal,
};
pub use valuation::{
    future_value_annuity, future_value_lump_sum, monthly_rate, portfolio_growth, round_to_cents,
};
