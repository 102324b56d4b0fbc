//! Closed-form valuation helpers. Everything here works on unrounded `f64`;
//! rounding to cents happens once, when a result leaves the engine.

/// Equivalent monthly rate for an annual rate under geometric compounding.
pub fn monthly_rate(annual_rate: f64) -> f64 {
    (1.0 + annual_rate).powf(1.0 / 12.0) - 1.0
}

pub fn future_value_lump_sum(principal: f64, annual_rate: f64, years: f64) -> f64 {
    principal * (1.0 + annual_rate).powf(years)
}

/// Ordinary annuity: payments land at the end of each month.
pub fn future_value_annuity(payment: f64, monthly_rate: f64, total_months: u32) -> f64 {
    if monthly_rate == 0.0 {
        return payment * total_months as f64;
    }
    payment * ((1.0 + monthly_rate).powf(total_months as f64) - 1.0) / monthly_rate
}

/// Lump sum plus monthly contributions after `years` whole years.
pub fn portfolio_growth(
    initial_amount: f64,
    monthly_contribution: f64,
    annual_rate: f64,
    years: u32,
) -> f64 {
    future_value_lump_sum(initial_amount, annual_rate, years as f64)
        + future_value_annuity(monthly_contribution, monthly_rate(annual_rate), years * 12)
}

pub fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
