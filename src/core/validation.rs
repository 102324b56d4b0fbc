//! Request validation. Raw payloads keep every field as untyped JSON so a
//! wrong type is reported alongside every other violation instead of aborting
//! the parse. A valid payload converts into the typed request the engine takes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::types::{AccumulationRequest, PerPortfolio, PortfolioFunding, WithdrawalRequest};

/// Every rule a payload broke, in check order. Empty means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Error)]
#[error("validation failed: {}", .errors.join("; "))]
pub struct ValidationReport {
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn push(&mut self, message: String) {
        self.errors.push(message);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationRules {
    pub min_current_age: u32,
    pub max_current_age: u32,
    pub max_desired_age: u32,
    /// Lowest accepted desired age, if any.
    pub retirement_age_floor: Option<u32>,
    pub min_retirement_age: u32,
    pub max_retirement_age: u32,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            min_current_age: 18,
            max_current_age: 80,
            max_desired_age: 100,
            retirement_age_floor: Some(50),
            min_retirement_age: 50,
            max_retirement_age: 100,
        }
    }
}

impl ValidationRules {
    /// Only requires the desired age to come after the current age.
    pub fn lenient() -> Self {
        Self {
            retirement_age_floor: None,
            ..Self::default()
        }
    }

    fn desired_age_message(&self) -> String {
        match self.retirement_age_floor {
            Some(floor) => format!(
                "Desired age must be greater than current age, at least {floor} and at most {}",
                self.max_desired_age
            ),
            None => format!(
                "Desired age must be greater than current age and at most {}",
                self.max_desired_age
            ),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AccumulationPayload {
    pub current_age: Option<Value>,
    pub desired_age: Option<Value>,
    pub initial_amount: Option<Value>,
    pub monthly_contribution: Option<Value>,
}

impl AccumulationPayload {
    pub fn into_request(
        self,
        rules: &ValidationRules,
    ) -> Result<AccumulationRequest, ValidationReport> {
        let mut report = ValidationReport::default();

        let current_age = integer(self.current_age.as_ref())
            .filter(|&age| in_range(age, rules.min_current_age, rules.max_current_age));
        if current_age.is_none() {
            report.push(format!(
                "Current age must be an integer between {} and {}",
                rules.min_current_age, rules.max_current_age
            ));
        }

        // Compared against whatever number was sent, even an out-of-range one.
        let current_for_comparison = finite_number(self.current_age.as_ref());
        let desired_age = integer(self.desired_age.as_ref()).filter(|&age| {
            let after_current = current_for_comparison.is_none_or(|current| age as f64 > current);
            let above_floor = rules
                .retirement_age_floor
                .is_none_or(|floor| age >= i64::from(floor));
            after_current && above_floor && age <= i64::from(rules.max_desired_age)
        });
        if desired_age.is_none() {
            report.push(rules.desired_age_message());
        }

        let monthly_contribution =
            finite_number(self.monthly_contribution.as_ref()).filter(|&v| v >= 0.0);
        if monthly_contribution.is_none() {
            report.push("Monthly contribution must be a non-negative number".to_string());
        }

        let initial_amount = match self.initial_amount.as_ref() {
            None => Some(0.0),
            Some(value) => finite_number(Some(value)).filter(|&v| v >= 0.0),
        };
        if initial_amount.is_none() {
            report.push("Initial amount must be a non-negative number".to_string());
        }

        match (current_age, desired_age, monthly_contribution, initial_amount) {
            (Some(current_age), Some(desired_age), Some(monthly_contribution), Some(initial_amount))
                if report.is_valid() && desired_age > current_age =>
            {
                Ok(AccumulationRequest {
                    current_age: current_age as u32,
                    desired_age: desired_age as u32,
                    initial_amount,
                    monthly_contribution,
                })
            }
            _ => Err(report),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WithdrawalPayload {
    pub accumulated_values: Option<Value>,
    pub rates: Option<Value>,
    pub retirement_age: Option<Value>,
}

impl WithdrawalPayload {
    /// `accumulatedValues[i]` and `rates[i]` belong to the i-th portfolio in
    /// `PortfolioKey::ALL` order.
    pub fn into_request(
        self,
        rules: &ValidationRules,
    ) -> Result<WithdrawalRequest, ValidationReport> {
        let mut report = ValidationReport::default();

        let accumulated = portfolio_triplet(
            self.accumulated_values.as_ref(),
            &mut report,
            "accumulatedValues must be an array with 3 elements",
            |v| v >= 0.0,
            |index| format!("Accumulated value {index} must be a non-negative number"),
        );
        let rates = portfolio_triplet(
            self.rates.as_ref(),
            &mut report,
            "rates must be an array with 3 elements",
            |v| (0.0..=1.0).contains(&v),
            |index| format!("Rate {index} must be a number between 0 and 1"),
        );

        let retirement_age = integer(self.retirement_age.as_ref())
            .filter(|&age| in_range(age, rules.min_retirement_age, rules.max_retirement_age));
        if retirement_age.is_none() {
            report.push(format!(
                "Retirement age must be an integer between {} and {}",
                rules.min_retirement_age, rules.max_retirement_age
            ));
        }

        match (accumulated, rates, retirement_age) {
            (Some(accumulated), Some(rates), Some(retirement_age)) if report.is_valid() => {
                let accumulated = PerPortfolio::from_ordered(accumulated);
                let rates = PerPortfolio::from_ordered(rates);
                Ok(WithdrawalRequest {
                    funding: PerPortfolio::from_fn(|key| PortfolioFunding {
                        accumulated_value: *accumulated.get(key),
                        annual_rate: *rates.get(key),
                    }),
                    retirement_age: retirement_age as u32,
                })
            }
            _ => Err(report),
        }
    }
}

pub fn validate_accumulation(
    payload: &AccumulationPayload,
    rules: &ValidationRules,
) -> ValidationReport {
    payload.clone().into_request(rules).err().unwrap_or_default()
}

pub fn validate_withdrawal(payload: &WithdrawalPayload, rules: &ValidationRules) -> ValidationReport {
    payload.clone().into_request(rules).err().unwrap_or_default()
}

fn finite_number(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64).filter(|v| v.is_finite())
}

/// Whole JSON numbers only; `30.0` counts, `30.5` and `"30"` do not.
fn integer(value: Option<&Value>) -> Option<i64> {
    let v = finite_number(value)?;
    (v.fract() == 0.0 && v.abs() <= i64::MAX as f64).then_some(v as i64)
}

fn in_range(value: i64, min: u32, max: u32) -> bool {
    (i64::from(min)..=i64::from(max)).contains(&value)
}

fn portfolio_triplet(
    value: Option<&Value>,
    report: &mut ValidationReport,
    shape_message: &str,
    accept: impl Fn(f64) -> bool,
    element_message: impl Fn(usize) -> String,
) -> Option<[f64; 3]> {
    let Some(items) = value.and_then(Value::as_array).filter(|items| items.len() == 3) else {
        report.push(shape_message.to_string());
        return None;
    };

    let mut parsed = [0.0; 3];
    let mut all_valid = true;
    for (index, item) in items.iter().enumerate() {
        match finite_number(Some(item)).filter(|&v| accept(v)) {
            Some(v) => parsed[index] = v,
            None => {
                report.push(element_message(index + 1));
                all_valid = false;
            }
        }
    }
    all_valid.then_some(parsed)
}
