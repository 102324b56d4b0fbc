use super::types::{
    AccumulationRequest, GraphData, GrowthDataset, Money, PerPortfolio, Portfolio,
    PortfolioScenario, ProjectionConfig, ProjectionResult, WithdrawalProjection,
    WithdrawalRequest, WithdrawalScenario,
};
use super::valuation::{monthly_rate, portfolio_growth};

const MONTHS_PER_YEAR: u32 = 12;

/// Accumulation projections and drawdown simulations over a fixed portfolio
/// table. Stateless apart from the configuration it was built with.
#[derive(Debug, Clone, Default)]
pub struct ProjectionEngine {
    config: ProjectionConfig,
}

impl ProjectionEngine {
    pub fn new(config: ProjectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }

    /// Expects `desired_age > current_age`; the validator guarantees it.
    pub fn project_accumulation(&self, request: &AccumulationRequest) -> ProjectionResult {
        let years = request.years();
        let total_contributions = total_contributions_series(
            request.initial_amount,
            request.monthly_contribution,
            years,
        );
        let contributed_at_horizon = total_contributions
            .last()
            .copied()
            .unwrap_or(request.initial_amount);

        let mut scenarios = Vec::with_capacity(3);
        let mut datasets = Vec::with_capacity(3);
        for portfolio in self.config.portfolios() {
            let fv = Money::round(portfolio_growth(
                request.initial_amount,
                request.monthly_contribution,
                portfolio.annual_rate,
                years,
            ));
            scenarios.push(PortfolioScenario {
                name: portfolio.name,
                key: portfolio.key,
                fv,
                color: portfolio.color,
                total_contributed: Money::round(contributed_at_horizon),
                interest_earned: Money::round(fv.value() - contributed_at_horizon),
            });
            datasets.push(GrowthDataset {
                label: portfolio.name,
                key: portfolio.key,
                color: portfolio.color,
                data: yearly_growth_series(request, portfolio, years),
            });
        }

        let labels = (0..=years)
            .map(|year| format!("{} years", request.current_age + year))
            .collect();

        ProjectionResult {
            scenarios,
            graph_data: GraphData { labels, datasets },
            total_contributions_data: total_contributions.into_iter().map(Money::exact).collect(),
        }
    }

    pub fn project_withdrawal_scenarios(
        &self,
        request: &WithdrawalRequest,
    ) -> WithdrawalProjection {
        let max_age = self.config.max_age;
        let max_years = max_age.saturating_sub(request.retirement_age);

        let scenarios = self
            .config
            .withdrawal_tiers
            .iter()
            .map(|&withdrawal| {
                let balances = request.funding.map(|funding| {
                    simulate_withdrawal(
                        funding.accumulated_value,
                        withdrawal,
                        funding.annual_rate,
                        max_years,
                    )
                });
                let depletion_age = balances
                    .map(|series| depletion_age(series, request.retirement_age, max_age));
                WithdrawalScenario {
                    withdrawal,
                    balances,
                    depletion_age,
                }
            })
            .collect();

        WithdrawalProjection {
            scenarios,
            retirement_age: request.retirement_age,
            max_age,
        }
    }

    pub fn portfolio_rates(&self) -> PerPortfolio<f64> {
        self.config.rates()
    }
}

fn yearly_growth_series(
    request: &AccumulationRequest,
    portfolio: &Portfolio,
    years: u32,
) -> Vec<Money> {
    let mut data = Vec::with_capacity(years as usize + 1);
    data.push(Money::exact(request.initial_amount));
    for year in 1..=years {
        data.push(Money::round(portfolio_growth(
            request.initial_amount,
            request.monthly_contribution,
            portfolio.annual_rate,
            year,
        )));
    }
    data
}

fn total_contributions_series(
    initial_amount: f64,
    monthly_contribution: f64,
    years: u32,
) -> Vec<f64> {
    (0..=years)
        .map(|year| initial_amount + monthly_contribution * (MONTHS_PER_YEAR * year) as f64)
        .collect()
}

/// Year-by-year balance under a level monthly withdrawal. Entry 0 is the
/// starting balance; once a year ends at zero every later entry is zero.
pub fn simulate_withdrawal(
    initial_balance: f64,
    withdrawal_amount: f64,
    annual_rate: f64,
    max_years: u32,
) -> Vec<Money> {
    let rate = monthly_rate(annual_rate);
    let mut balances = Vec::with_capacity(max_years as usize + 1);
    balances.push(Money::exact(initial_balance));

    let mut balance = initial_balance;
    for _ in 1..=max_years {
        if balance <= 0.0 {
            balance = 0.0;
            balances.push(Money::exact(0.0));
            continue;
        }
        for _ in 0..MONTHS_PER_YEAR {
            balance = (balance * (1.0 + rate) - withdrawal_amount).max(0.0);
        }
        let recorded = Money::round(balance);
        // A year recorded as zero ends the drawdown, even if sub-cent dust remains.
        if recorded.value() <= 0.0 {
            balance = 0.0;
        }
        balances.push(recorded);
    }
    balances
}

/// First age whose recorded balance is at or below zero, if any before `max_age`.
pub fn depletion_age(balances: &[Money], retirement_age: u32, max_age: u32) -> Option<u32> {
    let index = balances.iter().position(|b| b.value() <= 0.0)?;
    let age = retirement_age + index as u32;
    (age <= max_age).then_some(age)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{PortfolioFunding, PortfolioKey};
    use crate::core::valuation::{future_value_annuity, round_to_cents};
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    fn assert_approx(actual: f64, expected: f64) {
        assert_approx_tol(actual, expected, 1e-6);
    }

    fn assert_approx_tol(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn sample_request() -> AccumulationRequest {
        AccumulationRequest {
            current_age: 30,
            desired_age: 60,
            initial_amount: 5_000.0,
            monthly_contribution: 1_000.0,
        }
    }

    fn uniform_withdrawal_request(value: f64, rate: f64, retirement_age: u32) -> WithdrawalRequest {
        WithdrawalRequest {
            funding: PerPortfolio::from_fn(|_| PortfolioFunding {
                accumulated_value: value,
                annual_rate: rate,
            }),
            retirement_age,
        }
    }

    fn values(series: &[Money]) -> Vec<f64> {
        series.iter().map(|m| m.value()).collect()
    }

    #[test]
    fn oracle_conservative_thirty_year_projection_matches_hand_calculation() {
        let engine = ProjectionEngine::default();
        let result = engine.project_accumulation(&sample_request());

        let r = 1.06_f64.powf(1.0 / 12.0) - 1.0;
        let expected = 5_000.0 * 1.06_f64.powf(30.0) + 1_000.0 * (1.06_f64.powf(30.0) - 1.0) / r;
        let conservative = &result.scenarios[0];
        assert_eq!(conservative.key, PortfolioKey::Conservative);
        assert_approx_tol(conservative.fv.value(), round_to_cents(expected), 0.011);
        assert_approx_tol(conservative.fv.value(), 1_003_230.43, 0.05);
    }

    #[test]
    fn scenarios_follow_fixed_portfolio_order() {
        let engine = ProjectionEngine::default();
        let result = engine.project_accumulation(&sample_request());

        let keys: Vec<_> = result.scenarios.iter().map(|s| s.key).collect();
        assert_eq!(keys, PortfolioKey::ALL.to_vec());
        let dataset_keys: Vec<_> = result.graph_data.datasets.iter().map(|d| d.key).collect();
        assert_eq!(dataset_keys, PortfolioKey::ALL.to_vec());
        assert!(result.scenarios[0].fv < result.scenarios[1].fv);
        assert!(result.scenarios[1].fv < result.scenarios[2].fv);
    }

    #[test]
    fn yearly_series_shape_and_endpoints() {
        let engine = ProjectionEngine::default();
        let request = sample_request();
        let result = engine.project_accumulation(&request);

        assert_eq!(result.graph_data.labels.len(), 31);
        assert_eq!(result.graph_data.labels[0], "30 years");
        assert_eq!(result.graph_data.labels[30], "60 years");
        for (scenario, dataset) in result.scenarios.iter().zip(&result.graph_data.datasets) {
            assert_eq!(dataset.data.len(), 31);
            assert_eq!(dataset.data[0].value(), 5_000.0);
            assert_eq!(dataset.data[30], scenario.fv);
        }
    }

    #[test]
    fn total_contributions_are_a_straight_line() {
        let engine = ProjectionEngine::default();
        let result = engine.project_accumulation(&sample_request());

        let data = values(&result.total_contributions_data);
        assert_eq!(data.len(), 31);
        assert_eq!(data[0], 5_000.0);
        assert_eq!(data[1], 17_000.0);
        assert_eq!(data[30], 365_000.0);
        for scenario in &result.scenarios {
            assert_eq!(scenario.total_contributed.value(), 365_000.0);
            assert_approx_tol(
                scenario.interest_earned.value(),
                scenario.fv.value() - 365_000.0,
                0.011,
            );
        }
    }

    #[test]
    fn one_year_horizon_with_zero_contribution_grows_lump_sum_only() {
        let engine = ProjectionEngine::default();
        let request = AccumulationRequest {
            current_age: 64,
            desired_age: 65,
            initial_amount: 10_000.0,
            monthly_contribution: 0.0,
        };
        let result = engine.project_accumulation(&request);
        assert_approx(result.scenarios[0].fv.value(), 10_600.0);
        assert_approx(result.scenarios[1].fv.value(), 10_850.0);
        assert_approx(result.scenarios[2].fv.value(), 11_100.0);
        assert_eq!(values(&result.total_contributions_data), vec![10_000.0, 10_000.0]);
    }

    #[test]
    fn zero_rate_portfolio_accumulates_plain_contributions() {
        let mut config = ProjectionConfig::default();
        config.portfolios.conservative.annual_rate = 0.0;
        let engine = ProjectionEngine::new(config);
        let request = AccumulationRequest {
            current_age: 40,
            desired_age: 42,
            initial_amount: 100.0,
            monthly_contribution: 50.0,
        };
        let result = engine.project_accumulation(&request);
        assert_eq!(values(&result.graph_data.datasets[0].data), vec![100.0, 700.0, 1_300.0]);
        assert_eq!(result.scenarios[0].interest_earned.value(), 0.0);
    }

    #[test]
    fn simulate_withdrawal_oracle_single_year() {
        let rate = 0.06;
        let series = simulate_withdrawal(100_000.0, 1_000.0, rate, 1);

        let r = 1.06_f64.powf(1.0 / 12.0) - 1.0;
        let mut expected = 100_000.0;
        for _ in 0..12 {
            expected = expected * (1.0 + r) - 1_000.0;
        }
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].value(), 100_000.0);
        assert_approx_tol(series[1].value(), round_to_cents(expected), 1e-9);
        // 106_000 minus the annuity value of twelve withdrawals
        assert_approx_tol(
            series[1].value(),
            106_000.0 - future_value_annuity(1_000.0, r, 12),
            0.006,
        );
    }

    #[test]
    fn simulate_withdrawal_keeps_unrounded_starting_balance() {
        let series = simulate_withdrawal(1_234.567, 0.0, 0.0, 2);
        assert_eq!(values(&series), vec![1_234.567, 1_234.57, 1_234.57]);
    }

    #[test]
    fn simulate_withdrawal_depletes_and_stays_at_zero() {
        let series = simulate_withdrawal(20_000.0, 1_000.0, 0.06, 5);
        let data = values(&series);
        assert_eq!(data.len(), 6);
        assert_approx_tol(data[1], 8_873.47, 0.011);
        assert_eq!(&data[2..], &[0.0, 0.0, 0.0, 0.0]);
        assert_eq!(depletion_age(&series, 65, 110), Some(67));
    }

    #[test]
    fn simulate_withdrawal_with_zero_starting_balance_is_all_zero() {
        let series = simulate_withdrawal(0.0, 5_000.0, 0.11, 3);
        assert_eq!(values(&series), vec![0.0, 0.0, 0.0, 0.0]);
        assert_eq!(depletion_age(&series, 70, 110), Some(70));
    }

    #[test]
    fn depletion_age_is_none_when_money_lasts() {
        let series = simulate_withdrawal(10_000_000.0, 2_500.0, 0.085, 45);
        assert_eq!(depletion_age(&series, 65, 110), None);
    }

    #[test]
    fn withdrawal_scenarios_cover_every_tier_and_portfolio() {
        let engine = ProjectionEngine::default();
        let request = WithdrawalRequest {
            funding: PerPortfolio {
                conservative: PortfolioFunding {
                    accumulated_value: 1_000_000.0,
                    annual_rate: 0.06,
                },
                moderate: PortfolioFunding {
                    accumulated_value: 1_500_000.0,
                    annual_rate: 0.085,
                },
                aggressive: PortfolioFunding {
                    accumulated_value: 2_000_000.0,
                    annual_rate: 0.11,
                },
            },
            retirement_age: 60,
        };
        let projection = engine.project_withdrawal_scenarios(&request);

        assert_eq!(projection.retirement_age, 60);
        assert_eq!(projection.max_age, 110);
        let tiers: Vec<_> = projection.scenarios.iter().map(|s| s.withdrawal).collect();
        assert_eq!(tiers, vec![2_500.0, 5_000.0, 7_500.0, 10_000.0, 12_000.0, 15_000.0]);
        for scenario in &projection.scenarios {
            for key in PortfolioKey::ALL {
                let series = scenario.balances.get(key);
                assert_eq!(series.len(), 51);
                assert_eq!(series[0].value(), request.funding.get(key).accumulated_value);
            }
        }

        let expected = simulate_withdrawal(1_500_000.0, 7_500.0, 0.085, 50);
        assert_eq!(projection.scenarios[2].balances.moderate, expected);
    }

    #[test]
    fn retirement_at_max_age_yields_single_entry_series() {
        let engine = ProjectionEngine::default();
        let projection =
            engine.project_withdrawal_scenarios(&uniform_withdrawal_request(50_000.0, 0.06, 110));
        for scenario in &projection.scenarios {
            assert_eq!(values(&scenario.balances.aggressive), vec![50_000.0]);
        }
    }

    #[test]
    fn custom_config_tiers_and_max_age_are_honoured() {
        let config = ProjectionConfig {
            withdrawal_tiers: vec![1_000.0],
            max_age: 90,
            ..ProjectionConfig::default()
        };
        let engine = ProjectionEngine::new(config);
        let projection =
            engine.project_withdrawal_scenarios(&uniform_withdrawal_request(10_000.0, 0.0, 80));
        assert_eq!(projection.scenarios.len(), 1);
        assert_eq!(projection.max_age, 90);
        let data = values(&projection.scenarios[0].balances.conservative);
        assert_eq!(data, vec![10_000.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(projection.scenarios[0].depletion_age.conservative, Some(81));
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]

        #[test]
        fn yearly_series_length_and_endpoints_hold(
            current_age in 18u32..80,
            span in 1u32..60,
            initial in 0.0f64..500_000.0,
            monthly in 0.0f64..20_000.0,
        ) {
            let request = AccumulationRequest {
                current_age,
                desired_age: current_age + span,
                initial_amount: initial,
                monthly_contribution: monthly,
            };
            let result = ProjectionEngine::default().project_accumulation(&request);
            prop_assert_eq!(result.graph_data.labels.len(), span as usize + 1);
            prop_assert_eq!(result.total_contributions_data.len(), span as usize + 1);
            for (scenario, dataset) in result.scenarios.iter().zip(&result.graph_data.datasets) {
                prop_assert_eq!(dataset.data.len(), span as usize + 1);
                prop_assert_eq!(dataset.data[0].value(), initial);
                let last = dataset.data[span as usize].value();
                prop_assert!((last - scenario.fv.value()).abs() <= 0.011);
            }
        }

        #[test]
        fn depletion_is_absorbing(
            initial in 0.0f64..2_000_000.0,
            withdrawal in 0.0f64..20_000.0,
            rate in 0.0f64..0.2,
            years in 0u32..60,
        ) {
            let series = simulate_withdrawal(initial, withdrawal, rate, years);
            prop_assert_eq!(series.len(), years as usize + 1);
            if let Some(first_zero) = series.iter().position(|b| b.value() <= 0.0) {
                for balance in &series[first_zero..] {
                    prop_assert_eq!(balance.value(), 0.0);
                }
            }
            for balance in &series {
                prop_assert!(balance.value() >= 0.0);
            }
        }

        #[test]
        fn zero_withdrawal_is_pure_growth(
            initial in 0.0f64..2_000_000.0,
            rate in 0.0f64..0.2,
            years in 0u32..60,
        ) {
            let series = simulate_withdrawal(initial, 0.0, rate, years);
            let last = series[years as usize].value();
            let grown = initial * (1.0 + rate).powf(years as f64);
            prop_assert!((last - grown).abs() <= 0.005 + grown * 1e-9);
        }

        #[test]
        fn larger_withdrawals_never_leave_more_money(
            initial in 0.0f64..2_000_000.0,
            withdrawal in 0.0f64..15_000.0,
            extra in 0.0f64..5_000.0,
            rate in 0.0f64..0.2,
        ) {
            let small = simulate_withdrawal(initial, withdrawal, rate, 30);
            let large = simulate_withdrawal(initial, withdrawal + extra, rate, 30);
            for (s, l) in small.iter().zip(&large) {
                prop_assert!(l.value() <= s.value());
            }
        }
    }
}
