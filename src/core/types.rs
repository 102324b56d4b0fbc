use serde::{Serialize, Serializer};

use super::valuation::round_to_cents;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PortfolioKey {
    Conservative,
    Moderate,
    Aggressive,
}

impl PortfolioKey {
    /// Fixed portfolio order. Scenario lists and chart datasets follow it.
    pub const ALL: [PortfolioKey; 3] = [
        PortfolioKey::Conservative,
        PortfolioKey::Moderate,
        PortfolioKey::Aggressive,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PortfolioKey::Conservative => "conservative",
            PortfolioKey::Moderate => "moderate",
            PortfolioKey::Aggressive => "aggressive",
        }
    }
}

/// One value per portfolio, addressed by key instead of array position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PerPortfolio<T> {
    pub conservative: T,
    pub moderate: T,
    pub aggressive: T,
}

impl<T> PerPortfolio<T> {
    pub fn from_fn(mut f: impl FnMut(PortfolioKey) -> T) -> Self {
        Self {
            conservative: f(PortfolioKey::Conservative),
            moderate: f(PortfolioKey::Moderate),
            aggressive: f(PortfolioKey::Aggressive),
        }
    }

    /// Values listed in `PortfolioKey::ALL` order.
    pub fn from_ordered([conservative, moderate, aggressive]: [T; 3]) -> Self {
        Self {
            conservative,
            moderate,
            aggressive,
        }
    }

    pub fn get(&self, key: PortfolioKey) -> &T {
        match key {
            PortfolioKey::Conservative => &self.conservative,
            PortfolioKey::Moderate => &self.moderate,
            PortfolioKey::Aggressive => &self.aggressive,
        }
    }

    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> PerPortfolio<U> {
        PerPortfolio::from_fn(|key| f(self.get(key)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AllocationSlice {
    pub category: &'static str,
    pub percentage: u32,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    pub key: PortfolioKey,
    pub name: &'static str,
    pub annual_rate: f64,
    pub color: &'static str,
    pub composition: &'static [AllocationSlice],
}

const CONSERVATIVE_COMPOSITION: &[AllocationSlice] = &[
    AllocationSlice {
        category: "Fixed Income",
        percentage: 90,
        color: "#3498db",
    },
    AllocationSlice {
        category: "Domestic Equities",
        percentage: 10,
        color: "#2980b9",
    },
];

const MODERATE_COMPOSITION: &[AllocationSlice] = &[
    AllocationSlice {
        category: "Fixed Income",
        percentage: 70,
        color: "#f39c12",
    },
    AllocationSlice {
        category: "Domestic Equities",
        percentage: 20,
        color: "#e67e22",
    },
    AllocationSlice {
        category: "US Equities",
        percentage: 10,
        color: "#d35400",
    },
];

const AGGRESSIVE_COMPOSITION: &[AllocationSlice] = &[
    AllocationSlice {
        category: "Fixed Income",
        percentage: 30,
        color: "#e74c3c",
    },
    AllocationSlice {
        category: "Domestic Equities",
        percentage: 30,
        color: "#c0392b",
    },
    AllocationSlice {
        category: "US Equities",
        percentage: 20,
        color: "#a93226",
    },
    AllocationSlice {
        category: "Crypto and Alternatives",
        percentage: 20,
        color: "#922b21",
    },
];

pub const DEFAULT_MAX_AGE: u32 = 110;
pub const DEFAULT_WITHDRAWAL_TIERS: [f64; 6] =
    [2_500.0, 5_000.0, 7_500.0, 10_000.0, 12_000.0, 15_000.0];

/// Fixed portfolio table, withdrawal tiers and max age. Built once and handed
/// to the engine; nothing mutates it afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionConfig {
    pub portfolios: PerPortfolio<Portfolio>,
    pub withdrawal_tiers: Vec<f64>,
    pub max_age: u32,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            portfolios: PerPortfolio {
                conservative: Portfolio {
                    key: PortfolioKey::Conservative,
                    name: "Conservative Portfolio",
                    annual_rate: 0.06,
                    color: "#3498db",
                    composition: CONSERVATIVE_COMPOSITION,
                },
                moderate: Portfolio {
                    key: PortfolioKey::Moderate,
                    name: "Moderate Portfolio",
                    annual_rate: 0.085,
                    color: "#f39c12",
                    composition: MODERATE_COMPOSITION,
                },
                aggressive: Portfolio {
                    key: PortfolioKey::Aggressive,
                    name: "Aggressive Portfolio",
                    annual_rate: 0.11,
                    color: "#e74c3c",
                    composition: AGGRESSIVE_COMPOSITION,
                },
            },
            withdrawal_tiers: DEFAULT_WITHDRAWAL_TIERS.to_vec(),
            max_age: DEFAULT_MAX_AGE,
        }
    }
}

impl ProjectionConfig {
    pub fn portfolios(&self) -> impl Iterator<Item = &Portfolio> {
        PortfolioKey::ALL.into_iter().map(|key| self.portfolios.get(key))
    }

    pub fn rates(&self) -> PerPortfolio<f64> {
        self.portfolios.map(|p| p.annual_rate)
    }
}

/// Monetary amount as handed to callers. Computation stays in raw `f64`; a
/// `Money` is either rounded to cents or a caller-supplied amount echoed back.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Money(f64);

impl Money {
    pub fn round(value: f64) -> Self {
        Money(round_to_cents(value))
    }

    pub fn exact(value: f64) -> Self {
        Money(value)
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccumulationRequest {
    pub current_age: u32,
    pub desired_age: u32,
    pub initial_amount: f64,
    pub monthly_contribution: f64,
}

impl AccumulationRequest {
    pub fn years(&self) -> u32 {
        self.desired_age - self.current_age
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioScenario {
    pub name: &'static str,
    pub key: PortfolioKey,
    pub fv: Money,
    pub color: &'static str,
    pub total_contributed: Money,
    pub interest_earned: Money,
}

#[derive(Debug, Clone, Serialize)]
pub struct GrowthDataset {
    pub label: &'static str,
    pub key: PortfolioKey,
    pub color: &'static str,
    pub data: Vec<Money>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphData {
    pub labels: Vec<String>,
    pub datasets: Vec<GrowthDataset>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionResult {
    pub scenarios: Vec<PortfolioScenario>,
    pub graph_data: GraphData,
    pub total_contributions_data: Vec<Money>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortfolioFunding {
    pub accumulated_value: f64,
    pub annual_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WithdrawalRequest {
    pub funding: PerPortfolio<PortfolioFunding>,
    pub retirement_age: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalScenario {
    pub withdrawal: f64,
    #[serde(flatten)]
    pub balances: PerPortfolio<Vec<Money>>,
    pub depletion_age: PerPortfolio<Option<u32>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalProjection {
    pub scenarios: Vec<WithdrawalScenario>,
    pub retirement_age: u32,
    pub max_age: u32,
}
