use serde::Serialize;

pub const DEFAULT_FLAT_TAX_RATE: f64 = 0.12;
pub const DEFAULT_ANNUAL_INFLATION_PCT: f64 = 13.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaxBracket {
    pub lower_exclusive: f64,
    pub upper_inclusive: f64,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaxRegime {
    Flat(f64),
    Progressive(Vec<TaxBracket>),
}

impl TaxRegime {
    pub fn flat() -> Self {
        TaxRegime::Flat(DEFAULT_FLAT_TAX_RATE)
    }

    pub fn progressive() -> Self {
        TaxRegime::Progressive(default_revenue_brackets())
    }
}

pub fn default_revenue_brackets() -> Vec<TaxBracket> {
    [
        (0.0, 360_000.0, 0.112),
        (360_000.0, 720_000.0, 0.135),
        (720_000.0, 1_800_000.0, 0.16),
        (1_800_000.0, 3_600_000.0, 0.21),
        (3_600_000.0, 4_800_000.0, 0.33),
    ]
    .into_iter()
    .map(|(lower_exclusive, upper_inclusive, rate)| TaxBracket {
        lower_exclusive,
        upper_inclusive,
        rate,
    })
    .collect()
}

#[derive(Debug, Clone)]
pub struct ServiceParams {
    pub name: String,
    pub unit_price: f64,
    pub unit_cost: f64,
    pub initial_quantity: u32,
    pub max_quantity: u32,
    pub commission_pct: f64,
    pub monthly_growth_pct: f64,
    pub initial_investment: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct MonthPoint {
    pub month: u32,
    pub quantity: f64,
    pub unit_price: f64,
    pub unit_cost: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRecord {
    pub month: u32,
    pub label: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub unit_cost: f64,
    pub gross_revenue: f64,
    pub total_cost: f64,
    pub commission: f64,
    pub tax: f64,
    pub net_revenue: f64,
    pub gross_profit: f64,
    pub cumulative_profit: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedRecord {
    pub month: u32,
    pub label: String,
    pub gross_revenue: f64,
    pub total_cost: f64,
    pub commission: f64,
    pub tax: f64,
    pub net_revenue: f64,
    pub gross_profit: f64,
    pub cumulative_profit: f64,
}

#[derive(Debug, Clone)]
pub struct ProjectionResult {
    pub service: String,
    pub records: Vec<MonthlyRecord>,
    pub total_revenue: f64,
    pub total_tax: f64,
    pub effective_rate: f64,
    pub initial_investment: f64,
    pub payback_month: Option<u32>,
    pub out_of_bracket: bool,
}

#[derive(Debug, Clone)]
pub struct AggregatedResult {
    pub records: Vec<AggregatedRecord>,
    pub total_revenue: f64,
    pub total_tax: f64,
    pub total_cost: f64,
    pub total_commission: f64,
    pub total_net_revenue: f64,
    pub total_profit: f64,
    pub effective_rate: f64,
    pub total_investment: f64,
    pub payback_month: Option<u32>,
    pub out_of_bracket: bool,
}

pub fn month_label(month: u32) -> String {
    format!("M{month}")
}
