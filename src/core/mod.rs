mod engine;
mod scenario;
mod types;

pub use engine::{
    TaxResolution, aggregate, compound_monthly_rate, generate_monthly_series,
    monthly_inflation_rate, project, resolve_tax_rate,
};
pub use scenario::{
    SCENARIO_RATE_SHIFT, ScenarioPoint, ScenarioSet, default_base_rates, project_scenarios,
};
pub use types::{
    AggregatedRecord, AggregatedResult, DEFAULT_ANNUAL_INFLATION_PCT, DEFAULT_FLAT_TAX_RATE,
    MonthPoint, MonthlyRecord, ProjectionResult, ServiceParams, TaxBracket, TaxRegime,
    default_revenue_brackets, month_label,
};
