use serde::Serialize;

use super::engine::compound_monthly_rate;
use super::types::month_label;

pub const SCENARIO_RATE_SHIFT: f64 = 0.20;
pub const MONTHS_PER_RATE: u32 = 12;

pub fn default_base_rates() -> Vec<f64> {
    vec![0.25, 0.20, 0.20]
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioPoint {
    pub month: u32,
    pub label: String,
    pub quantity: f64,
}

#[derive(Debug, Clone)]
pub struct ScenarioSet {
    pub initial_quantity: f64,
    pub conservative_rates: Vec<f64>,
    pub optimistic_rates: Vec<f64>,
    pub pessimistic_rates: Vec<f64>,
    pub conservative: Vec<ScenarioPoint>,
    pub optimistic: Vec<ScenarioPoint>,
    pub pessimistic: Vec<ScenarioPoint>,
}

pub fn project_scenarios(initial_quantity: f64, base_annual_rates: &[f64]) -> ScenarioSet {
    let conservative_rates = base_annual_rates.to_vec();
    let optimistic_rates: Vec<f64> = base_annual_rates
        .iter()
        .map(|rate| rate + SCENARIO_RATE_SHIFT)
        .collect();
    let pessimistic_rates: Vec<f64> = base_annual_rates
        .iter()
        .map(|rate| (rate - SCENARIO_RATE_SHIFT).max(0.0))
        .collect();

    ScenarioSet {
        initial_quantity,
        conservative: growth_series(initial_quantity, &conservative_rates),
        optimistic: growth_series(initial_quantity, &optimistic_rates),
        pessimistic: growth_series(initial_quantity, &pessimistic_rates),
        conservative_rates,
        optimistic_rates,
        pessimistic_rates,
    }
}

fn growth_series(initial_quantity: f64, annual_rates: &[f64]) -> Vec<ScenarioPoint> {
    let mut quantity = initial_quantity;
    let mut points = Vec::with_capacity(annual_rates.len() * MONTHS_PER_RATE as usize);
    for (year_index, annual_rate) in annual_rates.iter().enumerate() {
        let monthly_rate = compound_monthly_rate(*annual_rate);
        for offset in 0..MONTHS_PER_RATE {
            let month = year_index as u32 * MONTHS_PER_RATE + offset + 1;
            points.push(ScenarioPoint {
                month,
                label: month_label(month),
                quantity,
            });
            quantity *= 1.0 + monthly_rate;
        }
    }
    points
}
