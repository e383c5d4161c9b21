use std::collections::BTreeMap;

use super::types::{
    AggregatedRecord, AggregatedResult, MonthPoint, MonthlyRecord, ProjectionResult,
    ServiceParams, TaxRegime, month_label,
};

#[derive(Debug, Clone, Copy)]
pub struct TaxResolution {
    pub rate: f64,
    pub out_of_bracket: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct MonthFlow {
    gross_revenue: f64,
    total_cost: f64,
    commission: f64,
}

pub fn compound_monthly_rate(annual_rate: f64) -> f64 {
    (1.0 + annual_rate).powf(1.0 / 12.0) - 1.0
}

pub fn monthly_inflation_rate(annual_inflation_pct: f64) -> f64 {
    compound_monthly_rate(annual_inflation_pct / 100.0)
}

pub fn generate_monthly_series(
    params: &ServiceParams,
    months: u32,
    annual_inflation_pct: f64,
) -> Vec<MonthPoint> {
    let monthly_inflation = monthly_inflation_rate(annual_inflation_pct);
    let growth_factor = 1.0 + params.monthly_growth_pct / 100.0;
    let cap = params.max_quantity as f64;

    let mut quantity = params.initial_quantity as f64;
    let mut unit_price = params.unit_price;
    let mut unit_cost = params.unit_cost;

    let mut points = Vec::with_capacity(months as usize);
    for month in 1..=months {
        points.push(MonthPoint {
            month,
            quantity,
            unit_price,
            unit_cost,
        });
        quantity = (quantity * growth_factor).min(cap);
        unit_price *= 1.0 + monthly_inflation;
        unit_cost *= 1.0 + monthly_inflation;
    }
    points
}

pub fn resolve_tax_rate(regime: &TaxRegime, total_revenue: f64) -> TaxResolution {
    match regime {
        TaxRegime::Flat(rate) => TaxResolution {
            rate: *rate,
            out_of_bracket: false,
        },
        TaxRegime::Progressive(brackets) => brackets
            .iter()
            .find(|bracket| {
                bracket.lower_exclusive < total_revenue && total_revenue <= bracket.upper_inclusive
            })
            .map(|bracket| TaxResolution {
                rate: bracket.rate,
                out_of_bracket: false,
            })
            .unwrap_or(TaxResolution {
                rate: 0.0,
                out_of_bracket: true,
            }),
    }
}

fn month_flow(params: &ServiceParams, point: &MonthPoint) -> MonthFlow {
    let gross_revenue = point.quantity * point.unit_price;
    MonthFlow {
        gross_revenue,
        total_cost: point.quantity * point.unit_cost,
        commission: gross_revenue * params.commission_pct / 100.0,
    }
}

pub fn project(
    params: &ServiceParams,
    months: u32,
    annual_inflation_pct: f64,
    regime: &TaxRegime,
) -> ProjectionResult {
    let series = generate_monthly_series(params, months, annual_inflation_pct);

    let mut records = Vec::with_capacity(series.len());
    let mut total_revenue = 0.0;
    for point in &series {
        let flow = month_flow(params, point);
        total_revenue += flow.gross_revenue;
        records.push(MonthlyRecord {
            month: point.month,
            label: month_label(point.month),
            quantity: point.quantity.round(),
            unit_price: point.unit_price,
            unit_cost: point.unit_cost,
            gross_revenue: flow.gross_revenue,
            total_cost: flow.total_cost,
            commission: flow.commission,
            tax: 0.0,
            net_revenue: 0.0,
            gross_profit: 0.0,
            cumulative_profit: 0.0,
        });
    }

    // One rate for the whole horizon, resolved from full-period revenue.
    let resolution = resolve_tax_rate(regime, total_revenue);

    let mut total_tax = 0.0;
    let mut cumulative_profit = 0.0;
    let mut payback_month = None;
    for record in &mut records {
        record.tax = record.gross_revenue * resolution.rate;
        record.net_revenue = record.gross_revenue - record.tax;
        record.gross_profit = record.net_revenue - record.total_cost - record.commission;
        cumulative_profit += record.gross_profit;
        record.cumulative_profit = cumulative_profit;
        total_tax += record.tax;
        if payback_month.is_none() && cumulative_profit >= params.initial_investment {
            payback_month = Some(record.month);
        }
    }

    ProjectionResult {
        service: params.name.clone(),
        records,
        total_revenue,
        total_tax,
        effective_rate: resolution.rate,
        initial_investment: params.initial_investment,
        payback_month,
        out_of_bracket: resolution.out_of_bracket,
    }
}

pub fn aggregate(
    services: &[ServiceParams],
    months: u32,
    annual_inflation_pct: f64,
    regime: &TaxRegime,
) -> AggregatedResult {
    // The rate is resolved on the combined total, so flows are summed pre-tax.
    let mut by_month: BTreeMap<u32, MonthFlow> = BTreeMap::new();
    for params in services {
        for point in generate_monthly_series(params, months, annual_inflation_pct) {
            let flow = month_flow(params, &point);
            let combined = by_month.entry(point.month).or_default();
            combined.gross_revenue += flow.gross_revenue;
            combined.total_cost += flow.total_cost;
            combined.commission += flow.commission;
        }
    }

    let total_investment = services.iter().map(|s| s.initial_investment).sum();
    let total_revenue: f64 = by_month.values().map(|flow| flow.gross_revenue).sum();
    let resolution = resolve_tax_rate(regime, total_revenue);

    let mut records = Vec::with_capacity(by_month.len());
    let mut total_tax = 0.0;
    let mut total_cost = 0.0;
    let mut total_commission = 0.0;
    let mut cumulative_profit = 0.0;
    let mut payback_month = None;
    for (month, flow) in by_month {
        let tax = flow.gross_revenue * resolution.rate;
        let net_revenue = flow.gross_revenue - tax;
        let gross_profit = net_revenue - flow.total_cost - flow.commission;
        cumulative_profit += gross_profit;
        total_tax += tax;
        total_cost += flow.total_cost;
        total_commission += flow.commission;
        if payback_month.is_none() && cumulative_profit >= total_investment {
            payback_month = Some(month);
        }
        records.push(AggregatedRecord {
            month,
            label: month_label(month),
            gross_revenue: flow.gross_revenue,
            total_cost: flow.total_cost,
            commission: flow.commission,
            tax,
            net_revenue,
            gross_profit,
            cumulative_profit,
        });
    }

    AggregatedResult {
        records,
        total_revenue,
        total_tax,
        total_cost,
        total_commission,
        total_net_revenue: total_revenue - total_tax,
        total_profit: cumulative_profit,
        effective_rate: resolution.rate,
        total_investment,
        payback_month,
        out_of_bracket: resolution.out_of_bracket,
    }
}
