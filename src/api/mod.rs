use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::core::{
    AggregatedRecord, AggregatedResult, DEFAULT_ANNUAL_INFLATION_PCT, MonthlyRecord,
    ProjectionResult, ScenarioPoint, ScenarioSet, ServiceParams, TaxRegime, aggregate,
    default_base_rates, month_label, project, project_scenarios,
};

const OUT_OF_BRACKET_WARNING: &str =
    "total revenue falls outside the bracket table; no tax applied";

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliTaxRegime {
    Flat,
    Progressive,
}

impl From<CliTaxRegime> for TaxRegime {
    fn from(value: CliTaxRegime) -> Self {
        match value {
            CliTaxRegime::Flat => TaxRegime::flat(),
            CliTaxRegime::Progressive => TaxRegime::progressive(),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiTaxRegime {
    #[serde(alias = "single", alias = "flatRate", alias = "flat_rate")]
    Flat,
    #[serde(alias = "brackets", alias = "byBracket", alias = "by_bracket")]
    Progressive,
}

impl From<ApiTaxRegime> for CliTaxRegime {
    fn from(value: ApiTaxRegime) -> Self {
        match value {
            ApiTaxRegime::Flat => CliTaxRegime::Flat,
            ApiTaxRegime::Progressive => CliTaxRegime::Progressive,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ServicePayload {
    name: Option<String>,
    unit_price: Option<f64>,
    unit_cost: Option<f64>,
    initial_quantity: Option<u32>,
    max_quantity: Option<u32>,
    commission_pct: Option<f64>,
    monthly_growth_pct: Option<f64>,
    initial_investment: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProjectPayload {
    name: Option<String>,
    unit_price: Option<f64>,
    unit_cost: Option<f64>,
    initial_quantity: Option<u32>,
    max_quantity: Option<u32>,
    commission_pct: Option<f64>,
    monthly_growth_pct: Option<f64>,
    initial_investment: Option<f64>,
    months: Option<u32>,
    annual_inflation_pct: Option<f64>,
    tax_regime: Option<ApiTaxRegime>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AggregatePayload {
    services: Vec<ServicePayload>,
    months: Option<u32>,
    annual_inflation_pct: Option<f64>,
    tax_regime: Option<ApiTaxRegime>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ScenariosPayload {
    initial_quantity: Option<f64>,
    base_annual_rates: Option<Vec<f64>>,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "drecast",
    about = "Income-statement (DRE) projector: monthly revenue, tax brackets, payback and growth scenarios"
)]
struct Cli {
    #[arg(long, default_value = "Consulta", help = "Service name")]
    service: String,
    #[arg(long, default_value_t = 100.0, help = "Unit sale price before inflation")]
    unit_price: f64,
    #[arg(long, default_value_t = 20.0, help = "Unit cost before inflation")]
    unit_cost: f64,
    #[arg(long, default_value_t = 100)]
    initial_quantity: u32,
    #[arg(
        long,
        default_value_t = 500,
        help = "Monthly volume cap; growth never pushes quantity beyond it"
    )]
    max_quantity: u32,
    #[arg(
        long,
        default_value_t = 30.0,
        help = "Commission paid out of gross revenue, in percent"
    )]
    commission_pct: f64,
    #[arg(
        long,
        default_value_t = 5.0,
        help = "Monthly quantity growth in percent"
    )]
    monthly_growth_pct: f64,
    #[arg(long, default_value_t = 10000.0, help = "Upfront investment to pay back")]
    initial_investment: f64,
    #[arg(long, default_value_t = 12, help = "Projection horizon in months (1-60)")]
    months: u32,
    #[arg(
        long,
        default_value_t = DEFAULT_ANNUAL_INFLATION_PCT,
        help = "Annual inflation applied to price and cost, in percent"
    )]
    annual_inflation_pct: f64,
    #[arg(
        long,
        value_enum,
        default_value_t = CliTaxRegime::Flat,
        help = "Tax regime: flat 12% or progressive revenue brackets"
    )]
    tax_regime: CliTaxRegime,
}

#[derive(Debug)]
struct ProjectRequest {
    service: ServiceParams,
    months: u32,
    annual_inflation_pct: f64,
    regime: TaxRegime,
}

#[derive(Debug)]
struct AggregateRequest {
    services: Vec<ServiceParams>,
    months: u32,
    annual_inflation_pct: f64,
    regime: TaxRegime,
}

#[derive(Debug)]
struct ScenariosRequest {
    initial_quantity: f64,
    base_annual_rates: Vec<f64>,
}

fn build_service_params(cli: &Cli) -> Result<ServiceParams, String> {
    let name = cli.service.trim();
    if name.is_empty() {
        return Err("--service must be a non-empty name".to_string());
    }

    if !cli.unit_price.is_finite() || cli.unit_price < 0.0 {
        return Err("--unit-price must be >= 0".to_string());
    }

    if !cli.unit_cost.is_finite() || cli.unit_cost < 0.0 {
        return Err("--unit-cost must be >= 0".to_string());
    }

    if !(0.0..=100.0).contains(&cli.commission_pct) {
        return Err("--commission-pct must be between 0 and 100".to_string());
    }

    if !cli.monthly_growth_pct.is_finite() || cli.monthly_growth_pct < 0.0 {
        return Err("--monthly-growth-pct must be >= 0".to_string());
    }

    if !cli.initial_investment.is_finite() || cli.initial_investment < 0.0 {
        return Err("--initial-investment must be >= 0".to_string());
    }

    Ok(ServiceParams {
        name: name.to_string(),
        unit_price: cli.unit_price,
        unit_cost: cli.unit_cost,
        initial_quantity: cli.initial_quantity,
        max_quantity: cli.max_quantity,
        commission_pct: cli.commission_pct,
        monthly_growth_pct: cli.monthly_growth_pct,
        initial_investment: cli.initial_investment,
    })
}

fn build_horizon(cli: &Cli) -> Result<(u32, f64, TaxRegime), String> {
    if !(1..=60).contains(&cli.months) {
        return Err("--months must be between 1 and 60".to_string());
    }

    if !cli.annual_inflation_pct.is_finite() || cli.annual_inflation_pct < 0.0 {
        return Err("--annual-inflation-pct must be >= 0".to_string());
    }

    Ok((cli.months, cli.annual_inflation_pct, cli.tax_regime.into()))
}

fn apply_service_overrides(cli: &mut Cli, payload: &ServicePayload) {
    if let Some(v) = &payload.name {
        cli.service = v.clone();
    }
    if let Some(v) = payload.unit_price {
        cli.unit_price = v;
    }
    if let Some(v) = payload.unit_cost {
        cli.unit_cost = v;
    }
    if let Some(v) = payload.initial_quantity {
        cli.initial_quantity = v;
    }
    if let Some(v) = payload.max_quantity {
        cli.max_quantity = v;
    }
    if let Some(v) = payload.commission_pct {
        cli.commission_pct = v;
    }
    if let Some(v) = payload.monthly_growth_pct {
        cli.monthly_growth_pct = v;
    }
    if let Some(v) = payload.initial_investment {
        cli.initial_investment = v;
    }
}

fn project_request_from_payload(payload: ProjectPayload) -> Result<ProjectRequest, String> {
    let mut cli = default_cli_for_api();
    apply_service_overrides(
        &mut cli,
        &ServicePayload {
            name: payload.name,
            unit_price: payload.unit_price,
            unit_cost: payload.unit_cost,
            initial_quantity: payload.initial_quantity,
            max_quantity: payload.max_quantity,
            commission_pct: payload.commission_pct,
            monthly_growth_pct: payload.monthly_growth_pct,
            initial_investment: payload.initial_investment,
        },
    );
    if let Some(v) = payload.months {
        cli.months = v;
    }
    if let Some(v) = payload.annual_inflation_pct {
        cli.annual_inflation_pct = v;
    }
    if let Some(v) = payload.tax_regime {
        cli.tax_regime = v.into();
    }

    let service = build_service_params(&cli)?;
    let (months, annual_inflation_pct, regime) = build_horizon(&cli)?;
    Ok(ProjectRequest {
        service,
        months,
        annual_inflation_pct,
        regime,
    })
}

fn aggregate_request_from_payload(payload: AggregatePayload) -> Result<AggregateRequest, String> {
    if payload.services.is_empty() {
        return Err("services must contain at least one entry".to_string());
    }

    let mut shared = default_cli_for_api();
    if let Some(v) = payload.months {
        shared.months = v;
    }
    if let Some(v) = payload.annual_inflation_pct {
        shared.annual_inflation_pct = v;
    }
    if let Some(v) = payload.tax_regime {
        shared.tax_regime = v.into();
    }
    let (months, annual_inflation_pct, regime) = build_horizon(&shared)?;

    let mut seen = HashSet::new();
    let mut services = Vec::with_capacity(payload.services.len());
    for entry in &payload.services {
        if entry.name.as_ref().map(|n| n.trim().is_empty()).unwrap_or(true) {
            return Err("every service must have a non-empty name".to_string());
        }
        let mut cli = shared.clone();
        apply_service_overrides(&mut cli, entry);
        let service = build_service_params(&cli)?;
        if !seen.insert(service.name.clone()) {
            return Err(format!(
                "service names must be unique; '{}' appears more than once",
                service.name
            ));
        }
        services.push(service);
    }

    Ok(AggregateRequest {
        services,
        months,
        annual_inflation_pct,
        regime,
    })
}

fn scenarios_request_from_payload(payload: ScenariosPayload) -> Result<ScenariosRequest, String> {
    let initial_quantity = payload.initial_quantity.unwrap_or(100.0);
    if !initial_quantity.is_finite() || initial_quantity <= 0.0 {
        return Err("initialQuantity must be > 0".to_string());
    }

    let base_annual_rates = payload.base_annual_rates.unwrap_or_else(default_base_rates);
    if base_annual_rates.is_empty() {
        return Err("baseAnnualRates must contain at least one rate".to_string());
    }
    for rate in &base_annual_rates {
        if !rate.is_finite() || *rate <= -1.0 {
            return Err("baseAnnualRates entries must be finite and > -1".to_string());
        }
    }

    Ok(ScenariosRequest {
        initial_quantity,
        base_annual_rates,
    })
}

fn default_cli_for_api() -> Cli {
    Cli {
        service: "Consulta".to_string(),
        unit_price: 100.0,
        unit_cost: 20.0,
        initial_quantity: 100,
        max_quantity: 500,
        commission_pct: 30.0,
        monthly_growth_pct: 5.0,
        initial_investment: 10_000.0,
        months: 12,
        annual_inflation_pct: DEFAULT_ANNUAL_INFLATION_PCT,
        tax_regime: CliTaxRegime::Flat,
    }
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route(
            "/api/project",
            get(project_get_handler).post(project_post_handler),
        )
        .route("/api/aggregate", post(aggregate_post_handler))
        .route(
            "/api/scenarios",
            get(scenarios_get_handler).post(scenarios_post_handler),
        )
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    println!("DRE projection API listening on http://{addr}");

    axum::serve(listener, app).await
}

pub fn run_cli_projection(args: &[String]) -> Result<String, String> {
    let cli = Cli::try_parse_from(
        std::iter::once("drecast".to_string()).chain(args.iter().cloned()),
    )
    .map_err(|e| e.to_string())?;

    let service = build_service_params(&cli)?;
    let (months, annual_inflation_pct, regime) = build_horizon(&cli)?;
    let result = project(&service, months, annual_inflation_pct, &regime);
    let response = build_project_response(result, months, annual_inflation_pct);
    serde_json::to_string_pretty(&response).map_err(|e| e.to_string())
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn project_get_handler(Query(payload): Query<ProjectPayload>) -> Response {
    project_handler_impl(payload).await
}

async fn project_post_handler(Json(payload): Json<ProjectPayload>) -> Response {
    project_handler_impl(payload).await
}

async fn project_handler_impl(payload: ProjectPayload) -> Response {
    let request = match project_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let result = project(
        &request.service,
        request.months,
        request.annual_inflation_pct,
        &request.regime,
    );
    json_response(
        StatusCode::OK,
        build_project_response(result, request.months, request.annual_inflation_pct),
    )
}

async fn aggregate_post_handler(Json(payload): Json<AggregatePayload>) -> Response {
    let request = match aggregate_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let per_service = request
        .services
        .iter()
        .map(|service| {
            let result = project(
                service,
                request.months,
                request.annual_inflation_pct,
                &request.regime,
            );
            build_project_response(result, request.months, request.annual_inflation_pct)
        })
        .collect();
    let combined = aggregate(
        &request.services,
        request.months,
        request.annual_inflation_pct,
        &request.regime,
    );
    json_response(
        StatusCode::OK,
        build_aggregate_response(
            combined,
            per_service,
            request.months,
            request.annual_inflation_pct,
        ),
    )
}

async fn scenarios_get_handler(Query(payload): Query<ScenariosPayload>) -> Response {
    scenarios_handler_impl(payload).await
}

async fn scenarios_post_handler(Json(payload): Json<ScenariosPayload>) -> Response {
    scenarios_handler_impl(payload).await
}

async fn scenarios_handler_impl(payload: ScenariosPayload) -> Response {
    let request = match scenarios_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let set = project_scenarios(request.initial_quantity, &request.base_annual_rates);
    json_response(StatusCode::OK, build_scenarios_response(set))
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

fn payback_label(month: Option<u32>) -> String {
    month
        .map(month_label)
        .unwrap_or_else(|| "not reached".to_string())
}

fn bracket_warning(out_of_bracket: bool) -> Option<String> {
    out_of_bracket.then(|| OUT_OF_BRACKET_WARNING.to_string())
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectResponse {
    service: String,
    months: u32,
    annual_inflation_pct: f64,
    effective_rate: f64,
    total_revenue: f64,
    total_tax: f64,
    initial_investment: f64,
    payback_month: String,
    warning: Option<String>,
    records: Vec<MonthlyRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AggregateResponse {
    months: u32,
    annual_inflation_pct: f64,
    effective_rate: f64,
    total_revenue: f64,
    total_tax: f64,
    total_cost: f64,
    total_commission: f64,
    total_net_revenue: f64,
    total_profit: f64,
    total_investment: f64,
    payback_month: String,
    warning: Option<String>,
    records: Vec<AggregatedRecord>,
    services: Vec<ProjectResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScenariosResponse {
    initial_quantity: f64,
    conservative_rates: Vec<f64>,
    optimistic_rates: Vec<f64>,
    pessimistic_rates: Vec<f64>,
    conservative: Vec<ScenarioPoint>,
    optimistic: Vec<ScenarioPoint>,
    pessimistic: Vec<ScenarioPoint>,
}

fn build_project_response(
    result: ProjectionResult,
    months: u32,
    annual_inflation_pct: f64,
) -> ProjectResponse {
    ProjectResponse {
        service: result.service,
        months,
        annual_inflation_pct,
        effective_rate: result.effective_rate,
        total_revenue: result.total_revenue,
        total_tax: result.total_tax,
        initial_investment: result.initial_investment,
        payback_month: payback_label(result.payback_month),
        warning: bracket_warning(result.out_of_bracket),
        records: result.records,
    }
}

fn build_aggregate_response(
    combined: AggregatedResult,
    services: Vec<ProjectResponse>,
    months: u32,
    annual_inflation_pct: f64,
) -> AggregateResponse {
    AggregateResponse {
        months,
        annual_inflation_pct,
        effective_rate: combined.effective_rate,
        total_revenue: combined.total_revenue,
        total_tax: combined.total_tax,
        total_cost: combined.total_cost,
        total_commission: combined.total_commission,
        total_net_revenue: combined.total_net_revenue,
        total_profit: combined.total_profit,
        total_investment: combined.total_investment,
        payback_month: payback_label(combined.payback_month),
        warning: bracket_warning(combined.out_of_bracket),
        records: combined.records,
        services,
    }
}

fn build_scenarios_response(set: ScenarioSet) -> ScenariosResponse {
    ScenariosResponse {
        initial_quantity: set.initial_quantity,
        conservative_rates: set.conservative_rates,
        optimistic_rates: set.optimistic_rates,
        pessimistic_rates: set.pessimistic_rates,
        conservative: set.conservative,
        optimistic: set.optimistic,
        pessimistic: set.pessimistic,
    }
}

#[cfg(test)]
fn project_request_from_json(json: &str) -> Result<ProjectRequest, String> {
    let payload = serde_json::from_str::<ProjectPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    project_request_from_payload(payload)
}

#[cfg(test)]
fn aggregate_request_from_json(json: &str) -> Result<AggregateRequest, String> {
    let payload = serde_json::from_str::<AggregatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    aggregate_request_from_payload(payload)
}

#[cfg(test)]
fn scenarios_request_from_json(json: &str) -> Result<ScenariosRequest, String> {
    let payload = serde_json::from_str::<ScenariosPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    scenarios_request_from_payload(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_cli() -> Cli {
        default_cli_for_api()
    }

    #[test]
    fn build_service_params_accepts_defaults() {
        let service = build_service_params(&sample_cli()).expect("valid defaults");
        assert_eq!(service.name, "Consulta");
        assert_approx(service.unit_price, 100.0);
        assert_approx(service.unit_cost, 20.0);
        assert_eq!(service.initial_quantity, 100);
        assert_eq!(service.max_quantity, 500);
        assert_approx(service.commission_pct, 30.0);
        assert_approx(service.monthly_growth_pct, 5.0);
        assert_approx(service.initial_investment, 10_000.0);
    }

    #[test]
    fn build_service_params_rejects_blank_name() {
        let mut cli = sample_cli();
        cli.service = "   ".to_string();
        let err = build_service_params(&cli).expect_err("must reject blank name");
        assert!(err.contains("--service"));
    }

    #[test]
    fn build_service_params_rejects_negative_price() {
        let mut cli = sample_cli();
        cli.unit_price = -1.0;
        let err = build_service_params(&cli).expect_err("must reject negative price");
        assert!(err.contains("--unit-price"));
    }

    #[test]
    fn build_service_params_rejects_commission_out_of_range() {
        let mut cli = sample_cli();
        cli.commission_pct = 150.0;
        let err = build_service_params(&cli).expect_err("must reject commission > 100");
        assert!(err.contains("--commission-pct"));
    }

    #[test]
    fn build_service_params_rejects_negative_growth() {
        let mut cli = sample_cli();
        cli.monthly_growth_pct = -0.5;
        let err = build_service_params(&cli).expect_err("must reject negative growth");
        assert!(err.contains("--monthly-growth-pct"));
    }

    #[test]
    fn build_service_params_rejects_negative_investment() {
        let mut cli = sample_cli();
        cli.initial_investment = -10.0;
        let err = build_service_params(&cli).expect_err("must reject negative investment");
        assert!(err.contains("--initial-investment"));
    }

    #[test]
    fn build_horizon_rejects_months_out_of_bounds() {
        for months in [0, 61] {
            let mut cli = sample_cli();
            cli.months = months;
            let err = build_horizon(&cli).expect_err("must reject horizon");
            assert!(err.contains("--months"));
        }
    }

    #[test]
    fn build_horizon_rejects_negative_inflation() {
        let mut cli = sample_cli();
        cli.annual_inflation_pct = -1.0;
        let err = build_horizon(&cli).expect_err("must reject negative inflation");
        assert!(err.contains("--annual-inflation-pct"));
    }

    #[test]
    fn project_request_from_json_parses_camel_case_keys() {
        let json = r#"{
          "name": "Exame",
          "unitPrice": 80,
          "unitCost": 10,
          "initialQuantity": 50,
          "maxQuantity": 200,
          "commissionPct": 10,
          "monthlyGrowthPct": 2.5,
          "initialInvestment": 5000,
          "months": 24,
          "annualInflationPct": 8,
          "taxRegime": "progressive"
        }"#;
        let request = project_request_from_json(json).expect("json should parse");

        assert_eq!(request.service.name, "Exame");
        assert_approx(request.service.unit_price, 80.0);
        assert_approx(request.service.unit_cost, 10.0);
        assert_eq!(request.service.initial_quantity, 50);
        assert_eq!(request.service.max_quantity, 200);
        assert_approx(request.service.commission_pct, 10.0);
        assert_approx(request.service.monthly_growth_pct, 2.5);
        assert_approx(request.service.initial_investment, 5_000.0);
        assert_eq!(request.months, 24);
        assert_approx(request.annual_inflation_pct, 8.0);
        assert_eq!(request.regime, TaxRegime::progressive());
    }

    #[test]
    fn tax_regime_accepts_alias_spellings() {
        let request =
            project_request_from_json(r#"{"taxRegime": "brackets"}"#).expect("alias should parse");
        assert_eq!(request.regime, TaxRegime::progressive());

        let request =
            project_request_from_json(r#"{"taxRegime": "flat"}"#).expect("flat should parse");
        assert_eq!(request.regime, TaxRegime::flat());
    }

    #[test]
    fn project_request_defaults_match_cli_defaults() {
        let request = project_request_from_json("{}").expect("empty payload uses defaults");
        assert_eq!(request.service.name, "Consulta");
        assert_eq!(request.months, 12);
        assert_approx(request.annual_inflation_pct, 13.0);
        assert_eq!(request.regime, TaxRegime::flat());
    }

    #[test]
    fn aggregate_request_requires_at_least_one_service() {
        let err = aggregate_request_from_json(r#"{"services": []}"#)
            .expect_err("must reject empty services");
        assert!(err.contains("services"));
    }

    #[test]
    fn aggregate_request_requires_service_names() {
        let err = aggregate_request_from_json(r#"{"services": [{"unitPrice": 10}]}"#)
            .expect_err("must reject unnamed service");
        assert!(err.contains("non-empty name"));
    }

    #[test]
    fn aggregate_request_rejects_duplicate_names() {
        let json = r#"{"services": [{"name": "Consulta"}, {"name": "Consulta"}]}"#;
        let err = aggregate_request_from_json(json).expect_err("must reject duplicate names");
        assert!(err.contains("unique"));
    }

    #[test]
    fn aggregate_request_applies_shared_horizon_to_all_services() {
        let json = r#"{
          "services": [
            {"name": "Consulta"},
            {"name": "Exame", "unitPrice": 55, "commissionPct": 0}
          ],
          "months": 18,
          "annualInflationPct": 6,
          "taxRegime": "progressive"
        }"#;
        let request = aggregate_request_from_json(json).expect("json should parse");
        assert_eq!(request.services.len(), 2);
        assert_eq!(request.months, 18);
        assert_approx(request.annual_inflation_pct, 6.0);
        assert_eq!(request.regime, TaxRegime::progressive());
        assert_eq!(request.services[0].name, "Consulta");
        assert_eq!(request.services[1].name, "Exame");
        assert_approx(request.services[1].unit_price, 55.0);
        assert_approx(request.services[1].commission_pct, 0.0);
        // Unset fields fall back to the shared defaults.
        assert_approx(request.services[0].unit_price, 100.0);
    }

    #[test]
    fn scenarios_request_defaults_to_canonical_rates() {
        let request = scenarios_request_from_json("{}").expect("defaults should apply");
        assert_approx(request.initial_quantity, 100.0);
        assert_eq!(request.base_annual_rates, vec![0.25, 0.20, 0.20]);
    }

    #[test]
    fn scenarios_request_rejects_non_positive_quantity() {
        let err = scenarios_request_from_json(r#"{"initialQuantity": 0}"#)
            .expect_err("must reject zero quantity");
        assert!(err.contains("initialQuantity"));
    }

    #[test]
    fn scenarios_request_rejects_empty_rates() {
        let err = scenarios_request_from_json(r#"{"baseAnnualRates": []}"#)
            .expect_err("must reject empty rates");
        assert!(err.contains("baseAnnualRates"));
    }

    #[test]
    fn payback_label_formats_month_or_sentinel() {
        assert_eq!(payback_label(Some(7)), "M7");
        assert_eq!(payback_label(None), "not reached");
    }

    #[test]
    fn project_response_serialization_contains_expected_fields() {
        let request = project_request_from_json("{}").expect("valid defaults");
        let result = project(
            &request.service,
            request.months,
            request.annual_inflation_pct,
            &request.regime,
        );
        let response =
            build_project_response(result, request.months, request.annual_inflation_pct);
        let json = serde_json::to_string(&response).expect("response should serialize");
        assert!(json.contains("\"records\""));
        assert!(json.contains("\"paybackMonth\""));
        assert!(json.contains("\"effectiveRate\""));
        assert!(json.contains("\"grossRevenue\""));
        assert!(json.contains("\"cumulativeProfit\""));
        assert!(json.contains("\"unitPrice\""));
        assert!(json.contains("\"label\":\"M1\""));
    }

    #[test]
    fn out_of_bracket_projection_reports_warning() {
        let json = r#"{
          "unitPrice": 1000,
          "initialQuantity": 1000,
          "maxQuantity": 1000,
          "taxRegime": "progressive"
        }"#;
        let request = project_request_from_json(json).expect("json should parse");
        let result = project(
            &request.service,
            request.months,
            request.annual_inflation_pct,
            &request.regime,
        );
        assert!(result.total_revenue > 4_800_000.0);
        let response =
            build_project_response(result, request.months, request.annual_inflation_pct);
        assert!(response.warning.as_deref().unwrap_or("").contains("bracket"));
        assert_approx(response.effective_rate, 0.0);
        assert_approx(response.total_tax, 0.0);
    }

    #[test]
    fn aggregate_response_serialization_contains_expected_fields() {
        let json = r#"{"services": [{"name": "Consulta"}, {"name": "Exame"}]}"#;
        let request = aggregate_request_from_json(json).expect("json should parse");
        let per_service = request
            .services
            .iter()
            .map(|service| {
                let result = project(
                    service,
                    request.months,
                    request.annual_inflation_pct,
                    &request.regime,
                );
                build_project_response(result, request.months, request.annual_inflation_pct)
            })
            .collect();
        let combined = aggregate(
            &request.services,
            request.months,
            request.annual_inflation_pct,
            &request.regime,
        );
        let response = build_aggregate_response(
            combined,
            per_service,
            request.months,
            request.annual_inflation_pct,
        );
        let json = serde_json::to_string(&response).expect("response should serialize");
        assert!(json.contains("\"totalInvestment\""));
        assert!(json.contains("\"totalNetRevenue\""));
        assert!(json.contains("\"services\""));
        assert!(json.contains("\"records\""));
        assert!(json.contains("\"paybackMonth\""));
    }

    #[test]
    fn scenarios_response_serialization_contains_expected_fields() {
        let request = scenarios_request_from_json("{}").expect("defaults should apply");
        let set = project_scenarios(request.initial_quantity, &request.base_annual_rates);
        let response = build_scenarios_response(set);
        let json = serde_json::to_string(&response).expect("response should serialize");
        assert!(json.contains("\"conservativeRates\""));
        assert!(json.contains("\"optimisticRates\""));
        assert!(json.contains("\"pessimisticRates\""));
        assert!(json.contains("\"conservative\""));
        assert!(json.contains("\"quantity\""));
        assert!(json.contains("\"label\":\"M36\""));
    }

    #[test]
    fn run_cli_projection_parses_flags_and_prints_json() {
        let args: Vec<String> = ["--months", "6", "--tax-regime", "progressive"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let json = run_cli_projection(&args).expect("flags should parse");
        assert!(json.contains("\"service\": \"Consulta\""));
        assert!(json.contains("\"months\": 6"));
        assert!(json.contains("\"records\""));
    }

    #[test]
    fn run_cli_projection_rejects_unknown_flag() {
        let args: Vec<String> = vec!["--bogus".to_string()];
        assert!(run_cli_projection(&args).is_err());
    }
}
