use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Json, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::core::{
    AthleteCounts, CapacityResult, Catalog, CostModel, FinancialResult, Level, LevelSummary,
    ModelConfig, ModelStore, MonthlyFees, NormalizeOutcome, ProgramFees, RevenueBasis, Role,
    RoleCapacity, RoleRate, RoleSplit, SplitNormalizer, WORKBOOK_FILE_NAME, export_workbook,
    run_capacity_model, run_financial_model,
};

const INDEX_HTML: &str = include_str!("../../web/index.html");
const STYLES_CSS: &str = include_str!("../../web/styles.css");
const APP_JS: &str = include_str!("../../web/app.js");

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliCostModel {
    Split,
    HoursRate,
}

impl From<CliCostModel> for CostModel {
    fn from(value: CliCostModel) -> Self {
        match value {
            CliCostModel::Split => CostModel::Split,
            CliCostModel::HoursRate => CostModel::HoursRate,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliRevenueBasis {
    ProgramFee,
    PlatformShare,
}

impl From<CliRevenueBasis> for RevenueBasis {
    fn from(value: CliRevenueBasis) -> Self {
        match value {
            CliRevenueBasis::ProgramFee => RevenueBasis::ProgramFee,
            CliRevenueBasis::PlatformShare => RevenueBasis::PlatformShare,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
enum ApiCostModel {
    Split,
    #[serde(alias = "hoursRate", alias = "hours_rate")]
    HoursRate,
}

impl From<ApiCostModel> for CliCostModel {
    fn from(value: ApiCostModel) -> Self {
        match value {
            ApiCostModel::Split => CliCostModel::Split,
            ApiCostModel::HoursRate => CliCostModel::HoursRate,
        }
    }
}

impl From<CostModel> for ApiCostModel {
    fn from(value: CostModel) -> Self {
        match value {
            CostModel::Split => ApiCostModel::Split,
            CostModel::HoursRate => ApiCostModel::HoursRate,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
enum ApiRevenueBasis {
    #[serde(alias = "programFee", alias = "program_fee")]
    ProgramFee,
    #[serde(alias = "platformShare", alias = "platform_share")]
    PlatformShare,
}

impl From<ApiRevenueBasis> for CliRevenueBasis {
    fn from(value: ApiRevenueBasis) -> Self {
        match value {
            ApiRevenueBasis::ProgramFee => CliRevenueBasis::ProgramFee,
            ApiRevenueBasis::PlatformShare => CliRevenueBasis::PlatformShare,
        }
    }
}

impl From<RevenueBasis> for ApiRevenueBasis {
    fn from(value: RevenueBasis) -> Self {
        match value {
            RevenueBasis::ProgramFee => ApiRevenueBasis::ProgramFee,
            RevenueBasis::PlatformShare => ApiRevenueBasis::PlatformShare,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "clinicplan",
    about = "Performance clinic financial and capacity planner"
)]
struct Cli {
    #[arg(
        long,
        value_enum,
        default_value_t = CliCostModel::Split,
        help = "Cost model: percentage fee splits or hours x hourly rates"
    )]
    cost_model: CliCostModel,
    #[arg(
        long,
        value_enum,
        default_value_t = CliRevenueBasis::ProgramFee,
        help = "Split-model revenue basis: full program fee or the Platform share of it"
    )]
    revenue_basis: CliRevenueBasis,
    #[arg(
        long,
        default_value_t = 12,
        help = "Program length in weeks for hours-based costing"
    )]
    weeks_in_program: u32,
    #[arg(
        long,
        default_value_t = 20.0,
        help = "Cap on weekly hours per (level, role) assignment"
    )]
    max_weekly_hours: f64,
    #[arg(
        long,
        default_value_t = 1e-6,
        help = "Tolerance when checking that a fee split totals 100%"
    )]
    split_total_tolerance: f64,
    #[arg(
        long,
        default_value_t = 0.01,
        help = "Tolerance when deciding whether a split value was hand-edited"
    )]
    lock_tolerance: f64,
    #[arg(
        long,
        default_value = "Inputs",
        help = "Directory with the input tables; the embedded defaults are used when absent"
    )]
    input_dir: String,
}

struct ServerState {
    catalog: Catalog,
    config: ModelConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WeeklyHoursEntry {
    level: Level,
    role: Role,
    hours: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct OneTimeCostPayload {
    is_one_time: Option<bool>,
    amount: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CapacityPayload {
    headcount: Option<u32>,
    max_hours_per_week: Option<f64>,
    hours_per_athlete: Option<BTreeMap<Level, f64>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct EvaluatePayload {
    athlete_counts: Option<BTreeMap<Level, u32>>,
    program_fees: Option<BTreeMap<Level, f64>>,
    monthly_fees: Option<BTreeMap<Level, [f64; 3]>>,
    hourly_rates: Option<BTreeMap<Role, f64>>,
    one_time_costs: Option<BTreeMap<Role, OneTimeCostPayload>>,
    weekly_hours: Option<Vec<WeeklyHoursEntry>>,
    splits: Option<BTreeMap<Level, BTreeMap<Role, f64>>>,
    baseline_splits: Option<BTreeMap<Level, BTreeMap<Role, f64>>>,
    capacity: Option<BTreeMap<Role, CapacityPayload>>,
    cost_model: Option<ApiCostModel>,
    revenue_basis: Option<ApiRevenueBasis>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct NormalizePayload {
    level: Option<Level>,
    current: Option<BTreeMap<Role, f64>>,
    baseline: Option<BTreeMap<Role, f64>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SplitStatus {
    level: Level,
    total: f64,
    valid: bool,
    current: RoleSplit,
    accepted: RoleSplit,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EvaluateResponse {
    cost_model: ApiCostModel,
    revenue_basis: ApiRevenueBasis,
    levels: Vec<Level>,
    split_status: Vec<SplitStatus>,
    per_athlete: Vec<FinancialResult>,
    summary: Vec<LevelSummary>,
    capacity: Vec<CapacityResult>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NormalizeResponse {
    level: Level,
    outcome: NormalizeOutcome,
    warning: Option<String>,
    splits: RoleSplit,
    baseline: RoleSplit,
    total: f64,
    valid: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RoleInfo {
    id: Role,
    label: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DefaultsResponse {
    levels: Vec<Level>,
    roles: Vec<RoleInfo>,
    athlete_counts: AthleteCounts,
    program_fees: ProgramFees,
    monthly_fees: MonthlyFees,
    rates: BTreeMap<Role, RoleRate>,
    weekly_hours: Vec<WeeklyHoursEntry>,
    splits: BTreeMap<Level, RoleSplit>,
    capacity: BTreeMap<Role, RoleCapacity>,
    cost_model: ApiCostModel,
    revenue_basis: ApiRevenueBasis,
    weeks_in_program: u32,
    max_weekly_hours: f64,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_config(cli: &Cli) -> Result<ModelConfig, String> {
    if cli.weeks_in_program == 0 {
        return Err("--weeks-in-program must be > 0".to_string());
    }

    if !cli.max_weekly_hours.is_finite() || cli.max_weekly_hours <= 0.0 {
        return Err("--max-weekly-hours must be > 0".to_string());
    }

    if !cli.split_total_tolerance.is_finite() || cli.split_total_tolerance <= 0.0 {
        return Err("--split-total-tolerance must be > 0".to_string());
    }

    if !cli.lock_tolerance.is_finite() || cli.lock_tolerance <= 0.0 {
        return Err("--lock-tolerance must be > 0".to_string());
    }

    Ok(ModelConfig {
        cost_model: cli.cost_model.into(),
        revenue_basis: cli.revenue_basis.into(),
        weeks_in_program: cli.weeks_in_program,
        max_weekly_hours: cli.max_weekly_hours,
        split_total_tolerance: cli.split_total_tolerance,
        lock_tolerance: cli.lock_tolerance,
    })
}

fn default_cli_for_api() -> Cli {
    Cli {
        cost_model: CliCostModel::Split,
        revenue_basis: CliRevenueBasis::ProgramFee,
        weeks_in_program: 12,
        max_weekly_hours: 20.0,
        split_total_tolerance: 1e-6,
        lock_tolerance: 0.01,
        input_dir: "Inputs".to_string(),
    }
}

fn merge_split(base: &RoleSplit, overlay: Option<&BTreeMap<Role, f64>>) -> RoleSplit {
    let mut merged = base.clone();
    if let Some(values) = overlay {
        for (role, pct) in values {
            if merged.contains_key(role) {
                merged.insert(*role, pct.clamp(0.0, 100.0));
            }
        }
    }
    merged
}

fn build_store_from_payload(
    catalog: &Catalog,
    base_config: &ModelConfig,
    payload: &EvaluatePayload,
) -> Result<ModelStore, String> {
    let mut config = *base_config;
    if let Some(model) = payload.cost_model {
        config.cost_model = CliCostModel::from(model).into();
    }
    if let Some(basis) = payload.revenue_basis {
        config.revenue_basis = CliRevenueBasis::from(basis).into();
    }

    let mut store = ModelStore::from_catalog(catalog, config);

    if let Some(counts) = &payload.athlete_counts {
        for (level, count) in counts {
            store
                .set_athlete_count(*level, *count)
                .map_err(|e| e.to_string())?;
        }
    }

    if let Some(fees) = &payload.program_fees {
        for (level, fee) in fees {
            store
                .set_program_fee(*level, *fee)
                .map_err(|e| e.to_string())?;
        }
    }

    if let Some(fees) = &payload.monthly_fees {
        for (level, months) in fees {
            store
                .set_monthly_fees(*level, *months)
                .map_err(|e| e.to_string())?;
        }
    }

    if let Some(rates) = &payload.hourly_rates {
        for (role, rate) in rates {
            store
                .set_hourly_rate(*role, *rate)
                .map_err(|e| e.to_string())?;
        }
    }

    if let Some(one_time) = &payload.one_time_costs {
        for (role, entry) in one_time {
            let existing = store
                .rates()
                .get(role)
                .copied()
                .ok_or_else(|| format!("no practitioner rate for role {role}"))?;
            store
                .set_one_time_cost(
                    *role,
                    entry.is_one_time.unwrap_or(existing.is_one_time),
                    entry.amount.unwrap_or(existing.one_time_cost),
                )
                .map_err(|e| e.to_string())?;
        }
    }

    if let Some(hours) = &payload.weekly_hours {
        for entry in hours {
            store
                .set_weekly_hours(entry.level, entry.role, entry.hours)
                .map_err(|e| e.to_string())?;
        }
    }

    if let Some(capacity) = &payload.capacity {
        for (role, entry) in capacity {
            if let Some(headcount) = entry.headcount {
                store
                    .set_headcount(*role, headcount)
                    .map_err(|e| e.to_string())?;
            }
            if let Some(max_hours) = entry.max_hours_per_week {
                store
                    .set_max_hours_per_week(*role, max_hours)
                    .map_err(|e| e.to_string())?;
            }
            if let Some(per_athlete) = &entry.hours_per_athlete {
                for (level, hours) in per_athlete {
                    store
                        .set_service_hours(*role, *level, *hours)
                        .map_err(|e| e.to_string())?;
                }
            }
        }
    }

    for level in catalog.levels.clone() {
        let baseline_overlay = payload.baseline_splits.as_ref().and_then(|m| m.get(&level));
        let current_overlay = payload.splits.as_ref().and_then(|m| m.get(&level));
        if baseline_overlay.is_none() && current_overlay.is_none() {
            continue;
        }
        let defaults = catalog
            .default_splits
            .get(&level)
            .ok_or_else(|| format!("no default splits for level {level}"))?;
        let baseline = merge_split(defaults, baseline_overlay);
        let current = merge_split(&baseline, current_overlay);
        store
            .splits_mut()
            .restore(level, current, baseline)
            .map_err(|e| e.to_string())?;
    }

    let levels = store.levels().to_vec();
    for level in levels {
        store
            .splits_mut()
            .commit_if_valid(level)
            .map_err(|e| e.to_string())?;
    }

    Ok(store)
}

fn build_evaluate_response(store: &ModelStore) -> crate::core::Result<EvaluateResponse> {
    let financial = run_financial_model(store)?;
    let capacity = run_capacity_model(store);

    let mut split_status = Vec::with_capacity(store.levels().len());
    for level in store.levels() {
        split_status.push(SplitStatus {
            level: *level,
            total: store.splits().total(*level)?,
            valid: store.splits().is_valid(*level)?,
            current: store.splits().current(*level)?.clone(),
            accepted: store.splits().accepted(*level)?.clone(),
        });
    }

    Ok(EvaluateResponse {
        cost_model: store.config().cost_model.into(),
        revenue_basis: store.config().revenue_basis.into(),
        levels: store.levels().to_vec(),
        split_status,
        per_athlete: financial.per_athlete,
        summary: financial.summary,
        capacity,
    })
}

fn normalize_from_payload(
    catalog: &Catalog,
    config: &ModelConfig,
    payload: &NormalizePayload,
) -> Result<NormalizeResponse, String> {
    let level = payload.level.ok_or("level is required")?;
    let defaults = catalog
        .default_splits
        .get(&level)
        .ok_or_else(|| format!("unknown level {level}"))?;

    let baseline = merge_split(defaults, payload.baseline.as_ref());
    let current = merge_split(&baseline, payload.current.as_ref());

    let mut splits = SplitNormalizer::new(&catalog.default_splits, config);
    splits
        .restore(level, current, baseline)
        .map_err(|e| e.to_string())?;

    let outcome = splits.normalize(level).map_err(|e| e.to_string())?;
    let warning = match outcome {
        NormalizeOutcome::AllRolesLocked => {
            tracing::warn!("level {level}: every role hand-edited, cannot rebalance");
            Some(
                "All roles have been edited. Adjust the percentages manually until the total \
                 returns to 100%."
                    .to_string(),
            )
        }
        _ => None,
    };

    Ok(NormalizeResponse {
        level,
        outcome,
        warning,
        splits: splits.current(level).map_err(|e| e.to_string())?.clone(),
        baseline: splits.baseline(level).map_err(|e| e.to_string())?.clone(),
        total: splits.total(level).map_err(|e| e.to_string())?,
        valid: splits.is_valid(level).map_err(|e| e.to_string())?,
    })
}

fn build_defaults_response(state: &ServerState) -> DefaultsResponse {
    let catalog = &state.catalog;
    let weekly_hours = catalog
        .weekly_hours
        .iter()
        .map(|((level, role), hours)| WeeklyHoursEntry {
            level: *level,
            role: *role,
            hours: *hours,
        })
        .collect();

    DefaultsResponse {
        levels: catalog.levels.clone(),
        roles: Role::ALL
            .into_iter()
            .map(|role| RoleInfo {
                id: role,
                label: role.label(),
            })
            .collect(),
        athlete_counts: catalog.default_counts(),
        program_fees: catalog.program_fees.clone(),
        monthly_fees: catalog.monthly_fees.clone(),
        rates: catalog.rates.clone(),
        weekly_hours,
        splits: catalog.default_splits.clone(),
        capacity: catalog.default_capacity(),
        cost_model: state.config.cost_model.into(),
        revenue_basis: state.config.revenue_basis.into(),
        weeks_in_program: state.config.weeks_in_program,
        max_weekly_hours: state.config.max_weekly_hours,
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("clinicplan=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .compact(),
        )
        .init();
}

fn build_server_state(cli: &Cli) -> Result<ServerState, String> {
    let config = build_config(cli)?;
    let input_dir = Path::new(&cli.input_dir);
    let catalog = if input_dir.is_dir() {
        let catalog = Catalog::load_dir(input_dir).map_err(|e| e.to_string())?;
        tracing::info!("loaded input tables from {}", input_dir.display());
        catalog
    } else {
        tracing::info!(
            "no {} directory, using embedded input tables",
            input_dir.display()
        );
        Catalog::embedded().map_err(|e| e.to_string())?
    };
    Ok(ServerState { catalog, config })
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    init_tracing();

    let cli = default_cli_for_api();
    let state = build_server_state(&cli).map_err(std::io::Error::other)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/", get(index_handler))
        .route("/index.html", get(index_handler))
        .route("/styles.css", get(styles_handler))
        .route("/app.js", get(app_js_handler))
        .route("/api/defaults", get(defaults_handler))
        .route("/api/evaluate", post(evaluate_handler))
        .route("/api/normalize", post(normalize_handler))
        .route("/api/export", post(export_handler))
        .fallback(not_found_handler)
        .with_state(Arc::new(state));

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("clinic planner listening on http://{addr}");
    tracing::info!("local access: http://127.0.0.1:{port}/");

    axum::serve(listener, app).await
}

async fn index_handler() -> impl IntoResponse {
    with_cache_control(Html(INDEX_HTML))
}

async fn styles_handler() -> impl IntoResponse {
    with_cache_control((
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        STYLES_CSS,
    ))
}

async fn app_js_handler() -> impl IntoResponse {
    with_cache_control((
        [(
            header::CONTENT_TYPE,
            "application/javascript; charset=utf-8",
        )],
        APP_JS,
    ))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn defaults_handler(State(state): State<Arc<ServerState>>) -> Response {
    json_response(StatusCode::OK, build_defaults_response(&state))
}

async fn evaluate_handler(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<EvaluatePayload>,
) -> Response {
    let store = match build_store_from_payload(&state.catalog, &state.config, &payload) {
        Ok(store) => store,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    match build_evaluate_response(&store) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(e) => error_response(StatusCode::UNPROCESSABLE_ENTITY, &e.to_string()),
    }
}

async fn normalize_handler(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<NormalizePayload>,
) -> Response {
    match normalize_from_payload(&state.catalog, &state.config, &payload) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
    }
}

async fn export_handler(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<EvaluatePayload>,
) -> Response {
    let store = match build_store_from_payload(&state.catalog, &state.config, &payload) {
        Ok(store) => store,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    match export_workbook(&store) {
        Ok(bytes) => {
            let mut response = bytes.into_response();
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                "application/zip".parse().expect("valid header"),
            );
            response.headers_mut().insert(
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{WORKBOOK_FILE_NAME}\"")
                    .parse()
                    .expect("valid header"),
            );
            response
        }
        Err(e) => error_response(StatusCode::UNPROCESSABLE_ENTITY, &e.to_string()),
    }
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
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

    fn catalog() -> Catalog {
        Catalog::embedded().expect("embedded tables must parse")
    }

    fn config() -> ModelConfig {
        build_config(&default_cli_for_api()).expect("default config is valid")
    }

    fn evaluate_payload_from_json(json: &str) -> EvaluatePayload {
        serde_json::from_str(json).expect("payload should parse")
    }

    #[test]
    fn build_config_rejects_zero_weeks() {
        let mut cli = default_cli_for_api();
        cli.weeks_in_program = 0;
        let err = build_config(&cli).expect_err("must reject zero weeks");
        assert!(err.contains("--weeks-in-program"));
    }

    #[test]
    fn build_config_rejects_non_positive_hour_cap() {
        let mut cli = default_cli_for_api();
        cli.max_weekly_hours = 0.0;
        let err = build_config(&cli).expect_err("must reject zero hour cap");
        assert!(err.contains("--max-weekly-hours"));
    }

    #[test]
    fn build_config_rejects_bad_tolerances() {
        let mut cli = default_cli_for_api();
        cli.split_total_tolerance = -1.0;
        let err = build_config(&cli).expect_err("must reject negative tolerance");
        assert!(err.contains("--split-total-tolerance"));

        let mut cli = default_cli_for_api();
        cli.lock_tolerance = f64::NAN;
        let err = build_config(&cli).expect_err("must reject NaN tolerance");
        assert!(err.contains("--lock-tolerance"));
    }

    #[test]
    fn payload_overlays_parse_from_web_keys() {
        let payload = evaluate_payload_from_json(
            r#"{
              "athleteCounts": {"4": 10},
              "programFees": {"4": 8000},
              "monthlyFees": {"3": [600, 600, 700]},
              "hourlyRates": {"qb": 120},
              "oneTimeCosts": {"platform": {"isOneTime": true, "amount": 750}},
              "weeklyHours": [{"level": 4, "role": "qb", "hours": 2.5}],
              "splits": {"4": {"qb": 40, "coach": 15}},
              "capacity": {"qb": {"headcount": 3}},
              "costModel": "hours-rate",
              "revenueBasis": "platform-share"
            }"#,
        );

        let store = build_store_from_payload(&catalog(), &config(), &payload)
            .expect("payload should build a store");
        assert_eq!(store.counts()[&4], 10);
        assert_approx(store.program_fees()[&4], 8000.0);
        assert_eq!(store.monthly_fees()[&3], [600.0, 600.0, 700.0]);
        assert_approx(store.rates()[&Role::Qb].hourly_rate, 120.0);
        assert_approx(store.rates()[&Role::Platform].one_time_cost, 750.0);
        assert_approx(store.weekly_hours()[&(4, Role::Qb)], 2.5);
        assert_eq!(store.capacity()[&Role::Qb].headcount, 3);
        assert_eq!(store.config().cost_model, CostModel::HoursRate);
        assert_eq!(store.config().revenue_basis, RevenueBasis::PlatformShare);
    }

    #[test]
    fn valid_split_overlay_is_committed() {
        // 40 + 15 + 15 + 10 + 20 = 100
        let payload = evaluate_payload_from_json(r#"{"splits": {"4": {"qb": 40, "coach": 15}}}"#);
        let store = build_store_from_payload(&catalog(), &config(), &payload)
            .expect("payload should build a store");

        assert!(store.splits().is_valid(4).expect("level exists"));
        assert_approx(store.splits().accepted(4).expect("level exists")[&Role::Qb], 40.0);
    }

    #[test]
    fn invalid_split_overlay_keeps_accepted_stale() {
        let payload = evaluate_payload_from_json(r#"{"splits": {"4": {"qb": 40}}}"#);
        let store = build_store_from_payload(&catalog(), &config(), &payload)
            .expect("payload should build a store");

        assert!(!store.splits().is_valid(4).expect("level exists"));
        // still the catalog default, the last known-good split
        assert_approx(store.splits().accepted(4).expect("level exists")[&Role::Qb], 30.0);

        let response = build_evaluate_response(&store).expect("evaluation succeeds");
        let status = response
            .split_status
            .iter()
            .find(|s| s.level == 4)
            .expect("level 4 status");
        assert!(!status.valid);
        assert_approx(status.total, 110.0);
        assert_approx(status.accepted[&Role::Qb], 30.0);
    }

    #[test]
    fn unknown_level_in_overlay_is_rejected() {
        let payload = evaluate_payload_from_json(r#"{"athleteCounts": {"9": 5}}"#);
        let err = build_store_from_payload(&catalog(), &config(), &payload)
            .expect_err("level 9 does not exist");
        assert!(err.contains("level 9"));
    }

    #[test]
    fn normalize_endpoint_rebalances_free_roles() {
        let payload = NormalizePayload {
            level: Some(4),
            current: Some(BTreeMap::from([(Role::Qb, 40.0)])),
            baseline: None,
        };

        let response = normalize_from_payload(&catalog(), &config(), &payload)
            .expect("normalization succeeds");
        assert_eq!(response.outcome, NormalizeOutcome::Rebalanced);
        assert!(response.warning.is_none());
        assert!(response.valid);
        assert_approx(response.splits[&Role::Qb], 40.0);
        assert_approx(response.splits[&Role::Coach], 15.0);
        assert_approx(response.total, 100.0);
        // the rebalanced state becomes the new lock-detection reference
        assert_approx(response.baseline[&Role::Qb], 40.0);
    }

    #[test]
    fn normalize_endpoint_warns_when_every_role_is_locked() {
        let payload = NormalizePayload {
            level: Some(4),
            current: Some(BTreeMap::from([
                (Role::ExecutiveDirector, 16.0),
                (Role::Qb, 31.0),
                (Role::Coach, 26.0),
                (Role::Operations, 11.0),
                (Role::Platform, 21.0),
            ])),
            baseline: None,
        };

        let response = normalize_from_payload(&catalog(), &config(), &payload)
            .expect("normalization returns a result");
        assert_eq!(response.outcome, NormalizeOutcome::AllRolesLocked);
        assert!(response.warning.is_some());
        assert!(!response.valid);
        assert_approx(response.splits[&Role::Qb], 31.0);
    }

    #[test]
    fn normalize_endpoint_requires_a_level() {
        let err = normalize_from_payload(&catalog(), &config(), &NormalizePayload::default())
            .expect_err("level is mandatory");
        assert!(err.contains("level"));
    }

    #[test]
    fn evaluate_response_serialization_contains_expected_fields() {
        let store = ModelStore::from_catalog(&catalog(), config());
        let response = build_evaluate_response(&store).expect("evaluation succeeds");
        let json = serde_json::to_string(&response).expect("response should serialize");
        assert!(json.contains("\"costModel\""));
        assert!(json.contains("\"revenueBasis\""));
        assert!(json.contains("\"splitStatus\""));
        assert!(json.contains("\"perAthlete\""));
        assert!(json.contains("\"summary\""));
        assert!(json.contains("\"capacity\""));
        assert!(json.contains("\"costBreakdown\""));
        assert!(json.contains("\"requiredHours\""));
        assert!(json.contains("\"sufficient\""));
    }

    #[test]
    fn defaults_response_serialization_contains_expected_fields() {
        let state = ServerState {
            catalog: catalog(),
            config: config(),
        };
        let json = serde_json::to_string(&build_defaults_response(&state))
            .expect("defaults should serialize");
        assert!(json.contains("\"levels\""));
        assert!(json.contains("\"roles\""));
        assert!(json.contains("\"executive-director\""));
        assert!(json.contains("\"Executive Director\""));
        assert!(json.contains("\"weeklyHours\""));
        assert!(json.contains("\"weeksInProgram\""));
        assert!(json.contains("\"maxWeeklyHours\""));
    }

    #[test]
    fn default_evaluation_uses_catalog_state() {
        let store = ModelStore::from_catalog(&catalog(), config());
        let response = build_evaluate_response(&store).expect("evaluation succeeds");

        let level4 = response
            .per_athlete
            .iter()
            .find(|r| r.level == 4)
            .expect("level 4 result");
        // default split: 80% of the 7500 program fee goes to non-Platform roles
        assert_approx(level4.revenue, 7500.0);
        assert_approx(level4.cost, 6000.0);
        assert_approx(level4.profit, 1500.0);

        let qb = response
            .capacity
            .iter()
            .find(|c| c.role == Role::Qb)
            .expect("qb capacity");
        // one athlete per level: 0.5 + 3 + 4 = 7.5 required, 2 x 20 available
        assert_approx(qb.required_hours, 7.5);
        assert_approx(qb.available_hours, 40.0);
        assert!(qb.sufficient);
    }
}
