use std::collections::BTreeMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono_tz::Tz;
use opentelemetry::metrics::{Counter, MeterProvider};
use opentelemetry::KeyValue;
use opentelemetry_prometheus::exporter;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::{Encoder, Registry, TextEncoder};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use weewx_config::AppConfig;
use weex_core::{
    period_label, resolve_period, AggregateKind, Period, PeriodError, ProviderRegistry, TimeSpan, Timestamp,
    UnitConverter, SECONDS_PER_NOMINAL_MONTH,
};
use weex_db::DbClient;
use weex_stats::{
    json::zip_vectors, min_ranges, week_bundle, year_bundle, ChartContext, DailySummaryAggregator,
    StatsError,
};

/// Aggregates served by the day-summary endpoint when `agg` is absent
const DEFAULT_AGGREGATES: &str = "min,max,avg";

pub struct AppState {
    ready: AtomicBool,
    registry: Registry,
    #[allow(dead_code)]
    provider: SdkMeterProvider,
    requests_total: Counter<u64>,
    charts: ChartContext,
}

impl AppState {
    fn count(&self, route: &'static str) {
        self.requests_total
            .add(1, &[KeyValue::new("route", route)]);
    }
}

/// Open one read-only database client per configured binding
pub async fn open_bindings(cfg: &AppConfig, tz: Tz) -> Result<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();
    for (name, url) in cfg.bindings() {
        let client = DbClient::new(&url)
            .await
            .with_context(|| format!("failed to open binding {name} at {url}"))?;
        tracing::info!(binding = %name, %url, "Database binding opened");
        registry.register(name, Arc::new(client.with_timezone(tz)));
    }
    Ok(registry)
}

pub fn build_app(charts: ChartContext) -> Result<(Router, Arc<AppState>)> {
    // Prometheus exporter via OpenTelemetry
    let registry = Registry::new();
    let reader = exporter()
        .with_registry(registry.clone())
        .build()
        .context("failed to build prometheus exporter")?;
    let provider = SdkMeterProvider::builder().with_reader(reader).build();
    let meter = provider.meter("weewx-cli");

    let requests_total = meter
        .u64_counter("weewx_requests_total")
        .with_description("Total HTTP requests served")
        .init();

    let state = Arc::new(AppState {
        ready: AtomicBool::new(false),
        registry,
        provider,
        requests_total,
        charts,
    });

    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/windrose", get(windrose_all))
        .route("/api/v1/windrose/:period", get(windrose_period))
        .route("/api/v1/day-summary/:obs_type", get(day_summary))
        .route("/api/v1/week", get(week))
        .route("/api/v1/year", get(year))
        .route("/api/v1/min-ranges", get(min_range))
        .with_state(Arc::clone(&state));

    Ok((router, state))
}

pub fn set_ready(state: &Arc<AppState>, is_ready: bool) {
    state.ready.store(is_ready, Ordering::Relaxed);
}

/// Chart errors mapped onto HTTP statuses
pub struct ApiError(StatsError);

impl From<StatsError> for ApiError {
    fn from(err: StatsError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            e if e.is_unknown_type() => StatusCode::NOT_FOUND,
            StatsError::NoData | StatsError::InsufficientData => {
                return StatusCode::NO_CONTENT.into_response()
            }
            StatsError::EmptyRequest
            | StatsError::InvalidTimespan(_)
            | StatsError::Period(PeriodError::OutOfRange(_)) => StatusCode::BAD_REQUEST,
            e => {
                tracing::error!(error = %e, "chart request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Default, Deserialize)]
struct StopQuery {
    stop: Option<Timestamp>,
}

/// Requested stop, or the last good stamp of the default binding
async fn resolve_stop(charts: &ChartContext, stop: Option<Timestamp>) -> ApiResult<Timestamp> {
    if let Some(stop) = stop {
        return Ok(stop);
    }
    let provider = charts.registry.default_provider().map_err(StatsError::from)?;
    provider
        .last_good_stamp()
        .await
        .map_err(StatsError::from)?
        .ok_or(ApiError(StatsError::NoData))
}

async fn healthz(State(state): State<Arc<AppState>>) -> StatusCode {
    state.count("healthz");
    StatusCode::OK
}

async fn readyz(State(state): State<Arc<AppState>>) -> StatusCode {
    if state.ready.load(Ordering::Relaxed) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn metrics(
    State(state): State<Arc<AppState>>,
) -> (
    [(axum::http::header::HeaderName, axum::http::HeaderValue); 1],
    String,
) {
    let encoder = TextEncoder::new();
    let metric_families = state.registry.gather();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buf) {
        tracing::warn!(error=?e, "failed to encode metrics");
    }
    let body = String::from_utf8(buf).unwrap_or_default();
    let header = (
        header::CONTENT_TYPE,
        axum::http::HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
    );
    ([header], body)
}

async fn windrose_all(
    State(state): State<Arc<AppState>>,
    Query(q): Query<StopQuery>,
) -> ApiResult<Json<Value>> {
    state.count("windrose");
    let charts = &state.charts;
    let stop = resolve_stop(charts, q.stop).await?;
    let provider = charts.registry.default_provider().map_err(StatsError::from)?;

    let roses = charts
        .windrose_binner()
        .compute_periods(provider.as_ref(), stop)
        .await?;
    let body: Map<String, Value> = roses
        .into_iter()
        .map(|(key, rose)| (key, rose.to_json()))
        .collect();
    Ok(Json(Value::Object(body)))
}

async fn windrose_period(
    State(state): State<Arc<AppState>>,
    Path(period): Path<String>,
    Query(q): Query<StopQuery>,
) -> ApiResult<Json<Value>> {
    state.count("windrose");
    let charts = &state.charts;
    let stop = resolve_stop(charts, q.stop).await?;
    let provider = charts.registry.default_provider().map_err(StatsError::from)?;

    let parsed = Period::parse(&period);
    let first_good = if parsed == Period::AllTime {
        provider.first_good_stamp().await.map_err(StatsError::from)?
    } else {
        None
    };
    let resolved = resolve_period(parsed, stop, &charts.tz, first_good).map_err(StatsError::from)?;
    let rose = charts
        .windrose_binner()
        .compute(
            provider.as_ref(),
            TimeSpan::new(resolved.start, stop),
            resolved.seconds,
        )
        .await?;

    let mut body = Map::new();
    body.insert(
        format!("wr{}", period_label(&period, resolved.seconds)),
        rose.to_json(),
    );
    Ok(Json(Value::Object(body)))
}

#[derive(Debug, Deserialize)]
struct DaySummaryQuery {
    agg: Option<String>,
    start: Option<Timestamp>,
    stop: Option<Timestamp>,
}

async fn day_summary(
    State(state): State<Arc<AppState>>,
    Path(obs_type): Path<String>,
    Query(q): Query<DaySummaryQuery>,
) -> ApiResult<Response> {
    state.count("day_summary");
    let charts = &state.charts;

    let kinds: Vec<AggregateKind> = q
        .agg
        .as_deref()
        .unwrap_or(DEFAULT_AGGREGATES)
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(AggregateKind::parse)
        .collect();
    if let Some(unknown) = kinds.iter().find(|k| matches!(k, AggregateKind::Unknown(_))) {
        let body = json!({ "error": format!("Unknown aggregate '{}'", unknown.as_str()) });
        return Ok((StatusCode::BAD_REQUEST, Json(body)).into_response());
    }

    let stop = resolve_stop(charts, q.stop).await?;
    let start = q.start.unwrap_or(stop.saturating_sub(SECONDS_PER_NOMINAL_MONTH));
    let provider = charts.registry.default_provider().map_err(StatsError::from)?;

    let out = DailySummaryAggregator::new(charts.tz)
        .compute(provider.as_ref(), &obs_type, TimeSpan::new(start, stop), &kinds)
        .await?;

    let mut columns = Vec::with_capacity(kinds.len());
    let mut units = BTreeMap::new();
    for kind in &kinds {
        let values = match out.get(kind) {
            Some(vector) => {
                let converted = charts.converter.convert(vector).map_err(StatsError::from)?;
                units.insert(
                    kind.as_str().to_string(),
                    charts.formatter.label(converted.unit).trim().to_string(),
                );
                charts.formatter.round_vector(&converted)
            }
            None => vec![None; out.time.len()],
        };
        columns.push(values);
    }
    let column_refs: Vec<&[Option<f64>]> = columns.iter().map(Vec::as_slice).collect();

    let body = json!({
        "obs_type": obs_type,
        "aggregates": kinds.iter().map(AggregateKind::as_str).collect::<Vec<_>>(),
        "units": units,
        "data": zip_vectors(&out.time.to_millis(), &column_refs),
    });
    Ok(Json(body).into_response())
}

async fn week(
    State(state): State<Arc<AppState>>,
    Query(q): Query<StopQuery>,
) -> ApiResult<Json<Value>> {
    state.count("week");
    let stop = resolve_stop(&state.charts, q.stop).await?;
    let bundle = week_bundle(&state.charts, stop).await?;
    Ok(Json(Value::Object(bundle)))
}

async fn year(
    State(state): State<Arc<AppState>>,
    Query(q): Query<StopQuery>,
) -> ApiResult<Json<Value>> {
    state.count("year");
    let stop = resolve_stop(&state.charts, q.stop).await?;
    let bundle = year_bundle(&state.charts, stop).await?;
    Ok(Json(Value::Object(bundle)))
}

async fn min_range(State(state): State<Arc<AppState>>) -> Json<BTreeMap<String, f64>> {
    state.count("min_ranges");
    Json(min_ranges(&state.charts.min_range, &state.charts.converter))
}
