use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use weewx_config::AppConfig;
use weex_core::{
    DaySummaryRecord, MemoryProvider, ProviderRegistry, SeriesProvider, UnitSystem,
    DEFAULT_BINDING,
};
use weex_db::DbClient;
use weex_stats::ChartContext;

/// 2023-11-15 00:00:00 UTC
const MIDNIGHT: i64 = 1_700_006_400;

fn app_with(provider: Arc<dyn SeriesProvider>, extra: &str) -> Router {
    let mut registry = ProviderRegistry::new();
    registry.register(DEFAULT_BINDING, provider);
    let config =
        AppConfig::from_toml(&format!("[units]\nunit_system = \"us\"\n{extra}")).unwrap();
    let charts = ChartContext::from_config(&config, registry).unwrap();
    let (app, _state) = weewx_cli::build_app(charts).unwrap();
    app
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Option<Value>) {
    let res = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = res.status();
    let body = to_bytes(res.into_body(), 1024 * 1024).await.unwrap();
    let value = (!body.is_empty()).then(|| serde_json::from_slice(&body).unwrap());
    (status, value)
}

fn wind_provider() -> MemoryProvider {
    let stamps: Vec<i64> = (0..12).map(|i| MIDNIGHT - 300 * i).collect();
    MemoryProvider::new(UnitSystem::Us)
        .with_archive(
            "windSpeed",
            stamps.iter().map(|ts| (*ts, Some(5.0))).collect(),
        )
        .with_archive(
            "windDir",
            stamps.iter().map(|ts| (*ts, Some(90.0))).collect(),
        )
}

#[tokio::test]
async fn empty_archive_has_no_content() {
    let app = app_with(Arc::new(MemoryProvider::empty()), "");

    for uri in ["/api/v1/windrose", "/api/v1/week", "/api/v1/day-summary/outTemp"] {
        let (status, body) = get(&app, uri).await;
        assert_eq!(status, StatusCode::NO_CONTENT, "{uri}");
        assert!(body.is_none());
    }
}

#[tokio::test]
async fn windrose_endpoints() {
    let app = app_with(Arc::new(wind_provider()), "");

    let (status, body) = get(&app, "/api/v1/windrose").await;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    let rose = &body["wrday"];
    assert_eq!(rose["categories"].as_array().unwrap().len(), 8);
    assert_eq!(rose["windrose"].as_array().unwrap().len(), 6);
    assert!(rose["yAxis"]["max"].as_f64().unwrap() >= 10.0);

    let (status, body) = get(&app, &format!("/api/v1/windrose/3600?stop={MIDNIGHT}")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.unwrap().get("wr3600").is_some());
}

#[tokio::test]
async fn day_summary_from_database() {
    let db = DbClient::in_memory().await.unwrap();
    db.create_archive_table(&["outTemp"]).await.unwrap();
    db.insert_archive(MIDNIGHT, UnitSystem::Us, 5, &[("outTemp", Some(40.0))])
        .await
        .unwrap();
    db.create_day_summary_table("outTemp", false).await.unwrap();
    for (day_start, min, max) in [(MIDNIGHT - 86_400, 30.04, 50.0), (MIDNIGHT, 35.0, 45.0)] {
        let record = DaySummaryRecord {
            day_start,
            min: Some(min),
            max: Some(max),
            count: Some(288),
            wsum: Some(40.0 * 86_400.0),
            sumtime: Some(86_400.0),
            ..Default::default()
        };
        db.insert_day_summary("outTemp", &record).await.unwrap();
    }
    let app = app_with(Arc::new(db), "");

    let uri = format!(
        "/api/v1/day-summary/outTemp?agg=min,max&start={}&stop={}",
        MIDNIGHT - 2 * 86_400,
        MIDNIGHT + 1
    );
    let (status, body) = get(&app, &uri).await;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["aggregates"], json!(["min", "max"]));
    assert_eq!(body["units"]["min"], json!("°F"));
    let t0 = (MIDNIGHT - 86_400) as f64 * 1000.0;
    let t1 = MIDNIGHT as f64 * 1000.0;
    assert_eq!(body["data"], json!([[t0, 30.0, 50.0], [t1, 35.0, 45.0]]));

    let (status, body) = get(&app, "/api/v1/day-summary/hail?agg=max").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.unwrap()["error"].as_str().unwrap().contains("hail"));

    let (status, _) = get(&app, "/api/v1/day-summary/outTemp?agg=median").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn week_year_and_min_ranges() {
    let provider = MemoryProvider::new(UnitSystem::Us)
        .with_archive("outTemp", vec![(MIDNIGHT, Some(40.0))]);
    let app = app_with(Arc::new(provider), "[extras.min_range]\nbarometer = 20\n");

    let (status, body) = get(&app, "/api/v1/week").await;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["weekPlotEnd"], json!(MIDNIGHT * 1000));
    assert_eq!(body["outTempWeekjson"], json!([[MIDNIGHT as f64 * 1000.0, 40.0]]));
    assert_eq!(body["rainWeekjson"], Value::Null);

    let (status, body) = get(&app, &format!("/api/v1/year?stop={MIDNIGHT}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["outtemp_min_json"], Value::Null);

    let (status, body) = get(&app, "/api/v1/min-ranges").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap(), json!({ "barometer_min_range": 20.0 }));
}

#[tokio::test]
async fn extreme_stop_is_a_bad_request() {
    let provider = MemoryProvider::new(UnitSystem::Us)
        .with_archive("outTemp", vec![(MIDNIGHT, Some(40.0))]);
    let app = app_with(Arc::new(provider), "");

    let (status, body) = get(&app, &format!("/api/v1/day-summary/outTemp?stop={}", i64::MIN)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.unwrap()["error"].is_string());
}
