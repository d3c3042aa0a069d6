mod common;

use common::*;
use poem::http::StatusCode;
use poem::test::TestClient;
use quickchart::build_app;
use quickchart::telemetry::Counter;
use serde_json::{Value, json};

#[tokio::test]
async fn index_serves_informational_text() {
    let app = build_app(app_state(engines(stub_charts(), stub_graphs(), stub_qr())));
    let cli = TestClient::new(app);

    let resp = cli.get("/").send().await;
    resp.assert_status_is_ok();
    let body = resp.0.into_body().into_string().await.unwrap();
    assert!(body.contains("QuickChart is running!"));
}

#[tokio::test]
async fn healthcheck_reports_success_and_version() {
    let app = build_app(app_state(engines(stub_charts(), stub_graphs(), stub_qr())));
    let cli = TestClient::new(app);

    let resp = cli.get("/healthcheck").send().await;
    resp.assert_status_is_ok();
    let body = resp.0.into_body().into_string().await.unwrap();
    let health: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(health["success"], json!(true));
    assert!(health["version"].is_string());
}

#[tokio::test]
async fn healthcheck_chart_redirects_through_the_primary_endpoint() {
    let app = build_app(app_state(engines(stub_charts(), stub_graphs(), stub_qr())));
    let cli = TestClient::new(app);

    let resp = cli.get("/healthcheck/chart").send().await;
    resp.assert_status(StatusCode::FOUND);
    let location = resp
        .0
        .headers()
        .get("location")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(location.starts_with("/chart?c="));
    assert!(location.contains("bar"));
}

#[tokio::test]
async fn telemetry_reports_are_recorded_and_always_succeed() {
    let state = app_state(engines(stub_charts(), stub_graphs(), stub_qr()));
    let app = build_app(state.clone());
    let cli = TestClient::new(app);

    let resp = cli
        .post("/telemetry")
        .content_type("application/json")
        .body_json(&json!({ "pid": 4242, "chartCount": 17, "qrCount": "3" }))
        .send()
        .await;
    resp.assert_status_is_ok();
    let body = resp.0.into_body().into_string().await.unwrap();
    assert_eq!(body, r#"{"success":true}"#);

    assert_eq!(state.telemetry.reported_total(Counter::Chart), 17);
    assert_eq!(state.telemetry.reported_total(Counter::Qr), 3);
}

#[tokio::test]
async fn garbage_telemetry_is_dropped_but_still_succeeds() {
    let state = app_state(engines(stub_charts(), stub_graphs(), stub_qr()));
    let app = build_app(state.clone());
    let cli = TestClient::new(app);

    let resp = cli
        .post("/telemetry")
        .content_type("application/json")
        .body("not json at all")
        .send()
        .await;
    resp.assert_status_is_ok();
    assert_eq!(state.telemetry.reported_total(Counter::Chart), 0);
}

#[tokio::test]
async fn render_invocations_bump_the_local_counters() {
    let state = app_state(engines(stub_charts(), stub_graphs(), stub_qr()));
    let app = build_app(state.clone());
    let cli = TestClient::new(app);

    cli.get("/chart?c=x").send().await.assert_status_is_ok();
    cli.get("/qr?text=hi").send().await.assert_status_is_ok();

    assert_eq!(state.telemetry.chart_total(), 1);
    assert_eq!(state.telemetry.qr_total(), 1);
}
