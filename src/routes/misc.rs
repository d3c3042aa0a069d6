use std::sync::Arc;

use poem::http::{StatusCode, header};
use poem::web::{Data, Html, Json};
use poem::{Body, Response, handler};
use serde_json::json;

use crate::AppState;
use crate::telemetry::Counter;

#[handler]
pub fn index() -> Html<&'static str> {
    Html("QuickChart is running!<br><br>Point a chart or QR request at /chart or /qr to render it.")
}

#[handler]
pub fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "success": true, "version": env!("CARGO_PKG_VERSION") }))
}

/// Synthesizes a random bar chart and bounces it through the primary
/// rendering endpoint, exercising the whole pipeline.
#[handler]
pub fn healthcheck_chart() -> Response {
    let labels: Vec<String> = (0..5).map(|_| fastrand::f64().to_string()).collect();
    let data: Vec<String> = (0..5).map(|_| fastrand::f64().to_string()).collect();
    let chart = format!(
        "{{ type: 'bar', data: {{ labels: [{}], datasets: [{{ data: [{}] }}] }} }}",
        labels.join(","),
        data.join(",")
    );

    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("c", &chart)
        .finish();
    Response::builder()
        .status(StatusCode::FOUND)
        .header(header::LOCATION, format!("/chart?{query}"))
        .finish()
}

/// Fire and forget: malformed reports are dropped, the response is
/// always a success.
#[handler]
pub async fn telemetry_report(body: Body, Data(state): Data<&Arc<AppState>>) -> Json<serde_json::Value> {
    if let Ok(bytes) = body.into_bytes().await {
        if let Ok(report) = serde_json::from_slice::<serde_json::Value>(&bytes) {
            let pid = match &report["pid"] {
                serde_json::Value::String(pid) => pid.clone(),
                serde_json::Value::Number(pid) => pid.to_string(),
                _ => "unknown".to_string(),
            };
            if let Some(count) = counter_value(&report, "chartCount") {
                state.telemetry.receive(&pid, Counter::Chart, count);
            }
            if let Some(count) = counter_value(&report, "qrCount") {
                state.telemetry.receive(&pid, Counter::Qr, count);
            }
        }
    }

    Json(json!({ "success": true }))
}

fn counter_value(report: &serde_json::Value, key: &str) -> Option<u64> {
    match &report[key] {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
