mod common;

use common::*;
use poem::http::StatusCode;
use poem::test::TestClient;
use quickchart::build_app;
use quickchart::envelope::ERROR_HEADER;
use quickchart::schemas::chart::ImageKind;
use quickchart::settings::Config;
use serde_json::json;

#[tokio::test]
async fn missing_chart_document_reports_in_the_requested_format() {
    for (format, content_type) in [
        ("png", "image/png"),
        ("svg", "image/svg+xml"),
        ("pdf", "application/pdf"),
    ] {
        let app = build_app(app_state(engines(stub_charts(), stub_graphs(), stub_qr())));
        let cli = TestClient::new(app);

        let resp = cli.get(format!("/chart?f={format}")).send().await;
        resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        resp.assert_header("content-type", content_type);
        resp.assert_header(ERROR_HEADER, "You are missing variable `c` or `chart`");
    }
}

#[tokio::test]
async fn malformed_base64_is_a_client_error_in_the_requested_format() {
    let app = build_app(app_state(engines(stub_charts(), stub_graphs(), stub_qr())));
    let cli = TestClient::new(app);

    let resp = cli
        .get("/chart?c=%21%21%21&encoding=base64&f=svg")
        .send()
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    resp.assert_header("content-type", "image/svg+xml");
}

#[tokio::test]
async fn base64_documents_are_decoded_before_rendering() {
    let charts = stub_charts();
    let app = build_app(app_state(engines(charts.clone(), stub_graphs(), stub_qr())));
    let cli = TestClient::new(app);

    // "{type:'bar'}" in standard base64.
    let resp = cli
        .get("/chart?c=e3R5cGU6J2Jhcid9&encoding=base64")
        .send()
        .await;
    resp.assert_status_is_ok();
    assert_eq!(charts.last_call().unwrap().chart, "{type:'bar'}");
}

#[tokio::test]
async fn absent_or_invalid_sizes_use_the_documented_default() {
    for query in ["/chart?c=x", "/chart?c=x&w=abc&h="] {
        let charts = stub_charts();
        let app = build_app(app_state(engines(charts.clone(), stub_graphs(), stub_qr())));
        let cli = TestClient::new(app);

        let resp = cli.get(query).send().await;
        resp.assert_status_is_ok();

        let job = charts.last_call().unwrap();
        assert_eq!((job.width, job.height), (500, 300));
        assert_eq!(job.version, "2.9.4");
    }
}

#[tokio::test]
async fn svg_post_returns_a_vector_artifact() {
    let charts = stub_charts();
    let app = build_app(app_state(engines(charts.clone(), stub_graphs(), stub_qr())));
    let cli = TestClient::new(app);

    let payload = json!({
        "chart": "{type:'bar',data:{labels:['a'],datasets:[{data:[1]}]}}",
        "format": "svg"
    });
    let resp = cli
        .post("/chart")
        .content_type("application/json")
        .body_json(&payload)
        .send()
        .await;
    resp.assert_status_is_ok();
    resp.assert_header("content-type", "image/svg+xml");

    let job = charts.last_call().unwrap();
    assert_eq!(job.format, ImageKind::Svg);
    assert_eq!(
        job.chart,
        "{type:'bar',data:{labels:['a'],datasets:[{data:[1]}]}}"
    );
}

#[tokio::test]
async fn urlencoded_post_bodies_are_accepted() {
    let charts = stub_charts();
    let app = build_app(app_state(engines(charts.clone(), stub_graphs(), stub_qr())));
    let cli = TestClient::new(app);

    let resp = cli
        .post("/chart")
        .content_type("application/x-www-form-urlencoded")
        .body("c=%7Btype%3A%27bar%27%7D&w=120")
        .send()
        .await;
    resp.assert_status_is_ok();

    let job = charts.last_call().unwrap();
    assert_eq!(job.chart, "{type:'bar'}");
    assert_eq!(job.width, 120);
}

#[tokio::test]
async fn unsupported_formats_get_a_generic_rejection() {
    for method_is_post in [false, true] {
        let app = build_app(app_state(engines(stub_charts(), stub_graphs(), stub_qr())));
        let cli = TestClient::new(app);

        let resp = if method_is_post {
            cli.post("/chart")
                .content_type("application/json")
                .body_json(&json!({ "chart": "x", "format": "webp" }))
                .send()
                .await
        } else {
            cli.get("/chart?c=x&format=webp").send().await
        };
        resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        resp.assert_text("Unsupported format: webp").await;
    }
}

#[tokio::test]
async fn renderer_failures_are_wrapped_in_the_format_envelope() {
    let app = build_app(app_state(engines(
        StubRenderer::failing("chart engine exploded"),
        stub_graphs(),
        stub_qr(),
    )));
    let cli = TestClient::new(app);

    let resp = cli.get("/chart?c=x").send().await;
    resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    resp.assert_header("content-type", "image/png");
    resp.assert_header(ERROR_HEADER, "chart engine exploded");
}

#[tokio::test]
async fn pdf_wraps_the_same_raster_a_png_request_returns() {
    let (png, raw) = sample_png();
    let charts = StubRenderer::ok(&png);
    let app = build_app(app_state(engines(charts.clone(), stub_graphs(), stub_qr())));
    let cli = TestClient::new(app);

    let resp = cli.get("/chart?c=x&format=png").send().await;
    resp.assert_status_is_ok();
    let png_body = resp.0.into_body().into_bytes().await.unwrap();
    assert_eq!(png_body, png);

    let resp = cli.get("/chart?c=x&format=pdf").send().await;
    resp.assert_status_is_ok();
    resp.assert_header("content-type", "application/pdf");
    let pdf_body = resp.0.into_body().into_bytes().await.unwrap();
    assert!(pdf_body.starts_with(b"%PDF"));
    // The page embeds the identical raster, stored as uncompressed RGB.
    assert!(contains(&pdf_body, &raw));

    // Both requests handed the engine the same job apart from nothing:
    // the pdf path renders a raster too.
    let calls = charts.calls.lock();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], calls[1]);
}

#[tokio::test]
async fn identical_requests_get_identical_responses() {
    let app = build_app(app_state(engines(stub_charts(), stub_graphs(), stub_qr())));
    let cli = TestClient::new(app);

    let first = cli.get("/chart?c=x&w=120&h=90").send().await;
    first.assert_status_is_ok();
    let first_body = first.0.into_body().into_bytes().await.unwrap();

    let second = cli.get("/chart?c=x&w=120&h=90").send().await;
    second.assert_status_is_ok();
    let second_body = second.0.into_body().into_bytes().await.unwrap();

    assert_eq!(first_body, second_body);
}

#[tokio::test]
async fn failure_envelopes_are_deterministic_too() {
    let app = build_app(app_state(engines(
        StubRenderer::failing("boom"),
        stub_graphs(),
        stub_qr(),
    )));
    let cli = TestClient::new(app);

    let first = cli.get("/chart?c=x&f=svg").send().await;
    let first_body = first.0.into_body().into_bytes().await.unwrap();
    let second = cli.get("/chart?c=x&f=svg").send().await;
    let second_body = second.0.into_body().into_bytes().await.unwrap();

    assert_eq!(first_body, second_body);
}

#[tokio::test]
async fn cache_policy_follows_the_environment() {
    let prod = Config {
        env: "production".to_string(),
        ..Config::default()
    };
    let app = build_app(app_state_with_config(
        engines(stub_charts(), stub_graphs(), stub_qr()),
        prod,
    ));
    let resp = TestClient::new(app).get("/chart?c=x").send().await;
    resp.assert_status_is_ok();
    resp.assert_header("cache-control", "public, max-age=604800");

    let app = build_app(app_state(engines(stub_charts(), stub_graphs(), stub_qr())));
    let resp = TestClient::new(app).get("/chart?c=x").send().await;
    resp.assert_status_is_ok();
    resp.assert_header("cache-control", "no-cache");
}

#[tokio::test]
async fn oversized_json_bodies_are_rejected() {
    let config = Config {
        json_limit: 64,
        ..Config::default()
    };
    let app = build_app(app_state_with_config(
        engines(stub_charts(), stub_graphs(), stub_qr()),
        config,
    ));
    let cli = TestClient::new(app);

    let payload = json!({ "chart": "x".repeat(200) });
    let resp = cli
        .post("/chart")
        .content_type("application/json")
        .body_json(&payload)
        .send()
        .await;
    resp.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn rate_limit_rejects_once_the_budget_is_spent() {
    let config = Config {
        rate_limit_per_min: Some(1),
        ..Config::default()
    };
    let app = build_app(app_state_with_config(
        engines(stub_charts(), stub_graphs(), stub_qr()),
        config,
    ));
    let cli = TestClient::new(app);

    let first = cli.get("/chart?c=x").send().await;
    first.assert_status_is_ok();

    let second = cli.get("/chart?c=x").send().await;
    second.assert_status(StatusCode::TOO_MANY_REQUESTS);

    // Other endpoints are outside the admission-control mount.
    let health = cli.get("/healthcheck").send().await;
    health.assert_status_is_ok();
}
