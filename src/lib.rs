use std::sync::Arc;
use std::time::Duration;

use poem::middleware::{AddData, Cors, Tracing};
use poem::{Endpoint, EndpointExt, Response, Route, get, post};

use crate::core::Engines;
use crate::settings::Config;
use crate::telemetry::Telemetry;

pub mod core;
pub mod envelope;
pub mod middleware;
pub mod routes;
pub mod schemas;
pub mod settings;
pub mod telemetry;

pub struct AppState {
    pub engines: Engines,
    pub telemetry: Telemetry,
    pub config: Config,
}

impl AppState {
    pub fn is_dev(&self) -> bool {
        self.config.is_dev()
    }
}

/// The full route tree. Rate limiting is admission control and mounts
/// only on the chart-rendering endpoint; the request deadline covers
/// everything.
pub fn build_app(state: Arc<AppState>) -> impl Endpoint<Output = Response> {
    let timeout = Duration::from_millis(state.config.request_timeout_ms);
    let rate_limit = middleware::RateLimit::new(state.config.rate_limit_per_min);

    Route::new()
        .at("/", get(routes::misc::index))
        .at(
            "/chart",
            get(routes::chart::get_chart)
                .post(routes::chart::post_chart)
                .with(rate_limit),
        )
        .at("/gchart", get(routes::chart::get_gchart))
        .at("/qr", get(routes::qr::get_qr))
        .at("/telemetry", post(routes::misc::telemetry_report))
        .at("/healthcheck", get(routes::misc::healthcheck))
        .at("/healthcheck/chart", get(routes::misc::healthcheck_chart))
        .with(middleware::Timeout::new(timeout))
        .with(Tracing)
        .with(Cors::new())
        .with(AddData::new(state))
        .map_to_response()
}
