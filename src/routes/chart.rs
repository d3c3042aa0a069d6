use std::sync::Arc;

use poem::http::StatusCode;
use poem::web::Data;
use poem::{Body, Request, Response, handler};

use crate::AppState;
use crate::core::pdf;
use crate::envelope::{ErrorEnvelope, artifact};
use crate::schemas::chart::{
    ChartJob, DEFAULT_VERSION, ImageKind, OutputFormat, Params, RenderRequest,
};
use crate::schemas::legacy::{LegacyChartRequest, classify};

const MISSING_CHART_MESSAGE: &str = "You are missing variable `c` or `chart`";

#[handler]
pub async fn get_chart(req: &Request, Data(state): Data<&Arc<AppState>>) -> Response {
    let params = Params::from_query(req.uri().query().unwrap_or(""));
    if params.contains("cht") {
        return handle_legacy(&params, &req.original_uri().to_string(), state).await;
    }
    dispatch(params, state).await
}

#[handler]
pub async fn post_chart(
    req: &Request,
    body: Body,
    Data(state): Data<&Arc<AppState>>,
) -> Response {
    let bytes = match body.into_bytes().await {
        Ok(bytes) => bytes,
        Err(err) => {
            return Response::builder()
                .status(StatusCode::BAD_REQUEST)
                .body(format!("Unable to read request body: {err}"));
        }
    };
    if bytes.len() > state.config.json_limit {
        return Response::builder()
            .status(StatusCode::PAYLOAD_TOO_LARGE)
            .body("Request body exceeds the configured limit");
    }

    let params = match req.content_type() {
        Some(content_type) if content_type.starts_with("application/json") => {
            match serde_json::from_slice::<serde_json::Value>(&bytes) {
                Ok(value) => Params::from_json(&value),
                Err(err) => {
                    return Response::builder()
                        .status(StatusCode::BAD_REQUEST)
                        .body(format!("Invalid JSON body: {err}"));
                }
            }
        }
        _ => Params::from_urlencoded(&bytes),
    };

    if params.contains("cht") {
        return handle_legacy(&params, &req.original_uri().to_string(), state).await;
    }
    dispatch(params, state).await
}

#[handler]
pub async fn get_gchart(req: &Request, Data(state): Data<&Arc<AppState>>) -> Response {
    let params = Params::from_query(req.uri().query().unwrap_or(""));
    handle_legacy(&params, &req.original_uri().to_string(), state).await
}

/// Format dispatch for the canonical request: validate the output
/// format, pick the matching failure envelope, then render and wrap.
async fn dispatch(params: Params, state: &AppState) -> Response {
    let request = RenderRequest::from_params(&params);

    let Some(format) = OutputFormat::parse(&request.format) else {
        // No envelope exists for an unknown format; this failure is
        // deliberately generic.
        return Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(format!("Unsupported format: {}", request.format));
    };
    let envelope = ErrorEnvelope::for_format(format);

    let document = match request.chart_document() {
        Ok(Some(document)) => document,
        Ok(None) => {
            return envelope.respond(MISSING_CHART_MESSAGE, StatusCode::INTERNAL_SERVER_ERROR);
        }
        Err(err) => {
            tracing::warn!("base64 malformed: {}", err);
            return envelope.respond(&err.to_string(), StatusCode::BAD_REQUEST);
        }
    };

    let job = ChartJob {
        chart: document,
        width: request.width,
        height: request.height,
        background_color: request.background_color.clone(),
        device_pixel_ratio: request.device_pixel_ratio,
        version: request.version.clone(),
        format: format.image_kind(),
    };

    state.telemetry.count_chart();
    match state.engines.chart(&job).await {
        Err(failure) => envelope.respond(&failure.message, failure.status),
        Ok(bytes) => match format {
            OutputFormat::Png | OutputFormat::Svg => {
                artifact(bytes, format.mime(), state.is_dev())
            }
            OutputFormat::Pdf => match pdf::wrap_png(&bytes) {
                Ok(document) => artifact(document, format.mime(), state.is_dev()),
                Err(err) => {
                    tracing::warn!("pdf embedding failed: {:#}", err);
                    envelope.respond(&err.to_string(), StatusCode::INTERNAL_SERVER_ERROR)
                }
            },
        },
    }
}

/// The legacy parameter family: one classification, three terminal
/// branches. Translation failures are reported generically on purpose;
/// legacy clients are always raster-bound.
pub(crate) async fn handle_legacy(
    params: &Params,
    original_url: &str,
    state: &AppState,
) -> Response {
    match classify(params) {
        Err(err) => ErrorEnvelope::Png.respond(&err.to_string(), StatusCode::INTERNAL_SERVER_ERROR),
        Ok(LegacyChartRequest::Graph(job)) => {
            let envelope = ErrorEnvelope::for_image(job.format);
            match state.engines.graph(&job).await {
                Ok(bytes) => artifact(bytes, job.format.mime(), state.is_dev()),
                Err(failure) => envelope.respond(&failure.message, failure.status),
            }
        }
        Ok(LegacyChartRequest::Qr(job)) => match state.engines.qr(&job).await {
            Ok(bytes) => artifact(bytes, job.format.mime(), state.is_dev()),
            Err(failure) => ErrorEnvelope::Png.respond(&failure.message, failure.status),
        },
        Ok(LegacyChartRequest::Translate(legacy_params)) => {
            state.telemetry.count_chart();
            let translated = match state.engines.translator.translate(&legacy_params) {
                Ok(translated) => translated,
                Err(err) => {
                    tracing::error!("GChart error: {} ({:#})", original_url, err);
                    return Response::builder()
                        .status(StatusCode::INTERNAL_SERVER_ERROR)
                        .body("Unsupported chart configuration");
                }
            };
            let job = ChartJob {
                chart: translated.chart,
                width: translated.width,
                height: translated.height,
                background_color: translated.background_color,
                device_pixel_ratio: Some(1.0),
                version: DEFAULT_VERSION.to_string(),
                format: ImageKind::Png,
            };
            match state.engines.chart(&job).await {
                Ok(bytes) => artifact(bytes, job.format.mime(), state.is_dev()),
                Err(failure) => ErrorEnvelope::Png.respond(&failure.message, failure.status),
            }
        }
    }
}
