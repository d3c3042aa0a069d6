use std::sync::Arc;

use poem::http::StatusCode;
use poem::web::Data;
use poem::{Request, Response, handler};

use crate::AppState;
use crate::envelope::{ErrorEnvelope, artifact};
use crate::schemas::chart::{ImageKind, Params};
use crate::schemas::qr::{DEFAULT_QR_MARGIN, DEFAULT_QR_SIZE, EcLevel, MAX_QR_SIZE, QrJob};

#[handler]
pub async fn get_qr(req: &Request, Data(state): Data<&Arc<AppState>>) -> Response {
    let params = Params::from_query(req.uri().query().unwrap_or(""));

    let format = match params.get("format") {
        Some("svg") => ImageKind::Svg,
        _ => ImageKind::Png,
    };
    let envelope = ErrorEnvelope::for_image(format);

    let Some(text) = params.get("text") else {
        return envelope.respond("Missing `text`", StatusCode::INTERNAL_SERVER_ERROR);
    };

    let job = QrJob {
        text: text.to_string(),
        format,
        size: params
            .get("size")
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|v| *v > 0)
            .map(|v| v.min(MAX_QR_SIZE))
            .unwrap_or(DEFAULT_QR_SIZE),
        margin: params
            .get("margin")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_QR_MARGIN),
        ec_level: params
            .get("ecLevel")
            .and_then(EcLevel::parse)
            .unwrap_or_default(),
        dark: params.get("dark").unwrap_or("000").to_string(),
        light: params.get("light").unwrap_or("fff").to_string(),
    };

    state.telemetry.count_qr();
    match state.engines.qr(&job).await {
        Ok(bytes) => artifact(bytes, format.mime(), state.is_dev()),
        Err(failure) => envelope.respond(&failure.message, failure.status),
    }
}
