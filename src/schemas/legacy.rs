use super::chart::{ImageKind, Params};
use super::qr::{DEFAULT_QR_MARGIN, EcLevel, QrJob};

pub const DEFAULT_GRAPH_ENGINE: &str = "dot";

#[derive(Debug, Clone, PartialEq)]
pub struct GraphJob {
    pub document: String,
    pub engine: String,
    pub format: ImageKind,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// The legacy parameter family, discriminated by its type code. Each
/// variant is terminal; there is no fallback between branches.
#[derive(Debug, Clone, PartialEq)]
pub enum LegacyChartRequest {
    Graph(GraphJob),
    Qr(QrJob),
    Translate(Params),
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum LegacyError {
    #[error("You are missing variable `{0}`")]
    MissingField(&'static str),
    #[error("Invalid size `{0}`")]
    InvalidSize(String),
}

/// One-shot classification of a legacy request.
pub fn classify(params: &Params) -> Result<LegacyChartRequest, LegacyError> {
    let cht = params.get("cht").ok_or(LegacyError::MissingField("cht"))?;

    if cht.starts_with("gv") {
        let engine = cht
            .split_once(':')
            .map_or(DEFAULT_GRAPH_ENGINE, |(_, suffix)| suffix);
        let format = match params.get("chof") {
            Some("svg") => ImageKind::Svg,
            _ => ImageKind::Png,
        };
        let size = params.get("chs").and_then(parse_size);
        let document = params.get("chl").ok_or(LegacyError::MissingField("chl"))?;
        return Ok(LegacyChartRequest::Graph(GraphJob {
            document: document.to_string(),
            engine: engine.to_string(),
            format,
            width: size.map(|(w, _)| w),
            height: size.map(|(_, h)| h),
        }));
    }

    if cht == "qr" {
        let chs = params.get("chs").ok_or(LegacyError::MissingField("chs"))?;
        let size = chs
            .split('x')
            .next()
            .unwrap_or("")
            .parse::<u32>()
            .map_err(|_| LegacyError::InvalidSize(chs.to_string()))?;
        let text = params.get("chl").ok_or(LegacyError::MissingField("chl"))?;
        let mut chld = params.get("chld").unwrap_or("").split('|');
        let ec_level = chld
            .next()
            .and_then(EcLevel::parse)
            .unwrap_or(EcLevel::L);
        let margin = chld
            .next()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_QR_MARGIN);
        return Ok(LegacyChartRequest::Qr(QrJob {
            text: text.to_string(),
            format: ImageKind::Png,
            size,
            margin,
            ec_level,
            dark: "000".to_string(),
            light: "fff".to_string(),
        }));
    }

    Ok(LegacyChartRequest::Translate(params.clone()))
}

/// `WxH` pairs from the legacy `chs` parameter.
pub fn parse_size(raw: &str) -> Option<(u32, u32)> {
    let (w, h) = raw.split_once('x')?;
    Some((w.parse().ok()?, h.parse().ok()?))
}
