use std::collections::HashMap;

use base64::{Engine as _, engine::general_purpose};
use percent_encoding::percent_decode_str;

pub const DEFAULT_WIDTH: u32 = 500;
pub const DEFAULT_HEIGHT: u32 = 300;
pub const DEFAULT_VERSION: &str = "2.9.4";

/// Flat view over one parameter source: the query string, a JSON body,
/// or a urlencoded body. Duplicate keys keep the first occurrence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(HashMap<String, String>);

impl Params {
    /// Decodes the way the original gateway configured its query parser:
    /// percent-decoding only, so `+` stays a literal plus (chart
    /// documents routinely contain it).
    pub fn from_query(raw: &str) -> Self {
        let mut map = HashMap::new();
        for pair in raw.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            map.entry(decode_component(key))
                .or_insert_with(|| decode_component(value));
        }
        Self(map)
    }

    pub fn from_urlencoded(body: &[u8]) -> Self {
        let mut map = HashMap::new();
        for (key, value) in url::form_urlencoded::parse(body) {
            map.entry(key.into_owned())
                .or_insert_with(|| value.into_owned());
        }
        Self(map)
    }

    /// JSON bodies may carry the chart as a structured object; it is
    /// serialized back to its JSON text so the pipeline sees one shape.
    pub fn from_json(body: &serde_json::Value) -> Self {
        let mut map = HashMap::new();
        if let Some(object) = body.as_object() {
            for (key, value) in object {
                let text = match value {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Null => continue,
                    other => other.to_string(),
                };
                map.insert(key.clone(), text);
            }
        }
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// First present alias wins; callers list the preferred alias first.
    pub fn first(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| self.get(key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }
}

fn decode_component(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Svg,
}

impl ImageKind {
    pub fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Svg => "image/svg+xml",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Svg,
    Pdf,
}

impl OutputFormat {
    /// Total over {png, svg, pdf}. Anything else is rejected before an
    /// error envelope exists for it.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "png" => Some(Self::Png),
            "svg" => Some(Self::Svg),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Svg => "image/svg+xml",
            Self::Pdf => "application/pdf",
        }
    }

    /// What the chart engine is asked to produce; a PDF wraps the raster.
    pub fn image_kind(self) -> ImageKind {
        match self {
            Self::Svg => ImageKind::Svg,
            Self::Png | Self::Pdf => ImageKind::Png,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Url,
    Base64,
}

#[derive(Debug, thiserror::Error)]
pub enum ChartDecodeError {
    #[error("invalid base64 in chart parameter: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("chart parameter is not valid UTF-8 after base64 decoding")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Canonical render request, built fresh per call. Missing chart and
/// malformed base64 are deferred to dispatch so the failure can be
/// reported in the caller's requested output format.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub chart: Option<String>,
    pub width: u32,
    pub height: u32,
    pub background_color: Option<String>,
    pub device_pixel_ratio: Option<f64>,
    pub version: String,
    pub encoding: Encoding,
    pub format: String,
}

impl RenderRequest {
    pub fn from_params(params: &Params) -> Self {
        Self {
            chart: params.first(&["c", "chart"]).map(str::to_string),
            width: dimension(params, &["w", "width"], DEFAULT_WIDTH),
            height: dimension(params, &["h", "height"], DEFAULT_HEIGHT),
            background_color: params
                .first(&["backgroundColor", "bkg"])
                .map(str::to_string),
            device_pixel_ratio: params
                .get("devicePixelRatio")
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|v| *v > 0.0),
            version: params
                .first(&["v", "version"])
                .unwrap_or(DEFAULT_VERSION)
                .to_string(),
            encoding: match params.get("encoding") {
                Some("base64") => Encoding::Base64,
                _ => Encoding::Url,
            },
            format: params
                .first(&["f", "format"])
                .unwrap_or("png")
                .to_ascii_lowercase(),
        }
    }

    /// The chart document as handed to the engine.
    pub fn chart_document(&self) -> Result<Option<String>, ChartDecodeError> {
        let Some(raw) = self.chart.as_deref() else {
            return Ok(None);
        };
        match self.encoding {
            Encoding::Url => Ok(Some(raw.to_string())),
            Encoding::Base64 => {
                let bytes = general_purpose::STANDARD.decode(raw)?;
                Ok(Some(String::from_utf8(bytes)?))
            }
        }
    }
}

/// Malformed size input is recoverable, not an error.
fn dimension(params: &Params, keys: &[&str], default: u32) -> u32 {
    params
        .first(keys)
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartJob {
    pub chart: String,
    pub width: u32,
    pub height: u32,
    pub background_color: Option<String>,
    pub device_pixel_ratio: Option<f64>,
    pub version: String,
    pub format: ImageKind,
}

/// What the legacy translator produces from the alternate parameter set.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedChart {
    pub chart: String,
    pub width: u32,
    pub height: u32,
    pub background_color: Option<String>,
}
