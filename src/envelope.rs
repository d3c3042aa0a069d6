use once_cell::sync::Lazy;
use poem::Response;
use poem::http::{HeaderValue, StatusCode, header};

use crate::core::pdf;
use crate::schemas::chart::{ImageKind, OutputFormat};

pub const ERROR_HEADER: &str = "X-quickchart-error";

const ERROR_FONT_SIZE: u32 = 13;
const ERROR_PADDING: u32 = 10;
const ERROR_LINE_HEIGHT: u32 = 18;
const ERROR_WRAP_COLUMNS: usize = 58;

/// Failure presentation keyed by the accepted output format. Selection
/// is total: a strategy exists for every supported format, and an
/// unsupported format is rejected before any strategy is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorEnvelope {
    Png,
    Svg,
    Pdf,
}

impl ErrorEnvelope {
    pub fn for_format(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Png => Self::Png,
            OutputFormat::Svg => Self::Svg,
            OutputFormat::Pdf => Self::Pdf,
        }
    }

    pub fn for_image(kind: ImageKind) -> Self {
        match kind {
            ImageKind::Png => Self::Png,
            ImageKind::Svg => Self::Svg,
        }
    }

    /// The failure response is shaped like the artifact the caller asked
    /// for, with the sanitized message in a diagnostic header.
    pub fn respond(self, message: &str, status: StatusCode) -> Response {
        let (content_type, body) = match self {
            Self::Png => ("image/png", error_png(message)),
            Self::Svg => ("image/svg+xml", error_svg(message).into_bytes()),
            Self::Pdf => ("application/pdf", pdf::text_document(message)),
        };
        Response::builder()
            .status(status)
            .content_type(content_type)
            .header(ERROR_HEADER, sanitize_error_header(message))
            .body(body)
    }
}

/// Success envelope: rendered bytes with the matching content-type and
/// the public cache policy (disabled in development).
pub fn artifact(bytes: Vec<u8>, content_type: &str, is_dev: bool) -> Response {
    Response::builder()
        .content_type(content_type)
        .header(
            header::CACHE_CONTROL,
            if is_dev { "no-cache" } else { "public, max-age=604800" },
        )
        .body(bytes)
}

/// Byte-wise transliteration of the message so it fits in a header:
/// every UTF-8 byte is carried as a single byte, line breaks and other
/// header-invalid bytes are stripped.
pub fn sanitize_error_header(message: &str) -> HeaderValue {
    let bytes: Vec<u8> = message
        .bytes()
        .filter(|b| *b >= 0x20 && *b != 0x7f)
        .collect();
    HeaderValue::from_bytes(&bytes).unwrap_or_else(|_| HeaderValue::from_static(""))
}

fn escape_xml(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn error_svg(message: &str) -> String {
    format!(
        r#"
<svg viewBox="0 0 240 80" xmlns="http://www.w3.org/2000/svg">
  <style>p {{ font-size: 8px; }}</style>
  <foreignObject width="240" height="80"
   requiredFeatures="http://www.w3.org/TR/SVG11/feature#Extensibility">
    <p xmlns="http://www.w3.org/1999/xhtml">{}</p>
  </foreignObject>
</svg>"#,
        escape_xml(message)
    )
}

static FONTS: Lazy<usvg::fontdb::Database> = Lazy::new(|| {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    db
});

/// The raster failure image: the message over a white background with
/// fixed padding, composed as an SVG text document and rasterized.
fn error_png(message: &str) -> Vec<u8> {
    let text = format!("Chart Error: {message}");
    let lines = wrap_lines(&text, ERROR_WRAP_COLUMNS);
    let columns = lines.iter().map(String::len).max().unwrap_or(0) as u32;
    let width = (columns * (ERROR_FONT_SIZE * 6 / 10 + 1) + 2 * ERROR_PADDING).max(120);
    let height = lines.len() as u32 * ERROR_LINE_HEIGHT + 2 * ERROR_PADDING;

    let mut body = String::new();
    for (i, line) in lines.iter().enumerate() {
        body.push_str(&format!(
            r##"<text x="{x}" y="{y}" font-family="sans-serif" font-size="{size}" fill="#000">{line}</text>"##,
            x = ERROR_PADDING,
            y = ERROR_PADDING + (i as u32 + 1) * ERROR_LINE_HEIGHT - 4,
            size = ERROR_FONT_SIZE,
            line = escape_xml(line),
        ));
    }
    let svg = format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}"><rect width="100%" height="100%" fill="#fff"/>{body}</svg>"##
    );

    rasterize(&svg, width, height)
}

fn wrap_lines(text: &str, columns: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + word.len() + 1 > columns {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    lines.push(current);
    lines
}

fn rasterize(svg: &str, width: u32, height: u32) -> Vec<u8> {
    let Some(mut pixmap) = resvg::tiny_skia::Pixmap::new(width, height) else {
        return Vec::new();
    };
    pixmap.fill(resvg::tiny_skia::Color::WHITE);

    let mut options = usvg::Options::default();
    *options.fontdb_mut() = FONTS.clone();
    if let Ok(tree) = usvg::Tree::from_str(svg, &options) {
        resvg::render(
            &tree,
            resvg::tiny_skia::Transform::identity(),
            &mut pixmap.as_mut(),
        );
    }

    pixmap.encode_png().unwrap_or_default()
}
