use std::io::Cursor;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use image::{Rgb, RgbImage};
use qrcode::{Color as Module, QrCode};

use crate::core::QrRenderer;
use crate::schemas::chart::ImageKind;
use crate::schemas::qr::{EcLevel, QrJob};

/// QR rendering on top of the symbol encoder: the encoder produces the
/// module matrix, this engine composes it into a PNG or an SVG document
/// with the requested margin and colors.
pub struct QrEncoder;

#[async_trait]
impl QrRenderer for QrEncoder {
    async fn render(&self, job: &QrJob) -> Result<Vec<u8>> {
        let code = QrCode::with_error_correction_level(job.text.as_bytes(), ec_level(job.ec_level))
            .context("QR encoding failed")?;
        match job.format {
            ImageKind::Png => encode_png(&code, job),
            ImageKind::Svg => Ok(encode_svg(&code, job)?.into_bytes()),
        }
    }
}

fn ec_level(level: EcLevel) -> qrcode::EcLevel {
    match level {
        EcLevel::L => qrcode::EcLevel::L,
        EcLevel::M => qrcode::EcLevel::M,
        EcLevel::Q => qrcode::EcLevel::Q,
        EcLevel::H => qrcode::EcLevel::H,
    }
}

fn encode_png(code: &QrCode, job: &QrJob) -> Result<Vec<u8>> {
    let dark = parse_hex_color(&job.dark)?;
    let light = parse_hex_color(&job.light)?;

    let modules = code.to_colors();
    let n = code.width() as u32;
    let total = n + 2 * job.margin;
    let scale = (job.size / total).max(1);
    let dim = total * scale;

    let mut img = RgbImage::from_pixel(dim, dim, light);
    for (i, module) in modules.iter().enumerate() {
        if *module == Module::Dark {
            let mx = (i as u32 % n + job.margin) * scale;
            let my = (i as u32 / n + job.margin) * scale;
            for dy in 0..scale {
                for dx in 0..scale {
                    img.put_pixel(mx + dx, my + dy, dark);
                }
            }
        }
    }

    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)?;
    Ok(out.into_inner())
}

fn encode_svg(code: &QrCode, job: &QrJob) -> Result<String> {
    let n = code.width() as u32;
    let total = n + 2 * job.margin;

    let mut path = String::new();
    for (i, module) in code.to_colors().iter().enumerate() {
        if *module == Module::Dark {
            let x = i as u32 % n + job.margin;
            let y = i as u32 / n + job.margin;
            path.push_str(&format!("M{x},{y}h1v1h-1z"));
        }
    }

    Ok(format!(
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {total} {total}" "#,
            r#"width="{size}" height="{size}" shape-rendering="crispEdges">"#,
            r#"<rect width="100%" height="100%" fill="{light}"/>"#,
            r#"<path fill="{dark}" d="{path}"/></svg>"#
        ),
        total = total,
        size = job.size,
        light = css_color(&job.light),
        dark = css_color(&job.dark),
        path = path,
    ))
}

fn parse_hex_color(value: &str) -> Result<Rgb<u8>> {
    let hex = value.trim_start_matches('#');
    let expanded = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect::<String>(),
        6 => hex.to_string(),
        _ => bail!("Invalid color `{value}`"),
    };
    let n = u32::from_str_radix(&expanded, 16)
        .with_context(|| format!("Invalid color `{value}`"))?;
    Ok(Rgb([(n >> 16) as u8, (n >> 8) as u8, n as u8]))
}

fn css_color(value: &str) -> String {
    if value.starts_with('#') {
        value.to_string()
    } else {
        format!("#{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(format: ImageKind) -> QrJob {
        QrJob {
            text: "hello".to_string(),
            format,
            size: 150,
            margin: 4,
            ec_level: EcLevel::M,
            dark: "000".to_string(),
            light: "fff".to_string(),
        }
    }

    #[tokio::test]
    async fn png_output_is_a_square_raster_with_margin() {
        let bytes = QrEncoder.render(&job(ImageKind::Png)).await.unwrap();
        let img = image::load_from_memory(&bytes).unwrap();
        // A version-1 symbol is 21 modules; with a 4-module margin each
        // side and integer scaling the raster stays square.
        assert_eq!(img.width(), img.height());
        assert!(img.width() <= 150);
        assert!(img.width() >= 21 + 8);
    }

    #[tokio::test]
    async fn svg_output_carries_the_requested_colors() {
        let mut svg_job = job(ImageKind::Svg);
        svg_job.dark = "1a2b3c".to_string();
        let bytes = QrEncoder.render(&svg_job).await.unwrap();
        let doc = String::from_utf8(bytes).unwrap();
        assert!(doc.starts_with("<svg"));
        assert!(doc.contains(r##"fill="#1a2b3c""##));
        assert!(doc.contains(r##"fill="#fff""##));
    }

    #[tokio::test]
    async fn invalid_colors_fail_the_render() {
        let mut bad = job(ImageKind::Png);
        bad.dark = "nope".to_string();
        assert!(QrEncoder.render(&bad).await.is_err());
    }

    #[test]
    fn short_hex_colors_expand() {
        assert_eq!(parse_hex_color("fff").unwrap(), Rgb([255, 255, 255]));
        assert_eq!(parse_hex_color("#000").unwrap(), Rgb([0, 0, 0]));
        assert_eq!(parse_hex_color("1a2b3c").unwrap(), Rgb([0x1a, 0x2b, 0x3c]));
    }
}
