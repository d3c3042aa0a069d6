use anyhow::{Context, Result};
use pdf_writer::{Content, Finish, Name, Pdf, Rect, Ref, Str};

// Raster pixels are mapped to points at the conventional screen density.
const POINTS_PER_PIXEL: f32 = 72.0 / 96.0;

const LETTER_WIDTH: f32 = 612.0;
const LETTER_HEIGHT: f32 = 792.0;
const TEXT_MARGIN: f32 = 36.0;
const TEXT_SIZE: f32 = 14.0;
const TEXT_LEADING: f32 = 18.0;
const TEXT_WRAP_COLUMNS: usize = 80;

/// Embeds a rendered PNG into a single-page document sized to the image.
pub fn wrap_png(png: &[u8]) -> Result<Vec<u8>> {
    let img = image::load_from_memory(png)
        .context("rendered buffer is not a decodable PNG")?
        .to_rgb8();
    let (px_width, px_height) = img.dimensions();
    let width = px_width as f32 * POINTS_PER_PIXEL;
    let height = px_height as f32 * POINTS_PER_PIXEL;

    let catalog_id = Ref::new(1);
    let tree_id = Ref::new(2);
    let page_id = Ref::new(3);
    let image_id = Ref::new(4);
    let content_id = Ref::new(5);

    let mut pdf = Pdf::new();
    pdf.catalog(catalog_id).pages(tree_id);
    pdf.pages(tree_id).kids([page_id]).count(1);

    let mut page = pdf.page(page_id);
    page.media_box(Rect::new(0.0, 0.0, width, height));
    page.parent(tree_id);
    page.contents(content_id);
    page.resources().x_objects().pair(Name(b"Im0"), image_id);
    page.finish();

    let mut xobject = pdf.image_xobject(image_id, img.as_raw());
    xobject.width(px_width as i32);
    xobject.height(px_height as i32);
    xobject.color_space().device_rgb();
    xobject.bits_per_component(8);
    xobject.finish();

    let mut content = Content::new();
    content.save_state();
    content.transform([width, 0.0, 0.0, height, 0.0, 0.0]);
    content.x_object(Name(b"Im0"));
    content.restore_state();
    pdf.stream(content_id, &content.finish());

    Ok(pdf.finish())
}

/// Single-page document carrying a message as text; the error envelope
/// for paginated output.
pub fn text_document(message: &str) -> Vec<u8> {
    let catalog_id = Ref::new(1);
    let tree_id = Ref::new(2);
    let page_id = Ref::new(3);
    let font_id = Ref::new(4);
    let content_id = Ref::new(5);

    let mut pdf = Pdf::new();
    pdf.catalog(catalog_id).pages(tree_id);
    pdf.pages(tree_id).kids([page_id]).count(1);

    let mut page = pdf.page(page_id);
    page.media_box(Rect::new(0.0, 0.0, LETTER_WIDTH, LETTER_HEIGHT));
    page.parent(tree_id);
    page.contents(content_id);
    page.resources().fonts().pair(Name(b"F1"), font_id);
    page.finish();

    pdf.type1_font(font_id).base_font(Name(b"Helvetica"));

    let mut content = Content::new();
    content.begin_text();
    content.set_font(Name(b"F1"), TEXT_SIZE);
    content.next_line(TEXT_MARGIN, LETTER_HEIGHT - TEXT_MARGIN - TEXT_SIZE);
    for line in wrap_columns(message, TEXT_WRAP_COLUMNS) {
        content.show(Str(line.as_bytes()));
        content.next_line(0.0, -TEXT_LEADING);
    }
    content.end_text();
    pdf.stream(content_id, &content.finish());

    pdf.finish()
}

fn wrap_columns(text: &str, columns: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for raw_line in text.lines() {
        let mut current = String::new();
        for word in raw_line.split_whitespace() {
            if !current.is_empty() && current.len() + word.len() + 1 > columns {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
