//! SVG markup for card templates and raster helpers built on resvg.
//!
//! Cards are described as SVG in card millimeters (the `viewBox`), which
//! keeps the template geometry and the drawing in the same units. Raster
//! assets are not embedded; the rasterizer composites them afterwards.

use std::fmt::Write;

use image::{Rgba, RgbaImage, RgbImage};
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg::{Options, Tree};

use crate::color::HexColor;
use crate::consts::mm_to_logical_px;
use crate::error::RasterError;
use crate::template::{CardTemplate, TextAnchor, TextLine};

const SANS: &str = "DejaVu Sans, Liberation Sans, Arial, Helvetica, sans-serif";
const MONO: &str = "DejaVu Sans Mono, Liberation Mono, Courier New, monospace";

/// Built-in organization mark used when a record has no logo.
pub const DEFAULT_MARK_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="64" height="64" viewBox="0 0 64 64"><circle cx="32" cy="32" r="30" fill="#FFFFFF"/><circle cx="32" cy="32" r="26" fill="#1F3A5F"/><path d="M32 14 L46 24 L46 40 L32 50 L18 40 L18 24 Z" fill="#FFFFFF"/><path d="M32 22 L39 27 L39 37 L32 42 L25 37 L25 27 Z" fill="#1F3A5F"/></svg>"##;

// ============================================================================
// Card markup
// ============================================================================

/// Builds the SVG document for a card template.
///
/// Fails with [`RasterError::InvalidText`] if any text contains a
/// character that XML cannot carry.
pub fn card_svg(template: &CardTemplate) -> Result<String, RasterError> {
    let size = template.size;
    let bg = template.colors.background;
    let fg = template.colors.foreground_text;

    let mut svg = String::with_capacity(2048);
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w_px}" height="{h_px}" viewBox="0 0 {w} {h}">"#,
        w_px = mm_to_logical_px(size.width),
        h_px = mm_to_logical_px(size.height),
        w = size.width,
        h = size.height,
    );

    // Background
    let _ = write!(
        svg,
        r#"<rect width="{}" height="{}" rx="{r}" ry="{r}" fill="{bg}"/>"#,
        size.width,
        size.height,
        r = template.corner_radius,
    );

    // Header rule
    let rule_y = template.header.rule_y;
    let _ = write!(
        svg,
        r#"<rect x="{x}" y="{y}" width="{w}" height="0.35" fill="{fg}" fill-opacity="0.35"/>"#,
        x = template.header.logo_box.x,
        y = rule_y - 0.175,
        w = size.width - 2.0 * template.header.logo_box.x,
    );

    // QR plate
    let plate = template.qr.plate;
    let _ = write!(
        svg,
        r#"<rect x="{}" y="{}" width="{}" height="{}" rx="1" ry="1" fill="{}"/>"#,
        plate.x,
        plate.y,
        plate.width,
        plate.height,
        HexColor::WHITE,
    );

    // Category badge
    let badge = template.footer.badge;
    let _ = write!(
        svg,
        r#"<rect x="{}" y="{}" width="{}" height="{}" rx="{r}" ry="{r}" fill="{}"/>"#,
        badge.x,
        badge.y,
        badge.width,
        badge.height,
        template.footer.badge_fill,
        r = badge.height / 2.0,
    );

    for line in template.text_lines() {
        write_text(&mut svg, line)?;
    }

    svg.push_str("</svg>");
    Ok(svg)
}

fn write_text(svg: &mut String, line: &TextLine) -> Result<(), RasterError> {
    if line.text.is_empty() {
        return Ok(());
    }
    let _ = write!(
        svg,
        r#"<text x="{}" y="{}" font-size="{}" font-family="{}" font-weight="{}" text-anchor="{}" fill="{}">"#,
        line.x,
        line.baseline,
        line.size,
        if line.monospace { MONO } else { SANS },
        if line.bold { "bold" } else { "normal" },
        match line.anchor {
            TextAnchor::Start => "start",
            TextAnchor::End => "end",
        },
        line.color,
    );
    escape_into(svg, &line.text)?;
    svg.push_str("</text>");
    Ok(())
}

/// Appends `text` with XML special characters escaped.
fn escape_into(out: &mut String, text: &str) -> Result<(), RasterError> {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(' '),
            c if (c as u32) < 0x20 || c == '\u{FFFE}' || c == '\u{FFFF}' => {
                return Err(RasterError::InvalidText(c));
            }
            c => out.push(c),
        }
    }
    Ok(())
}

// ============================================================================
// SVG Rendering
// ============================================================================

/// Renders an SVG string to an RGBA image at the specified size.
///
/// The SVG is scaled to fit within `size x size` pixels while preserving
/// aspect ratio (the larger dimension will be `size`).
///
/// Returns `None` if the SVG cannot be parsed or rendered.
pub fn render_svg(svg_data: &str, size: u32) -> Option<RgbaImage> {
    let opts = Options::default();
    let tree = Tree::from_str(svg_data, &opts).ok()?;

    let svg_size = tree.size();
    let scale = (size as f32) / svg_size.width().max(svg_size.height());
    let width = (svg_size.width() * scale).ceil() as u32;
    let height = (svg_size.height() * scale).ceil() as u32;

    let mut pixmap = Pixmap::new(width, height)?;
    let transform = Transform::from_scale(scale, scale);
    resvg::render(&tree, transform, &mut pixmap.as_mut());

    Some(pixmap_to_rgba_image(&pixmap))
}

/// Converts a tiny_skia Pixmap to an image::RgbaImage.
pub fn pixmap_to_rgba_image(pixmap: &Pixmap) -> RgbaImage {
    let mut img = RgbaImage::new(pixmap.width(), pixmap.height());

    // tiny_skia stores premultiplied alpha
    for (dst, src) in img.pixels_mut().zip(pixmap.pixels()) {
        let c = src.demultiply();
        *dst = Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
    }

    img
}

// ============================================================================
// Compositing
// ============================================================================

/// Flattens an RGBA image onto a white background.
///
/// PDF image XObjects carry no alpha here, so transparent corners and
/// logo edges must be resolved before embedding.
pub fn flatten_onto_white(src: &RgbaImage) -> RgbImage {
    let mut out = RgbImage::new(src.width(), src.height());
    for (dst, px) in out.pixels_mut().zip(src.pixels()) {
        let a = px[3] as f32 / 255.0;
        let over = |c: u8| (c as f32 * a + 255.0 * (1.0 - a)).round() as u8;
        *dst = image::Rgb([over(px[0]), over(px[1]), over(px[2])]);
    }
    out
}

/// Largest `(width, height)` with the aspect ratio of `src` that fits in
/// `bounds`, and the offset that centers it.
pub fn fit_centered(src: (u32, u32), bounds: (u32, u32)) -> ((u32, u32), (u32, u32)) {
    let (sw, sh) = (src.0.max(1) as f32, src.1.max(1) as f32);
    let (bw, bh) = (bounds.0 as f32, bounds.1 as f32);
    let scale = (bw / sw).min(bh / sh);
    let w = ((sw * scale).round() as u32).clamp(1, bounds.0.max(1));
    let h = ((sh * scale).round() as u32).clamp(1, bounds.1.max(1));
    ((w, h), ((bounds.0.saturating_sub(w)) / 2, (bounds.1.saturating_sub(h)) / 2))
}

// ============================================================================
// Tests
// ============================================================================
