//! Draws ready templates into the render surface and captures them.

use std::time::Duration;

use image::RgbaImage;
use image::imageops::{self, FilterType};
use resvg::tiny_skia::Transform;
use resvg::usvg::Tree;
use tracing::trace;

use super::svg::{card_svg, fit_centered, pixmap_to_rgba_image};
use super::{CardBitmap, ReadyTemplate, RenderSurface, clamp_oversampling, physical_size};
use crate::consts::{DEFAULT_SETTLE_DELAY_MS, MAX_OVERSAMPLING};
use crate::error::RasterError;
use crate::layout::RectMm;

/// Captures cards at a fixed oversampling factor.
#[derive(Debug, Clone, Copy)]
pub struct Rasterizer {
    oversampling: f32,
    settle_delay: Duration,
}

impl Default for Rasterizer {
    fn default() -> Self {
        Self::new(MAX_OVERSAMPLING, Duration::from_millis(DEFAULT_SETTLE_DELAY_MS))
    }
}

impl Rasterizer {
    /// `oversampling` is clamped to the supported range.
    pub fn new(oversampling: f32, settle_delay: Duration) -> Self {
        Self {
            oversampling: clamp_oversampling(oversampling),
            settle_delay,
        }
    }

    pub fn oversampling(&self) -> f32 {
        self.oversampling
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Rasterizes one card.
    ///
    /// Waits for the settle delay, draws the template into `surface`,
    /// captures it and composites the loaded assets. The surface is left
    /// clear whether or not this succeeds.
    #[tracing::instrument(skip_all, fields(record = %ready.template.record_id))]
    pub async fn rasterize(
        &self,
        surface: &mut RenderSurface,
        ready: &ReadyTemplate,
    ) -> Result<CardBitmap, RasterError> {
        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        let template = &ready.template;
        let (width, height) = physical_size(template.size, self.oversampling);
        if (surface.width(), surface.height()) != (width, height) {
            return Err(RasterError::SurfaceMismatch {
                surface_width: surface.width(),
                surface_height: surface.height(),
                width,
                height,
            });
        }

        let svg = card_svg(template)?;
        let tree = Tree::from_str(&svg, surface.options())?;
        let tree_size = tree.size();
        let transform = Transform::from_scale(
            width as f32 / tree_size.width(),
            height as f32 / tree_size.height(),
        );

        surface.clear();
        resvg::render(&tree, transform, &mut surface.pixmap_mut().as_mut());
        let mut data = pixmap_to_rgba_image(surface.pixmap());
        surface.clear();

        let px_per_mm = width as f32 / template.size.width;
        if let Some(logo) = ready.logo.image() {
            place_image(&mut data, &logo.to_rgba8(), template.header.logo_box, px_per_mm, FilterType::Lanczos3);
        }
        if let Some(qr) = ready.qr.image() {
            place_image(&mut data, &qr.to_rgba8(), template.qr.code_box, px_per_mm, FilterType::Nearest);
        }

        trace!(width, height, "card captured");
        Ok(CardBitmap::new(
            template.record_id.clone(),
            data,
            self.oversampling,
            template.size,
        ))
    }
}

/// Scales `image` to fit `target` (card mm), keeping its aspect ratio, and
/// blends it centered over `dest`. Pixels outside `dest` are dropped.
fn place_image(dest: &mut RgbaImage, image: &RgbaImage, target: RectMm, px_per_mm: f32, filter: FilterType) {
    let bounds = (
        (target.width * px_per_mm).round() as u32,
        (target.height * px_per_mm).round() as u32,
    );
    if bounds.0 == 0 || bounds.1 == 0 || image.width() == 0 || image.height() == 0 {
        return;
    }

    let ((w, h), (dx, dy)) = fit_centered(image.dimensions(), bounds);
    let scaled = if (w, h) == image.dimensions() {
        image.clone()
    } else {
        imageops::resize(image, w, h, filter)
    };

    let x = (target.x * px_per_mm).round() as i64 + i64::from(dx);
    let y = (target.y * px_per_mm).round() as i64 + i64::from(dy);
    imageops::overlay(dest, &scaled, x, y);
}

// ============================================================================
// Tests
// ============================================================================
