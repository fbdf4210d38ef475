//! Card rasterization.
//!
//! A batch owns exactly one [`RenderSurface`]. Each card is drawn into it,
//! captured as a [`CardBitmap`], and the surface is cleared again before the
//! next card. Callers only ever see the surface through a [`SurfaceLease`],
//! which guarantees the clear on every exit path, including errors.
//!
//! # Pipeline
//!
//! 1. [`AssetLoader::await_ready`] resolves the logo and QR code of a
//!    [`CardTemplate`](crate::template::CardTemplate), bounded by a timeout.
//! 2. [`Rasterizer::rasterize`] draws the template into the leased surface
//!    at the configured oversampling factor and composites the assets.

pub mod assets;
pub mod rasterizer;
pub mod svg;

pub use assets::{AssetLoader, AssetSource, LoadedAsset, ReadyTemplate, StandardAssetSource};
pub use rasterizer::Rasterizer;

use std::ops::{Deref, DerefMut};

use image::RgbaImage;
use resvg::tiny_skia::{Color, Pixmap};
use resvg::usvg::Options;
use tracing::debug;

use crate::consts::{MAX_OVERSAMPLING, MIN_OVERSAMPLING, mm_to_logical_px};
use crate::error::RasterError;
use crate::layout::SizeMm;

/// Clamps an oversampling factor into the supported range.
pub fn clamp_oversampling(factor: f32) -> f32 {
    if factor.is_finite() {
        factor.clamp(MIN_OVERSAMPLING, MAX_OVERSAMPLING)
    } else {
        MAX_OVERSAMPLING
    }
}

/// Physical pixel size of a card at `oversampling`.
pub fn physical_size(card: SizeMm, oversampling: f32) -> (u32, u32) {
    let scale = clamp_oversampling(oversampling);
    (
        (mm_to_logical_px(card.width) * scale).round().max(1.0) as u32,
        (mm_to_logical_px(card.height) * scale).round().max(1.0) as u32,
    )
}

// ============================================================================
// RenderSurface
// ============================================================================

/// The single off-screen drawing area of a batch.
///
/// Font metrics are resolved once when the surface is acquired; every card
/// drawn afterwards reuses the same font database.
pub struct RenderSurface {
    pixmap: Pixmap,
    options: Options<'static>,
    card: SizeMm,
    oversampling: f32,
}

impl RenderSurface {
    /// Allocates a surface for `card` at `oversampling`.
    pub fn acquire(card: SizeMm, oversampling: f32, load_system_fonts: bool) -> Result<Self, RasterError> {
        let oversampling = clamp_oversampling(oversampling);
        let (width, height) = physical_size(card, oversampling);
        let pixmap = Pixmap::new(width, height).ok_or(RasterError::Allocation { width, height })?;

        let mut options = Options::default();
        if load_system_fonts {
            options.fontdb_mut().load_system_fonts();
        }
        debug!(
            width,
            height,
            oversampling,
            fonts = options.fontdb.len(),
            "render surface acquired"
        );

        Ok(Self {
            pixmap,
            options,
            card,
            oversampling,
        })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Card size this surface was allocated for.
    pub fn card(&self) -> SizeMm {
        self.card
    }

    pub fn oversampling(&self) -> f32 {
        self.oversampling
    }

    /// True if this surface can draw `card` at `oversampling` without
    /// reallocating.
    pub fn fits(&self, card: SizeMm, oversampling: f32) -> bool {
        physical_size(card, oversampling) == (self.width(), self.height())
    }

    pub(crate) fn options(&self) -> &Options<'static> {
        &self.options
    }

    pub(crate) fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub(crate) fn pixmap_mut(&mut self) -> &mut Pixmap {
        &mut self.pixmap
    }

    /// Resets every pixel to transparent.
    pub fn clear(&mut self) {
        self.pixmap.fill(Color::TRANSPARENT);
    }

    /// True if no pixel has been drawn since the last clear.
    pub fn is_clear(&self) -> bool {
        self.pixmap.data().iter().all(|&b| b == 0)
    }

    /// Lends the surface out for one batch. It is cleared when the lease
    /// ends.
    pub fn lease(&mut self) -> SurfaceLease<'_> {
        SurfaceLease { surface: self }
    }
}

impl std::fmt::Debug for RenderSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderSurface")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("card", &self.card)
            .field("oversampling", &self.oversampling)
            .finish()
    }
}

/// Exclusive access to a [`RenderSurface`]. Clears it on drop.
pub struct SurfaceLease<'a> {
    surface: &'a mut RenderSurface,
}

impl Deref for SurfaceLease<'_> {
    type Target = RenderSurface;

    fn deref(&self) -> &Self::Target {
        self.surface
    }
}

impl DerefMut for SurfaceLease<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.surface
    }
}

impl Drop for SurfaceLease<'_> {
    fn drop(&mut self) {
        self.surface.clear();
        debug!("render surface released");
    }
}

// ============================================================================
// CardBitmap
// ============================================================================

/// One captured card, ready to be placed on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct CardBitmap {
    pub record_id: String,

    /// The image data in RGBA format.
    pub data: RgbaImage,

    /// Physical pixels per logical pixel.
    pub scale: f32,

    /// Physical card size the bitmap represents.
    pub size_mm: SizeMm,
}

impl CardBitmap {
    pub fn new(record_id: impl Into<String>, data: RgbaImage, scale: f32, size_mm: SizeMm) -> Self {
        Self {
            record_id: record_id.into(),
            data,
            scale,
            size_mm,
        }
    }

    /// Returns the pixel dimensions of the image.
    pub fn dimensions(&self) -> (u32, u32) {
        self.data.dimensions()
    }

    /// Returns the logical size of the card (dimensions / scale).
    pub fn logical_size(&self) -> (f32, f32) {
        (
            self.data.width() as f32 / self.scale,
            self.data.height() as f32 / self.scale,
        )
    }

    /// Effective print resolution when placed at its physical size.
    pub fn dpi(&self) -> f32 {
        self.data.width() as f32 / (self.size_mm.width / crate::consts::MM_PER_INCH)
    }
}

// ============================================================================
// Tests
// ============================================================================
