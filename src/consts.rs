//! Business-policy constants for card production.
//!
//! Physical sizes are in millimeters. Color thresholds are WCAG relative
//! luminance values in `[0, 1]`.

// ============================================================================
// Card and sheet geometry
// ============================================================================

/// CR80 card width (ISO/IEC 7810 ID-1).
pub const CARD_WIDTH_MM: f32 = 85.6;

/// CR80 card height.
pub const CARD_HEIGHT_MM: f32 = 54.0;

/// Outer margin kept clear on sheet formats. Most office printers cannot
/// print closer than ~6 mm to the paper edge.
pub const SHEET_MARGIN_MM: f32 = 10.0;

/// Gap between neighbouring cards on a sheet, leaves room for a cutter blade.
pub const SLOT_GAP_MM: f32 = 2.0;

/// Smallest card side a custom layout may ask for.
pub const MIN_CARD_SIDE_MM: f32 = 1.0;

/// Largest card side a custom layout may ask for. Bounds the render surface.
pub const MAX_CARD_SIDE_MM: f32 = 500.0;

/// Upper bound on cards per sheet.
pub const MAX_SLOTS_PER_PAGE: u32 = 1024;

/// Length of each crop-mark segment.
pub const CROP_MARK_LENGTH_MM: f32 = 3.0;

/// Clearance between a crop mark and the card edge it points at.
pub const CROP_MARK_OFFSET_MM: f32 = 0.5;

/// Crop-mark stroke weight in points.
pub const CROP_MARK_THICKNESS_PT: f32 = 0.25;

/// Crop-mark gray level (0 = black, 1 = white).
pub const CROP_MARK_GRAY: f32 = 0.75;

// ============================================================================
// Legibility thresholds
// ============================================================================

/// A palette color at or above this luminance is too light to carry
/// light or dark text reliably, so the scan skips it.
pub const BACKGROUND_MAX_LUMINANCE: f32 = 0.75;

/// A selected background above this luminance is replaced by the darkest
/// palette color.
pub const BACKGROUND_OVERRIDE_LUMINANCE: f32 = 0.90;

/// Neutral background used when no palette color qualifies ("anthracite").
pub const FALLBACK_BACKGROUND: (u8, u8, u8) = (0x33, 0x33, 0x33);

// ============================================================================
// Rendering
// ============================================================================

/// Logical resolution of a card template (CSS pixels).
pub const LOGICAL_DPI: f32 = 96.0;

/// Millimeters per inch.
pub const MM_PER_INCH: f32 = 25.4;

/// Allowed oversampling range when capturing a card.
pub const MIN_OVERSAMPLING: f32 = 2.0;
pub const MAX_OVERSAMPLING: f32 = 3.0;

/// Per-asset load ceiling.
pub const DEFAULT_ASSET_TIMEOUT_MS: u64 = 3000;

/// Delay before capture so font and image layout has settled.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 40;

/// Converts millimeters to logical pixels.
#[inline]
pub fn mm_to_logical_px(mm: f32) -> f32 {
    mm / MM_PER_INCH * LOGICAL_DPI
}
