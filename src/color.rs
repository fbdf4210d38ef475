//! Legibility-safe color resolution for card backgrounds and text.
//!
//! Brand palettes are user input and can be arbitrarily light. The
//! resolver picks a background from the palette that can carry text, then
//! picks black or white text by WCAG contrast.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use palette::Srgb;
use serde::{Deserialize, Serialize};

use crate::consts::{BACKGROUND_MAX_LUMINANCE, BACKGROUND_OVERRIDE_LUMINANCE, FALLBACK_BACKGROUND};
use crate::error::ColorError;

// ============================================================================
// HexColor
// ============================================================================

/// An opaque sRGB color written as `#RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl HexColor {
    pub const WHITE: Self = Self::new(0xFF, 0xFF, 0xFF);
    pub const BLACK: Self = Self::new(0x00, 0x00, 0x00);
    pub const ANTHRACITE: Self = Self::new(
        FALLBACK_BACKGROUND.0,
        FALLBACK_BACKGROUND.1,
        FALLBACK_BACKGROUND.2,
    );

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#RRGGBB`, `#RGB`, or either form without the `#`.
    pub fn parse(input: &str) -> Result<Self, ColorError> {
        let rgb = Srgb::<u8>::from_str(input.trim()).map_err(|_| ColorError {
            input: input.to_string(),
        })?;
        Ok(Self::new(rgb.red, rgb.green, rgb.blue))
    }

    pub fn to_srgb(self) -> Srgb<u8> {
        Srgb::new(self.r, self.g, self.b)
    }

    /// WCAG 2.0 relative luminance in `[0, 1]`.
    pub fn relative_luminance(self) -> f32 {
        let rgb: Srgb<f32> = self.to_srgb().into_format();
        0.2126 * linearize(rgb.red) + 0.7152 * linearize(rgb.green) + 0.0722 * linearize(rgb.blue)
    }

    /// Channel values in `[0, 1]`, as PDF and tiny-skia expect.
    pub fn to_unit_rgb(self) -> (f32, f32, f32) {
        let rgb: Srgb<f32> = self.to_srgb().into_format();
        (rgb.red, rgb.green, rgb.blue)
    }
}

fn linearize(c: f32) -> f32 {
    if c <= 0.03928 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// WCAG contrast ratio between two luminances, in `[1, 21]`.
pub fn contrast_ratio(a: f32, b: f32) -> f32 {
    let (lighter, darker) = if a >= b { (a, b) } else { (b, a) };
    (lighter + 0.05) / (darker + 0.05)
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl FromStr for HexColor {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for HexColor {
    type Error = ColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<HexColor> for String {
    fn from(color: HexColor) -> Self {
        color.to_string()
    }
}

// ============================================================================
// Palette
// ============================================================================

/// Brand colors supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Palette {
    pub primary: HexColor,
    pub secondary: HexColor,
    pub accent: HexColor,
}

impl Palette {
    pub fn new(primary: HexColor, secondary: HexColor, accent: HexColor) -> Self {
        Self {
            primary,
            secondary,
            accent,
        }
    }

    /// Builds a palette from three hex strings.
    pub fn from_hex(primary: &str, secondary: &str, accent: &str) -> Result<Self, ColorError> {
        Ok(Self::new(
            HexColor::parse(primary)?,
            HexColor::parse(secondary)?,
            HexColor::parse(accent)?,
        ))
    }

    /// Colors in scan order.
    pub fn colors(&self) -> [HexColor; 3] {
        [self.primary, self.secondary, self.accent]
    }
}

/// Background and text colors shared by every card in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedColors {
    pub background: HexColor,
    pub foreground_text: HexColor,
}

impl ResolvedColors {
    pub fn for_palette(palette: &Palette) -> Self {
        let background = resolve_background(palette);
        Self {
            background,
            foreground_text: ideal_text_color(background),
        }
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Picks a card background from the palette.
///
/// The first palette color darker than [`BACKGROUND_MAX_LUMINANCE`] wins;
/// anthracite is used when none qualifies. A winner brighter than
/// [`BACKGROUND_OVERRIDE_LUMINANCE`] is replaced by the darkest palette
/// color, earliest on ties.
pub fn resolve_background(palette: &Palette) -> HexColor {
    let colors = palette.colors();

    let selected = colors
        .iter()
        .copied()
        .find(|c| c.relative_luminance() < BACKGROUND_MAX_LUMINANCE)
        .unwrap_or(HexColor::ANTHRACITE);

    if selected.relative_luminance() > BACKGROUND_OVERRIDE_LUMINANCE {
        return colors
            .iter()
            .copied()
            .reduce(|darkest, c| {
                if c.relative_luminance() < darkest.relative_luminance() {
                    c
                } else {
                    darkest
                }
            })
            .unwrap_or(selected);
    }

    selected
}

/// White when it contrasts strictly better with `background`, else black.
pub fn ideal_text_color(background: HexColor) -> HexColor {
    let bg = background.relative_luminance();
    let white = contrast_ratio(HexColor::WHITE.relative_luminance(), bg);
    let black = contrast_ratio(HexColor::BLACK.relative_luminance(), bg);
    if white > black {
        HexColor::WHITE
    } else {
        HexColor::BLACK
    }
}

// ============================================================================
// ColorCache
// ============================================================================

/// Memoizes [`ResolvedColors`] per palette.
///
/// Resolution is pure, so entries never go stale.
#[derive(Debug, Default)]
pub struct ColorCache {
    entries: HashMap<Palette, ResolvedColors>,
}

impl ColorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&mut self, palette: &Palette) -> ResolvedColors {
        *self
            .entries
            .entry(*palette)
            .or_insert_with(|| ResolvedColors::for_palette(palette))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(s: &str) -> HexColor {
        HexColor::parse(s).unwrap()
    }

    #[test]
    fn parse_and_display() {
        assert_eq!(hex("#0047A0"), HexColor::new(0x00, 0x47, 0xA0));
        assert_eq!(hex("0047a0"), HexColor::new(0x00, 0x47, 0xA0));
        assert_eq!(hex("#fff"), HexColor::WHITE);
        assert_eq!(hex("#cd2e3a").to_string(), "#CD2E3A");
        assert!(HexColor::parse("#12345").is_err());
        assert!(HexColor::parse("blue").is_err());
    }

    #[test]
    fn luminance_extremes() {
        assert!((HexColor::WHITE.relative_luminance() - 1.0).abs() < 1e-4);
        assert!(HexColor::BLACK.relative_luminance().abs() < 1e-6);
        let anthracite = HexColor::ANTHRACITE.relative_luminance();
        assert!(anthracite > 0.02 && anthracite < 0.04, "got {anthracite}");
    }

    #[test]
    fn contrast_ratio_is_symmetric() {
        assert!((contrast_ratio(1.0, 0.0) - 21.0).abs() < 1e-4);
        assert_eq!(contrast_ratio(0.2, 0.6), contrast_ratio(0.6, 0.2));
    }

    #[test]
    fn all_white_palette_falls_back_to_anthracite() {
        let palette = Palette::from_hex("#FFFFFF", "#FFFFFF", "#FFFFFF").unwrap();
        let bg = resolve_background(&palette);
        assert_eq!(bg, HexColor::ANTHRACITE);
        assert_eq!(ideal_text_color(bg), HexColor::WHITE);
    }

    #[test]
    fn first_dark_enough_color_is_picked() {
        let palette = Palette::from_hex("#0047A0", "#CD2E3A", "#FFFFFF").unwrap();
        assert_eq!(resolve_background(&palette), hex("#0047A0"));

        let palette = Palette::from_hex("#FFFFFF", "#CD2E3A", "#0047A0").unwrap();
        assert_eq!(resolve_background(&palette), hex("#CD2E3A"));
    }

    #[test]
    fn light_palette_text_is_black() {
        // #FFEB3B (yellow) has luminance ~0.82, skipped; light gray picked.
        let palette = Palette::from_hex("#FFEB3B", "#B0BEC5", "#FFFFFF").unwrap();
        let bg = resolve_background(&palette);
        assert_eq!(bg, hex("#B0BEC5"));
        assert_eq!(ideal_text_color(bg), HexColor::BLACK);
    }

    #[test]
    fn ideal_text_color_extremes() {
        assert_eq!(ideal_text_color(HexColor::BLACK), HexColor::WHITE);
        assert_eq!(ideal_text_color(HexColor::WHITE), HexColor::BLACK);
        assert_eq!(ideal_text_color(hex("#0047A0")), HexColor::WHITE);
    }

    #[test]
    fn resolution_is_deterministic() {
        let palette = Palette::from_hex("#2E7D32", "#FFC107", "#FAFAFA").unwrap();
        let first = ResolvedColors::for_palette(&palette);
        for _ in 0..5 {
            assert_eq!(ResolvedColors::for_palette(&palette), first);
        }
        let bg = first.background;
        assert_eq!(ideal_text_color(bg), ideal_text_color(bg));
    }

    #[test]
    fn cache_reuses_entries() {
        let mut cache = ColorCache::new();
        let a = Palette::from_hex("#0047A0", "#CD2E3A", "#FFFFFF").unwrap();
        let b = Palette::from_hex("#FFFFFF", "#FFFFFF", "#FFFFFF").unwrap();

        let first = cache.resolve(&a);
        assert_eq!(cache.resolve(&a), first);
        assert_eq!(cache.len(), 1);

        cache.resolve(&b);
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn palette_deserializes_from_hex_strings() {
        let json = r##"{"primary":"#0047A0","secondary":"cd2e3a","accent":"#fff"}"##;
        let palette: Palette = serde_json::from_str(json).unwrap();
        assert_eq!(palette.accent, HexColor::WHITE);
        let out = serde_json::to_string(&palette).unwrap();
        assert!(out.contains("\"#CD2E3A\""));

        let bad = r##"{"primary":"nope","secondary":"#000","accent":"#fff"}"##;
        assert!(serde_json::from_str::<Palette>(bad).is_err());
    }
}
