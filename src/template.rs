//! Declarative card templates.
//!
//! A [`CardTemplate`] describes what goes where on one card: text, boxes
//! and references to raster assets. Composing a template never touches a
//! rendering surface; the rasterizer turns it into pixels later.

use std::path::PathBuf;

use crate::color::{HexColor, ResolvedColors};
use crate::layout::{PaperFormat, RectMm, SizeMm};
use crate::record::Record;

// ============================================================================
// AssetRef
// ============================================================================

/// A raster asset a template depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AssetRef {
    /// Image fetched over HTTP(S).
    Url(String),
    /// Image read from the local filesystem.
    File(PathBuf),
    /// Image carried inline as a `data:` URI.
    Embedded(String),
    /// QR code encoding the payload.
    Qr(String),
    /// The built-in organization mark.
    DefaultMark,
}

impl AssetRef {
    /// Interprets a logo location: `http://` and `https://` are URLs,
    /// `data:` URIs are embedded images, anything else a file path.
    pub fn from_location(location: &str) -> Self {
        let location = location.trim();
        if location.starts_with("http://") || location.starts_with("https://") {
            Self::Url(location.to_string())
        } else if location.starts_with("data:") {
            Self::Embedded(location.to_string())
        } else {
            Self::File(PathBuf::from(location))
        }
    }
}

impl std::fmt::Display for AssetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{url}"),
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Embedded(uri) => {
                let meta = uri.split_once(',').map_or(uri.as_str(), |(meta, _)| meta);
                write!(f, "{meta},<{} bytes>", uri.len())
            }
            Self::Qr(payload) => write!(f, "qr:{payload}"),
            Self::DefaultMark => f.write_str("default-mark"),
        }
    }
}

// ============================================================================
// Blocks
// ============================================================================

/// A single line of text anchored at its baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub x: f32,
    pub baseline: f32,
    pub size: f32,
    pub bold: bool,
    pub monospace: bool,
    pub anchor: TextAnchor,
    pub color: HexColor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAnchor {
    Start,
    End,
}

/// Organization name and logo across the top.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderBlock {
    pub title: TextLine,
    pub logo: AssetRef,
    pub logo_box: RectMm,
    pub rule_y: f32,
}

/// QR code on a light quiet-zone plate.
#[derive(Debug, Clone, PartialEq)]
pub struct QrBlock {
    pub asset: AssetRef,
    pub plate: RectMm,
    pub code_box: RectMm,
}

/// Name, identifier and optional group label.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityBlock {
    pub name: TextLine,
    pub identifier: TextLine,
    pub group: Option<TextLine>,
}

/// Category badge and issue date along the bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct FooterBlock {
    pub badge: RectMm,
    pub badge_fill: HexColor,
    pub category: TextLine,
    pub issued: TextLine,
}

/// Everything needed to draw one card, in card millimeters.
#[derive(Debug, Clone, PartialEq)]
pub struct CardTemplate {
    pub record_id: String,
    pub size: SizeMm,
    pub colors: ResolvedColors,
    pub corner_radius: f32,
    pub header: HeaderBlock,
    pub qr: QrBlock,
    pub identity: IdentityBlock,
    pub footer: FooterBlock,
}

impl CardTemplate {
    /// Raster assets in draw order.
    pub fn assets(&self) -> [&AssetRef; 2] {
        [&self.header.logo, &self.qr.asset]
    }

    /// Text lines in draw order.
    pub fn text_lines(&self) -> Vec<&TextLine> {
        let mut lines = vec![&self.header.title, &self.identity.name, &self.identity.identifier];
        lines.extend(self.identity.group.as_ref());
        lines.push(&self.footer.category);
        lines.push(&self.footer.issued);
        lines
    }
}

// ============================================================================
// TemplateComposer
// ============================================================================

const PAD: f32 = 4.0;
const HEADER_HEIGHT: f32 = 13.0;
const LOGO_SIZE: f32 = 9.0;
const QR_PLATE: f32 = 24.0;
const QR_QUIET: f32 = 1.2;
const BADGE_HEIGHT: f32 = 6.0;
/// Average advance of a proportional glyph relative to its font size.
const GLYPH_ADVANCE: f32 = 0.56;
const MONO_ADVANCE: f32 = 0.6;

/// Builds card templates for records.
#[derive(Debug, Clone)]
pub struct TemplateComposer {
    organization_name: String,
}

impl TemplateComposer {
    pub fn new(organization_name: impl Into<String>) -> Self {
        Self {
            organization_name: organization_name.into(),
        }
    }

    pub fn organization_name(&self) -> &str {
        &self.organization_name
    }

    /// Lays out the card for `record`.
    ///
    /// Sheet formats get rounded corners drawn as a cutting guide;
    /// individual cards print full bleed.
    pub fn compose(
        &self,
        record: &Record,
        colors: &ResolvedColors,
        format: PaperFormat,
        card: SizeMm,
    ) -> CardTemplate {
        let text = colors.foreground_text;
        let (w, h) = (card.width, card.height);

        // Header
        let logo_box = RectMm::new(PAD, (HEADER_HEIGHT - LOGO_SIZE) / 2.0, LOGO_SIZE, LOGO_SIZE);
        let title_x = logo_box.right() + 2.5;
        let (title, title_size) = fit_text(
            &self.organization_name.to_uppercase(),
            w - title_x - PAD,
            4.0,
            2.6,
            GLYPH_ADVANCE,
        );
        let header = HeaderBlock {
            title: TextLine {
                text: title,
                x: title_x,
                baseline: HEADER_HEIGHT / 2.0 + title_size * 0.35,
                size: title_size,
                bold: true,
                monospace: false,
                anchor: TextAnchor::Start,
                color: text,
            },
            logo: record
                .logo
                .as_deref()
                .map(AssetRef::from_location)
                .unwrap_or(AssetRef::DefaultMark),
            logo_box,
            rule_y: HEADER_HEIGHT,
        };

        // QR, right-aligned below the header
        let plate = RectMm::new(w - PAD - QR_PLATE, HEADER_HEIGHT + 2.5, QR_PLATE, QR_PLATE);
        let qr = QrBlock {
            asset: AssetRef::Qr(record.qr_payload().to_string()),
            plate,
            code_box: RectMm::new(
                plate.x + QR_QUIET,
                plate.y + QR_QUIET,
                plate.width - 2.0 * QR_QUIET,
                plate.height - 2.0 * QR_QUIET,
            ),
        };

        // Identity, left column
        let column_width = plate.x - PAD - 3.0;
        let (name, name_size) = fit_text(&record.display_name(), column_width, 4.6, 3.0, GLYPH_ADVANCE);
        let name_baseline = HEADER_HEIGHT + 8.5;
        let identifier_baseline = name_baseline + 6.0;
        let (identifier, id_size) =
            fit_text(&record.identifier, column_width, 3.2, 2.4, MONO_ADVANCE);
        let group = record
            .group_label
            .as_deref()
            .filter(|g| !g.trim().is_empty())
            .map(|g| {
                let (label, size) = fit_text(g, column_width, 3.0, 2.4, GLYPH_ADVANCE);
                TextLine {
                    text: label,
                    x: PAD,
                    baseline: identifier_baseline + 5.0,
                    size,
                    bold: false,
                    monospace: false,
                    anchor: TextAnchor::Start,
                    color: text,
                }
            });
        let identity = IdentityBlock {
            name: TextLine {
                text: name,
                x: PAD,
                baseline: name_baseline,
                size: name_size,
                bold: true,
                monospace: false,
                anchor: TextAnchor::Start,
                color: text,
            },
            identifier: TextLine {
                text: identifier,
                x: PAD,
                baseline: identifier_baseline,
                size: id_size,
                bold: false,
                monospace: true,
                anchor: TextAnchor::Start,
                color: text,
            },
            group,
        };

        // Footer: badge inverts the card colors
        let badge_y = h - PAD - BADGE_HEIGHT;
        let (category, category_size) = fit_text(
            &record.category.to_uppercase(),
            w * 0.5 - 4.0,
            2.8,
            2.0,
            GLYPH_ADVANCE,
        );
        let badge_width = (estimate_width(&category, category_size, GLYPH_ADVANCE) + 4.0).max(14.0);
        let badge = RectMm::new(PAD, badge_y, badge_width, BADGE_HEIGHT);
        let footer = FooterBlock {
            badge,
            badge_fill: text,
            category: TextLine {
                text: category,
                x: badge.x + 2.0,
                baseline: badge.y + BADGE_HEIGHT / 2.0 + category_size * 0.35,
                size: category_size,
                bold: true,
                monospace: false,
                anchor: TextAnchor::Start,
                color: colors.background,
            },
            issued: TextLine {
                text: format!("Issued {}", record.issue_date.format("%Y-%m-%d")),
                x: w - PAD,
                baseline: badge.y + BADGE_HEIGHT / 2.0 + 0.9,
                size: 2.5,
                bold: false,
                monospace: false,
                anchor: TextAnchor::End,
                color: text,
            },
        };

        CardTemplate {
            record_id: record.identifier.clone(),
            size: card,
            colors: *colors,
            corner_radius: if format.is_sheet() { 3.0 } else { 0.0 },
            header,
            qr,
            identity,
            footer,
        }
    }
}

fn estimate_width(text: &str, size: f32, advance: f32) -> f32 {
    text.chars().count() as f32 * size * advance
}

/// Shrinks `text` from `size` towards `min_size` until it fits `max_width`,
/// then truncates with an ellipsis.
fn fit_text(text: &str, max_width: f32, size: f32, min_size: f32, advance: f32) -> (String, f32) {
    let text = text.trim();
    if max_width <= 0.0 {
        return (String::new(), min_size);
    }

    let natural = estimate_width(text, size, advance);
    if natural <= max_width {
        return (text.to_string(), size);
    }

    let scaled = size * max_width / natural;
    if scaled >= min_size {
        return (text.to_string(), scaled);
    }

    let max_chars = (max_width / (min_size * advance)).floor() as usize;
    let kept: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    (format!("{}\u{2026}", kept.trim_end()), min_size)
}

// ============================================================================
// Tests
// ============================================================================
