//! Paper formats and the card grid laid out on them.
//!
//! All coordinates are millimeters with the origin at the top-left corner
//! of the page, y growing downwards.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::consts::{
    CARD_HEIGHT_MM, CARD_WIDTH_MM, MAX_CARD_SIDE_MM, MAX_SLOTS_PER_PAGE, MIN_CARD_SIDE_MM,
    SHEET_MARGIN_MM, SLOT_GAP_MM,
};
use crate::error::LayoutError;

// ============================================================================
// Physical primitives
// ============================================================================

/// A 2D size in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SizeMm {
    pub width: f32,
    pub height: f32,
}

impl SizeMm {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Returns true if the size is wider than tall.
    pub fn is_landscape(&self) -> bool {
        self.width > self.height
    }
}

/// A rectangle in page millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RectMm {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl RectMm {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_origin(origin: (f32, f32), size: SizeMm) -> Self {
        Self::new(origin.0, origin.1, size.width, size.height)
    }

    /// Returns the right edge coordinate (x + width).
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Returns the bottom edge coordinate (y + height).
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// True if the interiors overlap. Shared edges do not count.
    pub fn overlaps(&self, other: &RectMm) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

// ============================================================================
// PaperFormat
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

/// Output paper format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum PaperFormat {
    /// One CR80 card per card-sized page.
    #[default]
    Individual,
    /// US Letter sheet.
    Letter,
    /// US Legal sheet.
    Legal,
    /// ISO A4 sheet.
    A4,
}

impl PaperFormat {
    pub const ALL: [PaperFormat; 4] = [Self::Individual, Self::Letter, Self::Legal, Self::A4];

    /// Physical page size as printed.
    pub fn page_size(self) -> SizeMm {
        match self {
            Self::Individual => SizeMm::new(CARD_WIDTH_MM, CARD_HEIGHT_MM),
            Self::Letter => SizeMm::new(215.9, 279.4),
            Self::Legal => SizeMm::new(215.9, 355.6),
            Self::A4 => SizeMm::new(210.0, 297.0),
        }
    }

    pub fn orientation(self) -> Orientation {
        match self {
            Self::Individual => Orientation::Landscape,
            Self::Letter | Self::Legal | Self::A4 => Orientation::Portrait,
        }
    }

    /// True for formats that hold a grid of cards.
    pub fn is_sheet(self) -> bool {
        !matches!(self, Self::Individual)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Individual => "individual",
            Self::Letter => "letter",
            Self::Legal => "legal",
            Self::A4 => "a4",
        }
    }
}

impl fmt::Display for PaperFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PaperFormat {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.name() == wanted)
            .ok_or_else(|| LayoutError::UnknownFormat(s.to_string()))
    }
}

// ============================================================================
// LayoutPolicy
// ============================================================================

/// Card size and spacing used to plan sheets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutPolicy {
    pub card: SizeMm,
    pub margin_mm: f32,
    pub gap_mm: f32,
}

impl LayoutPolicy {
    /// Rejects card sizes outside `[1, 500]` mm and negative or non-finite
    /// spacing. Policies usually come from user-supplied JSON.
    pub fn validate(&self) -> Result<(), LayoutError> {
        let side_ok = |v: f32| (MIN_CARD_SIDE_MM..=MAX_CARD_SIDE_MM).contains(&v);
        if !side_ok(self.card.width) || !side_ok(self.card.height) {
            return Err(LayoutError::InvalidPolicy(format!(
                "card {}x{}mm must be between {MIN_CARD_SIDE_MM} and {MAX_CARD_SIDE_MM}mm per side",
                self.card.width, self.card.height
            )));
        }
        for (name, value) in [("margin", self.margin_mm), ("gap", self.gap_mm)] {
            if !value.is_finite() || value < 0.0 {
                return Err(LayoutError::InvalidPolicy(format!(
                    "{name} {value}mm must be a non-negative number"
                )));
            }
        }
        Ok(())
    }
}

impl Default for LayoutPolicy {
    fn default() -> Self {
        Self {
            card: SizeMm::new(CARD_WIDTH_MM, CARD_HEIGHT_MM),
            margin_mm: SHEET_MARGIN_MM,
            gap_mm: SLOT_GAP_MM,
        }
    }
}

// ============================================================================
// Geometry
// ============================================================================

/// Grid geometry for one paper format. Read-only once planned.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub format: PaperFormat,
    pub page: SizeMm,
    pub card: SizeMm,
    pub columns: u32,
    pub rows: u32,
    pub slots_per_page: u32,
    /// Top-left corner of each slot, row-major.
    pub slot_positions: Vec<(f32, f32)>,
}

impl Geometry {
    /// Rectangle occupied by a page-local slot.
    pub fn slot_rect(&self, local_slot: u32) -> Option<RectMm> {
        self.slot_positions
            .get(local_slot as usize)
            .map(|&origin| RectMm::from_origin(origin, self.card))
    }

    /// `(page_index, local_slot)` for a batch-wide slot index.
    pub fn locate(&self, slot_index: u32) -> (u32, u32) {
        (
            slot_index / self.slots_per_page,
            slot_index % self.slots_per_page,
        )
    }

    /// Pages needed for `cards` cards.
    pub fn pages_for(&self, cards: u32) -> u32 {
        cards.div_ceil(self.slots_per_page)
    }
}

/// Plans with the default CR80 policy.
pub fn plan_layout(format: PaperFormat) -> Result<Geometry, LayoutError> {
    LayoutPlanner::default().plan(format)
}

/// Computes card grids for paper formats.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayoutPlanner {
    policy: LayoutPolicy,
}

impl LayoutPlanner {
    pub fn new(policy: LayoutPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &LayoutPolicy {
        &self.policy
    }

    /// Plans the grid for `format`.
    ///
    /// `Individual` is always a single slot at the origin on a card-sized
    /// page. Sheets fail with [`LayoutError::Degenerate`] when no full card
    /// fits in either direction, and with [`LayoutError::TooManySlots`] when
    /// the grid exceeds the per-page limit.
    pub fn plan(&self, format: PaperFormat) -> Result<Geometry, LayoutError> {
        self.policy.validate()?;
        let card = self.policy.card;

        if !format.is_sheet() {
            return Ok(Geometry {
                format,
                page: card,
                card,
                columns: 1,
                rows: 1,
                slots_per_page: 1,
                slot_positions: vec![(0.0, 0.0)],
            });
        }

        let page = format.page_size();
        let m = self.policy.margin_mm;
        let g = self.policy.gap_mm;

        let columns = grid_count(page.width - 2.0 * m, card.width);
        let rows = grid_count(page.height - 2.0 * m, card.height + g);

        if columns == 0 || rows == 0 {
            return Err(LayoutError::Degenerate {
                format,
                card_width: card.width,
                card_height: card.height,
                columns,
                rows,
            });
        }

        let slots_per_page = columns
            .checked_mul(rows)
            .filter(|&slots| slots <= MAX_SLOTS_PER_PAGE)
            .ok_or(LayoutError::TooManySlots {
                format,
                slots: u64::from(columns) * u64::from(rows),
                limit: MAX_SLOTS_PER_PAGE,
            })?;
        let slot_positions = (0..slots_per_page)
            .map(|i| {
                let col = i % columns;
                let row = i / columns;
                (
                    m + col as f32 * (card.width + g),
                    m + row as f32 * (card.height + g),
                )
            })
            .collect();

        Ok(Geometry {
            format,
            page,
            card,
            columns,
            rows,
            slots_per_page,
            slot_positions,
        })
    }
}

fn grid_count(available: f32, step: f32) -> u32 {
    if available <= 0.0 || step <= 0.0 {
        return 0;
    }
    (available / step).floor() as u32
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn individual_is_single_card_page() {
        let geo = plan_layout(PaperFormat::Individual).unwrap();
        assert_eq!(geo.columns, 1);
        assert_eq!(geo.rows, 1);
        assert_eq!(geo.slots_per_page, 1);
        assert_eq!(geo.slot_positions, vec![(0.0, 0.0)]);
        assert_eq!(geo.page, SizeMm::new(85.6, 54.0));
        assert_eq!(PaperFormat::Individual.orientation(), Orientation::Landscape);
        assert!(geo.page.is_landscape());
    }

    #[test]
    fn letter_grid() {
        let geo = plan_layout(PaperFormat::Letter).unwrap();
        assert_eq!((geo.columns, geo.rows, geo.slots_per_page), (2, 4, 8));
        assert_eq!(geo.slot_positions[0], (10.0, 10.0));
        let (x, y) = geo.slot_positions[3];
        assert!((x - 97.6).abs() < 1e-3);
        assert!((y - 66.0).abs() < 1e-3);
    }

    #[test]
    fn legal_and_a4_grids() {
        let legal = plan_layout(PaperFormat::Legal).unwrap();
        assert_eq!((legal.columns, legal.rows), (2, 5));
        let a4 = plan_layout(PaperFormat::A4).unwrap();
        assert_eq!((a4.columns, a4.rows), (2, 4));
    }

    #[test]
    fn sheet_slots_fit_and_never_overlap() {
        for format in PaperFormat::ALL.into_iter().filter(|f| f.is_sheet()) {
            let geo = plan_layout(format).unwrap();
            assert!(geo.columns >= 1 && geo.rows >= 1);
            let rects: Vec<_> = (0..geo.slots_per_page)
                .map(|i| geo.slot_rect(i).unwrap())
                .collect();
            for (i, a) in rects.iter().enumerate() {
                assert_eq!(a.width, 85.6);
                assert_eq!(a.height, 54.0);
                assert!(a.right() <= geo.page.width - 10.0 + 1e-3, "{format} slot {i}");
                assert!(a.bottom() <= geo.page.height - 10.0 + 1e-3, "{format} slot {i}");
                for b in rects.iter().skip(i + 1) {
                    assert!(!a.overlaps(b), "{format}: {a:?} overlaps {b:?}");
                }
            }
        }
    }

    #[test]
    fn slots_fill_left_to_right_then_down() {
        let geo = plan_layout(PaperFormat::Letter).unwrap();
        let (x0, y0) = geo.slot_positions[0];
        let (x1, y1) = geo.slot_positions[1];
        let (x2, y2) = geo.slot_positions[2];
        assert!(x1 > x0 && y1 == y0);
        assert!(x2 == x0 && y2 > y0);
    }

    #[test]
    fn pagination_law() {
        let geo = plan_layout(PaperFormat::Letter).unwrap();
        let k = geo.slots_per_page;
        assert_eq!(geo.pages_for(13), 2);
        assert_eq!(geo.pages_for(16), 2);
        assert_eq!(geo.pages_for(17), 3);
        for i in 0..40 {
            assert_eq!(geo.locate(i), (i / k, i % k));
        }
    }

    #[test]
    fn oversized_card_is_degenerate() {
        let planner = LayoutPlanner::new(LayoutPolicy {
            card: SizeMm::new(250.0, 54.0),
            ..LayoutPolicy::default()
        });
        let err = planner.plan(PaperFormat::Letter).unwrap_err();
        assert!(matches!(err, LayoutError::Degenerate { columns: 0, .. }));

        // Individual bypasses the grid regardless of card size.
        assert!(planner.plan(PaperFormat::Individual).is_ok());
    }

    #[test]
    fn tiny_or_malformed_policies_are_rejected() {
        let tiny: LayoutPolicy = serde_json::from_str(
            r#"{"card":{"width":0.0001,"height":0.0001},"marginMm":10.0,"gapMm":0.0}"#,
        )
        .unwrap();
        for format in PaperFormat::ALL {
            let err = LayoutPlanner::new(tiny).plan(format).unwrap_err();
            assert!(matches!(err, LayoutError::InvalidPolicy(_)), "{format}: {err}");
        }

        let policies = [
            LayoutPolicy { card: SizeMm::new(f32::NAN, 54.0), ..LayoutPolicy::default() },
            LayoutPolicy { card: SizeMm::new(85.6, 900.0), ..LayoutPolicy::default() },
            LayoutPolicy { margin_mm: -5.0, ..LayoutPolicy::default() },
            LayoutPolicy { gap_mm: f32::INFINITY, ..LayoutPolicy::default() },
        ];
        for policy in policies {
            assert!(matches!(
                LayoutPlanner::new(policy).plan(PaperFormat::Letter),
                Err(LayoutError::InvalidPolicy(_))
            ));
        }
    }

    #[test]
    fn crowded_sheet_hits_slot_limit() {
        let planner = LayoutPlanner::new(LayoutPolicy {
            card: SizeMm::new(2.0, 2.0),
            margin_mm: 0.0,
            gap_mm: 0.0,
        });
        let err = planner.plan(PaperFormat::Letter).unwrap_err();
        assert!(matches!(
            err,
            LayoutError::TooManySlots { slots, limit: MAX_SLOTS_PER_PAGE, .. } if slots > 1024
        ));

        let roomy = LayoutPlanner::new(LayoutPolicy {
            card: SizeMm::new(20.0, 20.0),
            ..LayoutPolicy::default()
        });
        let geometry = roomy.plan(PaperFormat::Letter).unwrap();
        assert_eq!(geometry.slots_per_page as usize, geometry.slot_positions.len());
    }

    #[test]
    fn format_parsing() {
        assert_eq!("Letter".parse::<PaperFormat>().unwrap(), PaperFormat::Letter);
        assert_eq!(" a4 ".parse::<PaperFormat>().unwrap(), PaperFormat::A4);
        assert!("tabloid".parse::<PaperFormat>().is_err());
        let json = serde_json::to_string(&PaperFormat::Legal).unwrap();
        assert_eq!(json, "\"legal\"");
    }

    #[test]
    fn rect_edges() {
        let rect = RectMm::new(10.0, 20.0, 100.0, 200.0);
        assert_eq!(rect.right(), 110.0);
        assert_eq!(rect.bottom(), 220.0);
        let touching = RectMm::new(110.0, 20.0, 5.0, 5.0);
        assert!(!rect.overlaps(&touching));
    }
}
