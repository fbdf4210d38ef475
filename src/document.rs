//! PDF assembly: places captured cards into page slots.
//!
//! Page coordinates follow [`crate::layout`] (top-left origin, mm). They
//! are flipped to PDF's bottom-left origin only when drawing.

use std::path::{Path, PathBuf};

use printpdf::{
    Color, ColorBits, ColorSpace, Image, ImageTransform, ImageXObject, Line, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference, Point, Px, Rgb,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::consts::{CROP_MARK_GRAY, CROP_MARK_LENGTH_MM, CROP_MARK_OFFSET_MM, CROP_MARK_THICKNESS_PT};
use crate::error::DocumentError;
use crate::layout::{Geometry, Orientation, PaperFormat, RectMm, SizeMm};
use crate::render::CardBitmap;
use crate::render::svg::flatten_onto_white;

// ============================================================================
// Page summaries
// ============================================================================

/// Where one card landed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub record_id: String,
    pub page_index: u32,
    pub local_slot: u32,
    pub rect: RectMm,
}

/// A straight crop-mark segment in page millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CropMark {
    pub from: (f32, f32),
    pub to: (f32, f32),
}

/// What was drawn on one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLayout {
    pub index: u32,
    pub size: SizeMm,
    pub orientation: Orientation,
    pub placements: Vec<Placement>,
    pub crop_marks: Vec<CropMark>,
}

// ============================================================================
// Crop marks
// ============================================================================

/// Crop marks for one slot: short ticks extending each card edge outward
/// from its four corners.
///
/// Ticks stop short of neighbouring slots and of the page edge, so they
/// never print over a card.
pub fn crop_marks(geometry: &Geometry, local_slot: u32) -> Vec<CropMark> {
    let Some(rect) = geometry.slot_rect(local_slot) else {
        return Vec::new();
    };
    let cols = geometry.columns;
    let col = local_slot % cols;
    let row = local_slot / cols;
    let neighbour = |slot: u32| geometry.slot_rect(slot);

    let left_room = match (col > 0).then(|| neighbour(local_slot - 1)).flatten() {
        Some(n) => rect.x - n.right(),
        None => rect.x,
    };
    let right_room = match (col + 1 < cols).then(|| neighbour(local_slot + 1)).flatten() {
        Some(n) => n.x - rect.right(),
        None => geometry.page.width - rect.right(),
    };
    let top_room = match (row > 0).then(|| neighbour(local_slot - cols)).flatten() {
        Some(n) => rect.y - n.bottom(),
        None => rect.y,
    };
    let bottom_room = match neighbour(local_slot + cols) {
        Some(n) => n.y - rect.bottom(),
        None => geometry.page.height - rect.bottom(),
    };

    let tick = |room: f32| {
        let len = CROP_MARK_LENGTH_MM.min(room - 2.0 * CROP_MARK_OFFSET_MM);
        (len > 0.0).then_some(len)
    };
    let o = CROP_MARK_OFFSET_MM;
    let (x0, y0, x1, y1) = (rect.x, rect.y, rect.right(), rect.bottom());

    let mut marks = Vec::with_capacity(8);
    if let Some(len) = tick(left_room) {
        for y in [y0, y1] {
            marks.push(CropMark { from: (x0 - o - len, y), to: (x0 - o, y) });
        }
    }
    if let Some(len) = tick(right_room) {
        for y in [y0, y1] {
            marks.push(CropMark { from: (x1 + o, y), to: (x1 + o + len, y) });
        }
    }
    if let Some(len) = tick(top_room) {
        for x in [x0, x1] {
            marks.push(CropMark { from: (x, y0 - o - len), to: (x, y0 - o) });
        }
    }
    if let Some(len) = tick(bottom_room) {
        for x in [x0, x1] {
            marks.push(CropMark { from: (x, y1 + o), to: (x, y1 + o + len) });
        }
    }
    marks
}

// ============================================================================
// DocumentAssembler
// ============================================================================

/// Accumulates card bitmaps into a paginated PDF.
///
/// Slots are filled strictly in order: the n-th placed card goes to page
/// `n / slots_per_page`, slot `n % slots_per_page`.
pub struct DocumentAssembler {
    geometry: Geometry,
    crop_marks: bool,
    doc: PdfDocumentReference,
    layer: Option<PdfLayerReference>,
    pages: Vec<PageLayout>,
    next_slot: u32,
}

impl DocumentAssembler {
    /// Starts an empty document. Crop marks are only drawn on sheet formats.
    pub fn new(title: &str, geometry: Geometry, crop_marks: bool) -> Self {
        let crop_marks = crop_marks && geometry.format.is_sheet();
        Self {
            doc: PdfDocument::empty(title),
            geometry,
            crop_marks,
            layer: None,
            pages: Vec::new(),
            next_slot: 0,
        }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Batch-wide index of the next free slot.
    pub fn next_slot(&self) -> u32 {
        self.next_slot
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Places `bitmap` in the next free slot, starting a page when needed.
    ///
    /// The bitmap is consumed; its pixels live only in the document from
    /// here on.
    pub fn place(&mut self, bitmap: CardBitmap) -> Placement {
        let (page_index, local_slot) = self.geometry.locate(self.next_slot);
        let layer = match self.layer.clone() {
            Some(layer) if local_slot > 0 => layer,
            _ => self.begin_page(page_index),
        };

        let rect = RectMm::from_origin(
            self.geometry.slot_positions[local_slot as usize],
            self.geometry.card,
        );
        let page_height = self.geometry.page.height;
        embed_bitmap(&layer, bitmap.data, rect, page_height);

        let marks = if self.crop_marks {
            let marks = crop_marks(&self.geometry, local_slot);
            draw_crop_marks(&layer, &marks, page_height);
            marks
        } else {
            Vec::new()
        };

        let placement = Placement {
            record_id: bitmap.record_id,
            page_index,
            local_slot,
            rect,
        };
        if let Some(page) = self.pages.last_mut() {
            page.placements.push(placement.clone());
            page.crop_marks.extend(marks);
        }
        self.next_slot += 1;

        debug!(record = %placement.record_id, page_index, local_slot, "card placed");
        placement
    }

    fn begin_page(&mut self, page_index: u32) -> PdfLayerReference {
        let page = self.geometry.page;
        let (page_ref, layer_ref) = self.doc.add_page(
            Mm(page.width),
            Mm(page.height),
            format!("Page {}", page_index + 1),
        );
        let layer = self.doc.get_page(page_ref).get_layer(layer_ref);
        self.layer = Some(layer.clone());
        self.pages.push(PageLayout {
            index: page_index,
            size: page,
            orientation: self.geometry.format.orientation(),
            placements: Vec::new(),
            crop_marks: Vec::new(),
        });
        layer
    }

    /// Serializes the document.
    pub fn finalize(self) -> Result<OutputDocument, DocumentError> {
        let pdf = self
            .doc
            .save_to_bytes()
            .map_err(|e| DocumentError::Pdf(e.to_string()))?;
        info!(
            pages = self.pages.len(),
            cards = self.next_slot,
            bytes = pdf.len(),
            "document finalized"
        );
        Ok(OutputDocument {
            format: self.geometry.format,
            pages: self.pages,
            pdf,
        })
    }
}

fn embed_bitmap(layer: &PdfLayerReference, data: image::RgbaImage, rect: RectMm, page_height: f32) {
    let rgb = flatten_onto_white(&data);
    drop(data);
    let (width, height) = rgb.dimensions();

    let image = Image::from(ImageXObject {
        width: Px(width as usize),
        height: Px(height as usize),
        color_space: ColorSpace::Rgb,
        bits_per_component: ColorBits::Bit8,
        interpolate: true,
        image_data: rgb.into_raw(),
        image_filter: None,
        clipping_bbox: None,
        smask: None,
    });

    // DPI = pixels / (mm / 25.4)
    let dpi = width as f32 / (rect.width / 25.4);

    image.add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(Mm(rect.x)),
            translate_y: Some(Mm(page_height - rect.bottom())),
            dpi: Some(dpi),
            ..Default::default()
        },
    );
}

fn draw_crop_marks(layer: &PdfLayerReference, marks: &[CropMark], page_height: f32) {
    if marks.is_empty() {
        return;
    }
    layer.set_outline_color(Color::Rgb(Rgb::new(
        CROP_MARK_GRAY,
        CROP_MARK_GRAY,
        CROP_MARK_GRAY,
        None,
    )));
    layer.set_outline_thickness(CROP_MARK_THICKNESS_PT);

    for mark in marks {
        layer.add_line(Line {
            points: vec![
                (Point::new(Mm(mark.from.0), Mm(page_height - mark.from.1)), false),
                (Point::new(Mm(mark.to.0), Mm(page_height - mark.to.1)), false),
            ],
            is_closed: false,
        });
    }
}

// ============================================================================
// OutputDocument
// ============================================================================

/// A finished, serialized document.
#[derive(Debug, Clone)]
pub struct OutputDocument {
    pub format: PaperFormat,
    pub pages: Vec<PageLayout>,
    pub pdf: Vec<u8>,
}

impl OutputDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn card_count(&self) -> usize {
        self.pages.iter().map(|p| p.placements.len()).sum()
    }

    /// All placements in slot order.
    pub fn placements(&self) -> impl Iterator<Item = &Placement> {
        self.pages.iter().flat_map(|p| p.placements.iter())
    }

    /// Writes the PDF to `dir/{file_name}.pdf` and returns the path.
    pub async fn save(&self, dir: &Path, file_name: &str) -> Result<PathBuf, DocumentError> {
        let path = dir.join(pdf_file_name(file_name)?);
        tokio::fs::write(&path, &self.pdf)
            .await
            .map_err(|source| DocumentError::Io {
                path: path.clone(),
                source,
            })?;
        info!(path = %path.display(), bytes = self.pdf.len(), "document saved");
        Ok(path)
    }
}

/// `{name}.pdf`, unless `name` already ends in `.pdf`.
///
/// Rejects names that are empty or would escape the output directory.
pub fn pdf_file_name(name: &str) -> Result<String, DocumentError> {
    let trimmed = name.trim();
    let invalid = trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || trimmed.contains(['/', '\\', '\0']);
    if invalid {
        return Err(DocumentError::InvalidFileName(name.to_string()));
    }
    if trimmed.to_ascii_lowercase().ends_with(".pdf") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}.pdf"))
    }
}

// ============================================================================
// Tests
// ============================================================================
