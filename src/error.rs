//! Error types for the card production pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::layout::PaperFormat;

/// A palette color could not be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid color '{input}': expected #RRGGBB or #RGB")]
pub struct ColorError {
    pub input: String,
}

/// Layout planning errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LayoutError {
    #[error("{format} cannot fit a {card_width}x{card_height}mm card ({columns} columns, {rows} rows)")]
    Degenerate {
        format: PaperFormat,
        card_width: f32,
        card_height: f32,
        columns: u32,
        rows: u32,
    },

    #[error("invalid layout policy: {0}")]
    InvalidPolicy(String),

    #[error("{format} would hold {slots} cards per page, more than the limit of {limit}")]
    TooManySlots { format: PaperFormat, slots: u64, limit: u32 },

    #[error("unknown paper format '{0}'")]
    UnknownFormat(String),
}

/// Why an asset did not load. Never fatal to a batch.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset did not settle within {0} ms")]
    Timeout(u64),

    #[error("failed to fetch asset: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("failed to read asset: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode asset: {0}")]
    Decode(#[from] image::ImageError),

    #[error("unsupported data URI: expected data:<type>;base64,<payload>")]
    DataUri,

    #[error("invalid base64 in data URI: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("failed to encode QR payload: {0}")]
    Qr(#[from] qrcode::types::QrError),

    #[error("built-in mark could not be rendered")]
    DefaultMark,
}

/// A card could not be rasterized.
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("text contains a character that cannot be rendered: {0:?}")]
    InvalidText(char),

    #[error("card markup rejected: {0}")]
    Markup(#[from] resvg::usvg::Error),

    #[error("cannot allocate a {width}x{height}px surface")]
    Allocation { width: u32, height: u32 },

    #[error("surface is {surface_width}x{surface_height}px but the card needs {width}x{height}px")]
    SurfaceMismatch {
        surface_width: u32,
        surface_height: u32,
        width: u32,
        height: u32,
    },
}

/// Errors while building or persisting the output document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("PDF serialization failed: {0}")]
    Pdf(String),

    #[error("invalid output file name '{0}'")]
    InvalidFileName(String),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level batch failure.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("batch contains no records")]
    EmptyBatch,

    #[error(transparent)]
    InvalidColor(#[from] ColorError),

    #[error("degenerate layout: {0}")]
    DegenerateLayout(#[from] LayoutError),

    #[error("rendering surface unavailable: {0}")]
    SurfaceUnavailable(RasterError),

    #[error("no card could be rendered ({skipped} records skipped)")]
    NothingRendered { skipped: usize },

    #[error("rasterization failed for record '{identifier}': {source}")]
    RasterizationFailure {
        identifier: String,
        #[source]
        source: RasterError,
    },

    #[error("failed to persist document: {0}")]
    PersistenceFailure(#[from] DocumentError),
}

pub type Result<T, E = BatchError> = std::result::Result<T, E>;
