//! cardpress: batch identity-card production
//!
//! This crate turns a list of member records into a print-ready PDF of
//! CR80 identity cards. Each card is composed from a declarative template,
//! rasterized off-screen at 2-3x oversampling, and placed either one per
//! page or in a grid on Letter, Legal or A4 sheets with crop marks.
//!
//! Background and text colors come from the caller's brand palette but are
//! always corrected for legibility (see [`resolve_background`] and
//! [`ideal_text_color`]).
//!
//! # Example
//!
//! ```no_run
//! use cardpress::{BatchOrchestrator, BatchSettings, Palette, PaperFormat, Record};
//! use chrono::NaiveDate;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), cardpress::BatchError> {
//! let records = vec![
//!     Record::new("M-001", "Ana", "Silva", "Senior", NaiveDate::from_ymd_opt(2026, 3, 1).unwrap())
//!         .with_group("North Branch"),
//! ];
//! let palette = Palette::from_hex("#0047A0", "#CD2E3A", "#FFFFFF")?;
//!
//! let mut orchestrator = BatchOrchestrator::new(BatchSettings::new("Lions Club"), "./out")
//!     .with_listener(|ids: &[String]| println!("generated: {ids:?}"));
//! let outcome = orchestrator
//!     .run(&records, &palette, PaperFormat::Letter, "badges")
//!     .await?;
//! println!("{} pages written to {:?}", outcome.page_count, outcome.path);
//! # Ok(())
//! # }
//! ```
//!
//! # Settings
//!
//! [`BatchSettings`] serializes to camelCase JSON and round-trips through
//! the [`Configurable`] trait:
//!
//! ```
//! use cardpress::{BatchOrchestrator, BatchSettings, Configurable, FailurePolicy};
//!
//! let mut orchestrator = BatchOrchestrator::new(BatchSettings::default(), "./out");
//! orchestrator.apply_settings(
//!     &BatchSettings::new("Lions Club").with_failure_policy(FailurePolicy::SkipAndReport),
//! );
//!
//! let json = orchestrator.export_settings().to_json().unwrap();
//! assert!(json.contains("skip-and-report"));
//! ```

mod color;
mod consts;
mod document;
mod error;
mod layout;
mod orchestrator;
mod record;
mod render;
mod settings;
mod template;

pub use color::{
    ColorCache, HexColor, Palette, ResolvedColors, contrast_ratio, ideal_text_color,
    resolve_background,
};
pub use consts::{CARD_HEIGHT_MM, CARD_WIDTH_MM, DEFAULT_ASSET_TIMEOUT_MS};
pub use document::{
    CropMark, DocumentAssembler, OutputDocument, PageLayout, Placement, crop_marks, pdf_file_name,
};
pub use error::{AssetError, BatchError, ColorError, DocumentError, LayoutError, RasterError};
pub use layout::{
    Geometry, LayoutPlanner, LayoutPolicy, Orientation, PaperFormat, RectMm, SizeMm, plan_layout,
};
pub use orchestrator::{
    BatchOrchestrator, BatchOutcome, CompletionListener, Configurable, SkippedRecord,
};
pub use record::Record;
pub use render::assets::encode_qr;
pub use render::{
    AssetLoader, AssetSource, CardBitmap, LoadedAsset, Rasterizer, ReadyTemplate, RenderSurface,
    StandardAssetSource, SurfaceLease,
};
pub use settings::{BatchSettings, FailurePolicy};
pub use template::{
    AssetRef, CardTemplate, FooterBlock, HeaderBlock, IdentityBlock, QrBlock, TemplateComposer,
    TextAnchor, TextLine,
};
