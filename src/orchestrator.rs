//! Batch driver: records in, one PDF out.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::color::{ColorCache, Palette, ResolvedColors};
use crate::document::{DocumentAssembler, OutputDocument, pdf_file_name};
use crate::error::{BatchError, RasterError, Result};
use crate::layout::{LayoutPlanner, PaperFormat, SizeMm};
use crate::record::Record;
use crate::render::{AssetLoader, AssetSource, Rasterizer, RenderSurface, StandardAssetSource};
use crate::settings::{BatchSettings, FailurePolicy};
use crate::template::TemplateComposer;

// ============================================================================
// Configurable Trait
// ============================================================================

/// Trait for types that can be configured from [`BatchSettings`].
pub trait Configurable {
    /// Applies the settings to this instance.
    fn apply_settings(&mut self, settings: &BatchSettings);

    /// Exports the current settings.
    fn export_settings(&self) -> BatchSettings;
}

// ============================================================================
// CompletionListener
// ============================================================================

/// Told which records made it into a persisted document.
///
/// Called once per successful [`BatchOrchestrator::run`], after the file is
/// written. Never called when the batch fails.
pub trait CompletionListener {
    fn documents_generated(&mut self, identifiers: &[String]);
}

impl<F: FnMut(&[String])> CompletionListener for F {
    fn documents_generated(&mut self, identifiers: &[String]) {
        self(identifiers)
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// A record left out under [`FailurePolicy::SkipAndReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRecord {
    pub identifier: String,
    pub reason: String,
}

/// Result of a batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    /// Where the PDF was written. `None` for in-memory renders.
    pub path: Option<PathBuf>,
    pub format: PaperFormat,
    pub colors: ResolvedColors,
    pub page_count: usize,
    /// Identifiers of placed cards, in slot order.
    pub rendered: Vec<String>,
    pub skipped: Vec<SkippedRecord>,
    #[serde(skip)]
    pub document: OutputDocument,
}

// ============================================================================
// BatchOrchestrator
// ============================================================================

/// Runs batches strictly sequentially on one reusable render surface.
///
/// The surface is created on the first batch and kept for later batches
/// with the same card size and oversampling. Taking `&mut self` for a run
/// means no two batches can share it.
pub struct BatchOrchestrator<S = StandardAssetSource> {
    settings: BatchSettings,
    source: S,
    output_dir: PathBuf,
    colors: ColorCache,
    surface: Option<RenderSurface>,
    listener: Option<Box<dyn CompletionListener>>,
}

impl BatchOrchestrator<StandardAssetSource> {
    /// Orchestrator with the standard asset source.
    pub fn new(settings: BatchSettings, output_dir: impl Into<PathBuf>) -> Self {
        Self::with_source(settings, StandardAssetSource::new(), output_dir)
    }
}

impl<S: AssetSource> BatchOrchestrator<S> {
    pub fn with_source(settings: BatchSettings, source: S, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            settings,
            source,
            output_dir: output_dir.into(),
            colors: ColorCache::new(),
            surface: None,
            listener: None,
        }
    }

    /// Registers the listener notified after each persisted batch.
    pub fn with_listener(mut self, listener: impl CompletionListener + 'static) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    pub fn settings(&self) -> &BatchSettings {
        &self.settings
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn color_cache(&self) -> &ColorCache {
        &self.colors
    }

    /// The render surface, once a batch has acquired it.
    pub fn surface(&self) -> Option<&RenderSurface> {
        self.surface.as_ref()
    }

    /// Renders a batch into an in-memory document.
    ///
    /// Colors are resolved and the layout planned before any record is
    /// touched, so a bad palette or degenerate layout fails immediately.
    #[tracing::instrument(skip(self, records, palette), fields(records = records.len()))]
    pub async fn render(
        &mut self,
        records: &[Record],
        palette: &Palette,
        format: PaperFormat,
    ) -> Result<BatchOutcome> {
        let colors = self.colors.resolve(palette);
        let geometry = LayoutPlanner::new(self.settings.layout_policy()).plan(format)?;
        if records.is_empty() {
            return Err(BatchError::EmptyBatch);
        }

        let Self {
            settings,
            source,
            surface,
            ..
        } = self;

        let surface = acquire_surface(surface, geometry.card, settings)
            .map_err(BatchError::SurfaceUnavailable)?;
        let mut lease = surface.lease();

        let composer = TemplateComposer::new(settings.organization_name.clone());
        let loader = AssetLoader::new(&*source, settings.asset_timeout());
        let rasterizer = Rasterizer::new(settings.effective_oversampling(), settings.settle_delay());
        let mut assembler = DocumentAssembler::new(
            document_title(&settings.organization_name),
            geometry.clone(),
            settings.crop_marks,
        );

        let mut rendered = Vec::with_capacity(records.len());
        let mut skipped = Vec::new();

        for record in records {
            let template = composer.compose(record, &colors, format, geometry.card);
            let ready = loader.await_ready(template).await;

            match rasterizer.rasterize(&mut lease, &ready).await {
                Ok(bitmap) => {
                    assembler.place(bitmap);
                    rendered.push(record.identifier.clone());
                }
                Err(source) => match settings.failure_policy {
                    FailurePolicy::Abort => {
                        return Err(BatchError::RasterizationFailure {
                            identifier: record.identifier.clone(),
                            source,
                        });
                    }
                    FailurePolicy::SkipAndReport => {
                        warn!(record = %record.identifier, error = %source, "skipping record");
                        skipped.push(SkippedRecord {
                            identifier: record.identifier.clone(),
                            reason: source.to_string(),
                        });
                    }
                },
            }
        }
        drop(lease);

        if rendered.is_empty() {
            return Err(BatchError::NothingRendered {
                skipped: skipped.len(),
            });
        }

        let document = assembler.finalize()?;
        info!(
            pages = document.page_count(),
            cards = rendered.len(),
            skipped = skipped.len(),
            "batch rendered"
        );

        Ok(BatchOutcome {
            path: None,
            format,
            colors,
            page_count: document.page_count(),
            rendered,
            skipped,
            document,
        })
    }

    /// Renders a batch and saves it as `{output_dir}/{file_name}.pdf`.
    ///
    /// The listener is notified only after the file is written.
    #[tracing::instrument(skip(self, records, palette), fields(records = records.len()))]
    pub async fn run(
        &mut self,
        records: &[Record],
        palette: &Palette,
        format: PaperFormat,
        file_name: &str,
    ) -> Result<BatchOutcome> {
        pdf_file_name(file_name)?;

        let mut outcome = self.render(records, palette, format).await?;
        let path = outcome.document.save(&self.output_dir, file_name).await?;

        if let Some(listener) = self.listener.as_mut() {
            listener.documents_generated(&outcome.rendered);
        }
        info!(path = %path.display(), "batch complete");

        outcome.path = Some(path);
        Ok(outcome)
    }
}

impl<S> Configurable for BatchOrchestrator<S> {
    fn apply_settings(&mut self, settings: &BatchSettings) {
        // The font database lives in the surface.
        if settings.load_system_fonts != self.settings.load_system_fonts {
            self.surface = None;
        }
        self.settings = settings.clone();
    }

    fn export_settings(&self) -> BatchSettings {
        self.settings.clone()
    }
}

/// Reuses the surface in `slot` when it fits, otherwise allocates a new one.
fn acquire_surface<'a>(
    slot: &'a mut Option<RenderSurface>,
    card: SizeMm,
    settings: &BatchSettings,
) -> std::result::Result<&'a mut RenderSurface, RasterError> {
    let oversampling = settings.effective_oversampling();
    let surface = match slot.take() {
        Some(surface) if surface.fits(card, oversampling) => surface,
        _ => RenderSurface::acquire(card, oversampling, settings.load_system_fonts)?,
    };
    Ok(slot.insert(surface))
}

fn document_title(organization_name: &str) -> &str {
    match organization_name.trim() {
        "" => "Identity cards",
        name => name,
    }
}

// ============================================================================
// Tests
// ============================================================================
