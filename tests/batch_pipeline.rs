//! End-to-end batch behavior: pagination, failure policies, timeouts and
//! persistence.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use cardpress::{
    AssetError, AssetRef, AssetSource, BatchError, BatchOrchestrator, BatchSettings, DocumentError,
    FailurePolicy, Palette, PaperFormat, RasterError, Record, encode_qr,
};
use chrono::NaiveDate;
use image::{DynamicImage, Rgba, RgbaImage};

// ============================================================================
// Fixtures
// ============================================================================

/// Serves a solid logo and real QR codes without touching the network.
struct SolidAssets;

impl AssetSource for SolidAssets {
    async fn load(&self, asset: &AssetRef) -> Result<DynamicImage, AssetError> {
        match asset {
            AssetRef::Qr(payload) => encode_qr(payload),
            _ => Ok(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
                64,
                64,
                Rgba([200, 30, 40, 255]),
            ))),
        }
    }
}

/// Logos never arrive.
struct StalledLogos;

impl AssetSource for StalledLogos {
    async fn load(&self, asset: &AssetRef) -> Result<DynamicImage, AssetError> {
        match asset {
            AssetRef::Qr(payload) => encode_qr(payload),
            _ => std::future::pending().await,
        }
    }
}

fn settings() -> BatchSettings {
    BatchSettings::new("Lions Club")
        .with_oversampling(2.0)
        .with_settle_delay(Duration::ZERO)
        .with_system_fonts(false)
}

fn palette() -> Palette {
    Palette::from_hex("#0047A0", "#CD2E3A", "#FFFFFF").unwrap()
}

fn record(id: &str, given: &str) -> Record {
    Record::new(id, given, "Silva", "Senior", NaiveDate::from_ymd_opt(2026, 3, 1).unwrap())
}

fn records(n: usize) -> Vec<Record> {
    (0..n).map(|i| record(&format!("M-{i:03}"), "Ana")).collect()
}

type Notified = Rc<RefCell<Vec<Vec<String>>>>;

fn build<S: AssetSource>(
    settings: BatchSettings,
    source: S,
    dir: &std::path::Path,
) -> (BatchOrchestrator<S>, Notified) {
    let notified: Notified = Rc::default();
    let sink = Rc::clone(&notified);
    let orchestrator = BatchOrchestrator::with_source(settings, source, dir)
        .with_listener(move |ids: &[String]| sink.borrow_mut().push(ids.to_vec()));
    (orchestrator, notified)
}

// ============================================================================
// Pagination
// ============================================================================

#[tokio::test]
async fn thirteen_records_on_letter_fill_two_pages() {
    let dir = tempfile::tempdir().unwrap();
    let (mut orchestrator, notified) = build(settings(), SolidAssets, dir.path());
    let input = records(13);

    let outcome = orchestrator
        .run(&input, &palette(), PaperFormat::Letter, "badges")
        .await
        .unwrap();

    assert_eq!(outcome.page_count, 2);
    let per_page: Vec<_> = outcome
        .document
        .pages
        .iter()
        .map(|p| p.placements.len())
        .collect();
    assert_eq!(per_page, vec![8, 5]);

    for (i, placement) in outcome.document.placements().enumerate() {
        assert_eq!(placement.record_id, input[i].identifier);
        assert_eq!(placement.page_index, i as u32 / 8);
        assert_eq!(placement.local_slot, i as u32 % 8);
    }

    let path = outcome.path.clone().unwrap();
    assert_eq!(path, dir.path().join("badges.pdf"));
    let bytes = std::fs::read(&path).unwrap();
    assert!(bytes.starts_with(b"%PDF"));

    let expected: Vec<String> = input.iter().map(|r| r.identifier.clone()).collect();
    assert_eq!(*notified.borrow(), vec![expected]);
}

#[tokio::test]
async fn individual_format_gets_one_page_per_record() {
    let dir = tempfile::tempdir().unwrap();
    let (mut orchestrator, _) = build(settings(), SolidAssets, dir.path());

    let outcome = orchestrator
        .run(&records(3), &palette(), PaperFormat::Individual, "singles")
        .await
        .unwrap();

    assert_eq!(outcome.page_count, 3);
    for page in &outcome.document.pages {
        assert_eq!((page.size.width, page.size.height), (85.6, 54.0));
        assert_eq!(page.placements.len(), 1);
        assert!(page.crop_marks.is_empty());
    }
}

#[tokio::test]
async fn sheets_carry_crop_marks_unless_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let (mut orchestrator, _) = build(settings(), SolidAssets, dir.path());
    let outcome = orchestrator
        .render(&records(2), &palette(), PaperFormat::Legal)
        .await
        .unwrap();
    assert!(!outcome.document.pages[0].crop_marks.is_empty());

    let (mut orchestrator, _) =
        build(settings().with_crop_marks(false), SolidAssets, dir.path());
    let outcome = orchestrator
        .render(&records(2), &palette(), PaperFormat::Legal)
        .await
        .unwrap();
    assert!(outcome.document.pages[0].crop_marks.is_empty());
}

// ============================================================================
// Failure policies
// ============================================================================

#[tokio::test]
async fn abort_policy_stops_batch_and_clears_surface() {
    let dir = tempfile::tempdir().unwrap();
    let (mut orchestrator, notified) = build(settings(), SolidAssets, dir.path());

    // Warm the surface so its allocation can be compared.
    orchestrator
        .render(&records(1), &palette(), PaperFormat::Letter)
        .await
        .unwrap();
    let before = orchestrator.surface().map(|s| (s.width(), s.height()));

    let input = vec![
        record("OK-1", "Ana"),
        record("BAD-2", "Bad\u{1}"),
        record("OK-3", "Rui"),
    ];
    let err = orchestrator
        .run(&input, &palette(), PaperFormat::Letter, "aborted")
        .await
        .unwrap_err();

    match err {
        BatchError::RasterizationFailure { identifier, source } => {
            assert_eq!(identifier, "BAD-2");
            assert!(matches!(source, RasterError::InvalidText('\u{1}')));
        }
        other => panic!("unexpected error: {other}"),
    }

    let surface = orchestrator.surface().unwrap();
    assert!(surface.is_clear());
    assert_eq!(Some((surface.width(), surface.height())), before);
    assert!(!dir.path().join("aborted.pdf").exists());
    assert!(notified.borrow().is_empty());
}

#[tokio::test]
async fn skip_policy_keeps_slots_contiguous() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings().with_failure_policy(FailurePolicy::SkipAndReport);
    let (mut orchestrator, notified) = build(settings, SolidAssets, dir.path());

    let input = vec![
        record("OK-1", "Ana"),
        record("BAD-2", "Bad\u{1}"),
        record("OK-3", "Rui"),
    ];
    let outcome = orchestrator
        .run(&input, &palette(), PaperFormat::Letter, "partial")
        .await
        .unwrap();

    assert_eq!(outcome.rendered, vec!["OK-1", "OK-3"]);
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].identifier, "BAD-2");

    let slots: Vec<_> = outcome
        .document
        .placements()
        .map(|p| (p.record_id.as_str(), p.local_slot))
        .collect();
    assert_eq!(slots, vec![("OK-1", 0), ("OK-3", 1)]);
    assert_eq!(*notified.borrow(), vec![vec!["OK-1".to_string(), "OK-3".to_string()]]);
    assert!(orchestrator.surface().unwrap().is_clear());
}

#[tokio::test]
async fn batch_where_every_record_fails_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings().with_failure_policy(FailurePolicy::SkipAndReport);
    let (mut orchestrator, _) = build(settings, SolidAssets, dir.path());

    let err = orchestrator
        .run(&[record("BAD-1", "x\u{2}")], &palette(), PaperFormat::Individual, "none")
        .await
        .unwrap_err();
    assert!(matches!(err, BatchError::NothingRendered { skipped: 1 }));
    assert!(!dir.path().join("none.pdf").exists());
}

#[tokio::test]
async fn empty_batch_and_bad_palette_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (mut orchestrator, _) = build(settings(), SolidAssets, dir.path());
    let err = orchestrator
        .run(&[], &palette(), PaperFormat::Letter, "empty")
        .await
        .unwrap_err();
    assert!(matches!(err, BatchError::EmptyBatch));

    assert!(Palette::from_hex("#0047A0", "nope", "#FFFFFF").is_err());
}

// ============================================================================
// Assets
// ============================================================================

#[tokio::test(start_paused = true)]
async fn stalled_logo_resolves_within_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings().with_asset_timeout(Duration::from_millis(3000));
    let (mut orchestrator, _) = build(settings, StalledLogos, dir.path());

    let input = vec![record("M-1", "Ana").with_logo("https://cdn.example/logo.png")];
    let start = tokio::time::Instant::now();
    let outcome = orchestrator
        .render(&input, &palette(), PaperFormat::Individual)
        .await
        .unwrap();

    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(3000), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(3500), "{elapsed:?}");
    assert_eq!(outcome.rendered, vec!["M-1"]);
}

#[tokio::test]
async fn missing_logo_file_does_not_fail_the_card() {
    let dir = tempfile::tempdir().unwrap();
    let mut orchestrator = BatchOrchestrator::new(settings(), dir.path());
    let input = vec![record("M-1", "Ana").with_logo(dir.path().join("absent.png").display().to_string())];

    let outcome = orchestrator
        .render(&input, &palette(), PaperFormat::Individual)
        .await
        .unwrap();
    assert_eq!(outcome.rendered, vec!["M-1"]);
}

// ============================================================================
// Persistence
// ============================================================================

#[tokio::test]
async fn unwritable_output_is_a_persistence_failure() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("does-not-exist");
    let (mut orchestrator, notified) = build(settings(), SolidAssets, &missing);

    let err = orchestrator
        .run(&records(2), &palette(), PaperFormat::Letter, "badges")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BatchError::PersistenceFailure(DocumentError::Io { .. })
    ));
    assert!(notified.borrow().is_empty());
    assert!(orchestrator.surface().unwrap().is_clear());
}

#[tokio::test]
async fn invalid_file_name_fails_before_rendering() {
    let dir = tempfile::tempdir().unwrap();
    let (mut orchestrator, _) = build(settings(), SolidAssets, dir.path());

    let err = orchestrator
        .run(&records(2), &palette(), PaperFormat::Letter, "../escape")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BatchError::PersistenceFailure(DocumentError::InvalidFileName(_))
    ));
    assert!(orchestrator.surface().is_none());
}
