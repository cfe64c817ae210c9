//! Integration tests for the cv-forge pipeline.
//!
//! These tests validate:
//! - Page-count estimates for known heights
//! - The paged preview never leaves a block straddling a page edge
//! - Mode switches leave no residual shift
//! - Persistence round-trips and migrates old documents
//! - Print pagination, PDF and PNG output

use sha2::{Digest, Sha256};

use cv_forge::edit::{add_entry, set_rich_field, RichTarget};
use cv_forge::export::{ExportFormat, ExportOutcome, NoFrames};
use cv_forge::fonts::FontManager;
use cv_forge::layout::layout_document;
use cv_forge::model::{BuiltinSection, SectionKey};
use cv_forge::pagination::{
    paginate_for_print, BlockGeometry, PageCountTracker, PreviewSurface,
};
use cv_forge::preview::render_document;
use cv_forge::raster::rasterize_continuous;
use cv_forge::sections::SectionRegistry;
use cv_forge::settings::{mm_to_px, PageGeometry, PAGE_PIXEL_HEIGHT};
use cv_forge::store::{DocumentStore, FileStorage, Storage, RESUME_DATA_KEY};
use cv_forge::{
    estimate_page_count, simulate_page_breaks, EngineConfig, LayoutSettings, PreviewMode,
    PreviewSession, ResumeData,
};

// =====================================================================
// Helper
// =====================================================================

/// The sample resume with enough work entries to run over several pages.
fn long_resume() -> ResumeData {
    let registry = SectionRegistry::default();
    let mut doc = ResumeData::default();
    for _ in 0..24 {
        let (next, id) = add_entry(&doc, &registry, BuiltinSection::Work).unwrap();
        doc = set_rich_field(
            &next,
            &RichTarget::WorkDetails(id),
            "<ul><li>Led the migration of the billing service</li>\
             <li>Cut p99 latency by forty percent</li>\
             <li>Mentored three engineers</li></ul>",
        )
        .unwrap();
    }
    doc
}

fn assert_valid_pdf(bytes: &[u8]) {
    assert!(bytes.len() > 100, "PDF too small: {} bytes", bytes.len());
    assert_eq!(&bytes[0..5], b"%PDF-", "Missing PDF header");
}

// =====================================================================
// Page-count estimate
// =====================================================================

#[test]
fn full_page_height_is_one_page() {
    assert_eq!(estimate_page_count(1123.0, 14.0), 1);
}

#[test]
fn two_thousand_one_hundred_px_is_two_pages() {
    assert_eq!(estimate_page_count(2100.0, 14.0), 2);
}

#[test]
fn long_resume_runs_over_several_pages() {
    let pages = cv_forge::page_count(&long_resume(), &LayoutSettings::default(), &FontManager::default())
        .unwrap();
    assert!(pages >= 2, "expected several pages, got {pages}");
}

#[test]
fn tracker_skips_frames_while_clean_or_suspended() {
    let mut surface = PreviewSurface::new(PageGeometry::default());
    surface.update_blocks(vec![BlockGeometry::new(0.0, 2100.0)], 2100.0);
    let mut tracker = PageCountTracker::new();

    tracker.suspend();
    assert_eq!(tracker.on_frame(&surface, 14.0), None);
    tracker.resume();
    assert_eq!(tracker.on_frame(&surface, 14.0), Some(2));
    assert_eq!(tracker.on_frame(&surface, 14.0), None);
    assert_eq!(tracker.recomputations(), 1);
}

// =====================================================================
// Page-break simulation
// =====================================================================

#[test]
fn straddling_block_lands_on_next_content_top() {
    let geometry = PageGeometry::new(1123.0, 24.0, 50.0);
    let blocks = [
        BlockGeometry::new(50.0, 950.0),
        BlockGeometry::new(1000.0, 200.0),
        BlockGeometry::new(1250.0, 50.0),
    ];
    let assignments = simulate_page_breaks(&blocks, &geometry);

    assert_eq!(assignments[0].page_index, 0);
    assert_eq!(assignments[0].shift_px, 0.0);
    // New top is (N+1) * (height + gap) + container padding.
    assert_eq!(assignments[1].page_index, 1);
    assert!((1000.0 + assignments[1].shift_px - (1147.0 + 50.0)).abs() < 1e-3);
    assert_eq!(assignments[2].page_index, 1);
    assert_eq!(assignments[2].shift_px, 0.0);
}

#[test]
fn simulation_is_idempotent() {
    let geometry = PageGeometry::default();
    let blocks: Vec<_> = (0..40)
        .map(|i| BlockGeometry::new(60.0 + i as f32 * 130.0, 120.0))
        .collect();
    assert_eq!(
        simulate_page_breaks(&blocks, &geometry),
        simulate_page_breaks(&blocks, &geometry)
    );
}

#[test]
fn paged_preview_has_no_block_across_a_page_edge() {
    let settings = LayoutSettings::default();
    let rendered = render_document(&long_resume(), &SectionRegistry::default());
    let layout = layout_document(&rendered, &settings, &FontManager::default()).unwrap();
    let mut surface = PreviewSurface::new(settings.page_geometry(24.0));
    surface.update_layout(&layout);

    let geometry = *surface.geometry();
    assert!(surface.shifts().iter().any(|s| *s > 0.0));
    for (i, block) in layout.blocks.iter().enumerate() {
        let top = surface.block_top(i).unwrap();
        let bottom = top + block.height;
        let page = (0..)
            .find(|p| top <= geometry.page_bottom(*p) + geometry.page_gap_px)
            .unwrap();
        if block.height < geometry.page_height_px - geometry.container_top_padding_px {
            assert!(
                bottom - 1.0 <= geometry.page_bottom(page),
                "block {} ({top}..{bottom}) crosses the bottom of page {page}",
                block.id
            );
        }
    }
}

#[test]
fn continuous_mode_clears_every_shift() {
    let settings = LayoutSettings::default();
    let rendered = render_document(&long_resume(), &SectionRegistry::default());
    let layout = layout_document(&rendered, &settings, &FontManager::default()).unwrap();
    let mut surface = PreviewSurface::new(settings.page_geometry(24.0));
    surface.update_layout(&layout);
    let paged_height = surface.content_height();

    surface.set_mode(PreviewMode::Continuous);
    assert!(surface.shifts().iter().all(|s| *s == 0.0));
    assert_eq!(surface.content_height(), layout.height);
    assert_eq!(surface.block_top(3), Some(layout.blocks[3].top));

    surface.set_mode(PreviewMode::Paged);
    assert_eq!(surface.content_height(), paged_height);
}

// =====================================================================
// Persistence
// =====================================================================

#[test]
fn file_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let doc = long_resume();
    {
        let mut store = DocumentStore::load(FileStorage::open(dir.path()).unwrap());
        store.replace(doc.clone()).unwrap();
        store
            .replace_settings(LayoutSettings::new(11, 1.2, 20).unwrap())
            .unwrap();
    }
    let store = DocumentStore::load(FileStorage::open(dir.path()).unwrap());
    assert_eq!(store.document(), &doc);
    assert_eq!(store.settings(), &LayoutSettings::new(11, 1.2, 20).unwrap());
}

#[test]
fn document_without_section_order_is_migrated() {
    let dir = tempfile::tempdir().unwrap();
    let mut value = serde_json::to_value(ResumeData::default()).unwrap();
    value.as_object_mut().unwrap().remove("sectionOrder");
    let mut storage = FileStorage::open(dir.path()).unwrap();
    storage.set(RESUME_DATA_KEY, &value.to_string()).unwrap();

    let store = DocumentStore::load(storage);
    assert_eq!(store.document().section_order, SectionKey::canonical_order());
}

// =====================================================================
// Print pagination and export
// =====================================================================

#[test]
fn print_pages_keep_blocks_whole_and_in_order() {
    let settings = LayoutSettings::default();
    let rendered = render_document(&long_resume(), &SectionRegistry::default());
    let layout = layout_document(&rendered, &settings, &FontManager::default()).unwrap();
    let print = paginate_for_print(&layout, "Alex Chen_Resume");

    assert!(print.page_count() >= 2);
    let placed: Vec<usize> = print
        .pages
        .iter()
        .flat_map(|p| p.blocks.iter().map(|b| b.block_index))
        .collect();
    assert_eq!(placed, (0..layout.blocks.len()).collect::<Vec<_>>());

    let padding = mm_to_px(settings.page_padding as f32);
    for page in &print.pages {
        for (n, placed) in page.blocks.iter().enumerate() {
            let height = layout.blocks[placed.block_index].height;
            if n > 0 {
                assert!(placed.y + height <= PAGE_PIXEL_HEIGHT - padding + 0.01);
            }
        }
    }
}

#[test]
fn pdf_export_of_multi_page_resume() {
    let doc = long_resume();
    let mut session = PreviewSession::new(EngineConfig::default(), FontManager::default());
    session.refresh(&doc, &LayoutSettings::default()).unwrap();
    let expected_pages = session.print_layout(&doc).page_count();

    match session.export(ExportFormat::Pdf, &doc, &mut NoFrames) {
        ExportOutcome::Written(artifact) => {
            assert_eq!(artifact.file_name, "Alex Chen_Resume.pdf");
            assert_valid_pdf(&artifact.bytes);
            assert!(expected_pages >= 2);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(session.surface().mode(), PreviewMode::Paged);
}

#[test]
fn png_export_writes_file() {
    let dir = tempfile::tempdir().unwrap();
    let doc = ResumeData::default();
    let mut session = PreviewSession::new(EngineConfig::default(), FontManager::default());
    session.refresh(&doc, &LayoutSettings::default()).unwrap();

    let artifact = match session.export(ExportFormat::Png, &doc, &mut NoFrames) {
        ExportOutcome::Written(artifact) => artifact,
        other => panic!("unexpected outcome {other:?}"),
    };
    let path = artifact.write_to(dir.path()).unwrap();
    assert!(path.ends_with("Alex Chen_Resume.png"));
    assert_eq!(&std::fs::read(&path).unwrap()[1..4], b"PNG");
}

#[test]
fn raster_is_deterministic() {
    let settings = LayoutSettings::default();
    let rendered = render_document(&ResumeData::default(), &SectionRegistry::default());
    let layout = layout_document(&rendered, &settings, &FontManager::default()).unwrap();
    let digest = |scale: f32| {
        let pixmap = rasterize_continuous(&layout, &FontManager::default(), scale).unwrap();
        Sha256::digest(pixmap.data())
    };
    assert_eq!(digest(1.0), digest(1.0));
    assert_ne!(digest(1.0), digest(2.0));
}
