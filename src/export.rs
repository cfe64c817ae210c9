//! Export – PNG and PDF rasterization of the preview, and the print document.
//!
//! An export borrows the preview surface: it switches it to continuous mode
//! so no simulated page gaps are captured, lets two frames pass for the
//! re-render to settle, rasterizes, and then restores the previous mode. The
//! restore lives in a guard's `Drop`, so it also happens when rasterization
//! fails. Only one export runs at a time; a request while busy is skipped.

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};

use log::{error, info, warn};

use crate::error::Result;
use crate::fonts::FontManager;
use crate::layout::DocumentLayout;
use crate::model::ResumeData;
use crate::pagination::{paginate_for_print, PageCountTracker, PreviewMode, PreviewSurface};
use crate::preview::{render_html, HtmlTarget, RenderedDocument};
use crate::raster::{encode_png, rasterize_continuous};
use crate::render::render_print_layout;
use crate::settings::LayoutSettings;

/// Shown when an export fails.
pub const EXPORT_FAILURE_MESSAGE: &str =
    "Could not generate the file. Please use Print and save as PDF instead.";

/// Frames to wait after switching modes before measuring.
const SETTLE_FRAMES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Png,
    Pdf,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Pdf => "pdf",
        }
    }
}

/// `{name}_Resume.{ext}`
pub fn export_file_name(doc: &ResumeData, extension: &str) -> String {
    format!("{}.{}", doc.export_stem(), extension)
}

/// User-facing alerts.
pub trait Notifier {
    fn alert(&self, message: &str);
}

/// Notifier for headless use: alerts go to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn alert(&self, message: &str) {
        warn!("{message}");
    }
}

/// Called once per animation frame while an export waits for the preview
/// to settle.
pub trait FrameTicker {
    fn tick(&mut self, surface: &PreviewSurface);
}

/// Frames pass without side effects.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFrames;

impl FrameTicker for NoFrames {
    fn tick(&mut self, _surface: &PreviewSurface) {}
}

/// A finished export, not yet written anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ExportArtifact {
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(&self.file_name);
        fs::write(&path, &self.bytes)?;
        info!("Wrote {} ({} bytes)", path.display(), self.bytes.len());
        Ok(path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Written(ExportArtifact),
    /// Another export was already running.
    Skipped,
    /// Rasterization or assembly failed; the user has been alerted.
    Failed(String),
}

/// What to export.
pub struct ExportJob<'a> {
    pub document: &'a ResumeData,
    pub layout: &'a DocumentLayout,
    pub fonts: &'a FontManager,
}

/// Puts the surface back the way it was and clears the busy flag.
struct SurfaceGuard<'a> {
    surface: &'a mut PreviewSurface,
    tracker: &'a mut PageCountTracker,
    previous: PreviewMode,
    busy: &'a Cell<bool>,
}

impl Drop for SurfaceGuard<'_> {
    fn drop(&mut self) {
        self.surface.set_mode(self.previous);
        self.tracker.resume();
        self.tracker.mark_dirty();
        self.busy.set(false);
    }
}

pub struct Exporter {
    busy: Cell<bool>,
    scale: f32,
    notifier: Box<dyn Notifier>,
}

impl Exporter {
    pub fn new(scale: f32, notifier: Box<dyn Notifier>) -> Self {
        Self {
            busy: Cell::new(false),
            scale: if scale.is_finite() && scale > 0.0 { scale } else { 1.0 },
            notifier,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.get()
    }

    pub fn export(
        &self,
        format: ExportFormat,
        job: &ExportJob<'_>,
        surface: &mut PreviewSurface,
        tracker: &mut PageCountTracker,
        frames: &mut dyn FrameTicker,
    ) -> ExportOutcome {
        if self.busy.replace(true) {
            info!("Export already in progress, ignoring {format:?} request");
            return ExportOutcome::Skipped;
        }

        let previous = surface.mode();
        tracker.suspend();
        let guard = SurfaceGuard {
            surface,
            tracker,
            previous,
            busy: &self.busy,
        };
        guard.surface.set_mode(PreviewMode::Continuous);
        for _ in 0..SETTLE_FRAMES {
            frames.tick(guard.surface);
        }
        debug_assert!(guard.surface.shifts().iter().all(|s| *s == 0.0));

        let result = self.rasterize(format, job);
        drop(guard);

        match result {
            Ok(bytes) => ExportOutcome::Written(ExportArtifact {
                file_name: export_file_name(job.document, format.extension()),
                bytes,
            }),
            Err(e) => {
                error!("{format:?} generation error: {e}");
                self.notifier.alert(EXPORT_FAILURE_MESSAGE);
                ExportOutcome::Failed(e.to_string())
            }
        }
    }

    fn rasterize(&self, format: ExportFormat, job: &ExportJob<'_>) -> Result<Vec<u8>> {
        match format {
            ExportFormat::Png => {
                let pixmap = rasterize_continuous(job.layout, job.fonts, self.scale)?;
                encode_png(&pixmap)
            }
            ExportFormat::Pdf => {
                let print = paginate_for_print(job.layout, &job.document.export_stem());
                render_print_layout(job.layout, &print, job.fonts, self.scale)
            }
        }
    }
}

/// The print document: HTML whose margins repeat on every physical page.
pub fn print_document(
    doc: &ResumeData,
    rendered: &RenderedDocument,
    settings: &LayoutSettings,
) -> ExportArtifact {
    let html = render_html(rendered, settings, &doc.export_stem(), HtmlTarget::Print);
    ExportArtifact {
        file_name: export_file_name(doc, "html"),
        bytes: html.into_bytes(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::layout_document;
    use crate::preview::render_document;
    use crate::sections::SectionRegistry;
    use crate::settings::PageGeometry;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Collect(Rc<RefCell<Vec<String>>>);

    impl Notifier for Collect {
        fn alert(&self, message: &str) {
            self.0.borrow_mut().push(message.to_string());
        }
    }

    fn fixture() -> (ResumeData, DocumentLayout, PreviewSurface) {
        let doc = ResumeData::default();
        let settings = LayoutSettings::default();
        let rendered = render_document(&doc, &SectionRegistry::default());
        let layout = layout_document(&rendered, &settings, &FontManager::default()).unwrap();
        let mut surface = PreviewSurface::new(PageGeometry::default());
        surface.update_layout(&layout);
        (doc, layout, surface)
    }

    #[test]
    fn png_export_restores_paged_mode() {
        let (doc, layout, mut surface) = fixture();
        let mut tracker = PageCountTracker::new();
        let fonts = FontManager::default();
        let exporter = Exporter::new(2.0, Box::new(LogNotifier));
        let job = ExportJob {
            document: &doc,
            layout: &layout,
            fonts: &fonts,
        };

        struct Watch(Vec<PreviewMode>);
        impl FrameTicker for Watch {
            fn tick(&mut self, surface: &PreviewSurface) {
                self.0.push(surface.mode());
            }
        }
        let mut watch = Watch(Vec::new());

        let outcome = exporter.export(ExportFormat::Png, &job, &mut surface, &mut tracker, &mut watch);
        match outcome {
            ExportOutcome::Written(artifact) => {
                assert_eq!(artifact.file_name, "Alex Chen_Resume.png");
                assert_eq!(&artifact.bytes[1..4], b"PNG");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(watch.0, vec![PreviewMode::Continuous; 2]);
        assert_eq!(surface.mode(), PreviewMode::Paged);
        assert!(!exporter.is_busy());
        assert!(!tracker.is_suspended());
    }

    #[test]
    fn request_while_busy_is_skipped() {
        let (doc, layout, mut surface) = fixture();
        let mut tracker = PageCountTracker::new();
        let fonts = FontManager::default();
        let exporter = Rc::new(Exporter::new(1.0, Box::new(LogNotifier)));
        let job = ExportJob {
            document: &doc,
            layout: &layout,
            fonts: &fonts,
        };

        struct Reenter<'a> {
            exporter: Rc<Exporter>,
            job: &'a ExportJob<'a>,
            seen: Vec<ExportOutcome>,
        }
        impl FrameTicker for Reenter<'_> {
            fn tick(&mut self, surface: &PreviewSurface) {
                let mut scratch = surface.clone();
                let mut tracker = PageCountTracker::new();
                let outcome = self.exporter.export(
                    ExportFormat::Pdf,
                    self.job,
                    &mut scratch,
                    &mut tracker,
                    &mut NoFrames,
                );
                self.seen.push(outcome);
            }
        }
        let mut reenter = Reenter {
            exporter: exporter.clone(),
            job: &job,
            seen: Vec::new(),
        };

        let outcome = exporter.export(ExportFormat::Png, &job, &mut surface, &mut tracker, &mut reenter);
        assert!(matches!(outcome, ExportOutcome::Written(_)));
        assert_eq!(reenter.seen, vec![ExportOutcome::Skipped, ExportOutcome::Skipped]);
        assert!(!exporter.is_busy());
    }

    #[test]
    fn failure_alerts_once_and_restores_mode() {
        let (doc, mut layout, mut surface) = fixture();
        // No pixmap that tall can be allocated.
        layout.height = f32::MAX;
        let alerts = Rc::new(RefCell::new(Vec::new()));
        let exporter = Exporter::new(2.0, Box::new(Collect(alerts.clone())));
        let fonts = FontManager::default();
        let job = ExportJob {
            document: &doc,
            layout: &layout,
            fonts: &fonts,
        };
        let mut tracker = PageCountTracker::new();

        let outcome = exporter.export(ExportFormat::Png, &job, &mut surface, &mut tracker, &mut NoFrames);
        assert!(matches!(outcome, ExportOutcome::Failed(_)));
        assert_eq!(alerts.borrow().as_slice(), [EXPORT_FAILURE_MESSAGE.to_string()]);
        assert_eq!(surface.mode(), PreviewMode::Paged);
        assert!(!exporter.is_busy());
    }

    #[test]
    fn continuous_mode_is_kept_after_export() {
        let (doc, layout, mut surface) = fixture();
        surface.set_mode(PreviewMode::Continuous);
        let fonts = FontManager::default();
        let exporter = Exporter::new(1.0, Box::new(LogNotifier));
        let job = ExportJob {
            document: &doc,
            layout: &layout,
            fonts: &fonts,
        };
        let mut tracker = PageCountTracker::new();
        exporter.export(ExportFormat::Pdf, &job, &mut surface, &mut tracker, &mut NoFrames);
        assert_eq!(surface.mode(), PreviewMode::Continuous);
    }

    #[test]
    fn print_document_is_named_after_the_resume() {
        let doc = ResumeData::default();
        let rendered = render_document(&doc, &SectionRegistry::default());
        let artifact = print_document(&doc, &rendered, &LayoutSettings::default());
        assert_eq!(artifact.file_name, "Alex Chen_Resume.html");
        let html = String::from_utf8(artifact.bytes).unwrap();
        assert!(html.contains("table-header-group"));
    }
}
