//! Pipeline – ties together rendering, layout, pagination and export into a
//! preview session and a handful of one-call helpers.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::export::{
    print_document, ExportArtifact, ExportFormat, ExportJob, ExportOutcome, Exporter,
    FrameTicker, LogNotifier, Notifier,
};
use crate::fonts::{FontKey, FontManager};
use crate::layout::{layout_document, DocumentLayout};
use crate::layout_config::PrintLayout;
use crate::model::ResumeData;
use crate::pagination::{
    estimate_page_count, paginate_for_print, PageCountTracker, PreviewMode, PreviewSurface,
};
use crate::preview::{render_document, RenderedDocument};
use crate::sections::SectionRegistry;
use crate::settings::{LayoutSettings, DEFAULT_PAGE_GAP_PX};

/// Engine configuration, optionally read from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Visual gap between simulated pages in the paged preview (default: 24).
    pub page_gap_px: f32,
    /// Device pixels per CSS pixel for PNG/PDF rasters (default: 2).
    pub raster_scale: f32,
    /// Regular TTF/OTF face used to draw text in rasters.
    pub font_path: Option<PathBuf>,
    /// Bold face; falls back to the regular face.
    pub bold_font_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_gap_px: DEFAULT_PAGE_GAP_PX,
            raster_scale: 2.0,
            font_path: None,
            bold_font_path: None,
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        debug!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Load the configured faces. No configured face means heuristic metrics.
    pub fn load_fonts(&self) -> Result<FontManager> {
        let mut fonts = FontManager::new();
        if let Some(path) = &self.font_path {
            fonts.load_file(path)?;
        }
        if let Some(path) = &self.bold_font_path {
            let bytes = fs::read(path)?;
            fonts.load_font(FontKey { bold: true, italic: false }, bytes)?;
        }
        Ok(fonts)
    }
}

/// Render and lay out a document in one step.
pub fn render_and_layout(
    doc: &ResumeData,
    settings: &LayoutSettings,
    fonts: &FontManager,
) -> Result<(RenderedDocument, DocumentLayout)> {
    let rendered = render_document(doc, &SectionRegistry::default());
    let layout = layout_document(&rendered, settings, fonts)?;
    Ok((rendered, layout))
}

/// Estimated page count of a document.
pub fn page_count(doc: &ResumeData, settings: &LayoutSettings, fonts: &FontManager) -> Result<usize> {
    let (_, layout) = render_and_layout(doc, settings, fonts)?;
    Ok(estimate_page_count(layout.height, settings.page_padding as f32))
}

/// The print layout of a document.
pub fn print_layout(doc: &ResumeData, settings: &LayoutSettings, fonts: &FontManager) -> Result<PrintLayout> {
    let (_, layout) = render_and_layout(doc, settings, fonts)?;
    Ok(paginate_for_print(&layout, &doc.export_stem()))
}

/// Everything the preview pane holds between edits: the rendered blocks,
/// their layout, the paged surface and the page count.
pub struct PreviewSession {
    registry: SectionRegistry,
    fonts: FontManager,
    config: EngineConfig,
    settings: LayoutSettings,
    rendered: RenderedDocument,
    layout: DocumentLayout,
    surface: PreviewSurface,
    tracker: PageCountTracker,
    exporter: Exporter,
}

impl PreviewSession {
    pub fn new(config: EngineConfig, fonts: FontManager) -> Self {
        Self::with_notifier(config, fonts, Box::new(LogNotifier))
    }

    pub fn with_notifier(config: EngineConfig, fonts: FontManager, notifier: Box<dyn Notifier>) -> Self {
        let settings = LayoutSettings::default();
        let surface = PreviewSurface::new(settings.page_geometry(config.page_gap_px));
        let exporter = Exporter::new(config.raster_scale, notifier);
        Self {
            registry: SectionRegistry::default(),
            fonts,
            config,
            settings,
            rendered: RenderedDocument::default(),
            layout: DocumentLayout {
                width: 0.0,
                height: 0.0,
                padding: 0.0,
                blocks: Vec::new(),
            },
            surface,
            tracker: PageCountTracker::new(),
            exporter,
        }
    }

    /// Re-render after a document or settings change.
    pub fn refresh(&mut self, doc: &ResumeData, settings: &LayoutSettings) -> Result<()> {
        self.rendered = render_document(doc, &self.registry);
        self.layout = layout_document(&self.rendered, settings, &self.fonts)?;
        if *settings != self.settings {
            self.settings = *settings;
            self.surface
                .set_geometry(settings.page_geometry(self.config.page_gap_px));
        }
        self.surface.update_layout(&self.layout);
        self.tracker.mark_dirty();
        Ok(())
    }

    /// Animation-frame hook; returns the page count when it changed.
    pub fn on_frame(&mut self) -> Option<usize> {
        self.tracker
            .on_frame(&self.surface, self.settings.page_padding as f32)
    }

    pub fn page_count(&self) -> usize {
        self.tracker.pages()
    }

    pub fn set_mode(&mut self, mode: PreviewMode) {
        self.surface.set_mode(mode);
        self.tracker.mark_dirty();
    }

    pub fn surface(&self) -> &PreviewSurface {
        &self.surface
    }

    pub fn layout(&self) -> &DocumentLayout {
        &self.layout
    }

    pub fn rendered(&self) -> &RenderedDocument {
        &self.rendered
    }

    pub fn fonts(&self) -> &FontManager {
        &self.fonts
    }

    pub fn export(&mut self, format: ExportFormat, doc: &ResumeData, frames: &mut dyn FrameTicker) -> ExportOutcome {
        let job = ExportJob {
            document: doc,
            layout: &self.layout,
            fonts: &self.fonts,
        };
        let outcome = self
            .exporter
            .export(format, &job, &mut self.surface, &mut self.tracker, frames);
        if let ExportOutcome::Written(artifact) = &outcome {
            info!("Exported {}", artifact.file_name);
        }
        outcome
    }

    pub fn print(&self, doc: &ResumeData) -> ExportArtifact {
        print_document(doc, &self.rendered, &self.settings)
    }

    pub fn print_layout(&self, doc: &ResumeData) -> PrintLayout {
        paginate_for_print(&self.layout, &doc.export_stem())
    }
}
