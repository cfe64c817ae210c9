//! Pagination – reconciles the continuously flowing document with fixed-height
//! A4 pages.
//!
//! Three consumers, three functions:
//! - the page count shown next to the preview ([`estimate_page_count`],
//!   debounced through [`PageCountTracker`])
//! - the screen-only paged preview, which pushes whole blocks down so none
//!   straddles a simulated page boundary ([`simulate_page_breaks`], applied
//!   through [`PreviewSurface`])
//! - print output, where page margins repeat on every page and blocks that
//!   do not fit move to the next page ([`paginate_for_print`])

use log::debug;
use serde::{Deserialize, Serialize};

use crate::layout::DocumentLayout;
use crate::layout_config::{PlacedBlock, PrintLayout, PrintPage};
use crate::settings::{mm_to_px, PageGeometry, PAGE_PIXEL_HEIGHT, PAGE_PIXEL_WIDTH};

/// Sub-pixel slack when comparing content against a page boundary, so that
/// content ending exactly on the boundary is not pushed to a new page.
pub const BOUNDARY_TOLERANCE_PX: f32 = 1.0;

fn finite_non_negative(v: f32) -> f32 {
    if v.is_finite() {
        v.max(0.0)
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Page count
// ---------------------------------------------------------------------------

/// Estimated number of A4 pages for a container `height_px` tall (padding
/// included) with `padding_mm` margins. Always at least 1.
pub fn estimate_page_count(height_px: f32, padding_mm: f32) -> usize {
    let padding_px = mm_to_px(finite_non_negative(padding_mm));
    let content = (finite_non_negative(height_px) - 2.0 * padding_px).max(0.0);
    let effective = (PAGE_PIXEL_HEIGHT - 2.0 * padding_px).max(1.0);
    let pages = ((content - BOUNDARY_TOLERANCE_PX).max(0.0) / effective).ceil();
    (pages as usize).max(1)
}

/// Frame-debounced page count.
///
/// Change notifications only mark the estimate dirty; [`on_frame`] does the
/// work at most once per frame. While an export holds the preview surface
/// the tracker is suspended and frames are ignored.
///
/// [`on_frame`]: PageCountTracker::on_frame
#[derive(Debug, Clone)]
pub struct PageCountTracker {
    pages: usize,
    dirty: bool,
    suspended: bool,
    recomputations: usize,
}

impl Default for PageCountTracker {
    fn default() -> Self {
        Self {
            pages: 1,
            dirty: true,
            suspended: false,
            recomputations: 0,
        }
    }
}

impl PageCountTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content, settings or container size changed.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn suspend(&mut self) {
        self.suspended = true;
    }

    pub fn resume(&mut self) {
        self.suspended = false;
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Last computed page count.
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// How many times the estimate has actually been recomputed.
    pub fn recomputations(&self) -> usize {
        self.recomputations
    }

    /// Animation-frame callback. Returns the new count if it was recomputed.
    ///
    /// The estimate uses the surface's natural height so simulated page gaps
    /// never count as content.
    pub fn on_frame(&mut self, surface: &PreviewSurface, padding_mm: f32) -> Option<usize> {
        if self.suspended || !self.dirty {
            return None;
        }
        self.dirty = false;
        self.recomputations += 1;
        self.pages = estimate_page_count(surface.natural_height(), padding_mm);
        debug!("Page count recomputed: {}", self.pages);
        Some(self.pages)
    }
}

// ---------------------------------------------------------------------------
// Page-break simulation
// ---------------------------------------------------------------------------

/// Natural geometry of one non-splittable block, relative to the container
/// top edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlockGeometry {
    pub top: f32,
    pub height: f32,
}

impl BlockGeometry {
    pub fn new(top: f32, height: f32) -> Self {
        Self {
            top: finite_non_negative(top),
            height: finite_non_negative(height),
        }
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageAssignment {
    pub page_index: usize,
    /// Extra top margin applied to the block, `>= 0`.
    pub shift_px: f32,
}

/// Compute, for blocks given in natural (unshifted) geometry, which simulated
/// page each lands on and how far it must be pushed down so it does not
/// straddle a page boundary.
///
/// A shift moves every later block down by the same amount, so the running
/// total is carried forward. Blocks are never split or reordered.
pub fn simulate_page_breaks(blocks: &[BlockGeometry], geometry: &PageGeometry) -> Vec<PageAssignment> {
    let mut carried = 0.0f32;
    let mut assignments = Vec::with_capacity(blocks.len());

    for block in blocks {
        let top = block.top + carried;
        let bottom = top + block.height;

        let mut page = page_reaching(top, geometry);

        let mut shift_px = 0.0;
        if bottom - BOUNDARY_TOLERANCE_PX > geometry.page_bottom(page) {
            page = page.saturating_add(1);
            let target = geometry.content_top(page);
            if target > top {
                shift_px = target - top;
                carried += shift_px;
            }
        }

        assignments.push(PageAssignment {
            page_index: page,
            shift_px,
        });
    }
    assignments
}

/// First page whose span, gap included, reaches down to `top`.
fn page_reaching(top: f32, geometry: &PageGeometry) -> usize {
    let reach = geometry.page_height_px + geometry.page_gap_px;
    let mut page = ((top - reach) / geometry.stride()).floor().max(0.0) as usize;
    // The estimate is at most one page short; f32 rounding may cost one more.
    for _ in 0..2 {
        if top > geometry.page_bottom(page) + geometry.page_gap_px {
            page = page.saturating_add(1);
        }
    }
    page
}

/// How the preview presents the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewMode {
    /// Simulated A4 pages with gaps.
    #[default]
    Paged,
    /// One unbroken column, as exported.
    Continuous,
}

/// The preview container: natural block geometry plus the top margins
/// currently applied to each block.
#[derive(Debug, Clone)]
pub struct PreviewSurface {
    mode: PreviewMode,
    geometry: PageGeometry,
    blocks: Vec<BlockGeometry>,
    margins: Vec<f32>,
    natural_height: f32,
}

impl PreviewSurface {
    pub fn new(geometry: PageGeometry) -> Self {
        Self {
            mode: PreviewMode::default(),
            geometry,
            blocks: Vec::new(),
            margins: Vec::new(),
            natural_height: 0.0,
        }
    }

    pub fn mode(&self) -> PreviewMode {
        self.mode
    }

    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    /// Switch modes. Leaving paged mode clears every shift before anything
    /// else can measure; entering it re-runs the simulator.
    pub fn set_mode(&mut self, mode: PreviewMode) {
        if self.mode == mode {
            return;
        }
        debug!("Preview mode {:?} -> {:?}", self.mode, mode);
        self.mode = mode;
        match mode {
            PreviewMode::Continuous => self.clear_shifts(),
            PreviewMode::Paged => {
                self.apply_page_breaks();
            }
        }
    }

    /// A fresh layout pass: replace the natural geometry.
    pub fn update_layout(&mut self, layout: &DocumentLayout) {
        self.update_blocks(layout.block_geometry(), layout.height);
    }

    pub fn update_blocks(&mut self, blocks: Vec<BlockGeometry>, natural_height: f32) {
        self.margins = vec![0.0; blocks.len()];
        self.blocks = blocks;
        self.natural_height = finite_non_negative(natural_height);
        if self.mode == PreviewMode::Paged {
            self.apply_page_breaks();
        }
    }

    pub fn set_geometry(&mut self, geometry: PageGeometry) {
        self.geometry = geometry;
        if self.mode == PreviewMode::Paged {
            self.apply_page_breaks();
        }
    }

    /// Reset all margins, then apply the simulator's shifts. Does nothing
    /// beyond the reset in continuous mode.
    pub fn apply_page_breaks(&mut self) -> Vec<PageAssignment> {
        self.clear_shifts();
        if self.mode != PreviewMode::Paged {
            return Vec::new();
        }
        let assignments = simulate_page_breaks(&self.blocks, &self.geometry);
        for (margin, assignment) in self.margins.iter_mut().zip(&assignments) {
            *margin = assignment.shift_px;
        }
        assignments
    }

    pub fn clear_shifts(&mut self) {
        self.margins.iter_mut().for_each(|m| *m = 0.0);
    }

    /// Currently applied top margins, one per block.
    pub fn shifts(&self) -> &[f32] {
        &self.margins
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Measured top of block `index`, including applied shifts.
    pub fn block_top(&self, index: usize) -> Option<f32> {
        let block = self.blocks.get(index)?;
        let shift: f32 = self.margins[..=index].iter().sum();
        Some(block.top + shift)
    }

    /// Measured container height, including applied shifts.
    pub fn content_height(&self) -> f32 {
        self.natural_height + self.margins.iter().sum::<f32>()
    }

    /// Container height in unbroken flow.
    pub fn natural_height(&self) -> f32 {
        self.natural_height
    }
}

// ---------------------------------------------------------------------------
// Print pagination
// ---------------------------------------------------------------------------

/// Place blocks on physical pages whose usable span is
/// `[padding, page_height - padding)`, mirroring a print table whose header
/// and footer spacer rows repeat on every page.
///
/// A block that does not fit on the current page starts the next one; a block
/// taller than a page gets a page to itself and overflows it.
pub fn paginate_blocks(blocks: &[BlockGeometry], padding_px: f32) -> Vec<PrintPage> {
    let padding = finite_non_negative(padding_px);
    let content_height = (PAGE_PIXEL_HEIGHT - 2.0 * padding).max(1.0);

    let mut pages = Vec::new();
    let mut current = PrintPage::new(0);

    // Container y at which the current page's content begins, so
    // `top - page_start` is the block's offset within the page content.
    let mut page_start = padding;

    for (block_index, block) in blocks.iter().enumerate() {
        let y_on_page = (block.top - page_start).max(0.0);
        if y_on_page + block.height > content_height && !current.blocks.is_empty() {
            let next = PrintPage::new(pages.len() + 1);
            pages.push(std::mem::replace(&mut current, next));
            page_start = block.top;
        }
        let y_on_page = (block.top - page_start).max(0.0);
        current.blocks.push(PlacedBlock {
            block_index,
            y: padding + y_on_page,
        });
    }

    pages.push(current);
    pages
}

/// Paginate a laid-out document for print.
pub fn paginate_for_print(layout: &DocumentLayout, title: &str) -> PrintLayout {
    let pages = paginate_blocks(&layout.block_geometry(), layout.padding);
    debug!("Print layout: {} pages", pages.len());
    PrintLayout {
        title: title.to_string(),
        page_width_px: PAGE_PIXEL_WIDTH,
        page_height_px: PAGE_PIXEL_HEIGHT,
        padding_px: layout.padding,
        pages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(padding: f32) -> PageGeometry {
        PageGeometry::new(1000.0, 20.0, padding)
    }

    #[test]
    fn page_count_examples() {
        assert_eq!(estimate_page_count(1123.0, 14.0), 1);
        assert_eq!(estimate_page_count(2100.0, 14.0), 2);
    }

    #[test]
    fn page_count_never_below_one() {
        assert_eq!(estimate_page_count(0.0, 20.0), 1);
        assert_eq!(estimate_page_count(-50.0, 20.0), 1);
        assert_eq!(estimate_page_count(f32::NAN, 20.0), 1);
        // Padding larger than half the page clamps the divisor to 1.
        assert!(estimate_page_count(2000.0, 400.0) >= 1);
    }

    #[test]
    fn page_count_is_monotone() {
        for padding in (10..=24).step_by(2) {
            let mut last = 0;
            let mut h = 0.0;
            while h < 6000.0 {
                let pages = estimate_page_count(h, padding as f32);
                assert!(pages >= last, "h={h} padding={padding}");
                last = pages;
                h += 7.5;
            }
        }
    }

    #[test]
    fn exact_page_boundary_is_not_an_extra_page() {
        let padding_px = mm_to_px(20.0);
        let effective = PAGE_PIXEL_HEIGHT - 2.0 * padding_px;
        let two_pages = 2.0 * effective + 2.0 * padding_px;
        assert_eq!(estimate_page_count(two_pages, 20.0), 2);
        assert_eq!(estimate_page_count(two_pages + 5.0, 20.0), 3);
    }

    #[test]
    fn block_inside_page_is_not_shifted() {
        let blocks = [BlockGeometry::new(50.0, 100.0), BlockGeometry::new(200.0, 300.0)];
        let assignments = simulate_page_breaks(&blocks, &geometry(50.0));
        assert!(assignments.iter().all(|a| a.shift_px == 0.0 && a.page_index == 0));
    }

    #[test]
    fn straddling_block_moves_to_next_page_content_top() {
        let g = geometry(50.0);
        let blocks = [BlockGeometry::new(50.0, 900.0), BlockGeometry::new(950.0, 100.0)];
        let assignments = simulate_page_breaks(&blocks, &g);
        assert_eq!(assignments[1].page_index, 1);
        let new_top = blocks[1].top + assignments[1].shift_px;
        assert_eq!(new_top, 1.0 * (1000.0 + 20.0) + 50.0);
    }

    #[test]
    fn shifts_carry_into_later_blocks() {
        let g = geometry(50.0);
        let blocks = [
            BlockGeometry::new(950.0, 100.0),
            BlockGeometry::new(1050.0, 100.0),
        ];
        let assignments = simulate_page_breaks(&blocks, &g);
        assert_eq!(assignments[0].shift_px, 1070.0 - 950.0);
        // Second block rides along: 1050 + 120 = 1170, inside page 1.
        assert_eq!(assignments[1].shift_px, 0.0);
        assert_eq!(assignments[1].page_index, 1);
    }

    #[test]
    fn bottom_within_tolerance_stays() {
        let blocks = [BlockGeometry::new(900.0, 100.5)];
        let assignments = simulate_page_breaks(&blocks, &geometry(50.0));
        assert_eq!(assignments[0].shift_px, 0.0);
    }

    #[test]
    fn block_in_gap_is_pushed_to_next_page() {
        let blocks = [BlockGeometry::new(1010.0, 40.0)];
        let assignments = simulate_page_breaks(&blocks, &geometry(50.0));
        assert_eq!(assignments[0].page_index, 1);
        assert_eq!(assignments[0].shift_px, 1070.0 - 1010.0);
    }

    #[test]
    fn oversized_block_does_not_loop() {
        let blocks = [BlockGeometry::new(10.0, 5000.0), BlockGeometry::new(5010.0, 10.0)];
        let assignments = simulate_page_breaks(&blocks, &geometry(0.0));
        assert_eq!(assignments.len(), 2);
        assert!(assignments.iter().all(|a| a.shift_px >= 0.0));
    }

    #[test]
    fn far_down_blocks_find_their_page_directly() {
        let g = geometry(50.0);
        let blocks = [BlockGeometry::new(5.0 * 1020.0 + 60.0, 100.0)];
        assert_eq!(simulate_page_breaks(&blocks, &g)[0].page_index, 5);

        let blocks = [BlockGeometry::new(1e12, 10.0), BlockGeometry::new(1e30, 10.0)];
        let assignments = simulate_page_breaks(&blocks, &g);
        assert_eq!(assignments.len(), 2);
        assert!(assignments[0].page_index > 900_000_000);
        assert!(assignments[1].page_index >= assignments[0].page_index);
    }

    #[test]
    fn surface_reapplying_is_idempotent() {
        let mut surface = PreviewSurface::new(geometry(50.0));
        surface.update_blocks(
            vec![BlockGeometry::new(50.0, 900.0), BlockGeometry::new(950.0, 100.0)],
            1100.0,
        );
        let first = surface.shifts().to_vec();
        surface.apply_page_breaks();
        assert_eq!(surface.shifts(), first.as_slice());
        assert_eq!(surface.block_top(1), Some(1070.0));
    }

    #[test]
    fn continuous_mode_resets_shifts() {
        let mut surface = PreviewSurface::new(geometry(50.0));
        surface.update_blocks(
            vec![BlockGeometry::new(50.0, 900.0), BlockGeometry::new(950.0, 100.0)],
            1100.0,
        );
        assert!(surface.content_height() > surface.natural_height());

        surface.set_mode(PreviewMode::Continuous);
        assert!(surface.shifts().iter().all(|s| *s == 0.0));
        assert_eq!(surface.block_top(1), Some(950.0));
        assert_eq!(surface.content_height(), 1100.0);

        surface.set_mode(PreviewMode::Paged);
        assert_eq!(surface.block_top(1), Some(1070.0));
    }

    #[test]
    fn tracker_recomputes_once_per_frame() {
        let mut surface = PreviewSurface::new(geometry(50.0));
        surface.update_blocks(vec![BlockGeometry::new(50.0, 2000.0)], 2100.0);
        let mut tracker = PageCountTracker::new();

        tracker.mark_dirty();
        tracker.mark_dirty();
        tracker.mark_dirty();
        assert_eq!(tracker.on_frame(&surface, 14.0), Some(2));
        assert_eq!(tracker.on_frame(&surface, 14.0), None);
        assert_eq!(tracker.recomputations(), 1);
    }

    #[test]
    fn tracker_ignores_frames_while_suspended() {
        let surface = PreviewSurface::new(geometry(50.0));
        let mut tracker = PageCountTracker::new();
        tracker.suspend();
        tracker.mark_dirty();
        assert_eq!(tracker.on_frame(&surface, 14.0), None);
        tracker.resume();
        assert_eq!(tracker.on_frame(&surface, 14.0), Some(1));
    }

    #[test]
    fn print_pages_never_split_blocks() {
        let padding = 50.0;
        let blocks: Vec<_> = (0..10)
            .map(|i| BlockGeometry::new(padding + i as f32 * 210.0, 200.0))
            .collect();
        let pages = paginate_blocks(&blocks, padding);
        assert!(pages.len() >= 2);
        let usable_bottom = PAGE_PIXEL_HEIGHT - padding;
        for page in &pages {
            for placed in &page.blocks {
                assert!(placed.y >= padding);
                assert!(placed.y + blocks[placed.block_index].height <= usable_bottom);
            }
        }
        let placed: usize = pages.iter().map(|p| p.blocks.len()).sum();
        assert_eq!(placed, blocks.len());
        assert_eq!(pages[1].blocks[0].y, padding);
    }

    #[test]
    fn empty_document_prints_one_page() {
        let pages = paginate_blocks(&[], 40.0);
        assert_eq!(pages.len(), 1);
        assert!(pages[0].blocks.is_empty());
    }
}
