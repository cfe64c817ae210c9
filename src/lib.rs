//! # cv-forge – resume document model, A4 pagination and export
//!
//! This crate holds everything behind a live resume editor except the
//! widgets. The stages are:
//!
//! 1. **Model** – the resume document and its persistence ([`model`], [`store`])
//! 2. **Edit** – pure editing operations and rich text ([`edit`], [`richtext`], [`dom`])
//! 3. **Render** – document → styled blocks and HTML ([`sections`], [`preview`])
//! 4. **Layout** – compute block geometry with Taffy ([`layout`])
//! 5. **Paginate** – page-count estimate, paged-preview shifts and print pages ([`pagination`])
//! 6. **Export** – PNG/PDF rasters via tiny-skia and printpdf ([`raster`], [`render`], [`export`])
//!
//! [`pipeline`] ties the stages into a preview session.

pub mod dom;
pub mod edit;
pub mod error;
pub mod export;
pub mod fonts;
pub mod layout;
pub mod layout_config;
pub mod model;
pub mod pagination;
pub mod pipeline;
pub mod preview;
pub mod raster;
pub mod render;
pub mod richtext;
pub mod sections;
pub mod settings;
pub mod store;

// Re-exports for convenience
pub use error::{Error, Result};
pub use model::ResumeData;
pub use pagination::{estimate_page_count, simulate_page_breaks, PreviewMode};
pub use pipeline::{page_count, print_layout, render_and_layout, EngineConfig, PreviewSession};
pub use settings::LayoutSettings;
