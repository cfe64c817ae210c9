use thiserror::Error;

/// Crate-level error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid layout setting: {0}")]
    InvalidSetting(String),

    #[error("Refusing unsafe link target: {0}")]
    UnsafeLink(String),

    #[error("Unknown section: {0}")]
    UnknownSection(String),

    #[error("Section {0} has no entry list")]
    NotAList(String),

    #[error("Index {index} out of range for {len} items")]
    OutOfRange { index: usize, len: usize },

    #[error("No entry with id {id} in section {section}")]
    EntryNotFound { section: String, id: String },

    #[error("Section {section} entries have no field {field}")]
    NoSuchField { section: String, field: String },

    #[error("Layout error: {0}")]
    Layout(String),

    #[error("Font error: {0}")]
    Font(String),

    #[error("Raster error: {0}")]
    Raster(String),

    #[error("PDF error: {0}")]
    Pdf(String),
}

pub type Result<T> = std::result::Result<T, Error>;
