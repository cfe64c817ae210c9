//! Print layout – the frozen result of print pagination. Encodes exactly
//! which block goes on which physical page and where, so that rendering a
//! PDF needs no further layout decisions.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A complete print layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintLayout {
    /// Document title embedded in the PDF metadata.
    #[serde(default = "PrintLayout::default_title")]
    pub title: String,
    /// Page width in CSS pixels.
    pub page_width_px: f32,
    /// Page height in CSS pixels.
    pub page_height_px: f32,
    /// Spacer height repeated at the top and bottom of every page.
    pub padding_px: f32,
    /// Ordered list of pages. Never empty.
    pub pages: Vec<PrintPage>,
}

/// One physical page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintPage {
    pub page_index: usize,
    pub blocks: Vec<PlacedBlock>,
}

/// A block placed on a page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedBlock {
    /// Index into the laid-out document's blocks.
    pub block_index: usize,
    /// Top of the block relative to the page's top edge.
    pub y: f32,
}

impl PrintPage {
    pub fn new(page_index: usize) -> Self {
        Self {
            page_index,
            blocks: Vec::new(),
        }
    }
}

impl PrintLayout {
    fn default_title() -> String {
        "Resume".to_string()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Serialise to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialise from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip() {
        let layout = PrintLayout {
            title: "Alex Chen_Resume".into(),
            page_width_px: 794.0,
            page_height_px: 1123.0,
            padding_px: 75.6,
            pages: vec![PrintPage {
                page_index: 0,
                blocks: vec![PlacedBlock {
                    block_index: 0,
                    y: 75.6,
                }],
            }],
        };
        let json = layout.to_json().unwrap();
        assert!(json.contains("\"blockIndex\": 0"));
        assert_eq!(PrintLayout::from_json(&json).unwrap(), layout);
    }

    #[test]
    fn missing_title_gets_default() {
        let json = r#"{"pageWidthPx":794,"pageHeightPx":1123,"paddingPx":0,"pages":[]}"#;
        let layout = PrintLayout::from_json(json).unwrap();
        assert_eq!(layout.title, "Resume");
        assert_eq!(layout.page_count(), 0);
    }
}
