//! PDF renderer – rasterizes every page of a [`PrintLayout`] and embeds each
//! raster as a full-page image using `printpdf` (v0.8 ops-based API).

use printpdf::*;

use crate::error::{Error, Result};
use crate::fonts::FontManager;
use crate::layout::DocumentLayout;
use crate::layout_config::PrintLayout;
use crate::raster::{encode_png, rasterize_page};
use crate::settings::{A4_HEIGHT_MM, A4_WIDTH_MM};

/// PDF points per millimetre.
const PT_PER_MM: f32 = 72.0 / 25.4;

/// Build a PDF with one A4 page per PNG, each image stretched to the full
/// page.
pub fn render_pdf(title: &str, page_pngs: &[Vec<u8>]) -> Result<Vec<u8>> {
    let page_w = Mm(A4_WIDTH_MM);
    let page_h = Mm(A4_HEIGHT_MM);
    let page_w_pt = A4_WIDTH_MM * PT_PER_MM;
    let page_h_pt = A4_HEIGHT_MM * PT_PER_MM;

    let mut doc = PdfDocument::new(title);
    let mut warnings: Vec<PdfWarnMsg> = Vec::new();
    let mut pages = Vec::with_capacity(page_pngs.len().max(1));

    for (index, png) in page_pngs.iter().enumerate() {
        let raw = RawImage::decode_from_bytes(png, &mut warnings)
            .map_err(|e| Error::Pdf(format!("page {index}: {e}")))?;
        let (px_width, px_height) = (raw.width, raw.height);
        let xobj_id = doc.add_image(&raw);

        // At dpi=72 printpdf renders 1 px = 1 pt.
        let scale_x = if px_width > 0 {
            page_w_pt / px_width as f32
        } else {
            1.0
        };
        let scale_y = if px_height > 0 {
            page_h_pt / px_height as f32
        } else {
            1.0
        };

        let ops = vec![Op::UseXobject {
            id: xobj_id,
            transform: XObjectTransform {
                translate_x: Some(Pt(0.0)),
                translate_y: Some(Pt(0.0)),
                dpi: Some(72.0),
                scale_x: Some(scale_x),
                scale_y: Some(scale_y),
                rotate: None,
            },
        }];
        pages.push(PdfPage::new(page_w, page_h, ops));
    }

    for warning in &warnings {
        log::warn!("PDF image warning: {warning:?}");
    }

    // Ensure at least one page.
    if pages.is_empty() {
        pages.push(PdfPage::new(page_w, page_h, Vec::new()));
    }

    doc.with_pages(pages);
    Ok(doc.save(&PdfSaveOptions::default(), &mut Vec::new()))
}

/// Rasterize every print page at `scale` and assemble the PDF.
pub fn render_print_layout(
    layout: &DocumentLayout,
    print: &PrintLayout,
    fonts: &FontManager,
    scale: f32,
) -> Result<Vec<u8>> {
    let mut pngs = Vec::with_capacity(print.pages.len());
    for page in &print.pages {
        let pixmap = rasterize_page(layout, print, page, fonts, scale)?;
        pngs.push(encode_png(&pixmap)?);
    }
    log::info!("Assembling PDF '{}' with {} pages", print.title, pngs.len());
    render_pdf(&print.title, &pngs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_empty_document() {
        let bytes = render_pdf("empty", &[]).unwrap();
        assert!(bytes.len() > 100, "PDF should have content");
        // PDF magic number
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn garbage_png_is_a_pdf_error() {
        let err = render_pdf("bad", &[vec![1, 2, 3]]);
        assert!(matches!(err, Err(Error::Pdf(_))));
    }
}
