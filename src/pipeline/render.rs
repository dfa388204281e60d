//! PDF rasterisation and text-layer extraction via pdfium.
//!
//! Every page is rendered once per request at `dpi / 72` scale, so one
//! PDF point maps to exactly `dpi / 72` raster pixels and the geometry in
//! [`crate::pipeline::geometry`] lines up with the pixels. The same pass reads
//! the page's text segments (tokens) and flips their bottom-left-origin
//! bounds into the top-left origin the layout segments use.
//!
//! pdfium is not async-safe, so all of it runs inside `spawn_blocking`.

use crate::error::Pdf2MarkupError;
use crate::segment::{BoundingBox, Segment};
use image::RgbImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Share of a token's area that must fall inside a segment for the token to
/// belong to it.
pub const TOKEN_OVERLAP_PERCENT: f32 = 50.0;

/// One raster per page, 1-indexed, all at the same DPI.
#[derive(Debug, Clone, Default)]
pub struct PageRasters {
    pub dpi: u32,
    pages: Vec<RgbImage>,
}

impl PageRasters {
    pub fn new(dpi: u32, pages: Vec<RgbImage>) -> Self {
        Self { dpi, pages }
    }

    /// Raster for a 1-indexed page number.
    pub fn get(&self, page_number: usize) -> Option<&RgbImage> {
        page_number.checked_sub(1).and_then(|i| self.pages.get(i))
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// A text-layer token in page points, top-left origin.
#[derive(Debug, Clone, PartialEq)]
pub struct TextToken {
    pub text: String,
    pub bbox: BoundingBox,
}

/// Text-layer tokens per page, 1-indexed.
#[derive(Debug, Clone, Default)]
pub struct PageTokens {
    pages: Vec<Vec<TextToken>>,
}

impl PageTokens {
    pub fn new(pages: Vec<Vec<TextToken>>) -> Self {
        Self { pages }
    }

    pub fn page(&self, page_number: usize) -> &[TextToken] {
        page_number
            .checked_sub(1)
            .and_then(|i| self.pages.get(i))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Tokens of `segment`'s page whose area lies more than half inside the
    /// segment box, in text-layer order.
    pub fn tokens_in(&self, segment: &Segment) -> Vec<&TextToken> {
        self.page(segment.page_number)
            .iter()
            .filter(|t| {
                t.bbox.intersection_percentage(&segment.bounding_box) > TOKEN_OVERLAP_PERCENT
            })
            .collect()
    }
}

/// Rasters and tokens for the whole document.
#[derive(Debug, Clone, Default)]
pub struct RenderedDocument {
    pub rasters: PageRasters,
    pub tokens: PageTokens,
}

/// Render every page of the PDF and read its text layer.
pub async fn render_document(
    pdf_path: &Path,
    dpi: u32,
    password: Option<&str>,
) -> Result<RenderedDocument, Pdf2MarkupError> {
    let path = pdf_path.to_path_buf();
    let password = password.map(str::to_string);

    tokio::task::spawn_blocking(move || render_document_blocking(&path, dpi, password.as_deref()))
        .await
        .map_err(|e| Pdf2MarkupError::Internal(format!("Render task panicked: {}", e)))?
}

fn bind_pdfium() -> Result<Pdfium, Pdf2MarkupError> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| Pdf2MarkupError::Internal(format!("Failed to bind pdfium library: {:?}", e)))?;
    Ok(Pdfium::new(bindings))
}

fn render_document_blocking(
    pdf_path: &Path,
    dpi: u32,
    password: Option<&str>,
) -> Result<RenderedDocument, Pdf2MarkupError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                Pdf2MarkupError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                Pdf2MarkupError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            Pdf2MarkupError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let render_config = PdfRenderConfig::new().scale_page_by_factor(dpi as f32 / 72.0);

    let mut rasters = Vec::with_capacity(pages.len() as usize);
    let mut tokens = Vec::with_capacity(pages.len() as usize);

    for (idx, page) in pages.iter().enumerate() {
        let page_number = idx + 1;
        let rendering_failed = |e: PdfiumError| Pdf2MarkupError::RasterisationFailed {
            page: page_number,
            detail: format!("{:?}", e),
        };

        let bitmap = page.render_with_config(&render_config).map_err(rendering_failed)?;
        let image = bitmap.as_image().to_rgb8();
        debug!(
            "Rendered page {} → {}x{} px",
            page_number,
            image.width(),
            image.height()
        );
        rasters.push(image);

        let page_height = page.height().value;
        let text = page.text().map_err(rendering_failed)?;
        let mut page_tokens = Vec::new();
        for segment in text.segments().iter() {
            let content = segment.text();
            let content = content.trim();
            if content.is_empty() {
                continue;
            }
            let bounds = segment.bounds();
            page_tokens.push(TextToken {
                text: content.to_string(),
                bbox: BoundingBox::new(
                    bounds.left().value,
                    page_height - bounds.top().value,
                    bounds.right().value,
                    page_height - bounds.bottom().value,
                ),
            });
        }
        debug!("Page {}: {} text tokens", page_number, page_tokens.len());
        tokens.push(page_tokens);
    }

    Ok(RenderedDocument {
        rasters: PageRasters::new(dpi, rasters),
        tokens: PageTokens::new(tokens),
    })
}
