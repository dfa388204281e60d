//! OCR backends for table crops and formula crops.
//!
//! The table pipeline talks to a single [`TableOcr`] chosen once per request:
//!
//! * [`local::LocalTableOcr`] — text lines, then a table-structure model,
//!   both ONNX models when configured. Does not use formula markers.
//! * [`remote::RemoteOcr`] — a vision-language model behind an
//!   OpenAI-compatible chat-completion endpoint. Uses formula markers and
//!   accepts concurrent calls.
//!
//! Both return an opaque HTML fragment, or `None` when there is nothing to
//! report. Errors are per table and never abort a conversion.

pub mod local;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod remote;

use crate::error::OcrError;
use async_trait::async_trait;
use image::RgbImage;

/// A table crop handed to a [`TableOcr`] backend.
#[derive(Debug, Clone, Copy)]
pub struct TableRegion<'a> {
    /// 1-indexed page number.
    pub page_number: usize,
    /// Private copy of the table pixels, possibly with formula placeholders.
    pub image: &'a RgbImage,
    /// Crop's top-left corner in page pixels.
    pub origin: (u32, u32),
    pub dpi: u32,
}

/// Table recogniser: image in, HTML out.
#[async_trait]
pub trait TableOcr: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Whether contained formulas are masked with markers before recognition
    /// and spliced back in afterwards.
    fn uses_formula_markers(&self) -> bool {
        false
    }

    /// Maximum concurrent [`TableOcr::recognize`] calls.
    fn concurrency_limit(&self) -> usize {
        1
    }

    async fn recognize(&self, region: &TableRegion<'_>) -> Result<Option<String>, OcrError>;
}

/// Formula recogniser: image in, LaTeX out.
#[async_trait]
pub trait FormulaOcr: Send + Sync {
    async fn recognize_formula(&self, image: &RgbImage) -> Result<Option<String>, OcrError>;
}
