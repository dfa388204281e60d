//! Output types produced by a conversion.

use crate::error::OcrError;
use crate::segment::Segment;
use serde::{Deserialize, Serialize};

/// Complete result of converting one segmented PDF.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Assembled document in the configured markup dialect.
    pub content: String,
    /// Segments after formula recognition and table OCR.
    pub segments: Vec<Segment>,
    /// Pictures cropped from the page rasters (only when an output filename
    /// was configured).
    #[serde(skip)]
    pub images: Vec<ExtractedImage>,
    /// One record per TABLE segment, in document order.
    pub tables: Vec<TableResult>,
    pub stats: ConversionStats,
    /// Zip archive with the document, pictures, segmentation JSON and
    /// translations (only when an output filename was configured).
    #[serde(skip)]
    pub archive: Option<Vec<u8>>,
}

/// A picture cropped out of a page, PNG encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedImage {
    /// `{base}_{page}_{picture_id}.png`
    pub filename: String,
    pub image_data: Vec<u8>,
}

/// Outcome of OCR for a single TABLE segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableResult {
    /// 1-indexed page number.
    pub page_number: usize,
    /// Index into [`ConversionOutput::segments`].
    pub segment_index: usize,
    /// Formula markers drawn into the crop, in order.
    pub markers: Vec<String>,
    /// Markers absent from the accepted HTML.
    pub missing_markers: Vec<String>,
    /// OCR calls made for this table.
    pub attempts: u32,
    /// True when the table's `text_content` was set.
    pub recognised: bool,
    /// Set when the backend failed and no usable HTML was produced.
    pub error: Option<OcrError>,
}

impl TableResult {
    pub fn new(page_number: usize, segment_index: usize) -> Self {
        Self {
            page_number,
            segment_index,
            markers: Vec::new(),
            missing_markers: Vec::new(),
            attempts: 0,
            recognised: false,
            error: None,
        }
    }
}

/// Statistics about a conversion run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    pub total_pages: usize,
    pub total_segments: usize,
    pub tables_total: usize,
    pub tables_recognised: usize,
    pub tables_failed: usize,
    pub formulas_total: usize,
    pub formulas_recognised: usize,
    /// Markers drawn into table crops.
    pub markers_placed: usize,
    /// Markers replaced by formula LaTeX.
    pub markers_substituted: usize,
    pub ocr_calls: u32,
    pub pictures_extracted: usize,
    pub translations: usize,
    pub render_time_ms: u64,
    pub ocr_time_ms: u64,
    pub total_time_ms: u64,
}
