//! # pdf2markup
//!
//! Convert segmented PDF documents into Markdown or HTML.
//!
//! Layout segmentation arrives pre-computed (one record per region: title,
//! text, table, formula, picture, …). This crate fills in the content:
//! regular text from the PDF text layer, formulas as LaTeX, tables as HTML
//! through an OCR backend, pictures as cropped PNGs.
//!
//! Tables that contain formulas are the hard part. A vision model reading a
//! table crop mangles embedded equations, so each formula inside the table
//! is masked with a white box carrying a marker (`FORMULA_001`, …), the
//! masked crop is OCR'd, and the formula's own LaTeX is spliced back in
//! wherever the marker (or a near variant of it) comes back. Missing
//! markers trigger bounded retries.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF + segments
//!  │
//!  ├─ 1. Input     resolve local file or download from URL
//!  ├─ 2. Render    rasterise pages + read text tokens via pdfium
//!  ├─ 3. Formulas  LaTeX for FORMULA segments without text (remote OCR)
//!  ├─ 4. Tables    mask formulas → OCR → verify markers → splice LaTeX
//!  ├─ 5. Assemble  Markdown / HTML, optional table of contents
//!  └─ 6. Package   zip with pictures, segmentation JSON, translations
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2markup::{convert, load_segments, ConversionConfig, RemoteOcrConfig};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let segments = load_segments(Path::new("report.segments.json"))?;
//!     let config = ConversionConfig::builder()
//!         .remote_ocr(RemoteOcrConfig::from_env())
//!         .extract_toc(true)
//!         .build()?;
//!     let output = convert("report.pdf", segments, &config).await?;
//!     println!("{}", output.content);
//!     eprintln!(
//!         "tables: {}/{}",
//!         output.stats.tables_recognised, output.stats.tables_total
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2markup` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `onnx`  | on      | Local ONNX table OCR through `oar-ocr` (text lines + SLANet structure) |
//!
//! Disable `cli` when using only the library, and `onnx` when tables only
//! go to a remote model:
//! ```toml
//! pdf2markup = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod segment;
pub mod translate;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ConversionConfig, ConversionConfigBuilder, LocalOcrConfig, OcrMode, OutputFormat,
    RemoteOcrConfig,
};
pub use convert::{convert, convert_from_bytes, convert_sync, convert_to_file};
pub use error::{OcrError, Pdf2MarkupError, TranslationError};
pub use output::{ConversionOutput, ConversionStats, ExtractedImage, TableResult};
pub use pipeline::ocr::local::{LocalTableOcr, TableModelVariant};
pub use pipeline::ocr::remote::RemoteOcr;
pub use pipeline::ocr::{FormulaOcr, TableOcr, TableRegion};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use segment::{load_segments, parse_segments, BoundingBox, Segment, SegmentType};
pub use translate::{LlmTranslator, Translator};
