//! Pipeline stages for segmented-PDF-to-markup conversion.
//!
//! Each submodule implements one transformation step so it can be tested on
//! its own and swapped (e.g. another OCR backend) without touching the
//! others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ formula ──▶ tables ──▶ assemble ──▶ package
//! (URL/path) (pdfium)  (LaTeX)    (OCR+markers) (md/html)   (zip)
//! ```
//!
//! 1. [`input`]    resolve the user-supplied path or URL to a local file
//! 2. [`render`]   rasterise every page and read the text layer; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 3. [`formula`]  recognise LaTeX for FORMULA segments without text
//! 4. [`tables`]   crop TABLE segments, draw [`placeholder`] markers over
//!    contained formulas, call the [`ocr`] backend and [`reconcile`] the
//!    markers with the formula LaTeX
//! 5. [`assemble`] walk segments page by page into Markdown or HTML
//! 6. [`package`]  zip the document, pictures, segmentation and translations
//!
//! [`geometry`] and [`encode`] are shared helpers for the pixel stages.

pub mod assemble;
pub mod encode;
pub mod formula;
pub mod geometry;
pub mod input;
pub mod ocr;
pub mod package;
pub mod placeholder;
pub mod reconcile;
pub mod render;
pub mod tables;
