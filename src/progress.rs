//! Progress-callback trait for per-table OCR events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to follow the
//! table pipeline as it runs. Remote OCR recognises tables concurrently, so
//! events for different tables may interleave and arrive from different
//! tasks.
//!
//! # Example
//!
//! ```rust
//! use pdf2markup::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_table_complete(&self, table_num: usize, total_tables: usize, html_len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Table {}/{} done ({} bytes)", table_num, total_tables, html_len);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the table pipeline as it recognises each TABLE segment.
///
/// All methods default to no-ops. `on_table_start`, `on_table_complete` and
/// `on_table_error` may be called concurrently.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before the first table is sent to OCR.
    fn on_tables_start(&self, total_tables: usize) {
        let _ = total_tables;
    }

    /// Called before the first OCR attempt for a table.
    ///
    /// # Arguments
    /// * `table_num`   — 1-indexed position among the document's tables
    /// * `page_number` — 1-indexed page holding the table
    fn on_table_start(&self, table_num: usize, total_tables: usize, page_number: usize) {
        let _ = (table_num, total_tables, page_number);
    }

    /// Called when a table's HTML was accepted.
    fn on_table_complete(&self, table_num: usize, total_tables: usize, html_len: usize) {
        let _ = (table_num, total_tables, html_len);
    }

    /// Called when a table produced no HTML, with the reason.
    fn on_table_error(&self, table_num: usize, total_tables: usize, error: &str) {
        let _ = (table_num, total_tables, error);
    }

    /// Called once after every table has been attempted.
    fn on_tables_complete(&self, total_tables: usize, recognised: usize) {
        let _ = (total_tables, recognised);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
