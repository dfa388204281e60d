//! Table region extraction and OCR orchestration.
//!
//! For every TABLE segment the page raster is cropped into a private copy.
//! When the backend works with formula markers, each FORMULA segment on the
//! same page whose centre lies inside the table is masked in that copy with a
//! numbered marker. Crops are then recognised, concurrently up to the
//! backend's limit, and each result is written back to exactly one segment
//! once all calls have finished.

use crate::output::TableResult;
use crate::pipeline::geometry::PixelBox;
use crate::pipeline::ocr::{TableOcr, TableRegion};
use crate::pipeline::placeholder::{draw_formula_placeholder, MarkerFont};
use crate::pipeline::reconcile::{
    marker_label, recognize_with_markers, substitute_markers, MarkerBinding, Recognition,
    MAX_OCR_ATTEMPTS,
};
use crate::pipeline::render::PageRasters;
use crate::progress::ProgressCallback;
use crate::segment::{Segment, SegmentType};
use futures::stream::{self, StreamExt};
use image::{imageops, RgbImage};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A prepared table: its crop (with placeholders) and marker bindings.
#[derive(Debug, Clone)]
pub struct TableJob {
    pub segment_index: usize,
    pub page_number: usize,
    pub crop: RgbImage,
    /// Crop's top-left corner in page pixels.
    pub origin: (u32, u32),
    pub dpi: u32,
    pub bindings: Vec<MarkerBinding>,
}

/// Totals of one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct TableOutcome {
    /// One entry per TABLE segment, in segment order.
    pub results: Vec<TableResult>,
    pub ocr_calls: u32,
    pub markers_placed: usize,
    pub markers_substituted: usize,
}

/// Indices of FORMULA segments on the table's page whose bounding-box centre
/// lies inside the table box, ordered by `(top, left)`.
pub fn contained_formulas(segments: &[Segment], table_index: usize) -> Vec<usize> {
    let Some(table) = segments.get(table_index) else {
        return Vec::new();
    };
    let mut found: Vec<usize> = segments
        .iter()
        .enumerate()
        .filter(|(_, s)| {
            s.segment_type == SegmentType::Formula && s.page_number == table.page_number
        })
        .filter(|(_, s)| {
            let (cx, cy) = s.bounding_box.center();
            table.bounding_box.contains_point(cx, cy)
        })
        .map(|(i, _)| i)
        .collect();
    found.sort_by(|&a, &b| {
        let (a, b) = (&segments[a].bounding_box, &segments[b].bounding_box);
        a.top.total_cmp(&b.top).then(a.left.total_cmp(&b.left))
    });
    found
}

/// Recognises TABLE segments with one OCR backend.
pub struct TablePipeline {
    backend: Arc<dyn TableOcr>,
    font: Arc<MarkerFont>,
    max_attempts: u32,
    progress: Option<ProgressCallback>,
}

impl TablePipeline {
    pub fn new(backend: Arc<dyn TableOcr>) -> Self {
        Self {
            backend,
            font: MarkerFont::shared(),
            max_attempts: MAX_OCR_ATTEMPTS,
            progress: None,
        }
    }

    pub fn font(mut self, font: Arc<MarkerFont>) -> Self {
        self.font = font;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    pub fn progress(mut self, cb: Option<ProgressCallback>) -> Self {
        self.progress = cb;
        self
    }

    /// Crop every TABLE segment and place formula markers. Tables that cannot
    /// be cropped are returned as unrecognised results.
    pub fn prepare(
        &self,
        segments: &[Segment],
        rasters: &PageRasters,
    ) -> (Vec<TableJob>, Vec<TableResult>) {
        let with_markers = self.backend.uses_formula_markers();
        let mut jobs = Vec::new();
        let mut skipped = Vec::new();

        for (index, table) in segments.iter().enumerate() {
            if table.segment_type != SegmentType::Table {
                continue;
            }
            let page = table.page_number;
            let Some(raster) = rasters.get(page) else {
                warn!("Table on page {}: no page raster, skipped", page);
                skipped.push(TableResult::new(page, index));
                continue;
            };
            let Some((x, y, w, h)) = PixelBox::from_points(&table.bounding_box, rasters.dpi)
                .crop_rect(raster.width(), raster.height())
            else {
                debug!("Table on page {}: empty crop, skipped", page);
                skipped.push(TableResult::new(page, index));
                continue;
            };
            let mut crop = imageops::crop_imm(raster, x, y, w, h).to_image();

            let mut bindings = Vec::new();
            if with_markers {
                for (n, formula_index) in contained_formulas(segments, index).into_iter().enumerate()
                {
                    let formula = &segments[formula_index];
                    let marker = marker_label(n + 1);
                    if draw_formula_placeholder(
                        &mut crop,
                        (x, y),
                        &formula.bounding_box,
                        rasters.dpi,
                        &marker,
                        &self.font,
                    ) {
                        bindings.push(MarkerBinding {
                            marker,
                            formula_index,
                            latex: formula.text_content.clone(),
                        });
                    }
                }
            }
            if !bindings.is_empty() {
                debug!("Table on page {}: {} formula markers", page, bindings.len());
            }

            jobs.push(TableJob {
                segment_index: index,
                page_number: page,
                crop,
                origin: (x, y),
                dpi: rasters.dpi,
                bindings,
            });
        }
        (jobs, skipped)
    }

    /// Recognise every table and write accepted HTML into `segments`.
    pub async fn run(&self, segments: &mut [Segment], rasters: &PageRasters) -> TableOutcome {
        let (jobs, skipped) = self.prepare(segments, rasters);
        let total = jobs.len();
        let limit = self.backend.concurrency_limit().max(1);
        if total > 0 {
            info!(
                "Recognising {} tables with {} OCR (concurrency {})",
                total,
                self.backend.name(),
                limit
            );
        }
        if let Some(cb) = &self.progress {
            cb.on_tables_start(total);
        }

        let recognitions: Vec<(usize, Recognition)> = stream::iter(jobs.iter().enumerate())
            .map(|(n, job)| self.recognize_job(n, total, job))
            .buffer_unordered(limit)
            .collect()
            .await;

        let mut outcome = TableOutcome {
            results: skipped,
            ..Default::default()
        };
        for (n, recognition) in recognitions {
            let job = &jobs[n];
            let mut result = TableResult::new(job.page_number, job.segment_index);
            result.markers = job.bindings.iter().map(|b| b.marker.clone()).collect();
            result.attempts = recognition.attempts;
            result.missing_markers = recognition.missing;
            result.error = recognition.error;
            outcome.ocr_calls += recognition.attempts;
            outcome.markers_placed += job.bindings.len();

            if let Some(html) = recognition.html {
                let (html, substituted) = substitute_markers(&html, &job.bindings);
                outcome.markers_substituted += substituted;
                segments[job.segment_index].text_content = Some(html);
                result.recognised = true;
            }
            outcome.results.push(result);
        }
        outcome.results.sort_by_key(|r| r.segment_index);

        let recognised = outcome.results.iter().filter(|r| r.recognised).count();
        if let Some(cb) = &self.progress {
            cb.on_tables_complete(total, recognised);
        }
        outcome
    }

    async fn recognize_job(&self, n: usize, total: usize, job: &TableJob) -> (usize, Recognition) {
        let table_num = n + 1;
        if let Some(cb) = &self.progress {
            cb.on_table_start(table_num, total, job.page_number);
        }
        let region = TableRegion {
            page_number: job.page_number,
            image: &job.crop,
            origin: job.origin,
            dpi: job.dpi,
        };
        let markers: Vec<String> = job.bindings.iter().map(|b| b.marker.clone()).collect();
        let recognition =
            recognize_with_markers(self.backend.as_ref(), &region, &markers, self.max_attempts)
                .await;

        match (&recognition.html, &recognition.error) {
            (Some(html), _) => {
                if let Some(cb) = &self.progress {
                    cb.on_table_complete(table_num, total, html.len());
                }
            }
            (None, Some(e)) => {
                warn!("Table on page {}: OCR failed, skipped: {}", job.page_number, e);
                if let Some(cb) = &self.progress {
                    cb.on_table_error(table_num, total, &e.to_string());
                }
            }
            (None, None) => {
                debug!("Table on page {}: no OCR result, skipped", job.page_number);
                if let Some(cb) = &self.progress {
                    cb.on_table_error(table_num, total, "no OCR result");
                }
            }
        }
        (n, recognition)
    }
}
