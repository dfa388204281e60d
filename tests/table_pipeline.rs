//! Integration tests for the table / formula reconciliation pipeline.
//!
//! Everything here runs on synthetic rasters and mock OCR backends; no pdfium
//! library and no network are needed.

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use pdf2markup::pipeline::assemble::Assembler;
use pdf2markup::pipeline::ocr::local::{GridTableStructure, LocalTableOcr, TextLineOcr, TextLines};
use pdf2markup::pipeline::package::{build_archive, ArchiveContents};
use pdf2markup::pipeline::placeholder::MarkerFont;
use pdf2markup::pipeline::render::{PageRasters, PageTokens};
use pdf2markup::pipeline::tables::TablePipeline;
use pdf2markup::{
    parse_segments, BoundingBox, ConversionProgressCallback, OcrError, OutputFormat, Segment,
    SegmentType, TableOcr, TableRegion,
};
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const TWO_MARKERS: &str = "<table><tr><td>FORMULA_001</td><td>FORMULA_002</td></tr></table>";

/// Backend that answers from a script, one entry per call; the last entry
/// repeats.
struct Scripted {
    replies: Vec<Result<Option<String>, OcrError>>,
    markers: bool,
    calls: AtomicUsize,
    seen_sizes: Mutex<Vec<(u32, u32)>>,
}

impl Scripted {
    fn new(markers: bool, replies: Vec<Result<Option<String>, OcrError>>) -> Arc<Self> {
        Arc::new(Self {
            replies,
            markers,
            calls: AtomicUsize::new(0),
            seen_sizes: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TableOcr for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    fn uses_formula_markers(&self) -> bool {
        self.markers
    }

    fn concurrency_limit(&self) -> usize {
        4
    }

    async fn recognize(&self, region: &TableRegion<'_>) -> Result<Option<String>, OcrError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_sizes
            .lock()
            .unwrap()
            .push((region.image.width(), region.image.height()));
        let i = n.min(self.replies.len() - 1);
        self.replies[i].clone()
    }
}

fn page() -> PageRasters {
    PageRasters::new(72, vec![RgbImage::from_pixel(600, 800, Rgb([230, 230, 230]))])
}

/// One table with two formulas inside, plus one formula outside.
fn table_with_formulas() -> Vec<Segment> {
    vec![
        Segment::new(1, BoundingBox::new(50.0, 100.0, 550.0, 300.0), SegmentType::Table),
        Segment::new(1, BoundingBox::new(320.0, 150.0, 450.0, 200.0), SegmentType::Formula)
            .with_text("y^2"),
        Segment::new(1, BoundingBox::new(80.0, 150.0, 200.0, 200.0), SegmentType::Formula)
            .with_text("x^2"),
        Segment::new(1, BoundingBox::new(80.0, 500.0, 200.0, 540.0), SegmentType::Formula)
            .with_text("z^2"),
    ]
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn pipeline(backend: Arc<dyn TableOcr>) -> TablePipeline {
    TablePipeline::new(backend).font(Arc::new(MarkerFont::Bitmap))
}

#[tokio::test]
async fn local_backend_without_text_lines_leaves_table_unset() {
    let backend = Scripted::new(false, vec![Ok(None)]);
    let mut segments = table_with_formulas();
    let outcome = pipeline(backend.clone()).run(&mut segments, &page()).await;

    assert!(segments[0].text_content.is_none());
    assert_eq!(outcome.results.len(), 1);
    assert!(!outcome.results[0].recognised);
    assert!(outcome.results[0].markers.is_empty());
    assert_eq!(outcome.markers_placed, 0);
    assert_eq!(backend.calls(), 1);
}

/// Text-line stage that finds words as runs of inked columns in the crop and
/// labels them left to right.
struct InkColumns {
    labels: Vec<&'static str>,
}

impl TextLineOcr for InkColumns {
    fn name(&self) -> &str {
        "ink-columns"
    }

    fn detect(&self, region: &TableRegion<'_>) -> Result<TextLines, OcrError> {
        let img = region.image;
        let ink_rows = |x: u32| -> Vec<u32> {
            (0..img.height()).filter(|&y| img.get_pixel(x, y)[0] < 128).collect()
        };
        let mut runs: Vec<(u32, u32, u32, u32)> = Vec::new();
        let mut gap = u32::MAX;
        for x in 0..img.width() {
            let rows = ink_rows(x);
            let (Some(&top), Some(&bottom)) = (rows.first(), rows.last()) else {
                gap = gap.saturating_add(1);
                continue;
            };
            match runs.last_mut() {
                Some(run) if gap < 8 => {
                    run.2 = x + 1;
                    run.1 = run.1.min(top);
                    run.3 = run.3.max(bottom + 1);
                }
                _ => runs.push((x, top, x + 1, bottom + 1)),
            }
            gap = 0;
        }
        let mut lines = TextLines::default();
        for (i, (l, t, r, b)) in runs.into_iter().enumerate() {
            let text = self.labels.get(i).copied().unwrap_or("?");
            lines.push(l as f32, t as f32, r as f32, b as f32, text.to_string(), 0.99);
        }
        Ok(lines)
    }
}

#[tokio::test]
async fn local_stages_read_table_pixels_without_text_layer() {
    let mut page = RgbImage::from_pixel(600, 800, Rgb([255, 255, 255]));
    MarkerFont::Bitmap.draw(&mut page, 120, 130, 16.0, "A1");
    MarkerFont::Bitmap.draw(&mut page, 320, 130, 16.0, "B2");
    let rasters = PageRasters::new(72, vec![page]);
    let mut segments = vec![Segment::new(
        1,
        BoundingBox::new(100.0, 100.0, 500.0, 200.0),
        SegmentType::Table,
    )];

    let local = LocalTableOcr::new(
        Arc::new(InkColumns {
            labels: vec!["A1", "B2"],
        }),
        Arc::new(GridTableStructure),
    );
    assert_eq!(local.stages(), ("ink-columns", "grid"));
    let outcome = pipeline(Arc::new(local)).run(&mut segments, &rasters).await;

    assert_eq!(
        segments[0].text(),
        "<table><tr><td>A1</td><td>B2</td></tr></table>"
    );
    assert!(outcome.results[0].recognised);
    assert_eq!(outcome.markers_placed, 0);
}

#[tokio::test]
async fn remote_backend_markers_are_replaced_by_latex() {
    let backend = Scripted::new(true, vec![Ok(Some(TWO_MARKERS.to_string()))]);
    let mut segments = table_with_formulas();
    let outcome = pipeline(backend.clone()).run(&mut segments, &page()).await;

    assert_eq!(
        segments[0].text(),
        "<table><tr><td>x^2</td><td>y^2</td></tr></table>"
    );
    // Formulas are numbered by (top, left): x^2 sits left of y^2.
    assert_eq!(outcome.results[0].markers, vec!["FORMULA_001", "FORMULA_002"]);
    assert_eq!(outcome.markers_placed, 2);
    assert_eq!(outcome.markers_substituted, 2);
    assert_eq!(backend.calls(), 1);
    // The crop handed to OCR is the table box in pixels.
    assert_eq!(backend.seen_sizes.lock().unwrap()[0], (500, 200));
}

#[tokio::test]
async fn missing_markers_are_retried_until_present() {
    init_tracing();
    let backend = Scripted::new(
        true,
        vec![
            Ok(Some("<table><tr><td>?</td></tr></table>".into())),
            Ok(Some("<table><tr><td>FORMULA_001</td></tr></table>".into())),
            Ok(Some(TWO_MARKERS.into())),
        ],
    );
    let mut segments = table_with_formulas();
    let outcome = pipeline(backend.clone()).run(&mut segments, &page()).await;

    assert_eq!(backend.calls(), 3);
    assert_eq!(outcome.ocr_calls, 3);
    assert_eq!(outcome.results[0].attempts, 3);
    assert!(outcome.results[0].missing_markers.is_empty());
    assert_eq!(
        segments[0].text(),
        "<table><tr><td>x^2</td><td>y^2</td></tr></table>"
    );
}

#[tokio::test]
async fn exhausted_retries_keep_last_html() {
    init_tracing();
    let backend = Scripted::new(
        true,
        vec![
            Ok(Some("<table><tr><td>first FORMULA_001</td></tr></table>".into())),
            Ok(None),
            Ok(Some("<table><tr><td>formula 001</td></tr></table>".into())),
        ],
    );
    let mut segments = table_with_formulas();
    let outcome = pipeline(backend.clone()).run(&mut segments, &page()).await;

    assert_eq!(backend.calls(), 3);
    let result = &outcome.results[0];
    assert!(result.recognised);
    assert!(result.error.is_none());
    assert_eq!(result.missing_markers, vec!["FORMULA_001", "FORMULA_002"]);
    // Lower-case spaced variant still resolves to the first formula.
    assert_eq!(segments[0].text(), "<table><tr><td>x^2</td></tr></table>");
}

#[tokio::test]
async fn failing_table_does_not_stop_the_others() {
    struct ByPage;

    #[async_trait]
    impl TableOcr for ByPage {
        fn name(&self) -> &str {
            "by-page"
        }

        async fn recognize(&self, region: &TableRegion<'_>) -> Result<Option<String>, OcrError> {
            if region.page_number == 1 {
                Err(OcrError::Api {
                    status: 503,
                    body: "overloaded".into(),
                })
            } else {
                Ok(Some(format!("<table><tr><td>p{}</td></tr></table>", region.page_number)))
            }
        }
    }

    #[derive(Default)]
    struct Counter {
        errors: AtomicUsize,
        completes: AtomicUsize,
    }

    impl ConversionProgressCallback for Counter {
        fn on_table_complete(&self, _n: usize, _total: usize, _len: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_table_error(&self, _n: usize, _total: usize, error: &str) {
            assert!(error.contains("503"));
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    let rasters = PageRasters::new(
        72,
        vec![RgbImage::new(200, 200), RgbImage::new(200, 200)],
    );
    let mut segments = vec![
        Segment::new(1, BoundingBox::new(10.0, 10.0, 100.0, 100.0), SegmentType::Table),
        Segment::new(2, BoundingBox::new(10.0, 10.0, 100.0, 100.0), SegmentType::Table),
    ];
    let counter = Arc::new(Counter::default());
    let outcome = TablePipeline::new(Arc::new(ByPage))
        .progress(Some(counter.clone() as Arc<dyn ConversionProgressCallback>))
        .run(&mut segments, &rasters)
        .await;

    assert!(segments[0].text_content.is_none());
    assert_eq!(segments[1].text(), "<table><tr><td>p2</td></tr></table>");
    assert!(matches!(
        outcome.results[0].error,
        Some(OcrError::Api { status: 503, .. })
    ));
    assert!(outcome.results[1].recognised);
    assert_eq!(counter.errors.load(Ordering::SeqCst), 1);
    assert_eq!(counter.completes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn recognised_table_flows_into_document_and_archive() {
    let json = r#"[
        {"left": 50, "top": 20, "width": 300, "height": 30, "page_number": 1,
         "text": "Results", "type": "Title"},
        {"left": 50, "top": 100, "width": 500, "height": 200, "page_number": 1,
         "type": "Table"},
        {"left": 80, "top": 150, "width": 120, "height": 50, "page_number": 1,
         "text": "x^2", "type": "Formula"},
        {"left": 320, "top": 150, "width": 130, "height": 50, "page_number": 1,
         "text": "y^2", "type": "Formula"},
        {"left": 50, "top": 760, "width": 500, "height": 20, "page_number": 1,
         "text": "Page 1", "type": "Page footer"}
    ]"#;
    let mut segments = pdf2markup::segment::drop_page_footers(parse_segments(json).unwrap());
    assert_eq!(segments.len(), 4);

    let rasters = page();
    let backend = Scripted::new(true, vec![Ok(Some(TWO_MARKERS.to_string()))]);
    pipeline(backend).run(&mut segments, &rasters).await;

    let tokens = PageTokens::default();
    let doc = Assembler::new(OutputFormat::Markdown, &rasters, &tokens)
        .extract_toc(true)
        .assemble(&segments);
    let content = doc.content();
    assert_eq!(
        content,
        "# Table of Contents\n\n- Results\n\n\n\n\
         # Results\n\n\
         <table><tr><td>x^2</td><td>y^2</td></tr></table>\n\n\
         x^2\n\n\
         y^2\n\n"
    );

    let archive = build_archive(&ArchiveContents {
        filename: "results.md",
        content: &content,
        images: &doc.images,
        segments: &segments,
        translations: &[],
    })
    .unwrap();
    let mut zip = zip::ZipArchive::new(Cursor::new(archive)).unwrap();
    let mut json = String::new();
    zip.by_name("results_segmentation.json")
        .unwrap()
        .read_to_string(&mut json)
        .unwrap();
    let round: Vec<Segment> = parse_segments(&json).unwrap();
    assert_eq!(round[1].text(), "<table><tr><td>x^2</td><td>y^2</td></tr></table>");
}
