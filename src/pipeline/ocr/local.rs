//! Local two-stage table OCR: text lines, then table structure.
//!
//! Stage one ([`TextLineOcr`]) detects and recognises text lines in the crop
//! and returns the three-way result `(boxes, texts, scores)`. When it finds
//! no text the table is skipped. Stage two ([`TableStructureModel`]) turns
//! the crop plus those lines into an HTML table.
//!
//! With model files configured both stages run ONNX models through
//! `oar-ocr` (see [`super::onnx`]): PP-OCR detection and recognition for the
//! lines, SLANet for the structure. Each stage falls back on its own when its
//! models are not configured. Lines then come from the PDF text layer
//! ([`TextLayerLines`]) and structure from clustering line positions
//! ([`GridTableStructure`]).

use crate::config::LocalOcrConfig;
use crate::error::OcrError;
use crate::pipeline::assemble::escape_html;
use crate::pipeline::geometry::PixelBox;
use crate::pipeline::ocr::{TableOcr, TableRegion};
use crate::pipeline::render::PageTokens;
use async_trait::async_trait;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// Output of the text-line stage. The three vectors are parallel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextLines {
    /// Quadrilaterals in crop pixels: top-left, top-right, bottom-right,
    /// bottom-left.
    pub boxes: Vec<[[f32; 2]; 4]>,
    pub texts: Vec<String>,
    pub scores: Vec<f32>,
}

impl TextLines {
    pub fn push(&mut self, left: f32, top: f32, right: f32, bottom: f32, text: String, score: f32) {
        self.boxes
            .push([[left, top], [right, top], [right, bottom], [left, bottom]]);
        self.texts.push(text);
        self.scores.push(score);
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    fn check_parallel(&self) -> Result<(), OcrError> {
        if self.boxes.len() != self.texts.len() {
            return Err(OcrError::Engine(format!(
                "{} boxes for {} texts",
                self.boxes.len(),
                self.texts.len()
            )));
        }
        Ok(())
    }
}

/// Text-line detection and recognition over a table crop.
pub trait TextLineOcr: Send + Sync {
    fn name(&self) -> &str;

    fn detect(&self, region: &TableRegion<'_>) -> Result<TextLines, OcrError>;
}

/// Table-structure reconstruction from a crop and its text lines.
pub trait TableStructureModel: Send + Sync {
    fn name(&self) -> &str;

    fn reconstruct(&self, image: &RgbImage, lines: &TextLines) -> Result<String, OcrError>;
}

/// Table-structure model type. Each expects its own input size and its own
/// structure dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableModelVariant {
    /// SLANet_plus, trained on both wired and wireless tables.
    #[default]
    SlanetPlus,
    /// SLANeXt_wired, for tables with ruled cell borders.
    SlanextWired,
}

impl TableModelVariant {
    /// Model input `(height, width)`.
    pub fn input_shape(&self) -> (u32, u32) {
        match self {
            TableModelVariant::SlanetPlus => (488, 488),
            TableModelVariant::SlanextWired => (512, 512),
        }
    }
}

impl fmt::Display for TableModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TableModelVariant::SlanetPlus => "slanet_plus",
            TableModelVariant::SlanextWired => "slanext_wired",
        })
    }
}

impl FromStr for TableModelVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "slanet_plus" | "slanetplus" => Ok(TableModelVariant::SlanetPlus),
            "slanext_wired" | "slanextwired" => Ok(TableModelVariant::SlanextWired),
            other => Err(format!(
                "unknown table model '{}' (expected slanet_plus or slanext_wired)",
                other
            )),
        }
    }
}

/// Local backend composed of the two stages.
pub struct LocalTableOcr {
    lines: Arc<dyn TextLineOcr>,
    structure: Arc<dyn TableStructureModel>,
}

impl LocalTableOcr {
    pub fn new(lines: Arc<dyn TextLineOcr>, structure: Arc<dyn TableStructureModel>) -> Self {
        Self { lines, structure }
    }

    /// Both fallback stages: text-layer lines and the grid structure.
    pub fn from_text_layer(tokens: PageTokens) -> Self {
        Self::new(
            Arc::new(TextLayerLines::new(tokens)),
            Arc::new(GridTableStructure),
        )
    }

    /// Model-backed stages where `config` names model files, fallbacks
    /// elsewhere. Configured but missing model files are an error.
    pub fn from_config(config: &LocalOcrConfig, tokens: &PageTokens) -> Result<Self, OcrError> {
        let lines: Arc<dyn TextLineOcr> = match config.text_models() {
            Some((det, rec, dict)) => onnx_text_lines(det, rec, dict)?,
            None => Arc::new(TextLayerLines::new(tokens.clone())),
        };
        let structure: Arc<dyn TableStructureModel> = match config.structure_model() {
            Some((model, dict)) => onnx_structure(model, dict, config.table_model_type)?,
            None => Arc::new(GridTableStructure),
        };
        let ocr = Self::new(lines, structure);
        let (lines, structure) = ocr.stages();
        info!("Local table OCR: {} lines, {} structure", lines, structure);
        Ok(ocr)
    }

    /// Names of the line and structure stages.
    pub fn stages(&self) -> (&str, &str) {
        (self.lines.name(), self.structure.name())
    }
}

#[cfg(feature = "onnx")]
fn onnx_text_lines(
    det: &std::path::Path,
    rec: &std::path::Path,
    dict: &std::path::Path,
) -> Result<Arc<dyn TextLineOcr>, OcrError> {
    Ok(Arc::new(super::onnx::OnnxTextLines::new(det, rec, dict)?))
}

#[cfg(not(feature = "onnx"))]
fn onnx_text_lines(
    _det: &std::path::Path,
    _rec: &std::path::Path,
    _dict: &std::path::Path,
) -> Result<Arc<dyn TextLineOcr>, OcrError> {
    Err(OcrError::Engine(
        "OCR models configured but pdf2markup was built without the `onnx` feature".into(),
    ))
}

#[cfg(feature = "onnx")]
fn onnx_structure(
    model: &std::path::Path,
    dict: &std::path::Path,
    variant: TableModelVariant,
) -> Result<Arc<dyn TableStructureModel>, OcrError> {
    Ok(Arc::new(super::onnx::SlanetTableStructure::new(model, dict, variant)?))
}

#[cfg(not(feature = "onnx"))]
fn onnx_structure(
    _model: &std::path::Path,
    _dict: &std::path::Path,
    _variant: TableModelVariant,
) -> Result<Arc<dyn TableStructureModel>, OcrError> {
    Err(OcrError::Engine(
        "Table model configured but pdf2markup was built without the `onnx` feature".into(),
    ))
}

fn run_stages(
    lines_stage: &dyn TextLineOcr,
    structure: &dyn TableStructureModel,
    region: &TableRegion<'_>,
) -> Result<Option<String>, OcrError> {
    let lines = lines_stage.detect(region)?;
    if lines.is_empty() {
        debug!("Table on page {}: no text lines", region.page_number);
        return Ok(None);
    }
    debug!(
        "Table on page {}: {} text lines from {}, {} structure",
        region.page_number,
        lines.len(),
        lines_stage.name(),
        structure.name()
    );
    let html = structure.reconstruct(region.image, &lines)?;
    Ok(Some(html).filter(|h| !h.trim().is_empty()))
}

#[async_trait]
impl TableOcr for LocalTableOcr {
    fn name(&self) -> &str {
        "local"
    }

    /// Inference runs on the blocking pool with a private copy of the crop.
    async fn recognize(&self, region: &TableRegion<'_>) -> Result<Option<String>, OcrError> {
        let lines = Arc::clone(&self.lines);
        let structure = Arc::clone(&self.structure);
        let image = region.image.clone();
        let (page_number, origin, dpi) = (region.page_number, region.origin, region.dpi);
        tokio::task::spawn_blocking(move || {
            let region = TableRegion {
                page_number,
                image: &image,
                origin,
                dpi,
            };
            run_stages(lines.as_ref(), structure.as_ref(), &region)
        })
        .await
        .map_err(|e| OcrError::Engine(format!("Local OCR task failed: {}", e)))?
    }
}

// ── Text layer lines ─────────────────────────────────────────────────────

/// Text-line stage backed by the PDF text layer. Finds nothing on scanned
/// pages.
pub struct TextLayerLines {
    tokens: PageTokens,
}

impl TextLayerLines {
    pub fn new(tokens: PageTokens) -> Self {
        Self { tokens }
    }
}

impl TextLineOcr for TextLayerLines {
    fn name(&self) -> &str {
        "text-layer"
    }

    fn detect(&self, region: &TableRegion<'_>) -> Result<TextLines, OcrError> {
        let (w, h) = region.image.dimensions();
        let mut lines = TextLines::default();
        for token in self.tokens.page(region.page_number) {
            let px = PixelBox::from_points(&token.bbox, region.dpi).translate(region.origin);
            let area = px.width() * px.height();
            if area <= 0 {
                continue;
            }
            let clamped = px.clamp_to(w, h);
            let inside = clamped.width().max(0) * clamped.height().max(0);
            if inside * 2 <= area {
                continue;
            }
            lines.push(
                px.left as f32,
                px.top as f32,
                px.right as f32,
                px.bottom as f32,
                token.text.clone(),
                1.0,
            );
        }
        Ok(lines)
    }
}

// ── Structure filling ────────────────────────────────────────────────────

/// `[x1, y1, x2, y2]` of a cell box given as 8 polygon coordinates or as
/// 4 corner coordinates. Anything shorter is an empty box.
pub fn cell_bounds(coords: &[f32]) -> [f32; 4] {
    if coords.len() >= 8 {
        let xs = [coords[0], coords[2], coords[4], coords[6]];
        let ys = [coords[1], coords[3], coords[5], coords[7]];
        [
            xs.iter().copied().fold(f32::INFINITY, f32::min),
            ys.iter().copied().fold(f32::INFINITY, f32::min),
            xs.iter().copied().fold(f32::NEG_INFINITY, f32::max),
            ys.iter().copied().fold(f32::NEG_INFINITY, f32::max),
        ]
    } else if coords.len() >= 4 {
        [coords[0], coords[1], coords[2], coords[3]]
    } else {
        [0.0; 4]
    }
}

fn quad_bounds(quad: &[[f32; 2]; 4]) -> [f32; 4] {
    let flat: Vec<f32> = quad.iter().flat_map(|p| [p[0], p[1]]).collect();
    cell_bounds(&flat)
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = w * h;
    let union = (a[2] - a[0]) * (a[3] - a[1]) + (b[2] - b[0]) * (b[3] - b[1]) - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

/// Summed corner offsets plus the closer of the two corners.
fn corner_distance(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let top_left = (a[0] - b[0]).abs() + (a[1] - b[1]).abs();
    let bottom_right = (a[2] - b[2]).abs() + (a[3] - b[3]).abs();
    top_left + bottom_right + top_left.min(bottom_right)
}

/// Cell with the highest IoU against `line`, ties broken by corner distance.
fn best_cell(line: &[f32; 4], cells: &[[f32; 4]]) -> Option<usize> {
    cells
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            (1.0 - iou(line, a))
                .total_cmp(&(1.0 - iou(line, b)))
                .then(corner_distance(line, a).total_cmp(&corner_distance(line, b)))
        })
        .map(|(i, _)| i)
}

/// Fill a predicted HTML skeleton with text lines.
///
/// `structure` holds the model's tokens (`<tr>`, `<td></td>`, `<td`,
/// ` colspan="2"`, `>`, `</td>`, …). `cells` holds one crop-pixel box per
/// cell-opening token, in token order. Every line is placed in its best
/// matching cell; lines sharing a cell are joined top to bottom, left to
/// right.
pub fn fill_structure(structure: &[String], cells: &[[f32; 4]], lines: &TextLines) -> String {
    let mut contents: Vec<Vec<(f32, f32, &str)>> = vec![Vec::new(); cells.len()];
    for (quad, text) in lines.boxes.iter().zip(&lines.texts) {
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        let b = quad_bounds(quad);
        if let Some(i) = best_cell(&b, cells) {
            contents[i].push((b[1], b[0], text));
        }
    }
    let cell_text = |i: usize| -> String {
        let Some(parts) = contents.get(i) else {
            return String::new();
        };
        let mut parts = parts.clone();
        parts.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
        parts
            .iter()
            .map(|(_, _, t)| escape_html(t))
            .collect::<Vec<_>>()
            .join(" ")
    };

    let mut html = String::from("<table>");
    let mut cell = 0usize;
    let mut pending: Option<String> = None;
    for token in structure {
        match token.as_str() {
            "<html>" | "</html>" | "<body>" | "</body>" | "<table>" | "</table>" => {}
            "<td></td>" => {
                html.push_str("<td>");
                html.push_str(&cell_text(cell));
                html.push_str("</td>");
                cell += 1;
            }
            "<td>" => {
                html.push_str("<td>");
                html.push_str(&cell_text(cell));
                cell += 1;
            }
            "<td" => {
                html.push_str("<td");
                pending = Some(cell_text(cell));
                cell += 1;
            }
            ">" if pending.is_some() => {
                html.push('>');
                if let Some(text) = pending.take() {
                    html.push_str(&text);
                }
            }
            other => html.push_str(other),
        }
    }
    html.push_str("</table>");
    html
}

// ── Grid structure ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Cell<'a> {
    text: &'a str,
    left: f32,
    top: f32,
    right: f32,
    bottom: f32,
}

impl Cell<'_> {
    fn center_x(&self) -> f32 {
        (self.left + self.right) / 2.0
    }

    fn center_y(&self) -> f32 {
        (self.top + self.bottom) / 2.0
    }

    fn height(&self) -> f32 {
        self.bottom - self.top
    }
}

/// Structure stage that clusters lines into rows by vertical centre and into
/// columns by left edge. Used when no structure model is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridTableStructure;

impl TableStructureModel for GridTableStructure {
    fn name(&self) -> &str {
        "grid"
    }

    fn reconstruct(&self, _image: &RgbImage, lines: &TextLines) -> Result<String, OcrError> {
        lines.check_parallel()?;
        let mut cells: Vec<Cell<'_>> = lines
            .boxes
            .iter()
            .zip(&lines.texts)
            .filter(|(_, t)| !t.trim().is_empty())
            .map(|(quad, text)| {
                let [left, top, right, bottom] = quad_bounds(quad);
                Cell {
                    text: text.trim(),
                    left,
                    top,
                    right,
                    bottom,
                }
            })
            .collect();
        cells.sort_by(|a, b| a.top.total_cmp(&b.top).then(a.left.total_cmp(&b.left)));

        let line_height = median(cells.iter().map(Cell::height).collect()).max(1.0);
        let rows = cluster_rows(&cells, line_height * 0.5);
        let boundaries = column_boundaries(&cells, line_height);
        let num_cols = boundaries.len().saturating_sub(1).max(1);

        let mut html = String::from("<table>");
        for row in rows {
            let mut out = vec![String::new(); num_cols];
            for cell in row {
                let col = column_index(cell, &boundaries).min(num_cols - 1);
                if !out[col].is_empty() {
                    out[col].push(' ');
                }
                out[col].push_str(cell.text);
            }
            html.push_str("<tr>");
            for text in out {
                html.push_str("<td>");
                html.push_str(&escape_html(&text));
                html.push_str("</td>");
            }
            html.push_str("</tr>");
        }
        html.push_str("</table>");
        Ok(html)
    }
}

fn median(mut values: Vec<f32>) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f32::total_cmp);
    values[values.len() / 2]
}

/// Group cells whose vertical centre is within `tolerance` of a row's first
/// cell. Rows come out top to bottom, cells left to right.
fn cluster_rows<'a>(cells: &'a [Cell<'a>], tolerance: f32) -> Vec<Vec<&'a Cell<'a>>> {
    let mut rows: Vec<Vec<&Cell<'_>>> = Vec::new();
    for cell in cells {
        let found = rows.iter().position(|row| {
            row.first()
                .is_some_and(|first| (cell.center_y() - first.center_y()).abs() <= tolerance)
        });
        match found {
            Some(i) => rows[i].push(cell),
            None => rows.push(vec![cell]),
        }
    }
    for row in &mut rows {
        row.sort_by(|a, b| a.left.total_cmp(&b.left));
    }
    rows.sort_by(|a, b| {
        let ay = a.first().map_or(0.0, |c| c.top);
        let by = b.first().map_or(0.0, |c| c.top);
        ay.partial_cmp(&by).unwrap_or(Ordering::Equal)
    });
    rows
}

/// Left edges separated by more than `gap`, closed by the rightmost edge.
fn column_boundaries(cells: &[Cell<'_>], gap: f32) -> Vec<f32> {
    let mut lefts: Vec<f32> = cells.iter().map(|c| c.left).collect();
    lefts.sort_by(f32::total_cmp);
    let Some(&first) = lefts.first() else {
        return Vec::new();
    };
    let mut boundaries = vec![first];
    for &x in &lefts[1..] {
        if boundaries.last().is_some_and(|&last| x - last > gap) {
            boundaries.push(x);
        }
    }
    if let Some(max_right) = cells.iter().map(|c| c.right).max_by(f32::total_cmp) {
        boundaries.push(max_right.max(first + 1.0));
    }
    boundaries
}

fn column_index(cell: &Cell<'_>, boundaries: &[f32]) -> usize {
    let cx = cell.center_x();
    boundaries
        .windows(2)
        .position(|w| cx >= w[0] && cx < w[1])
        .unwrap_or_else(|| {
            // Centre left of every boundary only happens for the first column.
            if boundaries.first().is_some_and(|&b| cx < b) {
                0
            } else {
                boundaries.len().saturating_sub(2)
            }
        })
}
