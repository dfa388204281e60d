//! Layout segments: the unit of work for every stage of the pipeline.
//!
//! Segments arrive from an upstream layout-analysis service as JSON records
//! (`left`, `top`, `width`, `height`, `page_number`, `page_width`,
//! `page_height`, `text`, `type`) in PDF point space with a top-left origin.
//! [`Segment`] is the in-memory form: a normalised [`BoundingBox`], a parsed
//! [`SegmentType`], and a mutable `text_content` that the formula and table
//! stages fill in.
//!
//! The same record shape is written back out as `{basename}_segmentation.json`
//! when an archive is produced, so `Segment` round-trips through
//! [`SegmentRecord`] via `#[serde(from, into)]`.

use crate::error::Pdf2MarkupError;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::Path;

// ── Bounding box ─────────────────────────────────────────────────────────

/// Axis-aligned rectangle in PDF points (72 per inch), top-left origin.
///
/// Constructors normalise their input so that every coordinate is finite and
/// non-negative, `right >= left` and `bottom >= top`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

fn sanitise(v: f32) -> f32 {
    if v.is_finite() {
        v.max(0.0)
    } else {
        0.0
    }
}

impl BoundingBox {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        let (l, r) = (sanitise(left), sanitise(right));
        let (t, b) = (sanitise(top), sanitise(bottom));
        Self {
            left: l.min(r),
            top: t.min(b),
            right: l.max(r),
            bottom: t.max(b),
        }
    }

    /// Build from the analysis payload's `left/top/width/height` form.
    pub fn from_width_height(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self::new(left, top, left + width, top + height)
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn center(&self) -> (f32, f32) {
        (
            (self.left + self.right) / 2.0,
            (self.top + self.bottom) / 2.0,
        )
    }

    /// Inclusive point-in-rectangle test.
    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.left && x <= self.right && y >= self.top && y <= self.bottom
    }

    /// Area shared with `other` (zero when disjoint).
    pub fn intersection_area(&self, other: &BoundingBox) -> f32 {
        let w = self.right.min(other.right) - self.left.max(other.left);
        let h = self.bottom.min(other.bottom) - self.top.max(other.top);
        if w <= 0.0 || h <= 0.0 {
            0.0
        } else {
            w * h
        }
    }

    /// Percentage (0–100) of `self`'s area covered by `other`.
    pub fn intersection_percentage(&self, other: &BoundingBox) -> f32 {
        let area = self.area();
        if area <= 0.0 {
            return 0.0;
        }
        self.intersection_area(other) / area * 100.0
    }
}

// ── Segment type ─────────────────────────────────────────────────────────

/// DocLayNet layout label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SegmentType {
    Caption,
    Footnote,
    Formula,
    ListItem,
    PageFooter,
    PageHeader,
    Picture,
    SectionHeader,
    Table,
    #[default]
    Text,
    Title,
}

impl SegmentType {
    /// Canonical label, as written to the segmentation JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentType::Caption => "Caption",
            SegmentType::Footnote => "Footnote",
            SegmentType::Formula => "Formula",
            SegmentType::ListItem => "List_Item",
            SegmentType::PageFooter => "Page_Footer",
            SegmentType::PageHeader => "Page_Header",
            SegmentType::Picture => "Picture",
            SegmentType::SectionHeader => "Section_Header",
            SegmentType::Table => "Table",
            SegmentType::Text => "Text",
            SegmentType::Title => "Title",
        }
    }

    /// Parse a free-text label. Case, spaces, hyphens and underscores are
    /// ignored ("Page footer", "Page_Footer" and "PAGE-FOOTER" are equal).
    /// Unknown labels map to [`SegmentType::Text`].
    pub fn from_text(label: &str) -> Self {
        let key: String = label
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .flat_map(char::to_lowercase)
            .collect();
        match key.as_str() {
            "caption" => SegmentType::Caption,
            "footnote" => SegmentType::Footnote,
            "formula" | "equation" => SegmentType::Formula,
            "listitem" => SegmentType::ListItem,
            "pagefooter" => SegmentType::PageFooter,
            "pageheader" => SegmentType::PageHeader,
            "picture" | "figure" => SegmentType::Picture,
            "sectionheader" => SegmentType::SectionHeader,
            "table" => SegmentType::Table,
            "title" => SegmentType::Title,
            _ => SegmentType::Text,
        }
    }

    /// Map a DocLayNet class id (1–11). Out-of-range ids map to Text.
    pub fn from_doclaynet_id(id: u64) -> Self {
        match id {
            1 => SegmentType::Caption,
            2 => SegmentType::Footnote,
            3 => SegmentType::Formula,
            4 => SegmentType::ListItem,
            5 => SegmentType::PageFooter,
            6 => SegmentType::PageHeader,
            7 => SegmentType::Picture,
            8 => SegmentType::SectionHeader,
            9 => SegmentType::Table,
            11 => SegmentType::Title,
            _ => SegmentType::Text,
        }
    }

    pub fn is_heading(&self) -> bool {
        matches!(self, SegmentType::Title | SegmentType::SectionHeader)
    }
}

impl fmt::Display for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SegmentType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

struct SegmentTypeVisitor;

impl Visitor<'_> for SegmentTypeVisitor {
    type Value = SegmentType;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a layout label or a DocLayNet class id")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<SegmentType, E> {
        Ok(SegmentType::from_text(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<SegmentType, E> {
        Ok(SegmentType::from_doclaynet_id(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<SegmentType, E> {
        Ok(SegmentType::from_doclaynet_id(v.max(0) as u64))
    }
}

impl<'de> Deserialize<'de> for SegmentType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(SegmentTypeVisitor)
    }
}

// ── Segment ──────────────────────────────────────────────────────────────

/// One layout region of one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SegmentRecord", into = "SegmentRecord")]
pub struct Segment {
    /// 1-indexed page number.
    pub page_number: usize,
    pub bounding_box: BoundingBox,
    pub segment_type: SegmentType,
    /// Recognised content: analysis text, LaTeX for formulas, HTML for
    /// tables. `None` until something fills it.
    pub text_content: Option<String>,
    pub page_width: f32,
    pub page_height: f32,
}

impl Segment {
    pub fn new(page_number: usize, bounding_box: BoundingBox, segment_type: SegmentType) -> Self {
        Self {
            page_number,
            bounding_box,
            segment_type,
            text_content: None,
            page_width: 0.0,
            page_height: 0.0,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.text_content = if text.is_empty() { None } else { Some(text) };
        self
    }

    /// Text content, or `""` when unset.
    pub fn text(&self) -> &str {
        self.text_content.as_deref().unwrap_or("")
    }

    /// True when `text_content` holds something other than whitespace.
    pub fn has_text(&self) -> bool {
        !self.text().trim().is_empty()
    }
}

/// Wire form of a segment, as produced by layout analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentRecord {
    #[serde(default)]
    pub left: f32,
    #[serde(default)]
    pub top: f32,
    #[serde(default)]
    pub width: f32,
    #[serde(default)]
    pub height: f32,
    #[serde(default = "default_page_number")]
    pub page_number: usize,
    #[serde(default)]
    pub page_width: f32,
    #[serde(default)]
    pub page_height: f32,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "type", default)]
    pub segment_type: SegmentType,
}

fn default_page_number() -> usize {
    1
}

impl From<SegmentRecord> for Segment {
    fn from(r: SegmentRecord) -> Self {
        Segment {
            page_number: r.page_number.max(1),
            bounding_box: BoundingBox::from_width_height(r.left, r.top, r.width, r.height),
            segment_type: r.segment_type,
            text_content: None,
            page_width: r.page_width,
            page_height: r.page_height,
        }
        .with_text(r.text)
    }
}

impl From<Segment> for SegmentRecord {
    fn from(s: Segment) -> Self {
        SegmentRecord {
            left: s.bounding_box.left,
            top: s.bounding_box.top,
            width: s.bounding_box.width(),
            height: s.bounding_box.height(),
            page_number: s.page_number,
            page_width: s.page_width,
            page_height: s.page_height,
            text: s.text_content.unwrap_or_default(),
            segment_type: s.segment_type,
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────────────

/// Parse a JSON array of analysis records.
pub fn parse_segments(json: &str) -> Result<Vec<Segment>, Pdf2MarkupError> {
    serde_json::from_str(json).map_err(|e| Pdf2MarkupError::InvalidSegments {
        detail: e.to_string(),
    })
}

/// Read and parse a segments JSON file.
pub fn load_segments(path: &Path) -> Result<Vec<Segment>, Pdf2MarkupError> {
    let json = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Pdf2MarkupError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => Pdf2MarkupError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => Pdf2MarkupError::InvalidSegments {
            detail: format!("{}: {}", path.display(), e),
        },
    })?;
    parse_segments(&json)
}

/// Page footers never reach the output document.
pub fn drop_page_footers(segments: Vec<Segment>) -> Vec<Segment> {
    segments
        .into_iter()
        .filter(|s| s.segment_type != SegmentType::PageFooter)
        .collect()
}
