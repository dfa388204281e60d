//! Markup assembly: walk the segments page by page and emit Markdown or HTML.
//!
//! Every segment type has one producer. Producers append `"\n\n"` after their
//! content; pictures, headings and paragraphs with nothing to show emit
//! nothing at all, while tables and formulas always emit their content and
//! the separator. An optional table of contents built from titles and section
//! headers is prepended.

use crate::config::OutputFormat;
use crate::output::ExtractedImage;
use crate::pipeline::encode::encode_png;
use crate::pipeline::geometry::PixelBox;
use crate::pipeline::render::{PageRasters, PageTokens};
use crate::segment::{Segment, SegmentType};
use image::imageops;
use std::collections::HashMap;
use tracing::{debug, warn};

/// What a [`ContentPart`] was produced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    TableOfContents,
    Segment(SegmentType),
}

/// One producer's output, kept separately so translation can skip parts.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentPart {
    pub kind: PartKind,
    pub text: String,
}

impl ContentPart {
    /// Pictures, tables, formulas and blank parts are never translated.
    pub fn is_translatable(&self) -> bool {
        let fixed = matches!(
            self.kind,
            PartKind::Segment(SegmentType::Picture | SegmentType::Table | SegmentType::Formula)
        );
        !fixed && !self.text.trim().is_empty()
    }
}

/// Output of [`Assembler::assemble`].
#[derive(Debug, Clone, Default)]
pub struct AssembledDocument {
    pub parts: Vec<ContentPart>,
    pub images: Vec<ExtractedImage>,
}

impl AssembledDocument {
    pub fn content(&self) -> String {
        self.parts.iter().map(|p| p.text.as_str()).collect()
    }
}

/// Renders segments into a document.
pub struct Assembler<'a> {
    format: OutputFormat,
    extract_toc: bool,
    extract_images: bool,
    base_name: String,
    rasters: &'a PageRasters,
    tokens: &'a PageTokens,
}

impl<'a> Assembler<'a> {
    pub fn new(format: OutputFormat, rasters: &'a PageRasters, tokens: &'a PageTokens) -> Self {
        Self {
            format,
            extract_toc: false,
            extract_images: false,
            base_name: "document".to_string(),
            rasters,
            tokens,
        }
    }

    pub fn extract_toc(mut self, v: bool) -> Self {
        self.extract_toc = v;
        self
    }

    /// Crop pictures out of the rasters, naming them after `base_name`.
    pub fn extract_images(mut self, v: bool, base_name: impl Into<String>) -> Self {
        self.extract_images = v;
        self.base_name = base_name.into();
        self
    }

    pub fn assemble(&self, segments: &[Segment]) -> AssembledDocument {
        let mut order: Vec<usize> = (0..segments.len()).collect();
        order.sort_by_key(|&i| segments[i].page_number);

        let mut doc = AssembledDocument::default();
        if self.extract_toc {
            let toc = self.table_of_contents(order.iter().map(|&i| &segments[i]));
            doc.parts.push(ContentPart {
                kind: PartKind::TableOfContents,
                text: toc,
            });
        }

        let mut picture_ids: HashMap<usize, usize> = HashMap::new();
        for &i in &order {
            let segment = &segments[i];
            let text = match segment.segment_type {
                SegmentType::Picture => {
                    let id = picture_ids.entry(segment.page_number).or_insert(0);
                    let picture_id = *id;
                    *id += 1;
                    self.picture(segment, picture_id, &mut doc.images)
                }
                SegmentType::Table | SegmentType::Formula => format!("{}\n\n", segment.text()),
                SegmentType::Title => self.heading(segment, 1),
                SegmentType::SectionHeader => self.heading(segment, 2),
                _ => self.paragraph(segment),
            };
            if !text.is_empty() {
                doc.parts.push(ContentPart {
                    kind: PartKind::Segment(segment.segment_type),
                    text,
                });
            }
        }
        debug!(
            "Assembled {} parts, {} pictures",
            doc.parts.len(),
            doc.images.len()
        );
        doc
    }

    /// Text-layer tokens inside the segment joined by a space, or the
    /// segment's own text when it has no tokens.
    fn segment_text(&self, segment: &Segment) -> String {
        let tokens = self.tokens.tokens_in(segment);
        if tokens.is_empty() {
            segment.text().trim().to_string()
        } else {
            tokens
                .iter()
                .map(|t| t.text.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        }
    }

    fn heading(&self, segment: &Segment, level: usize) -> String {
        let text = self.segment_text(segment);
        if text.is_empty() {
            return String::new();
        }
        match self.format {
            OutputFormat::Markdown => format!("{} {}\n\n", "#".repeat(level), text),
            OutputFormat::Html => format!("<h{level}>{}</h{level}>\n\n", escape_html(&text)),
        }
    }

    fn paragraph(&self, segment: &Segment) -> String {
        let text = self.segment_text(segment);
        if text.is_empty() {
            return String::new();
        }
        match self.format {
            OutputFormat::Markdown => format!("{}\n\n", text),
            OutputFormat::Html => format!("<p>{}</p>\n\n", escape_html(&text)),
        }
    }

    fn picture(
        &self,
        segment: &Segment,
        picture_id: usize,
        images: &mut Vec<ExtractedImage>,
    ) -> String {
        if !self.extract_images {
            return String::new();
        }
        let Some(raster) = self.rasters.get(segment.page_number) else {
            return String::new();
        };
        let Some((x, y, w, h)) = PixelBox::from_points(&segment.bounding_box, self.rasters.dpi)
            .crop_rect(raster.width(), raster.height())
        else {
            return String::new();
        };
        let crop = imageops::crop_imm(raster, x, y, w, h).to_image();
        let image_data = match encode_png(&crop) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Picture on page {}: encoding failed: {}", segment.page_number, e);
                return String::new();
            }
        };
        let filename = format!("{}_{}_{}.png", self.base_name, segment.page_number, picture_id);
        let tag = format!(
            "<img src='{}_pictures/{}' alt=''>\n\n",
            self.base_name, filename
        );
        images.push(ExtractedImage {
            filename,
            image_data,
        });
        tag
    }

    /// Built from the analysis text; the text layer may split or reorder a
    /// heading's number.
    fn table_of_contents<'s>(&self, segments: impl Iterator<Item = &'s Segment>) -> String {
        let mut toc = String::from("# Table of Contents\n\n");
        for segment in segments.filter(|s| s.segment_type.is_heading()) {
            let text = segment.text();
            if text.trim().is_empty() {
                continue;
            }
            toc.push_str(&toc_line(text));
        }
        toc.push('\n');
        toc.push_str("\n\n");
        toc
    }
}

/// `"  " * max(0, dots_in_first_token - 1) + "- " + text + "\n"`.
pub fn toc_line(text: &str) -> String {
    let dots = text
        .split_whitespace()
        .next()
        .map_or(0, |first| first.matches('.').count());
    format!("{}- {}\n", "  ".repeat(dots.saturating_sub(1)), text)
}

/// Escape text for HTML element content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::render::TextToken;
    use crate::segment::BoundingBox;
    use image::{Rgb, RgbImage};

    fn seg(page: usize, t: SegmentType, text: &str) -> Segment {
        Segment::new(page, BoundingBox::new(0.0, 0.0, 50.0, 20.0), t).with_text(text)
    }

    fn empty() -> (PageRasters, PageTokens) {
        (PageRasters::default(), PageTokens::default())
    }

    #[test]
    fn markdown_producers() {
        let (r, t) = empty();
        let segments = vec![
            seg(1, SegmentType::Title, "Report"),
            seg(1, SegmentType::SectionHeader, "1. Intro"),
            seg(1, SegmentType::Text, "Body text."),
            seg(1, SegmentType::Table, "<table></table>"),
            seg(1, SegmentType::Formula, "x^2"),
            seg(1, SegmentType::Text, "   "),
        ];
        let doc = Assembler::new(OutputFormat::Markdown, &r, &t).assemble(&segments);
        assert_eq!(
            doc.content(),
            "# Report\n\n## 1. Intro\n\nBody text.\n\n<table></table>\n\nx^2\n\n"
        );
    }

    #[test]
    fn html_producers_escape() {
        let (r, t) = empty();
        let segments = vec![
            seg(1, SegmentType::Title, "A & B"),
            seg(1, SegmentType::Text, "x < y"),
        ];
        let doc = Assembler::new(OutputFormat::Html, &r, &t).assemble(&segments);
        assert_eq!(doc.content(), "<h1>A &amp; B</h1>\n\n<p>x &lt; y</p>\n\n");
    }

    #[test]
    fn empty_table_still_emits_separator() {
        let (r, t) = empty();
        let segments = vec![Segment::new(1, BoundingBox::default(), SegmentType::Table)];
        let doc = Assembler::new(OutputFormat::Markdown, &r, &t).assemble(&segments);
        assert_eq!(doc.content(), "\n\n");
    }

    #[test]
    fn pages_in_ascending_order_segments_in_given_order() {
        let (r, t) = empty();
        let segments = vec![
            seg(2, SegmentType::Text, "c"),
            seg(1, SegmentType::Text, "a"),
            seg(2, SegmentType::Text, "d"),
            seg(1, SegmentType::Text, "b"),
        ];
        let doc = Assembler::new(OutputFormat::Markdown, &r, &t).assemble(&segments);
        assert_eq!(doc.content(), "a\n\nb\n\nc\n\nd\n\n");
    }

    #[test]
    fn tokens_preferred_over_segment_text() {
        let r = PageRasters::default();
        let t = PageTokens::new(vec![vec![
            TextToken {
                text: "Hello".into(),
                bbox: BoundingBox::new(1.0, 1.0, 20.0, 10.0),
            },
            TextToken {
                text: "world".into(),
                bbox: BoundingBox::new(22.0, 1.0, 45.0, 10.0),
            },
        ]]);
        let segments = vec![seg(1, SegmentType::Text, "fallback")];
        let doc = Assembler::new(OutputFormat::Markdown, &r, &t).assemble(&segments);
        assert_eq!(doc.content(), "Hello world\n\n");
    }

    #[test]
    fn toc_indents_by_dots() {
        assert_eq!(toc_line("Intro"), "- Intro\n");
        assert_eq!(toc_line("1. Intro"), "- 1. Intro\n");
        assert_eq!(toc_line("1.2. Scope"), "  - 1.2. Scope\n");
        assert_eq!(toc_line("1.2.3 Detail"), "  - 1.2.3 Detail\n");
        assert_eq!(toc_line("1.2.3. Deep"), "    - 1.2.3. Deep\n");
    }

    #[test]
    fn toc_is_prepended() {
        let (r, t) = empty();
        let segments = vec![
            seg(1, SegmentType::Title, "Report"),
            seg(1, SegmentType::SectionHeader, "   "),
            seg(1, SegmentType::Text, "body"),
        ];
        let doc = Assembler::new(OutputFormat::Markdown, &r, &t)
            .extract_toc(true)
            .assemble(&segments);
        assert_eq!(
            doc.content(),
            "# Table of Contents\n\n- Report\n\n\n\n# Report\n\nbody\n\n"
        );
        assert_eq!(doc.parts[0].kind, PartKind::TableOfContents);
    }

    #[test]
    fn toc_uses_analysis_text_not_tokens() {
        let r = PageRasters::default();
        // Text layer returns the heading number after the words.
        let t = PageTokens::new(vec![vec![
            TextToken {
                text: "Scope".into(),
                bbox: BoundingBox::new(1.0, 1.0, 20.0, 10.0),
            },
            TextToken {
                text: "1.2.".into(),
                bbox: BoundingBox::new(22.0, 1.0, 45.0, 10.0),
            },
        ]]);
        let segments = vec![seg(1, SegmentType::SectionHeader, "1.2. Scope")];
        let doc = Assembler::new(OutputFormat::Markdown, &r, &t)
            .extract_toc(true)
            .assemble(&segments);
        assert_eq!(doc.parts[0].text, "# Table of Contents\n\n  - 1.2. Scope\n\n\n\n");
        assert_eq!(doc.parts[1].text, "## Scope 1.2.\n\n");
    }

    #[test]
    fn pictures_extracted_with_per_page_ids() {
        let r = PageRasters::new(
            72,
            vec![
                RgbImage::from_pixel(100, 100, Rgb([1, 2, 3])),
                RgbImage::from_pixel(100, 100, Rgb([4, 5, 6])),
            ],
        );
        let t = PageTokens::default();
        let pic = |page| Segment::new(page, BoundingBox::new(10.0, 10.0, 30.0, 40.0), SegmentType::Picture);
        let segments = vec![pic(1), pic(1), pic(2)];

        let doc = Assembler::new(OutputFormat::Markdown, &r, &t)
            .extract_images(true, "report")
            .assemble(&segments);
        let names: Vec<&str> = doc.images.iter().map(|i| i.filename.as_str()).collect();
        assert_eq!(names, vec!["report_1_0.png", "report_1_1.png", "report_2_0.png"]);
        assert!(doc
            .content()
            .starts_with("<img src='report_pictures/report_1_0.png' alt=''>\n\n"));
        let decoded = image::load_from_memory(&doc.images[0].image_data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (20, 30));
    }

    #[test]
    fn pictures_skipped_without_extraction() {
        let r = PageRasters::new(72, vec![RgbImage::new(100, 100)]);
        let t = PageTokens::default();
        let segments = vec![Segment::new(
            1,
            BoundingBox::new(10.0, 10.0, 30.0, 40.0),
            SegmentType::Picture,
        )];
        let doc = Assembler::new(OutputFormat::Markdown, &r, &t).assemble(&segments);
        assert_eq!(doc.content(), "");
        assert!(doc.images.is_empty());
    }

    #[test]
    fn translatable_parts() {
        let part = |kind, text: &str| ContentPart {
            kind,
            text: text.into(),
        };
        assert!(part(PartKind::Segment(SegmentType::Text), "hi").is_translatable());
        assert!(part(PartKind::TableOfContents, "# Table").is_translatable());
        assert!(!part(PartKind::Segment(SegmentType::Table), "<table/>").is_translatable());
        assert!(!part(PartKind::Segment(SegmentType::Picture), "<img>").is_translatable());
        assert!(!part(PartKind::Segment(SegmentType::Text), "  ").is_translatable());
    }
}
