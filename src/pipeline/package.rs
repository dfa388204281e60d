//! Zip packaging of a finished conversion.
//!
//! Archive layout for an output filename `report.md`:
//!
//! ```text
//! report.md
//! report_pictures/report_1_0.png
//! report_segmentation.json
//! report_French.md
//! ```

use crate::error::Pdf2MarkupError;
use crate::output::ExtractedImage;
use crate::segment::Segment;
use serde::Serialize;
use std::io::{Cursor, Write};
use std::path::Path;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Everything that goes into one archive.
pub struct ArchiveContents<'a> {
    /// Name of the main document entry, e.g. `report.md`.
    pub filename: &'a str,
    pub content: &'a str,
    pub images: &'a [ExtractedImage],
    pub segments: &'a [Segment],
    /// `(language, translated content)` pairs.
    pub translations: &'a [(String, String)],
}

/// `report.md` → `report`.
pub fn file_stem(filename: &str) -> &str {
    Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename)
}

/// `report.md` → `.md`; empty when the filename has no extension.
pub fn file_suffix(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|s| s.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default()
}

/// `report.md` → `report.zip`.
pub fn archive_name(filename: &str) -> String {
    format!("{}.zip", file_stem(filename))
}

/// Segments as a 4-space indented JSON array. Non-ASCII text is written
/// as-is.
pub fn segmentation_json(segments: &[Segment]) -> Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    segments.serialize(&mut ser)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Build the archive in memory.
pub fn build_archive(contents: &ArchiveContents<'_>) -> Result<Vec<u8>, Pdf2MarkupError> {
    let fail = |detail: String| Pdf2MarkupError::ArchiveFailed {
        filename: contents.filename.to_string(),
        detail,
    };
    let stem = file_stem(contents.filename);
    let suffix = file_suffix(contents.filename);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let mut add = |name: &str, bytes: &[u8]| -> Result<(), Pdf2MarkupError> {
        zip.start_file(name, options)
            .map_err(|e| fail(format!("{}: {}", name, e)))?;
        zip.write_all(bytes)
            .map_err(|e| fail(format!("{}: {}", name, e)))?;
        debug!("Archived {} ({} bytes)", name, bytes.len());
        Ok(())
    };

    add(contents.filename, contents.content.as_bytes())?;
    for image in contents.images {
        add(
            &format!("{}_pictures/{}", stem, image.filename),
            &image.image_data,
        )?;
    }
    for (language, translated) in contents.translations {
        add(&format!("{}_{}{}", stem, language, suffix), translated.as_bytes())?;
    }
    let json = segmentation_json(contents.segments).map_err(|e| fail(e.to_string()))?;
    add(&format!("{}_segmentation.json", stem), json.as_bytes())?;

    let cursor = zip.finish().map_err(|e| fail(e.to_string()))?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{BoundingBox, SegmentType};
    use std::io::Read;
    use zip::ZipArchive;

    #[test]
    fn names_derive_from_output_filename() {
        assert_eq!(file_stem("report.md"), "report");
        assert_eq!(file_suffix("report.md"), ".md");
        assert_eq!(file_suffix("report"), "");
        assert_eq!(archive_name("report.html"), "report.zip");
    }

    #[test]
    fn segmentation_json_is_four_space_indented_utf8() {
        let segments =
            vec![Segment::new(1, BoundingBox::new(1.0, 2.0, 3.0, 4.0), SegmentType::Text)
                .with_text("Größe")];
        let json = segmentation_json(&segments).unwrap();
        assert!(json.starts_with("[\n    {\n        \""), "got: {json}");
        assert!(json.contains("Größe"));
    }

    #[test]
    fn archive_contains_every_entry() {
        let images = vec![ExtractedImage {
            filename: "report_1_0.png".into(),
            image_data: vec![1, 2, 3],
        }];
        let translations = vec![("French".to_string(), "Bonjour".to_string())];
        let segments = vec![Segment::new(1, BoundingBox::default(), SegmentType::Title)];
        let bytes = build_archive(&ArchiveContents {
            filename: "report.md",
            content: "# Hello",
            images: &images,
            segments: &segments,
            translations: &translations,
        })
        .unwrap();

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "report.md",
                "report_French.md",
                "report_pictures/report_1_0.png",
                "report_segmentation.json",
            ]
        );

        let mut doc = String::new();
        archive
            .by_name("report.md")
            .unwrap()
            .read_to_string(&mut doc)
            .unwrap();
        assert_eq!(doc, "# Hello");
    }
}
