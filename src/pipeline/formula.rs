//! Formula recognition: fill FORMULA segments with LaTeX before tables run,
//! so the table pipeline has something to splice in place of its markers.

use crate::pipeline::geometry::PixelBox;
use crate::pipeline::ocr::FormulaOcr;
use crate::pipeline::render::PageRasters;
use crate::segment::{Segment, SegmentType};
use futures::stream::{self, StreamExt};
use image::imageops;
use tracing::{debug, info, warn};

/// Counts from one formula pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormulaOutcome {
    /// FORMULA segments that had no text and were sent to OCR.
    pub attempted: usize,
    pub recognised: usize,
}

/// Recognise every FORMULA segment without text. Failures leave the segment
/// empty.
pub async fn recognize_formulas(
    recogniser: &dyn FormulaOcr,
    segments: &mut [Segment],
    rasters: &PageRasters,
    concurrency: usize,
) -> FormulaOutcome {
    let crops: Vec<(usize, usize, image::RgbImage)> = segments
        .iter()
        .enumerate()
        .filter(|(_, s)| s.segment_type == SegmentType::Formula && !s.has_text())
        .filter_map(|(i, s)| {
            let raster = rasters.get(s.page_number)?;
            let (x, y, w, h) = PixelBox::from_points(&s.bounding_box, rasters.dpi)
                .crop_rect(raster.width(), raster.height())?;
            Some((i, s.page_number, imageops::crop_imm(raster, x, y, w, h).to_image()))
        })
        .collect();

    let mut outcome = FormulaOutcome {
        attempted: crops.len(),
        ..Default::default()
    };
    if crops.is_empty() {
        return outcome;
    }
    info!("Recognising {} formulas", crops.len());

    let results: Vec<(usize, Option<String>)> = stream::iter(crops.iter())
        .map(|(index, page, crop)| async move {
            match recogniser.recognize_formula(crop).await {
                Ok(latex) => (*index, latex),
                Err(e) => {
                    warn!("Formula on page {}: OCR failed, left empty: {}", page, e);
                    (*index, None)
                }
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    for (index, latex) in results {
        if let Some(latex) = latex.filter(|l| !l.trim().is_empty()) {
            debug!("Formula {}: {} chars of LaTeX", index, latex.len());
            segments[index].text_content = Some(latex);
            outcome.recognised += 1;
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OcrError;
    use crate::segment::BoundingBox;
    use async_trait::async_trait;
    use image::RgbImage;

    struct SizeReporter;

    #[async_trait]
    impl FormulaOcr for SizeReporter {
        async fn recognize_formula(&self, image: &RgbImage) -> Result<Option<String>, OcrError> {
            if image.width() > 50 {
                Err(OcrError::Engine("too wide".into()))
            } else {
                Ok(Some(format!("w={}", image.width())))
            }
        }
    }

    #[tokio::test]
    async fn fills_only_empty_formulas() {
        let mut segments = vec![
            Segment::new(1, BoundingBox::new(0.0, 0.0, 20.0, 10.0), SegmentType::Formula),
            Segment::new(1, BoundingBox::new(0.0, 0.0, 20.0, 10.0), SegmentType::Formula)
                .with_text("kept"),
            Segment::new(1, BoundingBox::new(0.0, 0.0, 80.0, 10.0), SegmentType::Formula),
            Segment::new(1, BoundingBox::new(0.0, 0.0, 20.0, 10.0), SegmentType::Text),
        ];
        let rasters = PageRasters::new(72, vec![RgbImage::new(100, 100)]);
        let outcome = recognize_formulas(&SizeReporter, &mut segments, &rasters, 2).await;

        assert_eq!(outcome.attempted, 2);
        assert_eq!(outcome.recognised, 1);
        assert_eq!(segments[0].text(), "w=20");
        assert_eq!(segments[1].text(), "kept");
        assert!(segments[2].text_content.is_none());
        assert!(segments[3].text_content.is_none());
    }
}
