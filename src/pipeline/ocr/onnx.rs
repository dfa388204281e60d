//! ONNX stages for the local backend, on `oar-ocr`.
//!
//! [`OnnxTextLines`] runs PP-OCR text detection and recognition over the
//! table crop. [`SlanetTableStructure`] runs a SLANet structure model that
//! predicts HTML structure tokens plus one box per cell; the recognised lines
//! are then placed into those cells by [`fill_structure`].
//!
//! Both hold their models for the life of the backend. Calls come from the
//! blocking pool, one table at a time.

use crate::error::OcrError;
use crate::pipeline::ocr::local::{
    cell_bounds, fill_structure, TableModelVariant, TableStructureModel, TextLineOcr, TextLines,
};
use crate::pipeline::ocr::TableRegion;
use image::RgbImage;
use oar_ocr::oarocr::{OAROCRBuilder, OAROCR};
use oar_ocr::predictors::TableStructureRecognitionPredictor;
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;
use tracing::debug;

fn require(path: &Path, what: &str) -> Result<(), OcrError> {
    if path.exists() {
        Ok(())
    } else {
        Err(OcrError::Engine(format!("{} not found: {}", what, path.display())))
    }
}

/// PP-OCR detection + recognition.
pub struct OnnxTextLines {
    ocr: OAROCR,
}

impl OnnxTextLines {
    pub fn new(det_model: &Path, rec_model: &Path, char_dict: &Path) -> Result<Self, OcrError> {
        require(det_model, "Text detection model")?;
        require(rec_model, "Text recognition model")?;
        require(char_dict, "Character dictionary")?;
        let start = Instant::now();
        let ocr = OAROCRBuilder::new(det_model, rec_model, char_dict)
            .build()
            .map_err(|e| OcrError::Engine(format!("Failed to load OCR models: {}", e)))?;
        debug!("OCR models loaded in {:?}", start.elapsed());
        Ok(Self { ocr })
    }
}

impl TextLineOcr for OnnxTextLines {
    fn name(&self) -> &str {
        "pp-ocr"
    }

    fn detect(&self, region: &TableRegion<'_>) -> Result<TextLines, OcrError> {
        let results = self
            .ocr
            .predict(vec![region.image.clone()])
            .map_err(|e| OcrError::Engine(format!("Text OCR failed: {}", e)))?;
        let mut lines = TextLines::default();
        let Some(result) = results.into_iter().next() else {
            return Ok(lines);
        };
        for text_region in &result.text_regions {
            let Some(text) = text_region.text.as_deref().filter(|t| !t.trim().is_empty()) else {
                continue;
            };
            let bbox = &text_region.bounding_box;
            lines.push(
                bbox.x_min(),
                bbox.y_min(),
                bbox.x_max(),
                bbox.y_max(),
                text.to_string(),
                text_region.confidence.unwrap_or(0.0),
            );
        }
        Ok(lines)
    }
}

/// SLANet table structure recognition.
pub struct SlanetTableStructure {
    predictor: Mutex<TableStructureRecognitionPredictor>,
    variant: TableModelVariant,
}

impl SlanetTableStructure {
    pub fn new(model: &Path, dict: &Path, variant: TableModelVariant) -> Result<Self, OcrError> {
        require(model, "Table structure model")?;
        require(dict, "Table structure dictionary")?;
        let (height, width) = variant.input_shape();
        let predictor = TableStructureRecognitionPredictor::builder()
            .dict_path(dict)
            .input_shape(height, width)
            .build(model)
            .map_err(|e| {
                OcrError::Engine(format!("Failed to load table model ({}): {}", variant, e))
            })?;
        Ok(Self {
            predictor: Mutex::new(predictor),
            variant,
        })
    }
}

impl TableStructureModel for SlanetTableStructure {
    fn name(&self) -> &str {
        match self.variant {
            TableModelVariant::SlanetPlus => "slanet_plus",
            TableModelVariant::SlanextWired => "slanext_wired",
        }
    }

    fn reconstruct(&self, image: &RgbImage, lines: &TextLines) -> Result<String, OcrError> {
        let predictor = self
            .predictor
            .lock()
            .map_err(|_| OcrError::Engine("table model lock poisoned".into()))?;
        let output = predictor
            .predict(vec![image.clone()])
            .map_err(|e| OcrError::Engine(format!("Table structure failed: {}", e)))?;
        drop(predictor);

        let (Some(structure), Some(boxes)) = (output.structures.first(), output.bboxes.first())
        else {
            return Ok(String::new());
        };
        let cells: Vec<[f32; 4]> = boxes.iter().map(|coords| cell_bounds(coords)).collect();
        debug!(
            "{}: {} structure tokens, {} cells, {} lines",
            self.name(),
            structure.len(),
            cells.len(),
            lines.len()
        );
        Ok(fill_structure(structure, &cells, lines))
    }
}
