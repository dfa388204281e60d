//! Formula marker reconciliation.
//!
//! Before OCR every formula inside a table is masked with a marker
//! (`FORMULA_001`, `FORMULA_002`, … in `(top, left)` order). After OCR the
//! markers are checked in the returned HTML; if any are missing the same
//! masked crop is sent again, up to a fixed number of attempts. The accepted
//! HTML then has each marker replaced by its formula's LaTeX, tolerating the
//! usual OCR spellings of the marker (space or nothing instead of the
//! underscore, lower case).

use crate::error::OcrError;
use crate::pipeline::ocr::{TableOcr, TableRegion};
use tracing::{debug, warn};

pub const MARKER_PREFIX: &str = "FORMULA";

/// Default total OCR attempts per table while markers are missing.
pub const MAX_OCR_ATTEMPTS: u32 = 3;

/// `FORMULA_{index:03}` for a 1-based index.
pub fn marker_label(index: usize) -> String {
    format!("{}_{:03}", MARKER_PREFIX, index)
}

/// A marker drawn into a table crop and the formula it stands for.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerBinding {
    pub marker: String,
    /// Index of the FORMULA segment in the request's segment list.
    pub formula_index: usize,
    pub latex: Option<String>,
}

/// Spellings to look for, most faithful first: exact, space for underscore,
/// underscore removed, then the lower case of each.
pub fn marker_variants(marker: &str) -> Vec<String> {
    let spaced = marker.replace('_', " ");
    let joined = marker.replace('_', "");
    let candidates = [
        marker.to_string(),
        spaced.clone(),
        joined.clone(),
        marker.to_lowercase(),
        spaced.to_lowercase(),
        joined.to_lowercase(),
    ];
    let mut variants: Vec<String> = Vec::with_capacity(candidates.len());
    for c in candidates {
        if !variants.contains(&c) {
            variants.push(c);
        }
    }
    variants
}

/// Markers that do not appear literally in `html`.
pub fn missing_markers(html: &str, markers: &[String]) -> Vec<String> {
    markers
        .iter()
        .filter(|m| !html.contains(m.as_str()))
        .cloned()
        .collect()
}

/// Outcome of [`recognize_with_markers`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recognition {
    /// Accepted HTML: the first attempt with every marker present, else the
    /// last non-empty attempt.
    pub html: Option<String>,
    pub attempts: u32,
    /// Markers absent from `html` (all markers when `html` is None).
    pub missing: Vec<String>,
    /// Backend failure that left no usable HTML.
    pub error: Option<OcrError>,
}

/// Run `backend` on `region`, retrying while any of `markers` is missing.
///
/// With no markers exactly one call is made. A backend error ends the loop:
/// the table is reported as failed unless an earlier attempt already
/// produced HTML, which is then kept.
pub async fn recognize_with_markers(
    backend: &dyn TableOcr,
    region: &TableRegion<'_>,
    markers: &[String],
    max_attempts: u32,
) -> Recognition {
    let limit = if markers.is_empty() {
        1
    } else {
        max_attempts.max(1)
    };
    let page = region.page_number;
    let mut out = Recognition {
        missing: markers.to_vec(),
        ..Default::default()
    };

    for attempt in 1..=limit {
        out.attempts = attempt;
        match backend.recognize(region).await {
            Ok(Some(html)) if !html.trim().is_empty() => {
                out.missing = missing_markers(&html, markers);
                out.html = Some(html);
                if out.missing.is_empty() {
                    break;
                }
                if attempt < limit {
                    warn!(
                        "Table on page {}: {} of {} formula markers missing (attempt {}/{}), retrying",
                        page,
                        out.missing.len(),
                        markers.len(),
                        attempt,
                        limit
                    );
                } else {
                    warn!(
                        "Table on page {}: {} formula markers still missing after {} attempts, keeping last result",
                        page,
                        out.missing.len(),
                        limit
                    );
                }
            }
            Ok(_) => {
                if attempt < limit {
                    warn!(
                        "Table on page {}: empty OCR result (attempt {}/{}), retrying",
                        page, attempt, limit
                    );
                } else {
                    debug!("Table on page {}: empty OCR result", page);
                }
            }
            Err(e) => {
                if out.html.is_some() {
                    warn!(
                        "Table on page {}: OCR failed on retry ({}), keeping earlier result",
                        page, e
                    );
                } else {
                    out.error = Some(e);
                }
                break;
            }
        }
    }
    out
}

/// Replace each bound marker with its LaTeX. Bindings without LaTeX leave
/// their marker in place. For each binding only the first variant found is
/// replaced (every occurrence of it). Returns the new HTML and the number of
/// markers substituted.
pub fn substitute_markers(html: &str, bindings: &[MarkerBinding]) -> (String, usize) {
    let mut out = html.to_string();
    let mut substituted = 0;
    for binding in bindings {
        let Some(latex) = binding
            .latex
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
        else {
            debug!("{}: no LaTeX, marker left in place", binding.marker);
            continue;
        };
        if let Some(variant) = marker_variants(&binding.marker)
            .into_iter()
            .find(|v| out.contains(v.as_str()))
        {
            out = out.replace(&variant, latex);
            substituted += 1;
        }
    }
    (out, substituted)
}
