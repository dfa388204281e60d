//! Conversion entry points.
//!
//! One request runs the stages in order:
//!
//! 1. resolve the input (path or URL) and rasterise every page once
//! 2. drop page footers from the layout segments
//! 3. recognise FORMULA segments that arrived without text
//! 4. recognise TABLE segments, masking contained formulas with markers
//! 5. assemble the document, then translate and package it when an output
//!    filename is configured
//!
//! Only input, PDF and packaging problems are fatal. Per-table and
//! per-formula failures are logged and recorded in the output.

use crate::config::{ConversionConfig, OcrMode};
use crate::error::Pdf2MarkupError;
use crate::output::{ConversionOutput, ConversionStats};
use crate::pipeline::assemble::Assembler;
use crate::pipeline::formula::{recognize_formulas, FormulaOutcome};
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::ocr::local::LocalTableOcr;
use crate::pipeline::ocr::remote::RemoteOcr;
use crate::pipeline::ocr::{FormulaOcr, TableOcr};
use crate::pipeline::package::{self, ArchiveContents};
use crate::pipeline::placeholder::MarkerFont;
use crate::pipeline::render::{self, PageTokens};
use crate::pipeline::tables::TablePipeline;
use crate::segment::{drop_page_footers, Segment};
use crate::translate::{self, LlmTranslator, Translator};
use edgequake_llm::ProviderFactory;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Convert a segmented PDF file or URL to Markdown or HTML.
///
/// `segments` is the layout analysis of the same document. Returns
/// `Ok(ConversionOutput)` even when some tables or formulas could not be
/// recognised; see `output.tables` and `output.stats`.
///
/// # Errors
/// Fatal problems only: unreadable or non-PDF input, wrong password,
/// rasterisation failure, an unavailable translation provider, or a failure
/// to build the archive.
pub async fn convert(
    input_str: impl AsRef<str>,
    segments: Vec<Segment>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2MarkupError> {
    let input_str = input_str.as_ref();
    info!("Starting conversion: {}", input_str);
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    convert_resolved(&resolved, segments, config).await
}

/// Convert PDF bytes held in memory.
///
/// The bytes are written to a managed temporary file that is removed when
/// the conversion returns.
///
/// # Example
/// ```rust,no_run
/// use pdf2markup::{convert_from_bytes, load_segments, ConversionConfig};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("document.pdf")?;
/// let segments = load_segments(Path::new("document.segments.json"))?;
/// let output = convert_from_bytes(&bytes, segments, &ConversionConfig::default()).await?;
/// println!("{}", output.content);
/// # Ok(())
/// # }
/// ```
pub async fn convert_from_bytes(
    bytes: &[u8],
    segments: Vec<Segment>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2MarkupError> {
    let resolved = input::materialise_bytes(bytes).await?;
    convert_resolved(&resolved, segments, config).await
}

/// Convert and write the result under `out_dir`.
///
/// Writes the zip archive (`{stem}.zip`) when the configuration names an
/// output file, otherwise `document{ext}`. Uses an atomic write (temp file
/// + rename). Returns the path written.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    segments: Vec<Segment>,
    out_dir: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<(std::path::PathBuf, ConversionStats), Pdf2MarkupError> {
    let output = convert(input_str, segments, config).await?;
    let out_dir = out_dir.as_ref();

    let (name, bytes) = match (&config.output_file, output.archive) {
        (Some(filename), Some(archive)) => (package::archive_name(filename), archive),
        _ => (
            format!("document{}", config.output_format.extension()),
            output.content.into_bytes(),
        ),
    };
    let path = out_dir.join(name);
    write_atomic(&path, &bytes).await?;
    info!("Wrote {}", path.display());
    Ok((path, output.stats))
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    segments: Vec<Segment>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2MarkupError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2MarkupError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, segments, config))
}

async fn convert_resolved(
    resolved: &ResolvedInput,
    segments: Vec<Segment>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2MarkupError> {
    let total_start = Instant::now();

    // ── Rasterise ────────────────────────────────────────────────────────
    let render_start = Instant::now();
    let rendered =
        render::render_document(resolved.path(), config.dpi, config.password.as_deref()).await?;
    let render_time_ms = render_start.elapsed().as_millis() as u64;
    info!(
        "Rendered {} pages at {} dpi in {}ms",
        rendered.rasters.len(),
        config.dpi,
        render_time_ms
    );

    let mut segments = drop_page_footers(segments);
    debug!("{} segments after dropping page footers", segments.len());

    // ── OCR ──────────────────────────────────────────────────────────────
    let backends = Backends::resolve(config, &rendered.tokens)?;
    let ocr_start = Instant::now();

    let formulas = match (&backends.formula, config.recognize_formulas) {
        (Some(recogniser), true) => {
            recognize_formulas(
                recogniser.as_ref(),
                &mut segments,
                &rendered.rasters,
                backends.table.concurrency_limit(),
            )
            .await
        }
        _ => FormulaOutcome::default(),
    };

    let tables = TablePipeline::new(Arc::clone(&backends.table))
        .font(MarkerFont::shared())
        .max_attempts(config.max_marker_attempts)
        .progress(config.progress_callback.clone())
        .run(&mut segments, &rendered.rasters)
        .await;
    let ocr_time_ms = ocr_start.elapsed().as_millis() as u64;

    // ── Assemble ─────────────────────────────────────────────────────────
    let base_name = config.base_name();
    let assembled = Assembler::new(config.output_format, &rendered.rasters, &rendered.tokens)
        .extract_toc(config.extract_toc)
        .extract_images(config.extracts_images(), base_name.as_str())
        .assemble(&segments);
    let content = assembled.content();

    // ── Translate + package ──────────────────────────────────────────────
    let mut translations = Vec::new();
    let mut archive = None;
    if let Some(filename) = &config.output_file {
        if !config.target_languages.is_empty() {
            let translator = resolve_translator(config)?;
            translations = translate::translate_document(
                translator.as_ref(),
                &assembled.parts,
                &config.target_languages,
            )
            .await;
        }
        archive = Some(package::build_archive(&ArchiveContents {
            filename,
            content: &content,
            images: &assembled.images,
            segments: &segments,
            translations: &translations,
        })?);
    }

    let tables_recognised = tables.results.iter().filter(|r| r.recognised).count();
    let stats = ConversionStats {
        total_pages: rendered.rasters.len(),
        total_segments: segments.len(),
        tables_total: tables.results.len(),
        tables_recognised,
        tables_failed: tables.results.len() - tables_recognised,
        formulas_total: formulas.attempted,
        formulas_recognised: formulas.recognised,
        markers_placed: tables.markers_placed,
        markers_substituted: tables.markers_substituted,
        ocr_calls: tables.ocr_calls + formulas.attempted as u32,
        pictures_extracted: assembled.images.len(),
        translations: translations.len(),
        render_time_ms,
        ocr_time_ms,
        total_time_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        "Conversion complete: {}/{} tables, {}/{} formulas, {}ms total",
        stats.tables_recognised,
        stats.tables_total,
        stats.formulas_recognised,
        stats.formulas_total,
        stats.total_time_ms
    );

    Ok(ConversionOutput {
        content,
        segments,
        images: assembled.images,
        tables: tables.results,
        stats,
        archive,
    })
}

/// OCR backends for one request.
struct Backends {
    table: Arc<dyn TableOcr>,
    formula: Option<Arc<dyn FormulaOcr>>,
}

impl Backends {
    /// Injected backends first. Remote mode shares one backend between
    /// tables and formulas; local mode runs the configured table models and
    /// keeps the analysis text of formulas.
    fn resolve(config: &ConversionConfig, tokens: &PageTokens) -> Result<Self, Pdf2MarkupError> {
        let remote = match config.ocr_mode {
            OcrMode::Remote if config.table_ocr.is_none() || config.formula_ocr.is_none() => {
                Some(Arc::new(remote_backend(config)?))
            }
            _ => None,
        };

        let table: Arc<dyn TableOcr> = match (&config.table_ocr, &remote) {
            (Some(injected), _) => Arc::clone(injected),
            (None, Some(remote)) => Arc::clone(remote) as Arc<dyn TableOcr>,
            (None, None) => {
                let local = LocalTableOcr::from_config(&config.local_ocr, tokens).map_err(|e| {
                    Pdf2MarkupError::ProviderNotConfigured {
                        provider: "local-ocr".to_string(),
                        hint: e.to_string(),
                    }
                })?;
                Arc::new(local)
            }
        };
        let formula: Option<Arc<dyn FormulaOcr>> = match (&config.formula_ocr, &remote) {
            (Some(injected), _) => Some(Arc::clone(injected)),
            (None, Some(remote)) => Some(Arc::clone(remote) as Arc<dyn FormulaOcr>),
            (None, None) => None,
        };
        debug!("Table OCR backend: {}", table.name());
        Ok(Self { table, formula })
    }
}

/// Injected provider, then a named `edgequake-llm` provider, then the HTTP
/// endpoint.
fn remote_backend(config: &ConversionConfig) -> Result<RemoteOcr, Pdf2MarkupError> {
    let remote = &config.remote_ocr;
    if let Some(provider) = &config.ocr_provider {
        return Ok(RemoteOcr::with_provider(Arc::clone(provider), remote));
    }
    if let Some(name) = &remote.provider {
        let provider = ProviderFactory::create_llm_provider(name, &remote.model).map_err(|e| {
            Pdf2MarkupError::ProviderNotConfigured {
                provider: name.clone(),
                hint: e.to_string(),
            }
        })?;
        return Ok(RemoteOcr::with_provider(provider, remote));
    }
    RemoteOcr::new(remote).map_err(|e| Pdf2MarkupError::ProviderNotConfigured {
        provider: "remote-ocr".to_string(),
        hint: format!("{} ({})", e, remote.base_url),
    })
}

fn resolve_translator(config: &ConversionConfig) -> Result<Arc<dyn Translator>, Pdf2MarkupError> {
    if let Some(translator) = &config.translator {
        return Ok(Arc::clone(translator));
    }
    Ok(Arc::new(LlmTranslator::from_env()?))
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Pdf2MarkupError> {
    let fail = |e: std::io::Error| Pdf2MarkupError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);
    tokio::fs::write(&tmp_path, bytes).await.map_err(fail)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(fail)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RemoteOcrConfig;

    #[test]
    fn local_mode_has_no_formula_backend() {
        let config = ConversionConfig::default();
        let backends = Backends::resolve(&config, &PageTokens::default()).unwrap();
        assert_eq!(backends.table.name(), "local");
        assert!(backends.formula.is_none());
    }

    #[test]
    fn missing_local_model_files_are_fatal() {
        let config = ConversionConfig {
            local_ocr: crate::config::LocalOcrConfig {
                table_model: Some("/nonexistent/slanet.onnx".into()),
                table_dict: Some("/nonexistent/dict.txt".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            Backends::resolve(&config, &PageTokens::default()),
            Err(Pdf2MarkupError::ProviderNotConfigured { .. })
        ));
    }

    #[test]
    fn named_provider_carries_remote_calls() {
        let config = ConversionConfig::builder()
            .remote_ocr(RemoteOcrConfig {
                enabled: true,
                provider: Some("mock".into()),
                ..Default::default()
            })
            .build()
            .unwrap();
        let backends = Backends::resolve(&config, &PageTokens::default()).unwrap();
        assert_eq!(backends.table.name(), "remote-llm");
        assert!(backends.table.uses_formula_markers());
        assert!(backends.formula.is_some());
    }

    #[test]
    fn injected_provider_wins_over_endpoint() {
        let config = ConversionConfig::builder()
            .ocr_mode(OcrMode::Remote)
            .ocr_provider(Arc::new(edgequake_llm::MockProvider::new()))
            .build()
            .unwrap();
        let backends = Backends::resolve(&config, &PageTokens::default()).unwrap();
        assert_eq!(backends.table.name(), "remote-llm");
    }

    #[test]
    fn unknown_provider_is_fatal() {
        let config = ConversionConfig::builder()
            .remote_ocr(RemoteOcrConfig {
                enabled: true,
                provider: Some("no-such-provider".into()),
                ..Default::default()
            })
            .build()
            .unwrap();
        assert!(matches!(
            Backends::resolve(&config, &PageTokens::default()),
            Err(Pdf2MarkupError::ProviderNotConfigured { .. })
        ));
    }

    #[test]
    fn remote_mode_shares_one_backend() {
        let config = ConversionConfig::builder()
            .remote_ocr(RemoteOcrConfig {
                enabled: true,
                ..Default::default()
            })
            .build()
            .unwrap();
        let backends = Backends::resolve(&config, &PageTokens::default()).unwrap();
        assert_eq!(backends.table.name(), "remote");
        assert!(backends.table.uses_formula_markers());
        assert!(backends.formula.is_some());
    }

    #[tokio::test]
    async fn write_atomic_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.md");
        write_atomic(&path, b"hello").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
        assert!(!dir.path().join("nested").join("out.md.tmp").exists());
    }

    #[tokio::test]
    async fn missing_input_is_fatal() {
        let err = convert("/nonexistent/file.pdf", Vec::new(), &ConversionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Pdf2MarkupError::FileNotFound { .. }));
    }
}
