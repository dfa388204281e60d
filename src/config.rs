//! Configuration types for segmented-PDF conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. OCR backends, the formula recogniser,
//! the translator and the progress callback are injected as trait objects so
//! tests and embedding applications can swap any of them out.
//!
//! OCR backend settings have their own structs, [`RemoteOcrConfig`] and
//! [`LocalOcrConfig`], which can be read from `REMOTE_OCR_*` and
//! `LOCAL_OCR_*` environment variables.

use crate::error::Pdf2MarkupError;
use crate::pipeline::ocr::local::TableModelVariant;
use crate::pipeline::ocr::{FormulaOcr, TableOcr};
use crate::progress::ProgressCallback;
use crate::translate::Translator;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Configuration for one conversion request.
///
/// # Example
/// ```rust
/// use pdf2markup::{ConversionConfig, OutputFormat};
///
/// let config = ConversionConfig::builder()
///     .dpi(150)
///     .output_format(OutputFormat::Html)
///     .extract_toc(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 150);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Rendering DPI for page rasters. Range: 72–400. Default: 120.
    ///
    /// Every pixel-space box is derived as `floor(points * dpi / 72)`.
    pub dpi: u32,

    /// Markup dialect of the assembled document. Default: Markdown.
    pub output_format: OutputFormat,

    /// Prepend a table of contents built from titles and section headers.
    pub extract_toc: bool,

    /// Output document filename (e.g. `report.md`). When set, pictures are
    /// extracted and a zip archive is produced.
    pub output_file: Option<String>,

    /// Languages to translate the document into. Only used together with
    /// `output_file`.
    pub target_languages: Vec<String>,

    /// Which table OCR backend to build when none is injected.
    pub ocr_mode: OcrMode,

    /// Settings for the remote vision-language OCR endpoint.
    pub remote_ocr: RemoteOcrConfig,

    /// Model files for the local backend.
    pub local_ocr: LocalOcrConfig,

    /// Run formula recognition on FORMULA segments that have no text.
    /// Default: true.
    pub recognize_formulas: bool,

    /// Total OCR attempts per table while formula markers are missing.
    /// Default: 3.
    pub max_marker_attempts: u32,

    /// Pre-constructed table OCR backend. Takes precedence over `ocr_mode`.
    pub table_ocr: Option<Arc<dyn TableOcr>>,

    /// Pre-constructed formula recogniser.
    pub formula_ocr: Option<Arc<dyn FormulaOcr>>,

    /// Pre-constructed `edgequake-llm` provider carrying remote OCR calls.
    /// Takes precedence over `remote_ocr.provider` and the HTTP endpoint.
    pub ocr_provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed translator. If None and translation is requested, an
    /// LLM translator is built from the environment.
    pub translator: Option<Arc<dyn Translator>>,

    /// Per-table progress events.
    pub progress_callback: Option<ProgressCallback>,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            dpi: 120,
            output_format: OutputFormat::default(),
            extract_toc: false,
            output_file: None,
            target_languages: Vec::new(),
            ocr_mode: OcrMode::default(),
            remote_ocr: RemoteOcrConfig::default(),
            local_ocr: LocalOcrConfig::default(),
            recognize_formulas: true,
            max_marker_attempts: 3,
            table_ocr: None,
            formula_ocr: None,
            ocr_provider: None,
            translator: None,
            progress_callback: None,
            password: None,
            download_timeout_secs: 120,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("dpi", &self.dpi)
            .field("output_format", &self.output_format)
            .field("extract_toc", &self.extract_toc)
            .field("output_file", &self.output_file)
            .field("target_languages", &self.target_languages)
            .field("ocr_mode", &self.ocr_mode)
            .field("remote_ocr", &self.remote_ocr)
            .field("local_ocr", &self.local_ocr)
            .field("recognize_formulas", &self.recognize_formulas)
            .field("max_marker_attempts", &self.max_marker_attempts)
            .field("table_ocr", &self.table_ocr.as_ref().map(|o| o.name()))
            .field("formula_ocr", &self.formula_ocr.as_ref().map(|_| "<dyn FormulaOcr>"))
            .field("ocr_provider", &self.ocr_provider.as_ref().map(|p| p.name()))
            .field("translator", &self.translator.as_ref().map(|_| "<dyn Translator>"))
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Pictures are cropped out only when a named output is requested.
    pub fn extracts_images(&self) -> bool {
        self.output_file.is_some()
    }

    /// Base name used for picture names and archive entries: the output
    /// filename without its extension, or `"document"`.
    pub fn base_name(&self) -> String {
        self.output_file
            .as_deref()
            .map(|f| match f.rsplit_once('.') {
                Some((stem, _)) if !stem.is_empty() => stem.to_string(),
                _ => f.to_string(),
            })
            .unwrap_or_else(|| "document".to_string())
    }
}

/// Builder for [`ConversionConfig`].
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl fmt::Debug for ConversionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ConversionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    pub fn extract_toc(mut self, v: bool) -> Self {
        self.config.extract_toc = v;
        self
    }

    pub fn output_file(mut self, name: impl Into<String>) -> Self {
        self.config.output_file = Some(name.into());
        self
    }

    pub fn target_languages<I, S>(mut self, langs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.target_languages = langs
            .into_iter()
            .map(Into::<String>::into)
            .filter(|l| !l.trim().is_empty())
            .collect();
        self
    }

    pub fn ocr_mode(mut self, mode: OcrMode) -> Self {
        self.config.ocr_mode = mode;
        self
    }

    /// Set remote OCR settings. An enabled config also switches the OCR mode
    /// to [`OcrMode::Remote`].
    pub fn remote_ocr(mut self, remote: RemoteOcrConfig) -> Self {
        if remote.enabled {
            self.config.ocr_mode = OcrMode::Remote;
        }
        self.config.remote_ocr = remote;
        self
    }

    pub fn local_ocr(mut self, local: LocalOcrConfig) -> Self {
        self.config.local_ocr = local;
        self
    }

    pub fn recognize_formulas(mut self, v: bool) -> Self {
        self.config.recognize_formulas = v;
        self
    }

    pub fn max_marker_attempts(mut self, n: u32) -> Self {
        self.config.max_marker_attempts = n;
        self
    }

    pub fn table_ocr(mut self, backend: Arc<dyn TableOcr>) -> Self {
        self.config.table_ocr = Some(backend);
        self
    }

    pub fn formula_ocr(mut self, recogniser: Arc<dyn FormulaOcr>) -> Self {
        self.config.formula_ocr = Some(recogniser);
        self
    }

    /// Route remote OCR through an `edgequake-llm` provider.
    pub fn ocr_provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.ocr_provider = Some(provider);
        self
    }

    pub fn translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.config.translator = Some(translator);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2MarkupError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(Pdf2MarkupError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.max_marker_attempts == 0 {
            return Err(Pdf2MarkupError::InvalidConfig(
                "max_marker_attempts must be ≥ 1".into(),
            ));
        }
        if c.ocr_mode == OcrMode::Remote && c.table_ocr.is_none() {
            let routed = c.ocr_provider.is_some() || c.remote_ocr.provider.is_some();
            if !routed && c.remote_ocr.base_url.trim().is_empty() {
                return Err(Pdf2MarkupError::InvalidConfig(
                    "remote OCR base URL is empty".into(),
                ));
            }
            if c.remote_ocr.max_concurrency == 0 {
                return Err(Pdf2MarkupError::InvalidConfig(
                    "remote OCR concurrency must be ≥ 1".into(),
                ));
            }
        }
        if c.ocr_mode == OcrMode::Local && c.table_ocr.is_none() {
            c.local_ocr.validate()?;
        }
        if !c.target_languages.is_empty() && c.output_file.is_none() {
            warn!("Target languages given without an output file; translation is skipped");
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Markup dialect of the assembled document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Html,
}

impl OutputFormat {
    /// File extension including the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => ".md",
            OutputFormat::Html => ".html",
        }
    }
}

/// Table OCR backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrMode {
    /// Two-stage local engine: text lines, then table structure.
    #[default]
    Local,
    /// Vision-language model behind an OpenAI-compatible endpoint.
    Remote,
}

// ── Remote OCR ───────────────────────────────────────────────────────────

pub const DEFAULT_REMOTE_BASE_URL: &str = "http://vllm-ocr:8000/v1";
pub const DEFAULT_REMOTE_API_KEY: &str = "123";
pub const DEFAULT_REMOTE_MODEL: &str = "nanonets/Nanonets-OCR2-1.5B-exp";

/// Settings for the remote OCR endpoint.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteOcrConfig {
    pub enabled: bool,
    /// Base URL up to and including `/v1`.
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum in-flight table requests.
    pub max_concurrency: usize,
    /// Crops smaller than this on either side are padded with white.
    pub min_image_side: u32,
    /// `edgequake-llm` provider name (`openai`, `ollama`, …). When set,
    /// calls go through that provider with `model` instead of `base_url`.
    pub provider: Option<String>,
}

impl Default for RemoteOcrConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: DEFAULT_REMOTE_BASE_URL.to_string(),
            api_key: DEFAULT_REMOTE_API_KEY.to_string(),
            model: DEFAULT_REMOTE_MODEL.to_string(),
            temperature: 0.5,
            timeout_secs: 120,
            max_concurrency: 4,
            min_image_side: 32,
            provider: None,
        }
    }
}

impl fmt::Debug for RemoteOcrConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteOcrConfig")
            .field("enabled", &self.enabled)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_concurrency", &self.max_concurrency)
            .field("min_image_side", &self.min_image_side)
            .field("provider", &self.provider)
            .finish()
    }
}

impl RemoteOcrConfig {
    /// Read `REMOTE_OCR_*` variables from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary lookup. Unset or unparseable
    /// values keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        if let Some(v) = lookup("REMOTE_OCR_ENABLED") {
            cfg.enabled = parse_flag(&v);
        }
        if let Some(v) = lookup("REMOTE_OCR_BASE_URL").filter(|v| !v.trim().is_empty()) {
            cfg.base_url = v.trim().trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("REMOTE_OCR_API_KEY") {
            cfg.api_key = v;
        }
        if let Some(v) = lookup("REMOTE_OCR_MODEL").filter(|v| !v.trim().is_empty()) {
            cfg.model = v.trim().to_string();
        }
        cfg.temperature = parse_or("REMOTE_OCR_TEMPERATURE", &lookup, cfg.temperature);
        cfg.timeout_secs = parse_or("REMOTE_OCR_TIMEOUT_SEC", &lookup, cfg.timeout_secs);
        cfg.max_concurrency =
            parse_or("REMOTE_OCR_MAX_CONCURRENCY", &lookup, cfg.max_concurrency).max(1);
        cfg.min_image_side = parse_or("REMOTE_OCR_MIN_IMAGE_SIDE", &lookup, cfg.min_image_side);
        cfg.provider = non_empty(lookup("REMOTE_OCR_PROVIDER"));
        cfg
    }
}

// ── Local OCR ────────────────────────────────────────────────────────────

/// Model files for the local backend. A stage without its files falls back
/// to the PDF text layer (lines) or line clustering (structure).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalOcrConfig {
    /// PP-OCR text detection model (ONNX).
    pub det_model: Option<PathBuf>,
    /// PP-OCR text recognition model (ONNX).
    pub rec_model: Option<PathBuf>,
    /// Character dictionary of the recognition model.
    pub char_dict: Option<PathBuf>,
    /// SLANet table structure model (ONNX).
    pub table_model: Option<PathBuf>,
    /// Structure token dictionary of the table model.
    pub table_dict: Option<PathBuf>,
    pub table_model_type: TableModelVariant,
}

impl LocalOcrConfig {
    /// Read `LOCAL_OCR_*` variables from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let path = |key: &str| non_empty(lookup(key)).map(PathBuf::from);
        let mut cfg = Self {
            det_model: path("LOCAL_OCR_DET_MODEL"),
            rec_model: path("LOCAL_OCR_REC_MODEL"),
            char_dict: path("LOCAL_OCR_CHAR_DICT"),
            table_model: path("LOCAL_OCR_TABLE_MODEL"),
            table_dict: path("LOCAL_OCR_TABLE_DICT"),
            ..Self::default()
        };
        if let Some(raw) = lookup("LOCAL_OCR_TABLE_MODEL_TYPE") {
            match raw.parse() {
                Ok(variant) => cfg.table_model_type = variant,
                Err(e) => warn!("Ignoring LOCAL_OCR_TABLE_MODEL_TYPE: {}", e),
            }
        }
        cfg
    }

    /// Detection model, recognition model and dictionary, when all are set.
    pub fn text_models(&self) -> Option<(&Path, &Path, &Path)> {
        Some((
            self.det_model.as_deref()?,
            self.rec_model.as_deref()?,
            self.char_dict.as_deref()?,
        ))
    }

    /// Table model and its dictionary, when both are set.
    pub fn structure_model(&self) -> Option<(&Path, &Path)> {
        Some((self.table_model.as_deref()?, self.table_dict.as_deref()?))
    }

    /// A stage must name all of its files or none.
    pub fn validate(&self) -> Result<(), Pdf2MarkupError> {
        let text = [&self.det_model, &self.rec_model, &self.char_dict];
        let set = text.iter().filter(|p| p.is_some()).count();
        if set != 0 && set != text.len() {
            return Err(Pdf2MarkupError::InvalidConfig(
                "local OCR needs detection model, recognition model and character dictionary together"
                    .into(),
            ));
        }
        if self.table_model.is_some() != self.table_dict.is_some() {
            return Err(Pdf2MarkupError::InvalidConfig(
                "local table model and its dictionary must be given together".into(),
            ));
        }
        Ok(())
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_flag(v: &str) -> bool {
    matches!(
        v.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_or<T>(key: &str, lookup: &impl Fn(&str) -> Option<String>, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring {}={:?}: not a valid value", key, raw);
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults() {
        let c = ConversionConfig::default();
        assert_eq!(c.dpi, 120);
        assert_eq!(c.max_marker_attempts, 3);
        assert_eq!(c.ocr_mode, OcrMode::Local);
        assert!(!c.extracts_images());
        assert_eq!(c.base_name(), "document");
    }

    #[test]
    fn builder_clamps_dpi() {
        let c = ConversionConfig::builder().dpi(1000).build().unwrap();
        assert_eq!(c.dpi, 400);
        let c = ConversionConfig::builder().dpi(10).build().unwrap();
        assert_eq!(c.dpi, 72);
    }

    #[test]
    fn zero_attempts_rejected() {
        let err = ConversionConfig::builder()
            .max_marker_attempts(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, Pdf2MarkupError::InvalidConfig(_)));
    }

    #[test]
    fn base_name_strips_extension() {
        let c = ConversionConfig::builder()
            .output_file("annual.report.md")
            .build()
            .unwrap();
        assert_eq!(c.base_name(), "annual.report");
        assert!(c.extracts_images());
    }

    #[test]
    fn enabled_remote_switches_mode() {
        let remote = RemoteOcrConfig {
            enabled: true,
            ..Default::default()
        };
        let c = ConversionConfig::builder().remote_ocr(remote).build().unwrap();
        assert_eq!(c.ocr_mode, OcrMode::Remote);
    }

    #[test]
    fn remote_from_lookup_defaults() {
        let cfg = RemoteOcrConfig::from_lookup(|_| None);
        assert!(!cfg.enabled);
        assert_eq!(cfg.base_url, "http://vllm-ocr:8000/v1");
        assert_eq!(cfg.api_key, "123");
        assert_eq!(cfg.model, "nanonets/Nanonets-OCR2-1.5B-exp");
        assert_eq!(cfg.temperature, 0.5);
        assert_eq!(cfg.timeout_secs, 120);
        assert_eq!(cfg.max_concurrency, 4);
        assert_eq!(cfg.min_image_side, 32);
    }

    #[test]
    fn remote_from_lookup_overrides() {
        let cfg = RemoteOcrConfig::from_lookup(lookup_from(&[
            ("REMOTE_OCR_ENABLED", "True"),
            ("REMOTE_OCR_BASE_URL", "http://localhost:9000/v1/"),
            ("REMOTE_OCR_TEMPERATURE", "0.0"),
            ("REMOTE_OCR_TIMEOUT_SEC", "30"),
            ("REMOTE_OCR_MAX_CONCURRENCY", "0"),
            ("REMOTE_OCR_MIN_IMAGE_SIDE", "not-a-number"),
        ]));
        assert!(cfg.enabled);
        assert_eq!(cfg.base_url, "http://localhost:9000/v1");
        assert_eq!(cfg.temperature, 0.0);
        assert_eq!(cfg.timeout_secs, 30);
        assert_eq!(cfg.max_concurrency, 1);
        assert_eq!(cfg.min_image_side, 32);
    }

    #[test]
    fn remote_provider_from_lookup() {
        let cfg = RemoteOcrConfig::from_lookup(lookup_from(&[("REMOTE_OCR_PROVIDER", " ollama ")]));
        assert_eq!(cfg.provider.as_deref(), Some("ollama"));
        let cfg = RemoteOcrConfig::from_lookup(lookup_from(&[("REMOTE_OCR_PROVIDER", "")]));
        assert!(cfg.provider.is_none());
    }

    #[test]
    fn provider_replaces_base_url() {
        let remote = RemoteOcrConfig {
            enabled: true,
            base_url: String::new(),
            provider: Some("mock".into()),
            ..Default::default()
        };
        assert!(ConversionConfig::builder().remote_ocr(remote).build().is_ok());
    }

    #[test]
    fn local_from_lookup() {
        let cfg = LocalOcrConfig::from_lookup(lookup_from(&[
            ("LOCAL_OCR_DET_MODEL", "/models/det.onnx"),
            ("LOCAL_OCR_REC_MODEL", "/models/rec.onnx"),
            ("LOCAL_OCR_CHAR_DICT", "/models/keys.txt"),
            ("LOCAL_OCR_TABLE_MODEL", "  "),
            ("LOCAL_OCR_TABLE_MODEL_TYPE", "slanext_wired"),
        ]));
        let (det, _, dict) = cfg.text_models().unwrap();
        assert_eq!(det, Path::new("/models/det.onnx"));
        assert_eq!(dict, Path::new("/models/keys.txt"));
        assert!(cfg.structure_model().is_none());
        assert_eq!(cfg.table_model_type, TableModelVariant::SlanextWired);

        let cfg = LocalOcrConfig::from_lookup(lookup_from(&[("LOCAL_OCR_TABLE_MODEL_TYPE", "grid")]));
        assert_eq!(cfg.table_model_type, TableModelVariant::SlanetPlus);
    }

    #[test]
    fn partial_local_models_rejected() {
        let local = LocalOcrConfig {
            det_model: Some("/models/det.onnx".into()),
            ..Default::default()
        };
        let err = ConversionConfig::builder().local_ocr(local).build().unwrap_err();
        assert!(matches!(err, Pdf2MarkupError::InvalidConfig(_)));

        let local = LocalOcrConfig {
            table_model: Some("/models/slanet.onnx".into()),
            ..Default::default()
        };
        assert!(ConversionConfig::builder().local_ocr(local).build().is_err());
    }

    #[test]
    fn api_key_is_redacted_in_debug() {
        let cfg = RemoteOcrConfig {
            api_key: "sk-secret".into(),
            ..Default::default()
        };
        assert!(!format!("{cfg:?}").contains("sk-secret"));
    }

    #[test]
    fn output_format_extension() {
        assert_eq!(OutputFormat::Markdown.extension(), ".md");
        assert_eq!(OutputFormat::Html.extension(), ".html");
    }
}
