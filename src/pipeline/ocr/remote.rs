//! Remote OCR through a vision-language model.
//!
//! The crop is PNG-encoded into a base64 data URL (padded to a minimum side)
//! and posted to `{base_url}/chat/completions` with a single user message
//! holding the image part and a fixed instruction. The reply's
//! `choices[0].message.content` is stripped of a surrounding triple-backtick
//! fence and returned as-is.
//!
//! One `reqwest::Client` is built per backend; it pools connections and is
//! shared by every in-flight call. Alternatively an `edgequake-llm` provider
//! can carry the request, either injected or named through
//! [`RemoteOcrConfig::provider`].

use crate::config::RemoteOcrConfig;
use crate::error::OcrError;
use crate::pipeline::encode::{encode_image_data, png_data_url};
use crate::pipeline::ocr::{FormulaOcr, TableOcr, TableRegion};
use crate::prompts::{FORMULA_LATEX_PROMPT, TABLE_HTML_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use image::RgbImage;
use once_cell::sync::OnceCell;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use tracing::debug;

enum Transport {
    Http {
        client: reqwest::Client,
        /// Separate pool for [`RemoteOcr::recognize_blocking`], whose calls
        /// run on a private runtime.
        blocking_client: reqwest::Client,
        endpoint: String,
        api_key: String,
    },
    Provider(Arc<dyn LLMProvider>),
}

/// Vision-language OCR backend.
pub struct RemoteOcr {
    transport: Transport,
    model: String,
    temperature: f32,
    timeout: Duration,
    max_concurrency: usize,
    min_image_side: u32,
    blocking_runtime: OnceCell<Runtime>,
}

impl std::fmt::Debug for RemoteOcr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let transport = match &self.transport {
            Transport::Http { endpoint, .. } => endpoint.as_str(),
            Transport::Provider(_) => "<dyn LLMProvider>",
        };
        f.debug_struct("RemoteOcr")
            .field("transport", &transport)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .field("max_concurrency", &self.max_concurrency)
            .finish()
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

impl RemoteOcr {
    /// Backend talking HTTP to `config.base_url`.
    pub fn new(config: &RemoteOcrConfig) -> Result<Self, OcrError> {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let build = || {
            reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(OcrError::from)
        };
        Ok(Self {
            transport: Transport::Http {
                client: build()?,
                blocking_client: build()?,
                endpoint: chat_completions_url(&config.base_url),
                api_key: config.api_key.clone(),
            },
            model: config.model.clone(),
            temperature: config.temperature,
            timeout,
            max_concurrency: config.max_concurrency.max(1),
            min_image_side: config.min_image_side,
            blocking_runtime: OnceCell::new(),
        })
    }

    /// Backend carried by a pre-built `edgequake-llm` provider. `config`
    /// supplies temperature, timeout, concurrency and minimum image side.
    pub fn with_provider(provider: Arc<dyn LLMProvider>, config: &RemoteOcrConfig) -> Self {
        Self {
            transport: Transport::Provider(provider),
            model: config.model.clone(),
            temperature: config.temperature,
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            max_concurrency: config.max_concurrency.max(1),
            min_image_side: config.min_image_side,
            blocking_runtime: OnceCell::new(),
        }
    }

    /// Recognise a table crop. Safe to call concurrently.
    pub async fn recognize_table_image(&self, image: &RgbImage) -> Result<Option<String>, OcrError> {
        self.recognize_image(image, TABLE_HTML_PROMPT, false).await
    }

    /// Blocking variant of [`RemoteOcr::recognize_table_image`] for callers
    /// without an async runtime. Fails when called from inside one.
    pub fn recognize_blocking(&self, image: &RgbImage) -> Result<Option<String>, OcrError> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(OcrError::Engine(
                "recognize_blocking called inside an async runtime; use recognize_table_image"
                    .into(),
            ));
        }
        let runtime = self.blocking_runtime.get_or_try_init(|| {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| OcrError::Engine(format!("Failed to start runtime: {}", e)))
        })?;
        runtime.block_on(self.recognize_image(image, TABLE_HTML_PROMPT, true))
    }

    async fn recognize_image(
        &self,
        image: &RgbImage,
        prompt: &str,
        blocking: bool,
    ) -> Result<Option<String>, OcrError> {
        let start = Instant::now();
        let secs = self.timeout.as_secs();
        let call = self.complete(image, prompt, blocking);
        let content = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| OcrError::Timeout { secs })??;
        debug!(
            "Remote OCR: {}x{} crop → {} chars in {:?}",
            image.width(),
            image.height(),
            content.as_deref().map_or(0, str::len),
            start.elapsed()
        );
        Ok(content
            .map(|c| strip_code_fences(&c))
            .filter(|c| !c.is_empty()))
    }

    async fn complete(
        &self,
        image: &RgbImage,
        prompt: &str,
        blocking: bool,
    ) -> Result<Option<String>, OcrError> {
        match &self.transport {
            Transport::Http {
                client,
                blocking_client,
                endpoint,
                api_key,
            } => {
                let client = if blocking { blocking_client } else { client };
                let data_url = png_data_url(image, self.min_image_side)?;
                let body = build_request_body(&self.model, &data_url, prompt, self.temperature);
                let response = client
                    .post(endpoint)
                    .bearer_auth(api_key)
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| self.map_transport_error(e))?;
                let status = response.status();
                let text = response
                    .text()
                    .await
                    .map_err(|e| self.map_transport_error(e))?;
                if !status.is_success() {
                    return Err(OcrError::Api {
                        status: status.as_u16(),
                        body: truncate(&text, 500),
                    });
                }
                parse_completion(&text)
            }
            Transport::Provider(provider) => {
                let image_data = encode_image_data(image, self.min_image_side)?;
                let messages = vec![ChatMessage::user_with_images(prompt, vec![image_data])];
                let options = CompletionOptions {
                    temperature: Some(self.temperature),
                    ..Default::default()
                };
                let response = provider
                    .chat(&messages, Some(&options))
                    .await
                    .map_err(|e| OcrError::Http(e.to_string()))?;
                debug!(
                    "Remote OCR: {} input tokens, {} output tokens",
                    response.prompt_tokens, response.completion_tokens
                );
                Ok(Some(response.content))
            }
        }
    }

    fn map_transport_error(&self, e: reqwest::Error) -> OcrError {
        if e.is_timeout() {
            OcrError::Timeout {
                secs: self.timeout.as_secs(),
            }
        } else {
            OcrError::from(e)
        }
    }
}

#[async_trait]
impl TableOcr for RemoteOcr {
    fn name(&self) -> &str {
        match self.transport {
            Transport::Http { .. } => "remote",
            Transport::Provider(_) => "remote-llm",
        }
    }

    fn uses_formula_markers(&self) -> bool {
        true
    }

    fn concurrency_limit(&self) -> usize {
        self.max_concurrency
    }

    async fn recognize(&self, region: &TableRegion<'_>) -> Result<Option<String>, OcrError> {
        self.recognize_table_image(region.image).await
    }
}

#[async_trait]
impl FormulaOcr for RemoteOcr {
    async fn recognize_formula(&self, image: &RgbImage) -> Result<Option<String>, OcrError> {
        let latex = self.recognize_image(image, FORMULA_LATEX_PROMPT, false).await?;
        Ok(latex
            .map(|l| strip_math_delimiters(&l))
            .filter(|l| !l.is_empty()))
    }
}

/// `{base}/chat/completions`, tolerating a trailing slash on `base`.
pub fn chat_completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim().trim_end_matches('/'))
}

/// OpenAI-style chat-completion body with one image part and one text part.
pub fn build_request_body(model: &str, data_url: &str, prompt: &str, temperature: f32) -> Value {
    json!({
        "model": model,
        "messages": [{
            "role": "user",
            "content": [
                {"type": "image_url", "image_url": {"url": data_url}},
                {"type": "text", "text": prompt},
            ],
        }],
        "temperature": temperature,
    })
}

/// `choices[0].message.content` of a chat-completion body.
pub fn parse_completion(body: &str) -> Result<Option<String>, OcrError> {
    let parsed: CompletionResponse = serde_json::from_str(body)
        .map_err(|e| OcrError::MalformedResponse(e.to_string()))?;
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| OcrError::MalformedResponse("response has no choices".into()))?;
    Ok(choice.message.content)
}

/// Trim, drop an opening ```` ``` ```` line and a closing ```` ``` ````.
pub fn strip_code_fences(text: &str) -> String {
    let mut s = text.trim();
    if s.starts_with("```") {
        s = match s.find('\n') {
            Some(nl) => &s[nl + 1..],
            None => "",
        };
    }
    if let Some(stripped) = s.trim_end().strip_suffix("```") {
        s = stripped;
    }
    s.trim().to_string()
}

/// Remove one pair of `$$…$$`, `$…$`, `\[…\]` or `\(…\)` around `latex`.
pub fn strip_math_delimiters(latex: &str) -> String {
    let s = latex.trim();
    for (open, close) in [("$$", "$$"), ("\\[", "\\]"), ("\\(", "\\)"), ("$", "$")] {
        if s.len() >= open.len() + close.len() {
            if let Some(inner) = s.strip_prefix(open).and_then(|r| r.strip_suffix(close)) {
                return inner.trim().to_string();
            }
        }
    }
    s.to_string()
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}
