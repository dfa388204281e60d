//! Translation of assembled content parts.
//!
//! Markup the model must not touch (link targets, inline images, emphasis
//! markers, inline code) is swapped for numbered `[[Pn]]` placeholders
//! before the request and restored afterwards. Tables, formulas and pictures
//! are never sent.

use crate::error::{Pdf2MarkupError, TranslationError};
use crate::pipeline::assemble::ContentPart;
use crate::prompts::{translation_request, TRANSLATION_SYSTEM_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Translates one piece of text.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, language: &str) -> Result<String, TranslationError>;
}

/// Markdown links and images, HTML tags, inline code, and runs of `*`/`_`
/// used as emphasis markers.
static RE_PROTECTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"!?\[[^\]]*\]\([^)]*\)|<[^>]+>|`[^`]*`|\*{1,3}|\b_{1,3}|_{1,3}\b").unwrap()
});

static RE_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\[P(\d+)\]\]").unwrap());

/// Text with protected spans replaced by placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtectedText {
    pub text: String,
    pub spans: Vec<String>,
}

/// Replace every protected span with `[[Pn]]`. Link labels stay inside the
/// placeholder; the label text is short and often a URL itself.
pub fn protect(text: &str) -> ProtectedText {
    let mut spans = Vec::new();
    let text = RE_PROTECTED
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let i = spans.len();
            spans.push(caps[0].to_string());
            format!("[[P{}]]", i)
        })
        .into_owned();
    ProtectedText { text, spans }
}

/// Put the protected spans back. Placeholders the model invented or mangled
/// beyond recognition are left as they are.
pub fn restore(text: &str, spans: &[String]) -> String {
    RE_PLACEHOLDER
        .replace_all(text, |caps: &regex::Captures<'_>| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|i| spans.get(i))
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Translate every translatable part and concatenate the result. A part
/// whose translation fails keeps its original text.
pub async fn translate_parts(
    translator: &dyn Translator,
    parts: &[ContentPart],
    language: &str,
) -> String {
    let mut out = String::new();
    let mut failed = 0usize;
    for part in parts {
        if !part.is_translatable() {
            out.push_str(&part.text);
            continue;
        }
        let protected = protect(&part.text);
        match translator.translate(&protected.text, language).await {
            Ok(translated) => out.push_str(&restore(&translated, &protected.spans)),
            Err(e) => {
                failed += 1;
                debug!("{}", e);
                out.push_str(&part.text);
            }
        }
    }
    if failed > 0 {
        warn!(
            "{} of {} parts kept untranslated for {}",
            failed,
            parts.len(),
            language
        );
    }
    out
}

/// Translate the document into every target language.
pub async fn translate_document(
    translator: &dyn Translator,
    parts: &[ContentPart],
    languages: &[String],
) -> Vec<(String, String)> {
    let mut translations = Vec::with_capacity(languages.len());
    for language in languages {
        info!("Translating into {}", language);
        let content = translate_parts(translator, parts, language).await;
        translations.push((language.clone(), content));
    }
    translations
}

/// [`Translator`] backed by an `edgequake-llm` chat provider.
pub struct LlmTranslator {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
}

impl LlmTranslator {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            temperature: 0.1,
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Named provider (`"openai"`, `"ollama"`, …) and model.
    pub fn from_provider_name(name: &str, model: &str) -> Result<Self, Pdf2MarkupError> {
        let provider = ProviderFactory::create_llm_provider(name, model).map_err(|e| {
            Pdf2MarkupError::ProviderNotConfigured {
                provider: name.to_string(),
                hint: e.to_string(),
            }
        })?;
        Ok(Self::new(provider))
    }

    /// `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` when both are set,
    /// otherwise whatever provider the environment's API keys select.
    pub fn from_env() -> Result<Self, Pdf2MarkupError> {
        if let (Ok(name), Ok(model)) = (
            std::env::var("EDGEQUAKE_LLM_PROVIDER"),
            std::env::var("EDGEQUAKE_MODEL"),
        ) {
            if !name.is_empty() && !model.is_empty() {
                return Self::from_provider_name(&name, &model);
            }
        }
        let (provider, _embedding) =
            ProviderFactory::from_env().map_err(|e| Pdf2MarkupError::ProviderNotConfigured {
                provider: "auto".to_string(),
                hint: format!(
                    "Translation needs an LLM provider.\n\
                    Set EDGEQUAKE_LLM_PROVIDER and EDGEQUAKE_MODEL, or an API key such as OPENAI_API_KEY.\n\
                    Error: {}",
                    e
                ),
            })?;
        Ok(Self::new(provider))
    }
}

#[async_trait]
impl Translator for LlmTranslator {
    async fn translate(&self, text: &str, language: &str) -> Result<String, TranslationError> {
        let messages = vec![
            ChatMessage::system(TRANSLATION_SYSTEM_PROMPT),
            ChatMessage::user(translation_request(language, text)),
        ];
        let options = CompletionOptions {
            temperature: Some(self.temperature),
            ..Default::default()
        };
        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| TranslationError {
                language: language.to_string(),
                detail: e.to_string(),
            })?;
        let translated = response.content.trim();
        if translated.is_empty() {
            return Err(TranslationError {
                language: language.to_string(),
                detail: "empty response".to_string(),
            });
        }
        Ok(preserve_trailing_whitespace(text, translated))
    }
}

/// Models drop the `"\n\n"` separators; put the source's trailing
/// whitespace back.
fn preserve_trailing_whitespace(source: &str, translated: &str) -> String {
    let trailing = &source[source.trim_end().len()..];
    format!("{}{}", translated.trim_end(), trailing)
}
