//! Instructions sent to vision and language models.
//!
//! All prompts live here so behaviour changes touch one file and tests can
//! inspect the exact wording.

/// Table OCR: HTML only, no fences, no commentary.
pub const TABLE_HTML_PROMPT: &str = "Extract the table from the image.\n\
Return ONLY valid HTML for the table (prefer <table>...</table>).\n\
Do NOT include markdown fences or any extra text.";

/// Formula OCR: bare LaTeX.
pub const FORMULA_LATEX_PROMPT: &str = "Extract the equation from the image.\n\
Return ONLY the LaTeX expression.\n\
Do NOT wrap in $$ or \\( \\) and do NOT include any extra text.";

/// System prompt for translating one content part.
pub const TRANSLATION_SYSTEM_PROMPT: &str = r#"You are a professional translator working on document content.

Rules:
1. Translate the text the user sends into the requested language.
2. Keep every placeholder of the form [[P0]], [[P1]], … exactly as it appears, in the same position.
3. Keep Markdown and HTML markup unchanged; translate only human-readable text.
4. Keep LaTeX, code, numbers, and URLs unchanged.
5. Output ONLY the translation, with no preamble, notes, or quotes."#;

/// User message for translating `text` into `language`.
pub fn translation_request(language: &str, text: &str) -> String {
    format!("Target language: {}\n\n{}", language, text)
}
