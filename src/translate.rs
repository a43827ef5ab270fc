//! One-shot text translation over the REST `generateContent` endpoint.
//!
//! Used for typed input, where the latency of a full live session is
//! unnecessary. The request carries the same system instruction style as
//! the live path, minus voice configuration.

use serde::{Deserialize, Serialize};

use crate::config::{Language, SourceLanguage};
use crate::error::TranslateError;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Model used for text-only translation.
const TEXT_MODEL: &str = "gemini-2.0-flash";

// ── Wire types ─────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    system_instruction: Content,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

// ── Translator ─────────────────────────────────────────────────────

/// Translates typed text in a single request/response round trip.
pub struct TextTranslator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl TextTranslator {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Point at a different server. Tests use this with a local mock.
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Translate `text` into `target`. Returns the bare translation.
    pub async fn translate(
        &self,
        text: &str,
        source: SourceLanguage,
        target: Language,
    ) -> Result<String, TranslateError> {
        let instruction = match source {
            SourceLanguage::Auto => format!(
                "You are a translator. Translate the user's text into {}. \
                 Respond with only the translation, nothing else.",
                target.label()
            ),
            SourceLanguage::Fixed(lang) => format!(
                "You are a translator. The text is in {}. Translate it into {}. \
                 Respond with only the translation, nothing else.",
                lang.label(),
                target.label()
            ),
        };

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: text.to_string(),
                }],
            }],
            system_instruction: Content {
                parts: vec![Part { text: instruction }],
            },
        };

        let url = format!(
            "{}/v1beta/models/{TEXT_MODEL}:generateContent?key={}",
            self.base_url, self.api_key
        );
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| TranslateError::ConnectionFailed(format!("translate request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "Text translation failed");
            return Err(TranslateError::ConnectionFailed(format!(
                "translate request returned {status}"
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| TranslateError::ConnectionFailed(format!("translate response: {e}")))?;

        let translated: String = parsed
            .candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let translated = translated.trim().to_string();
        if translated.is_empty() {
            return Err(TranslateError::ConnectionFailed(
                "translate response carried no text".into(),
            ));
        }
        Ok(translated)
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn candidate_body(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": text }] }
            }]
        })
    }

    #[tokio::test]
    async fn translates_text_via_generate_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1beta/models/{TEXT_MODEL}:generateContent")))
            .and(body_string_contains("Hello"))
            .and(body_string_contains("Spanish"))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate_body("Hola\n")))
            .expect(1)
            .mount(&server)
            .await;

        let translator = TextTranslator::with_base_url("k", server.uri());
        let out = translator
            .translate("Hello", SourceLanguage::Auto, Language::Es)
            .await
            .unwrap();
        assert_eq!(out, "Hola");
    }

    #[tokio::test]
    async fn fixed_source_language_is_named_in_instruction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("German"))
            .and(body_string_contains("French"))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate_body("Bonjour")))
            .mount(&server)
            .await;

        let translator = TextTranslator::with_base_url("k", server.uri());
        let out = translator
            .translate(
                "Hallo",
                SourceLanguage::Fixed(Language::De),
                Language::Fr,
            )
            .await
            .unwrap();
        assert_eq!(out, "Bonjour");
    }

    #[tokio::test]
    async fn http_error_maps_to_connection_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let translator = TextTranslator::with_base_url("k", server.uri());
        let err = translator
            .translate("Hello", SourceLanguage::Auto, Language::Es)
            .await
            .unwrap_err();
        assert!(matches!(err, TranslateError::ConnectionFailed(_)));
        assert!(err.to_string().contains("429"));
    }

    #[tokio::test]
    async fn empty_candidates_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"candidates": []})),
            )
            .mount(&server)
            .await;

        let translator = TextTranslator::with_base_url("k", server.uri());
        let err = translator
            .translate("Hello", SourceLanguage::Auto, Language::Es)
            .await
            .unwrap_err();
        assert!(matches!(err, TranslateError::ConnectionFailed(_)));
    }
}
