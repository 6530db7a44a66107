//! Thin client for the Gemini `generateContent` REST endpoint with grounding tools.

use crate::sdk::location::Source;
use crate::sdk::util::rate_limit::Limiter;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Request to the model failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Model API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse model response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Model returned no text")]
    EmptyReply,
}

/// Grounding tool the model may call while answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grounding {
    Maps,
    Search,
}

impl Grounding {
    fn tool(&self) -> serde_json::Value {
        match self {
            Self::Maps => json!({ "googleMaps": {} }),
            Self::Search => json!({ "googleSearch": {} }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reply {
    pub text: String,
    pub maps_sources: Vec<Source>,
    pub web_sources: Vec<Source>,
}

// --- Response shape, only the fields we read ---

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Deserialize, Debug)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize, Debug)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Deserialize, Debug)]
struct GroundingChunk {
    #[serde(default)]
    web: Option<Source>,
    #[serde(default)]
    maps: Option<Source>,
}

#[derive(Deserialize, Debug)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize, Debug)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    limiter: Limiter,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String, limiter: Limiter) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self {
            client,
            base_url: GEMINI_BASE_URL.to_string(),
            api_key,
            model,
            limiter,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sends one prompt and returns the concatenated text with its grounding sources.
    pub async fn generate(
        &self,
        prompt: &str,
        system: &str,
        grounding: Grounding,
    ) -> Result<Reply, LlmError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "systemInstruction": { "parts": [{ "text": system }] },
            "tools": [grounding.tool()],
        });

        self.limiter.until_ready().await;
        log::debug!("[LLM] POST {} ({:?} grounding)", url, grounding);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        parse_reply(&text)
    }
}

/// Reads the first candidate of a `generateContent` reply.
pub fn parse_reply(text: &str) -> Result<Reply, LlmError> {
    let response: GenerateResponse = serde_json::from_str(text)?;
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(LlmError::EmptyReply)?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(LlmError::EmptyReply);
    }

    let mut reply = Reply {
        text,
        ..Reply::default()
    };
    let chunks = candidate
        .grounding_metadata
        .map(|m| m.grounding_chunks)
        .unwrap_or_default();
    for chunk in chunks {
        if let Some(source) = chunk.maps {
            reply.maps_sources.push(source);
        }
        if let Some(source) = chunk.web {
            reply.web_sources.push(source);
        }
    }
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_parts_and_splits_sources_by_kind() {
        let body = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Corner house. "}, {"text": "COORDS: [-37.3, -59.1]"}]},
                "groundingMetadata": {"groundingChunks": [
                    {"maps": {"title": "Alberdi 152", "uri": "https://maps.google.com/?cid=1"}},
                    {"web": {"title": "News", "uri": "https://example.org/traffic"}}
                ]}
            }]
        }"#;

        let reply = parse_reply(body).unwrap();
        assert_eq!(reply.text, "Corner house. COORDS: [-37.3, -59.1]");
        assert_eq!(reply.maps_sources.len(), 1);
        assert_eq!(reply.maps_sources[0].title.as_deref(), Some("Alberdi 152"));
        assert_eq!(reply.web_sources[0].uri.as_deref(), Some("https://example.org/traffic"));
    }

    #[test]
    fn missing_candidates_is_empty_reply() {
        assert!(matches!(parse_reply(r#"{"candidates": []}"#), Err(LlmError::EmptyReply)));
        assert!(matches!(
            parse_reply(r#"{"candidates": [{"content": {"parts": []}}]}"#),
            Err(LlmError::EmptyReply)
        ));
    }

    #[test]
    fn garbage_is_parse_error() {
        assert!(matches!(parse_reply("nope"), Err(LlmError::Parse(_))));
    }
}
