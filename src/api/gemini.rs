use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;

/// Failures of a `generateContent` round trip. All of them are recovered by
/// the caller into one generic apology.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("no Gemini API key configured")]
    MissingCredential,
    #[error("Gemini endpoint unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),
    #[error("Gemini API error: {0}")]
    Remote(String),
    #[error("invalid response structure from API: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::new(Role::Model, text)
    }

    fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![Part { text: text.into() }],
        }
    }

    pub fn text(&self) -> String {
        self.parts.iter().map(|p| p.text.as_str()).collect()
    }
}

/// In-memory chat context sent with every conversational request.
/// Grows by exactly two turns per successful exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationHistory {
    turns: Vec<ConversationTurn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    fn record_exchange(&mut self, prompt: &str, reply: &str) {
        self.turns.push(ConversationTurn::user(prompt));
        self.turns.push(ConversationTurn::model(reply));
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<&'a ConversationTurn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction<'a>>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction<'a> {
    parts: [TextRef<'a>; 1],
}

#[derive(Debug, Serialize)]
struct TextRef<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// Prompt used to re-ask the model for a translation of a logged message.
pub fn translation_prompt(original: &str, language: &str) -> String {
    format!("Translate the following text to {}: \"{}\"", language, original)
}

/// Stateless-transport client for `models/{model}:generateContent`.
///
/// The key travels in the `x-goog-api-key` header so it never shows up in
/// URLs or logs.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    system_instruction: Option<String>,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: model.into(),
            system_instruction: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()
            .unwrap_or_else(|e| {
                log::warn!("[Gemini] Falling back to default HTTP client: {}", e);
                Client::new()
            });

        Self {
            client,
            api_key: config.gemini_api_key.clone(),
            base_url: config.api_base_url.clone(),
            model: config.model.clone(),
            system_instruction: config.effective_system_instruction().map(str::to_string),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    /// Send `history ++ [prompt]` and return the first candidate's text.
    ///
    /// Translation requests skip the history entirely and never record into
    /// it. Otherwise the prompt and reply are appended only after the reply
    /// has been fully parsed, so a failure leaves `history` untouched.
    pub async fn converse(
        &self,
        prompt: &str,
        history: &mut ConversationHistory,
        is_translation: bool,
    ) -> Result<String, ApiError> {
        if !self.has_api_key() {
            return Err(ApiError::MissingCredential);
        }

        let user_turn = ConversationTurn::user(prompt);
        let mut contents: Vec<&ConversationTurn> = Vec::new();
        if !is_translation {
            contents.extend(history.turns());
        }
        contents.push(&user_turn);

        let request = GenerateRequest {
            contents,
            system_instruction: self.system_instruction.as_deref().map(|text| SystemInstruction {
                parts: [TextRef { text }],
            }),
        };

        log::info!(
            "[Gemini] Requesting {} ({} turns, translation={})",
            self.model,
            request.contents.len(),
            is_translation
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(ApiError::Unreachable)?;

        let status = response.status();
        let body = response.text().await.map_err(ApiError::Unreachable)?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .ok()
                .and_then(|e| e.error.message)
                .unwrap_or_else(|| format!("HTTP {}", status));
            log::error!("[Gemini] Request failed: {}", message);
            return Err(ApiError::Remote(message));
        }

        let text = Self::extract_text(&body)?;

        if !is_translation {
            history.record_exchange(prompt, &text);
        }
        log::debug!("[Gemini] Reply: {} chars", text.len());
        Ok(text)
    }

    fn extract_text(body: &str) -> Result<String, ApiError> {
        let parsed: GenerateResponse = serde_json::from_str(body)
            .map_err(|e| ApiError::MalformedResponse(e.to_string()))?;

        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::MalformedResponse("no candidate text".into()))
    }
}
