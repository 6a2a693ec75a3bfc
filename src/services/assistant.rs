//! Retail chat assistant backed by a Gemini-compatible `generateContent` API.

use crate::config::AssistantConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

pub const PERSONA_PREAMBLE: &str = "You are a helpful retail assistant for RetailX. \
Answer questions about retail, sales, inventory, and festivals. \
Keep responses concise and helpful.\n\n";

pub const NOT_CONFIGURED_REPLY: &str =
    "AI model not configured. Set assistant.api_key in the server configuration.";

pub const EMPTY_REPLY: &str = "I couldn't generate a response. Please try again.";

const ERROR_DETAIL_CHARS: usize = 100;

#[async_trait]
pub trait ChatAssistant: Send + Sync {
    /// Always produces text; failures are described in the reply.
    async fn reply(&self, message: &str) -> String;
}

/// Used when no API key is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledAssistant;

#[async_trait]
impl ChatAssistant for DisabledAssistant {
    async fn reply(&self, _message: &str) -> String {
        NOT_CONFIGURED_REPLY.to_string()
    }
}

pub fn error_reply(detail: &str) -> String {
    let detail: String = detail.chars().take(ERROR_DETAIL_CHARS).collect();
    format!("Sorry, I encountered an error: {detail}")
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
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
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
            .trim()
            .to_string()
    }
}

/// Tries the configured models in order and sticks with the first one that answers.
pub struct GeminiAssistant {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    models: Vec<String>,
    active_model: RwLock<Option<usize>>,
}

impl GeminiAssistant {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        models: Vec<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            models,
            active_model: RwLock::new(None),
        })
    }

    pub async fn active_model(&self) -> Option<String> {
        let idx = *self.active_model.read().await;
        idx.and_then(|i| self.models.get(i).cloned())
    }

    async fn generate(&self, model: &str, prompt: &str) -> Result<String, String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        let body = GenerateRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| e.without_url().to_string())?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(format!("{model} returned {status}: {detail}"));
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| e.to_string())?;
        Ok(parsed.text())
    }
}

#[async_trait]
impl ChatAssistant for GeminiAssistant {
    #[instrument(skip(self, message), fields(message_len = message.len()))]
    async fn reply(&self, message: &str) -> String {
        let prompt = format!("{PERSONA_PREAMBLE}User: {message}");

        let preferred = *self.active_model.read().await;
        let order: Vec<usize> = preferred
            .into_iter()
            .chain((0..self.models.len()).filter(|i| Some(*i) != preferred))
            .collect();

        let mut last_error = String::from("no assistant models configured");
        for idx in order {
            let model = &self.models[idx];
            match self.generate(model, &prompt).await {
                Ok(text) => {
                    if preferred != Some(idx) {
                        info!(model = %model, "assistant model selected");
                        *self.active_model.write().await = Some(idx);
                    }
                    if text.is_empty() {
                        debug!(model = %model, "assistant returned empty text");
                        return EMPTY_REPLY.to_string();
                    }
                    return text;
                }
                Err(e) => {
                    warn!(model = %model, error = %e, "assistant model failed");
                    last_error = e;
                }
            }
        }

        error_reply(&last_error)
    }
}

pub fn build_assistant(config: &AssistantConfig) -> Arc<dyn ChatAssistant> {
    let Some(api_key) = config.api_key.as_deref().filter(|k| !k.trim().is_empty()) else {
        info!("assistant disabled: no api key configured");
        return Arc::new(DisabledAssistant);
    };

    match GeminiAssistant::new(
        config.base_url.clone(),
        api_key,
        config.models.clone(),
        Duration::from_secs(config.timeout_secs),
    ) {
        Ok(assistant) => Arc::new(assistant),
        Err(e) => {
            warn!(error = %e, "assistant http client could not be built; disabling");
            Arc::new(DisabledAssistant)
        }
    }
}
