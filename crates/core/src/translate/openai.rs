//! OpenAI-backed translator implementation.
//! Lines travel as `[L<n>] text` labels inside a chat completion request.

use super::prompt::{self, PromptContext};
use super::{IndexedLine, Translator};
use crate::retry::TranslateError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, trace};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
/// Model used when none is given.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const TEMPERATURE: f64 = 0.3;

/// Map a front-end model id to the id sent to the API.
pub fn api_model_id(model: &str) -> &str {
    match model {
        "gpt-5-mini" => "gpt-4o-mini",
        "gpt-5" => "gpt-4o",
        other => other,
    }
}

/// Newer models reject a custom temperature.
fn supports_temperature(model: &str) -> bool {
    !api_model_id(model).to_lowercase().contains("gpt-5")
}

/// Translator that delegates to the OpenAI chat completion API.
#[derive(Clone)]
pub struct OpenAiTranslator {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    context: PromptContext,
}

impl OpenAiTranslator {
    /// Create a translator for `model` talking to the public API.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            context: PromptContext::default(),
        })
    }

    /// Create a new translator reading the API key from `OPENAI_API_KEY`.
    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let key = std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY is not set")?;
        Self::new(key, model)
    }

    /// Point requests at another server, such as a proxy or a local mock.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Extra instructions and glossary sent with every request.
    pub fn with_context(mut self, context: PromptContext) -> Self {
        self.context = context;
        self
    }

    /// Model id as given by the caller, before [`api_model_id`] mapping.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, lines: &[IndexedLine], target_language: &str) -> Value {
        let system = prompt::system_prompt(target_language, &self.context);
        let mut body = json!({
            "model": api_model_id(&self.model),
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": prompt::user_prompt(lines)},
            ],
        });
        if supports_temperature(&self.model) {
            body["temperature"] = json!(TEMPERATURE);
        }
        body
    }

    /// Send a JSON body to the chat completions endpoint and return the JSON response.
    async fn post_chat(&self, body: &Value) -> Result<Value, TranslateError> {
        let resp = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json().await?);
        }
        let message = resp.text().await.unwrap_or_default();
        debug!("chat completion failed with {status}: {message}");
        Err(match status {
            StatusCode::TOO_MANY_REQUESTS => TranslateError::RateLimited(message),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TranslateError::Auth,
            s if s.is_server_error() => TranslateError::Server { status: s.as_u16() },
            s => TranslateError::Api {
                status: s.as_u16(),
                message,
            },
        })
    }
}

#[async_trait]
impl Translator for OpenAiTranslator {
    async fn translate_batch(
        &self,
        lines: &[IndexedLine],
        target_language: &str,
    ) -> Result<Vec<IndexedLine>, TranslateError> {
        trace!(
            "translate_batch lines={} lang={} model={}",
            lines.len(),
            target_language,
            self.model
        );
        let value = self.post_chat(&self.request_body(lines, target_language)).await?;
        let content = value["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| TranslateError::Malformed("missing content".to_string()))?;
        Ok(prompt::parse_labeled_output(content.trim(), lines.len()))
    }
}
