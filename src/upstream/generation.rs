//! Text generation through an OpenAI-compatible chat completion endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::TextGenerator;
use crate::config::GenerationConfig;
use crate::transport::HttpTransport;
use crate::types::{Message, PoetryRequest};
use crate::{Error, ErrorContext, Result};

const SOURCE: &str = "chat_completion";

/// System + user prompt pair for one generation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }

    /// Two-sentence weather poem in the requested language.
    pub fn poetry(request: &PoetryRequest) -> Self {
        let language = match request.language() {
            "sv" => "Swedish",
            _ => "English",
        };
        let mut user = format!(
            "Describe the weather \"{}\" and the temperature {}°C with strong emotional expression",
            request.weather.trim(),
            format_temperature(request.temp)
        );
        if let Some(name) = non_blank(request.name.as_deref()) {
            user.push_str(&format!(", addressed to {}", name));
        }
        if let Some(mood) = non_blank(request.mood.as_deref()) {
            user.push_str(&format!(", in a {} tone", mood));
        }
        if let Some(city) = non_blank(request.city.as_deref()) {
            user.push_str(&format!(", set in {}", city));
        }
        user.push_str(&format!(
            ". Use poetic expressions and vivid imagery. Answer in {}. At most 2 sentences.",
            language
        ));
        Self::new(
            "You are a passionate weather poet. You answer with the poem only, no preamble.",
            user,
        )
    }

    pub fn messages(&self) -> Vec<Message> {
        vec![Message::system(&self.system), Message::user(&self.user)]
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn format_temperature(temp: f64) -> String {
    if temp.fract() == 0.0 {
        format!("{}", temp as i64)
    } else {
        format!("{:.1}", temp)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
}

pub struct ChatCompletionGenerator {
    transport: HttpTransport,
    config: GenerationConfig,
}

impl ChatCompletionGenerator {
    pub fn new(transport: HttpTransport, config: GenerationConfig) -> Self {
        Self { transport, config }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

/// Pull the generated text out of a completion body. Chat-style
/// `message.content` first, legacy `text` second; blank output counts as
/// malformed so the retry wrapper tries again.
pub(crate) fn extract_text(body: &Value) -> Result<String> {
    let choice = body
        .get("choices")
        .and_then(|c| c.get(0))
        .ok_or_else(|| Error::malformed_response(SOURCE, "no choices"))?;
    let text = choice
        .pointer("/message/content")
        .and_then(Value::as_str)
        .or_else(|| choice.get("text").and_then(Value::as_str))
        .map(str::trim)
        .unwrap_or_default();
    if text.is_empty() {
        return Err(Error::malformed_response(SOURCE, "empty completion"));
    }
    Ok(text.to_string())
}

#[async_trait]
impl TextGenerator for ChatCompletionGenerator {
    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let key = self.config.api_key.as_deref().ok_or_else(|| {
            Error::configuration_with_context(
                "generation API key is not configured",
                ErrorContext::new()
                    .with_field_path("GROQ_API_KEY")
                    .with_source(SOURCE),
            )
        })?;
        let body = ChatRequest {
            model: &self.config.model,
            messages: prompt.messages(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };
        let request = self
            .transport
            .client()
            .post(self.endpoint())
            .bearer_auth(key)
            .json(&body);
        let response: Value = self.transport.send_json(SOURCE, request).await?;
        extract_text(&response)
    }

    fn name(&self) -> &'static str {
        SOURCE
    }
}
