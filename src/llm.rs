//! Minimal OpenAI-compatible chat client.
//!
//! One user message in, trimmed text out. Structured replies are not requested
//! via `response_format`; callers recover JSON themselves (see `recovery`).
//! Calls log model name, latency and token usage, never prompt contents or the key.

use std::time::{Duration, Instant};

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::error::InvocationError;

const TEMPERATURE: f32 = 0.3;

/// Which of the two configured models a call should use.
#[derive(Clone, Copy, Debug)]
pub enum Tier {
  /// Short prose: feedback, recommendations, plain extraction.
  Fast,
  /// Structured JSON generation.
  Strong,
}

#[derive(Clone)]
pub struct LlmClient {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub fast_model: String,
  pub strong_model: String,
}

impl LlmClient {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    let base_url = std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let fast_model = std::env::var("OPENAI_FAST_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
    let strong_model = std::env::var("OPENAI_STRONG_MODEL").unwrap_or_else(|_| "gpt-4o".into());
    let timeout_secs = std::env::var("OPENAI_TIMEOUT_SECS")
      .ok()
      .and_then(|s| s.parse::<u64>().ok())
      .unwrap_or(60);

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(timeout_secs))
      .build()
      .map_err(|e| error!(target: "quicklearn_backend", error = %e, "Failed to build HTTP client"))
      .ok()?;

    Some(Self { client, api_key, base_url: base_url.trim_end_matches('/').to_string(), fast_model, strong_model })
  }

  pub fn model(&self, tier: Tier) -> &str {
    match tier {
      Tier::Fast => &self.fast_model,
      Tier::Strong => &self.strong_model,
    }
  }

  /// Single chat completion. Success means non-empty text, not valid JSON.
  #[instrument(level = "info", skip(self, prompt), fields(model = %self.model(tier), prompt_len = prompt.len()))]
  pub async fn complete(&self, tier: Tier, prompt: &str, max_tokens: Option<u32>) -> Result<String, InvocationError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model(tier).to_string(),
      messages: vec![ChatMessageReq { role: "user".into(), content: prompt.into() }],
      temperature: TEMPERATURE,
      max_tokens,
    };

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "quicklearn-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or(body);
      error!(target: "quicklearn_backend", elapsed = ?start.elapsed(), %status, "Model call failed");
      return Err(InvocationError::Http { status: status.as_u16(), message });
    }

    let body: ChatCompletionResponse = res.json().await?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "Model usage");
    }
    let text = first_choice_text(body);
    info!(elapsed = ?start.elapsed(), response_len = text.len(), "Model response received");

    if text.is_empty() {
      return Err(InvocationError::Empty);
    }
    Ok(text)
  }
}

/// Calls the model if one is configured.
pub async fn complete_with(
  llm: Option<&LlmClient>,
  tier: Tier,
  prompt: &str,
  max_tokens: Option<u32>,
) -> Result<String, InvocationError> {
  match llm {
    Some(c) => c.complete(tier, prompt, max_tokens).await,
    None => Err(InvocationError::NotConfigured),
  }
}

fn first_choice_text(body: ChatCompletionResponse) -> String {
  body.choices.into_iter().next()
    .and_then(|c| c.message.content)
    .unwrap_or_default()
    .trim()
    .to_string()
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from an OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
