//! LLM client interface.
//!
//! The agents only need one capability from a model: turn a prompt into a
//! structured JSON object. Providers own transport, auth and retries.

use crate::error::LLMError;
use async_trait::async_trait;
use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest<'a> {
    pub prompt: &'a str,
    pub system_prompt: Option<&'a str>,
    pub temperature: Option<f32>,
}

impl<'a> GenerateRequest<'a> {
    pub fn new(prompt: &'a str) -> Self {
        Self {
            prompt,
            system_prompt: None,
            temperature: None,
        }
    }

    pub fn system(mut self, system_prompt: &'a str) -> Self {
        self.system_prompt = Some(system_prompt);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Trait for LLM API providers
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate a JSON object response.
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<serde_json::Value, LLMError>;

    fn model_name(&self) -> &str;
}

/// Parse model output text as a JSON object, tolerating a surrounding
/// markdown code fence.
pub fn parse_json_object(text: &str) -> Result<serde_json::Value, LLMError> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| LLMError::InvalidResponse(format!("not JSON: {e}")))?;
    if !value.is_object() {
        return Err(LLMError::InvalidResponse(
            "expected a JSON object".to_string(),
        ));
    }
    Ok(value)
}

/// Mock client for testing: replays scripted responses in order, repeating
/// the last one once exhausted.
pub struct MockLLMClient {
    responses: Vec<String>,
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    next: usize,
    prompts: Vec<String>,
    system_prompts: Vec<Option<String>>,
}

impl MockLLMClient {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn always(response: &str) -> Self {
        Self::new(vec![response.to_string()])
    }

    /// Prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.state.lock().prompts.clone()
    }

    /// System prompts received so far, one per call.
    pub fn system_prompts(&self) -> Vec<Option<String>> {
        self.state.lock().system_prompts.clone()
    }
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<serde_json::Value, LLMError> {
        let text = {
            let mut state = self.state.lock();
            state.prompts.push(request.prompt.to_string());
            state
                .system_prompts
                .push(request.system_prompt.map(str::to_string));
            let idx = state.next.min(self.responses.len().saturating_sub(1));
            state.next += 1;
            self.responses
                .get(idx)
                .cloned()
                .ok_or_else(|| LLMError::Api("mock has no scripted responses".to_string()))?
        };
        parse_json_object(&text)
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

// ============================================================================
// OpenAI
// ============================================================================

#[cfg(feature = "openai")]
pub use openai::OpenAIClient;

#[cfg(feature = "openai")]
mod openai {
    use super::*;
    use crate::config::{
        DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL, OPENAI_API_KEY_ENV, OPENAI_BASE_URL_ENV,
        OPENAI_MODEL_ENV,
    };
    use std::time::Duration;

    const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

    /// Chat-completions client in JSON mode.
    pub struct OpenAIClient {
        http: reqwest::Client,
        api_key: String,
        model: String,
        base_url: String,
    }

    impl OpenAIClient {
        pub fn new(api_key: String, model: String) -> Result<Self, LLMError> {
            let http = reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .map_err(|e| LLMError::Network(e.to_string()))?;
            Ok(Self {
                http,
                api_key,
                model,
                base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            })
        }

        pub fn with_base_url(mut self, base_url: String) -> Self {
            self.base_url = base_url.trim_end_matches('/').to_string();
            self
        }

        /// Configure from `OPENAI_API_KEY`, `OPENAI_MODEL` and `OPENAI_BASE_URL`.
        pub fn from_env() -> Result<Self, LLMError> {
            let api_key = std::env::var(OPENAI_API_KEY_ENV)
                .ok()
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| LLMError::NotConfigured(format!("set {OPENAI_API_KEY_ENV}")))?;
            let model = std::env::var(OPENAI_MODEL_ENV)
                .ok()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());
            let client = Self::new(api_key, model)?;
            Ok(match std::env::var(OPENAI_BASE_URL_ENV) {
                Ok(url) if !url.trim().is_empty() => client.with_base_url(url),
                _ => client,
            })
        }
    }

    #[async_trait]
    impl LLMClient for OpenAIClient {
        async fn generate(
            &self,
            request: GenerateRequest<'_>,
        ) -> Result<serde_json::Value, LLMError> {
            let mut messages = Vec::new();
            if let Some(system) = request.system_prompt {
                messages.push(serde_json::json!({"role": "system", "content": system}));
            }
            messages.push(serde_json::json!({"role": "user", "content": request.prompt}));

            let mut body = serde_json::json!({
                "model": self.model,
                "messages": messages,
                "response_format": {"type": "json_object"},
            });
            if let Some(temp) = request.temperature {
                body["temperature"] = serde_json::json!(temp);
            }

            let response = self
                .http
                .post(format!("{}/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| LLMError::Network(e.to_string()))?;

            let status = response.status();
            let payload: serde_json::Value = response
                .json()
                .await
                .map_err(|e| LLMError::InvalidResponse(e.to_string()))?;
            if !status.is_success() {
                let detail = payload["error"]["message"]
                    .as_str()
                    .unwrap_or("unknown error")
                    .to_string();
                return Err(LLMError::Api(format!("{status}: {detail}")));
            }

            let content = payload["choices"][0]["message"]["content"]
                .as_str()
                .ok_or_else(|| LLMError::InvalidResponse("missing message content".to_string()))?;
            parse_json_object(content)
        }

        fn model_name(&self) -> &str {
            &self.model
        }
    }
}
