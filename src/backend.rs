//! Model backends: where a transcription request actually goes.
//!
//! [`ModelBackend`] is the seam between the pipeline and the network. Two
//! implementations ship with the crate:
//!
//! * [`LlmBackend`]: any `edgequake-llm` provider (OpenAI, Anthropic,
//!   Gemini, Ollama, …), usually auto-detected from the environment.
//! * [`OpenAiHttpBackend`]: a direct `POST {base}/chat/completions` with a
//!   bearer token, for users who just have an API key and an
//!   OpenAI-compatible endpoint.
//!
//! Tests and embedders can supply their own implementation through
//! [`crate::config::ScribeConfigBuilder::backend`].

use crate::config::ScribeConfig;
use crate::error::{BackendError, ScriberError};
use crate::pipeline::encode::EncodedImage;
use crate::prompts::with_reference;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// One image plus the instructions for reading it.
#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    pub image: EncodedImage,
    pub system_prompt: String,
    pub reference: Option<String>,
}

impl TranscriptionRequest {
    /// The system message: prompt plus the reference block, if any.
    pub fn system_message(&self) -> String {
        with_reference(&self.system_prompt, self.reference.as_deref())
    }
}

/// The model's reply to one [`TranscriptionRequest`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcription {
    pub content: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// A vision model that can transcribe one image per call.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Short label for logs and `Debug` output.
    fn name(&self) -> &str;

    async fn transcribe(&self, request: &TranscriptionRequest)
        -> Result<Transcription, BackendError>;
}

// ── edgequake-llm ────────────────────────────────────────────────────────

/// Backend driving an `edgequake-llm` provider.
pub struct LlmBackend {
    label: String,
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl LlmBackend {
    pub fn new(
        label: impl Into<String>,
        provider: Arc<dyn LLMProvider>,
        config: &ScribeConfig,
    ) -> Self {
        Self {
            label: label.into(),
            provider,
            options: build_options(config),
        }
    }
}

/// Build `CompletionOptions` from the run config.
fn build_options(config: &ScribeConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

#[async_trait]
impl ModelBackend for LlmBackend {
    fn name(&self) -> &str {
        &self.label
    }

    async fn transcribe(
        &self,
        request: &TranscriptionRequest,
    ) -> Result<Transcription, BackendError> {
        let messages = vec![
            ChatMessage::system(request.system_message()),
            ChatMessage::user_with_images("", vec![request.image.to_image_data()]),
        ];

        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| BackendError::Provider(e.to_string()))?;

        Ok(Transcription {
            content: response.content,
            input_tokens: response.prompt_tokens as usize,
            output_tokens: response.completion_tokens as usize,
        })
    }
}

// ── Direct OpenAI-compatible HTTP ────────────────────────────────────────

/// Backend posting straight to an OpenAI-compatible `chat/completions`
/// endpoint.
pub struct OpenAiHttpBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
}

impl OpenAiHttpBackend {
    pub fn new(api_key: impl Into<String>, config: &ScribeConfig) -> Result<Self, ScriberError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| ScriberError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/chat/completions",
                config.api_base_url.trim_end_matches('/')
            ),
            api_key: api_key.into(),
            model: config.model_or_default().to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

#[async_trait]
impl ModelBackend for OpenAiHttpBackend {
    fn name(&self) -> &str {
        "openai-http"
    }

    async fn transcribe(
        &self,
        request: &TranscriptionRequest,
    ) -> Result<Transcription, BackendError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system_message() },
                {
                    "role": "user",
                    "content": [
                        { "type": "image_url", "image_url": { "url": request.image.data_url() } }
                    ]
                }
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        debug!("POST {} (model {})", self.endpoint, self.model);
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| BackendError::MalformedResponse(e.to_string()))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| BackendError::MalformedResponse("no choices[0].message.content".into()))?;
        let usage = completion.usage.unwrap_or_default();

        Ok(Transcription {
            content,
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        })
    }
}
