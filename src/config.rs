//! Configuration types for a scribe run.
//!
//! All run behaviour is controlled through [`ScribeConfig`], built via its
//! [`ScribeConfigBuilder`]. The config is passed in at call time; the library
//! keeps no process-wide settings, so two runs with different configs can
//! share a process.

use crate::backend::ModelBackend;
use crate::error::ScriberError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::sync::Arc;

/// Default model when none is configured. Handwriting needs a strong vision
/// model; the nano tiers misread cursive noticeably more often.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Default base URL of the direct OpenAI-compatible backend.
pub const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";

/// Configuration for transcribing the images of one note.
///
/// # Example
/// ```rust
/// use scriber::ScribeConfig;
///
/// let config = ScribeConfig::builder()
///     .concurrency(2)
///     .model("gpt-4o")
///     .reference_note("Reference/terms.md")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ScribeConfig {
    /// Number of images fetched and transcribed at once. Default: 4.
    ///
    /// Results are always merged in document order regardless of which call
    /// finishes first.
    pub concurrency: usize,

    /// Model identifier, e.g. "gpt-4o", "claude-sonnet-4-20250514".
    /// If None, [`DEFAULT_MODEL`] is used.
    pub model: Option<String>,

    /// `edgequake-llm` provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed backend. Takes precedence over everything else.
    pub backend: Option<Arc<dyn ModelBackend>>,

    /// API key for the direct OpenAI-compatible backend.
    ///
    /// When set (and no `backend` is given) requests go straight to
    /// `{api_base_url}/chat/completions` with this bearer token.
    pub api_key: Option<String>,

    /// Base URL for the direct backend. Default: [`DEFAULT_API_BASE_URL`].
    pub api_base_url: String,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate per image. Default: 4096.
    pub max_tokens: usize,

    /// Per-image model call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Custom system prompt. If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// Note whose content replaces the system prompt. Falls back to
    /// `system_prompt` (then the default) when the note cannot be read.
    pub prompt_note: Option<String>,

    /// Note with names and vocabulary appended to the system prompt.
    pub reference_note: Option<String>,

    /// Note that receives a timestamped line after every successful write.
    pub activity_log: Option<String>,

    /// Compute the patched note but do not write it back.
    pub dry_run: bool,

    /// Receives per-image progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ScribeConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            model: None,
            provider_name: None,
            backend: None,
            api_key: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            temperature: 0.1,
            max_tokens: 4096,
            api_timeout_secs: 120,
            system_prompt: None,
            prompt_note: None,
            reference_note: None,
            activity_log: None,
            dry_run: false,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ScribeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScribeConfig")
            .field("concurrency", &self.concurrency)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("backend", &self.backend.as_ref().map(|b| b.name().to_string()))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base_url", &self.api_base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("prompt_note", &self.prompt_note)
            .field("reference_note", &self.reference_note)
            .field("activity_log", &self.activity_log)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl ScribeConfig {
    /// Create a new builder for `ScribeConfig`.
    pub fn builder() -> ScribeConfigBuilder {
        ScribeConfigBuilder {
            config: Self::default(),
        }
    }

    /// The configured model, or [`DEFAULT_MODEL`].
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Builder for [`ScribeConfig`].
pub struct ScribeConfigBuilder {
    config: ScribeConfig,
}

impl ScribeConfigBuilder {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn backend(mut self, backend: Arc<dyn ModelBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn prompt_note(mut self, id: impl Into<String>) -> Self {
        self.config.prompt_note = Some(id.into());
        self
    }

    pub fn reference_note(mut self, id: impl Into<String>) -> Self {
        self.config.reference_note = Some(id.into());
        self
    }

    pub fn activity_log(mut self, id: impl Into<String>) -> Self {
        self.config.activity_log = Some(id.into());
        self
    }

    pub fn dry_run(mut self, v: bool) -> Self {
        self.config.dry_run = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ScribeConfig, ScriberError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(ScriberError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(ScriberError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(ScriberError::InvalidConfig(
                "API timeout must be at least 1 second".into(),
            ));
        }
        if !c.api_base_url.starts_with("http://") && !c.api_base_url.starts_with("https://") {
            return Err(ScriberError::InvalidConfig(format!(
                "API base URL must start with http:// or https://, got '{}'",
                c.api_base_url
            )));
        }
        if c.api_key.as_deref().is_some_and(|k| k.trim().is_empty()) {
            return Err(ScriberError::InvalidConfig("API key is empty".into()));
        }
        Ok(self.config)
    }
}
