//! Text-generation collaborator.
//!
//! The pipeline consumes generation through the narrow [`TextGenerator`]
//! contract: one system prompt, one user prompt, one response. The shipped
//! implementation is an [`OllamaClient`] over the blocking `/api/generate`
//! endpoint; tests substitute deterministic stubs.
//!
//! No call is retried here. Retry policy, if any, belongs to the transport,
//! not the disambiguation engine.

use std::sync::LazyLock;
use std::time::Duration;

use miette::Diagnostic;
use regex::Regex;
use thiserror::Error;

use crate::model::Health;

/// Errors from the text-generation subsystem.
#[derive(Debug, Error, Diagnostic)]
pub enum LlmError {
    #[error("text-generation service is not reachable at {url}: {message}")]
    #[diagnostic(
        code(taxolink::llm::unavailable),
        help("Start Ollama with `ollama serve` or point OLLAMA_BASE_URL at a running instance.")
    )]
    Unavailable { url: String, message: String },

    #[error("text-generation request failed: {message}")]
    #[diagnostic(
        code(taxolink::llm::request_failed),
        help("Check that the service is running and the configured model is pulled.")
    )]
    RequestFailed { message: String },

    #[error("failed to parse text-generation response: {message}")]
    #[diagnostic(
        code(taxolink::llm::parse_error),
        help("The service returned an unexpected response format.")
    )]
    ParseError { message: String },
}

/// One generation result: the response text plus whatever metadata the
/// service reported alongside it (model name, token counts, timings).
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub metadata: serde_json::Value,
}

impl Generation {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: serde_json::Value::Null,
        }
    }
}

/// Narrow generate-text contract consumed by every pipeline stage that talks
/// to a language model.
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for `user_prompt` under `system_prompt`.
    fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<Generation, LlmError>;

    /// Reachability of the generation service.
    fn health(&self) -> Health {
        Health::Ok
    }
}

/// Configuration for the Ollama client.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Base URL for the Ollama API.
    pub base_url: String,
    /// Model name to use.
    pub model: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            model: "llama3.2".into(),
            timeout_secs: 120,
        }
    }
}

impl OllamaConfig {
    /// Build a config from `OLLAMA_BASE_URL`, `OLLAMA_MODEL`, and
    /// `OLLAMA_TIMEOUT_SECS`, with defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("OLLAMA_BASE_URL").unwrap_or(defaults.base_url),
            model: std::env::var("OLLAMA_MODEL").unwrap_or(defaults.model),
            timeout_secs: std::env::var("OLLAMA_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }
}

/// Client for the Ollama REST API.
pub struct OllamaClient {
    config: OllamaConfig,
    agent: ureq::Agent,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();
        Self { config, agent }
    }

    /// The model name this client is configured for.
    pub fn model(&self) -> &str {
        &self.config.model
    }
}

impl TextGenerator for OllamaClient {
    fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<Generation, LlmError> {
        let url = format!("{}/api/generate", self.config.base_url);
        let body = serde_json::json!({
            "model": self.config.model,
            "system": system_prompt,
            "prompt": user_prompt,
            "stream": false,
        });

        let resp = self
            .agent
            .post(&url)
            .set("Content-Type", "application/json")
            .send_string(&body.to_string())
            .map_err(|e: ureq::Error| match e {
                ureq::Error::Transport(t) => LlmError::Unavailable {
                    url: self.config.base_url.clone(),
                    message: t.to_string(),
                },
                ureq::Error::Status(code, _) => LlmError::RequestFailed {
                    message: format!("server returned status {code}"),
                },
            })?;

        let resp_str = resp.into_string().map_err(|e| LlmError::ParseError {
            message: e.to_string(),
        })?;

        let mut json: serde_json::Value =
            serde_json::from_str(&resp_str).map_err(|e| LlmError::ParseError {
                message: e.to_string(),
            })?;

        let text = json["response"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| LlmError::ParseError {
                message: "missing 'response' field".into(),
            })?;

        // Everything except the response text is metadata worth keeping.
        if let Some(obj) = json.as_object_mut() {
            obj.remove("response");
        }

        tracing::debug!(model = %self.config.model, chars = text.len(), "generation complete");
        Ok(Generation {
            text,
            metadata: json,
        })
    }

    fn health(&self) -> Health {
        let url = format!("{}/api/tags", self.config.base_url);
        let probe = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(5))
            .build();
        match probe.get(&url).call() {
            Ok(resp) if resp.status() == 200 => Health::Ok,
            Ok(resp) => Health::Degraded(format!("probe returned status {}", resp.status())),
            Err(e) => Health::Unavailable(e.to_string()),
        }
    }
}

impl std::fmt::Debug for OllamaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish()
    }
}

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^```[a-zA-Z]*\s*(.*?)\s*```$").expect("valid fence regex")
});

/// Strip a surrounding Markdown code fence from a model response, if present.
///
/// Models asked for JSON frequently wrap it in ```` ```json ... ``` ````
/// even when told not to. Parsing stages call this before `serde_json`.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    match CODE_FENCE.captures(trimmed) {
        Some(caps) => caps.get(1).map_or(trimmed, |m| m.as_str()),
        None => trimmed,
    }
}
