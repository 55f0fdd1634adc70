//! Reasoning-model interaction: the model port and its provider adapter.
//!
//! [`ReasoningModel`] is the seam the analysis client talks to. Production
//! code wraps an `edgequake_llm` provider in [`ProviderModel`]; tests plug in
//! a scripted implementation. All prompt text lives in [`crate::prompts`].
//!
//! Provider failures are classified into [`AnalysisError`] here so callers
//! never see raw provider types:
//!
//! * HTTP 429 / "rate limit" → [`AnalysisError::RateLimited`]
//! * 401 / 403 / rejected key → [`AnalysisError::Unconfigured`]
//! * anything else, including timeouts → [`AnalysisError::Unreachable`]
//!
//! Nothing here retries. A retry re-bills the call, so the decision belongs
//! to whoever owns the budget.

use crate::config::PaperLensConfig;
use crate::error::AnalysisError;
use crate::ledger::TokenUsage;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Speaker of a message sent to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// One message in a model request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ModelMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Sampling parameters for one call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout: Duration,
}

impl GenerationOptions {
    pub fn from_config(config: &PaperLensConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: Duration::from_secs(config.analysis_timeout_secs),
        }
    }
}

/// The model's answer and the usage the provider billed for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReply {
    pub content: String,
    pub usage: TokenUsage,
}

/// A chat-completion capable model.
#[async_trait]
pub trait ReasoningModel: Send + Sync {
    /// Identifier recorded in the usage ledger.
    fn model_name(&self) -> &str;

    /// Send `messages` and return the reply.
    ///
    /// A returned `Ok` means the provider billed the call, whatever the
    /// content looks like.
    async fn complete(
        &self,
        messages: &[ModelMessage],
        options: &GenerationOptions,
    ) -> Result<ModelReply, AnalysisError>;
}

/// [`ReasoningModel`] backed by an `edgequake_llm` provider.
pub struct ProviderModel {
    provider: Arc<dyn LLMProvider>,
    model: String,
}

impl ProviderModel {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

#[async_trait]
impl ReasoningModel for ProviderModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[ModelMessage],
        options: &GenerationOptions,
    ) -> Result<ModelReply, AnalysisError> {
        let start = Instant::now();
        let chat: Vec<ChatMessage> = messages.iter().map(to_chat_message).collect();
        let completion_options = build_options(options);

        let response = tokio::time::timeout(
            options.timeout,
            self.provider.chat(&chat, Some(&completion_options)),
        )
        .await
        .map_err(|_| AnalysisError::Unreachable {
            detail: format!("no reply within {}s", options.timeout.as_secs()),
        })?
        .map_err(|e| {
            let err_msg = format!("{}", e);
            warn!("Model call failed after {:?}: {}", start.elapsed(), err_msg);
            classify_provider_error(&err_msg)
        })?;

        debug!(
            "Model call: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        Ok(ModelReply {
            content: response.content,
            usage: TokenUsage {
                input_tokens: response.prompt_tokens as usize,
                output_tokens: response.completion_tokens as usize,
            },
        })
    }
}

fn to_chat_message(message: &ModelMessage) -> ChatMessage {
    match message.role {
        MessageRole::System => ChatMessage::system(message.content.as_str()),
        MessageRole::User => ChatMessage::user(message.content.as_str()),
        MessageRole::Assistant => ChatMessage::assistant(message.content.as_str()),
    }
}

/// Build `CompletionOptions` from the generation options.
fn build_options(options: &GenerationOptions) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(options.temperature),
        max_tokens: Some(options.max_tokens),
        ..Default::default()
    }
}

/// Map a provider error message onto the analysis error kinds.
pub fn classify_provider_error(message: &str) -> AnalysisError {
    let lower = message.to_lowercase();
    let detail = message.to_string();
    if lower.contains("429") || lower.contains("rate limit") || lower.contains("rate_limit")
        || lower.contains("too many requests")
    {
        AnalysisError::RateLimited { detail }
    } else if lower.contains("401")
        || lower.contains("403")
        || lower.contains("unauthorized")
        || lower.contains("invalid api key")
        || lower.contains("incorrect api key")
    {
        AnalysisError::Unconfigured {
            hint: format!("The provider rejected the credential: {detail}"),
        }
    } else {
        AnalysisError::Unreachable { detail }
    }
}

// ── Credential and provider resolution ───────────────────────────────────

/// Values shipped in sample `.env` files that are never real keys.
const PLACEHOLDER_CREDENTIALS: &[&str] = &[
    "changeme",
    "change-me",
    "placeholder",
    "your-api-key",
    "your_api_key",
    "your-api-key-here",
    "your_api_key_here",
    "<your-api-key>",
    "sk-...",
    "sk-xxx",
    "xxx",
    "todo",
    "none",
    "null",
];

/// True when `value` is empty or a known placeholder.
pub fn is_placeholder_credential(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v.is_empty() || PLACEHOLDER_CREDENTIALS.contains(&v.as_str())
}

/// Check the credential variable named by `config.credential_env`.
///
/// Runs before any network call; a missing or placeholder value is
/// [`AnalysisError::Unconfigured`].
pub fn check_credential(config: &PaperLensConfig) -> Result<(), AnalysisError> {
    let var = &config.credential_env;
    match std::env::var(var) {
        Ok(value) if !is_placeholder_credential(&value) => Ok(()),
        Ok(_) => Err(AnalysisError::Unconfigured {
            hint: format!("{var} is set to a placeholder value. Set it to a real API key."),
        }),
        Err(_) => Err(AnalysisError::Unconfigured {
            hint: format!("{var} is not set. Export an API key for the reasoning model."),
        }),
    }
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, AnalysisError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        AnalysisError::Unconfigured {
            hint: format!("Provider '{provider_name}' could not be created: {e}"),
        }
    })
}

/// Resolve the provider, from most-specific to least-specific.
///
/// 1. A pre-built `config.provider` is used as-is and skips the credential
///    check; the caller configured it.
/// 2. Otherwise the credential must be present.
/// 3. `config.provider_name` with the configured model.
/// 4. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` when both are set.
/// 5. OpenAI with the configured model.
pub fn resolve_model(config: &PaperLensConfig) -> Result<Arc<dyn ReasoningModel>, AnalysisError> {
    let model = config.model_name().to_string();

    if let Some(ref provider) = config.provider {
        return Ok(Arc::new(ProviderModel::new(Arc::clone(provider), model)));
    }

    check_credential(config)?;

    if let Some(ref name) = config.provider_name {
        let provider = create_provider(name, &model)?;
        return Ok(Arc::new(ProviderModel::new(provider, model)));
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            let provider = create_provider(&prov, &env_model)?;
            return Ok(Arc::new(ProviderModel::new(provider, env_model)));
        }
    }

    let provider = create_provider("openai", &model)?;
    Ok(Arc::new(ProviderModel::new(provider, model)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_defaults() {
        let options = GenerationOptions::from_config(&PaperLensConfig::default());
        let opts = build_options(&options);
        assert_eq!(opts.temperature, Some(0.2));
        assert_eq!(opts.max_tokens, Some(2048));
        assert_eq!(options.timeout, Duration::from_secs(120));
    }

    #[test]
    fn classifies_provider_errors() {
        assert!(matches!(
            classify_provider_error("API error: 429 Too Many Requests"),
            AnalysisError::RateLimited { .. }
        ));
        assert!(matches!(
            classify_provider_error("Rate limit reached for gpt-4.1-nano"),
            AnalysisError::RateLimited { .. }
        ));
        assert!(matches!(
            classify_provider_error("401 Unauthorized: Incorrect API key provided"),
            AnalysisError::Unconfigured { .. }
        ));
        assert!(matches!(
            classify_provider_error("connection reset by peer"),
            AnalysisError::Unreachable { .. }
        ));
        assert!(matches!(
            classify_provider_error("503 Service Unavailable"),
            AnalysisError::Unreachable { .. }
        ));
    }

    #[test]
    fn placeholder_credentials() {
        assert!(is_placeholder_credential(""));
        assert!(is_placeholder_credential("   "));
        assert!(is_placeholder_credential("YOUR-API-KEY"));
        assert!(is_placeholder_credential("sk-..."));
        assert!(!is_placeholder_credential("sk-proj-4f9a8b7c6d5e"));
    }

    #[test]
    fn missing_credential_is_unconfigured() {
        let config = PaperLensConfig::builder()
            .credential_env("PAPERLENS_TEST_NEVER_SET_3A7F")
            .build()
            .unwrap();
        let err = check_credential(&config).unwrap_err();
        match err {
            AnalysisError::Unconfigured { hint } => {
                assert!(hint.contains("PAPERLENS_TEST_NEVER_SET_3A7F"), "got: {hint}")
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(matches!(
            resolve_model(&config),
            Err(AnalysisError::Unconfigured { .. })
        ));
    }

    #[test]
    fn message_constructors_set_roles() {
        assert_eq!(ModelMessage::system("s").role, MessageRole::System);
        assert_eq!(ModelMessage::user("u").role, MessageRole::User);
        assert_eq!(ModelMessage::assistant("a").role, MessageRole::Assistant);
    }
}
