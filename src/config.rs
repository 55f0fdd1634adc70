//! Configuration for ingestion and analysis.
//!
//! All behaviour is controlled through [`PaperLensConfig`], built via its
//! [`PaperLensConfigBuilder`]. One config value is shared by every pipeline
//! invocation in the process.
//!
//! # Example
//! ```rust
//! use edgequake_paperlens::PaperLensConfig;
//!
//! let config = PaperLensConfig::builder()
//!     .fetch_timeout_secs(30)
//!     .max_download_bytes(20 * 1024 * 1024)
//!     .model("gpt-4.1-mini")
//!     .build()
//!     .unwrap();
//! assert_eq!(config.fetch_timeout_secs, 30);
//! ```

use crate::error::PaperError;
use crate::ledger::Pricing;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Default model when neither the config nor the environment names one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Default environment variable holding the reasoning-model credential.
pub const DEFAULT_CREDENTIAL_ENV: &str = "OPENAI_API_KEY";

#[derive(Clone)]
pub struct PaperLensConfig {
    /// Overall HTTP timeout for a document download, in seconds. Default: 60.
    pub fetch_timeout_secs: u64,

    /// Hard ceiling on downloaded bytes. Default: 100 MiB.
    ///
    /// Enforced while the body streams in, so an oversized response is
    /// dropped after at most one chunk past the limit.
    pub max_download_bytes: u64,

    /// `User-Agent` sent with every download.
    pub user_agent: String,

    /// Documents with more pages are rejected. Default: 500.
    pub max_pages: usize,

    /// Character ceiling for full-paper analysis input. Default: 150 000.
    pub analysis_char_limit: usize,

    /// Character ceiling for document context in annotation answers and
    /// chat. Default: 50 000.
    pub annotation_char_limit: usize,

    /// Model identifier, e.g. "gpt-4.1-nano". If None, [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// Provider name ("openai", "anthropic", …). If None along with
    /// `provider`, the provider is auto-detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.2.
    pub temperature: f32,

    /// Maximum completion tokens per call. Default: 2048.
    pub max_tokens: usize,

    /// Upper bound on a single reasoning-model call, in seconds. Default: 120.
    pub analysis_timeout_secs: u64,

    /// Environment variable checked for the credential before any call.
    pub credential_env: String,

    /// Token prices used for ledger cost estimates.
    pub pricing: Pricing,

    /// Stage events for progress reporting.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PaperLensConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 60,
            max_download_bytes: 100 * 1024 * 1024,
            user_agent: format!("edgequake-paperlens/{}", env!("CARGO_PKG_VERSION")),
            max_pages: 500,
            analysis_char_limit: 150_000,
            annotation_char_limit: 50_000,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.2,
            max_tokens: 2048,
            analysis_timeout_secs: 120,
            credential_env: DEFAULT_CREDENTIAL_ENV.to_string(),
            pricing: Pricing::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PaperLensConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaperLensConfig")
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("max_download_bytes", &self.max_download_bytes)
            .field("user_agent", &self.user_agent)
            .field("max_pages", &self.max_pages)
            .field("analysis_char_limit", &self.analysis_char_limit)
            .field("annotation_char_limit", &self.annotation_char_limit)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("analysis_timeout_secs", &self.analysis_timeout_secs)
            .field("credential_env", &self.credential_env)
            .field("pricing", &self.pricing)
            .finish()
    }
}

impl PaperLensConfig {
    pub fn builder() -> PaperLensConfigBuilder {
        PaperLensConfigBuilder {
            config: Self::default(),
        }
    }

    /// The configured model, or [`DEFAULT_MODEL`].
    pub fn model_name(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Builder for [`PaperLensConfig`].
#[derive(Debug)]
pub struct PaperLensConfigBuilder {
    config: PaperLensConfig,
}

impl PaperLensConfigBuilder {
    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = secs;
        self
    }

    pub fn max_download_bytes(mut self, bytes: u64) -> Self {
        self.config.max_download_bytes = bytes;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn max_pages(mut self, n: usize) -> Self {
        self.config.max_pages = n.max(1);
        self
    }

    pub fn analysis_char_limit(mut self, n: usize) -> Self {
        self.config.analysis_char_limit = n;
        self
    }

    pub fn annotation_char_limit(mut self, n: usize) -> Self {
        self.config.annotation_char_limit = n;
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

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
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

    pub fn analysis_timeout_secs(mut self, secs: u64) -> Self {
        self.config.analysis_timeout_secs = secs;
        self
    }

    pub fn credential_env(mut self, var: impl Into<String>) -> Self {
        self.config.credential_env = var.into();
        self
    }

    pub fn pricing(mut self, pricing: Pricing) -> Self {
        self.config.pricing = pricing;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PaperLensConfig, PaperError> {
        let c = &self.config;
        if c.fetch_timeout_secs == 0 {
            return Err(PaperError::InvalidConfig(
                "Fetch timeout must be ≥ 1 second".into(),
            ));
        }
        if c.analysis_timeout_secs == 0 {
            return Err(PaperError::InvalidConfig(
                "Analysis timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_download_bytes == 0 {
            return Err(PaperError::InvalidConfig(
                "Download size limit must be ≥ 1 byte".into(),
            ));
        }
        if c.analysis_char_limit == 0 || c.annotation_char_limit == 0 {
            return Err(PaperError::InvalidConfig(
                "Character limits must be ≥ 1".into(),
            ));
        }
        if c.user_agent.trim().is_empty() {
            return Err(PaperError::InvalidConfig("User agent must not be empty".into()));
        }
        if c.credential_env.trim().is_empty() {
            return Err(PaperError::InvalidConfig(
                "Credential variable name must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_limits() {
        let c = PaperLensConfig::default();
        assert_eq!(c.fetch_timeout_secs, 60);
        assert_eq!(c.max_download_bytes, 100 * 1024 * 1024);
        assert_eq!(c.analysis_char_limit, 150_000);
        assert_eq!(c.annotation_char_limit, 50_000);
        assert!(c.user_agent.starts_with("edgequake-paperlens/"));
        assert_eq!(c.model_name(), DEFAULT_MODEL);
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        let err = PaperLensConfig::builder()
            .fetch_timeout_secs(0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("timeout"), "got: {err}");
    }

    #[test]
    fn builder_clamps_temperature() {
        let c = PaperLensConfig::builder().temperature(9.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }
}
