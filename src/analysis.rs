//! Analysis client: send document text to the reasoning model and return a
//! validated result.
//!
//! One [`AnalysisClient`] is built per process and shared by reference. It
//! owns the model handle, the usage recorder and a download client for
//! [`AnalysisClient::analyze_url`]; it holds no per-request state.
//!
//! ## Billing
//!
//! Every call that reached the provider and came back with usage produces
//! exactly one ledger entry, even if the reply then fails to parse. The
//! write runs on a spawned task that the call does not wait for: a slow
//! ledger never holds back the result, and the write still lands if the
//! caller drops the analysis future. Short-lived processes call
//! [`AnalysisClient::flush_usage`] before exiting.
//!
//! ## Results
//!
//! [`AnalysisClient::analyze_document`] returns the bare [`PaperAnalysis`];
//! [`AnalysisClient::analyze_url`] wraps it as [`AnalysisResult::Analysis`].
//! Annotation and chat return [`AnalysisResult::Response`].
//!
//! ## Input ceilings
//!
//! Text is clipped to a character ceiling before it is sent: 150 000 chars
//! for analysis, 50 000 for annotation and chat context. When clipping
//! happens, [`TRUNCATION_MARKER`] is appended after the ceiling and is not
//! counted against it.

use crate::config::PaperLensConfig;
use crate::error::{AnalysisError, PaperError};
use crate::ingest;
use crate::ledger::{ActionKind, UsageRecorder};
use crate::output::{AnalysisResult, ChatTurn, PaperAnalysis, PaperReport, Role};
use crate::pipeline::fetch::ContentFetcher;
use crate::pipeline::llm::{self, GenerationOptions, ModelMessage, ModelReply, ReasoningModel};
use crate::pipeline::normalize::normalize_analysis;
use crate::prompts;
use std::borrow::Cow;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Appended to clipped text so the model knows the document continues.
pub const TRUNCATION_MARKER: &str = "\n\n[... document truncated ...]";

/// Clip `text` to at most `limit` characters, appending
/// [`TRUNCATION_MARKER`] when anything was removed.
pub fn truncate_chars(text: &str, limit: usize) -> Cow<'_, str> {
    match text.char_indices().nth(limit) {
        None => Cow::Borrowed(text),
        Some((cut, _)) => Cow::Owned(format!("{}{}", &text[..cut], TRUNCATION_MARKER)),
    }
}

/// Model handle, or the reason there is none.
#[derive(Clone)]
enum ModelSlot {
    Ready(Arc<dyn ReasoningModel>),
    Unconfigured(String),
}

/// Reasoning-model client for analysis, annotation and chat.
pub struct AnalysisClient {
    model: ModelSlot,
    recorder: UsageRecorder,
    fetcher: ContentFetcher,
    options: GenerationOptions,
    config: PaperLensConfig,
    pending_writes: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for AnalysisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let model = match &self.model {
            ModelSlot::Ready(m) => m.model_name().to_string(),
            ModelSlot::Unconfigured(_) => "<unconfigured>".to_string(),
        };
        f.debug_struct("AnalysisClient")
            .field("model", &model)
            .field("recorder", &self.recorder)
            .field("options", &self.options)
            .finish()
    }
}

impl AnalysisClient {
    /// Build a client around an explicit model handle.
    pub fn new(
        model: Arc<dyn ReasoningModel>,
        recorder: UsageRecorder,
        config: PaperLensConfig,
    ) -> Result<Self, PaperError> {
        Self::with_slot(ModelSlot::Ready(model), recorder, config)
    }

    /// Build a client from configuration.
    ///
    /// A missing or placeholder credential does not fail construction: the
    /// client is created unconfigured and every call returns
    /// [`AnalysisError::Unconfigured`] without touching the network. This
    /// lets the ingest path keep working on a server without a key.
    pub fn from_config(config: PaperLensConfig, recorder: UsageRecorder) -> Result<Self, PaperError> {
        let slot = match llm::resolve_model(&config) {
            Ok(model) => {
                info!("Reasoning model ready: {}", model.model_name());
                ModelSlot::Ready(model)
            }
            Err(AnalysisError::Unconfigured { hint }) => {
                warn!("Reasoning model not configured: {}", hint);
                ModelSlot::Unconfigured(hint)
            }
            Err(e) => return Err(e.into()),
        };
        Self::with_slot(slot, recorder, config)
    }

    fn with_slot(
        model: ModelSlot,
        recorder: UsageRecorder,
        config: PaperLensConfig,
    ) -> Result<Self, PaperError> {
        let fetcher = ContentFetcher::new(&config)?;
        Ok(Self {
            model,
            recorder,
            fetcher,
            options: GenerationOptions::from_config(&config),
            config,
            pending_writes: Mutex::new(Vec::new()),
        })
    }

    pub fn is_configured(&self) -> bool {
        matches!(self.model, ModelSlot::Ready(_))
    }

    pub fn config(&self) -> &PaperLensConfig {
        &self.config
    }

    /// Wait up to `limit` for ledger writes still in flight.
    ///
    /// Returns false if some writes were still running when the limit
    /// expired; they keep running in the background.
    pub async fn flush_usage(&self, limit: Duration) -> bool {
        let handles: Vec<_> = match self.pending_writes.lock() {
            Ok(mut pending) => pending.drain(..).collect(),
            Err(_) => return false,
        };
        if handles.is_empty() {
            return true;
        }
        let count = handles.len();
        let all = futures::future::join_all(handles);
        match tokio::time::timeout(limit, all).await {
            Ok(results) => {
                for e in results.into_iter().filter_map(Result::err) {
                    warn!("Usage write task failed: {}", e);
                }
                true
            }
            Err(_) => {
                warn!("{} usage writes still pending after {:?}", count, limit);
                false
            }
        }
    }

    /// Produce a structured analysis of a whole paper.
    pub async fn analyze_document(
        &self,
        text: &str,
        actor_id: &str,
    ) -> Result<PaperAnalysis, AnalysisError> {
        let document = truncate_chars(text, self.config.analysis_char_limit);
        let messages = vec![
            ModelMessage::system(prompts::ANALYSIS_SYSTEM_PROMPT),
            ModelMessage::user(prompts::analysis_user_message(&document)),
        ];

        let reply = self
            .invoke(actor_id, ActionKind::Analyze, &messages, document.chars().count())
            .await?;

        normalize_analysis(&reply.content).map_err(|e| {
            warn!("Analysis reply for actor={} could not be parsed: {}", actor_id, e);
            self.report_error("analysis", &e.to_string());
            AnalysisError::from(e)
        })
    }

    /// Answer a question about a highlighted excerpt.
    pub async fn answer_annotation(
        &self,
        text: &str,
        excerpt: &str,
        question: &str,
        actor_id: &str,
    ) -> Result<AnalysisResult, AnalysisError> {
        let context = truncate_chars(text, self.config.annotation_char_limit);
        let messages = vec![
            ModelMessage::system(prompts::ANNOTATION_SYSTEM_PROMPT),
            ModelMessage::user(prompts::annotation_user_message(&context, excerpt, question)),
        ];

        let reply = self
            .invoke(actor_id, ActionKind::Annotate, &messages, context.chars().count())
            .await?;
        Ok(AnalysisResult::Response {
            response_text: reply.content.trim().to_string(),
        })
    }

    /// Continue a conversation about a paper.
    ///
    /// The document is sent once as fixed context, then `prior_turns` are
    /// replayed in order. The newest user message is expected to be the
    /// last turn.
    pub async fn chat(
        &self,
        text: &str,
        prior_turns: &[ChatTurn],
        actor_id: &str,
    ) -> Result<AnalysisResult, AnalysisError> {
        let context = truncate_chars(text, self.config.annotation_char_limit);
        if !matches!(prior_turns.last(), Some(turn) if turn.role == Role::User) {
            warn!("Chat for actor={} does not end with a user turn", actor_id);
        }

        let mut messages = Vec::with_capacity(prior_turns.len() + 2);
        messages.push(ModelMessage::system(prompts::CHAT_SYSTEM_PROMPT));
        messages.push(ModelMessage::system(prompts::chat_context_message(&context)));
        messages.extend(prior_turns.iter().map(|turn| match turn.role {
            Role::User => ModelMessage::user(turn.content.as_str()),
            Role::Assistant => ModelMessage::assistant(turn.content.as_str()),
        }));

        let reply = self
            .invoke(actor_id, ActionKind::Chat, &messages, context.chars().count())
            .await?;
        Ok(AnalysisResult::Response {
            response_text: reply.content.trim().to_string(),
        })
    }

    /// Download, reconstruct and analyse the paper at `url`.
    ///
    /// The report carries everything a persistence layer stores: the
    /// extracted text size, the structured document and the analysis.
    pub async fn analyze_url(&self, url: &str, actor_id: &str) -> Result<PaperReport, PaperError> {
        let ingested = ingest::ingest(url, &self.fetcher, &self.config).await?;
        if ingested.document.is_empty() {
            warn!("No text could be extracted from {}; analysing anyway", url);
        }
        let analysis = self.analyze_document(&ingested.markdown, actor_id).await?;
        Ok(PaperReport {
            text_bytes: ingested.text_bytes,
            document: ingested.document,
            analysis: AnalysisResult::Analysis(analysis),
        })
    }

    /// Call the model and record billed usage.
    async fn invoke(
        &self,
        actor_id: &str,
        action: ActionKind,
        messages: &[ModelMessage],
        input_chars: usize,
    ) -> Result<ModelReply, AnalysisError> {
        let model = match &self.model {
            ModelSlot::Ready(model) => Arc::clone(model),
            ModelSlot::Unconfigured(hint) => {
                self.report_error(action.as_str(), hint);
                return Err(AnalysisError::Unconfigured { hint: hint.clone() });
            }
        };

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_analysis_start(action.as_str(), input_chars);
        }
        debug!(
            "Sending {} request for actor={} ({} chars, {} messages)",
            action.as_str(),
            actor_id,
            input_chars,
            messages.len()
        );

        let reply = match model.complete(messages, &self.options).await {
            Ok(reply) => reply,
            Err(e) => {
                self.report_error(action.as_str(), &e.to_string());
                return Err(e);
            }
        };

        // Detached: the reply is returned without waiting on the ledger.
        let recorder = self.recorder.clone();
        let actor = actor_id.to_string();
        let model_name = model.model_name().to_string();
        let usage = reply.usage;
        let write = tokio::spawn(async move {
            recorder.record_usage(&actor, action, &model_name, usage).await;
        });
        if let Ok(mut pending) = self.pending_writes.lock() {
            pending.retain(|handle| !handle.is_finished());
            pending.push(write);
        }

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_analysis_complete(action.as_str(), usage.input_tokens, usage.output_tokens);
        }
        Ok(reply)
    }

    fn report_error(&self, stage: &str, error: &str) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_error(stage, error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_untouched() {
        assert!(matches!(truncate_chars("abc", 3), Cow::Borrowed("abc")));
        assert!(matches!(truncate_chars("", 0), Cow::Borrowed("")));
    }

    #[test]
    fn marker_is_appended_past_the_ceiling() {
        let clipped = truncate_chars("abcdef", 4);
        assert_eq!(clipped, format!("abcd{TRUNCATION_MARKER}"));
        assert_eq!(
            clipped.chars().count(),
            4 + TRUNCATION_MARKER.chars().count()
        );
    }

    #[test]
    fn clipping_respects_char_boundaries() {
        let clipped = truncate_chars("αβγδ", 2);
        assert!(clipped.starts_with("αβ"));
        assert!(!clipped.contains('γ'));
    }
}
