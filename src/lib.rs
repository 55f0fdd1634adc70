//! # edgequake-paperlens
//!
//! Turn a paper URL into a structured document and a model-written analysis.
//!
//! PDF text extraction loses all structure: headings, lists and paragraphs
//! arrive as a flat run of lines. This crate rebuilds a light structure with
//! deterministic line rules, then asks a reasoning model for a summary,
//! rating, category, tags and key findings. Every billed model call is
//! recorded in a usage ledger.
//!
//! ## Pipeline Overview
//!
//! ```text
//! URL
//!  │
//!  ├─ 1. Fetch      streaming download with size and time limits
//!  ├─ 2. Extract    PDF text lines via lopdf
//!  ├─ 3. Structure  title / section / subsection / list / paragraph blocks
//!  ├─ 4. Analyse    reasoning-model call (analysis, annotation or chat)
//!  ├─ 5. Normalise  JSON recovery and field bounds
//!  └─ 6. Ledger     one usage entry per billed call
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_paperlens::{AnalysisClient, JsonlLedger, PaperLensConfig, UsageRecorder};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PaperLensConfig::default();
//!     let recorder = UsageRecorder::with_ledger(
//!         Arc::new(JsonlLedger::new("usage.jsonl")),
//!         config.pricing,
//!     );
//!     let client = AnalysisClient::from_config(config, recorder)?;
//!     let report = client
//!         .analyze_url("https://arxiv.org/pdf/1706.03762", "reader-42")
//!         .await?;
//!     println!("{}", serde_json::to_string_pretty(&report.analysis)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `paperlens` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-paperlens = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analysis;
pub mod config;
pub mod error;
pub mod ingest;
pub mod ledger;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod retry;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analysis::{truncate_chars, AnalysisClient, TRUNCATION_MARKER};
pub use config::{PaperLensConfig, PaperLensConfigBuilder};
pub use error::{
    AnalysisError, ErrorCategory, ExtractError, FetchError, LedgerError, PaperError, ParseError,
};
pub use ingest::{ingest, ingest_bytes};
pub use ledger::{
    ActionKind, Clock, JsonlLedger, MemoryLedger, Pricing, SystemClock, TokenUsage, UsageEvent,
    UsageLedger, UsageRecorder,
};
pub use output::{
    AnalysisResult, Block, BlockKind, Category, ChatTurn, ExtractedText, IngestOutput,
    IngestStats, PaperAnalysis, PaperReport, RawDocument, Role, StructuredDocument,
};
pub use pipeline::fetch::ContentFetcher;
pub use pipeline::llm::{GenerationOptions, ModelMessage, ModelReply, ReasoningModel};
pub use pipeline::normalize::normalize_analysis;
pub use pipeline::structure::{reconstruct, render_markdown};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use retry::{retry_with_backoff, RetryPolicy, Retryable};
