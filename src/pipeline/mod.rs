//! Pipeline stages for paper ingestion and analysis.
//!
//! Each submodule implements exactly one transformation step and is tested
//! on its own.
//!
//! ## Data Flow
//!
//! ```text
//! fetch ──▶ extract ──▶ structure ──▶ llm ──▶ normalize
//! (HTTP)    (lopdf)     (line rules)  (model)  (JSON recovery)
//! ```
//!
//! 1. [`fetch`]     — bounded streaming download; the only network I/O
//!    besides the model call
//! 2. [`extract`]   — PDF bytes to text lines; synchronous
//! 3. [`structure`] — ordered line rules to typed blocks and Markdown
//! 4. [`llm`]       — the [`llm::ReasoningModel`] port and provider adapter
//! 5. [`normalize`] — recover and bound the analysis fields from model text

pub mod extract;
pub mod fetch;
pub mod llm;
pub mod normalize;
pub mod structure;
