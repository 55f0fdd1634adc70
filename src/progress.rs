//! Progress-callback trait for pipeline stage events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PaperLensConfigBuilder::progress_callback`] to receive
//! events as a paper moves through fetch, extraction, reconstruction and
//! analysis. Requests for different papers run concurrently, so
//! implementations must be `Send + Sync` and protect their own state.
//!
//! # Example
//!
//! ```rust
//! use edgequake_paperlens::{PaperLensConfig, PipelineProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct ByteCounter(AtomicUsize);
//!
//! impl PipelineProgressCallback for ByteCounter {
//!     fn on_fetch_complete(&self, _url: &str, bytes: usize) {
//!         self.0.fetch_add(bytes, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = PaperLensConfig::builder()
//!     .progress_callback(Arc::new(ByteCounter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline at stage boundaries. All methods default to no-ops.
pub trait PipelineProgressCallback: Send + Sync {
    /// The download is about to start.
    fn on_fetch_start(&self, url: &str) {
        let _ = url;
    }

    /// The body has been fully received.
    fn on_fetch_complete(&self, url: &str, bytes: usize) {
        let _ = (url, bytes);
    }

    /// Text was extracted from the document.
    fn on_extract_complete(&self, page_count: usize, line_count: usize) {
        let _ = (page_count, line_count);
    }

    /// The structured document is ready.
    fn on_structure_complete(&self, block_count: usize) {
        let _ = block_count;
    }

    /// A reasoning-model request is about to be sent.
    ///
    /// * `action` — "analyze", "annotate" or "chat"
    /// * `input_chars` — characters of document context after truncation
    fn on_analysis_start(&self, action: &str, input_chars: usize) {
        let _ = (action, input_chars);
    }

    /// The reasoning model replied with billable usage.
    fn on_analysis_complete(&self, action: &str, input_tokens: usize, output_tokens: usize) {
        let _ = (action, input_tokens, output_tokens);
    }

    /// A stage failed. `error` is the error's display text.
    fn on_error(&self, stage: &str, error: &str) {
        let _ = (stage, error);
    }
}

/// A no-op implementation, used when no callback is configured.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PaperLensConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        fetched: AtomicUsize,
        stages: Mutex<Vec<String>>,
    }

    impl PipelineProgressCallback for TrackingCallback {
        fn on_fetch_complete(&self, _url: &str, bytes: usize) {
            self.fetched.fetch_add(bytes, Ordering::SeqCst);
        }

        fn on_error(&self, stage: &str, _error: &str) {
            self.stages.lock().unwrap().push(stage.to_string());
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_fetch_start("https://example.org");
        cb.on_fetch_complete("https://example.org", 10);
        cb.on_extract_complete(1, 2);
        cb.on_structure_complete(3);
        cb.on_analysis_start("analyze", 100);
        cb.on_analysis_complete("analyze", 10, 5);
        cb.on_error("fetch", "boom");
    }

    #[test]
    fn tracking_callback_receives_events() {
        let cb = TrackingCallback::default();
        cb.on_fetch_complete("a", 100);
        cb.on_fetch_complete("b", 23);
        cb.on_error("extract", "corrupt");
        assert_eq!(cb.fetched.load(Ordering::SeqCst), 123);
        assert_eq!(*cb.stages.lock().unwrap(), vec!["extract".to_string()]);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_structure_complete(4);
    }
}
