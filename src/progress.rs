//! Progress-callback trait for review pipeline events.
//!
//! Inject an [`Arc<dyn ReviewProgressCallback>`] via
//! [`crate::config::ReviewConfigBuilder::progress_callback`] to observe the
//! pipeline as it moves through its stages. The CLI uses this to drive its
//! spinner; library callers can forward events wherever they like.
//!
//! # Example
//!
//! ```rust
//! use contract_review::{ReviewConfig, ReviewProgressCallback, Stage};
//! use std::sync::{Arc, Mutex};
//!
//! struct StageLog(Mutex<Vec<Stage>>);
//!
//! impl ReviewProgressCallback for StageLog {
//!     fn on_stage_start(&self, stage: Stage) {
//!         self.0.lock().unwrap().push(stage);
//!     }
//! }
//!
//! let log = Arc::new(StageLog(Mutex::new(Vec::new())));
//! let config = ReviewConfig::builder()
//!     .progress_callback(log as Arc<dyn ReviewProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;

/// Pipeline stages, in the order a review passes through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Validating and reading the PDF input(s).
    Loading,
    /// Loading templates and assembling knowledge into the prompt.
    Composing,
    /// Waiting on the remote model.
    Inference,
    /// Extracting JSON / cleaning Markdown from the reply.
    Parsing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Loading => "Reading PDF",
            Stage::Composing => "Composing prompt",
            Stage::Inference => "Waiting for the model",
            Stage::Parsing => "Parsing response",
        };
        f.write_str(label)
    }
}

/// Called by the review pipeline as it moves between stages.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ReviewProgressCallback: Send + Sync {
    /// Called when a stage begins.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called once the model has answered.
    ///
    /// # Arguments
    /// * `input_tokens`: prompt tokens reported by the provider
    /// * `output_tokens`: completion tokens reported by the provider
    fn on_response(&self, input_tokens: u64, output_tokens: u64) {
        let _ = (input_tokens, output_tokens);
    }

    /// Called when the review finishes, successfully or not.
    fn on_review_complete(&self, success: bool) {
        let _ = success;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ReviewProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ReviewConfig`].
pub type ProgressCallback = Arc<dyn ReviewProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct TrackingCallback {
        stages: Mutex<Vec<Stage>>,
        tokens: AtomicU64,
        completions: AtomicUsize,
    }

    impl ReviewProgressCallback for TrackingCallback {
        fn on_stage_start(&self, stage: Stage) {
            self.stages.lock().unwrap().push(stage);
        }

        fn on_response(&self, input_tokens: u64, output_tokens: u64) {
            self.tokens
                .fetch_add(input_tokens + output_tokens, Ordering::SeqCst);
        }

        fn on_review_complete(&self, _success: bool) {
            self.completions.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage_start(Stage::Loading);
        cb.on_response(10, 20);
        cb.on_review_complete(false);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback {
            stages: Mutex::new(Vec::new()),
            tokens: AtomicU64::new(0),
            completions: AtomicUsize::new(0),
        };

        tracker.on_stage_start(Stage::Loading);
        tracker.on_stage_start(Stage::Inference);
        tracker.on_response(1200, 300);
        tracker.on_review_complete(true);

        assert_eq!(
            *tracker.stages.lock().unwrap(),
            vec![Stage::Loading, Stage::Inference]
        );
        assert_eq!(tracker.tokens.load(Ordering::SeqCst), 1500);
        assert_eq!(tracker.completions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stage_labels_are_human_readable() {
        assert_eq!(Stage::Inference.to_string(), "Waiting for the model");
    }
}
