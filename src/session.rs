//! Async front-end for interactive use: one image in flight per request, and
//! results for images that were replaced before finishing are dropped.

use image::DynamicImage;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::config::LiveThreshold;
use crate::error::{CascadeError, CascadeFailure};
use crate::models::Decision;
use crate::screening::Cascade;

#[derive(Clone)]
pub struct CascadeSession {
    cascade: Arc<Cascade>,
    threshold: LiveThreshold,
    generation: Arc<AtomicU64>,
}

impl CascadeSession {
    pub fn new(cascade: Cascade) -> Self {
        let threshold = LiveThreshold::new(cascade.config().potato_threshold);
        Self::with_threshold(cascade, threshold)
    }

    pub fn with_threshold(cascade: Cascade, threshold: LiveThreshold) -> Self {
        Self {
            cascade: Arc::new(cascade),
            threshold,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn cascade(&self) -> &Arc<Cascade> {
        &self.cascade
    }

    /// Handle for a UI control; changes apply to the next guard evaluation
    pub fn threshold(&self) -> &LiveThreshold {
        &self.threshold
    }

    /// Mark any in-flight classification as stale
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Classify `img` on the blocking pool.
    ///
    /// Returns `Ok(None)` when a newer request (or [`CascadeSession::cancel`])
    /// superseded this one while it was running. Its inference still runs to
    /// completion, but the result is discarded.
    pub async fn classify(&self, img: DynamicImage) -> Result<Option<Decision>, CascadeFailure> {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let cascade = Arc::clone(&self.cascade);
        let threshold = self.threshold.clone();
        let outcome = tokio::task::spawn_blocking(move || cascade.classify(&img, &threshold))
            .await
            .map_err(|e| CascadeError::Aborted(e.to_string()))?;

        if self.generation.load(Ordering::SeqCst) != ticket {
            debug!(ticket, "discarding superseded classification");
            return Ok(None);
        }
        outcome.map(Some)
    }
}
