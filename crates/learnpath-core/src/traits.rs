//! Core trait definitions for the external collaborators.
//!
//! These async traits are implemented by the `learnpath-providers` crate:
//! where quiz questions come from, and where completion events go.

use async_trait::async_trait;

use crate::model::{CompletionEvent, QuizQuestion};

/// Supplies the question bank for a module.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Human-readable source name (e.g. "http").
    fn name(&self) -> &str;

    /// Fetch every question for a module. An unknown module or an empty
    /// bank may be returned as an empty list.
    async fn questions(&self, module_id: &str) -> anyhow::Result<Vec<QuizQuestion>>;
}

/// Receives completion events.
///
/// Nothing beyond success or failure of the call is relied upon.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Human-readable sink name (e.g. "jsonl").
    fn name(&self) -> &str;

    async fn record(&self, event: &CompletionEvent) -> anyhow::Result<()>;
}

/// A sink that drops every event, for offline use.
pub struct DiscardSink;

#[async_trait]
impl ProgressSink for DiscardSink {
    fn name(&self) -> &str {
        "none"
    }

    async fn record(&self, event: &CompletionEvent) -> anyhow::Result<()> {
        tracing::debug!(module = %event.module_id, lesson = %event.lesson_id, "event discarded");
        Ok(())
    }
}
