//! In-memory content source and progress sink for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use learnpath_core::error::ProviderError;
use learnpath_core::model::{CompletionEvent, QuizQuestion};
use learnpath_core::traits::{ContentSource, ProgressSink};

/// A content source that serves fixed question banks without network access.
pub struct MockContentSource {
    /// Map of module id → question bank.
    banks: HashMap<String, Vec<QuizQuestion>>,
    /// When set, every fetch fails with this message.
    failure: Option<String>,
    call_count: AtomicU32,
}

impl MockContentSource {
    pub fn new(banks: HashMap<String, Vec<QuizQuestion>>) -> Self {
        Self {
            banks,
            failure: None,
            call_count: AtomicU32::new(0),
        }
    }

    /// Serve one bank for a single module.
    pub fn with_bank(module_id: &str, questions: Vec<QuizQuestion>) -> Self {
        Self::new(HashMap::from([(module_id.to_string(), questions)]))
    }

    /// A source whose every fetch fails with a network error.
    pub fn failing(message: &str) -> Self {
        Self {
            banks: HashMap::new(),
            failure: Some(message.to_string()),
            call_count: AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ContentSource for MockContentSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn questions(&self, module_id: &str) -> anyhow::Result<Vec<QuizQuestion>> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if let Some(message) = &self.failure {
            return Err(ProviderError::NetworkError(message.clone()).into());
        }
        Ok(self.banks.get(module_id).cloned().unwrap_or_default())
    }
}

/// A sink that keeps every event in memory and can be told to fail.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<CompletionEvent>>,
    fail: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that rejects every event until `set_failing(false)`.
    pub fn failing() -> Self {
        let sink = Self::default();
        sink.set_failing(true);
        sink
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }

    /// Events accepted so far.
    pub fn events(&self) -> Vec<CompletionEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ProgressSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn record(&self, event: &CompletionEvent) -> anyhow::Result<()> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(ProviderError::ApiError {
                status: 503,
                message: "sink unavailable".to_string(),
            }
            .into());
        }
        self.events
            .lock()
            .map_err(|_| anyhow::anyhow!("recording sink poisoned"))?
            .push(event.clone());
        Ok(())
    }
}
