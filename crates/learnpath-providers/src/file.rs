//! Local content source backed by curriculum files, and a JSON Lines
//! progress sink.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use learnpath_core::model::{CompletionEvent, Curriculum, QuizQuestion};
use learnpath_core::parser::load_curricula;
use learnpath_core::traits::{ContentSource, ProgressSink};

/// Serves question banks out of curricula loaded from disk.
pub struct FileContentSource {
    banks: HashMap<String, Vec<QuizQuestion>>,
}

impl FileContentSource {
    /// Load a curriculum file or a directory of them.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let curricula = load_curricula(path)
            .with_context(|| format!("failed to load content from {}", path.display()))?;
        Ok(Self::from_curricula(&curricula))
    }

    pub fn from_curricula(curricula: &[Curriculum]) -> Self {
        let mut banks: HashMap<String, Vec<QuizQuestion>> = HashMap::new();
        for module in curricula.iter().flat_map(|c| &c.modules) {
            banks
                .entry(module.id.clone())
                .or_default()
                .extend(module.questions.iter().cloned());
        }
        Self { banks }
    }

    pub fn module_count(&self) -> usize {
        self.banks.len()
    }
}

#[async_trait]
impl ContentSource for FileContentSource {
    fn name(&self) -> &str {
        "file"
    }

    async fn questions(&self, module_id: &str) -> anyhow::Result<Vec<QuizQuestion>> {
        Ok(self.banks.get(module_id).cloned().unwrap_or_default())
    }
}

/// Appends completion events to a `.jsonl` file, one event per line.
pub struct JsonlProgressSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlProgressSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back every event written so far.
    pub fn read_events(path: &Path) -> anyhow::Result<Vec<CompletionEvent>> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read events from {}", path.display()))?;
        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .enumerate()
            .map(|(i, line)| {
                serde_json::from_str(line)
                    .with_context(|| format!("{}:{}: invalid event", path.display(), i + 1))
            })
            .collect()
    }
}

#[async_trait]
impl ProgressSink for JsonlProgressSink {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn record(&self, event: &CompletionEvent) -> anyhow::Result<()> {
        let mut line = serde_json::to_string(event).context("failed to serialize event")?;
        line.push('\n');

        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        tracing::debug!(path = %self.path.display(), module = %event.module_id, "event appended");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const CURRICULUM: &str = r#"
[curriculum]
id = "prompting"
name = "Prompt Engineering"

[[tracks]]
id = "foundations"
name = "Foundations"
modules = ["basics"]

[[modules]]
id = "basics"
title = "Prompt Basics"
lessons = 2

[[modules.questions]]
id = "b1"
type = "tf"
question = "Few-shot prompts include worked examples."
answer = true
"#;

    fn event(lesson: &str) -> CompletionEvent {
        CompletionEvent {
            module_id: "basics".into(),
            lesson_id: lesson.into(),
            completed: true,
            quiz_score: None,
            time_spent: None,
        }
    }

    #[tokio::test]
    async fn serves_questions_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("prompting.toml"), CURRICULUM).unwrap();

        let source = FileContentSource::load(dir.path()).unwrap();
        assert_eq!(source.module_count(), 1);
        assert_eq!(source.questions("basics").await.unwrap().len(), 1);
        assert!(source.questions("unknown").await.unwrap().is_empty());
    }

    #[test]
    fn missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FileContentSource::load(&dir.path().join("nope.toml")).is_err());
    }

    #[tokio::test]
    async fn appends_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("events.jsonl");
        let sink = JsonlProgressSink::new(&path);

        sink.record(&event("l1")).await.unwrap();
        sink.record(&event("l2")).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().count(), 2);
        assert!(raw.contains("\"lessonId\":\"l1\""));

        let events = JsonlProgressSink::read_events(&path).unwrap();
        assert_eq!(events[1].lesson_id, "l2");
    }

    #[tokio::test]
    async fn concurrent_writes_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let sink = Arc::new(JsonlProgressSink::new(&path));

        let mut handles = Vec::new();
        for i in 0..20 {
            let sink = sink.clone();
            handles.push(tokio::spawn(async move {
                sink.record(&event(&format!("l{i}"))).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(JsonlProgressSink::read_events(&path).unwrap().len(), 20);
    }
}
