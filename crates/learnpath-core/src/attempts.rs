//! Append-only attempt record store.

use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::AttemptRecord;

/// An append-only log of attempt records.
///
/// There is deliberately no API to modify or remove a record once appended.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptLog {
    records: Vec<AttemptRecord>,
}

impl AttemptLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: AttemptRecord) {
        tracing::debug!(
            subject = %record.subject_id,
            user = %record.user_id,
            "attempt recorded"
        );
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &AttemptRecord> {
        self.records.iter()
    }

    pub fn for_user<'a>(&'a self, user_id: &'a str) -> impl Iterator<Item = &'a AttemptRecord> {
        self.records.iter().filter(move |r| r.user_id == user_id)
    }

    pub fn for_subject<'a>(
        &'a self,
        subject_id: &'a str,
    ) -> impl Iterator<Item = &'a AttemptRecord> {
        self.records.iter().filter(move |r| r.subject_id == subject_id)
    }

    /// Most recent record for a subject.
    pub fn latest(&self, subject_id: &str) -> Option<&AttemptRecord> {
        self.records.iter().rev().find(|r| r.subject_id == subject_id)
    }

    /// Write the whole log to a JSON-lines file, one record per line.
    /// An existing file is replaced, so saving the same log twice leaves a
    /// single copy of each record.
    pub fn save_jsonl(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = std::fs::File::create(path)
            .with_context(|| format!("failed to create attempt log {}", path.display()))?;
        for record in &self.records {
            let line = serde_json::to_string(record).context("failed to serialize attempt")?;
            writeln!(file, "{line}")?;
        }
        Ok(())
    }

    /// Load a JSON-lines attempt log. Blank lines are skipped.
    pub fn load_jsonl(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open attempt log {}", path.display()))?;
        let mut records = Vec::new();
        for (n, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: AttemptRecord = serde_json::from_str(&line)
                .with_context(|| format!("{}:{}: invalid attempt record", path.display(), n + 1))?;
            records.push(record);
        }
        Ok(Self { records })
    }
}

impl Extend<AttemptRecord> for AttemptLog {
    fn extend<T: IntoIterator<Item = AttemptRecord>>(&mut self, iter: T) {
        for record in iter {
            self.append(record);
        }
    }
}
