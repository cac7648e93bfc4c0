//! Submission journal
//!
//! Append-only JSONL record of every execution the console accepted. A task
//! id found here is never signed again, which makes submission at-most-once
//! even if the process dies while the workflow is still being monitored.

use crate::console::UnsignedTransaction;
use crate::{Error, Result};
use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// One accepted submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub timestamp: DateTime<Utc>,
    pub task_id: String,
    pub registry_id: String,
    pub subaccount: Address,
    /// blake3 of the signed executable
    pub fingerprint: String,
}

impl JournalEntry {
    pub fn new(
        task_id: &str,
        registry_id: &str,
        subaccount: Address,
        executable: &UnsignedTransaction,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            task_id: task_id.to_string(),
            registry_id: registry_id.to_string(),
            subaccount,
            fingerprint: fingerprint(executable),
        }
    }
}

/// Stable digest of `to ‖ value ‖ data ‖ operation`
pub fn fingerprint(tx: &UnsignedTransaction) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(tx.to.as_slice());
    hasher.update(&tx.value.to_be_bytes::<32>());
    hasher.update(&tx.data);
    hasher.update(&[u8::from(tx.operation)]);
    hasher.finalize().to_hex().to_string()
}

pub struct SubmissionJournal {
    path: Option<PathBuf>,
    entries: Mutex<HashMap<String, JournalEntry>>,
}

impl SubmissionJournal {
    /// Journal that lives only as long as the process
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Open (or start) the journal at `path`, loading earlier submissions.
    /// A file with unreadable lines is rewritten with only its valid entries
    /// before anything new is appended to it.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let Loaded { entries, clean } = load_entries(&path)?;
        if !clean {
            compact(&path, &entries).map_err(|e| {
                Error::Journal(format!("Failed to repair {}: {}", path.display(), e))
            })?;
            tracing::warn!(path = %path.display(), "Repaired torn submission journal");
        }
        tracing::info!(
            path = %path.display(),
            entries = entries.len(),
            "Loaded submission journal"
        );
        Ok(Self {
            path: Some(path),
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub async fn contains(&self, task_id: &str) -> bool {
        self.entries.lock().await.contains_key(task_id)
    }

    pub async fn get(&self, task_id: &str) -> Option<JournalEntry> {
        self.entries.lock().await.get(task_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Remember `entry`. The in-memory ledger is updated even when the file
    /// write fails, so this process still never resubmits the task.
    pub async fn record(&self, entry: JournalEntry) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(entry.task_id.clone(), entry.clone());

        let Some(path) = &self.path else {
            return Ok(());
        };
        append_entry(path, &entry)
            .map_err(|e| Error::Journal(format!("Failed to append to {}: {}", path.display(), e)))
    }
}

struct Loaded {
    entries: HashMap<String, JournalEntry>,
    /// Every line parsed and the file ends in a newline
    clean: bool,
}

fn load_entries(path: &Path) -> Result<Loaded> {
    let mut entries = HashMap::new();
    if !path.exists() {
        return Ok(Loaded {
            entries,
            clean: true,
        });
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Journal(format!("Failed to open {}: {}", path.display(), e)))?;
    let mut clean = content.is_empty() || content.ends_with('\n');
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        // A crash mid-write can leave a torn last line
        match serde_json::from_str::<JournalEntry>(line) {
            Ok(entry) => {
                entries.insert(entry.task_id.clone(), entry);
            }
            Err(e) => {
                clean = false;
                tracing::warn!(
                    path = %path.display(),
                    line = index + 1,
                    error = %e,
                    "Skipping unreadable journal line"
                );
            }
        }
    }
    Ok(Loaded { entries, clean })
}

/// Replace the file with `entries`, oldest first, via a temp file and rename
fn compact(path: &Path, entries: &HashMap<String, JournalEntry>) -> std::io::Result<()> {
    let mut ordered: Vec<&JournalEntry> = entries.values().collect();
    ordered.sort_by(|a, b| (a.timestamp, &a.task_id).cmp(&(b.timestamp, &b.task_id)));

    let tmp = path.with_extension("jsonl.tmp");
    {
        let mut file = std::fs::File::create(&tmp)?;
        for entry in ordered {
            writeln!(file, "{}", serde_json::to_string(entry)?)?;
        }
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)
}

fn append_entry(path: &Path, entry: &JournalEntry) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let json = serde_json::to_string(entry)?;
    writeln!(file, "{}", json)?;
    file.sync_data()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;

    fn executable(byte: u8) -> UnsignedTransaction {
        UnsignedTransaction::call(Address::repeat_byte(byte), vec![byte; 4])
    }

    #[tokio::test]
    async fn in_memory_journal_remembers_tasks() {
        let journal = SubmissionJournal::in_memory();
        assert!(!journal.contains("t1").await);

        journal
            .record(JournalEntry::new("t1", "reg", Address::ZERO, &executable(1)))
            .await
            .unwrap();
        assert!(journal.contains("t1").await);
        assert!(journal.path().is_none());
    }

    #[tokio::test]
    async fn reopened_journal_keeps_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("submissions.jsonl");

        let journal = SubmissionJournal::open(&path).unwrap();
        journal
            .record(JournalEntry::new("t1", "reg", Address::repeat_byte(9), &executable(1)))
            .await
            .unwrap();
        journal
            .record(JournalEntry::new("t2", "reg", Address::repeat_byte(9), &executable(2)))
            .await
            .unwrap();
        drop(journal);

        let reopened = SubmissionJournal::open(&path).unwrap();
        assert_eq!(reopened.len().await, 2);
        let entry = reopened.get("t2").await.unwrap();
        assert_eq!(entry.subaccount, Address::repeat_byte(9));
        assert_eq!(entry.fingerprint, fingerprint(&executable(2)));
    }

    #[tokio::test]
    async fn torn_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("submissions.jsonl");
        let good = serde_json::to_string(&JournalEntry::new(
            "t1",
            "reg",
            Address::ZERO,
            &executable(1),
        ))
        .unwrap();
        std::fs::write(&path, format!("{}\n\n{{\"task_id\":\"t2\",", good)).unwrap();

        let journal = SubmissionJournal::open(&path).unwrap();
        assert!(journal.contains("t1").await);
        assert!(!journal.contains("t2").await);
    }

    #[tokio::test]
    async fn record_after_torn_tail_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("submissions.jsonl");
        let good = serde_json::to_string(&JournalEntry::new(
            "t1",
            "reg",
            Address::ZERO,
            &executable(1),
        ))
        .unwrap();
        // Crash while writing the second entry: no trailing newline
        std::fs::write(&path, format!("{}\n{{\"timestamp\":\"2026-01-", good)).unwrap();

        let journal = SubmissionJournal::open(&path).unwrap();
        journal
            .record(JournalEntry::new("t9", "reg", Address::ZERO, &executable(9)))
            .await
            .unwrap();
        drop(journal);

        let reopened = SubmissionJournal::open(&path).unwrap();
        assert!(reopened.contains("t1").await);
        assert!(reopened.contains("t9").await);
        assert_eq!(reopened.len().await, 2);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.ends_with('\n'));
    }

    #[tokio::test]
    async fn torn_tail_alone_is_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("submissions.jsonl");
        std::fs::write(&path, "{\"timestamp\":\"2026-01-").unwrap();

        let journal = SubmissionJournal::open(&path).unwrap();
        assert_eq!(journal.len().await, 0);
        journal
            .record(JournalEntry::new("t9", "reg", Address::ZERO, &executable(9)))
            .await
            .unwrap();
        drop(journal);

        let reopened = SubmissionJournal::open(&path).unwrap();
        assert!(reopened.contains("t9").await);
    }

    #[test]
    fn fingerprint_covers_every_field() {
        let base = executable(1);
        let mut other_value = base.clone();
        other_value.value = U256::from(1);
        let mut other_op = base.clone();
        other_op.operation = crate::console::Operation::DelegateCall;

        assert_eq!(fingerprint(&base), fingerprint(&executable(1)));
        assert_ne!(fingerprint(&base), fingerprint(&other_value));
        assert_ne!(fingerprint(&base), fingerprint(&other_op));
        assert_eq!(fingerprint(&base).len(), 64);
    }
}
