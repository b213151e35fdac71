//! Chat history (append-only message log)
//!
//! The router appends every broadcast, delivered private message and
//! join/leave notice here. `FileHistory` writes one line per entry to a file
//! from a dedicated writer task, so appends from many sessions never
//! contend on the file and never block routing.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Append capability consumed by the router
///
/// Implementations must tolerate concurrent calls from many sessions.
pub trait ChatHistory: Send + Sync {
    fn append(&self, text: &str);
}

/// Operations queued to the file writer task
#[derive(Debug)]
enum HistoryOp {
    Append(String),
    Flush(oneshot::Sender<()>),
}

/// Append-only file history
#[derive(Debug, Clone)]
pub struct FileHistory {
    path: PathBuf,
    sender: mpsc::UnboundedSender<HistoryOp>,
}

impl FileHistory {
    /// Open (or create) the history file and start its writer task
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        let (sender, mut receiver) = mpsc::unbounded_channel();
        let task_path = path.clone();

        tokio::spawn(async move {
            while let Some(op) = receiver.recv().await {
                match op {
                    HistoryOp::Append(text) => {
                        let line = format!("{}\n", text);
                        if let Err(e) = file.write_all(line.as_bytes()).await {
                            warn!("Failed to write history to {}: {}", task_path.display(), e);
                        }
                    }
                    HistoryOp::Flush(done) => {
                        if let Err(e) = file.flush().await {
                            warn!("Failed to flush history {}: {}", task_path.display(), e);
                        }
                        let _ = done.send(());
                    }
                }
            }
            debug!("History writer for {} ended", task_path.display());
        });

        Ok(Self { path, sender })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait until every entry appended so far has been written out
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.sender.send(HistoryOp::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }
}

impl ChatHistory for FileHistory {
    fn append(&self, text: &str) {
        if self.sender.send(HistoryOp::Append(text.to_string())).is_err() {
            warn!("History writer for {} is gone, dropping entry", self.path.display());
        }
    }
}

/// In-memory history
///
/// Keeps entries in append order so callers can inspect what was logged.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    entries: Mutex<Vec<String>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all entries in append order
    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl ChatHistory for MemoryHistory {
    fn append(&self, text: &str) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(text.to_string());
    }
}

/// History that keeps nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardHistory;

impl ChatHistory for DiscardHistory {
    fn append(&self, _text: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_history_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat_history.txt");

        let history = FileHistory::open(&path).await.unwrap();
        history.append("Alice has joined the chat!");
        history.append("Alice: hello");
        history.flush().await;

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents, "Alice has joined the chat!\nAlice: hello\n");
    }

    #[tokio::test]
    async fn test_file_history_keeps_existing_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat_history.txt");
        tokio::fs::write(&path, "earlier\n").await.unwrap();

        let history = FileHistory::open(&path).await.unwrap();
        history.append("later");
        history.flush().await;

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents, "earlier\nlater\n");
    }

    #[tokio::test]
    async fn test_file_history_concurrent_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat_history.txt");
        let history = FileHistory::open(&path).await.unwrap();

        let mut tasks = Vec::new();
        for i in 0..10 {
            let history = history.clone();
            tasks.push(tokio::spawn(async move {
                history.append(&format!("line {i}"));
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        history.flush().await;

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents.lines().count(), 10);
    }

    #[tokio::test]
    async fn test_file_history_open_fails_for_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("chat_history.txt");

        assert!(FileHistory::open(&path).await.is_err());
    }

    #[test]
    fn test_memory_history_order() {
        let history = MemoryHistory::new();
        history.append("one");
        history.append("two");

        assert_eq!(history.entries(), vec!["one", "two"]);
    }
}
