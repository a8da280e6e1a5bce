use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Keep this many rotated `session-*.log` files.
const MAX_SESSIONS: usize = 10;

/// Async activity logger that writes timestamped lines to `<logs>/latest.log`.
///
/// Uses an mpsc channel so callers never block on disk I/O: `log()` just sends
/// through the channel, and a background task does the actual writing.
/// Cloning is cheap; the writer finishes once every clone is dropped.
#[derive(Clone)]
pub struct ActivityLog {
    tx: Option<mpsc::UnboundedSender<String>>,
    echo: bool,
}

impl ActivityLog {
    /// Create a new log session in `logs_dir`.
    ///
    /// - Creates the directory if it doesn't exist
    /// - Rotates `latest.log` → `session-{timestamp}.log`
    /// - Cleans up old sessions (keeps max 10)
    /// - Spawns a background writer task
    pub async fn open(logs_dir: &Path) -> Option<(Self, JoinHandle<()>)> {
        if tokio::fs::create_dir_all(logs_dir).await.is_err() {
            return None;
        }

        let latest = logs_dir.join("latest.log");

        if latest.exists() {
            let ts = chrono::Utc::now().timestamp_millis();
            let rotated = logs_dir.join(format!("session-{ts}.log"));
            let _ = tokio::fs::rename(&latest, &rotated).await;
        }

        cleanup_old_sessions(logs_dir).await;

        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&latest)
            .await
            .ok()?;

        let (tx, rx) = mpsc::unbounded_channel::<String>();
        let writer = tokio::spawn(writer_task(file, rx));

        let _ = tx.send(format!("=== RoboScript session {} ===\n\n", timestamp()));

        Some((Self { tx: Some(tx), echo: false }, writer))
    }

    /// A logger that drops everything (no writable log directory).
    pub fn disabled() -> Self {
        Self { tx: None, echo: false }
    }

    /// Also print every line to stderr.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Send a log line. Never blocks.
    pub fn log(&self, prefix: &str, line: &str) {
        let formatted = format!("[{}] [{prefix}] {line}\n", timestamp());
        if self.echo {
            eprint!("{formatted}");
        }
        if let Some(ref tx) = self.tx {
            let _ = tx.send(formatted);
        }
    }

    pub fn warn(&self, prefix: &str, line: &str) {
        self.log(&format!("{prefix}-warn"), line);
    }

    pub fn error(&self, prefix: &str, line: &str) {
        self.log(&format!("{prefix}-err"), line);
    }
}

fn timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Background task that receives lines from the channel and writes to disk.
async fn writer_task(file: tokio::fs::File, mut rx: mpsc::UnboundedReceiver<String>) {
    use tokio::io::AsyncWriteExt;
    let mut writer = tokio::io::BufWriter::new(file);

    while let Some(line) = rx.recv().await {
        let _ = writer.write_all(line.as_bytes()).await;
        let _ = writer.flush().await;
    }

    let footer = format!("\n=== Session ended {} ===\n", timestamp());
    let _ = writer.write_all(footer.as_bytes()).await;
    let _ = writer.flush().await;
}

/// Keep only the most recent `session-*.log` files.
async fn cleanup_old_sessions(logs_dir: &Path) {
    let mut entries = match tokio::fs::read_dir(logs_dir).await {
        Ok(rd) => rd,
        Err(_) => return,
    };

    let mut session_files: Vec<PathBuf> = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        if name_str.starts_with("session-") && name_str.ends_with(".log") {
            session_files.push(entry.path());
        }
    }

    // Timestamp is embedded, so lexicographic = chronological
    session_files.sort();

    let excess = session_files.len().saturating_sub(MAX_SESSIONS);
    for oldest in session_files.iter().take(excess) {
        let _ = tokio::fs::remove_file(oldest).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lines_reach_latest_log() {
        let dir = tempfile::tempdir().unwrap();
        let (log, writer) = ActivityLog::open(dir.path()).await.unwrap();
        log.log("views", "increment failed for 42");
        log.warn("vote", "retry later");
        drop(log);
        writer.await.unwrap();

        let content = std::fs::read_to_string(dir.path().join("latest.log")).unwrap();
        assert!(content.starts_with("=== RoboScript session"));
        assert!(content.contains("[views] increment failed for 42"));
        assert!(content.contains("[vote-warn] retry later"));
        assert!(content.contains("=== Session ended"));
    }

    #[tokio::test]
    async fn test_previous_log_is_rotated_and_old_sessions_pruned() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..12 {
            std::fs::write(dir.path().join(format!("session-{i:04}.log")), "old").unwrap();
        }
        std::fs::write(dir.path().join("latest.log"), "previous").unwrap();

        let (log, writer) = ActivityLog::open(dir.path()).await.unwrap();
        drop(log);
        writer.await.unwrap();

        let sessions: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|n| n.starts_with("session-"))
            .collect();
        assert_eq!(sessions.len(), MAX_SESSIONS);
        assert!(!sessions.contains(&"session-0000.log".to_string()));
        let latest = std::fs::read_to_string(dir.path().join("latest.log")).unwrap();
        assert!(!latest.contains("previous"));
    }

    #[test]
    fn test_disabled_log_is_a_no_op() {
        let log = ActivityLog::disabled();
        log.error("views", "nobody listens");
    }
}
