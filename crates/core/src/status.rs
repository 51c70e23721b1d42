//! Heartbeat / status file.
//!
//! The file is truncated at the start of every invocation and receives one
//! line per significant step. Monitoring looks at its presence and mtime: an
//! absent or stale file means the watchdog is not running. Write failures are
//! logged and otherwise ignored; nothing here feeds back into decisions.

use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// How a status line is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusMode {
    /// Add a line after the existing content
    Append,
    /// Replace the file content with this line
    Replace,
}

#[derive(Debug)]
pub struct StatusSink {
    path: PathBuf,
    echo: bool,
}

impl StatusSink {
    /// `echo` mirrors every line to stdout (verbose mode).
    pub fn new(path: impl Into<PathBuf>, echo: bool) -> Self {
        Self {
            path: path.into(),
            echo,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Truncate the heartbeat file for a new invocation.
    pub fn reset(&self) {
        if let Err(e) = std::fs::write(&self.path, b"") {
            warn!(path = %self.path.display(), error = %e, "Failed to reset status file");
        }
    }

    pub fn status(&self, message: &str, mode: StatusMode) {
        let line = format!("{} {}\n", Local::now().format("%Y-%m-%d %H:%M:%S"), message);

        if self.echo {
            print!("{}", line);
        }

        let result = match mode {
            StatusMode::Replace => std::fs::write(&self.path, line.as_bytes()),
            StatusMode::Append => OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .and_then(|mut file| file.write_all(line.as_bytes())),
        };

        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "Failed to write status file");
        }
    }

    /// Shorthand for [`StatusMode::Append`].
    pub fn append(&self, message: &str) {
        self.status(message, StatusMode::Append);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("linkguard-status-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join("status")
    }

    #[test]
    fn test_reset_then_append() {
        let path = temp_path();
        std::fs::write(&path, "stale line from a previous run\n").unwrap();

        let sink = StatusSink::new(&path, false);
        sink.reset();
        sink.append("power: mains");
        sink.append("internet: up");

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("power: mains"));
        assert!(lines[1].ends_with("internet: up"));
        assert!(!contents.contains("stale"));
    }

    #[test]
    fn test_replace() {
        let path = temp_path();
        let sink = StatusSink::new(&path, false);
        sink.append("one");
        sink.append("two");
        sink.status("only", StatusMode::Replace);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.trim_end().ends_with("only"));
    }

    #[test]
    fn test_unwritable_path_is_ignored() {
        let sink = StatusSink::new("/nonexistent-dir/linkguard/status", false);
        sink.reset();
        sink.append("does not panic");
    }
}
