use super::{Message, NotificationSink};
use crate::errors::NotifyError;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Appends each message as one JSON line; an external mailer drains the file.
#[derive(Debug)]
pub struct SpoolSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SpoolSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl NotificationSink for SpoolSink {
    fn send_all(&self, messages: Vec<Message>) -> Result<(), NotifyError> {
        let count = messages.len();
        let send_err = |reason: String| NotifyError::Send { count, reason };

        let mut buf = String::new();
        for m in &messages {
            buf.push_str(&serde_json::to_string(m).map_err(|e| send_err(e.to_string()))?);
            buf.push('\n');
        }

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| send_err("spool lock poisoned".into()))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| send_err(format!("{}: {e}", self.path.display())))?;
        file.write_all(buf.as_bytes())
            .map_err(|e| send_err(format!("{}: {e}", self.path.display())))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let sink = SpoolSink::new(dir.path().join("mail.jsonl"));
        let msg = |s: &str| sink.compose(&["a@example.com".to_string()], s, "<p>x</p>").unwrap();

        sink.send_all(vec![msg("one")]).unwrap();
        sink.send_all(vec![msg("two"), msg("three")]).unwrap();

        let raw = std::fs::read_to_string(sink.path()).unwrap();
        let back: Vec<Message> = raw.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        let subjects: Vec<&str> = back.iter().map(|m| m.subject.as_str()).collect();
        assert_eq!(subjects, vec!["one", "two", "three"]);
    }
}
