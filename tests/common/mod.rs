#![allow(dead_code)]

use anyhow::Result;
use claude_tokens::config::{Config, PathsConfig};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// An isolated Claude home with the engine's files rooted inside it
pub struct TestHome {
    pub dir: TempDir,
}

impl TestHome {
    pub fn new() -> Result<Self> {
        let dir = TempDir::new()?;
        fs::create_dir_all(dir.path().join("projects"))?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.paths = PathsConfig::rooted_at(self.dir.path().to_path_buf());
        config.hook.enabled = false;
        config
    }

    pub fn limits_file(&self) -> PathBuf {
        self.path().join("token_limits.json")
    }

    pub fn status_file(&self) -> PathBuf {
        self.path().join("token_status.json")
    }

    pub fn write_usage(&self, session_total: u64, window_total: u64) -> Result<()> {
        let doc = serde_json::json!({
            "updated_ts": "2025-06-01T09:59:00Z",
            "session": {"input": 10, "output": 20, "total": session_total},
            "window": {"total": window_total},
            "window_start": null,
            "estimated_limit": null,
            "limit_event_count": 0,
            "collector_version": "1.2.0"
        });
        fs::write(self.status_file(), serde_json::to_string_pretty(&doc)?)?;
        Ok(())
    }

    pub fn write_history(&self, events: serde_json::Value) -> Result<()> {
        let doc = serde_json::json!({ "events": events });
        fs::write(self.limits_file(), doc.to_string())?;
        Ok(())
    }

    pub fn read_json(&self, path: &Path) -> Result<serde_json::Value> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }

    /// Path of a transcript inside a project directory, created empty
    pub fn transcript(&self, project: &str, name: &str) -> Result<PathBuf> {
        let dir = self.path().join("projects").join(project);
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.jsonl", name));
        fs::write(&path, "")?;
        Ok(path)
    }
}

pub fn append_lines(path: &Path, lines: &[String]) -> Result<()> {
    let mut file = OpenOptions::new().append(true).create(true).open(path)?;
    for line in lines {
        writeln!(file, "{}", line)?;
    }
    Ok(())
}

pub fn rate_limit_line(timestamp: &str, text: &str) -> String {
    serde_json::json!({
        "type": "assistant",
        "timestamp": timestamp,
        "isApiErrorMessage": true,
        "error": "rate_limit",
        "message": {"role": "assistant", "content": [{"type": "text", "text": text}]}
    })
    .to_string()
}

pub fn assistant_line(timestamp: &str) -> String {
    serde_json::json!({
        "type": "assistant",
        "timestamp": timestamp,
        "message": {"role": "assistant", "content": [{"type": "text", "text": "Here you go."}]}
    })
    .to_string()
}

pub fn user_line(timestamp: &str) -> String {
    serde_json::json!({
        "type": "user",
        "timestamp": timestamp,
        "message": {"role": "user", "content": "keep going"}
    })
    .to_string()
}
