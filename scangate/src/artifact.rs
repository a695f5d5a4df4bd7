use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::info;

/// Destination for the raw payload of a finished scan.
pub trait ResultSink: Send + Sync {
    fn store(&self, payload: &Value) -> Result<()>;
    fn describe(&self) -> String;
}

/// Writes the payload as pretty-printed JSON, replacing any previous file.
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultSink for JsonFileSink {
    fn store(&self, payload: &Value) -> Result<()> {
        let file = File::create(&self.path)
            .with_context(|| format!("failed to create {}", self.path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, payload)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// The CI step output file (`GITHUB_OUTPUT`), appended with `key=value` lines.
pub struct CiOutput {
    path: Option<PathBuf>,
}

impl CiOutput {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// Returns `false` without touching the filesystem when no output file is configured.
    pub fn publish(&self, key: &str, value: &str) -> Result<bool> {
        let Some(path) = &self.path else {
            return Ok(false);
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open CI output file {}", path.display()))?;
        writeln!(file, "{key}={value}")
            .with_context(|| format!("failed to append to {}", path.display()))?;
        info!(key, output = %path.display(), "published CI output");
        Ok(true)
    }
}
