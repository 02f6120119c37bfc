use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};

use crate::logger;

/// Append-only record of primary button presses.
pub struct ButtonLog {
    path: PathBuf,
}

impl ButtonLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entry(at: DateTime<Local>) -> String {
        format!("{} - Button pressed\n", at.format(logger::TIMESTAMP_FORMAT))
    }

    pub fn append(&self, at: DateTime<Local>) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open {}", self.path.display()))?;
        file.write_all(Self::entry(at).as_bytes())
            .with_context(|| format!("write {}", self.path.display()))?;
        Ok(())
    }

    /// Append an entry stamped now. Failures are logged, never returned.
    pub fn record(&self) {
        let now = Local::now();
        match self.append(now) {
            Ok(()) => logger::info(&format!(
                "button press logged at {}",
                now.format(logger::TIMESTAMP_FORMAT)
            )),
            Err(e) => logger::error(&format!("failed to log button press: {:#}", e)),
        }
    }
}
