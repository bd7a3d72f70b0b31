//! Append-only JSON-lines event log.
//!
//! Each published [`Event`] becomes one line of JSON, so a session can be
//! inspected with ordinary text tools or replayed with [`EventLog::read_all`].

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::bus::Event;
use crate::api::{Result, RuntimeError};

pub struct EventLog {
    path: PathBuf,
    writer: BufWriter<File>,
    written: u64,
}

impl EventLog {
    /// Opens `path` for appending, creating parent directories as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let io_error = |source| RuntimeError::EventLog {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_error)?;

        Ok(Self {
            writer: BufWriter::new(file),
            path,
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines appended through this handle.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn append(&mut self, event: &Event) -> Result<()> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer
            .write_all(b"\n")
            .map_err(|source| RuntimeError::EventLog {
                path: self.path.clone(),
                source,
            })?;
        self.written += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(|source| RuntimeError::EventLog {
            path: self.path.clone(),
            source,
        })
    }

    /// Reads every event of a log file. Blank lines are skipped.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<Event>> {
        let path = path.as_ref();
        let io_error = |source| RuntimeError::EventLog {
            path: path.to_path_buf(),
            source,
        };
        let reader = BufReader::new(File::open(path).map_err(io_error)?);

        let mut events = Vec::new();
        for line in reader.lines() {
            let line = line.map_err(io_error)?;
            if line.trim().is_empty() {
                continue;
            }
            events.push(serde_json::from_str(&line)?);
        }
        Ok(events)
    }
}

impl Drop for EventLog {
    fn drop(&mut self) {
        if let Err(err) = self.writer.flush() {
            tracing::warn!(path = %self.path.display(), %err, "event log flush failed");
        }
    }
}
