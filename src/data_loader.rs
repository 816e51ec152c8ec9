//! JSONL event log
//!
//! The CLI keeps stored events in a JSON-lines file, one [`UsageEvent`] per
//! line. Lines that fail to parse are logged and skipped so one corrupt
//! line never hides the rest of the log.
//!
//! # Example
//!
//! ```no_run
//! use usagemeter::data_loader::EventLog;
//! use usagemeter::store::InMemoryUsageStore;
//!
//! # async fn example() -> usagemeter::Result<()> {
//! let log = EventLog::new("usage.jsonl");
//! let store = InMemoryUsageStore::from_stream(log.load_events()).await?;
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use crate::types::{UsageEvent, UsageEventInput};
use futures::stream::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

/// A JSON-lines file of stored usage events
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stream every event in the log. A missing file is an empty log.
    pub fn load_events(&self) -> impl Stream<Item = Result<UsageEvent>> + '_ {
        async_stream::stream! {
            let file = match tokio::fs::File::open(&self.path).await {
                Ok(f) => f,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!("Event log {} does not exist yet", self.path.display());
                    return;
                }
                Err(e) => {
                    yield Err(e.into());
                    return;
                }
            };

            let source = self.path.display().to_string();
            let events = parse_lines::<UsageEvent, _>(BufReader::new(file), source);
            tokio::pin!(events);
            while let Some(event) = events.next().await {
                yield event;
            }
        }
    }

    /// Append events to the log, creating it if needed
    pub async fn append_events(&self, events: &[UsageEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let mut buffer = Vec::new();
        for event in events {
            serde_json::to_writer(&mut buffer, event)?;
            buffer.push(b'\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&buffer).await?;
        file.flush().await?;
        debug!("Appended {} events to {}", events.len(), self.path.display());
        Ok(())
    }
}

/// Stream recorder inputs, one JSON object per line, from any reader
pub fn read_inputs<R>(reader: R) -> impl Stream<Item = Result<UsageEventInput>>
where
    R: AsyncBufRead + Unpin,
{
    parse_lines(reader, "input".to_string())
}

fn parse_lines<T, R>(reader: R, source: String) -> impl Stream<Item = Result<T>>
where
    T: DeserializeOwned,
    R: AsyncBufRead + Unpin,
{
    async_stream::stream! {
        let mut lines = reader.lines();
        let mut line_number = 0;

        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    yield Err(e.into());
                    break;
                }
            };
            line_number += 1;

            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<T>(&line) {
                Ok(value) => yield Ok(value),
                Err(e) => {
                    warn!("Failed to parse line {} in {}: {}", line_number, source, e);
                }
            }
        }
    }
}
