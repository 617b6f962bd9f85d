//! File-backed sources: JSON-lines event logs and plain seed listings.

use std::fs;
use std::io::ErrorKind;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};

use super::{HarvestDriver, HarvestPage};
use crate::event::{EventType, RawEvent};
use crate::log;

/// Reads `RawEvent`s from a JSON-lines file, one event per line.
///
/// The resumption token is the number of lines consumed. The source
/// remembers where the last committed page ended, so lines appended later
/// are picked up by the next cycle and a page that was fetched but never
/// committed is offered again. A trailing line without a newline is treated
/// as still being written and left for the next cycle.
#[derive(Debug, Clone)]
pub struct JsonLinesSource {
    path: PathBuf,
    page_size: NonZeroUsize,
    offset: usize,
    /// End of the last fetched page, applied on commit.
    pending: usize,
}

impl JsonLinesSource {
    pub fn new(path: impl Into<PathBuf>, page_size: NonZeroUsize) -> Self {
        Self {
            path: path.into(),
            page_size,
            offset: 0,
            pending: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines committed so far.
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn read(&self) -> Result<String> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", self.path.display())),
        }
    }
}

impl HarvestDriver for JsonLinesSource {
    fn fetch(
        &mut self,
        _from: Option<DateTime<Utc>>,
        resumption: Option<&str>,
    ) -> Result<HarvestPage> {
        let start = match resumption {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| anyhow!("Invalid resumption token `{token}`"))?,
            None => self.offset,
        };

        let content = self.read()?;
        let complete = content
            .split_inclusive('\n')
            .filter(|line| line.ends_with('\n'));

        let mut events = Vec::new();
        let mut consumed = 0;
        for (i, line) in complete.skip(start).take(self.page_size.get()).enumerate() {
            consumed += 1;
            events.extend(parse_line(&self.path, start + i + 1, line));
        }

        self.pending = start + consumed;
        let resumption = (consumed == self.page_size.get()).then(|| self.pending.to_string());
        Ok(HarvestPage { events, resumption })
    }

    fn commit(&mut self) {
        self.offset = self.pending;
    }
}

fn parse_line(path: &Path, lineno: usize, line: &str) -> Option<RawEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    serde_json::from_str(line)
        .map_err(|e| log!("warning"; "{}:{}: skipped malformed event: {}", path.display(), lineno, e))
        .ok()
}

/// Read every event of a finished JSON-lines file.
pub fn read_events(path: &Path) -> Result<Vec<RawEvent>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read events {}", path.display()))?;
    Ok(content
        .lines()
        .enumerate()
        .filter_map(|(i, line)| parse_line(path, i + 1, line))
        .collect())
}

/// Read a seed listing: one resource id per line, `#` starts a comment.
///
/// Every id becomes a `create` stamped with the file's modification time.
pub fn read_listing(path: &Path) -> Result<Vec<RawEvent>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read listing {}", path.display()))?;
    let stamp: DateTime<Utc> = fs::metadata(path)
        .and_then(|m| m.modified())
        .map(DateTime::from)
        .unwrap_or_else(|_| Utc::now());

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|id| RawEvent::new(id, EventType::Create.as_str(), stamp))
        .collect())
}
