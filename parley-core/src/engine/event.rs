//! Resolved events and the append-only event log

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;

use crate::error::{ParleyError, Result};

/// The resolved outcome of one step.
///
/// Field names are part of the JSON Lines output format and must stay stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Step at which the event was resolved (0-based)
    pub step: u64,

    /// Name of the acting participant
    pub actor: String,

    /// What the actor produced
    pub raw_action: String,

    /// Canonical account of what happened
    pub summary: String,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[step {}] {}: {}", self.step, self.actor, self.summary)
    }
}

/// Ordered, append-only record of a run.
///
/// Only the engine appends. Step indices are strictly increasing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, event: Event) -> &Event {
        debug_assert!(
            self.events.last().is_none_or(|last| last.step < event.step),
            "event steps must increase"
        );
        self.events.push(event);
        &self.events[self.events.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Event> {
        self.events.get(index)
    }

    pub fn last(&self) -> Option<&Event> {
        self.events.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// The last `n` events in order.
    pub fn tail(&self, n: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(n);
        &self.events[start..]
    }

    /// One JSON object per line, in order.
    pub fn to_jsonl(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.write_jsonl(&mut buf)?;
        String::from_utf8(buf).map_err(|e| ParleyError::Other(e.to_string()))
    }

    /// Write the log as JSON Lines.
    pub fn write_jsonl<W: Write>(&self, mut writer: W) -> Result<()> {
        for event in &self.events {
            serde_json::to_writer(&mut writer, event)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Read a log back from JSON Lines, skipping blank lines.
    ///
    /// # Errors
    ///
    /// Fails on malformed lines or if step indices do not strictly increase.
    pub fn from_jsonl(text: &str) -> Result<Self> {
        let mut log = Self::new();
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            let event: Event = serde_json::from_str(line)?;
            if let Some(last) = log.last() {
                if event.step <= last.step {
                    return Err(ParleyError::Other(format!(
                        "event log out of order: step {} after step {}",
                        event.step, last.step
                    )));
                }
            }
            log.events.push(event);
        }
        Ok(log)
    }
}

impl<'a> IntoIterator for &'a EventLog {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

impl fmt::Display for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, event) in self.events.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", event)?;
        }
        Ok(())
    }
}
