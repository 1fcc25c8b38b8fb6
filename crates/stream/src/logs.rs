//! Log channel: envelope decoding and the ordered entry list.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::decode::{DecodeRule, RuleDecoder, Unmatched, display_text, is_truthy};
use crate::live::Accumulator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Info,
    Success,
    Error,
}

impl LogLevel {
    /// `"success"` is success, any other present status is an error.
    pub fn from_status(status: Option<&Value>) -> Self {
        match status {
            Some(Value::String(status)) if status == "success" => Self::Success,
            Some(status) if is_truthy(status) => Self::Error,
            _ => Self::Info,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.label())
    }
}

/// One decoded log frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub text: String,
    pub level: LogLevel,
}

impl LogLine {
    pub fn new(text: impl Into<String>, level: LogLevel) -> Self {
        Self {
            text: text.into(),
            level,
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(text, LogLevel::Info)
    }
}

pub type LogDecoder = RuleDecoder<LogLine>;

/// Decoder for the `/logs/{user}/{request}` channel.
pub fn log_decoder() -> LogDecoder {
    RuleDecoder::new(unmatched_line)
        .with_rule(DecodeRule {
            name: "status-envelope",
            matches: |object| object.contains_key("message"),
            map: status_envelope,
        })
        .with_rule(DecodeRule {
            name: "timed-message",
            matches: |object| {
                object.get("time").is_some_and(is_truthy) && object.get("msg").is_some_and(is_truthy)
            },
            map: timed_message,
        })
}

fn status_envelope(object: &Map<String, Value>) -> Vec<LogLine> {
    let text = object.get("message").map(display_text).unwrap_or_default();
    vec![LogLine::new(text, LogLevel::from_status(object.get("status")))]
}

fn timed_message(object: &Map<String, Value>) -> Vec<LogLine> {
    let time = object.get("time").map(display_text).unwrap_or_default();
    let msg = object.get("msg").map(display_text).unwrap_or_default();
    vec![LogLine::info(format!("[{time}] {msg}"))]
}

fn unmatched_line(unmatched: Unmatched<'_>) -> LogLine {
    match unmatched {
        Unmatched::Structured { value, .. } => LogLine::info(value.to_string()),
        Unmatched::Verbatim(raw) => LogLine::info(raw),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub sequence_id: u64,
    pub text: String,
    pub received_at: DateTime<Utc>,
    pub level: LogLevel,
}

/// Log entries in arrival order.
#[derive(Debug, Clone, Default)]
pub struct LogList {
    entries: Vec<LogEntry>,
    next_sequence_id: u64,
}

impl LogList {
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.last()
    }

    fn push_at(&mut self, line: &LogLine, received_at: DateTime<Utc>) {
        self.next_sequence_id = self.next_sequence_id.saturating_add(1);
        self.entries.push(LogEntry {
            sequence_id: self.next_sequence_id,
            text: line.text.clone(),
            received_at,
            level: line.level,
        });
    }
}

impl Accumulator for LogList {
    type Event = LogLine;

    fn apply(&mut self, event: &LogLine) {
        self.push_at(event, Utc::now());
    }

    // The sequence counter survives a clear; a fresh key gets a fresh list.
    fn clear(&mut self) {
        self.entries.clear();
    }
}
