use std::fmt;

use serde_json::{Map, Value};

/// Text payload exactly as received from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame(String);

impl RawFrame {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RawFrame {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RawFrame {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Maps one raw frame to the channel's events. Must never fail.
pub trait FrameDecoder: Send + Sync + 'static {
    type Event: Clone + fmt::Debug + Send + 'static;

    fn decode(&self, frame: &RawFrame) -> Vec<Self::Event>;
}

/// One shape-matching rule over a structured (JSON object) frame.
pub struct DecodeRule<E> {
    pub name: &'static str,
    pub matches: fn(&Map<String, Value>) -> bool,
    pub map: fn(&Map<String, Value>) -> Vec<E>,
}

/// What the fallback rule receives when no structured rule matched.
#[derive(Debug, Clone, Copy)]
pub enum Unmatched<'a> {
    /// Valid JSON that no rule recognised.
    Structured { value: &'a Value, raw: &'a str },
    /// Not JSON at all.
    Verbatim(&'a str),
}

impl<'a> Unmatched<'a> {
    pub fn raw(&self) -> &'a str {
        match self {
            Self::Structured { raw, .. } => raw,
            Self::Verbatim(raw) => raw,
        }
    }
}

/// Ordered rule list evaluated top-down, terminated by a fallback that always
/// yields an event.
pub struct RuleDecoder<E> {
    rules: Vec<DecodeRule<E>>,
    fallback: fn(Unmatched<'_>) -> E,
}

impl<E> RuleDecoder<E> {
    pub fn new(fallback: fn(Unmatched<'_>) -> E) -> Self {
        Self {
            rules: Vec::new(),
            fallback,
        }
    }

    pub fn with_rule(mut self, rule: DecodeRule<E>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name).collect()
    }
}

impl<E> FrameDecoder for RuleDecoder<E>
where
    E: Clone + fmt::Debug + Send + Sync + 'static,
{
    type Event = E;

    fn decode(&self, frame: &RawFrame) -> Vec<E> {
        let raw = frame.as_str();
        let Ok(value) = serde_json::from_str::<Value>(raw) else {
            return vec![(self.fallback)(Unmatched::Verbatim(raw))];
        };

        if let Value::Object(object) = &value
            && let Some(rule) = self.rules.iter().find(|rule| (rule.matches)(object))
        {
            tracing::trace!(rule = rule.name, "frame matched decode rule");
            return (rule.map)(object);
        }

        vec![(self.fallback)(Unmatched::Structured { value: &value, raw })]
    }
}

/// Truthiness as the upstream service's producers use it for optional fields:
/// `null`, `false`, `0`, and `""` count as absent.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Renders a field as display text: strings verbatim, anything else as compact JSON.
pub fn display_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Like [`display_text`], but absent-ish values collapse to an empty string.
pub fn text_or_empty(value: &Value) -> String {
    if is_truthy(value) {
        display_text(value)
    } else {
        String::new()
    }
}
