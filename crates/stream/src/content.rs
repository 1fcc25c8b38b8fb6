//! Story/script channel: decoding rules and the two accumulating text buffers.

use serde_json::{Map, Value};

use crate::decode::{DecodeRule, RuleDecoder, Unmatched, display_text, text_or_empty};
use crate::live::Accumulator;

pub const FRAGMENT_SEPARATOR: &str = "\n\n";

/// Incremental generated content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentEvent {
    StoryFragment(String),
    ScriptFragment(String),
}

pub type ContentDecoder = RuleDecoder<ContentEvent>;

/// Decoder for the `/data/{user}` channel.
///
/// A frame carrying both `story` and `script` yields both fragments, story first.
pub fn content_decoder() -> ContentDecoder {
    RuleDecoder::new(verbatim_story)
        .with_rule(DecodeRule {
            name: "story-script",
            matches: |object| object.contains_key("story") || object.contains_key("script"),
            map: story_and_script,
        })
        .with_rule(DecodeRule {
            name: "status-message",
            matches: |object| object.contains_key("message"),
            map: |object| {
                let message = object.get("message").map(display_text).unwrap_or_default();
                vec![ContentEvent::StoryFragment(message)]
            },
        })
}

fn story_and_script(object: &Map<String, Value>) -> Vec<ContentEvent> {
    let mut events = Vec::with_capacity(2);
    if let Some(story) = object.get("story") {
        events.push(ContentEvent::StoryFragment(text_or_empty(story)));
    }
    if let Some(script) = object.get("script") {
        events.push(ContentEvent::ScriptFragment(text_or_empty(script)));
    }
    events
}

fn verbatim_story(unmatched: Unmatched<'_>) -> ContentEvent {
    ContentEvent::StoryFragment(unmatched.raw().to_string())
}

/// Story and script text accumulated since the subject was last set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentBuffers {
    story: String,
    script: String,
}

impl ContentBuffers {
    pub fn story(&self) -> &str {
        &self.story
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn is_empty(&self) -> bool {
        self.story.is_empty() && self.script.is_empty()
    }
}

impl Accumulator for ContentBuffers {
    type Event = ContentEvent;

    fn apply(&mut self, event: &ContentEvent) {
        match event {
            ContentEvent::StoryFragment(text) => append_fragment(&mut self.story, text),
            ContentEvent::ScriptFragment(text) => append_fragment(&mut self.script, text),
        }
    }

    fn clear(&mut self) {
        self.story.clear();
        self.script.clear();
    }
}

fn append_fragment(buffer: &mut String, fragment: &str) {
    if !buffer.is_empty() {
        buffer.push_str(FRAGMENT_SEPARATOR);
    }
    buffer.push_str(fragment);
}
