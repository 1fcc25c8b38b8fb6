//! In-process transport double driven by a script of connect outcomes.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::time::Instant;
use url::Url;

use crate::decode::RawFrame;
use crate::error::{StreamError, StreamResult};
use crate::transport::{BoxFuture, Connection, Transport};

enum Outcome {
    Accept(mpsc::UnboundedReceiver<StreamResult<RawFrame>>),
    Refuse,
}

#[derive(Default)]
struct Script {
    outcomes: VecDeque<Outcome>,
    connects: Vec<(Instant, Url)>,
}

/// Connects succeed or fail in scripted order; an exhausted script refuses.
#[derive(Clone, Default)]
pub(crate) struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

/// Server side of one scripted connection. Dropping it closes the connection.
pub(crate) struct ScriptedFrames {
    frames_tx: mpsc::UnboundedSender<StreamResult<RawFrame>>,
}

impl ScriptedFrames {
    pub(crate) fn send(&self, text: &str) {
        let _ = self.frames_tx.send(Ok(RawFrame::new(text)));
    }

    pub(crate) fn fail(&self, details: &str) {
        let _ = self.frames_tx.send(Err(StreamError::Refused {
            stage: "scripted-read",
            url: String::new(),
            details: details.to_string(),
        }));
    }
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn accept_next(&self) -> ScriptedFrames {
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        self.lock().outcomes.push_back(Outcome::Accept(frames_rx));
        ScriptedFrames { frames_tx }
    }

    pub(crate) fn refuse_next(&self) {
        self.lock().outcomes.push_back(Outcome::Refuse);
    }

    pub(crate) fn connect_count(&self) -> usize {
        self.lock().connects.len()
    }

    pub(crate) fn connected_urls(&self) -> Vec<String> {
        self.lock()
            .connects
            .iter()
            .map(|(_, url)| url.to_string())
            .collect()
    }

    /// Milliseconds between consecutive connect attempts.
    pub(crate) fn connect_gaps_ms(&self) -> Vec<u64> {
        let script = self.lock();
        script
            .connects
            .windows(2)
            .map(|pair| (pair[1].0 - pair[0].0).as_millis() as u64)
            .collect()
    }

    /// Milliseconds since the first connect attempt, per attempt.
    pub(crate) fn connect_offsets_ms(&self) -> Vec<u64> {
        let script = self.lock();
        let Some((first, _)) = script.connects.first() else {
            return Vec::new();
        };
        script
            .connects
            .iter()
            .map(|(at, _)| (*at - *first).as_millis() as u64)
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Transport for ScriptedTransport {
    fn connect<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, StreamResult<Box<dyn Connection>>> {
        Box::pin(async move {
            let outcome = {
                let mut script = self.lock();
                script.connects.push((Instant::now(), url.clone()));
                script.outcomes.pop_front().unwrap_or(Outcome::Refuse)
            };

            match outcome {
                Outcome::Accept(frames_rx) => {
                    Ok(Box::new(ScriptedConnection { frames_rx }) as Box<dyn Connection>)
                }
                Outcome::Refuse => Err(StreamError::Refused {
                    stage: "scripted-connect",
                    url: url.to_string(),
                    details: "connection refused".to_string(),
                }),
            }
        })
    }
}

struct ScriptedConnection {
    frames_rx: mpsc::UnboundedReceiver<StreamResult<RawFrame>>,
}

impl Connection for ScriptedConnection {
    fn next_frame(&mut self) -> BoxFuture<'_, Option<StreamResult<RawFrame>>> {
        Box::pin(async move { self.frames_rx.recv().await })
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move { self.frames_rx.close() })
    }
}
