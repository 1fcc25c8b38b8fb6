use crate::decode::FrameDecoder;
use crate::key::SubscriptionKey;
use crate::session::{SessionUpdate, StreamSession};
use crate::state::ConnectionState;

/// Folds decoded events into the content a channel displays.
pub trait Accumulator: Default + Send + 'static {
    type Event;

    fn apply(&mut self, event: &Self::Event);

    /// User-requested clear. Implementations may keep bookkeeping such as counters.
    fn clear(&mut self);

    /// Fresh state for a new subscription key.
    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// A stream session together with the content accumulated from it.
///
/// Changing the key drops everything accumulated for the previous key before
/// the new connection is opened.
pub struct LiveChannel<D, A>
where
    D: FrameDecoder,
    A: Accumulator<Event = D::Event>,
{
    session: StreamSession<D>,
    content: A,
}

impl<D, A> LiveChannel<D, A>
where
    D: FrameDecoder,
    A: Accumulator<Event = D::Event>,
{
    pub fn new(session: StreamSession<D>) -> Self {
        Self {
            session,
            content: A::default(),
        }
    }

    pub fn content(&self) -> &A {
        &self.content
    }

    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    pub fn key(&self) -> Option<&SubscriptionKey> {
        self.session.key()
    }

    pub fn session(&self) -> &StreamSession<D> {
        &self.session
    }

    /// Switches to `key`. Returns `false` when the key is unchanged.
    pub async fn reconfigure(&mut self, key: Option<SubscriptionKey>) -> bool {
        let key = key.and_then(SubscriptionKey::into_valid);
        if key.as_ref() == self.session.key() {
            return false;
        }

        self.session.close().await;
        self.content.reset();
        if let Some(key) = key {
            self.session.open(key).await;
        }
        true
    }

    /// Next update of the current subscription, applied to the content first.
    pub async fn next_update(&mut self) -> Option<SessionUpdate<D::Event>> {
        let update = self.session.next_update().await?;
        if let SessionUpdate::Event(event) = &update {
            self.content.apply(event);
        }
        Some(update)
    }

    pub fn clear(&mut self) {
        self.content.clear();
    }

    pub async fn close(&mut self) {
        self.session.close().await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::content::{ContentBuffers, ContentDecoder, content_decoder};
    use crate::endpoint::{Endpoint, Route};
    use crate::logs::{LogDecoder, LogList, log_decoder};
    use crate::session::SessionOptions;
    use crate::testing::ScriptedTransport;

    fn story_channel(transport: &ScriptedTransport) -> LiveChannel<ContentDecoder, ContentBuffers> {
        let endpoint = Endpoint::parse("ws://stream.test", Route::Data).unwrap();
        LiveChannel::new(StreamSession::new(
            endpoint,
            SessionOptions::default(),
            Arc::new(transport.clone()),
            content_decoder(),
        ))
    }

    async fn drain_events<D, A>(channel: &mut LiveChannel<D, A>, count: usize)
    where
        D: FrameDecoder,
        A: Accumulator<Event = D::Event>,
    {
        let mut seen = 0;
        while seen < count {
            let update = tokio::time::timeout(Duration::from_secs(1), channel.next_update())
                .await
                .ok()
                .flatten();
            match update {
                Some(SessionUpdate::Event(_)) => seen += 1,
                Some(SessionUpdate::State(_)) => {}
                None => break,
            }
        }
    }

    #[tokio::test]
    async fn changing_subject_discards_previous_content() {
        let transport = ScriptedTransport::new();
        let first = transport.accept_next();
        let second = transport.accept_next();
        let mut channel = story_channel(&transport);

        assert!(channel.reconfigure(Some(SubscriptionKey::new("A"))).await);
        first.send(r#"{"story":"Once upon a time"}"#);
        drain_events(&mut channel, 1).await;
        assert_eq!(channel.content().story(), "Once upon a time");

        assert!(channel.reconfigure(Some(SubscriptionKey::new("B"))).await);
        assert!(channel.content().is_empty());

        first.send(r#"{"story":"late A"}"#);
        second.send(r#"{"story":"from B"}"#);
        drain_events(&mut channel, 1).await;
        assert_eq!(channel.content().story(), "from B");
        assert_eq!(
            transport.connected_urls(),
            vec![
                "ws://stream.test/data/A".to_string(),
                "ws://stream.test/data/B".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn same_subject_keeps_accumulated_content() {
        let transport = ScriptedTransport::new();
        let frames = transport.accept_next();
        let mut channel = story_channel(&transport);

        channel.reconfigure(Some(SubscriptionKey::new("A"))).await;
        frames.send(r#"{"story":"kept"}"#);
        drain_events(&mut channel, 1).await;

        assert!(!channel.reconfigure(Some(SubscriptionKey::new("A"))).await);
        assert_eq!(channel.content().story(), "kept");
        assert_eq!(transport.connect_count(), 1);
    }

    #[tokio::test]
    async fn log_clear_keeps_counter_but_new_key_restarts_it() {
        let transport = ScriptedTransport::new();
        let first = transport.accept_next();
        let second = transport.accept_next();
        let endpoint = Endpoint::parse("ws://stream.test", Route::Logs).unwrap();
        let mut channel: LiveChannel<LogDecoder, LogList> = LiveChannel::new(StreamSession::new(
            endpoint,
            SessionOptions::default().with_auto_reconnect(false),
            Arc::new(transport.clone()),
            log_decoder(),
        ));

        channel
            .reconfigure(Some(SubscriptionKey::new("7").with_secondary("100")))
            .await;
        first.send(r#"{"message":"render started","status":"success"}"#);
        first.send(r#"{"time":"12:00:00","msg":"queued"}"#);
        drain_events(&mut channel, 2).await;
        assert_eq!(channel.content().len(), 2);

        channel.clear();
        first.send("tail");
        drain_events(&mut channel, 1).await;
        assert_eq!(channel.content().last().map(|entry| entry.sequence_id), Some(3));

        channel
            .reconfigure(Some(SubscriptionKey::new("7").with_secondary("101")))
            .await;
        second.send("fresh");
        drain_events(&mut channel, 1).await;
        assert_eq!(channel.content().len(), 1);
        assert_eq!(channel.content().last().map(|entry| entry.sequence_id), Some(1));
    }
}
