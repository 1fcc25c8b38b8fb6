use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use url::Url;

use crate::backoff::BackoffPolicy;
use crate::decode::FrameDecoder;
use crate::endpoint::Endpoint;
use crate::key::{StreamGeneration, SubscriptionKey};
use crate::state::ConnectionState;
use crate::transport::{Connection, Transport};

/// How long `close` waits for a worker to shut its transport down before aborting it.
pub const CLOSE_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub auto_reconnect: bool,
    pub backoff: BackoffPolicy,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl SessionOptions {
    pub fn with_auto_reconnect(mut self, auto_reconnect: bool) -> Self {
        self.auto_reconnect = auto_reconnect;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }
}

/// What a session hands to its consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate<E> {
    State(ConnectionState),
    Event(E),
}

#[derive(Debug)]
struct Envelope<E> {
    generation: StreamGeneration,
    update: SessionUpdate<E>,
}

struct SessionWorker {
    generation: StreamGeneration,
    cancel_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

/// Lifecycle owner of one logical streaming subscription.
///
/// The transport is driven by a Tokio worker task per generation. Everything the
/// worker observes travels through one update channel tagged with the worker's
/// generation; [`StreamSession::next_update`] drops whatever a superseded worker
/// left behind. Lifecycle calls take `&mut self`, so the consumer loop is the
/// single timeline on which state changes are applied.
pub struct StreamSession<D: FrameDecoder> {
    endpoint: Endpoint,
    options: SessionOptions,
    transport: Arc<dyn Transport>,
    decoder: Arc<D>,
    key: Option<SubscriptionKey>,
    state: ConnectionState,
    generation: StreamGeneration,
    worker: Option<SessionWorker>,
    updates_tx: mpsc::UnboundedSender<Envelope<D::Event>>,
    updates_rx: mpsc::UnboundedReceiver<Envelope<D::Event>>,
}

impl<D: FrameDecoder> StreamSession<D> {
    pub fn new(
        endpoint: Endpoint,
        options: SessionOptions,
        transport: Arc<dyn Transport>,
        decoder: D,
    ) -> Self {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        Self {
            endpoint,
            options,
            transport,
            decoder: Arc::new(decoder),
            key: None,
            state: ConnectionState::Idle,
            generation: StreamGeneration::default(),
            worker: None,
            updates_tx,
            updates_rx,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn key(&self) -> Option<&SubscriptionKey> {
        self.key.as_ref()
    }

    pub fn generation(&self) -> StreamGeneration {
        self.generation
    }

    /// Whether a worker is still attached (connecting, open or backing off).
    pub fn is_active(&self) -> bool {
        self.worker.is_some()
    }

    /// Starts streaming for `key`, replacing any previous connection.
    ///
    /// Keys that cannot address the endpoint are remembered but leave the
    /// session idle.
    pub async fn open(&mut self, key: SubscriptionKey) {
        self.close().await;

        let Some(key) = key.into_valid() else {
            return;
        };
        let Some(url) = self.endpoint.url_for(&key) else {
            tracing::debug!(key = %key, route = ?self.endpoint.route(), "key does not address this route");
            self.key = Some(key);
            return;
        };

        self.generation = self.generation.next();
        let generation = self.generation;
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let worker = WorkerContext {
            generation,
            url,
            options: self.options,
            transport: self.transport.clone(),
            decoder: self.decoder.clone(),
            updates_tx: self.updates_tx.clone(),
        };

        tracing::info!(key = %key, generation = %generation, "opening stream session");
        let task = tokio::spawn(worker.run(cancel_rx));
        self.worker = Some(SessionWorker {
            generation,
            cancel_tx: Some(cancel_tx),
            task,
        });
        self.key = Some(key);
        self.state = ConnectionState::Connecting;
    }

    /// Tears down the connection and any pending reconnect. Idempotent.
    pub async fn close(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            if let Some(cancel_tx) = worker.cancel_tx.take() {
                let _ = cancel_tx.send(());
            }
            match tokio::time::timeout(CLOSE_GRACE, &mut worker.task).await {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    tracing::warn!(generation = %worker.generation, error = %error, "stream worker ended abnormally");
                }
                Err(_) => {
                    tracing::warn!(generation = %worker.generation, "stream worker ignored cancellation; aborting");
                    worker.task.abort();
                }
            }
        }

        if self.key.take().is_some() {
            tracing::info!(generation = %self.generation, "stream session closed");
        }
        // Anything still queued belongs to the generation being retired.
        self.generation = self.generation.next();
        self.state = ConnectionState::Idle;
    }

    /// Applies a possibly-changed key.
    ///
    /// Returns `false` without touching the connection when the key is unchanged.
    pub async fn reconfigure(&mut self, key: Option<SubscriptionKey>) -> bool {
        let key = key.and_then(SubscriptionKey::into_valid);
        if key == self.key {
            return false;
        }

        self.close().await;
        if let Some(key) = key {
            self.open(key).await;
        }
        true
    }

    /// Next update of the current generation.
    ///
    /// Returns `None` when the session is idle or its worker has stopped for good
    /// (a close with auto-reconnect disabled).
    pub async fn next_update(&mut self) -> Option<SessionUpdate<D::Event>> {
        loop {
            let worker_generation = self.worker.as_ref()?.generation;
            let envelope = self.updates_rx.recv().await?;
            if envelope.generation != worker_generation {
                tracing::trace!(
                    stale = %envelope.generation,
                    current = %worker_generation,
                    "dropping update from superseded stream"
                );
                continue;
            }

            if let SessionUpdate::State(state) = envelope.update {
                self.state = state;
                if state == ConnectionState::Closed && !self.options.auto_reconnect {
                    // The worker returns right after reporting this close.
                    self.worker = None;
                }
            }
            return Some(envelope.update);
        }
    }
}

impl<D: FrameDecoder> Drop for StreamSession<D> {
    fn drop(&mut self) {
        if let Some(mut worker) = self.worker.take()
            && let Some(cancel_tx) = worker.cancel_tx.take()
        {
            let _ = cancel_tx.send(());
        }
    }
}

struct WorkerContext<D: FrameDecoder> {
    generation: StreamGeneration,
    url: Url,
    options: SessionOptions,
    transport: Arc<dyn Transport>,
    decoder: Arc<D>,
    updates_tx: mpsc::UnboundedSender<Envelope<D::Event>>,
}

enum ConnectionEnd {
    Cancelled,
    Dropped,
}

impl<D: FrameDecoder> WorkerContext<D> {
    fn emit(&self, update: SessionUpdate<D::Event>) -> bool {
        self.updates_tx
            .send(Envelope {
                generation: self.generation,
                update,
            })
            .is_ok()
    }

    fn emit_state(&self, state: ConnectionState) -> bool {
        tracing::debug!(url = %self.url, generation = %self.generation, state = %state, "stream state changed");
        self.emit(SessionUpdate::State(state))
    }

    async fn run(self, mut cancel_rx: oneshot::Receiver<()>) {
        let mut backoff = self.options.backoff.reset();

        loop {
            if !self.emit_state(ConnectionState::Connecting) {
                return;
            }

            let connected = tokio::select! {
                _ = &mut cancel_rx => return,
                connected = self.transport.connect(&self.url) => connected,
            };

            match connected {
                Ok(mut connection) => {
                    backoff = backoff.reset();
                    if !self.emit_state(ConnectionState::Open) {
                        connection.close().await;
                        return;
                    }
                    match self.pump(connection.as_mut(), &mut cancel_rx).await {
                        ConnectionEnd::Cancelled => {
                            connection.close().await;
                            return;
                        }
                        ConnectionEnd::Dropped => connection.close().await,
                    }
                }
                Err(error) => {
                    tracing::warn!(url = %self.url, error = %error, "stream connection failed");
                }
            }

            if !self.emit_state(ConnectionState::Closed) || !self.options.auto_reconnect {
                return;
            }

            let (delay, next) = backoff.advance();
            backoff = next;
            tracing::info!(
                url = %self.url,
                attempt = backoff.attempt,
                delay_ms = delay.as_millis() as u64,
                "scheduling stream reconnect"
            );
            if !self.emit_state(ConnectionState::Reconnecting) {
                return;
            }

            tokio::select! {
                _ = &mut cancel_rx => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn pump(
        &self,
        connection: &mut dyn Connection,
        cancel_rx: &mut oneshot::Receiver<()>,
    ) -> ConnectionEnd {
        loop {
            tokio::select! {
                _ = &mut *cancel_rx => {
                    tracing::debug!(url = %self.url, "stream cancelled");
                    return ConnectionEnd::Cancelled;
                }
                next_frame = connection.next_frame() => {
                    match next_frame {
                        Some(Ok(frame)) => {
                            for event in self.decoder.decode(&frame) {
                                if !self.emit(SessionUpdate::Event(event)) {
                                    return ConnectionEnd::Cancelled;
                                }
                            }
                        }
                        Some(Err(error)) => {
                            // Errors close the connection and take the regular close path.
                            tracing::warn!(url = %self.url, error = %error, "stream connection errored");
                            return ConnectionEnd::Dropped;
                        }
                        None => {
                            tracing::info!(url = %self.url, "stream closed by remote");
                            return ConnectionEnd::Dropped;
                        }
                    }
                }
            }
        }
    }
}
