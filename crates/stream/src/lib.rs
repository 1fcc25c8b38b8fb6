//! Keyed, self-healing push subscriptions.
//!
//! A [`StreamSession`] owns one logical subscription addressed by a
//! [`SubscriptionKey`]; a [`LiveChannel`] folds its decoded events into content.

pub mod backoff;
pub mod content;
pub mod decode;
pub mod endpoint;
pub mod error;
pub mod key;
pub mod live;
pub mod logs;
pub mod session;
pub mod state;
pub mod transport;

#[cfg(test)]
mod testing;

pub use backoff::BackoffPolicy;
pub use content::{ContentBuffers, ContentDecoder, ContentEvent, content_decoder};
pub use decode::{FrameDecoder, RawFrame};
pub use endpoint::{Endpoint, Route};
pub use error::{StreamError, StreamResult};
pub use key::{StreamGeneration, SubscriptionKey};
pub use live::{Accumulator, LiveChannel};
pub use logs::{LogDecoder, LogEntry, LogLevel, LogLine, LogList, log_decoder};
pub use session::{SessionOptions, SessionUpdate, StreamSession};
pub use state::ConnectionState;
pub use transport::{BoxFuture, Connection, Transport, WebSocketTransport};

/// Live story/script channel over the `/data` route.
pub type StoryChannel = LiveChannel<ContentDecoder, ContentBuffers>;

/// Live status-log channel over the `/logs` route.
pub type LogChannel = LiveChannel<LogDecoder, LogList>;
