use std::future::Future;
use std::pin::Pin;

use futures::StreamExt;
use snafu::ResultExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::decode::RawFrame;
use crate::error::{ConnectSnafu, ReceiveSnafu, StreamResult};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Establishes push connections. One call yields one connection handle.
pub trait Transport: Send + Sync {
    fn connect<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, StreamResult<Box<dyn Connection>>>;
}

/// A live duplex connection delivering text frames.
pub trait Connection: Send {
    /// Next inbound frame; `None` once the remote side has closed.
    fn next_frame(&mut self) -> BoxFuture<'_, Option<StreamResult<RawFrame>>>;

    fn close(&mut self) -> BoxFuture<'_, ()>;
}

/// WebSocket transport backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

impl Transport for WebSocketTransport {
    fn connect<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, StreamResult<Box<dyn Connection>>> {
        Box::pin(async move {
            let (socket, response) = tokio_tungstenite::connect_async(url.as_str())
                .await
                .context(ConnectSnafu {
                    stage: "websocket-handshake",
                    url: url.to_string(),
                })?;
            tracing::debug!(url = %url, status = %response.status(), "websocket handshake completed");
            Ok(Box::new(WebSocketConnection { socket }) as Box<dyn Connection>)
        })
    }
}

struct WebSocketConnection {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Connection for WebSocketConnection {
    fn next_frame(&mut self) -> BoxFuture<'_, Option<StreamResult<RawFrame>>> {
        Box::pin(async move {
            loop {
                let message = match self.socket.next().await? {
                    Ok(message) => message,
                    Err(source) => {
                        return Some(Err(source).context(ReceiveSnafu {
                            stage: "websocket-read",
                        }));
                    }
                };

                match message {
                    Message::Text(text) => return Some(Ok(RawFrame::new(text.to_string()))),
                    Message::Binary(bytes) => {
                        return Some(Ok(RawFrame::new(
                            String::from_utf8_lossy(&bytes).into_owned(),
                        )));
                    }
                    Message::Close(frame) => {
                        tracing::debug!(close_frame = ?frame, "websocket closed by remote");
                        return None;
                    }
                    // Control frames are answered by tungstenite itself.
                    Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
                }
            }
        })
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if let Err(error) = self.socket.close(None).await {
                tracing::debug!(error = %error, "websocket close handshake failed");
            }
        })
    }
}
