// Transport seam: how a Feed Connection obtains a socket.

use std::borrow::Cow;
use std::pin::Pin;

use futures::{Sink, Stream, StreamExt};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::debug;

pub type FrameSink = Pin<Box<dyn Sink<Message, Error = WsError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Message, WsError>> + Send>>;

/// Opens one socket to an endpoint. A single attempt, no retries.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &str) -> Result<(FrameSink, FrameStream), WsError>;
}

/// Real websocket transport.
#[derive(Debug, Default, Clone, Copy)]
pub struct TungsteniteConnector;

#[async_trait::async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, endpoint: &str) -> Result<(FrameSink, FrameStream), WsError> {
        let url = websocket_url(endpoint).into_owned();
        let (ws_stream, response) = tokio_tungstenite::connect_async(url).await?;
        debug!(endpoint, status = %response.status(), "websocket handshake complete");
        let (write, read) = ws_stream.split();
        Ok((Box::pin(write), Box::pin(read)))
    }
}

/// http(s) endpoints are upgraded, so the handshake goes to ws(s).
pub fn websocket_url(endpoint: &str) -> Cow<'_, str> {
    if let Some(rest) = endpoint.strip_prefix("https://") {
        Cow::Owned(format!("wss://{}", rest))
    } else if let Some(rest) = endpoint.strip_prefix("http://") {
        Cow::Owned(format!("ws://{}", rest))
    } else {
        Cow::Borrowed(endpoint)
    }
}
