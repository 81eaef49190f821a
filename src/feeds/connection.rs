//! One socket's lifecycle for one feed.
//!
//! A [`FeedConnection`] is a handle to a spawned link task. The task performs
//! the single connect attempt, answers liveness probes, screens frames, and
//! reports exactly one terminal signal (`Closed` or `Failed`) per generation.

use std::borrow::Cow;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, trace, warn};

use super::connector::Connector;
use super::{FeedIdentity, RawPayload};
use crate::error::DecodeError;

/// Close reason sent on graceful shutdown (with code 1000).
pub const SHUTDOWN_REASON: &str = "Server stopping";
/// Literal reply to a PrimaryEEW heartbeat.
pub const LIVENESS_REPLY: &str = "ping";
/// The only SecondaryQuake code that carries bulletins.
pub const BULLETIN_CODE: i64 = 551;

// Close code reported when the stream ends without a close frame
const ABNORMAL_CLOSURE: u16 = 1006;

#[derive(Debug)]
pub enum LinkSignal {
    Opened,
    Payload(RawPayload),
    Closed { code: u16, reason: String },
    Failed { error: String },
}

#[derive(Debug)]
pub struct LinkEvent {
    pub generation: u64,
    pub signal: LinkSignal,
}

/// What to do with one inbound text frame.
#[derive(Debug, PartialEq)]
pub enum Screened {
    Forward(RawPayload),
    Reply(&'static str),
    Discard(&'static str),
}

pub fn screen(feed: FeedIdentity, text: &str) -> Result<Screened, DecodeError> {
    let payload: RawPayload =
        serde_json::from_str(text).map_err(|source| DecodeError { feed, source })?;

    let screened = match feed {
        FeedIdentity::PrimaryEew => match payload.get("type").and_then(Value::as_str) {
            Some("heartbeat") => Screened::Reply(LIVENESS_REPLY),
            // we never probe, kept in case the server starts answering
            Some("pong") => Screened::Discard("pong"),
            _ => Screened::Forward(payload),
        },
        FeedIdentity::SecondaryQuake => {
            if payload.get("code").and_then(Value::as_i64) == Some(BULLETIN_CODE) {
                Screened::Forward(payload)
            } else {
                Screened::Discard("non-bulletin code")
            }
        }
    };
    Ok(screened)
}

pub struct FeedConnection {
    feed: FeedIdentity,
    generation: u64,
    stop: Option<oneshot::Sender<()>>,
}

impl FeedConnection {
    /// Spawns the link task and returns immediately. Lifecycle and payloads
    /// arrive on `events` tagged with `generation`.
    pub fn open(
        feed: FeedIdentity,
        generation: u64,
        endpoint: String,
        connector: Arc<dyn Connector>,
        events: mpsc::UnboundedSender<LinkEvent>,
    ) -> Self {
        let (stop_tx, stop_rx) = oneshot::channel();
        tokio::spawn(run_link(feed, generation, endpoint, connector, events, stop_rx));
        Self { feed, generation, stop: Some(stop_tx) }
    }

    /// Graceful close with 1000 / "Server stopping". Idempotent, and a no-op
    /// once the link has already ended.
    pub fn close(&mut self) {
        if let Some(stop) = self.stop.take() {
            if stop.send(()).is_err() {
                trace!(feed = %self.feed, generation = self.generation, "close on finished link");
            }
        }
    }
}

async fn run_link(
    feed: FeedIdentity,
    generation: u64,
    endpoint: String,
    connector: Arc<dyn Connector>,
    events: mpsc::UnboundedSender<LinkEvent>,
    mut stop: oneshot::Receiver<()>,
) {
    let emit = |signal: LinkSignal| {
        // worker gone means the supervisor is gone, nothing left to tell
        let _ = events.send(LinkEvent { generation, signal });
    };

    debug!(%feed, generation, endpoint = %endpoint, "connecting");
    let connected = tokio::select! {
        result = connector.connect(&endpoint) => result,
        _ = &mut stop => {
            emit(LinkSignal::Closed { code: CloseCode::Normal.into(), reason: SHUTDOWN_REASON.to_string() });
            return;
        }
    };
    let (mut sink, mut stream) = match connected {
        Ok(halves) => halves,
        Err(e) => {
            emit(LinkSignal::Failed { error: e.to_string() });
            return;
        }
    };
    emit(LinkSignal::Opened);

    let mut peer_close: Option<(u16, String)> = None;
    let terminal = loop {
        tokio::select! {
            _ = &mut stop => {
                let frame = CloseFrame { code: CloseCode::Normal, reason: Cow::Borrowed(SHUTDOWN_REASON) };
                if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                    debug!(%feed, generation, error = %e, "close frame not delivered");
                }
                break LinkSignal::Closed { code: CloseCode::Normal.into(), reason: SHUTDOWN_REASON.to_string() };
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => match screen(feed, &text) {
                    Ok(Screened::Forward(payload)) => emit(LinkSignal::Payload(payload)),
                    Ok(Screened::Reply(reply)) => {
                        trace!(%feed, generation, "answering heartbeat");
                        if let Err(e) = sink.send(Message::Text(reply.to_string())).await {
                            break LinkSignal::Failed { error: e.to_string() };
                        }
                    }
                    Ok(Screened::Discard(why)) => {
                        trace!(%feed, generation, reason = why, "frame discarded");
                        metrics::counter!("quake_relay_frames_dropped_total", "feed" => feed.label(), "reason" => why).increment(1);
                    }
                    Err(e) => {
                        warn!(%feed, generation, error = %e, "dropping undecodable frame");
                        metrics::counter!("quake_relay_frames_dropped_total", "feed" => feed.label(), "reason" => "decode").increment(1);
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    peer_close = frame.map(|f| (u16::from(f.code), f.reason.into_owned()));
                }
                Some(Ok(other)) => trace!(%feed, generation, ?other, "ignoring non-text frame"),
                Some(Err(e)) => break LinkSignal::Failed { error: e.to_string() },
                None => {
                    let (code, reason) = peer_close.take().unwrap_or((ABNORMAL_CLOSURE, String::new()));
                    break LinkSignal::Closed { code, reason };
                }
            }
        }
    };

    info!(%feed, generation, signal = ?terminal, "link finished");
    emit(terminal);
}
