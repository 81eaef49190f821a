//! Connection Supervisor.
//!
//! Owns one worker task per enabled feed. Each worker is the single owner of
//! its feed's [`ConnectionState`], current [`FeedConnection`] and
//! [`ReconnectTimer`]; link callbacks and control commands for that feed are
//! processed one at a time from its queues. The two feeds share nothing but
//! the sink.
//!
//! ```text
//! Disconnected -> Connecting -> Open -> Reconnecting -> Connecting ...
//!                      |          |
//!                      +----------+--> Closing -> Disconnected   (shutdown)
//! ```

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bulletin::{self, ClassifiedEvent};
use crate::config::FeedSettings;
use crate::error::BulletinError;
use crate::feeds::classifier::classify;
use crate::feeds::connection::{FeedConnection, LinkEvent, LinkSignal};
use crate::feeds::connector::Connector;
use crate::feeds::{FeedIdentity, RawPayload};
use crate::sink::{Notice, NoticeKind, NotificationSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closing,
    Reconnecting,
}

enum Control {
    Reconnect { generation: u64 },
    Shutdown,
}

/// One-shot deferred reconnect. Scheduled on the tokio timer, never slept on
/// a worker.
struct ReconnectTimer {
    generation: u64,
    task: JoinHandle<()>,
}

impl ReconnectTimer {
    fn arm(generation: u64, delay: Duration, control: mpsc::UnboundedSender<Control>) -> Self {
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = control.send(Control::Reconnect { generation });
        });
        Self { generation, task }
    }

    fn cancel(self) {
        self.task.abort();
    }
}

struct FeedHandle {
    feed: FeedIdentity,
    control: mpsc::UnboundedSender<Control>,
    state: watch::Receiver<ConnectionState>,
}

pub struct ConnectionSupervisor {
    feeds: Vec<FeedHandle>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ConnectionSupervisor {
    /// Starts a worker for every enabled feed. Must be called inside a tokio runtime.
    pub fn start(
        settings: &FeedSettings,
        connector: Arc<dyn Connector>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let mut feeds = Vec::new();
        let mut workers = Vec::new();

        for feed in FeedIdentity::ALL {
            if !settings.enabled.contains(&feed) {
                debug!(%feed, "feed disabled");
                continue;
            }
            let (control_tx, control_rx) = mpsc::unbounded_channel();
            let (link_tx, link_rx) = mpsc::unbounded_channel();
            let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

            let worker = FeedWorker {
                feed,
                endpoint: settings.endpoint(feed).to_string(),
                reconnect_delay: settings.reconnect_delay(),
                connector: Arc::clone(&connector),
                sink: Arc::clone(&sink),
                state: ConnectionState::Disconnected,
                state_tx,
                generation: 0,
                link: None,
                timer: None,
                stopping: false,
                link_tx,
                control_tx: control_tx.clone(),
            };
            workers.push(tokio::spawn(worker.run(link_rx, control_rx)));
            feeds.push(FeedHandle { feed, control: control_tx, state: state_rx });
        }

        info!(feeds = feeds.len(), "connection supervisor started");
        Self { feeds, workers: Mutex::new(workers) }
    }

    /// Current state, `Disconnected` for feeds that were never enabled.
    pub fn state(&self, feed: FeedIdentity) -> ConnectionState {
        self.handle(feed).map(|h| *h.state.borrow()).unwrap_or(ConnectionState::Disconnected)
    }

    pub fn watch(&self, feed: FeedIdentity) -> Option<watch::Receiver<ConnectionState>> {
        self.handle(feed).map(|h| h.state.clone())
    }

    /// Closes every feed, cancels pending reconnects and waits for the
    /// workers to finish. Calling it again is a no-op.
    pub async fn shutdown(&self) {
        for handle in &self.feeds {
            if handle.control.send(Control::Shutdown).is_err() {
                debug!(feed = %handle.feed, "worker already stopped");
            }
        }
        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "feed worker ended abnormally");
            }
        }
    }

    fn handle(&self, feed: FeedIdentity) -> Option<&FeedHandle> {
        self.feeds.iter().find(|h| h.feed == feed)
    }
}

struct FeedWorker {
    feed: FeedIdentity,
    endpoint: String,
    reconnect_delay: Duration,
    connector: Arc<dyn Connector>,
    sink: Arc<dyn NotificationSink>,
    state: ConnectionState,
    state_tx: watch::Sender<ConnectionState>,
    // bumped on every open(); events from older links are ignored
    generation: u64,
    link: Option<FeedConnection>,
    timer: Option<ReconnectTimer>,
    stopping: bool,
    link_tx: mpsc::UnboundedSender<LinkEvent>,
    control_tx: mpsc::UnboundedSender<Control>,
}

impl FeedWorker {
    async fn run(
        mut self,
        mut links: mpsc::UnboundedReceiver<LinkEvent>,
        mut control: mpsc::UnboundedReceiver<Control>,
    ) {
        self.connect();
        while !(self.stopping && self.state == ConnectionState::Disconnected) {
            tokio::select! {
                Some(event) = links.recv() => self.on_link(event),
                Some(command) = control.recv() => self.on_control(command),
                else => break,
            }
        }
        info!(feed = %self.feed, "feed worker stopped");
    }

    fn transition(&mut self, next: ConnectionState) {
        debug!(feed = %self.feed, from = ?self.state, to = ?next, generation = self.generation, "state change");
        self.state = next;
        self.state_tx.send_replace(next);
    }

    fn connect(&mut self) {
        if self.link.is_some() {
            warn!(feed = %self.feed, generation = self.generation, "connect skipped, previous link still live");
            return;
        }
        self.generation += 1;
        self.transition(ConnectionState::Connecting);
        self.link = Some(FeedConnection::open(
            self.feed,
            self.generation,
            self.endpoint.clone(),
            Arc::clone(&self.connector),
            self.link_tx.clone(),
        ));
    }

    fn on_link(&mut self, event: LinkEvent) {
        if event.generation != self.generation {
            debug!(feed = %self.feed, stale = event.generation, current = self.generation, "ignoring superseded link event");
            return;
        }
        match event.signal {
            LinkSignal::Opened => {
                if self.state != ConnectionState::Connecting {
                    return;
                }
                self.transition(ConnectionState::Open);
                info!(feed = %self.feed, generation = self.generation, "feed connected");
                self.announce(format!("{} Socketが接続されました！", self.feed));
            }
            LinkSignal::Payload(payload) => self.on_payload(payload),
            LinkSignal::Closed { code, reason } => {
                info!(feed = %self.feed, generation = self.generation, code, reason = %reason, "feed closed");
                self.on_link_lost(format!("Socketがクローズされました: {}", reason));
            }
            LinkSignal::Failed { error } => {
                warn!(feed = %self.feed, generation = self.generation, error = %error, "feed failed");
                self.on_link_lost(format!("Socketエラー: {}", error));
            }
        }
    }

    fn on_link_lost(&mut self, reason: String) {
        self.link = None;
        if self.stopping {
            self.transition(ConnectionState::Disconnected);
            self.announce(format!("{} Socketがサーバー停止のためにクローズされました。", self.feed));
            return;
        }

        self.transition(ConnectionState::Reconnecting);
        self.announce(format!(
            "{} Socketが切断されました。{}秒後に再接続します: {}",
            self.feed,
            self.reconnect_delay.as_secs(),
            reason
        ));
        if let Some(previous) = self.timer.take() {
            previous.cancel();
        }
        metrics::counter!("quake_relay_reconnects_total", "feed" => self.feed.label()).increment(1);
        self.timer = Some(ReconnectTimer::arm(self.generation, self.reconnect_delay, self.control_tx.clone()));
    }

    fn on_control(&mut self, command: Control) {
        match command {
            Control::Reconnect { generation } => {
                let due = matches!(&self.timer, Some(t) if t.generation == generation);
                if !due || self.stopping || self.state != ConnectionState::Reconnecting {
                    debug!(feed = %self.feed, generation, "ignoring stale reconnect timer");
                    return;
                }
                self.timer = None;
                self.connect();
            }
            Control::Shutdown => self.begin_shutdown(),
        }
    }

    fn begin_shutdown(&mut self) {
        if self.stopping {
            return;
        }
        self.stopping = true;
        info!(feed = %self.feed, state = ?self.state, "shutting down feed");
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        match self.link.as_mut() {
            Some(link) => {
                link.close();
                self.transition(ConnectionState::Closing);
            }
            None => self.transition(ConnectionState::Disconnected),
        }
    }

    fn on_payload(&self, payload: RawPayload) {
        match compose(self.feed, payload) {
            Ok(Composed::Bulletin(text)) => {
                metrics::counter!("quake_relay_bulletins_total", "feed" => self.feed.label()).increment(1);
                self.sink.deliver(Notice { feed: self.feed, kind: NoticeKind::Bulletin, text });
            }
            Ok(Composed::Unhandled(category)) => {
                info!(feed = %self.feed, category = %category, "unhandled message category, no bulletin");
            }
            Err(e) => {
                metrics::counter!("quake_relay_bulletins_suppressed_total", "feed" => self.feed.label()).increment(1);
                warn!(feed = %self.feed, error = %e, "bulletin suppressed");
            }
        }
    }

    fn announce(&self, text: String) {
        self.sink.deliver(Notice { feed: self.feed, kind: NoticeKind::Lifecycle, text });
    }
}

enum Composed {
    Bulletin(String),
    Unhandled(String),
}

fn compose(feed: FeedIdentity, payload: RawPayload) -> Result<Composed, BulletinError> {
    let event = classify(feed, payload)?;
    match bulletin::render(&event)? {
        Some(text) => Ok(Composed::Bulletin(text)),
        None => Ok(Composed::Unhandled(match event {
            ClassifiedEvent::Unhandled { category } => category,
            other => other.kind().to_string(),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::connector::mock::{MockConnector, MockSession};
    use crate::sink::ChannelSink;
    use futures::StreamExt;
    use serde_json::json;
    use tokio::time::Instant;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;
    use tokio_tungstenite::tungstenite::Message;

    fn settings(enabled: &[FeedIdentity]) -> FeedSettings {
        FeedSettings {
            primary_url: "mock://eew".into(),
            secondary_url: "mock://p2p".into(),
            reconnect_delay_secs: 5,
            enabled: enabled.to_vec(),
        }
    }

    struct Harness {
        supervisor: ConnectionSupervisor,
        connector: Arc<MockConnector>,
        sessions: mpsc::UnboundedReceiver<MockSession>,
        notices: mpsc::UnboundedReceiver<Notice>,
    }

    fn start(enabled: &[FeedIdentity]) -> Harness {
        let (connector, sessions) = MockConnector::new();
        let (sink, notices) = ChannelSink::new();
        let supervisor = ConnectionSupervisor::start(&settings(enabled), connector.clone(), Arc::new(sink));
        Harness { supervisor, connector, sessions, notices }
    }

    async fn wait_for(h: &Harness, feed: FeedIdentity, state: ConnectionState) {
        let mut rx = h.supervisor.watch(feed).unwrap();
        rx.wait_for(|s| *s == state).await.unwrap();
    }

    async fn next_text(h: &mut Harness) -> String {
        h.notices.recv().await.unwrap().text
    }

    #[tokio::test]
    async fn test_connect_announces_and_opens() {
        let mut h = start(&[FeedIdentity::PrimaryEew]);
        let session = h.sessions.recv().await.unwrap();
        assert_eq!(session.endpoint, "mock://eew");

        let notice = h.notices.recv().await.unwrap();
        assert_eq!(notice.kind, NoticeKind::Lifecycle);
        assert_eq!(notice.text, "EEW Socketが接続されました！");
        assert_eq!(h.supervisor.state(FeedIdentity::PrimaryEew), ConnectionState::Open);
        assert_eq!(h.supervisor.state(FeedIdentity::SecondaryQuake), ConnectionState::Disconnected);
        assert!(h.supervisor.watch(FeedIdentity::SecondaryQuake).is_none());
    }

    #[tokio::test]
    async fn test_eew_payload_becomes_bulletin() {
        let mut h = start(&[FeedIdentity::PrimaryEew]);
        let session = h.sessions.recv().await.unwrap();
        next_text(&mut h).await;

        session.push_text(r#"{"type":"heartbeat"}"#);
        session.push_text(
            &json!({
                "Title": "震度速報", "Serial": 1, "Hypocenter": "Tokyo", "MaxIntensity": "3",
                "Magunitude": 5.2, "Depth": 10, "OriginTime": "2024/01/01 12:00:00",
                "isSea": false, "isAssumption": false, "isCancel": false, "isFinal": true,
                "isWarn": false, "isTraining": false, "OriginalText": "..."
            })
            .to_string(),
        );

        let notice = h.notices.recv().await.unwrap();
        assert_eq!(notice.kind, NoticeKind::Bulletin);
        assert_eq!(notice.feed, FeedIdentity::PrimaryEew);
        let mut lines = notice.text.lines();
        assert!(lines.next().unwrap().ends_with("第1報 (最終報)"));
        assert!(notice.text.lines().any(|l| l == "深さ: 10km"));
    }

    #[tokio::test]
    async fn test_p2p_filters_and_unhandled_categories() {
        let mut h = start(&[FeedIdentity::SecondaryQuake]);
        let session = h.sessions.recv().await.unwrap();
        assert_eq!(next_text(&mut h).await, "P2P Socketが接続されました！");

        // telemetry code, unknown category, malformed body, bad timestamp: no bulletins
        session.push_text(&json!({"code": 555, "issue": {"type": "ScalePrompt"}}).to_string());
        session.push_text(&json!({"code": 551, "issue": {"type": "Other"}}).to_string());
        session.push_text(&json!({"code": 551, "issue": {"type": "DetailScale"}}).to_string());
        session.push_text(
            &json!({
                "code": 551, "issue": {"type": "Destination"},
                "earthquake": {"time": "yesterday", "domesticTsunami": "None",
                               "hypocenter": {"name": "x", "magnitude": 3.0, "depth": 10}}
            })
            .to_string(),
        );
        session.push_text(
            &json!({
                "code": 551, "issue": {"type": "ScalePrompt"},
                "earthquake": {"time": "2024/01/01 12:00:00", "maxScale": 50, "domesticTsunami": "None"},
                "points": [{"pref": "Tokyo", "addr": "Chiyoda", "scale": 50}]
            })
            .to_string(),
        );

        let notice = h.notices.recv().await.unwrap();
        assert_eq!(notice.kind, NoticeKind::Bulletin);
        assert!(notice.text.contains("最大震度5強"));
        assert!(notice.text.lines().any(|l| l == "Tokyo Chiyoda: 5強"));
        assert_eq!(h.supervisor.state(FeedIdentity::SecondaryQuake), ConnectionState::Open);
    }

    #[tokio::test]
    async fn test_destination_depth_zero_end_to_end() {
        let mut h = start(&[FeedIdentity::SecondaryQuake]);
        let session = h.sessions.recv().await.unwrap();
        next_text(&mut h).await;
        session.push_text(
            &json!({
                "code": 551, "issue": {"type": "Destination"},
                "earthquake": {"time": "2024/01/01 16:10:00", "domesticTsunami": "Watch",
                               "hypocenter": {"name": "石川県能登地方", "magnitude": 7.6, "depth": 0}}
            })
            .to_string(),
        );
        let text = next_text(&mut h).await;
        assert!(text.lines().any(|l| l == "深さ: ごく浅い"));
        assert!(!text.contains("0km"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_after_fixed_delay() {
        let mut h = start(&[FeedIdentity::PrimaryEew]);
        let session = h.sessions.recv().await.unwrap();
        next_text(&mut h).await;

        let lost_at = Instant::now();
        drop(session);

        let retry = next_text(&mut h).await;
        assert!(retry.starts_with("EEW Socketが切断されました。5秒後に再接続します: "));
        assert_eq!(h.supervisor.state(FeedIdentity::PrimaryEew), ConnectionState::Reconnecting);
        assert_eq!(h.connector.attempts().len(), 1);

        let _second = h.sessions.recv().await.unwrap();
        let attempts = h.connector.attempts();
        assert_eq!(attempts.len(), 2);
        let waited = attempts[1] - lost_at;
        assert!(waited >= Duration::from_secs(5), "reconnected after {:?}", waited);
        assert!(waited < Duration::from_millis(5100), "reconnected after {:?}", waited);
        assert_eq!(next_text(&mut h).await, "EEW Socketが接続されました！");

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(h.connector.attempts().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_connections_retry_indefinitely() {
        let (connector, mut sessions) = MockConnector::new();
        connector.refuse_next(3);
        let (sink, mut notices) = ChannelSink::new();
        let supervisor = ConnectionSupervisor::start(
            &settings(&[FeedIdentity::SecondaryQuake]),
            connector.clone(),
            Arc::new(sink),
        );

        let _session = sessions.recv().await.unwrap();
        let attempts = connector.attempts();
        assert_eq!(attempts.len(), 4);
        for pair in attempts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(5));
        }
        let mut retries = 0;
        while let Ok(notice) = notices.try_recv() {
            if notice.text.contains("Socketエラー") {
                retries += 1;
            }
        }
        assert_eq!(retries, 3);
        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_closes_once_without_retry_notice() {
        let mut h = start(&[FeedIdentity::PrimaryEew]);
        let session = h.sessions.recv().await.unwrap();
        next_text(&mut h).await;
        wait_for(&h, FeedIdentity::PrimaryEew, ConnectionState::Open).await;

        h.supervisor.shutdown().await;
        h.supervisor.shutdown().await;
        assert_eq!(h.supervisor.state(FeedIdentity::PrimaryEew), ConnectionState::Disconnected);

        let frames: Vec<Message> = session.outbound.collect().await;
        assert_eq!(
            frames,
            vec![Message::Close(Some(CloseFrame { code: CloseCode::Normal, reason: "Server stopping".into() }))]
        );

        let mut rest = Vec::new();
        while let Ok(notice) = h.notices.try_recv() {
            rest.push(notice.text);
        }
        assert_eq!(rest, vec!["EEW Socketがサーバー停止のためにクローズされました。".to_string()]);
        assert_eq!(h.connector.attempts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending_reconnect() {
        let mut h = start(&[FeedIdentity::PrimaryEew]);
        let session = h.sessions.recv().await.unwrap();
        next_text(&mut h).await;

        session
            .inbound
            .unbounded_send(Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed))
            .unwrap();
        let retry = next_text(&mut h).await;
        assert!(retry.contains("Socketエラー"));

        h.supervisor.shutdown().await;
        assert_eq!(h.supervisor.state(FeedIdentity::PrimaryEew), ConnectionState::Disconnected);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(h.connector.attempts().len(), 1);
        assert!(h.sessions.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_generation_is_ignored() {
        let (connector, mut sessions) = MockConnector::new();
        let (sink, mut notices) = ChannelSink::new();
        let (link_tx, mut links) = mpsc::unbounded_channel();
        let (control_tx, _control_rx) = mpsc::unbounded_channel();
        let (state_tx, _state_rx) = watch::channel(ConnectionState::Disconnected);
        let mut worker = FeedWorker {
            feed: FeedIdentity::PrimaryEew,
            endpoint: "mock://eew".into(),
            reconnect_delay: Duration::from_secs(5),
            connector: connector.clone(),
            sink: Arc::new(sink),
            state: ConnectionState::Disconnected,
            state_tx,
            generation: 0,
            link: None,
            timer: None,
            stopping: false,
            link_tx,
            control_tx,
        };

        worker.connect();
        let _first = sessions.recv().await.unwrap();
        let opened = links.recv().await.unwrap();
        assert_eq!(opened.generation, 1);
        worker.on_link(opened);
        assert_eq!(worker.state, ConnectionState::Open);
        assert_eq!(notices.try_recv().unwrap().text, "EEW Socketが接続されました！");

        // events from a link that was never current
        worker.on_link(LinkEvent {
            generation: 0,
            signal: LinkSignal::Closed { code: 1006, reason: String::new() },
        });
        worker.on_link(LinkEvent {
            generation: 0,
            signal: LinkSignal::Payload(json!({
                "Title": "震度速報", "Serial": 1, "Hypocenter": "Tokyo", "MaxIntensity": "3",
                "Magunitude": 5.2, "Depth": 10, "OriginTime": "2024/01/01 12:00:00",
                "isSea": false, "isAssumption": false, "isCancel": false, "isFinal": true,
                "isWarn": false, "isTraining": false, "OriginalText": "..."
            })),
        });
        assert_eq!(worker.state, ConnectionState::Open);
        assert!(worker.timer.is_none());
        assert!(notices.try_recv().is_err());

        worker.on_link(LinkEvent { generation: 1, signal: LinkSignal::Failed { error: "boom".into() } });
        assert_eq!(worker.state, ConnectionState::Reconnecting);
        assert!(notices.try_recv().unwrap().text.ends_with("Socketエラー: boom"));

        // a timer message that does not match the armed timer
        worker.on_control(Control::Reconnect { generation: 0 });
        assert_eq!(worker.state, ConnectionState::Reconnecting);
        assert_eq!(worker.generation, 1);
        assert!(notices.try_recv().is_err());
        assert_eq!(connector.attempts().len(), 1);

        worker.on_control(Control::Reconnect { generation: 1 });
        let _second = sessions.recv().await.unwrap();
        assert_eq!(worker.generation, 2);
        assert_eq!(worker.state, ConnectionState::Connecting);
        assert_eq!(connector.attempts().len(), 2);

        // late close from the replaced link
        worker.on_link(LinkEvent { generation: 1, signal: LinkSignal::Closed { code: 1000, reason: "late".into() } });
        assert_eq!(worker.state, ConnectionState::Connecting);
        assert!(notices.try_recv().is_err());
        assert_eq!(connector.attempts().len(), 2);
    }
}
