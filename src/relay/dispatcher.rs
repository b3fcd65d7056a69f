//! Relay dispatcher: the engine's public façade.
//!
//! Owns the set of active channel subscriptions (it alone creates and
//! destroys them), the session context, and the fan-out of every inbound
//! batch to its three consumers: the history store (dedup + persist), the
//! foreground renderer (focus-filtered), and the passive monitor
//! (detached).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::diag::{DiagnosticLog, Severity};
use crate::error::{Error, InputError, TransportError};
use crate::message::{Message, normalize_channel, validate_message_text};
use crate::monitor::PassiveMonitor;
use crate::relay::session::Session;
use crate::relay::subscription::{ChannelSubscription, RetryPolicy, SubscriptionEvents};
use crate::store::HistoryStore;
use crate::transport::{Outgoing, RelayTransport};

/// Sink for everything the user should see asynchronously: inbound
/// messages that pass the focus filter, and monitor alerts.
pub trait ForegroundRenderer: Send + Sync {
    fn render_incoming(&self, message: &Message);
    fn render_alert(&self, channel: &str, alert: &str);
}

/// Outcome of a broadcast: independent sends, no rollback, no atomicity
/// across channels.
#[derive(Debug)]
pub struct BroadcastReport {
    pub succeeded: usize,
    pub total: usize,
    pub failed: Vec<(String, TransportError)>,
}

impl BroadcastReport {
    /// True when every channel accepted the broadcast.
    pub fn is_complete(&self) -> bool {
        self.succeeded == self.total
    }
}

/// Shared fan-out target for all subscriptions.
///
/// Separate from the dispatcher so subscriptions can hold a strong
/// reference without forming a cycle through the active-set map.
struct BatchRouter {
    store: HistoryStore,
    renderer: Arc<dyn ForegroundRenderer>,
    monitor: PassiveMonitor,
    diag: Arc<DiagnosticLog>,
    session: Arc<RwLock<Session>>,
}

impl BatchRouter {
    /// Focus filter for the foreground path. Suppressed messages are
    /// still persisted; this only gates display.
    fn should_display(&self, message: &Message, user: &str, focused: &str) -> bool {
        if message.user == user {
            // Own messages already rendered at send time; the relay echo
            // is persistence-only.
            return false;
        }
        if let Some(to) = &message.whisper_to {
            return to == user;
        }
        message.channel == focused || message.broadcast || message.is_system()
    }
}

#[async_trait]
impl SubscriptionEvents for BatchRouter {
    async fn on_batch(&self, channel: &str, messages: Vec<Message>) -> anyhow::Result<()> {
        // Persist first. A duplicate token is the expected "already seen"
        // signal; a real store failure aborts the handoff so the cursor
        // stays unconfirmed and the relay re-serves the batch.
        for message in &messages {
            match self.store.append(message).await {
                Ok(_) => {}
                Err(err) => {
                    self.diag.record(
                        Severity::Error,
                        format!("history write failed for #{channel}: {err}"),
                    );
                    return Err(err.into());
                }
            }
        }

        let (user, focused) = {
            let session = self.session.read().await;
            (session.user.clone(), session.focused.clone())
        };
        for message in &messages {
            if self.should_display(message, &user, &focused) {
                self.renderer.render_incoming(message);
            }
        }

        // Detached; never awaited from the delivery path.
        self.monitor.observe(channel, &messages);
        Ok(())
    }

    async fn on_failure(&self, channel: &str, error: &TransportError) {
        tracing::debug!(channel, error = %error, "subscription failure");
    }
}

/// The relay synchronization engine's coordinator.
pub struct RelayDispatcher {
    transport: Arc<dyn RelayTransport>,
    store: HistoryStore,
    diag: Arc<DiagnosticLog>,
    router: Arc<BatchRouter>,
    session: Arc<RwLock<Session>>,
    subscriptions: RwLock<HashMap<String, ChannelSubscription>>,
    retry: RetryPolicy,
}

impl RelayDispatcher {
    pub fn new(
        transport: Arc<dyn RelayTransport>,
        store: HistoryStore,
        diag: Arc<DiagnosticLog>,
        renderer: Arc<dyn ForegroundRenderer>,
        monitor: PassiveMonitor,
        session: Session,
        retry: RetryPolicy,
    ) -> Self {
        let session = Arc::new(RwLock::new(session));
        let router = Arc::new(BatchRouter {
            store: store.clone(),
            renderer,
            monitor,
            diag: Arc::clone(&diag),
            session: Arc::clone(&session),
        });
        Self {
            transport,
            store,
            diag,
            router,
            session,
            subscriptions: RwLock::new(HashMap::new()),
            retry,
        }
    }

    /// Channels with a live subscription, sorted.
    pub async fn active_channels(&self) -> Vec<String> {
        let mut names: Vec<String> = self.subscriptions.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// The channel currently rendered in the foreground.
    pub async fn focused(&self) -> String {
        self.session.read().await.focused.clone()
    }

    /// The name messages are sent under.
    pub async fn user(&self) -> String {
        self.session.read().await.user.clone()
    }

    /// Change the sending name (`/nick`). Validation is the caller's job.
    pub async fn set_user(&self, name: &str) {
        self.session.write().await.user = name.to_string();
    }

    /// Join a channel: spawn its subscription, announce, focus it.
    ///
    /// Purely additive remotely: no remote state is cleared. Already
    /// joined is a no-op rejection with no state change.
    pub async fn join(&self, channel: &str) -> Result<(), Error> {
        let name = normalize_channel(channel)?;

        {
            let mut subs = self.subscriptions.write().await;
            if subs.contains_key(&name) {
                return Err(InputError::AlreadyJoined(name).into());
            }
            let sub = ChannelSubscription::spawn(
                name.clone(),
                Arc::clone(&self.transport),
                self.router.clone() as Arc<dyn SubscriptionEvents>,
                Arc::clone(&self.diag),
                self.retry.clone(),
            );
            subs.insert(name.clone(), sub);
        }

        tracing::info!(channel = %name, "joined channel");

        let user = self.user().await;
        let announcement = Outgoing::system(format!("{user} has joined"));
        match self.transport.publish(&name, &announcement).await {
            Ok(ack) => {
                self.persist_sent(&name, &announcement, &ack).await;
                self.session.write().await.focused = name;
                Ok(())
            }
            Err(err) => {
                // Subscription stays up; the stream is usable even though
                // the announcement didn't land.
                self.diag.record(
                    Severity::Error,
                    format!("join announcement failed for #{name}: {err}"),
                );
                Err(err.into())
            }
        }
    }

    /// Leave a channel: announce (best-effort), then stop its
    /// subscription. At least one channel must remain active at all
    /// times.
    pub async fn leave(&self, channel: &str) -> Result<(), Error> {
        let name = normalize_channel(channel)?;

        let sub = {
            let mut subs = self.subscriptions.write().await;
            if !subs.contains_key(&name) {
                return Err(InputError::NotJoined(name).into());
            }
            if subs.len() == 1 {
                return Err(InputError::LastChannel.into());
            }
            subs.remove(&name)
        };

        let user = self.user().await;
        if let Err(err) = self
            .transport
            .publish(&name, &Outgoing::system(format!("{user} has left")))
            .await
        {
            self.diag.record(
                Severity::Error,
                format!("leave announcement failed for #{name}: {err}"),
            );
        }

        if let Some(sub) = sub {
            sub.stop().await;
        }
        tracing::info!(channel = %name, "left channel");

        // Refocus if the focused channel just went away.
        let fallback = self.active_channels().await.into_iter().next();
        if let Some(fallback) = fallback {
            let mut session = self.session.write().await;
            if session.focused == name {
                session.focused = fallback;
            }
        }
        Ok(())
    }

    /// Pure local focus change; the channel must already be joined.
    pub async fn switch(&self, channel: &str) -> Result<(), Error> {
        let name = normalize_channel(channel)?;
        if !self.subscriptions.read().await.contains_key(&name) {
            return Err(InputError::NotJoined(name).into());
        }
        self.session.write().await.focused = name;
        Ok(())
    }

    /// Send a chat message to the focused channel. No retry at this
    /// layer: a failed send surfaces immediately instead of silently
    /// retrying.
    pub async fn send(&self, text: &str) -> Result<Message, Error> {
        validate_message_text(text)?;
        let (user, channel) = {
            let session = self.session.read().await;
            (session.user.clone(), session.focused.clone())
        };
        let payload = Outgoing::chat(user, text);
        let ack = self.transport.publish(&channel, &payload).await?;
        Ok(self.persist_sent(&channel, &payload, &ack).await)
    }

    /// Send a whisper to one user on the focused channel.
    pub async fn whisper(&self, to: &str, text: &str) -> Result<Message, Error> {
        validate_message_text(text)?;
        let (user, channel) = {
            let session = self.session.read().await;
            (session.user.clone(), session.focused.clone())
        };
        let payload = Outgoing::whisper(user, to, text);
        let ack = self.transport.publish(&channel, &payload).await?;
        Ok(self.persist_sent(&channel, &payload, &ack).await)
    }

    /// Send to every active channel independently. Full success only if
    /// every send succeeded; otherwise the report carries the partial
    /// counts and per-channel failures.
    pub async fn broadcast(&self, text: &str) -> Result<BroadcastReport, Error> {
        validate_message_text(text)?;
        let user = self.user().await;
        let channels = self.active_channels().await;

        let sends = channels.iter().map(|channel| {
            let payload = Outgoing::broadcast(user.clone(), text);
            async move {
                let result = self.transport.publish(channel, &payload).await;
                (channel.clone(), payload, result)
            }
        });
        let results = futures::future::join_all(sends).await;

        let total = results.len();
        let mut succeeded = 0;
        let mut failed = Vec::new();
        for (channel, payload, result) in results {
            match result {
                Ok(ack) => {
                    succeeded += 1;
                    self.persist_sent(&channel, &payload, &ack).await;
                }
                Err(err) => {
                    self.diag.record(
                        Severity::Error,
                        format!("broadcast to #{channel} failed: {err}"),
                    );
                    failed.push((channel, err));
                }
            }
        }

        Ok(BroadcastReport {
            succeeded,
            total,
            failed,
        })
    }

    /// Remote history for the focused channel, oldest first.
    pub async fn remote_history(&self, count: u32) -> Result<Vec<Message>, Error> {
        let channel = self.focused().await;
        Ok(self.transport.history(&channel, count).await?)
    }

    /// Announce departure on every active channel and stop all
    /// subscriptions. Used by `/logout`; announcements are best-effort.
    pub async fn shutdown(&self) {
        let user = self.user().await;
        for channel in self.active_channels().await {
            if let Err(err) = self
                .transport
                .publish(&channel, &Outgoing::system(format!("{user} has left")))
                .await
            {
                self.diag.record(
                    Severity::Error,
                    format!("logout announcement failed for #{channel}: {err}"),
                );
            }
        }
        let subs: Vec<ChannelSubscription> = {
            let mut map = self.subscriptions.write().await;
            map.drain().map(|(_, sub)| sub).collect()
        };
        for sub in subs {
            sub.stop().await;
        }
    }

    /// Persist an acked outbound message under the relay-assigned token.
    /// The relay echo later dedups against this record, which is what
    /// makes send-then-echo exactly-once in local history.
    async fn persist_sent(&self, channel: &str, payload: &Outgoing, ack: &crate::transport::Ack) -> Message {
        let message = Message {
            channel: channel.to_string(),
            user: payload.user.clone(),
            text: payload.text.clone(),
            timestamp: ack.timestamp.clone(),
            delivery_token: ack.token.clone(),
            broadcast: payload.broadcast,
            whisper_to: payload.whisper_to.clone(),
        };
        if let Err(err) = self.store.append(&message).await {
            self.diag.record(
                Severity::Error,
                format!("history write failed for #{channel}: {err}"),
            );
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;
    use crate::error::LlmError;
    use crate::monitor::ChannelAnalyzer;
    use crate::transport::{Ack, Batch};
    use tempfile::tempdir;

    /// Transport whose publishes ack with sequential tokens, with an
    /// optional set of channels that always fail. Polls park forever.
    struct FakeRelay {
        counter: AtomicU64,
        failing: HashSet<String>,
        published: Mutex<Vec<(String, String, String)>>, // (channel, user, text)
    }

    impl FakeRelay {
        fn new() -> Self {
            Self::failing(&[])
        }

        fn failing(channels: &[&str]) -> Self {
            Self {
                counter: AtomicU64::new(0),
                failing: channels.iter().map(|c| c.to_string()).collect(),
                published: Mutex::new(Vec::new()),
            }
        }

        fn published(&self) -> Vec<(String, String, String)> {
            self.published.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RelayTransport for FakeRelay {
        async fn poll(
            &self,
            _channel: &str,
            _cursor: Option<&str>,
        ) -> Result<Batch, TransportError> {
            futures::future::pending().await
        }

        async fn publish(
            &self,
            channel: &str,
            payload: &Outgoing,
        ) -> Result<Ack, TransportError> {
            if self.failing.contains(channel) {
                return Err(TransportError::Connection("relay unreachable".to_string()));
            }
            self.published.lock().unwrap().push((
                channel.to_string(),
                payload.user.clone(),
                payload.text.clone(),
            ));
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            Ok(Ack {
                token: format!("ack-{n}"),
                timestamp: "12:00:00".to_string(),
            })
        }

        async fn history(
            &self,
            _channel: &str,
            _count: u32,
        ) -> Result<Vec<Message>, TransportError> {
            Ok(Vec::new())
        }
    }

    struct RecordingRenderer {
        shown: Mutex<Vec<Message>>,
    }

    impl RecordingRenderer {
        fn new() -> Self {
            Self {
                shown: Mutex::new(Vec::new()),
            }
        }

        fn shown(&self) -> Vec<Message> {
            self.shown.lock().unwrap().clone()
        }
    }

    impl ForegroundRenderer for RecordingRenderer {
        fn render_incoming(&self, message: &Message) {
            self.shown.lock().unwrap().push(message.clone());
        }

        fn render_alert(&self, _channel: &str, _alert: &str) {}
    }

    struct QuietAnalyzer;

    #[async_trait]
    impl ChannelAnalyzer for QuietAnalyzer {
        async fn analyze(
            &self,
            _channel: &str,
            _messages: &[Message],
            _topic: Option<&str>,
        ) -> Result<Option<String>, LlmError> {
            Ok(None)
        }
    }

    struct Fixture {
        dispatcher: Arc<RelayDispatcher>,
        relay: Arc<FakeRelay>,
        renderer: Arc<RecordingRenderer>,
        store: HistoryStore,
        _dir: tempfile::TempDir,
    }

    async fn fixture_with(relay: FakeRelay) -> Fixture {
        let dir = tempdir().unwrap();
        let store = HistoryStore::open(dir.path().join("dispatch.db")).await.unwrap();
        let relay = Arc::new(relay);
        let renderer = Arc::new(RecordingRenderer::new());
        let diag = Arc::new(DiagnosticLog::new());
        let monitor = PassiveMonitor::new(
            Arc::new(QuietAnalyzer),
            store.clone(),
            renderer.clone(),
            Arc::clone(&diag),
        );
        let dispatcher = Arc::new(RelayDispatcher::new(
            relay.clone(),
            store.clone(),
            diag,
            renderer.clone(),
            monitor,
            Session::new("alice", "general"),
            RetryPolicy {
                base_delay_ms: 1,
                max_delay_ms: 5,
                jitter_factor: 0.0,
            },
        ));
        dispatcher.join("general").await.unwrap();
        Fixture {
            dispatcher,
            relay,
            renderer,
            store,
            _dir: dir,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(FakeRelay::new()).await
    }

    fn inbound(channel: &str, user: &str, text: &str, token: &str) -> Message {
        Message {
            channel: channel.to_string(),
            user: user.to_string(),
            text: text.to_string(),
            timestamp: "12:01:00".to_string(),
            delivery_token: token.to_string(),
            broadcast: false,
            whisper_to: None,
        }
    }

    // ── Join ──

    #[tokio::test]
    async fn test_join_registers_announces_and_focuses() {
        let fx = fixture().await;
        fx.dispatcher.join("ops").await.unwrap();

        assert_eq!(fx.dispatcher.active_channels().await, vec!["general", "ops"]);
        assert_eq!(fx.dispatcher.focused().await, "ops");

        let announcements: Vec<_> = fx
            .relay
            .published()
            .into_iter()
            .filter(|(ch, user, _)| ch == "ops" && user == "SYSTEM")
            .collect();
        assert_eq!(announcements.len(), 1);
        assert!(announcements[0].2.contains("alice has joined"));
    }

    #[tokio::test]
    async fn test_join_twice_is_rejected_without_state_change() {
        let fx = fixture().await;
        let err = fx.dispatcher.join("general").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Input(InputError::AlreadyJoined(ref c)) if c == "general"
        ));
        assert_eq!(fx.dispatcher.active_channels().await.len(), 1);
    }

    #[tokio::test]
    async fn test_join_accepts_hash_prefix() {
        let fx = fixture().await;
        fx.dispatcher.join("#ops").await.unwrap();
        assert!(fx.dispatcher.active_channels().await.contains(&"ops".to_string()));
    }

    #[tokio::test]
    async fn test_join_announce_failure_keeps_subscription() {
        let fx = fixture_with(FakeRelay::failing(&["ops"])).await;
        let err = fx.dispatcher.join("ops").await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        // Stream stays registered; focus unchanged.
        assert!(fx.dispatcher.active_channels().await.contains(&"ops".to_string()));
        assert_eq!(fx.dispatcher.focused().await, "general");
    }

    // ── Leave ──

    #[tokio::test]
    async fn test_leave_sole_channel_is_rejected() {
        let fx = fixture().await;
        let err = fx.dispatcher.leave("general").await.unwrap_err();
        assert!(matches!(err, Error::Input(InputError::LastChannel)));
        assert_eq!(fx.dispatcher.active_channels().await, vec!["general"]);
    }

    #[tokio::test]
    async fn test_leave_refocuses_and_announces() {
        let fx = fixture().await;
        fx.dispatcher.join("ops").await.unwrap();
        assert_eq!(fx.dispatcher.focused().await, "ops");

        fx.dispatcher.leave("ops").await.unwrap();
        assert_eq!(fx.dispatcher.active_channels().await, vec!["general"]);
        assert_eq!(fx.dispatcher.focused().await, "general");

        let farewells: Vec<_> = fx
            .relay
            .published()
            .into_iter()
            .filter(|(ch, user, text)| {
                ch == "ops" && user == "SYSTEM" && text.contains("has left")
            })
            .collect();
        assert_eq!(farewells.len(), 1);
    }

    #[tokio::test]
    async fn test_leave_unjoined_channel_is_rejected() {
        let fx = fixture().await;
        let err = fx.dispatcher.leave("nowhere").await.unwrap_err();
        assert!(matches!(err, Error::Input(InputError::NotJoined(_))));
    }

    // ── Switch ──

    #[tokio::test]
    async fn test_switch_requires_membership() {
        let fx = fixture().await;
        let err = fx.dispatcher.switch("ops").await.unwrap_err();
        assert!(matches!(err, Error::Input(InputError::NotJoined(_))));

        fx.dispatcher.join("ops").await.unwrap();
        fx.dispatcher.switch("general").await.unwrap();
        assert_eq!(fx.dispatcher.focused().await, "general");
    }

    // ── Send ──

    #[tokio::test]
    async fn test_send_persists_under_ack_token() {
        let fx = fixture().await;
        let sent = fx.dispatcher.send("hi").await.unwrap();
        assert_eq!(sent.channel, "general");

        let history = fx.store.recent("general", 10).await.unwrap();
        let chat: Vec<_> = history.iter().filter(|m| m.user == "alice").collect();
        assert_eq!(chat.len(), 1);
        assert_eq!(chat[0].delivery_token, sent.delivery_token);
    }

    #[tokio::test]
    async fn test_send_echo_redelivery_keeps_one_record() {
        let fx = fixture().await;
        let sent = fx.dispatcher.send("hi").await.unwrap();

        // The relay echoes the same logical delivery back on the stream.
        fx.dispatcher
            .router
            .on_batch("general", vec![sent.clone()])
            .await
            .unwrap();
        fx.dispatcher
            .router
            .on_batch("general", vec![sent.clone()])
            .await
            .unwrap();

        let history = fx.store.recent("general", 10).await.unwrap();
        let copies: Vec<_> = history
            .iter()
            .filter(|m| m.delivery_token == sent.delivery_token)
            .collect();
        assert_eq!(copies.len(), 1);
    }

    #[tokio::test]
    async fn test_oversized_send_rejected_before_transport() {
        let fx = fixture().await;
        let text = "x".repeat(1001);
        let err = fx.dispatcher.send(&text).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Input(InputError::MessageTooLong { .. })
        ));
        assert!(fx.relay.published().iter().all(|(_, user, _)| user == "SYSTEM"));
    }

    // ── Broadcast ──

    #[tokio::test]
    async fn test_broadcast_partial_success_reports_counts() {
        let fx = fixture_with(FakeRelay::failing(&["bad"])).await;
        fx.dispatcher.join("ops").await.unwrap();
        // Join of a failing channel registers the stream but errors on the
        // announcement; the channel is still active for broadcast.
        let _ = fx.dispatcher.join("bad").await;
        assert_eq!(fx.dispatcher.active_channels().await.len(), 3);

        let report = fx.dispatcher.broadcast("all hands").await.unwrap();
        assert_eq!(report.total, 3);
        assert_eq!(report.succeeded, 2);
        assert!(!report.is_complete());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "bad");

        // The two healthy channels each persisted the broadcast copy.
        for channel in ["general", "ops"] {
            let history = fx.store.recent(channel, 10).await.unwrap();
            assert!(
                history.iter().any(|m| m.text == "all hands" && m.broadcast),
                "#{channel} should hold the broadcast"
            );
        }
        assert!(fx.store.recent("bad", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_full_success() {
        let fx = fixture().await;
        fx.dispatcher.join("ops").await.unwrap();
        let report = fx.dispatcher.broadcast("ship it").await.unwrap();
        assert_eq!(report.succeeded, 2);
        assert!(report.is_complete());
        assert!(report.failed.is_empty());
    }

    // ── Fan-out display filter ──

    #[tokio::test]
    async fn test_unfocused_traffic_persisted_but_not_rendered() {
        let fx = fixture().await;
        fx.dispatcher.join("ops").await.unwrap();
        fx.dispatcher.switch("general").await.unwrap();

        fx.dispatcher
            .router
            .on_batch("ops", vec![inbound("ops", "bob", "background noise", "t-ops")])
            .await
            .unwrap();

        assert!(fx.renderer.shown().is_empty());
        assert_eq!(fx.store.recent("ops", 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_and_system_pierce_focus() {
        let fx = fixture().await;
        fx.dispatcher.join("ops").await.unwrap();
        fx.dispatcher.switch("general").await.unwrap();

        let broadcast = Message {
            broadcast: true,
            ..inbound("ops", "bob", "all hands", "t-b")
        };
        let system = inbound("ops", "SYSTEM", "carol has joined", "t-s");
        fx.dispatcher
            .router
            .on_batch("ops", vec![broadcast, system])
            .await
            .unwrap();

        let shown = fx.renderer.shown();
        assert_eq!(shown.len(), 2);
    }

    #[tokio::test]
    async fn test_own_echo_not_rendered() {
        let fx = fixture().await;
        fx.dispatcher
            .router
            .on_batch("general", vec![inbound("general", "alice", "mine", "t-me")])
            .await
            .unwrap();
        assert!(fx.renderer.shown().is_empty());
    }

    #[tokio::test]
    async fn test_whisper_rendered_only_for_addressee() {
        let fx = fixture().await;
        let to_me = Message {
            whisper_to: Some("alice".to_string()),
            ..inbound("general", "bob", "psst alice", "t-w1")
        };
        let to_other = Message {
            whisper_to: Some("carol".to_string()),
            ..inbound("general", "bob", "psst carol", "t-w2")
        };
        fx.dispatcher
            .router
            .on_batch("general", vec![to_me, to_other])
            .await
            .unwrap();

        let shown = fx.renderer.shown();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].text, "psst alice");
        // Both whispers are persisted regardless of display.
        assert_eq!(fx.store.recent("general", 10).await.unwrap().len(), 2);
    }

    // ── Nick ──

    #[tokio::test]
    async fn test_set_user_changes_sender() {
        let fx = fixture().await;
        fx.dispatcher.set_user("alice2").await;
        fx.dispatcher.send("renamed").await.unwrap();
        assert!(
            fx.relay
                .published()
                .iter()
                .any(|(_, user, text)| user == "alice2" && text == "renamed")
        );
    }

    // ── Shutdown ──

    #[tokio::test]
    async fn test_shutdown_announces_and_stops_everything() {
        let fx = fixture().await;
        fx.dispatcher.join("ops").await.unwrap();

        fx.dispatcher.shutdown().await;
        assert!(fx.dispatcher.active_channels().await.is_empty());

        let farewells: Vec<_> = fx
            .relay
            .published()
            .into_iter()
            .filter(|(_, user, text)| user == "SYSTEM" && text.contains("has left"))
            .collect();
        assert_eq!(farewells.len(), 2);
    }
}
