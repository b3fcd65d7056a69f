//! Passive per-channel anomaly monitoring.
//!
//! After every inbound batch the dispatcher hands the monitor that
//! channel's new messages. Analysis runs on a detached task under its own
//! timeout; a slow or broken analyzer can never delay chat delivery. The
//! analyzer is fail-open: errors and timeouts degrade to "no issue" and
//! at most an INFO entry in the diagnostic ring.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::diag::{DiagnosticLog, Severity};
use crate::error::LlmError;
use crate::message::Message;
use crate::relay::ForegroundRenderer;
use crate::store::HistoryStore;

/// Default ceiling on one analysis call.
pub const DEFAULT_ANALYSIS_TIMEOUT: Duration = Duration::from_secs(20);

/// External anomaly analyzer. `Ok(None)` means no issue; `Ok(Some(_))` is
/// a high-severity finding to surface to the user.
#[async_trait]
pub trait ChannelAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        channel: &str,
        messages: &[Message],
        topic: Option<&str>,
    ) -> Result<Option<String>, LlmError>;
}

/// Fan-out target for inbound batches, decoupled from the delivery path.
pub struct PassiveMonitor {
    analyzer: Arc<dyn ChannelAnalyzer>,
    store: HistoryStore,
    renderer: Arc<dyn ForegroundRenderer>,
    diag: Arc<DiagnosticLog>,
    timeout: Duration,
}

impl PassiveMonitor {
    pub fn new(
        analyzer: Arc<dyn ChannelAnalyzer>,
        store: HistoryStore,
        renderer: Arc<dyn ForegroundRenderer>,
        diag: Arc<DiagnosticLog>,
    ) -> Self {
        Self {
            analyzer,
            store,
            renderer,
            diag,
            timeout: DEFAULT_ANALYSIS_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fire-and-forget analysis of one channel's batch.
    ///
    /// Each invocation sees only the named channel's messages at the time
    /// of the call; invocations for different channels are independent and
    /// unordered relative to each other.
    pub fn observe(&self, channel: &str, batch: &[Message]) {
        let messages: Vec<Message> = batch.iter().filter(|m| !m.is_system()).cloned().collect();
        if messages.is_empty() {
            return;
        }

        let channel = channel.to_string();
        let analyzer = Arc::clone(&self.analyzer);
        let store = self.store.clone();
        let renderer = Arc::clone(&self.renderer);
        let diag = Arc::clone(&self.diag);
        let timeout = self.timeout;

        tokio::spawn(async move {
            // Topic is soft context; a store hiccup must not block analysis.
            let topic = store.topic(&channel).await.unwrap_or_default();

            let analysis = tokio::time::timeout(
                timeout,
                analyzer.analyze(&channel, &messages, topic.as_deref()),
            )
            .await;

            match analysis {
                Ok(Ok(Some(alert))) => {
                    tracing::info!(channel = %channel, "monitor raised an alert");
                    renderer.render_alert(&channel, &alert);
                }
                Ok(Ok(None)) => {}
                Ok(Err(err)) => {
                    diag.record(
                        Severity::Info,
                        format!("monitor: analyzer unavailable for #{channel}: {err}"),
                    );
                }
                Err(_) => {
                    diag.record(
                        Severity::Info,
                        format!("monitor: analysis timed out for #{channel}"),
                    );
                }
            }
        });
    }
}
