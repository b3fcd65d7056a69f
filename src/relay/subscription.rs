//! Per-channel streaming unit.
//!
//! Each joined channel gets one tokio task that long-polls the relay from
//! the last confirmed cursor, hands decoded batches to the dispatcher's
//! events handler, and owns its own retry/backoff. The cursor advances
//! only after the handler returns Ok, so a crash mid-handling replays the
//! batch: at-least-once here, upgraded to exactly-once end-to-end by the
//! history store's token dedup.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::diag::{DiagnosticLog, Severity};
use crate::error::TransportError;
use crate::message::Message;
use crate::transport::RelayTransport;

/// Backoff policy for resubscribing after transport failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Base delay for exponential backoff (milliseconds).
    pub base_delay_ms: u64,
    /// Maximum delay cap (milliseconds).
    pub max_delay_ms: u64,
    /// Jitter factor (0.0 to 1.0) added on top of the computed delay.
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            jitter_factor: 0.25,
        }
    }
}

impl RetryPolicy {
    /// Delay before the next resubscribe attempt given the number of
    /// consecutive failures so far (≥1).
    ///
    /// Exponential: `base * 2^(failures-1)`, capped at `max_delay_ms`,
    /// with additive jitter of up to `jitter_factor * computed_delay`.
    pub fn delay(&self, consecutive_failures: u32) -> Duration {
        let exponent = consecutive_failures.saturating_sub(1);
        let exp_delay_ms = self
            .base_delay_ms
            .saturating_mul(1u64.checked_shl(exponent).unwrap_or(u64::MAX));
        let capped_ms = exp_delay_ms.min(self.max_delay_ms);

        let jitter_range = (capped_ms as f64 * self.jitter_factor) as u64;
        let jitter = if jitter_range > 0 {
            // Time-seeded jitter keeps retries decorrelated without
            // pulling in rand for one call site.
            let seed = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .subsec_nanos() as u64;
            seed % (jitter_range + 1)
        } else {
            0
        };

        Duration::from_millis(capped_ms.saturating_add(jitter))
    }
}

/// Consumer of a subscription's inbound traffic, injected at spawn time.
#[async_trait]
pub trait SubscriptionEvents: Send + Sync {
    /// Handle one inbound batch. Returning an error leaves the cursor
    /// unconfirmed: the same batch will be polled and delivered again.
    async fn on_batch(&self, channel: &str, messages: Vec<Message>) -> anyhow::Result<()>;

    /// Observe a transport failure. The subscription has already logged
    /// it and scheduled a retry; this is informational.
    async fn on_failure(&self, channel: &str, error: &TransportError);
}

/// Handle to one running channel stream.
pub struct ChannelSubscription {
    name: String,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ChannelSubscription {
    /// Spawn the run loop for `channel`. The dispatcher guarantees at most
    /// one live subscription per channel, so spawning is unconditional
    /// here.
    pub fn spawn(
        channel: String,
        transport: Arc<dyn RelayTransport>,
        events: Arc<dyn SubscriptionEvents>,
        diag: Arc<DiagnosticLog>,
        retry: RetryPolicy,
    ) -> Self {
        let cancel = CancellationToken::new();
        let loop_cancel = cancel.clone();
        let name = channel.clone();

        let handle = tokio::spawn(async move {
            run_loop(channel, transport, events, diag, retry, loop_cancel).await;
        });

        Self {
            name,
            cancel,
            handle,
        }
    }

    /// Channel this subscription serves.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cancel the run loop and wait for it to wind down. Prompt: the loop
    /// observes cancellation at the poll and at the backoff sleep, so the
    /// wait is bounded by one in-flight cycle and no retry timer outlives
    /// the channel.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}

async fn run_loop(
    channel: String,
    transport: Arc<dyn RelayTransport>,
    events: Arc<dyn SubscriptionEvents>,
    diag: Arc<DiagnosticLog>,
    retry: RetryPolicy,
    cancel: CancellationToken,
) {
    // Advances only on confirmed receipt AND successful handoff; never
    // reset on retry, never skipped ahead.
    let mut cursor: Option<String> = None;
    let mut consecutive_failures: u32 = 0;

    tracing::debug!(channel = %channel, "subscription started");

    loop {
        let batch = tokio::select! {
            _ = cancel.cancelled() => break,
            result = transport.poll(&channel, cursor.as_deref()) => result,
        };

        match batch {
            Ok(batch) => {
                if consecutive_failures > 0 {
                    diag.record(
                        Severity::Success,
                        format!("Connection restored for #{channel}"),
                    );
                    consecutive_failures = 0;
                }

                if batch.messages.is_empty() {
                    cursor = Some(batch.cursor);
                    continue;
                }

                match events.on_batch(&channel, batch.messages).await {
                    Ok(()) => cursor = Some(batch.cursor),
                    Err(err) => {
                        consecutive_failures += 1;
                        diag.record(
                            Severity::Error,
                            format!("delivery failed for #{channel}: {err}"),
                        );
                        if !backoff(&retry, consecutive_failures, &cancel).await {
                            break;
                        }
                    }
                }
            }
            Err(err) => {
                consecutive_failures += 1;
                diag.record(Severity::Error, format!("#{channel}: {err}"));
                events.on_failure(&channel, &err).await;
                if !backoff(&retry, consecutive_failures, &cancel).await {
                    break;
                }
            }
        }
    }

    tracing::debug!(channel = %channel, "subscription stopped");
}

/// Sleep out one backoff interval; returns false if cancelled mid-wait.
async fn backoff(retry: &RetryPolicy, failures: u32, cancel: &CancellationToken) -> bool {
    let delay = retry.delay(failures);
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
