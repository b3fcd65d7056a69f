//! TRC: multi-channel terminal relay chat.
//!
//! The core is the relay synchronization engine: one long-polling
//! subscription task per joined channel ([`relay::subscription`]), a
//! dispatcher façade that owns the active set and fans every inbound
//! batch out to the deduplicating SQLite history ([`store`]), the
//! foreground renderer, and a detached anomaly monitor ([`monitor`]).
//! Transport failures retry with bounded backoff and land in the
//! [`diag`] ring instead of crashing the chat loop; duplicate deliveries
//! are absorbed by the store's per-channel token uniqueness.
//!
//! ```text
//! REPL input ──> RelayDispatcher ──> ChannelSubscription ──> relay
//!                     │  ▲                     │
//!                     │  └──── on_batch ◄──────┘
//!                     ▼
//!       ┌─────────────┼──────────────┐
//!   HistoryStore  ForegroundRenderer  PassiveMonitor ──> Assistant
//! ```

pub mod cli;
pub mod config;
pub mod diag;
pub mod error;
pub mod llm;
pub mod message;
pub mod monitor;
pub mod relay;
pub mod store;
pub mod transport;

pub use error::{Error, Result};
