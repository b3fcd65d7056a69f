//! Relay synchronization engine.
//!
//! One [`subscription::ChannelSubscription`] task per joined channel keeps
//! a live long-poll stream against the relay, and the
//! [`dispatcher::RelayDispatcher`] façade owns the active set, routes every
//! inbound batch to the history store, the foreground renderer, and the
//! passive monitor, and carries the user-facing join/leave/switch/send/
//! broadcast operations.

pub mod dispatcher;
pub mod session;
pub mod subscription;

pub use dispatcher::{BroadcastReport, ForegroundRenderer, RelayDispatcher};
pub use session::Session;
pub use subscription::{ChannelSubscription, RetryPolicy, SubscriptionEvents};
