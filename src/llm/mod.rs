//! LLM assistant layer.
//!
//! A thin Gemini REST client plus the assistant persona built on it:
//! direct questions with channel context (`/trc`), the multi-channel
//! pulse report (`/pulse`), and the passive anomaly analyzer the monitor
//! hook calls. Everything here is best-effort; provider failures turn
//! into advisory text or "no alert", never a crash.

mod assistant;
mod gemini;

pub use assistant::Assistant;
pub use gemini::{GeminiClient, GeminiConfig};
