//! The relay assistant persona.
//!
//! Wraps [`GeminiClient`] with the prompt shapes the client uses: direct
//! questions over the focused channel's history, the cross-channel pulse
//! report, and the passive anomaly triage the monitor invokes. Built
//! without an API key, every interactive call reports that the assistant
//! is offline and the analyzer stays silent.

use async_trait::async_trait;

use crate::error::LlmError;
use crate::llm::gemini::GeminiClient;
use crate::message::Message;
use crate::monitor::ChannelAnalyzer;

const SYSTEM_INSTRUCTION: &str = "You are the relay assistant embedded in a \
multi-channel terminal chat client. You help technical teams by reading relay \
history, summarizing discussions, and proposing fixes for the problems they \
describe. Keep answers concise and formatted for a terminal; plain ASCII \
emphasis only. You only ever see the channel history you are given.";

const ANALYZER_INSTRUCTION: &str = "You monitor one chat channel for \
operational anomalies: leaked credentials, abusive floods, outage reports, or \
coordinated errors across users. If the new messages contain nothing \
noteworthy reply with exactly OK. Otherwise reply with a single short alert \
line describing the issue.";

/// High-level assistant operations over the Gemini client.
pub struct Assistant {
    client: Option<GeminiClient>,
}

impl Assistant {
    /// Assistant backed by a live Gemini client.
    pub fn new(client: GeminiClient) -> Self {
        Self {
            client: Some(client),
        }
    }

    /// Assistant without a provider: interactive calls return
    /// [`LlmError::NotConfigured`], the analyzer never alerts.
    pub fn offline() -> Self {
        Self { client: None }
    }

    /// Whether a provider is configured.
    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    fn client(&self) -> Result<&GeminiClient, LlmError> {
        self.client.as_ref().ok_or(LlmError::NotConfigured)
    }

    /// Answer a direct question with the focused channel's recent
    /// history as context.
    pub async fn ask(&self, question: &str, context: &[Message]) -> Result<String, LlmError> {
        let client = self.client()?;
        let prompt = if context.is_empty() {
            question.to_string()
        } else {
            format!(
                "Relay context:\n{}\n\nUser query: {}",
                format_transcript(context),
                question
            )
        };
        client.generate(SYSTEM_INSTRUCTION, &prompt).await
    }

    /// Summarize activity across every joined channel.
    pub async fn pulse(
        &self,
        histories: &[(String, Vec<Message>)],
    ) -> Result<String, LlmError> {
        let client = self.client()?;

        let mut prompt = String::from(
            "Analyze the following multi-channel relay history and write a \
             pulse report: summarize the active discussions, call out \
             blockers or errors, and note progress per channel.\n",
        );
        for (channel, messages) in histories {
            prompt.push_str(&format!("\n--- Channel: #{channel} ---\n"));
            if messages.is_empty() {
                prompt.push_str("(no local history)\n");
            } else {
                prompt.push_str(&format_transcript(messages));
                prompt.push('\n');
            }
        }

        client.generate(SYSTEM_INSTRUCTION, &prompt).await
    }
}

/// Render messages as transcript lines for a prompt.
fn format_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("[{}] {}: {}", m.timestamp, m.user, m.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// True when an analyzer reply means "nothing to report".
fn is_all_clear(reply: &str) -> bool {
    let trimmed = reply.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case("ok") || trimmed.starts_with("OK")
}

#[async_trait]
impl ChannelAnalyzer for Assistant {
    async fn analyze(
        &self,
        channel: &str,
        messages: &[Message],
        topic: Option<&str>,
    ) -> Result<Option<String>, LlmError> {
        // No provider: passively silent rather than noisy.
        let Some(client) = self.client.as_ref() else {
            return Ok(None);
        };

        let mut prompt = format!("Channel: #{channel}\n");
        if let Some(topic) = topic {
            prompt.push_str(&format!("Topic: {topic}\n"));
        }
        prompt.push_str("New messages:\n");
        prompt.push_str(&format_transcript(messages));

        let reply = client.generate(ANALYZER_INSTRUCTION, &prompt).await?;
        if is_all_clear(&reply) {
            Ok(None)
        } else {
            Ok(Some(reply.trim().to_string()))
        }
    }
}
