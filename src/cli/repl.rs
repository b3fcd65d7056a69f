//! Interactive chat loop.
//!
//! Reads lines with rustyline on the blocking side of the runtime while
//! subscriptions render inbound traffic asynchronously. Every command
//! failure is printed and swallowed; the loop itself only ends on
//! `/logout` or EOF.

use std::sync::Arc;

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::cli::command::{Command, HistoryRequest, Input, parse_line};
use crate::cli::render;
use crate::diag::DiagnosticLog;
use crate::error::{Error, InputError};
use crate::llm::Assistant;
use crate::message::validate_username;
use crate::relay::RelayDispatcher;
use crate::store::HistoryStore;

/// Where the input history is kept between sessions.
const INPUT_HISTORY_FILE: &str = ".trc_repl_history";

/// Messages of context handed to the assistant per channel.
const ASSISTANT_CONTEXT: u32 = 30;

/// Prompt for a username until a valid one is entered.
///
/// A previously saved `/nick` is offered as the default: pressing enter
/// on an empty line accepts it.
pub async fn login(editor: &mut DefaultEditor, store: &HistoryStore) -> anyhow::Result<String> {
    let saved = store.setting("nick").await.unwrap_or(None);

    loop {
        let prompt = match &saved {
            Some(nick) => format!("Username [{nick}]: "),
            None => "Username: ".to_string(),
        };
        let line = tokio::task::block_in_place(|| editor.readline(&prompt))?;
        let name = line.trim();
        let candidate = if name.is_empty() {
            match &saved {
                Some(nick) => nick.clone(),
                None => {
                    render::print_error(&InputError::EmptyUsername.to_string());
                    continue;
                }
            }
        } else {
            name.to_string()
        };

        match validate_username(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(err) => render::print_error(&err.to_string()),
        }
    }
}

/// The foreground chat loop.
pub struct Repl {
    editor: DefaultEditor,
    dispatcher: Arc<RelayDispatcher>,
    store: HistoryStore,
    diag: Arc<DiagnosticLog>,
    assistant: Arc<Assistant>,
}

impl Repl {
    pub fn new(
        editor: DefaultEditor,
        dispatcher: Arc<RelayDispatcher>,
        store: HistoryStore,
        diag: Arc<DiagnosticLog>,
        assistant: Arc<Assistant>,
    ) -> Self {
        Self {
            editor,
            dispatcher,
            store,
            diag,
            assistant,
        }
    }

    /// Run until `/logout` or EOF.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let _ = self.editor.load_history(INPUT_HISTORY_FILE);

        // Local cache first, so the channel is readable before the relay
        // answers (or while it is down).
        let startup_channel = self.dispatcher.focused().await;
        self.show_local_history(&startup_channel, 20).await;

        loop {
            let prompt = format!("#{} > ", self.dispatcher.focused().await);
            let line = match tokio::task::block_in_place(|| self.editor.readline(&prompt)) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err.into()),
            };
            if !line.trim().is_empty() {
                let _ = self.editor.add_history_entry(&line);
            }

            match parse_line(&line) {
                Ok(Input::Empty) => continue,
                Ok(Input::Chat(text)) => self.handle_chat(&text).await,
                Ok(Input::Command(Command::Logout)) => break,
                Ok(Input::Command(command)) => self.handle_command(command).await,
                Err(err) => render::print_error(&err.to_string()),
            }
        }

        self.dispatcher.shutdown().await;
        let _ = self.editor.save_history(INPUT_HISTORY_FILE);
        render::print_info("Goodbye!");
        Ok(())
    }

    async fn handle_chat(&self, text: &str) {
        match self.dispatcher.send(text).await {
            Ok(_) => render::print_sent(text),
            Err(Error::Input(err)) => render::print_error(&err.to_string()),
            Err(err) => render::print_error(&format!("Failed to send: {err}")),
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Help => render::print_help(),

            Command::Channels => {
                let channels = self.dispatcher.active_channels().await;
                let focused = self.dispatcher.focused().await;
                render::print_channels(&channels, &focused);
            }

            Command::Join(raw) => match self.dispatcher.join(&raw).await {
                Ok(()) => {
                    let channel = self.dispatcher.focused().await;
                    self.show_local_history(&channel, 20).await;
                    render::print_info(&format!("Joined #{channel} and switched to it"));
                }
                Err(Error::Input(err)) => render::print_warning(&err.to_string()),
                Err(err) => render::print_error(&format!("Error joining: {err}")),
            },

            Command::Leave(raw) => match self.dispatcher.leave(&raw).await {
                Ok(()) => {
                    let focused = self.dispatcher.focused().await;
                    render::print_warning(&format!("Left the channel, now in #{focused}"));
                }
                Err(Error::Input(err)) => render::print_error(&err.to_string()),
                Err(err) => render::print_error(&format!("Error leaving: {err}")),
            },

            Command::Switch(raw) => match self.dispatcher.switch(&raw).await {
                Ok(()) => {
                    let focused = self.dispatcher.focused().await;
                    render::print_info(&format!("Switched to #{focused}"));
                }
                Err(err) => render::print_error(&err.to_string()),
            },

            Command::Broadcast(text) => match self.dispatcher.broadcast(&text).await {
                Ok(report) if report.is_complete() => {
                    render::print_info(&format!(
                        "Broadcast to {} channels: {text}",
                        report.succeeded
                    ));
                }
                Ok(report) => {
                    render::print_warning(&format!(
                        "Broadcast partially sent ({}/{} channels).",
                        report.succeeded, report.total
                    ));
                }
                Err(err) => render::print_error(&err.to_string()),
            },

            Command::History(HistoryRequest::Remote(count)) => {
                let channel = self.dispatcher.focused().await;
                match self.dispatcher.remote_history(count).await {
                    Ok(messages) => render::print_remote_history(&channel, count, &messages),
                    Err(err) => {
                        render::print_error(&format!("Could not fetch history: {err}"));
                    }
                }
            }

            Command::History(HistoryRequest::Local(count)) => {
                let channel = self.dispatcher.focused().await;
                self.show_local_history(&channel, count).await;
            }

            Command::Logs(count) => render::print_logs(count, &self.diag.recent(count)),

            Command::Wipe => self.handle_wipe().await,

            Command::Pulse => self.handle_pulse().await,

            Command::Trc(question) => {
                let channel = self.dispatcher.focused().await;
                let context = self
                    .store
                    .recent(&channel, ASSISTANT_CONTEXT)
                    .await
                    .unwrap_or_default();
                render::print_warning("[pulse] asking the assistant...");
                match self.assistant.ask(&question, &context).await {
                    Ok(answer) => render::print_report("AI RESPONSE", &answer),
                    Err(err) => render::print_error(&format!("Assistant unavailable: {err}")),
                }
            }

            Command::Whisper { to, text } => match self.dispatcher.whisper(&to, &text).await {
                Ok(_) => render::print_sent(&format!("(whisper to {to}) {text}")),
                Err(Error::Input(err)) => render::print_error(&err.to_string()),
                Err(err) => render::print_error(&format!("Failed to send: {err}")),
            },

            Command::Topic(None) => {
                let channel = self.dispatcher.focused().await;
                match self.store.topic(&channel).await {
                    Ok(Some(topic)) => render::print_info(&format!("Topic for #{channel}: {topic}")),
                    Ok(None) => render::print_warning(&format!("No topic set for #{channel}.")),
                    Err(err) => render::print_error(&err.to_string()),
                }
            }

            Command::Topic(Some(topic)) => {
                let channel = self.dispatcher.focused().await;
                match self.store.set_topic(&channel, &topic).await {
                    Ok(()) => render::print_info(&format!("Topic for #{channel} set.")),
                    Err(err) => render::print_error(&err.to_string()),
                }
            }

            Command::Nick(name) => {
                if let Err(err) = validate_username(&name) {
                    render::print_error(&err.to_string());
                    return;
                }
                self.dispatcher.set_user(&name).await;
                if let Err(err) = self.store.set_setting("nick", &name).await {
                    render::print_error(&err.to_string());
                }
                render::print_info(&format!("You are now known as {name}"));
            }

            Command::Who => {
                let channel = self.dispatcher.focused().await;
                match self.store.distinct_users(&channel).await {
                    Ok(users) => render::print_users(&channel, &users),
                    Err(err) => render::print_error(&err.to_string()),
                }
            }

            Command::Clear => render::clear_screen(),

            // Handled in run() before dispatch.
            Command::Logout => {}
        }
    }

    async fn show_local_history(&self, channel: &str, count: u32) {
        match self.store.recent(channel, count).await {
            Ok(messages) => render::print_local_history(channel, count, &messages),
            Err(err) => render::print_error(&err.to_string()),
        }
    }

    async fn handle_wipe(&mut self) {
        let channel = self.dispatcher.focused().await;
        let prompt = format!("Are you sure you want to wipe local history for #{channel}? (y/n): ");
        let answer = match tokio::task::block_in_place(|| self.editor.readline(&prompt)) {
            Ok(line) => line.trim().to_lowercase(),
            Err(_) => return,
        };
        if answer != "y" {
            render::print_warning("Wipe cancelled.");
            return;
        }
        match self.store.clear(&channel).await {
            Ok(_) => render::print_info(&format!("Local history for #{channel} has been wiped.")),
            Err(err) => render::print_error(&format!("Failed to clear local history: {err}")),
        }
    }

    async fn handle_pulse(&self) {
        render::print_warning("[pulse] reasoning over channel history...");
        let mut histories = Vec::new();
        for channel in self.dispatcher.active_channels().await {
            let messages = self
                .store
                .recent(&channel, ASSISTANT_CONTEXT)
                .await
                .unwrap_or_default();
            histories.push((channel, messages));
        }
        match self.assistant.pulse(&histories).await {
            Ok(report) => render::print_report("AI PULSE REPORT", &report),
            Err(err) => render::print_error(&format!("Assistant unavailable: {err}")),
        }
    }
}
