//! Terminal output.
//!
//! Colored line formats for inbound traffic, history dumps, diagnostic
//! logs, and assistant reports. Incoming messages arrive from background
//! tasks while the prompt is open, so every asynchronous line starts on a
//! fresh row the way the relay's other clients do it.

use crossterm::style::Stylize;

use crate::diag::{LogEntry, Severity};
use crate::message::{Message, display_time};
use crate::relay::ForegroundRenderer;

/// Renderer for the interactive terminal.
pub struct TerminalRenderer;

impl ForegroundRenderer for TerminalRenderer {
    fn render_incoming(&self, message: &Message) {
        let time = &message.timestamp;
        if message.is_system() {
            println!("\n{}", format!("[{time}] * {}", message.text).yellow());
        } else if message.whisper_to.is_some() {
            println!(
                "\n{}",
                format!("[{time}] (whisper) [{}]: {}", message.user, message.text).magenta()
            );
        } else if message.broadcast {
            println!(
                "\n{}",
                format!("[{time}] [BROADCAST] [{}]: {}", message.user, message.text).magenta()
            );
        } else {
            println!(
                "\n{}",
                format!("[{time}] <- [{}]: {}", message.user, message.text).cyan()
            );
        }
    }

    fn render_alert(&self, channel: &str, alert: &str) {
        println!(
            "\n{}",
            format!("[{}] !! [monitor] #{channel}: {alert}", display_time())
                .red()
                .bold()
        );
    }
}

/// One line of a history dump.
fn history_line(message: &Message) -> String {
    let time = &message.timestamp;
    if message.is_system() {
        format!("[{time}] * {}", message.text).yellow().to_string()
    } else {
        format!("[{time}] <- [{}]: {}", message.user, message.text)
            .cyan()
            .to_string()
    }
}

/// `/history N` output (fetched from the relay).
pub fn print_remote_history(channel: &str, count: u32, messages: &[Message]) {
    println!(
        "\n{}",
        format!("--- Last {count} messages in #{channel} ---").yellow()
    );
    if messages.is_empty() {
        println!("{}", "No message history yet.".cyan());
    }
    for message in messages {
        println!("{}", history_line(message));
    }
    println!("{}\n", "--- End of History ---".yellow());
}

/// `/history local` output (read from the SQLite cache).
pub fn print_local_history(channel: &str, count: u32, messages: &[Message]) {
    println!(
        "\n{}",
        format!("--- Local History for #{channel} (Last {count}) ---").green()
    );
    if messages.is_empty() {
        println!("{}", "No local history found for this channel.".cyan());
    }
    for message in messages {
        println!("{}", history_line(message));
    }
    println!("{}\n", "--- End of Local History ---".green());
}

/// `/logs` output, color-coded by severity.
pub fn print_logs(count: usize, entries: &[LogEntry]) {
    println!(
        "\n{}",
        format!("--- Technical Diagnostic Logs (Last {count}) ---").red()
    );
    if entries.is_empty() {
        println!("{}", "No diagnostic logs captured yet.".cyan());
    }
    for entry in entries {
        let line = entry.to_string();
        match entry.severity {
            Severity::Error | Severity::Critical => println!("{}", line.red()),
            Severity::Success => println!("{}", line.green()),
            Severity::Info => println!("{}", line.yellow()),
        }
    }
    println!("{}\n", "--- End of Logs ---".red());
}

/// `/channels` output.
pub fn print_channels(channels: &[String], focused: &str) {
    println!("\n{}", "Joined channels:".yellow());
    for channel in channels {
        if channel == focused {
            println!("  {}", format!("* #{channel} (active)").green());
        } else {
            println!("  {}", format!("o #{channel}").cyan());
        }
    }
    println!();
}

/// `/who` output.
pub fn print_users(channel: &str, users: &[String]) {
    if users.is_empty() {
        println!("{}", format!("No users seen in #{channel} yet.").cyan());
        return;
    }
    println!("{}", format!("Users seen in #{channel}:").yellow());
    for user in users {
        println!("  {}", user.clone().cyan());
    }
}

/// A boxed assistant report (`/pulse`, `/trc`).
pub fn print_report(title: &str, body: &str) {
    println!("\n{}", format!("===== {title} =====").yellow());
    println!("{body}");
    println!("{}\n", "=".repeat(title.len() + 12).yellow());
}

/// Confirmation line for a message we just sent.
pub fn print_sent(text: &str) {
    println!("{}", format!("[{}] -> {text}", display_time()).green());
}

pub fn print_error(message: &str) {
    println!("{}", format!("Error: {message}").red());
}

pub fn print_warning(message: &str) {
    println!("{}", message.to_string().yellow());
}

pub fn print_info(message: &str) {
    println!("{}", message.to_string().green());
}

/// `/clear`.
pub fn clear_screen() {
    print!("\x1b[2J\x1b[H");
}

/// `/help`.
pub fn print_help() {
    let lines = [
        ("/help", "Show this help"),
        ("/channels", "List joined channels"),
        ("/join #name", "Join a channel"),
        ("/leave #name", "Leave a channel"),
        ("/switch #name", "Switch active channel"),
        ("/broadcast <msg>", "Send to ALL channels"),
        ("/history [N|local]", "Relay or local history"),
        ("/whisper <user> <msg>", "Message one user"),
        ("/topic [text]", "Show or set the channel topic"),
        ("/nick <name>", "Change your display name"),
        ("/who", "Users seen in this channel"),
        ("/pulse", "AI multi-channel pulse report"),
        ("/trc <question>", "Ask the AI about this channel"),
        ("/wipe", "Clear local history for this channel"),
        ("/logs [N]", "Show technical logs"),
        ("/clear", "Clear the screen"),
        ("/logout", "Leave the chat"),
    ];
    println!("\n{}", "Available commands:".yellow());
    for (name, description) in lines {
        println!("  {:<22} {}", name.to_string().cyan(), description);
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(user: &str, text: &str) -> Message {
        Message {
            channel: "general".to_string(),
            user: user.to_string(),
            text: text.to_string(),
            timestamp: "16:20:00".to_string(),
            delivery_token: "t".to_string(),
            broadcast: false,
            whisper_to: None,
        }
    }

    #[test]
    fn test_history_line_contains_time_user_text() {
        let line = history_line(&msg("bob", "hello"));
        assert!(line.contains("16:20:00"));
        assert!(line.contains("[bob]"));
        assert!(line.contains("hello"));
    }

    #[test]
    fn test_system_history_line_omits_user_bracket() {
        let line = history_line(&msg("SYSTEM", "bob has joined"));
        assert!(line.contains("bob has joined"));
        assert!(!line.contains("[SYSTEM]"));
    }
}
