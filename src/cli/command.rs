//! Slash-command parsing.
//!
//! Converts a raw input line into either a typed [`Command`] or plain
//! chat text. Unknown commands and malformed arguments are rejected here,
//! before any state changes.

use crate::error::InputError;

/// Default number of messages for `/history`.
const DEFAULT_REMOTE_HISTORY: u32 = 10;

/// Default number of messages for `/history local`.
const DEFAULT_LOCAL_HISTORY: u32 = 50;

/// Default number of entries for `/logs`.
const DEFAULT_LOG_COUNT: usize = 20;

/// What `/history` should read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryRequest {
    /// Fetch from the relay.
    Remote(u32),
    /// Read the local SQLite cache.
    Local(u32),
}

/// A recognized slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Channels,
    Join(String),
    Leave(String),
    Switch(String),
    Broadcast(String),
    History(HistoryRequest),
    Logs(usize),
    Wipe,
    Pulse,
    Trc(String),
    Whisper { to: String, text: String },
    Topic(Option<String>),
    Nick(String),
    Who,
    Clear,
    Logout,
}

/// Result of parsing one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Command(Command),
    Chat(String),
    Empty,
}

/// Parse a raw line. Lines not starting with `/` are chat text; blank
/// lines are [`Input::Empty`].
pub fn parse_line(line: &str) -> Result<Input, InputError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Input::Empty);
    }
    if !line.starts_with('/') {
        return Ok(Input::Chat(line.to_string()));
    }

    let mut parts = line[1..].split_whitespace();
    let name = parts.next().unwrap_or_default().to_lowercase();
    let args: Vec<&str> = parts.collect();

    let command = match name.as_str() {
        "help" => Command::Help,
        "channels" => Command::Channels,
        "join" => Command::Join(require_channel_arg(&args, "Usage: /join #channel_name")?),
        "leave" => Command::Leave(require_channel_arg(&args, "Usage: /leave #channel_name")?),
        "switch" => Command::Switch(require_channel_arg(&args, "Usage: /switch #channel_name")?),
        "broadcast" => {
            if args.is_empty() {
                return Err(InputError::Usage("Usage: /broadcast your message here"));
            }
            Command::Broadcast(args.join(" "))
        }
        "history" => Command::History(parse_history(&args)?),
        "logs" => {
            let count = match args.first() {
                Some(raw) => raw
                    .parse::<usize>()
                    .map_err(|_| InputError::Usage("Usage: /logs [N]"))?,
                None => DEFAULT_LOG_COUNT,
            };
            Command::Logs(count)
        }
        "wipe" => Command::Wipe,
        "pulse" => Command::Pulse,
        "trc" => {
            if args.is_empty() {
                return Err(InputError::Usage(
                    "Usage: /trc your question about the current channel",
                ));
            }
            Command::Trc(args.join(" "))
        }
        "whisper" => {
            if args.len() < 2 {
                return Err(InputError::Usage("Usage: /whisper <user> <message>"));
            }
            Command::Whisper {
                to: args[0].to_string(),
                text: args[1..].join(" "),
            }
        }
        "topic" => {
            if args.is_empty() {
                Command::Topic(None)
            } else {
                Command::Topic(Some(args.join(" ")))
            }
        }
        "nick" => {
            if args.len() != 1 {
                return Err(InputError::Usage("Usage: /nick <new_name>"));
            }
            Command::Nick(args[0].to_string())
        }
        "who" => Command::Who,
        "clear" => Command::Clear,
        "logout" => Command::Logout,
        other => return Err(InputError::UnknownCommand(other.to_string())),
    };
    Ok(Input::Command(command))
}

fn require_channel_arg(args: &[&str], usage: &'static str) -> Result<String, InputError> {
    match args.first() {
        Some(raw) => Ok(raw.to_string()),
        None => Err(InputError::Usage(usage)),
    }
}

fn parse_history(args: &[&str]) -> Result<HistoryRequest, InputError> {
    match args.first() {
        None => Ok(HistoryRequest::Remote(DEFAULT_REMOTE_HISTORY)),
        Some(&"local") => {
            let count = match args.get(1) {
                Some(raw) => raw
                    .parse::<u32>()
                    .map_err(|_| InputError::Usage("Usage: /history [N|local [N]]"))?,
                None => DEFAULT_LOCAL_HISTORY,
            };
            Ok(HistoryRequest::Local(count))
        }
        Some(raw) => {
            let count = raw
                .parse::<u32>()
                .map_err(|_| InputError::Usage("Usage: /history [N|local [N]]"))?;
            if count == 0 {
                return Err(InputError::Usage("Please enter a positive number for history."));
            }
            Ok(HistoryRequest::Remote(count))
        }
    }
}
